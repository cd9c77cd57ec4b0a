//! Compile the definition document

use anyhow::{Context, Result};
use apiguard_codegen::Error;
use serde_json::json;

use super::load_and_compile;

/// Run the compile command
pub async fn run(config_path: &str, operation: Option<&str>) -> Result<()> {
    let (config, ir) = load_and_compile(config_path)?;

    if let Some(operation_id) = operation {
        let op = ir.operation(operation_id).ok_or_else(|| Error::UnknownOperation {
            operation_id: operation_id.to_string(),
        })?;
        println!("{}", serde_json::to_string_pretty(&op.check)?);
        return Ok(());
    }

    let hash = ir.content_hash();
    let output = config.output_path();
    if let Some(parent) = output.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let compiled = json!({ "hash": hash, "api": ir });
    std::fs::write(&output, serde_json::to_string_pretty(&compiled)?)
        .with_context(|| format!("Failed to write {}", output.display()))?;

    tracing::info!("Compiled {} operations:", ir.operations.len());
    for op in &ir.operations {
        tracing::info!(
            "  ✓ {} {} {} ({} checked fields)",
            op.method.to_uppercase(),
            op.url,
            op.operation_id,
            op.check.len()
        );
    }
    tracing::info!("✓ Wrote {} (hash: {}...)", output.display(), &hash[..8]);
    Ok(())
}
