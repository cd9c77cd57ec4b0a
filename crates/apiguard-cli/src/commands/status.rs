//! Show project status command

use anyhow::Result;

use super::load_and_compile;

/// Run the status command
pub async fn run(config_path: &str) -> Result<()> {
    let (config, ir) = load_and_compile(config_path)?;

    println!("Project:    {} {}", config.project.name, config.project.version);
    println!("Document:   {}", config.document_path().display());
    println!("Operations: {}", ir.operations.len());
    for op in &ir.operations {
        println!("  {:<7} {} ({})", op.method.to_uppercase(), op.url, op.operation_id);
    }
    println!("Models:     {}", ir.models.len());
    for model in &ir.models {
        println!("  {}", model.name());
    }

    let output = config.output_path();
    let stored = std::fs::read_to_string(&output)
        .ok()
        .and_then(|text| serde_json::from_str::<serde_json::Value>(&text).ok())
        .and_then(|compiled| compiled["hash"].as_str().map(str::to_string));

    let state = match stored {
        None => "not compiled",
        Some(hash) if hash == ir.content_hash() => "up to date",
        Some(_) => "stale",
    };
    println!("Compiled:   {} ({})", output.display(), state);
    Ok(())
}
