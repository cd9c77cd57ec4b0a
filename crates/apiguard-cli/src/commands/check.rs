//! Check a sample request against one operation

use anyhow::{Context, Result};
use apiguard_codegen::Error;
use apiguard_core::{Lifecycle, Outcome, RequestContext, validate_request};

use super::load_and_compile;

/// Run the check command, returning the request's outcome
pub async fn run(config_path: &str, operation: &str, request_path: &str) -> Result<Outcome> {
    let (config, ir) = load_and_compile(config_path)?;
    let op = ir.operation(operation).ok_or_else(|| Error::UnknownOperation {
        operation_id: operation.to_string(),
    })?;

    let text = std::fs::read_to_string(request_path)
        .with_context(|| format!("Failed to read request {request_path}"))?;
    let mut request: RequestContext =
        serde_json::from_str(&text).context("Request file is not a valid request object")?;
    request.normalize_headers();

    let lifecycle = Lifecycle::with_defaults(&config.project.auth);
    let outcome = validate_request(&lifecycle, &request, &op.check);

    tracing::info!("{} {} → {}", op.method.to_uppercase(), op.url, outcome);
    println!("{outcome}");
    Ok(outcome)
}
