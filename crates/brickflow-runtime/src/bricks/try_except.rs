//! Error recovery.

use async_trait::async_trait;
use serde_json::{json, Value};

use brickflow_types::{valid_output_key, BrickError, Result};

use crate::brick::{Brick, ResolvedArgs};
use crate::options::BrickOptions;

/// Runs the `try` pipeline; when it fails with a recoverable error and an
/// `except` pipeline is configured, runs the recovery path with the caught
/// error injected into its context.
///
/// Fatal errors (validation, configuration, cancellation) propagate
/// untouched. The two paths use distinct branch keys (`try` / `except`) so
/// both are individually traceable even though at most one recovery runs per
/// invocation.
pub struct TryExceptBrick;

#[async_trait]
impl Brick for TryExceptBrick {
    fn id(&self) -> &str {
        "try"
    }

    fn name(&self) -> &str {
        "Try / Except"
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "required": ["try"],
            "properties": {
                "try": {"description": "Primary pipeline"},
                "except": {"description": "Optional recovery pipeline"},
                "errorKey": {"type": "string"}
            }
        })
    }

    async fn run(&self, args: &ResolvedArgs, options: &BrickOptions<'_>) -> Result<Value> {
        let primary = args.require_pipeline(self.id(), "try")?;
        let error_key = args.str("errorKey").unwrap_or("error");
        if !valid_output_key(error_key) {
            return Err(BrickError::InputValidation {
                brick: self.id().to_string(),
                property: "errorKey".to_string(),
                message: format!("invalid or reserved binding key '{error_key}'"),
            });
        }

        let error = match options
            .run_branch(primary, options.context.clone(), "try", 0)
            .await
        {
            Ok(value) => return Ok(value),
            Err(e) if !e.is_recoverable() => return Err(e),
            Err(e) => e,
        };

        let Some(recovery) = args.pipeline("except") else {
            return Err(error);
        };

        tracing::info!(brick = %self.id(), error = %error, "Recovering from error");
        let scoped = options
            .context
            .with_binding(error_key, json!({"message": error.to_string()}));
        options.run_branch(recovery, scoped, "except", 0).await
    }
}
