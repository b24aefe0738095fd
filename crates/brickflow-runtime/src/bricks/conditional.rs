//! Conditional branching.

use async_trait::async_trait;
use serde_json::{json, Value};

use brickflow_types::Result;

use crate::brick::{Brick, ResolvedArgs};
use crate::expression::is_truthy;
use crate::options::BrickOptions;

/// Runs the `if` branch when the condition is truthy, the `else` branch (when
/// present) otherwise. An untaken invocation without an `else` branch yields
/// null; the untaken side produces no branch extension and no trace entries.
pub struct IfBrick;

#[async_trait]
impl Brick for IfBrick {
    fn id(&self) -> &str {
        "if"
    }

    fn name(&self) -> &str {
        "Conditional"
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "required": ["condition", "if"],
            "properties": {
                "condition": {"description": "Coerced via the shared truthiness rule"},
                "if": {"description": "Pipeline run when the condition is truthy"},
                "else": {"description": "Optional pipeline run otherwise"}
            }
        })
    }

    async fn run(&self, args: &ResolvedArgs, options: &BrickOptions<'_>) -> Result<Value> {
        let condition = args.require(self.id(), "condition")?;
        let taken = is_truthy(condition);
        tracing::debug!(brick = %self.id(), taken, "Condition evaluated");

        if taken {
            let branch = args.require_pipeline(self.id(), "if")?;
            options
                .run_branch(branch, options.context.clone(), "if", 0)
                .await
        } else if let Some(branch) = args.pipeline("else") {
            options
                .run_branch(branch, options.context.clone(), "else", 0)
                .await
        } else {
            Ok(Value::Null)
        }
    }
}
