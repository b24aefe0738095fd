//! Named sub-pipeline invocation.

use async_trait::async_trait;
use serde_json::{json, Value};

use brickflow_types::{BrickConfig, BrickError, Expression, Pipeline, Result};

use crate::brick::{Brick, ResolvedArgs};
use crate::options::BrickOptions;

/// Runs a pipeline registered on the executor by name, as if it were inlined
/// at the call site: the current `@input`, `@options` and mod variables pass
/// straight through.
///
/// Alternatively, given a `brickId` plus a `config` object, synthesizes a
/// single-step pipeline invoking that brick with literal arguments. This is
/// the reflection-style "run brick by id" mechanism.
pub struct SubPipelineBrick;

#[async_trait]
impl Brick for SubPipelineBrick {
    fn id(&self) -> &str {
        "pipeline"
    }

    fn name(&self) -> &str {
        "Sub-Pipeline"
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "name": {"type": "string"},
                "brickId": {"type": "string"},
                "config": {"type": "object"}
            }
        })
    }

    // Exactly one of `name` / `brickId` must be present; checked in `run`.
    fn tolerates_partial_input(&self) -> bool {
        true
    }

    async fn run(&self, args: &ResolvedArgs, options: &BrickOptions<'_>) -> Result<Value> {
        match (args.str("name"), args.str("brickId")) {
            (Some(name), None) => {
                let pipeline = options
                    .named_pipeline(name)
                    .ok_or_else(|| {
                        BrickError::Configuration(format!("no pipeline registered as '{name}'"))
                    })?
                    .clone();
                options
                    .run_branch(&pipeline, options.context.clone(), "pipeline", 0)
                    .await
            }
            (None, Some(brick_id)) => {
                let mut step = BrickConfig::bare(brick_id);
                if let Some(Value::Object(config)) = args.get("config") {
                    for (key, value) in config {
                        step = step.with_arg(key, Expression::literal(value.clone()));
                    }
                }
                let synthesized = Pipeline::new(vec![step]);
                options
                    .run_branch(&synthesized, options.context.clone(), "pipeline", 0)
                    .await
            }
            _ => Err(BrickError::InputValidation {
                brick: self.id().to_string(),
                property: "name".to_string(),
                message: "exactly one of 'name' or 'brickId' is required".to_string(),
            }),
        }
    }
}
