//! Loop over a collection.

use async_trait::async_trait;
use serde_json::{json, Value};

use brickflow_types::{BrickError, Result};

use crate::brick::{Brick, ResolvedArgs};
use crate::options::BrickOptions;

/// Runs the body pipeline once per element of the source collection, in
/// source order, and collects the per-iteration results positionally.
///
/// Each iteration extends the branch path with key `loop` and the zero-based
/// iteration index, so iterations are independently traceable. The body sees
/// the element as its `@input` and the index under the `@index` binding.
/// Iteration `i` fully settles before iteration `i + 1` starts.
pub struct ForEachBrick;

#[async_trait]
impl Brick for ForEachBrick {
    fn id(&self) -> &str {
        "loop"
    }

    fn name(&self) -> &str {
        "For Each"
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "required": ["items", "body"],
            "properties": {
                "items": {"type": "array"},
                "body": {"description": "Pipeline run once per element"}
            }
        })
    }

    async fn run(&self, args: &ResolvedArgs, options: &BrickOptions<'_>) -> Result<Value> {
        let items = args
            .require(self.id(), "items")?
            .as_array()
            .ok_or_else(|| BrickError::InputValidation {
                brick: self.id().to_string(),
                property: "items".to_string(),
                message: "expected an array".to_string(),
            })?
            .clone();
        let body = args.require_pipeline(self.id(), "body")?;

        let mut results = Vec::with_capacity(items.len());
        for (index, item) in items.into_iter().enumerate() {
            let scoped = options
                .context
                .with_input(item)
                .with_binding("index", json!(index));
            let value = options.run_branch(body, scoped, "loop", index as u32).await?;
            results.push(value);
        }
        Ok(Value::Array(results))
    }
}
