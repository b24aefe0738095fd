//! Map over the values of an object.

use async_trait::async_trait;
use serde_json::{json, Map, Value};

use brickflow_types::{BrickError, Result};

use crate::brick::{Brick, ResolvedArgs};
use crate::options::BrickOptions;

/// Runs the body pipeline once per entry of the source object and collects
/// the results under the original keys, preserving entry order.
///
/// Each entry extends the branch path with key `map` and the zero-based entry
/// position. The body sees the entry's value as its `@input` and the entry's
/// key under the `@key` binding. Arrays belong to the loop brick; the source
/// here must be an object.
pub struct MapValuesBrick;

#[async_trait]
impl Brick for MapValuesBrick {
    fn id(&self) -> &str {
        "map"
    }

    fn name(&self) -> &str {
        "Map Values"
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "required": ["source", "body"],
            "properties": {
                "source": {"type": "object"},
                "body": {"description": "Pipeline run once per entry"}
            }
        })
    }

    async fn run(&self, args: &ResolvedArgs, options: &BrickOptions<'_>) -> Result<Value> {
        let source = args
            .require(self.id(), "source")?
            .as_object()
            .ok_or_else(|| BrickError::InputValidation {
                brick: self.id().to_string(),
                property: "source".to_string(),
                message: "expected an object".to_string(),
            })?
            .clone();
        let body = args.require_pipeline(self.id(), "body")?;

        let mut mapped = Map::with_capacity(source.len());
        for (position, (key, value)) in source.into_iter().enumerate() {
            let scoped = options
                .context
                .with_input(value)
                .with_binding("key", json!(key));
            let result = options
                .run_branch(body, scoped, "map", position as u32)
                .await?;
            mapped.insert(key, result);
        }
        Ok(Value::Object(mapped))
    }
}
