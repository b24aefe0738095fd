//! Leaf bricks used by the CLI and the test suite.
//!
//! These carry no external collaborators; they exist so pipelines can be
//! exercised end to end without DOM or network bricks.

use async_trait::async_trait;
use serde_json::{json, Value};

use brickflow_types::{BrickError, Result};

use crate::brick::{Brick, ResolvedArgs};
use crate::options::BrickOptions;

// ---------------------------------------------------------------------------
// echo
// ---------------------------------------------------------------------------

/// Returns its `message` argument; with no message, echoes the current
/// `@input`.
pub struct EchoBrick;

#[async_trait]
impl Brick for EchoBrick {
    fn id(&self) -> &str {
        "echo"
    }

    fn name(&self) -> &str {
        "Echo"
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "message": {}
            }
        })
    }

    fn tolerates_partial_input(&self) -> bool {
        true
    }

    async fn run(&self, args: &ResolvedArgs, options: &BrickOptions<'_>) -> Result<Value> {
        let value = match args.get("message") {
            Some(message) => message.clone(),
            None => options.context.input().clone(),
        };
        tracing::info!(brick = %self.id(), value = %value, "Echo");
        Ok(value)
    }
}

// ---------------------------------------------------------------------------
// identity
// ---------------------------------------------------------------------------

/// Returns its `value` argument unchanged (null when absent).
pub struct IdentityBrick;

#[async_trait]
impl Brick for IdentityBrick {
    fn id(&self) -> &str {
        "identity"
    }

    fn name(&self) -> &str {
        "Identity"
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "value": {}
            }
        })
    }

    fn tolerates_partial_input(&self) -> bool {
        true
    }

    fn is_pure(&self) -> bool {
        true
    }

    async fn run(&self, args: &ResolvedArgs, _options: &BrickOptions<'_>) -> Result<Value> {
        Ok(args.get("value").cloned().unwrap_or(Value::Null))
    }
}

// ---------------------------------------------------------------------------
// context.get
// ---------------------------------------------------------------------------

/// Reads a dotted path from the execution context; missing paths yield null.
pub struct ContextGetBrick;

#[async_trait]
impl Brick for ContextGetBrick {
    fn id(&self) -> &str {
        "context.get"
    }

    fn name(&self) -> &str {
        "Context Get"
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "required": ["path"],
            "properties": {
                "path": {"type": "string"}
            }
        })
    }

    async fn run(&self, args: &ResolvedArgs, options: &BrickOptions<'_>) -> Result<Value> {
        let path = args.require(self.id(), "path")?;
        let path = path.as_str().ok_or_else(|| BrickError::InputValidation {
            brick: self.id().to_string(),
            property: "path".to_string(),
            message: "expected a string".to_string(),
        })?;
        Ok(options.context.lookup(path).unwrap_or(Value::Null))
    }
}

// ---------------------------------------------------------------------------
// throw
// ---------------------------------------------------------------------------

/// Raises a business error with the configured message.
pub struct ThrowBrick;

#[async_trait]
impl Brick for ThrowBrick {
    fn id(&self) -> &str {
        "throw"
    }

    fn name(&self) -> &str {
        "Throw"
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "message": {"type": "string"}
            }
        })
    }

    fn tolerates_partial_input(&self) -> bool {
        true
    }

    async fn run(&self, args: &ResolvedArgs, _options: &BrickOptions<'_>) -> Result<Value> {
        Err(BrickError::Business {
            brick: self.id().to_string(),
            message: args.str("message").unwrap_or("thrown").to_string(),
        })
    }
}
