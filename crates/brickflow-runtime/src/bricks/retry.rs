//! Bounded retry around a pipeline.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use brickflow_types::{BrickError, Result};

use crate::backoff::{run_with_retry, BackoffPolicy};
use crate::brick::{Brick, ResolvedArgs};
use crate::options::BrickOptions;

/// Runs the body pipeline up to `attempts` times, with a jittered delay
/// before each retry.
///
/// Each attempt extends the branch path with key `attempt` and the attempt
/// index, so every attempt is individually traceable. Only recoverable errors
/// are retried; an optional `matches` substring narrows the predicate
/// further. Cancellation is never retried, and once attempts are exhausted
/// the last error is re-raised.
pub struct RetryBrick;

#[async_trait]
impl Brick for RetryBrick {
    fn id(&self) -> &str {
        "retry"
    }

    fn name(&self) -> &str {
        "Bounded Retry"
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "required": ["body"],
            "properties": {
                "body": {"description": "Pipeline to attempt"},
                "attempts": {"type": "integer"},
                "delayMs": {"type": "integer"},
                "matches": {"type": "string"}
            }
        })
    }

    async fn run(&self, args: &ResolvedArgs, options: &BrickOptions<'_>) -> Result<Value> {
        let body = args.require_pipeline(self.id(), "body")?;
        let attempts = args.u64("attempts").unwrap_or(3);
        if attempts == 0 {
            return Err(BrickError::InputValidation {
                brick: self.id().to_string(),
                property: "attempts".to_string(),
                message: "must be at least 1".to_string(),
            });
        }

        let policy = match args.u64("delayMs") {
            Some(0) => BackoffPolicy::None,
            Some(ms) => BackoffPolicy::Fixed(Duration::from_millis(ms)),
            None => BackoffPolicy::default(),
        };
        let matches = args.str("matches").map(str::to_owned);

        run_with_retry(
            |attempt| {
                options.run_branch(body, options.context.clone(), "attempt", attempt as u32)
            },
            attempts as usize,
            &policy,
            |error| {
                error.is_recoverable()
                    && matches
                        .as_deref()
                        .map_or(true, |needle| error.to_string().contains(needle))
            },
            &options.cancel,
            self.id(),
        )
        .await
    }
}
