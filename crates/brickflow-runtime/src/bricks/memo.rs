//! Memoized pipeline invocation.

use async_trait::async_trait;
use serde_json::{json, Value};

use brickflow_types::Result;

use crate::brick::{Brick, ResolvedArgs};
use crate::cache::InvocationCache;
use crate::options::BrickOptions;

/// Runs the body pipeline at most once per fingerprint of the step's
/// evaluated arguments.
///
/// The fingerprint covers every argument, including the body pipeline
/// itself, so two memo steps with different bodies never share a cache
/// entry; extra value arguments can be added purely as cache
/// discriminators. Concurrent callers with the same fingerprint await the
/// single in-flight execution, and completed results are served from the
/// executor's cache until they expire.
pub struct MemoBrick;

#[async_trait]
impl Brick for MemoBrick {
    fn id(&self) -> &str {
        "memo"
    }

    fn name(&self) -> &str {
        "Memoizing Cache"
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "required": ["body"],
            "properties": {
                "body": {"description": "Pipeline whose result is memoized"}
            }
        })
    }

    fn is_pure(&self) -> bool {
        true
    }

    async fn run(&self, args: &ResolvedArgs, options: &BrickOptions<'_>) -> Result<Value> {
        let body = args.require_pipeline(self.id(), "body")?;
        let fingerprint = InvocationCache::fingerprint(args);

        options
            .cache()
            .get_or_run(fingerprint, &options.cancel, || {
                options.run_branch(body, options.context.clone(), "memo", 0)
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::run_with;
    use crate::brick::{default_registry, Brick, ResolvedArgs};
    use crate::engine::PipelineExecutor;
    use crate::options::BrickOptions;
    use async_trait::async_trait;
    use brickflow_types::{BrickConfig, Expression, Pipeline, Result};
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct CountingBrick {
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Brick for CountingBrick {
        fn id(&self) -> &str {
            "counting"
        }

        fn name(&self) -> &str {
            "Counting"
        }

        fn input_schema(&self) -> Value {
            json!({"type": "object"})
        }

        async fn run(&self, _args: &ResolvedArgs, _options: &BrickOptions<'_>) -> Result<Value> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(json!(n))
        }
    }

    fn counting_executor(calls: Arc<AtomicUsize>) -> PipelineExecutor {
        let mut registry = default_registry();
        registry.register(CountingBrick { calls });
        PipelineExecutor::new(registry)
    }

    fn memo_step(discriminator: Value) -> BrickConfig {
        BrickConfig::bare("memo")
            .with_arg(
                "body",
                Expression::Pipeline(Pipeline::new(vec![BrickConfig::bare("counting")])),
            )
            .with_arg("key", Expression::literal(discriminator))
    }

    #[tokio::test]
    async fn repeated_invocations_reuse_the_first_result() {
        let calls = Arc::new(AtomicUsize::new(0));
        let executor = counting_executor(calls.clone());
        // Three memo steps with identical arguments in one pipeline.
        let pipeline = Pipeline::new(vec![
            memo_step(json!("a")),
            memo_step(json!("a")),
            memo_step(json!("a")),
        ]);
        let result = run_with(executor, pipeline, json!({})).await.unwrap();
        assert_eq!(result, json!(1));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn differing_fingerprints_execute_independently() {
        let calls = Arc::new(AtomicUsize::new(0));
        let executor = counting_executor(calls.clone());
        let pipeline = Pipeline::new(vec![memo_step(json!("a")), memo_step(json!("b"))]);
        let result = run_with(executor, pipeline, json!({})).await.unwrap();
        assert_eq!(result, json!(2));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn errors_are_not_memoized() {
        let pipeline = Pipeline::new(vec![BrickConfig::bare("try")
            .with_arg(
                "try",
                Expression::Pipeline(Pipeline::new(vec![BrickConfig::bare("memo").with_arg(
                    "body",
                    Expression::Pipeline(Pipeline::new(vec![BrickConfig::bare("throw")
                        .with_arg("message", Expression::literal(json!("boom")))])),
                )])),
            )
            .with_arg(
                "except",
                Expression::Pipeline(Pipeline::new(vec![BrickConfig::bare("identity")
                    .with_arg("value", Expression::literal(json!("recovered")))])),
            )]);
        let executor = PipelineExecutor::with_default_registry();
        let result = executor
            .run(
                &pipeline,
                brickflow_types::ExecutionContext::new(json!({}), json!({})),
                &brickflow_types::RunOptions::default(),
                tokio_util::sync::CancellationToken::new(),
            )
            .await
            .unwrap();
        assert_eq!(result, json!("recovered"));
        assert!(executor.cache().is_empty());
    }
}
