//! Built-in bricks: the control-flow family plus the leaf bricks the CLI and
//! tests exercise the runtime with.
//!
//! Control-flow bricks receive their branch bodies as pipeline-valued
//! arguments and recurse into the executor through
//! [`BrickOptions::run_branch`](crate::options::BrickOptions::run_branch).
//! Each uses a fixed branch key and a deterministic counter, so identical
//! runs always produce identical branch paths.

mod builtin;
mod conditional;
mod for_each;
mod map_values;
mod memo;
mod retry;
mod sub_pipeline;
mod try_except;

pub use builtin::{ContextGetBrick, EchoBrick, IdentityBrick, ThrowBrick};
pub use conditional::IfBrick;
pub use for_each::ForEachBrick;
pub use map_values::MapValuesBrick;
pub use memo::MemoBrick;
pub use retry::RetryBrick;
pub use sub_pipeline::SubPipelineBrick;
pub use try_except::TryExceptBrick;

#[cfg(test)]
pub(crate) mod testing {
    use serde_json::{json, Value};
    use tokio_util::sync::CancellationToken;

    use brickflow_types::{ExecutionContext, Pipeline, Result, RunOptions};

    use crate::engine::PipelineExecutor;

    /// Run a pipeline against a fresh default executor.
    pub async fn run(pipeline: Pipeline, input: Value) -> Result<Value> {
        run_with(PipelineExecutor::with_default_registry(), pipeline, input).await
    }

    pub async fn run_with(
        executor: PipelineExecutor,
        pipeline: Pipeline,
        input: Value,
    ) -> Result<Value> {
        executor
            .run(
                &pipeline,
                ExecutionContext::new(input, json!({})),
                &RunOptions::default(),
                CancellationToken::new(),
            )
            .await
    }
}
