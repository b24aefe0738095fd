//! Per-invocation surface handed to every brick.
//!
//! `BrickOptions` carries everything a brick may touch at run time: the
//! current context, the branch path identifying its position in the pipeline
//! tree, the shared cancellation signal, the inherited root anchor, and a
//! bound `run_branch` callback through which control-flow bricks recurse
//! into the executor.

use std::sync::atomic::AtomicU64;
use std::sync::Arc;

use serde_json::Value;
use tokio_util::sync::CancellationToken;

use brickflow_types::{BrickError, ExecutionContext, Pipeline, Result, RunOptions};

use crate::branch::BranchPath;
use crate::cache::InvocationCache;
use crate::engine::PipelineExecutor;

pub struct BrickOptions<'a> {
    pub(crate) executor: &'a PipelineExecutor,
    pub(crate) run: &'a RunOptions,
    /// Step budget shared across the whole run, including nested pipelines.
    pub(crate) steps_taken: Arc<AtomicU64>,
    /// Context the step's arguments were resolved against.
    pub context: &'a ExecutionContext,
    /// Branch path of the step itself; nested runs extend it.
    pub branch: BranchPath,
    /// Shared abort signal. Bricks must observe it at their own suspension
    /// points.
    pub cancel: CancellationToken,
    /// The scoping anchor inherited for root-relative behavior.
    pub root: Option<Value>,
    /// Stable trace identity of the step, when configured.
    pub instance_id: Option<String>,
}

impl BrickOptions<'_> {
    pub fn run_options(&self) -> &RunOptions {
        self.run
    }

    pub fn cache(&self) -> &InvocationCache {
        self.executor.cache()
    }

    /// Look up a pipeline registered under a stable name.
    pub fn named_pipeline(&self, id: &str) -> Option<&Pipeline> {
        self.executor.named_pipeline(id)
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Fail fast when the abort signal has fired.
    pub fn check_cancelled(&self) -> Result<()> {
        if self.cancel.is_cancelled() {
            Err(BrickError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Run a nested pipeline under this step, extending the branch path with
    /// `{key, counter}` so the nested run is independently traceable.
    ///
    /// The nested run inherits the cancellation signal, run options, root
    /// anchor, and step budget of the current invocation.
    pub async fn run_branch(
        &self,
        pipeline: &Pipeline,
        context: ExecutionContext,
        key: &str,
        counter: u32,
    ) -> Result<Value> {
        self.executor
            .run_scoped(
                pipeline,
                context,
                self.run,
                self.cancel.clone(),
                self.branch.extend(key, counter),
                self.root.clone(),
                self.steps_taken.clone(),
            )
            .await
    }
}
