//! Pipeline executor — the core step loop.
//!
//! Executes an ordered list of brick invocations against an execution
//! context: resolves each step's arguments, validates them against the
//! brick's input schema, invokes the brick, and binds the result under the
//! step's output key for subsequent steps. Control-flow bricks recurse back
//! into the executor through [`BrickOptions::run_branch`].
//!
//! Each step is a single suspension point: the loop does not proceed to step
//! `i + 1` until step `i` settles. The executor performs no implicit
//! recovery; a step's error aborts the remainder of the pipeline unless an
//! enclosing try/except brick catches it.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use brickflow_types::{
    valid_output_key, BrickConfig, BrickError, ExecutionContext, Pipeline, Result, RootMode,
    RunOptions,
};

use crate::branch::BranchPath;
use crate::brick::{default_registry, BrickRegistry};
use crate::cache::InvocationCache;
use crate::expression::{is_truthy, resolve, resolve_config, Resolved};
use crate::options::BrickOptions;
use crate::schema::validate_args;
use crate::trace::{TraceEmitter, TraceEvent};
use crate::validation::validate_or_raise;

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// The core pipeline executor. Owns the brick registry, the named-pipeline
/// library, the trace emitter, and the memoizing invocation cache.
pub struct PipelineExecutor {
    registry: BrickRegistry,
    pipelines: HashMap<String, Pipeline>,
    trace: TraceEmitter,
    cache: Arc<InvocationCache>,
}

/// Transient per-step state threaded through one pipeline run.
struct IntermediateState {
    context: ExecutionContext,
    is_last: bool,
    root: Option<Value>,
}

// ---------------------------------------------------------------------------
// PipelineExecutor
// ---------------------------------------------------------------------------

impl PipelineExecutor {
    /// Create an executor with the given brick registry.
    pub fn new(registry: BrickRegistry) -> Self {
        Self {
            registry,
            pipelines: HashMap::new(),
            trace: TraceEmitter::default(),
            cache: Arc::new(InvocationCache::default()),
        }
    }

    /// Create an executor pre-loaded with the default built-in bricks.
    pub fn with_default_registry() -> Self {
        Self::new(default_registry())
    }

    /// Replace the memoizing cache (e.g. to share one across executors or
    /// configure its retention period).
    pub fn with_cache(mut self, cache: Arc<InvocationCache>) -> Self {
        self.cache = cache;
        self
    }

    pub fn registry(&self) -> &BrickRegistry {
        &self.registry
    }

    pub fn cache(&self) -> &InvocationCache {
        &self.cache
    }

    pub fn trace(&self) -> &TraceEmitter {
        &self.trace
    }

    /// Register a pipeline under a stable name for sub-pipeline invocation.
    pub fn register_pipeline(&mut self, name: impl Into<String>, pipeline: Pipeline) {
        self.pipelines.insert(name.into(), pipeline);
    }

    pub fn named_pipeline(&self, id: &str) -> Option<&Pipeline> {
        self.pipelines.get(id)
    }

    /// Run a top-level pipeline: validate, execute, and emit pipeline-level
    /// trace events.
    pub async fn run(
        &self,
        pipeline: &Pipeline,
        context: ExecutionContext,
        run: &RunOptions,
        cancel: CancellationToken,
    ) -> Result<Value> {
        let diagnostics = validate_or_raise(pipeline, &self.registry)?;
        for diag in &diagnostics {
            tracing::warn!(rule = diag.rule, step = %diag.step_id, "{}", diag.message);
        }

        let run_id = run.run_id.to_string();
        let started = Instant::now();
        self.trace.emit(TraceEvent::PipelineStarted {
            run_id: run_id.clone(),
            component_id: run.component_id.clone(),
            step_count: pipeline.len(),
        });

        let steps_taken = Arc::new(AtomicU64::new(0));
        let result = self
            .run_scoped(
                pipeline,
                context,
                run,
                cancel,
                BranchPath::root(),
                None,
                steps_taken,
            )
            .await;

        match &result {
            Ok(_) => self.trace.emit(TraceEvent::PipelineCompleted {
                run_id,
                component_id: run.component_id.clone(),
                duration_ms: started.elapsed().as_millis() as u64,
            }),
            Err(error) => self.trace.emit(TraceEvent::PipelineFailed {
                run_id,
                component_id: run.component_id.clone(),
                error: error.to_string(),
            }),
        }
        result
    }

    /// Execute one (possibly nested) pipeline under an existing branch path.
    ///
    /// This is the recursion surface used by control-flow bricks via
    /// [`BrickOptions::run_branch`].
    pub(crate) async fn run_scoped(
        &self,
        pipeline: &Pipeline,
        context: ExecutionContext,
        run: &RunOptions,
        cancel: CancellationToken,
        branch: BranchPath,
        root: Option<Value>,
        steps_taken: Arc<AtomicU64>,
    ) -> Result<Value> {
        let total = pipeline.len();
        let mut state = IntermediateState {
            context,
            is_last: false,
            root,
        };
        let mut result = Value::Null;

        for (index, step) in pipeline.steps.iter().enumerate() {
            if cancel.is_cancelled() {
                return Err(BrickError::Cancelled);
            }
            state.is_last = index + 1 == total;

            let taken = steps_taken.fetch_add(1, Ordering::Relaxed) + 1;
            if taken > run.max_steps {
                return Err(BrickError::StepLimitReached {
                    steps: run.max_steps,
                });
            }

            // Step-level gate: a falsy condition skips the step entirely.
            // A skipped step binds nothing and a skipped last step yields null.
            if let Some(condition) = &step.if_condition {
                let value = match resolve(condition, &state.context) {
                    Resolved::Value(v) => v,
                    Resolved::Pipeline(_) => {
                        return Err(BrickError::Configuration(format!(
                            "step '{}': step condition cannot be a pipeline",
                            step.id
                        )))
                    }
                };
                if !is_truthy(&value) {
                    tracing::debug!(brick = %step.id, index, "Step condition is falsy, skipping");
                    self.trace.emit(TraceEvent::BrickSkipped {
                        run_id: run.run_id.to_string(),
                        instance_id: step.instance_id.clone(),
                        branch: branch.to_string(),
                        brick_id: step.id.clone(),
                    });
                    continue;
                }
            }

            let output = self
                .run_step(step, &state, run, &cancel, &branch, &steps_taken)
                .await?;

            if let Some(key) = &step.output_key {
                if !valid_output_key(key) {
                    return Err(BrickError::Configuration(format!(
                        "step '{}': invalid or reserved output key '{key}'",
                        step.id
                    )));
                }
                state.context = state.context.with_binding(key.clone(), output.clone());
            }
            if !run.api_version.explicit_data_flow() && !state.is_last {
                // Implicit data flow: the raw output becomes the next step's
                // @input.
                state.context = state.context.with_input(output.clone());
            }
            if state.is_last {
                result = output;
            }
        }

        Ok(result)
    }

    async fn run_step(
        &self,
        step: &BrickConfig,
        state: &IntermediateState,
        run: &RunOptions,
        cancel: &CancellationToken,
        branch: &BranchPath,
        steps_taken: &Arc<AtomicU64>,
    ) -> Result<Value> {
        let brick = self.registry.lookup(&step.id)?;

        let args = resolve_config(&step.config, &state.context);
        if !brick.tolerates_partial_input() {
            validate_args(&step.id, &brick.input_schema(), &args)?;
        }

        let root = match step.root_mode {
            RootMode::Inherit => state.root.clone(),
            RootMode::Document => None,
        };
        if brick.is_root_aware() && root.is_none() {
            tracing::debug!(brick = %step.id, "Root-aware brick has no root anchor");
        }

        // Evaluated arguments for trace records, gated with output values.
        let traced_args = run
            .trace_values
            .then(|| Value::Object(args.values.clone()));

        self.trace.emit(TraceEvent::BrickStarted {
            run_id: run.run_id.to_string(),
            instance_id: step.instance_id.clone(),
            branch: branch.to_string(),
            brick_id: step.id.clone(),
        });

        let options = BrickOptions {
            executor: self,
            run,
            steps_taken: steps_taken.clone(),
            context: &state.context,
            branch: branch.clone(),
            cancel: cancel.clone(),
            root,
            instance_id: step.instance_id.clone(),
        };

        let span = tracing::info_span!("brick", id = %step.id, branch = %branch);
        let started = Instant::now();
        let result = brick.run(&args, &options).instrument(span).await;

        match result {
            Ok(output) => {
                self.trace.emit(TraceEvent::BrickCompleted {
                    run_id: run.run_id.to_string(),
                    instance_id: step.instance_id.clone(),
                    branch: branch.to_string(),
                    brick_id: step.id.clone(),
                    args: traced_args,
                    output: run.trace_values.then(|| output.clone()),
                    duration_ms: started.elapsed().as_millis() as u64,
                });
                Ok(output)
            }
            Err(error) => {
                tracing::warn!(brick = %step.id, branch = %branch, error = %error, "Brick failed");
                self.trace.emit(TraceEvent::BrickFailed {
                    run_id: run.run_id.to_string(),
                    instance_id: step.instance_id.clone(),
                    branch: branch.to_string(),
                    brick_id: step.id.clone(),
                    args: traced_args,
                    error: error.to_string(),
                });
                Err(error)
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
