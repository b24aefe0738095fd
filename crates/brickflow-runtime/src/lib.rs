//! Brick pipeline execution runtime.
//!
//! This crate implements the core interpreter for declarative brick
//! pipelines: expression resolution against an execution context, the
//! sequential step loop with output-key binding, recursive control-flow
//! bricks (conditional, loop, try/except, retry, memo, sub-pipeline,
//! value-mapping), branch-path tracking for trace correlation, the memoizing
//! invocation cache, and cooperative cancellation.

pub mod backoff;
pub mod branch;
pub mod brick;
pub mod bricks;
pub mod cache;
pub mod engine;
pub mod expression;
pub mod options;
pub mod schema;
pub mod trace;
pub mod validation;

pub use backoff::{run_with_retry, BackoffPolicy};
pub use branch::{BranchEntry, BranchPath};
pub use brick::{default_registry, Brick, BrickRegistry, DynBrick, ResolvedArgs};
pub use cache::InvocationCache;
pub use engine::PipelineExecutor;
pub use expression::{is_truthy, render_template, resolve, resolve_config, Resolved};
pub use options::BrickOptions;
pub use schema::validate_args;
pub use trace::{TraceEmitter, TraceEvent};
pub use validation::{validate, validate_or_raise, Diagnostic, Severity};
