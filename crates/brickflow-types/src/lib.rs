//! Shared types for the brickflow pipeline runtime.
//!
//! This crate provides the data model used across the runtime and CLI crates:
//! - `BrickError` — unified error taxonomy with recoverability classification
//! - `ExecutionContext` — copy-on-extend snapshot of pipeline state
//! - `Expression` / `BrickConfig` / `Pipeline` — declarative pipeline definitions
//! - `RunOptions` — per-run configuration

pub mod context;
pub mod definition;
pub mod error;

pub use context::{valid_output_key, ExecutionContext, VariableSyncPolicy};
pub use definition::{
    ApiVersion, BrickConfig, Expression, Pipeline, RootMode, RunOptions,
};
pub use error::{BrickError, Result};
