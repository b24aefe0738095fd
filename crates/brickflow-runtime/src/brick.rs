//! Brick contract, dynamic dispatch wrapper, and brick registry.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use serde_json::Value;

use brickflow_types::{BrickError, Pipeline, Result};

use crate::options::BrickOptions;

// ---------------------------------------------------------------------------
// ResolvedArgs
// ---------------------------------------------------------------------------

/// A step's evaluated arguments: concrete JSON values plus any
/// pipeline-valued arguments, kept apart so unresolved expressions never
/// leak into a brick's value arguments.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolvedArgs {
    pub values: serde_json::Map<String, Value>,
    pub pipelines: BTreeMap<String, Pipeline>,
}

impl ResolvedArgs {
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    pub fn str(&self, name: &str) -> Option<&str> {
        self.values.get(name).and_then(Value::as_str)
    }

    pub fn u64(&self, name: &str) -> Option<u64> {
        self.values.get(name).and_then(Value::as_u64)
    }

    pub fn pipeline(&self, name: &str) -> Option<&Pipeline> {
        self.pipelines.get(name)
    }

    pub fn has(&self, name: &str) -> bool {
        self.values.contains_key(name) || self.pipelines.contains_key(name)
    }

    /// Required value argument; absence is an input-validation error.
    pub fn require(&self, brick: &str, name: &str) -> Result<&Value> {
        self.values.get(name).ok_or_else(|| BrickError::InputValidation {
            brick: brick.to_string(),
            property: name.to_string(),
            message: "missing required argument".to_string(),
        })
    }

    /// Required pipeline argument; absence is an input-validation error.
    pub fn require_pipeline(&self, brick: &str, name: &str) -> Result<&Pipeline> {
        self.pipelines
            .get(name)
            .ok_or_else(|| BrickError::InputValidation {
                brick: brick.to_string(),
                property: name.to_string(),
                message: "missing required pipeline argument".to_string(),
            })
    }
}

// ---------------------------------------------------------------------------
// Brick trait
// ---------------------------------------------------------------------------

/// A single named operation with a declared input schema.
///
/// Implementations must be safe to invoke once per pipeline step and must not
/// retain state between invocations unless explicitly designed to (the memo
/// brick's cache is the one built-in exception, and that state lives in the
/// executor, not the brick).
#[async_trait]
pub trait Brick: Send + Sync {
    /// Stable identifier used by pipeline configs.
    fn id(&self) -> &str;

    /// Human-readable name.
    fn name(&self) -> &str;

    /// JSON-Schema-shaped description of accepted arguments.
    fn input_schema(&self) -> Value;

    /// When `true`, schema validation is skipped and the brick handles
    /// missing arguments itself.
    fn tolerates_partial_input(&self) -> bool {
        false
    }

    /// Whether the brick's behavior depends on the page-root context.
    fn is_root_aware(&self) -> bool {
        false
    }

    /// Whether the output depends only on the evaluated arguments, making it
    /// safe to cache.
    fn is_pure(&self) -> bool {
        false
    }

    /// Execute the brick with evaluated arguments.
    async fn run(&self, args: &ResolvedArgs, options: &BrickOptions<'_>) -> Result<Value>;
}

// ---------------------------------------------------------------------------
// DynBrick — object-safe wrapper
// ---------------------------------------------------------------------------

pub struct DynBrick(Box<dyn Brick>);

impl std::fmt::Debug for DynBrick {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("DynBrick").field(&self.0.id()).finish()
    }
}

impl DynBrick {
    pub fn new(brick: impl Brick + 'static) -> Self {
        Self(Box::new(brick))
    }

    pub fn id(&self) -> &str {
        self.0.id()
    }

    pub fn input_schema(&self) -> Value {
        self.0.input_schema()
    }

    pub fn tolerates_partial_input(&self) -> bool {
        self.0.tolerates_partial_input()
    }

    pub fn is_root_aware(&self) -> bool {
        self.0.is_root_aware()
    }

    pub fn is_pure(&self) -> bool {
        self.0.is_pure()
    }

    pub async fn run(&self, args: &ResolvedArgs, options: &BrickOptions<'_>) -> Result<Value> {
        self.0.run(args, options).await
    }
}

// ---------------------------------------------------------------------------
// BrickRegistry
// ---------------------------------------------------------------------------

/// Maps stable brick ids to implementations. Resolution failure is a fatal
/// configuration error, never a retry case.
#[derive(Default)]
pub struct BrickRegistry {
    bricks: HashMap<String, DynBrick>,
}

impl BrickRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, brick: impl Brick + 'static) {
        let id = brick.id().to_string();
        self.bricks.insert(id, DynBrick::new(brick));
    }

    pub fn lookup(&self, id: &str) -> Result<&DynBrick> {
        self.bricks
            .get(id)
            .ok_or_else(|| BrickError::UnknownBrick { id: id.to_string() })
    }

    pub fn get(&self, id: &str) -> Option<&DynBrick> {
        self.bricks.get(id)
    }

    pub fn has(&self, id: &str) -> bool {
        self.bricks.contains_key(id)
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.bricks.keys().map(String::as_str)
    }
}

/// Registry pre-loaded with the control-flow bricks and the builtin leaves.
pub fn default_registry() -> BrickRegistry {
    let mut registry = BrickRegistry::new();
    registry.register(crate::bricks::IfBrick);
    registry.register(crate::bricks::ForEachBrick);
    registry.register(crate::bricks::TryExceptBrick);
    registry.register(crate::bricks::RetryBrick);
    registry.register(crate::bricks::MemoBrick);
    registry.register(crate::bricks::SubPipelineBrick);
    registry.register(crate::bricks::MapValuesBrick);
    registry.register(crate::bricks::EchoBrick);
    registry.register(crate::bricks::IdentityBrick);
    registry.register(crate::bricks::ContextGetBrick);
    registry.register(crate::bricks::ThrowBrick);
    registry
}
