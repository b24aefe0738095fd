//! Declarative pipeline definitions: expressions, step configs, pipelines,
//! and per-run options.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;

// ---------------------------------------------------------------------------
// Expression
// ---------------------------------------------------------------------------

/// A tagged value distinguishing literal data from deferred evaluation forms.
///
/// On the wire, deferred forms are objects shaped `{"kind": ..., "value": ...}`;
/// anything else deserializes as a literal and round-trips untouched. An
/// expression is opaque to the executor until resolved.
#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    /// Plain data, returned unchanged by resolution.
    Literal(Value),
    /// A template string with `{{ dotted.path }}` substitutions.
    Template(String),
    /// A variable reference returning the looked-up value directly.
    Var(String),
    /// A nested pipeline. Only resolved by being run, never by substitution.
    Pipeline(Pipeline),
}

impl Expression {
    /// Interpret a JSON value as an expression.
    pub fn from_value(value: Value) -> Result<Self, String> {
        if let Value::Object(map) = &value {
            if map.len() == 2 {
                if let (Some(Value::String(kind)), Some(inner)) =
                    (map.get("kind"), map.get("value"))
                {
                    match kind.as_str() {
                        "template" => {
                            let s = inner
                                .as_str()
                                .ok_or("template expression value must be a string")?;
                            return Ok(Expression::Template(s.to_string()));
                        }
                        "var" => {
                            let s = inner
                                .as_str()
                                .ok_or("var expression value must be a string")?;
                            return Ok(Expression::Var(s.to_string()));
                        }
                        "pipeline" => {
                            let pipeline: Pipeline = serde_json::from_value(inner.clone())
                                .map_err(|e| format!("invalid pipeline expression: {e}"))?;
                            return Ok(Expression::Pipeline(pipeline));
                        }
                        "literal" => return Ok(Expression::Literal(inner.clone())),
                        _ => {}
                    }
                }
            }
        }
        Ok(Expression::Literal(value))
    }

    /// Shorthand for a literal expression.
    pub fn literal(value: Value) -> Self {
        Expression::Literal(value)
    }
}

impl Serialize for Expression {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Expression::Literal(v) => v.serialize(serializer),
            Expression::Template(t) => {
                json!({"kind": "template", "value": t}).serialize(serializer)
            }
            Expression::Var(p) => json!({"kind": "var", "value": p}).serialize(serializer),
            Expression::Pipeline(p) => {
                json!({"kind": "pipeline", "value": p}).serialize(serializer)
            }
        }
    }
}

impl<'de> Deserialize<'de> for Expression {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Expression::from_value(value).map_err(serde::de::Error::custom)
    }
}

// ---------------------------------------------------------------------------
// BrickConfig and Pipeline
// ---------------------------------------------------------------------------

/// Root-selection mode for a pipeline step.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RootMode {
    /// Inherit the root threaded through the surrounding pipeline.
    #[default]
    Inherit,
    /// Reset to the document root.
    Document,
}

/// One pipeline step: a brick id plus its configured arguments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BrickConfig {
    pub id: String,

    /// Argument name to expression. Ordered for deterministic traversal.
    #[serde(default)]
    pub config: BTreeMap<String, Expression>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,

    /// Identifier under which the step's result is bound for later steps.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_key: Option<String>,

    /// Stable identity used for trace correlation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance_id: Option<String>,

    #[serde(default, skip_serializing_if = "is_default_root")]
    pub root_mode: RootMode,

    /// Step-level gate: a falsy condition skips the step entirely.
    #[serde(default, rename = "if", skip_serializing_if = "Option::is_none")]
    pub if_condition: Option<Expression>,
}

fn is_default_root(mode: &RootMode) -> bool {
    *mode == RootMode::Inherit
}

impl BrickConfig {
    /// A step with just an id and no configuration.
    pub fn bare(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            config: BTreeMap::new(),
            label: None,
            output_key: None,
            instance_id: None,
            root_mode: RootMode::Inherit,
            if_condition: None,
        }
    }

    pub fn with_arg(mut self, name: impl Into<String>, expr: Expression) -> Self {
        self.config.insert(name.into(), expr);
        self
    }

    pub fn with_output_key(mut self, key: impl Into<String>) -> Self {
        self.output_key = Some(key.into());
        self
    }

    pub fn with_if(mut self, condition: Expression) -> Self {
        self.if_condition = Some(condition);
        self
    }
}

/// An ordered sequence of brick invocations. May be empty, in which case it
/// executes to `Value::Null`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Pipeline {
    pub steps: Vec<BrickConfig>,
}

impl Pipeline {
    pub fn new(steps: Vec<BrickConfig>) -> Self {
        Self { steps }
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }
}

// ---------------------------------------------------------------------------
// RunOptions
// ---------------------------------------------------------------------------

/// Runtime API version. Gates whether implicit data flow is enabled: under
/// `V1`/`V2` each step's raw output becomes the next step's `@input`; under
/// `V3` data flows only through explicit output keys.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApiVersion {
    V1,
    V2,
    #[default]
    V3,
}

impl ApiVersion {
    pub fn explicit_data_flow(&self) -> bool {
        matches!(self, ApiVersion::V3)
    }
}

/// Per-run configuration for a pipeline invocation.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub api_version: ApiVersion,
    /// Whether trace events include step output values.
    pub trace_values: bool,
    /// Correlation id for the run.
    pub run_id: uuid::Uuid,
    /// Owning mod-component identity; `None` for preview/dry-run executions.
    pub component_id: Option<String>,
    /// Upper bound on total step executions, counted across nested pipelines.
    pub max_steps: u64,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            api_version: ApiVersion::V3,
            trace_values: true,
            run_id: uuid::Uuid::new_v4(),
            component_id: None,
            max_steps: 10_000,
        }
    }
}
