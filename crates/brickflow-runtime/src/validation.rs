//! Static pipeline validation.
//!
//! Walks a pipeline definition, including every nested pipeline expression,
//! and collects diagnostics before execution starts. Errors are problems the
//! engine would fail on at run time anyway (unknown brick ids, reserved
//! output keys); warnings and infos flag suspicious but legal definitions.

use std::collections::HashSet;

use brickflow_types::{valid_output_key, BrickError, Expression, Pipeline, Result};

use crate::brick::BrickRegistry;

// ---------------------------------------------------------------------------
// Diagnostics
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Info,
    Warning,
    Error,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Info => write!(f, "info"),
            Severity::Warning => write!(f, "warning"),
            Severity::Error => write!(f, "error"),
        }
    }
}

/// One finding produced by [`validate`].
#[derive(Debug, Clone)]
pub struct Diagnostic {
    /// Stable rule identifier, e.g. `unknown-brick`.
    pub rule: &'static str,
    pub severity: Severity,
    pub message: String,
    /// Dotted position of the offending step, e.g. `2.if.0`.
    pub step_id: String,
}

impl Diagnostic {
    fn new(rule: &'static str, severity: Severity, step_id: &str, message: String) -> Self {
        Self {
            rule,
            severity,
            message,
            step_id: step_id.to_string(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

// ---------------------------------------------------------------------------
// Validation walk
// ---------------------------------------------------------------------------

/// Validate a pipeline definition against a registry. Returns all findings;
/// an empty vector means the definition is clean.
pub fn validate(pipeline: &Pipeline, registry: &BrickRegistry) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();
    walk(pipeline, registry, "", &mut diagnostics);
    diagnostics
}

/// Validate and fail on the first error-severity finding.
///
/// Non-error findings are returned for the caller to surface.
pub fn validate_or_raise(pipeline: &Pipeline, registry: &BrickRegistry) -> Result<Vec<Diagnostic>> {
    let diagnostics = validate(pipeline, registry);
    if let Some(error) = diagnostics.iter().find(|d| d.is_error()) {
        return Err(BrickError::Configuration(format!(
            "step {}: {}",
            error.step_id, error.message
        )));
    }
    Ok(diagnostics)
}

fn walk(pipeline: &Pipeline, registry: &BrickRegistry, prefix: &str, out: &mut Vec<Diagnostic>) {
    let mut seen_keys: HashSet<&str> = HashSet::new();

    for (index, step) in pipeline.steps.iter().enumerate() {
        let position = if prefix.is_empty() {
            index.to_string()
        } else {
            format!("{prefix}.{index}")
        };

        if !registry.has(&step.id) {
            out.push(Diagnostic::new(
                "unknown-brick",
                Severity::Error,
                &position,
                format!("unknown brick id '{}'", step.id),
            ));
        }

        if let Some(key) = &step.output_key {
            if !valid_output_key(key) {
                out.push(Diagnostic::new(
                    "invalid-output-key",
                    Severity::Error,
                    &position,
                    format!("invalid or reserved output key '{key}'"),
                ));
            } else if !seen_keys.insert(key.as_str()) {
                out.push(Diagnostic::new(
                    "duplicate-output-key",
                    Severity::Warning,
                    &position,
                    format!("output key '{key}' shadows an earlier step in this pipeline"),
                ));
            }
        }

        if matches!(step.if_condition, Some(Expression::Pipeline(_))) {
            out.push(Diagnostic::new(
                "pipeline-step-condition",
                Severity::Error,
                &position,
                format!("step '{}': step condition cannot be a pipeline", step.id),
            ));
        }

        if step.id == "memo" {
            if let Some(Expression::Pipeline(body)) = step.config.get("body") {
                let impure = body.steps.iter().find(|inner| {
                    registry.get(&inner.id).is_some_and(|brick| !brick.is_pure())
                });
                if let Some(inner) = impure {
                    out.push(Diagnostic::new(
                        "memo-impure-body",
                        Severity::Info,
                        &position,
                        format!(
                            "memoized body contains impure brick '{}'; cached results may go stale",
                            inner.id
                        ),
                    ));
                }
            }
        }

        for (name, expression) in &step.config {
            if let Expression::Pipeline(nested) = expression {
                let nested_position = format!("{position}.{name}");
                if nested.is_empty() {
                    out.push(Diagnostic::new(
                        "empty-pipeline",
                        Severity::Info,
                        &nested_position,
                        format!("pipeline argument '{name}' is empty and will yield null"),
                    ));
                }
                walk(nested, registry, &nested_position, out);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::brick::default_registry;
    use brickflow_types::BrickConfig;
    use serde_json::json;

    #[test]
    fn clean_pipeline_has_no_diagnostics() {
        let pipeline = Pipeline::new(vec![
            BrickConfig::bare("echo").with_output_key("a"),
            BrickConfig::bare("identity")
                .with_arg("value", Expression::Var("@a".into()))
                .with_output_key("b"),
        ]);
        assert!(validate(&pipeline, &default_registry()).is_empty());
    }

    #[test]
    fn unknown_brick_is_an_error() {
        let pipeline = Pipeline::new(vec![BrickConfig::bare("does.not.exist")]);
        let diagnostics = validate(&pipeline, &default_registry());
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].rule, "unknown-brick");
        assert!(diagnostics[0].is_error());
        assert_eq!(diagnostics[0].step_id, "0");

        assert!(validate_or_raise(&pipeline, &default_registry()).is_err());
    }

    #[test]
    fn reserved_output_key_is_an_error() {
        let pipeline =
            Pipeline::new(vec![BrickConfig::bare("echo").with_output_key("input")]);
        let diagnostics = validate(&pipeline, &default_registry());
        assert!(diagnostics.iter().any(|d| d.rule == "invalid-output-key"));
    }

    #[test]
    fn duplicate_output_key_is_a_warning_not_an_error() {
        let pipeline = Pipeline::new(vec![
            BrickConfig::bare("echo").with_output_key("x"),
            BrickConfig::bare("echo").with_output_key("x"),
        ]);
        let diagnostics = validate_or_raise(&pipeline, &default_registry()).unwrap();
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].rule, "duplicate-output-key");
        assert_eq!(diagnostics[0].severity, Severity::Warning);
        assert_eq!(diagnostics[0].step_id, "1");
    }

    #[test]
    fn nested_pipelines_are_walked() {
        let nested = Pipeline::new(vec![BrickConfig::bare("ghost")]);
        let pipeline = Pipeline::new(vec![BrickConfig::bare("if")
            .with_arg("condition", Expression::literal(json!(true)))
            .with_arg("if", Expression::Pipeline(nested))]);
        let diagnostics = validate(&pipeline, &default_registry());
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].rule, "unknown-brick");
        assert_eq!(diagnostics[0].step_id, "0.if.0");
    }

    #[test]
    fn empty_nested_pipeline_is_informational() {
        let pipeline = Pipeline::new(vec![BrickConfig::bare("if")
            .with_arg("condition", Expression::literal(json!(true)))
            .with_arg("if", Expression::Pipeline(Pipeline::default()))]);
        let diagnostics = validate_or_raise(&pipeline, &default_registry()).unwrap();
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].rule, "empty-pipeline");
        assert_eq!(diagnostics[0].severity, Severity::Info);
    }

    #[test]
    fn memoized_impure_body_is_informational() {
        let body = Pipeline::new(vec![BrickConfig::bare("echo")]);
        let pipeline = Pipeline::new(vec![
            BrickConfig::bare("memo").with_arg("body", Expression::Pipeline(body))
        ]);
        let diagnostics = validate_or_raise(&pipeline, &default_registry()).unwrap();
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].rule, "memo-impure-body");
        assert_eq!(diagnostics[0].severity, Severity::Info);
    }

    #[test]
    fn memoized_pure_body_is_clean() {
        let body = Pipeline::new(vec![
            BrickConfig::bare("identity").with_arg("value", Expression::literal(json!(1)))
        ]);
        let pipeline = Pipeline::new(vec![
            BrickConfig::bare("memo").with_arg("body", Expression::Pipeline(body))
        ]);
        assert!(validate(&pipeline, &default_registry()).is_empty());
    }

    #[test]
    fn pipeline_valued_step_condition_is_an_error() {
        let mut step = BrickConfig::bare("echo");
        step.if_condition = Some(Expression::Pipeline(Pipeline::default()));
        let pipeline = Pipeline::new(vec![step]);
        let err = validate_or_raise(&pipeline, &default_registry()).unwrap_err();
        assert!(matches!(err, BrickError::Configuration(_)));
    }
}
