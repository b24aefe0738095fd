//! Expression resolution: turning configured expressions into concrete
//! argument values against the current execution context.
//!
//! Resolution is pure: the same `(expression, context)` pair always produces
//! the same value, with no side effects. Pipeline expressions are never
//! substituted; they are routed aside so control-flow bricks can run them.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;

use brickflow_types::{ExecutionContext, Expression, Pipeline};

use crate::brick::ResolvedArgs;

/// The result of resolving a single expression: either a concrete value or a
/// pipeline left unresolved for a control-flow brick to run.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolved {
    Value(Value),
    Pipeline(Pipeline),
}

/// Resolve one expression against a context.
///
/// Literals are returned unchanged; templates are substituted; variable
/// references return the looked-up value directly (missing paths resolve to
/// null, never an error); pipeline expressions come back unresolved.
pub fn resolve(expression: &Expression, context: &ExecutionContext) -> Resolved {
    match expression {
        Expression::Literal(v) => Resolved::Value(v.clone()),
        Expression::Template(t) => Resolved::Value(Value::String(render_template(t, context))),
        Expression::Var(path) => {
            Resolved::Value(context.lookup(path).unwrap_or(Value::Null))
        }
        Expression::Pipeline(p) => Resolved::Pipeline(p.clone()),
    }
}

/// Resolve a step's full config map into evaluated arguments.
///
/// Value-producing expressions land in `values`; pipeline expressions land in
/// `pipelines`, keyed by argument name.
pub fn resolve_config(
    config: &BTreeMap<String, Expression>,
    context: &ExecutionContext,
) -> ResolvedArgs {
    let mut args = ResolvedArgs::default();
    for (name, expression) in config {
        match resolve(expression, context) {
            Resolved::Value(v) => {
                args.values.insert(name.clone(), v);
            }
            Resolved::Pipeline(p) => {
                args.pipelines.insert(name.clone(), p);
            }
        }
    }
    args
}

fn template_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\{\{\s*([@A-Za-z0-9_.]+)\s*\}\}").expect("valid regex"))
}

/// Substitute `{{ dotted.path }}` references in a template string.
///
/// Missing paths render as the empty string. Non-string values render via
/// their JSON representation (strings unquoted).
pub fn render_template(template: &str, context: &ExecutionContext) -> String {
    template_pattern()
        .replace_all(template, |caps: &regex::Captures<'_>| {
            match context.lookup(&caps[1]) {
                None | Some(Value::Null) => String::new(),
                Some(Value::String(s)) => s,
                Some(other) => other.to_string(),
            }
        })
        .into_owned()
}

/// The single truthiness rule shared by every conditional in the runtime:
/// null, false, zero, the empty string, and empty collections are falsy.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ctx() -> ExecutionContext {
        ExecutionContext::new(
            json!({"name": "pixie", "count": 3, "flag": true}),
            json!({"env": "prod"}),
        )
    }

    #[test]
    fn literal_resolves_to_itself() {
        let expr = Expression::Literal(json!({"a": [1, 2]}));
        assert_eq!(resolve(&expr, &ctx()), Resolved::Value(json!({"a": [1, 2]})));
    }

    #[test]
    fn var_returns_raw_value_not_stringified() {
        let expr = Expression::Var("@input.count".into());
        assert_eq!(resolve(&expr, &ctx()), Resolved::Value(json!(3)));

        let expr = Expression::Var("@input.flag".into());
        assert_eq!(resolve(&expr, &ctx()), Resolved::Value(json!(true)));
    }

    #[test]
    fn var_missing_path_resolves_to_null() {
        let expr = Expression::Var("@input.absent.deeper".into());
        assert_eq!(resolve(&expr, &ctx()), Resolved::Value(Value::Null));
    }

    #[test]
    fn template_substitutes_dotted_paths() {
        let expr = Expression::Template("{{name}} has {{ @input.count }} items".into());
        assert_eq!(
            resolve(&expr, &ctx()),
            Resolved::Value(json!("pixie has 3 items"))
        );
    }

    #[test]
    fn template_missing_path_renders_empty() {
        let expr = Expression::Template("[{{missing}}]".into());
        assert_eq!(resolve(&expr, &ctx()), Resolved::Value(json!("[]")));
    }

    #[test]
    fn template_options_namespace() {
        let expr = Expression::Template("env={{@options.env}}".into());
        assert_eq!(resolve(&expr, &ctx()), Resolved::Value(json!("env=prod")));
    }

    #[test]
    fn pipeline_expression_comes_back_unresolved() {
        let pipeline = Pipeline::new(vec![brickflow_types::BrickConfig::bare("echo")]);
        let expr = Expression::Pipeline(pipeline.clone());
        assert_eq!(resolve(&expr, &ctx()), Resolved::Pipeline(pipeline));
    }

    #[test]
    fn resolution_is_idempotent() {
        let context = ctx();
        let exprs = [
            Expression::Literal(json!([1, "two"])),
            Expression::Template("{{name}}-{{count}}".into()),
            Expression::Var("@options.env".into()),
        ];
        for expr in &exprs {
            let first = resolve(expr, &context);
            let second = resolve(expr, &context);
            let third = resolve(expr, &context);
            assert_eq!(first, second);
            assert_eq!(second, third);
        }
    }

    #[test]
    fn resolve_config_splits_values_from_pipelines() {
        let mut config = BTreeMap::new();
        config.insert("url".to_string(), Expression::Template("{{name}}".into()));
        config.insert(
            "body".to_string(),
            Expression::Pipeline(Pipeline::new(vec![brickflow_types::BrickConfig::bare(
                "echo",
            )])),
        );
        config.insert("limit".to_string(), Expression::Literal(json!(10)));

        let args = resolve_config(&config, &ctx());
        assert_eq!(args.values.get("url"), Some(&json!("pixie")));
        assert_eq!(args.values.get("limit"), Some(&json!(10)));
        assert!(args.values.get("body").is_none());
        assert_eq!(args.pipelines.get("body").map(Pipeline::len), Some(1));
    }

    #[test]
    fn truthiness_rule() {
        assert!(!is_truthy(&json!(null)));
        assert!(!is_truthy(&json!(false)));
        assert!(!is_truthy(&json!(0)));
        assert!(!is_truthy(&json!(0.0)));
        assert!(!is_truthy(&json!("")));
        assert!(!is_truthy(&json!([])));
        assert!(!is_truthy(&json!({})));

        assert!(is_truthy(&json!(true)));
        assert!(is_truthy(&json!(1)));
        assert!(is_truthy(&json!(-0.5)));
        assert!(is_truthy(&json!("no")));
        assert!(is_truthy(&json!([0])));
        assert!(is_truthy(&json!({"k": null})));
    }
}
