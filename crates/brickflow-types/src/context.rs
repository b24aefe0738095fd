//! Execution context: the copy-on-extend snapshot threaded through a pipeline.
//!
//! A context is never mutated in place. Binding a step's output or entering a
//! sub-pipeline with a new `@input` produces a new, extended copy, so
//! concurrent readers never observe a partially updated context.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Synchronization policy declared for the mod-variable namespace.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VariableSyncPolicy {
    #[default]
    None,
    Tab,
    Session,
}

/// Namespaces addressable with a leading `@` in variable paths.
const RESERVED_KEYS: &[&str] = &["input", "options", "mod"];

/// Immutable snapshot of pipeline state.
///
/// Carries `@input` (arguments of the current pipeline invocation),
/// `@options` (static mod configuration), the mod-variable namespace, and the
/// output-key bindings registered by earlier steps.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionContext {
    input: Value,
    options: Value,
    mod_variables: Value,
    sync_policy: VariableSyncPolicy,
    bindings: BTreeMap<String, Value>,
}

impl ExecutionContext {
    /// Create a context with the given `@input` and `@options`.
    pub fn new(input: Value, options: Value) -> Self {
        Self {
            input,
            options,
            mod_variables: Value::Object(serde_json::Map::new()),
            sync_policy: VariableSyncPolicy::None,
            bindings: BTreeMap::new(),
        }
    }

    /// Attach a mod-variable namespace with its synchronization policy.
    pub fn with_mod_variables(mut self, variables: Value, policy: VariableSyncPolicy) -> Self {
        self.mod_variables = variables;
        self.sync_policy = policy;
        self
    }

    pub fn input(&self) -> &Value {
        &self.input
    }

    pub fn options(&self) -> &Value {
        &self.options
    }

    pub fn sync_policy(&self) -> VariableSyncPolicy {
        self.sync_policy
    }

    /// Read a single output-key binding.
    pub fn binding(&self, key: &str) -> Option<&Value> {
        self.bindings.get(key)
    }

    /// Extended copy with `key` bound to `value`. The receiver is unchanged.
    pub fn with_binding(&self, key: impl Into<String>, value: Value) -> Self {
        let mut next = self.clone();
        next.bindings.insert(key.into(), value);
        next
    }

    /// Extended copy with a replaced `@input`. Used when descending into a
    /// sub-pipeline and for implicit data flow between steps.
    pub fn with_input(&self, input: Value) -> Self {
        let mut next = self.clone();
        next.input = input;
        next
    }

    /// Resolve a dotted variable path against this context.
    ///
    /// Paths starting with `@` address a namespace (`@input`, `@options`,
    /// `@mod`) or an output-key binding (`@myKey.field`). Bare paths resolve
    /// against `@input`. Missing paths yield `None`, never an error.
    pub fn lookup(&self, path: &str) -> Option<Value> {
        let mut segments = path.split('.');
        let head = segments.next().filter(|s| !s.is_empty())?;
        let rest: Vec<&str> = segments.collect();

        if let Some(name) = head.strip_prefix('@') {
            let base = match name {
                "input" => &self.input,
                "options" => &self.options,
                "mod" => &self.mod_variables,
                other => self.bindings.get(other)?,
            };
            descend(base, &rest)
        } else {
            let mut full = vec![head];
            full.extend(rest);
            descend(&self.input, &full)
        }
    }
}

/// Walk `segments` down into `value`, indexing objects by key and arrays by
/// zero-based position.
fn descend(value: &Value, segments: &[&str]) -> Option<Value> {
    let mut current = value;
    for seg in segments {
        current = match current {
            Value::Object(map) => map.get(*seg)?,
            Value::Array(items) => {
                let idx: usize = seg.parse().ok()?;
                items.get(idx)?
            }
            _ => return None,
        };
    }
    Some(current.clone())
}

/// Check that `key` is a valid output key: an identifier that does not
/// collide with the reserved `@input`/`@options`/`@mod` namespaces.
pub fn valid_output_key(key: &str) -> bool {
    let mut chars = key.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    if !(first.is_ascii_alphabetic() || first == '_') {
        return false;
    }
    if !chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return false;
    }
    !RESERVED_KEYS.contains(&key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ctx() -> ExecutionContext {
        ExecutionContext::new(
            json!({"name": "world", "nested": {"deep": 42}, "items": [10, 20]}),
            json!({"apiKey": "secret"}),
        )
        .with_mod_variables(json!({"counter": 7}), VariableSyncPolicy::Tab)
    }

    #[test]
    fn lookup_input_namespace() {
        assert_eq!(ctx().lookup("@input.name"), Some(json!("world")));
        assert_eq!(ctx().lookup("@input.nested.deep"), Some(json!(42)));
    }

    #[test]
    fn lookup_bare_path_resolves_against_input() {
        assert_eq!(ctx().lookup("name"), Some(json!("world")));
        assert_eq!(ctx().lookup("nested.deep"), Some(json!(42)));
    }

    #[test]
    fn lookup_array_index() {
        assert_eq!(ctx().lookup("@input.items.1"), Some(json!(20)));
        assert_eq!(ctx().lookup("@input.items.5"), None);
    }

    #[test]
    fn lookup_options_and_mod() {
        assert_eq!(ctx().lookup("@options.apiKey"), Some(json!("secret")));
        assert_eq!(ctx().lookup("@mod.counter"), Some(json!(7)));
    }

    #[test]
    fn lookup_missing_path_is_none() {
        assert_eq!(ctx().lookup("@input.absent"), None);
        assert_eq!(ctx().lookup("@unbound"), None);
        assert_eq!(ctx().lookup(""), None);
    }

    #[test]
    fn with_binding_does_not_mutate_original() {
        let base = ctx();
        let extended = base.with_binding("row", json!({"id": 1}));

        assert_eq!(base.lookup("@row"), None);
        assert_eq!(extended.lookup("@row.id"), Some(json!(1)));
        // Original input is shared by value.
        assert_eq!(extended.lookup("@input.name"), Some(json!("world")));
    }

    #[test]
    fn with_input_replaces_only_input() {
        let base = ctx().with_binding("kept", json!(true));
        let next = base.with_input(json!({"fresh": 1}));

        assert_eq!(next.lookup("@input.fresh"), Some(json!(1)));
        assert_eq!(next.lookup("@input.name"), None);
        assert_eq!(next.lookup("@kept"), Some(json!(true)));
        assert_eq!(base.lookup("@input.name"), Some(json!("world")));
    }

    #[test]
    fn sync_policy_is_carried() {
        assert_eq!(ctx().sync_policy(), VariableSyncPolicy::Tab);
    }

    #[test]
    fn output_key_validity() {
        assert!(valid_output_key("a"));
        assert!(valid_output_key("row_2"));
        assert!(valid_output_key("_private"));
        assert!(!valid_output_key(""));
        assert!(!valid_output_key("2fast"));
        assert!(!valid_output_key("has-dash"));
        assert!(!valid_output_key("has.dot"));
        // Reserved namespaces.
        assert!(!valid_output_key("input"));
        assert!(!valid_output_key("options"));
        assert!(!valid_output_key("mod"));
    }

    #[test]
    fn context_serde_round_trip() {
        let original = ctx().with_binding("a", json!([1, 2]));
        let json = serde_json::to_string(&original).unwrap();
        let restored: ExecutionContext = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.lookup("@a.0"), Some(json!(1)));
        assert_eq!(restored.sync_policy(), VariableSyncPolicy::Tab);
    }
}
