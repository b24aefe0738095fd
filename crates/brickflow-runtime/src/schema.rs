//! Input schema validation.
//!
//! Bricks declare a JSON-Schema-shaped document describing accepted
//! arguments. The executor checks evaluated arguments against it before
//! invoking the brick; a violation is fatal to the step and carries the
//! offending property path.
//!
//! Only the subset of JSON Schema the brick contract needs is honored:
//! `required`, per-property `type`, and per-property `enum`. Unknown schema
//! keywords are ignored.

use serde_json::Value;

use brickflow_types::{BrickError, Result};

use crate::brick::ResolvedArgs;

/// Validate evaluated arguments against a brick's input schema.
///
/// Pipeline-valued arguments satisfy `required` but are otherwise exempt
/// from type checks (their "type" is the nested pipeline itself).
pub fn validate_args(brick: &str, schema: &Value, args: &ResolvedArgs) -> Result<()> {
    let Some(schema_obj) = schema.as_object() else {
        return Ok(());
    };

    if let Some(required) = schema_obj.get("required").and_then(Value::as_array) {
        for name in required.iter().filter_map(Value::as_str) {
            if !args.has(name) {
                return Err(violation(brick, name, "missing required property"));
            }
        }
    }

    let Some(properties) = schema_obj.get("properties").and_then(Value::as_object) else {
        return Ok(());
    };

    for (name, property_schema) in properties {
        let Some(value) = args.values.get(name) else {
            continue;
        };
        check_property(brick, name, property_schema, value)?;
    }

    Ok(())
}

fn check_property(brick: &str, name: &str, schema: &Value, value: &Value) -> Result<()> {
    let Some(schema_obj) = schema.as_object() else {
        return Ok(());
    };

    if let Some(expected) = schema_obj.get("type").and_then(Value::as_str) {
        if !type_matches(expected, value) {
            return Err(violation(
                brick,
                name,
                &format!("expected {expected}, got {}", type_name(value)),
            ));
        }
    }

    if let Some(allowed) = schema_obj.get("enum").and_then(Value::as_array) {
        if !allowed.contains(value) {
            return Err(violation(brick, name, "value not in enum"));
        }
    }

    Ok(())
}

fn type_matches(expected: &str, value: &Value) -> bool {
    match expected {
        "string" => value.is_string(),
        "boolean" => value.is_boolean(),
        "integer" => value.is_i64() || value.is_u64(),
        "number" => value.is_number(),
        "array" => value.is_array(),
        "object" => value.is_object(),
        "null" => value.is_null(),
        _ => true,
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn violation(brick: &str, property: &str, message: &str) -> BrickError {
    BrickError::InputValidation {
        brick: brick.to_string(),
        property: property.to_string(),
        message: message.to_string(),
    }
}
