//! Remote value rendering.
//!
//! The protocol already ships previews for everything interesting; rendering
//! only arranges them. Thrown completions become [`Error::Evaluation`] and
//! print like errors, not values.

use crate::protocol::{EvaluateResponse, ObjectPreview, PropertyPreview, RemoteObject};
use crate::session::error::{Error, evaluation_error};
use chrono::{DateTime, SecondsFormat, Utc};
use itertools::Itertools;

/// Render an evaluation result, converting thrown completions into errors.
pub fn render_eval(response: EvaluateResponse) -> Result<String, Error> {
    if response.thrown() {
        let exception = response
            .exception_details
            .and_then(|details| details.exception)
            .unwrap_or_else(|| response.result.clone());
        return Err(evaluation_error(&exception));
    }
    Ok(render_remote(&response.result))
}

pub fn render_remote(obj: &RemoteObject) -> String {
    match obj.kind.as_str() {
        "undefined" => "undefined".to_string(),
        "boolean" | "number" | "bigint" => scalar(obj),
        // a top-level string renders raw; quoting only happens inside previews
        "string" => scalar(obj),
        "symbol" => description(obj),
        "function" => format!(
            "[{}: {}]",
            obj.class_name.as_deref().unwrap_or("Function"),
            function_name(obj.description.as_deref().unwrap_or_default()),
        ),
        "object" => render_object(obj),
        _ => description(obj),
    }
}

fn render_object(obj: &RemoteObject) -> String {
    match obj.subtype.as_deref() {
        Some("null") => "null".to_string(),
        Some("date") => obj
            .description
            .as_deref()
            .and_then(date_iso)
            .unwrap_or_else(|| description(obj)),
        Some("regexp") => description(obj),
        Some("array") => match &obj.preview {
            Some(preview) => render_array_preview(preview),
            None => description(obj),
        },
        _ => match &obj.preview {
            Some(preview) => render_object_preview(preview),
            None => description(obj),
        },
    }
}

fn render_array_preview(preview: &ObjectPreview) -> String {
    let mut parts: Vec<String> = preview
        .properties
        .iter()
        .map(render_preview_property)
        .collect();
    if preview.overflow {
        parts.push("...".to_string());
    }
    if parts.is_empty() {
        return "[]".to_string();
    }
    format!("[ {} ]", parts.iter().join(", "))
}

fn render_object_preview(preview: &ObjectPreview) -> String {
    let mut parts: Vec<String> = preview
        .properties
        .iter()
        .map(|p| format!("{}: {}", p.name, render_preview_property(p)))
        .collect();
    if preview.overflow {
        parts.push("...".to_string());
    }
    if parts.is_empty() {
        return "{}".to_string();
    }
    format!("{{ {} }}", parts.iter().join(", "))
}

fn render_preview_property(property: &PropertyPreview) -> String {
    match property.kind.as_str() {
        "string" => format!("'{}'", property.value.as_deref().unwrap_or_default()),
        "undefined" => "undefined".to_string(),
        _ => property
            .value
            .clone()
            .or_else(|| property.subtype.clone())
            .unwrap_or_else(|| property.kind.clone()),
    }
}

fn scalar(obj: &RemoteObject) -> String {
    if let Some(value) = &obj.value {
        return match value {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        };
    }
    // -0, Infinity, NaN and friends arrive unserializable
    if let Some(raw) = &obj.unserializable_value {
        return raw.clone();
    }
    description(obj)
}

fn description(obj: &RemoteObject) -> String {
    obj.description
        .clone()
        .or_else(|| obj.class_name.clone())
        .unwrap_or_default()
}

/// "function otherFunction(a, b) { … }" -> "otherFunction"
fn function_name(description: &str) -> String {
    let head = description.lines().next().unwrap_or_default();
    let name = head
        .trim_start_matches("async ")
        .trim_start_matches("function")
        .trim_start_matches('*');
    let name = name.split('(').next().unwrap_or_default().trim();
    if name.is_empty() {
        "anonymous".to_string()
    } else {
        name.to_string()
    }
}

/// V8 dates describe themselves in long form; the debugger shows ISO 8601.
fn date_iso(description: &str) -> Option<String> {
    let without_zone_name = match description.find(" (") {
        Some(at) => &description[..at],
        None => description,
    };
    let parsed = DateTime::parse_from_str(without_zone_name, "%a %b %d %Y %H:%M:%S GMT%z").ok()?;
    Some(
        parsed
            .with_timezone(&Utc)
            .to_rfc3339_opts(SecondsFormat::Millis, true),
    )
}

#[cfg(test)]
mod test {
    use super::*;
    use serde_json::json;

    fn remote(value: serde_json::Value) -> RemoteObject {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_primitives() {
        struct TestCase {
            object: serde_json::Value,
            rendered: &'static str,
        }
        let cases = vec![
            TestCase {
                object: json!({"type": "string", "value": "hello world"}),
                rendered: "hello world",
            },
            TestCase {
                object: json!({"type": "number", "value": 42}),
                rendered: "42",
            },
            TestCase {
                object: json!({"type": "number", "unserializableValue": "NaN"}),
                rendered: "NaN",
            },
            TestCase {
                object: json!({"type": "boolean", "value": false}),
                rendered: "false",
            },
            TestCase {
                object: json!({"type": "undefined"}),
                rendered: "undefined",
            },
            TestCase {
                object: json!({"type": "object", "subtype": "null", "value": null}),
                rendered: "null",
            },
            TestCase {
                object: json!({
                    "type": "symbol",
                    "description": "Symbol(some)",
                }),
                rendered: "Symbol(some)",
            },
        ];

        for tc in cases {
            assert_eq!(render_remote(&remote(tc.object)), tc.rendered);
        }
    }

    #[test]
    fn test_function_rendering() {
        let obj = remote(json!({
            "type": "function",
            "className": "Function",
            "description": "function otherFunction(a, b) { return a + b; }",
        }));
        assert_eq!(render_remote(&obj), "[Function: otherFunction]");

        let anon = remote(json!({
            "type": "function",
            "className": "Function",
            "description": "function () {}",
        }));
        assert_eq!(render_remote(&anon), "[Function: anonymous]");
    }

    #[test]
    fn test_date_and_regexp() {
        let date = remote(json!({
            "type": "object",
            "subtype": "date",
            "description": "Thu Jan 01 1970 00:00:01 GMT+0000 (Coordinated Universal Time)",
        }));
        assert_eq!(render_remote(&date), "1970-01-01T00:00:01.000Z");

        let regexp = remote(json!({
            "type": "object",
            "subtype": "regexp",
            "description": "/abc/gi",
        }));
        assert_eq!(render_remote(&regexp), "/abc/gi");
    }

    #[test]
    fn test_array_preview() {
        let array = remote(json!({
            "type": "object",
            "subtype": "array",
            "className": "Array",
            "description": "Array(2)",
            "preview": {
                "type": "object",
                "subtype": "array",
                "overflow": false,
                "properties": [
                    {"name": "0", "type": "string", "value": "function"},
                    {"name": "1", "type": "string", "value": "function"},
                ],
            },
        }));
        assert_eq!(render_remote(&array), "[ 'function', 'function' ]");
    }

    #[test]
    fn test_object_preview_with_overflow() {
        let obj = remote(json!({
            "type": "object",
            "className": "Object",
            "description": "Object",
            "preview": {
                "type": "object",
                "overflow": true,
                "properties": [
                    {"name": "a", "type": "number", "value": "1"},
                    {"name": "b", "type": "string", "value": "x"},
                ],
            },
        }));
        assert_eq!(render_remote(&obj), "{ a: 1, b: 'x', ... }");

        let no_preview = remote(json!({
            "type": "object",
            "className": "Object",
            "description": "Object",
        }));
        assert_eq!(render_remote(&no_preview), "Object");
    }

    #[test]
    fn test_thrown_result_becomes_error() {
        let response: EvaluateResponse = serde_json::from_value(json!({
            "result": {
                "type": "object",
                "subtype": "error",
                "className": "ReferenceError",
                "description": "ReferenceError: x is not defined\n    at <anonymous>:1:1",
            },
            "wasThrown": true,
        }))
        .unwrap();

        match render_eval(response) {
            Err(Error::Evaluation { name, message, .. }) => {
                assert_eq!(name, "ReferenceError");
                assert_eq!(message, "x is not defined");
            }
            other => panic!("unexpected: {other:?}"),
        }
    }
}
