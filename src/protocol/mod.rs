//! Chrome DevTools Protocol message model.
//!
//! The protocol surface is treated as opaque JSON; only the small subset of
//! methods and events the debugger actually drives is typed out.
//! <https://chromedevtools.github.io/devtools-protocol/>

pub mod agent;
pub mod client;
pub mod wsframe;

use crate::session::error::Error;
use serde::Deserialize;
use serde_json::Value;

/// An inbound protocol message: a response correlated by request id, or a
/// server-initiated event. Requests carry ids starting from 1; 0 is reserved.
#[derive(Debug)]
pub enum Inbound {
    Response {
        id: u64,
        result: Option<Value>,
        error: Option<RpcError>,
    },
    Event {
        method: String,
        params: Value,
    },
}

/// The `error` body of a failed response.
#[derive(Debug, Clone, Deserialize)]
pub struct RpcError {
    pub code: i64,
    pub message: String,
    #[serde(default)]
    pub data: Option<Value>,
}

impl RpcError {
    /// Unpack into the user-facing error shape: `"<message> - <data>"`.
    pub fn unpack(self) -> Error {
        let message = match self.data {
            Some(Value::String(data)) => format!("{} - {}", self.message, data),
            Some(data) => format!("{} - {}", self.message, data),
            None => self.message,
        };
        Error::Rpc {
            code: self.code,
            message,
        }
    }
}

/// Classify one decoded payload. The wire check (starts with `{`, ends with
/// `}`) already happened at the byte level; here an id means response, a
/// method means event, anything else is malformed.
pub fn classify(value: Value) -> Result<Inbound, Error> {
    let Value::Object(mut obj) = value else {
        return Err(Error::Protocol("message payload is not an object".into()));
    };

    if let Some(id) = obj.get("id").and_then(Value::as_u64) {
        let error = match obj.remove("error") {
            Some(body) => Some(
                serde_json::from_value::<RpcError>(body)
                    .map_err(|e| Error::Protocol(format!("malformed error body: {e}")))?,
            ),
            None => None,
        };
        return Ok(Inbound::Response {
            id,
            result: obj.remove("result"),
            error,
        });
    }

    if let Some(method) = obj.get("method").and_then(Value::as_str) {
        let method = method.to_string();
        let params = obj.remove("params").unwrap_or(Value::Null);
        return Ok(Inbound::Event { method, params });
    }

    Err(Error::Protocol(
        "message carries neither an id nor a method".into(),
    ))
}

/// One entry of the `GET /json` target list.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetInfo {
    #[serde(default)]
    pub title: Option<String>,
    pub web_socket_debugger_url: String,
}

/// <https://chromedevtools.github.io/devtools-protocol/tot/Debugger/#type-Location>
#[derive(Debug, Clone, PartialEq, Deserialize, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    pub script_id: String,
    pub line_number: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column_number: Option<u64>,
}

/// <https://chromedevtools.github.io/devtools-protocol/tot/Debugger/#type-CallFrame>
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallFrame {
    pub call_frame_id: String,
    pub function_name: String,
    pub location: Location,
    #[serde(default)]
    pub scope_chain: Vec<Scope>,
}

/// <https://chromedevtools.github.io/devtools-protocol/tot/Debugger/#type-Scope>
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Scope {
    #[serde(rename = "type")]
    pub kind: String,
    pub object: RemoteObject,
}

/// <https://chromedevtools.github.io/devtools-protocol/tot/Runtime/#type-RemoteObject>
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteObject {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub subtype: Option<String>,
    #[serde(default)]
    pub class_name: Option<String>,
    #[serde(default)]
    pub value: Option<Value>,
    #[serde(default)]
    pub unserializable_value: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub object_id: Option<String>,
    #[serde(default)]
    pub preview: Option<ObjectPreview>,
}

/// <https://chromedevtools.github.io/devtools-protocol/tot/Runtime/#type-ObjectPreview>
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectPreview {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub subtype: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub overflow: bool,
    #[serde(default)]
    pub properties: Vec<PropertyPreview>,
}

/// <https://chromedevtools.github.io/devtools-protocol/tot/Runtime/#type-PropertyPreview>
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyPreview {
    pub name: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default)]
    pub subtype: Option<String>,
}

/// <https://chromedevtools.github.io/devtools-protocol/tot/Runtime/#type-ExceptionDetails>
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExceptionDetails {
    pub text: String,
    #[serde(default)]
    pub exception: Option<RemoteObject>,
}

/// Result shape shared by `Runtime.evaluate` and
/// `Debugger.evaluateOnCallFrame`. Older targets report thrown completions
/// with `wasThrown`, newer ones with `exceptionDetails`; both are kept.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluateResponse {
    pub result: RemoteObject,
    #[serde(default)]
    pub was_thrown: Option<bool>,
    #[serde(default)]
    pub exception_details: Option<ExceptionDetails>,
}

impl EvaluateResponse {
    pub fn thrown(&self) -> bool {
        self.was_thrown.unwrap_or(false) || self.exception_details.is_some()
    }
}

/// `Debugger.paused` event payload.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PausedParams {
    pub call_frames: Vec<CallFrame>,
    #[serde(default = "default_pause_reason")]
    pub reason: String,
}

fn default_pause_reason() -> String {
    "other".to_string()
}

/// `Debugger.scriptParsed` event payload.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScriptParsedParams {
    pub script_id: String,
    #[serde(default)]
    pub url: String,
}

/// `Debugger.breakpointResolved` event payload.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BreakpointResolvedParams {
    pub breakpoint_id: String,
    pub location: Location,
}

/// `Debugger.setBreakpoint` response.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetBreakpointResponse {
    pub breakpoint_id: String,
    #[serde(default)]
    pub actual_location: Option<Location>,
}

/// `Debugger.setBreakpointByUrl` response.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetBreakpointByUrlResponse {
    pub breakpoint_id: String,
    #[serde(default)]
    pub locations: Vec<Location>,
}

/// `Debugger.getScriptSource` response.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetScriptSourceResponse {
    pub script_source: String,
}

#[cfg(test)]
mod test {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_classify_response_event_malformed() {
        let resp = classify(json!({"id": 3, "result": {"value": 1}})).unwrap();
        assert!(matches!(resp, Inbound::Response { id: 3, error: None, .. }));

        let failed = classify(json!({"id": 4, "error": {"code": -32000, "message": "nope"}}))
            .unwrap();
        match failed {
            Inbound::Response { error: Some(e), .. } => assert_eq!(e.code, -32000),
            other => panic!("unexpected: {other:?}"),
        }

        let event = classify(json!({"method": "Debugger.resumed", "params": {}})).unwrap();
        assert!(matches!(event, Inbound::Event { ref method, .. } if method == "Debugger.resumed"));

        assert!(classify(json!({"neither": true})).is_err());
        assert!(classify(json!([1, 2])).is_err());
    }

    #[test]
    fn test_rpc_error_unpack_appends_data() {
        let err = RpcError {
            code: -32000,
            message: "Breakpoint at specified location already exists".to_string(),
            data: Some(json!("script.js:3")),
        }
        .unpack();
        match err {
            Error::Rpc { code, message } => {
                assert_eq!(code, -32000);
                assert_eq!(
                    message,
                    "Breakpoint at specified location already exists - script.js:3"
                );
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_evaluate_response_thrown_variants() {
        let old: EvaluateResponse =
            serde_json::from_value(json!({"result": {"type": "object"}, "wasThrown": true}))
                .unwrap();
        assert!(old.thrown());

        let new: EvaluateResponse = serde_json::from_value(json!({
            "result": {"type": "object"},
            "exceptionDetails": {"text": "Uncaught"}
        }))
        .unwrap();
        assert!(new.thrown());

        let ok: EvaluateResponse =
            serde_json::from_value(json!({"result": {"type": "number", "value": 1}})).unwrap();
        assert!(!ok.thrown());
    }
}
