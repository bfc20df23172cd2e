//! Typed facades over the protocol domains.
//!
//! The protocol surface stays a generic `call_method(method, params)`; these
//! wrappers fix the handful of `Debugger.`/`Runtime.`/`Profiler.` methods the
//! session actually drives, so call sites read as method calls instead of
//! string soup.

use crate::protocol::client::ProtocolClient;
use crate::protocol::{
    EvaluateResponse, GetScriptSourceResponse, Location, SetBreakpointByUrlResponse,
    SetBreakpointResponse,
};
use crate::session::error::Error;
use serde_json::{Value, json};

pub struct DebuggerAgent<'a>(&'a ProtocolClient);

pub struct RuntimeAgent<'a>(&'a ProtocolClient);

impl ProtocolClient {
    pub fn debugger(&self) -> DebuggerAgent<'_> {
        DebuggerAgent(self)
    }

    pub fn runtime(&self) -> RuntimeAgent<'_> {
        RuntimeAgent(self)
    }
}

impl DebuggerAgent<'_> {
    pub fn resume(&self) -> Result<(), Error> {
        self.0.call_method("Debugger.resume", Value::Null).map(drop)
    }

    pub fn step_over(&self) -> Result<(), Error> {
        self.0.call_method("Debugger.stepOver", Value::Null).map(drop)
    }

    pub fn step_into(&self) -> Result<(), Error> {
        self.0.call_method("Debugger.stepInto", Value::Null).map(drop)
    }

    pub fn step_out(&self) -> Result<(), Error> {
        self.0.call_method("Debugger.stepOut", Value::Null).map(drop)
    }

    pub fn pause(&self) -> Result<(), Error> {
        self.0.call_method("Debugger.pause", Value::Null).map(drop)
    }

    pub fn set_pause_on_exceptions(&self, state: &str) -> Result<(), Error> {
        self.0
            .call_method("Debugger.setPauseOnExceptions", json!({"state": state}))
            .map(drop)
    }

    pub fn set_breakpoint(
        &self,
        location: &Location,
        condition: Option<&str>,
    ) -> Result<SetBreakpointResponse, Error> {
        let mut params = json!({"location": location});
        if let Some(condition) = condition {
            params["condition"] = json!(condition);
        }
        let result = self.0.call_method("Debugger.setBreakpoint", params)?;
        Ok(serde_json::from_value(result)?)
    }

    pub fn set_breakpoint_by_url(
        &self,
        url: Option<&str>,
        url_regex: Option<&str>,
        line_number: u64,
        condition: Option<&str>,
    ) -> Result<SetBreakpointByUrlResponse, Error> {
        let mut params = json!({"lineNumber": line_number});
        if let Some(url) = url {
            params["url"] = json!(url);
        }
        if let Some(url_regex) = url_regex {
            params["urlRegex"] = json!(url_regex);
        }
        if let Some(condition) = condition {
            params["condition"] = json!(condition);
        }
        let result = self.0.call_method("Debugger.setBreakpointByUrl", params)?;
        Ok(serde_json::from_value(result)?)
    }

    pub fn remove_breakpoint(&self, breakpoint_id: &str) -> Result<(), Error> {
        self.0
            .call_method(
                "Debugger.removeBreakpoint",
                json!({"breakpointId": breakpoint_id}),
            )
            .map(drop)
    }

    pub fn evaluate_on_call_frame(
        &self,
        call_frame_id: &str,
        expression: &str,
    ) -> Result<EvaluateResponse, Error> {
        let result = self.0.call_method(
            "Debugger.evaluateOnCallFrame",
            json!({
                "callFrameId": call_frame_id,
                "expression": expression,
                "includeCommandLineAPI": true,
                "generatePreview": true,
            }),
        )?;
        Ok(serde_json::from_value(result)?)
    }

    pub fn get_script_source(&self, script_id: &str) -> Result<String, Error> {
        let result = self
            .0
            .call_method("Debugger.getScriptSource", json!({"scriptId": script_id}))?;
        let response: GetScriptSourceResponse = serde_json::from_value(result)?;
        Ok(response.script_source)
    }
}

impl RuntimeAgent<'_> {
    pub fn evaluate(&self, expression: &str) -> Result<EvaluateResponse, Error> {
        let result = self.0.call_method(
            "Runtime.evaluate",
            json!({
                "expression": expression,
                "includeCommandLineAPI": true,
                "generatePreview": true,
            }),
        )?;
        Ok(serde_json::from_value(result)?)
    }
}
