//! Wire-level data shapes: the command envelope a facade builds, and the
//! request/response frames the dispatch client exchanges with a transport.

use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use ts_rs::TS;

use crate::error::DispatchError;

/// Ordered parameter bag. Values are any JSON-compatible data.
pub type Params = IndexMap<String, Value>;

/// Token linking a sent request to its eventual response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, TS)]
#[serde(transparent)]
#[ts(export)]
pub struct CorrelationId(#[ts(type = "number")] pub u64);

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

// ── Command envelope ─────────────────────────────────────────────

/// One remote call: target module, command name, parameter bag.
///
/// `module` and `command` are non-empty. Fields are private so an envelope
/// cannot change once built; the dispatch client takes it by value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawEnvelope")]
pub struct CommandEnvelope {
    module: String,
    command: String,
    params: Params,
}

#[derive(Deserialize)]
struct RawEnvelope {
    module: String,
    command: String,
    #[serde(default)]
    params: Params,
}

impl TryFrom<RawEnvelope> for CommandEnvelope {
    type Error = DispatchError;

    fn try_from(raw: RawEnvelope) -> Result<Self, Self::Error> {
        CommandEnvelope::from_parts(raw.module, raw.command, raw.params)
    }
}

impl CommandEnvelope {
    /// Envelope with an empty parameter bag.
    pub fn new(
        module: impl Into<String>,
        command: impl Into<String>,
    ) -> Result<Self, DispatchError> {
        Self::from_parts(module, command, Params::new())
    }

    pub fn from_parts(
        module: impl Into<String>,
        command: impl Into<String>,
        params: Params,
    ) -> Result<Self, DispatchError> {
        let module = module.into();
        let command = command.into();
        if module.trim().is_empty() {
            return Err(DispatchError::invalid_envelope("module must not be empty"));
        }
        if command.trim().is_empty() {
            return Err(DispatchError::invalid_envelope(format!(
                "command for module '{module}' must not be empty"
            )));
        }
        Ok(Self {
            module,
            command,
            params,
        })
    }

    /// Build an envelope from a typed parameter struct. The struct must
    /// serialize to a JSON object (or to `null`, meaning no parameters).
    pub fn with_params<P: Serialize + ?Sized>(
        module: impl Into<String>,
        command: impl Into<String>,
        params: &P,
    ) -> Result<Self, DispatchError> {
        let value = serde_json::to_value(params).map_err(|e| {
            DispatchError::invalid_envelope(format!("failed to encode params: {e}"))
        })?;
        Self::from_parts(module, command, params_from_value(value)?)
    }

    /// Add one parameter while the envelope is still being built.
    pub fn param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    pub fn module(&self) -> &str {
        &self.module
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    /// `module.command`, used in logs and the CLI.
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.module, self.command)
    }
}

/// Convert a JSON value into a parameter bag. Objects keep their key order;
/// `null` is an empty bag; anything else is rejected.
pub fn params_from_value(value: Value) -> Result<Params, DispatchError> {
    match value {
        Value::Null => Ok(Params::new()),
        Value::Object(map) => Ok(map.into_iter().collect()),
        other => Err(DispatchError::invalid_envelope(format!(
            "params must be a JSON object, got {}",
            json_type_name(&other)
        ))),
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

// ── Frames ───────────────────────────────────────────────────────

/// Outbound frame: `{ id, module, command, params }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestFrame {
    pub id: CorrelationId,
    #[serde(flatten)]
    pub envelope: CommandEnvelope,
}

impl RequestFrame {
    pub fn new(id: CorrelationId, envelope: CommandEnvelope) -> Self {
        Self { id, envelope }
    }
}

/// Inbound frame: `{ id, success, data | error }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseFrame {
    pub id: CorrelationId,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ResponseFrame {
    pub fn ok(id: CorrelationId, data: Value) -> Self {
        Self {
            id,
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn err(id: CorrelationId, message: impl Into<String>) -> Self {
        Self {
            id,
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }

    /// Parse raw wire text. Failures are protocol errors.
    pub fn decode(text: &str) -> Result<Self, DispatchError> {
        serde_json::from_str(text)
            .map_err(|e| DispatchError::protocol(format!("malformed response frame: {e}")))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Serialize)]
    struct Volumes {
        playback: u8,
        capture: u8,
    }

    #[test]
    fn rejects_empty_module_and_command() {
        let err = CommandEnvelope::new("", "get_data").unwrap_err();
        assert!(matches!(err, DispatchError::InvalidEnvelope { .. }));
        let err = CommandEnvelope::new("audio", "  ").unwrap_err();
        assert!(err.to_string().contains("audio"));
    }

    #[test]
    fn typed_params_keep_field_order() {
        let env = CommandEnvelope::with_params(
            "audio",
            "set_volumes",
            &Volumes {
                playback: 80,
                capture: 50,
            },
        )
        .unwrap();
        let keys: Vec<&str> = env.params().keys().map(String::as_str).collect();
        assert_eq!(keys, ["playback", "capture"]);
        assert_eq!(env.params()["playback"], json!(80));
        assert_eq!(env.qualified_name(), "audio.set_volumes");
    }

    #[test]
    fn non_object_params_are_rejected() {
        let err = CommandEnvelope::with_params("audio", "set_volumes", &[1, 2]).unwrap_err();
        assert_eq!(
            err,
            DispatchError::invalid_envelope("params must be a JSON object, got array")
        );
        let env = CommandEnvelope::with_params("audio", "get_volumes", &()).unwrap();
        assert!(env.params().is_empty());
    }

    #[test]
    fn request_frame_is_flat_on_the_wire() {
        let env = CommandEnvelope::new("weather", "set_apikey")
            .unwrap()
            .param("apikey", "abc");
        let frame = RequestFrame::new(CorrelationId(3), env.clone());
        let value = serde_json::to_value(&frame).unwrap();
        assert_eq!(
            value,
            json!({"id": 3, "module": "weather", "command": "set_apikey", "params": {"apikey": "abc"}})
        );
        let back: RequestFrame = serde_json::from_value(value).unwrap();
        assert_eq!(back.envelope, env);
    }

    #[test]
    fn deserializing_an_empty_module_fails() {
        let res: Result<RequestFrame, _> =
            serde_json::from_value(json!({"id": 1, "module": "", "command": "x"}));
        assert!(res.is_err());
    }

    #[test]
    fn decodes_response_frames() {
        let ok = ResponseFrame::decode(r#"{"id": 4, "success": true, "data": null}"#).unwrap();
        assert_eq!(ok.id, CorrelationId(4));
        assert!(ok.success);
        assert_eq!(ok.data, None);

        let err =
            ResponseFrame::decode(r#"{"id": 5, "success": false, "error": "device busy"}"#)
                .unwrap();
        assert_eq!(err.error.as_deref(), Some("device busy"));

        let bad = ResponseFrame::decode(r#"{"success": true}"#).unwrap_err();
        assert!(matches!(bad, DispatchError::Protocol { .. }));
    }
}
