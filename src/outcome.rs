use serde::Serialize;
use serde_json::Value;
use ts_rs::TS;

use crate::error::{DispatchError, ErrorKind};

/// Finished command as handed to the browser and to notification sinks:
/// `{ ok, value }` on success, `{ ok, errorKind, message? }` on failure.
#[derive(Debug, Clone, PartialEq, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Outcome {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[ts(type = "unknown")]
    pub value: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl Outcome {
    pub fn success(value: Value) -> Self {
        Self {
            ok: true,
            value: Some(value),
            error_kind: None,
            message: None,
        }
    }

    pub fn failure(error: &DispatchError) -> Self {
        Self {
            ok: false,
            value: None,
            error_kind: Some(error.kind()),
            message: Some(error.to_string()),
        }
    }
}

impl From<Result<Value, DispatchError>> for Outcome {
    fn from(result: Result<Value, DispatchError>) -> Self {
        match result {
            Ok(value) => Self::success(value),
            Err(error) => Self::failure(&error),
        }
    }
}
