//! Wire types
//!
//! JSON-RPC 2.0, one message per line. Method names and parameters mirror the
//! launcher runner contract: `Match`, `Actions`, `Run`.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// JSON-RPC 2.0 Request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    pub id: Option<Value>,
    pub method: String,
    #[serde(default)]
    pub params: Option<Value>,
}

/// JSON-RPC 2.0 Response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    pub id: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

impl JsonRpcResponse {
    pub fn success(id: Option<Value>, result: Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: Some(result),
            error: None,
        }
    }

    pub fn error(id: Option<Value>, error: JsonRpcError) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: None,
            error: Some(error),
        }
    }
}

/// JSON-RPC 2.0 Error
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcError {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl JsonRpcError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    /// A failed `Run`, tagged with a machine-readable kind
    pub fn run_failed(kind: &str, message: impl Into<String>) -> Self {
        Self {
            code: RUN_FAILED,
            message: message.into(),
            data: Some(json!({ "kind": kind })),
        }
    }
}

// Standard JSON-RPC error codes
pub const PARSE_ERROR: i32 = -32700;
pub const INVALID_REQUEST: i32 = -32600;
pub const METHOD_NOT_FOUND: i32 = -32601;
pub const INVALID_PARAMS: i32 = -32602;
pub const INTERNAL_ERROR: i32 = -32603;

/// Server-defined: a `Run` did not complete
pub const RUN_FAILED: i32 = -32000;

/// `Match` params
#[derive(Debug, Clone, Deserialize)]
pub struct MatchParams {
    pub query: String,
}

/// `Actions` params
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionsParams {
    pub match_id: String,
}

/// `Run` params
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunParams {
    pub match_id: String,
    #[serde(default = "default_action")]
    pub action_id: String,
}

/// An empty action id is the launcher's default action
fn default_action() -> String {
    String::new()
}

/// One row of a `Match` reply
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchReply {
    pub match_id: String,
    pub text: String,
    pub subtext: String,
    pub icon: String,
    pub relevance: f64,
    pub category: String,
}

/// `Refresh` reply
#[derive(Debug, Clone, Serialize)]
pub struct RefreshReply {
    pub entries: usize,
}
