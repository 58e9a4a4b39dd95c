//! Wire types shared by the MCP servers and their clients.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub type Arguments = Map<String, Value>;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ToolCallRequest {
    pub name: String,
    #[serde(default)]
    pub arguments: Arguments,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PromptRequest {
    pub name: String,
    #[serde(default)]
    pub arguments: Arguments,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ResourceRequest {
    pub uri: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResourceContent {
    pub uri: String,
    #[serde(rename = "mimeType")]
    pub mime_type: String,
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextContent {
    #[serde(rename = "type")]
    pub kind: String,
    pub text: String,
}

/// Result envelope of `tools/call`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallToolResult {
    pub content: Vec<TextContent>,
    #[serde(rename = "structuredContent", skip_serializing_if = "Option::is_none")]
    pub structured_content: Option<Value>,
    #[serde(rename = "isError")]
    pub is_error: bool,
}

impl CallToolResult {
    pub fn success(summary: String, data: Value) -> Self {
        Self {
            content: vec![TextContent {
                kind: "text".to_string(),
                text: summary,
            }],
            structured_content: Some(data),
            is_error: false,
        }
    }

    pub fn failure(text: String) -> Self {
        Self {
            content: vec![TextContent {
                kind: "text".to_string(),
                text,
            }],
            structured_content: None,
            is_error: true,
        }
    }
}

/// JSON-RPC 2.0 request. A body without `method` opens a session.
#[derive(Debug, Deserialize, Serialize)]
pub struct JsonRpcRequest {
    #[serde(default)]
    pub jsonrpc: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
    #[serde(default)]
    pub method: Option<String>,
    #[serde(default)]
    pub params: Value,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct JsonRpcError {
    pub code: i32,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

pub const INVALID_PARAMS: i32 = -32602;
pub const METHOD_NOT_FOUND: i32 = -32601;
pub const INTERNAL_ERROR: i32 = -32603;
/// Application error: the named tool, prompt or resource does not exist.
pub const NOT_FOUND: i32 = -32004;

impl JsonRpcResponse {
    pub fn success(id: Option<Value>, result: Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: Some(result),
            error: None,
        }
    }

    pub fn error(id: Option<Value>, code: i32, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: None,
            error: Some(JsonRpcError {
                code,
                message: message.into(),
                data: None,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn session_init_body_has_no_method() {
        let req: JsonRpcRequest = serde_json::from_value(json!({})).unwrap();
        assert!(req.method.is_none());

        let req: JsonRpcRequest =
            serde_json::from_value(json!({"jsonrpc": "2.0", "id": 3, "method": "ping"})).unwrap();
        assert_eq!(req.method.as_deref(), Some("ping"));
        assert_eq!(req.id, Some(json!(3)));
    }

    #[test]
    fn tool_result_uses_mcp_field_names() {
        let v = serde_json::to_value(CallToolResult::success("ok".into(), json!({"a": 1}))).unwrap();
        assert_eq!(v["content"][0]["type"], "text");
        assert_eq!(v["structuredContent"]["a"], 1);
        assert_eq!(v["isError"], false);

        let v = serde_json::to_value(CallToolResult::failure("boom".into())).unwrap();
        assert!(v.get("structuredContent").is_none());
        assert_eq!(v["isError"], true);
    }

    #[test]
    fn error_response_omits_result() {
        let v = serde_json::to_value(JsonRpcResponse::error(Some(json!(1)), METHOD_NOT_FOUND, "nope"))
            .unwrap();
        assert!(v.get("result").is_none());
        assert_eq!(v["error"]["code"], METHOD_NOT_FOUND);
    }
}
