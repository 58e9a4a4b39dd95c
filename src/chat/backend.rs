use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Url};
use serde_json::{Value, json};
use tracing::info;

use crate::{error::ServiceError, mcp::proxy::send, models::Arguments};

/// What the chat services need from one MCP server.
#[async_trait]
pub trait McpBackend: Send + Sync {
    async fn list_tools(&self) -> Result<Vec<Value>, ServiceError>;
    async fn list_prompts(&self) -> Result<Vec<Value>, ServiceError>;
    async fn list_resources(&self) -> Result<Vec<Value>, ServiceError>;
    /// Runs a tool and returns the backend's own JSON.
    async fn call_tool(&self, name: &str, args: &Arguments) -> Result<Value, ServiceError>;
    async fn get_prompt(&self, name: &str, args: &Arguments) -> Result<Value, ServiceError>;
    async fn read_resource(&self, uri: &str) -> Result<Value, ServiceError>;
}

pub(crate) fn listed(mut body: Value, key: &str) -> Vec<Value> {
    match body.get_mut(key).map(Value::take) {
        Some(Value::Array(items)) => items,
        _ => Vec::new(),
    }
}

/// Client for the per-tool REST endpoints of an MCP server.
pub struct RestMcpClient {
    client: Client,
    base_url: String,
}

const LIST_TIMEOUT: Duration = Duration::from_secs(5);
const CALL_TIMEOUT: Duration = Duration::from_secs(10);

impl RestMcpClient {
    pub fn new(base_url: &str) -> anyhow::Result<Self> {
        Url::parse(base_url)?;
        Ok(Self {
            client: Client::builder().build()?,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    async fn list(&self, kind: &str) -> Result<Vec<Value>, ServiceError> {
        let body = send(
            self.client
                .get(self.url(&format!("/mcp/{kind}/list")))
                .timeout(LIST_TIMEOUT),
        )
        .await?;
        Ok(listed(body, kind))
    }
}

#[async_trait]
impl McpBackend for RestMcpClient {
    async fn list_tools(&self) -> Result<Vec<Value>, ServiceError> {
        self.list("tools").await
    }

    async fn list_prompts(&self) -> Result<Vec<Value>, ServiceError> {
        self.list("prompts").await
    }

    async fn list_resources(&self) -> Result<Vec<Value>, ServiceError> {
        self.list("resources").await
    }

    /// Lookups go out as GET with query arguments, everything else as POST.
    async fn call_tool(&self, name: &str, args: &Arguments) -> Result<Value, ServiceError> {
        let url = self.url(&format!("/mcp/tools/{name}"));
        let request = if name.starts_with("get_") || name.starts_with("list_") {
            let query: Vec<(&str, String)> = args
                .iter()
                .map(|(k, v)| match v {
                    Value::String(s) => (k.as_str(), s.clone()),
                    other => (k.as_str(), other.to_string()),
                })
                .collect();
            info!(%url, "Calling GET");
            self.client.get(url).query(&query)
        } else {
            info!(%url, "Calling POST");
            self.client.post(url).json(args)
        };
        send(request.timeout(CALL_TIMEOUT)).await
    }

    async fn get_prompt(&self, name: &str, args: &Arguments) -> Result<Value, ServiceError> {
        send(
            self.client
                .post(self.url("/mcp/prompts/get"))
                .json(&json!({ "name": name, "arguments": args }))
                .timeout(CALL_TIMEOUT),
        )
        .await
    }

    async fn read_resource(&self, uri: &str) -> Result<Value, ServiceError> {
        send(
            self.client
                .post(self.url("/mcp/resources/read"))
                .json(&json!({ "uri": uri }))
                .timeout(CALL_TIMEOUT),
        )
        .await
    }
}
