//! MCP client that works against either convention an MCP server may expose:
//! REST paths (`{base}/tools/call`) or one JSON-RPC endpoint (`{base}/mcp`).
//!
//! Candidate bases are the configured URL with and without a trailing `/mcp`.
//! The first convention that answers is remembered per instance and tried
//! first on later calls; only a fresh 404 sends the client searching again.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use reqwest::{Client, RequestBuilder, header};
use serde_json::{Value, json};
use tracing::{debug, info, warn};

use crate::{
    chat::backend::{McpBackend, listed},
    error::ServiceError,
    mcp::proxy::send,
    models::{
        Arguments, CallToolResult, INVALID_PARAMS, JsonRpcResponse, METHOD_NOT_FOUND, NOT_FOUND,
    },
};

const INIT_TIMEOUT: Duration = Duration::from_secs(10);
const CALL_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActiveRoute {
    Unknown,
    Rest(String),
    JsonRpc(String),
}

pub struct MultiTransportClient {
    client: Client,
    base_url: String,
    token: Option<String>,
    active: Mutex<ActiveRoute>,
    initialized: Mutex<HashSet<String>>,
    rpc_id: AtomicU64,
}

impl MultiTransportClient {
    pub fn new(base_url: &str, token: Option<String>) -> anyhow::Result<Self> {
        let client = Client::builder().cookie_store(true).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
            active: Mutex::new(ActiveRoute::Unknown),
            initialized: Mutex::new(HashSet::new()),
            rpc_id: AtomicU64::new(0),
        })
    }

    pub fn active_route(&self) -> ActiveRoute {
        self.active.lock().clone()
    }

    fn candidates(&self) -> [String; 2] {
        match self.base_url.strip_suffix("/mcp") {
            Some(root) => [self.base_url.clone(), root.to_string()],
            None => [self.base_url.clone(), format!("{}/mcp", self.base_url)],
        }
    }

    fn rpc_endpoint(base: &str) -> String {
        if base.ends_with("/mcp") {
            base.to_string()
        } else {
            format!("{base}/mcp")
        }
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        let request = request.header(header::ACCEPT, "application/json, text/event-stream");
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    /// Opens a session on `base` once per client. Failures are ignored, not
    /// every server wants a session.
    async fn ensure_session(&self, base: &str) {
        if !self.initialized.lock().insert(base.to_string()) {
            return;
        }
        let url = Self::rpc_endpoint(base);
        let request = self.authorized(self.client.post(&url).json(&json!({})).timeout(INIT_TIMEOUT));
        if let Err(e) = request.send().await {
            debug!(%url, error = %e, "Session init failed");
        }
    }

    async fn rest_call(&self, base: &str, path: &str, payload: &Value) -> Result<Value, ServiceError> {
        self.ensure_session(base).await;
        let request = self
            .client
            .post(format!("{base}{path}"))
            .json(payload)
            .timeout(CALL_TIMEOUT);
        send(self.authorized(request)).await
    }

    async fn rpc_call(&self, endpoint: &str, method: &str, params: &Value) -> Result<Value, ServiceError> {
        self.ensure_session(endpoint).await;
        let id = self.rpc_id.fetch_add(1, Ordering::Relaxed) + 1;
        let body = json!({ "jsonrpc": "2.0", "id": id, "method": method, "params": params });
        let request = self.client.post(endpoint).json(&body).timeout(CALL_TIMEOUT);
        let reply = send(self.authorized(request)).await?;

        match serde_json::from_value::<JsonRpcResponse>(reply.clone()) {
            Ok(JsonRpcResponse { error: Some(e), .. }) => Err(ServiceError::Remote {
                status: rpc_status(e.code),
                body: e.message,
            }),
            Ok(JsonRpcResponse { result: Some(result), .. }) => Ok(result),
            _ => Ok(reply),
        }
    }

    /// Tries the remembered route, then every REST candidate, then JSON-RPC on
    /// each candidate. A 404 moves on to the next option; anything else stops.
    async fn post(&self, path: &str, method: &str, payload: Value) -> Result<Value, ServiceError> {
        let mut last_not_found = None;
        let mut tried_rpc = None;

        let mut bases: Vec<String> = Vec::with_capacity(3);
        match self.active_route() {
            ActiveRoute::JsonRpc(endpoint) => {
                match self.rpc_call(&endpoint, method, &payload).await {
                    Err(e) if e.is_remote_not_found() => last_not_found = Some(e),
                    other => return other,
                }
                tried_rpc = Some(endpoint);
            }
            ActiveRoute::Rest(base) => bases.push(base),
            ActiveRoute::Unknown => {}
        }
        for candidate in self.candidates() {
            if !bases.contains(&candidate) {
                bases.push(candidate);
            }
        }

        for base in &bases {
            match self.rest_call(base, path, &payload).await {
                Ok(body) => {
                    self.remember(ActiveRoute::Rest(base.clone()));
                    return Ok(body);
                }
                Err(e) if e.is_remote_not_found() => {
                    debug!(%base, path, "REST path not found, trying next candidate");
                    last_not_found = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        let mut endpoints: Vec<String> = Vec::with_capacity(2);
        for base in &bases {
            let endpoint = Self::rpc_endpoint(base);
            if !endpoints.contains(&endpoint) && tried_rpc.as_ref() != Some(&endpoint) {
                endpoints.push(endpoint);
            }
        }
        for endpoint in endpoints {
            match self.rpc_call(&endpoint, method, &payload).await {
                Ok(result) => {
                    self.remember(ActiveRoute::JsonRpc(endpoint));
                    return Ok(result);
                }
                Err(e) if e.is_remote_not_found() => last_not_found = Some(e),
                Err(e) => return Err(e),
            }
        }

        Err(last_not_found.unwrap_or_else(|| {
            ServiceError::Transport(format!("no candidate of {} answered {path}", self.base_url))
        }))
    }

    fn remember(&self, route: ActiveRoute) {
        let mut active = self.active.lock();
        if *active != route {
            info!(base = %self.base_url, ?route, "MCP route selected");
            *active = route;
        }
    }
}

fn rpc_status(code: i32) -> u16 {
    match code {
        NOT_FOUND | METHOD_NOT_FOUND => 404,
        INVALID_PARAMS => 400,
        _ => 500,
    }
}

#[async_trait]
impl McpBackend for MultiTransportClient {
    async fn list_tools(&self) -> Result<Vec<Value>, ServiceError> {
        let body = self.post("/tools/list", "tools/list", json!({})).await?;
        Ok(listed(body, "tools"))
    }

    async fn list_prompts(&self) -> Result<Vec<Value>, ServiceError> {
        let body = self.post("/prompts/list", "prompts/list", json!({})).await?;
        Ok(listed(body, "prompts"))
    }

    async fn list_resources(&self) -> Result<Vec<Value>, ServiceError> {
        let body = self.post("/resources/list", "resources/list", json!({})).await?;
        Ok(listed(body, "resources"))
    }

    /// Unwraps the MCP result envelope; an `isError` result becomes an error.
    async fn call_tool(&self, name: &str, args: &Arguments) -> Result<Value, ServiceError> {
        let body = self
            .post("/tools/call", "tools/call", json!({ "name": name, "arguments": args }))
            .await?;
        match serde_json::from_value::<CallToolResult>(body.clone()) {
            Ok(result) if result.is_error => {
                let text = result
                    .content
                    .into_iter()
                    .map(|c| c.text)
                    .collect::<Vec<_>>()
                    .join("\n");
                warn!(tool = name, %text, "Tool reported an error");
                Err(ServiceError::Transport(text))
            }
            Ok(CallToolResult { structured_content: Some(data), .. }) => Ok(data),
            _ => Ok(body),
        }
    }

    async fn get_prompt(&self, name: &str, args: &Arguments) -> Result<Value, ServiceError> {
        self.post("/prompts/get", "prompts/get", json!({ "name": name, "arguments": args }))
            .await
    }

    async fn read_resource(&self, uri: &str) -> Result<Value, ServiceError> {
        self.post("/resources/read", "resources/read", json!({ "uri": uri }))
            .await
    }
}
