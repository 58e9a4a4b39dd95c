use actix_web::{HttpResponse, Responder, web};
use serde::Deserialize;
use serde_json::{Value, json};
use strum::IntoEnumIterator;
use tracing::{info, warn};

use crate::{
    chat::{intent::IntentKind, llm::LlmOverride, router::IntentRouter},
    error::ServiceError,
    mcp::catalog::ServerKind,
    models::Arguments,
};

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub text: String,
    pub employee_id: Option<i64>,
    pub aoai: Option<LlmOverride>,
}

#[derive(Debug, Deserialize)]
pub struct DiscoverPromptRequest {
    pub server: ServerKind,
    pub prompt_name: String,
    #[serde(default)]
    pub arguments: Arguments,
}

#[derive(Debug, Deserialize)]
pub struct DiscoverResourceRequest {
    pub server: ServerKind,
    pub resource_uri: String,
}

#[derive(Debug, Deserialize)]
pub struct ToolRequest {
    pub server: ServerKind,
    pub intent: String,
    #[serde(default)]
    pub arguments: Arguments,
}

#[derive(Debug, Deserialize)]
pub struct PromptRequest {
    pub server: ServerKind,
    pub name: String,
    #[serde(default)]
    pub arguments: Arguments,
}

#[derive(Debug, Deserialize)]
pub struct ResourceRequest {
    pub server: ServerKind,
    pub uri: String,
}

pub async fn health() -> impl Responder {
    HttpResponse::Ok().json(json!({ "status": "ok" }))
}

/// Aggregated catalogs. An unreachable server contributes empty lists.
pub async fn discover(router: web::Data<IntentRouter>) -> impl Responder {
    let mut servers = serde_json::Map::new();
    for server in ServerKind::iter() {
        let backend = router.backend(server);
        let or_empty = |r: Result<Vec<Value>, ServiceError>, what: &str| {
            r.unwrap_or_else(|e| {
                warn!(%server, error = %e, "Failed to list {what}");
                Vec::new()
            })
        };
        let (tools, prompts, resources) = futures::join!(
            backend.list_tools(),
            backend.list_prompts(),
            backend.list_resources()
        );
        servers.insert(
            server.to_string(),
            json!({
                "tools": or_empty(tools, "tools"),
                "prompts": or_empty(prompts, "prompts"),
                "resources": or_empty(resources, "resources"),
            }),
        );
    }
    HttpResponse::Ok().json(servers)
}

pub async fn discover_prompt(
    router: web::Data<IntentRouter>,
    payload: web::Json<DiscoverPromptRequest>,
) -> Result<HttpResponse, ServiceError> {
    let req = payload.into_inner();
    let result = router
        .backend(req.server)
        .get_prompt(&req.prompt_name, &req.arguments)
        .await?;
    Ok(HttpResponse::Ok().json(result))
}

pub async fn discover_resource(
    router: web::Data<IntentRouter>,
    payload: web::Json<DiscoverResourceRequest>,
) -> Result<HttpResponse, ServiceError> {
    let req = payload.into_inner();
    let result = router
        .backend(req.server)
        .read_resource(&req.resource_uri)
        .await?;
    Ok(HttpResponse::Ok().json(result))
}

pub async fn chat(
    router: web::Data<IntentRouter>,
    payload: web::Json<ChatRequest>,
) -> Result<HttpResponse, ServiceError> {
    let req = payload.into_inner();
    if req.text.trim().is_empty() {
        return Err(ServiceError::Validation("text is required".into()));
    }
    let reply = router
        .route(&req.text, req.employee_id, req.aoai.as_ref())
        .await?;
    info!(action = reply.action, routing_mode = ?reply.routing_mode, "Chat handled");
    Ok(HttpResponse::Ok().json(reply))
}

/// Catalogs of both servers; unlike discovery, any failure fails the call.
pub async fn capabilities(router: web::Data<IntentRouter>) -> Result<HttpResponse, ServiceError> {
    let mut servers = serde_json::Map::new();
    for server in ServerKind::iter() {
        let backend = router.backend(server);
        let (tools, prompts, resources) = futures::try_join!(
            backend.list_tools(),
            backend.list_prompts(),
            backend.list_resources()
        )?;
        servers.insert(
            server.to_string(),
            json!({ "tools": tools, "prompts": prompts, "resources": resources }),
        );
    }
    Ok(HttpResponse::Ok().json(servers))
}

/// Runs a tool named either directly or by its chat intent.
pub async fn tool(
    router: web::Data<IntentRouter>,
    payload: web::Json<ToolRequest>,
) -> Result<HttpResponse, ServiceError> {
    let req = payload.into_inner();
    let tool = req
        .intent
        .parse::<IntentKind>()
        .ok()
        .and_then(|kind| kind.tool_name())
        .map_or(req.intent.clone(), str::to_string);
    let result = router.backend(req.server).call_tool(&tool, &req.arguments).await?;
    Ok(HttpResponse::Ok().json(json!({ "server": req.server, "tool": tool, "result": result })))
}

pub async fn prompt(
    router: web::Data<IntentRouter>,
    payload: web::Json<PromptRequest>,
) -> Result<HttpResponse, ServiceError> {
    let req = payload.into_inner();
    let result = router.backend(req.server).get_prompt(&req.name, &req.arguments).await?;
    Ok(HttpResponse::Ok().json(json!({ "server": req.server, "name": req.name, "result": result })))
}

pub async fn resource(
    router: web::Data<IntentRouter>,
    payload: web::Json<ResourceRequest>,
) -> Result<HttpResponse, ServiceError> {
    let req = payload.into_inner();
    let result = router.backend(req.server).read_resource(&req.uri).await?;
    Ok(HttpResponse::Ok().json(json!({ "server": req.server, "uri": req.uri, "result": result })))
}
