use std::collections::HashMap;

use actix_web::{HttpResponse, Responder, cookie::Cookie, web};
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    error::ServiceError,
    mcp::{McpServer, prompts::render_prompt, resources::read_resource},
    models::{
        Arguments, CallToolResult, INTERNAL_ERROR, INVALID_PARAMS, JsonRpcRequest,
        JsonRpcResponse, METHOD_NOT_FOUND, NOT_FOUND, PromptRequest, ResourceRequest,
        ToolCallRequest,
    },
};

pub const PROTOCOL_VERSION: &str = "2024-11-05";
pub const SESSION_COOKIE: &str = "mcp_session";

pub async fn health(server: web::Data<McpServer>) -> impl Responder {
    HttpResponse::Ok().json(json!({
        "status": "healthy",
        "server": server.catalog().title,
        "api_url": server.proxy.base_url(),
    }))
}

pub async fn mcp_health() -> impl Responder {
    HttpResponse::Ok().json(json!({ "status": "mcp server ok" }))
}

pub async fn list_tools(server: web::Data<McpServer>) -> impl Responder {
    HttpResponse::Ok().json(tools_value(&server))
}

pub async fn list_prompts(server: web::Data<McpServer>) -> impl Responder {
    HttpResponse::Ok().json(prompts_value(&server))
}

pub async fn list_resources(server: web::Data<McpServer>) -> impl Responder {
    HttpResponse::Ok().json(resources_value(&server))
}

fn tools_value(server: &McpServer) -> Value {
    json!({ "tools": server.catalog().tools })
}

fn prompts_value(server: &McpServer) -> Value {
    json!({ "prompts": server.catalog().prompts })
}

fn resources_value(server: &McpServer) -> Value {
    let catalog = server.catalog();
    json!({ "resources": catalog.resources, "resourceTemplates": catalog.templates })
}

/// Runs a tool and wraps the outcome in the MCP result envelope. Backend and
/// network failures become `isError` results, catalog failures stay errors.
async fn tool_result(
    server: &McpServer,
    name: &str,
    args: &Arguments,
) -> Result<CallToolResult, ServiceError> {
    match server.proxy.call_tool(name, args).await {
        Ok(data) => {
            let action = server.catalog().find_tool(name)?.action;
            let pretty = serde_json::to_string_pretty(&data).unwrap_or_else(|_| data.to_string());
            Ok(CallToolResult::success(format!("Completed {action}.\n{pretty}"), data))
        }
        Err(ServiceError::Remote { status, body }) => {
            let action = server.catalog().find_tool(name)?.action;
            Ok(CallToolResult::failure(format!(
                "Failed to {action}. Status: {status}, Response: {body}"
            )))
        }
        Err(ServiceError::Transport(e)) => {
            let action = server.catalog().find_tool(name)?.action;
            Ok(CallToolResult::failure(format!("Network error while trying to {action}: {e}")))
        }
        Err(e) => Err(e),
    }
}

pub async fn call_tool(
    server: web::Data<McpServer>,
    payload: web::Json<ToolCallRequest>,
) -> Result<HttpResponse, ServiceError> {
    let request = payload.into_inner();
    let result = tool_result(&server, &request.name, &request.arguments).await?;
    Ok(HttpResponse::Ok().json(result))
}

/// `POST /mcp/tools/{name}` with the arguments as the JSON body.
pub async fn call_tool_legacy(
    server: web::Data<McpServer>,
    name: web::Path<String>,
    payload: Option<web::Json<Arguments>>,
) -> Result<HttpResponse, ServiceError> {
    let args = payload.map(|p| p.into_inner()).unwrap_or_default();
    let body = server.proxy.call_tool(&name, &args).await?;
    Ok(HttpResponse::Ok().json(body))
}

/// `GET /mcp/tools/{name}?employee_id=…`; query values arrive as strings.
pub async fn call_tool_query(
    server: web::Data<McpServer>,
    name: web::Path<String>,
    query: web::Query<HashMap<String, String>>,
) -> Result<HttpResponse, ServiceError> {
    let args: Arguments = query
        .into_inner()
        .into_iter()
        .map(|(k, v)| (k, Value::String(v)))
        .collect();
    let body = server.proxy.call_tool(&name, &args).await?;
    Ok(HttpResponse::Ok().json(body))
}

pub async fn get_prompt(
    server: web::Data<McpServer>,
    payload: web::Json<PromptRequest>,
) -> Result<HttpResponse, ServiceError> {
    let request = payload.into_inner();
    let text = render_prompt(&server.proxy, &request.name, &request.arguments).await?;
    Ok(HttpResponse::Ok().json(json!({ "prompt": text })))
}

pub async fn read_resource_handler(
    server: web::Data<McpServer>,
    payload: web::Json<ResourceRequest>,
) -> Result<HttpResponse, ServiceError> {
    let content = read_resource(&server.proxy, server.kind, &payload.uri).await?;
    Ok(HttpResponse::Ok().json(json!({ "contents": [content] })))
}

/* ===================== JSON-RPC single endpoint ===================== */

pub async fn rpc(
    server: web::Data<McpServer>,
    payload: web::Json<JsonRpcRequest>,
) -> HttpResponse {
    let request = payload.into_inner();

    let Some(method) = request.method else {
        let session_id = Uuid::new_v4().to_simple().to_string();
        info!(kind = %server.kind, session = %session_id, "MCP session opened");
        return HttpResponse::Ok()
            .cookie(Cookie::build(SESSION_COOKIE, session_id.clone()).path("/").finish())
            .json(JsonRpcResponse::success(
                request.id,
                json!({ "sessionId": session_id }),
            ));
    };

    if method.starts_with("notifications/") {
        return HttpResponse::Accepted().finish();
    }

    info!(kind = %server.kind, %method, "JSON-RPC call");
    let response = match dispatch(&server, &method, request.params).await {
        Ok(result) => JsonRpcResponse::success(request.id, result),
        Err(RpcFailure::UnknownMethod) => JsonRpcResponse::error(
            request.id,
            METHOD_NOT_FOUND,
            format!("Method not found: {method}"),
        ),
        Err(RpcFailure::Service(e)) => {
            let code = match &e {
                ServiceError::NotFound(_) => NOT_FOUND,
                ServiceError::Validation(_) => INVALID_PARAMS,
                _ => INTERNAL_ERROR,
            };
            warn!(%method, error = %e, "JSON-RPC call failed");
            JsonRpcResponse::error(request.id, code, e.to_string())
        }
    };
    HttpResponse::Ok().json(response)
}

enum RpcFailure {
    UnknownMethod,
    Service(ServiceError),
}

impl From<ServiceError> for RpcFailure {
    fn from(e: ServiceError) -> Self {
        RpcFailure::Service(e)
    }
}

fn params<T: DeserializeOwned>(params: Value) -> Result<T, ServiceError> {
    serde_json::from_value(params).map_err(|e| ServiceError::Validation(format!("Invalid params: {e}")))
}

async fn dispatch(server: &McpServer, method: &str, raw: Value) -> Result<Value, RpcFailure> {
    let catalog = server.catalog();
    let result = match method {
        "initialize" => json!({
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": { "tools": {}, "prompts": {}, "resources": {} },
            "serverInfo": { "name": catalog.title, "version": env!("CARGO_PKG_VERSION") },
        }),
        "ping" => json!({}),
        "tools/list" => tools_value(server),
        "prompts/list" => prompts_value(server),
        "resources/list" => resources_value(server),
        "tools/call" => {
            let request: ToolCallRequest = params(raw)?;
            let result = tool_result(server, &request.name, &request.arguments).await?;
            serde_json::to_value(result).map_err(|e| ServiceError::Transport(e.to_string()))?
        }
        "prompts/get" => {
            let request: PromptRequest = params(raw)?;
            let description = catalog.find_prompt(&request.name)?.description;
            let text = render_prompt(&server.proxy, &request.name, &request.arguments).await?;
            json!({
                "description": description,
                "messages": [{ "role": "user", "content": { "type": "text", "text": text } }],
            })
        }
        "resources/read" => {
            let request: ResourceRequest = params(raw)?;
            let content = read_resource(&server.proxy, server.kind, &request.uri).await?;
            json!({ "contents": [content] })
        }
        _ => return Err(RpcFailure::UnknownMethod),
    };
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        mcp::{catalog::ServerKind, proxy::ToolProxy},
        routes,
    };
    use actix_web::{App, http::StatusCode, test};
    use std::time::Duration;

    macro_rules! mcp_app {
        ($kind:expr, $url:expr) => {{
            let proxy = ToolProxy::new($kind, $url, Duration::from_secs(5)).unwrap();
            test::init_service(
                App::new()
                    .app_data(web::Data::new(McpServer::new($kind, proxy)))
                    .configure(routes::configure_mcp),
            )
            .await
        }};
    }

    const OFFLINE: &str = "http://127.0.0.1:1";

    #[actix_web::test]
    async fn health_names_the_server() {
        let app = mcp_app!(ServerKind::Leave, OFFLINE);
        let body: Value =
            test::call_and_read_body_json(&app, test::TestRequest::get().uri("/health").to_request()).await;
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["server"], "Leave MCP Server");
    }

    #[actix_web::test]
    async fn lists_are_served_on_get_and_post() {
        let app = mcp_app!(ServerKind::Timesheet, OFFLINE);

        let body: Value = test::call_and_read_body_json(
            &app,
            test::TestRequest::get().uri("/mcp/tools/list").to_request(),
        )
        .await;
        assert_eq!(body["tools"].as_array().unwrap().len(), 4);

        let body: Value = test::call_and_read_body_json(
            &app,
            test::TestRequest::post().uri("/mcp/resources/list").to_request(),
        )
        .await;
        assert_eq!(
            body["resourceTemplates"][0]["uriTemplate"],
            "timesheet://employee/{employee_id}/entries"
        );
    }

    #[actix_web::test]
    async fn tools_call_wraps_backend_json() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/employees/1/balance")
            .with_body(r#"{"employee_id":1,"annual_balance":20,"sick_balance":10}"#)
            .create_async()
            .await;

        let app = mcp_app!(ServerKind::Leave, &server.url());
        let req = test::TestRequest::post()
            .uri("/mcp/tools/call")
            .set_json(json!({"name": "get_balance", "arguments": {"employee_id": 1}}))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;

        assert_eq!(body["isError"], false);
        assert_eq!(body["structuredContent"]["annual_balance"], 20);
        assert_eq!(body["content"][0]["type"], "text");
    }

    #[actix_web::test]
    async fn tools_call_reports_backend_failure_as_error_result() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/employees/1/leave-requests")
            .with_status(400)
            .with_body(r#"{"message":"Insufficient annual leave balance"}"#)
            .create_async()
            .await;

        let app = mcp_app!(ServerKind::Leave, &server.url());
        let req = test::TestRequest::post()
            .uri("/mcp/tools/call")
            .set_json(json!({"name": "apply_leave", "arguments": {
                "employee_id": 1, "start_date": "2025-09-10", "end_date": "2025-09-30", "leave_type": "annual"
            }}))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;

        assert_eq!(body["isError"], true);
        let text = body["content"][0]["text"].as_str().unwrap();
        assert!(text.starts_with("Failed to apply leave. Status: 400"));
        assert!(text.contains("Insufficient annual leave balance"));
    }

    #[actix_web::test]
    async fn tools_call_unknown_and_incomplete() {
        let app = mcp_app!(ServerKind::Leave, OFFLINE);

        let req = test::TestRequest::post()
            .uri("/mcp/tools/call")
            .set_json(json!({"name": "delete_everything"}))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NOT_FOUND);

        let req = test::TestRequest::post()
            .uri("/mcp/tools/call")
            .set_json(json!({"name": "get_balance", "arguments": {}}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["message"], "Missing required arguments: employee_id");
    }

    #[actix_web::test]
    async fn legacy_get_keeps_backend_status() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/employees/7/entries")
            .with_status(404)
            .with_body(r#"{"message":"Employee not found"}"#)
            .create_async()
            .await;

        let app = mcp_app!(ServerKind::Timesheet, &server.url());
        let req = test::TestRequest::get()
            .uri("/mcp/tools/list_timesheet_entries?employee_id=7")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[actix_web::test]
    async fn resource_read_and_unknown_prompt() {
        let app = mcp_app!(ServerKind::Timesheet, OFFLINE);

        let req = test::TestRequest::post()
            .uri("/mcp/resources/read")
            .set_json(json!({"uri": "timesheet://templates/weekly"}))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["contents"][0]["mimeType"], "text/plain");

        let req = test::TestRequest::post()
            .uri("/mcp/prompts/get")
            .set_json(json!({"name": "nope"}))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NOT_FOUND);
    }

    #[actix_web::test]
    async fn rpc_session_init_sets_cookie() {
        let app = mcp_app!(ServerKind::Leave, OFFLINE);
        let req = test::TestRequest::post().uri("/mcp").set_json(json!({})).to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(resp.status(), StatusCode::OK);
        assert!(resp.response().cookies().any(|c| c.name() == SESSION_COOKIE));
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["result"]["sessionId"].as_str().unwrap().len(), 32);
    }

    #[actix_web::test]
    async fn rpc_methods() {
        let app = mcp_app!(ServerKind::Leave, OFFLINE);
        let rpc = |method: &str, params: Value| {
            test::TestRequest::post()
                .uri("/mcp")
                .set_json(json!({"jsonrpc": "2.0", "id": 1, "method": method, "params": params}))
                .to_request()
        };

        let body: Value = test::call_and_read_body_json(&app, rpc("initialize", json!({}))).await;
        assert_eq!(body["result"]["protocolVersion"], PROTOCOL_VERSION);

        let resp = test::call_service(&app, rpc("notifications/initialized", json!({}))).await;
        assert_eq!(resp.status(), StatusCode::ACCEPTED);

        let body: Value = test::call_and_read_body_json(&app, rpc("tools/list", json!({}))).await;
        assert_eq!(body["result"]["tools"].as_array().unwrap().len(), 3);

        let body: Value = test::call_and_read_body_json(
            &app,
            rpc("prompts/get", json!({"name": "leave_request_email", "arguments": {"employee_name": "Bob"}})),
        )
        .await;
        let text = body["result"]["messages"][0]["content"]["text"].as_str().unwrap();
        assert!(text.contains("Bob"));

        let body: Value =
            test::call_and_read_body_json(&app, rpc("resources/read", json!({"uri": "leave://x"}))).await;
        assert_eq!(body["error"]["code"], NOT_FOUND);

        let body: Value = test::call_and_read_body_json(&app, rpc("tools/call", json!({}))).await;
        assert_eq!(body["error"]["code"], INVALID_PARAMS);

        let body: Value = test::call_and_read_body_json(&app, rpc("sampling/create", json!({}))).await;
        assert_eq!(body["error"]["code"], METHOD_NOT_FOUND);
    }
}
