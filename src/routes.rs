use crate::{
    api::{employee, health, leave_balance, leave_request, timesheet},
    chat::handlers as chat,
    docs::{LeaveApiDoc, TimesheetApiDoc},
    mcp::handlers as mcp,
};
use actix_governor::{
    Governor, GovernorConfigBuilder, PeerIpKeyExtractor, governor::middleware::NoOpMiddleware,
};
use actix_web::web;
use tracing::warn;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

/// Per-peer limiter allowing `requests_per_min` requests, `None` when limiting is off.
fn build_limiter(requests_per_min: u32) -> Option<Governor<PeerIpKeyExtractor, NoOpMiddleware>> {
    if requests_per_min == 0 {
        return None;
    }
    let per_ms = (60_000 / requests_per_min as u64).max(1);
    let cfg = GovernorConfigBuilder::default()
        .milliseconds_per_request(per_ms)
        .burst_size(requests_per_min)
        .key_extractor(PeerIpKeyExtractor)
        .finish();
    if cfg.is_none() {
        warn!(requests_per_min, "Invalid rate limit, /chat is not limited");
    }
    cfg.map(|cfg| Governor::new(&cfg))
}

pub fn configure_leave_api(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(health::health))
        .service(
            web::resource("/employees")
                .route(web::post().to(employee::create_employee))
                .route(web::get().to(employee::list_employees)),
        )
        .route("/employees/{employee_id}", web::get().to(employee::get_employee))
        .service(
            web::resource("/employees/{employee_id}/balance")
                .route(web::get().to(leave_balance::get_balance))
                .route(web::post().to(leave_balance::set_balance)),
        )
        .service(
            web::resource("/employees/{employee_id}/leave-requests")
                .route(web::post().to(leave_request::create_leave))
                .route(web::get().to(leave_request::list_leaves)),
        )
        .route(
            "/leave-requests/{leave_id}/status",
            web::post().to(leave_request::update_leave_status),
        )
        .route(
            "/leave-requests/{leave_id}/approve",
            web::put().to(leave_request::approve_leave),
        )
        .route(
            "/leave-requests/{leave_id}/reject",
            web::put().to(leave_request::reject_leave),
        )
        // wildcard {_:.*} so the UI's JS/CSS assets resolve
        .service(
            SwaggerUi::new("/swagger-ui/{_:.*}")
                .url("/api-doc/openapi.json", LeaveApiDoc::openapi()),
        );
}

pub fn configure_timesheet_api(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(health::health))
        .service(
            web::resource("/employees")
                .route(web::post().to(employee::create_employee))
                .route(web::get().to(employee::list_employees)),
        )
        .route("/employees/{employee_id}", web::get().to(employee::get_employee))
        .service(
            web::resource("/employees/{employee_id}/entries")
                .route(web::post().to(timesheet::create_entry))
                .route(web::get().to(timesheet::list_entries)),
        )
        .route(
            "/employees/{employee_id}/summary",
            web::get().to(timesheet::employee_summary),
        )
        .route("/projects/{project}/hours", web::get().to(timesheet::project_hours))
        .service(
            SwaggerUi::new("/swagger-ui/{_:.*}")
                .url("/api-doc/openapi.json", TimesheetApiDoc::openapi()),
        );
}

/// Both MCP conventions: REST-style endpoints and the JSON-RPC endpoint.
pub fn configure_mcp(cfg: &mut web::ServiceConfig) {
    cfg.route("/", web::get().to(mcp::health))
        .route("/health", web::get().to(mcp::health))
        .route("/mcp/health", web::get().to(mcp::mcp_health))
        .route("/mcp", web::post().to(mcp::rpc))
        // list routes before /mcp/tools/{name}
        .service(
            web::resource("/mcp/tools/list")
                .route(web::get().to(mcp::list_tools))
                .route(web::post().to(mcp::list_tools)),
        )
        .service(
            web::resource("/mcp/prompts/list")
                .route(web::get().to(mcp::list_prompts))
                .route(web::post().to(mcp::list_prompts)),
        )
        .service(
            web::resource("/mcp/resources/list")
                .route(web::get().to(mcp::list_resources))
                .route(web::post().to(mcp::list_resources)),
        )
        .route("/mcp/tools/call", web::post().to(mcp::call_tool))
        .service(
            web::resource("/mcp/tools/{name}")
                .route(web::post().to(mcp::call_tool_legacy))
                .route(web::get().to(mcp::call_tool_query)),
        )
        .route("/mcp/prompts/get", web::post().to(mcp::get_prompt))
        .route("/mcp/resources/read", web::post().to(mcp::read_resource_handler));
}

fn configure_chat_endpoint(cfg: &mut web::ServiceConfig, rate_chat_per_min: u32) {
    let chat = web::resource("/chat").route(web::post().to(chat::chat));
    match build_limiter(rate_chat_per_min) {
        Some(limiter) => cfg.service(chat.wrap(limiter)),
        None => cfg.service(chat),
    };
}

pub fn configure_chat(cfg: &mut web::ServiceConfig, rate_chat_per_min: u32) {
    cfg.route("/health", web::get().to(chat::health))
        .route("/mcp/discover", web::get().to(chat::discover))
        .route("/mcp/prompts/get", web::post().to(chat::discover_prompt))
        .route("/mcp/resources/read", web::post().to(chat::discover_resource));
    configure_chat_endpoint(cfg, rate_chat_per_min);
}

pub fn configure_chat_v2(cfg: &mut web::ServiceConfig, rate_chat_per_min: u32) {
    cfg.route("/health", web::get().to(chat::health))
        .route("/mcp/capabilities", web::get().to(chat::capabilities))
        .route("/mcp/tool", web::post().to(chat::tool))
        .route("/mcp/prompt", web::post().to(chat::prompt))
        .route("/mcp/resource", web::post().to(chat::resource));
    configure_chat_endpoint(cfg, rate_chat_per_min);
}
