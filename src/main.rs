use std::{sync::Arc, time::Duration};

use actix_web::middleware::{Logger, NormalizePath};
use actix_web::web::Data;
use actix_web::{App, HttpServer};
use anyhow::Context;
use tracing::info;
use tracing_appender::rolling;
use tracing_subscriber::EnvFilter;

use workplace_mcp::{
    chat::{
        backend::{McpBackend, RestMcpClient},
        llm::AzureOpenAiClient,
        router::IntentRouter,
        transport::MultiTransportClient,
    },
    config::{Config, ServiceKind},
    db::{Schema, init_db, migrate, seed_if_empty},
    mcp::{McpServer, catalog::ServerKind, proxy::ToolProxy},
    routes,
};

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;

    // Rolling daily log, one file prefix per service
    let file_appender = rolling::daily(&config.log_dir, format!("{}.log", config.service));
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_ansi(false)
        .with_target(false) // removes module path
        .with_level(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .init();

    info!(service = %config.service, addr = %config.server_addr, "Server starting...");

    match config.service {
        ServiceKind::LeaveApi => run_resource_service(&config, Schema::Leave).await,
        ServiceKind::TimesheetApi => run_resource_service(&config, Schema::Timesheet).await,
        ServiceKind::LeaveMcp => run_mcp_server(&config, ServerKind::Leave).await,
        ServiceKind::TimesheetMcp => run_mcp_server(&config, ServerKind::Timesheet).await,
        ServiceKind::Chat | ServiceKind::ChatV2 => run_chat(&config).await,
    }
}

async fn run_resource_service(config: &Config, schema: Schema) -> anyhow::Result<()> {
    let (database_url, seed) = match schema {
        Schema::Leave => (&config.leave_database_url, config.leave_seed_on_start),
        Schema::Timesheet => (&config.timesheet_database_url, config.timesheet_seed_on_start),
    };
    let pool = init_db(database_url).await?;
    migrate(&pool, schema).await?;
    if seed {
        seed_if_empty(&pool, schema).await;
    }

    HttpServer::new(move || {
        let app = App::new()
            .wrap(Logger::default())
            .wrap(NormalizePath::trim())
            .app_data(Data::new(pool.clone()))
            .app_data(Data::new(schema));
        match schema {
            Schema::Leave => app.configure(routes::configure_leave_api),
            Schema::Timesheet => app.configure(routes::configure_timesheet_api),
        }
    })
    .bind(&config.server_addr)
    .with_context(|| format!("Failed to bind {}", config.server_addr))?
    .run()
    .await?;
    Ok(())
}

async fn run_mcp_server(config: &Config, kind: ServerKind) -> anyhow::Result<()> {
    let api_url = match kind {
        ServerKind::Leave => &config.leave_api_url,
        ServerKind::Timesheet => &config.timesheet_api_url,
    };
    let proxy = ToolProxy::new(kind, api_url, Duration::from_secs(config.http_timeout_secs))?;
    info!(%kind, %api_url, "MCP server proxies resource service");
    let server = Data::new(McpServer::new(kind, proxy));

    HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .wrap(NormalizePath::trim())
            .app_data(server.clone())
            .configure(routes::configure_mcp)
    })
    .bind(&config.server_addr)
    .with_context(|| format!("Failed to bind {}", config.server_addr))?
    .run()
    .await?;
    Ok(())
}

/// chat talks to the per-tool REST endpoints, chat-v2 negotiates the transport.
fn mcp_backend(config: &Config, base_url: &str) -> anyhow::Result<Arc<dyn McpBackend>> {
    let backend: Arc<dyn McpBackend> = match config.service {
        ServiceKind::ChatV2 => Arc::new(MultiTransportClient::new(
            base_url,
            config.mcp_proxy_token.clone(),
        )?),
        _ => Arc::new(RestMcpClient::new(base_url)?),
    };
    info!(%base_url, "MCP backend ready");
    Ok(backend)
}

async fn run_chat(config: &Config) -> anyhow::Result<()> {
    let leave = mcp_backend(config, &config.leave_mcp_url)?;
    let timesheet = mcp_backend(config, &config.timesheet_mcp_url)?;
    if !config.llm.is_configured() {
        info!("Azure OpenAI is not configured, chat uses heuristics only");
    }
    let llm = Arc::new(AzureOpenAiClient::new(
        config.llm.clone(),
        Duration::from_secs(config.http_timeout_secs),
    )?);
    let v2 = config.service == ServiceKind::ChatV2;
    let router = IntentRouter::new(leave, timesheet, llm);
    let router = Data::new(if v2 { router.with_follow_up() } else { router });

    let rate = config.rate_chat_per_min;
    HttpServer::new(move || {
        let app = App::new()
            .wrap(Logger::default())
            .wrap(NormalizePath::trim())
            .app_data(router.clone());
        if v2 {
            app.configure(|cfg| routes::configure_chat_v2(cfg, rate))
        } else {
            app.configure(|cfg| routes::configure_chat(cfg, rate))
        }
    })
    .bind(&config.server_addr)
    .with_context(|| format!("Failed to bind {}", config.server_addr))?
    .run()
    .await?;
    Ok(())
}
