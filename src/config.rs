use anyhow::{Context, Result};
use dotenvy::dotenv;
use std::env;
use std::str::FromStr;
use strum_macros::{AsRefStr, Display, EnumString};

/// Which service this process runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString, Display, AsRefStr)]
#[strum(serialize_all = "kebab-case")]
pub enum ServiceKind {
    LeaveApi,
    TimesheetApi,
    LeaveMcp,
    TimesheetMcp,
    Chat,
    ChatV2,
}

impl ServiceKind {
    pub fn default_port(&self) -> u16 {
        match self {
            ServiceKind::LeaveApi => 8001,
            ServiceKind::TimesheetApi => 8002,
            ServiceKind::LeaveMcp => 8011,
            ServiceKind::TimesheetMcp => 8012,
            ServiceKind::Chat => 8000,
            ServiceKind::ChatV2 => 8010,
        }
    }
}

/// Azure OpenAI settings for the text-completion capability.
#[derive(Clone, Debug, Default)]
pub struct LlmSettings {
    pub endpoint: Option<String>,
    pub key: Option<String>,
    pub api_version: String,
    pub deployment: String,
}

impl LlmSettings {
    pub fn is_configured(&self) -> bool {
        self.endpoint.as_deref().is_some_and(|e| !e.is_empty())
            && self.key.as_deref().is_some_and(|k| !k.is_empty())
    }
}

#[derive(Clone, Debug)]
pub struct Config {
    pub service: ServiceKind,
    pub server_addr: String,

    pub leave_database_url: String,
    pub timesheet_database_url: String,
    pub leave_seed_on_start: bool,
    pub timesheet_seed_on_start: bool,

    // Upstreams
    pub leave_api_url: String,
    pub timesheet_api_url: String,
    pub leave_mcp_url: String,
    pub timesheet_mcp_url: String,
    pub http_timeout_secs: u64,
    pub mcp_proxy_token: Option<String>,

    pub llm: LlmSettings,

    // Rate limiting
    pub rate_chat_per_min: u32,

    pub log_dir: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv().ok();

        let service: ServiceKind = env::var("SERVICE")
            .unwrap_or_else(|_| "leave-api".to_string())
            .parse()
            .context("SERVICE must be one of leave-api, timesheet-api, leave-mcp, timesheet-mcp, chat, chat-v2")?;

        let server_addr = match env::var("SERVER_ADDR") {
            Ok(addr) => addr,
            Err(_) => {
                let port: u16 = env_or("PORT", service.default_port())?;
                format!("0.0.0.0:{port}")
            }
        };

        Ok(Self {
            service,
            server_addr,

            leave_database_url: env::var("LEAVE_DATABASE_URL")
                .unwrap_or_else(|_| "sqlite://data/leave/leave.db".to_string()),
            timesheet_database_url: env::var("TIMESHEET_DATABASE_URL")
                .unwrap_or_else(|_| "sqlite://data/timesheet/timesheet.db".to_string()),
            leave_seed_on_start: env_flag("LEAVE_SEED_ON_START", true),
            timesheet_seed_on_start: env_flag("TIMESHEET_SEED_ON_START", true),

            leave_api_url: trimmed_url("LEAVE_API_URL", "http://localhost:8001"),
            timesheet_api_url: trimmed_url("TIMESHEET_API_URL", "http://localhost:8002"),
            leave_mcp_url: trimmed_url("LEAVE_MCP_URL", "http://localhost:8011"),
            timesheet_mcp_url: trimmed_url("TIMESHEET_MCP_URL", "http://localhost:8012"),
            http_timeout_secs: env_or("HTTP_TIMEOUT", 30)?,
            mcp_proxy_token: env::var("MCP_PROXY_TOKEN").ok().filter(|t| !t.is_empty()),

            llm: LlmSettings {
                endpoint: env::var("AZURE_OPENAI_ENDPOINT").ok(),
                key: env::var("AZURE_OPENAI_KEY").ok(),
                api_version: env::var("AZURE_OPENAI_API_VERSION")
                    .unwrap_or_else(|_| "2025-04-01-preview".to_string()),
                deployment: env::var("AZURE_OPENAI_DEPLOYMENT")
                    .unwrap_or_else(|_| "gpt-4o-mini".to_string()),
            },

            rate_chat_per_min: env_or("RATE_CHAT_PER_MIN", 60)?,

            log_dir: env::var("LOG_DIR").unwrap_or_else(|_| "logs".to_string()),
        })
    }

    /// Database URL of the resource service this process runs, if any.
    pub fn database_url(&self) -> Option<&str> {
        match self.service {
            ServiceKind::LeaveApi => Some(&self.leave_database_url),
            ServiceKind::TimesheetApi => Some(&self.timesheet_database_url),
            _ => None,
        }
    }
}

fn env_or<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{key} has an invalid value: {raw}")),
        Err(_) => Ok(default),
    }
}

fn env_flag(key: &str, default: bool) -> bool {
    env::var(key)
        .map(|v| parse_flag(&v))
        .unwrap_or(default)
}

fn parse_flag(raw: &str) -> bool {
    matches!(raw.trim().to_lowercase().as_str(), "1" | "true" | "yes")
}

fn trimmed_url(key: &str, default: &str) -> String {
    env::var(key)
        .unwrap_or_else(|_| default.to_string())
        .trim_end_matches('/')
        .to_string()
}
