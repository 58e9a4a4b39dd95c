//! Turns one chat message into one MCP call.

use std::sync::Arc;

use serde::Serialize;
use serde_json::{Value, json};
use tracing::{info, warn};

use crate::{
    chat::{
        backend::McpBackend,
        heuristics::{apply_safety_override, classify, positional_hours_and_date},
        intent::{Intent, IntentKind, StructuringError, parse_structured, structuring_prompt},
        llm::{LlmError, LlmOverride, TextCompletion},
    },
    error::ServiceError,
    mcp::{
        catalog::ServerKind,
        proxy::{int_arg, number_arg, opt_str_arg},
    },
    models::Arguments,
};

pub const LLM_NOT_CONFIGURED: &str =
    "LLM is not configured. Please set AZURE_OPENAI_ENDPOINT and AZURE_OPENAI_KEY.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RoutingMode {
    Llm,
    Heuristic,
}

#[derive(Debug, Serialize)]
pub struct ChatReply {
    pub routing_mode: RoutingMode,
    pub action: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server: Option<ServerKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_uri: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub missing: Option<Vec<&'static str>>,
}

impl ChatReply {
    fn new(routing_mode: RoutingMode, action: &'static str) -> Self {
        Self {
            routing_mode,
            action,
            server: None,
            prompt_name: None,
            resource_uri: None,
            result: None,
            message: None,
            missing: None,
        }
    }

    /// Asks the user for what is missing. An absent employee id is asked
    /// for first, then dates or the project, then anything else by name.
    fn follow_up(routing_mode: RoutingMode, missing: Vec<&'static str>) -> Self {
        let dates_only = missing.iter().all(|k| matches!(*k, "start_date" | "end_date"));
        let (action, message) = if missing.contains(&"employee_id") {
            ("need_employee_id", "Please provide your employee_id".to_string())
        } else if dates_only {
            ("need_dates", "Please provide start and end dates (YYYY-MM-DD)".to_string())
        } else if missing.contains(&"project") {
            ("need_project", "Please specify a project code/name".to_string())
        } else {
            ("need_args", format!("Please provide: {}", missing.join(", ")))
        };
        let mut reply = Self::new(routing_mode, action);
        reply.message = Some(message);
        reply.missing = Some(missing);
        reply
    }

    fn with_result(mut self, result: Value) -> Self {
        self.result = Some(result);
        self
    }

    fn on(mut self, server: ServerKind) -> Self {
        self.server = Some(server);
        self
    }
}

pub struct IntentRouter {
    leave: Arc<dyn McpBackend>,
    timesheet: Arc<dyn McpBackend>,
    llm: Arc<dyn TextCompletion>,
    follow_up: bool,
}

impl IntentRouter {
    pub fn new(
        leave: Arc<dyn McpBackend>,
        timesheet: Arc<dyn McpBackend>,
        llm: Arc<dyn TextCompletion>,
    ) -> Self {
        Self { leave, timesheet, llm, follow_up: false }
    }

    /// Missing tool arguments produce a `need_*` reply instead of a
    /// validation error.
    pub fn with_follow_up(mut self) -> Self {
        self.follow_up = true;
        self
    }

    pub fn backend(&self, server: ServerKind) -> &dyn McpBackend {
        match server {
            ServerKind::Leave => self.leave.as_ref(),
            ServerKind::Timesheet => self.timesheet.as_ref(),
        }
    }

    async fn structure(&self, text: &str, overrides: Option<&LlmOverride>) -> Result<Intent, StructuringError> {
        let reply = self.llm.complete(&structuring_prompt(text), overrides).await?;
        parse_structured(&reply)
    }

    /// LLM structuring first, keyword heuristics when that fails for any reason.
    pub async fn route(
        &self,
        text: &str,
        employee_id: Option<i64>,
        overrides: Option<&LlmOverride>,
    ) -> Result<ChatReply, ServiceError> {
        let (mut intent, mode) = match self.structure(text, overrides).await {
            Ok(intent) => (intent, RoutingMode::Llm),
            Err(e) => {
                info!(reason = %e, "Structuring unavailable, using heuristics");
                (classify(text), RoutingMode::Heuristic)
            }
        };
        apply_safety_override(&mut intent, text);
        if intent.employee_id.is_none() {
            intent.employee_id = employee_id;
        }
        info!(intent = %intent.kind, ?mode, employee_id = ?intent.employee_id, "Chat intent resolved");

        let lower = text.to_lowercase();
        match intent.kind {
            IntentKind::GetPrompt => self.prompt(intent, &lower, mode).await,
            IntentKind::GetResource => self.resource(intent, &lower, mode).await,
            IntentKind::Smalltalk => self.smalltalk(text, overrides, mode).await,
            kind => {
                let (server, args, missing) = tool_arguments(&intent, &lower)?;
                if !missing.is_empty() {
                    if self.follow_up {
                        return Ok(ChatReply::follow_up(mode, missing));
                    }
                    return Err(ServiceError::missing_fields(&missing));
                }
                let tool = kind.tool_name().unwrap_or_default();
                let result = self.backend(server).call_tool(tool, &args).await?;
                Ok(ChatReply::new(mode, kind.into()).with_result(result))
            }
        }
    }

    async fn prompt(&self, mut intent: Intent, lower: &str, mode: RoutingMode) -> Result<ChatReply, ServiceError> {
        let server = intent.server.unwrap_or_else(|| server_from_text(lower));
        let Some(name) = intent.prompt_name.take().or_else(|| detect_prompt(lower, server)) else {
            return match self.backend(server).list_prompts().await {
                Ok(prompts) => Ok(ChatReply::new(mode, "list_prompts").on(server).with_result(json!(prompts))),
                Err(e) => {
                    warn!(%server, error = %e, "Prompt listing failed");
                    Err(ServiceError::Validation("Please specify a prompt name".into()))
                }
            };
        };

        let mut args = intent.arguments;
        if let Some(id) = intent.employee_id {
            args.entry("employee_id").or_insert(json!(id));
        }
        let result = self.backend(server).get_prompt(&name, &args).await?;
        let mut reply = ChatReply::new(mode, "get_prompt").on(server).with_result(result);
        reply.prompt_name = Some(name);
        Ok(reply)
    }

    async fn resource(&self, mut intent: Intent, lower: &str, mode: RoutingMode) -> Result<ChatReply, ServiceError> {
        let server = intent.server.unwrap_or_else(|| server_from_text(lower));
        let Some(uri) = intent.resource_uri.take().or_else(|| detect_resource(lower)) else {
            return match self.backend(server).list_resources().await {
                Ok(resources) => {
                    Ok(ChatReply::new(mode, "list_resources").on(server).with_result(json!(resources)))
                }
                Err(e) => {
                    warn!(%server, error = %e, "Resource listing failed");
                    Err(ServiceError::Validation("Please specify a resource URI".into()))
                }
            };
        };

        // the URI scheme names the owning server
        let server = if uri.starts_with("leave://") {
            ServerKind::Leave
        } else if uri.starts_with("timesheet://") {
            ServerKind::Timesheet
        } else {
            server
        };
        let result = self.backend(server).read_resource(&uri).await?;
        let mut reply = ChatReply::new(mode, "get_resource").on(server).with_result(result);
        reply.resource_uri = Some(uri);
        Ok(reply)
    }

    async fn smalltalk(
        &self,
        text: &str,
        overrides: Option<&LlmOverride>,
        mode: RoutingMode,
    ) -> Result<ChatReply, ServiceError> {
        match self.llm.complete(text, overrides).await {
            Ok(reply) => Ok(ChatReply::new(mode, "smalltalk").with_result(Value::String(reply))),
            Err(LlmError::NotConfigured) => {
                Ok(ChatReply::new(mode, "smalltalk").with_result(json!(LLM_NOT_CONFIGURED)))
            }
            Err(e) => Err(ServiceError::Transport(e.to_string())),
        }
    }
}

fn server_from_text(lower: &str) -> ServerKind {
    if lower.contains("leave") {
        ServerKind::Leave
    } else {
        ServerKind::Timesheet
    }
}

fn detect_prompt(lower: &str, server: ServerKind) -> Option<String> {
    let leave = server == ServerKind::Leave;
    let name = if lower.contains("email") || lower.contains("request") {
        if leave { "leave_request_email" } else { "timesheet_reminder" }
    } else if lower.contains("policy") || lower.contains("summary") {
        if leave { "leave_policy_summary" } else { "project_time_summary" }
    } else if lower.contains("planning") || lower.contains("calendar") {
        if leave { "leave_calendar_planning" } else { "overtime_analysis" }
    } else {
        return None;
    };
    Some(name.to_string())
}

fn detect_resource(lower: &str) -> Option<String> {
    let has = |w: &str| lower.contains(w);
    let uri = if has("policy") && has("annual") {
        "leave://policies/annual"
    } else if has("policy") && has("sick") {
        "leave://policies/sick"
    } else if has("form") || has("application") {
        "leave://forms/application"
    } else if has("holiday") || has("calendar") {
        "leave://calendar/holidays"
    } else if has("team") && has("status") {
        "leave://reports/team-status"
    } else if has("submission") && has("timesheet") {
        "timesheet://policies/submission"
    } else if has("project") && has("code") {
        "timesheet://codes/projects"
    } else if has("template") {
        "timesheet://templates/weekly"
    } else if has("utilization") {
        "timesheet://reports/utilization"
    } else if has("best") && has("practice") {
        "timesheet://guidelines/best-practices"
    } else {
        return None;
    };
    Some(uri.to_string())
}

/// Builds the tool arguments for a tool intent. Required arguments that could
/// not be found are returned by name.
fn tool_arguments(
    intent: &Intent,
    lower: &str,
) -> Result<(ServerKind, Arguments, Vec<&'static str>), ServiceError> {
    let parsed = &intent.arguments;
    let mut args = Arguments::new();
    let mut missing = Vec::new();

    let mut need = |args: &mut Arguments, key: &'static str, value: Option<Value>| match value {
        Some(v) => {
            args.insert(key.to_string(), v);
        }
        None => missing.push(key),
    };
    let text = |key: &str| opt_str_arg(parsed, key).map(Value::String);

    let server = match intent.kind {
        IntentKind::ApplyLeave => {
            need(&mut args, "employee_id", intent.employee_id.map(Value::from));
            need(&mut args, "start_date", text("start_date"));
            need(&mut args, "end_date", text("end_date"));
            let default_type = if lower.contains("sick") { "sick" } else { "annual" };
            let leave_type = opt_str_arg(parsed, "leave_type").unwrap_or_else(|| default_type.to_string());
            args.insert("leave_type".into(), json!(leave_type));
            if let Some(reason) = text("reason") {
                args.insert("reason".into(), reason);
            }
            ServerKind::Leave
        }
        IntentKind::GetBalance => {
            need(&mut args, "employee_id", intent.employee_id.map(Value::from));
            ServerKind::Leave
        }
        IntentKind::ListEntries => {
            need(&mut args, "employee_id", intent.employee_id.map(Value::from));
            ServerKind::Timesheet
        }
        IntentKind::AddTimesheetEntry => {
            need(&mut args, "employee_id", intent.employee_id.map(Value::from));
            let mut entry_date = text("entry_date");
            let mut hours = number_arg(parsed, "hours").ok().map(Value::from);
            if entry_date.is_none() || hours.is_none() {
                if let Some((h, date)) = positional_hours_and_date(lower) {
                    hours = hours.or(Some(json!(h)));
                    entry_date = entry_date.or(Some(json!(date)));
                }
            }
            need(&mut args, "entry_date", entry_date);
            need(&mut args, "hours", hours);
            for key in ["project", "notes"] {
                if let Some(v) = text(key) {
                    args.insert(key.to_string(), v);
                }
            }
            ServerKind::Timesheet
        }
        IntentKind::GetTimesheetSummary => {
            need(&mut args, "employee_id", intent.employee_id.map(Value::from));
            need(&mut args, "start_date", text("start_date"));
            need(&mut args, "end_date", text("end_date"));
            ServerKind::Timesheet
        }
        IntentKind::GetProjectHours => {
            need(&mut args, "project", text("project"));
            need(&mut args, "start_date", text("start_date"));
            need(&mut args, "end_date", text("end_date"));
            ServerKind::Timesheet
        }
        IntentKind::GetPrompt | IntentKind::GetResource | IntentKind::Smalltalk => {
            return Err(ServiceError::Validation(format!("{} is not a tool", intent.kind)));
        }
    };

    // employee ids from the structuring step may arrive as text
    if let Ok(id) = int_arg(&args, "employee_id") {
        args.insert("employee_id".into(), json!(id));
    }
    Ok((server, args, missing))
}
