use serde_json::Value;
use strum_macros::{AsRefStr, Display, EnumString, IntoStaticStr};
use thiserror::Error;

use crate::{chat::llm::LlmError, mcp::catalog::ServerKind, models::Arguments};

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString, Display, AsRefStr, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum IntentKind {
    ApplyLeave,
    AddTimesheetEntry,
    GetBalance,
    ListEntries,
    GetTimesheetSummary,
    GetProjectHours,
    GetPrompt,
    GetResource,
    Smalltalk,
}

impl IntentKind {
    /// Tool behind the intent, if it is a tool call.
    pub fn tool_name(&self) -> Option<&'static str> {
        match self {
            IntentKind::ApplyLeave => Some("apply_leave"),
            IntentKind::AddTimesheetEntry => Some("add_timesheet_entry"),
            IntentKind::GetBalance => Some("get_balance"),
            IntentKind::ListEntries => Some("list_timesheet_entries"),
            IntentKind::GetTimesheetSummary => Some("get_timesheet_summary"),
            IntentKind::GetProjectHours => Some("get_project_hours"),
            IntentKind::GetPrompt | IntentKind::GetResource | IntentKind::Smalltalk => None,
        }
    }
}

/// One chat message, interpreted. Lives for a single request.
#[derive(Debug, Clone, PartialEq)]
pub struct Intent {
    pub kind: IntentKind,
    pub server: Option<ServerKind>,
    pub employee_id: Option<i64>,
    pub arguments: Arguments,
    pub prompt_name: Option<String>,
    pub resource_uri: Option<String>,
}

impl Intent {
    pub fn new(kind: IntentKind) -> Self {
        Self {
            kind,
            server: None,
            employee_id: None,
            arguments: Arguments::new(),
            prompt_name: None,
            resource_uri: None,
        }
    }
}

#[derive(Error, Debug)]
pub enum StructuringError {
    #[error(transparent)]
    Completion(#[from] LlmError),

    #[error("reply is not a JSON object: {0}")]
    Malformed(String),

    #[error("reply has no intent")]
    MissingIntent,

    #[error("unknown intent '{0}'")]
    UnknownIntent(String),
}

const ARGUMENT_KEYS: [&str; 8] = [
    "start_date",
    "end_date",
    "leave_type",
    "entry_date",
    "hours",
    "project",
    "reason",
    "notes",
];

pub fn structuring_prompt(text: &str) -> String {
    format!(
        "You are an assistant that extracts structured JSON from user messages for a workplace portal.
Return ONLY valid JSON with keys:
- intent: one of 'apply_leave', 'add_timesheet_entry', 'get_balance', 'list_entries', 'get_timesheet_summary', 'get_project_hours', 'get_prompt', 'get_resource', 'smalltalk'
- employee_id (number or null)
- start_date (YYYY-MM-DD or null)
- end_date (YYYY-MM-DD or null)
- leave_type ('annual'|'sick' or null)
- entry_date (YYYY-MM-DD or null)
- hours (number or null)
- project (string or null)
- server ('leave'|'timesheet' or null)
- prompt_name (string or null)
- resource_uri (string or null)
- extract_args (object with relevant prompt arguments or null)
Message: {text}
"
    )
}

/// Parses a structuring reply. The JSON may sit in a ```json fence and its
/// fields may be nested under `arguments`.
pub fn parse_structured(reply: &str) -> Result<Intent, StructuringError> {
    let body = strip_fence(reply);
    let value: Value =
        serde_json::from_str(body).map_err(|e| StructuringError::Malformed(e.to_string()))?;
    let Value::Object(root) = value else {
        return Err(StructuringError::Malformed(body.chars().take(80).collect()));
    };

    let kind = match root.get("intent") {
        Some(Value::String(name)) if !name.trim().is_empty() => name
            .trim()
            .parse::<IntentKind>()
            .map_err(|_| StructuringError::UnknownIntent(name.clone()))?,
        _ => return Err(StructuringError::MissingIntent),
    };

    let nested = root.get("arguments").and_then(Value::as_object);
    let lookup = |key: &str| field(&root, nested, key);

    let mut intent = Intent::new(kind);
    intent.server = lookup("server")
        .and_then(Value::as_str)
        .and_then(|s| s.parse().ok());
    intent.employee_id = lookup("employee_id").and_then(as_int);
    intent.prompt_name = lookup("prompt_name").and_then(as_text);
    intent.resource_uri = lookup("resource_uri").and_then(as_text);

    for key in ARGUMENT_KEYS {
        if let Some(v) = lookup(key) {
            intent.arguments.insert(key.to_string(), v.clone());
        }
    }
    if let Some(Value::Object(extra)) = lookup("extract_args") {
        for (k, v) in extra.iter().filter(|(_, v)| !v.is_null()) {
            intent.arguments.entry(k.clone()).or_insert_with(|| v.clone());
        }
    }
    Ok(intent)
}

fn field<'a>(root: &'a Arguments, nested: Option<&'a Arguments>, key: &str) -> Option<&'a Value> {
    root.get(key)
        .filter(|v| !v.is_null())
        .or_else(|| nested.and_then(|n| n.get(key)).filter(|v| !v.is_null()))
}

fn strip_fence(reply: &str) -> &str {
    let trimmed = reply.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // drop the language tag line
    let rest = rest.split_once('\n').map_or("", |(_, body)| body);
    rest.trim_end().strip_suffix("```").unwrap_or(rest).trim()
}

fn as_int(v: &Value) -> Option<i64> {
    match v {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn as_text(v: &Value) -> Option<String> {
    v.as_str()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}
