//! Static tool, prompt and resource descriptors for both MCP servers.

use serde::ser::{SerializeMap, SerializeStruct};
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;
use strum_macros::{AsRefStr, Display, EnumIter, EnumString};

use crate::{error::ServiceError, models::Arguments};

/// The two business domains fronted by an MCP server.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumString, EnumIter, Display, AsRefStr, Serialize,
    Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ServerKind {
    Leave,
    Timesheet,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamType {
    Integer,
    Number,
    String,
}

impl ParamType {
    fn as_str(&self) -> &'static str {
        match self {
            ParamType::Integer => "integer",
            ParamType::Number => "number",
            ParamType::String => "string",
        }
    }
}

#[derive(Debug)]
pub struct ParamSpec {
    pub name: &'static str,
    pub kind: ParamType,
    pub description: &'static str,
    pub required: bool,
}

#[derive(Debug)]
pub struct ToolDescriptor {
    pub name: &'static str,
    pub description: &'static str,
    /// Verb phrase used in failure text, e.g. "apply leave".
    pub action: &'static str,
    pub params: &'static [ParamSpec],
}

impl ToolDescriptor {
    /// Required parameters that are absent, null or blank in `args`.
    pub fn missing_required(&self, args: &Arguments) -> Vec<&'static str> {
        self.params
            .iter()
            .filter(|p| p.required && !is_present(args.get(p.name)))
            .map(|p| p.name)
            .collect()
    }

    pub fn validate(&self, args: &Arguments) -> Result<(), ServiceError> {
        let missing = self.missing_required(args);
        if missing.is_empty() {
            Ok(())
        } else {
            Err(ServiceError::missing_fields(&missing))
        }
    }
}

fn is_present(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::String(s)) => !s.trim().is_empty(),
        Some(_) => true,
    }
}

struct InputSchema<'a>(&'a [ParamSpec]);

struct Properties<'a>(&'a [ParamSpec]);

impl Serialize for Properties<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for p in self.0 {
            map.serialize_entry(
                p.name,
                &serde_json::json!({ "type": p.kind.as_str(), "description": p.description }),
            )?;
        }
        map.end()
    }
}

impl Serialize for InputSchema<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let required: Vec<&str> = self.0.iter().filter(|p| p.required).map(|p| p.name).collect();
        let mut s = serializer.serialize_struct("InputSchema", 3)?;
        s.serialize_field("type", "object")?;
        s.serialize_field("properties", &Properties(self.0))?;
        s.serialize_field("required", &required)?;
        s.end()
    }
}

impl Serialize for ToolDescriptor {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut s = serializer.serialize_struct("Tool", 3)?;
        s.serialize_field("name", self.name)?;
        s.serialize_field("description", self.description)?;
        s.serialize_field("inputSchema", &InputSchema(self.params))?;
        s.end()
    }
}

#[derive(Debug, Serialize)]
pub struct PromptArgument {
    pub name: &'static str,
    pub description: &'static str,
    pub required: bool,
}

#[derive(Debug, Serialize)]
pub struct PromptDescriptor {
    pub name: &'static str,
    pub description: &'static str,
    pub arguments: &'static [PromptArgument],
}

#[derive(Debug, Serialize)]
pub struct ResourceDescriptor {
    pub uri: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    #[serde(rename = "mimeType")]
    pub mime_type: &'static str,
}

#[derive(Debug, Serialize)]
pub struct ResourceTemplate {
    #[serde(rename = "uriTemplate")]
    pub uri_template: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    #[serde(rename = "mimeType")]
    pub mime_type: &'static str,
}

#[derive(Debug)]
pub struct Catalog {
    pub kind: ServerKind,
    pub title: &'static str,
    pub tools: &'static [ToolDescriptor],
    pub prompts: &'static [PromptDescriptor],
    pub resources: &'static [ResourceDescriptor],
    pub templates: &'static [ResourceTemplate],
}

impl Catalog {
    pub fn for_kind(kind: ServerKind) -> &'static Catalog {
        match kind {
            ServerKind::Leave => &LEAVE,
            ServerKind::Timesheet => &TIMESHEET,
        }
    }

    pub fn find_tool(&self, name: &str) -> Result<&'static ToolDescriptor, ServiceError> {
        self.tools
            .iter()
            .find(|t| t.name == name)
            .ok_or_else(|| ServiceError::NotFound(format!("Tool {name} not found")))
    }

    pub fn find_prompt(&self, name: &str) -> Result<&'static PromptDescriptor, ServiceError> {
        self.prompts
            .iter()
            .find(|p| p.name == name)
            .ok_or_else(|| ServiceError::NotFound(format!("Prompt '{name}' not found")))
    }
}

const EMPLOYEE_ID: ParamSpec = ParamSpec {
    name: "employee_id",
    kind: ParamType::Integer,
    description: "Employee ID",
    required: true,
};

const START_DATE: ParamSpec = ParamSpec {
    name: "start_date",
    kind: ParamType::String,
    description: "Start date (YYYY-MM-DD)",
    required: true,
};

const END_DATE: ParamSpec = ParamSpec {
    name: "end_date",
    kind: ParamType::String,
    description: "End date (YYYY-MM-DD)",
    required: true,
};

static LEAVE: Catalog = Catalog {
    kind: ServerKind::Leave,
    title: "Leave MCP Server",
    tools: &[
        ToolDescriptor {
            name: "apply_leave",
            description: "Apply for leave on behalf of an employee",
            action: "apply leave",
            params: &[
                EMPLOYEE_ID,
                ParamSpec {
                    name: "start_date",
                    kind: ParamType::String,
                    description: "Leave start date (YYYY-MM-DD)",
                    required: true,
                },
                ParamSpec {
                    name: "end_date",
                    kind: ParamType::String,
                    description: "Leave end date (YYYY-MM-DD)",
                    required: true,
                },
                ParamSpec {
                    name: "leave_type",
                    kind: ParamType::String,
                    description: "Type of leave (annual, sick)",
                    required: true,
                },
                ParamSpec {
                    name: "reason",
                    kind: ParamType::String,
                    description: "Optional reason for leave",
                    required: false,
                },
            ],
        },
        ToolDescriptor {
            name: "get_balance",
            description: "Get leave balance for an employee",
            action: "get balance",
            params: &[EMPLOYEE_ID],
        },
        ToolDescriptor {
            name: "list_leave_requests",
            description: "List leave requests submitted by an employee",
            action: "list leave requests",
            params: &[EMPLOYEE_ID],
        },
    ],
    prompts: &[
        PromptDescriptor {
            name: "leave_request_email",
            description: "Generate a professional email template for leave requests",
            arguments: &[
                PromptArgument { name: "employee_name", description: "Name of the employee", required: true },
                PromptArgument { name: "start_date", description: "Leave start date", required: true },
                PromptArgument { name: "end_date", description: "Leave end date", required: true },
                PromptArgument { name: "leave_type", description: "Type of leave", required: true },
                PromptArgument { name: "reason", description: "Reason for leave", required: false },
            ],
        },
        PromptDescriptor {
            name: "leave_policy_summary",
            description: "Generate a summary of leave policies for an employee",
            arguments: &[
                PromptArgument { name: "employee_id", description: "Employee ID to get current balance", required: true },
                PromptArgument { name: "focus_area", description: "Specific area to focus on (annual, sick, etc.)", required: false },
            ],
        },
        PromptDescriptor {
            name: "leave_calendar_planning",
            description: "Help plan leave requests around holidays and team availability",
            arguments: &[
                PromptArgument { name: "month", description: "Month to plan for (YYYY-MM)", required: true },
                PromptArgument { name: "team_size", description: "Size of the team", required: false },
            ],
        },
    ],
    resources: &[
        ResourceDescriptor {
            uri: "leave://policies/annual",
            name: "Annual Leave Policy",
            description: "Complete annual leave policy document",
            mime_type: "text/plain",
        },
        ResourceDescriptor {
            uri: "leave://policies/sick",
            name: "Sick Leave Policy",
            description: "Sick leave policy and procedures",
            mime_type: "text/plain",
        },
        ResourceDescriptor {
            uri: "leave://forms/application",
            name: "Leave Application Form",
            description: "Standard leave application form template",
            mime_type: "text/plain",
        },
        ResourceDescriptor {
            uri: "leave://calendar/holidays",
            name: "Public Holidays Calendar",
            description: "Current year public holidays list",
            mime_type: "application/json",
        },
        ResourceDescriptor {
            uri: "leave://reports/team-status",
            name: "Team Leave Status",
            description: "Current leave status for all team members",
            mime_type: "application/json",
        },
    ],
    templates: &[ResourceTemplate {
        uri_template: "leave://employee/{employee_id}/applications",
        name: "Employee Leave Applications",
        description: "Leave applications submitted by one employee",
        mime_type: "application/json",
    }],
};

static TIMESHEET: Catalog = Catalog {
    kind: ServerKind::Timesheet,
    title: "Timesheet MCP Server",
    tools: &[
        ToolDescriptor {
            name: "add_timesheet_entry",
            description: "Add a timesheet entry for an employee",
            action: "add timesheet entry",
            params: &[
                EMPLOYEE_ID,
                ParamSpec {
                    name: "entry_date",
                    kind: ParamType::String,
                    description: "Entry date (YYYY-MM-DD)",
                    required: true,
                },
                ParamSpec {
                    name: "hours",
                    kind: ParamType::Number,
                    description: "Hours worked",
                    required: true,
                },
                ParamSpec {
                    name: "project",
                    kind: ParamType::String,
                    description: "Project name or code",
                    required: false,
                },
                ParamSpec {
                    name: "notes",
                    kind: ParamType::String,
                    description: "Optional notes about the work",
                    required: false,
                },
            ],
        },
        ToolDescriptor {
            name: "list_timesheet_entries",
            description: "List timesheet entries for an employee",
            action: "list timesheet entries",
            params: &[EMPLOYEE_ID],
        },
        ToolDescriptor {
            name: "get_timesheet_summary",
            description: "Get timesheet summary for an employee for a specific period",
            action: "get timesheet summary",
            params: &[EMPLOYEE_ID, START_DATE, END_DATE],
        },
        ToolDescriptor {
            name: "get_project_hours",
            description: "Get total hours worked on a specific project",
            action: "get project hours",
            params: &[
                ParamSpec {
                    name: "project",
                    kind: ParamType::String,
                    description: "Project name or code",
                    required: true,
                },
                START_DATE,
                END_DATE,
            ],
        },
    ],
    prompts: &[
        PromptDescriptor {
            name: "timesheet_reminder",
            description: "Generate a friendly reminder about timesheet submission",
            arguments: &[
                PromptArgument { name: "employee_name", description: "Name of the employee", required: true },
                PromptArgument { name: "period_end", description: "End date of the timesheet period", required: true },
                PromptArgument { name: "missing_days", description: "Number of missing days", required: false },
            ],
        },
        PromptDescriptor {
            name: "project_time_summary",
            description: "Create a summary of time spent on projects",
            arguments: &[
                PromptArgument { name: "employee_id", description: "Employee ID for data retrieval", required: true },
                PromptArgument { name: "period", description: "Period to summarize (week/month)", required: false },
                PromptArgument { name: "project_filter", description: "Specific project to focus on", required: false },
            ],
        },
        PromptDescriptor {
            name: "overtime_analysis",
            description: "Analyze overtime patterns and provide recommendations",
            arguments: &[
                PromptArgument { name: "employee_id", description: "Employee ID for analysis", required: true },
                PromptArgument { name: "threshold_hours", description: "Daily hours threshold for overtime", required: false },
            ],
        },
    ],
    resources: &[
        ResourceDescriptor {
            uri: "timesheet://policies/submission",
            name: "Timesheet Submission Policy",
            description: "Guidelines for timesheet submission and approval",
            mime_type: "text/plain",
        },
        ResourceDescriptor {
            uri: "timesheet://codes/projects",
            name: "Project Code Directory",
            description: "List of valid project codes and descriptions",
            mime_type: "application/json",
        },
        ResourceDescriptor {
            uri: "timesheet://templates/weekly",
            name: "Weekly Timesheet Template",
            description: "Standard weekly timesheet template",
            mime_type: "text/plain",
        },
        ResourceDescriptor {
            uri: "timesheet://reports/utilization",
            name: "Team Utilization Report",
            description: "Current team utilization rates and trends",
            mime_type: "application/json",
        },
        ResourceDescriptor {
            uri: "timesheet://guidelines/best-practices",
            name: "Time Tracking Best Practices",
            description: "Best practices for accurate time tracking",
            mime_type: "text/plain",
        },
    ],
    templates: &[ResourceTemplate {
        uri_template: "timesheet://employee/{employee_id}/entries",
        name: "Employee Timesheet Entries",
        description: "Timesheet entries logged by one employee",
        mime_type: "application/json",
    }],
};
