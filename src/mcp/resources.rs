use chrono::{Datelike, Local};
use serde_json::{Value, json};
use tracing::warn;

use crate::{
    error::ServiceError,
    mcp::{catalog::ServerKind, proxy::ToolProxy},
    models::ResourceContent,
};

const TEXT: &str = "text/plain";
const JSON: &str = "application/json";

const ANNUAL_POLICY: &str = "ANNUAL LEAVE POLICY

1. ENTITLEMENT
   - Full-time employees: 25 days per calendar year
   - Part-time employees: Pro-rated based on hours worked
   - Accrual starts from first day of employment

2. CARRYOVER
   - Maximum 5 days can be carried to next year
   - Must be used within first quarter of new year
   - No cash payment for unused leave

3. APPLICATION PROCESS
   - Submit request minimum 2 weeks in advance
   - Use official leave management system
   - Manager approval required
   - HR notification automatic

4. RESTRICTIONS
   - Maximum 15 consecutive days without special approval
   - No more than 50% of team on leave simultaneously
   - Blackout periods apply during peak business periods

5. PUBLIC HOLIDAYS
   - Do not count against annual leave entitlement
   - If holiday falls during leave period, leave day is credited back";

const SICK_POLICY: &str = "SICK LEAVE POLICY

1. ENTITLEMENT
   - 10 days per calendar year for all employees
   - No carryover to following year
   - Resets on January 1st

2. USAGE
   - For personal illness or injury
   - For medical appointments that cannot be scheduled outside work hours
   - For caring for immediate family members who are ill

3. CERTIFICATION
   - Self-certification for 1-2 days
   - Medical certificate required for 3+ consecutive days
   - Return-to-work certificate may be required

4. NOTIFICATION
   - Notify manager as soon as possible
   - Before start of shift if possible
   - Update daily for extended absences

5. EXTENDED ILLNESS
   - Beyond 10 days moves to long-term disability
   - Contact HR for assistance and options
   - May require independent medical examination";

const APPLICATION_FORM: &str = "LEAVE APPLICATION FORM

Employee Information:
- Name: ________________
- Employee ID: ________________
- Department: ________________
- Manager: ________________

Leave Details:
- Leave Type: [ ] Annual [ ] Sick [ ] Personal [ ] Other: ________
- Start Date: ________________
- End Date: ________________
- Total Days: ________________
- Return Date: ________________

Reason (if applicable):
_________________________________________________
_________________________________________________

Coverage Arrangements:
- Work to be delegated to: ________________
- Emergency contact: ________________
- Email/phone during leave: ________________

Employee Signature: ________________    Date: ________

Manager Approval:
[ ] Approved [ ] Declined [ ] Pending

Manager Signature: ________________    Date: ________

HR Use Only:
- Leave balance before: ________
- Leave balance after: ________
- Processed by: ________________";

const SUBMISSION_POLICY: &str = "TIMESHEET SUBMISSION POLICY

1. SUBMISSION REQUIREMENTS
   - Weekly submission by Friday 5:00 PM
   - All days must be accounted for (including PTO, holidays)
   - Minimum time increment: 15 minutes (0.25 hours)
   - Maximum daily hours: 12 (requires manager approval for >10)

2. PROJECT CODES
   - All time must be allocated to valid project codes
   - Use \"ADMIN\" for administrative tasks
   - Use \"TRAIN\" for training and development
   - Use \"MEET\" for general meetings

3. DESCRIPTIONS
   - Brief description required for each entry
   - Include specific tasks or achievements
   - Note any issues or blockers encountered
   - Reference ticket numbers where applicable

4. APPROVAL PROCESS
   - Manager review required within 3 business days
   - Automated approval for regular patterns
   - Special approval needed for overtime
   - Corrections must be resubmitted

5. LATE SUBMISSIONS
   - Grace period: 1 business day after deadline
   - Payroll delays possible for extended lateness
   - Manager notification for repeated late submissions";

const WEEKLY_TEMPLATE: &str = "WEEKLY TIMESHEET TEMPLATE

Employee: _______________  Week Ending: _______________

        | Mon | Tue | Wed | Thu | Fri | Sat | Sun | Total |
--------|-----|-----|-----|-----|-----|-----|-----|-------|
PROJ001 |     |     |     |     |     |     |     |       |
PROJ002 |     |     |     |     |     |     |     |       |
ADMIN   |     |     |     |     |     |     |     |       |
TRAIN   |     |     |     |     |     |     |     |       |
MEET    |     |     |     |     |     |     |     |       |
PTO     |     |     |     |     |     |     |     |       |
--------|-----|-----|-----|-----|-----|-----|-----|-------|
TOTAL   |     |     |     |     |     |     |     |       |

DAILY NOTES:
Monday: ________________________________
Tuesday: _______________________________
Wednesday: _____________________________
Thursday: ______________________________
Friday: ________________________________

WEEKLY SUMMARY:
Major accomplishments: _________________
Challenges/Blockers: __________________

Employee Signature: ___________  Date: _______
Manager Approval: _____________  Date: _______";

const BEST_PRACTICES: &str = "TIME TRACKING BEST PRACTICES

1. CONSISTENCY
   - Log time daily, not weekly
   - Use consistent project codes
   - Set daily reminders if needed

2. ACCURACY
   - Round to nearest 15 minutes
   - Be honest about actual time spent
   - Track all work-related activities

3. DETAIL LEVEL
   - Include specific task descriptions
   - Reference tickets or requirements
   - Note any blockers or issues

4. PROJECT ALLOCATION
   - Understand client vs. internal time
   - Ask for clarification on project codes
   - Split time appropriately across projects

5. COMMUNICATION
   - Discuss unclear time allocation with manager
   - Report unusual patterns or overtime
   - Provide context for unusual entries

REMEMBER: Good time tracking helps with:
- Accurate client billing
- Project planning and estimation
- Resource allocation decisions
- Work-life balance monitoring";

const TEAM_SIZE: usize = 5;
const TARGET_UTILIZATION: f64 = 75.0;

/// Reads one resource of the given server. Live reports fall back to demo
/// data when the resource service is unreachable.
pub async fn read_resource(
    proxy: &ToolProxy,
    kind: ServerKind,
    uri: &str,
) -> Result<ResourceContent, ServiceError> {
    let (mime, text) = match (kind, uri) {
        (ServerKind::Leave, "leave://policies/annual") => (TEXT, ANNUAL_POLICY.to_string()),
        (ServerKind::Leave, "leave://policies/sick") => (TEXT, SICK_POLICY.to_string()),
        (ServerKind::Leave, "leave://forms/application") => (TEXT, APPLICATION_FORM.to_string()),
        (ServerKind::Leave, "leave://calendar/holidays") => (JSON, pretty(&holidays(Local::now().year()))),
        (ServerKind::Leave, "leave://reports/team-status") => (JSON, pretty(&team_status(proxy).await)),
        (ServerKind::Timesheet, "timesheet://policies/submission") => (TEXT, SUBMISSION_POLICY.to_string()),
        (ServerKind::Timesheet, "timesheet://codes/projects") => (JSON, pretty(&project_codes())),
        (ServerKind::Timesheet, "timesheet://templates/weekly") => (TEXT, WEEKLY_TEMPLATE.to_string()),
        (ServerKind::Timesheet, "timesheet://reports/utilization") => (JSON, pretty(&utilization(proxy).await)),
        (ServerKind::Timesheet, "timesheet://guidelines/best-practices") => (TEXT, BEST_PRACTICES.to_string()),
        _ => match employee_resource(kind, uri) {
            Some((employee_id, collection)) => (JSON, employee_listing(proxy, employee_id, collection).await),
            None => return Err(ServiceError::NotFound(format!("Resource '{uri}' not found"))),
        },
    };

    Ok(ResourceContent {
        uri: uri.to_string(),
        mime_type: mime.to_string(),
        text,
    })
}

fn pretty(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}

/// Matches the templated `…://employee/{employee_id}/…` URIs and returns the
/// employee id plus the resource service collection backing it.
fn employee_resource(kind: ServerKind, uri: &str) -> Option<(i64, &'static str)> {
    let (prefix, suffix, collection) = match kind {
        ServerKind::Leave => ("leave://employee/", "/applications", "leave-requests"),
        ServerKind::Timesheet => ("timesheet://employee/", "/entries", "entries"),
    };
    let id = uri.strip_prefix(prefix)?.strip_suffix(suffix)?;
    id.parse().ok().map(|id| (id, collection))
}

async fn employee_listing(proxy: &ToolProxy, employee_id: i64, collection: &str) -> String {
    match proxy
        .get_json(&["employees", &employee_id.to_string(), collection])
        .await
    {
        Ok(body) => pretty(&body),
        Err(e) => {
            warn!(employee_id, error = %e, "Employee resource lookup failed");
            json!({ "error": format!("Failed to get {collection} for employee {employee_id}") })
                .to_string()
        }
    }
}

fn holidays(year: i32) -> Value {
    json!({
        "year": year,
        "holidays": [
            {"date": format!("{year}-01-01"), "name": "New Year's Day"},
            {"date": format!("{year}-07-04"), "name": "Independence Day"},
            {"date": format!("{year}-09-02"), "name": "Labor Day"},
            {"date": format!("{year}-11-28"), "name": "Thanksgiving"},
            {"date": format!("{year}-12-25"), "name": "Christmas Day"},
        ]
    })
}

fn project_codes() -> Value {
    let project = |code: &str, name: &str, client: &str, billable: bool| {
        json!({"code": code, "name": name, "client": client, "status": "active", "billable": billable})
    };
    json!({
        "updated": Local::now().to_rfc3339(),
        "projects": [
            project("PROJ001", "Customer Portal Development", "TechCorp Inc", true),
            project("PROJ002", "Mobile App Redesign", "StartupXYZ", true),
            project("PROJ003", "Internal Tools Maintenance", "Internal", false),
            project("ADMIN", "Administrative Tasks", "Internal", false),
            project("TRAIN", "Training & Development", "Internal", false),
            project("MEET", "Meetings & Collaboration", "Internal", false),
        ]
    })
}

async fn employees(proxy: &ToolProxy) -> Option<Vec<Value>> {
    match proxy.get_json(&["employees"]).await {
        Ok(Value::Array(list)) => Some(list.into_iter().take(TEAM_SIZE).collect()),
        Ok(_) => None,
        Err(e) => {
            warn!(error = %e, "Employee list unavailable, serving demo report");
            None
        }
    }
}

async fn team_status(proxy: &ToolProxy) -> Value {
    let generated_at = Local::now().to_rfc3339();
    let Some(employees) = employees(proxy).await else {
        return json!({
            "generated_at": generated_at,
            "note": "Demo data - API unavailable",
            "team_members": [
                {
                    "employee_id": 1,
                    "name": "John Doe",
                    "leave_balance": {"annual_balance": 15, "sick_balance": 8},
                    "upcoming_leave": [{"start_date": "2025-09-01", "end_date": "2025-09-05", "status": "approved"}]
                },
                {
                    "employee_id": 2,
                    "name": "Jane Smith",
                    "leave_balance": {"annual_balance": 20, "sick_balance": 10},
                    "upcoming_leave": []
                }
            ]
        });
    };

    let mut members = Vec::with_capacity(employees.len());
    for employee in employees {
        let id = employee["id"].to_string();
        let balance = proxy
            .get_json(&["employees", &id, "balance"])
            .await
            .unwrap_or_else(|_| json!("unavailable"));
        let upcoming: Vec<Value> = match proxy.get_json(&["employees", &id, "leave-requests"]).await {
            Ok(Value::Array(requests)) => requests
                .into_iter()
                .filter(|r| matches!(r["status"].as_str(), Some("pending" | "approved")))
                .map(|r| json!({"start_date": r["start_date"], "end_date": r["end_date"], "status": r["status"]}))
                .collect(),
            _ => Vec::new(),
        };
        members.push(json!({
            "employee_id": employee["id"],
            "name": employee["name"],
            "leave_balance": balance,
            "upcoming_leave": upcoming,
        }));
    }
    json!({"generated_at": generated_at, "team_members": members})
}

async fn utilization(proxy: &ToolProxy) -> Value {
    let generated_at = Local::now().to_rfc3339();
    let Some(employees) = employees(proxy).await else {
        return json!({
            "generated_at": generated_at,
            "report_period": "Current Week",
            "note": "Demo data - API unavailable",
            "team_utilization": [
                {"employee_id": 1, "name": "John Doe", "total_hours": 40.0, "billable_hours": 32.0,
                 "utilization_rate": 80.0, "target_rate": TARGET_UTILIZATION},
                {"employee_id": 2, "name": "Jane Smith", "total_hours": 38.0, "billable_hours": 28.0,
                 "utilization_rate": 73.7, "target_rate": TARGET_UTILIZATION}
            ]
        });
    };

    let mut rows = Vec::with_capacity(employees.len());
    for employee in employees {
        let id = employee["id"].to_string();
        let entries = match proxy.get_json(&["employees", &id, "entries"]).await {
            Ok(Value::Array(entries)) => entries,
            _ => Vec::new(),
        };
        let (total, billable) = billable_split(&entries);
        rows.push(json!({
            "employee_id": employee["id"],
            "name": employee["name"],
            "total_hours": total,
            "billable_hours": billable,
            "utilization_rate": utilization_rate(total, billable),
            "target_rate": TARGET_UTILIZATION,
        }));
    }
    json!({"generated_at": generated_at, "report_period": "Current Week", "team_utilization": rows})
}

/// Total and billable hours over the 7 most recent entries. Client projects
/// carry a `PROJ` code.
fn billable_split(entries: &[Value]) -> (f64, f64) {
    entries.iter().take(7).fold((0.0, 0.0), |(total, billable), entry| {
        let hours = entry["hours"].as_f64().unwrap_or(0.0);
        let is_billable = entry["project"].as_str().is_some_and(|p| p.starts_with("PROJ"));
        (total + hours, if is_billable { billable + hours } else { billable })
    })
}

fn utilization_rate(total: f64, billable: f64) -> f64 {
    let rate = billable / total.max(1.0) * 100.0;
    (rate * 10.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn offline(kind: ServerKind) -> ToolProxy {
        ToolProxy::new(kind, "http://127.0.0.1:1", Duration::from_secs(1)).unwrap()
    }

    #[actix_web::test]
    async fn static_policy_is_plain_text() {
        let content = read_resource(&offline(ServerKind::Leave), ServerKind::Leave, "leave://policies/sick")
            .await
            .unwrap();
        assert_eq!(content.mime_type, "text/plain");
        assert!(content.text.starts_with("SICK LEAVE POLICY"));
    }

    #[actix_web::test]
    async fn holidays_are_valid_json_for_current_year() {
        let content = read_resource(&offline(ServerKind::Leave), ServerKind::Leave, "leave://calendar/holidays")
            .await
            .unwrap();
        let body: Value = serde_json::from_str(&content.text).unwrap();
        assert_eq!(body["year"], Local::now().year());
        assert_eq!(body["holidays"].as_array().unwrap().len(), 5);
    }

    #[actix_web::test]
    async fn unreachable_api_serves_demo_report() {
        let content = read_resource(
            &offline(ServerKind::Timesheet),
            ServerKind::Timesheet,
            "timesheet://reports/utilization",
        )
        .await
        .unwrap();
        let body: Value = serde_json::from_str(&content.text).unwrap();
        assert_eq!(body["note"], "Demo data - API unavailable");
    }

    #[actix_web::test]
    async fn team_status_uses_live_data() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/employees")
            .with_body(r#"[{"id":1,"name":"Alice Johnson","email":"alice@example.com"}]"#)
            .create_async()
            .await;
        server
            .mock("GET", "/employees/1/balance")
            .with_body(r#"{"employee_id":1,"annual_balance":20,"sick_balance":10}"#)
            .create_async()
            .await;
        server
            .mock("GET", "/employees/1/leave-requests")
            .with_body(
                r#"[{"start_date":"2025-09-10","end_date":"2025-09-12","status":"pending"},
                    {"start_date":"2025-08-01","end_date":"2025-08-01","status":"rejected"}]"#,
            )
            .create_async()
            .await;

        let proxy = ToolProxy::new(ServerKind::Leave, &server.url(), Duration::from_secs(5)).unwrap();
        let content = read_resource(&proxy, ServerKind::Leave, "leave://reports/team-status")
            .await
            .unwrap();
        let body: Value = serde_json::from_str(&content.text).unwrap();

        let member = &body["team_members"][0];
        assert_eq!(member["name"], "Alice Johnson");
        assert_eq!(member["leave_balance"]["annual_balance"], 20);
        assert_eq!(member["upcoming_leave"].as_array().unwrap().len(), 1);
        assert!(body.get("note").is_none());
    }

    #[actix_web::test]
    async fn templated_employee_uri_reads_entries() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/employees/2/entries")
            .with_body(r#"[{"id":1,"hours":7.0}]"#)
            .create_async()
            .await;

        let proxy = ToolProxy::new(ServerKind::Timesheet, &server.url(), Duration::from_secs(5)).unwrap();
        let content = read_resource(&proxy, ServerKind::Timesheet, "timesheet://employee/2/entries")
            .await
            .unwrap();
        let body: Value = serde_json::from_str(&content.text).unwrap();
        assert_eq!(body[0]["hours"], 7.0);
    }

    #[actix_web::test]
    async fn other_servers_uri_is_not_found() {
        let err = read_resource(
            &offline(ServerKind::Timesheet),
            ServerKind::Timesheet,
            "leave://policies/annual",
        )
        .await
        .unwrap_err();
        assert_eq!(err.to_string(), "Resource 'leave://policies/annual' not found");
    }

    #[test]
    fn utilization_counts_proj_codes_as_billable() {
        let entries = vec![
            json!({"hours": 6.0, "project": "PROJ001"}),
            json!({"hours": 2.0, "project": "ADMIN"}),
            json!({"hours": 1.0}),
        ];
        let (total, billable) = billable_split(&entries);
        assert_eq!((total, billable), (9.0, 6.0));
        assert_eq!(utilization_rate(total, billable), 66.7);
        assert_eq!(utilization_rate(0.0, 0.0), 0.0);
    }
}
