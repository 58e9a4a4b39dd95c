use chrono::Local;
use serde_json::Value;
use tracing::warn;

use crate::{
    error::ServiceError,
    mcp::proxy::{ToolProxy, int_arg, opt_str_arg},
    models::Arguments,
};

fn text_or(args: &Arguments, key: &str, default: &str) -> String {
    opt_str_arg(args, key).unwrap_or_else(|| default.to_string())
}

/// Renders the named prompt, pulling live data from the resource service where
/// the template asks for it. Live lookups that fail degrade to a note.
pub async fn render_prompt(
    proxy: &ToolProxy,
    name: &str,
    args: &Arguments,
) -> Result<String, ServiceError> {
    proxy.catalog().find_prompt(name)?;

    let text = match name {
        "leave_request_email" => leave_request_email(args),
        "leave_policy_summary" => {
            let balance = match int_arg(args, "employee_id") {
                Ok(id) => balance_section(proxy, id).await,
                Err(_) => String::new(),
            };
            leave_policy_summary(args, &balance)
        }
        "leave_calendar_planning" => leave_calendar_planning(args),
        "timesheet_reminder" => timesheet_reminder(args),
        "project_time_summary" => {
            let entries = match int_arg(args, "employee_id") {
                Ok(id) => fetch_entries(proxy, id).await.map(|entries| {
                    project_entries_section(&entries, opt_str_arg(args, "project_filter").as_deref())
                }),
                Err(_) => Some(String::new()),
            };
            project_time_summary(
                args,
                &entries.unwrap_or_else(|| "\n\n(Unable to retrieve timesheet data)\n".to_string()),
            )
        }
        "overtime_analysis" => {
            let threshold = threshold_hours(args);
            let analysis = match int_arg(args, "employee_id") {
                Ok(id) => fetch_entries(proxy, id)
                    .await
                    .map(|entries| overtime_section(&entries, threshold)),
                Err(_) => Some(String::new()),
            };
            overtime_analysis(
                threshold,
                &analysis.unwrap_or_else(|| "\n\n(Unable to retrieve overtime data)\n".to_string()),
            )
        }
        other => return Err(ServiceError::NotFound(format!("Prompt '{other}' not found"))),
    };
    Ok(text)
}

async fn balance_section(proxy: &ToolProxy, employee_id: i64) -> String {
    match proxy
        .get_json(&["employees", &employee_id.to_string(), "balance"])
        .await
    {
        Ok(Value::Object(balance)) => {
            let mut section = String::from("\n\nYour current leave balances:\n");
            for (key, days) in balance.iter().filter(|(k, _)| k.ends_with("_balance")) {
                let label = key.trim_end_matches("_balance");
                section.push_str(&format!("- {}: {days} days\n", title_case(label)));
            }
            section
        }
        Ok(_) => "\n\n(Unable to retrieve current balance)\n".to_string(),
        Err(e) => {
            warn!(employee_id, error = %e, "Balance lookup for prompt failed");
            "\n\n(Unable to retrieve current balance)\n".to_string()
        }
    }
}

async fn fetch_entries(proxy: &ToolProxy, employee_id: i64) -> Option<Vec<Value>> {
    match proxy
        .get_json(&["employees", &employee_id.to_string(), "entries"])
        .await
    {
        Ok(Value::Array(entries)) => Some(entries),
        Ok(_) => None,
        Err(e) => {
            warn!(employee_id, error = %e, "Entry lookup for prompt failed");
            None
        }
    }
}

fn title_case(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn leave_request_email(args: &Arguments) -> String {
    let employee_name = text_or(args, "employee_name", "[Employee Name]");
    let start_date = text_or(args, "start_date", "[Start Date]");
    let end_date = text_or(args, "end_date", "[End Date]");
    let leave_type = text_or(args, "leave_type", "[Leave Type]");
    let reason = opt_str_arg(args, "reason")
        .map(|r| format!("\n\nReason: {r}"))
        .unwrap_or_default();

    format!(
        "Subject: Leave Request - {employee_name} ({start_date} to {end_date})

Dear [Manager Name],

I would like to request {leave_type} leave from {start_date} to {end_date}.{reason}

I will ensure all my current projects are up to date and will coordinate with the team to cover any urgent matters during my absence.

Please let me know if you need any additional information or if there are any concerns with these dates.

Thank you for your consideration.

Best regards,
{employee_name}"
    )
}

fn leave_policy_summary(args: &Arguments, balance: &str) -> String {
    let focus = opt_str_arg(args, "focus_area")
        .map(|f| format!(" with focus on {f}"))
        .unwrap_or_default();

    format!(
        "Leave Policy Summary{focus}

Here's a summary of your leave entitlements and policies:

## Annual Leave
- Standard entitlement: 20 days per year
- Can be carried over: Up to 5 days to next year
- Balance is only deducted when a request is approved

## Sick Leave
- Entitlement: 10 days per year
- No carryover to next year
- Medical certificate required for 3+ consecutive days

## Application Process
1. Submit request at least 2 weeks in advance (except emergencies)
2. Get manager approval
3. Update team calendar
4. Arrange coverage for responsibilities{balance}

For specific questions, please contact HR or your manager."
    )
}

fn leave_calendar_planning(args: &Arguments) -> String {
    let month = opt_str_arg(args, "month").unwrap_or_else(|| Local::now().format("%Y-%m").to_string());
    let team_size = text_or(args, "team_size", "small");
    let max_out = if team_size == "small" { "1 person" } else { "20% of team" };

    format!(
        "Leave Calendar Planning for {month}

## Planning Considerations

### Team Coverage Guidelines
- Team size: {team_size}
- Maximum simultaneous leave: {max_out}
- Critical periods: Month-end, project deadlines, team meetings

### Best Practices
1. **Plan Early**: Submit requests 2-4 weeks in advance
2. **Check Holidays**: Coordinate with public holidays for longer breaks
3. **Team Coordination**: Check with colleagues before booking popular periods
4. **Project Deadlines**: Avoid leave during critical project phases

### Action Items
- Review team calendar for existing bookings
- Identify your preferred dates
- Check project deadlines and commitments
- Submit formal leave request
- Arrange coverage and handovers

Remember: Early planning leads to better approval rates and less stress for everyone!"
    )
}

fn timesheet_reminder(args: &Arguments) -> String {
    let employee_name = text_or(args, "employee_name", "[Employee Name]");
    let period_end = text_or(args, "period_end", "[Period End Date]");
    let missing_days = text_or(args, "missing_days", "several");

    format!(
        "Subject: Timesheet Submission Reminder - Due {period_end}

Hi {employee_name},

This is a friendly reminder that your timesheet for the period ending {period_end} is due soon.

You have {missing_days} day(s) that haven't been logged yet. To keep payroll and project tracking accurate, please:

1. Log into the timesheet system
2. Fill in your hours for each day
3. Include project codes where applicable
4. Add brief notes about your work
5. Submit before the deadline

Thanks for keeping our records up to date!

Best regards,
[Your Name]"
    )
}

fn project_entries_section(entries: &[Value], project_filter: Option<&str>) -> String {
    if entries.is_empty() {
        return String::new();
    }
    let filter = project_filter.map(str::to_lowercase);

    let mut section = String::from("\n\nYour recent timesheet entries:\n");
    let mut totals: Vec<(String, f64)> = Vec::new();
    for entry in entries.iter().take(10) {
        let project = entry["project"].as_str().unwrap_or("No Project");
        if let Some(f) = &filter {
            if !project.to_lowercase().contains(f) {
                continue;
            }
        }
        let hours = entry["hours"].as_f64().unwrap_or(0.0);
        let date = entry["entry_date"].as_str().unwrap_or("");
        section.push_str(&format!("- {date}: {hours}h on {project}\n"));

        match totals.iter_mut().find(|(p, _)| p == project) {
            Some((_, total)) => *total += hours,
            None => totals.push((project.to_string(), hours)),
        }
    }
    if !totals.is_empty() {
        section.push_str("\nProject totals:\n");
        for (project, total) in totals {
            section.push_str(&format!("- {project}: {total} hours\n"));
        }
    }
    section
}

fn project_time_summary(args: &Arguments, entries: &str) -> String {
    let period = text_or(args, "period", "current period");
    let filter = opt_str_arg(args, "project_filter")
        .map(|p| format!(" for {p}"))
        .unwrap_or_default();

    format!(
        "Project Time Summary{filter} - {period}

## Time Allocation Analysis

This summary shows your time distribution across projects{filter} for {period}.

### Key Insights
- Review your time allocation across different projects
- Identify which projects are consuming most time
- Ensure billing accuracy for client projects
- Track progress against project budgets

### Recommendations
1. **Time Tracking**: Log time daily for accuracy
2. **Project Codes**: Always use correct project codes
3. **Detailed Notes**: Include specific tasks in notes
4. **Regular Review**: Weekly review of time allocation{entries}

For questions about project codes or time allocation, contact your project manager or team lead."
    )
}

fn threshold_hours(args: &Arguments) -> f64 {
    opt_str_arg(args, "threshold_hours")
        .and_then(|t| t.parse().ok())
        .unwrap_or(8.0)
}

fn overtime_section(entries: &[Value], threshold: f64) -> String {
    if entries.is_empty() {
        return String::new();
    }
    let recent: Vec<&Value> = entries.iter().take(30).collect();

    let mut overtime_days = 0;
    let mut total_overtime = 0.0;
    let mut breakdown = Vec::new();
    for entry in &recent {
        let hours = entry["hours"].as_f64().unwrap_or(0.0);
        if hours > threshold {
            let overtime = hours - threshold;
            overtime_days += 1;
            total_overtime += overtime;
            let date = entry["entry_date"].as_str().unwrap_or("");
            breakdown.push(format!("- {date}: {hours}h ({overtime}h overtime)"));
        }
    }

    let mut section = format!(
        "\n\nYour overtime analysis (last {} entries):\n- Days with overtime: {overtime_days}\n- Total overtime hours: {total_overtime}\n- Average overtime per day: {:.1}h\n",
        recent.len(),
        total_overtime / recent.len().max(1) as f64,
    );
    if !breakdown.is_empty() {
        section.push_str("\nOvertime breakdown:\n");
        section.push_str(&breakdown.into_iter().take(10).collect::<Vec<_>>().join("\n"));
    }
    section
}

fn overtime_analysis(threshold: f64, analysis: &str) -> String {
    format!(
        "Overtime Analysis Report

## Overview
This analysis examines work patterns exceeding {threshold} hours per day to help maintain work-life balance and identify potential workload issues.

## Health & Productivity Guidelines
- **Recommended daily hours**: {threshold} hours
- **Sustainable overtime**: Maximum 2-3 hours per week
- **Recovery time**: Essential after high-intensity periods

## Warning Signs to Watch
1. **Consistent overtime**: More than 3 days per week
2. **Extended hours**: Regularly working 10+ hours per day
3. **Weekend work**: Regular weekend timesheet entries

## Recommendations
- Review current workload with manager
- Identify tasks that can be delegated or postponed
- Set boundaries for work hours{analysis}

## Next Steps
1. Discuss patterns with your manager
2. Identify root causes of overtime
3. Monitor progress weekly"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mcp::catalog::ServerKind;
    use serde_json::json;
    use std::time::Duration;

    fn args(v: Value) -> Arguments {
        v.as_object().cloned().unwrap()
    }

    #[actix_web::test]
    async fn email_fills_defaults_for_missing_arguments() {
        let proxy = ToolProxy::new(ServerKind::Leave, "http://127.0.0.1:1", Duration::from_secs(1)).unwrap();
        let text = render_prompt(
            &proxy,
            "leave_request_email",
            &args(json!({"employee_name": "Alice", "reason": "Wedding"})),
        )
        .await
        .unwrap();

        assert!(text.starts_with("Subject: Leave Request - Alice ([Start Date] to [End Date])"));
        assert!(text.contains("Reason: Wedding"));
    }

    #[actix_web::test]
    async fn policy_summary_embeds_live_balance() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/employees/1/balance")
            .with_status(200)
            .with_body(r#"{"id":1,"employee_id":1,"annual_balance":20,"sick_balance":10}"#)
            .create_async()
            .await;

        let proxy = ToolProxy::new(ServerKind::Leave, &server.url(), Duration::from_secs(5)).unwrap();
        let text = render_prompt(&proxy, "leave_policy_summary", &args(json!({"employee_id": 1})))
            .await
            .unwrap();

        assert!(text.contains("- Annual: 20 days"));
        assert!(text.contains("- Sick: 10 days"));
        assert!(!text.contains("Employee_id"));
    }

    #[actix_web::test]
    async fn failed_live_lookup_degrades_to_note() {
        let proxy = ToolProxy::new(ServerKind::Timesheet, "http://127.0.0.1:1", Duration::from_secs(1)).unwrap();
        let text = render_prompt(&proxy, "overtime_analysis", &args(json!({"employee_id": 3})))
            .await
            .unwrap();
        assert!(text.contains("(Unable to retrieve overtime data)"));
    }

    #[actix_web::test]
    async fn prompt_of_other_server_is_not_found() {
        let proxy = ToolProxy::new(ServerKind::Timesheet, "http://127.0.0.1:1", Duration::from_secs(1)).unwrap();
        let err = render_prompt(&proxy, "leave_request_email", &Arguments::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
    }

    #[test]
    fn overtime_counts_hours_above_threshold() {
        let entries = vec![
            json!({"entry_date": "2025-09-01", "hours": 10.0}),
            json!({"entry_date": "2025-09-02", "hours": 8.0}),
        ];
        let section = overtime_section(&entries, 8.0);
        assert!(section.contains("Days with overtime: 1"));
        assert!(section.contains("- 2025-09-01: 10h (2h overtime)"));
    }
}
