//! Keyword and regex fallback used when the message could not be structured.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Value, json};

use crate::chat::intent::{Intent, IntentKind};

static DATE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(\d{4}-\d{2}-\d{2})\b").expect("valid date regex"));
static HOURS_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(\d+(?:\.\d+)?)\s*(?:hours|hour|hrs|hr|h)\b").expect("valid hours regex")
});
static EMPLOYEE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\bemployee\s*(?:id\s*)?#?\s*(\d+)").expect("valid employee regex")
});

fn has_any(text: &str, words: &[&str]) -> bool {
    words.iter().any(|w| text.contains(w))
}

/// Guesses the intent from keywords. Rules are ordered, first match wins.
pub fn classify(text: &str) -> Intent {
    let lower = text.to_lowercase();
    let dates = dates(text);

    let kind = if has_any(&lower, &["prompt", "template", "email"]) {
        IntentKind::GetPrompt
    } else if has_any(&lower, &["policy", "resource", "guidelines"]) {
        IntentKind::GetResource
    } else if lower.contains("balance") && lower.contains("leave") {
        IntentKind::GetBalance
    } else if has_any(&lower, &["list", "show", "see", "view"])
        && has_any(&lower, &["timesheet", "entries", "logs"])
    {
        IntentKind::ListEntries
    } else if has_any(&lower, &["summary", "report"]) && dates.len() >= 2 {
        IntentKind::GetTimesheetSummary
    } else if lower.contains("project") && lower.contains("hours") && dates.len() >= 2 {
        IntentKind::GetProjectHours
    } else if has_any(&lower, &["leave", "vacation"]) {
        IntentKind::ApplyLeave
    } else if has_any(&lower, &["timesheet", "hours", "log"]) {
        IntentKind::AddTimesheetEntry
    } else {
        IntentKind::Smalltalk
    };

    let mut intent = Intent::new(kind);
    intent.employee_id = employee_id(text);
    extract_arguments(text, &dates, &mut intent);
    intent
}

/// Viewing words turn an add into a list. Applied to every parse.
pub fn apply_safety_override(intent: &mut Intent, text: &str) {
    let lower = text.to_lowercase();
    if intent.kind == IntentKind::AddTimesheetEntry
        && has_any(&lower, &["entries", "show", "see", "view"])
    {
        intent.kind = IntentKind::ListEntries;
    }
}

fn extract_arguments(text: &str, dates: &[String], intent: &mut Intent) {
    let args = &mut intent.arguments;
    if let Some(first) = dates.first() {
        args.insert("entry_date".into(), json!(first));
    }
    if let [start, end, ..] = dates {
        args.insert("start_date".into(), json!(start));
        args.insert("end_date".into(), json!(end));
    }
    if let Some(hours) = hours(text) {
        args.insert("hours".into(), json!(hours));
    }
    if let Some(project) = project(text) {
        args.insert("project".into(), Value::String(project));
    }
}

pub fn dates(text: &str) -> Vec<String> {
    DATE_RE
        .captures_iter(text)
        .map(|c| c[1].to_string())
        .collect()
}

pub fn hours(text: &str) -> Option<f64> {
    HOURS_RE
        .captures(text)
        .and_then(|c| c[1].parse().ok())
}

pub fn employee_id(text: &str) -> Option<i64> {
    EMPLOYEE_RE
        .captures(text)
        .and_then(|c| c[1].parse().ok())
}

/// Token after the word "project", skipping filler words.
pub fn project(text: &str) -> Option<String> {
    let tokens: Vec<&str> = text.split_whitespace().collect();
    let at = tokens
        .iter()
        .position(|t| t.trim_matches(|c: char| !c.is_alphanumeric()).eq_ignore_ascii_case("project"))?;
    tokens[at + 1..]
        .iter()
        .map(|t| t.trim_matches(|c: char| matches!(c, ',' | '.' | '!' | '?' | ':' | ';' | '"' | '\'')))
        .find(|t| {
            !t.is_empty()
                && !["project", "hours", "code", "for", "on", "from"].contains(&t.to_lowercase().as_str())
        })
        .map(str::to_string)
}

/// Last-resort positional parse: the token before "hours" and the token after "on".
pub fn positional_hours_and_date(text: &str) -> Option<(f64, String)> {
    let lower = text.to_lowercase();
    let tokens: Vec<&str> = lower.split_whitespace().collect();
    let hours_at = tokens.iter().position(|t| *t == "hours")?;
    let hours = tokens.get(hours_at.checked_sub(1)?)?.parse().ok()?;
    let on_at = tokens.iter().position(|t| *t == "on")?;
    let date = tokens.get(on_at + 1)?.to_string();
    Some((hours, date))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn logging_hours_extracts_hours_and_date() {
        let intent = classify("log 8 hours on 2025-09-10 for employee 1");
        assert_eq!(intent.kind, IntentKind::AddTimesheetEntry);
        assert_eq!(intent.arguments["hours"], 8.0);
        assert_eq!(intent.arguments["entry_date"], "2025-09-10");
        assert_eq!(intent.employee_id, Some(1));
    }

    #[test]
    fn rule_order_prefers_prompts_over_leave() {
        assert_eq!(classify("draft a leave email for me").kind, IntentKind::GetPrompt);
        assert_eq!(classify("show the sick leave policy").kind, IntentKind::GetResource);
        assert_eq!(classify("what is my leave balance").kind, IntentKind::GetBalance);
        assert_eq!(classify("apply leave 2025-09-10 to 2025-09-12").kind, IntentKind::ApplyLeave);
        assert_eq!(classify("how are you today").kind, IntentKind::Smalltalk);
    }

    #[test]
    fn viewing_timesheet_is_never_an_add() {
        let text = "show my timesheet entries, I logged 8 hours on 2025-09-10";
        let mut intent = classify(text);
        apply_safety_override(&mut intent, text);
        assert_eq!(intent.kind, IntentKind::ListEntries);

        let text = "timesheet entries 8 hours on 2025-09-10";
        let mut intent = classify(text);
        assert_eq!(intent.kind, IntentKind::AddTimesheetEntry);
        apply_safety_override(&mut intent, text);
        assert_eq!(intent.kind, IntentKind::ListEntries);
    }

    #[test]
    fn summary_and_project_hours_need_two_dates() {
        let intent = classify("timesheet summary 2025-09-01 to 2025-09-15 for employee 1");
        assert_eq!(intent.kind, IntentKind::GetTimesheetSummary);
        assert_eq!(intent.arguments["start_date"], "2025-09-01");
        assert_eq!(intent.arguments["end_date"], "2025-09-15");

        let intent = classify("project hours for project PROJ001, 2025-09-01 to 2025-09-30");
        assert_eq!(intent.kind, IntentKind::GetProjectHours);
        assert_eq!(intent.arguments["project"], "PROJ001");

        assert_eq!(classify("timesheet summary please").kind, IntentKind::AddTimesheetEntry);
    }

    #[test]
    fn hours_formats() {
        assert_eq!(hours("worked 7.5 hrs"), Some(7.5));
        assert_eq!(hours("8h on PROJ001"), Some(8.0));
        assert_eq!(hours("6 Hours"), Some(6.0));
        assert_eq!(hours("no number here"), None);
    }

    #[test]
    fn positional_parse() {
        assert_eq!(
            positional_hours_and_date("Add 6 hours on 2025-09-11"),
            Some((6.0, "2025-09-11".to_string()))
        );
        assert_eq!(positional_hours_and_date("hours on"), None);
        assert_eq!(positional_hours_and_date("six hours yesterday"), None);
    }
}
