//! Forwards validated tool calls to the resource service that owns the data.

use std::time::{Duration, Instant};

use anyhow::Context;
use reqwest::{Client, RequestBuilder, Url};
use serde_json::{Value, json};
use tracing::{info, warn};

use crate::{
    error::ServiceError,
    mcp::catalog::{Catalog, ServerKind},
    models::Arguments,
    utils::log_utils::{new_cid, preview, truncate},
};

pub struct ToolProxy {
    client: Client,
    base_url: String,
    catalog: &'static Catalog,
}

impl ToolProxy {
    pub fn new(kind: ServerKind, base_url: &str, timeout: Duration) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client for the resource service")?;
        Url::parse(base_url).with_context(|| format!("Invalid resource service url: {base_url}"))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            catalog: Catalog::for_kind(kind),
        })
    }

    pub fn catalog(&self) -> &'static Catalog {
        self.catalog
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Validates `name` and `args` against the catalog and forwards the call.
    pub async fn call_tool(&self, name: &str, args: &Arguments) -> Result<Value, ServiceError> {
        let tool = self.catalog.find_tool(name)?;
        tool.validate(args)?;

        let cid = new_cid();
        let started = Instant::now();
        let args_preview = preview(&Value::Object(args.clone()));
        info!(%cid, tool = name, args = %args_preview, "Tool call");

        let result = self.forward(name, args).await;
        let elapsed_ms = started.elapsed().as_millis() as u64;
        match &result {
            Ok(body) => info!(%cid, tool = name, elapsed_ms, response = %preview(body), "Tool call succeeded"),
            Err(e) => warn!(%cid, tool = name, elapsed_ms, error = %truncate(&e.to_string(), 300), "Tool call failed"),
        }
        result
    }

    async fn forward(&self, name: &str, args: &Arguments) -> Result<Value, ServiceError> {
        match name {
            "apply_leave" => {
                let employee_id = int_arg(args, "employee_id")?;
                let body = json!({
                    "start_date": str_arg(args, "start_date")?,
                    "end_date": str_arg(args, "end_date")?,
                    "leave_type": str_arg(args, "leave_type")?.to_lowercase(),
                    "reason": opt_str_arg(args, "reason"),
                });
                let url = self.url(&["employees", &employee_id.to_string(), "leave-requests"])?;
                send(self.client.post(url).json(&body)).await
            }
            "get_balance" => {
                let employee_id = int_arg(args, "employee_id")?;
                self.get_json(&["employees", &employee_id.to_string(), "balance"])
                    .await
            }
            "list_leave_requests" => {
                let employee_id = int_arg(args, "employee_id")?;
                self.get_json(&["employees", &employee_id.to_string(), "leave-requests"])
                    .await
            }
            "add_timesheet_entry" => {
                let employee_id = int_arg(args, "employee_id")?;
                let body = json!({
                    "entry_date": str_arg(args, "entry_date")?,
                    "hours": number_arg(args, "hours")?,
                    "project": opt_str_arg(args, "project"),
                    "notes": opt_str_arg(args, "notes"),
                });
                let url = self.url(&["employees", &employee_id.to_string(), "entries"])?;
                send(self.client.post(url).json(&body)).await
            }
            "list_timesheet_entries" => {
                let employee_id = int_arg(args, "employee_id")?;
                self.get_json(&["employees", &employee_id.to_string(), "entries"])
                    .await
            }
            "get_timesheet_summary" => {
                let employee_id = int_arg(args, "employee_id")?;
                let url = self.url(&["employees", &employee_id.to_string(), "summary"])?;
                send(self.client.get(url).query(&period(args)?)).await
            }
            "get_project_hours" => {
                let project = str_arg(args, "project")?;
                let url = self.url(&["projects", &project, "hours"])?;
                send(self.client.get(url).query(&period(args)?)).await
            }
            other => Err(ServiceError::NotFound(format!("Tool {other} not found"))),
        }
    }

    /// GET on the resource service, used for live prompt and resource data.
    pub async fn get_json(&self, segments: &[&str]) -> Result<Value, ServiceError> {
        let url = self.url(segments)?;
        send(self.client.get(url)).await
    }

    fn url(&self, segments: &[&str]) -> Result<Url, ServiceError> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| ServiceError::Transport(format!("invalid base url: {e}")))?;
        url.path_segments_mut()
            .map_err(|_| ServiceError::Transport("base url cannot carry a path".to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }
}

pub(crate) async fn send(request: RequestBuilder) -> Result<Value, ServiceError> {
    let response = request.send().await?;
    let status = response.status();
    if status.is_client_error() || status.is_server_error() {
        let body = response.text().await.unwrap_or_default();
        return Err(ServiceError::Remote {
            status: status.as_u16(),
            body,
        });
    }
    Ok(response.json::<Value>().await?)
}

fn period(args: &Arguments) -> Result<[(&'static str, String); 2], ServiceError> {
    Ok([
        ("start_date", str_arg(args, "start_date")?),
        ("end_date", str_arg(args, "end_date")?),
    ])
}

/// Integer argument; numeric strings such as `"7"` are accepted.
pub fn int_arg(args: &Arguments, key: &str) -> Result<i64, ServiceError> {
    let invalid = || ServiceError::Validation(format!("{key} must be an integer"));
    match args.get(key) {
        Some(Value::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64))
            .ok_or_else(invalid),
        Some(Value::String(s)) => s.trim().parse().map_err(|_| invalid()),
        _ => Err(ServiceError::missing_fields(&[key])),
    }
}

pub fn number_arg(args: &Arguments, key: &str) -> Result<f64, ServiceError> {
    let invalid = || ServiceError::Validation(format!("{key} must be a number"));
    match args.get(key) {
        Some(Value::Number(n)) => n.as_f64().ok_or_else(invalid),
        Some(Value::String(s)) => s.trim().parse().map_err(|_| invalid()),
        _ => Err(ServiceError::missing_fields(&[key])),
    }
}

pub fn str_arg(args: &Arguments, key: &str) -> Result<String, ServiceError> {
    opt_str_arg(args, key).ok_or_else(|| ServiceError::missing_fields(&[key]))
}

/// String argument; numbers are rendered, blanks count as absent.
pub fn opt_str_arg(args: &Arguments, key: &str) -> Option<String> {
    match args.get(key)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    fn args(v: Value) -> Arguments {
        v.as_object().cloned().unwrap()
    }

    fn proxy(kind: ServerKind, url: &str) -> ToolProxy {
        ToolProxy::new(kind, url, Duration::from_secs(5)).unwrap()
    }

    #[actix_web::test]
    async fn unknown_tool_is_not_found() {
        let proxy = proxy(ServerKind::Leave, "http://127.0.0.1:1");
        let err = proxy.call_tool("drop_tables", &Arguments::new()).await.unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
    }

    #[actix_web::test]
    async fn missing_arguments_fail_before_any_request() {
        let proxy = proxy(ServerKind::Leave, "http://127.0.0.1:1");
        let err = proxy
            .call_tool("apply_leave", &args(json!({"employee_id": 1, "start_date": "2025-09-10"})))
            .await
            .unwrap_err();
        match err {
            ServiceError::Validation(msg) => {
                assert!(msg.contains("end_date"));
                assert!(msg.contains("leave_type"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[actix_web::test]
    async fn apply_leave_posts_to_employee_requests() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/employees/1/leave-requests")
            .match_body(Matcher::PartialJson(json!({
                "start_date": "2025-09-10",
                "end_date": "2025-09-12",
                "leave_type": "annual"
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"id": 5, "status": "pending"}"#)
            .create_async()
            .await;

        let proxy = proxy(ServerKind::Leave, &server.url());
        let body = proxy
            .call_tool(
                "apply_leave",
                &args(json!({
                    "employee_id": "1",
                    "start_date": "2025-09-10",
                    "end_date": "2025-09-12",
                    "leave_type": "Annual"
                })),
            )
            .await
            .unwrap();

        assert_eq!(body["status"], "pending");
        mock.assert_async().await;
    }

    #[actix_web::test]
    async fn backend_error_status_is_relayed() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/employees/9/balance")
            .with_status(404)
            .with_body(r#"{"message":"Balance not found"}"#)
            .create_async()
            .await;

        let proxy = proxy(ServerKind::Leave, &server.url());
        let err = proxy
            .call_tool("get_balance", &args(json!({"employee_id": 9})))
            .await
            .unwrap_err();
        match err {
            ServiceError::Remote { status, body } => {
                assert_eq!(status, 404);
                assert!(body.contains("Balance not found"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[actix_web::test]
    async fn project_hours_encodes_project_and_period() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/projects/PROJ%20A/hours")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("start_date".into(), "2025-09-01".into()),
                Matcher::UrlEncoded("end_date".into(), "2025-09-30".into()),
            ]))
            .with_status(200)
            .with_body(r#"{"total_hours": 12.5}"#)
            .create_async()
            .await;

        let proxy = proxy(ServerKind::Timesheet, &server.url());
        let body = proxy
            .call_tool(
                "get_project_hours",
                &args(json!({"project": "PROJ A", "start_date": "2025-09-01", "end_date": "2025-09-30"})),
            )
            .await
            .unwrap();

        assert_eq!(body["total_hours"], 12.5);
        mock.assert_async().await;
    }

    #[actix_web::test]
    async fn unreachable_backend_is_transport_error() {
        let proxy = proxy(ServerKind::Timesheet, "http://127.0.0.1:1");
        let err = proxy
            .call_tool("list_timesheet_entries", &args(json!({"employee_id": 1})))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Transport(_)));
    }

    #[test]
    fn argument_coercion() {
        let a = args(json!({"id": "42", "f": 7.0, "h": "7.5", "bad": "x", "blank": "  "}));
        assert_eq!(int_arg(&a, "id").unwrap(), 42);
        assert_eq!(int_arg(&a, "f").unwrap(), 7);
        assert_eq!(number_arg(&a, "h").unwrap(), 7.5);
        assert!(matches!(int_arg(&a, "bad"), Err(ServiceError::Validation(_))));
        assert_eq!(opt_str_arg(&a, "blank"), None);
        assert!(str_arg(&a, "missing").is_err());
    }
}
