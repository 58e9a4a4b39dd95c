pub mod employee;
pub mod health;
pub mod leave_balance;
pub mod leave_request;
pub mod timesheet;

use actix_web::{HttpResponse, error::ErrorInternalServerError};
use serde_json::json;

/// Logs a database failure and hides the detail from the caller.
pub(crate) fn internal_error(e: sqlx::Error, what: &'static str) -> actix_web::Error {
    tracing::error!(error = %e, "{what}");
    ErrorInternalServerError("Internal Server Error")
}

pub(crate) fn message(mut builder: actix_web::HttpResponseBuilder, msg: &str) -> HttpResponse {
    builder.json(json!({ "message": msg }))
}

pub(crate) async fn employee_exists(
    pool: &sqlx::SqlitePool,
    employee_id: i64,
) -> actix_web::Result<bool> {
    let found: Option<i64> = sqlx::query_scalar("SELECT id FROM employees WHERE id = ?")
        .bind(employee_id)
        .fetch_optional(pool)
        .await
        .map_err(|e| internal_error(e, "Failed to look up employee"))?;
    Ok(found.is_some())
}
