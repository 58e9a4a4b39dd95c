use crate::{
    api::{employee_exists, internal_error, message},
    model::leave_balance::LeaveBalance,
};
use actix_web::{HttpResponse, Responder, web};
use serde::Deserialize;
use sqlx::SqlitePool;
use tracing::info;
use utoipa::ToSchema;

#[derive(Deserialize, ToSchema)]
pub struct UpdateBalance {
    #[schema(example = 15)]
    pub annual_balance: Option<i64>,
    #[schema(example = 8)]
    pub sick_balance: Option<i64>,
}

pub(crate) async fn fetch_balance(
    pool: &SqlitePool,
    employee_id: i64,
) -> Result<Option<LeaveBalance>, sqlx::Error> {
    sqlx::query_as::<_, LeaveBalance>(
        "SELECT id, employee_id, annual_balance, sick_balance FROM leave_balances WHERE employee_id = ?",
    )
    .bind(employee_id)
    .fetch_optional(pool)
    .await
}

/// Current leave balance of an employee
#[utoipa::path(
    get,
    path = "/employees/{employee_id}/balance",
    params(
        ("employee_id" = i64, Path, description = "Employee ID")
    ),
    responses(
        (status = 200, description = "Balance found", body = LeaveBalance),
        (status = 404, description = "Balance not found", body = Object, example = json!({
            "message": "Balance not found"
        }))
    ),
    tag = "Leave"
)]
pub async fn get_balance(
    pool: web::Data<SqlitePool>,
    path: web::Path<i64>,
) -> actix_web::Result<impl Responder> {
    let employee_id = path.into_inner();

    let balance = fetch_balance(pool.get_ref(), employee_id)
        .await
        .map_err(|e| internal_error(e, "Failed to fetch leave balance"))?;

    match balance {
        Some(data) => Ok(HttpResponse::Ok().json(data)),
        None => Ok(message(HttpResponse::NotFound(), "Balance not found")),
    }
}

/// Set one or both balances, creating the row at zero when missing
#[utoipa::path(
    post,
    path = "/employees/{employee_id}/balance",
    params(
        ("employee_id" = i64, Path, description = "Employee ID")
    ),
    request_body = UpdateBalance,
    responses(
        (status = 200, description = "Balance updated", body = LeaveBalance),
        (status = 404, description = "Employee not found")
    ),
    tag = "Leave"
)]
pub async fn set_balance(
    pool: web::Data<SqlitePool>,
    path: web::Path<i64>,
    payload: web::Json<UpdateBalance>,
) -> actix_web::Result<impl Responder> {
    let employee_id = path.into_inner();

    if !employee_exists(pool.get_ref(), employee_id).await? {
        return Ok(message(HttpResponse::NotFound(), "Employee not found"));
    }

    sqlx::query(
        r#"
        INSERT INTO leave_balances (employee_id, annual_balance, sick_balance)
        VALUES (?, 0, 0)
        ON CONFLICT(employee_id) DO NOTHING
        "#,
    )
    .bind(employee_id)
    .execute(pool.get_ref())
    .await
    .map_err(|e| internal_error(e, "Failed to initialise leave balance"))?;

    sqlx::query(
        r#"
        UPDATE leave_balances
        SET annual_balance = COALESCE(?, annual_balance),
            sick_balance = COALESCE(?, sick_balance)
        WHERE employee_id = ?
        "#,
    )
    .bind(payload.annual_balance)
    .bind(payload.sick_balance)
    .bind(employee_id)
    .execute(pool.get_ref())
    .await
    .map_err(|e| internal_error(e, "Failed to update leave balance"))?;

    let balance = fetch_balance(pool.get_ref(), employee_id)
        .await
        .map_err(|e| internal_error(e, "Failed to fetch leave balance"))?;

    info!(employee_id, "Leave balance updated");
    match balance {
        Some(data) => Ok(HttpResponse::Ok().json(data)),
        None => Ok(message(HttpResponse::NotFound(), "Balance not found")),
    }
}
