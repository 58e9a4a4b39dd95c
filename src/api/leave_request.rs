use crate::{
    api::{employee_exists, internal_error, leave_balance::fetch_balance, message},
    model::{
        leave_balance::LeaveBalance,
        leave_request::{LeaveRequest, LeaveStatus, LeaveType, leave_days},
    },
};
use actix_web::{HttpResponse, Responder, web};
use chrono::NaiveDate;
use serde::Deserialize;
use sqlx::SqlitePool;
use tracing::{info, warn};
use utoipa::ToSchema;

#[derive(Deserialize, ToSchema)]
pub struct CreateLeave {
    #[schema(example = "2026-01-05", format = "date", value_type = String)]
    pub start_date: NaiveDate,
    #[schema(example = "2026-01-07", format = "date", value_type = String)]
    pub end_date: NaiveDate,
    #[schema(example = "annual")]
    pub leave_type: String,
    #[schema(example = "Family trip")]
    pub reason: Option<String>,
}

#[derive(Deserialize, ToSchema)]
pub struct UpdateLeaveStatus {
    #[schema(example = "approved")]
    pub status: String,
}

const SELECT_LEAVE: &str =
    "SELECT id, employee_id, start_date, end_date, leave_type, reason, status FROM leave_requests";

/* =========================
Create leave request
========================= */
#[utoipa::path(
    post,
    path = "/employees/{employee_id}/leave-requests",
    params(
        ("employee_id" = i64, Path, description = "Employee applying for leave")
    ),
    request_body(
        content = CreateLeave,
        description = "Leave request payload",
        content_type = "application/json"
    ),
    responses(
        (status = 200, description = "Leave request submitted as pending", body = LeaveRequest),
        (status = 400, description = "Invalid dates, type or insufficient balance", body = Object, example = json!({
            "message": "Insufficient annual leave balance"
        })),
        (status = 404, description = "Employee not found")
    ),
    tag = "Leave"
)]
pub async fn create_leave(
    pool: web::Data<SqlitePool>,
    path: web::Path<i64>,
    payload: web::Json<CreateLeave>,
) -> actix_web::Result<impl Responder> {
    let employee_id = path.into_inner();
    let payload = payload.into_inner();

    if !employee_exists(pool.get_ref(), employee_id).await? {
        return Ok(message(HttpResponse::NotFound(), "Employee not found"));
    }

    // 1️⃣ validate dates
    if payload.end_date < payload.start_date {
        return Ok(message(
            HttpResponse::BadRequest(),
            "end_date cannot be before start_date",
        ));
    }

    // 2️⃣ validate leave type
    let Ok(leave_type) = payload.leave_type.parse::<LeaveType>() else {
        return Ok(message(
            HttpResponse::BadRequest(),
            "Invalid leave type. Allowed: annual, sick",
        ));
    };

    // 3️⃣ requested days must fit the current balance
    let Some(balance) = fetch_balance(pool.get_ref(), employee_id)
        .await
        .map_err(|e| internal_error(e, "Failed to fetch leave balance"))?
    else {
        return Ok(message(HttpResponse::BadRequest(), "Balance not initialized"));
    };
    let days = leave_days(payload.start_date, payload.end_date);
    if balance.available(leave_type) < days {
        return Ok(message(
            HttpResponse::BadRequest(),
            &format!("Insufficient {leave_type} leave balance"),
        ));
    }

    // 4️⃣ insert request
    let id = sqlx::query(
        r#"
        INSERT INTO leave_requests
            (employee_id, start_date, end_date, leave_type, reason, status)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(employee_id)
    .bind(payload.start_date)
    .bind(payload.end_date)
    .bind(leave_type.as_ref())
    .bind(&payload.reason)
    .bind(LeaveStatus::Pending.as_ref())
    .execute(pool.get_ref())
    .await
    .map_err(|e| internal_error(e, "Failed to create leave request"))?
    .last_insert_rowid();

    info!(employee_id, leave_id = id, days, "Leave request submitted");
    Ok(HttpResponse::Ok().json(LeaveRequest {
        id,
        employee_id,
        start_date: payload.start_date,
        end_date: payload.end_date,
        leave_type: leave_type.to_string(),
        reason: payload.reason,
        status: LeaveStatus::Pending.to_string(),
    }))
}

/// Leave requests of one employee, latest start date first
#[utoipa::path(
    get,
    path = "/employees/{employee_id}/leave-requests",
    params(
        ("employee_id" = i64, Path, description = "Employee ID")
    ),
    responses(
        (status = 200, description = "Leave requests", body = [LeaveRequest])
    ),
    tag = "Leave"
)]
pub async fn list_leaves(
    pool: web::Data<SqlitePool>,
    path: web::Path<i64>,
) -> actix_web::Result<impl Responder> {
    let employee_id = path.into_inner();

    let leaves = sqlx::query_as::<_, LeaveRequest>(&format!(
        "{SELECT_LEAVE} WHERE employee_id = ? ORDER BY start_date DESC, id DESC"
    ))
    .bind(employee_id)
    .fetch_all(pool.get_ref())
    .await
    .map_err(|e| internal_error(e, "Failed to fetch leave list"))?;

    Ok(HttpResponse::Ok().json(leaves))
}

/* =========================
Status transitions
========================= */
#[utoipa::path(
    post,
    path = "/leave-requests/{leave_id}/status",
    params(
        ("leave_id" = i64, Path, description = "ID of the leave request")
    ),
    request_body = UpdateLeaveStatus,
    responses(
        (status = 200, description = "Status updated", body = LeaveRequest),
        (status = 400, description = "Invalid status or insufficient balance", body = Object, example = json!({
            "message": "Insufficient annual balance for approval"
        })),
        (status = 404, description = "Leave request not found")
    ),
    tag = "Leave"
)]
pub async fn update_leave_status(
    pool: web::Data<SqlitePool>,
    path: web::Path<i64>,
    payload: web::Json<UpdateLeaveStatus>,
) -> actix_web::Result<HttpResponse> {
    let status = payload.status.parse::<LeaveStatus>().ok();
    transition(pool.get_ref(), path.into_inner(), status).await
}

#[utoipa::path(
    put,
    path = "/leave-requests/{leave_id}/approve",
    params(
        ("leave_id" = i64, Path, description = "ID of the leave request to approve")
    ),
    responses(
        (status = 200, description = "Leave approved", body = LeaveRequest),
        (status = 400, description = "Insufficient balance"),
        (status = 404, description = "Leave request not found")
    ),
    tag = "Leave"
)]
pub async fn approve_leave(
    pool: web::Data<SqlitePool>,
    path: web::Path<i64>,
) -> actix_web::Result<HttpResponse> {
    transition(pool.get_ref(), path.into_inner(), Some(LeaveStatus::Approved)).await
}

#[utoipa::path(
    put,
    path = "/leave-requests/{leave_id}/reject",
    params(
        ("leave_id" = i64, Path, description = "ID of the leave request to reject")
    ),
    responses(
        (status = 200, description = "Leave rejected", body = LeaveRequest),
        (status = 404, description = "Leave request not found")
    ),
    tag = "Leave"
)]
pub async fn reject_leave(
    pool: web::Data<SqlitePool>,
    path: web::Path<i64>,
) -> actix_web::Result<HttpResponse> {
    transition(pool.get_ref(), path.into_inner(), Some(LeaveStatus::Rejected)).await
}

/// Moves a request to `next`, debiting the balance when it enters `approved`
/// and crediting it back when it leaves `approved`. Read, check and write run
/// in one transaction without row locks.
async fn transition(
    pool: &SqlitePool,
    leave_id: i64,
    next: Option<LeaveStatus>,
) -> actix_web::Result<HttpResponse> {
    let mut tx = pool
        .begin()
        .await
        .map_err(|e| internal_error(e, "Failed to open transaction"))?;

    let leave = sqlx::query_as::<_, LeaveRequest>(&format!("{SELECT_LEAVE} WHERE id = ?"))
        .bind(leave_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| internal_error(e, "Failed to fetch leave request"))?;
    let Some(mut leave) = leave else {
        return Ok(message(HttpResponse::NotFound(), "Leave request not found"));
    };
    // an unknown id wins over an unknown status
    let Some(next) = next else {
        return Ok(message(HttpResponse::BadRequest(), "Invalid status"));
    };

    let balance = sqlx::query_as::<_, LeaveBalance>(
        "SELECT id, employee_id, annual_balance, sick_balance FROM leave_balances WHERE employee_id = ?",
    )
    .bind(leave.employee_id)
    .fetch_optional(&mut *tx)
    .await
    .map_err(|e| internal_error(e, "Failed to fetch leave balance"))?;
    let Some(mut balance) = balance else {
        return Ok(message(HttpResponse::BadRequest(), "Balance not initialized"));
    };

    let was_approved = leave.status == LeaveStatus::Approved.as_ref();
    let becomes_approved = next == LeaveStatus::Approved;
    let days = leave.days();

    // Unknown stored types never touch the balance.
    if let Ok(leave_type) = leave.leave_type.parse::<LeaveType>() {
        if !was_approved && becomes_approved {
            if balance.available(leave_type) < days {
                warn!(leave_id, days, "Approval blocked by balance");
                return Ok(message(
                    HttpResponse::BadRequest(),
                    &format!("Insufficient {leave_type} balance for approval"),
                ));
            }
            balance.adjust(leave_type, -days);
        } else if was_approved && !becomes_approved {
            balance.adjust(leave_type, days);
        }
    }

    sqlx::query("UPDATE leave_balances SET annual_balance = ?, sick_balance = ? WHERE id = ?")
        .bind(balance.annual_balance)
        .bind(balance.sick_balance)
        .bind(balance.id)
        .execute(&mut *tx)
        .await
        .map_err(|e| internal_error(e, "Failed to update leave balance"))?;

    sqlx::query("UPDATE leave_requests SET status = ? WHERE id = ?")
        .bind(next.as_ref())
        .bind(leave_id)
        .execute(&mut *tx)
        .await
        .map_err(|e| internal_error(e, "Failed to update leave status"))?;

    tx.commit()
        .await
        .map_err(|e| internal_error(e, "Failed to commit leave status"))?;

    info!(leave_id, from = %leave.status, to = %next, "Leave status changed");
    leave.status = next.to_string();
    Ok(HttpResponse::Ok().json(leave))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{Schema, seed_if_empty, test_pool};
    use actix_web::{App, http::StatusCode, test};
    use serde_json::{Value, json};

    macro_rules! leave_app {
        ($pool:expr) => {
            test::init_service(
                App::new()
                    .app_data(web::Data::new($pool.clone()))
                    .route(
                        "/employees/{employee_id}/leave-requests",
                        web::post().to(create_leave),
                    )
                    .route(
                        "/employees/{employee_id}/leave-requests",
                        web::get().to(list_leaves),
                    )
                    .route(
                        "/leave-requests/{leave_id}/status",
                        web::post().to(update_leave_status),
                    )
                    .route("/leave-requests/{leave_id}/approve", web::put().to(approve_leave))
                    .route("/leave-requests/{leave_id}/reject", web::put().to(reject_leave)),
            )
            .await
        };
    }

    async fn seeded() -> SqlitePool {
        let pool = test_pool(Schema::Leave).await;
        seed_if_empty(&pool, Schema::Leave).await;
        pool
    }

    async fn annual_balance(pool: &SqlitePool, employee_id: i64) -> i64 {
        fetch_balance(pool, employee_id)
            .await
            .unwrap()
            .unwrap()
            .annual_balance
    }

    #[actix_web::test]
    async fn apply_is_pending_and_leaves_balance_untouched() {
        let pool = seeded().await;
        let srv = leave_app!(pool);

        let req = test::TestRequest::post()
            .uri("/employees/1/leave-requests")
            .set_json(json!({
                "start_date": "2025-09-10",
                "end_date": "2025-09-12",
                "leave_type": "annual"
            }))
            .to_request();
        let body: Value = test::call_and_read_body_json(&srv, req).await;

        assert_eq!(body["status"], "pending");
        assert_eq!(body["leave_type"], "annual");
        assert_eq!(annual_balance(&pool, 1).await, 20);
    }

    #[actix_web::test]
    async fn approve_then_revert_round_trips_balance() {
        let pool = seeded().await;
        let srv = leave_app!(pool);

        let req = test::TestRequest::post()
            .uri("/employees/1/leave-requests")
            .set_json(json!({
                "start_date": "2025-09-10",
                "end_date": "2025-09-12",
                "leave_type": "annual"
            }))
            .to_request();
        let created: Value = test::call_and_read_body_json(&srv, req).await;
        let id = created["id"].as_i64().unwrap();

        let req = test::TestRequest::put()
            .uri(&format!("/leave-requests/{id}/approve"))
            .to_request();
        let approved: Value = test::call_and_read_body_json(&srv, req).await;
        assert_eq!(approved["status"], "approved");
        assert_eq!(annual_balance(&pool, 1).await, 17);

        // approving twice must not debit again
        let req = test::TestRequest::post()
            .uri(&format!("/leave-requests/{id}/status"))
            .set_json(json!({"status": "approved"}))
            .to_request();
        assert_eq!(test::call_service(&srv, req).await.status(), StatusCode::OK);
        assert_eq!(annual_balance(&pool, 1).await, 17);

        let req = test::TestRequest::post()
            .uri(&format!("/leave-requests/{id}/status"))
            .set_json(json!({"status": "pending"}))
            .to_request();
        assert_eq!(test::call_service(&srv, req).await.status(), StatusCode::OK);
        assert_eq!(annual_balance(&pool, 1).await, 20);
    }

    #[actix_web::test]
    async fn unknown_request_is_reported_before_bad_status() {
        let pool = seeded().await;
        let srv = leave_app!(pool);

        let req = test::TestRequest::post()
            .uri("/leave-requests/999/status")
            .set_json(json!({"status": "archived"}))
            .to_request();
        assert_eq!(test::call_service(&srv, req).await.status(), StatusCode::NOT_FOUND);

        let req = test::TestRequest::post()
            .uri("/employees/1/leave-requests")
            .set_json(json!({
                "start_date": "2025-11-03",
                "end_date": "2025-11-03",
                "leave_type": "annual"
            }))
            .to_request();
        let created: Value = test::call_and_read_body_json(&srv, req).await;
        let id = created["id"].as_i64().unwrap();

        let req = test::TestRequest::post()
            .uri(&format!("/leave-requests/{id}/status"))
            .set_json(json!({"status": "archived"}))
            .to_request();
        let resp = test::call_service(&srv, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["message"], "Invalid status");
    }

    #[actix_web::test]
    async fn approval_fails_when_balance_would_go_negative() {
        let pool = seeded().await;
        let srv = leave_app!(pool);

        // sick balance of Bob is 9
        let req = test::TestRequest::post()
            .uri("/employees/2/leave-requests")
            .set_json(json!({
                "start_date": "2025-10-01",
                "end_date": "2025-10-05",
                "leave_type": "sick"
            }))
            .to_request();
        let created: Value = test::call_and_read_body_json(&srv, req).await;
        let id = created["id"].as_i64().unwrap();

        sqlx::query("UPDATE leave_balances SET sick_balance = 2 WHERE employee_id = 2")
            .execute(&pool)
            .await
            .unwrap();

        let req = test::TestRequest::put()
            .uri(&format!("/leave-requests/{id}/approve"))
            .to_request();
        assert_eq!(test::call_service(&srv, req).await.status(), StatusCode::BAD_REQUEST);

        let status: String = sqlx::query_scalar("SELECT status FROM leave_requests WHERE id = ?")
            .bind(id)
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(status, "pending");
    }

    #[actix_web::test]
    async fn create_validates_input() {
        let pool = seeded().await;
        let srv = leave_app!(pool);

        let cases = [
            (1, json!({"start_date": "2025-09-12", "end_date": "2025-09-10", "leave_type": "annual"}), StatusCode::BAD_REQUEST),
            (1, json!({"start_date": "2025-09-10", "end_date": "2025-09-10", "leave_type": "unpaid"}), StatusCode::BAD_REQUEST),
            (1, json!({"start_date": "2025-01-01", "end_date": "2025-02-28", "leave_type": "annual"}), StatusCode::BAD_REQUEST),
            (42, json!({"start_date": "2025-09-10", "end_date": "2025-09-10", "leave_type": "annual"}), StatusCode::NOT_FOUND),
        ];

        for (employee_id, body, expected) in cases {
            let req = test::TestRequest::post()
                .uri(&format!("/employees/{employee_id}/leave-requests"))
                .set_json(body)
                .to_request();
            assert_eq!(test::call_service(&srv, req).await.status(), expected);
        }
    }

    #[actix_web::test]
    async fn unknown_request_and_bad_status() {
        let pool = seeded().await;
        let srv = leave_app!(pool);

        let req = test::TestRequest::put().uri("/leave-requests/404/reject").to_request();
        assert_eq!(test::call_service(&srv, req).await.status(), StatusCode::NOT_FOUND);

        let req = test::TestRequest::post()
            .uri("/leave-requests/1/status")
            .set_json(json!({"status": "cancelled"}))
            .to_request();
        assert_eq!(test::call_service(&srv, req).await.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn list_is_latest_first() {
        let pool = seeded().await;
        let srv = leave_app!(pool);

        for start in ["2025-03-01", "2025-05-01"] {
            let req = test::TestRequest::post()
                .uri("/employees/1/leave-requests")
                .set_json(json!({"start_date": start, "end_date": start, "leave_type": "sick"}))
                .to_request();
            test::call_service(&srv, req).await;
        }

        let req = test::TestRequest::get().uri("/employees/1/leave-requests").to_request();
        let body: Value = test::call_and_read_body_json(&srv, req).await;
        assert_eq!(body[0]["start_date"], "2025-05-01");
        assert_eq!(body.as_array().unwrap().len(), 2);
    }
}
