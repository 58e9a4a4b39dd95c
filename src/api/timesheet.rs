use std::collections::BTreeMap;

use crate::{
    api::{employee_exists, internal_error, message},
    model::timesheet_entry::TimesheetEntry,
};
use actix_web::{HttpResponse, Responder, web};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tracing::info;
use utoipa::{IntoParams, ToSchema};

const MAX_HOURS_PER_ENTRY: f64 = 24.0;

#[derive(Deserialize, ToSchema)]
pub struct CreateEntry {
    #[schema(example = "2025-09-10", format = "date", value_type = String)]
    pub entry_date: NaiveDate,
    #[schema(example = 8.0)]
    pub hours: f64,
    #[schema(example = "PROJ001")]
    pub project: Option<String>,
    #[schema(example = "Sprint planning")]
    pub notes: Option<String>,
}

#[derive(Deserialize, IntoParams)]
pub struct PeriodQuery {
    /// First day of the period (inclusive)
    #[param(value_type = String, example = "2025-09-01")]
    pub start_date: NaiveDate,
    /// Last day of the period (inclusive)
    #[param(value_type = String, example = "2025-09-30")]
    pub end_date: NaiveDate,
}

#[derive(Serialize, ToSchema)]
pub struct TimesheetSummary {
    pub employee_id: i64,
    #[schema(value_type = String, format = "date")]
    pub start_date: NaiveDate,
    #[schema(value_type = String, format = "date")]
    pub end_date: NaiveDate,
    pub total_hours: f64,
    pub entry_count: usize,
    /// Hours per project code; entries without a project are grouped under "unassigned"
    pub by_project: BTreeMap<String, f64>,
    pub by_day: BTreeMap<String, f64>,
}

#[derive(Serialize, ToSchema, sqlx::FromRow)]
pub struct EmployeeHours {
    pub employee_id: i64,
    pub name: Option<String>,
    pub hours: f64,
}

#[derive(Serialize, ToSchema)]
pub struct ProjectHours {
    pub project: String,
    #[schema(value_type = String, format = "date")]
    pub start_date: NaiveDate,
    #[schema(value_type = String, format = "date")]
    pub end_date: NaiveDate,
    pub total_hours: f64,
    pub by_employee: Vec<EmployeeHours>,
}

const SELECT_ENTRY: &str =
    "SELECT id, employee_id, entry_date, hours, project, notes FROM timesheet_entries";

/// Log worked hours for an employee
#[utoipa::path(
    post,
    path = "/employees/{employee_id}/entries",
    params(
        ("employee_id" = i64, Path, description = "Employee ID")
    ),
    request_body = CreateEntry,
    responses(
        (status = 200, description = "Entry recorded", body = TimesheetEntry),
        (status = 400, description = "Hours out of range", body = Object, example = json!({
            "message": "hours must be greater than 0 and at most 24"
        })),
        (status = 404, description = "Employee not found")
    ),
    tag = "Timesheet"
)]
pub async fn create_entry(
    pool: web::Data<SqlitePool>,
    path: web::Path<i64>,
    payload: web::Json<CreateEntry>,
) -> actix_web::Result<impl Responder> {
    let employee_id = path.into_inner();
    let payload = payload.into_inner();

    if !employee_exists(pool.get_ref(), employee_id).await? {
        return Ok(message(HttpResponse::NotFound(), "Employee not found"));
    }

    if !(payload.hours > 0.0 && payload.hours <= MAX_HOURS_PER_ENTRY) {
        return Ok(message(
            HttpResponse::BadRequest(),
            "hours must be greater than 0 and at most 24",
        ));
    }

    let id = sqlx::query(
        r#"
        INSERT INTO timesheet_entries (employee_id, entry_date, hours, project, notes)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(employee_id)
    .bind(payload.entry_date)
    .bind(payload.hours)
    .bind(&payload.project)
    .bind(&payload.notes)
    .execute(pool.get_ref())
    .await
    .map_err(|e| internal_error(e, "Failed to create timesheet entry"))?
    .last_insert_rowid();

    info!(employee_id, entry_id = id, hours = payload.hours, "Timesheet entry added");
    Ok(HttpResponse::Ok().json(TimesheetEntry {
        id,
        employee_id,
        entry_date: payload.entry_date,
        hours: payload.hours,
        project: payload.project,
        notes: payload.notes,
    }))
}

/// Entries of one employee, newest first
#[utoipa::path(
    get,
    path = "/employees/{employee_id}/entries",
    params(
        ("employee_id" = i64, Path, description = "Employee ID")
    ),
    responses(
        (status = 200, description = "Timesheet entries", body = [TimesheetEntry])
    ),
    tag = "Timesheet"
)]
pub async fn list_entries(
    pool: web::Data<SqlitePool>,
    path: web::Path<i64>,
) -> actix_web::Result<impl Responder> {
    let employee_id = path.into_inner();

    let entries = sqlx::query_as::<_, TimesheetEntry>(&format!(
        "{SELECT_ENTRY} WHERE employee_id = ? ORDER BY entry_date DESC, id DESC"
    ))
    .bind(employee_id)
    .fetch_all(pool.get_ref())
    .await
    .map_err(|e| internal_error(e, "Failed to fetch timesheet entries"))?;

    Ok(HttpResponse::Ok().json(entries))
}

/// Totals for one employee over a period
#[utoipa::path(
    get,
    path = "/employees/{employee_id}/summary",
    params(
        ("employee_id" = i64, Path, description = "Employee ID"),
        PeriodQuery
    ),
    responses(
        (status = 200, description = "Period summary", body = TimesheetSummary),
        (status = 400, description = "end_date before start_date"),
        (status = 404, description = "Employee not found")
    ),
    tag = "Timesheet"
)]
pub async fn employee_summary(
    pool: web::Data<SqlitePool>,
    path: web::Path<i64>,
    query: web::Query<PeriodQuery>,
) -> actix_web::Result<impl Responder> {
    let employee_id = path.into_inner();
    let PeriodQuery { start_date, end_date } = query.into_inner();

    if end_date < start_date {
        return Ok(message(
            HttpResponse::BadRequest(),
            "end_date cannot be before start_date",
        ));
    }
    if !employee_exists(pool.get_ref(), employee_id).await? {
        return Ok(message(HttpResponse::NotFound(), "Employee not found"));
    }

    let entries = sqlx::query_as::<_, TimesheetEntry>(&format!(
        "{SELECT_ENTRY} WHERE employee_id = ? AND entry_date BETWEEN ? AND ? ORDER BY entry_date"
    ))
    .bind(employee_id)
    .bind(start_date)
    .bind(end_date)
    .fetch_all(pool.get_ref())
    .await
    .map_err(|e| internal_error(e, "Failed to fetch timesheet summary"))?;

    Ok(HttpResponse::Ok().json(summarize(employee_id, start_date, end_date, &entries)))
}

fn summarize(
    employee_id: i64,
    start_date: NaiveDate,
    end_date: NaiveDate,
    entries: &[TimesheetEntry],
) -> TimesheetSummary {
    let mut by_project = BTreeMap::new();
    let mut by_day = BTreeMap::new();
    for entry in entries {
        let project = entry.project.clone().unwrap_or_else(|| "unassigned".to_string());
        *by_project.entry(project).or_insert(0.0) += entry.hours;
        *by_day.entry(entry.entry_date.to_string()).or_insert(0.0) += entry.hours;
    }

    TimesheetSummary {
        employee_id,
        start_date,
        end_date,
        total_hours: entries.iter().map(|e| e.hours).sum(),
        entry_count: entries.len(),
        by_project,
        by_day,
    }
}

/// Hours booked against a project over a period, per employee
#[utoipa::path(
    get,
    path = "/projects/{project}/hours",
    params(
        ("project" = String, Path, description = "Project code"),
        PeriodQuery
    ),
    responses(
        (status = 200, description = "Project hours", body = ProjectHours),
        (status = 400, description = "end_date before start_date")
    ),
    tag = "Timesheet"
)]
pub async fn project_hours(
    pool: web::Data<SqlitePool>,
    path: web::Path<String>,
    query: web::Query<PeriodQuery>,
) -> actix_web::Result<impl Responder> {
    let project = path.into_inner();
    let PeriodQuery { start_date, end_date } = query.into_inner();

    if end_date < start_date {
        return Ok(message(
            HttpResponse::BadRequest(),
            "end_date cannot be before start_date",
        ));
    }

    let by_employee = sqlx::query_as::<_, EmployeeHours>(
        r#"
        SELECT t.employee_id AS employee_id, e.name AS name, SUM(t.hours) AS hours
        FROM timesheet_entries t
        LEFT JOIN employees e ON e.id = t.employee_id
        WHERE t.project = ? AND t.entry_date BETWEEN ? AND ?
        GROUP BY t.employee_id, e.name
        ORDER BY hours DESC
        "#,
    )
    .bind(&project)
    .bind(start_date)
    .bind(end_date)
    .fetch_all(pool.get_ref())
    .await
    .map_err(|e| internal_error(e, "Failed to fetch project hours"))?;

    Ok(HttpResponse::Ok().json(ProjectHours {
        total_hours: by_employee.iter().map(|e| e.hours).sum(),
        project,
        start_date,
        end_date,
        by_employee,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{Schema, test_pool};
    use actix_web::{App, http::StatusCode, test};
    use serde_json::{Value, json};

    macro_rules! timesheet_app {
        ($pool:expr) => {
            test::init_service(
                App::new()
                    .app_data(web::Data::new($pool.clone()))
                    .route("/employees/{employee_id}/entries", web::post().to(create_entry))
                    .route("/employees/{employee_id}/entries", web::get().to(list_entries))
                    .route("/employees/{employee_id}/summary", web::get().to(employee_summary))
                    .route("/projects/{project}/hours", web::get().to(project_hours)),
            )
            .await
        };
    }

    async fn pool_with_employees() -> SqlitePool {
        let pool = test_pool(Schema::Timesheet).await;
        for (name, email) in [("Alice", "alice@example.com"), ("Bob", "bob@example.com")] {
            sqlx::query("INSERT INTO employees (name, email) VALUES (?, ?)")
                .bind(name)
                .bind(email)
                .execute(&pool)
                .await
                .unwrap();
        }
        pool
    }

    fn entry(employee_id: i64, date: &str, hours: f64, project: &str) -> test::TestRequest {
        test::TestRequest::post()
            .uri(&format!("/employees/{employee_id}/entries"))
            .set_json(json!({"entry_date": date, "hours": hours, "project": project}))
    }

    #[actix_web::test]
    async fn entries_are_listed_newest_first() {
        let pool = pool_with_employees().await;
        let srv = timesheet_app!(pool);

        for date in ["2025-09-08", "2025-09-10", "2025-09-09"] {
            let resp = test::call_service(&srv, entry(1, date, 8.0, "PROJ001").to_request()).await;
            assert_eq!(resp.status(), StatusCode::OK);
        }

        let req = test::TestRequest::get().uri("/employees/1/entries").to_request();
        let body: Value = test::call_and_read_body_json(&srv, req).await;
        let dates: Vec<&str> = body
            .as_array()
            .unwrap()
            .iter()
            .map(|e| e["entry_date"].as_str().unwrap())
            .collect();
        assert_eq!(dates, ["2025-09-10", "2025-09-09", "2025-09-08"]);
    }

    #[actix_web::test]
    async fn hours_must_be_in_range_and_employee_known() {
        let pool = pool_with_employees().await;
        let srv = timesheet_app!(pool);

        for hours in [0.0, -1.0, 24.5] {
            let resp = test::call_service(&srv, entry(1, "2025-09-10", hours, "X").to_request()).await;
            assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        }
        let resp = test::call_service(&srv, entry(9, "2025-09-10", 4.0, "X").to_request()).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[actix_web::test]
    async fn summary_and_project_hours_cover_the_period() {
        let pool = pool_with_employees().await;
        let srv = timesheet_app!(pool);

        for (employee_id, date, hours, project) in [
            (1, "2025-09-01", 8.0, "PROJ001"),
            (1, "2025-09-02", 4.0, "PROJ001"),
            (1, "2025-09-02", 3.5, "OPS"),
            (2, "2025-09-02", 6.0, "PROJ001"),
            (1, "2025-10-01", 8.0, "PROJ001"),
        ] {
            test::call_service(&srv, entry(employee_id, date, hours, project).to_request()).await;
        }

        let req = test::TestRequest::get()
            .uri("/employees/1/summary?start_date=2025-09-01&end_date=2025-09-30")
            .to_request();
        let summary: Value = test::call_and_read_body_json(&srv, req).await;
        assert_eq!(summary["total_hours"], 15.5);
        assert_eq!(summary["entry_count"], 3);
        assert_eq!(summary["by_project"]["OPS"], 3.5);
        assert_eq!(summary["by_day"]["2025-09-02"], 7.5);

        let req = test::TestRequest::get()
            .uri("/projects/PROJ001/hours?start_date=2025-09-01&end_date=2025-09-30")
            .to_request();
        let hours: Value = test::call_and_read_body_json(&srv, req).await;
        assert_eq!(hours["total_hours"], 18.0);
        assert_eq!(hours["by_employee"][0]["employee_id"], 1);
        assert_eq!(hours["by_employee"][0]["name"], "Alice");
    }

    #[actix_web::test]
    async fn reversed_period_is_rejected() {
        let pool = pool_with_employees().await;
        let srv = timesheet_app!(pool);
        let req = test::TestRequest::get()
            .uri("/employees/1/summary?start_date=2025-09-30&end_date=2025-09-01")
            .to_request();
        assert_eq!(test::call_service(&srv, req).await.status(), StatusCode::BAD_REQUEST);
    }
}
