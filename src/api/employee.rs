use crate::{
    api::{internal_error, message},
    db::Schema,
    model::employee::Employee,
};
use actix_web::{HttpResponse, Responder, web};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tracing::info;
use utoipa::ToSchema;

#[derive(Deserialize, Serialize, ToSchema)]
pub struct CreateEmployee {
    #[schema(example = "Carol Diaz")]
    pub name: String,
    #[schema(example = "carol@example.com", format = "email", value_type = String)]
    pub email: String,
    /// Starting annual balance (leave service only)
    #[schema(example = 20)]
    pub annual_balance: Option<i64>,
    /// Starting sick balance (leave service only)
    #[schema(example = 10)]
    pub sick_balance: Option<i64>,
}

/// Create Employee
#[utoipa::path(
    post,
    path = "/employees",
    request_body = CreateEmployee,
    responses(
        (status = 200, description = "Employee created", body = Employee),
        (status = 400, description = "Email already registered", body = Object, example = json!({
            "message": "Employee with this email already exists"
        }))
    ),
    tag = "Employee"
)]
pub async fn create_employee(
    pool: web::Data<SqlitePool>,
    schema: web::Data<Schema>,
    payload: web::Json<CreateEmployee>,
) -> actix_web::Result<impl Responder> {
    let payload = payload.into_inner();

    let existing: Option<i64> = sqlx::query_scalar("SELECT id FROM employees WHERE email = ?")
        .bind(&payload.email)
        .fetch_optional(pool.get_ref())
        .await
        .map_err(|e| internal_error(e, "Failed to check employee email"))?;
    if existing.is_some() {
        return Ok(message(
            HttpResponse::BadRequest(),
            "Employee with this email already exists",
        ));
    }

    let mut tx = pool
        .begin()
        .await
        .map_err(|e| internal_error(e, "Failed to open transaction"))?;

    let id = sqlx::query("INSERT INTO employees (name, email) VALUES (?, ?)")
        .bind(&payload.name)
        .bind(&payload.email)
        .execute(&mut *tx)
        .await
        .map_err(|e| internal_error(e, "Failed to create employee"))?
        .last_insert_rowid();

    if matches!(**schema, Schema::Leave) {
        sqlx::query(
            "INSERT INTO leave_balances (employee_id, annual_balance, sick_balance) VALUES (?, ?, ?)",
        )
        .bind(id)
        .bind(payload.annual_balance.unwrap_or(20))
        .bind(payload.sick_balance.unwrap_or(10))
        .execute(&mut *tx)
        .await
        .map_err(|e| internal_error(e, "Failed to initialise leave balance"))?;
    }

    tx.commit()
        .await
        .map_err(|e| internal_error(e, "Failed to commit employee"))?;

    info!(employee_id = id, "Employee created");
    Ok(HttpResponse::Ok().json(Employee {
        id,
        name: payload.name,
        email: payload.email,
    }))
}

/// List Employees
#[utoipa::path(
    get,
    path = "/employees",
    responses(
        (status = 200, description = "All employees", body = [Employee])
    ),
    tag = "Employee"
)]
pub async fn list_employees(pool: web::Data<SqlitePool>) -> actix_web::Result<impl Responder> {
    let employees = sqlx::query_as::<_, Employee>("SELECT id, name, email FROM employees ORDER BY id")
        .fetch_all(pool.get_ref())
        .await
        .map_err(|e| internal_error(e, "Failed to list employees"))?;

    Ok(HttpResponse::Ok().json(employees))
}

/// Get Employee
#[utoipa::path(
    get,
    path = "/employees/{employee_id}",
    params(
        ("employee_id" = i64, Path, description = "Employee ID")
    ),
    responses(
        (status = 200, description = "Employee found", body = Employee),
        (status = 404, description = "Employee not found", body = Object, example = json!({
            "message": "Employee not found"
        }))
    ),
    tag = "Employee"
)]
pub async fn get_employee(
    pool: web::Data<SqlitePool>,
    path: web::Path<i64>,
) -> actix_web::Result<impl Responder> {
    let employee_id = path.into_inner();

    let employee =
        sqlx::query_as::<_, Employee>("SELECT id, name, email FROM employees WHERE id = ?")
            .bind(employee_id)
            .fetch_optional(pool.get_ref())
            .await
            .map_err(|e| internal_error(e, "Failed to fetch employee"))?;

    match employee {
        Some(data) => Ok(HttpResponse::Ok().json(data)),
        None => Ok(message(HttpResponse::NotFound(), "Employee not found")),
    }
}
