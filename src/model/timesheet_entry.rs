use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct TimesheetEntry {
    #[schema(example = 1)]
    pub id: i64,
    #[schema(example = 1)]
    pub employee_id: i64,
    #[schema(example = "2025-09-10", format = "date", value_type = String)]
    pub entry_date: NaiveDate,
    #[schema(example = 8.0)]
    pub hours: f64,
    #[schema(example = "PROJ001", nullable = true)]
    pub project: Option<String>,
    #[schema(example = "Sprint planning", nullable = true)]
    pub notes: Option<String>,
}
