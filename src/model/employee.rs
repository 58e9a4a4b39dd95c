use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
#[schema(example = json!({
    "id": 1,
    "name": "Alice Johnson",
    "email": "alice@example.com"
}))]
pub struct Employee {
    #[schema(example = 1)]
    pub id: i64,

    #[schema(example = "Alice Johnson")]
    pub name: String,

    #[schema(example = "alice@example.com")]
    pub email: String,
}
