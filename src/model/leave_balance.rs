use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::model::leave_request::LeaveType;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct LeaveBalance {
    #[schema(example = 1)]
    pub id: i64,
    #[schema(example = 1)]
    pub employee_id: i64,
    #[schema(example = 20)]
    pub annual_balance: i64,
    #[schema(example = 10)]
    pub sick_balance: i64,
}

impl LeaveBalance {
    pub fn available(&self, leave_type: LeaveType) -> i64 {
        match leave_type {
            LeaveType::Annual => self.annual_balance,
            LeaveType::Sick => self.sick_balance,
        }
    }

    /// Applies `delta` days to the balance of `leave_type`.
    pub fn adjust(&mut self, leave_type: LeaveType, delta: i64) {
        match leave_type {
            LeaveType::Annual => self.annual_balance += delta,
            LeaveType::Sick => self.sick_balance += delta,
        }
    }
}
