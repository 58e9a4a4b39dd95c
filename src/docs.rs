use crate::api::employee::CreateEmployee;
use crate::api::leave_balance::UpdateBalance;
use crate::api::leave_request::{CreateLeave, UpdateLeaveStatus};
use crate::api::timesheet::{CreateEntry, EmployeeHours, ProjectHours, TimesheetSummary};
use crate::model::employee::Employee;
use crate::model::leave_balance::LeaveBalance;
use crate::model::leave_request::{LeaveRequest, LeaveStatus, LeaveType};
use crate::model::timesheet_entry::TimesheetEntry;
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Leave API",
        version = "1.0.0",
        description = r#"
## Leave Service

Owns employees, their leave balances and their leave requests.

- Employees start with an annual and a sick balance
- Leave requests are checked against the balance when created
- Approving a request deducts its day count from the matching balance

Built with **Rust**, **Actix Web**, **SQLx**, and **Utoipa**.
"#,
    ),
    paths(
        crate::api::health::health,
        crate::api::employee::create_employee,
        crate::api::employee::list_employees,
        crate::api::employee::get_employee,
        crate::api::leave_balance::get_balance,
        crate::api::leave_balance::set_balance,
        crate::api::leave_request::create_leave,
        crate::api::leave_request::list_leaves,
        crate::api::leave_request::update_leave_status,
        crate::api::leave_request::approve_leave,
        crate::api::leave_request::reject_leave
    ),
    components(
        schemas(
            Employee,
            CreateEmployee,
            LeaveBalance,
            UpdateBalance,
            LeaveRequest,
            LeaveType,
            LeaveStatus,
            CreateLeave,
            UpdateLeaveStatus
        )
    ),
    tags(
        (name = "Health", description = "Liveness"),
        (name = "Employee", description = "Employee management APIs"),
        (name = "Leave", description = "Leave balance and request APIs"),
    )
)]
pub struct LeaveApiDoc;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Timesheet API",
        version = "1.0.0",
        description = r#"
## Timesheet Service

Owns employees and the hours they log per day and project, with
per-employee and per-project totals over a date range.

Built with **Rust**, **Actix Web**, **SQLx**, and **Utoipa**.
"#,
    ),
    paths(
        crate::api::health::health,
        crate::api::employee::create_employee,
        crate::api::employee::list_employees,
        crate::api::employee::get_employee,
        crate::api::timesheet::create_entry,
        crate::api::timesheet::list_entries,
        crate::api::timesheet::employee_summary,
        crate::api::timesheet::project_hours
    ),
    components(
        schemas(
            Employee,
            CreateEmployee,
            TimesheetEntry,
            CreateEntry,
            TimesheetSummary,
            EmployeeHours,
            ProjectHours
        )
    ),
    tags(
        (name = "Health", description = "Liveness"),
        (name = "Employee", description = "Employee management APIs"),
        (name = "Timesheet", description = "Timesheet entry and reporting APIs"),
    )
)]
pub struct TimesheetApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn each_service_documents_only_its_own_paths() {
        let leave = LeaveApiDoc::openapi();
        assert!(leave.paths.paths.contains_key("/employees/{employee_id}/leave-requests"));
        assert!(!leave.paths.paths.contains_key("/employees/{employee_id}/entries"));

        let timesheet = TimesheetApiDoc::openapi();
        assert!(timesheet.paths.paths.contains_key("/projects/{project}/hours"));
        assert!(!timesheet.paths.paths.contains_key("/leave-requests/{leave_id}/status"));
    }
}
