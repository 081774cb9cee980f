use crate::api::leave_balance::LeaveBalanceResponse;
use crate::api::leave_request::{CreateLeave, LeaveDecision, LeaveListResponse};
use crate::api::payroll::{ProcessPayroll, UpdatePayroll};
use crate::api::staff::{NewStaff, StaffListResponse};
use crate::auth::handlers::LoginResponse;
use crate::calculation::{Allowances, Deductions, LeaveBalance, LeaveBalanceSnapshot};
use crate::model::leave_request::{LeaveRequest, LeaveStatus, LeaveType};
use crate::model::payroll::{PayrollRecord, PayrollStatus};
use crate::model::staff::{StaffRecord, StaffStatus};
use crate::models::LoginReqDto;
use utoipa::Modify;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{OpenApi, openapi};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "School HR API",
        version = "0.1.0",
        description = r#"
## School payroll and leave service

### Payroll
- `POST /api/staff` with `type: "process-payroll"` runs the monthly payroll
  for every active staff member
- Statutory deductions: pension 8%, NHIS 1.75%, tax 5% of gross, each rounded to the nearest unit
- Records move `draft -> approved -> paid`; paid records are frozen

### Leave
- Staff apply for leave against their annual entitlement (21 days unless set per staff member)
- Balances are re-checked on submission; HR approves or rejects pending requests
- `GET /api/staff/leave-balances` reports used, pending and remaining days for a year

### Security
Everything under `/api` needs a **JWT Bearer** access token from `/auth/login`.
Payroll, staff administration and leave decisions are limited to **HR** and **Admin**.

### Response format
Errors always come back as `{ "success": false, "error": "..." }`.
"#,
    ),
    paths(
        crate::auth::handlers::login,
        crate::auth::handlers::refresh_token,
        crate::auth::handlers::logout,

        crate::api::staff::post_staff,
        crate::api::staff::get_staff,
        crate::api::staff::get_staff_member,
        crate::api::staff::put_staff,

        crate::api::leave_balance::leave_balances,

        crate::api::leave_request::leave_list,
        crate::api::leave_request::get_leave,
        crate::api::leave_request::create_leave,
        crate::api::leave_request::approve_leave,
        crate::api::leave_request::reject_leave
    ),
    components(
        schemas(
            LoginReqDto,
            LoginResponse,
            NewStaff,
            StaffRecord,
            StaffStatus,
            StaffListResponse,
            Allowances,
            Deductions,
            ProcessPayroll,
            UpdatePayroll,
            PayrollRecord,
            PayrollStatus,
            CreateLeave,
            LeaveDecision,
            LeaveRequest,
            LeaveType,
            LeaveStatus,
            LeaveListResponse,
            LeaveBalance,
            LeaveBalanceSnapshot,
            LeaveBalanceResponse
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Auth", description = "Login and token rotation"),
        (name = "Staff", description = "Staff records and payroll runs"),
        (name = "Leave", description = "Leave requests and balances"),
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}
