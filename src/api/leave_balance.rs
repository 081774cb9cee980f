use actix_web::{HttpResponse, web};
use chrono::{Datelike, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{MySql, MySqlPool, QueryBuilder};
use tracing::debug;
use utoipa::{IntoParams, ToSchema};

use crate::auth::auth::AuthUser;
use crate::calculation::{LeaveBalanceSnapshot, snapshots_for_year};
use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::model::leave_request::{LEAVE_COLUMNS, LeaveRequest};
use crate::model::staff::{STAFF_COLUMNS, StaffRecord};

#[derive(Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
pub struct BalanceQuery {
    /// Defaults to the current year
    pub year: Option<i32>,
    /// Limit the report to one staff member
    pub staff_id: Option<u64>,
}

#[derive(Serialize, ToSchema)]
pub struct LeaveBalanceResponse {
    #[schema(example = true)]
    pub success: bool,
    #[schema(example = 2025)]
    pub year: i32,
    pub data: Vec<LeaveBalanceSnapshot>,
}

#[utoipa::path(
    get,
    path = "/api/staff/leave-balances",
    params(BalanceQuery),
    responses(
        (status = 200, description = "One balance per staff member", body = LeaveBalanceResponse),
        (status = 400, description = "Invalid year"),
        (status = 403, description = "Staff may only read their own balance")
    ),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
pub async fn leave_balances(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
    query: web::Query<BalanceQuery>,
) -> AppResult<HttpResponse> {
    let year = query.year.unwrap_or_else(|| Utc::now().year());
    if !(1900..=2999).contains(&year) {
        return Err(AppError::validation("year must be between 1900 and 2999"));
    }

    let staff_id = match (auth.is_staff(), query.staff_id) {
        (true, requested) => {
            let own = auth
                .staff_id
                .ok_or_else(|| AppError::forbidden("No staff profile"))?;
            auth.require_access_to(requested.unwrap_or(own))?;
            Some(own)
        }
        (false, requested) => requested,
    };

    let mut staff_qb: QueryBuilder<MySql> =
        QueryBuilder::new(format!("SELECT {STAFF_COLUMNS} FROM staff"));
    let mut leave_qb: QueryBuilder<MySql> = QueryBuilder::new(format!(
        "SELECT {LEAVE_COLUMNS} FROM leave_requests WHERE YEAR(start_date) = "
    ));
    leave_qb.push_bind(year);

    if let Some(staff_id) = staff_id {
        staff_qb.push(" WHERE id = ").push_bind(staff_id);
        leave_qb.push(" AND staff_id = ").push_bind(staff_id);
    }
    staff_qb.push(" ORDER BY id");

    let staff = staff_qb
        .build_query_as::<StaffRecord>()
        .fetch_all(pool.get_ref())
        .await?;
    if staff_id.is_some() && staff.is_empty() {
        return Err(AppError::not_found("Staff member not found"));
    }

    let requests = leave_qb
        .build_query_as::<LeaveRequest>()
        .fetch_all(pool.get_ref())
        .await?;
    debug!(year, staff = staff.len(), requests = requests.len(), "Computing leave balances");

    let data = snapshots_for_year(&staff, &requests, year, config.default_leave_entitlement);

    Ok(HttpResponse::Ok().json(LeaveBalanceResponse {
        success: true,
        year,
        data,
    }))
}
