use actix_web::{HttpResponse, web};
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::{MySql, MySqlPool, QueryBuilder};
use tracing::{debug, info, warn};
use utoipa::{IntoParams, ToSchema};

use crate::auth::auth::AuthUser;
use crate::calculation::{LeaveBalance, entitlement_for, leave_days};
use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::model::leave_request::{LEAVE_COLUMNS, LeaveRequest, LeaveStatus, LeaveType};
use crate::model::staff::{STAFF_COLUMNS, StaffRecord};

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateLeave {
    /// Checked against the staff record when given
    #[schema(example = "EMP001")]
    pub employee_id: Option<String>,
    /// Defaults to the caller's own staff record
    #[schema(example = 1)]
    pub staff_id: Option<u64>,
    #[serde(rename = "type")]
    #[schema(example = "annual")]
    pub leave_type: LeaveType,
    #[schema(example = "2025-08-10", format = "date", value_type = String)]
    pub start_date: NaiveDate,
    #[schema(example = "2025-08-14", format = "date", value_type = String)]
    pub end_date: NaiveDate,
    #[schema(example = "Family visit")]
    pub reason: String,
}

#[derive(Deserialize, ToSchema)]
pub struct LeaveDecision {
    #[schema(example = "Enjoy your break")]
    pub remarks: Option<String>,
}

#[derive(Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
pub struct LeaveFilter {
    /// Filter by staff id
    pub staff_id: Option<u64>,
    /// Filter by leave status
    pub status: Option<LeaveStatus>,
    /// Requests starting in this year
    pub year: Option<i32>,
}

#[derive(Serialize, ToSchema)]
pub struct LeaveListResponse {
    #[schema(example = true)]
    pub success: bool,
    pub data: Vec<LeaveRequest>,
}

async fn fetch_leave(pool: &MySqlPool, leave_id: u64) -> AppResult<LeaveRequest> {
    let sql = format!("SELECT {LEAVE_COLUMNS} FROM leave_requests WHERE id = ?");
    sqlx::query_as::<_, LeaveRequest>(&sql)
        .bind(leave_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::not_found("Leave request not found"))
}

/* =========================
Submit leave request
========================= */
#[utoipa::path(
    post,
    path = "/api/leave",
    request_body(
        content = CreateLeave,
        description = "Leave request payload",
        content_type = "application/json"
    ),
    responses(
        (status = 201, description = "Leave request submitted", body = Object, example = json!({
            "success": true,
            "data": {"id": 12, "type": "annual", "days": 5, "status": "pending"}
        })),
        (status = 400, description = "Invalid dates, inactive staff or insufficient balance", body = Object, example = json!({
            "success": false,
            "error": "Insufficient leave balance: requested 5 day(s), 3 remaining"
        })),
        (status = 403, description = "Staff may only apply for themselves"),
        (status = 404, description = "Staff member not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
pub async fn create_leave(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
    payload: web::Json<CreateLeave>,
) -> AppResult<HttpResponse> {
    let payload = payload.into_inner();

    let staff_id = payload
        .staff_id
        .or(auth.staff_id)
        .ok_or_else(|| AppError::validation("staffId is required"))?;
    auth.require_access_to(staff_id)?;

    // nothing is read or written for a malformed request
    let days = leave_days(payload.start_date, payload.end_date)?;
    let reason = payload.reason.trim();
    if reason.is_empty() {
        return Err(AppError::validation("reason is required"));
    }

    let mut tx = pool.begin().await?;

    // Locking the staff row serialises concurrent submissions for the same person.
    let sql = format!("SELECT {STAFF_COLUMNS} FROM staff WHERE id = ? FOR UPDATE");
    let staff = sqlx::query_as::<_, StaffRecord>(&sql)
        .bind(staff_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::not_found("Staff member not found"))?;

    if !staff.is_active() {
        return Err(AppError::validation(format!(
            "Staff member is {} and cannot apply for leave",
            staff.status
        )));
    }
    if let Some(employee_id) = payload.employee_id.as_deref() {
        if employee_id != staff.employee_id {
            return Err(AppError::validation("employeeId does not match staffId"));
        }
    }

    let year = payload.start_date.year();
    let sql = format!(
        "SELECT {LEAVE_COLUMNS} FROM leave_requests WHERE staff_id = ? AND YEAR(start_date) = ?"
    );
    let filed = sqlx::query_as::<_, LeaveRequest>(&sql)
        .bind(staff_id)
        .bind(year)
        .fetch_all(&mut *tx)
        .await?;

    let balance = LeaveBalance::compute(
        entitlement_for(staff.leave_balance, config.default_leave_entitlement),
        &filed,
    );
    debug!(staff_id, year, days, remaining = balance.remaining_leave, "Checked leave balance");

    if !balance.can_take(days) {
        warn!(staff_id, days, remaining = balance.remaining_leave, "Leave request exceeds balance");
        return Err(AppError::InsufficientLeave {
            requested: days,
            remaining: balance.remaining_leave,
        });
    }

    let result = sqlx::query(
        r#"
        INSERT INTO leave_requests
            (staff_id, employee_id, leave_type, start_date, end_date, days, reason, status)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(staff_id)
    .bind(&staff.employee_id)
    .bind(payload.leave_type.as_ref())
    .bind(payload.start_date)
    .bind(payload.end_date)
    .bind(days)
    .bind(reason)
    .bind(LeaveStatus::Pending.as_ref())
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    let leave = fetch_leave(&pool, result.last_insert_id()).await?;
    info!(leave_id = leave.id, staff_id, days, by = %auth.username, "Leave request submitted");

    Ok(HttpResponse::Created().json(json!({
        "success": true,
        "data": leave,
    })))
}

async fn decide(
    auth: &AuthUser,
    pool: &MySqlPool,
    leave_id: u64,
    next: LeaveStatus,
    remarks: Option<String>,
) -> AppResult<HttpResponse> {
    auth.require_hr_or_admin()?;

    let remarks = remarks
        .map(|r| r.trim().to_string())
        .filter(|r| !r.is_empty());

    let result = sqlx::query(
        r#"
        UPDATE leave_requests
        SET status = ?, approved_by = ?, approved_date = NOW(), remarks = ?
        WHERE id = ?
        AND status = ?
        "#,
    )
    .bind(next.as_ref())
    .bind(&auth.username)
    .bind(remarks)
    .bind(leave_id)
    .bind(LeaveStatus::Pending.as_ref())
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        // missing, or already decided
        let current = fetch_leave(pool, leave_id).await?;
        if !current.status.can_transition_to(next) {
            return Err(AppError::conflict(format!(
                "Leave request is already {}",
                current.status
            )));
        }
        return Err(AppError::conflict("Leave request was changed by someone else"));
    }

    let leave = fetch_leave(pool, leave_id).await?;
    info!(leave_id, status = %next, by = %auth.username, "Leave request decided");

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": format!("Leave {next}"),
        "data": leave,
    })))
}

#[utoipa::path(
    put,
    path = "/api/leave/{leave_id}/approve",
    params(("leave_id" = u64, Path, description = "ID of the leave request to approve")),
    request_body(content = LeaveDecision, description = "Optional remarks", content_type = "application/json"),
    responses(
        (status = 200, description = "Leave approved", body = Object, example = json!({
            "success": true,
            "message": "Leave approved"
        })),
        (status = 403, description = "HR/Admin only"),
        (status = 404, description = "Leave request not found"),
        (status = 409, description = "Leave request already decided", body = Object, example = json!({
            "success": false,
            "error": "Leave request is already rejected"
        }))
    ),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
pub async fn approve_leave(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    body: Option<web::Json<LeaveDecision>>,
) -> AppResult<HttpResponse> {
    let remarks = body.and_then(|b| b.into_inner().remarks);
    decide(&auth, &pool, path.into_inner(), LeaveStatus::Approved, remarks).await
}

#[utoipa::path(
    put,
    path = "/api/leave/{leave_id}/reject",
    params(("leave_id" = u64, Path, description = "ID of the leave request to reject")),
    request_body(content = LeaveDecision, description = "Optional remarks", content_type = "application/json"),
    responses(
        (status = 200, description = "Leave rejected", body = Object, example = json!({
            "success": true,
            "message": "Leave rejected"
        })),
        (status = 403, description = "HR/Admin only"),
        (status = 404, description = "Leave request not found"),
        (status = 409, description = "Leave request already decided")
    ),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
pub async fn reject_leave(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    body: Option<web::Json<LeaveDecision>>,
) -> AppResult<HttpResponse> {
    let remarks = body.and_then(|b| b.into_inner().remarks);
    decide(&auth, &pool, path.into_inner(), LeaveStatus::Rejected, remarks).await
}

#[utoipa::path(
    get,
    path = "/api/leave/{leave_id}",
    params(("leave_id" = u64, Path, description = "ID of the leave request to fetch")),
    responses(
        (status = 200, description = "Leave request found", body = LeaveRequest),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Leave request not found", body = Object, example = json!({
            "success": false,
            "error": "Leave request not found"
        }))
    ),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
pub async fn get_leave(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> AppResult<HttpResponse> {
    let leave = fetch_leave(&pool, path.into_inner()).await?;
    auth.require_access_to(leave.staff_id)?;

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "data": leave,
    })))
}

#[utoipa::path(
    get,
    path = "/api/leave",
    params(LeaveFilter),
    responses(
        (status = 200, description = "Leave requests, newest first", body = LeaveListResponse),
        (status = 403, description = "Forbidden")
    ),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
pub async fn leave_list(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<LeaveFilter>,
) -> AppResult<HttpResponse> {
    let mut staff_id = query.staff_id;
    if auth.is_staff() {
        let own = auth
            .staff_id
            .ok_or_else(|| AppError::forbidden("No staff profile"))?;
        auth.require_access_to(staff_id.unwrap_or(own))?;
        staff_id = Some(own);
    }

    let mut qb: QueryBuilder<MySql> =
        QueryBuilder::new(format!("SELECT {LEAVE_COLUMNS} FROM leave_requests WHERE 1=1"));
    if let Some(staff_id) = staff_id {
        qb.push(" AND staff_id = ").push_bind(staff_id);
    }
    if let Some(status) = query.status {
        qb.push(" AND status = ").push_bind(status.to_string());
    }
    if let Some(year) = query.year {
        qb.push(" AND YEAR(start_date) = ").push_bind(year);
    }
    qb.push(" ORDER BY applied_date DESC, id DESC");

    let data = qb.build_query_as::<LeaveRequest>().fetch_all(pool.get_ref()).await?;

    Ok(HttpResponse::Ok().json(LeaveListResponse {
        success: true,
        data,
    }))
}
