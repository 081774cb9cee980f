use actix_web::{HttpResponse, web};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use sqlx::{MySql, MySqlPool, QueryBuilder};
use tracing::{debug, info};
use utoipa::{IntoParams, ToSchema};

use crate::api::payroll::{self, PayrollFilter, ProcessPayroll, UpdatePayroll};
use crate::auth::auth::AuthUser;
use crate::calculation::{Allowances, ensure_amount};
use crate::error::{AppError, AppResult, is_duplicate_key};
use crate::model::staff::{STAFF_COLUMNS, StaffRecord, StaffStatus};
use crate::utils::db_utils::{Column, ColumnKind, build_update_sql, execute_update};

/// Body of `POST /api/staff`; the `type` field picks the operation.
#[derive(Deserialize)]
#[serde(tag = "type")]
pub enum StaffCommand {
    #[serde(rename = "process-payroll")]
    ProcessPayroll(ProcessPayroll),
    #[serde(rename = "staff")]
    Hire(NewStaff),
}

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NewStaff {
    #[schema(example = "EMP001")]
    pub employee_id: String,
    #[schema(example = "Ama")]
    pub first_name: String,
    #[schema(example = "Mensah")]
    pub last_name: String,
    #[schema(example = "Science")]
    pub department: String,
    #[schema(example = "Teacher")]
    pub position: String,
    #[schema(example = 100000.0)]
    pub basic_salary: f64,
    #[serde(default)]
    pub allowances: Allowances,
    #[schema(example = 21)]
    pub leave_balance: Option<i32>,
}

impl NewStaff {
    fn validate(&self) -> AppResult<()> {
        for (field, value) in [
            ("employeeId", &self.employee_id),
            ("firstName", &self.first_name),
            ("lastName", &self.last_name),
            ("department", &self.department),
            ("position", &self.position),
        ] {
            if value.trim().is_empty() {
                return Err(AppError::validation(format!("{field} is required")));
            }
        }
        ensure_amount("basicSalary", self.basic_salary)?;
        self.allowances.validate()?;
        if matches!(self.leave_balance, Some(days) if days < 0) {
            return Err(AppError::validation("leaveBalance cannot be negative"));
        }
        Ok(())
    }
}

#[derive(Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
pub struct StaffQuery {
    /// `payroll` lists payroll records; omitted or `staff` lists staff
    #[serde(rename = "type")]
    pub kind: Option<String>,
    /// Payroll month filter (1-12)
    pub month: Option<i32>,
    /// Payroll year filter
    pub year: Option<i32>,
    /// Payroll staff filter
    pub staff_id: Option<u64>,
    /// Staff status filter
    pub status: Option<StaffStatus>,
    /// Staff department filter
    pub department: Option<String>,
    /// Search by name or employee id
    pub search: Option<String>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

#[derive(Deserialize, IntoParams)]
pub struct RecordSelector {
    /// Record id
    pub id: u64,
    /// `payroll` updates a payroll record; omitted or `staff` updates a staff record
    #[serde(rename = "type")]
    pub kind: Option<String>,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StaffListResponse {
    #[schema(example = true)]
    pub success: bool,
    pub data: Vec<StaffRecord>,
    #[schema(example = 1)]
    pub page: u32,
    #[schema(example = 20)]
    pub per_page: u32,
    #[schema(example = 42)]
    pub total: i64,
}

const STAFF_UPDATE_COLUMNS: &[Column] = &[
    Column::new("employeeId", "employee_id", ColumnKind::Text),
    Column::new("firstName", "first_name", ColumnKind::Text),
    Column::new("lastName", "last_name", ColumnKind::Text),
    Column::new("department", "department", ColumnKind::Text),
    Column::new("position", "position", ColumnKind::Text),
    Column::new("status", "status", ColumnKind::Choice(is_staff_status)),
    Column::new("basicSalary", "basic_salary", ColumnKind::Amount),
    Column::new("allowances.housing", "housing_allowance", ColumnKind::Amount),
    Column::new("allowances.transport", "transport_allowance", ColumnKind::Amount),
    Column::new("allowances.meal", "meal_allowance", ColumnKind::Amount),
    Column::new("allowances.teaching", "teaching_allowance", ColumnKind::Amount),
    Column::new("allowances.medical", "medical_allowance", ColumnKind::Amount),
    Column::new("allowances.other", "other_allowance", ColumnKind::Amount),
    Column::new("leaveBalance", "leave_balance", ColumnKind::OptionalCount),
];

fn is_staff_status(value: &str) -> bool {
    value.parse::<StaffStatus>().is_ok()
}

pub(crate) async fn fetch_staff<'e, E>(executor: E, staff_id: u64) -> AppResult<StaffRecord>
where
    E: sqlx::Executor<'e, Database = MySql>,
{
    let sql = format!("SELECT {STAFF_COLUMNS} FROM staff WHERE id = ?");
    sqlx::query_as::<_, StaffRecord>(&sql)
        .bind(staff_id)
        .fetch_optional(executor)
        .await?
        .ok_or_else(|| AppError::not_found("Staff member not found"))
}

#[utoipa::path(
    post,
    path = "/api/staff",
    request_body(
        content = ProcessPayroll,
        description = "`{ \"type\": \"process-payroll\", month, year }` runs payroll for every active staff member; `{ \"type\": \"staff\", ...NewStaff }` hires a staff member",
        content_type = "application/json"
    ),
    responses(
        (status = 200, description = "Payroll processed", body = Object, example = json!({
            "success": true,
            "message": "Payroll processed for 12 staff member(s)",
            "processed": 12
        })),
        (status = 201, description = "Staff member created", body = StaffRecord),
        (status = 400, description = "Invalid period, validation failure or no active staff", body = Object, example = json!({
            "success": false,
            "error": "No active staff found to process payroll"
        })),
        (status = 403, description = "HR/Admin only"),
        (status = 409, description = "Period already processed or employee id taken")
    ),
    security(("bearer_auth" = [])),
    tag = "Staff"
)]
pub async fn post_staff(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<StaffCommand>,
) -> AppResult<HttpResponse> {
    match payload.into_inner() {
        StaffCommand::ProcessPayroll(run) => payroll::process_payroll(&auth, &pool, run).await,
        StaffCommand::Hire(new_staff) => hire_staff(&auth, &pool, new_staff).await,
    }
}

async fn hire_staff(
    auth: &AuthUser,
    pool: &MySqlPool,
    payload: NewStaff,
) -> AppResult<HttpResponse> {
    auth.require_hr_or_admin()?;
    payload.validate()?;

    let a = &payload.allowances;
    let result = sqlx::query(
        r#"
        INSERT INTO staff
        (employee_id, first_name, last_name, department, position, status, basic_salary,
         housing_allowance, transport_allowance, meal_allowance, teaching_allowance,
         medical_allowance, other_allowance, leave_balance)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(payload.employee_id.trim())
    .bind(payload.first_name.trim())
    .bind(payload.last_name.trim())
    .bind(payload.department.trim())
    .bind(payload.position.trim())
    .bind(StaffStatus::Active.as_ref())
    .bind(payload.basic_salary)
    .bind(a.housing)
    .bind(a.transport)
    .bind(a.meal)
    .bind(a.teaching)
    .bind(a.medical)
    .bind(a.other)
    .bind(payload.leave_balance)
    .execute(pool)
    .await
    .map_err(|e| {
        if is_duplicate_key(&e) {
            AppError::conflict(format!("Employee id {} already exists", payload.employee_id.trim()))
        } else {
            AppError::from(e)
        }
    })?;

    let staff = fetch_staff(pool, result.last_insert_id()).await?;
    info!(
        staff_id = staff.id,
        employee_id = %staff.employee_id,
        by = %auth.username,
        "Staff member hired"
    );

    Ok(HttpResponse::Created().json(json!({
        "success": true,
        "data": staff,
    })))
}

#[utoipa::path(
    get,
    path = "/api/staff",
    params(StaffQuery),
    responses(
        (status = 200, description = "Staff list, or `{ success, payroll }` when type=payroll", body = StaffListResponse),
        (status = 400, description = "Unknown type"),
        (status = 403, description = "Forbidden")
    ),
    security(("bearer_auth" = [])),
    tag = "Staff"
)]
pub async fn get_staff(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<StaffQuery>,
) -> AppResult<HttpResponse> {
    match query.kind.as_deref() {
        Some("payroll") => {
            let filter = PayrollFilter {
                month: query.month,
                year: query.year,
                staff_id: query.staff_id,
            };
            payroll::list_payroll(&auth, &pool, filter).await
        }
        None | Some("staff") => list_staff(&auth, &pool, &query).await,
        Some(other) => Err(AppError::validation(format!("Unknown type: {other}"))),
    }
}

/// `(page, per_page, offset)`; pages start at 1 and hold at most 100 rows.
fn page_window(page: Option<u32>, per_page: Option<u32>) -> AppResult<(u32, u32, u32)> {
    let page = page.unwrap_or(1).max(1);
    let per_page = per_page.unwrap_or(20).clamp(1, 100);
    let offset = (page - 1)
        .checked_mul(per_page)
        .ok_or_else(|| AppError::validation("page is out of range"))?;
    Ok((page, per_page, offset))
}

async fn list_staff(
    auth: &AuthUser,
    pool: &MySqlPool,
    query: &StaffQuery,
) -> AppResult<HttpResponse> {
    auth.require_hr_or_admin()?;

    let (page, per_page, offset) = page_window(query.page, query.per_page)?;

    // ---------- shared WHERE clause ----------
    fn push_filters(qb: &mut QueryBuilder<'_, MySql>, query: &StaffQuery) {
        qb.push(" WHERE 1=1");
        if let Some(status) = query.status {
            qb.push(" AND status = ").push_bind(status.to_string());
        }
        if let Some(department) = &query.department {
            qb.push(" AND department = ").push_bind(department.clone());
        }
        if let Some(search) = &query.search {
            let like = format!("%{}%", search.trim());
            qb.push(" AND (first_name LIKE ")
                .push_bind(like.clone())
                .push(" OR last_name LIKE ")
                .push_bind(like.clone())
                .push(" OR employee_id LIKE ")
                .push_bind(like)
                .push(")");
        }
    }

    let mut count_qb: QueryBuilder<MySql> = QueryBuilder::new("SELECT COUNT(*) FROM staff");
    push_filters(&mut count_qb, query);
    debug!(sql = %count_qb.sql(), "Counting staff");
    let total: i64 = count_qb.build_query_scalar().fetch_one(pool).await?;

    let mut data_qb: QueryBuilder<MySql> =
        QueryBuilder::new(format!("SELECT {STAFF_COLUMNS} FROM staff"));
    push_filters(&mut data_qb, query);
    data_qb
        .push(" ORDER BY id DESC LIMIT ")
        .push_bind(per_page as i64)
        .push(" OFFSET ")
        .push_bind(offset as i64);
    debug!(sql = %data_qb.sql(), page, per_page, offset, "Fetching staff");
    let data = data_qb.build_query_as::<StaffRecord>().fetch_all(pool).await?;

    Ok(HttpResponse::Ok().json(StaffListResponse {
        success: true,
        data,
        page,
        per_page,
        total,
    }))
}

#[utoipa::path(
    get,
    path = "/api/staff/{staff_id}",
    params(("staff_id" = u64, Path, description = "Staff id")),
    responses(
        (status = 200, description = "Staff member", body = StaffRecord),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Staff member not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Staff"
)]
pub async fn get_staff_member(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> AppResult<HttpResponse> {
    let staff_id = path.into_inner();
    auth.require_access_to(staff_id)?;

    let staff = fetch_staff(pool.get_ref(), staff_id).await?;

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "data": staff,
    })))
}

#[utoipa::path(
    put,
    path = "/api/staff",
    params(RecordSelector),
    request_body(
        content = UpdatePayroll,
        description = "With type=payroll an `UpdatePayroll`; otherwise any subset of staff fields (`status: \"inactive\"` deactivates)",
        content_type = "application/json"
    ),
    responses(
        (status = 200, description = "Record updated", body = Object),
        (status = 400, description = "Invalid field or value"),
        (status = 404, description = "Record not found"),
        (status = 409, description = "Lifecycle violation")
    ),
    security(("bearer_auth" = [])),
    tag = "Staff"
)]
pub async fn put_staff(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    selector: web::Query<RecordSelector>,
    body: web::Json<Value>,
) -> AppResult<HttpResponse> {
    match selector.kind.as_deref() {
        Some("payroll") => {
            let update: UpdatePayroll = serde_json::from_value(body.into_inner())
                .map_err(|e| AppError::validation(e.to_string()))?;
            payroll::update_payroll(&auth, &pool, selector.id, update).await
        }
        None | Some("staff") => update_staff(&auth, &pool, selector.id, &body).await,
        Some(other) => Err(AppError::validation(format!("Unknown type: {other}"))),
    }
}

async fn update_staff(
    auth: &AuthUser,
    pool: &MySqlPool,
    staff_id: u64,
    body: &Value,
) -> AppResult<HttpResponse> {
    auth.require_hr_or_admin()?;

    let update = build_update_sql("staff", body, STAFF_UPDATE_COLUMNS, "id", staff_id)?;

    let affected = execute_update(pool, update).await.map_err(|e| {
        if is_duplicate_key(&e) {
            AppError::conflict("Employee id already exists")
        } else {
            AppError::from(e)
        }
    })?;

    if affected == 0 {
        return Err(AppError::not_found("Staff member not found"));
    }

    let staff = fetch_staff(pool, staff_id).await?;
    info!(staff_id, status = %staff.status, by = %auth.username, "Staff member updated");

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": "Staff member updated successfully",
        "data": staff,
    })))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_staff() -> NewStaff {
        serde_json::from_value(json!({
            "type": "staff",
            "employeeId": "EMP010",
            "firstName": "Yaw",
            "lastName": "Boateng",
            "department": "English",
            "position": "Teacher",
            "basicSalary": 90000,
            "allowances": {"housing": 20000, "transport": 5000}
        }))
        .unwrap()
    }

    #[test]
    fn command_tag_selects_operation() {
        let run: StaffCommand =
            serde_json::from_value(json!({"type": "process-payroll", "month": 8, "year": 2025}))
                .unwrap();
        assert!(matches!(
            run,
            StaffCommand::ProcessPayroll(ProcessPayroll { month: 8, year: 2025 })
        ));

        let hire: StaffCommand = serde_json::from_value(json!({
            "type": "staff",
            "employeeId": "EMP010",
            "firstName": "Yaw",
            "lastName": "Boateng",
            "department": "English",
            "position": "Teacher",
            "basicSalary": 90000
        }))
        .unwrap();
        assert!(matches!(hire, StaffCommand::Hire(_)));

        assert!(serde_json::from_value::<StaffCommand>(json!({"type": "fire", "id": 1})).is_err());
    }

    #[test]
    fn missing_allowances_default_to_zero() {
        let staff = new_staff();
        assert_eq!(staff.allowances.meal, 0.0);
        assert_eq!(staff.allowances.total(), 25000.0);
        assert!(staff.validate().is_ok());
    }

    #[test]
    fn hiring_validation() {
        let mut blank = new_staff();
        blank.department = "  ".into();
        assert_eq!(blank.validate().unwrap_err().to_string(), "department is required");

        let mut negative = new_staff();
        negative.basic_salary = -1.0;
        assert!(negative.validate().is_err());

        let mut overdrawn = new_staff();
        overdrawn.leave_balance = Some(-3);
        assert!(overdrawn.validate().is_err());
    }

    #[test]
    fn paging_defaults_and_bounds() {
        assert_eq!(page_window(None, None).unwrap(), (1, 20, 0));
        assert_eq!(page_window(Some(0), Some(500)).unwrap(), (1, 100, 0));
        assert_eq!(page_window(Some(3), Some(25)).unwrap(), (3, 25, 50));
    }

    #[test]
    fn huge_page_is_rejected_instead_of_wrapping() {
        let err = page_window(Some(u32::MAX), Some(100)).unwrap_err();
        assert_eq!(err.to_string(), "page is out of range");
        assert!(page_window(Some(u32::MAX), Some(1)).is_ok());
    }

    #[test]
    fn every_updatable_staff_field_is_whitelisted() {
        let update = build_update_sql(
            "staff",
            &json!({
                "status": "inactive",
                "leaveBalance": 25,
                "allowances": {"teaching": 1000}
            }),
            STAFF_UPDATE_COLUMNS,
            "id",
            3,
        )
        .unwrap();
        assert_eq!(
            update.sql,
            "UPDATE staff SET teaching_allowance = ?, leave_balance = ?, status = ? WHERE id = ?"
        );

        assert!(
            build_update_sql("staff", &json!({"status": "retired"}), STAFF_UPDATE_COLUMNS, "id", 3)
                .is_err()
        );
    }
}
