use actix_web::HttpResponse;
use serde::Deserialize;
use serde_json::json;
use sqlx::{MySql, MySqlPool, QueryBuilder};
use tracing::{debug, info, warn};
use utoipa::ToSchema;

use crate::auth::auth::AuthUser;
use crate::calculation::{build_payroll_run, ensure_amount, validate_period};
use crate::error::{AppError, AppResult, is_duplicate_key};
use crate::model::payroll::{NewPayrollRecord, PAYROLL_COLUMNS, PayrollRecord, PayrollStatus};
use crate::model::staff::{STAFF_COLUMNS, StaffRecord};

#[derive(Deserialize, ToSchema)]
pub struct ProcessPayroll {
    #[schema(example = 8)]
    pub month: i32,
    #[schema(example = 2025)]
    pub year: i32,
}

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct UpdatePayroll {
    #[schema(example = "approved")]
    pub status: Option<PayrollStatus>,
    #[schema(example = 0.0)]
    pub absence_deduction: Option<f64>,
    #[schema(example = 10000.0)]
    pub loan_deduction: Option<f64>,
    #[schema(example = 0.0)]
    pub other_deduction: Option<f64>,
}

impl UpdatePayroll {
    fn edits_deductions(&self) -> bool {
        self.absence_deduction.is_some()
            || self.loan_deduction.is_some()
            || self.other_deduction.is_some()
    }
}

pub struct PayrollFilter {
    pub month: Option<i32>,
    pub year: Option<i32>,
    pub staff_id: Option<u64>,
}

async fn fetch_payroll(pool: &MySqlPool, payroll_id: u64) -> AppResult<PayrollRecord> {
    let sql = format!("SELECT {PAYROLL_COLUMNS} FROM payroll WHERE id = ?");
    sqlx::query_as::<_, PayrollRecord>(&sql)
        .bind(payroll_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::not_found("Payroll record not found"))
}

/// Rows per INSERT. 25 placeholders each keeps a statement far below MySQL's 65,535.
const INSERT_CHUNK_ROWS: usize = 1000;

/// One multi-row INSERT per chunk of the run.
fn insert_statements(records: &[NewPayrollRecord]) -> Vec<QueryBuilder<'static, MySql>> {
    records
        .chunks(INSERT_CHUNK_ROWS)
        .map(|chunk| {
            let mut qb: QueryBuilder<MySql> = QueryBuilder::new(
                r#"INSERT INTO payroll
                (staff_id, employee_id, staff_name, month, year, basic_salary,
                 housing_allowance, transport_allowance, meal_allowance, teaching_allowance,
                 medical_allowance, other_allowance, total_allowances,
                 pension_deduction, tax_deduction, nhis_deduction, absence_deduction,
                 loan_deduction, other_deduction,
                 gross_salary, total_deductions, net_salary, working_days, days_worked, status) "#,
            );

            qb.push_values(chunk, |mut row, r| {
                let d = &r.pay.deductions;
                row.push_bind(r.staff_id)
                    .push_bind(r.employee_id.clone())
                    .push_bind(r.staff_name.clone())
                    .push_bind(r.month)
                    .push_bind(r.year)
                    .push_bind(r.basic_salary)
                    .push_bind(r.allowances.housing)
                    .push_bind(r.allowances.transport)
                    .push_bind(r.allowances.meal)
                    .push_bind(r.allowances.teaching)
                    .push_bind(r.allowances.medical)
                    .push_bind(r.allowances.other)
                    .push_bind(r.pay.total_allowances)
                    .push_bind(d.pension)
                    .push_bind(d.tax)
                    .push_bind(d.nhis)
                    .push_bind(d.absence)
                    .push_bind(d.loan)
                    .push_bind(d.other)
                    .push_bind(r.pay.gross_salary)
                    .push_bind(r.pay.total_deductions)
                    .push_bind(r.pay.net_salary)
                    .push_bind(r.working_days)
                    .push_bind(r.days_worked)
                    .push_bind(r.status.to_string());
            });
            qb
        })
        .collect()
}

/// Writes a whole run inside one transaction, so either every record lands or none do.
async fn insert_run(pool: &MySqlPool, records: &[NewPayrollRecord]) -> Result<u64, sqlx::Error> {
    let mut tx = pool.begin().await?;

    let mut inserted = 0;
    for mut statement in insert_statements(records) {
        let result = statement.build().execute(&mut *tx).await?;
        inserted += result.rows_affected();
    }

    tx.commit().await?;
    Ok(inserted)
}

/// Bulk payroll run over every active staff member for one month.
pub async fn process_payroll(
    auth: &AuthUser,
    pool: &MySqlPool,
    payload: ProcessPayroll,
) -> AppResult<HttpResponse> {
    auth.require_hr_or_admin()?;
    validate_period(payload.month, payload.year)?;

    let sql = format!("SELECT {STAFF_COLUMNS} FROM staff WHERE status = 'active' ORDER BY id");
    let active = sqlx::query_as::<_, StaffRecord>(&sql).fetch_all(pool).await?;
    debug!(active = active.len(), "Loaded active staff for payroll run");

    let records = build_payroll_run(payload.month, payload.year, &active).inspect_err(|e| {
        warn!(month = payload.month, year = payload.year, error = %e, "Payroll run refused");
    })?;

    let processed = insert_run(pool, &records).await.map_err(|e| {
        if is_duplicate_key(&e) {
            AppError::conflict(format!(
                "Payroll already processed for {}/{}",
                payload.month, payload.year
            ))
        } else {
            AppError::from(e)
        }
    })?;

    info!(
        month = payload.month,
        year = payload.year,
        processed,
        by = %auth.username,
        "Payroll processed"
    );

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": format!("Payroll processed for {} staff member(s)", records.len()),
        "processed": records.len(),
    })))
}

pub async fn list_payroll(
    auth: &AuthUser,
    pool: &MySqlPool,
    mut filter: PayrollFilter,
) -> AppResult<HttpResponse> {
    if auth.is_staff() {
        let own = auth
            .staff_id
            .ok_or_else(|| AppError::forbidden("No staff profile"))?;
        auth.require_access_to(filter.staff_id.unwrap_or(own))?;
        filter.staff_id = Some(own);
    }

    let mut qb: QueryBuilder<MySql> =
        QueryBuilder::new(format!("SELECT {PAYROLL_COLUMNS} FROM payroll WHERE 1=1"));
    if let Some(month) = filter.month {
        qb.push(" AND month = ").push_bind(month);
    }
    if let Some(year) = filter.year {
        qb.push(" AND year = ").push_bind(year);
    }
    if let Some(staff_id) = filter.staff_id {
        qb.push(" AND staff_id = ").push_bind(staff_id);
    }
    qb.push(" ORDER BY year DESC, month DESC, staff_id");

    let payroll = qb
        .build_query_as::<PayrollRecord>()
        .fetch_all(pool)
        .await?;

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "payroll": payroll,
    })))
}

/// Status transitions and manual deductions on one record. Paid records are frozen.
pub async fn update_payroll(
    auth: &AuthUser,
    pool: &MySqlPool,
    payroll_id: u64,
    body: UpdatePayroll,
) -> AppResult<HttpResponse> {
    auth.require_hr_or_admin()?;
    if body.status == Some(PayrollStatus::Paid) {
        auth.require_admin()?;
    }

    let mut record = fetch_payroll(pool, payroll_id).await?;
    let previous = record.status;

    if previous == PayrollStatus::Paid {
        return Err(AppError::conflict("Paid payroll records cannot be changed"));
    }

    if let Some(next) = body.status {
        if !previous.can_transition_to(next) {
            return Err(AppError::conflict(format!(
                "Cannot move payroll from {previous} to {next}"
            )));
        }
    }

    if body.edits_deductions() && previous != PayrollStatus::Draft {
        return Err(AppError::conflict(
            "Deductions can only be changed while the record is a draft",
        ));
    }

    for (field, value, slot) in [
        ("absenceDeduction", body.absence_deduction, &mut record.deductions.absence),
        ("loanDeduction", body.loan_deduction, &mut record.deductions.loan),
        ("otherDeduction", body.other_deduction, &mut record.deductions.other),
    ] {
        if let Some(amount) = value {
            ensure_amount(field, amount)?;
            *slot = amount;
        }
    }
    record.recompute();
    record.status = body.status.unwrap_or(previous);

    let result = sqlx::query(
        r#"
        UPDATE payroll
        SET absence_deduction = ?, loan_deduction = ?, other_deduction = ?,
            total_deductions = ?, net_salary = ?, status = ?
        WHERE id = ? AND status = ?
        "#,
    )
    .bind(record.deductions.absence)
    .bind(record.deductions.loan)
    .bind(record.deductions.other)
    .bind(record.total_deductions)
    .bind(record.net_salary)
    .bind(record.status.as_ref())
    .bind(payroll_id)
    .bind(previous.as_ref())
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::conflict("Payroll record was changed by someone else"));
    }

    info!(
        payroll_id,
        from = %previous,
        to = %record.status,
        by = %auth.username,
        "Payroll updated"
    );

    let updated = fetch_payroll(pool, payroll_id).await?;
    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": "Payroll updated successfully",
        "data": updated,
    })))
}
