//! Gross/net salary computation for one staff member and one pay period.
//!
//! Each statutory deduction is rounded to a whole currency unit on its own,
//! before the deductions are summed. Summing first and rounding once gives
//! different totals for some salaries, so keep the order.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

use crate::error::{AppError, AppResult};
use crate::model::payroll::{NewPayrollRecord, PayrollStatus};
use crate::model::staff::StaffRecord;

pub const PENSION_RATE: f64 = 0.08;
pub const NHIS_RATE: f64 = 0.0175;
/// Flat rate, not a progressive table.
pub const TAX_RATE: f64 = 0.05;

/// Attendance is not wired into payroll, so every run assumes a full month.
pub const WORKING_DAYS_PER_MONTH: i32 = 22;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Allowances {
    #[serde(default)]
    #[sqlx(rename = "housing_allowance")]
    #[schema(example = 75000.0)]
    pub housing: f64,

    #[serde(default)]
    #[sqlx(rename = "transport_allowance")]
    #[schema(example = 25000.0)]
    pub transport: f64,

    #[serde(default)]
    #[sqlx(rename = "meal_allowance")]
    #[schema(example = 15000.0)]
    pub meal: f64,

    #[serde(default)]
    #[sqlx(rename = "teaching_allowance")]
    #[schema(example = 30000.0)]
    pub teaching: f64,

    #[serde(default)]
    #[sqlx(rename = "medical_allowance")]
    #[schema(example = 0.0)]
    pub medical: f64,

    #[serde(default)]
    #[sqlx(rename = "other_allowance")]
    #[schema(example = 0.0)]
    pub other: f64,
}

impl Allowances {
    pub fn total(&self) -> f64 {
        self.housing + self.transport + self.meal + self.teaching + self.medical + self.other
    }

    pub fn validate(&self) -> AppResult<()> {
        let fields = [
            ("housing", self.housing),
            ("transport", self.transport),
            ("meal", self.meal),
            ("teaching", self.teaching),
            ("medical", self.medical),
            ("other", self.other),
        ];
        for (name, value) in fields {
            ensure_amount(&format!("allowances.{name}"), value)?;
        }
        Ok(())
    }
}

/// Money fields must be finite and non-negative.
pub(crate) fn ensure_amount(field: &str, value: f64) -> AppResult<()> {
    if !value.is_finite() || value < 0.0 {
        return Err(AppError::validation(format!(
            "{field} must be a non-negative amount"
        )));
    }
    Ok(())
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Deductions {
    #[sqlx(rename = "pension_deduction")]
    pub pension: f64,

    #[sqlx(rename = "tax_deduction")]
    pub tax: f64,

    #[sqlx(rename = "nhis_deduction")]
    pub nhis: f64,

    #[sqlx(rename = "absence_deduction")]
    pub absence: f64,

    #[sqlx(rename = "loan_deduction")]
    pub loan: f64,

    #[sqlx(rename = "other_deduction")]
    pub other: f64,
}

impl Deductions {
    /// Pension, NHIS and tax on `gross_salary`, each rounded independently.
    pub fn statutory(gross_salary: f64) -> Self {
        Self {
            pension: (gross_salary * PENSION_RATE).round(),
            nhis: (gross_salary * NHIS_RATE).round(),
            tax: (gross_salary * TAX_RATE).round(),
            ..Self::default()
        }
    }

    pub fn total(&self) -> f64 {
        self.pension + self.nhis + self.tax + self.absence + self.loan + self.other
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PayBreakdown {
    pub total_allowances: f64,
    pub gross_salary: f64,
    pub deductions: Deductions,
    pub total_deductions: f64,
    pub net_salary: f64,
}

pub fn compute_pay(basic_salary: f64, allowances: &Allowances) -> PayBreakdown {
    let total_allowances = allowances.total();
    let gross_salary = basic_salary + total_allowances;
    let deductions = Deductions::statutory(gross_salary);
    let total_deductions = deductions.total();

    PayBreakdown {
        total_allowances,
        gross_salary,
        deductions,
        total_deductions,
        net_salary: gross_salary - total_deductions,
    }
}

pub fn validate_period(month: i32, year: i32) -> AppResult<()> {
    if !(1..=12).contains(&month) {
        return Err(AppError::validation("month must be between 1 and 12"));
    }
    if !(1900..=2999).contains(&year) {
        return Err(AppError::validation("year is out of range"));
    }
    Ok(())
}

/// One draft record per active staff member for `month`/`year`.
///
/// An empty population is an error rather than an empty run, so callers never
/// issue a zero-row insert.
pub fn build_payroll_run(
    month: i32,
    year: i32,
    staff: &[StaffRecord],
) -> AppResult<Vec<NewPayrollRecord>> {
    validate_period(month, year)?;

    if staff.is_empty() {
        return Err(AppError::NoActiveStaff);
    }

    let records = staff
        .iter()
        .map(|member| NewPayrollRecord {
            staff_id: member.id,
            employee_id: member.employee_id.clone(),
            staff_name: member.full_name(),
            month,
            year,
            basic_salary: member.basic_salary,
            allowances: member.allowances.clone(),
            pay: compute_pay(member.basic_salary, &member.allowances),
            working_days: WORKING_DAYS_PER_MONTH,
            days_worked: WORKING_DAYS_PER_MONTH,
            status: PayrollStatus::Draft,
        })
        .collect();

    Ok(records)
}
