use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use strum_macros::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;

use crate::calculation::{Allowances, Deductions, PayBreakdown};

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    EnumString,
    Display,
    AsRefStr,
    ToSchema,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum PayrollStatus {
    Draft,
    Approved,
    Paid,
}

string_column!(PayrollStatus);

impl PayrollStatus {
    /// `draft -> approved -> paid`, one step at a time. Staying put is allowed.
    pub fn can_transition_to(self, next: PayrollStatus) -> bool {
        use PayrollStatus::*;
        matches!(
            (self, next),
            (Draft, Draft)
                | (Draft, Approved)
                | (Approved, Approved)
                | (Approved, Paid)
                | (Paid, Paid)
        )
    }
}

#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PayrollRecord {
    pub id: u64,
    pub staff_id: u64,
    pub employee_id: String,
    pub staff_name: String,
    pub month: i32,
    pub year: i32,
    pub basic_salary: f64,

    #[sqlx(flatten)]
    pub allowances: Allowances,
    pub total_allowances: f64,

    #[sqlx(flatten)]
    pub deductions: Deductions,

    pub gross_salary: f64,
    pub total_deductions: f64,
    pub net_salary: f64,
    pub working_days: i32,
    pub days_worked: i32,

    #[sqlx(try_from = "String")]
    pub status: PayrollStatus,

    #[schema(value_type = String, format = "date-time")]
    pub processed_at: DateTime<Utc>,
    #[schema(value_type = String, format = "date-time")]
    pub updated_at: DateTime<Utc>,
}

impl PayrollRecord {
    /// Re-derives the totals from the stored salary, allowances and deductions.
    /// Statutory deductions keep the values computed when the run was processed.
    pub fn recompute(&mut self) {
        self.total_allowances = self.allowances.total();
        self.gross_salary = self.basic_salary + self.total_allowances;
        self.total_deductions = self.deductions.total();
        self.net_salary = self.gross_salary - self.total_deductions;
    }
}

pub const PAYROLL_COLUMNS: &str = r#"
    id, staff_id, employee_id, staff_name, month, year, basic_salary,
    housing_allowance, transport_allowance, meal_allowance, teaching_allowance,
    medical_allowance, other_allowance, total_allowances,
    pension_deduction, tax_deduction, nhis_deduction, absence_deduction,
    loan_deduction, other_deduction,
    gross_salary, total_deductions, net_salary, working_days, days_worked,
    status, processed_at, updated_at
"#;

/// A computed record waiting to be written by a payroll run.
#[derive(Debug, Clone)]
pub struct NewPayrollRecord {
    pub staff_id: u64,
    pub employee_id: String,
    pub staff_name: String,
    pub month: i32,
    pub year: i32,
    pub basic_salary: f64,
    pub allowances: Allowances,
    pub pay: PayBreakdown,
    pub working_days: i32,
    pub days_worked: i32,
    pub status: PayrollStatus,
}
