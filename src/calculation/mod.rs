//! Pure payroll and leave computations.
//!
//! Nothing in here touches the database; handlers fetch the inputs, call into
//! these functions and persist whatever comes back.

mod leave;
mod payroll;

pub use leave::{
    LeaveBalance, LeaveBalanceSnapshot, entitlement_for, leave_days, snapshots_for_year,
};
pub use payroll::{
    Allowances, Deductions, NHIS_RATE, PENSION_RATE, PayBreakdown, TAX_RATE,
    WORKING_DAYS_PER_MONTH, build_payroll_run, compute_pay, validate_period,
};
pub(crate) use payroll::ensure_amount;
