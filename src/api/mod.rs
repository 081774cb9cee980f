pub mod leave_balance;
pub mod leave_request;
pub mod payroll;
pub mod staff;
