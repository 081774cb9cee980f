//! School payroll and leave service.
//!
//! Monthly payroll runs with statutory deductions, leave requests checked
//! against an annual entitlement, and the actix-web routes that expose both.

pub mod api;
pub mod auth;
pub mod calculation;
pub mod config;
pub mod db;
pub mod docs;
pub mod error;
pub mod model;
pub mod models;
pub mod routes;
pub mod utils;
