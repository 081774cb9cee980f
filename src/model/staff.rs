use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use strum_macros::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;

use crate::calculation::Allowances;

/// Staff are never deleted; leaving the school flips the status to `inactive`.
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
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum StaffStatus {
    Active,
    Inactive,
    Suspended,
}

string_column!(StaffStatus);

#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
#[schema(example = json!({
    "id": 1,
    "employeeId": "EMP001",
    "firstName": "Ama",
    "lastName": "Mensah",
    "department": "Science",
    "position": "Teacher",
    "status": "active",
    "basicSalary": 100000.0,
    "allowances": {
        "housing": 75000.0,
        "transport": 25000.0,
        "meal": 15000.0,
        "teaching": 30000.0,
        "medical": 0.0,
        "other": 0.0
    },
    "leaveBalance": 21,
    "createdAt": "2025-01-06T08:00:00Z",
    "updatedAt": "2025-01-06T08:00:00Z"
}))]
pub struct StaffRecord {
    pub id: u64,
    pub employee_id: String,
    pub first_name: String,
    pub last_name: String,
    pub department: String,
    pub position: String,

    #[sqlx(try_from = "String")]
    pub status: StaffStatus,

    pub basic_salary: f64,

    #[sqlx(flatten)]
    pub allowances: Allowances,

    /// Annual leave entitlement in days; `None` falls back to the configured default
    pub leave_balance: Option<i32>,

    #[schema(value_type = String, format = "date-time")]
    pub created_at: DateTime<Utc>,
    #[schema(value_type = String, format = "date-time")]
    pub updated_at: DateTime<Utc>,
}

impl StaffRecord {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    pub fn is_active(&self) -> bool {
        self.status == StaffStatus::Active
    }
}

/// Columns selected whenever a full `StaffRecord` is read.
pub const STAFF_COLUMNS: &str = r#"
    id, employee_id, first_name, last_name, department, position, status,
    basic_salary, housing_allowance, transport_allowance, meal_allowance,
    teaching_allowance, medical_allowance, other_allowance, leave_balance,
    created_at, updated_at
"#;

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn staff_member(id: u64, employee_id: &str) -> StaffRecord {
        let hired = DateTime::parse_from_rfc3339("2024-09-02T08:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        StaffRecord {
            id,
            employee_id: employee_id.to_string(),
            first_name: "Kofi".to_string(),
            last_name: format!("Staff{id}"),
            department: "Mathematics".to_string(),
            position: "Teacher".to_string(),
            status: StaffStatus::Active,
            basic_salary: 50000.0,
            allowances: Allowances::default(),
            leave_balance: Some(21),
            created_at: hired,
            updated_at: hired,
        }
    }

    #[test]
    fn status_text_matches_column_values() {
        assert_eq!(StaffStatus::Active.as_ref(), "active");
        assert_eq!(
            StaffStatus::try_from("inactive".to_string()).unwrap(),
            StaffStatus::Inactive
        );
        assert!(StaffStatus::try_from("retired".to_string()).is_err());
    }

    #[test]
    fn serializes_camel_case() {
        let json = serde_json::to_value(staff_member(7, "EMP007")).unwrap();
        assert_eq!(json["employeeId"], "EMP007");
        assert_eq!(json["basicSalary"], 50000.0);
        assert_eq!(json["leaveBalance"], 21);
        assert_eq!(json["status"], "active");
        assert_eq!(json["allowances"]["housing"], 0.0);
    }

    #[test]
    fn full_name_joins_parts() {
        assert_eq!(staff_member(3, "EMP003").full_name(), "Kofi Staff3");
    }
}
