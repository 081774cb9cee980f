use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use strum_macros::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;

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
pub enum LeaveType {
    Annual,
    Sick,
    Maternity,
    Paternity,
    Compassionate,
    Study,
    Unpaid,
}

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
pub enum LeaveStatus {
    Pending,
    Approved,
    Rejected,
}

string_column!(LeaveType, LeaveStatus);

impl LeaveStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, LeaveStatus::Approved | LeaveStatus::Rejected)
    }

    /// Only a pending request moves, and only to a terminal state.
    pub fn can_transition_to(self, next: LeaveStatus) -> bool {
        self == LeaveStatus::Pending && next.is_terminal()
    }
}

#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
#[schema(example = json!({
    "id": 12,
    "staffId": 1,
    "employeeId": "EMP001",
    "type": "annual",
    "startDate": "2025-08-10",
    "endDate": "2025-08-14",
    "days": 5,
    "reason": "Family visit",
    "status": "pending",
    "appliedDate": "2025-08-01T09:30:00Z",
    "approvedBy": null,
    "approvedDate": null,
    "remarks": null
}))]
pub struct LeaveRequest {
    pub id: u64,
    pub staff_id: u64,
    pub employee_id: String,

    #[serde(rename = "type")]
    #[sqlx(try_from = "String")]
    pub leave_type: LeaveType,

    #[schema(value_type = String, format = "date")]
    pub start_date: NaiveDate,
    #[schema(value_type = String, format = "date")]
    pub end_date: NaiveDate,

    /// Inclusive of both endpoints
    pub days: i32,
    pub reason: String,

    #[sqlx(try_from = "String")]
    pub status: LeaveStatus,

    #[schema(value_type = String, format = "date-time")]
    pub applied_date: DateTime<Utc>,
    pub approved_by: Option<String>,
    #[schema(value_type = Option<String>, format = "date-time")]
    pub approved_date: Option<DateTime<Utc>>,
    pub remarks: Option<String>,
}

impl LeaveRequest {
    /// A request is charged to the year it starts in.
    pub fn year(&self) -> i32 {
        self.start_date.year()
    }
}

pub const LEAVE_COLUMNS: &str = r#"
    id, staff_id, employee_id, leave_type, start_date, end_date, days, reason,
    status, applied_date, approved_by, approved_date, remarks
"#;

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn leave_request(
        staff_id: u64,
        start: (i32, u32, u32),
        days: i32,
        status: LeaveStatus,
    ) -> LeaveRequest {
        let start_date = NaiveDate::from_ymd_opt(start.0, start.1, start.2).unwrap();
        LeaveRequest {
            id: 0,
            staff_id,
            employee_id: format!("EMP{staff_id:03}"),
            leave_type: LeaveType::Annual,
            start_date,
            end_date: start_date + chrono::Duration::days(i64::from(days) - 1),
            days,
            reason: "Family visit".to_string(),
            status,
            applied_date: Utc::now(),
            approved_by: None,
            approved_date: None,
            remarks: None,
        }
    }

    #[test]
    fn pending_is_the_only_open_state() {
        use LeaveStatus::*;
        assert!(Pending.can_transition_to(Approved));
        assert!(Pending.can_transition_to(Rejected));
        assert!(!Pending.can_transition_to(Pending));
        assert!(!Approved.can_transition_to(Rejected));
        assert!(!Rejected.can_transition_to(Approved));
        assert!(!Approved.can_transition_to(Pending));
    }

    #[test]
    fn type_is_serialized_under_type_key() {
        let json = serde_json::to_value(leave_request(1, (2025, 8, 10), 5, LeaveStatus::Pending))
            .unwrap();
        assert_eq!(json["type"], "annual");
        assert_eq!(json["startDate"], "2025-08-10");
        assert_eq!(json["endDate"], "2025-08-14");
        assert_eq!(json["status"], "pending");
    }

    #[test]
    fn leave_type_parses_from_column() {
        assert_eq!(
            LeaveType::try_from("compassionate".to_string()).unwrap(),
            LeaveType::Compassionate
        );
        assert!(LeaveType::try_from("sabbatical".to_string()).is_err());
    }

    #[test]
    fn year_follows_start_date() {
        let request = leave_request(1, (2025, 12, 30), 4, LeaveStatus::Approved);
        assert_eq!(request.year(), 2025);
    }
}
