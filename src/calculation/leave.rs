//! Leave day counting and balance snapshots.
//!
//! A snapshot is read-only arithmetic over the entitlement and the requests
//! filed for one year. Over-allocation shows up as a negative remaining
//! balance; it is reported, not clamped.

use std::collections::HashMap;

use chrono::NaiveDate;
use serde::Serialize;
use utoipa::ToSchema;

use crate::error::{AppError, AppResult};
use crate::model::leave_request::{LeaveRequest, LeaveStatus};
use crate::model::staff::StaffRecord;

/// Inclusive day count between two calendar dates.
///
/// `end` must fall strictly after `start`.
pub fn leave_days(start: NaiveDate, end: NaiveDate) -> AppResult<i64> {
    if end <= start {
        return Err(AppError::validation("endDate must be after startDate"));
    }
    Ok((end - start).num_days() + 1)
}

/// Entitlement for a staff member, falling back to `default` when none is on file.
pub fn entitlement_for(leave_balance: Option<i32>, default: i32) -> i64 {
    i64::from(leave_balance.unwrap_or(default))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LeaveBalance {
    pub total_leave_entitlement: i64,
    pub used_leave: i64,
    pub pending_leave: i64,
    pub remaining_leave: i64,
}

impl LeaveBalance {
    pub fn compute<'a, I>(total_leave_entitlement: i64, requests: I) -> Self
    where
        I: IntoIterator<Item = &'a LeaveRequest>,
    {
        let (mut used_leave, mut pending_leave) = (0i64, 0i64);
        for request in requests {
            match request.status {
                LeaveStatus::Approved => used_leave += i64::from(request.days),
                LeaveStatus::Pending => pending_leave += i64::from(request.days),
                LeaveStatus::Rejected => {}
            }
        }

        Self {
            total_leave_entitlement,
            used_leave,
            pending_leave,
            remaining_leave: total_leave_entitlement - used_leave - pending_leave,
        }
    }

    /// Whether `days` more can be requested without overdrawing.
    pub fn can_take(&self, days: i64) -> bool {
        days <= self.remaining_leave
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LeaveBalanceSnapshot {
    pub staff_id: u64,
    pub employee_id: String,
    pub staff_name: String,
    pub year: i32,
    #[serde(flatten)]
    pub balance: LeaveBalance,
}

/// One snapshot per staff member, in the order `staff` is given.
/// Requests starting outside `year` are ignored.
pub fn snapshots_for_year(
    staff: &[StaffRecord],
    requests: &[LeaveRequest],
    year: i32,
    default_entitlement: i32,
) -> Vec<LeaveBalanceSnapshot> {
    let mut by_staff: HashMap<u64, Vec<&LeaveRequest>> = HashMap::new();
    for request in requests.iter().filter(|r| r.year() == year) {
        by_staff.entry(request.staff_id).or_default().push(request);
    }

    staff
        .iter()
        .map(|member| {
            let filed = by_staff.get(&member.id).map(Vec::as_slice).unwrap_or(&[]);
            LeaveBalanceSnapshot {
                staff_id: member.id,
                employee_id: member.employee_id.clone(),
                staff_name: member.full_name(),
                year,
                balance: LeaveBalance::compute(
                    entitlement_for(member.leave_balance, default_entitlement),
                    filed.iter().copied(),
                ),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::leave_request::tests::leave_request;
    use crate::model::staff::tests::staff_member;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn day_count_is_inclusive() {
        assert_eq!(leave_days(date(2025, 8, 10), date(2025, 8, 14)).unwrap(), 5);
        assert_eq!(leave_days(date(2025, 8, 10), date(2025, 8, 11)).unwrap(), 2);
    }

    #[test]
    fn day_count_spans_month_and_year_ends() {
        assert_eq!(leave_days(date(2024, 2, 27), date(2024, 3, 1)).unwrap(), 4);
        assert_eq!(leave_days(date(2025, 12, 30), date(2026, 1, 2)).unwrap(), 4);
    }

    #[test]
    fn end_on_or_before_start_is_rejected() {
        let same = leave_days(date(2025, 8, 10), date(2025, 8, 10)).unwrap_err();
        assert_eq!(same.to_string(), "endDate must be after startDate");
        assert!(leave_days(date(2025, 8, 14), date(2025, 8, 10)).is_err());
    }

    #[test]
    fn missing_entitlement_defaults() {
        assert_eq!(entitlement_for(None, 21), 21);
        assert_eq!(entitlement_for(Some(30), 21), 30);
    }

    #[test]
    fn balance_splits_by_status() {
        let requests = vec![
            leave_request(1, (2025, 2, 3), 5, LeaveStatus::Approved),
            leave_request(1, (2025, 4, 7), 3, LeaveStatus::Approved),
            leave_request(1, (2025, 6, 2), 4, LeaveStatus::Pending),
            leave_request(1, (2025, 7, 1), 10, LeaveStatus::Rejected),
        ];
        let balance = LeaveBalance::compute(21, &requests);

        assert_eq!(balance.used_leave, 8);
        assert_eq!(balance.pending_leave, 4);
        assert_eq!(balance.remaining_leave, 9);
        assert!(balance.can_take(9));
        assert!(!balance.can_take(10));
    }

    #[test]
    fn over_allocation_goes_negative() {
        let requests = vec![
            leave_request(1, (2025, 3, 3), 15, LeaveStatus::Approved),
            leave_request(1, (2025, 9, 1), 10, LeaveStatus::Pending),
        ];
        let balance = LeaveBalance::compute(21, &requests);

        assert_eq!(balance.remaining_leave, -4);
        assert_eq!(
            balance.remaining_leave,
            balance.total_leave_entitlement - balance.used_leave - balance.pending_leave
        );
        assert!(!balance.can_take(1));
    }

    #[test]
    fn no_requests_leaves_full_entitlement() {
        let balance = LeaveBalance::compute(21, std::iter::empty::<&LeaveRequest>());
        assert_eq!(balance.remaining_leave, 21);
        assert_eq!(balance.used_leave + balance.pending_leave, 0);
    }

    #[test]
    fn snapshots_cover_every_staff_member_for_the_year() {
        let mut senior = staff_member(1, "EMP001");
        senior.leave_balance = Some(30);
        let mut newcomer = staff_member(2, "EMP002");
        newcomer.leave_balance = None;

        let requests = vec![
            leave_request(1, (2025, 1, 6), 5, LeaveStatus::Approved),
            leave_request(1, (2024, 12, 23), 7, LeaveStatus::Approved),
            leave_request(2, (2025, 5, 5), 2, LeaveStatus::Pending),
        ];

        let snapshots = snapshots_for_year(&[senior, newcomer], &requests, 2025, 21);

        assert_eq!(snapshots.len(), 2);
        assert_eq!(snapshots[0].staff_id, 1);
        assert_eq!(snapshots[0].balance.total_leave_entitlement, 30);
        assert_eq!(snapshots[0].balance.used_leave, 5);
        assert_eq!(snapshots[0].balance.remaining_leave, 25);
        assert_eq!(snapshots[1].balance.total_leave_entitlement, 21);
        assert_eq!(snapshots[1].balance.pending_leave, 2);
        assert_eq!(snapshots[1].balance.remaining_leave, 19);
    }

    #[test]
    fn snapshots_are_repeatable() {
        let staff = vec![staff_member(1, "EMP001"), staff_member(2, "EMP002")];
        let requests = vec![
            leave_request(1, (2025, 3, 3), 3, LeaveStatus::Approved),
            leave_request(2, (2025, 3, 10), 6, LeaveStatus::Pending),
        ];

        let first = snapshots_for_year(&staff, &requests, 2025, 21);
        let second = snapshots_for_year(&staff, &requests, 2025, 21);
        assert_eq!(first, second);
    }

    #[test]
    fn snapshot_flattens_balance_fields() {
        let snapshots = snapshots_for_year(&[staff_member(4, "EMP004")], &[], 2025, 21);
        let json = serde_json::to_value(&snapshots[0]).unwrap();
        assert_eq!(json["employeeId"], "EMP004");
        assert_eq!(json["totalLeaveEntitlement"], 21);
        assert_eq!(json["remainingLeave"], 21);
    }
}
