//! Departments, staff, leave applications and attendance.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use ts_rs::TS;

use crate::error::{CoreResult, ValidationError};
use crate::money::Money;
use crate::validation::validate_date_range;

// =============================================================================
// Department
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Department {
    pub id: String,
    /// Unique.
    pub name: String,
    pub description: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct NewDepartment {
    pub name: String,
    pub description: Option<String>,
}

// =============================================================================
// Staff
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum StaffStatus {
    #[default]
    Active,
    Inactive,
    Terminated,
    OnLeave,
}

/// An employee.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Staff {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    /// Unique.
    pub email: String,
    pub phone: Option<String>,
    pub position: Option<String>,
    pub department_id: Option<String>,
    #[ts(as = "Option<String>")]
    pub hire_date: Option<NaiveDate>,
    /// Monthly basic salary in cents.
    pub salary_cents: i64,
    pub status: StaffStatus,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Staff {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    #[inline]
    pub fn salary(&self) -> Money {
        Money::from_cents(self.salary_cents)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct NewStaff {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub position: Option<String>,
    pub department_id: Option<String>,
    #[ts(as = "Option<String>")]
    pub hire_date: Option<NaiveDate>,
    #[serde(default)]
    pub salary_cents: i64,
}

/// Partial staff update. `None` keeps the stored value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct StaffUpdate {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub position: Option<String>,
    pub department_id: Option<String>,
    pub salary_cents: Option<i64>,
    pub status: Option<StaffStatus>,
}

// =============================================================================
// Leave
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum LeaveType {
    #[default]
    Annual,
    Sick,
    Casual,
    Unpaid,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum LeaveStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
}

impl LeaveStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LeaveStatus::Pending => "pending",
            LeaveStatus::Approved => "approved",
            LeaveStatus::Rejected => "rejected",
        }
    }
}

impl fmt::Display for LeaveStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A leave application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Leave {
    pub id: String,
    pub staff_id: String,
    pub leave_type: LeaveType,
    #[ts(as = "String")]
    pub start_date: NaiveDate,
    #[ts(as = "String")]
    pub end_date: NaiveDate,
    /// Calendar days, both ends included.
    pub days: i64,
    pub reason: Option<String>,
    pub status: LeaveStatus,
    pub decided_by: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct NewLeave {
    pub staff_id: String,
    #[serde(default)]
    pub leave_type: LeaveType,
    #[ts(as = "String")]
    pub start_date: NaiveDate,
    #[ts(as = "String")]
    pub end_date: NaiveDate,
    pub reason: Option<String>,
}

/// Inclusive calendar days between two dates.
///
/// ## Example
/// ```rust
/// use chrono::NaiveDate;
/// use tradeflow_core::types::leave_days;
///
/// let start = NaiveDate::from_ymd_opt(2024, 2, 27).unwrap();
/// let end = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
/// assert_eq!(leave_days(start, end).unwrap(), 4); // leap year
/// ```
pub fn leave_days(start: NaiveDate, end: NaiveDate) -> CoreResult<i64> {
    validate_date_range("leave", start, end)?;
    Ok((end - start).num_days() + 1)
}

// =============================================================================
// Attendance
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum AttendanceStatus {
    #[default]
    Present,
    Absent,
    Late,
    HalfDay,
    OnLeave,
}

impl AttendanceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttendanceStatus::Present => "present",
            AttendanceStatus::Absent => "absent",
            AttendanceStatus::Late => "late",
            AttendanceStatus::HalfDay => "half_day",
            AttendanceStatus::OnLeave => "on_leave",
        }
    }

    /// Whether a check-in may be recorded with this status.
    pub fn is_on_site(&self) -> bool {
        matches!(
            self,
            AttendanceStatus::Present | AttendanceStatus::Late | AttendanceStatus::HalfDay
        )
    }
}

impl fmt::Display for AttendanceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One staff member's attendance for one day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Attendance {
    pub id: String,
    pub staff_id: String,
    #[ts(as = "String")]
    pub date: NaiveDate,
    #[ts(as = "Option<String>")]
    pub check_in: Option<NaiveTime>,
    #[ts(as = "Option<String>")]
    pub check_out: Option<NaiveTime>,
    /// Set on check-out when a check-in time is known.
    pub worked_minutes: Option<i64>,
    pub status: AttendanceStatus,
    pub notes: Option<String>,
    pub created_by: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct NewCheckIn {
    pub staff_id: String,
    /// Defaults to today.
    #[ts(as = "Option<String>")]
    pub date: Option<NaiveDate>,
    #[ts(as = "Option<String>")]
    pub check_in: Option<NaiveTime>,
    /// Defaults to Present.
    pub status: Option<AttendanceStatus>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CheckOut {
    pub staff_id: String,
    /// Defaults to today.
    #[ts(as = "Option<String>")]
    pub date: Option<NaiveDate>,
    /// Defaults to the current time.
    #[ts(as = "Option<String>")]
    pub check_out: Option<NaiveTime>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct AttendanceFilter {
    pub staff_id: Option<String>,
    #[ts(as = "Option<String>")]
    pub date: Option<NaiveDate>,
    pub status: Option<AttendanceStatus>,
}

/// Whole minutes between check-in and check-out on the same day.
///
/// ## Example
/// ```rust
/// use chrono::NaiveTime;
/// use tradeflow_core::types::worked_minutes;
///
/// let t = |h, m| NaiveTime::from_hms_opt(h, m, 0).unwrap();
/// assert_eq!(worked_minutes(t(9, 0), t(17, 30)).unwrap(), 510);
/// ```
pub fn worked_minutes(check_in: NaiveTime, check_out: NaiveTime) -> CoreResult<i64> {
    if check_out < check_in {
        return Err(ValidationError::InvalidFormat {
            field: "check_out".to_string(),
            reason: format!("{check_out} is before check-in at {check_in}"),
        }
        .into());
    }
    Ok((check_out - check_in).num_minutes())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_leave_days() {
        let d = |m, day| NaiveDate::from_ymd_opt(2023, m, day).unwrap();
        assert_eq!(leave_days(d(5, 1), d(5, 1)).unwrap(), 1);
        assert_eq!(leave_days(d(5, 1), d(5, 10)).unwrap(), 10);
        assert!(leave_days(d(5, 10), d(5, 1)).is_err());
    }

    #[test]
    fn test_worked_minutes() {
        let t = |h, m| NaiveTime::from_hms_opt(h, m, 0).unwrap();
        assert_eq!(worked_minutes(t(9, 0), t(9, 0)).unwrap(), 0);
        assert_eq!(worked_minutes(t(8, 45), t(17, 15)).unwrap(), 510);
        assert!(worked_minutes(t(17, 0), t(9, 0)).is_err());
    }

    #[test]
    fn test_attendance_status_serialization() {
        let json = serde_json::to_string(&AttendanceStatus::HalfDay).unwrap();
        assert_eq!(json, "\"half_day\"");
    }

    #[test]
    fn test_staff_status_serialization() {
        let json = serde_json::to_string(&StaffStatus::OnLeave).unwrap();
        assert_eq!(json, "\"on_leave\"");
    }
}
