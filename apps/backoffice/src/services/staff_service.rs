//! Staff service: departments, staff records, leave applications and attendance.

use std::sync::Arc;

use chrono::{NaiveTime, Timelike, Utc};
use tracing::info;
use uuid::Uuid;

use super::{clean, today};
use crate::error::{ServiceError, ServiceResult};
use crate::AppState;
use tradeflow_core::validation::{validate_amount_cents, validate_email, validate_name};
use tradeflow_core::{
    leave_days, worked_minutes, Attendance, AttendanceFilter, CheckOut, CoreError, Department,
    Leave, LeaveStatus, NewCheckIn, NewDepartment, NewLeave, NewStaff, Page, PageRequest, Staff,
    StaffStatus, StaffUpdate,
};

/// Staff service implementation.
#[derive(Debug, Clone)]
pub struct StaffService {
    state: Arc<AppState>,
}

impl StaffService {
    /// Create a new staff service.
    pub fn new(state: Arc<AppState>) -> Self {
        StaffService { state }
    }

    // =========================================================================
    // Departments
    // =========================================================================

    pub async fn create_department(&self, input: NewDepartment) -> ServiceResult<Department> {
        validate_name("name", &input.name)?;

        let now = Utc::now();
        let department = Department {
            id: Uuid::new_v4().to_string(),
            name: input.name.trim().to_string(),
            description: clean(input.description),
            created_at: now,
            updated_at: now,
        };
        self.state.db.staff().insert_department(&department).await?;
        info!(department_id = %department.id, name = %department.name, "Department created");

        Ok(department)
    }

    pub async fn list_departments(&self) -> ServiceResult<Vec<Department>> {
        Ok(self.state.db.staff().list_departments().await?)
    }

    /// Renames a department or replaces its description.
    pub async fn update_department(&self, id: &str, input: NewDepartment) -> ServiceResult<Department> {
        validate_name("name", &input.name)?;

        let repo = self.state.db.staff();
        let mut department = repo
            .get_department(id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Department", id))?;
        department.name = input.name.trim().to_string();
        department.description = clean(input.description);
        department.updated_at = Utc::now();

        repo.update_department(&department).await?;
        Ok(department)
    }

    // =========================================================================
    // Staff
    // =========================================================================

    /// Adds a staff member. Emails are unique.
    pub async fn hire(&self, input: NewStaff) -> ServiceResult<Staff> {
        validate_name("first_name", &input.first_name)?;
        validate_name("last_name", &input.last_name)?;
        validate_email(input.email.trim())?;
        validate_amount_cents("salary", input.salary_cents)?;

        let department_id = clean(input.department_id);
        if let Some(department_id) = &department_id {
            self.ensure_department(department_id).await?;
        }

        let now = Utc::now();
        let staff = Staff {
            id: Uuid::new_v4().to_string(),
            first_name: input.first_name.trim().to_string(),
            last_name: input.last_name.trim().to_string(),
            email: input.email.trim().to_lowercase(),
            phone: clean(input.phone),
            position: clean(input.position),
            department_id,
            hire_date: input.hire_date,
            salary_cents: input.salary_cents,
            status: StaffStatus::Active,
            created_at: now,
            updated_at: now,
        };
        self.state.db.staff().insert_staff(&staff).await?;
        info!(staff_id = %staff.id, name = %staff.full_name(), "Staff member added");

        Ok(staff)
    }

    pub async fn get_staff(&self, id: &str) -> ServiceResult<Staff> {
        self.state
            .db
            .staff()
            .get_staff(id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Staff", id))
    }

    pub async fn list_staff(
        &self,
        department_id: Option<&str>,
        status: Option<StaffStatus>,
    ) -> ServiceResult<Vec<Staff>> {
        Ok(self.state.db.staff().list_staff(department_id, status).await?)
    }

    /// Applies a partial update.
    pub async fn update_staff(&self, id: &str, update: StaffUpdate) -> ServiceResult<Staff> {
        let mut staff = self.get_staff(id).await?;

        if let Some(first_name) = update.first_name {
            validate_name("first_name", &first_name)?;
            staff.first_name = first_name.trim().to_string();
        }
        if let Some(last_name) = update.last_name {
            validate_name("last_name", &last_name)?;
            staff.last_name = last_name.trim().to_string();
        }
        if let Some(email) = update.email {
            validate_email(email.trim())?;
            staff.email = email.trim().to_lowercase();
        }
        if let Some(salary) = update.salary_cents {
            validate_amount_cents("salary", salary)?;
            staff.salary_cents = salary;
        }
        if update.department_id.is_some() {
            staff.department_id = clean(update.department_id);
            if let Some(department_id) = &staff.department_id {
                self.ensure_department(department_id).await?;
            }
        }
        if update.phone.is_some() {
            staff.phone = clean(update.phone);
        }
        if update.position.is_some() {
            staff.position = clean(update.position);
        }
        if let Some(status) = update.status {
            staff.status = status;
        }

        self.state.db.staff().update_staff(&staff).await?;
        info!(staff_id = %id, "Staff member updated");

        self.get_staff(id).await
    }

    // =========================================================================
    // Leave
    // =========================================================================

    /// Files a leave application for an active staff member.
    pub async fn apply_leave(&self, input: NewLeave) -> ServiceResult<Leave> {
        let staff = self.get_staff(&input.staff_id).await?;
        if staff.status != StaffStatus::Active {
            return Err(CoreError::invalid_state("Staff member", "not active", "apply for leave").into());
        }

        let days = leave_days(input.start_date, input.end_date)?;

        let now = Utc::now();
        let leave = Leave {
            id: Uuid::new_v4().to_string(),
            staff_id: staff.id.clone(),
            leave_type: input.leave_type,
            start_date: input.start_date,
            end_date: input.end_date,
            days,
            reason: clean(input.reason),
            status: LeaveStatus::Pending,
            decided_by: None,
            created_at: now,
            updated_at: now,
        };
        self.state.db.staff().insert_leave(&leave).await?;
        info!(leave_id = %leave.id, staff_id = %staff.id, days, "Leave applied");

        Ok(leave)
    }

    pub async fn approve_leave(&self, id: &str, decided_by: Option<&str>) -> ServiceResult<Leave> {
        self.decide_leave(id, LeaveStatus::Approved, decided_by).await
    }

    pub async fn reject_leave(&self, id: &str, decided_by: Option<&str>) -> ServiceResult<Leave> {
        self.decide_leave(id, LeaveStatus::Rejected, decided_by).await
    }

    pub async fn list_leaves(&self, staff_id: &str) -> ServiceResult<Vec<Leave>> {
        self.get_staff(staff_id).await?;
        Ok(self.state.db.staff().list_leaves(staff_id).await?)
    }

    async fn decide_leave(
        &self,
        id: &str,
        status: LeaveStatus,
        decided_by: Option<&str>,
    ) -> ServiceResult<Leave> {
        let repo = self.state.db.staff();
        repo.decide_leave(id, status, decided_by).await?;
        info!(leave_id = %id, %status, "Leave decided");

        repo.get_leave(id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Leave", id))
    }

    // =========================================================================
    // Attendance
    // =========================================================================

    /// Records an active staff member's arrival. One record per day.
    pub async fn check_in(&self, input: NewCheckIn) -> ServiceResult<Attendance> {
        let staff = self.get_staff(&input.staff_id).await?;
        if staff.status != StaffStatus::Active {
            return Err(CoreError::invalid_state("Staff member", "not active", "check in").into());
        }

        let status = input.status.unwrap_or_default();
        if !status.is_on_site() {
            return Err(ServiceError::validation(format!(
                "Cannot check in with status {status}"
            )));
        }

        let now = Utc::now();
        let attendance = Attendance {
            id: Uuid::new_v4().to_string(),
            staff_id: staff.id.clone(),
            date: input.date.unwrap_or_else(today),
            check_in: Some(input.check_in.unwrap_or_else(clock_time)),
            check_out: None,
            worked_minutes: None,
            status,
            notes: clean(input.notes),
            created_by: None,
            created_at: now,
            updated_at: now,
        };
        self.state.db.staff().insert_attendance(&attendance).await?;
        info!(staff_id = %staff.id, date = %attendance.date, %status, "Checked in");

        Ok(attendance)
    }

    /// Closes the day's record and stores the minutes worked.
    pub async fn check_out(&self, input: CheckOut) -> ServiceResult<Attendance> {
        let date = input.date.unwrap_or_else(today);
        let repo = self.state.db.staff();
        let attendance = repo
            .find_attendance(&input.staff_id, date)
            .await?
            .ok_or_else(|| {
                ServiceError::not_found("Attendance", &format!("{} on {date}", input.staff_id))
            })?;

        let check_out = input.check_out.unwrap_or_else(clock_time);
        let minutes = attendance
            .check_in
            .map(|check_in| worked_minutes(check_in, check_out))
            .transpose()?;
        repo.record_check_out(&attendance.id, check_out, minutes).await?;

        repo.get_attendance(&attendance.id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Attendance", &attendance.id))
    }

    pub async fn list_attendance(
        &self,
        mut filter: AttendanceFilter,
        page: PageRequest,
    ) -> ServiceResult<Page<Attendance>> {
        filter.staff_id = clean(filter.staff_id);
        let page = self.state.page(page);
        Ok(self.state.db.staff().list_attendance(&filter, page).await?)
    }

    async fn ensure_department(&self, id: &str) -> ServiceResult<()> {
        self.state
            .db
            .staff()
            .get_department(id)
            .await?
            .map(|_| ())
            .ok_or_else(|| ServiceError::not_found("Department", id))
    }
}

/// Current UTC wall-clock time to the second.
fn clock_time() -> NaiveTime {
    let now = Utc::now().time();
    now.with_nanosecond(0).unwrap_or(now)
}
