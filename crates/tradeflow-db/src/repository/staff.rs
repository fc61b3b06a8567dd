//! # Staff Repository
//!
//! Departments, staff members, leave requests and daily attendance.
//!
//! ## Leave Lifecycle
//! ```text
//! pending ──approve──► approved
//!    │
//!    └────reject────► rejected
//! ```
//! A decision is final; the guarded UPDATE only matches pending rows.
//!
//! Attendance holds one row per staff member per day. Check-out fills the
//! same row and the guarded UPDATE only matches rows not yet checked out.

use chrono::{NaiveDate, NaiveTime, Utc};
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use tracing::{debug, info};

use crate::error::{DbError, DbResult};
use tradeflow_core::{
    Attendance, AttendanceFilter, CoreError, Department, Leave, LeaveStatus, Page, PageRequest,
    Staff, StaffStatus,
};

/// Repository for department, staff, leave and attendance operations.
#[derive(Debug, Clone)]
pub struct StaffRepository {
    pool: SqlitePool,
}

impl StaffRepository {
    /// Creates a new StaffRepository.
    pub fn new(pool: SqlitePool) -> Self {
        StaffRepository { pool }
    }

    // =========================================================================
    // Departments
    // =========================================================================

    pub async fn insert_department(&self, department: &Department) -> DbResult<()> {
        sqlx::query(
            "INSERT INTO departments (id, name, description, created_at, updated_at) VALUES (?1, ?2, ?3, ?4, ?5)",
        )
        .bind(&department.id)
        .bind(&department.name)
        .bind(&department.description)
        .bind(department.created_at)
        .bind(department.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| match DbError::from(e) {
            DbError::UniqueViolation { .. } => DbError::duplicate("department", &department.name),
            other => other,
        })?;

        Ok(())
    }

    pub async fn get_department(&self, id: &str) -> DbResult<Option<Department>> {
        let department = sqlx::query_as::<_, Department>("SELECT * FROM departments WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(department)
    }

    pub async fn list_departments(&self) -> DbResult<Vec<Department>> {
        let departments = sqlx::query_as::<_, Department>("SELECT * FROM departments ORDER BY name")
            .fetch_all(&self.pool)
            .await?;

        Ok(departments)
    }

    pub async fn update_department(&self, department: &Department) -> DbResult<()> {
        let result = sqlx::query(
            "UPDATE departments SET name = ?2, description = ?3, updated_at = ?4 WHERE id = ?1",
        )
        .bind(&department.id)
        .bind(&department.name)
        .bind(&department.description)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(|e| match DbError::from(e) {
            DbError::UniqueViolation { .. } => DbError::duplicate("department", &department.name),
            other => other,
        })?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Department", &department.id));
        }
        Ok(())
    }

    // =========================================================================
    // Staff
    // =========================================================================

    /// Inserts a staff member.
    ///
    /// ## Returns
    /// * `Err(DbError::UniqueViolation)` - email already used
    /// * `Err(DbError::ForeignKeyViolation)` - unknown department
    pub async fn insert_staff(&self, staff: &Staff) -> DbResult<()> {
        debug!(id = %staff.id, email = %staff.email, "Inserting staff member");

        sqlx::query(
            r#"
            INSERT INTO staff (
                id, first_name, last_name, email, phone, position, department_id,
                hire_date, salary_cents, status, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
            "#,
        )
        .bind(&staff.id)
        .bind(&staff.first_name)
        .bind(&staff.last_name)
        .bind(&staff.email)
        .bind(&staff.phone)
        .bind(&staff.position)
        .bind(&staff.department_id)
        .bind(staff.hire_date)
        .bind(staff.salary_cents)
        .bind(staff.status)
        .bind(staff.created_at)
        .bind(staff.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| match DbError::from(e) {
            DbError::UniqueViolation { .. } => DbError::duplicate("email", &staff.email),
            other => other,
        })?;

        Ok(())
    }

    pub async fn get_staff(&self, id: &str) -> DbResult<Option<Staff>> {
        let staff = sqlx::query_as::<_, Staff>("SELECT * FROM staff WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(staff)
    }

    /// Lists staff by name, optionally within one department or status.
    pub async fn list_staff(
        &self,
        department_id: Option<&str>,
        status: Option<StaffStatus>,
    ) -> DbResult<Vec<Staff>> {
        let mut qb = QueryBuilder::<Sqlite>::new("SELECT * FROM staff WHERE 1 = 1");
        if let Some(department_id) = department_id {
            qb.push(" AND department_id = ").push_bind(department_id);
        }
        if let Some(status) = status {
            qb.push(" AND status = ").push_bind(status);
        }
        qb.push(" ORDER BY last_name, first_name");

        let staff = qb.build_query_as::<Staff>().fetch_all(&self.pool).await?;
        Ok(staff)
    }

    /// Writes every editable field of a staff member.
    pub async fn update_staff(&self, staff: &Staff) -> DbResult<()> {
        debug!(id = %staff.id, "Updating staff member");

        let result = sqlx::query(
            r#"
            UPDATE staff SET
                first_name = ?2, last_name = ?3, email = ?4, phone = ?5, position = ?6,
                department_id = ?7, salary_cents = ?8, status = ?9, updated_at = ?10
            WHERE id = ?1
            "#,
        )
        .bind(&staff.id)
        .bind(&staff.first_name)
        .bind(&staff.last_name)
        .bind(&staff.email)
        .bind(&staff.phone)
        .bind(&staff.position)
        .bind(&staff.department_id)
        .bind(staff.salary_cents)
        .bind(staff.status)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(|e| match DbError::from(e) {
            DbError::UniqueViolation { .. } => DbError::duplicate("email", &staff.email),
            other => other,
        })?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Staff", &staff.id));
        }
        Ok(())
    }

    // =========================================================================
    // Leaves
    // =========================================================================

    pub async fn insert_leave(&self, leave: &Leave) -> DbResult<()> {
        debug!(staff_id = %leave.staff_id, days = leave.days, "Recording leave request");

        sqlx::query(
            r#"
            INSERT INTO leaves (
                id, staff_id, leave_type, start_date, end_date, days, reason,
                status, decided_by, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            "#,
        )
        .bind(&leave.id)
        .bind(&leave.staff_id)
        .bind(leave.leave_type)
        .bind(leave.start_date)
        .bind(leave.end_date)
        .bind(leave.days)
        .bind(&leave.reason)
        .bind(leave.status)
        .bind(&leave.decided_by)
        .bind(leave.created_at)
        .bind(leave.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn get_leave(&self, id: &str) -> DbResult<Option<Leave>> {
        let leave = sqlx::query_as::<_, Leave>("SELECT * FROM leaves WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(leave)
    }

    /// Leave requests of one staff member, latest first.
    pub async fn list_leaves(&self, staff_id: &str) -> DbResult<Vec<Leave>> {
        let leaves = sqlx::query_as::<_, Leave>(
            "SELECT * FROM leaves WHERE staff_id = ?1 ORDER BY start_date DESC",
        )
        .bind(staff_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(leaves)
    }

    /// Approves or rejects a pending leave request.
    ///
    /// ## Returns
    /// * `Err(DbError::NotFound)` - no such leave
    /// * `Err(DbError::Rule(InvalidState))` - already decided
    pub async fn decide_leave(
        &self,
        id: &str,
        status: LeaveStatus,
        decided_by: Option<&str>,
    ) -> DbResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE leaves SET status = ?2, decided_by = ?3, updated_at = ?4
            WHERE id = ?1 AND status = 'pending'
            "#,
        )
        .bind(id)
        .bind(status)
        .bind(decided_by)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return match self.get_leave(id).await? {
                Some(leave) => Err(CoreError::invalid_state(
                    "Leave",
                    leave.status.as_str(),
                    format!("mark {status}"),
                )
                .into()),
                None => Err(DbError::not_found("Leave", id)),
            };
        }

        info!(leave_id = %id, status = %status, "Leave decided");
        Ok(())
    }

    // =========================================================================
    // Attendance
    // =========================================================================

    /// Records a check-in. A second record for the same staff and day is a
    /// `UniqueViolation`.
    pub async fn insert_attendance(&self, attendance: &Attendance) -> DbResult<()> {
        debug!(staff_id = %attendance.staff_id, date = %attendance.date, "Recording check-in");

        sqlx::query(
            r#"
            INSERT INTO attendances (
                id, staff_id, date, check_in, check_out, worked_minutes, status,
                notes, created_by, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            "#,
        )
        .bind(&attendance.id)
        .bind(&attendance.staff_id)
        .bind(attendance.date)
        .bind(attendance.check_in)
        .bind(attendance.check_out)
        .bind(attendance.worked_minutes)
        .bind(attendance.status)
        .bind(&attendance.notes)
        .bind(&attendance.created_by)
        .bind(attendance.created_at)
        .bind(attendance.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| match DbError::from(e) {
            DbError::UniqueViolation { .. } => DbError::duplicate(
                "attendance",
                format!("{} on {}", attendance.staff_id, attendance.date),
            ),
            other => other,
        })?;

        Ok(())
    }

    pub async fn get_attendance(&self, id: &str) -> DbResult<Option<Attendance>> {
        let attendance = sqlx::query_as::<_, Attendance>("SELECT * FROM attendances WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(attendance)
    }

    pub async fn find_attendance(
        &self,
        staff_id: &str,
        date: NaiveDate,
    ) -> DbResult<Option<Attendance>> {
        let attendance = sqlx::query_as::<_, Attendance>(
            "SELECT * FROM attendances WHERE staff_id = ?1 AND date = ?2",
        )
        .bind(staff_id)
        .bind(date)
        .fetch_optional(&self.pool)
        .await?;

        Ok(attendance)
    }

    /// Sets the check-out time of a record that has none yet.
    ///
    /// ## Returns
    /// * `Err(DbError::NotFound)` - no such record
    /// * `Err(DbError::Rule(InvalidState))` - already checked out
    pub async fn record_check_out(
        &self,
        id: &str,
        check_out: NaiveTime,
        worked_minutes: Option<i64>,
    ) -> DbResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE attendances SET check_out = ?2, worked_minutes = ?3, updated_at = ?4
            WHERE id = ?1 AND check_out IS NULL
            "#,
        )
        .bind(id)
        .bind(check_out)
        .bind(worked_minutes)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return match self.get_attendance(id).await? {
                Some(_) => {
                    Err(CoreError::invalid_state("Attendance", "checked out", "check out").into())
                }
                None => Err(DbError::not_found("Attendance", id)),
            };
        }

        info!(attendance_id = %id, %check_out, "Checked out");
        Ok(())
    }

    /// Attendance records, latest day first and earliest arrival first within a day.
    pub async fn list_attendance(
        &self,
        filter: &AttendanceFilter,
        page: PageRequest,
    ) -> DbResult<Page<Attendance>> {
        let mut count = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM attendances WHERE 1 = 1");
        push_attendance_filters(&mut count, filter);
        let total: i64 = count.build_query_scalar().fetch_one(&self.pool).await?;

        let mut select = QueryBuilder::<Sqlite>::new("SELECT * FROM attendances WHERE 1 = 1");
        push_attendance_filters(&mut select, filter);
        select
            .push(" ORDER BY date DESC, check_in ASC LIMIT ")
            .push_bind(page.limit())
            .push(" OFFSET ")
            .push_bind(page.offset());
        let items = select
            .build_query_as::<Attendance>()
            .fetch_all(&self.pool)
            .await?;

        Ok(Page {
            items,
            total,
            page: page.page,
            per_page: page.per_page(),
        })
    }
}

fn push_attendance_filters(qb: &mut QueryBuilder<'_, Sqlite>, filter: &AttendanceFilter) {
    if let Some(staff_id) = &filter.staff_id {
        qb.push(" AND staff_id = ").push_bind(staff_id.clone());
    }
    if let Some(date) = filter.date {
        qb.push(" AND date = ").push_bind(date);
    }
    if let Some(status) = filter.status {
        qb.push(" AND status = ").push_bind(status);
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::test_support::*;
    use tradeflow_core::{AttendanceStatus, LeaveType};
    use uuid::Uuid;

    fn department(name: &str) -> Department {
        let now = Utc::now();
        Department {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            description: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn member(email: &str, department_id: Option<&str>) -> Staff {
        let now = Utc::now();
        Staff {
            id: Uuid::new_v4().to_string(),
            first_name: "Grace".to_string(),
            last_name: "Hopper".to_string(),
            email: email.to_string(),
            phone: None,
            position: Some("Engineer".to_string()),
            department_id: department_id.map(str::to_string),
            hire_date: NaiveDate::from_ymd_opt(2024, 3, 1),
            salary_cents: 450_000,
            status: StaffStatus::Active,
            created_at: now,
            updated_at: now,
        }
    }

    fn leave_for(staff: &Staff) -> Leave {
        let now = Utc::now();
        Leave {
            id: Uuid::new_v4().to_string(),
            staff_id: staff.id.clone(),
            leave_type: LeaveType::Annual,
            start_date: NaiveDate::from_ymd_opt(2025, 7, 1).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2025, 7, 5).unwrap(),
            days: 5,
            reason: None,
            status: LeaveStatus::Pending,
            decided_by: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn test_department_names_unique() {
        let db = test_db().await;
        db.staff().insert_department(&department("Sales")).await.unwrap();
        let err = db.staff().insert_department(&department("Sales")).await.unwrap_err();
        assert!(matches!(err, DbError::UniqueViolation { .. }));
    }

    #[tokio::test]
    async fn test_list_staff_by_department() {
        let db = test_db().await;
        let ops = department("Operations");
        db.staff().insert_department(&ops).await.unwrap();
        db.staff().insert_staff(&member("a@example.com", Some(&ops.id))).await.unwrap();
        db.staff().insert_staff(&member("b@example.com", None)).await.unwrap();

        let in_ops = db.staff().list_staff(Some(&ops.id), None).await.unwrap();
        assert_eq!(in_ops.len(), 1);
        assert_eq!(in_ops[0].email, "a@example.com");
        assert_eq!(db.staff().list_staff(None, Some(StaffStatus::Active)).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_duplicate_email_and_unknown_department() {
        let db = test_db().await;
        db.staff().insert_staff(&member("g@example.com", None)).await.unwrap();

        let err = db.staff().insert_staff(&member("g@example.com", None)).await.unwrap_err();
        assert!(matches!(err, DbError::UniqueViolation { field, .. } if field == "email"));

        let err = db
            .staff()
            .insert_staff(&member("h@example.com", Some("missing")))
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::ForeignKeyViolation { .. }));
    }

    #[tokio::test]
    async fn test_update_staff() {
        let db = test_db().await;
        let mut grace = member("g@example.com", None);
        db.staff().insert_staff(&grace).await.unwrap();

        grace.status = StaffStatus::OnLeave;
        grace.salary_cents = 500_000;
        db.staff().update_staff(&grace).await.unwrap();

        let stored = db.staff().get_staff(&grace.id).await.unwrap().unwrap();
        assert_eq!(stored.status, StaffStatus::OnLeave);
        assert_eq!(stored.salary_cents, 500_000);

        let ghost = member("x@example.com", None);
        assert!(matches!(
            db.staff().update_staff(&ghost).await,
            Err(DbError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_leave_decided_once() {
        let db = test_db().await;
        let grace = member("g@example.com", None);
        db.staff().insert_staff(&grace).await.unwrap();
        let leave = leave_for(&grace);
        db.staff().insert_leave(&leave).await.unwrap();

        db.staff()
            .decide_leave(&leave.id, LeaveStatus::Approved, Some("manager"))
            .await
            .unwrap();
        let err = db
            .staff()
            .decide_leave(&leave.id, LeaveStatus::Rejected, None)
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Rule(CoreError::InvalidState { .. })));

        let stored = db.staff().get_leave(&leave.id).await.unwrap().unwrap();
        assert_eq!(stored.status, LeaveStatus::Approved);
        assert_eq!(stored.decided_by.as_deref(), Some("manager"));
        assert_eq!(db.staff().list_leaves(&grace.id).await.unwrap().len(), 1);

        assert!(matches!(
            db.staff().decide_leave("missing", LeaveStatus::Approved, None).await,
            Err(DbError::NotFound { .. })
        ));
    }

    fn attendance_for(staff: &Staff, date: NaiveDate, hour: u32) -> Attendance {
        let now = Utc::now();
        Attendance {
            id: Uuid::new_v4().to_string(),
            staff_id: staff.id.clone(),
            date,
            check_in: NaiveTime::from_hms_opt(hour, 0, 0),
            check_out: None,
            worked_minutes: None,
            status: AttendanceStatus::Present,
            notes: None,
            created_by: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn test_attendance_once_per_day() {
        let db = test_db().await;
        let grace = member("g@example.com", None);
        db.staff().insert_staff(&grace).await.unwrap();
        let monday = NaiveDate::from_ymd_opt(2025, 7, 7).unwrap();

        let first = attendance_for(&grace, monday, 9);
        db.staff().insert_attendance(&first).await.unwrap();
        let err = db
            .staff()
            .insert_attendance(&attendance_for(&grace, monday, 10))
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::UniqueViolation { field, .. } if field == "attendance"));

        let five = NaiveTime::from_hms_opt(17, 0, 0).unwrap();
        db.staff().record_check_out(&first.id, five, Some(480)).await.unwrap();
        let err = db.staff().record_check_out(&first.id, five, Some(480)).await.unwrap_err();
        assert!(matches!(err, DbError::Rule(CoreError::InvalidState { .. })));

        let stored = db.staff().find_attendance(&grace.id, monday).await.unwrap().unwrap();
        assert_eq!(stored.check_in, NaiveTime::from_hms_opt(9, 0, 0));
        assert_eq!(stored.check_out, Some(five));
        assert_eq!(stored.worked_minutes, Some(480));

        assert!(matches!(
            db.staff().record_check_out("missing", five, None).await,
            Err(DbError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_list_attendance_filters_and_order() {
        let db = test_db().await;
        let grace = member("g@example.com", None);
        let alan = member("a@example.com", None);
        db.staff().insert_staff(&grace).await.unwrap();
        db.staff().insert_staff(&alan).await.unwrap();
        let monday = NaiveDate::from_ymd_opt(2025, 7, 7).unwrap();
        let tuesday = NaiveDate::from_ymd_opt(2025, 7, 8).unwrap();

        db.staff().insert_attendance(&attendance_for(&grace, monday, 9)).await.unwrap();
        db.staff().insert_attendance(&attendance_for(&alan, tuesday, 10)).await.unwrap();
        let mut late = attendance_for(&grace, tuesday, 11);
        late.status = AttendanceStatus::Late;
        db.staff().insert_attendance(&late).await.unwrap();

        let all = db
            .staff()
            .list_attendance(&AttendanceFilter::default(), PageRequest::default())
            .await
            .unwrap();
        assert_eq!(all.total, 3);
        let order: Vec<_> = all.items.iter().map(|a| (a.date, a.check_in)).collect();
        assert_eq!(
            order,
            vec![
                (tuesday, NaiveTime::from_hms_opt(10, 0, 0)),
                (tuesday, NaiveTime::from_hms_opt(11, 0, 0)),
                (monday, NaiveTime::from_hms_opt(9, 0, 0)),
            ]
        );

        let filter = AttendanceFilter {
            staff_id: Some(grace.id.clone()),
            status: Some(AttendanceStatus::Late),
            ..Default::default()
        };
        let graces = db.staff().list_attendance(&filter, PageRequest::default()).await.unwrap();
        assert_eq!(graces.total, 1);
        assert_eq!(graces.items[0].id, late.id);

        let on_monday = AttendanceFilter { date: Some(monday), ..Default::default() };
        let page = db.staff().list_attendance(&on_monday, PageRequest::default()).await.unwrap();
        assert_eq!(page.total, 1);
    }
}
