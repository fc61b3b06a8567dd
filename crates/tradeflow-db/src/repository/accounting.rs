//! # Accounting Repository
//!
//! Account heads, incomes, expenses, payroll and tax submissions, plus the
//! sums behind the financial overview and tax position reports.

use chrono::{NaiveDate, Utc};
use sqlx::SqlitePool;
use tracing::debug;

use super::DateRange;
use crate::error::{DbError, DbResult};
use tradeflow_core::{
    CoreError, CreditHead, DebitHead, Expense, Income, Money, Payroll, TaxSubmission,
    TaxSubmissionStatus,
};

/// Repository for accounting database operations.
#[derive(Debug, Clone)]
pub struct AccountingRepository {
    pool: SqlitePool,
}

impl AccountingRepository {
    /// Creates a new AccountingRepository.
    pub fn new(pool: SqlitePool) -> Self {
        AccountingRepository { pool }
    }

    // =========================================================================
    // Account Heads
    // =========================================================================

    pub async fn insert_credit_head(&self, head: &CreditHead) -> DbResult<()> {
        sqlx::query(
            "INSERT INTO credit_heads (id, name, description, is_active, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
        )
        .bind(&head.id)
        .bind(&head.name)
        .bind(&head.description)
        .bind(head.is_active)
        .bind(head.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| match DbError::from(e) {
            DbError::UniqueViolation { .. } => DbError::duplicate("credit head", &head.name),
            other => other,
        })?;

        Ok(())
    }

    pub async fn get_credit_head(&self, id: &str) -> DbResult<Option<CreditHead>> {
        let head = sqlx::query_as::<_, CreditHead>("SELECT * FROM credit_heads WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(head)
    }

    pub async fn list_credit_heads(&self, active_only: bool) -> DbResult<Vec<CreditHead>> {
        let heads = sqlx::query_as::<_, CreditHead>(
            "SELECT * FROM credit_heads WHERE (?1 = 0 OR is_active = 1) ORDER BY name",
        )
        .bind(active_only)
        .fetch_all(&self.pool)
        .await?;

        Ok(heads)
    }

    pub async fn set_credit_head_active(&self, id: &str, active: bool) -> DbResult<()> {
        let result = sqlx::query("UPDATE credit_heads SET is_active = ?2 WHERE id = ?1")
            .bind(id)
            .bind(active)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Credit head", id));
        }
        Ok(())
    }

    pub async fn insert_debit_head(&self, head: &DebitHead) -> DbResult<()> {
        sqlx::query(
            "INSERT INTO debit_heads (id, name, description, is_active, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
        )
        .bind(&head.id)
        .bind(&head.name)
        .bind(&head.description)
        .bind(head.is_active)
        .bind(head.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| match DbError::from(e) {
            DbError::UniqueViolation { .. } => DbError::duplicate("debit head", &head.name),
            other => other,
        })?;

        Ok(())
    }

    pub async fn get_debit_head(&self, id: &str) -> DbResult<Option<DebitHead>> {
        let head = sqlx::query_as::<_, DebitHead>("SELECT * FROM debit_heads WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(head)
    }

    pub async fn list_debit_heads(&self, active_only: bool) -> DbResult<Vec<DebitHead>> {
        let heads = sqlx::query_as::<_, DebitHead>(
            "SELECT * FROM debit_heads WHERE (?1 = 0 OR is_active = 1) ORDER BY name",
        )
        .bind(active_only)
        .fetch_all(&self.pool)
        .await?;

        Ok(heads)
    }

    pub async fn set_debit_head_active(&self, id: &str, active: bool) -> DbResult<()> {
        let result = sqlx::query("UPDATE debit_heads SET is_active = ?2 WHERE id = ?1")
            .bind(id)
            .bind(active)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Debit head", id));
        }
        Ok(())
    }

    // =========================================================================
    // Incomes & Expenses
    // =========================================================================

    pub async fn insert_income(&self, income: &Income) -> DbResult<()> {
        debug!(head = %income.credit_head_id, amount_cents = income.amount_cents, "Recording income");

        sqlx::query(
            r#"
            INSERT INTO incomes (
                id, credit_head_id, amount_cents, income_date, reference,
                description, created_by, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
        )
        .bind(&income.id)
        .bind(&income.credit_head_id)
        .bind(income.amount_cents)
        .bind(income.income_date)
        .bind(&income.reference)
        .bind(&income.description)
        .bind(&income.created_by)
        .bind(income.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Incomes dated within `range` (inclusive), oldest first.
    pub async fn list_incomes(&self, range: DateRange) -> DbResult<Vec<Income>> {
        let incomes = sqlx::query_as::<_, Income>(
            r#"
            SELECT * FROM incomes
            WHERE income_date BETWEEN ?1 AND ?2
            ORDER BY income_date, created_at
            "#,
        )
        .bind(range.from)
        .bind(range.to)
        .fetch_all(&self.pool)
        .await?;

        Ok(incomes)
    }

    pub async fn insert_expense(&self, expense: &Expense) -> DbResult<()> {
        debug!(head = %expense.debit_head_id, amount_cents = expense.amount_cents, "Recording expense");

        sqlx::query(
            r#"
            INSERT INTO expenses (
                id, debit_head_id, amount_cents, expense_date, reference,
                description, created_by, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
        )
        .bind(&expense.id)
        .bind(&expense.debit_head_id)
        .bind(expense.amount_cents)
        .bind(expense.expense_date)
        .bind(&expense.reference)
        .bind(&expense.description)
        .bind(&expense.created_by)
        .bind(expense.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Expenses dated within `range` (inclusive), oldest first.
    pub async fn list_expenses(&self, range: DateRange) -> DbResult<Vec<Expense>> {
        let expenses = sqlx::query_as::<_, Expense>(
            r#"
            SELECT * FROM expenses
            WHERE expense_date BETWEEN ?1 AND ?2
            ORDER BY expense_date, created_at
            "#,
        )
        .bind(range.from)
        .bind(range.to)
        .fetch_all(&self.pool)
        .await?;

        Ok(expenses)
    }

    // =========================================================================
    // Report Sums
    // =========================================================================

    pub async fn total_income(&self, range: DateRange) -> DbResult<Money> {
        self.sum_between(
            "SELECT COALESCE(SUM(amount_cents), 0) FROM incomes WHERE income_date BETWEEN ?1 AND ?2",
            range,
        )
        .await
    }

    pub async fn total_expense(&self, range: DateRange) -> DbResult<Money> {
        self.sum_between(
            "SELECT COALESCE(SUM(amount_cents), 0) FROM expenses WHERE expense_date BETWEEN ?1 AND ?2",
            range,
        )
        .await
    }

    /// Tax charged on sales orders dated in `range`, cancelled orders excluded.
    pub async fn output_tax(&self, range: DateRange) -> DbResult<Money> {
        self.sum_between(
            r#"
            SELECT COALESCE(SUM(tax_cents), 0) FROM sales_orders
            WHERE order_date BETWEEN ?1 AND ?2 AND status != 'cancelled'
            "#,
            range,
        )
        .await
    }

    /// Tax paid on purchase orders dated in `range`, cancelled orders excluded.
    pub async fn input_tax(&self, range: DateRange) -> DbResult<Money> {
        self.sum_between(
            r#"
            SELECT COALESCE(SUM(tax_cents), 0) FROM purchase_orders
            WHERE order_date BETWEEN ?1 AND ?2 AND status != 'cancelled'
            "#,
            range,
        )
        .await
    }

    async fn sum_between(&self, sql: &str, range: DateRange) -> DbResult<Money> {
        let cents: i64 = sqlx::query_scalar(sql)
            .bind(range.from)
            .bind(range.to)
            .fetch_one(&self.pool)
            .await?;

        Ok(Money::from_cents(cents))
    }

    // =========================================================================
    // Payroll
    // =========================================================================

    /// Inserts a payroll entry. One per staff member and period.
    pub async fn insert_payroll(&self, payroll: &Payroll) -> DbResult<()> {
        debug!(staff_id = %payroll.staff_id, net_cents = payroll.net_salary_cents, "Creating payroll");

        sqlx::query(
            r#"
            INSERT INTO payrolls (
                id, staff_id, period_start, period_end, basic_salary_cents,
                allowances_cents, deductions_cents, net_salary_cents,
                status, paid_on, notes, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
            "#,
        )
        .bind(&payroll.id)
        .bind(&payroll.staff_id)
        .bind(payroll.period_start)
        .bind(payroll.period_end)
        .bind(payroll.basic_salary_cents)
        .bind(payroll.allowances_cents)
        .bind(payroll.deductions_cents)
        .bind(payroll.net_salary_cents)
        .bind(payroll.status)
        .bind(payroll.paid_on)
        .bind(&payroll.notes)
        .bind(payroll.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| match DbError::from(e) {
            DbError::UniqueViolation { .. } => DbError::duplicate(
                "payroll period",
                format!("{} {}..{}", payroll.staff_id, payroll.period_start, payroll.period_end),
            ),
            other => other,
        })?;

        Ok(())
    }

    /// Payroll entries, latest period first, optionally for one staff member.
    pub async fn list_payrolls(&self, staff_id: Option<&str>) -> DbResult<Vec<Payroll>> {
        let payrolls = sqlx::query_as::<_, Payroll>(
            r#"
            SELECT * FROM payrolls
            WHERE (?1 IS NULL OR staff_id = ?1)
            ORDER BY period_start DESC, created_at DESC
            "#,
        )
        .bind(staff_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(payrolls)
    }

    /// Marks a pending payroll entry as paid.
    pub async fn mark_payroll_paid(&self, id: &str, paid_on: NaiveDate) -> DbResult<()> {
        let result = sqlx::query(
            "UPDATE payrolls SET status = 'paid', paid_on = ?2 WHERE id = ?1 AND status = 'pending'",
        )
        .bind(id)
        .bind(paid_on)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            let exists: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM payrolls WHERE id = ?1")
                .bind(id)
                .fetch_one(&self.pool)
                .await?;
            return Err(if exists > 0 {
                CoreError::invalid_state("Payroll", "paid", "mark paid").into()
            } else {
                DbError::not_found("Payroll", id)
            });
        }
        Ok(())
    }

    // =========================================================================
    // Tax Submissions
    // =========================================================================

    pub async fn insert_tax_submission(&self, submission: &TaxSubmission) -> DbResult<()> {
        debug!(tax_type = %submission.tax_type, amount_cents = submission.amount_cents, "Recording tax submission");

        sqlx::query(
            r#"
            INSERT INTO tax_submissions (
                id, tax_type, period_start, period_end, amount_cents, status,
                submitted_at, reference, notes, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            "#,
        )
        .bind(&submission.id)
        .bind(&submission.tax_type)
        .bind(submission.period_start)
        .bind(submission.period_end)
        .bind(submission.amount_cents)
        .bind(submission.status)
        .bind(submission.submitted_at)
        .bind(&submission.reference)
        .bind(&submission.notes)
        .bind(submission.created_at)
        .bind(submission.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn get_tax_submission(&self, id: &str) -> DbResult<Option<TaxSubmission>> {
        let submission = sqlx::query_as::<_, TaxSubmission>("SELECT * FROM tax_submissions WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(submission)
    }

    /// Submissions whose period starts within `range`.
    pub async fn list_tax_submissions(&self, range: DateRange) -> DbResult<Vec<TaxSubmission>> {
        let submissions = sqlx::query_as::<_, TaxSubmission>(
            r#"
            SELECT * FROM tax_submissions
            WHERE period_start BETWEEN ?1 AND ?2
            ORDER BY period_start, created_at
            "#,
        )
        .bind(range.from)
        .bind(range.to)
        .fetch_all(&self.pool)
        .await?;

        Ok(submissions)
    }

    /// Sets a submission's status. Submitted stamps `submitted_at` once.
    pub async fn update_tax_submission_status(
        &self,
        id: &str,
        status: TaxSubmissionStatus,
    ) -> DbResult<()> {
        let now = Utc::now();
        let submitted_at = (status == TaxSubmissionStatus::Submitted).then_some(now);

        let result = sqlx::query(
            r#"
            UPDATE tax_submissions
            SET status = ?2, submitted_at = COALESCE(submitted_at, ?3), updated_at = ?4
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .bind(status)
        .bind(submitted_at)
        .bind(now)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Tax submission", id));
        }
        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
