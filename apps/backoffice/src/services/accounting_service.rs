//! Accounting service.
//!
//! ## Ledger
//! ```text
//! CreditHead ──< Income          DebitHead ──< Expense
//!                   │                              │
//!                   └──────────┬───────────────────┘
//!                              ▼
//!               financial_overview(from, to)
//!                   income − expense = net profit
//!
//! sales_orders.tax_cents ─── output tax ─┐
//!                                        ├─► tax_position(from, to)
//! purchase_orders.tax_cents ─ input tax ─┘     output − input = net payable
//! ```

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use tracing::info;
use uuid::Uuid;

use super::{clean, today};
use crate::error::{ServiceError, ServiceResult};
use crate::AppState;
use tradeflow_core::validation::{
    validate_amount_cents, validate_date_range, validate_name, validate_payment_amount,
};
use tradeflow_core::{
    net_salary, CoreError, CreditHead, DebitHead, Expense, FinancialOverview, Income, Money,
    NewAccountHead, NewExpense, NewIncome, NewPayroll, NewTaxSubmission, Payroll, PayrollStatus,
    TaxPosition, TaxSubmission, TaxSubmissionStatus, ValidationError,
};
use tradeflow_db::DateRange;

/// Accounting service implementation.
#[derive(Debug, Clone)]
pub struct AccountingService {
    state: Arc<AppState>,
}

impl AccountingService {
    /// Create a new accounting service.
    pub fn new(state: Arc<AppState>) -> Self {
        AccountingService { state }
    }

    // =========================================================================
    // Account Heads
    // =========================================================================

    pub async fn create_credit_head(&self, input: NewAccountHead) -> ServiceResult<CreditHead> {
        validate_name("name", &input.name)?;

        let head = CreditHead {
            id: Uuid::new_v4().to_string(),
            name: input.name.trim().to_string(),
            description: clean(input.description),
            is_active: true,
            created_at: Utc::now(),
        };
        self.state.db.accounting().insert_credit_head(&head).await?;
        info!(head_id = %head.id, name = %head.name, "Credit head created");

        Ok(head)
    }

    pub async fn list_credit_heads(&self, active_only: bool) -> ServiceResult<Vec<CreditHead>> {
        Ok(self.state.db.accounting().list_credit_heads(active_only).await?)
    }

    /// Retires a credit head. Existing incomes keep pointing at it.
    pub async fn deactivate_credit_head(&self, id: &str) -> ServiceResult<()> {
        self.state.db.accounting().set_credit_head_active(id, false).await?;
        info!(head_id = %id, "Credit head deactivated");
        Ok(())
    }

    pub async fn create_debit_head(&self, input: NewAccountHead) -> ServiceResult<DebitHead> {
        validate_name("name", &input.name)?;

        let head = DebitHead {
            id: Uuid::new_v4().to_string(),
            name: input.name.trim().to_string(),
            description: clean(input.description),
            is_active: true,
            created_at: Utc::now(),
        };
        self.state.db.accounting().insert_debit_head(&head).await?;
        info!(head_id = %head.id, name = %head.name, "Debit head created");

        Ok(head)
    }

    pub async fn list_debit_heads(&self, active_only: bool) -> ServiceResult<Vec<DebitHead>> {
        Ok(self.state.db.accounting().list_debit_heads(active_only).await?)
    }

    pub async fn deactivate_debit_head(&self, id: &str) -> ServiceResult<()> {
        self.state.db.accounting().set_debit_head_active(id, false).await?;
        info!(head_id = %id, "Debit head deactivated");
        Ok(())
    }

    // =========================================================================
    // Incomes & Expenses
    // =========================================================================

    /// Books an income under an active credit head.
    pub async fn record_income(&self, input: NewIncome, user: Option<&str>) -> ServiceResult<Income> {
        validate_payment_amount(input.amount_cents)?;

        let repo = self.state.db.accounting();
        let head = repo
            .get_credit_head(&input.credit_head_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Credit head", &input.credit_head_id))?;
        if !head.is_active {
            return Err(CoreError::invalid_state("Credit head", "inactive", "take entries").into());
        }

        let income = Income {
            id: Uuid::new_v4().to_string(),
            credit_head_id: head.id,
            amount_cents: input.amount_cents,
            income_date: input.income_date,
            reference: clean(input.reference),
            description: clean(input.description),
            created_by: user.map(str::to_string),
            created_at: Utc::now(),
        };
        repo.insert_income(&income).await?;
        info!(income_id = %income.id, amount_cents = income.amount_cents, "Income recorded");

        Ok(income)
    }

    /// Books an expense under an active debit head.
    pub async fn record_expense(&self, input: NewExpense, user: Option<&str>) -> ServiceResult<Expense> {
        validate_payment_amount(input.amount_cents)?;

        let repo = self.state.db.accounting();
        let head = repo
            .get_debit_head(&input.debit_head_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Debit head", &input.debit_head_id))?;
        if !head.is_active {
            return Err(CoreError::invalid_state("Debit head", "inactive", "take entries").into());
        }

        let expense = Expense {
            id: Uuid::new_v4().to_string(),
            debit_head_id: head.id,
            amount_cents: input.amount_cents,
            expense_date: input.expense_date,
            reference: clean(input.reference),
            description: clean(input.description),
            created_by: user.map(str::to_string),
            created_at: Utc::now(),
        };
        repo.insert_expense(&expense).await?;
        info!(expense_id = %expense.id, amount_cents = expense.amount_cents, "Expense recorded");

        Ok(expense)
    }

    pub async fn list_incomes(&self, from: NaiveDate, to: NaiveDate) -> ServiceResult<Vec<Income>> {
        let range = report_range(from, to)?;
        Ok(self.state.db.accounting().list_incomes(range).await?)
    }

    pub async fn list_expenses(&self, from: NaiveDate, to: NaiveDate) -> ServiceResult<Vec<Expense>> {
        let range = report_range(from, to)?;
        Ok(self.state.db.accounting().list_expenses(range).await?)
    }

    // =========================================================================
    // Payroll
    // =========================================================================

    /// Creates the payroll entry of one staff member for one period.
    ///
    /// Basic salary defaults to the staff member's salary.
    pub async fn create_payroll(&self, input: NewPayroll) -> ServiceResult<Payroll> {
        validate_date_range("period", input.period_start, input.period_end)?;

        let staff = self
            .state
            .db
            .staff()
            .get_staff(&input.staff_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Staff", &input.staff_id))?;

        let basic = input
            .basic_salary_cents
            .map(Money::from_cents)
            .unwrap_or_else(|| staff.salary());
        let net = net_salary(
            basic,
            Money::from_cents(input.allowances_cents),
            Money::from_cents(input.deductions_cents),
        )?;

        let payroll = Payroll {
            id: Uuid::new_v4().to_string(),
            staff_id: staff.id.clone(),
            period_start: input.period_start,
            period_end: input.period_end,
            basic_salary_cents: basic.cents(),
            allowances_cents: input.allowances_cents,
            deductions_cents: input.deductions_cents,
            net_salary_cents: net.cents(),
            status: PayrollStatus::Pending,
            paid_on: None,
            notes: clean(input.notes),
            created_at: Utc::now(),
        };
        self.state.db.accounting().insert_payroll(&payroll).await?;
        info!(payroll_id = %payroll.id, staff = %staff.full_name(), net = %net, "Payroll created");

        Ok(payroll)
    }

    pub async fn list_payrolls(&self, staff_id: Option<&str>) -> ServiceResult<Vec<Payroll>> {
        Ok(self.state.db.accounting().list_payrolls(staff_id).await?)
    }

    /// Marks a pending payroll paid, on `paid_on` or today.
    pub async fn mark_payroll_paid(&self, id: &str, paid_on: Option<NaiveDate>) -> ServiceResult<()> {
        self.state
            .db
            .accounting()
            .mark_payroll_paid(id, paid_on.unwrap_or_else(today))
            .await?;
        info!(payroll_id = %id, "Payroll paid");
        Ok(())
    }

    // =========================================================================
    // Tax Submissions
    // =========================================================================

    pub async fn create_tax_submission(&self, input: NewTaxSubmission) -> ServiceResult<TaxSubmission> {
        validate_name("tax_type", &input.tax_type)?;
        validate_date_range("period", input.period_start, input.period_end)?;
        validate_amount_cents("amount", input.amount_cents)?;

        let now = Utc::now();
        let submission = TaxSubmission {
            id: Uuid::new_v4().to_string(),
            tax_type: input.tax_type.trim().to_string(),
            period_start: input.period_start,
            period_end: input.period_end,
            amount_cents: input.amount_cents,
            status: TaxSubmissionStatus::Pending,
            submitted_at: None,
            reference: clean(input.reference),
            notes: clean(input.notes),
            created_at: now,
            updated_at: now,
        };
        self.state.db.accounting().insert_tax_submission(&submission).await?;
        info!(submission_id = %submission.id, tax_type = %submission.tax_type, "Tax submission created");

        Ok(submission)
    }

    /// Moves a submission along. Paid submissions are final.
    pub async fn update_tax_submission_status(
        &self,
        id: &str,
        status: TaxSubmissionStatus,
    ) -> ServiceResult<TaxSubmission> {
        let repo = self.state.db.accounting();
        let current = repo
            .get_tax_submission(id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Tax submission", id))?;
        if current.status == TaxSubmissionStatus::Paid && status != TaxSubmissionStatus::Paid {
            return Err(CoreError::invalid_state("Tax submission", "paid", "change status").into());
        }

        repo.update_tax_submission_status(id, status).await?;
        info!(submission_id = %id, ?status, "Tax submission status updated");

        repo.get_tax_submission(id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Tax submission", id))
    }

    /// Submissions whose period starts in the range.
    pub async fn list_tax_submissions(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> ServiceResult<Vec<TaxSubmission>> {
        let range = report_range(from, to)?;
        Ok(self.state.db.accounting().list_tax_submissions(range).await?)
    }

    // =========================================================================
    // Reports
    // =========================================================================

    /// Income, expense and net profit over an inclusive date range.
    pub async fn financial_overview(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> ServiceResult<FinancialOverview> {
        let range = report_range(from, to)?;
        let repo = self.state.db.accounting();

        let income = repo.total_income(range).await?;
        let expense = repo.total_expense(range).await?;

        Ok(FinancialOverview::new(from, to, income, expense))
    }

    /// Output tax on sales against input tax on purchases, cancelled
    /// orders excluded.
    pub async fn tax_position(&self, from: NaiveDate, to: NaiveDate) -> ServiceResult<TaxPosition> {
        let range = report_range(from, to)?;
        let repo = self.state.db.accounting();

        let output = repo.output_tax(range).await?;
        let input = repo.input_tax(range).await?;

        Ok(TaxPosition::new(from, to, output, input))
    }
}

fn report_range(from: NaiveDate, to: NaiveDate) -> Result<DateRange, ValidationError> {
    validate_date_range("report", from, to)?;
    Ok(DateRange::new(from, to))
}
