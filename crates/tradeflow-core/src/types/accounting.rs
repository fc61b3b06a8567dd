//! Account heads, incomes, expenses, payroll and tax submissions.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreResult, ValidationError};
use crate::money::Money;

// =============================================================================
// Account Heads
// =============================================================================

/// A category incomes are booked under (sales, interest, ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct CreditHead {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub is_active: bool,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

/// A category expenses are booked under (rent, utilities, ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct DebitHead {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub is_active: bool,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

/// Input for creating either kind of account head.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct NewAccountHead {
    pub name: String,
    pub description: Option<String>,
}

// =============================================================================
// Income & Expense
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Income {
    pub id: String,
    pub credit_head_id: String,
    pub amount_cents: i64,
    #[ts(as = "String")]
    pub income_date: NaiveDate,
    pub reference: Option<String>,
    pub description: Option<String>,
    pub created_by: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct NewIncome {
    pub credit_head_id: String,
    pub amount_cents: i64,
    #[ts(as = "String")]
    pub income_date: NaiveDate,
    pub reference: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Expense {
    pub id: String,
    pub debit_head_id: String,
    pub amount_cents: i64,
    #[ts(as = "String")]
    pub expense_date: NaiveDate,
    pub reference: Option<String>,
    pub description: Option<String>,
    pub created_by: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct NewExpense {
    pub debit_head_id: String,
    pub amount_cents: i64,
    #[ts(as = "String")]
    pub expense_date: NaiveDate,
    pub reference: Option<String>,
    pub description: Option<String>,
}

// =============================================================================
// Payroll
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum PayrollStatus {
    #[default]
    Pending,
    Paid,
}

/// One staff member's pay for a period.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Payroll {
    pub id: String,
    pub staff_id: String,
    #[ts(as = "String")]
    pub period_start: NaiveDate,
    #[ts(as = "String")]
    pub period_end: NaiveDate,
    pub basic_salary_cents: i64,
    pub allowances_cents: i64,
    pub deductions_cents: i64,
    /// basic + allowances − deductions
    pub net_salary_cents: i64,
    pub status: PayrollStatus,
    #[ts(as = "Option<String>")]
    pub paid_on: Option<NaiveDate>,
    pub notes: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct NewPayroll {
    pub staff_id: String,
    #[ts(as = "String")]
    pub period_start: NaiveDate,
    #[ts(as = "String")]
    pub period_end: NaiveDate,
    /// Defaults to the staff member's salary.
    pub basic_salary_cents: Option<i64>,
    #[serde(default)]
    pub allowances_cents: i64,
    #[serde(default)]
    pub deductions_cents: i64,
    pub notes: Option<String>,
}

/// Net pay: basic + allowances − deductions.
///
/// ## Errors
/// Any negative component, or deductions larger than gross pay.
///
/// ## Example
/// ```rust
/// use tradeflow_core::money::Money;
/// use tradeflow_core::types::net_salary;
///
/// let net = net_salary(
///     Money::from_cents(300_000),
///     Money::from_cents(20_000),
///     Money::from_cents(15_000),
/// ).unwrap();
/// assert_eq!(net.cents(), 305_000);
/// ```
pub fn net_salary(basic: Money, allowances: Money, deductions: Money) -> CoreResult<Money> {
    for (field, value) in [
        ("basic_salary", basic),
        ("allowances", allowances),
        ("deductions", deductions),
    ] {
        if value.is_negative() {
            return Err(ValidationError::MustNotBeNegative {
                field: field.to_string(),
            }
            .into());
        }
    }

    let net = basic + allowances - deductions;
    if net.is_negative() {
        return Err(ValidationError::MustNotBeNegative {
            field: "net_salary".to_string(),
        }
        .into());
    }
    Ok(net)
}

// =============================================================================
// Tax Submissions
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum TaxSubmissionStatus {
    #[default]
    Pending,
    Submitted,
    Paid,
}

/// A tax return filed (or to be filed) with the authority.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct TaxSubmission {
    pub id: String,
    /// Free-form tax kind, e.g. `sales_tax`, `income_tax`.
    pub tax_type: String,
    #[ts(as = "String")]
    pub period_start: NaiveDate,
    #[ts(as = "String")]
    pub period_end: NaiveDate,
    pub amount_cents: i64,
    pub status: TaxSubmissionStatus,
    #[ts(as = "Option<String>")]
    pub submitted_at: Option<DateTime<Utc>>,
    pub reference: Option<String>,
    pub notes: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct NewTaxSubmission {
    pub tax_type: String,
    #[ts(as = "String")]
    pub period_start: NaiveDate,
    #[ts(as = "String")]
    pub period_end: NaiveDate,
    pub amount_cents: i64,
    pub reference: Option<String>,
    pub notes: Option<String>,
}

// =============================================================================
// Summaries
// =============================================================================

/// Income against expense over a date range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct FinancialOverview {
    #[ts(as = "String")]
    pub from: NaiveDate,
    #[ts(as = "String")]
    pub to: NaiveDate,
    pub total_income: Money,
    pub total_expense: Money,
    /// total_income − total_expense
    pub net_profit: Money,
}

impl FinancialOverview {
    pub fn new(from: NaiveDate, to: NaiveDate, total_income: Money, total_expense: Money) -> Self {
        FinancialOverview {
            from,
            to,
            total_income,
            total_expense,
            net_profit: total_income - total_expense,
        }
    }
}

/// Tax charged on sales against tax paid on purchases over a period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct TaxPosition {
    #[ts(as = "String")]
    pub from: NaiveDate,
    #[ts(as = "String")]
    pub to: NaiveDate,
    /// Σ sales order tax
    pub output_tax: Money,
    /// Σ purchase order tax
    pub input_tax: Money,
    /// output − input; negative means a reclaim
    pub net_payable: Money,
}

impl TaxPosition {
    pub fn new(from: NaiveDate, to: NaiveDate, output_tax: Money, input_tax: Money) -> Self {
        TaxPosition {
            from,
            to,
            output_tax,
            input_tax,
            net_payable: output_tax - input_tax,
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_net_salary() {
        let net = net_salary(
            Money::from_cents(250_000),
            Money::from_cents(0),
            Money::from_cents(50_000),
        )
        .unwrap();
        assert_eq!(net.cents(), 200_000);
    }

    #[test]
    fn test_net_salary_rejects_negative() {
        assert!(net_salary(Money::from_cents(100), Money::zero(), Money::from_cents(101)).is_err());
        assert!(net_salary(Money::from_cents(-1), Money::zero(), Money::zero()).is_err());
    }

    #[test]
    fn test_overview_and_tax_position() {
        let d = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let overview = FinancialOverview::new(d, d, Money::from_cents(900), Money::from_cents(1200));
        assert_eq!(overview.net_profit.cents(), -300);

        let position = TaxPosition::new(d, d, Money::from_cents(500), Money::from_cents(200));
        assert_eq!(position.net_payable.cents(), 300);
    }
}
