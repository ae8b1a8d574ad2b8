use chrono::{Datelike, Months, NaiveDate};
use serde::{Deserialize, Serialize};

use super::super::domain::ProposalSection;

const MAX_TERM_MONTHS: u32 = 600;
/// Residual balances below this are treated as fully amortized.
const BALANCE_TOLERANCE: f64 = 0.005;

/// Everything the schedule depends on; also the memo key.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ProjectionInputs {
    pub capital: Option<f64>,
    pub term_months: Option<u32>,
    pub monthly_rate_pct: Option<f64>,
    pub start_date: Option<NaiveDate>,
    pub pay_day: Option<u32>,
}

impl ProjectionInputs {
    /// Inputs taken from the proposal; missing capital falls back to `fallback_capital`.
    pub fn from_proposal(proposal: &ProposalSection, fallback_capital: f64) -> Self {
        let capital = proposal
            .capital
            .or((fallback_capital > 0.0).then_some(fallback_capital));

        Self {
            capital,
            term_months: proposal.term_months,
            monthly_rate_pct: proposal.rates.monthly_rate(),
            start_date: proposal.start_date,
            pay_day: proposal.pay_day,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct InstallmentRow {
    pub period: u32,
    pub date: NaiveDate,
    pub balance: f64,
    pub principal: f64,
    pub interest: f64,
    pub payment: f64,
    pub new_balance: f64,
}

/// Period-by-period amortization schedule. Empty means "nothing to display".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Projection {
    pub rows: Vec<InstallmentRow>,
}

impl Projection {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn total_principal(&self) -> f64 {
        self.rows.iter().map(|row| row.principal).sum()
    }

    pub fn total_interest(&self) -> f64 {
        self.rows.iter().map(|row| row.interest).sum()
    }

    pub fn installment(&self) -> Option<f64> {
        self.rows.first().map(|row| row.payment)
    }

    /// Render as CSV with two-decimal amounts.
    pub fn to_csv(&self) -> Result<String, ProjectionExportError> {
        let mut writer = csv::Writer::from_writer(Vec::new());
        writer.write_record([
            "period",
            "date",
            "balance",
            "principal",
            "interest",
            "payment",
            "new_balance",
        ])?;

        for row in &self.rows {
            writer.write_record([
                row.period.to_string(),
                row.date.format("%Y-%m-%d").to_string(),
                format!("{:.2}", row.balance),
                format!("{:.2}", row.principal),
                format!("{:.2}", row.interest),
                format!("{:.2}", row.payment),
                format!("{:.2}", row.new_balance),
            ])?;
        }

        let bytes = writer
            .into_inner()
            .map_err(|err| ProjectionExportError::Flush(err.to_string()))?;
        String::from_utf8(bytes).map_err(|err| ProjectionExportError::Flush(err.to_string()))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ProjectionExportError {
    #[error(transparent)]
    Csv(#[from] csv::Error),
    #[error("failed to flush projection export: {0}")]
    Flush(String),
}

/// French-system amortization. Missing or invalid inputs yield an empty projection
/// rather than an error.
pub fn build_projection(inputs: &ProjectionInputs) -> Projection {
    let (Some(capital), Some(term), Some(rate_pct), Some(start), Some(pay_day)) = (
        inputs.capital,
        inputs.term_months,
        inputs.monthly_rate_pct,
        inputs.start_date,
        inputs.pay_day,
    ) else {
        return Projection::default();
    };

    if !capital.is_finite()
        || capital <= 0.0
        || term == 0
        || term > MAX_TERM_MONTHS
        || !rate_pct.is_finite()
        || rate_pct < 0.0
        || !(1..=31).contains(&pay_day)
    {
        return Projection::default();
    }

    let rate = rate_pct / 100.0;
    let payment = level_payment(capital, rate, term);

    let mut rows = Vec::with_capacity(term as usize);
    let mut balance = capital;
    for period in 1..=term {
        let Some(date) = installment_date(start, period - 1, pay_day) else {
            return Projection::default();
        };

        let interest = balance * rate;
        let principal = payment - interest;
        let mut new_balance = (balance - principal).max(0.0);
        if period == term && new_balance < BALANCE_TOLERANCE {
            new_balance = 0.0;
        }

        rows.push(InstallmentRow {
            period,
            date,
            balance,
            principal,
            interest,
            payment,
            new_balance,
        });
        balance = new_balance;
    }

    Projection { rows }
}

/// Constant installment for `term` periods at `rate`. The discount factor goes through
/// `ln_1p`/`exp_m1` so rates too small to move `1.0 + rate` still amortize evenly.
fn level_payment(capital: f64, rate: f64, term: u32) -> f64 {
    let even = capital / f64::from(term);
    if rate <= 0.0 {
        return even;
    }

    let discount = -(-f64::from(term) * rate.ln_1p()).exp_m1();
    let payment = capital * rate / discount;
    if discount > 0.0 && payment.is_finite() {
        payment
    } else {
        even
    }
}

/// `start + offset` months, with the day set to `pay_day` clamped to the month length.
pub fn installment_date(start: NaiveDate, offset: u32, pay_day: u32) -> Option<NaiveDate> {
    let month_start = start
        .with_day(1)?
        .checked_add_months(Months::new(offset))?;
    let next_month = month_start.checked_add_months(Months::new(1))?;
    let days_in_month = u32::try_from((next_month - month_start).num_days()).ok()?;
    month_start.with_day(pay_day.min(days_in_month))
}
