//! Keeps a debt's elapsed-overdue-days and due date consistent, and owns the
//! categorical "more than 90 days overdue" rule.

use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};

use super::dates::lenient_date_opt;
use super::domain::Debt;

/// Elapsed days must exceed this for the over-90 category to be accepted.
pub const OVERDUE_CATEGORY_THRESHOLD_DAYS: i64 = 90;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoraState {
    /// Hidden (None) while the over-90 category is authoritative.
    #[serde(default)]
    pub elapsed_days: Option<u32>,
    #[serde(default, with = "lenient_date_opt")]
    pub due_date: Option<NaiveDate>,
    #[serde(default)]
    pub over_90: bool,
    /// Field-level message left by a refused over-90 toggle.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rejection: Option<String>,
}

impl MoraState {
    /// Elapsed days as currently derivable from either field.
    pub fn derived_elapsed_days(&self, today: NaiveDate) -> Option<i64> {
        self.elapsed_days
            .map(i64::from)
            .or_else(|| self.due_date.map(|due| days_overdue(due, today)))
    }

    pub fn exact_days_enabled(&self) -> bool {
        !self.over_90
    }

    /// False when the over-90 category is set but the due date puts the debt at 90 days
    /// or fewer. A category without a due date stands on its own.
    pub fn category_holds(&self, today: NaiveDate) -> bool {
        !self.over_90
            || self
                .due_date
                .map_or(true, |due| days_overdue(due, today) > OVERDUE_CATEGORY_THRESHOLD_DAYS)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MoraError {
    #[error("overdue details only apply to debts marked as overdue")]
    NotOverdue,
    #[error("the exact day count is disabled while the debt is categorised as more than 90 days overdue")]
    CategoryAuthoritative,
    #[error("a debt can only be marked as more than {threshold} days overdue when it is (currently {elapsed} days)")]
    CategoryRejected { elapsed: i64, threshold: i64 },
}

fn days_overdue(due: NaiveDate, today: NaiveDate) -> i64 {
    if due < today {
        (today - due).num_days()
    } else {
        0
    }
}

/// Bidirectional derivation between `elapsed_days` and `due_date`, evaluated against
/// a fixed "today".
#[derive(Debug, Clone, Copy)]
pub struct MoraDateReconciler {
    today: NaiveDate,
}

impl MoraDateReconciler {
    pub fn new(today: NaiveDate) -> Self {
        Self { today }
    }

    pub fn today(&self) -> NaiveDate {
        self.today
    }

    /// Turning the overdue flag off clears every derived mora field.
    pub fn set_overdue(&self, debt: &mut Debt, overdue: bool) {
        debt.overdue = overdue;
        if !overdue {
            debt.mora = MoraState::default();
        }
    }

    pub fn set_elapsed_days(&self, debt: &mut Debt, days: u32) -> Result<(), MoraError> {
        if !debt.overdue {
            return Err(MoraError::NotOverdue);
        }
        if debt.mora.over_90 {
            return Err(MoraError::CategoryAuthoritative);
        }

        debt.mora.elapsed_days = Some(days);
        debt.mora.due_date = self.today.checked_sub_days(Days::new(u64::from(days)));
        Ok(())
    }

    /// A due date too recent for the over-90 category withdraws it and brings the exact
    /// day count back.
    pub fn set_due_date(&self, debt: &mut Debt, due_date: NaiveDate) -> Result<(), MoraError> {
        if !debt.overdue {
            return Err(MoraError::NotOverdue);
        }

        debt.mora.due_date = Some(due_date);
        if !debt.mora.category_holds(self.today) {
            debt.mora.over_90 = false;
        }
        if debt.mora.exact_days_enabled() {
            let elapsed = days_overdue(due_date, self.today);
            debt.mora.elapsed_days = Some(u32::try_from(elapsed).unwrap_or(u32::MAX));
        }
        Ok(())
    }

    /// Request or withdraw the over-90 category. A refused request leaves the flag
    /// false and records a field-level rejection on the debt.
    pub fn set_over_90(&self, debt: &mut Debt, requested: bool) -> Result<(), MoraError> {
        if !debt.overdue {
            return Err(MoraError::NotOverdue);
        }

        let mora = &mut debt.mora;
        if !requested {
            mora.over_90 = false;
            mora.rejection = None;
            mora.elapsed_days = mora
                .due_date
                .map(|due| u32::try_from(days_overdue(due, self.today)).unwrap_or(u32::MAX));
            return Ok(());
        }

        let elapsed = mora.derived_elapsed_days(self.today).unwrap_or(0);
        if elapsed > OVERDUE_CATEGORY_THRESHOLD_DAYS {
            mora.over_90 = true;
            mora.elapsed_days = None;
            mora.rejection = None;
            Ok(())
        } else {
            let error = MoraError::CategoryRejected {
                elapsed,
                threshold: OVERDUE_CATEGORY_THRESHOLD_DAYS,
            };
            mora.over_90 = false;
            mora.rejection = Some(error.to_string());
            Err(error)
        }
    }
}
