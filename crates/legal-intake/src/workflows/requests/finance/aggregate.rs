use serde::{Deserialize, Serialize};

use super::super::domain::Debt;

const DEFAULT_MIN_DEBTS: usize = 2;
const DEFAULT_OVERDUE_SHARE_THRESHOLD_PCT: f64 = 30.0;

/// Totals over the current debt collection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct DebtAggregate {
    pub debt_count: usize,
    pub total_capital: f64,
    pub capital_overdue: f64,
    pub interest_overdue_total: f64,
    /// Percentage of total capital held by overdue debts; zero when there is no capital.
    pub overdue_share_pct: f64,
}

pub fn aggregate(debts: &[Debt]) -> DebtAggregate {
    let mut totals = DebtAggregate {
        debt_count: debts.len(),
        ..DebtAggregate::default()
    };

    for debt in debts {
        totals.total_capital += debt.capital;
        if debt.overdue {
            totals.capital_overdue += debt.capital;
            totals.interest_overdue_total += debt.default_interest.unwrap_or(0.0);
        }
    }

    totals.overdue_share_pct = if totals.total_capital > 0.0 {
        totals.capital_overdue / totals.total_capital * 100.0
    } else {
        0.0
    };

    totals
}

/// Thresholds of the insolvency eligibility predicate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EligibilityPolicy {
    min_debts: usize,
    overdue_share_threshold_pct: f64,
}

impl EligibilityPolicy {
    pub fn new(min_debts: usize, overdue_share_threshold_pct: f64) -> Self {
        let threshold = if overdue_share_threshold_pct.is_finite()
            && (0.0..=100.0).contains(&overdue_share_threshold_pct)
        {
            overdue_share_threshold_pct
        } else {
            DEFAULT_OVERDUE_SHARE_THRESHOLD_PCT
        };

        Self {
            min_debts,
            overdue_share_threshold_pct: threshold,
        }
    }

    pub fn min_debts(&self) -> usize {
        self.min_debts
    }

    pub fn overdue_share_threshold_pct(&self) -> f64 {
        self.overdue_share_threshold_pct
    }
}

impl Default for EligibilityPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_DEBTS, DEFAULT_OVERDUE_SHARE_THRESHOLD_PCT)
    }
}

/// Derived, never persisted. Recomputed from the debt list on every change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Eligibility {
    pub enough_debts: bool,
    pub has_overdue_capital: bool,
    pub overdue_share_exceeded: bool,
    pub eligible: bool,
}

impl Eligibility {
    pub fn summary(&self, policy: &EligibilityPolicy) -> String {
        if self.eligible {
            return "eligible for the insolvency process".to_string();
        }

        let mut missing = Vec::new();
        if !self.enough_debts {
            missing.push(format!("at least {} debts", policy.min_debts()));
        }
        if !self.has_overdue_capital {
            missing.push("at least one overdue debt".to_string());
        }
        if !self.overdue_share_exceeded {
            missing.push(format!(
                "overdue capital above {:.0}% of the total",
                policy.overdue_share_threshold_pct()
            ));
        }
        format!("not eligible: requires {}", missing.join(", "))
    }
}

pub fn eligibility(totals: &DebtAggregate, policy: &EligibilityPolicy) -> Eligibility {
    let enough_debts = totals.debt_count >= policy.min_debts();
    let has_overdue_capital = totals.capital_overdue > 0.0;
    let overdue_share_exceeded = totals.overdue_share_pct > policy.overdue_share_threshold_pct();

    Eligibility {
        enough_debts,
        has_overdue_capital,
        overdue_share_exceeded,
        eligible: enough_debts && has_overdue_capital && overdue_share_exceeded,
    }
}
