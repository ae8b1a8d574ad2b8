use serde::{Deserialize, Serialize};

use super::super::domain::IncomeSection;

/// Income minus expenses. The raw figure may be negative; the displayed one is floored at zero.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CapacityToPay {
    pub income: f64,
    pub expenses: f64,
    pub raw: f64,
    pub displayed: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

pub fn capacity_to_pay(income: f64, expenses: &[f64]) -> CapacityToPay {
    let total_expenses: f64 = expenses.iter().sum();
    let raw = income - total_expenses;
    let warning = (raw < 0.0).then(|| {
        format!(
            "declared expenses exceed income by {:.2}; the proposal cannot be funded from income",
            -raw
        )
    });

    CapacityToPay {
        income,
        expenses: total_expenses,
        raw,
        displayed: raw.max(0.0),
        warning,
    }
}

pub fn capacity_for(section: &IncomeSection) -> CapacityToPay {
    let expenses: Vec<f64> = section
        .expenses
        .entries()
        .iter()
        .map(|(_, amount)| *amount)
        .collect();
    capacity_to_pay(section.monthly_income.unwrap_or(0.0), &expenses)
}
