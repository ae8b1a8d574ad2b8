//! Pure financial derivations over the debt collection and proposal inputs.

mod aggregate;
mod capacity;
mod memo;
mod projection;
mod rates;

pub use aggregate::{aggregate, eligibility, DebtAggregate, Eligibility, EligibilityPolicy};
pub use capacity::{capacity_for, capacity_to_pay, CapacityToPay};
pub use memo::Memo;
pub use projection::{
    build_projection, installment_date, InstallmentRow, Projection, ProjectionExportError,
    ProjectionInputs,
};
pub use rates::{convert_rate, RateDirection, RateError, RatePair, RATE_EPSILON};

use serde::Serialize;

use super::domain::{Debt, FormDocument, IncomeSection, RequestKind};

/// Stateless calculator bound to an eligibility policy.
#[derive(Debug, Clone, Copy, Default)]
pub struct FinancialCalculator {
    policy: EligibilityPolicy,
}

impl FinancialCalculator {
    pub fn new(policy: EligibilityPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &EligibilityPolicy {
        &self.policy
    }

    pub fn aggregate(&self, debts: &[Debt]) -> DebtAggregate {
        aggregate(debts)
    }

    pub fn assess(&self, debts: &[Debt]) -> DebtAssessment {
        let totals = aggregate(debts);
        let eligibility = eligibility(&totals, &self.policy);
        DebtAssessment {
            summary: eligibility.summary(&self.policy),
            totals,
            eligibility,
        }
    }

    pub fn convert_rate(&self, value: f64, direction: RateDirection) -> Result<f64, RateError> {
        convert_rate(value, direction)
    }

    pub fn projection(&self, inputs: &ProjectionInputs) -> Projection {
        build_projection(inputs)
    }

    pub fn capacity(&self, income: &IncomeSection) -> CapacityToPay {
        capacity_for(income)
    }
}

/// Aggregate plus the eligibility verdict computed from it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DebtAssessment {
    pub totals: DebtAggregate,
    pub eligibility: Eligibility,
    pub summary: String,
}

/// Memoized derived values of one editing session. Each cell is keyed on the exact
/// inputs it reads, so refreshing after an unrelated mutation recomputes nothing.
#[derive(Debug, Clone, Default)]
pub struct Derivations {
    debts: Memo<Vec<Debt>, DebtAssessment>,
    projection: Memo<ProjectionInputs, Projection>,
    capacity: Memo<IncomeSection, CapacityToPay>,
}

impl Derivations {
    pub fn refresh(&mut self, calculator: &FinancialCalculator, document: &FormDocument) {
        if document.kind != RequestKind::Insolvency {
            return;
        }

        let debts = document.debts.as_slice().to_vec();
        let total_capital = self
            .debts
            .get_or_compute(&debts, |debts| calculator.assess(debts))
            .totals
            .total_capital;

        let inputs = ProjectionInputs::from_proposal(&document.proposal, total_capital);
        self.projection
            .get_or_compute(&inputs, |inputs| calculator.projection(inputs));

        self.capacity
            .get_or_compute(&document.income, |income| calculator.capacity(income));
    }

    pub fn assessment(&self) -> Option<&DebtAssessment> {
        self.debts.value()
    }

    pub fn projection(&self) -> Option<&Projection> {
        self.projection.value()
    }

    pub fn capacity(&self) -> Option<&CapacityToPay> {
        self.capacity.value()
    }

    /// Total number of derivation runs across all cells.
    pub fn computations(&self) -> u64 {
        self.debts.computations() + self.projection.computations() + self.capacity.computations()
    }
}
