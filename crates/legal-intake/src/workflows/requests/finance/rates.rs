use serde::{Deserialize, Serialize};

/// Two rate values closer than this are considered equal, which stops the
/// annual ⇄ monthly write-back from bouncing between the fields forever.
pub const RATE_EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RateDirection {
    AnnualToMonthly,
    MonthlyToAnnual,
}

#[derive(Debug, Clone, Copy, PartialEq, thiserror::Error)]
#[error("rate {value}% is outside the convertible domain (must be finite and above -100%)")]
pub struct RateError {
    pub value: f64,
}

/// Effective-annual ⇄ nominal-monthly conversion, both in percent.
pub fn convert_rate(value: f64, direction: RateDirection) -> Result<f64, RateError> {
    if !value.is_finite() || value <= -100.0 {
        return Err(RateError { value });
    }

    let factor = 1.0 + value / 100.0;
    let converted = match direction {
        RateDirection::AnnualToMonthly => factor.powf(1.0 / 12.0),
        RateDirection::MonthlyToAnnual => factor.powi(12),
    };
    Ok((converted - 1.0) * 100.0)
}

/// The proposal's interest rate, held in both representations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RatePair {
    #[serde(default)]
    pub effective_annual: Option<f64>,
    #[serde(default)]
    pub monthly: Option<f64>,
}

impl RatePair {
    /// Edit the effective-annual rate. Returns whether the monthly counterpart was rewritten.
    pub fn set_effective_annual(&mut self, value: f64) -> Result<bool, RateError> {
        let monthly = convert_rate(value, RateDirection::AnnualToMonthly)?;
        self.effective_annual = Some(value);
        Ok(write_if_changed(&mut self.monthly, monthly))
    }

    /// Edit the monthly rate. Returns whether the effective-annual counterpart was rewritten.
    pub fn set_monthly(&mut self, value: f64) -> Result<bool, RateError> {
        let annual = convert_rate(value, RateDirection::MonthlyToAnnual)?;
        self.monthly = Some(value);
        Ok(write_if_changed(&mut self.effective_annual, annual))
    }

    /// Monthly rate used by the projection, derived from the annual one if needed.
    pub fn monthly_rate(&self) -> Option<f64> {
        self.monthly.or_else(|| {
            self.effective_annual
                .and_then(|annual| convert_rate(annual, RateDirection::AnnualToMonthly).ok())
        })
    }
}

fn write_if_changed(slot: &mut Option<f64>, value: f64) -> bool {
    match slot {
        Some(current) if (*current - value).abs() <= RATE_EPSILON => false,
        _ => {
            *slot = Some(value);
            true
        }
    }
}
