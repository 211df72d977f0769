use serde::Serialize;

use super::error::SimulationError;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationParameters {
    pub initial_portfolio: f64,
    pub expected_return: f64,
    pub volatility: f64,
    pub initial_withdrawal: f64,
    pub inflation_rate: f64,
    pub horizon_years: u32,
    pub trial_count: u32,
}

impl SimulationParameters {
    /// Checks every input invariant; the engine calls this before drawing anything.
    pub fn validate(&self) -> Result<(), SimulationError> {
        for (field, value) in [
            ("initial_portfolio", self.initial_portfolio),
            ("expected_return", self.expected_return),
            ("volatility", self.volatility),
            ("initial_withdrawal", self.initial_withdrawal),
            ("inflation_rate", self.inflation_rate),
        ] {
            if !value.is_finite() {
                return Err(SimulationError::invalid(field, "must be finite"));
            }
        }

        if self.initial_portfolio < 0.0 {
            return Err(SimulationError::invalid("initial_portfolio", "must be >= 0"));
        }
        if self.volatility < 0.0 {
            return Err(SimulationError::invalid("volatility", "must be >= 0"));
        }
        if self.initial_withdrawal < 0.0 {
            return Err(SimulationError::invalid("initial_withdrawal", "must be >= 0"));
        }
        if self.horizon_years == 0 {
            return Err(SimulationError::invalid("horizon_years", "must be >= 1"));
        }
        if self.trial_count == 0 {
            return Err(SimulationError::invalid("trial_count", "must be >= 1"));
        }

        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrialOutcome {
    pub ending_balance: f64,
}

impl TrialOutcome {
    pub fn depleted(self) -> bool {
        self.ending_balance == 0.0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationReport {
    pub ending_balances: Vec<f64>,
    pub depleted_trials: u32,
    pub depletion_fraction: f64,
    pub mean_balance: f64,
    pub min_balance: f64,
    pub max_balance: f64,
}

impl SimulationReport {
    pub fn trial_count(&self) -> usize {
        self.ending_balances.len()
    }

    pub fn depletion_percentage(&self) -> f64 {
        self.depletion_fraction * 100.0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistogramBin {
    pub lower: f64,
    pub upper: f64,
    pub count: u32,
}
