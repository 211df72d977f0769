use rayon::iter::{IntoParallelIterator, ParallelIterator};

use super::error::SimulationError;
use super::random::{NormalReturns, ReturnSource};
use super::types::{SimulationParameters, SimulationReport, TrialOutcome};

/// Runs every trial from one shared stream of return draws, in trial order.
pub fn run<S: ReturnSource + ?Sized>(
    params: &SimulationParameters,
    returns: &mut S,
) -> Result<SimulationReport, SimulationError> {
    params.validate()?;
    let outcomes = (0..params.trial_count).map(|_| simulate_trial(params, returns));
    Ok(summarize(outcomes))
}

pub fn run_unseeded(params: &SimulationParameters) -> Result<SimulationReport, SimulationError> {
    run(params, &mut NormalReturns::unseeded())
}

/// Sequential run where each trial draws from its own stream derived from `seed`.
pub fn run_seeded(
    params: &SimulationParameters,
    seed: u64,
) -> Result<SimulationReport, SimulationError> {
    params.validate()?;
    let outcomes = (0..params.trial_count)
        .map(|trial_index| simulate_trial(params, &mut NormalReturns::for_trial(seed, trial_index)));
    Ok(summarize(outcomes))
}

/// Same per-trial streams as [`run_seeded`], spread across the rayon pool.
/// Balances come back in trial order, so both runners produce equal reports.
pub fn run_parallel(
    params: &SimulationParameters,
    seed: u64,
) -> Result<SimulationReport, SimulationError> {
    params.validate()?;
    let outcomes: Vec<TrialOutcome> = (0..params.trial_count)
        .into_par_iter()
        .map(|trial_index| simulate_trial(params, &mut NormalReturns::for_trial(seed, trial_index)))
        .collect();
    Ok(summarize(outcomes))
}

fn simulate_trial<S: ReturnSource + ?Sized>(
    params: &SimulationParameters,
    returns: &mut S,
) -> TrialOutcome {
    let mut balance = params.initial_portfolio;
    let mut withdrawal = params.initial_withdrawal;

    for _year in 1..=params.horizon_years {
        let annual_return = returns.next_return(params.expected_return, params.volatility);
        balance *= 1.0 + annual_return;
        balance -= withdrawal;
        withdrawal *= 1.0 + params.inflation_rate;

        // Depletion is absorbing: the remaining years are never simulated.
        // An overflowed balance (inf - inf) is NaN and counts as depleted.
        if balance.is_nan() || balance <= 0.0 {
            balance = 0.0;
            break;
        }
    }

    TrialOutcome {
        ending_balance: balance,
    }
}

#[derive(Debug)]
struct Tally {
    ending_balances: Vec<f64>,
    depleted: u32,
    sum: f64,
    min: f64,
    max: f64,
}

impl Tally {
    fn new(expected: usize) -> Self {
        Self {
            ending_balances: Vec::with_capacity(expected),
            depleted: 0,
            sum: 0.0,
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
        }
    }

    fn push(mut self, outcome: TrialOutcome) -> Self {
        if outcome.depleted() {
            self.depleted += 1;
        }
        self.sum += outcome.ending_balance;
        self.min = self.min.min(outcome.ending_balance);
        self.max = self.max.max(outcome.ending_balance);
        self.ending_balances.push(outcome.ending_balance);
        self
    }

    fn into_report(self) -> SimulationReport {
        let trials = self.ending_balances.len();
        if trials == 0 {
            return SimulationReport {
                ending_balances: Vec::new(),
                depleted_trials: 0,
                depletion_fraction: 0.0,
                mean_balance: 0.0,
                min_balance: 0.0,
                max_balance: 0.0,
            };
        }

        // Rounding in the running sum can nudge the mean just past an extreme.
        let mean = (self.sum / trials as f64).max(self.min).min(self.max);
        SimulationReport {
            ending_balances: self.ending_balances,
            depleted_trials: self.depleted,
            depletion_fraction: self.depleted as f64 / trials as f64,
            mean_balance: mean,
            min_balance: self.min,
            max_balance: self.max,
        }
    }
}

fn summarize<I>(outcomes: I) -> SimulationReport
where
    I: IntoIterator<Item = TrialOutcome>,
{
    let outcomes = outcomes.into_iter();
    let tally = Tally::new(outcomes.size_hint().0);
    outcomes.fold(tally, Tally::push).into_report()
}
