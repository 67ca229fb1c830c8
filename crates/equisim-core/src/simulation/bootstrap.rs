use chrono::NaiveDate;
use rand::rngs::StdRng;
use rand::Rng;
use rand::SeedableRng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::error::EquisimError;
use crate::summary::statistics::{histogram, summarize, HistogramBin, PriceSummary};
use crate::types::{with_metadata_f64, ComputationOutput};
use crate::EquisimResult;

use super::returns::ReturnsSeries;

pub const DEFAULT_SIMULATIONS: u32 = 1_000;
/// One trading year.
pub const DEFAULT_HORIZON: u32 = 252;

const SMALL_POPULATION: usize = 30;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Serde-friendly simulation request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationInput {
    pub returns: ReturnsSeries,
    #[serde(default = "default_simulations")]
    pub n_simulations: u32,
    /// Trading days per path.
    #[serde(default = "default_horizon")]
    pub horizon: u32,
    pub initial_price: f64,
    /// Optional seed for reproducibility.
    #[serde(default)]
    pub seed: Option<u64>,
    #[serde(default = "default_bins")]
    pub histogram_bins: usize,
}

fn default_simulations() -> u32 {
    DEFAULT_SIMULATIONS
}

fn default_horizon() -> u32 {
    DEFAULT_HORIZON
}

fn default_bins() -> usize {
    crate::summary::statistics::DEFAULT_HISTOGRAM_BINS
}

/// One completed simulation: parameters, terminal prices and their summary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationRun {
    pub n_simulations: u32,
    pub horizon: u32,
    pub initial_price: f64,
    pub seed: Option<u64>,
    /// Valid observations the draws were taken from
    pub population_size: usize,
    /// Arithmetic mean of the valid daily returns
    pub mean_daily_return: Option<f64>,
    /// First and last observation dates of the history
    pub history_start: Option<NaiveDate>,
    pub history_end: Option<NaiveDate>,
    pub final_prices: Vec<f64>,
    pub summary: PriceSummary,
    pub histogram: Vec<HistogramBin>,
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Bootstrap terminal prices by resampling historical daily returns.
///
/// Each trial draws `horizon` returns uniformly with replacement from the
/// cleaned population and compounds them from `initial_price`. Trials get
/// their own generator, seeded from a master generator, and run in parallel.
/// Output order follows trial order, so a fixed `seed` gives identical
/// results on any thread count.
pub fn simulate(
    returns: &ReturnsSeries,
    n_simulations: u32,
    horizon: u32,
    initial_price: f64,
    seed: Option<u64>,
) -> EquisimResult<Vec<f64>> {
    let population = returns.cleaned();
    validate(&population, n_simulations, horizon, initial_price)?;

    let mut master = match seed {
        Some(s) => StdRng::seed_from_u64(s),
        None => StdRng::from_entropy(),
    };
    let trial_seeds: Vec<u64> = (0..n_simulations).map(|_| master.gen()).collect();

    let final_prices = trial_seeds
        .into_par_iter()
        .map(|trial_seed| {
            let mut rng = StdRng::seed_from_u64(trial_seed);
            resample_path(&mut rng, &population, horizon, initial_price)
        })
        .collect();

    Ok(final_prices)
}

/// Compound `draws` in order: `p_t = p_{t-1} * (1 + r_t)`.
pub fn compound_path<I>(initial_price: f64, draws: I) -> f64
where
    I: IntoIterator<Item = f64>,
{
    draws
        .into_iter()
        .fold(initial_price, |price, r| price * (1.0 + r))
}

/// Run a simulation and summarize its terminal prices.
pub fn run_simulation(input: &SimulationInput) -> EquisimResult<ComputationOutput<SimulationRun>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    let population_size = input.returns.cleaned().len();
    let dropped = input.returns.dropped_count();
    if dropped > 0 {
        warnings.push(format!(
            "{dropped} missing or non-finite returns dropped before resampling"
        ));
    }
    if population_size > 0 && population_size < SMALL_POPULATION {
        warnings.push(format!(
            "Only {population_size} valid returns; the bootstrap distribution will be coarse"
        ));
    }

    let final_prices = simulate(
        &input.returns,
        input.n_simulations,
        input.horizon,
        input.initial_price,
        input.seed,
    )?;
    let summary = summarize(&final_prices)?;
    let histogram = histogram(&final_prices, input.histogram_bins)?;
    let mean_daily_return = input.returns.mean_return();
    let (history_start, history_end) = input.returns.date_range().unzip();

    tracing::debug!(
        n_simulations = input.n_simulations,
        horizon = input.horizon,
        population_size,
        ?mean_daily_return,
        mean = summary.mean,
        "bootstrap simulation complete"
    );

    let output = SimulationRun {
        n_simulations: input.n_simulations,
        horizon: input.horizon,
        initial_price: input.initial_price,
        seed: input.seed,
        population_size,
        mean_daily_return,
        history_start,
        history_end,
        final_prices,
        summary,
        histogram,
    };

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata_f64(
        "Historical bootstrap of daily returns",
        &serde_json::json!({
            "n_simulations": input.n_simulations,
            "horizon": input.horizon,
            "initial_price": input.initial_price,
            "seed": input.seed,
            "observations": input.returns.len(),
            "histogram_bins": input.histogram_bins,
        }),
        warnings,
        elapsed,
        output,
    ))
}

// ---------------------------------------------------------------------------
// Internal helpers
// ---------------------------------------------------------------------------

fn validate(
    population: &[f64],
    n_simulations: u32,
    horizon: u32,
    initial_price: f64,
) -> EquisimResult<()> {
    if population.is_empty() {
        return Err(EquisimError::simulation(
            "returns",
            "No valid return observations to resample",
        ));
    }
    if n_simulations == 0 {
        return Err(EquisimError::simulation(
            "n_simulations",
            "Must be at least 1",
        ));
    }
    if horizon == 0 {
        return Err(EquisimError::simulation("horizon", "Must be at least 1"));
    }
    if !initial_price.is_finite() || initial_price <= 0.0 {
        return Err(EquisimError::simulation(
            "initial_price",
            format!("Must be positive and finite, got {initial_price}"),
        ));
    }
    Ok(())
}

/// `population` must be non-empty.
fn resample_path<R: Rng + ?Sized>(
    rng: &mut R,
    population: &[f64],
    horizon: u32,
    initial_price: f64,
) -> f64 {
    let draws = (0..horizon).map(|_| population[rng.gen_range(0..population.len())]);
    compound_path(initial_price, draws)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
