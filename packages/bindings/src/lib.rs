use napi::Result as NapiResult;
use napi_derive::napi;
use rust_decimal::Decimal;
use serde::Deserialize;

use equisim_core::valuation::{PeerMultiple, ValuationSource};

/// Convert any Display error into a napi::Error.
fn to_napi_error(e: impl std::fmt::Display) -> napi::Error {
    napi::Error::from_reason(e.to_string())
}

fn parse<T: serde::de::DeserializeOwned>(input_json: &str) -> NapiResult<T> {
    serde_json::from_str(input_json).map_err(to_napi_error)
}

fn to_json(value: &impl serde::Serialize) -> NapiResult<String> {
    serde_json::to_string(value).map_err(to_napi_error)
}

// ---------------------------------------------------------------------------
// Valuation
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct SensitivityBindingInput {
    valuation: ValuationSource,
    rate_range: Vec<Decimal>,
    growth_range: Vec<Decimal>,
}

#[derive(Deserialize)]
struct PeersBindingInput {
    valuation: ValuationSource,
    peers: Vec<PeerMultiple>,
}

#[derive(Deserialize)]
struct RateProfileBindingInput {
    valuation: ValuationSource,
    rates: Vec<Decimal>,
}

#[napi]
pub fn compute_valuation(input_json: String) -> NapiResult<String> {
    let source: ValuationSource = parse(&input_json)?;
    let inputs = source.into_inputs().map_err(to_napi_error)?;
    let output =
        equisim_core::valuation::compute_valuation(&inputs).map_err(to_napi_error)?;
    to_json(&output)
}

#[napi]
pub fn compute_sensitivity(input_json: String) -> NapiResult<String> {
    let input: SensitivityBindingInput = parse(&input_json)?;
    let inputs = input.valuation.into_inputs().map_err(to_napi_error)?;
    let output = equisim_core::valuation::compute_sensitivity(
        &inputs,
        &input.rate_range,
        &input.growth_range,
    )
    .map_err(to_napi_error)?;
    to_json(&output)
}

#[napi]
pub fn compute_peer_comparison(input_json: String) -> NapiResult<String> {
    let input: PeersBindingInput = parse(&input_json)?;
    let inputs = input.valuation.into_inputs().map_err(to_napi_error)?;
    let output = equisim_core::valuation::compute_peer_comparison(&inputs, &input.peers)
        .map_err(to_napi_error)?;
    to_json(&output)
}

#[napi]
pub fn compute_discount_rate_profile(input_json: String) -> NapiResult<String> {
    let input: RateProfileBindingInput = parse(&input_json)?;
    let inputs = input.valuation.into_inputs().map_err(to_napi_error)?;
    let output = equisim_core::valuation::compute_discount_rate_profile(&inputs, &input.rates)
        .map_err(to_napi_error)?;
    to_json(&output)
}

#[napi]
pub fn calculate_wacc(input_json: String) -> NapiResult<String> {
    let input: equisim_core::valuation::wacc::WaccInput = parse(&input_json)?;
    let output =
        equisim_core::valuation::wacc::calculate_wacc(&input).map_err(to_napi_error)?;
    to_json(&output)
}

// ---------------------------------------------------------------------------
// Simulation
// ---------------------------------------------------------------------------

#[napi]
pub fn run_simulation(input_json: String) -> NapiResult<String> {
    let input: equisim_core::simulation::SimulationInput = parse(&input_json)?;
    let output = equisim_core::simulation::run_simulation(&input).map_err(to_napi_error)?;
    to_json(&output)
}

/// Terminal prices only, as a JSON array.
#[napi]
pub fn simulate(input_json: String) -> NapiResult<String> {
    let input: equisim_core::simulation::SimulationInput = parse(&input_json)?;
    let prices = equisim_core::simulation::simulate(
        &input.returns,
        input.n_simulations,
        input.horizon,
        input.initial_price,
        input.seed,
    )
    .map_err(to_napi_error)?;
    to_json(&prices)
}

#[napi]
pub fn compound_path(initial_price: f64, draws_json: String) -> NapiResult<f64> {
    let draws: Vec<f64> = parse(&draws_json)?;
    Ok(equisim_core::simulation::compound_path(initial_price, draws))
}

// ---------------------------------------------------------------------------
// Summaries
// ---------------------------------------------------------------------------

#[napi]
pub fn summarize(prices_json: String) -> NapiResult<String> {
    let prices: Vec<f64> = parse(&prices_json)?;
    let summary = equisim_core::summary::summarize(&prices).map_err(to_napi_error)?;
    to_json(&summary)
}

#[napi]
pub fn histogram(prices_json: String, bins: u32) -> NapiResult<String> {
    let prices: Vec<f64> = parse(&prices_json)?;
    let bins =
        equisim_core::summary::histogram(&prices, bins as usize).map_err(to_napi_error)?;
    to_json(&bins)
}

#[napi]
pub fn summarize_grid(grid_json: String) -> NapiResult<String> {
    let grid: equisim_core::valuation::SensitivityGrid = parse(&grid_json)?;
    to_json(&equisim_core::summary::summarize_grid(&grid))
}
