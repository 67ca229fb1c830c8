use chrono::NaiveDate;
use clap::Args;
use serde_json::Value;

use equisim_core::simulation::{
    run_simulation, ReturnsSeries, SimulationInput, DEFAULT_HORIZON, DEFAULT_SIMULATIONS,
};
use equisim_core::summary::DEFAULT_HISTOGRAM_BINS;

use crate::input;

/// Arguments for the bootstrap share-price simulation
#[derive(Args)]
pub struct SimulateArgs {
    /// Full simulation document (returns plus parameters); flags are ignored when given
    #[arg(long)]
    pub input: Option<String>,

    /// Returns series document ({"observations": [{"date", "value"}]})
    #[arg(long, conflicts_with = "closes")]
    pub returns: Option<String>,

    /// Dated closing prices ([["2024-01-02", 101.5], ...]); daily returns are derived
    #[arg(long)]
    pub closes: Option<String>,

    /// Number of simulated paths
    #[arg(long, default_value_t = DEFAULT_SIMULATIONS)]
    pub simulations: u32,

    /// Trading days per path
    #[arg(long, default_value_t = DEFAULT_HORIZON)]
    pub horizon: u32,

    /// Starting share price
    #[arg(long)]
    pub initial_price: Option<f64>,

    /// Seed for reproducible runs
    #[arg(long)]
    pub seed: Option<u64>,

    /// Histogram bin count
    #[arg(long, default_value_t = DEFAULT_HISTOGRAM_BINS)]
    pub bins: usize,

    /// Keep every simulated terminal price in the output
    #[arg(long)]
    pub prices: bool,
}

pub fn run_simulate(args: SimulateArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let returns = match (args.returns.as_deref(), args.closes.as_deref()) {
        (Some(path), _) => Some(input::file::read_document::<ReturnsSeries>(path)?),
        (None, Some(path)) => {
            let closes: Vec<(NaiveDate, Option<f64>)> = input::file::read_document(path)?;
            Some(ReturnsSeries::from_prices(&closes)?)
        }
        (None, None) => None,
    };

    let sim_input: SimulationInput = match (args.input.as_deref(), returns) {
        (Some(path), _) => input::file::read_document(path)?,
        (None, Some(returns)) => SimulationInput {
            returns,
            n_simulations: args.simulations,
            horizon: args.horizon,
            initial_price: args
                .initial_price
                .ok_or("--initial-price is required with --returns or --closes")?,
            seed: args.seed,
            histogram_bins: args.bins,
        },
        (None, None) => input::load(None)?.ok_or(
            "--input <file>, --returns <file> or --closes <file> (or piped JSON on stdin) is required",
        )?,
    };

    let result = run_simulation(&sim_input)?;
    let mut value = serde_json::to_value(&result)?;

    if let Value::Object(ref mut map) = value {
        if !args.prices {
            if let Some(Value::Object(run)) = map.get_mut("result") {
                run.remove("final_prices");
            }
        }
        map.insert(
            "rows".into(),
            serde_json::to_value(&result.result.histogram)?,
        );
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args_with_closes(path: &str) -> SimulateArgs {
        SimulateArgs {
            input: None,
            returns: None,
            closes: Some(path.into()),
            simulations: 200,
            horizon: 1,
            initial_price: Some(50.0),
            seed: Some(42),
            bins: 10,
            prices: true,
        }
    }

    #[test]
    fn test_simulate_from_closing_prices() {
        let path = std::env::temp_dir().join(format!("equisim-closes-{}.json", std::process::id()));
        std::fs::write(
            &path,
            r#"[["2024-01-02", 100.0], ["2024-01-03", 102.0], ["2024-01-04", null], ["2024-01-05", 99.0]]"#,
        )
        .unwrap();

        let value = run_simulate(args_with_closes(path.to_str().unwrap())).unwrap();
        std::fs::remove_file(&path).ok();

        let run = &value["result"];
        // Only 100 -> 102 survives; both neighbours of the gap are dropped
        assert_eq!(run["population_size"], 1);
        let prices = run["final_prices"].as_array().unwrap();
        assert_eq!(prices.len(), 200);
        assert!(prices
            .iter()
            .all(|p| (p.as_f64().unwrap() - 51.0).abs() < 1e-9));
        assert_eq!(run["history_start"], "2024-01-03");
    }

    #[test]
    fn test_closes_without_initial_price_rejected() {
        let path = std::env::temp_dir().join(format!("equisim-nostart-{}.json", std::process::id()));
        std::fs::write(&path, r#"[["2024-01-02", 100.0], ["2024-01-03", 101.0]]"#).unwrap();

        let mut args = args_with_closes(path.to_str().unwrap());
        args.initial_price = None;
        let err = run_simulate(args).unwrap_err();
        std::fs::remove_file(&path).ok();
        assert!(err.to_string().contains("--initial-price"));
    }
}
