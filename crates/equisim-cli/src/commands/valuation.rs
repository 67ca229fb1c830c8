use clap::{Args, ValueEnum};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Deserialize;
use serde_json::Value;

use equisim_core::summary::summarize_grid;
use equisim_core::types::SensitivityVariable;
use equisim_core::valuation::sensitivity::{
    centered_values, compute_discount_rate_profile, compute_sensitivity, sweep_values,
};
use equisim_core::valuation::wacc::{self, WaccInput};
use equisim_core::valuation::{
    compute_peer_comparison, compute_valuation, FinancialInputs, PeerMultiple, TerminalMethod,
    ValuationSource,
};

use crate::input;

const INPUT_REQUIRED: &str =
    "--input <file.json|file.yaml> or piped JSON on stdin is required (inputs or workbook)";

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum TerminalMethodArg {
    Perpetuity,
    Multiples,
}

impl From<TerminalMethodArg> for TerminalMethod {
    fn from(arg: TerminalMethodArg) -> Self {
        match arg {
            TerminalMethodArg::Perpetuity => TerminalMethod::Perpetuity,
            TerminalMethodArg::Multiples => TerminalMethod::Multiples,
        }
    }
}

/// Arguments for a single-point DCF valuation
#[derive(Args)]
pub struct ValuationArgs {
    /// Path to a valuation document: financial inputs or a workbook with a "DCF" sheet
    #[arg(long)]
    pub input: Option<String>,

    /// Terminal value that drives equity value (overrides the document)
    #[arg(long, value_enum)]
    pub terminal_method: Option<TerminalMethodArg>,

    /// Discount cash flows at mid-year
    #[arg(long)]
    pub mid_year: bool,
}

/// Arguments for the discount-rate x terminal-growth grid
#[derive(Args)]
#[command(allow_hyphen_values = true)]
pub struct SensitivityArgs {
    /// Path to a valuation document
    #[arg(long)]
    pub input: Option<String>,

    /// Explicit discount-rate samples (comma separated)
    #[arg(long, value_delimiter = ',')]
    pub rates: Vec<Decimal>,

    /// Explicit terminal-growth samples (comma separated)
    #[arg(long, value_delimiter = ',')]
    pub growth_rates: Vec<Decimal>,

    /// Lowest discount rate of a min..=max sweep (needs --rate-max)
    #[arg(long, requires = "rate_max")]
    pub rate_min: Option<Decimal>,

    #[arg(long, requires = "rate_min")]
    pub rate_max: Option<Decimal>,

    /// Lowest growth rate of a min..=max sweep (needs --growth-max)
    #[arg(long, requires = "growth_max")]
    pub growth_min: Option<Decimal>,

    #[arg(long, requires = "growth_min")]
    pub growth_max: Option<Decimal>,

    /// Discount-rate increment between samples
    #[arg(long, default_value = "0.01")]
    pub rate_step: Decimal,

    /// Growth-rate increment between samples
    #[arg(long, default_value = "0.005")]
    pub growth_step: Decimal,

    /// Samples on each side of the base value
    #[arg(long, default_value_t = 2)]
    pub steps: u32,
}

/// Arguments for peer-multiple comparison
#[derive(Args)]
pub struct PeersArgs {
    /// Path to a document with "valuation" (inputs or workbook) and "peers"
    #[arg(long)]
    pub input: Option<String>,
}

/// Arguments for the discount-rate profile
#[derive(Args)]
#[command(allow_hyphen_values = true)]
pub struct WaccProfileArgs {
    /// Path to a valuation document
    #[arg(long)]
    pub input: Option<String>,

    /// Explicit discount-rate samples (comma separated)
    #[arg(long, value_delimiter = ',')]
    pub rates: Vec<Decimal>,

    /// Lowest discount rate of a min..=max sweep (needs --rate-max)
    #[arg(long, requires = "rate_max")]
    pub rate_min: Option<Decimal>,

    #[arg(long, requires = "rate_min")]
    pub rate_max: Option<Decimal>,

    /// Increment between discount-rate samples
    #[arg(long, default_value = "0.01")]
    pub step: Decimal,

    /// Samples on each side of the base discount rate
    #[arg(long, default_value_t = 3)]
    pub steps: u32,
}

/// Arguments for WACC calculation
#[derive(Args)]
#[command(allow_hyphen_values = true)]
pub struct WaccArgs {
    /// Risk-free rate (e.g. 0.042 for 4.2%)
    #[arg(long)]
    pub risk_free_rate: Option<Decimal>,

    /// Equity risk premium (e.g. 0.055 for 5.5%)
    #[arg(long, alias = "erp")]
    pub equity_risk_premium: Option<Decimal>,

    /// Levered beta
    #[arg(long)]
    pub beta: Option<Decimal>,

    /// Pre-tax cost of debt
    #[arg(long)]
    pub cost_of_debt: Option<Decimal>,

    /// Marginal corporate tax rate
    #[arg(long)]
    pub tax_rate: Option<Decimal>,

    /// Debt weight in capital structure (market value basis)
    #[arg(long)]
    pub debt_weight: Option<Decimal>,

    /// Equity weight in capital structure (market value basis)
    #[arg(long)]
    pub equity_weight: Option<Decimal>,

    /// Size premium
    #[arg(long)]
    pub size_premium: Option<Decimal>,

    /// Country risk premium
    #[arg(long)]
    pub country_risk: Option<Decimal>,

    /// Company-specific risk premium
    #[arg(long)]
    pub specific_risk: Option<Decimal>,

    /// Unlevered (asset) beta, re-levered at the given weights
    #[arg(long)]
    pub unlevered_beta: Option<Decimal>,

    /// Valuation document to re-price at the computed WACC
    #[arg(long)]
    pub valuation: Option<String>,

    /// Path to JSON/YAML input file (overrides individual flags)
    #[arg(long)]
    pub input: Option<String>,
}

#[derive(Deserialize)]
struct PeersDocument {
    valuation: ValuationSource,
    peers: Vec<PeerMultiple>,
}

fn load_inputs(path: Option<&str>) -> Result<FinancialInputs, Box<dyn std::error::Error>> {
    let source: ValuationSource = input::load(path)?.ok_or(INPUT_REQUIRED)?;
    Ok(source.into_inputs()?)
}

/// Explicit samples win, then a min..=max sweep, then samples centred on the base.
fn axis(
    name: &str,
    explicit: Vec<Decimal>,
    bounds: Option<(Decimal, Decimal)>,
    base: Decimal,
    step: Decimal,
    steps: u32,
) -> Result<Vec<Decimal>, Box<dyn std::error::Error>> {
    if !explicit.is_empty() {
        return Ok(explicit);
    }
    let values = match bounds {
        Some((min, max)) => sweep_values(&SensitivityVariable {
            name: name.into(),
            min,
            max,
            step,
        })?,
        None => centered_values(base, step, steps)?,
    };
    Ok(values)
}

pub fn run_valuation(args: ValuationArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let mut inputs = load_inputs(args.input.as_deref())?;
    if let Some(method) = args.terminal_method {
        inputs.terminal_method = method.into();
    }
    if args.mid_year {
        inputs.mid_year_convention = Some(true);
    }
    let result = compute_valuation(&inputs)?;
    Ok(serde_json::to_value(result)?)
}

pub fn run_sensitivity(args: SensitivityArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let inputs = load_inputs(args.input.as_deref())?;

    let rates = axis(
        "discount_rate",
        args.rates,
        args.rate_min.zip(args.rate_max),
        inputs.discount_rate,
        args.rate_step,
        args.steps,
    )?;
    let growth_rates = axis(
        "terminal_growth_rate",
        args.growth_rates,
        args.growth_min.zip(args.growth_max),
        inputs.terminal_growth_rate,
        args.growth_step,
        args.steps,
    )?;

    let result = compute_sensitivity(&inputs, &rates, &growth_rates)?;
    let surface = summarize_grid(&result.result);

    let mut value = serde_json::to_value(&result)?;
    if let Value::Object(ref mut map) = value {
        map.insert("rows".into(), serde_json::to_value(&surface.rows)?);
        map.insert("surface".into(), serde_json::to_value(&surface)?);
    }
    Ok(value)
}

pub fn run_peers(args: PeersArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let doc: PeersDocument = input::load(args.input.as_deref())?
        .ok_or("--input <file> or stdin with \"valuation\" and \"peers\" is required")?;
    let inputs = doc.valuation.into_inputs()?;
    let result = compute_peer_comparison(&inputs, &doc.peers)?;
    Ok(serde_json::to_value(result)?)
}

pub fn run_wacc_profile(args: WaccProfileArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let inputs = load_inputs(args.input.as_deref())?;
    let rates = axis(
        "discount_rate",
        args.rates,
        args.rate_min.zip(args.rate_max),
        inputs.discount_rate,
        args.step,
        args.steps,
    )?;
    let result = compute_discount_rate_profile(&inputs, &rates)?;

    let mut value = serde_json::to_value(&result)?;
    if let Value::Object(ref mut map) = value {
        map.insert("rows".into(), serde_json::to_value(&result.result.points)?);
    }
    Ok(value)
}

pub fn run_wacc(args: WaccArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let wacc_input: WaccInput = match input::load(args.input.as_deref())? {
        Some(doc) => doc,
        None => WaccInput {
            risk_free_rate: args
                .risk_free_rate
                .ok_or("--risk-free-rate is required (or provide --input)")?,
            equity_risk_premium: args
                .equity_risk_premium
                .ok_or("--equity-risk-premium is required (or provide --input)")?,
            beta: args.beta.unwrap_or(dec!(1.0)),
            cost_of_debt: args
                .cost_of_debt
                .ok_or("--cost-of-debt is required (or provide --input)")?,
            tax_rate: args
                .tax_rate
                .ok_or("--tax-rate is required (or provide --input)")?,
            debt_weight: args
                .debt_weight
                .ok_or("--debt-weight is required (or provide --input)")?,
            equity_weight: args
                .equity_weight
                .ok_or("--equity-weight is required (or provide --input)")?,
            size_premium: args.size_premium,
            country_risk_premium: args.country_risk,
            specific_risk_premium: args.specific_risk,
            unlevered_beta: args.unlevered_beta,
        },
    };

    let result = wacc::calculate_wacc(&wacc_input)?;
    let mut value = serde_json::to_value(&result)?;

    if let Some(ref path) = args.valuation {
        let source: ValuationSource = input::file::read_document(path)?;
        let repriced = result.result.apply_to(&source.into_inputs()?);
        let valuation = compute_valuation(&repriced)?;
        if let Value::Object(ref mut map) = value {
            map.insert("valuation".into(), serde_json::to_value(valuation)?);
        }
    }
    Ok(value)
}
