use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::error::EquisimError;
use crate::types::{with_metadata, ComputationOutput, Rate};
use crate::EquisimResult;

use super::inputs::FinancialInputs;

/// CAPM build-up inputs for the discount rate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WaccInput {
    pub risk_free_rate: Rate,
    pub equity_risk_premium: Rate,
    /// Levered equity beta (ignored when `unlevered_beta` is given)
    pub beta: Decimal,
    /// Pre-tax cost of debt
    pub cost_of_debt: Rate,
    pub tax_rate: Rate,
    /// Market-value weights; must sum to 1
    pub debt_weight: Rate,
    pub equity_weight: Rate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size_premium: Option<Rate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country_risk_premium: Option<Rate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub specific_risk_premium: Option<Rate>,
    /// Asset beta, re-levered at D/E = debt_weight / equity_weight (Hamada)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unlevered_beta: Option<Decimal>,
}

/// Cost-of-capital breakdown.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WaccOutput {
    pub wacc: Rate,
    pub cost_of_equity: Rate,
    pub after_tax_cost_of_debt: Rate,
    pub levered_beta: Decimal,
    /// cost_of_equity * equity_weight
    pub equity_contribution: Rate,
    /// after_tax_cost_of_debt * debt_weight
    pub debt_contribution: Rate,
}

impl WaccOutput {
    /// Inputs re-priced at this discount rate.
    pub fn apply_to(&self, inputs: &FinancialInputs) -> FinancialInputs {
        inputs.with_rates(self.wacc, inputs.terminal_growth_rate)
    }
}

/// Weighted average cost of capital.
///
/// Ke = Rf + beta * ERP + premiums; Kd_at = Kd * (1 - t);
/// WACC = Ke * We + Kd_at * Wd.
pub fn calculate_wacc(input: &WaccInput) -> EquisimResult<ComputationOutput<WaccOutput>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    validate(input)?;

    let levered_beta = match input.unlevered_beta {
        Some(beta_u) => {
            let de = input.debt_weight / input.equity_weight;
            let beta_l = beta_u * (Decimal::ONE + (Decimal::ONE - input.tax_rate) * de);
            warnings.push(format!(
                "Beta re-levered via Hamada: {beta_l:.4} (asset beta {beta_u}, D/E {de:.4})"
            ));
            beta_l
        }
        None => input.beta,
    };

    let premiums = [
        input.size_premium,
        input.country_risk_premium,
        input.specific_risk_premium,
    ]
    .iter()
    .flatten()
    .copied()
    .sum::<Decimal>();

    let cost_of_equity = input.risk_free_rate + levered_beta * input.equity_risk_premium + premiums;
    let after_tax_cost_of_debt = input.cost_of_debt * (Decimal::ONE - input.tax_rate);
    let equity_contribution = cost_of_equity * input.equity_weight;
    let debt_contribution = after_tax_cost_of_debt * input.debt_weight;
    let wacc = equity_contribution + debt_contribution;

    if levered_beta > dec!(3.0) {
        warnings.push(format!(
            "High beta ({levered_beta}): betas above 3.0 are unusual"
        ));
    }
    if wacc > dec!(0.20) {
        warnings.push(format!(
            "WACC of {wacc} exceeds 20%; perpetuity values will be very small"
        ));
    }

    let output = WaccOutput {
        wacc,
        cost_of_equity,
        after_tax_cost_of_debt,
        levered_beta,
        equity_contribution,
        debt_contribution,
    };

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "WACC via CAPM build-up",
        input,
        warnings,
        elapsed,
        output,
    ))
}

fn validate(input: &WaccInput) -> EquisimResult<()> {
    let non_negative = [
        ("risk_free_rate", input.risk_free_rate),
        ("equity_risk_premium", input.equity_risk_premium),
        ("cost_of_debt", input.cost_of_debt),
        ("debt_weight", input.debt_weight),
        ("equity_weight", input.equity_weight),
    ];
    for (field, value) in non_negative {
        if value < Decimal::ZERO {
            return Err(EquisimError::input(field, "Cannot be negative"));
        }
    }
    if input.tax_rate < Decimal::ZERO || input.tax_rate > Decimal::ONE {
        return Err(EquisimError::input(
            "tax_rate",
            "Tax rate must be between 0 and 1",
        ));
    }
    let weight_sum = input.debt_weight + input.equity_weight;
    if (weight_sum - Decimal::ONE).abs() > dec!(0.01) {
        return Err(EquisimError::input(
            "debt_weight + equity_weight",
            format!("Capital structure weights must sum to 1.0, got {weight_sum}"),
        ));
    }
    match input.unlevered_beta {
        Some(beta_u) if beta_u <= Decimal::ZERO => {
            return Err(EquisimError::input(
                "unlevered_beta",
                "Unlevered beta must be positive",
            ));
        }
        Some(_) if input.equity_weight.is_zero() => {
            return Err(EquisimError::input(
                "equity_weight",
                "Cannot re-lever beta with zero equity weight",
            ));
        }
        None if input.beta <= Decimal::ZERO => {
            return Err(EquisimError::input("beta", "Beta must be positive"));
        }
        _ => {}
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::valuation::inputs::TerminalMethod;
    use rust_decimal_macros::dec;

    fn sample_input() -> WaccInput {
        WaccInput {
            risk_free_rate: dec!(0.042),
            equity_risk_premium: dec!(0.055),
            beta: dec!(1.10),
            cost_of_debt: dec!(0.055),
            tax_rate: dec!(0.21),
            debt_weight: dec!(0.30),
            equity_weight: dec!(0.70),
            size_premium: None,
            country_risk_premium: None,
            specific_risk_premium: None,
            unlevered_beta: None,
        }
    }

    #[test]
    fn test_basic_wacc() {
        let out = calculate_wacc(&sample_input()).unwrap().result;
        // Ke = 0.042 + 1.10 * 0.055 = 0.1025
        assert_eq!(out.cost_of_equity, dec!(0.1025));
        // Kd_at = 0.055 * 0.79 = 0.04345
        assert_eq!(out.after_tax_cost_of_debt, dec!(0.04345));
        // 0.1025 * 0.70 + 0.04345 * 0.30 = 0.07175 + 0.013035
        assert_eq!(out.wacc, dec!(0.084785));
        assert_eq!(out.wacc, out.equity_contribution + out.debt_contribution);
    }

    #[test]
    fn test_premiums_add_to_cost_of_equity() {
        let mut input = sample_input();
        input.size_premium = Some(dec!(0.015));
        input.country_risk_premium = Some(dec!(0.025));
        input.specific_risk_premium = Some(dec!(0.010));
        let out = calculate_wacc(&input).unwrap().result;
        assert_eq!(out.cost_of_equity, dec!(0.1525));
    }

    #[test]
    fn test_hamada_relevering() {
        let mut input = sample_input();
        input.unlevered_beta = Some(dec!(0.80));
        input.debt_weight = dec!(0.40);
        input.equity_weight = dec!(0.60);
        let result = calculate_wacc(&input).unwrap();
        let de = dec!(0.40) / dec!(0.60);
        let expected = dec!(0.80) * (Decimal::ONE + dec!(0.79) * de);
        assert_eq!(result.result.levered_beta, expected);
        assert!(result.warnings.iter().any(|w| w.contains("Hamada")));
    }

    #[test]
    fn test_weights_must_sum_to_one() {
        let mut input = sample_input();
        input.debt_weight = dec!(0.50);
        input.equity_weight = dec!(0.60);
        match calculate_wacc(&input) {
            Err(EquisimError::InvalidInput { field, .. }) => assert!(field.contains("weight")),
            other => panic!("Expected InvalidInput, got {other:?}"),
        }
    }

    #[test]
    fn test_zero_beta_rejected() {
        let mut input = sample_input();
        input.beta = Decimal::ZERO;
        assert!(calculate_wacc(&input).is_err());
    }

    #[test]
    fn test_apply_to_inputs() {
        let inputs = FinancialInputs {
            free_cash_flows: vec![dec!(50)],
            discount_rate: dec!(0.12),
            terminal_growth_rate: dec!(0.02),
            net_debt: Decimal::ZERO,
            shares_outstanding: dec!(10),
            current_share_price: None,
            exit_multiple: None,
            terminal_metric: None,
            peer_multiple_reference: None,
            terminal_method: TerminalMethod::Perpetuity,
            mid_year_convention: None,
        };
        let out = calculate_wacc(&sample_input()).unwrap().result;
        let repriced = out.apply_to(&inputs);
        assert_eq!(repriced.discount_rate, dec!(0.084785));
        assert_eq!(repriced.terminal_growth_rate, dec!(0.02));
    }
}
