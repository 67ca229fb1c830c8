use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::error::EquisimError;
use crate::types::{with_metadata, ComputationOutput, Money, Rate, SensitivityVariable};
use crate::EquisimResult;

use super::dcf::compute_valuation;
use super::inputs::FinancialInputs;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Values at one (discount rate, growth rate) point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensitivityCell {
    pub enterprise_value: Money,
    pub implied_share_price: Money,
}

/// Valuation over the Cartesian product of discount-rate and growth samples.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensitivityGrid {
    pub discount_rates: Vec<Rate>,
    pub growth_rates: Vec<Rate>,
    /// cells[i][j] is at discount_rates[i], growth_rates[j]; `None` where undefined
    pub cells: Vec<Vec<Option<SensitivityCell>>>,
    pub undefined_cells: usize,
}

impl SensitivityGrid {
    pub fn cell(&self, rate_idx: usize, growth_idx: usize) -> Option<&SensitivityCell> {
        self.cells.get(rate_idx)?.get(growth_idx)?.as_ref()
    }
}

/// Implied share price at one discount rate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateProfilePoint {
    pub discount_rate: Rate,
    pub enterprise_value: Option<Money>,
    pub implied_share_price: Option<Money>,
}

/// One-dimensional sweep of value against the discount rate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscountRateProfile {
    pub terminal_growth_rate: Rate,
    pub points: Vec<RateProfilePoint>,
    /// Highest rate that still leaves the implied price at or above the market price
    #[serde(skip_serializing_if = "Option::is_none")]
    pub breakeven_discount_rate: Option<Rate>,
}

// ---------------------------------------------------------------------------
// Axis construction
// ---------------------------------------------------------------------------

/// Sweep `min..=max` by `step`, appending `max` if the step overshoots it.
pub fn sweep_values(var: &SensitivityVariable) -> EquisimResult<Vec<Decimal>> {
    if var.step <= Decimal::ZERO {
        return Err(EquisimError::input(
            &format!("variable:{}", var.name),
            "Step must be positive",
        ));
    }
    if var.min > var.max {
        return Err(EquisimError::input(
            &format!("variable:{}", var.name),
            "Min must be <= max",
        ));
    }

    let mut values = Vec::new();
    let mut current = var.min;
    while current <= var.max {
        values.push(current);
        current += var.step;
    }
    if let Some(&last) = values.last() {
        if last < var.max {
            values.push(var.max);
        }
    }

    Ok(values)
}

/// `center - steps*step ..= center + steps*step` (e.g. WACC +/- 2%).
pub fn centered_values(center: Decimal, step: Decimal, steps: u32) -> EquisimResult<Vec<Decimal>> {
    if step <= Decimal::ZERO {
        return Err(EquisimError::input("step", "Step must be positive"));
    }
    let n = steps as i64;
    Ok((-n..=n)
        .map(|k| center + step * Decimal::from(k))
        .collect())
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Recompute the valuation for every (rate, growth) pair, all else fixed.
///
/// Cells where `rate <= growth` are left undefined instead of being computed.
/// Every defined cell equals `compute_valuation` at that pair.
pub fn compute_sensitivity(
    inputs: &FinancialInputs,
    rate_range: &[Rate],
    growth_range: &[Rate],
) -> EquisimResult<ComputationOutput<SensitivityGrid>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    inputs.validate_structure()?;
    if rate_range.is_empty() {
        return Err(EquisimError::input(
            "rate_range",
            "At least one discount rate sample is required",
        ));
    }
    if growth_range.is_empty() {
        return Err(EquisimError::input(
            "growth_range",
            "At least one growth rate sample is required",
        ));
    }

    let mut undefined_cells = 0usize;
    let mut cells = Vec::with_capacity(rate_range.len());

    for &rate in rate_range {
        let mut row = Vec::with_capacity(growth_range.len());
        for &growth in growth_range {
            let cell = evaluate_point(inputs, rate, growth, &mut warnings);
            if cell.is_none() {
                undefined_cells += 1;
            }
            row.push(cell);
        }
        cells.push(row);
    }

    if undefined_cells == rate_range.len() * growth_range.len() {
        warnings.push("Every grid cell is undefined; check the axis ranges".into());
    }

    tracing::debug!(
        rows = rate_range.len(),
        cols = growth_range.len(),
        undefined_cells,
        "sensitivity grid computed"
    );

    let output = SensitivityGrid {
        discount_rates: rate_range.to_vec(),
        growth_rates: growth_range.to_vec(),
        cells,
        undefined_cells,
    };

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "2-Way DCF Sensitivity (discount rate x terminal growth)",
        &serde_json::json!({
            "base_inputs": inputs,
            "rate_samples": rate_range.len(),
            "growth_samples": growth_range.len(),
        }),
        warnings,
        elapsed,
        output,
    ))
}

/// Sweep the discount rate alone at the base terminal growth rate.
pub fn compute_discount_rate_profile(
    inputs: &FinancialInputs,
    rates: &[Rate],
) -> EquisimResult<ComputationOutput<DiscountRateProfile>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    inputs.validate_structure()?;
    if rates.is_empty() {
        return Err(EquisimError::input(
            "rates",
            "At least one discount rate sample is required",
        ));
    }

    let g = inputs.terminal_growth_rate;
    let points: Vec<RateProfilePoint> = rates
        .iter()
        .map(|&rate| {
            let cell = evaluate_point(inputs, rate, g, &mut warnings);
            RateProfilePoint {
                discount_rate: rate,
                enterprise_value: cell.as_ref().map(|c| c.enterprise_value),
                implied_share_price: cell.map(|c| c.implied_share_price),
            }
        })
        .collect();

    let breakeven_discount_rate = inputs.current_share_price.and_then(|market| {
        points
            .iter()
            .filter(|p| p.implied_share_price.is_some_and(|price| price >= market))
            .map(|p| p.discount_rate)
            .max()
    });

    let output = DiscountRateProfile {
        terminal_growth_rate: g,
        points,
        breakeven_discount_rate,
    };

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "DCF discount-rate profile",
        &serde_json::json!({
            "base_inputs": inputs,
            "rate_samples": rates.len(),
        }),
        warnings,
        elapsed,
        output,
    ))
}

// ---------------------------------------------------------------------------
// Internal helpers
// ---------------------------------------------------------------------------

fn evaluate_point(
    inputs: &FinancialInputs,
    rate: Rate,
    growth: Rate,
    warnings: &mut Vec<String>,
) -> Option<SensitivityCell> {
    if rate <= growth {
        return None;
    }
    match compute_valuation(&inputs.with_rates(rate, growth)) {
        Ok(out) => Some(SensitivityCell {
            enterprise_value: out.result.enterprise_value,
            implied_share_price: out.result.implied_share_price,
        }),
        Err(e) => {
            tracing::warn!(%rate, %growth, error = %e, "sensitivity cell skipped");
            warnings.push(format!("Evaluation failed at ({rate}, {growth}): {e}"));
            None
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::valuation::inputs::TerminalMethod;
    use rust_decimal_macros::dec;

    fn sample_inputs() -> FinancialInputs {
        FinancialInputs {
            free_cash_flows: vec![dec!(80), dec!(90), dec!(100), dec!(105), dec!(110)],
            discount_rate: dec!(0.09),
            terminal_growth_rate: dec!(0.02),
            net_debt: dec!(300),
            shares_outstanding: dec!(40),
            current_share_price: Some(dec!(25)),
            exit_multiple: None,
            terminal_metric: None,
            peer_multiple_reference: None,
            terminal_method: TerminalMethod::Perpetuity,
            mid_year_convention: None,
        }
    }

    #[test]
    fn test_grid_dimensions() {
        let rates = [dec!(0.07), dec!(0.08), dec!(0.09), dec!(0.10)];
        let growth = [dec!(0.01), dec!(0.02), dec!(0.03)];
        let grid = compute_sensitivity(&sample_inputs(), &rates, &growth)
            .unwrap()
            .result;
        assert_eq!(grid.cells.len(), 4);
        assert!(grid.cells.iter().all(|row| row.len() == 3));
        assert_eq!(grid.undefined_cells, 0);
    }

    #[test]
    fn test_cell_matches_single_point_valuation() {
        let inputs = sample_inputs();
        let rates = [dec!(0.08), dec!(0.11)];
        let growth = [dec!(0.015), dec!(0.03)];
        let grid = compute_sensitivity(&inputs, &rates, &growth).unwrap().result;

        for (i, &r) in rates.iter().enumerate() {
            for (j, &g) in growth.iter().enumerate() {
                let single = compute_valuation(&inputs.with_rates(r, g)).unwrap().result;
                let cell = grid.cell(i, j).unwrap();
                assert_eq!(cell.enterprise_value, single.enterprise_value);
                assert_eq!(cell.implied_share_price, single.implied_share_price);
            }
        }
    }

    #[test]
    fn test_rate_not_above_growth_is_undefined() {
        let rates = [dec!(0.03), dec!(0.05)];
        let growth = [dec!(0.03), dec!(0.04)];
        let grid = compute_sensitivity(&sample_inputs(), &rates, &growth)
            .unwrap()
            .result;
        assert!(grid.cell(0, 0).is_none()); // r == g
        assert!(grid.cell(0, 1).is_none()); // r < g
        assert!(grid.cell(1, 0).is_some());
        assert!(grid.cell(1, 1).is_some());
        assert_eq!(grid.undefined_cells, 2);
    }

    #[test]
    fn test_value_falls_as_rate_rises() {
        let rates = [dec!(0.07), dec!(0.08), dec!(0.09), dec!(0.10), dec!(0.11)];
        let growth = [dec!(0.02)];
        let grid = compute_sensitivity(&sample_inputs(), &rates, &growth)
            .unwrap()
            .result;
        for i in 0..rates.len() - 1 {
            let a = grid.cell(i, 0).unwrap().implied_share_price;
            let b = grid.cell(i + 1, 0).unwrap().implied_share_price;
            assert!(a > b);
        }
    }

    #[test]
    fn test_out_of_range_rate_becomes_undefined_with_warning() {
        let rates = [dec!(0.09), dec!(1.2)];
        let growth = [dec!(0.02)];
        let out = compute_sensitivity(&sample_inputs(), &rates, &growth).unwrap();
        assert!(out.result.cell(1, 0).is_none());
        assert!(out.warnings.iter().any(|w| w.contains("Evaluation failed")));
    }

    #[test]
    fn test_overflowing_cell_becomes_undefined_with_warning() {
        let mut inputs = sample_inputs();
        inputs.free_cash_flows = vec![dec!(1000000000)];
        let rates = [dec!(0.05)];
        let growth = [dec!(0.0499999999999999999999), dec!(0.02)];
        let out = compute_sensitivity(&inputs, &rates, &growth).unwrap();

        assert!(out.result.cell(0, 0).is_none());
        assert!(out.result.cell(0, 1).is_some());
        assert_eq!(out.result.undefined_cells, 1);
        assert!(out.warnings.iter().any(|w| w.contains("Evaluation failed")));
    }

    #[test]
    fn test_empty_axis_rejected() {
        let inputs = sample_inputs();
        assert!(compute_sensitivity(&inputs, &[], &[dec!(0.02)]).is_err());
        assert!(compute_sensitivity(&inputs, &[dec!(0.09)], &[]).is_err());
    }

    #[test]
    fn test_structural_errors_fail_whole_grid() {
        let mut inputs = sample_inputs();
        inputs.shares_outstanding = Decimal::ZERO;
        assert!(matches!(
            compute_sensitivity(&inputs, &[dec!(0.09)], &[dec!(0.02)]),
            Err(EquisimError::InvalidAssumption { .. })
        ));
    }

    #[test]
    fn test_sweep_values() {
        let var = SensitivityVariable {
            name: "wacc".into(),
            min: dec!(0.08),
            max: dec!(0.10),
            step: dec!(0.01),
        };
        assert_eq!(
            sweep_values(&var).unwrap(),
            vec![dec!(0.08), dec!(0.09), dec!(0.10)]
        );
    }

    #[test]
    fn test_sweep_with_non_exact_step() {
        let var = SensitivityVariable {
            name: "growth".into(),
            min: dec!(0),
            max: dec!(1),
            step: dec!(0.3),
        };
        let vals = sweep_values(&var).unwrap();
        // 0, 0.3, 0.6, 0.9, 1.0 (max appended)
        assert_eq!(vals.len(), 5);
        assert_eq!(*vals.last().unwrap(), dec!(1));
    }

    #[test]
    fn test_sweep_rejects_bad_step() {
        let var = SensitivityVariable {
            name: "bad".into(),
            min: dec!(0),
            max: dec!(1),
            step: dec!(0),
        };
        assert!(sweep_values(&var).is_err());
    }

    #[test]
    fn test_centered_values() {
        let vals = centered_values(dec!(0.09), dec!(0.01), 2).unwrap();
        assert_eq!(
            vals,
            vec![dec!(0.07), dec!(0.08), dec!(0.09), dec!(0.10), dec!(0.11)]
        );
    }

    #[test]
    fn test_discount_rate_profile() {
        let rates = [dec!(0.01), dec!(0.06), dec!(0.09), dec!(0.12)];
        let profile = compute_discount_rate_profile(&sample_inputs(), &rates)
            .unwrap()
            .result;
        assert_eq!(profile.points.len(), 4);
        // 1% is below the 2% growth rate
        assert!(profile.points[0].implied_share_price.is_none());
        assert!(profile.points[1].implied_share_price.is_some());
        let p6 = profile.points[1].implied_share_price.unwrap();
        let p12 = profile.points[3].implied_share_price.unwrap();
        assert!(p6 > p12);
    }

    #[test]
    fn test_profile_breakeven_rate() {
        let inputs = sample_inputs();
        let rates = [dec!(0.06), dec!(0.09), dec!(0.12), dec!(0.30)];
        let profile = compute_discount_rate_profile(&inputs, &rates)
            .unwrap()
            .result;
        let expected = profile
            .points
            .iter()
            .filter(|p| p.implied_share_price.is_some_and(|v| v >= dec!(25)))
            .map(|p| p.discount_rate)
            .max();
        assert_eq!(profile.breakeven_discount_rate, expected);
    }
}
