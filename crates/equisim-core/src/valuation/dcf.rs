use rust_decimal::Decimal;
use rust_decimal::MathematicalOps;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::error::EquisimError;
use crate::types::{with_metadata, ComputationOutput, Money, Rate};
use crate::EquisimResult;

use super::inputs::{FinancialInputs, TerminalMethod};

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// One explicit forecast year after discounting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscountedCashFlow {
    pub year: u32,
    pub free_cash_flow: Money,
    pub discount_factor: Rate,
    pub present_value: Money,
}

/// Decomposition of the implied share price.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerShareBridge {
    pub pv_cash_flows_per_share: Money,
    pub pv_terminal_value_per_share: Money,
    pub net_debt_per_share: Money,
    pub implied_share_price: Money,
}

/// Snapshot of a single DCF valuation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValuationResult {
    pub cash_flows: Vec<DiscountedCashFlow>,
    pub pv_of_cash_flows: Money,
    /// Gordon growth terminal value (absent when r <= g under the multiples method)
    pub terminal_value_perpetuity: Option<Money>,
    /// Exit-multiple terminal value (absent without exit multiple and terminal metric)
    pub terminal_value_multiples: Option<Money>,
    pub pv_terminal_value_perpetuity: Option<Money>,
    pub pv_terminal_value_multiples: Option<Money>,
    pub terminal_method_used: TerminalMethod,
    /// Present value of the terminal value that drives enterprise value
    pub pv_terminal_value: Money,
    pub enterprise_value: Money,
    pub equity_value: Money,
    pub implied_share_price: Money,
    pub implied_share_price_perpetuity: Option<Money>,
    pub implied_share_price_multiples: Option<Money>,
    pub current_share_price: Option<Money>,
    /// implied / current - 1
    pub upside: Option<Rate>,
    /// PV of terminal value as a fraction of enterprise value
    pub terminal_value_pct: Rate,
    pub per_share_bridge: PerShareBridge,
    pub discount_rate: Rate,
    pub terminal_growth_rate: Rate,
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Value the company from projected free cash flows and a terminal value.
///
/// Each forecast year `t` is discounted by `(1 + r)^t` (or `t - 0.5` under the
/// mid-year convention). The terminal value is discounted over the full
/// forecast horizon. Both terminal methods are computed whenever their inputs
/// allow; `terminal_method` selects the one that drives equity value.
pub fn compute_valuation(
    inputs: &FinancialInputs,
) -> EquisimResult<ComputationOutput<ValuationResult>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    inputs.validate()?;

    let result = value_company(inputs, &mut warnings)?;

    tracing::debug!(
        discount_rate = %result.discount_rate,
        terminal_growth_rate = %result.terminal_growth_rate,
        enterprise_value = %result.enterprise_value,
        implied_share_price = %result.implied_share_price,
        "dcf valuation computed"
    );

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Unlevered FCF DCF (perpetuity and exit-multiple terminal values)",
        inputs,
        warnings,
        elapsed,
        result,
    ))
}

// ---------------------------------------------------------------------------
// Internal helpers
// ---------------------------------------------------------------------------

/// Core valuation on already-validated inputs.
///
/// Decimal overflow (a vanishing `r - g` spread, a very long horizon) is
/// reported as an invalid assumption instead of panicking.
fn value_company(
    inputs: &FinancialInputs,
    warnings: &mut Vec<String>,
) -> EquisimResult<ValuationResult> {
    let r = inputs.discount_rate;
    let g = inputs.terminal_growth_rate;
    let mid_year = inputs.mid_year_convention.unwrap_or(false);

    let cash_flows = discount_cash_flows(&inputs.free_cash_flows, r, mid_year)?;
    let pv_of_cash_flows: Money = cash_flows
        .iter()
        .try_fold(Decimal::ZERO, |acc, cf| acc.checked_add(cf.present_value))
        .ok_or_else(|| overflow("free_cash_flows", "sum of discounted cash flows"))?;

    let n_years = inputs.free_cash_flows.len() as u64;
    let tv_discount_factor = (Decimal::ONE + r)
        .checked_powu(n_years)
        .and_then(|compound| Decimal::ONE.checked_div(compound))
        .ok_or_else(|| overflow("discount_rate", "terminal value discount factor"))?;

    // validate() guarantees at least one cash flow
    let last_fcf = inputs
        .free_cash_flows
        .last()
        .copied()
        .unwrap_or(Decimal::ZERO);

    let terminal_value_perpetuity = if r > g {
        let tv = last_fcf
            .checked_mul(Decimal::ONE + g)
            .and_then(|next| next.checked_div(r - g))
            .ok_or_else(|| overflow("terminal_growth_rate", "perpetuity terminal value"))?;
        Some(tv)
    } else {
        warnings.push(format!(
            "Perpetuity terminal value not computed: discount rate ({r}) does not exceed terminal growth ({g})"
        ));
        None
    };
    let terminal_value_multiples = match (inputs.exit_multiple, inputs.terminal_metric) {
        (Some(multiple), Some(metric)) => Some(
            multiple
                .checked_mul(metric)
                .ok_or_else(|| overflow("exit_multiple", "exit-multiple terminal value"))?,
        ),
        _ => None,
    };

    let discount_tv = |tv: Money| {
        tv.checked_mul(tv_discount_factor)
            .ok_or_else(|| overflow("terminal_value", "present value of terminal value"))
    };
    let pv_terminal_value_perpetuity = terminal_value_perpetuity.map(discount_tv).transpose()?;
    let pv_terminal_value_multiples = terminal_value_multiples.map(discount_tv).transpose()?;

    let shares = inputs.shares_outstanding;
    let price_from = |pv_tv: Money| {
        pv_of_cash_flows
            .checked_add(pv_tv)
            .and_then(|ev| ev.checked_sub(inputs.net_debt))
            .and_then(|equity| equity.checked_div(shares))
            .ok_or_else(|| overflow("shares_outstanding", "implied share price"))
    };
    let implied_share_price_perpetuity = pv_terminal_value_perpetuity.map(price_from).transpose()?;
    let implied_share_price_multiples = pv_terminal_value_multiples.map(price_from).transpose()?;

    let pv_terminal_value = match inputs.terminal_method {
        TerminalMethod::Perpetuity => pv_terminal_value_perpetuity,
        TerminalMethod::Multiples => pv_terminal_value_multiples,
    }
    .unwrap_or(Decimal::ZERO);

    let enterprise_value = pv_of_cash_flows
        .checked_add(pv_terminal_value)
        .ok_or_else(|| overflow("terminal_value", "enterprise value"))?;
    let equity_value = enterprise_value
        .checked_sub(inputs.net_debt)
        .ok_or_else(|| overflow("net_debt", "equity value"))?;
    let per_share = |amount: Money| {
        amount
            .checked_div(shares)
            .ok_or_else(|| overflow("shares_outstanding", "per-share value"))
    };
    let implied_share_price = per_share(equity_value)?;

    let terminal_value_pct = if enterprise_value.is_zero() {
        Decimal::ZERO
    } else {
        pv_terminal_value
            .checked_div(enterprise_value)
            .ok_or_else(|| overflow("terminal_value", "terminal value share of enterprise value"))?
    };

    push_reasonableness_warnings(
        warnings,
        terminal_value_pct,
        terminal_value_perpetuity,
        terminal_value_multiples,
        implied_share_price,
    );

    let upside = inputs
        .current_share_price
        .map(|current| {
            implied_share_price
                .checked_div(current)
                .map(|ratio| ratio - Decimal::ONE)
                .ok_or_else(|| overflow("current_share_price", "upside"))
        })
        .transpose()?;

    let per_share_bridge = PerShareBridge {
        pv_cash_flows_per_share: per_share(pv_of_cash_flows)?,
        pv_terminal_value_per_share: per_share(pv_terminal_value)?,
        net_debt_per_share: per_share(inputs.net_debt)?,
        implied_share_price,
    };

    Ok(ValuationResult {
        cash_flows,
        pv_of_cash_flows,
        terminal_value_perpetuity,
        terminal_value_multiples,
        pv_terminal_value_perpetuity,
        pv_terminal_value_multiples,
        terminal_method_used: inputs.terminal_method,
        pv_terminal_value,
        enterprise_value,
        equity_value,
        implied_share_price,
        implied_share_price_perpetuity,
        implied_share_price_multiples,
        current_share_price: inputs.current_share_price,
        upside,
        terminal_value_pct,
        per_share_bridge,
        discount_rate: r,
        terminal_growth_rate: g,
    })
}

fn overflow(field: &str, quantity: &str) -> EquisimError {
    EquisimError::assumption(
        field,
        format!("{quantity} is outside the representable decimal range"),
    )
}

fn discount_cash_flows(
    free_cash_flows: &[Money],
    discount_rate: Rate,
    mid_year: bool,
) -> EquisimResult<Vec<DiscountedCashFlow>> {
    free_cash_flows
        .iter()
        .enumerate()
        .map(|(idx, &fcf)| {
            let year = idx as u32 + 1;
            let base = Decimal::ONE + discount_rate;
            let compound = if mid_year {
                base.checked_powd(Decimal::from(year) - dec!(0.5))
            } else {
                base.checked_powu(year as u64)
            };
            let discount_factor = compound
                .and_then(|c| Decimal::ONE.checked_div(c))
                .ok_or_else(|| overflow("free_cash_flows", "discount factor"))?;
            let present_value = fcf
                .checked_mul(discount_factor)
                .ok_or_else(|| overflow("free_cash_flows", "present value"))?;
            Ok(DiscountedCashFlow {
                year,
                free_cash_flow: fcf,
                discount_factor,
                present_value,
            })
        })
        .collect()
}

fn push_reasonableness_warnings(
    warnings: &mut Vec<String>,
    terminal_value_pct: Rate,
    tv_perpetuity: Option<Money>,
    tv_multiples: Option<Money>,
    implied_share_price: Money,
) {
    if terminal_value_pct > dec!(0.75) {
        warnings.push(format!(
            "Terminal value represents {:.1}% of enterprise value; consider extending the explicit forecast period",
            terminal_value_pct.saturating_mul(dec!(100))
        ));
    }
    if let (Some(p), Some(m)) = (tv_perpetuity, tv_multiples) {
        if p > Decimal::ZERO && m > Decimal::ZERO {
            let diff_pct = (p - m).checked_div(p).map(|d| d.abs());
            if let Some(diff_pct) = diff_pct.filter(|d| *d > dec!(0.25)) {
                warnings.push(format!(
                    "Perpetuity TV ({p:.2}) and exit-multiple TV ({m:.2}) differ by {:.1}%; review assumptions",
                    diff_pct.saturating_mul(dec!(100))
                ));
            }
        }
    }
    if implied_share_price < Decimal::ZERO {
        warnings.push("Implied share price is negative: net debt exceeds enterprise value".into());
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EquisimError;
    use rust_decimal_macros::dec;

    fn sample_inputs() -> FinancialInputs {
        FinancialInputs {
            free_cash_flows: vec![dec!(100), dec!(110), dec!(121)],
            discount_rate: dec!(0.10),
            terminal_growth_rate: dec!(0.02),
            net_debt: dec!(100),
            shares_outstanding: dec!(10),
            current_share_price: Some(dec!(100)),
            exit_multiple: None,
            terminal_metric: None,
            peer_multiple_reference: None,
            terminal_method: TerminalMethod::Perpetuity,
            mid_year_convention: None,
        }
    }

    fn close(a: Decimal, b: Decimal) -> bool {
        (a - b).abs() < dec!(0.0001)
    }

    #[test]
    fn test_basic_valuation() {
        let out = compute_valuation(&sample_inputs()).unwrap().result;

        // Each FCF grows at the discount rate, so every PV is 100/1.1
        let pv_each = dec!(100) / dec!(1.1);
        for cf in &out.cash_flows {
            assert!(close(cf.present_value, pv_each), "pv={}", cf.present_value);
        }
        assert!(close(out.pv_of_cash_flows, pv_each * dec!(3)));

        // TV = 121 * 1.02 / 0.08 = 1542.75
        assert_eq!(out.terminal_value_perpetuity, Some(dec!(1542.75)));
        // PV(TV) = 1542.75 / 1.331
        assert!(close(out.pv_terminal_value, dec!(1542.75) / dec!(1.331)));

        assert_eq!(out.enterprise_value, out.pv_of_cash_flows + out.pv_terminal_value);
        assert_eq!(out.equity_value, out.enterprise_value - dec!(100));
        assert_eq!(out.implied_share_price, out.equity_value / dec!(10));
        assert!(close(out.implied_share_price, dec!(133.18181818)));
    }

    #[test]
    fn test_growth_equal_to_rate_rejected() {
        let mut inputs = sample_inputs();
        inputs.terminal_growth_rate = dec!(0.10);
        assert!(matches!(
            compute_valuation(&inputs),
            Err(EquisimError::InvalidAssumption { .. })
        ));
    }

    #[test]
    fn test_zero_shares_rejected() {
        let mut inputs = sample_inputs();
        inputs.shares_outstanding = Decimal::ZERO;
        assert!(matches!(
            compute_valuation(&inputs),
            Err(EquisimError::InvalidAssumption { .. })
        ));
    }

    #[test]
    fn test_empty_cash_flows_is_missing_data() {
        let mut inputs = sample_inputs();
        inputs.free_cash_flows.clear();
        assert!(matches!(
            compute_valuation(&inputs),
            Err(EquisimError::MissingData(_))
        ));
    }

    #[test]
    fn test_both_terminal_values_reported() {
        let mut inputs = sample_inputs();
        inputs.exit_multiple = Some(dec!(10));
        inputs.terminal_metric = Some(dec!(150));
        let out = compute_valuation(&inputs).unwrap().result;

        assert_eq!(out.terminal_value_multiples, Some(dec!(1500)));
        assert!(out.terminal_value_perpetuity.is_some());
        // Perpetuity drives EV by default
        assert_eq!(out.terminal_method_used, TerminalMethod::Perpetuity);
        assert_eq!(
            Some(out.implied_share_price),
            out.implied_share_price_perpetuity
        );
        assert!(out.implied_share_price_multiples.is_some());
    }

    #[test]
    fn test_multiples_method_drives_equity() {
        let mut inputs = sample_inputs();
        inputs.exit_multiple = Some(dec!(10));
        inputs.terminal_metric = Some(dec!(150));
        inputs.terminal_method = TerminalMethod::Multiples;
        let out = compute_valuation(&inputs).unwrap().result;

        assert!(close(out.pv_terminal_value, dec!(1500) / dec!(1.331)));
        assert_eq!(
            Some(out.implied_share_price),
            out.implied_share_price_multiples
        );
    }

    #[test]
    fn test_multiples_method_tolerates_growth_above_rate() {
        let mut inputs = sample_inputs();
        inputs.exit_multiple = Some(dec!(10));
        inputs.terminal_metric = Some(dec!(150));
        inputs.terminal_method = TerminalMethod::Multiples;
        inputs.terminal_growth_rate = dec!(0.12);
        let result = compute_valuation(&inputs).unwrap();

        assert!(result.result.terminal_value_perpetuity.is_none());
        assert!(result
            .warnings
            .iter()
            .any(|w| w.contains("Perpetuity terminal value not computed")));
    }

    #[test]
    fn test_upside_against_market_price() {
        let out = compute_valuation(&sample_inputs()).unwrap().result;
        let upside = out.upside.unwrap();
        assert_eq!(upside, out.implied_share_price / dec!(100) - Decimal::ONE);
    }

    #[test]
    fn test_per_share_bridge_adds_up() {
        let out = compute_valuation(&sample_inputs()).unwrap().result;
        let b = &out.per_share_bridge;
        let rebuilt =
            b.pv_cash_flows_per_share + b.pv_terminal_value_per_share - b.net_debt_per_share;
        assert!(close(rebuilt, out.implied_share_price));
    }

    #[test]
    fn test_mid_year_convention_raises_value() {
        let mut inputs = sample_inputs();
        let end_year = compute_valuation(&inputs).unwrap().result;
        inputs.mid_year_convention = Some(true);
        let mid_year = compute_valuation(&inputs).unwrap().result;
        assert!(mid_year.pv_of_cash_flows > end_year.pv_of_cash_flows);
        // Terminal value discounting is unchanged
        assert_eq!(mid_year.pv_terminal_value, end_year.pv_terminal_value);
    }

    #[test]
    fn test_high_terminal_share_warning() {
        let result = compute_valuation(&sample_inputs()).unwrap();
        // PV(TV) ~ 1159 of EV ~ 1432
        assert!(result
            .warnings
            .iter()
            .any(|w| w.contains("Terminal value represents")));
    }

    #[test]
    fn test_negative_equity_warning() {
        let mut inputs = sample_inputs();
        inputs.net_debt = dec!(5000);
        let result = compute_valuation(&inputs).unwrap();
        assert!(result.result.implied_share_price < Decimal::ZERO);
        assert!(result.warnings.iter().any(|w| w.contains("negative")));
    }

    #[test]
    fn test_vanishing_spread_is_invalid_assumption() {
        let mut inputs = sample_inputs();
        inputs.free_cash_flows = vec![dec!(1000000000)];
        inputs.terminal_growth_rate = dec!(0.0999999999999999999999);
        match compute_valuation(&inputs) {
            Err(EquisimError::InvalidAssumption { field, reason }) => {
                assert_eq!(field, "terminal_growth_rate");
                assert!(reason.contains("representable"));
            }
            other => panic!("expected InvalidAssumption, got {other:?}"),
        }
    }

    #[test]
    fn test_overlong_horizon_is_invalid_assumption() {
        let mut inputs = sample_inputs();
        inputs.free_cash_flows = vec![dec!(100); 400];
        inputs.discount_rate = dec!(0.20);
        assert!(matches!(
            compute_valuation(&inputs),
            Err(EquisimError::InvalidAssumption { .. })
        ));

        inputs.mid_year_convention = Some(true);
        assert!(matches!(
            compute_valuation(&inputs),
            Err(EquisimError::InvalidAssumption { .. })
        ));
    }

    #[test]
    fn test_methodology() {
        let result = compute_valuation(&sample_inputs()).unwrap();
        assert_eq!(
            result.methodology,
            "Unlevered FCF DCF (perpetuity and exit-multiple terminal values)"
        );
        assert_eq!(result.metadata.precision, "rust_decimal_128bit");
    }
}
