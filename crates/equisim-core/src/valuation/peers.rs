use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Instant;

use crate::error::EquisimError;
use crate::types::{with_metadata, ComputationOutput, Money, Multiple};
use crate::EquisimResult;

use super::dcf::compute_valuation;
use super::inputs::FinancialInputs;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// A comparable company's trading multiple (e.g. EV/EBITDA).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeerMultiple {
    pub name: String,
    pub multiple: Multiple,
    /// Include in the analysis (allows easy toggling)
    #[serde(default = "default_include")]
    pub include: bool,
}

fn default_include() -> bool {
    true
}

/// Target value implied by one peer's multiple.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeerImpliedValue {
    pub multiple: Multiple,
    pub implied_enterprise_value: Money,
    pub implied_equity_value: Money,
    pub implied_share_price: Money,
}

/// Statistics across the included peer multiples.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeerMultipleStatistics {
    pub mean: Multiple,
    pub median: Multiple,
    pub high: Multiple,
    pub low: Multiple,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeerComparison {
    pub reference_metric: Money,
    /// Peer label -> implied value
    pub implied_values: BTreeMap<String, PeerImpliedValue>,
    pub statistics: PeerMultipleStatistics,
    pub implied_share_price_at_median: Money,
    /// DCF implied share price, when the inputs admit a valuation
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dcf_implied_share_price: Option<Money>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_share_price: Option<Money>,
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Apply each peer's multiple to the company's reference metric.
pub fn compute_peer_comparison(
    inputs: &FinancialInputs,
    peer_multiples: &[PeerMultiple],
) -> EquisimResult<ComputationOutput<PeerComparison>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    inputs.validate_structure()?;
    let reference_metric = inputs.peer_multiple_reference.ok_or_else(|| {
        EquisimError::MissingData(
            "peer_multiple_reference: required to apply peer multiples".into(),
        )
    })?;

    let included: Vec<&PeerMultiple> = peer_multiples.iter().filter(|p| p.include).collect();
    if included.is_empty() {
        return Err(EquisimError::input(
            "peer_multiples",
            "At least one included peer multiple is required",
        ));
    }
    if included.len() < 3 {
        warnings.push(format!(
            "Only {} peers included; consider adding more for statistical significance",
            included.len()
        ));
    }

    let shares = inputs.shares_outstanding;
    let implied_from = |multiple: Multiple| {
        let implied_enterprise_value = multiple * reference_metric;
        let implied_equity_value = implied_enterprise_value - inputs.net_debt;
        PeerImpliedValue {
            multiple,
            implied_enterprise_value,
            implied_equity_value,
            implied_share_price: implied_equity_value / shares,
        }
    };

    let mut implied_values = BTreeMap::new();
    for peer in &included {
        if peer.multiple <= Decimal::ZERO {
            warnings.push(format!(
                "{}: non-positive multiple {} included as given",
                peer.name, peer.multiple
            ));
        }
        if implied_values
            .insert(peer.name.clone(), implied_from(peer.multiple))
            .is_some()
        {
            return Err(EquisimError::input(
                "peer_multiples",
                format!("Duplicate peer label '{}'", peer.name),
            ));
        }
    }

    let statistics = multiple_statistics(included.iter().map(|p| p.multiple).collect());
    let implied_share_price_at_median = implied_from(statistics.median).implied_share_price;

    let dcf_implied_share_price = match compute_valuation(inputs) {
        Ok(out) => Some(out.result.implied_share_price),
        Err(e) => {
            warnings.push(format!("DCF comparison unavailable: {e}"));
            None
        }
    };

    let output = PeerComparison {
        reference_metric,
        implied_values,
        statistics,
        implied_share_price_at_median,
        dcf_implied_share_price,
        current_share_price: inputs.current_share_price,
    };

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Peer multiples comparison",
        &serde_json::json!({
            "reference_metric": reference_metric,
            "net_debt": inputs.net_debt,
            "shares_outstanding": inputs.shares_outstanding,
            "peers": peer_multiples,
        }),
        warnings,
        elapsed,
        output,
    ))
}

// ---------------------------------------------------------------------------
// Internal helpers
// ---------------------------------------------------------------------------

/// `values` must be non-empty.
fn multiple_statistics(mut values: Vec<Multiple>) -> PeerMultipleStatistics {
    values.sort();
    let count = values.len();
    let mean = values.iter().copied().sum::<Decimal>() / Decimal::from(count as u64);
    let median = if count % 2 == 0 {
        let mid = count / 2;
        (values[mid - 1] + values[mid]) / dec!(2)
    } else {
        values[count / 2]
    };

    PeerMultipleStatistics {
        mean,
        median,
        high: values[count - 1],
        low: values[0],
        count,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
