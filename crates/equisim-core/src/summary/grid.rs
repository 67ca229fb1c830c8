use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};

use crate::types::{Money, Rate};
use crate::valuation::sensitivity::{SensitivityCell, SensitivityGrid};

/// One grid point in long form, for tables and heatmaps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridRow {
    pub discount_rate: Rate,
    pub terminal_growth_rate: Rate,
    pub enterprise_value: Option<Money>,
    pub implied_share_price: Option<Money>,
}

/// Plot-ready view of a sensitivity grid.
///
/// `x` holds discount rates and `y` growth rates. The z matrices are indexed
/// `[x][y]` like the grid cells. Undefined points are `None` (JSON `null`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridSurface {
    pub x: Vec<f64>,
    pub y: Vec<f64>,
    pub z_enterprise_value: Vec<Vec<Option<f64>>>,
    pub z_share_price: Vec<Vec<Option<f64>>>,
    pub rows: Vec<GridRow>,
    /// (low, high) implied share price over defined cells
    #[serde(skip_serializing_if = "Option::is_none")]
    pub share_price_range: Option<(Money, Money)>,
}

pub fn summarize_grid(grid: &SensitivityGrid) -> GridSurface {
    let to_f64 = |d: &Rate| d.to_f64().unwrap_or(f64::NAN);

    let mut rows = Vec::with_capacity(grid.discount_rates.len() * grid.growth_rates.len());
    for (i, &rate) in grid.discount_rates.iter().enumerate() {
        for (j, &growth) in grid.growth_rates.iter().enumerate() {
            let cell = grid.cell(i, j);
            rows.push(GridRow {
                discount_rate: rate,
                terminal_growth_rate: growth,
                enterprise_value: cell.map(|c| c.enterprise_value),
                implied_share_price: cell.map(|c| c.implied_share_price),
            });
        }
    }

    let mut prices = rows.iter().filter_map(|r| r.implied_share_price);
    let share_price_range = prices.next().map(|first| {
        prices.fold((first, first), |(lo, hi), p| (lo.min(p), hi.max(p)))
    });

    GridSurface {
        x: grid.discount_rates.iter().map(to_f64).collect(),
        y: grid.growth_rates.iter().map(to_f64).collect(),
        z_enterprise_value: z_matrix(grid, |c| c.enterprise_value),
        z_share_price: z_matrix(grid, |c| c.implied_share_price),
        rows,
        share_price_range,
    }
}

fn z_matrix(grid: &SensitivityGrid, pick: impl Fn(&SensitivityCell) -> Money) -> Vec<Vec<Option<f64>>> {
    grid.cells
        .iter()
        .map(|row| {
            row.iter()
                .map(|cell| cell.as_ref().and_then(|c| pick(c).to_f64()))
                .collect()
        })
        .collect()
}
