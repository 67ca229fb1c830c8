//! Reductions of engine output into display-ready form.

#[cfg(feature = "valuation")]
pub mod grid;

#[cfg(feature = "simulation")]
pub mod statistics;

#[cfg(feature = "valuation")]
pub use grid::{summarize_grid, GridSurface};

#[cfg(feature = "simulation")]
pub use statistics::{
    histogram, summarize, HistogramBin, PricePercentiles, PriceSummary, DEFAULT_HISTOGRAM_BINS,
};
