use serde::{Deserialize, Serialize};
use statrs::statistics::{Data, Median, Statistics};

use crate::error::EquisimError;
use crate::EquisimResult;

pub const DEFAULT_HISTOGRAM_BINS: usize = 50;

/// Percentiles of the terminal-price distribution (linear interpolation).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricePercentiles {
    pub p5: f64,
    pub p25: f64,
    pub p75: f64,
    pub p95: f64,
}

/// Descriptive statistics over the full set of simulated prices.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceSummary {
    pub count: usize,
    pub mean: f64,
    pub median: f64,
    pub min: f64,
    pub max: f64,
    /// Population standard deviation
    pub std_dev: f64,
    pub percentiles: PricePercentiles,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistogramBin {
    pub lower: f64,
    pub upper: f64,
    pub count: u32,
    /// count / n
    pub frequency: f64,
    /// frequency / width; zero for a zero-width bin
    pub density: f64,
}

pub fn summarize(final_prices: &[f64]) -> EquisimResult<PriceSummary> {
    let sorted = sorted_finite(final_prices)?;
    let count = sorted.len();

    let mean = sorted.iter().mean();
    let std_dev = if count > 1 {
        sorted.iter().population_std_dev()
    } else {
        0.0
    };
    let median = Data::new(sorted.clone()).median();

    Ok(PriceSummary {
        count,
        mean,
        median,
        min: sorted[0],
        max: sorted[count - 1],
        std_dev,
        percentiles: PricePercentiles {
            p5: percentile_sorted(&sorted, 5.0),
            p25: percentile_sorted(&sorted, 25.0),
            p75: percentile_sorted(&sorted, 75.0),
            p95: percentile_sorted(&sorted, 95.0),
        },
    })
}

/// Equal-width histogram over `[min, max]`; the last bin is closed.
pub fn histogram(final_prices: &[f64], bins: usize) -> EquisimResult<Vec<HistogramBin>> {
    if bins == 0 {
        return Err(EquisimError::input("bins", "Must be at least 1"));
    }
    let sorted = sorted_finite(final_prices)?;
    let min_val = sorted[0];
    let max_val = sorted[sorted.len() - 1];
    let n = sorted.len() as f64;

    let bin_width = (max_val - min_val) / bins as f64;

    // All values identical, or a spread too narrow to split
    if bin_width <= 0.0 {
        return Ok(vec![HistogramBin {
            lower: min_val,
            upper: max_val,
            count: sorted.len() as u32,
            frequency: 1.0,
            density: 0.0,
        }]);
    }

    let mut counts = vec![0u32; bins];
    for &val in &sorted {
        let idx = (((val - min_val) / bin_width).floor() as usize).min(bins - 1);
        counts[idx] += 1;
    }

    Ok(counts
        .into_iter()
        .enumerate()
        .map(|(i, count)| {
            let lower = min_val + i as f64 * bin_width;
            let upper = if i == bins - 1 {
                max_val
            } else {
                min_val + (i + 1) as f64 * bin_width
            };
            let frequency = count as f64 / n;
            HistogramBin {
                lower,
                upper,
                count,
                frequency,
                density: frequency / bin_width,
            }
        })
        .collect())
}

fn sorted_finite(values: &[f64]) -> EquisimResult<Vec<f64>> {
    if values.is_empty() {
        return Err(EquisimError::MissingData(
            "final_prices: no simulated prices to summarize".into(),
        ));
    }
    if let Some(bad) = values.iter().find(|v| !v.is_finite()) {
        return Err(EquisimError::input(
            "final_prices",
            format!("Non-finite price {bad}"),
        ));
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    Ok(sorted)
}

/// Percentile from a **sorted**, non-empty slice using linear interpolation.
fn percentile_sorted(sorted: &[f64], p: f64) -> f64 {
    if sorted.len() == 1 {
        return sorted[0];
    }
    let rank = p / 100.0 * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    if lower == upper {
        sorted[lower]
    } else {
        let frac = rank - lower as f64;
        sorted[lower] * (1.0 - frac) + sorted[upper] * frac
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_summary_basic() {
        let s = summarize(&[4.0, 1.0, 3.0, 2.0]).unwrap();
        assert_eq!(s.count, 4);
        assert!(approx(s.mean, 2.5));
        assert!(approx(s.median, 2.5));
        assert_eq!(s.min, 1.0);
        assert_eq!(s.max, 4.0);
        // population variance = 1.25
        assert!(approx(s.std_dev, 1.25_f64.sqrt()));
    }

    #[test]
    fn test_percentiles_interpolate() {
        let values: Vec<f64> = (0..=100).map(|i| i as f64).collect();
        let s = summarize(&values).unwrap();
        assert!(approx(s.percentiles.p5, 5.0));
        assert!(approx(s.percentiles.p25, 25.0));
        assert!(approx(s.percentiles.p75, 75.0));
        assert!(approx(s.percentiles.p95, 95.0));
        assert!(approx(s.median, 50.0));
    }

    #[test]
    fn test_single_value_summary() {
        let s = summarize(&[7.5]).unwrap();
        assert_eq!(s.mean, 7.5);
        assert_eq!(s.median, 7.5);
        assert_eq!(s.std_dev, 0.0);
        assert_eq!(s.percentiles.p95, 7.5);
    }

    #[test]
    fn test_empty_is_missing_data() {
        assert!(matches!(summarize(&[]), Err(EquisimError::MissingData(_))));
        assert!(matches!(
            histogram(&[], 10),
            Err(EquisimError::MissingData(_))
        ));
    }

    #[test]
    fn test_non_finite_rejected() {
        assert!(summarize(&[1.0, f64::INFINITY]).is_err());
    }

    #[test]
    fn test_histogram_counts_and_density() {
        let values: Vec<f64> = (0..100).map(|i| i as f64).collect();
        let bins = histogram(&values, 10).unwrap();
        assert_eq!(bins.len(), 10);
        assert_eq!(bins.iter().map(|b| b.count).sum::<u32>(), 100);
        assert_eq!(bins[9].upper, 99.0);
        let freq: f64 = bins.iter().map(|b| b.frequency).sum();
        assert!(approx(freq, 1.0));
        let area: f64 = bins.iter().map(|b| b.density * (b.upper - b.lower)).sum();
        assert!(approx(area, 1.0));
    }

    #[test]
    fn test_max_lands_in_last_bin() {
        let bins = histogram(&[0.0, 1.0, 2.0], 2).unwrap();
        assert_eq!(bins[0].count, 1);
        assert_eq!(bins[1].count, 2);
    }

    #[test]
    fn test_all_equal_single_bin() {
        let bins = histogram(&[5.0, 5.0, 5.0], 50).unwrap();
        assert_eq!(bins.len(), 1);
        assert_eq!(bins[0].count, 3);
        assert_eq!(bins[0].frequency, 1.0);
    }

    #[test]
    fn test_tiny_distinct_prices_still_split() {
        let bins = histogram(&[1e-17, 2e-17, 3e-17], 3).unwrap();
        assert_eq!(bins.len(), 3);
        assert!(bins.iter().all(|b| b.count == 1));
        assert!(bins.iter().all(|b| b.density > 0.0));
    }

    #[test]
    fn test_zero_bins_rejected() {
        assert!(matches!(
            histogram(&[1.0, 2.0], 0),
            Err(EquisimError::InvalidInput { .. })
        ));
    }
}
