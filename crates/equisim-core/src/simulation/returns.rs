use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::EquisimError;
use crate::EquisimResult;

/// One day's fractional return (0.01 = +1%). `None` marks a missing value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReturnObservation {
    pub date: NaiveDate,
    pub value: Option<f64>,
}

/// Ordered, dated daily returns. Dates are informational; resampling ignores them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReturnsSeries {
    pub observations: Vec<ReturnObservation>,
}

impl ReturnsSeries {
    pub fn new(observations: Vec<ReturnObservation>) -> Self {
        ReturnsSeries { observations }
    }

    pub fn from_pairs<I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (NaiveDate, f64)>,
    {
        ReturnsSeries {
            observations: pairs
                .into_iter()
                .map(|(date, value)| ReturnObservation {
                    date,
                    value: Some(value),
                })
                .collect(),
        }
    }

    /// Simple daily returns `p_t / p_{t-1} - 1` from dated closing prices.
    ///
    /// A return is missing when either price is missing or the previous price
    /// is not positive.
    pub fn from_prices(prices: &[(NaiveDate, Option<f64>)]) -> EquisimResult<Self> {
        if prices.len() < 2 {
            return Err(EquisimError::MissingData(
                "at least two prices are needed to derive a return".into(),
            ));
        }
        let observations = prices
            .windows(2)
            .map(|pair| {
                let (_, prev) = pair[0];
                let (date, curr) = pair[1];
                let value = match (prev, curr) {
                    (Some(p0), Some(p1)) if p0 > 0.0 => Some(p1 / p0 - 1.0),
                    _ => None,
                };
                ReturnObservation { date, value }
            })
            .collect();
        Ok(ReturnsSeries { observations })
    }

    pub fn len(&self) -> usize {
        self.observations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }

    /// Valid returns in order, with missing and non-finite entries dropped.
    pub fn cleaned(&self) -> Vec<f64> {
        self.observations
            .iter()
            .filter_map(|o| o.value)
            .filter(|v| v.is_finite())
            .collect()
    }

    pub fn dropped_count(&self) -> usize {
        self.len() - self.cleaned().len()
    }

    pub fn mean_return(&self) -> Option<f64> {
        let values = self.cleaned();
        if values.is_empty() {
            None
        } else {
            Some(values.iter().sum::<f64>() / values.len() as f64)
        }
    }

    pub fn date_range(&self) -> Option<(NaiveDate, NaiveDate)> {
        let first = self.observations.first()?.date;
        let last = self.observations.last()?.date;
        Some((first, last))
    }
}
