use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::EquisimError;
use crate::types::{Money, Multiple, Rate};
use crate::EquisimResult;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Which terminal value drives enterprise and equity value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TerminalMethod {
    /// Gordon growth: TV = FCF_last * (1+g) / (r - g)
    #[default]
    Perpetuity,
    /// Exit multiple: TV = exit_multiple * terminal_metric
    Multiples,
}

impl std::fmt::Display for TerminalMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TerminalMethod::Perpetuity => write!(f, "Perpetuity"),
            TerminalMethod::Multiples => write!(f, "Multiples"),
        }
    }
}

/// Named, typed inputs to the DCF valuation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinancialInputs {
    /// Projected free cash flow per forecast year, in order
    pub free_cash_flows: Vec<Money>,
    /// Discount rate (WACC), fraction in (0, 1)
    pub discount_rate: Rate,
    /// Perpetuity growth rate; must be below the discount rate
    pub terminal_growth_rate: Rate,
    /// Debt minus cash
    pub net_debt: Money,
    /// Diluted shares outstanding
    pub shares_outstanding: Decimal,
    /// Observed market price, used only for comparison
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_share_price: Option<Money>,
    /// Exit multiple for the multiples-based terminal value
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_multiple: Option<Multiple>,
    /// Terminal-year metric (e.g. EBITDA) the exit multiple applies to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub terminal_metric: Option<Money>,
    /// Company metric that peer multiples apply to (e.g. LTM EBITDA)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub peer_multiple_reference: Option<Money>,
    #[serde(default)]
    pub terminal_method: TerminalMethod,
    /// Discount explicit-period cash flows at t - 0.5 (default: false)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mid_year_convention: Option<bool>,
}

impl FinancialInputs {
    /// Single validation point for every valuation operation.
    pub fn validate(&self) -> EquisimResult<()> {
        self.validate_structure()?;
        if self.discount_rate <= Decimal::ZERO || self.discount_rate >= Decimal::ONE {
            return Err(EquisimError::assumption(
                "discount_rate",
                format!(
                    "Discount rate must be between 0 and 1 (exclusive), got {}",
                    self.discount_rate
                ),
            ));
        }
        if self.terminal_method == TerminalMethod::Perpetuity
            && self.discount_rate <= self.terminal_growth_rate
        {
            return Err(EquisimError::assumption(
                "terminal_growth_rate",
                format!(
                    "Terminal growth rate ({}) must be less than the discount rate ({}) for the perpetuity method",
                    self.terminal_growth_rate, self.discount_rate
                ),
            ));
        }
        Ok(())
    }

    /// Checks that do not depend on the discount or growth rate.
    pub fn validate_structure(&self) -> EquisimResult<()> {
        if self.free_cash_flows.is_empty() {
            return Err(EquisimError::MissingData(
                "free_cash_flows: at least one projected year is required".into(),
            ));
        }
        if self.shares_outstanding <= Decimal::ZERO {
            return Err(EquisimError::assumption(
                "shares_outstanding",
                "Shares outstanding must be positive",
            ));
        }
        if self.terminal_method == TerminalMethod::Multiples {
            if self.exit_multiple.is_none() {
                return Err(EquisimError::MissingData(
                    "exit_multiple: required for the multiples terminal method".into(),
                ));
            }
            if self.terminal_metric.is_none() {
                return Err(EquisimError::MissingData(
                    "terminal_metric: required for the multiples terminal method".into(),
                ));
            }
        }
        if let Some(price) = self.current_share_price {
            if price <= Decimal::ZERO {
                return Err(EquisimError::assumption(
                    "current_share_price",
                    "Observed share price must be positive when provided",
                ));
            }
        }
        Ok(())
    }

    /// Same inputs with a different discount rate and growth rate.
    pub fn with_rates(&self, discount_rate: Rate, terminal_growth_rate: Rate) -> Self {
        FinancialInputs {
            discount_rate,
            terminal_growth_rate,
            ..self.clone()
        }
    }

    /// Build inputs from a table of named line items.
    ///
    /// Only the structure is checked here. The rate checks depend on the
    /// terminal method, which callers may still override, so they run when
    /// the inputs are valued.
    pub fn from_table(table: &FinancialTable) -> EquisimResult<Self> {
        let free_cash_flows = table.require_series(LineItemKey::FreeCashFlow)?;
        let inputs = FinancialInputs {
            free_cash_flows,
            discount_rate: table.require_scalar(LineItemKey::DiscountRate)?,
            terminal_growth_rate: table.require_scalar(LineItemKey::TerminalGrowthRate)?,
            net_debt: table.require_scalar(LineItemKey::NetDebt)?,
            shares_outstanding: table.require_scalar(LineItemKey::SharesOutstanding)?,
            current_share_price: table.scalar(LineItemKey::CurrentSharePrice),
            exit_multiple: table.scalar(LineItemKey::ExitMultiple),
            terminal_metric: table.scalar(LineItemKey::TerminalMetric),
            peer_multiple_reference: table.scalar(LineItemKey::PeerMultipleReference),
            terminal_method: TerminalMethod::Perpetuity,
            mid_year_convention: None,
        };
        inputs.validate_structure()?;
        Ok(inputs)
    }
}

// ---------------------------------------------------------------------------
// Tables of named line items
// ---------------------------------------------------------------------------

/// One labelled row of a financial model. Empty cells are `None`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    pub label: String,
    pub values: Vec<Option<Decimal>>,
}

/// An ordered set of named line items (one sheet of a financial model).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FinancialTable {
    pub rows: Vec<LineItem>,
}

/// Named sheets of a financial model.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Workbook {
    pub sheets: BTreeMap<String, FinancialTable>,
}

/// Sheet name the valuation reads from by default.
pub const DCF_SHEET: &str = "DCF";

impl Workbook {
    pub fn sheet(&self, name: &str) -> EquisimResult<&FinancialTable> {
        self.sheets
            .get(name)
            .ok_or_else(|| EquisimError::MissingData(format!("workbook has no '{name}' sheet")))
    }

    pub fn financial_inputs(&self) -> EquisimResult<FinancialInputs> {
        FinancialInputs::from_table(self.sheet(DCF_SHEET)?)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LineItemKey {
    FreeCashFlow,
    DiscountRate,
    TerminalGrowthRate,
    NetDebt,
    SharesOutstanding,
    CurrentSharePrice,
    ExitMultiple,
    TerminalMetric,
    PeerMultipleReference,
}

impl LineItemKey {
    fn field(self) -> &'static str {
        match self {
            LineItemKey::FreeCashFlow => "free_cash_flows",
            LineItemKey::DiscountRate => "discount_rate",
            LineItemKey::TerminalGrowthRate => "terminal_growth_rate",
            LineItemKey::NetDebt => "net_debt",
            LineItemKey::SharesOutstanding => "shares_outstanding",
            LineItemKey::CurrentSharePrice => "current_share_price",
            LineItemKey::ExitMultiple => "exit_multiple",
            LineItemKey::TerminalMetric => "terminal_metric",
            LineItemKey::PeerMultipleReference => "peer_multiple_reference",
        }
    }

    /// Accepted labels, already normalised (lowercase alphanumerics only).
    fn aliases(self) -> &'static [&'static str] {
        match self {
            LineItemKey::FreeCashFlow => &[
                "freecashflows",
                "freecashflow",
                "fcf",
                "fcff",
                "unleveredfreecashflow",
            ],
            LineItemKey::DiscountRate => &["discountrate", "wacc"],
            LineItemKey::TerminalGrowthRate => &[
                "terminalgrowthrate",
                "terminalgrowth",
                "perpetuitygrowthrate",
                "longtermgrowthrate",
            ],
            LineItemKey::NetDebt => &["netdebt"],
            LineItemKey::SharesOutstanding => &[
                "sharesoutstanding",
                "dilutedsharesoutstanding",
                "numberofshares",
            ],
            LineItemKey::CurrentSharePrice => &["currentshareprice", "shareprice", "marketprice"],
            LineItemKey::ExitMultiple => &["exitmultiple", "terminalmultiple", "evebitdamultiple"],
            LineItemKey::TerminalMetric => &["terminalmetric", "terminalebitda", "terminalyearebitda"],
            LineItemKey::PeerMultipleReference => &[
                "peermultiplereference",
                "ltmebitda",
                "ebitda",
            ],
        }
    }
}

fn normalise_label(label: &str) -> String {
    label
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

impl FinancialTable {
    pub fn new(rows: Vec<LineItem>) -> Self {
        FinancialTable { rows }
    }

    fn find(&self, key: LineItemKey) -> Option<&LineItem> {
        let aliases = key.aliases();
        self.rows
            .iter()
            .find(|row| aliases.contains(&normalise_label(&row.label).as_str()))
    }

    fn series(&self, key: LineItemKey) -> Option<Vec<Decimal>> {
        let values: Vec<Decimal> = self.find(key)?.values.iter().flatten().copied().collect();
        if values.is_empty() {
            None
        } else {
            Some(values)
        }
    }

    /// First populated cell of the row.
    fn scalar(&self, key: LineItemKey) -> Option<Decimal> {
        self.find(key)?.values.iter().flatten().next().copied()
    }

    fn require_series(&self, key: LineItemKey) -> EquisimResult<Vec<Decimal>> {
        self.series(key).ok_or_else(|| missing_line_item(key))
    }

    fn require_scalar(&self, key: LineItemKey) -> EquisimResult<Decimal> {
        self.scalar(key).ok_or_else(|| missing_line_item(key))
    }
}

fn missing_line_item(key: LineItemKey) -> EquisimError {
    EquisimError::MissingData(format!(
        "{}: no populated line item found (accepted labels: {})",
        key.field(),
        key.aliases().join(", ")
    ))
}

/// A valuation document: typed inputs, or a workbook holding a DCF sheet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ValuationSource {
    Workbook(Workbook),
    Inputs(FinancialInputs),
}

impl ValuationSource {
    pub fn into_inputs(self) -> EquisimResult<FinancialInputs> {
        match self {
            ValuationSource::Workbook(workbook) => workbook.financial_inputs(),
            ValuationSource::Inputs(inputs) => Ok(inputs),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
