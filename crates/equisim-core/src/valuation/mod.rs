pub mod dcf;
pub mod inputs;
pub mod peers;
pub mod sensitivity;
pub mod wacc;

pub use dcf::{compute_valuation, ValuationResult};
pub use inputs::{
    FinancialInputs, FinancialTable, LineItem, TerminalMethod, ValuationSource, Workbook,
};
pub use peers::{compute_peer_comparison, PeerMultiple};
pub use sensitivity::{compute_discount_rate_profile, compute_sensitivity, SensitivityGrid};
