pub mod simulation;
pub mod valuation;
