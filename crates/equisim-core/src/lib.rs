pub mod error;
pub mod summary;
pub mod types;

#[cfg(feature = "valuation")]
pub mod valuation;

#[cfg(feature = "simulation")]
pub mod simulation;

pub use error::EquisimError;
pub use types::*;

/// Standard result type for all equisim operations
pub type EquisimResult<T> = Result<T, EquisimError>;
