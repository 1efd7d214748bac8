//! Monthly financial periods and posting gates.

pub mod error;
pub mod types;

pub use error::PeriodError;
pub use types::{FinancialPeriod, PeriodCode, PeriodStatus};
