//! Common types used across the application.

pub mod id;
pub mod money;
pub mod pagination;

pub use id::*;
pub use money::{CurrencyCode, MAX_AMOUNT_SCALE, MONEY_SCALE, is_valid_amount, round_money};
pub use pagination::{PageMeta, PageRequest, PageResponse};
