//! Types every Coffer crate agrees on.
//!
//! - Typed ids (`TenantId`, `WalletId`, `JournalEntryId`, ...)
//! - ISO currency codes and the 4dp amount rules
//! - `PageRequest` / `PageResponse` for list endpoints
//! - `AppError`, the request-level error
//! - `AppConfig`, loaded from `config/` files and `COFFER__*` variables

pub mod config;
pub mod error;
pub mod types;

pub use config::AppConfig;
pub use error::{AppError, AppResult};
