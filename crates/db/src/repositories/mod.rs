//! Repository abstractions for data access.
//!
//! Repositories provide a clean interface for database operations,
//! hiding the `SeaORM` implementation details from the rest of the application.

pub mod error;
pub mod idempotency;
pub mod journal;
pub mod period;
pub mod wallet;

mod mapping;

pub use error::RepositoryError;
pub use idempotency::PgIdempotencyStore;
pub use journal::JournalRepository;
pub use period::PeriodRepository;
pub use wallet::WalletRepository;
