//! Core business logic for Coffer.
//!
//! This crate contains the ledger rules with ZERO web or database dependencies.
//! All domain types, validation rules, and posting logic live here.
//!
//! # Modules
//!
//! - `wallet` - Wallet balances, holds and the append-only entry log
//! - `idempotency` - Idempotent result storage
//! - `journal` - Chart of accounts, double-entry postings and event templates
//! - `period` - Monthly financial periods
//! - `engine` - In-memory engine that serializes operations per wallet and tenant

pub mod engine;
pub mod idempotency;
pub mod journal;
pub mod period;
pub mod wallet;

pub use engine::LedgerEngine;
