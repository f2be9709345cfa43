//! Sandbox bank ledger core
//!
//! Double-entry ledger over an in-process transactional store.
//!
//! # Architecture
//!
//! - **Double entry**: every posting writes a CRDT/DBIT row pair
//! - **Derived balances**: accounts never store a balance, it is folded
//!   from the last statement plus newer rows
//! - **Fresh outbox**: unreported rows feed statement/report builders
//! - **Serializable store**: all multi-row mutations commit atomically
//!   with optimistic retry on conflict
//!
//! # Invariants
//!
//! - Σ(CRDT amounts) == Σ(DBIT amounts) per posting reference
//! - Both rows of a posting share subject, currency, timestamp
//! - Statement CLBD chain: PRCD of statement N+1 == CLBD of statement N

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unused_qualifications)]

pub mod config;
pub mod error;
pub mod ledger;
pub mod store;
pub mod types;

// Re-exports
pub use config::DemobankConfig;
pub use error::{Error, Result};
pub use ledger::{Ledger, PostingRequest, ADMIN_ACCOUNT};
pub use store::{Store, Tables};
pub use types::{
    BankAccountRow, CashoutOperationRow, CashoutStatus, CurrencyAmount, Direction,
    LedgerTransactionRow, SubscriberState, TanChannel,
};
