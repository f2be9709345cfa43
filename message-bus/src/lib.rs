//! Notification bus for the sandbox bank
//!
//! In-process publish/subscribe channels used to fan ledger events out
//! to background workers (LISTEN/NOTIFY stand-in).
//!
//! Contract: `publish` never blocks, `wait` blocks up to a timeout,
//! `unlisten` is idempotent. Messages published to a channel with no
//! subscribers are dropped; delivery is best-effort and ordered per
//! subscriber.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod bus;
pub mod types;

pub use bus::{ListenHandle, NotificationBus};
pub use types::Topic;
