//! Cash-out pipeline for the sandbox bank
//!
//! Covers the fiat conversion rules (rate and fee with banker's
//! rounding), TAN generation and delivery, the Circuit HTTP handlers
//! (pure `Result`-returning functions, converted to wire form by the
//! server binary), the Nexus payment-initiation connector, and the
//! background conversion monitor that drains newly posted regional
//! credits into fiat submissions.

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unused_qualifications)]

pub mod api;
pub mod error;
pub mod monitor;
pub mod nexus;
pub mod rates;
pub mod tan;

// Re-exports
pub use api::CircuitApi;
pub use error::{ApiError, ApiResult};
pub use monitor::{ConversionMonitor, MonitorConfig};
pub use nexus::{FiatConnector, NexusClient, PaymentInitiation};
pub use rates::{ConversionConfig, RatiosAndFees};
pub use tan::TanSender;
