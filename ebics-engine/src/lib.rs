//! EBICS H004 protocol engine for the sandbox bank
//!
//! Implements the bank side of EBICS: envelope dispatch, the
//! INI/HIA/HPB subscriber key lifecycle, the three-phase
//! INITIALISATION → TRANSFER → RECEIPT order state machine with
//! segmented transport and hybrid RSA/AES (E002) encryption, the
//! business order handlers (HTD/HKD/C52/C53/CCT/TSD/PTK), and the
//! CAMT.052/053 builder with PRCD/CLBD balance chaining.
//!
//! Protocol errors never surface as HTTP errors: they are rendered as
//! signed EBICS responses carrying the matching six-digit return code.
//! The only unsigned failure is an unknown host, since the host
//! identity is needed to sign anything.

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unused_qualifications)]

pub mod camt;
pub mod crypto;
pub mod engine;
pub mod error;
pub mod keys;
pub mod orders;
pub mod transport;
pub mod xml;

// Re-exports
pub use engine::EbicsEngine;
pub use error::{EbicsError, Result, ReturnCode};
