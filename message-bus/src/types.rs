//! Topic naming

use std::fmt;

/// A bus topic, always of the form `<domain>::<subject>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Topic(String);

impl Topic {
    /// Build a topic from a domain and a subject.
    pub fn new(domain: &str, subject: &str) -> Self {
        Self(format!("{}::{}", domain, subject))
    }

    /// Channel announcing freshly posted regional transactions for one
    /// bank account, keyed by account label.
    pub fn regio_tx(account_label: &str) -> Self {
        Self::new("REGIO_TX", account_label)
    }

    /// Channel announcing incoming fiat payments for one bank account.
    pub fn fiat_incoming(account_label: &str) -> Self {
        Self::new("FIAT_INCOMING", account_label)
    }

    /// Full channel name.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
