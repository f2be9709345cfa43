//! Demobank configuration
//!
//! One logical tenant of the sandbox: a currency plus debt limits.
//! Rows arrive from config files or admin calls as loose
//! `(field name, string value)` pairs; [`DemobankConfig::apply_field`]
//! is the explicit dispatch table that maps them onto typed fields,
//! with boolean/number/string coercion.

use crate::error::{Error, Result};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Configuration of one demobank tenant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DemobankConfig {
    /// Tenant name, e.g. "default"
    pub name: String,
    /// Regional currency every posting must match
    pub currency: String,
    /// How far the institutional "admin" account may go negative
    pub bank_debt_limit: Decimal,
    /// How far ordinary user accounts may go negative
    pub users_debt_limit: Decimal,
    /// Whether self-service account registration is open
    pub allow_registrations: bool,
}

impl Default for DemobankConfig {
    fn default() -> Self {
        Self {
            name: "default".to_string(),
            currency: "EUR".to_string(),
            bank_debt_limit: Decimal::from(1_000_000),
            users_debt_limit: Decimal::from(1000),
            allow_registrations: true,
        }
    }
}

impl DemobankConfig {
    /// Field names accepted by [`Self::apply_field`].
    pub fn field_names() -> &'static [&'static str] {
        &[
            "name",
            "currency",
            "bank_debt_limit",
            "users_debt_limit",
            "allow_registrations",
        ]
    }

    /// Set one field from its textual representation.
    pub fn apply_field(&mut self, field: &str, raw: &str) -> Result<()> {
        match field {
            "name" => self.name = coerce_string(raw),
            "currency" => {
                let c = coerce_string(raw);
                if c.is_empty() || !c.chars().all(|ch| ch.is_ascii_uppercase()) {
                    return Err(Error::Config(format!("bad currency: {}", raw)));
                }
                self.currency = c;
            }
            "bank_debt_limit" => self.bank_debt_limit = coerce_decimal(field, raw)?,
            "users_debt_limit" => self.users_debt_limit = coerce_decimal(field, raw)?,
            "allow_registrations" => self.allow_registrations = coerce_bool(field, raw)?,
            other => return Err(Error::Config(format!("unknown config field {}", other))),
        }
        Ok(())
    }
}

fn coerce_string(raw: &str) -> String {
    raw.trim().to_string()
}

fn coerce_decimal(field: &str, raw: &str) -> Result<Decimal> {
    raw.trim()
        .parse::<Decimal>()
        .map_err(|e| Error::Config(format!("{}: {}", field, e)))
}

fn coerce_bool(field: &str, raw: &str) -> Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "1" => Ok(true),
        "false" | "no" | "0" => Ok(false),
        other => Err(Error::Config(format!("{}: not a boolean: {}", field, other))),
    }
}
