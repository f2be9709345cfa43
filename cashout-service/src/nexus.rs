//! Fiat connector: payment initiations towards the external Nexus
//!
//! The monitor talks to the connector through the [`FiatConnector`]
//! trait so tests can substitute a recording double; the production
//! implementation posts JSON with HTTP basic auth.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// One payment initiation towards the fiat rail.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentInitiation {
    /// Client-side idempotency key (the posting reference)
    pub uid: String,
    /// Destination IBAN
    pub iban: String,
    /// Destination BIC
    pub bic: String,
    /// Amount as `CUR:X.Y`
    pub amount: String,
    /// Payment subject
    pub subject: String,
    /// Beneficiary name
    pub name: String,
}

/// Connector failures; the response body is kept for the submission
/// record when one was received.
#[derive(Error, Debug)]
#[error("fiat connector: {message}")]
pub struct ConnectorError {
    /// What went wrong
    pub message: String,
    /// Response body of a non-2xx answer, if any
    pub response_body: Option<String>,
}

/// Boundary to the external fiat system.
#[async_trait]
pub trait FiatConnector: Send + Sync {
    /// Submit one initiation; `Ok` carries the response body.
    async fn submit_payment_initiation(
        &self,
        initiation: &PaymentInitiation,
    ) -> Result<String, ConnectorError>;

    /// Connector name for logs.
    fn name(&self) -> &str;
}

/// HTTP client towards a Nexus instance.
pub struct NexusClient {
    base_url: String,
    username: String,
    password: String,
    account_at_nexus: String,
    http: reqwest::Client,
}

impl NexusClient {
    /// Build a client for `<base_url>/bank-accounts/<account>/payment-initiations`.
    pub fn new(
        base_url: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
        account_at_nexus: impl Into<String>,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            username: username.into(),
            password: password.into(),
            account_at_nexus: account_at_nexus.into(),
            http: reqwest::Client::new(),
        }
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/bank-accounts/{}/payment-initiations",
            self.base_url.trim_end_matches('/'),
            self.account_at_nexus
        )
    }
}

#[async_trait]
impl FiatConnector for NexusClient {
    async fn submit_payment_initiation(
        &self,
        initiation: &PaymentInitiation,
    ) -> Result<String, ConnectorError> {
        let endpoint = self.endpoint();
        debug!(uid = %initiation.uid, %endpoint, "submitting payment initiation");
        let response = self
            .http
            .post(&endpoint)
            .basic_auth(&self.username, Some(&self.password))
            .json(initiation)
            .send()
            .await
            .map_err(|e| ConnectorError {
                message: format!("transport: {}", e),
                response_body: None,
            })?;
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        if status.is_success() {
            Ok(body)
        } else {
            Err(ConnectorError {
                message: format!("nexus answered {}", status),
                response_body: Some(body),
            })
        }
    }

    fn name(&self) -> &str {
        "nexus"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_shape() {
        let client = NexusClient::new("http://localhost:5001/", "sandbox", "secret", "admin");
        assert_eq!(
            client.endpoint(),
            "http://localhost:5001/bank-accounts/admin/payment-initiations"
        );
    }

    #[test]
    fn test_initiation_serializes_flat() {
        let initiation = PaymentInitiation {
            uid: "REF00001".to_string(),
            iban: "CH99".to_string(),
            bic: "SANDBOXX".to_string(),
            amount: "CHF:19".to_string(),
            subject: "cash-out".to_string(),
            name: "admin".to_string(),
        };
        let json = serde_json::to_value(&initiation).unwrap();
        assert_eq!(json["uid"], "REF00001");
        assert_eq!(json["amount"], "CHF:19");
    }
}
