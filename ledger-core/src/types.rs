//! Persisted row types and shared value types
//!
//! Every struct here is a plain row in the [`crate::store::Tables`]
//! snapshot. Balances are never stored; see [`crate::ledger`].

use crate::error::{Error, Result};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Booking direction of a ledger row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    /// Credit (money in)
    #[serde(rename = "CRDT")]
    Crdt,
    /// Debit (money out)
    #[serde(rename = "DBIT")]
    Dbit,
}

impl Direction {
    /// ISO-20022 code
    pub fn code(&self) -> &'static str {
        match self {
            Direction::Crdt => "CRDT",
            Direction::Dbit => "DBIT",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// A monetary amount carried with its currency, wire form `CUR:X.Y`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrencyAmount {
    /// ISO 4217-style currency code
    pub currency: String,
    /// Exact decimal value
    pub value: Decimal,
}

impl CurrencyAmount {
    /// Build from parts.
    pub fn new(currency: impl Into<String>, value: Decimal) -> Self {
        Self {
            currency: currency.into(),
            value,
        }
    }
}

impl FromStr for CurrencyAmount {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let (currency, number) = s
            .split_once(':')
            .ok_or_else(|| Error::InvalidAmount(format!("missing currency prefix: {}", s)))?;
        if currency.is_empty() || !currency.chars().all(|c| c.is_ascii_uppercase()) {
            return Err(Error::InvalidAmount(format!("bad currency: {}", s)));
        }
        let value = parse_plain_amount(number)?;
        Ok(Self {
            currency: currency.to_string(),
            value,
        })
    }
}

impl fmt::Display for CurrencyAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.currency, self.value)
    }
}

/// Parse an unsigned decimal matching `[0-9]+(\.[0-9]+)?`.
pub fn parse_plain_amount(s: &str) -> Result<Decimal> {
    let valid = match s.split_once('.') {
        Some((int, frac)) => {
            !int.is_empty()
                && !frac.is_empty()
                && int.bytes().all(|b| b.is_ascii_digit())
                && frac.bytes().all(|b| b.is_ascii_digit())
        }
        None => !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit()),
    };
    if !valid {
        return Err(Error::InvalidAmount(s.to_string()));
    }
    s.parse::<Decimal>()
        .map_err(|e| Error::InvalidAmount(format!("{}: {}", s, e)))
}

/// Customer record owning zero or one bank account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomerRow {
    /// Login name, also the label of the customer's bank account
    pub username: String,
    /// Legal name
    pub name: Option<String>,
    /// Contact e-mail for TAN delivery
    pub email: Option<String>,
    /// Contact phone for TAN delivery
    pub phone: Option<String>,
    /// Fiat destination account, `payto://iban/...`
    pub cashout_address: Option<String>,
}

/// Bank account row. The balance is derived, never stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BankAccountRow {
    /// Unique label (equals the owner username)
    pub label: String,
    /// Account IBAN
    pub iban: String,
    /// Servicing institution BIC
    pub bic: String,
    /// Owner username
    pub owner: String,
    /// Demobank this account belongs to
    pub demobank: String,
    /// Id of the most recently posted transaction, if any
    pub last_transaction: Option<i64>,
    /// Id of the last ledger row forwarded to the fiat connector
    pub last_fiat_submission: Option<i64>,
}

/// Immutable double-entry ledger row.
///
/// Postings always create two of these with the same
/// `account_servicer_ref` and opposite `direction`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerTransactionRow {
    /// Row id, ascending with posting order
    pub id: i64,
    /// Creditor party IBAN
    pub creditor_iban: String,
    /// Creditor agent BIC
    pub creditor_bic: Option<String>,
    /// Creditor display name
    pub creditor_name: String,
    /// Debtor party IBAN
    pub debtor_iban: String,
    /// Debtor agent BIC
    pub debtor_bic: Option<String>,
    /// Debtor display name
    pub debtor_name: String,
    /// Unstructured remittance subject
    pub subject: String,
    /// Posted amount, always positive
    pub amount: Decimal,
    /// Currency of the posting
    pub currency: String,
    /// Booking timestamp, milliseconds since epoch
    pub timestamp_ms: i64,
    /// Bank-generated unique reference shared by both rows of a posting
    pub account_servicer_ref: String,
    /// Payment information id from pain.001, when originated by CCT
    pub pmt_inf_id: Option<String>,
    /// End-to-end id from pain.001
    pub end_to_end_id: Option<String>,
    /// Which side of the posting this row books
    pub direction: Direction,
    /// Label of the account this row belongs to
    pub account_label: String,
    /// Demobank reference
    pub demobank: String,
}

/// Outbox pointer to a not-yet-reported ledger row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FreshTransactionRow {
    /// Outbox row id
    pub id: i64,
    /// Referenced ledger transaction
    pub transaction_id: i64,
    /// Account the referenced row belongs to
    pub account_label: String,
}

/// Persisted end-of-period statement snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatementRow {
    /// Row id, ascending per account
    pub id: i64,
    /// Statement identifier as rendered into the CAMT document
    pub statement_id: String,
    /// Account this statement covers
    pub account_label: String,
    /// Creation timestamp, milliseconds since epoch
    pub creation_time_ms: i64,
    /// Serialized CAMT.053 document
    pub camt_xml: String,
    /// Closing booked balance (signed)
    pub balance_clbd: Decimal,
}

/// State of one subscriber public key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum KeyState {
    /// Key was never submitted
    Missing,
    /// Key submitted, not yet confirmed
    New,
    /// Key confirmed and usable
    Released,
}

/// One subscriber public key together with its lifecycle state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscriberKey {
    /// SubjectPublicKeyInfo DER encoding
    pub der: Vec<u8>,
    /// Lifecycle state
    pub state: KeyState,
}

/// Subscriber onboarding state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SubscriberState {
    /// No key material submitted
    New,
    /// INI received, HIA outstanding
    PartiallyIni,
    /// HIA received, INI outstanding
    PartiallyHia,
    /// INI and HIA received, business orders allowed
    Initialized,
    /// Bank keys confirmed out-of-band (not enforced here)
    Ready,
}

/// EBICS host: the bank side of the protocol, with its three key pairs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EbicsHostRow {
    /// Textual host identifier, matched case-insensitively
    pub host_id: String,
    /// Signature private key, PKCS#8 DER
    pub signature_key_der: Vec<u8>,
    /// Encryption private key, PKCS#8 DER
    pub encryption_key_der: Vec<u8>,
    /// Authentication private key, PKCS#8 DER (signs outgoing envelopes)
    pub authentication_key_der: Vec<u8>,
}

/// EBICS subscriber keyed by (partner, user, optional system) per host.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EbicsSubscriberRow {
    /// Row id
    pub id: i64,
    /// Owning host
    pub host_id: String,
    /// Partner (customer) id
    pub partner_id: String,
    /// User id
    pub user_id: String,
    /// Optional technical system id
    pub system_id: Option<String>,
    /// Onboarding state
    pub state: SubscriberState,
    /// Monotonic counter feeding upload order ids
    pub next_order_id: u32,
    /// A005/A006 signature public key
    pub signature_key: Option<SubscriberKey>,
    /// E002 encryption public key
    pub encryption_key: Option<SubscriberKey>,
    /// X002 authentication public key
    pub authentication_key: Option<SubscriberKey>,
    /// Linked bank account label, if any
    pub bank_account: Option<String>,
}

impl EbicsSubscriberRow {
    /// Lifecycle state of the signature key slot.
    pub fn signature_key_state(&self) -> KeyState {
        self.signature_key.as_ref().map_or(KeyState::Missing, |k| k.state)
    }

    /// Lifecycle state of the encryption key slot.
    pub fn encryption_key_state(&self) -> KeyState {
        self.encryption_key.as_ref().map_or(KeyState::Missing, |k| k.state)
    }

    /// Lifecycle state of the authentication key slot.
    pub fn authentication_key_state(&self) -> KeyState {
        self.authentication_key
            .as_ref()
            .map_or(KeyState::Missing, |k| k.state)
    }
}

/// Server-side record of one download order in flight.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadTransactionRow {
    /// Host-generated transaction id (128 random bits, hex)
    pub transaction_id: String,
    /// Owning host
    pub host_id: String,
    /// Subscriber driving the download
    pub subscriber_id: i64,
    /// Order type, e.g. C52/C53/HTD
    pub order_type: String,
    /// Total number of segments
    pub num_segments: usize,
    /// Segment size in Base64 characters
    pub segment_size: usize,
    /// Complete Base64 encrypted payload
    pub encoded_response: String,
    /// Transaction key wrapped under the subscriber encryption key
    pub transaction_key_enc: Vec<u8>,
    /// Whether a positive receipt arrived
    pub receipt_received: bool,
}

/// Server-side record of one upload order in flight.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadTransactionRow {
    /// Host-generated transaction id
    pub transaction_id: String,
    /// Owning host
    pub host_id: String,
    /// Subscriber driving the upload
    pub subscriber_id: i64,
    /// Order type, e.g. CCT
    pub order_type: String,
    /// Allocated order id
    pub order_id: String,
    /// Declared number of segments
    pub num_segments: usize,
    /// Highest segment number received so far
    pub last_seen_segment: usize,
    /// Transaction key wrapped under the host encryption key
    pub transaction_key_enc: Vec<u8>,
}

/// A006 signature accompanying an upload, stored until verification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderSignatureRow {
    /// Row id
    pub id: i64,
    /// Order id the signature belongs to
    pub order_id: String,
    /// Order type the signature belongs to
    pub order_type: String,
    /// Signing partner
    pub partner_id: String,
    /// Signing user
    pub user_id: String,
    /// Signature algorithm version, e.g. A006
    pub signature_version: String,
    /// Raw signature value
    pub signature_value: Vec<u8>,
}

/// TAN delivery channel for cash-out confirmation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TanChannel {
    /// Deliver via the configured SMS command
    Sms,
    /// Deliver via the configured e-mail command
    Email,
    /// Write to the well-known TAN file
    File,
}

/// Cash-out operation status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CashoutStatus {
    /// Created, waiting for TAN confirmation
    Pending,
    /// TAN confirmed, regional leg posted
    Confirmed,
}

/// One cash-out operation. Transitions only PENDING → CONFIRMED.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CashoutOperationRow {
    /// Operation id
    pub uuid: Uuid,
    /// Regional amount debited from the owner
    pub amount_debit: CurrencyAmount,
    /// Fiat amount credited after conversion
    pub amount_credit: CurrencyAmount,
    /// Sell ratio captured at creation time
    pub sell_ratio: Decimal,
    /// Sell-out fee captured at creation time
    pub sell_fee: Decimal,
    /// Payment subject
    pub subject: String,
    /// Creation timestamp, milliseconds since epoch
    pub creation_time_ms: i64,
    /// Confirmation timestamp, set on PENDING → CONFIRMED
    pub confirmation_time_ms: Option<i64>,
    /// Channel the TAN went out on
    pub tan_channel: TanChannel,
    /// Owning account username
    pub account: String,
    /// Fiat destination, `payto://iban/...`
    pub cashout_address: String,
    /// Five-character TAN
    pub tan: String,
    /// Operation status
    pub status: CashoutStatus,
}

/// Record of one ledger row submitted to the external fiat connector.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CashoutSubmissionRow {
    /// Row id
    pub id: i64,
    /// The ledger transaction that was submitted
    pub transaction_id: i64,
    /// Submission timestamp, milliseconds since epoch
    pub submission_time_ms: i64,
    /// Connector response body, when one was received
    pub response_body: Option<String>,
    /// Whether the connector accepted the initiation
    pub is_submitted: bool,
    /// Whether submission failed (transport error or non-2xx)
    pub has_errors: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_currency_amount_parse() {
        let a: CurrencyAmount = "EUR:10.50".parse().unwrap();
        assert_eq!(a.currency, "EUR");
        assert_eq!(a.value, Decimal::new(1050, 2));
        assert_eq!(a.to_string(), "EUR:10.50");
    }

    #[test]
    fn test_currency_amount_rejects_garbage() {
        assert!("10.50".parse::<CurrencyAmount>().is_err());
        assert!("eur:10.50".parse::<CurrencyAmount>().is_err());
        assert!("EUR:".parse::<CurrencyAmount>().is_err());
        assert!("EUR:-4".parse::<CurrencyAmount>().is_err());
        assert!("EUR:1.".parse::<CurrencyAmount>().is_err());
        assert!("EUR:1.2.3".parse::<CurrencyAmount>().is_err());
    }

    #[test]
    fn test_plain_amount_grammar() {
        assert_eq!(parse_plain_amount("10.50").unwrap(), Decimal::new(1050, 2));
        assert_eq!(parse_plain_amount("7").unwrap(), Decimal::from(7));
        assert!(parse_plain_amount("+1").is_err());
        assert!(parse_plain_amount(".5").is_err());
        assert!(parse_plain_amount("1e3").is_err());
    }

    #[test]
    fn test_key_state_accessors_default_missing() {
        let sub = EbicsSubscriberRow {
            id: 1,
            host_id: "host".into(),
            partner_id: "p".into(),
            user_id: "u".into(),
            system_id: None,
            state: SubscriberState::New,
            next_order_id: 0,
            signature_key: None,
            encryption_key: None,
            authentication_key: None,
            bank_account: None,
        };
        assert_eq!(sub.signature_key_state(), KeyState::Missing);
        assert_eq!(sub.encryption_key_state(), KeyState::Missing);
        assert_eq!(sub.authentication_key_state(), KeyState::Missing);
    }
}
