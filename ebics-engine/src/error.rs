//! Error types and EBICS return codes

use thiserror::Error;

/// Result type for engine operations
pub type Result<T> = std::result::Result<T, EbicsError>;

/// Six-digit EBICS technical/business return codes used by this core.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReturnCode {
    /// 000000
    Ok,
    /// 090005 — requested download has no data
    NoDownloadData,
    /// 091002 — unknown user or wrong subscriber state
    InvalidUserOrState,
    /// 091005 — order type not supported
    UnsupportedOrderType,
    /// 091010 — malformed or schema-invalid XML
    InvalidXml,
    /// 091011 — unknown host id
    InvalidHost,
    /// 091116 — generic processing failure
    ProcessingError,
    /// 091302 — envelope signature did not verify
    AuthorisationFailed,
    /// 060102 — request violates the protocol
    InvalidRequest,
}

impl ReturnCode {
    /// Wire representation.
    pub fn code(&self) -> &'static str {
        match self {
            ReturnCode::Ok => "000000",
            ReturnCode::NoDownloadData => "090005",
            ReturnCode::InvalidUserOrState => "091002",
            ReturnCode::UnsupportedOrderType => "091005",
            ReturnCode::InvalidXml => "091010",
            ReturnCode::InvalidHost => "091011",
            ReturnCode::ProcessingError => "091116",
            ReturnCode::AuthorisationFailed => "091302",
            ReturnCode::InvalidRequest => "060102",
        }
    }

    /// Human-readable report text for the response envelope.
    pub fn report_text(&self) -> &'static str {
        match self {
            ReturnCode::Ok => "[EBICS_OK] OK",
            ReturnCode::NoDownloadData => "[EBICS_NO_DOWNLOAD_DATA_AVAILABLE] No data available",
            ReturnCode::InvalidUserOrState => {
                "[EBICS_INVALID_USER_OR_USER_STATE] Unknown user or invalid user state"
            }
            ReturnCode::UnsupportedOrderType => "[EBICS_UNSUPPORTED_ORDER_TYPE] Unsupported order type",
            ReturnCode::InvalidXml => "[EBICS_INVALID_XML] Invalid XML",
            ReturnCode::InvalidHost => "[EBICS_INVALID_HOST_ID] Unknown host",
            ReturnCode::ProcessingError => "[EBICS_PROCESSING_ERROR] Processing error",
            ReturnCode::AuthorisationFailed => "[EBICS_AUTHORISATION_ORDER_FAILED] Signature failed",
            ReturnCode::InvalidRequest => "[EBICS_INVALID_REQUEST] Invalid request",
        }
    }
}

/// Engine errors.
///
/// Variants carrying a [`ReturnCode`] become signed protocol responses;
/// [`EbicsError::UnknownHost`] and [`EbicsError::BadEnvelope`] cannot
/// be signed and surface as plain HTTP 400.
#[derive(Error, Debug)]
pub enum EbicsError {
    /// Protocol failure rendered into the response envelope
    #[error("EBICS {code}: {message}", code = .0.code(), message = .1)]
    Protocol(ReturnCode, String),

    /// Host id does not resolve; response cannot be signed
    #[error("Unknown EBICS host: {0}")]
    UnknownHost(String),

    /// Envelope is not parseable enough to answer at all
    #[error("Malformed EBICS envelope: {0}")]
    BadEnvelope(String),

    /// Store/ledger failure below the protocol layer
    #[error("Ledger error: {0}")]
    Ledger(#[from] ledger_core::Error),

    /// Cryptographic failure on our side (bad stored keys etc.)
    #[error("Crypto error: {0}")]
    Crypto(String),

    /// Internal failure while rendering a response document
    #[error("Internal error: {0}")]
    Internal(String),
}

impl EbicsError {
    /// Shorthand for a protocol error.
    pub fn protocol(code: ReturnCode, message: impl Into<String>) -> Self {
        EbicsError::Protocol(code, message.into())
    }

    /// The return code this error maps to when a signed response is
    /// still possible.
    pub fn return_code(&self) -> ReturnCode {
        match self {
            EbicsError::Protocol(code, _) => *code,
            EbicsError::UnknownHost(_) => ReturnCode::InvalidHost,
            EbicsError::BadEnvelope(_) => ReturnCode::InvalidXml,
            EbicsError::Ledger(_) => ReturnCode::ProcessingError,
            EbicsError::Crypto(_) => ReturnCode::ProcessingError,
            EbicsError::Internal(_) => ReturnCode::ProcessingError,
        }
    }
}
