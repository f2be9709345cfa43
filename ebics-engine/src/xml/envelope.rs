//! EBICS H004 envelope models
//!
//! Serde/quick-xml mappings for the four inbound roots
//! (`ebicsHEVRequest`, `ebicsUnsecuredRequest`,
//! `ebicsNoPubKeyDigestsRequest`, `ebicsRequest`) and the two outbound
//! ones (`ebicsKeyManagementResponse`, `ebicsResponse`).

use crate::xml::signature::AuthSignature;
use serde::{Deserialize, Serialize};

/// EBICS H004 namespace.
pub const EBICS_NS: &str = "urn:org:ebics:H004";
/// HEV namespace.
pub const HEV_NS: &str = "http://www.ebics.org/H000";
/// Protocol version advertised via HEV.
pub const PROTOCOL_VERSION: &str = "H004";
/// Release number advertised via HEV.
pub const PROTOCOL_RELEASE: &str = "02.50";

/// An element with no content, e.g. `<mutable/>`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EmptyElement {}

/// Order type plus attribute, as used by key-management requests.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderDetails {
    /// Order type, e.g. INI/HIA/HPB
    #[serde(rename = "OrderType")]
    pub order_type: String,
    /// Order attribute, e.g. DZNNN/DZHNN
    #[serde(rename = "OrderAttribute")]
    pub order_attribute: String,
}

// ---------------------------------------------------------------------
// HEV
// ---------------------------------------------------------------------

/// `ebicsHEVRequest`: which protocol versions does this host speak.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HevRequest {
    /// Namespace attribute
    #[serde(rename = "@xmlns", default, skip_serializing_if = "Option::is_none")]
    pub xmlns: Option<String>,
    /// Host the client asks about
    #[serde(rename = "HostID")]
    pub host_id: String,
}

/// Return code block of the HEV response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemReturnCode {
    /// Six-digit code
    #[serde(rename = "ReturnCode")]
    pub return_code: String,
    /// Report text
    #[serde(rename = "ReportText")]
    pub report_text: String,
}

/// One supported version entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionNumber {
    /// Protocol version, e.g. H004
    #[serde(rename = "@ProtocolVersion")]
    pub protocol_version: String,
    /// Release number, e.g. 02.50
    #[serde(rename = "$text")]
    pub value: String,
}

/// `ebicsHEVResponse`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HevResponse {
    /// Namespace attribute
    #[serde(rename = "@xmlns")]
    pub xmlns: String,
    /// Outcome
    #[serde(rename = "SystemReturnCode")]
    pub system_return_code: SystemReturnCode,
    /// Supported versions; empty on error
    #[serde(rename = "VersionNumber", default, skip_serializing_if = "Vec::is_empty")]
    pub versions: Vec<VersionNumber>,
}

impl HevResponse {
    /// The versions this host speaks.
    pub fn supported(return_code: &str, report_text: &str) -> Self {
        Self {
            xmlns: HEV_NS.to_string(),
            system_return_code: SystemReturnCode {
                return_code: return_code.to_string(),
                report_text: report_text.to_string(),
            },
            versions: vec![VersionNumber {
                protocol_version: PROTOCOL_VERSION.to_string(),
                value: PROTOCOL_RELEASE.to_string(),
            }],
        }
    }
}

// ---------------------------------------------------------------------
// ebicsUnsecuredRequest (INI / HIA)
// ---------------------------------------------------------------------

/// Static header of the unsecured request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnsecuredStaticHeader {
    /// Host id
    #[serde(rename = "HostID")]
    pub host_id: String,
    /// Partner id
    #[serde(rename = "PartnerID")]
    pub partner_id: String,
    /// User id
    #[serde(rename = "UserID")]
    pub user_id: String,
    /// Optional technical system id
    #[serde(rename = "SystemID", default, skip_serializing_if = "Option::is_none")]
    pub system_id: Option<String>,
    /// Optional client product string
    #[serde(rename = "Product", default, skip_serializing_if = "Option::is_none")]
    pub product: Option<String>,
    /// INI or HIA
    #[serde(rename = "OrderDetails")]
    pub order_details: OrderDetails,
    /// Always "0000" in this sandbox
    #[serde(rename = "SecurityMedium")]
    pub security_medium: String,
}

/// Header of the unsecured request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnsecuredHeader {
    /// Whether the header is covered by a signature (it is not, here)
    #[serde(rename = "@authenticate", default)]
    pub authenticate: bool,
    /// Static part
    #[serde(rename = "static")]
    pub static_: UnsecuredStaticHeader,
    /// Empty mutable part
    #[serde(rename = "mutable", default, skip_serializing_if = "Option::is_none")]
    pub mutable: Option<EmptyElement>,
}

/// Body of the unsecured request: compressed, Base64 order data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnsecuredBody {
    /// Data transfer block
    #[serde(rename = "DataTransfer")]
    pub data_transfer: UnsecuredDataTransfer,
}

/// The single order-data leaf.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnsecuredDataTransfer {
    /// base64(zlib(xml))
    #[serde(rename = "OrderData")]
    pub order_data: String,
}

/// `ebicsUnsecuredRequest`: INI and HIA key submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EbicsUnsecuredRequest {
    /// Namespace attribute
    #[serde(rename = "@xmlns", default, skip_serializing_if = "Option::is_none")]
    pub xmlns: Option<String>,
    /// Protocol version attribute
    #[serde(rename = "@Version", default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// Protocol revision attribute
    #[serde(rename = "@Revision", default, skip_serializing_if = "Option::is_none")]
    pub revision: Option<String>,
    /// Header
    #[serde(rename = "header")]
    pub header: UnsecuredHeader,
    /// Body
    #[serde(rename = "body")]
    pub body: UnsecuredBody,
}

// ---------------------------------------------------------------------
// ebicsNoPubKeyDigestsRequest (HPB)
// ---------------------------------------------------------------------

/// Static header of the no-pub-key-digests request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NpkdStaticHeader {
    /// Host id
    #[serde(rename = "HostID")]
    pub host_id: String,
    /// Anti-replay nonce
    #[serde(rename = "Nonce", default, skip_serializing_if = "Option::is_none")]
    pub nonce: Option<String>,
    /// Request timestamp
    #[serde(rename = "Timestamp", default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    /// Partner id
    #[serde(rename = "PartnerID")]
    pub partner_id: String,
    /// User id
    #[serde(rename = "UserID")]
    pub user_id: String,
    /// Optional technical system id
    #[serde(rename = "SystemID", default, skip_serializing_if = "Option::is_none")]
    pub system_id: Option<String>,
    /// Optional client product string
    #[serde(rename = "Product", default, skip_serializing_if = "Option::is_none")]
    pub product: Option<String>,
    /// HPB
    #[serde(rename = "OrderDetails")]
    pub order_details: OrderDetails,
    /// Always "0000"
    #[serde(rename = "SecurityMedium")]
    pub security_medium: String,
}

/// Header of the no-pub-key-digests request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NpkdHeader {
    /// Signed header marker
    #[serde(rename = "@authenticate", default)]
    pub authenticate: bool,
    /// Static part
    #[serde(rename = "static")]
    pub static_: NpkdStaticHeader,
    /// Empty mutable part
    #[serde(rename = "mutable", default, skip_serializing_if = "Option::is_none")]
    pub mutable: Option<EmptyElement>,
}

/// `ebicsNoPubKeyDigestsRequest`: HPB bank-key download.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EbicsNpkdRequest {
    /// Namespace attribute
    #[serde(rename = "@xmlns", default, skip_serializing_if = "Option::is_none")]
    pub xmlns: Option<String>,
    /// Protocol version attribute
    #[serde(rename = "@Version", default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// Protocol revision attribute
    #[serde(rename = "@Revision", default, skip_serializing_if = "Option::is_none")]
    pub revision: Option<String>,
    /// Header, signed with the subscriber authentication key
    #[serde(rename = "header")]
    pub header: NpkdHeader,
    /// Envelope signature
    #[serde(rename = "AuthSignature")]
    pub auth_signature: AuthSignature,
    /// Empty body
    #[serde(rename = "body")]
    pub body: EmptyElement,
}

// ---------------------------------------------------------------------
// ebicsRequest (business orders, three phases)
// ---------------------------------------------------------------------

/// Optional date range filter for download orders.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DateRange {
    /// Inclusive start date, ISO `YYYY-MM-DD`
    #[serde(rename = "Start")]
    pub start: String,
    /// Inclusive end date
    #[serde(rename = "End")]
    pub end: String,
}

/// Standard order parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StandardOrderParams {
    /// Optional date range
    #[serde(rename = "DateRange", default, skip_serializing_if = "Option::is_none")]
    pub date_range: Option<DateRange>,
}

/// Order details of a business request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusinessOrderDetails {
    /// Order type, e.g. C52/C53/CCT
    #[serde(rename = "OrderType")]
    pub order_type: String,
    /// DZHNN for downloads, OZHNN for uploads
    #[serde(rename = "OrderAttribute")]
    pub order_attribute: String,
    /// Standard parameters
    #[serde(
        rename = "StandardOrderParams",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub standard_order_params: Option<StandardOrderParams>,
}

/// Digest of a bank public key, as confirmed by the client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PubKeyDigest {
    /// Key version, e.g. X002/E002
    #[serde(rename = "@Version")]
    pub version: String,
    /// Digest algorithm URI
    #[serde(rename = "@Algorithm", default, skip_serializing_if = "Option::is_none")]
    pub algorithm: Option<String>,
    /// Base64 digest
    #[serde(rename = "$text")]
    pub value: String,
}

/// Bank key digests confirmed by the client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BankPubKeyDigests {
    /// X002 digest
    #[serde(rename = "Authentication")]
    pub authentication: PubKeyDigest,
    /// E002 digest
    #[serde(rename = "Encryption")]
    pub encryption: PubKeyDigest,
}

/// Static header of a business request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestStaticHeader {
    /// Host id
    #[serde(rename = "HostID")]
    pub host_id: String,
    /// Nonce (initialisation only)
    #[serde(rename = "Nonce", default, skip_serializing_if = "Option::is_none")]
    pub nonce: Option<String>,
    /// Timestamp (initialisation only)
    #[serde(rename = "Timestamp", default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    /// Partner id (initialisation only)
    #[serde(rename = "PartnerID", default, skip_serializing_if = "Option::is_none")]
    pub partner_id: Option<String>,
    /// User id (initialisation only)
    #[serde(rename = "UserID", default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    /// Optional technical system id
    #[serde(rename = "SystemID", default, skip_serializing_if = "Option::is_none")]
    pub system_id: Option<String>,
    /// Optional client product string
    #[serde(rename = "Product", default, skip_serializing_if = "Option::is_none")]
    pub product: Option<String>,
    /// Order details (initialisation only)
    #[serde(rename = "OrderDetails", default, skip_serializing_if = "Option::is_none")]
    pub order_details: Option<BusinessOrderDetails>,
    /// Bank key digests (initialisation only)
    #[serde(
        rename = "BankPubKeyDigests",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub bank_pub_key_digests: Option<BankPubKeyDigests>,
    /// Security medium (initialisation only)
    #[serde(rename = "SecurityMedium", default, skip_serializing_if = "Option::is_none")]
    pub security_medium: Option<String>,
    /// Declared segment count (upload initialisation only)
    #[serde(rename = "NumSegments", default, skip_serializing_if = "Option::is_none")]
    pub num_segments: Option<usize>,
    /// Transaction id (transfer and receipt phases)
    #[serde(rename = "TransactionID", default, skip_serializing_if = "Option::is_none")]
    pub transaction_id: Option<String>,
}

/// The three phases of an EBICS order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransactionPhase {
    /// Order creation; downloads already carry the first segment back
    Initialisation,
    /// Segment exchange
    Transfer,
    /// Download acknowledgement
    Receipt,
}

/// Segment number with the last-segment marker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SegmentNumber {
    /// Whether this is the final segment
    #[serde(rename = "@lastSegment", default)]
    pub last_segment: bool,
    /// 1-indexed segment number
    #[serde(rename = "$text")]
    pub value: usize,
}

/// Mutable header of a business request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestMutableHeader {
    /// Current phase
    #[serde(rename = "TransactionPhase")]
    pub transaction_phase: TransactionPhase,
    /// Requested segment (transfer phase)
    #[serde(rename = "SegmentNumber", default, skip_serializing_if = "Option::is_none")]
    pub segment_number: Option<SegmentNumber>,
}

/// Header of a business request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestHeader {
    /// Signed header marker
    #[serde(rename = "@authenticate", default)]
    pub authenticate: bool,
    /// Static part
    #[serde(rename = "static")]
    pub static_: RequestStaticHeader,
    /// Mutable part
    #[serde(rename = "mutable")]
    pub mutable: RequestMutableHeader,
}

/// E002 encryption metadata attached to encrypted payloads.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataEncryptionInfo {
    /// Signed marker
    #[serde(rename = "@authenticate", default)]
    pub authenticate: bool,
    /// Digest of the recipient encryption key
    #[serde(rename = "EncryptionPubKeyDigest")]
    pub encryption_pub_key_digest: PubKeyDigest,
    /// Base64 wrapped AES transaction key
    #[serde(rename = "TransactionKey")]
    pub transaction_key: String,
}

/// Data transfer block of a business request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestDataTransfer {
    /// Present on upload initialisation and upload transfer
    #[serde(
        rename = "DataEncryptionInfo",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub data_encryption_info: Option<DataEncryptionInfo>,
    /// Encrypted, compressed `UserSignatureData` (upload initialisation)
    #[serde(rename = "SignatureData", default, skip_serializing_if = "Option::is_none")]
    pub signature_data: Option<String>,
    /// Encrypted, compressed order payload segment (upload transfer)
    #[serde(rename = "OrderData", default, skip_serializing_if = "Option::is_none")]
    pub order_data: Option<String>,
}

/// Receipt-phase acknowledgement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferReceipt {
    /// Signed marker
    #[serde(rename = "@authenticate", default)]
    pub authenticate: bool,
    /// Zero on success
    #[serde(rename = "ReceiptCode")]
    pub receipt_code: i32,
}

/// Body of a business request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RequestBody {
    /// Upload payloads
    #[serde(rename = "DataTransfer", default, skip_serializing_if = "Option::is_none")]
    pub data_transfer: Option<RequestDataTransfer>,
    /// Receipt acknowledgement
    #[serde(rename = "TransferReceipt", default, skip_serializing_if = "Option::is_none")]
    pub transfer_receipt: Option<TransferReceipt>,
}

/// `ebicsRequest`: all business orders.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EbicsRequest {
    /// Namespace attribute
    #[serde(rename = "@xmlns", default, skip_serializing_if = "Option::is_none")]
    pub xmlns: Option<String>,
    /// Protocol version attribute
    #[serde(rename = "@Version", default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// Protocol revision attribute
    #[serde(rename = "@Revision", default, skip_serializing_if = "Option::is_none")]
    pub revision: Option<String>,
    /// Header
    #[serde(rename = "header")]
    pub header: RequestHeader,
    /// Envelope signature
    #[serde(rename = "AuthSignature")]
    pub auth_signature: AuthSignature,
    /// Body
    #[serde(rename = "body", default)]
    pub body: RequestBody,
}

// ---------------------------------------------------------------------
// ebicsResponse
// ---------------------------------------------------------------------

/// Static header of a business response.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResponseStaticHeader {
    /// Transaction id (set on initialisation)
    #[serde(rename = "TransactionID", default, skip_serializing_if = "Option::is_none")]
    pub transaction_id: Option<String>,
    /// Total segments of the download
    #[serde(rename = "NumSegments", default, skip_serializing_if = "Option::is_none")]
    pub num_segments: Option<usize>,
}

/// Mutable header of a business response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseMutableHeader {
    /// Phase being answered
    #[serde(rename = "TransactionPhase")]
    pub transaction_phase: TransactionPhase,
    /// Segment carried in this response
    #[serde(rename = "SegmentNumber", default, skip_serializing_if = "Option::is_none")]
    pub segment_number: Option<SegmentNumber>,
    /// Allocated order id (upload initialisation)
    #[serde(rename = "OrderID", default, skip_serializing_if = "Option::is_none")]
    pub order_id: Option<String>,
    /// Six-digit outcome
    #[serde(rename = "ReturnCode")]
    pub return_code: String,
    /// Report text matching the return code
    #[serde(rename = "ReportText")]
    pub report_text: String,
}

/// Header of a business response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseHeader {
    /// Signed marker
    #[serde(rename = "@authenticate", default)]
    pub authenticate: bool,
    /// Static part
    #[serde(rename = "static")]
    pub static_: ResponseStaticHeader,
    /// Mutable part
    #[serde(rename = "mutable")]
    pub mutable: ResponseMutableHeader,
}

/// Return code repeated in the signed body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BodyReturnCode {
    /// Signed marker
    #[serde(rename = "@authenticate", default)]
    pub authenticate: bool,
    /// Six-digit outcome
    #[serde(rename = "$text")]
    pub value: String,
}

/// Data transfer block of a business response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseDataTransfer {
    /// Present on the first download segment only
    #[serde(
        rename = "DataEncryptionInfo",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub data_encryption_info: Option<DataEncryptionInfo>,
    /// One Base64 segment of the encrypted payload
    #[serde(rename = "OrderData")]
    pub order_data: String,
}

/// Body of a business response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseBody {
    /// Download payload segment
    #[serde(rename = "DataTransfer", default, skip_serializing_if = "Option::is_none")]
    pub data_transfer: Option<ResponseDataTransfer>,
    /// Outcome
    #[serde(rename = "ReturnCode")]
    pub return_code: BodyReturnCode,
}

/// `ebicsResponse`: answer to every `ebicsRequest`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EbicsResponse {
    /// Namespace attribute
    #[serde(rename = "@xmlns")]
    pub xmlns: String,
    /// Protocol version attribute
    #[serde(rename = "@Version")]
    pub version: String,
    /// Protocol revision attribute
    #[serde(rename = "@Revision")]
    pub revision: String,
    /// Header
    #[serde(rename = "header")]
    pub header: ResponseHeader,
    /// Envelope signature (host authentication key)
    #[serde(rename = "AuthSignature")]
    pub auth_signature: AuthSignature,
    /// Body
    #[serde(rename = "body")]
    pub body: ResponseBody,
}

// ---------------------------------------------------------------------
// ebicsKeyManagementResponse
// ---------------------------------------------------------------------

/// Mutable header of the key-management response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyMgmtMutableHeader {
    /// Order id, e.g. OR01 on HPB
    #[serde(rename = "OrderID", default, skip_serializing_if = "Option::is_none")]
    pub order_id: Option<String>,
    /// Six-digit outcome
    #[serde(rename = "ReturnCode")]
    pub return_code: String,
    /// Report text
    #[serde(rename = "ReportText")]
    pub report_text: String,
}

/// Header of the key-management response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyMgmtHeader {
    /// Signed marker
    #[serde(rename = "@authenticate", default)]
    pub authenticate: bool,
    /// Empty static part
    #[serde(rename = "static")]
    pub static_: EmptyElement,
    /// Mutable part
    #[serde(rename = "mutable")]
    pub mutable: KeyMgmtMutableHeader,
}

/// Data transfer block of the key-management response (HPB payload).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyMgmtDataTransfer {
    /// E002 wrapping of the bank keys
    #[serde(rename = "DataEncryptionInfo")]
    pub data_encryption_info: DataEncryptionInfo,
    /// base64(aes(zlib(HPBResponseOrderData)))
    #[serde(rename = "OrderData")]
    pub order_data: String,
}

/// Body of the key-management response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyMgmtBody {
    /// HPB payload
    #[serde(rename = "DataTransfer", default, skip_serializing_if = "Option::is_none")]
    pub data_transfer: Option<KeyMgmtDataTransfer>,
    /// Outcome
    #[serde(rename = "ReturnCode")]
    pub return_code: BodyReturnCode,
}

/// `ebicsKeyManagementResponse`: answer to INI/HIA/HPB.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EbicsKeyManagementResponse {
    /// Namespace attribute
    #[serde(rename = "@xmlns")]
    pub xmlns: String,
    /// Protocol version attribute
    #[serde(rename = "@Version")]
    pub version: String,
    /// Protocol revision attribute
    #[serde(rename = "@Revision")]
    pub revision: String,
    /// Header
    #[serde(rename = "header")]
    pub header: KeyMgmtHeader,
    /// Envelope signature (host authentication key)
    #[serde(rename = "AuthSignature")]
    pub auth_signature: AuthSignature,
    /// Body
    #[serde(rename = "body")]
    pub body: KeyMgmtBody,
}
