//! EBICS order-data documents
//!
//! The XML payloads travelling inside envelopes: key submissions
//! (INI/HIA), the HPB bank-key answer, upload signature containers,
//! and the HTD/HKD partner-info documents.

use serde::{Deserialize, Serialize};

/// Namespace of H004 order-data documents.
pub const ORDER_DATA_NS: &str = "urn:org:ebics:H004";
/// Namespace of the S001 signature container.
pub const SIGNATURE_NS: &str = "http://www.ebics.org/S001";

/// RSA public key as Base64 big-endian modulus and exponent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RsaKeyValue {
    /// Base64 big-endian modulus
    #[serde(rename = "Modulus")]
    pub modulus: String,
    /// Base64 big-endian public exponent
    #[serde(rename = "Exponent")]
    pub exponent: String,
}

/// Wrapper carrying an RSA key value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PubKeyValue {
    /// The key material
    #[serde(rename = "RSAKeyValue")]
    pub rsa_key_value: RsaKeyValue,
    /// Optional creation timestamp
    #[serde(rename = "TimeStamp", default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

/// Signature key block of the INI order data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignaturePubKeyInfo {
    /// Key material
    #[serde(rename = "PubKeyValue")]
    pub pub_key_value: PubKeyValue,
    /// A005 or A006
    #[serde(rename = "SignatureVersion")]
    pub signature_version: String,
}

/// `SignaturePubKeyOrderData`: payload of an INI upload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignaturePubKeyOrderData {
    /// Namespace attribute
    #[serde(rename = "@xmlns", default, skip_serializing_if = "Option::is_none")]
    pub xmlns: Option<String>,
    /// Submitted signature key
    #[serde(rename = "SignaturePubKeyInfo")]
    pub signature_pub_key_info: SignaturePubKeyInfo,
    /// Submitting partner
    #[serde(rename = "PartnerID")]
    pub partner_id: String,
    /// Submitting user
    #[serde(rename = "UserID")]
    pub user_id: String,
}

/// Authentication key block (X002).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthenticationPubKeyInfo {
    /// Key material
    #[serde(rename = "PubKeyValue")]
    pub pub_key_value: PubKeyValue,
    /// X002
    #[serde(rename = "AuthenticationVersion")]
    pub authentication_version: String,
}

/// Encryption key block (E002).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncryptionPubKeyInfo {
    /// Key material
    #[serde(rename = "PubKeyValue")]
    pub pub_key_value: PubKeyValue,
    /// E002
    #[serde(rename = "EncryptionVersion")]
    pub encryption_version: String,
}

/// `HIARequestOrderData`: payload of an HIA upload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HiaRequestOrderData {
    /// Namespace attribute
    #[serde(rename = "@xmlns", default, skip_serializing_if = "Option::is_none")]
    pub xmlns: Option<String>,
    /// Submitted authentication key
    #[serde(rename = "AuthenticationPubKeyInfo")]
    pub authentication_pub_key_info: AuthenticationPubKeyInfo,
    /// Submitted encryption key
    #[serde(rename = "EncryptionPubKeyInfo")]
    pub encryption_pub_key_info: EncryptionPubKeyInfo,
    /// Submitting partner
    #[serde(rename = "PartnerID")]
    pub partner_id: String,
    /// Submitting user
    #[serde(rename = "UserID")]
    pub user_id: String,
}

/// `HPBResponseOrderData`: the bank's authentication and encryption
/// public keys, served encrypted under the subscriber encryption key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HpbResponseOrderData {
    /// Namespace attribute
    #[serde(rename = "@xmlns", default, skip_serializing_if = "Option::is_none")]
    pub xmlns: Option<String>,
    /// Bank authentication key
    #[serde(rename = "AuthenticationPubKeyInfo")]
    pub authentication_pub_key_info: AuthenticationPubKeyInfo,
    /// Bank encryption key
    #[serde(rename = "EncryptionPubKeyInfo")]
    pub encryption_pub_key_info: EncryptionPubKeyInfo,
    /// Serving host
    #[serde(rename = "HostID")]
    pub host_id: String,
}

/// One A005/A006 signature of an upload order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderSignatureData {
    /// Signature algorithm version
    #[serde(rename = "SignatureVersion")]
    pub signature_version: String,
    /// Base64 signature value
    #[serde(rename = "SignatureValue")]
    pub signature_value: String,
    /// Signing partner
    #[serde(rename = "PartnerID")]
    pub partner_id: String,
    /// Signing user
    #[serde(rename = "UserID")]
    pub user_id: String,
}

/// `UserSignatureData`: signatures accompanying an upload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserSignatureData {
    /// Namespace attribute
    #[serde(rename = "@xmlns", default, skip_serializing_if = "Option::is_none")]
    pub xmlns: Option<String>,
    /// One entry per signer
    #[serde(rename = "OrderSignatureData")]
    pub signatures: Vec<OrderSignatureData>,
}

// ---------------------------------------------------------------------
// HTD / HKD partner information
// ---------------------------------------------------------------------

/// Postal block of the partner info.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddressInfo {
    /// Institution display name
    #[serde(rename = "Name", default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// Bank block of the partner info.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BankInfo {
    /// Serving host id
    #[serde(rename = "HostID")]
    pub host_id: String,
}

/// A value flagged as international (IBAN/BIC).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InternationalValue {
    /// Always true here
    #[serde(rename = "@international")]
    pub international: bool,
    /// The IBAN or BIC
    #[serde(rename = "$text")]
    pub value: String,
}

/// One bank account of the subscriber's partner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountInfo {
    /// Account currency
    #[serde(rename = "@Currency")]
    pub currency: String,
    /// Account label
    #[serde(rename = "@ID")]
    pub id: String,
    /// IBAN
    #[serde(rename = "AccountNumber")]
    pub account_number: InternationalValue,
    /// BIC
    #[serde(rename = "BankCode")]
    pub bank_code: InternationalValue,
    /// Holder display name
    #[serde(rename = "AccountHolder")]
    pub account_holder: String,
}

/// One order type the bank offers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderInfo {
    /// Order type code
    #[serde(rename = "OrderType")]
    pub order_type: String,
    /// Upload or Download
    #[serde(rename = "TransferType")]
    pub transfer_type: String,
    /// Free-text description
    #[serde(rename = "Description")]
    pub description: String,
}

/// Partner block shared by HTD and HKD.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PartnerInfo {
    /// Address block
    #[serde(rename = "AddressInfo")]
    pub address_info: AddressInfo,
    /// Bank block
    #[serde(rename = "BankInfo")]
    pub bank_info: BankInfo,
    /// Accounts reachable through this subscription
    #[serde(rename = "AccountInfo", default, skip_serializing_if = "Vec::is_empty")]
    pub account_info: Vec<AccountInfo>,
    /// Offered order types
    #[serde(rename = "OrderInfo", default, skip_serializing_if = "Vec::is_empty")]
    pub order_info: Vec<OrderInfo>,
}

/// User id with its activation status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserIdWithStatus {
    /// 1 = active
    #[serde(rename = "@Status")]
    pub status: i32,
    /// The user id
    #[serde(rename = "$text")]
    pub value: String,
}

/// One permission grant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Permission {
    /// Space-separated order types
    #[serde(rename = "OrderTypes")]
    pub order_types: String,
}

/// User block of HTD/HKD.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserInfo {
    /// User id and status
    #[serde(rename = "UserID")]
    pub user_id: UserIdWithStatus,
    /// Display name
    #[serde(rename = "Name", default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Permissions
    #[serde(rename = "Permission", default, skip_serializing_if = "Vec::is_empty")]
    pub permissions: Vec<Permission>,
}

/// `HTDResponseOrderData`: partner info for the requesting user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HtdResponseOrderData {
    /// Namespace attribute
    #[serde(rename = "@xmlns", default, skip_serializing_if = "Option::is_none")]
    pub xmlns: Option<String>,
    /// Partner block
    #[serde(rename = "PartnerInfo")]
    pub partner_info: PartnerInfo,
    /// User block
    #[serde(rename = "UserInfo")]
    pub user_info: UserInfo,
}

/// `HKDResponseOrderData`: partner info for all of the partner's users.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HkdResponseOrderData {
    /// Namespace attribute
    #[serde(rename = "@xmlns", default, skip_serializing_if = "Option::is_none")]
    pub xmlns: Option<String>,
    /// Partner block
    #[serde(rename = "PartnerInfo")]
    pub partner_info: PartnerInfo,
    /// User blocks
    #[serde(rename = "UserInfo", default, skip_serializing_if = "Vec::is_empty")]
    pub user_info: Vec<UserInfo>,
}
