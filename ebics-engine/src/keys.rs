//! INI / HIA / HPB subscriber key lifecycle
//!
//! State machine per subscriber:
//!
//! ```text
//! NEW --INI--> PARTIALLY_INI --HIA--> INITIALIZED
//!   \--HIA--> PARTIALLY_HIA --INI--> INITIALIZED
//! ```
//!
//! HPB is only served in INITIALIZED (or READY) and returns the host
//! authentication and encryption public keys, E002-encrypted under the
//! subscriber encryption key. Physical-mail confirmation is skipped:
//! keys flip to RELEASED as soon as both submissions are in.

use crate::crypto;
use crate::error::{EbicsError, Result, ReturnCode};
use crate::transport;
use crate::xml;
use crate::xml::envelope::{
    DataEncryptionInfo, EbicsNpkdRequest, EbicsUnsecuredRequest, KeyMgmtDataTransfer, PubKeyDigest,
};
use crate::xml::order_data::{
    AuthenticationPubKeyInfo, EncryptionPubKeyInfo, HpbResponseOrderData, PubKeyValue, RsaKeyValue,
    SignaturePubKeyOrderData, ORDER_DATA_NS,
};
use crate::xml::signature;
use ledger_core::types::{KeyState, SubscriberKey, SubscriberState};
use ledger_core::Tables;
use rsa::{RsaPrivateKey, RsaPublicKey};
use tracing::info;

/// Order id of the HPB answer.
pub const HPB_ORDER_ID: &str = "OR01";

const SHA256_URI: &str = "http://www.w3.org/2001/04/xmlenc#sha256";

/// Decoded host key material used while answering one request.
pub struct HostKeys {
    /// The host id as stored
    pub host_id: String,
    /// Authentication private key (signs every outgoing envelope)
    pub authentication: RsaPrivateKey,
    /// Encryption private key (unwraps upload transaction keys)
    pub encryption: RsaPrivateKey,
}

impl HostKeys {
    /// Load and decode the key pairs of `host_id`.
    pub fn load(tables: &Tables, host_id: &str) -> Result<Self> {
        let row = tables
            .ebics_host(host_id)
            .map_err(|_| EbicsError::UnknownHost(host_id.to_string()))?;
        Ok(Self {
            host_id: row.host_id.clone(),
            authentication: crypto::private_key_from_der(&row.authentication_key_der)?,
            encryption: crypto::private_key_from_der(&row.encryption_key_der)?,
        })
    }
}

/// Decode a stored subscriber public key; a missing slot is a state
/// error, not a crypto error.
pub fn subscriber_public_key(slot: &Option<SubscriberKey>) -> Result<RsaPublicKey> {
    let key = slot.as_ref().ok_or_else(|| {
        EbicsError::protocol(ReturnCode::InvalidUserOrState, "subscriber key missing")
    })?;
    crypto::public_key_from_der(&key.der)
}

fn decode_key_material(value: &PubKeyValue) -> Result<Vec<u8>> {
    let modulus = transport::b64_decode(&value.rsa_key_value.modulus)?;
    let exponent = transport::b64_decode(&value.rsa_key_value.exponent)?;
    let key = crypto::public_key_from_components(&modulus, &exponent)?;
    crypto::public_key_to_der(&key)
}

fn unpack_order_data(order_data_b64: &str) -> Result<String> {
    let raw = transport::inflate(&transport::b64_decode(order_data_b64)?)?;
    String::from_utf8(raw)
        .map_err(|e| EbicsError::protocol(ReturnCode::InvalidXml, format!("order data: {}", e)))
}

fn release_keys_when_complete(
    signature_key: &mut Option<SubscriberKey>,
    encryption_key: &mut Option<SubscriberKey>,
    authentication_key: &mut Option<SubscriberKey>,
) {
    for slot in [signature_key, encryption_key, authentication_key] {
        if let Some(key) = slot {
            key.state = KeyState::Released;
        }
    }
}

/// Handle an INI order: record the subscriber signature public key.
pub fn process_ini(tables: &mut Tables, request: &EbicsUnsecuredRequest) -> Result<()> {
    let static_ = &request.header.static_;
    let subscriber = tables
        .subscriber_by_ids(
            &static_.host_id,
            &static_.partner_id,
            &static_.user_id,
            static_.system_id.as_deref(),
        )
        .ok_or_else(|| {
            EbicsError::protocol(ReturnCode::InvalidUserOrState, "unknown subscriber")
        })?
        .clone();
    let next_state = match subscriber.state {
        SubscriberState::New => SubscriberState::PartiallyIni,
        SubscriberState::PartiallyHia => SubscriberState::Initialized,
        _ => {
            return Err(EbicsError::protocol(
                ReturnCode::InvalidUserOrState,
                "INI already submitted",
            ))
        }
    };

    let xml_text = unpack_order_data(&request.body.data_transfer.order_data)?;
    let doc: SignaturePubKeyOrderData = xml::parse(&xml_text)?;
    let version = doc.signature_pub_key_info.signature_version.as_str();
    if version != "A005" && version != "A006" {
        return Err(EbicsError::protocol(
            ReturnCode::InvalidXml,
            format!("unsupported signature version {}", version),
        ));
    }
    let der = decode_key_material(&doc.signature_pub_key_info.pub_key_value)?;

    let row = tables.subscriber_mut(subscriber.id)?;
    row.signature_key = Some(SubscriberKey {
        der,
        state: KeyState::New,
    });
    row.state = next_state;
    if next_state == SubscriberState::Initialized {
        release_keys_when_complete(
            &mut row.signature_key,
            &mut row.encryption_key,
            &mut row.authentication_key,
        );
    }
    info!(
        user = %static_.user_id,
        partner = %static_.partner_id,
        state = ?next_state,
        "INI accepted"
    );
    Ok(())
}

/// Handle an HIA order: record authentication and encryption keys.
pub fn process_hia(tables: &mut Tables, request: &EbicsUnsecuredRequest) -> Result<()> {
    let static_ = &request.header.static_;
    let subscriber = tables
        .subscriber_by_ids(
            &static_.host_id,
            &static_.partner_id,
            &static_.user_id,
            static_.system_id.as_deref(),
        )
        .ok_or_else(|| {
            EbicsError::protocol(ReturnCode::InvalidUserOrState, "unknown subscriber")
        })?
        .clone();
    let next_state = match subscriber.state {
        SubscriberState::New => SubscriberState::PartiallyHia,
        SubscriberState::PartiallyIni => SubscriberState::Initialized,
        _ => {
            return Err(EbicsError::protocol(
                ReturnCode::InvalidUserOrState,
                "HIA already submitted",
            ))
        }
    };

    let xml_text = unpack_order_data(&request.body.data_transfer.order_data)?;
    let doc: crate::xml::order_data::HiaRequestOrderData = xml::parse(&xml_text)?;
    let auth_der = decode_key_material(&doc.authentication_pub_key_info.pub_key_value)?;
    let enc_der = decode_key_material(&doc.encryption_pub_key_info.pub_key_value)?;

    let row = tables.subscriber_mut(subscriber.id)?;
    row.authentication_key = Some(SubscriberKey {
        der: auth_der,
        state: KeyState::New,
    });
    row.encryption_key = Some(SubscriberKey {
        der: enc_der,
        state: KeyState::New,
    });
    row.state = next_state;
    if next_state == SubscriberState::Initialized {
        release_keys_when_complete(
            &mut row.signature_key,
            &mut row.encryption_key,
            &mut row.authentication_key,
        );
    }
    info!(
        user = %static_.user_id,
        partner = %static_.partner_id,
        state = ?next_state,
        "HIA accepted"
    );
    Ok(())
}

fn key_info_blocks(
    host: &HostKeys,
) -> Result<(AuthenticationPubKeyInfo, EncryptionPubKeyInfo)> {
    let to_value = |key: &RsaPublicKey| {
        let (modulus, exponent) = crypto::public_key_components(key);
        PubKeyValue {
            rsa_key_value: RsaKeyValue {
                modulus: transport::b64_encode(&modulus),
                exponent: transport::b64_encode(&exponent),
            },
            timestamp: None,
        }
    };
    Ok((
        AuthenticationPubKeyInfo {
            pub_key_value: to_value(&host.authentication.to_public_key()),
            authentication_version: "X002".to_string(),
        },
        EncryptionPubKeyInfo {
            pub_key_value: to_value(&host.encryption.to_public_key()),
            encryption_version: "E002".to_string(),
        },
    ))
}

/// Handle an HPB order: hand out the bank public keys.
///
/// Requires the subscriber to be INITIALIZED and the request signature
/// to verify against the stored subscriber authentication key.
pub fn process_hpb(
    tables: &Tables,
    request: &EbicsNpkdRequest,
    host: &HostKeys,
) -> Result<KeyMgmtDataTransfer> {
    let static_ = &request.header.static_;
    let subscriber = tables
        .subscriber_by_ids(
            &static_.host_id,
            &static_.partner_id,
            &static_.user_id,
            static_.system_id.as_deref(),
        )
        .ok_or_else(|| {
            EbicsError::protocol(ReturnCode::InvalidUserOrState, "unknown subscriber")
        })?;
    if !matches!(
        subscriber.state,
        SubscriberState::Initialized | SubscriberState::Ready
    ) {
        return Err(EbicsError::protocol(
            ReturnCode::InvalidUserOrState,
            "subscriber not initialized",
        ));
    }

    let auth_key = subscriber_public_key(&subscriber.authentication_key)?;
    let header_canonical = xml::element("header", &request.header)?;
    signature::verify_header(&request.auth_signature, &header_canonical, &auth_key)?;

    let (auth_info, enc_info) = key_info_blocks(host)?;
    let payload = xml::render(
        "HPBResponseOrderData",
        &HpbResponseOrderData {
            xmlns: Some(ORDER_DATA_NS.to_string()),
            authentication_pub_key_info: auth_info,
            encryption_pub_key_info: enc_info,
            host_id: host.host_id.clone(),
        },
    )?;

    let subscriber_enc = subscriber_public_key(&subscriber.encryption_key)?;
    let packed = transport::deflate(payload.as_bytes())?;
    let encrypted = crypto::e002_encrypt(&subscriber_enc, &packed)?;
    info!(user = %static_.user_id, "HPB served");
    Ok(KeyMgmtDataTransfer {
        data_encryption_info: DataEncryptionInfo {
            authenticate: true,
            encryption_pub_key_digest: PubKeyDigest {
                version: "E002".to_string(),
                algorithm: Some(SHA256_URI.to_string()),
                value: transport::b64_encode(&crypto::public_key_digest(&subscriber_enc)),
            },
            transaction_key: transport::b64_encode(&encrypted.transaction_key_enc),
        },
        order_data: transport::b64_encode(&encrypted.ciphertext),
    })
}
