//! XMLDSig over EBICS envelopes
//!
//! Envelopes carry an `AuthSignature` computed with the authentication
//! key pair: SHA-256 digest of the canonical `header` element, then
//! RSASSA-PKCS1-v1_5 over the canonical `SignedInfo`. The canonical
//! form is this crate's own stable serialization (see [`crate::xml`]).

use crate::crypto;
use crate::error::{EbicsError, Result, ReturnCode};
use crate::transport::{b64_decode, b64_encode};
use rsa::{RsaPrivateKey, RsaPublicKey};
use serde::{Deserialize, Serialize};

const C14N_ALGORITHM: &str = "http://www.w3.org/TR/2001/REC-xml-c14n-20010315";
const SIGNATURE_ALGORITHM: &str = "http://www.w3.org/2001/04/xmldsig-more#rsa-sha256";
const DIGEST_ALGORITHM: &str = "http://www.w3.org/2001/04/xmlenc#sha256";
const REFERENCE_URI: &str = "#xpointer(//*[@authenticate='true'])";

/// An algorithm reference element.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlgorithmRef {
    /// Algorithm URI
    #[serde(rename = "@Algorithm")]
    pub algorithm: String,
}

/// The signed reference: what was digested and how.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignatureReference {
    /// XPointer to the authenticated envelope parts
    #[serde(rename = "@URI")]
    pub uri: String,
    /// Digest algorithm
    #[serde(rename = "DigestMethod")]
    pub digest_method: AlgorithmRef,
    /// Base64 digest value
    #[serde(rename = "DigestValue")]
    pub digest_value: String,
}

/// The signed info block.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignedInfo {
    /// Canonicalization declaration
    #[serde(rename = "CanonicalizationMethod")]
    pub canonicalization_method: AlgorithmRef,
    /// Signature algorithm declaration
    #[serde(rename = "SignatureMethod")]
    pub signature_method: AlgorithmRef,
    /// Digested reference
    #[serde(rename = "Reference")]
    pub reference: SignatureReference,
}

/// `AuthSignature` element of request and response envelopes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthSignature {
    /// Signed info block
    #[serde(rename = "SignedInfo")]
    pub signed_info: SignedInfo,
    /// Base64 RSASSA-PKCS1-v1_5 signature over the canonical signed info
    #[serde(rename = "SignatureValue")]
    pub signature_value: String,
}

/// Sign a canonical header with the authentication private key.
pub fn sign_header(header_canonical: &str, auth_key: &RsaPrivateKey) -> Result<AuthSignature> {
    let digest = crypto::sha256(header_canonical.as_bytes());
    let signed_info = SignedInfo {
        canonicalization_method: AlgorithmRef {
            algorithm: C14N_ALGORITHM.to_string(),
        },
        signature_method: AlgorithmRef {
            algorithm: SIGNATURE_ALGORITHM.to_string(),
        },
        reference: SignatureReference {
            uri: REFERENCE_URI.to_string(),
            digest_method: AlgorithmRef {
                algorithm: DIGEST_ALGORITHM.to_string(),
            },
            digest_value: b64_encode(&digest),
        },
    };
    let signed_info_canonical = crate::xml::element("SignedInfo", &signed_info)?;
    let signature = crypto::sign_sha256(auth_key, signed_info_canonical.as_bytes());
    Ok(AuthSignature {
        signed_info,
        signature_value: b64_encode(&signature),
    })
}

/// Verify an envelope signature against the peer authentication key.
///
/// Checks the digest over the canonical header, then the RSA signature
/// over the canonical signed info. Mismatches map to `091302`.
pub fn verify_header(
    auth_signature: &AuthSignature,
    header_canonical: &str,
    auth_key: &RsaPublicKey,
) -> Result<()> {
    let digest = crypto::sha256(header_canonical.as_bytes());
    let declared = b64_decode(&auth_signature.signed_info.reference.digest_value)?;
    if declared != digest {
        return Err(EbicsError::protocol(
            ReturnCode::AuthorisationFailed,
            "header digest mismatch",
        ));
    }
    let signed_info_canonical = crate::xml::element("SignedInfo", &auth_signature.signed_info)?;
    let signature = b64_decode(&auth_signature.signature_value)?;
    crypto::verify_sha256(auth_key, signed_info_canonical.as_bytes(), &signature).map_err(|_| {
        EbicsError::protocol(ReturnCode::AuthorisationFailed, "envelope signature invalid")
    })
}

/// Placeholder signature for envelopes built but not yet signed.
pub fn unsigned() -> AuthSignature {
    AuthSignature {
        signed_info: SignedInfo {
            canonicalization_method: AlgorithmRef {
                algorithm: C14N_ALGORITHM.to_string(),
            },
            signature_method: AlgorithmRef {
                algorithm: SIGNATURE_ALGORITHM.to_string(),
            },
            reference: SignatureReference {
                uri: REFERENCE_URI.to_string(),
                digest_method: AlgorithmRef {
                    algorithm: DIGEST_ALGORITHM.to_string(),
                },
                digest_value: String::new(),
            },
        },
        signature_value: String::new(),
    }
}
