//! RSA/AES primitives for EBICS
//!
//! Covers key encodings (PKCS#8 private, SPKI public), the E002 hybrid
//! scheme (random AES-128 transaction key in CBC mode with a zero IV,
//! wrapped under the recipient RSA key with RSAES-PKCS1-v1_5), A006 /
//! X002 signatures (RSASSA-PKCS1-v1_5 over SHA-256), and the EBICS
//! public key digest.

use crate::error::{EbicsError, Result};
use aes::cipher::generic_array::GenericArray;
use aes::cipher::{block_padding::Pkcs7, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use rsa::pkcs1v15::{Signature, SigningKey, VerifyingKey};
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePrivateKey, EncodePublicKey};
use rsa::signature::{SignatureEncoding, Signer, Verifier};
use rsa::traits::PublicKeyParts;
use rsa::{BigUint, Pkcs1v15Encrypt, RsaPrivateKey, RsaPublicKey};
use sha2::{Digest, Sha256};

type Aes128CbcEnc = cbc::Encryptor<aes::Aes128>;
type Aes128CbcDec = cbc::Decryptor<aes::Aes128>;

/// EBICS E002 uses a fixed zero IV; uniqueness comes from the
/// per-transaction AES key.
const E002_IV: [u8; 16] = [0u8; 16];

/// RSA modulus size for generated keys.
pub const RSA_KEY_BITS: usize = 2048;

/// Generate a fresh RSA private key.
pub fn generate_key() -> Result<RsaPrivateKey> {
    RsaPrivateKey::new(&mut rand::thread_rng(), RSA_KEY_BITS)
        .map_err(|e| EbicsError::Crypto(format!("key generation: {}", e)))
}

/// Encode a private key as PKCS#8 DER.
pub fn private_key_to_der(key: &RsaPrivateKey) -> Result<Vec<u8>> {
    Ok(key
        .to_pkcs8_der()
        .map_err(|e| EbicsError::Crypto(format!("pkcs8 encode: {}", e)))?
        .as_bytes()
        .to_vec())
}

/// Decode a private key from PKCS#8 DER.
pub fn private_key_from_der(der: &[u8]) -> Result<RsaPrivateKey> {
    RsaPrivateKey::from_pkcs8_der(der)
        .map_err(|e| EbicsError::Crypto(format!("pkcs8 decode: {}", e)))
}

/// Encode a public key as SubjectPublicKeyInfo DER.
pub fn public_key_to_der(key: &RsaPublicKey) -> Result<Vec<u8>> {
    Ok(key
        .to_public_key_der()
        .map_err(|e| EbicsError::Crypto(format!("spki encode: {}", e)))?
        .as_bytes()
        .to_vec())
}

/// Decode a public key from SubjectPublicKeyInfo DER.
pub fn public_key_from_der(der: &[u8]) -> Result<RsaPublicKey> {
    RsaPublicKey::from_public_key_der(der)
        .map_err(|e| EbicsError::Crypto(format!("spki decode: {}", e)))
}

/// Build a public key from big-endian modulus and exponent octets, as
/// carried in `RSAKeyValue` elements.
pub fn public_key_from_components(modulus: &[u8], exponent: &[u8]) -> Result<RsaPublicKey> {
    RsaPublicKey::new(
        BigUint::from_bytes_be(modulus),
        BigUint::from_bytes_be(exponent),
    )
    .map_err(|e| EbicsError::Crypto(format!("rsa components: {}", e)))
}

/// Big-endian modulus and exponent octets of a public key.
pub fn public_key_components(key: &RsaPublicKey) -> (Vec<u8>, Vec<u8>) {
    (key.n().to_bytes_be(), key.e().to_bytes_be())
}

/// EBICS public key digest: SHA-256 over
/// `lowercase_hex(exponent) ++ " " ++ lowercase_hex(modulus)`, leading
/// zero octets stripped.
pub fn public_key_digest(key: &RsaPublicKey) -> [u8; 32] {
    let strip = |bytes: Vec<u8>| -> Vec<u8> {
        let start = bytes.iter().position(|b| *b != 0).unwrap_or(bytes.len());
        bytes[start..].to_vec()
    };
    let exponent = hex::encode(strip(key.e().to_bytes_be()));
    let modulus = hex::encode(strip(key.n().to_bytes_be()));
    let mut hasher = Sha256::new();
    hasher.update(exponent.as_bytes());
    hasher.update(b" ");
    hasher.update(modulus.as_bytes());
    hasher.finalize().into()
}

/// SHA-256 of arbitrary bytes.
pub fn sha256(data: &[u8]) -> [u8; 32] {
    Sha256::digest(data).into()
}

/// RSASSA-PKCS1-v1_5 signature over SHA-256 of `message`.
pub fn sign_sha256(key: &RsaPrivateKey, message: &[u8]) -> Vec<u8> {
    let signing_key = SigningKey::<Sha256>::new(key.clone());
    signing_key.sign(message).to_vec()
}

/// Verify an RSASSA-PKCS1-v1_5/SHA-256 signature.
pub fn verify_sha256(key: &RsaPublicKey, message: &[u8], signature: &[u8]) -> Result<()> {
    let verifying_key = VerifyingKey::<Sha256>::new(key.clone());
    let signature = Signature::try_from(signature)
        .map_err(|e| EbicsError::Crypto(format!("signature encoding: {}", e)))?;
    verifying_key
        .verify(message, &signature)
        .map_err(|e| EbicsError::Crypto(format!("signature mismatch: {}", e)))
}

/// Result of an E002 encryption.
#[derive(Debug, Clone)]
pub struct E002Payload {
    /// AES transaction key wrapped under the recipient RSA key
    pub transaction_key_enc: Vec<u8>,
    /// AES-128-CBC ciphertext
    pub ciphertext: Vec<u8>,
}

/// Generate a random 128-bit transaction key.
pub fn generate_transaction_key() -> [u8; 16] {
    rand::Rng::gen(&mut rand::thread_rng())
}

/// AES-128-CBC encrypt under an explicit transaction key.
pub fn e002_encrypt_with_key(transaction_key: &[u8], plaintext: &[u8]) -> Result<Vec<u8>> {
    if transaction_key.len() != 16 {
        return Err(EbicsError::Crypto("bad transaction key length".into()));
    }
    let cipher = Aes128CbcEnc::new(
        GenericArray::from_slice(transaction_key),
        GenericArray::from_slice(&E002_IV),
    );
    Ok(cipher.encrypt_padded_vec_mut::<Pkcs7>(plaintext))
}

/// Wrap a transaction key under the recipient RSA key
/// (RSAES-PKCS1-v1_5).
pub fn wrap_transaction_key(recipient: &RsaPublicKey, transaction_key: &[u8]) -> Result<Vec<u8>> {
    recipient
        .encrypt(&mut rand::thread_rng(), Pkcs1v15Encrypt, transaction_key)
        .map_err(|e| EbicsError::Crypto(format!("key wrap: {}", e)))
}

/// E002-encrypt `plaintext` for `recipient` with a fresh key.
pub fn e002_encrypt(recipient: &RsaPublicKey, plaintext: &[u8]) -> Result<E002Payload> {
    let transaction_key = generate_transaction_key();
    let ciphertext = e002_encrypt_with_key(&transaction_key, plaintext)?;
    let transaction_key_enc = wrap_transaction_key(recipient, &transaction_key)?;
    Ok(E002Payload {
        transaction_key_enc,
        ciphertext,
    })
}

/// Unwrap an E002 transaction key with our private key.
pub fn e002_unwrap_key(own: &RsaPrivateKey, transaction_key_enc: &[u8]) -> Result<Vec<u8>> {
    let key = own
        .decrypt(Pkcs1v15Encrypt, transaction_key_enc)
        .map_err(|e| EbicsError::Crypto(format!("key unwrap: {}", e)))?;
    if key.len() != 16 {
        return Err(EbicsError::Crypto(format!(
            "transaction key has {} bytes, expected 16",
            key.len()
        )));
    }
    Ok(key)
}

/// Decrypt an E002 payload given the already unwrapped transaction key.
pub fn e002_decrypt_with_key(transaction_key: &[u8], ciphertext: &[u8]) -> Result<Vec<u8>> {
    if transaction_key.len() != 16 {
        return Err(EbicsError::Crypto("bad transaction key length".into()));
    }
    let cipher = Aes128CbcDec::new(
        GenericArray::from_slice(transaction_key),
        GenericArray::from_slice(&E002_IV),
    );
    cipher
        .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
        .map_err(|e| EbicsError::Crypto(format!("aes decrypt: {}", e)))
}

/// Unwrap the transaction key and decrypt in one step.
pub fn e002_decrypt(
    own: &RsaPrivateKey,
    transaction_key_enc: &[u8],
    ciphertext: &[u8],
) -> Result<Vec<u8>> {
    let key = e002_unwrap_key(own, transaction_key_enc)?;
    e002_decrypt_with_key(&key, ciphertext)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_key() -> RsaPrivateKey {
        // 1024-bit keys keep the test suite fast; production paths
        // generate RSA_KEY_BITS.
        RsaPrivateKey::new(&mut rand::thread_rng(), 1024).unwrap()
    }

    #[test]
    fn test_private_key_der_roundtrip() {
        let key = test_key();
        let der = private_key_to_der(&key).unwrap();
        let back = private_key_from_der(&der).unwrap();
        assert_eq!(key, back);
    }

    #[test]
    fn test_public_key_component_roundtrip() {
        let key = test_key().to_public_key();
        let (n, e) = public_key_components(&key);
        let back = public_key_from_components(&n, &e).unwrap();
        assert_eq!(key, back);
        assert_eq!(public_key_digest(&key), public_key_digest(&back));
    }

    #[test]
    fn test_e002_roundtrip() {
        let key = test_key();
        let plaintext = b"<SignaturePubKeyOrderData>x</SignaturePubKeyOrderData>";
        let payload = e002_encrypt(&key.to_public_key(), plaintext).unwrap();
        assert_ne!(payload.ciphertext, plaintext.to_vec());
        let decrypted =
            e002_decrypt(&key, &payload.transaction_key_enc, &payload.ciphertext).unwrap();
        assert_eq!(decrypted, plaintext.to_vec());
    }

    #[test]
    fn test_e002_rejects_wrong_key() {
        let key = test_key();
        let other = test_key();
        let payload = e002_encrypt(&key.to_public_key(), b"secret").unwrap();
        assert!(e002_decrypt(&other, &payload.transaction_key_enc, &payload.ciphertext).is_err());
    }

    #[test]
    fn test_sign_verify_roundtrip() {
        let key = test_key();
        let signature = sign_sha256(&key, b"order data");
        verify_sha256(&key.to_public_key(), b"order data", &signature).unwrap();
        assert!(verify_sha256(&key.to_public_key(), b"tampered", &signature).is_err());
    }

    #[test]
    fn test_public_key_digest_is_stable() {
        let key = test_key().to_public_key();
        assert_eq!(public_key_digest(&key), public_key_digest(&key));
        let other = test_key().to_public_key();
        assert_ne!(public_key_digest(&key), public_key_digest(&other));
    }
}
