//! Inbound-hook signature verification (HMAC-SHA256).
//!
//! External systems POST to `/hooks/{name}` and sign the raw body with the
//! hook's shared secret. Verification is constant-time; a delivery with a
//! bad or missing signature is rejected before anything is enqueued.

use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::crypto::vault::{hex_decode, hex_encode};

// Type alias for HMAC-SHA256
type HmacSha256 = Hmac<Sha256>;

/// Errors from hook signature verification.
#[derive(Debug, thiserror::Error)]
pub enum HookAuthError {
    /// Signature did not match the body.
    #[error("hook signature verification failed")]
    SignatureInvalid,

    /// Signature header absent from the delivery.
    #[error("missing signature header: {0}")]
    MissingSignature(String),

    /// Invalid HMAC key.
    #[error("invalid HMAC key: {0}")]
    InvalidKey(String),
}

/// Verify an HMAC-SHA256 signature against a request body.
///
/// Uses constant-time comparison to prevent timing attacks.
///
/// # Arguments
/// - `secret`: The hook's shared secret
/// - `body`: The raw request body bytes
/// - `signature_hex`: The hex-encoded HMAC signature to verify
pub fn verify_hmac_sha256(
    secret: &[u8],
    body: &[u8],
    signature_hex: &str,
) -> Result<(), HookAuthError> {
    // Decode the expected signature from hex
    let expected_bytes =
        hex_decode(signature_hex).map_err(|_| HookAuthError::SignatureInvalid)?;

    // Compute HMAC
    let mut mac = HmacSha256::new_from_slice(secret)
        .map_err(|e| HookAuthError::InvalidKey(e.to_string()))?;
    mac.update(body);

    // Constant-time verification (via hmac crate's `verify_slice`)
    mac.verify_slice(&expected_bytes)
        .map_err(|_| HookAuthError::SignatureInvalid)
}

/// Verify an HMAC-SHA256 signature with an optional `sha256=` prefix.
///
/// GitHub-style senders sign as `sha256=<hex>`. This function handles both
/// prefixed and plain hex signatures.
pub fn verify_hmac_sha256_with_prefix(
    secret: &[u8],
    body: &[u8],
    signature: &str,
) -> Result<(), HookAuthError> {
    let hex_sig = signature.strip_prefix("sha256=").unwrap_or(signature);
    verify_hmac_sha256(secret, body, hex_sig)
}

/// Compute HMAC-SHA256 and return the hex-encoded signature.
///
/// Useful for generating test vectors and documenting a hook's signing
/// scheme for senders.
pub fn compute_hmac_sha256_hex(secret: &[u8], body: &[u8]) -> Result<String, HookAuthError> {
    let mut mac = HmacSha256::new_from_slice(secret)
        .map_err(|e| HookAuthError::InvalidKey(e.to_string()))?;
    mac.update(body);
    let result = mac.finalize();
    Ok(hex_encode(&result.into_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verify_hmac_sha256_valid() {
        let secret = b"whsec_form_provider";
        let body = b"{\"email\":\"ada@example.com\"}";

        let sig = compute_hmac_sha256_hex(secret, body).unwrap();
        assert!(verify_hmac_sha256(secret, body, &sig).is_ok());
    }

    #[test]
    fn test_verify_hmac_sha256_invalid_signature() {
        let secret = b"whsec_form_provider";
        let body = b"{\"email\":\"ada@example.com\"}";
        let wrong_sig = "deadbeefcafebabe0000000000000000000000000000000000000000000000aa";

        assert!(verify_hmac_sha256(secret, body, wrong_sig).is_err());
    }

    #[test]
    fn test_verify_hmac_sha256_wrong_body() {
        let secret = b"whsec_form_provider";
        let body = b"original body";
        let sig = compute_hmac_sha256_hex(secret, body).unwrap();

        // A tampered body must fail against the original signature.
        assert!(verify_hmac_sha256(secret, b"tampered body", &sig).is_err());
    }

    #[test]
    fn test_verify_hmac_sha256_wrong_secret() {
        let secret = b"whsec_form_provider";
        let body = b"payload";
        let sig = compute_hmac_sha256_hex(secret, body).unwrap();

        assert!(verify_hmac_sha256(b"wrong-secret", body, &sig).is_err());
    }

    #[test]
    fn test_verify_hmac_sha256_with_prefix() {
        let secret = b"whsec_form_provider";
        let body = b"payload data";
        let sig = compute_hmac_sha256_hex(secret, body).unwrap();

        // With sha256= prefix (GitHub style)
        let prefixed = format!("sha256={sig}");
        assert!(verify_hmac_sha256_with_prefix(secret, body, &prefixed).is_ok());

        // Without prefix
        assert!(verify_hmac_sha256_with_prefix(secret, body, &sig).is_ok());
    }

    #[test]
    fn test_verify_hmac_sha256_invalid_hex() {
        let secret = b"whsec_form_provider";
        let body = b"payload";

        assert!(verify_hmac_sha256(secret, body, "not-hex").is_err());
        assert!(verify_hmac_sha256(secret, body, "zz").is_err());
    }

    #[test]
    fn test_verify_hmac_sha256_empty_body() {
        let secret = b"whsec_form_provider";
        let body = b"";
        let sig = compute_hmac_sha256_hex(secret, body).unwrap();

        assert!(verify_hmac_sha256(secret, body, &sig).is_ok());
    }

    // RFC 4231 test vector 1 (known HMAC-SHA256 result)
    #[test]
    fn test_hmac_sha256_rfc4231_vector1() {
        let key = vec![0x0b_u8; 20]; // 20 bytes of 0x0b
        let data = b"Hi There";
        let expected_hex = "b0344c61d8db38535ca8afceaf0bf12b881dc200c9833da726e9376c2e32cff7";

        let computed = compute_hmac_sha256_hex(&key, data).unwrap();
        assert_eq!(computed, expected_hex);
        assert!(verify_hmac_sha256(&key, data, expected_hex).is_ok());
    }

    // RFC 4231 test vector 2
    #[test]
    fn test_hmac_sha256_rfc4231_vector2() {
        let key = b"Jefe";
        let data = b"what do ya want for nothing?";
        let expected_hex = "5bdcc146bf60754e6a042426089575c75a003f089d2739839dec58b964ec3843";

        let computed = compute_hmac_sha256_hex(key, data).unwrap();
        assert_eq!(computed, expected_hex);
        assert!(verify_hmac_sha256(key, data, expected_hex).is_ok());
    }
}
