use hmac::{Hmac, Mac};
use sha2::Sha512;
use subtle::ConstantTimeEq;

type HmacSha512 = Hmac<Sha512>;

/// Generate a webhook signature.
///
/// Format: hex(HMAC-SHA512(body, secret)), computed over the raw body bytes.
pub fn generate_webhook_signature(secret: &str, body: &[u8]) -> Result<String, anyhow::Error> {
    let mut mac = HmacSha512::new_from_slice(secret.as_bytes())
        .map_err(|e| anyhow::anyhow!("Invalid key length: {}", e))?;

    mac.update(body);

    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Verify a webhook signature using constant-time comparison.
///
/// `body` must be the request payload exactly as received. Any failure
/// (empty secret, empty signature, hashing error, length mismatch) yields
/// `false`.
pub fn verify_webhook_signature(secret: &str, body: &[u8], signature: &str) -> bool {
    if secret.is_empty() || signature.is_empty() {
        return false;
    }

    let expected_signature = match generate_webhook_signature(secret, body) {
        Ok(sig) => sig,
        Err(e) => {
            tracing::warn!(error = %e, "Failed to compute webhook signature");
            return false;
        }
    };

    let expected_bytes = expected_signature.as_bytes();
    let signature_bytes = signature.as_bytes();

    if expected_bytes.len() != signature_bytes.len() {
        return false;
    }

    expected_bytes.ct_eq(signature_bytes).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "sk_test_abc123";
    const BODY: &[u8] = br#"{"event":"charge.success","data":{"reference":"ref_1","status":"success"}}"#;

    #[test]
    fn test_signature_generation_and_verification() {
        let signature = generate_webhook_signature(SECRET, BODY).unwrap();
        // SHA-512 digest is 64 bytes, 128 hex chars
        assert_eq!(signature.len(), 128);
        assert!(verify_webhook_signature(SECRET, BODY, &signature));
    }

    #[test]
    fn test_known_vector() {
        // RFC 4231 test case 2
        let signature = generate_webhook_signature("Jefe", b"what do ya want for nothing?").unwrap();
        assert_eq!(
            signature,
            "164b7a7bfcf819e2e395fbe73b56e0a387bd64222e831fd610270cd7ea2505549758bf75c05a994a6d034f65f8f0e6fdcaeab1a34d4a6b4b636e070a38bce737"
        );
    }

    #[test]
    fn test_every_body_byte_mutation_is_rejected() {
        let signature = generate_webhook_signature(SECRET, BODY).unwrap();

        for i in 0..BODY.len() {
            let mut tampered = BODY.to_vec();
            tampered[i] ^= 0x01;
            assert!(
                !verify_webhook_signature(SECRET, &tampered, &signature),
                "mutation at byte {} was accepted",
                i
            );
        }
    }

    #[test]
    fn test_every_signature_byte_mutation_is_rejected() {
        let signature = generate_webhook_signature(SECRET, BODY).unwrap();

        for i in 0..signature.len() {
            let mut tampered = signature.clone().into_bytes();
            tampered[i] = if tampered[i] == b'0' { b'1' } else { b'0' };
            let tampered = String::from_utf8(tampered).unwrap();
            assert!(
                !verify_webhook_signature(SECRET, BODY, &tampered),
                "mutation at char {} was accepted",
                i
            );
        }
    }

    #[test]
    fn test_uppercase_signature_is_rejected() {
        let signature = generate_webhook_signature(SECRET, BODY).unwrap();
        assert!(!verify_webhook_signature(
            SECRET,
            BODY,
            &signature.to_uppercase()
        ));
    }

    #[test]
    fn test_reserialized_body_is_rejected() {
        let signature = generate_webhook_signature(SECRET, BODY).unwrap();

        let value: serde_json::Value = serde_json::from_slice(BODY).unwrap();
        let reserialized = serde_json::to_vec_pretty(&value).unwrap();

        assert!(!verify_webhook_signature(SECRET, &reserialized, &signature));
    }

    #[test]
    fn test_wrong_secret() {
        let signature = generate_webhook_signature("other_secret", BODY).unwrap();
        assert!(!verify_webhook_signature(SECRET, BODY, &signature));
    }

    #[test]
    fn test_empty_inputs_fail_closed() {
        let signature = generate_webhook_signature(SECRET, BODY).unwrap();

        assert!(!verify_webhook_signature("", BODY, &signature));
        assert!(!verify_webhook_signature(SECRET, BODY, ""));
    }

    #[test]
    fn test_length_mismatch_fails_closed() {
        let signature = generate_webhook_signature(SECRET, BODY).unwrap();

        assert!(!verify_webhook_signature(SECRET, BODY, &signature[..64]));
        assert!(!verify_webhook_signature(
            SECRET,
            BODY,
            &format!("{}00", signature)
        ));
        assert!(!verify_webhook_signature(SECRET, BODY, "not-hex-at-all"));
    }

    #[test]
    fn test_empty_body_round_trip() {
        let signature = generate_webhook_signature(SECRET, b"").unwrap();
        assert!(verify_webhook_signature(SECRET, b"", &signature));
    }
}
