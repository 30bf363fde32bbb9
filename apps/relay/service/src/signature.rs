use axum::http::{HeaderMap, Method};
use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Utc};
use ed25519_dalek::{Signature, VerifyingKey};
use sha2::{Digest, Sha256};
use thiserror::Error;

pub const SIGNATURE_HEADER: &str = "x-agent-signature";
pub const SIGNATURE_ALG_HEADER: &str = "x-signature-alg";
pub const SIGNATURE_TIMESTAMP_HEADER: &str = "x-signature-timestamp";
pub const SIGNATURE_NONCE_HEADER: &str = "x-signature-nonce";
pub const SIGNATURE_BODY_HASH_HEADER: &str = "x-signature-body-hash";

pub const SIGNATURE_ALGORITHM: &str = "ed25519";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SignatureError {
    #[error("signature headers are missing or malformed")]
    MalformedHeaders,
    #[error("signature timestamp is outside the freshness window")]
    TimestampExpired,
    #[error("request body hash mismatch")]
    BodyHashMismatch,
    #[error("signature verification failed")]
    InvalidSignature,
}

/// The five signing headers every request must carry. All values are kept
/// verbatim; the canonical string is rebuilt from them server-side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureHeaders {
    pub signature: String,
    pub timestamp: String,
    pub nonce: String,
    pub body_hash: String,
}

impl SignatureHeaders {
    /// Extracts the signing headers, requiring all five to be present and
    /// non-empty and the algorithm to be `ed25519`.
    pub fn from_header_map(headers: &HeaderMap) -> Result<Self, SignatureError> {
        let signature = header_value(headers, SIGNATURE_HEADER)?;
        let algorithm = header_value(headers, SIGNATURE_ALG_HEADER)?;
        let timestamp = header_value(headers, SIGNATURE_TIMESTAMP_HEADER)?;
        let nonce = header_value(headers, SIGNATURE_NONCE_HEADER)?;
        let body_hash = header_value(headers, SIGNATURE_BODY_HASH_HEADER)?;

        if !algorithm.eq_ignore_ascii_case(SIGNATURE_ALGORITHM) {
            return Err(SignatureError::MalformedHeaders);
        }

        Ok(Self {
            signature,
            timestamp,
            nonce,
            body_hash,
        })
    }

    /// The signing timestamp parsed as ISO-8601. A timestamp that does not
    /// parse is a malformed header, not an expired one.
    pub fn parsed_timestamp(&self) -> Result<DateTime<Utc>, SignatureError> {
        DateTime::parse_from_rfc3339(self.timestamp.trim())
            .map(|value| value.with_timezone(&Utc))
            .map_err(|_| SignatureError::MalformedHeaders)
    }
}

fn header_value(headers: &HeaderMap, name: &str) -> Result<String, SignatureError> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(ToString::to_string)
        .ok_or(SignatureError::MalformedHeaders)
}

/// The exact string both sides sign: newline-joined method, path-with-query
/// below the service mount, timestamp, nonce, body hash, and agent id.
pub fn canonical_string(
    method: &Method,
    path_and_query: &str,
    timestamp: &str,
    nonce: &str,
    body_hash: &str,
    agent_id: &str,
) -> String {
    format!(
        "{}\n{}\n{}\n{}\n{}\n{}",
        method.as_str().to_uppercase(),
        path_and_query,
        timestamp,
        nonce,
        body_hash,
        agent_id,
    )
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Compares the computed body hash against the provided header value
/// without early exit on the first differing byte.
pub fn check_body_hash(body: &[u8], provided: &str) -> Result<(), SignatureError> {
    let computed = sha256_hex(body);
    if constant_time_eq(computed.as_bytes(), provided.trim().to_lowercase().as_bytes()) {
        Ok(())
    } else {
        Err(SignatureError::BodyHashMismatch)
    }
}

pub fn check_freshness(
    timestamp: DateTime<Utc>,
    now: DateTime<Utc>,
    tolerance_seconds: i64,
) -> Result<(), SignatureError> {
    let skew = (now - timestamp).num_seconds().abs();
    if skew > tolerance_seconds {
        return Err(SignatureError::TimestampExpired);
    }
    Ok(())
}

/// Verifies the detached base64url signature over the canonical string.
/// Every failure mode collapses to `InvalidSignature` so callers cannot
/// learn which field mismatched.
pub fn verify_detached(
    key: &VerifyingKey,
    canonical: &str,
    signature: &str,
) -> Result<(), SignatureError> {
    let raw = URL_SAFE_NO_PAD
        .decode(signature.trim())
        .map_err(|_| SignatureError::InvalidSignature)?;
    let signature = Signature::from_slice(&raw).map_err(|_| SignatureError::InvalidSignature)?;
    key.verify_strict(canonical.as_bytes(), &signature)
        .map_err(|_| SignatureError::InvalidSignature)
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (lhs, rhs) in a.iter().zip(b.iter()) {
        diff |= lhs ^ rhs;
    }
    diff == 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use base64::Engine as _;
    use chrono::Duration;
    use ed25519_dalek::{Signer, SigningKey};

    fn test_key() -> SigningKey {
        SigningKey::from_bytes(&[7u8; 32])
    }

    fn signed_headers() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(SIGNATURE_HEADER, HeaderValue::from_static("c2ln"));
        headers.insert(SIGNATURE_ALG_HEADER, HeaderValue::from_static("ed25519"));
        headers.insert(
            SIGNATURE_TIMESTAMP_HEADER,
            HeaderValue::from_static("2026-08-05T12:00:00Z"),
        );
        headers.insert(SIGNATURE_NONCE_HEADER, HeaderValue::from_static("nonce-1"));
        headers.insert(
            SIGNATURE_BODY_HASH_HEADER,
            HeaderValue::from_static("abc123"),
        );
        headers
    }

    #[test]
    fn canonical_string_joins_fields_in_order() {
        let canonical = canonical_string(
            &Method::POST,
            "/send",
            "2026-08-05T12:00:00Z",
            "nonce-1",
            "deadbeef",
            "alice",
        );
        assert_eq!(
            canonical,
            "POST\n/send\n2026-08-05T12:00:00Z\nnonce-1\ndeadbeef\nalice"
        );
    }

    #[test]
    fn headers_require_all_five_values() {
        for missing in [
            SIGNATURE_HEADER,
            SIGNATURE_ALG_HEADER,
            SIGNATURE_TIMESTAMP_HEADER,
            SIGNATURE_NONCE_HEADER,
            SIGNATURE_BODY_HASH_HEADER,
        ] {
            let mut headers = signed_headers();
            headers.remove(missing);
            assert_eq!(
                SignatureHeaders::from_header_map(&headers),
                Err(SignatureError::MalformedHeaders),
                "expected rejection without {missing}"
            );
        }
    }

    #[test]
    fn headers_reject_unknown_algorithm() {
        let mut headers = signed_headers();
        headers.insert(SIGNATURE_ALG_HEADER, HeaderValue::from_static("rsa-sha256"));
        assert_eq!(
            SignatureHeaders::from_header_map(&headers),
            Err(SignatureError::MalformedHeaders)
        );
    }

    #[test]
    fn unparseable_timestamp_is_malformed_not_expired() {
        let mut headers = signed_headers();
        headers.insert(
            SIGNATURE_TIMESTAMP_HEADER,
            HeaderValue::from_static("yesterday"),
        );
        let parsed = SignatureHeaders::from_header_map(&headers)
            .expect("headers present")
            .parsed_timestamp();
        assert_eq!(parsed.unwrap_err(), SignatureError::MalformedHeaders);
    }

    #[test]
    fn freshness_window_is_symmetric() {
        let now = Utc::now();
        assert!(check_freshness(now - Duration::seconds(299), now, 300).is_ok());
        assert!(check_freshness(now + Duration::seconds(299), now, 300).is_ok());
        assert_eq!(
            check_freshness(now - Duration::seconds(301), now, 300),
            Err(SignatureError::TimestampExpired)
        );
        assert_eq!(
            check_freshness(now + Duration::seconds(301), now, 300),
            Err(SignatureError::TimestampExpired)
        );
    }

    #[test]
    fn body_hash_accepts_uppercase_hex() {
        let body = b"{\"to\":\"bob\"}";
        let provided = sha256_hex(body).to_uppercase();
        assert!(check_body_hash(body, &provided).is_ok());
    }

    #[test]
    fn body_hash_rejects_tampered_body() {
        let provided = sha256_hex(b"original");
        assert_eq!(
            check_body_hash(b"tampered", &provided),
            Err(SignatureError::BodyHashMismatch)
        );
    }

    #[test]
    fn verify_round_trip_and_rejection() {
        let key = test_key();
        let canonical = canonical_string(
            &Method::POST,
            "/send",
            "2026-08-05T12:00:00Z",
            "nonce-1",
            "deadbeef",
            "alice",
        );
        let signature = URL_SAFE_NO_PAD.encode(key.sign(canonical.as_bytes()).to_bytes());

        assert!(verify_detached(&key.verifying_key(), &canonical, &signature).is_ok());

        let tampered = canonical.replace("alice", "mallory");
        assert_eq!(
            verify_detached(&key.verifying_key(), &tampered, &signature),
            Err(SignatureError::InvalidSignature)
        );

        let other_key = SigningKey::from_bytes(&[9u8; 32]);
        assert_eq!(
            verify_detached(&other_key.verifying_key(), &canonical, &signature),
            Err(SignatureError::InvalidSignature)
        );

        assert_eq!(
            verify_detached(&key.verifying_key(), &canonical, "!!not-base64!!"),
            Err(SignatureError::InvalidSignature)
        );
    }
}
