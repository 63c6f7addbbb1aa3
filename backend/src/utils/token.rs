//! Opaque session tokens and their stored fingerprints.
//!
//! A raw token is `token_size_in_bytes` bytes from the OS random source and is
//! handed to clients as unpadded URL-safe base64. Only the SHA-256 fingerprint
//! of the raw bytes is ever persisted; the raw token carries full entropy, so
//! no salt is needed.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use rand::{rngs::OsRng, RngCore};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

use crate::error::AuthError;

/// Hex length of a SHA-256 digest.
pub const FINGERPRINT_LEN: usize = 64;

/// Secret token bytes. Never logged, never stored.
#[derive(Clone, PartialEq, Eq)]
pub struct RawToken(Vec<u8>);

impl RawToken {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for RawToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RawToken(<redacted {} bytes>)", self.0.len())
    }
}

/// One-way fingerprint of a raw token, the only form that reaches storage.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(transparent)]
pub struct TokenValidationInfo(String);

impl TokenValidationInfo {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TokenValidationInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct TokenCodec {
    token_size_in_bytes: usize,
}

impl TokenCodec {
    pub fn new(token_size_in_bytes: usize) -> Self {
        Self {
            token_size_in_bytes,
        }
    }

    /// Length of a token once base64 encoded for transport.
    pub fn encoded_len(&self) -> usize {
        (self.token_size_in_bytes * 4).div_ceil(3)
    }

    pub fn generate(&self) -> Result<RawToken, AuthError> {
        let mut bytes = vec![0u8; self.token_size_in_bytes];
        OsRng.try_fill_bytes(&mut bytes).map_err(|err| {
            tracing::error!(error = %err, "OS random source failed");
            AuthError::EntropyUnavailable
        })?;
        Ok(RawToken(bytes))
    }

    pub fn fingerprint(&self, raw: &RawToken) -> Result<TokenValidationInfo, AuthError> {
        if raw.0.is_empty() || raw.0.len() != self.token_size_in_bytes {
            return Err(AuthError::InvalidTokenFormat);
        }
        let digest = Sha256::digest(&raw.0);
        Ok(TokenValidationInfo(hex::encode(digest)))
    }

    pub fn encode(&self, raw: &RawToken) -> String {
        URL_SAFE_NO_PAD.encode(&raw.0)
    }

    /// Parses a client-presented token, rejecting anything that could not
    /// have been produced by [`TokenCodec::encode`] with this token size.
    pub fn decode(&self, encoded: &str) -> Result<RawToken, AuthError> {
        if encoded.len() != self.encoded_len() {
            return Err(AuthError::InvalidTokenFormat);
        }
        let bytes = URL_SAFE_NO_PAD
            .decode(encoded)
            .map_err(|_| AuthError::InvalidTokenFormat)?;
        if bytes.len() != self.token_size_in_bytes {
            return Err(AuthError::InvalidTokenFormat);
        }
        Ok(RawToken(bytes))
    }

    /// Decodes and fingerprints in one step.
    pub fn fingerprint_encoded(&self, encoded: &str) -> Result<TokenValidationInfo, AuthError> {
        let raw = self.decode(encoded)?;
        self.fingerprint(&raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn codec() -> TokenCodec {
        TokenCodec::new(32)
    }

    #[test]
    fn generates_configured_length() {
        let token = codec().generate().expect("generate");
        assert_eq!(token.as_bytes().len(), 32);
        assert_eq!(codec().encode(&token).len(), 43);
        assert_eq!(TokenCodec::new(16).encoded_len(), 22);
    }

    #[test]
    fn fingerprint_is_deterministic_and_differs_from_raw() {
        let codec = codec();
        let token = codec.generate().expect("generate");
        let first = codec.fingerprint(&token).expect("fingerprint");
        let second = codec.fingerprint(&token).expect("fingerprint");
        assert_eq!(first, second);
        assert_eq!(first.as_str().len(), FINGERPRINT_LEN);
        assert_ne!(first.as_str(), codec.encode(&token));
        assert_ne!(first.as_str().as_bytes(), token.as_bytes());
    }

    #[test]
    fn fingerprints_of_a_batch_are_distinct() {
        let codec = codec();
        let mut seen = HashSet::new();
        for _ in 0..10_000 {
            let token = codec.generate().expect("generate");
            assert!(seen.insert(codec.fingerprint(&token).expect("fingerprint")));
        }
    }

    #[test]
    fn decode_accepts_what_encode_produces() {
        let codec = codec();
        let token = codec.generate().expect("generate");
        let decoded = codec.decode(&codec.encode(&token)).expect("decode");
        assert_eq!(decoded, token);
    }

    #[test]
    fn decode_rejects_short_input() {
        assert!(matches!(
            codec().decode("abcde"),
            Err(AuthError::InvalidTokenFormat)
        ));
        assert!(matches!(
            codec().decode(""),
            Err(AuthError::InvalidTokenFormat)
        ));
    }

    #[test]
    fn decode_rejects_non_base64_of_right_length() {
        let bogus = "!".repeat(43);
        assert!(matches!(
            codec().decode(&bogus),
            Err(AuthError::InvalidTokenFormat)
        ));
    }

    #[test]
    fn fingerprint_rejects_wrong_length() {
        let short = TokenCodec::new(16).generate().expect("generate");
        assert!(matches!(
            codec().fingerprint(&short),
            Err(AuthError::InvalidTokenFormat)
        ));
        assert!(matches!(
            codec().fingerprint(&RawToken(Vec::new())),
            Err(AuthError::InvalidTokenFormat)
        ));
    }

    #[test]
    fn debug_output_is_redacted() {
        let token = RawToken(vec![0xAB; 32]);
        let rendered = format!("{:?}", token);
        assert!(rendered.contains("redacted"));
        assert!(!rendered.contains("171"));
    }
}
