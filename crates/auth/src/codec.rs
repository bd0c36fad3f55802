//! Session token signing and verification (compact JWS, HS512).
//!
//! The codec is pure given its secret: no clock reads in `encode_at`, no
//! shared mutable state, safe to share behind an `Arc` across requests.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, SubsecRound, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use thiserror::Error;

use crate::session::{ACCESS_TTL, EncodeResult, PartialSession, Session, millis};

const ALGORITHM: Algorithm = Algorithm::HS512;

/// Outcome of verifying a presented token.
///
/// Exactly one variant per decode attempt; there are no partial results.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeOutcome {
    /// Signature verified and payload deserialized.
    Valid(Session),
    /// Structurally unusable: empty, wrong segment count, bad base64 or JSON.
    InvalidToken,
    /// Well-formed but the MAC does not verify, or the header declares an
    /// algorithm other than HS512.
    IntegrityError,
}

/// Failure the codec does not know how to classify.
///
/// Never folded into [`DecodeOutcome`]; callers treat it as an internal error.
#[derive(Debug, Error)]
#[error("token codec failure: {0}")]
pub struct CodecError(#[from] jsonwebtoken::errors::Error);

/// HS512 session token codec bound to one secret key.
#[derive(Clone)]
pub struct TokenCodec {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
}

impl core::fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("TokenCodec")
            .field("algorithm", &ALGORITHM)
            .finish_non_exhaustive()
    }
}

impl TokenCodec {
    pub fn new(secret: impl AsRef<[u8]>) -> Self {
        let secret = secret.as_ref();

        // Session lifetime is judged by `lifecycle::classify`, not by the
        // registered `exp` claim (which these tokens do not carry).
        let mut validation = Validation::new(ALGORITHM);
        validation.validate_exp = false;
        validation.validate_nbf = false;
        validation.validate_aud = false;
        validation.required_spec_claims.clear();

        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            validation,
        }
    }

    /// Mint a session starting now.
    pub fn encode(&self, partial: PartialSession) -> Result<EncodeResult, CodecError> {
        self.encode_at(partial, Utc::now())
    }

    /// Mint a session whose window starts at `now`.
    ///
    /// `now` is truncated to whole milliseconds (the wire resolution) so the
    /// returned window matches what a later decode reconstructs.
    pub fn encode_at(
        &self,
        partial: PartialSession,
        now: DateTime<Utc>,
    ) -> Result<EncodeResult, CodecError> {
        let issued = now.trunc_subsecs(3);
        let session = Session {
            id: partial.id,
            issued,
            expires: issued + millis(ACCESS_TTL),
        };

        let token = jsonwebtoken::encode(&Header::new(ALGORITHM), &session, &self.encoding)?;

        Ok(EncodeResult {
            token,
            issued: session.issued,
            expires: session.expires,
        })
    }

    /// Verify `token` and reconstruct its session.
    pub fn decode(&self, token: &str) -> Result<DecodeOutcome, CodecError> {
        match jsonwebtoken::decode::<Session>(token, &self.decoding, &self.validation) {
            Ok(data) => Ok(DecodeOutcome::Valid(data.claims)),
            Err(err) => match err.kind() {
                ErrorKind::Json(_) if declares_foreign_algorithm(token) => {
                    Ok(DecodeOutcome::IntegrityError)
                }
                ErrorKind::InvalidToken
                | ErrorKind::Base64(_)
                | ErrorKind::Json(_)
                | ErrorKind::Utf8(_) => Ok(DecodeOutcome::InvalidToken),
                ErrorKind::InvalidSignature | ErrorKind::InvalidAlgorithm => {
                    Ok(DecodeOutcome::IntegrityError)
                }
                _ => Err(CodecError(err)),
            },
        }
    }
}

/// Whether a three-segment token carries a JSON header whose `alg` names
/// something other than HS512.
///
/// jsonwebtoken rejects `alg` values it has no variant for (`none` among
/// them) while parsing the header, before any signature check.
fn declares_foreign_algorithm(token: &str) -> bool {
    let mut segments = token.split('.');
    let (Some(header), Some(_), Some(_), None) = (
        segments.next(),
        segments.next(),
        segments.next(),
        segments.next(),
    ) else {
        return false;
    };

    let Ok(raw) = URL_SAFE_NO_PAD.decode(header) else {
        return false;
    };

    match serde_json::from_slice::<serde_json::Value>(&raw) {
        Ok(serde_json::Value::Object(fields)) => fields
            .get("alg")
            .and_then(serde_json::Value::as_str)
            .is_some_and(|alg| alg != "HS512"),
        _ => false,
    }
}
