//! Domain error taxonomy. No exception ever leaks from the public API; every
//! fallible operation in this crate returns one of these variants.

use std::time::SystemTime;

use thiserror::Error;

/// Errors surfaced by token validation, issuance, key resolution and the JWKS
/// refresh engine.
///
/// `typ` mismatches are reported as [`JoseError::MalformedToken`] rather than a
/// dedicated variant. This mirrors the source library's behaviour and is a
/// deliberate choice, not an oversight (see `DESIGN.md`).
#[derive(Debug, Error)]
pub enum JoseError {
    /// `exp` claim has passed, accounting for configured clock skew.
    #[error("token expired at {exp:?}, now is {now:?}")]
    Expired {
        /// The token's `exp` claim.
        exp: SystemTime,
        /// The wall-clock time observed during validation.
        now: SystemTime,
    },

    /// `nbf` claim is still in the future, accounting for configured clock skew.
    #[error("token not valid until {nbf:?}, now is {now:?}")]
    NotYetValid {
        /// The token's `nbf` claim.
        nbf: SystemTime,
        /// The wall-clock time observed during validation.
        now: SystemTime,
    },

    /// Configured required audience is absent from the token's `aud` claim.
    #[error("expected audience {expected:?}, found {actual:?}")]
    InvalidAudience {
        /// The audience the validator was configured to require.
        expected: String,
        /// The audience claim actually present (if any).
        actual: Option<String>,
    },

    /// Configured required issuer does not match the token's `iss` claim.
    #[error("expected issuer {expected:?}, found {actual:?}")]
    InvalidIssuer {
        /// The issuer the validator was configured to require.
        expected: String,
        /// The issuer claim actually present (if any).
        actual: Option<String>,
    },

    /// Cryptographic signature verification failed, or the signature was
    /// structurally rejected before a crypto primitive was ever invoked (see
    /// the ECDSA sanity checks in `signature::ecdsa`).
    #[error("signature verification failed")]
    InvalidSignature,

    /// Structural parse failure: bad compact serialisation, undecodable
    /// header/payload JSON, a `typ` mismatch, an EC point off its curve, an
    /// unsupported key type, or an RSA modulus below the 2048-bit floor.
    #[error("malformed token: {0}")]
    MalformedToken(String),

    /// The header's `alg` is not present in the validator's configured
    /// allow-list.
    #[error("algorithm not allowed: {0}")]
    UnsupportedAlgorithm(String),

    /// Key resolution found zero or more than one candidate key.
    #[error("no unambiguous key found for kid {0:?}")]
    KeyNotFound(Option<String>),
}

impl From<openssl::error::ErrorStack> for JoseError {
    fn from(err: openssl::error::ErrorStack) -> Self {
        JoseError::MalformedToken(err.to_string())
    }
}

impl From<serde_json::Error> for JoseError {
    fn from(err: serde_json::Error) -> Self {
        JoseError::MalformedToken(err.to_string())
    }
}

impl From<base64::DecodeError> for JoseError {
    fn from(err: base64::DecodeError) -> Self {
        JoseError::MalformedToken(err.to_string())
    }
}

/// Errors from the JWKS [`crate::keystore::refresh::Fetcher`] trait, distinct
/// from `JoseError` because a fetch failure during periodic refresh is
/// recoverable (the last-known-good set is retained) whereas the errors above
/// are not.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The underlying HTTP request failed outright.
    #[error("jwks fetch failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The endpoint responded, but not with a 2xx status.
    #[error("jwks endpoint returned status {0}")]
    Status(reqwest::StatusCode),

    /// The response body could not be decoded as a `JwkSet`.
    #[error("jwks body decode failed: {0}")]
    Decode(String),
}

impl From<FetchError> for JoseError {
    fn from(err: FetchError) -> Self {
        JoseError::MalformedToken(err.to_string())
    }
}

pub type JoseResult<T> = Result<T, JoseError>;
