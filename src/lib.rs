//! Issuance and validation of JWS-signed JSON Web Tokens (RFC 7515/7519)
//! against keys published as JSON Web Keys and JWK Sets (RFC 7517/7518),
//! with transparent rotation of a remote JWKS over HTTP.
//!
//! The two public entry points are [`token::validator::TokenProcessor`] and
//! [`token::issuer::TokenIssuer`]. Both take their key material from a
//! [`keystore::KeyStore`], either a fixed [`keystore::StaticKeyStore`] or a
//! [`keystore::refresh::RefreshingKeyStore`] backed by a remote JWKS
//! endpoint.
//!
//! This crate never supports the `none` algorithm, JWE, nested JWTs, or key
//! types outside EC P-256/384/521, RSA >= 2048 bits, and HMAC. Compact
//! serialisation parsing is strict: malformed input is rejected rather than
//! tolerated.

pub mod claims;
pub mod codec;
pub mod error;
pub mod jwk;
pub mod keybridge;
pub mod keystore;
pub mod primitives;
pub mod signature;
pub mod token;

pub use claims::{JoseHeader, Jwt, RegisteredClaims};
pub use codec::{Codec, JsonCodec};
pub use error::{FetchError, JoseError, JoseResult};
pub use jwk::{Jwk, JwkMetadata, JwkSet};
pub use keystore::{KeyStore, StaticKeyStore};
pub use primitives::{
    Algorithm, AlgorithmFamily, Audience, Base64UrlString, EcCurve, Kid, KeyOp, KeyUse,
    NumericDate, TokenString,
};
pub use token::issuer::{IssuerConfig, TokenIssuer};
pub use token::validator::{TokenProcessor, ValidatorConfig};
