//! The signature engine: per-algorithm sign/verify dispatch. This module
//! owns no state, so it is trivially safe to share across concurrent
//! validate/issue calls.

mod constant_time;
mod der;
mod ecdsa;
mod hmac;
mod rsa;

use openssl::pkey::{PKey, Private, Public};

use crate::error::JoseError;
use crate::primitives::{Algorithm, AlgorithmFamily};

pub use constant_time::constant_time_eq;

/// Sign `data` with a symmetric (HMAC) key. Only valid for `alg.family() ==
/// AlgorithmFamily::Hmac`.
pub fn sign_symmetric(data: &[u8], key: &[u8], alg: Algorithm) -> Result<Vec<u8>, JoseError> {
    match alg.family() {
        AlgorithmFamily::Hmac => hmac::sign(data, key, alg),
        _ => Err(JoseError::MalformedToken(format!(
            "{} is not an HMAC algorithm",
            alg.name()
        ))),
    }
}

/// Sign `data` with an asymmetric private key. Valid for RSA, RSA-PSS, and EC
/// algorithms.
pub fn sign_asymmetric(
    data: &[u8],
    key: &PKey<Private>,
    alg: Algorithm,
) -> Result<Vec<u8>, JoseError> {
    match alg.family() {
        AlgorithmFamily::Rsa => rsa::sign_pkcs1(data, key, alg),
        AlgorithmFamily::RsaPss => rsa::sign_pss(data, key, alg),
        AlgorithmFamily::Ec => ecdsa::sign(data, key, alg),
        AlgorithmFamily::Hmac => Err(JoseError::MalformedToken(
            "HMAC algorithms sign with a symmetric key, not a private key".into(),
        )),
    }
}

/// Verify an HMAC signature. Only valid for `alg.family() ==
/// AlgorithmFamily::Hmac`.
pub fn verify_symmetric(
    data: &[u8],
    signature: &[u8],
    key: &[u8],
    alg: Algorithm,
) -> Result<(), JoseError> {
    match alg.family() {
        AlgorithmFamily::Hmac => hmac::verify(data, signature, key, alg),
        _ => Err(JoseError::MalformedToken(format!(
            "{} is not an HMAC algorithm",
            alg.name()
        ))),
    }
}

/// Verify an asymmetric signature against a public key.
pub fn verify_asymmetric(
    data: &[u8],
    signature: &[u8],
    key: &PKey<Public>,
    alg: Algorithm,
) -> Result<(), JoseError> {
    match alg.family() {
        AlgorithmFamily::Rsa => rsa::verify_pkcs1(data, signature, key, alg),
        AlgorithmFamily::RsaPss => rsa::verify_pss(data, signature, key, alg),
        AlgorithmFamily::Ec => ecdsa::verify(data, signature, key, alg),
        AlgorithmFamily::Hmac => Err(JoseError::MalformedToken(
            "HMAC algorithms verify with a symmetric key, not a public key".into(),
        )),
    }
}
