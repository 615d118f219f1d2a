//! HMAC sign/verify for the `HS256`/`HS384`/`HS512` family.

use openssl::hash::MessageDigest;
use openssl::pkey::{PKey, Private};
use openssl::sign::Signer;

use crate::error::JoseError;
use crate::primitives::Algorithm;

use super::constant_time::constant_time_eq;

fn mac_key(key: &[u8]) -> Result<PKey<Private>, JoseError> {
    Ok(PKey::hmac(key)?)
}

fn compute(data: &[u8], key: &[u8], digest: MessageDigest) -> Result<Vec<u8>, JoseError> {
    let pkey = mac_key(key)?;
    let mut signer = Signer::new(digest, &pkey)?;
    signer.update(data)?;
    Ok(signer.sign_to_vec()?)
}

/// Compute the raw MAC bytes over `data`.
pub fn sign(data: &[u8], key: &[u8], alg: Algorithm) -> Result<Vec<u8>, JoseError> {
    compute(data, key, alg.message_digest())
}

/// Recompute the MAC locally and compare against `signature` in constant
/// time. Never short-circuits on length.
pub fn verify(data: &[u8], signature: &[u8], key: &[u8], alg: Algorithm) -> Result<(), JoseError> {
    let expected = compute(data, key, alg.message_digest())?;
    if constant_time_eq(&expected, signature) {
        Ok(())
    } else {
        Err(JoseError::InvalidSignature)
    }
}
