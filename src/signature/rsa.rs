//! RSA PKCS#1 v1.5 (`RS256`/`RS384`/`RS512`) and RSA-PSS (`PS256`/`PS384`/
//! `PS512`) sign/verify. Both families enforce a 2048-bit modulus floor
//! before any primitive runs.

use openssl::pkey::{HasPublic, PKey, PKeyRef, Private, Public};
use openssl::rsa::Padding;
use openssl::sign::{RsaPssSaltlen, Signer, Verifier};

use crate::error::JoseError;
use crate::jwk::MIN_RSA_MODULUS_BITS;
use crate::primitives::Algorithm;

fn check_modulus_floor<T: HasPublic>(key: &PKeyRef<T>) -> Result<(), JoseError> {
    let bits = key.rsa()?.n().num_bits();
    if (bits as u32) < MIN_RSA_MODULUS_BITS {
        return Err(JoseError::MalformedToken(format!(
            "RSA key must be at least {MIN_RSA_MODULUS_BITS} bits, got {bits}"
        )));
    }
    Ok(())
}

pub fn sign_pkcs1(data: &[u8], key: &PKey<Private>, alg: Algorithm) -> Result<Vec<u8>, JoseError> {
    check_modulus_floor(key)?;
    let mut signer = Signer::new(alg.message_digest(), key)?;
    signer.set_rsa_padding(Padding::PKCS1)?;
    signer.update(data)?;
    Ok(signer.sign_to_vec()?)
}

pub fn verify_pkcs1(
    data: &[u8],
    signature: &[u8],
    key: &PKey<Public>,
    alg: Algorithm,
) -> Result<(), JoseError> {
    check_modulus_floor(key)?;
    let mut verifier = Verifier::new(alg.message_digest(), key)?;
    verifier.set_rsa_padding(Padding::PKCS1)?;
    verifier.update(data)?;
    match verifier.verify(signature) {
        Ok(true) => Ok(()),
        Ok(false) => Err(JoseError::InvalidSignature),
        Err(_) => Err(JoseError::InvalidSignature),
    }
}

/// Salt length equals the hash output length (32/48/64 bytes), trailer field
/// 1 (the only trailer field RFC 8017 defines), both openssl defaults for
/// `PKCS1_PSS` padding.
pub fn sign_pss(data: &[u8], key: &PKey<Private>, alg: Algorithm) -> Result<Vec<u8>, JoseError> {
    check_modulus_floor(key)?;
    let mut signer = Signer::new(alg.message_digest(), key)?;
    signer.set_rsa_padding(Padding::PKCS1_PSS)?;
    signer.set_rsa_mgf1_md(alg.message_digest())?;
    signer.set_rsa_pss_saltlen(RsaPssSaltlen::custom(alg.hash_len() as i32))?;
    signer.update(data)?;
    Ok(signer.sign_to_vec()?)
}

pub fn verify_pss(
    data: &[u8],
    signature: &[u8],
    key: &PKey<Public>,
    alg: Algorithm,
) -> Result<(), JoseError> {
    check_modulus_floor(key)?;
    let mut verifier = Verifier::new(alg.message_digest(), key)?;
    verifier.set_rsa_padding(Padding::PKCS1_PSS)?;
    verifier.set_rsa_mgf1_md(alg.message_digest())?;
    verifier.set_rsa_pss_saltlen(RsaPssSaltlen::custom(alg.hash_len() as i32))?;
    verifier.update(data)?;
    match verifier.verify(signature) {
        Ok(true) => Ok(()),
        Ok(false) => Err(JoseError::InvalidSignature),
        Err(_) => Err(JoseError::InvalidSignature),
    }
}
