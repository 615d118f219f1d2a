//! ECDSA sign/verify for `ES256`/`ES384`/`ES512`.
//!
//! Verification runs a four-step structural sanity check on the raw `R||S`
//! signature *before* the cryptographic primitive is ever invoked. This is
//! the CVE-2022-21449 ("Psychic Signatures") defense: several JCA-family
//! verifiers historically accepted an all-zero signature as valid for any
//! message under any key, because the underlying BigInteger-based verify
//! treated `r = s = 0` as passing a congruence it shouldn't have. Rejecting
//! structurally-invalid signatures before they reach the primitive closes
//! that class of bug regardless of what the primitive itself would do.

use openssl::bn::BigNum;
use openssl::pkey::{PKey, Private, Public};
use openssl::sign::{Signer, Verifier};

use crate::error::JoseError;
use crate::primitives::{Algorithm, EcCurve};

use super::der::{concat_to_der, der_to_concat};

/// Sign `data`, returning the fixed-length `R||S` encoding.
pub fn sign(data: &[u8], key: &PKey<Private>, alg: Algorithm) -> Result<Vec<u8>, JoseError> {
    let curve = alg
        .curve()
        .expect("ecdsa::sign only called for EC algorithms");
    let mut signer = Signer::new(alg.message_digest(), key)?;
    signer.update(data)?;
    let der = signer.sign_to_vec()?;
    der_to_concat(&der, curve.coordinate_len())
}

/// Verify `data` against `signature` (raw `R||S`). Any structural rejection
/// or cryptographic mismatch maps to [`JoseError::InvalidSignature`], never
/// [`JoseError::MalformedToken`]: an attacker-controlled signature must not
/// be able to distinguish "rejected for shape" from "rejected by crypto".
pub fn verify(
    data: &[u8],
    signature: &[u8],
    key: &PKey<Public>,
    alg: Algorithm,
) -> Result<(), JoseError> {
    let curve = alg
        .curve()
        .expect("ecdsa::verify only called for EC algorithms");
    sanity_check(signature, curve)?;

    let der = concat_to_der(signature, curve.coordinate_len())
        .map_err(|_| JoseError::InvalidSignature)?;
    let mut verifier = Verifier::new(alg.message_digest(), key)?;
    verifier.update(data)?;
    match verifier.verify(&der) {
        Ok(true) => Ok(()),
        Ok(false) => Err(JoseError::InvalidSignature),
        Err(_) => Err(JoseError::InvalidSignature),
    }
}

fn sanity_check(signature: &[u8], curve: EcCurve) -> Result<(), JoseError> {
    let coord_len = curve.coordinate_len();

    // Step 1: all-zero signature.
    if signature.iter().all(|&b| b == 0) {
        return Err(JoseError::InvalidSignature);
    }

    // Step 2: length must be exactly 2 * coordinate length.
    if signature.len() != coord_len * 2 {
        return Err(JoseError::InvalidSignature);
    }

    let (r_bytes, s_bytes) = signature.split_at(coord_len);
    let r = BigNum::from_slice(r_bytes)?;
    let s = BigNum::from_slice(s_bytes)?;
    let zero = BigNum::from_u32(0)?;

    // Step 3: R = 0 or S = 0.
    if r == zero || s == zero {
        return Err(JoseError::InvalidSignature);
    }

    // Step 4: R >= N or S >= N, and R mod N = 0 or S mod N = 0.
    let n = curve.order_n()?;
    if r >= n || s >= n {
        return Err(JoseError::InvalidSignature);
    }
    let mut ctx = openssl::bn::BigNumContext::new()?;
    let mut r_mod = BigNum::new()?;
    let mut s_mod = BigNum::new()?;
    r_mod.nnmod(&r, &n, &mut ctx)?;
    s_mod.nnmod(&s, &n, &mut ctx)?;
    if r_mod == zero || s_mod == zero {
        return Err(JoseError::InvalidSignature);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use openssl::ec::{EcKey, PointConversionForm};

    fn generate_key_pair(curve: EcCurve) -> (PKey<Private>, PKey<Public>) {
        let group = curve.group().unwrap();
        let ec_private = EcKey::generate(group).unwrap();
        let private = PKey::from_ec_key(ec_private.clone()).unwrap();

        let mut ctx = openssl::bn::BigNumContext::new().unwrap();
        let point_bytes = ec_private
            .public_key()
            .to_bytes(group, PointConversionForm::UNCOMPRESSED, &mut ctx)
            .unwrap();
        let point = openssl::ec::EcPoint::from_bytes(group, &point_bytes, &mut ctx).unwrap();
        let ec_public = EcKey::from_public_key(group, &point).unwrap();
        let public = PKey::from_ec_key(ec_public).unwrap();
        (private, public)
    }

    #[test]
    fn sign_then_verify_round_trips_all_curves() {
        for alg in [Algorithm::Es256, Algorithm::Es384, Algorithm::Es512] {
            let curve = alg.curve().unwrap();
            let (private, public) = generate_key_pair(curve);
            let data = b"header.payload";
            let sig = sign(data, &private, alg).unwrap();
            assert_eq!(sig.len(), curve.coordinate_len() * 2);
            assert!(verify(data, &sig, &public, alg).is_ok());
        }
    }

    #[test]
    fn all_zero_signature_rejected_without_touching_primitive() {
        let (_, public) = generate_key_pair(EcCurve::P256);
        let sig = vec![0u8; 64];
        assert!(matches!(
            verify(b"data", &sig, &public, Algorithm::Es256),
            Err(JoseError::InvalidSignature)
        ));
    }

    #[test]
    fn wrong_length_signature_rejected() {
        let (_, public) = generate_key_pair(EcCurve::P256);
        let sig = vec![1u8; 63];
        assert!(matches!(
            verify(b"data", &sig, &public, Algorithm::Es256),
            Err(JoseError::InvalidSignature)
        ));
    }

    #[test]
    fn zero_r_rejected() {
        let (_, public) = generate_key_pair(EcCurve::P256);
        let mut sig = vec![0u8; 64];
        sig[63] = 1; // s = 1, r = 0
        assert!(matches!(
            verify(b"data", &sig, &public, Algorithm::Es256),
            Err(JoseError::InvalidSignature)
        ));
    }

    #[test]
    fn r_greater_than_order_rejected() {
        let (_, public) = generate_key_pair(EcCurve::P256);
        let mut sig = vec![0xFFu8; 64]; // R = all-0xFF, far beyond N
        sig[63] = 1;
        assert!(matches!(
            verify(b"data", &sig, &public, Algorithm::Es256),
            Err(JoseError::InvalidSignature)
        ));
    }

    #[test]
    fn tampered_signature_rejected() {
        let (private, public) = generate_key_pair(EcCurve::P256);
        let data = b"header.payload";
        let mut sig = sign(data, &private, Algorithm::Es256).unwrap();
        sig[0] ^= 0xFF;
        // Either the sanity check or the crypto primitive will reject this;
        // either way it must surface as InvalidSignature.
        assert!(verify(data, &sig, &public, Algorithm::Es256).is_err());
    }
}
