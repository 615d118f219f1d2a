//! Conversion between the wire `Jwk` representation and native `openssl` key
//! handles: base64url<->big-integer, EC point construction with independent
//! point-on-curve validation, and the 2048-bit RSA floor.

use openssl::bn::{BigNum, BigNumContext, BigNumRef};
use openssl::ec::{EcKey, EcPoint};
use openssl::pkey::{PKey, Private, Public};
use openssl::rsa::Rsa;

use crate::error::JoseError;
use crate::jwk::{Jwk, JwkMetadata, MIN_RSA_MODULUS_BITS};
use crate::primitives::{Base64UrlString, EcCurve};

/// A key usable for verification: the symmetric case carries raw bytes, the
/// asymmetric cases a native public key.
pub enum VerifyingKey {
    Symmetric(Vec<u8>),
    Public(PKey<Public>),
}

/// A key usable for signing.
pub enum SigningKey {
    Symmetric(Vec<u8>),
    Private(PKey<Private>),
}

fn decode_bignum(field: &Base64UrlString) -> Result<BigNum, JoseError> {
    let bytes = field.decode()?;
    Ok(BigNum::from_slice(&bytes)?)
}

fn pad_to_len(n: &BigNumRef, len: usize) -> Vec<u8> {
    let raw = n.to_vec();
    if raw.len() >= len {
        raw
    } else {
        let mut out = vec![0u8; len - raw.len()];
        out.extend_from_slice(&raw);
        out
    }
}

/// `y^2 ≡ x^3 + a*x + b (mod p)` over the curve's prime field, independent of
/// whatever the underlying EC point construction itself would or wouldn't
/// check.
fn validate_point_on_curve(curve: EcCurve, x: &BigNumRef, y: &BigNumRef) -> Result<(), JoseError> {
    let group = curve.group()?;
    let mut ctx = BigNumContext::new()?;
    let (mut p, mut a, mut b) = (BigNum::new()?, BigNum::new()?, BigNum::new()?);
    group.components_gfp(&mut p, &mut a, &mut b, &mut ctx)?;

    let mut lhs = BigNum::new()?;
    lhs.mod_sqr(y, &p, &mut ctx)?;

    let mut x2 = BigNum::new()?;
    x2.mod_sqr(x, &p, &mut ctx)?;
    let mut x3 = BigNum::new()?;
    x3.mod_mul(&x2, x, &p, &mut ctx)?;
    let mut ax = BigNum::new()?;
    ax.mod_mul(&a, x, &p, &mut ctx)?;

    let mut rhs = BigNum::new()?;
    rhs.mod_add(&x3, &ax, &p, &mut ctx)?;
    let mut rhs_plus_b = BigNum::new()?;
    rhs_plus_b.mod_add(&rhs, &b, &p, &mut ctx)?;

    if lhs != rhs_plus_b {
        return Err(JoseError::MalformedToken(
            "EC point is not on the curve".into(),
        ));
    }
    Ok(())
}

fn ec_point(curve: EcCurve, x: &BigNumRef, y: &BigNumRef) -> Result<EcPoint, JoseError> {
    validate_point_on_curve(curve, x, y)?;
    let group = curve.group()?;
    let mut ctx = BigNumContext::new()?;
    let mut point = EcPoint::new(group)?;
    point.set_affine_coordinates_gfp(group, x, y, &mut ctx)?;
    Ok(point)
}

fn check_rsa_floor(n: &BigNumRef) -> Result<(), JoseError> {
    if (n.num_bits() as u32) < MIN_RSA_MODULUS_BITS {
        return Err(JoseError::MalformedToken(format!(
            "RSA key must be at least {MIN_RSA_MODULUS_BITS} bits, got {}",
            n.num_bits()
        )));
    }
    Ok(())
}

/// Build the key this crate would use to verify a signature under `jwk`.
pub fn jwk_to_verifying_key(jwk: &Jwk) -> Result<VerifyingKey, JoseError> {
    match jwk {
        Jwk::EcPublicKey { crv, x, y, .. } | Jwk::EcPrivateKey { crv, x, y, .. } => {
            let x = decode_bignum(x)?;
            let y = decode_bignum(y)?;
            let point = ec_point(*crv, &x, &y)?;
            let ec_key = EcKey::from_public_key(crv.group()?, &point)?;
            Ok(VerifyingKey::Public(PKey::from_ec_key(ec_key)?))
        }
        Jwk::RsaPublicKey { n, e, .. } | Jwk::RsaPrivateKey { n, e, .. } => {
            let n = decode_bignum(n)?;
            let e = decode_bignum(e)?;
            check_rsa_floor(&n)?;
            let rsa = Rsa::from_public_components(n, e)?;
            Ok(VerifyingKey::Public(PKey::from_rsa(rsa)?))
        }
        Jwk::SymmetricKey { k, .. } => Ok(VerifyingKey::Symmetric(k.decode()?)),
    }
}

/// Build the key this crate would use to sign with `jwk`. Only the private
/// variants (and the symmetric variant) can produce a signing key.
pub fn jwk_to_signing_key(jwk: &Jwk) -> Result<SigningKey, JoseError> {
    match jwk {
        Jwk::EcPrivateKey { crv, x, y, d, .. } => {
            let x = decode_bignum(x)?;
            let y = decode_bignum(y)?;
            let d = decode_bignum(d)?;
            let point = ec_point(*crv, &x, &y)?;
            let ec_key = EcKey::from_private_components(crv.group()?, &d, &point)?;
            Ok(SigningKey::Private(PKey::from_ec_key(ec_key)?))
        }
        Jwk::RsaPrivateKey {
            n,
            e,
            d,
            p,
            q,
            dp,
            dq,
            qi,
            ..
        } => {
            let n_bn = decode_bignum(n)?;
            check_rsa_floor(&n_bn)?;
            let rsa = Rsa::from_private_components(
                n_bn,
                decode_bignum(e)?,
                decode_bignum(d)?,
                decode_bignum(p)?,
                decode_bignum(q)?,
                decode_bignum(dp)?,
                decode_bignum(dq)?,
                decode_bignum(qi)?,
            )?;
            Ok(SigningKey::Private(PKey::from_rsa(rsa)?))
        }
        Jwk::SymmetricKey { k, .. } => Ok(SigningKey::Symmetric(k.decode()?)),
        Jwk::EcPublicKey { .. } | Jwk::RsaPublicKey { .. } => Err(JoseError::MalformedToken(
            "cannot sign with a public-only JWK".into(),
        )),
    }
}

/// Encode a native EC public key back to a `Jwk::EcPublicKey`, deriving `crv`
/// from the key's own field size.
pub fn ec_public_key_to_jwk(
    key: &EcKey<Public>,
    meta: JwkMetadata,
) -> Result<Jwk, JoseError> {
    let group = key.group();
    let curve = EcCurve::from_field_bits(group.degree() as usize)?;
    let mut ctx = BigNumContext::new()?;
    let (mut x, mut y) = (BigNum::new()?, BigNum::new()?);
    key.public_key()
        .affine_coordinates_gfp(group, &mut x, &mut y, &mut ctx)?;
    let len = curve.coordinate_len();
    Ok(Jwk::EcPublicKey {
        crv: curve,
        x: Base64UrlString::from_bytes(&pad_to_len(&x, len)),
        y: Base64UrlString::from_bytes(&pad_to_len(&y, len)),
        meta,
    })
}

/// Encode a native EC key pair (public coordinates plus the private scalar)
/// back to a `Jwk::EcPrivateKey`.
pub fn ec_private_key_to_jwk(key: &EcKey<Private>, meta: JwkMetadata) -> Result<Jwk, JoseError> {
    let group = key.group();
    let curve = EcCurve::from_field_bits(group.degree() as usize)?;
    let mut ctx = BigNumContext::new()?;
    let (mut x, mut y) = (BigNum::new()?, BigNum::new()?);
    key.public_key()
        .affine_coordinates_gfp(group, &mut x, &mut y, &mut ctx)?;
    let len = curve.coordinate_len();
    Ok(Jwk::EcPrivateKey {
        crv: curve,
        x: Base64UrlString::from_bytes(&pad_to_len(&x, len)),
        y: Base64UrlString::from_bytes(&pad_to_len(&y, len)),
        d: Base64UrlString::from_bytes(&pad_to_len(key.private_key(), len)),
        meta,
    })
}

/// Encode a native RSA public key back to a `Jwk::RsaPublicKey`. `n` and `e`
/// are never padded.
pub fn rsa_public_key_to_jwk(key: &Rsa<Public>, meta: JwkMetadata) -> Result<Jwk, JoseError> {
    check_rsa_floor(key.n())?;
    Ok(Jwk::RsaPublicKey {
        n: Base64UrlString::from_bytes(&key.n().to_vec()),
        e: Base64UrlString::from_bytes(&key.e().to_vec()),
        meta,
    })
}

/// Encode a native RSA private key (with CRT parameters) back to a
/// `Jwk::RsaPrivateKey`.
pub fn rsa_private_key_to_jwk(key: &Rsa<Private>, meta: JwkMetadata) -> Result<Jwk, JoseError> {
    check_rsa_floor(key.n())?;
    let (p, q, dp, dq, qi) = (
        key.p()
            .ok_or_else(|| JoseError::MalformedToken("RSA private key missing p".into()))?,
        key.q()
            .ok_or_else(|| JoseError::MalformedToken("RSA private key missing q".into()))?,
        key.dmp1()
            .ok_or_else(|| JoseError::MalformedToken("RSA private key missing dp".into()))?,
        key.dmq1()
            .ok_or_else(|| JoseError::MalformedToken("RSA private key missing dq".into()))?,
        key.iqmp()
            .ok_or_else(|| JoseError::MalformedToken("RSA private key missing qi".into()))?,
    );
    Ok(Jwk::RsaPrivateKey {
        n: Base64UrlString::from_bytes(&key.n().to_vec()),
        e: Base64UrlString::from_bytes(&key.e().to_vec()),
        d: Base64UrlString::from_bytes(&key.d().to_vec()),
        p: Base64UrlString::from_bytes(&p.to_vec()),
        q: Base64UrlString::from_bytes(&q.to_vec()),
        dp: Base64UrlString::from_bytes(&dp.to_vec()),
        dq: Base64UrlString::from_bytes(&dq.to_vec()),
        qi: Base64UrlString::from_bytes(&qi.to_vec()),
        meta,
    })
}

/// Encode raw symmetric key bytes back to a `Jwk::SymmetricKey`. `alg` is
/// left as given in `meta`; the bridge does not invent one.
pub fn symmetric_key_to_jwk(raw: &[u8], meta: JwkMetadata) -> Jwk {
    Jwk::SymmetricKey {
        k: Base64UrlString::from_bytes(raw),
        meta,
    }
}
