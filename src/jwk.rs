//! The JWK sum type (RFC 7517) and JWK Set container, plus their wire codec.
//!
//! A `Jwk` is one of five tagged variants sharing a metadata tail
//! (`use`/`key_ops`/`alg`/`kid`). Decoding is a two-stage affair: first an
//! untyped "raw" shape carrying every possible field as `Option`, then
//! dispatch on `kty` (and, for EC/RSA, on whether `d` is present) into the
//! right variant, checking the fields that variant actually requires.

use serde::{Deserialize, Serialize};

use crate::error::JoseError;
use crate::primitives::{Algorithm, Base64UrlString, EcCurve, KeyOp, KeyUse, Kid};

/// Metadata shared by every JWK variant.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JwkMetadata {
    pub key_use: Option<KeyUse>,
    pub key_ops: Option<Vec<KeyOp>>,
    pub alg: Option<Algorithm>,
    pub kid: Option<Kid>,
}

/// A single JSON Web Key. See RFC 7517 §4 for the per-`kty` field layout this
/// mirrors, and RFC 7518 §6 for the parameter names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Jwk {
    EcPublicKey {
        crv: EcCurve,
        x: Base64UrlString,
        y: Base64UrlString,
        meta: JwkMetadata,
    },
    EcPrivateKey {
        crv: EcCurve,
        x: Base64UrlString,
        y: Base64UrlString,
        d: Base64UrlString,
        meta: JwkMetadata,
    },
    RsaPublicKey {
        n: Base64UrlString,
        e: Base64UrlString,
        meta: JwkMetadata,
    },
    RsaPrivateKey {
        n: Base64UrlString,
        e: Base64UrlString,
        d: Base64UrlString,
        p: Base64UrlString,
        q: Base64UrlString,
        dp: Base64UrlString,
        dq: Base64UrlString,
        qi: Base64UrlString,
        meta: JwkMetadata,
    },
    SymmetricKey {
        k: Base64UrlString,
        meta: JwkMetadata,
    },
}

/// RSA keys below this modulus size are rejected at both encode and decode.
pub const MIN_RSA_MODULUS_BITS: u32 = 2048;

impl Jwk {
    pub fn metadata(&self) -> &JwkMetadata {
        match self {
            Jwk::EcPublicKey { meta, .. }
            | Jwk::EcPrivateKey { meta, .. }
            | Jwk::RsaPublicKey { meta, .. }
            | Jwk::RsaPrivateKey { meta, .. }
            | Jwk::SymmetricKey { meta, .. } => meta,
        }
    }

    pub fn kid(&self) -> Option<&Kid> {
        self.metadata().kid.as_ref()
    }

    pub fn key_use(&self) -> Option<KeyUse> {
        self.metadata().key_use
    }

    pub fn key_ops(&self) -> Option<&[KeyOp]> {
        self.metadata().key_ops.as_deref()
    }

    pub fn alg(&self) -> Option<Algorithm> {
        self.metadata().alg
    }

    /// Is this JWK suitable for the given operation under the given
    /// algorithm, per spec.md §4.2's suitability predicate? `op` is `Verify`
    /// for the validator's resolution path, `Sign` for the issuer's.
    pub fn suitable_for(&self, op: KeyOp, alg: Algorithm) -> bool {
        let meta = self.metadata();
        let use_ok = match meta.key_use {
            None => true,
            Some(KeyUse::Sig) => true,
            Some(KeyUse::Enc) => false,
        };
        let ops_ok = meta
            .key_ops
            .as_ref()
            .map(|ops| ops.contains(&op))
            .unwrap_or(true);
        let alg_ok = meta.alg.map(|a| a == alg).unwrap_or(true);
        use_ok && ops_ok && alg_ok
    }

    fn modulus_bit_check(n: &Base64UrlString) -> Result<(), JoseError> {
        let bytes = n.decode()?;
        let bits = openssl::bn::BigNum::from_slice(&bytes)?.num_bits();
        if (bits as u32) < MIN_RSA_MODULUS_BITS {
            return Err(JoseError::MalformedToken(format!(
                "RSA key must be at least {MIN_RSA_MODULUS_BITS} bits, got {bits}"
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Default, Deserialize, Serialize)]
struct RawJwk {
    kty: String,
    #[serde(rename = "use", skip_serializing_if = "Option::is_none")]
    key_use: Option<KeyUse>,
    #[serde(skip_serializing_if = "Option::is_none")]
    key_ops: Option<Vec<KeyOp>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    alg: Option<Algorithm>,
    #[serde(skip_serializing_if = "Option::is_none")]
    kid: Option<Kid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    crv: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    x: Option<Base64UrlString>,
    #[serde(skip_serializing_if = "Option::is_none")]
    y: Option<Base64UrlString>,
    #[serde(skip_serializing_if = "Option::is_none")]
    n: Option<Base64UrlString>,
    #[serde(skip_serializing_if = "Option::is_none")]
    e: Option<Base64UrlString>,
    #[serde(skip_serializing_if = "Option::is_none")]
    d: Option<Base64UrlString>,
    #[serde(skip_serializing_if = "Option::is_none")]
    p: Option<Base64UrlString>,
    #[serde(skip_serializing_if = "Option::is_none")]
    q: Option<Base64UrlString>,
    #[serde(skip_serializing_if = "Option::is_none")]
    dp: Option<Base64UrlString>,
    #[serde(skip_serializing_if = "Option::is_none")]
    dq: Option<Base64UrlString>,
    #[serde(skip_serializing_if = "Option::is_none")]
    qi: Option<Base64UrlString>,
    #[serde(skip_serializing_if = "Option::is_none")]
    k: Option<Base64UrlString>,
}

fn require<T>(field: Option<T>, name: &str) -> Result<T, JoseError> {
    field.ok_or_else(|| JoseError::MalformedToken(format!("jwk missing required field '{name}'")))
}

impl<'de> Deserialize<'de> for Jwk {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = RawJwk::deserialize(deserializer)?;
        let meta = JwkMetadata {
            key_use: raw.key_use,
            key_ops: raw.key_ops,
            alg: raw.alg,
            kid: raw.kid,
        };
        let jwk = match raw.kty.as_str() {
            "EC" => {
                let crv: EcCurve = require(raw.crv, "crv")?
                    .parse()
                    .map_err(serde::de::Error::custom)?;
                let x = require(raw.x, "x")?;
                let y = require(raw.y, "y")?;
                match raw.d {
                    Some(d) => Jwk::EcPrivateKey { crv, x, y, d, meta },
                    None => Jwk::EcPublicKey { crv, x, y, meta },
                }
            }
            "RSA" => {
                let n = require(raw.n, "n")?;
                let e = require(raw.e, "e")?;
                Jwk::modulus_bit_check(&n).map_err(serde::de::Error::custom)?;
                match raw.d {
                    Some(d) => Jwk::RsaPrivateKey {
                        n,
                        e,
                        d,
                        p: require(raw.p, "p")?,
                        q: require(raw.q, "q")?,
                        dp: require(raw.dp, "dp")?,
                        dq: require(raw.dq, "dq")?,
                        qi: require(raw.qi, "qi")?,
                        meta,
                    },
                    None => Jwk::RsaPublicKey { n, e, meta },
                }
            }
            "oct" => Jwk::SymmetricKey {
                k: require(raw.k, "k")?,
                meta,
            },
            other => {
                return Err(serde::de::Error::custom(format!(
                    "unsupported kty: {other}"
                )))
            }
        };
        Ok(jwk)
    }
}

impl Serialize for Jwk {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let meta = self.metadata().clone();
        let mut raw = RawJwk {
            key_use: meta.key_use,
            key_ops: meta.key_ops,
            alg: meta.alg,
            kid: meta.kid,
            ..RawJwk::default()
        };
        match self {
            Jwk::EcPublicKey { crv, x, y, .. } => {
                raw.kty = "EC".into();
                raw.crv = Some(crv.rfc_name().into());
                raw.x = Some(x.clone());
                raw.y = Some(y.clone());
            }
            Jwk::EcPrivateKey { crv, x, y, d, .. } => {
                raw.kty = "EC".into();
                raw.crv = Some(crv.rfc_name().into());
                raw.x = Some(x.clone());
                raw.y = Some(y.clone());
                raw.d = Some(d.clone());
            }
            Jwk::RsaPublicKey { n, e, .. } => {
                raw.kty = "RSA".into();
                raw.n = Some(n.clone());
                raw.e = Some(e.clone());
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
                raw.kty = "RSA".into();
                raw.n = Some(n.clone());
                raw.e = Some(e.clone());
                raw.d = Some(d.clone());
                raw.p = Some(p.clone());
                raw.q = Some(q.clone());
                raw.dp = Some(dp.clone());
                raw.dq = Some(dq.clone());
                raw.qi = Some(qi.clone());
            }
            Jwk::SymmetricKey { k, .. } => {
                raw.kty = "oct".into();
                raw.k = Some(k.clone());
            }
        }
        raw.serialize(serializer)
    }
}

/// An ordered sequence of JWKs. RFC 7517 §5. `{"keys": [...]}`; a missing
/// `keys` member decodes as an empty set.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JwkSet {
    #[serde(default)]
    pub keys: Vec<Jwk>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_ec_public() -> Jwk {
        Jwk::EcPublicKey {
            crv: EcCurve::P256,
            x: Base64UrlString::new("WKn-ZIGevcwGIyyrzFoZNBdaq9_TsqzGl96oc0CWuis").unwrap(),
            y: Base64UrlString::new("y77t-RvAHRKTsSGdIYUfweuOvwrvDD-Q3Hv5J0fSKbE").unwrap(),
            meta: JwkMetadata {
                key_use: Some(KeyUse::Sig),
                key_ops: None,
                alg: Some(Algorithm::Es256),
                kid: Some(Kid::new("1").unwrap()),
            },
        }
    }

    #[test]
    fn ec_public_round_trips() {
        let jwk = sample_ec_public();
        let json = serde_json::to_string(&jwk).unwrap();
        let decoded: Jwk = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, jwk);
    }

    #[test]
    fn jwk_set_missing_keys_is_empty() {
        let set: JwkSet = serde_json::from_str("{}").unwrap();
        assert!(set.keys.is_empty());
    }

    #[test]
    fn unknown_kty_is_rejected() {
        let json = r#"{"kty":"OKP","crv":"Ed25519","x":"abcd"}"#;
        let result: Result<Jwk, _> = serde_json::from_str(json);
        assert!(result.is_err());
    }

    #[test]
    fn rsa_below_floor_is_rejected_at_decode() {
        // A 1024-bit modulus (128 bytes), top bit set so BigNum sees full width.
        let mut n_bytes = vec![0xFFu8; 128];
        n_bytes[0] = 0x80;
        let n = Base64UrlString::from_bytes(&n_bytes);
        let json = format!(
            r#"{{"kty":"RSA","n":"{}","e":"AQAB"}}"#,
            n.as_str()
        );
        let result: Result<Jwk, _> = serde_json::from_str(&json);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("2048"));
    }

    #[test]
    fn suitability_unset_fields_all_pass() {
        let jwk = Jwk::SymmetricKey {
            k: Base64UrlString::new("c2VjcmV0").unwrap(),
            meta: JwkMetadata::default(),
        };
        assert!(jwk.suitable_for(KeyOp::Verify, Algorithm::Hs256));
        assert!(jwk.suitable_for(KeyOp::Sign, Algorithm::Hs256));
    }

    #[test]
    fn suitability_enc_use_excludes_sig_ops() {
        let jwk = Jwk::SymmetricKey {
            k: Base64UrlString::new("c2VjcmV0").unwrap(),
            meta: JwkMetadata {
                key_use: Some(KeyUse::Enc),
                ..Default::default()
            },
        };
        assert!(!jwk.suitable_for(KeyOp::Verify, Algorithm::Hs256));
    }
}
