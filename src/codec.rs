//! Pluggable wire codecs. Nothing in `token::validator` or `token::issuer`
//! calls `serde_json` directly; both depend on injected `Codec` values, so a
//! caller can swap in a different JSON library (or a non-JSON wire format,
//! though this crate only ships the JSON one) without touching the
//! validation/issuance pipeline.

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::JoseError;

/// A minimal encode/decode interface. `decode` and `encode` operate on raw
/// bytes rather than `serde_json::Value` so a non-JSON implementation is a
/// real possibility, not just a theoretical one.
pub trait Codec<A> {
    fn decode(&self, bytes: &[u8]) -> Result<A, JoseError>;
    fn encode(&self, value: &A) -> Result<Vec<u8>, JoseError>;
}

/// The JSON codec this crate ships. Works for any `A: Serialize +
/// DeserializeOwned`, which covers `JoseHeader`, `RegisteredClaims`, `Jwk`,
/// `JwkSet`, and any caller-supplied custom-claim type.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl<A: Serialize + DeserializeOwned> Codec<A> for JsonCodec {
    fn decode(&self, bytes: &[u8]) -> Result<A, JoseError> {
        Ok(serde_json::from_slice(bytes)?)
    }

    fn encode(&self, value: &A) -> Result<Vec<u8>, JoseError> {
        Ok(serde_json::to_vec(value)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::claims::RegisteredClaims;

    #[test]
    fn json_codec_round_trips_registered_claims() {
        let codec = JsonCodec;
        let claims = RegisteredClaims {
            sub: Some("test".into()),
            ..Default::default()
        };
        let bytes = Codec::<RegisteredClaims>::encode(&codec, &claims).unwrap();
        let decoded: RegisteredClaims = codec.decode(&bytes).unwrap();
        assert_eq!(decoded, claims);
    }
}
