//! `TokenIssuer::issue` (§4.4): header/payload assembly, the byte-level
//! claim merge, signing-key resolution and signing.

use std::sync::Arc;

use serde::Serialize;

use crate::claims::{JoseHeader, RegisteredClaims};
use crate::codec::{Codec, JsonCodec};
use crate::error::JoseError;
use crate::keybridge::{self, SigningKey};
use crate::keystore::{resolve, KeyStore};
use crate::primitives::{Algorithm, AlgorithmFamily, Base64UrlString, Kid, KeyOp, TokenString};
use crate::signature;

/// Issuance-side configuration (§6). `kid`, `typ`, `cty` are carried into the
/// emitted header verbatim when present.
#[derive(Debug, Clone)]
pub struct IssuerConfig {
    pub algorithm: Algorithm,
    pub kid: Option<Kid>,
    pub typ: Option<String>,
    pub cty: Option<String>,
}

impl IssuerConfig {
    pub fn new(algorithm: Algorithm) -> Self {
        IssuerConfig {
            algorithm,
            kid: None,
            typ: None,
            cty: None,
        }
    }

    pub fn with_kid(mut self, kid: Kid) -> Self {
        self.kid = Some(kid);
        self
    }

    pub fn with_typ(mut self, typ: impl Into<String>) -> Self {
        self.typ = Some(typ.into());
        self
    }

    pub fn with_cty(mut self, cty: impl Into<String>) -> Self {
        self.cty = Some(cty.into());
        self
    }
}

/// Assembles and signs compact-serialisation tokens. Like
/// [`crate::token::validator::TokenProcessor`], state-free once constructed:
/// config and key source are fixed, `issue` calls are independent.
pub struct TokenIssuer {
    config: IssuerConfig,
    key_store: Arc<dyn KeyStore>,
    header_codec: Arc<dyn Codec<JoseHeader> + Send + Sync>,
    registered_codec: Arc<dyn Codec<RegisteredClaims> + Send + Sync>,
}

impl TokenIssuer {
    pub fn new(config: IssuerConfig, key_store: Arc<dyn KeyStore>) -> Self {
        TokenIssuer {
            config,
            key_store,
            header_codec: Arc::new(JsonCodec),
            registered_codec: Arc::new(JsonCodec),
        }
    }

    pub fn with_codecs(
        mut self,
        header_codec: Arc<dyn Codec<JoseHeader> + Send + Sync>,
        registered_codec: Arc<dyn Codec<RegisteredClaims> + Send + Sync>,
    ) -> Self {
        self.header_codec = header_codec;
        self.registered_codec = registered_codec;
        self
    }

    /// Build, merge, sign and emit a compact-serialisation token.
    pub async fn issue<A: Serialize>(
        &self,
        claims: &A,
        claims_codec: &dyn Codec<A>,
        registered: &RegisteredClaims,
    ) -> Result<TokenString, JoseError> {
        let header = JoseHeader {
            alg: self.config.algorithm,
            typ: self.config.typ.clone(),
            cty: self.config.cty.clone(),
            kid: self.config.kid.clone(),
        };

        let header_bytes = self.header_codec.encode(&header)?;
        let header_b64 = Base64UrlString::from_bytes(&header_bytes);

        let claims_bytes = claims_codec.encode(claims)?;
        let registered_bytes = self.registered_codec.encode(registered)?;
        let merged_payload = merge_json_objects(&claims_bytes, &registered_bytes)?;
        let payload_b64 = Base64UrlString::from_bytes(&merged_payload);

        let signing_input = format!("{}.{}", header_b64.as_str(), payload_b64.as_str());

        let keys = self.key_store.keys().await;
        let jwk = resolve(&keys, &header, KeyOp::Sign)?;
        let signing_key = keybridge::jwk_to_signing_key(jwk)?;

        let signature_bytes = match header.alg.family() {
            AlgorithmFamily::Hmac => {
                let key_bytes = match signing_key {
                    SigningKey::Symmetric(bytes) => bytes,
                    SigningKey::Private(_) => {
                        return Err(JoseError::MalformedToken(
                            "resolved signing key is asymmetric but algorithm is HMAC".into(),
                        ))
                    }
                };
                signature::sign_symmetric(signing_input.as_bytes(), &key_bytes, header.alg)?
            }
            _ => {
                let private_key = match signing_key {
                    SigningKey::Private(key) => key,
                    SigningKey::Symmetric(_) => {
                        return Err(JoseError::MalformedToken(
                            "resolved signing key is symmetric but algorithm is asymmetric".into(),
                        ))
                    }
                };
                signature::sign_asymmetric(signing_input.as_bytes(), &private_key, header.alg)?
            }
        };
        let signature_b64 = Base64UrlString::from_bytes(&signature_bytes);

        TokenString::parse(format!(
            "{}.{}.{}",
            header_b64.as_str(),
            payload_b64.as_str(),
            signature_b64.as_str()
        ))
    }
}

/// Merge two independently-serialised JSON objects at the byte level: strip
/// the trailing `}` from `first`, the leading `{` from `second`, and join
/// with `,`. Cheaper than decoding either into a generic map first.
///
/// Edge cases: either side serialising as `{}` yields the other side
/// unchanged. A literal key collision is *not* deduplicated here: the
/// merged bytes legitimately contain the key twice, with `second`'s
/// occurrence appearing later in the byte stream. Any downstream decoder
/// that folds duplicate keys (a generic JSON value, a `Map`) will therefore
/// see `second`'s value win, which is this function's documented contract:
/// on a name collision, the later (registered) field wins.
fn merge_json_objects(first: &[u8], second: &[u8]) -> Result<Vec<u8>, JoseError> {
    fn as_object(bytes: &[u8]) -> Result<&[u8], JoseError> {
        let text = std::str::from_utf8(bytes)
            .map_err(|e| JoseError::MalformedToken(format!("claims are not valid UTF-8: {e}")))?
            .trim();
        if text.len() < 2 || !text.starts_with('{') || !text.ends_with('}') {
            return Err(JoseError::MalformedToken(
                "claims must serialise as a JSON object".into(),
            ));
        }
        Ok(text.as_bytes())
    }

    let first = as_object(first)?;
    let second = as_object(second)?;

    if first == b"{}" {
        return Ok(second.to_vec());
    }
    if second == b"{}" {
        return Ok(first.to_vec());
    }

    let mut merged = Vec::with_capacity(first.len() + second.len());
    merged.extend_from_slice(&first[..first.len() - 1]);
    merged.push(b',');
    merged.extend_from_slice(&second[1..]);
    Ok(merged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jwk::{Jwk, JwkMetadata};
    use crate::keystore::StaticKeyStore;
    use crate::primitives::{Base64UrlString as B64, NumericDate};
    use serde_json::json;

    fn hmac_key_store() -> Arc<dyn KeyStore> {
        Arc::new(StaticKeyStore::new(vec![Jwk::SymmetricKey {
            k: B64::from_bytes(b"super-secret-key-material-0123456789"),
            meta: JwkMetadata {
                kid: Some(Kid::new("k1").unwrap()),
                alg: Some(Algorithm::Hs256),
                ..Default::default()
            },
        }]))
    }

    #[test]
    fn merge_strips_braces_and_inserts_comma() {
        let merged =
            merge_json_objects(br#"{"a":1}"#, br#"{"b":2}"#).unwrap();
        assert_eq!(merged, br#"{"a":1,"b":2}"#);
    }

    #[test]
    fn merge_empty_first_yields_second_unchanged() {
        let merged = merge_json_objects(b"{}", br#"{"b":2}"#).unwrap();
        assert_eq!(merged, br#"{"b":2}"#);
    }

    #[test]
    fn merge_empty_second_yields_first_unchanged() {
        let merged = merge_json_objects(br#"{"a":1}"#, b"{}").unwrap();
        assert_eq!(merged, br#"{"a":1}"#);
    }

    #[test]
    fn merge_both_empty_yields_empty_object() {
        let merged = merge_json_objects(b"{}", b"{}").unwrap();
        assert_eq!(merged, b"{}");
    }

    #[test]
    fn merge_rejects_non_object_shapes() {
        assert!(merge_json_objects(b"[1,2]", br#"{"a":1}"#).is_err());
        assert!(merge_json_objects(br#""a string""#, br#"{"a":1}"#).is_err());
    }

    #[test]
    fn merge_collision_registered_field_wins_on_generic_decode() {
        // `first` (custom claims) and `second` (registered claims) both
        // define "sub" with different values; decoding the merged bytes as
        // a generic JSON value must keep the later, registered one.
        let merged =
            merge_json_objects(br#"{"sub":"custom-wins-never"}"#, br#"{"sub":"registered"}"#)
                .unwrap();
        let value: serde_json::Value = serde_json::from_slice(&merged).unwrap();
        assert_eq!(value, json!({"sub": "registered"}));
    }

    #[tokio::test]
    async fn issue_then_validate_round_trip_preserves_registered_claims() {
        use crate::token::validator::{TokenProcessor, ValidatorConfig};

        #[derive(serde::Serialize, serde::Deserialize, PartialEq, Debug)]
        struct Custom {
            scope: String,
        }

        let issuer = TokenIssuer::new(
            IssuerConfig::new(Algorithm::Hs256).with_kid(Kid::new("k1").unwrap()),
            hmac_key_store(),
        );
        let registered = RegisteredClaims {
            iss: Some("issuer.example".into()),
            sub: Some("user-1".into()),
            aud: Some(crate::primitives::Audience::single("svc")),
            exp: Some(NumericDate::from_epoch_seconds(NumericDate::now().epoch_seconds() + 3600)),
            iat: Some(NumericDate::now()),
            jti: Some("abc-123".into()),
            ..Default::default()
        };
        let token = issuer
            .issue(
                &Custom { scope: "read".into() },
                &JsonCodec,
                &registered,
            )
            .await
            .unwrap();

        let processor = TokenProcessor::new(
            ValidatorConfig::new(vec![Algorithm::Hs256]).unwrap(),
            hmac_key_store(),
        );
        let decoded = processor
            .validate::<Custom>(&token, &JsonCodec)
            .await
            .unwrap();
        assert_eq!(decoded.registered, registered);
        assert_eq!(decoded.claims, Custom { scope: "read".into() });
        assert_eq!(decoded.header.kid.unwrap().as_str(), "k1");
    }
}
