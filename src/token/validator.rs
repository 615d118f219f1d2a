//! `TokenProcessor::validate` (§4.3): the end-to-end parse -> header decode
//! -> algorithm admission -> key resolution -> signature verify -> payload
//! decode -> claim validation pipeline. Strictly fail-fast: the first failing
//! step short-circuits the rest.

use std::sync::Arc;
use std::time::{Duration, SystemTime};

use tracing::{debug, warn};

use crate::claims::{JoseHeader, Jwt, RegisteredClaims};
use crate::codec::{Codec, JsonCodec};
use crate::error::JoseError;
use crate::keybridge::{self, VerifyingKey};
use crate::keystore::{resolve, KeyStore};
use crate::primitives::{Algorithm, AlgorithmFamily, KeyOp, TokenString};
use crate::signature;

/// Validation-side configuration (§6 "Configuration surface"). Constructed
/// with the non-empty allow-list the spec requires; everything else defaults
/// to "no additional constraint".
#[derive(Clone)]
pub struct ValidatorConfig {
    pub clock_skew: Duration,
    pub required_issuer: Option<String>,
    pub required_audience: Option<String>,
    pub required_typ: Option<String>,
    allowed_algorithms: Vec<Algorithm>,
}

impl ValidatorConfig {
    /// `allowed_algorithms` must be non-empty; this is the crate's stand-in
    /// for the spec's `NonEmpty<Algorithm>`.
    pub fn new(allowed_algorithms: Vec<Algorithm>) -> Result<Self, JoseError> {
        if allowed_algorithms.is_empty() {
            return Err(JoseError::MalformedToken(
                "allowedAlgorithms must not be empty".into(),
            ));
        }
        Ok(ValidatorConfig {
            clock_skew: Duration::from_secs(0),
            required_issuer: None,
            required_audience: None,
            required_typ: None,
            allowed_algorithms,
        })
    }

    pub fn with_clock_skew(mut self, skew: Duration) -> Self {
        self.clock_skew = skew;
        self
    }

    pub fn with_required_issuer(mut self, issuer: impl Into<String>) -> Self {
        self.required_issuer = Some(issuer.into());
        self
    }

    pub fn with_required_audience(mut self, audience: impl Into<String>) -> Self {
        self.required_audience = Some(audience.into());
        self
    }

    pub fn with_required_typ(mut self, typ: impl Into<String>) -> Self {
        self.required_typ = Some(typ.into());
        self
    }

    pub fn allowed_algorithms(&self) -> &[Algorithm] {
        &self.allowed_algorithms
    }
}

/// Decodes, verifies and validates compact-serialisation tokens against a
/// [`KeyStore`]. State-free once constructed: the config and key store are
/// fixed, and `validate` calls never mutate shared state.
pub struct TokenProcessor {
    config: ValidatorConfig,
    key_store: Arc<dyn KeyStore>,
    header_codec: Arc<dyn Codec<JoseHeader> + Send + Sync>,
    registered_codec: Arc<dyn Codec<RegisteredClaims> + Send + Sync>,
}

impl TokenProcessor {
    pub fn new(config: ValidatorConfig, key_store: Arc<dyn KeyStore>) -> Self {
        TokenProcessor {
            config,
            key_store,
            header_codec: Arc::new(JsonCodec),
            registered_codec: Arc::new(JsonCodec),
        }
    }

    /// Inject non-default codecs for the header and registered claims (the
    /// custom-claims codec for `A` is supplied per call to [`Self::validate`]).
    pub fn with_codecs(
        mut self,
        header_codec: Arc<dyn Codec<JoseHeader> + Send + Sync>,
        registered_codec: Arc<dyn Codec<RegisteredClaims> + Send + Sync>,
    ) -> Self {
        self.header_codec = header_codec;
        self.registered_codec = registered_codec;
        self
    }

    /// Run the full §4.3 pipeline. `claims_codec` decodes the payload into
    /// the caller's custom-claim shape `A`; `RegisteredClaims` is always
    /// decoded with the codec injected at construction (or the default JSON
    /// one).
    pub async fn validate<A>(
        &self,
        token: &TokenString,
        claims_codec: &dyn Codec<A>,
    ) -> Result<Jwt<A>, JoseError> {
        use base64::Engine as _;
        let engine = base64::engine::general_purpose::URL_SAFE_NO_PAD;

        // Step 1: segment and decode.
        let [header_b64, payload_b64, signature_b64] = token.segments();
        let header_bytes = engine
            .decode(header_b64)
            .map_err(|e| JoseError::MalformedToken(format!("header: {e}")))?;
        let payload_bytes = engine
            .decode(payload_b64)
            .map_err(|e| JoseError::MalformedToken(format!("payload: {e}")))?;
        let signature_bytes = engine
            .decode(signature_b64)
            .map_err(|e| JoseError::MalformedToken(format!("signature: {e}")))?;
        let signing_input = token.signing_input().as_bytes();

        // Step 2: header decode. `Algorithm`'s `Deserialize` impl is the
        // single choke point that rejects `alg: "none"` and unknown algs.
        let header: JoseHeader = self.header_codec.decode(&header_bytes)?;

        // Step 3: algorithm admission.
        if !self.config.allowed_algorithms.contains(&header.alg) {
            warn!(alg = header.alg.name(), "algorithm rejected by allow-list");
            return Err(JoseError::UnsupportedAlgorithm(header.alg.name().to_string()));
        }

        // Step 4: key resolution.
        let keys = self.key_store.keys().await;
        let jwk = match resolve(&keys, &header, KeyOp::Verify) {
            Ok(jwk) => jwk,
            Err(err) => {
                debug!(kid = ?header.kid.as_ref().map(|k| k.as_str()), "key resolution failed");
                return Err(err);
            }
        };

        // Step 5: signature verification.
        match header.alg.family() {
            AlgorithmFamily::Hmac => {
                let key = match keybridge::jwk_to_verifying_key(jwk)? {
                    VerifyingKey::Symmetric(bytes) => bytes,
                    VerifyingKey::Public(_) => {
                        return Err(JoseError::MalformedToken(
                            "resolved key is asymmetric but algorithm is HMAC".into(),
                        ))
                    }
                };
                signature::verify_symmetric(signing_input, &signature_bytes, &key, header.alg)?;
            }
            _ => {
                let key = match keybridge::jwk_to_verifying_key(jwk)? {
                    VerifyingKey::Public(pkey) => pkey,
                    VerifyingKey::Symmetric(_) => {
                        return Err(JoseError::MalformedToken(
                            "resolved key is symmetric but algorithm is asymmetric".into(),
                        ))
                    }
                };
                signature::verify_asymmetric(signing_input, &signature_bytes, &key, header.alg)?;
            }
        }

        // Step 6: payload decode, twice.
        let claims: A = claims_codec.decode(&payload_bytes)?;
        let registered: RegisteredClaims = self.registered_codec.decode(&payload_bytes)?;

        // Step 7: claim validation. "Now" is captured exactly once.
        let now = SystemTime::now();
        self.validate_claims(&header, &registered, now)?;

        Ok(Jwt {
            header,
            claims,
            registered,
        })
    }

    fn validate_claims(
        &self,
        header: &JoseHeader,
        registered: &RegisteredClaims,
        now: SystemTime,
    ) -> Result<(), JoseError> {
        if let Some(exp) = registered.exp {
            let expiry = exp.to_system_time() + self.config.clock_skew;
            if now >= expiry {
                return Err(JoseError::Expired {
                    exp: exp.to_system_time(),
                    now,
                });
            }
        }

        if let Some(nbf) = registered.nbf {
            let nbf_time = nbf.to_system_time();
            let threshold = nbf_time
                .checked_sub(self.config.clock_skew)
                .unwrap_or(std::time::UNIX_EPOCH);
            if now < threshold {
                return Err(JoseError::NotYetValid {
                    nbf: nbf_time,
                    now,
                });
            }
        }

        if let Some(required_issuer) = &self.config.required_issuer {
            if registered.iss.as_deref() != Some(required_issuer.as_str()) {
                return Err(JoseError::InvalidIssuer {
                    expected: required_issuer.clone(),
                    actual: registered.iss.clone(),
                });
            }
        }

        if let Some(required_audience) = &self.config.required_audience {
            let matches = registered
                .aud
                .as_ref()
                .map(|aud| aud.contains(required_audience))
                .unwrap_or(false);
            if !matches {
                return Err(JoseError::InvalidAudience {
                    expected: required_audience.clone(),
                    actual: registered.aud.as_ref().map(|a| a.to_string()),
                });
            }
        }

        if let Some(required_typ) = &self.config.required_typ {
            if header.typ.as_deref() != Some(required_typ.as_str()) {
                return Err(JoseError::MalformedToken("typ mismatch".into()));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::JsonCodec;
    use crate::jwk::{Jwk, JwkMetadata};
    use crate::keystore::StaticKeyStore;
    use crate::primitives::{Base64UrlString, Kid, NumericDate};
    use crate::token::issuer::{IssuerConfig, TokenIssuer};
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct CustomClaims {
        #[serde(skip_serializing_if = "Option::is_none", default)]
        scope: Option<String>,
    }

    fn hmac_key_store(kid: &str) -> Arc<dyn KeyStore> {
        Arc::new(StaticKeyStore::new(vec![Jwk::SymmetricKey {
            k: Base64UrlString::from_bytes(b"super-secret-key-material-0123456789"),
            meta: JwkMetadata {
                kid: Some(Kid::new(kid).unwrap()),
                alg: Some(Algorithm::Hs256),
                ..Default::default()
            },
        }]))
    }

    async fn issue_hs256(kid: &str, registered: RegisteredClaims) -> TokenString {
        let issuer = TokenIssuer::new(
            IssuerConfig::new(Algorithm::Hs256).with_kid(Kid::new(kid).unwrap()),
            hmac_key_store(kid),
        );
        issuer
            .issue(
                &CustomClaims { scope: Some("read".into()) },
                &JsonCodec,
                &registered,
            )
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn hs256_happy_path() {
        let token = issue_hs256(
            "k1",
            RegisteredClaims {
                sub: Some("test".into()),
                ..Default::default()
            },
        )
        .await;

        let processor = TokenProcessor::new(
            ValidatorConfig::new(vec![Algorithm::Hs256]).unwrap(),
            hmac_key_store("k1"),
        );
        let decoded: Jwt<CustomClaims> = processor.validate(&token, &JsonCodec).await.unwrap();
        assert_eq!(decoded.header.alg, Algorithm::Hs256);
        assert_eq!(decoded.registered.sub, Some("test".into()));
        assert_eq!(decoded.claims.scope, Some("read".into()));
    }

    #[tokio::test]
    async fn expired_token_is_rejected() {
        let token = issue_hs256(
            "k1",
            RegisteredClaims {
                exp: Some(NumericDate::from_epoch_seconds(0)),
                ..Default::default()
            },
        )
        .await;

        let processor = TokenProcessor::new(
            ValidatorConfig::new(vec![Algorithm::Hs256]).unwrap(),
            hmac_key_store("k1"),
        );
        let result: Result<Jwt<CustomClaims>, _> = processor.validate(&token, &JsonCodec).await;
        assert!(matches!(result, Err(JoseError::Expired { .. })));
    }

    #[tokio::test]
    async fn clock_skew_tolerates_recently_expired_token() {
        let now = NumericDate::now().epoch_seconds();
        let token = issue_hs256(
            "k1",
            RegisteredClaims {
                exp: Some(NumericDate::from_epoch_seconds(now - 300)),
                ..Default::default()
            },
        )
        .await;

        let processor = TokenProcessor::new(
            ValidatorConfig::new(vec![Algorithm::Hs256])
                .unwrap()
                .with_clock_skew(Duration::from_secs(3600)),
            hmac_key_store("k1"),
        );
        let result: Result<Jwt<CustomClaims>, _> = processor.validate(&token, &JsonCodec).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn tampered_signature_is_rejected() {
        use base64::Engine as _;
        let engine = base64::engine::general_purpose::URL_SAFE_NO_PAD;

        let token = issue_hs256("k1", RegisteredClaims::default()).await;
        let segments = token.segments();
        let mut sig_bytes = engine.decode(segments[2]).unwrap();
        sig_bytes[0] ^= 0x01;
        let tampered_sig = engine.encode(&sig_bytes);
        let tampered = TokenString::parse(format!(
            "{}.{}.{}",
            segments[0], segments[1], tampered_sig
        ))
        .unwrap();

        let processor = TokenProcessor::new(
            ValidatorConfig::new(vec![Algorithm::Hs256]).unwrap(),
            hmac_key_store("k1"),
        );
        let result: Result<Jwt<CustomClaims>, _> = processor.validate(&tampered, &JsonCodec).await;
        assert!(matches!(result, Err(JoseError::InvalidSignature)));
    }

    #[tokio::test]
    async fn algorithm_not_in_allow_list_is_rejected() {
        let token = issue_hs256("k1", RegisteredClaims::default()).await;
        let processor = TokenProcessor::new(
            ValidatorConfig::new(vec![Algorithm::Rs256]).unwrap(),
            hmac_key_store("k1"),
        );
        let result: Result<Jwt<CustomClaims>, _> = processor.validate(&token, &JsonCodec).await;
        assert!(matches!(
            result,
            Err(JoseError::UnsupportedAlgorithm(ref a)) if a == "HS256"
        ));
    }

    #[tokio::test]
    async fn alg_none_header_fails_at_decode_never_reaches_verification() {
        let header_json = r#"{"alg":"none"}"#;
        let header_b64 = Base64UrlString::from_bytes(header_json.as_bytes());
        let payload_b64 = Base64UrlString::from_bytes(b"{}");
        let token = TokenString::parse(format!(
            "{}.{}.{}",
            header_b64.as_str(),
            payload_b64.as_str(),
            header_b64.as_str()
        ))
        .unwrap();

        let processor = TokenProcessor::new(
            ValidatorConfig::new(vec![Algorithm::Hs256]).unwrap(),
            hmac_key_store("k1"),
        );
        let result: Result<Jwt<CustomClaims>, _> = processor.validate(&token, &JsonCodec).await;
        assert!(matches!(result, Err(JoseError::MalformedToken(_))));
    }

    #[tokio::test]
    async fn required_issuer_mismatch_is_rejected() {
        let token = issue_hs256(
            "k1",
            RegisteredClaims {
                iss: Some("actual-issuer".into()),
                ..Default::default()
            },
        )
        .await;
        let processor = TokenProcessor::new(
            ValidatorConfig::new(vec![Algorithm::Hs256])
                .unwrap()
                .with_required_issuer("expected-issuer"),
            hmac_key_store("k1"),
        );
        let result: Result<Jwt<CustomClaims>, _> = processor.validate(&token, &JsonCodec).await;
        assert!(matches!(result, Err(JoseError::InvalidIssuer { .. })));
    }

    #[tokio::test]
    async fn required_audience_checks_multi_valued_claim() {
        let token = issue_hs256(
            "k1",
            RegisteredClaims {
                aud: crate::primitives::Audience::from_values(vec![
                    "svc-a".into(),
                    "svc-b".into(),
                ]),
                ..Default::default()
            },
        )
        .await;
        let processor = TokenProcessor::new(
            ValidatorConfig::new(vec![Algorithm::Hs256])
                .unwrap()
                .with_required_audience("svc-b"),
            hmac_key_store("k1"),
        );
        let result: Result<Jwt<CustomClaims>, _> = processor.validate(&token, &JsonCodec).await;
        assert!(result.is_ok());
    }
}
