//! The key store abstraction (§4.5): a source of JWKs, plus the resolution
//! algorithm that turns a JOSE header and a suitability predicate into
//! exactly one key, or a `KeyNotFound` error.

pub mod refresh;

use std::sync::Arc;

use async_trait::async_trait;

use crate::claims::JoseHeader;
use crate::error::JoseError;
use crate::jwk::Jwk;
use crate::primitives::KeyOp;

/// A source of JWKs. `keys()` is infallible at this interface; failure
/// modes live inside whichever implementation backs it (see
/// `refresh::RefreshingKeyStore` for the one case where fetches can fail).
#[async_trait]
pub trait KeyStore: Send + Sync {
    async fn keys(&self) -> Arc<Vec<Jwk>>;
}

/// A fixed sequence of JWKs, returned unchanged on every call.
pub struct StaticKeyStore {
    keys: Arc<Vec<Jwk>>,
}

impl StaticKeyStore {
    pub fn new(keys: Vec<Jwk>) -> Self {
        StaticKeyStore {
            keys: Arc::new(keys),
        }
    }
}

#[async_trait]
impl KeyStore for StaticKeyStore {
    async fn keys(&self) -> Arc<Vec<Jwk>> {
        self.keys.clone()
    }
}

/// Resolve exactly one key out of `keys` suitable for `op` under the
/// header's algorithm, disambiguating by `kid` when the header carries one.
///
/// 1. Filter by the suitability predicate (use/key_ops/alg).
/// 2. If the header has a `kid`, keep keys whose `kid` matches it; success
///    iff exactly one remains.
/// 3. If the header has no `kid`, success iff the filtered set has exactly
///    one key.
pub fn resolve<'a>(
    keys: &'a [Jwk],
    header: &JoseHeader,
    op: KeyOp,
) -> Result<&'a Jwk, JoseError> {
    let mut suitable = keys.iter().filter(|k| k.suitable_for(op, header.alg));

    match &header.kid {
        Some(kid) => {
            let mut matches = suitable.filter(|k| k.kid() == Some(kid));
            match (matches.next(), matches.next()) {
                (Some(found), None) => Ok(found),
                _ => Err(JoseError::KeyNotFound(Some(kid.as_str().to_string()))),
            }
        }
        None => match (suitable.next(), suitable.next()) {
            (Some(found), None) => Ok(found),
            _ => Err(JoseError::KeyNotFound(None)),
        },
    }
}
