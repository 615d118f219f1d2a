//! The JOSE header and the registered claim set, plus the decoded-token
//! envelope `Jwt<A>` that carries both a caller-typed custom-claim projection
//! and the registered claims side by side. The payload is decoded twice,
//! once as each, because both projections coexist in the same JSON object.

use serde::{Deserialize, Serialize};

use crate::primitives::{Algorithm, Audience, Kid, NumericDate};

/// The JOSE header. Unknown members are ignored on decode; `alg` is
/// required; `alg: "none"` is rejected during `Algorithm` deserialisation
/// before it ever reaches this struct.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoseHeader {
    pub alg: Algorithm,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub typ: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub cty: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub kid: Option<Kid>,
}

impl JoseHeader {
    pub fn new(alg: Algorithm) -> Self {
        JoseHeader {
            alg,
            typ: None,
            cty: None,
            kid: None,
        }
    }
}

/// The registered claim set from RFC 7519 §4.1. All members are optional; a
/// JSON `null` for any field is treated as absent.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RegisteredClaims {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub iss: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub sub: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub aud: Option<Audience>,

    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub exp: Option<NumericDate>,

    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub nbf: Option<NumericDate>,

    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub iat: Option<NumericDate>,

    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub jti: Option<String>,
}

/// A decoded and validated token. `A` is the caller-supplied custom-claim
/// shape, decoded independently from `registered` even though both come from
/// the same JSON payload object.
#[derive(Debug, Clone)]
pub struct Jwt<A> {
    pub header: JoseHeader,
    pub claims: A,
    pub registered: RegisteredClaims,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_decode_ignores_unknown_members() {
        let json = r#"{"alg":"HS256","unknown_field":"x","kid":"k1"}"#;
        let header: JoseHeader = serde_json::from_str(json).unwrap();
        assert_eq!(header.alg, Algorithm::Hs256);
        assert_eq!(header.kid.unwrap().as_str(), "k1");
    }

    #[test]
    fn header_decode_rejects_none_algorithm() {
        let json = r#"{"alg":"none"}"#;
        let result: Result<JoseHeader, _> = serde_json::from_str(json);
        assert!(result.is_err());
    }

    #[test]
    fn registered_claims_null_is_absent() {
        let json = r#"{"iss":null,"sub":"abc"}"#;
        let claims: RegisteredClaims = serde_json::from_str(json).unwrap();
        assert_eq!(claims.iss, None);
        assert_eq!(claims.sub, Some("abc".to_string()));
    }

    #[test]
    fn registered_claims_all_absent_decodes_to_default() {
        let claims: RegisteredClaims = serde_json::from_str("{}").unwrap();
        assert_eq!(claims, RegisteredClaims::default());
    }
}
