//! Validated opaque strings, epoch timestamps, and the closed tagged
//! enumerations used throughout the rest of the crate. Every constructor here
//! either can't fail (infallible newtypes) or returns a [`JoseError`]; there
//! is no other way to build these values.

use std::sync::OnceLock;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use openssl::bn::BigNum;
use openssl::ec::EcGroup;
use openssl::nid::Nid;
use serde::{Deserialize, Serialize};

use crate::error::JoseError;

/// A validated compact serialisation: exactly three non-empty `.`-separated
/// segments, each restricted to the base64url alphabet. Construction is a
/// single linear scan; there is no regex and no second validation pass later
/// in the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenString(String);

impl TokenString {
    /// Parse and validate a compact-serialisation string in one pass.
    pub fn parse(raw: impl Into<String>) -> Result<Self, JoseError> {
        let raw = raw.into();
        let mut dots = 0usize;
        let mut segment_len = 0usize;
        for b in raw.bytes() {
            match b {
                b'.' => {
                    if segment_len == 0 {
                        return Err(JoseError::MalformedToken(
                            "empty segment in compact serialisation".into(),
                        ));
                    }
                    dots += 1;
                    segment_len = 0;
                }
                b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' => {
                    segment_len += 1;
                }
                other => {
                    return Err(JoseError::MalformedToken(format!(
                        "invalid compact-serialisation byte: {other:#x}"
                    )));
                }
            }
        }
        if dots != 2 || segment_len == 0 {
            return Err(JoseError::MalformedToken(
                "compact serialisation must have exactly three non-empty segments".into(),
            ));
        }
        Ok(TokenString(raw))
    }

    /// The three segments, in header/payload/signature order.
    pub fn segments(&self) -> [&str; 3] {
        let mut parts = self.0.splitn(3, '.');
        let header = parts.next().expect("validated at construction");
        let payload = parts.next().expect("validated at construction");
        let signature = parts.next().expect("validated at construction");
        [header, payload, signature]
    }

    /// The ASCII byte range that was actually signed: `header_b64 "." payload_b64`.
    pub fn signing_input(&self) -> &str {
        let sig_start = self.0.rfind('.').expect("validated at construction");
        &self.0[..sig_start]
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for TokenString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A non-empty base64url (no padding) string, used for every key-material
/// field in a [`crate::jwk::Jwk`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Base64UrlString(String);

impl Base64UrlString {
    pub fn new(raw: impl Into<String>) -> Result<Self, JoseError> {
        let raw = raw.into();
        if raw.is_empty() {
            return Err(JoseError::MalformedToken(
                "base64url field must not be empty".into(),
            ));
        }
        if !raw
            .bytes()
            .all(|b| matches!(b, b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_'))
        {
            return Err(JoseError::MalformedToken(
                "base64url field contains non-alphabet characters".into(),
            ));
        }
        Ok(Base64UrlString(raw))
    }

    /// Build directly from raw bytes, for the encode direction.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        use base64::Engine as _;
        Base64UrlString(base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes))
    }

    pub fn decode(&self) -> Result<Vec<u8>, JoseError> {
        use base64::Engine as _;
        Ok(base64::engine::general_purpose::URL_SAFE_NO_PAD.decode(&self.0)?)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Serialize for Base64UrlString {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for Base64UrlString {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Base64UrlString::new(raw).map_err(serde::de::Error::custom)
    }
}

/// A non-empty key identifier. Empty strings are rejected at construction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Kid(String);

impl Kid {
    pub fn new(raw: impl Into<String>) -> Result<Self, JoseError> {
        let raw = raw.into();
        if raw.is_empty() {
            return Err(JoseError::MalformedToken("kid must not be empty".into()));
        }
        Ok(Kid(raw))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl<'de> Deserialize<'de> for Kid {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Kid::new(raw).map_err(serde::de::Error::custom)
    }
}

/// The three standard NIST curves this crate supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EcCurve {
    P256,
    P384,
    P521,
}

static P256_GROUP: OnceLock<EcGroup> = OnceLock::new();
static P384_GROUP: OnceLock<EcGroup> = OnceLock::new();
static P521_GROUP: OnceLock<EcGroup> = OnceLock::new();

impl EcCurve {
    pub fn nid(self) -> Nid {
        match self {
            EcCurve::P256 => Nid::X9_62_PRIME256V1,
            EcCurve::P384 => Nid::SECP384R1,
            EcCurve::P521 => Nid::SECP521R1,
        }
    }

    /// Coordinate byte length: 32/48/66 for P-256/384/521.
    pub fn coordinate_len(self) -> usize {
        match self {
            EcCurve::P256 => 32,
            EcCurve::P384 => 48,
            EcCurve::P521 => 66,
        }
    }

    /// The cached native curve parameter specification.
    pub fn group(self) -> Result<&'static EcGroup, JoseError> {
        let cell = match self {
            EcCurve::P256 => &P256_GROUP,
            EcCurve::P384 => &P384_GROUP,
            EcCurve::P521 => &P521_GROUP,
        };
        if let Some(group) = cell.get() {
            return Ok(group);
        }
        let group = EcGroup::from_curve_name(self.nid())?;
        Ok(cell.get_or_init(|| group))
    }

    /// The group order N, as a fresh `BigNum` (cheap; `BigNum` itself is not
    /// `Sync` so it cannot be cached behind a `OnceLock` the way the group
    /// can).
    pub fn order_n(self) -> Result<BigNum, JoseError> {
        let group = self.group()?;
        let mut ctx = openssl::bn::BigNumContext::new()?;
        let mut n = BigNum::new()?;
        group.order(&mut n, &mut ctx)?;
        Ok(n)
    }

    pub fn rfc_name(self) -> &'static str {
        match self {
            EcCurve::P256 => "P-256",
            EcCurve::P384 => "P-384",
            EcCurve::P521 => "P-521",
        }
    }

    /// Derive a curve from a field-size in bits, as `native -> JWK` does when
    /// deriving `crv` from a key's own field.
    pub fn from_field_bits(bits: usize) -> Result<Self, JoseError> {
        match bits {
            256 => Ok(EcCurve::P256),
            384 => Ok(EcCurve::P384),
            521 => Ok(EcCurve::P521),
            other => Err(JoseError::MalformedToken(format!(
                "unsupported EC field size: {other} bits"
            ))),
        }
    }
}

impl std::str::FromStr for EcCurve {
    type Err = JoseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "P-256" => Ok(EcCurve::P256),
            "P-384" => Ok(EcCurve::P384),
            "P-521" => Ok(EcCurve::P521),
            other => Err(JoseError::MalformedToken(format!(
                "unsupported EC curve: {other}"
            ))),
        }
    }
}

/// Algorithm family, used to dispatch to the right signature-engine
/// implementation and to check JWK/header suitability.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlgorithmFamily {
    Hmac,
    Rsa,
    Ec,
    RsaPss,
}

/// The closed set of twelve supported algorithms. There is deliberately no
/// `none` variant: the type itself makes the CVE-class "alg confusion with
/// none" attack unrepresentable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Algorithm {
    Hs256,
    Hs384,
    Hs512,
    Rs256,
    Rs384,
    Rs512,
    Es256,
    Es384,
    Es512,
    Ps256,
    Ps384,
    Ps512,
}

impl Algorithm {
    pub fn family(self) -> AlgorithmFamily {
        use Algorithm::*;
        match self {
            Hs256 | Hs384 | Hs512 => AlgorithmFamily::Hmac,
            Rs256 | Rs384 | Rs512 => AlgorithmFamily::Rsa,
            Es256 | Es384 | Es512 => AlgorithmFamily::Ec,
            Ps256 | Ps384 | Ps512 => AlgorithmFamily::RsaPss,
        }
    }

    /// SHA digest size in bytes: 32/48/64.
    pub fn hash_len(self) -> usize {
        use Algorithm::*;
        match self {
            Hs256 | Rs256 | Es256 | Ps256 => 32,
            Hs384 | Rs384 | Es384 | Ps384 => 48,
            Hs512 | Rs512 | Es512 | Ps512 => 64,
        }
    }

    pub fn message_digest(self) -> openssl::hash::MessageDigest {
        match self.hash_len() {
            32 => openssl::hash::MessageDigest::sha256(),
            48 => openssl::hash::MessageDigest::sha384(),
            64 => openssl::hash::MessageDigest::sha512(),
            _ => unreachable!("hash_len is one of 32/48/64"),
        }
    }

    /// The curve for EC variants, `None` otherwise.
    pub fn curve(self) -> Option<EcCurve> {
        match self {
            Algorithm::Es256 => Some(EcCurve::P256),
            Algorithm::Es384 => Some(EcCurve::P384),
            Algorithm::Es512 => Some(EcCurve::P521),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        use Algorithm::*;
        match self {
            Hs256 => "HS256",
            Hs384 => "HS384",
            Hs512 => "HS512",
            Rs256 => "RS256",
            Rs384 => "RS384",
            Rs512 => "RS512",
            Es256 => "ES256",
            Es384 => "ES384",
            Es512 => "ES512",
            Ps256 => "PS256",
            Ps384 => "PS384",
            Ps512 => "PS512",
        }
    }
}

impl std::str::FromStr for Algorithm {
    type Err = JoseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        use Algorithm::*;
        Ok(match s {
            "HS256" => Hs256,
            "HS384" => Hs384,
            "HS512" => Hs512,
            "RS256" => Rs256,
            "RS384" => Rs384,
            "RS512" => Rs512,
            "ES256" => Es256,
            "ES384" => Es384,
            "ES512" => Es512,
            "PS256" => Ps256,
            "PS384" => Ps384,
            "PS512" => Ps512,
            // "none" and anything else are rejected here, at the single
            // choke point every header/JWK algorithm string passes through.
            other => {
                return Err(JoseError::MalformedToken(format!(
                    "unsupported or unknown algorithm: {other}"
                )))
            }
        })
    }
}

impl Serialize for Algorithm {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

impl<'de> Deserialize<'de> for Algorithm {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Intended use of a JWK: signature or encryption. Only `Sig` participates in
/// this crate's suitability predicates; `Enc` keys are never selected for
/// JWS operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum KeyUse {
    #[serde(rename = "sig")]
    Sig,
    #[serde(rename = "enc")]
    Enc,
}

/// Key operations, RFC 7517 §4.3.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum KeyOp {
    #[serde(rename = "sign")]
    Sign,
    #[serde(rename = "verify")]
    Verify,
    #[serde(rename = "encrypt")]
    Encrypt,
    #[serde(rename = "decrypt")]
    Decrypt,
    #[serde(rename = "wrapKey")]
    WrapKey,
    #[serde(rename = "unwrapKey")]
    UnwrapKey,
    #[serde(rename = "deriveKey")]
    DeriveKey,
    #[serde(rename = "deriveBits")]
    DeriveBits,
}

/// The `aud` claim: either a single string or a non-empty list. A
/// single-element list collapses to `Single` on decode, never `Many`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Audience {
    Single(String),
    Many(Vec<String>),
}

impl Audience {
    /// Smart-construct from a sequence, collapsing a length-1 sequence to
    /// `Single`. Returns `None` for an empty sequence (callers should treat an
    /// empty `aud` the same as an absent one).
    pub fn from_values(values: Vec<String>) -> Option<Self> {
        match values.len() {
            0 => None,
            1 => Some(Audience::Single(values.into_iter().next().unwrap())),
            _ => Some(Audience::Many(values)),
        }
    }

    pub fn single(value: impl Into<String>) -> Self {
        Audience::Single(value.into())
    }

    /// Whether `candidate` is among the audience values.
    pub fn contains(&self, candidate: &str) -> bool {
        match self {
            Audience::Single(v) => v == candidate,
            Audience::Many(vs) => vs.iter().any(|v| v == candidate),
        }
    }
}

impl std::fmt::Display for Audience {
    /// Rendered only for error messages (`JoseError::InvalidAudience`'s
    /// `actual` field); the wire encoding is [`Serialize`], not this.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Audience::Single(v) => f.write_str(v),
            Audience::Many(vs) => f.write_str(&vs.join(",")),
        }
    }
}

impl Serialize for Audience {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Audience::Single(v) => serializer.serialize_str(v),
            Audience::Many(vs) => vs.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for Audience {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Shape {
            One(String),
            Many(Vec<String>),
        }
        match Shape::deserialize(deserializer)? {
            Shape::One(v) => Ok(Audience::Single(v)),
            Shape::Many(vs) => Audience::from_values(vs)
                .ok_or_else(|| serde::de::Error::custom("aud array must not be empty")),
        }
    }
}

/// RFC 7519 §2 `NumericDate`: integer seconds since the Unix epoch. Serialises
/// as a JSON integer, never an ISO-8601 string. Negative values are valid and
/// round-trip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct NumericDate(i64);

impl NumericDate {
    pub fn from_epoch_seconds(seconds: i64) -> Self {
        NumericDate(seconds)
    }

    pub fn epoch_seconds(self) -> i64 {
        self.0
    }

    pub fn now() -> Self {
        Self::from_system_time(SystemTime::now())
    }

    pub fn from_system_time(time: SystemTime) -> Self {
        match time.duration_since(UNIX_EPOCH) {
            Ok(d) => NumericDate(d.as_secs() as i64),
            Err(e) => NumericDate(-(e.duration().as_secs() as i64)),
        }
    }

    pub fn to_system_time(self) -> SystemTime {
        if self.0 >= 0 {
            UNIX_EPOCH + Duration::from_secs(self.0 as u64)
        } else {
            UNIX_EPOCH - Duration::from_secs((-self.0) as u64)
        }
    }
}

impl Serialize for NumericDate {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i64(self.0)
    }
}

impl<'de> Deserialize<'de> for NumericDate {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let seconds = i64::deserialize(deserializer)?;
        Ok(NumericDate(seconds))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_string_requires_three_segments() {
        assert!(TokenString::parse("a.b.c").is_ok());
        assert!(TokenString::parse("a.b").is_err());
        assert!(TokenString::parse("a.b.c.d").is_err());
        assert!(TokenString::parse("a..c").is_err());
        assert!(TokenString::parse("a.b.").is_err());
    }

    #[test]
    fn token_string_rejects_non_alphabet_bytes() {
        assert!(TokenString::parse("a.b.c!").is_err());
        assert!(TokenString::parse("a.b+.c").is_err());
    }

    #[test]
    fn token_string_signing_input_excludes_signature() {
        let t = TokenString::parse("hdr.payload.sig").unwrap();
        assert_eq!(t.signing_input(), "hdr.payload");
        assert_eq!(t.segments(), ["hdr", "payload", "sig"]);
    }

    #[test]
    fn algorithm_has_no_none_variant() {
        assert!("none".parse::<Algorithm>().is_err());
        assert!("NONE".parse::<Algorithm>().is_err());
    }

    #[test]
    fn audience_single_element_array_collapses() {
        let aud = Audience::from_values(vec!["a".into()]).unwrap();
        assert_eq!(aud, Audience::Single("a".into()));

        let many = Audience::from_values(vec!["a".into(), "b".into()]).unwrap();
        assert_eq!(many, Audience::Many(vec!["a".into(), "b".into()]));

        assert!(Audience::from_values(vec![]).is_none());
    }

    #[test]
    fn audience_round_trips_through_json() {
        let single = Audience::single("a");
        let json = serde_json::to_string(&single).unwrap();
        assert_eq!(json, "\"a\"");
        let decoded: Audience = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, single);

        let many = Audience::Many(vec!["a".into(), "b".into()]);
        let json = serde_json::to_string(&many).unwrap();
        let decoded: Audience = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, many);
    }

    #[test]
    fn numeric_date_round_trips_zero_and_negative() {
        for secs in [0i64, -1, -86400, 1_700_000_000] {
            let d = NumericDate::from_epoch_seconds(secs);
            let json = serde_json::to_string(&d).unwrap();
            let decoded: NumericDate = serde_json::from_str(&json).unwrap();
            assert_eq!(decoded.epoch_seconds(), secs);
        }
    }

    #[test]
    fn ec_curve_coordinate_lengths() {
        assert_eq!(EcCurve::P256.coordinate_len(), 32);
        assert_eq!(EcCurve::P384.coordinate_len(), 48);
        assert_eq!(EcCurve::P521.coordinate_len(), 66);
    }

    #[test]
    fn ec_curve_from_field_bits() {
        assert_eq!(EcCurve::from_field_bits(256).unwrap(), EcCurve::P256);
        assert_eq!(EcCurve::from_field_bits(384).unwrap(), EcCurve::P384);
        assert_eq!(EcCurve::from_field_bits(521).unwrap(), EcCurve::P521);
        assert!(EcCurve::from_field_bits(255).is_err());
    }
}
