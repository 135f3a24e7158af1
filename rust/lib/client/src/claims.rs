//! Local, unverified decoding of access-token claims.
//!
//! The client never trusts these claims for authorization; the server
//! re-validates every request. They are read only to decide whether a token
//! is worth sending and to show who is logged in.

use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ApiError;

/// Payload of an access token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nbf: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jti: Option<String>,
    /// Expiry, seconds since epoch.
    pub exp: i64,
    /// Every other claim the auth service put in the token.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Claims {
    /// Expired once the clock reaches `exp`.
    pub fn is_expired_at(&self, now: i64) -> bool {
        now >= self.exp
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(chrono::Utc::now().timestamp())
    }

    /// Seconds until expiry (negative once expired).
    pub fn remaining_secs(&self) -> i64 {
        self.exp - chrono::Utc::now().timestamp()
    }
}

/// Decode the payload without checking the signature or the expiry.
///
/// Fails when the token is not a three-segment JWT or its payload lacks a
/// numeric `exp`.
pub fn decode_claims(token: &str) -> Result<Claims, ApiError> {
    if token.split('.').count() != 3 {
        return Err(ApiError::Token("invalid token format".into()));
    }

    let mut validation = Validation::new(Algorithm::HS256);
    validation.insecure_disable_signature_validation();
    validation.validate_exp = false;
    validation.validate_nbf = false;
    validation.validate_aud = false;

    decode::<Claims>(token, &DecodingKey::from_secret(&[]), &validation)
        .map(|data| data.claims)
        .map_err(|e| ApiError::Token(e.to_string()))
}

/// Absent, malformed and expired tokens all count as expired.
pub fn is_token_expired(token: Option<&str>) -> bool {
    is_token_expired_at(token, chrono::Utc::now().timestamp())
}

pub fn is_token_expired_at(token: Option<&str>, now: i64) -> bool {
    match token {
        Some(t) => decode_claims(t).map(|c| c.is_expired_at(now)).unwrap_or(true),
        None => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};

    fn mint(claims: &Claims) -> String {
        encode(
            &Header::default(),
            claims,
            &EncodingKey::from_secret(b"some-server-secret"),
        )
        .unwrap()
    }

    fn claims(exp: i64) -> Claims {
        let mut extra = Map::new();
        extra.insert("type".into(), Value::String("access".into()));
        extra.insert("fresh".into(), Value::Bool(false));
        Claims {
            sub: Some("42".into()),
            iat: Some(exp - 900),
            nbf: Some(exp - 900),
            jti: Some("3c1f8a".into()),
            exp,
            extra,
        }
    }

    #[test]
    fn decode_returns_issued_claims() {
        let issued = claims(1_900_000_000);
        let decoded = decode_claims(&mint(&issued)).unwrap();
        assert_eq!(decoded, issued);
    }

    #[test]
    fn expiry_equal_to_now_is_expired() {
        let c = claims(1_700_000_000);
        assert!(c.is_expired_at(1_700_000_000));
        assert!(c.is_expired_at(1_700_000_001));
        assert!(!c.is_expired_at(1_699_999_999));

        let token = mint(&c);
        assert!(is_token_expired_at(Some(&token), 1_700_000_000));
        assert!(!is_token_expired_at(Some(&token), 1_699_999_999));
    }

    #[test]
    fn signature_is_not_checked() {
        let token = mint(&claims(1_900_000_000));
        let mut parts: Vec<&str> = token.split('.').collect();
        parts[2] = "AAAA";
        let tampered = parts.join(".");
        assert!(decode_claims(&tampered).is_ok());
    }

    #[test]
    fn malformed_tokens() {
        assert!(decode_claims("").is_err());
        assert!(decode_claims("only.two").is_err());
        assert!(decode_claims("a.b.c").is_err());
        assert!(decode_claims("this.is.not.a.valid.jwt").is_err());
        assert!(is_token_expired_at(Some("garbage"), 0));
        assert!(is_token_expired_at(None, 0));
    }

    #[test]
    fn missing_exp_is_malformed() {
        #[derive(Serialize)]
        struct NoExp {
            sub: String,
        }
        let token = encode(
            &Header::default(),
            &NoExp { sub: "1".into() },
            &EncodingKey::from_secret(b"k"),
        )
        .unwrap();
        assert!(decode_claims(&token).is_err());
    }
}
