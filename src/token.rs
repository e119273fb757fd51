//! Client-side inspection of bearer tokens.
//!
//! The dashboard never holds the signing secret, so tokens are not verified
//! here. We only read the claims the session lifecycle depends on and reject
//! anything that does not match that schema.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, de};
use serde_json::{Map, Value};

use crate::error::TokenError;

/// Claims read from the token payload. `exp` is mandatory; the identity
/// claims are optional because the user record arrives with the login
/// response anyway.
///
/// Timestamps are NumericDates: integers or fractional seconds since the
/// epoch, floored to whole seconds.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TokenClaims {
    #[serde(deserialize_with = "numeric_date")]
    pub exp: i64,
    #[serde(default, deserialize_with = "optional_numeric_date")]
    pub iat: Option<i64>,
    #[serde(default)]
    pub sub: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
}

impl TokenClaims {
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.exp, 0)
    }

    /// A token whose `exp` equals the current second is already expired.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.exp <= now.timestamp()
    }

    /// Seconds left before expiry, clamped at zero.
    pub fn remaining_secs(&self, now: DateTime<Utc>) -> i64 {
        (self.exp - now.timestamp()).max(0)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum NumericDate {
    Seconds(i64),
    Fractional(f64),
}

impl NumericDate {
    fn into_seconds<E: de::Error>(self) -> Result<i64, E> {
        match self {
            NumericDate::Seconds(secs) => Ok(secs),
            NumericDate::Fractional(secs) if secs.is_finite() => Ok(secs.floor() as i64),
            NumericDate::Fractional(_) => Err(E::custom("timestamp is not a finite number")),
        }
    }
}

fn numeric_date<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
    NumericDate::deserialize(deserializer)?.into_seconds()
}

fn optional_numeric_date<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<i64>, D::Error> {
    Option::<NumericDate>::deserialize(deserializer)?
        .map(NumericDate::into_seconds::<D::Error>)
        .transpose()
}

fn decode_segment(segment: &str) -> Result<Vec<u8>, base64::DecodeError> {
    URL_SAFE_NO_PAD.decode(segment.trim_end_matches('='))
}

/// Reads the claims without checking the signature. The header only has to
/// be a JSON object; its `alg` is not interpreted.
pub fn decode_claims(token: &str) -> Result<TokenClaims, TokenError> {
    let mut parts = token.split('.');
    let (Some(header), Some(payload), Some(_), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(TokenError::Malformed);
    };

    let header = decode_segment(header).map_err(|e| TokenError::Header(e.to_string()))?;
    serde_json::from_slice::<Map<String, Value>>(&header)
        .map_err(|e| TokenError::Header(e.to_string()))?;

    let bytes = decode_segment(payload).map_err(|e| TokenError::Payload(e.to_string()))?;
    serde_json::from_slice(&bytes).map_err(|e| TokenError::Payload(e.to_string()))
}

/// Decodes `token` and rejects it if it is no longer valid at `now`.
pub fn decode_unexpired(token: &str, now: DateTime<Utc>) -> Result<TokenClaims, TokenError> {
    let claims = decode_claims(token)?;
    if claims.is_expired_at(now) {
        return Err(TokenError::Expired { exp: claims.exp });
    }
    Ok(claims)
}
