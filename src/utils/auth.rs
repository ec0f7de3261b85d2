use base64::Engine as _;
use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use chrono::{DateTime, Utc};
use serde_json::Value;

pub const DEFAULT_EXPIRY_MARGIN_SECS: i64 = 30;

// JWT segments are unpadded in practice, but some issuers pad them anyway.
const JWT_SEGMENT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("expected 3 segments, found {0}")]
    Shape(usize),
    #[error("payload is not base64url: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("payload is not JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("payload is not a JSON object")]
    NotAnObject,
}

/// Unverified view of a token payload. Good for expiry gating only; the
/// server is the one that checks signatures.
#[derive(Debug, Clone, PartialEq)]
pub struct Claims {
    pub exp: Option<f64>,
    pub sub: Option<String>,
    pub email: Option<String>,
}

impl Claims {
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        let exp = self.exp?;
        DateTime::from_timestamp(exp.floor() as i64, 0)
    }
}

pub fn decode(token: &str) -> Result<Claims, DecodeError> {
    let segments: Vec<&str> = token.split('.').collect();

    let [_, payload, _] = segments.as_slice() else {
        return Err(DecodeError::Shape(segments.len()));
    };

    let bytes = JWT_SEGMENT.decode(payload)?;

    let Value::Object(payload) = serde_json::from_slice::<Value>(&bytes)? else {
        return Err(DecodeError::NotAnObject);
    };

    // subjects are strings from our API but other issuers use numbers
    let sub = match payload.get("sub") {
        Some(Value::String(sub)) => Some(sub.clone()),
        Some(Value::Number(sub)) => Some(sub.to_string()),
        _ => None,
    };

    Ok(Claims {
        exp: payload.get("exp").and_then(Value::as_f64),
        sub,
        email: payload
            .get("email")
            .and_then(Value::as_str)
            .map(String::from),
    })
}

pub fn is_usable(token: &str, margin_secs: i64) -> bool {
    is_usable_at(token, Utc::now(), margin_secs)
}

/// True when the token decodes and `exp` lies more than `margin_secs` after
/// `now`. Anything malformed is simply not usable.
pub fn is_usable_at(token: &str, now: DateTime<Utc>, margin_secs: i64) -> bool {
    match decode(token) {
        Ok(Claims { exp: Some(exp), .. }) => exp > (now.timestamp() + margin_secs) as f64,
        Ok(_) => false,
        Err(e) => {
            tracing::debug!("Access token is not decodable: {}", e);
            false
        }
    }
}

pub fn expires_at(token: &str) -> Option<DateTime<Utc>> {
    decode(token).ok()?.expires_at()
}
