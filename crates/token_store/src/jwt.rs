use base64::{engine::general_purpose, Engine as _};
use serde::Deserialize;
use time::OffsetDateTime;

#[derive(Debug, Deserialize)]
struct ExpiryClaims {
    exp: Option<i64>,
}

/// Expiry of a JWT from its `exp` claim. `None` for opaque tokens or tokens
/// without the claim.
#[must_use]
pub fn token_expiry(token: &str) -> Option<OffsetDateTime> {
    let mut parts = token.split('.');
    let _header = parts.next()?;
    let payload_segment = parts.next()?;
    let _signature = parts.next()?;
    if parts.next().is_some() {
        return None;
    }

    let decoded = decode_jwt_segment(payload_segment)?;
    let claims = serde_json::from_slice::<ExpiryClaims>(&decoded).ok()?;
    OffsetDateTime::from_unix_timestamp(claims.exp?).ok()
}

fn decode_jwt_segment(segment: &str) -> Option<Vec<u8>> {
    general_purpose::URL_SAFE_NO_PAD
        .decode(segment)
        .or_else(|_| general_purpose::URL_SAFE.decode(segment))
        .ok()
}
