//! Clock-driven view over the tracked admin token.
//!
//! Everything here is pure: callers pass the token (if any) and the current
//! instant, so the same inputs always produce the same answer.

use crate::token::IssuedAccessToken;
use chrono::{DateTime, Duration, Utc};

/// Where the operator stands with respect to credentials and tokens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenStatus {
    NoCredential,
    NoToken,
    Active(IssuedAccessToken),
    Expired(IssuedAccessToken),
}

/// True once `now` has reached the token's expiry. Without a token nothing can
/// be expired.
pub fn is_expired(token: Option<&IssuedAccessToken>, now: DateTime<Utc>) -> bool {
    token.is_some_and(|t| now >= t.expires_at)
}

/// Time left before expiry, clamped at zero.
pub fn remaining(token: Option<&IssuedAccessToken>, now: DateTime<Utc>) -> Duration {
    match token {
        Some(t) => (t.expires_at - now).max(Duration::zero()),
        None => Duration::zero(),
    }
}

/// Human-readable countdown, e.g. `"1h 5m remaining"`, `"1m remaining"` or
/// `"Expired"`. Minutes are floored. Empty when there is no token.
pub fn display_remaining(token: Option<&IssuedAccessToken>, now: DateTime<Utc>) -> String {
    if token.is_none() {
        return String::new();
    }

    let left = remaining(token, now);
    if left <= Duration::zero() {
        return "Expired".to_string();
    }

    let minutes = left.num_seconds() / 60;
    let hours = minutes / 60;
    if hours > 0 {
        format!("{}h {}m remaining", hours, minutes % 60)
    } else {
        format!("{}m remaining", minutes)
    }
}

impl TokenStatus {
    pub fn label(&self) -> &'static str {
        match self {
            TokenStatus::NoCredential => "no_credential",
            TokenStatus::NoToken => "no_token",
            TokenStatus::Active(_) => "active",
            TokenStatus::Expired(_) => "expired",
        }
    }

    pub fn token(&self) -> Option<&IssuedAccessToken> {
        match self {
            TokenStatus::Active(t) | TokenStatus::Expired(t) => Some(t),
            _ => None,
        }
    }
}

pub fn status(
    has_credential: bool,
    token: Option<&IssuedAccessToken>,
    now: DateTime<Utc>,
) -> TokenStatus {
    match token {
        _ if !has_credential => TokenStatus::NoCredential,
        None => TokenStatus::NoToken,
        Some(t) if is_expired(Some(t), now) => TokenStatus::Expired(t.clone()),
        Some(t) => TokenStatus::Active(t.clone()),
    }
}
