//! Bearer-credential lifecycle tracking.
//!
//! The manager holds no network logic: it is a clock-driven state
//! holder. The caller executes the login step whenever the token is
//! not valid, then hands the fresh credential back via
//! [`TokenManager::set_token`].

use chrono::{DateTime, Duration, Utc};

/// Time source, injected so staleness is testable without sleeping.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time.
#[derive(Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Derived credential state; never stored, computed at query time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenState {
    Absent,
    Valid,
    Stale,
}

#[derive(Debug, Clone)]
struct Credential {
    value: String,
    expires_at: DateTime<Utc>,
}

/// Tracks one bearer credential's value and expiry.
///
/// A credential is valid iff present and
/// `now + refresh_skew < expires_at`; the skew makes a token that is
/// about to expire count as stale before a request is built with it.
pub struct TokenManager {
    credential: Option<Credential>,
    refresh_skew: Duration,
    default_lifetime: Duration,
    clock: Box<dyn Clock>,
}

impl TokenManager {
    pub fn new(refresh_skew: Duration, default_lifetime: Duration) -> Self {
        Self::with_clock(refresh_skew, default_lifetime, Box::new(SystemClock))
    }

    pub fn with_clock(
        refresh_skew: Duration,
        default_lifetime: Duration,
        clock: Box<dyn Clock>,
    ) -> Self {
        Self {
            credential: None,
            refresh_skew,
            default_lifetime,
            clock,
        }
    }

    /// Install a fresh credential.
    ///
    /// Without a concrete expiry the configured default lifetime is
    /// applied from issuance time.
    pub fn set_token(&mut self, value: String, expires_at: Option<DateTime<Utc>>) {
        let expires_at =
            expires_at.unwrap_or_else(|| self.clock.now() + self.default_lifetime);
        self.credential = Some(Credential { value, expires_at });
    }

    pub fn state(&self) -> TokenState {
        match &self.credential {
            None => TokenState::Absent,
            Some(credential) => {
                if self.clock.now() + self.refresh_skew < credential.expires_at {
                    TokenState::Valid
                } else {
                    TokenState::Stale
                }
            }
        }
    }

    pub fn is_valid(&self) -> bool {
        self.state() == TokenState::Valid
    }

    /// The current credential value, whether or not it is still
    /// valid. Callers gate on [`is_valid`](Self::is_valid) first.
    pub fn value(&self) -> Option<&str> {
        self.credential.as_ref().map(|c| c.value.as_str())
    }
}
