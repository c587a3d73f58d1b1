//! One-time code challenge bound to a connection request.
//!
//! All transitions take `now` explicitly so expiry is decided by the caller's
//! clock reading, not by whenever the struct happens to be inspected.

use chrono::{DateTime, Duration, Utc};
use rand::RngExt;

/// Validity window of a freshly issued or resent code.
pub const OTP_TTL_SECS: i64 = 600;

/// Wrong guesses allowed before the challenge is blocked.
pub const OTP_MAX_ATTEMPTS: u32 = 3;

const OTP_MIN: u32 = 100_000;
const OTP_MAX: u32 = 999_999;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OtpState {
    Active,
    Verified,
    Expired,
    Blocked,
}

impl OtpState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Verified => "verified",
            Self::Expired => "expired",
            Self::Blocked => "blocked",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "active" => Some(Self::Active),
            "verified" => Some(Self::Verified),
            "expired" => Some(Self::Expired),
            "blocked" => Some(Self::Blocked),
            _ => None,
        }
    }
}

/// Why a code was not accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum OtpError {
    #[error("invalid code, {attempts_remaining} attempts remaining")]
    Invalid { attempts_remaining: u32 },
    #[error("code expired")]
    Expired,
    #[error("too many attempts")]
    AttemptsExceeded,
    #[error("code already used")]
    AlreadyUsed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OtpChallenge {
    pub code: String,
    pub expires_at: DateTime<Utc>,
    pub attempts: u32,
    pub max_attempts: u32,
    pub state: OtpState,
}

/// Uniform 6-digit code in `100000..=999999`.
pub fn generate_code() -> String {
    let mut rng = rand::rng();
    rng.random_range(OTP_MIN..=OTP_MAX).to_string()
}

impl OtpChallenge {
    pub fn issue(now: DateTime<Utc>) -> Self {
        Self::with_code(generate_code(), now)
    }

    pub fn with_code(code: String, now: DateTime<Utc>) -> Self {
        Self {
            code,
            expires_at: now + Duration::seconds(OTP_TTL_SECS),
            attempts: 0,
            max_attempts: OTP_MAX_ATTEMPTS,
            state: OtpState::Active,
        }
    }

    pub fn is_elapsed(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    /// Check `supplied` against the stored code, mutating attempt/state bookkeeping.
    ///
    /// The caller must persist `self` whether or not this returns `Ok`.
    pub fn verify(&mut self, supplied: &str, now: DateTime<Utc>) -> Result<(), OtpError> {
        match self.state {
            OtpState::Verified => return Err(OtpError::AlreadyUsed),
            OtpState::Expired => return Err(OtpError::Expired),
            OtpState::Blocked => return Err(OtpError::AttemptsExceeded),
            OtpState::Active => {}
        }
        if self.is_elapsed(now) {
            self.state = OtpState::Expired;
            return Err(OtpError::Expired);
        }
        if self.attempts >= self.max_attempts {
            self.state = OtpState::Blocked;
            return Err(OtpError::AttemptsExceeded);
        }
        if supplied.trim() != self.code {
            self.attempts += 1;
            if self.attempts >= self.max_attempts {
                self.state = OtpState::Blocked;
                return Err(OtpError::AttemptsExceeded);
            }
            return Err(OtpError::Invalid {
                attempts_remaining: self.max_attempts - self.attempts,
            });
        }
        self.state = OtpState::Verified;
        Ok(())
    }

    /// Regenerate the code with a fresh window and reset attempts.
    pub fn reissue(&mut self, now: DateTime<Utc>) -> Result<(), OtpError> {
        self.reissue_with_code(generate_code(), now)
    }

    pub fn reissue_with_code(&mut self, code: String, now: DateTime<Utc>) -> Result<(), OtpError> {
        if self.state == OtpState::Verified {
            return Err(OtpError::AlreadyUsed);
        }
        *self = Self::with_code(code, now);
        Ok(())
    }
}
