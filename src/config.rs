//! Token configuration: signing keys and lifetimes.
//!
//! Built once at startup and shared as `Arc<TokenConfig>`. Nothing mutates it
//! after boot, so handlers and workers read it without locking.

use crate::token::TokenKind;
use anyhow::{Result, anyhow};
use jsonwebtoken::{DecodingKey, EncodingKey};
use secrecy::{ExposeSecret, SecretString};
use std::{fmt, time::Duration};

pub const DEFAULT_ISSUER: &str = "warden";

/// An HS512 secret prepared for both signing and verification.
#[derive(Clone)]
pub struct SigningKey {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl SigningKey {
    /// # Errors
    /// Returns an error if the secret is empty.
    pub fn from_secret(secret: &SecretString) -> Result<Self> {
        let bytes = secret.expose_secret().as_bytes();
        if bytes.is_empty() {
            return Err(anyhow!("signing key must not be empty"));
        }
        Ok(Self {
            encoding: EncodingKey::from_secret(bytes),
            decoding: DecodingKey::from_secret(bytes),
        })
    }

    #[must_use]
    pub const fn encoding(&self) -> &EncodingKey {
        &self.encoding
    }

    #[must_use]
    pub const fn decoding(&self) -> &DecodingKey {
        &self.decoding
    }
}

impl fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SigningKey(***)")
    }
}

/// Lifetimes for every token kind plus the history entries.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TokenTtls {
    pub session: Duration,
    pub history: Duration,
    pub signup: Duration,
    pub reset: Duration,
}

impl TokenTtls {
    /// # Errors
    /// Returns an error naming the first zero lifetime.
    pub fn validate(&self) -> Result<()> {
        for (name, ttl) in [
            ("session", self.session),
            ("history", self.history),
            ("signup", self.signup),
            ("reset", self.reset),
        ] {
            if ttl.is_zero() {
                return Err(anyhow!("{name} ttl must be greater than zero"));
            }
        }
        Ok(())
    }
}

#[derive(Clone, Debug)]
pub struct TokenConfig {
    user_key: SigningKey,
    reset_key: SigningKey,
    ttls: TokenTtls,
    issuer: String,
}

impl TokenConfig {
    /// # Errors
    /// Returns an error if either key is empty or any lifetime is zero.
    pub fn new(
        user_secret: &SecretString,
        reset_secret: &SecretString,
        ttls: TokenTtls,
    ) -> Result<Self> {
        ttls.validate()?;
        Ok(Self {
            user_key: SigningKey::from_secret(user_secret)?,
            reset_key: SigningKey::from_secret(reset_secret)?,
            ttls,
            issuer: DEFAULT_ISSUER.to_string(),
        })
    }

    #[must_use]
    pub fn with_issuer(mut self, issuer: impl Into<String>) -> Self {
        self.issuer = issuer.into();
        self
    }

    /// User and signup tokens share the user key; reset tokens have their own.
    #[must_use]
    pub const fn key_for(&self, kind: TokenKind) -> &SigningKey {
        match kind {
            TokenKind::User | TokenKind::Signup => &self.user_key,
            TokenKind::ResetPassword => &self.reset_key,
        }
    }

    #[must_use]
    pub const fn ttl_for(&self, kind: TokenKind) -> Duration {
        match kind {
            TokenKind::User => self.ttls.session,
            TokenKind::Signup => self.ttls.signup,
            TokenKind::ResetPassword => self.ttls.reset,
        }
    }

    #[must_use]
    pub const fn history_ttl(&self) -> Duration {
        self.ttls.history
    }

    #[must_use]
    pub const fn ttls(&self) -> TokenTtls {
        self.ttls
    }

    #[must_use]
    pub fn issuer(&self) -> &str {
        &self.issuer
    }
}

/// Parse a lifetime such as `90s`, `15m`, `24h` or `1h 30m`.
///
/// # Errors
/// Returns a message for unparsable or zero durations.
pub fn parse_ttl(value: &str) -> Result<Duration, String> {
    let ttl = humantime::parse_duration(value.trim()).map_err(|err| err.to_string())?;
    if ttl.is_zero() {
        return Err("duration must be greater than zero".to_string());
    }
    Ok(ttl)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn ttls() -> TokenTtls {
        TokenTtls {
            session: Duration::from_secs(3600),
            history: Duration::from_secs(7200),
            signup: Duration::from_secs(600),
            reset: Duration::from_secs(300),
        }
    }

    #[test]
    fn parse_ttl_accepts_human_notation() {
        assert_eq!(parse_ttl("90s"), Ok(Duration::from_secs(90)));
        assert_eq!(parse_ttl("15m"), Ok(Duration::from_secs(900)));
        assert_eq!(parse_ttl("24h"), Ok(Duration::from_secs(86_400)));
        assert_eq!(parse_ttl("1h 30m"), Ok(Duration::from_secs(5_400)));
    }

    #[test]
    fn parse_ttl_rejects_zero_and_garbage() {
        assert!(parse_ttl("0s").is_err());
        assert!(parse_ttl("soon").is_err());
        assert!(parse_ttl("").is_err());
    }

    #[test]
    fn keys_and_ttls_follow_the_token_kind() {
        let config = TokenConfig::new(
            &SecretString::from("user-key"),
            &SecretString::from("reset-key"),
            ttls(),
        )
        .unwrap();

        assert_eq!(config.ttl_for(TokenKind::User), Duration::from_secs(3600));
        assert_eq!(config.ttl_for(TokenKind::Signup), Duration::from_secs(600));
        assert_eq!(
            config.ttl_for(TokenKind::ResetPassword),
            Duration::from_secs(300)
        );
        assert_eq!(config.history_ttl(), Duration::from_secs(7200));
        assert_eq!(config.issuer(), DEFAULT_ISSUER);
    }

    #[test]
    fn empty_key_and_zero_ttl_are_rejected() {
        let empty = TokenConfig::new(&SecretString::from(""), &SecretString::from("r"), ttls());
        assert!(empty.is_err());

        let zero = TokenConfig::new(
            &SecretString::from("u"),
            &SecretString::from("r"),
            TokenTtls {
                history: Duration::ZERO,
                ..ttls()
            },
        );
        assert!(zero.is_err());
    }

    #[test]
    fn debug_masks_keys() {
        let config = TokenConfig::new(
            &SecretString::from("super-secret"),
            &SecretString::from("reset-secret"),
            ttls(),
        )
        .unwrap();
        let debug = format!("{config:?}");
        assert!(!debug.contains("super-secret"));
        assert!(debug.contains("SigningKey(***)"));
    }
}
