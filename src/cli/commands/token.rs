use crate::config::{TokenConfig, TokenTtls, parse_ttl};
use anyhow::{Context, Result};
use clap::{Arg, ArgMatches, Command};
use secrecy::SecretString;
use std::time::Duration;

pub const ARG_USER_SIGNING_KEY: &str = "user-signing-key";
pub const ARG_RESET_SIGNING_KEY: &str = "reset-signing-key";
pub const ARG_SESSION_TTL: &str = "session-ttl";
pub const ARG_HISTORY_TTL: &str = "history-ttl";
pub const ARG_SIGNUP_TTL: &str = "signup-ttl";
pub const ARG_RESET_TTL: &str = "reset-ttl";

/// Signing secrets and lifetimes. Secrets stay wrapped until the keys are built.
#[derive(Debug, Clone)]
pub struct Options {
    pub user_signing_key: SecretString,
    pub reset_signing_key: SecretString,
    pub ttls: TokenTtls,
}

impl Options {
    /// Parse token arguments from matches.
    ///
    /// # Errors
    /// Returns an error if a key or lifetime is missing.
    pub fn parse(matches: &ArgMatches) -> Result<Self> {
        let secret = |id: &str| {
            matches
                .get_one::<String>(id)
                .filter(|value| !value.is_empty())
                .map(|value| SecretString::from(value.clone()))
                .with_context(|| format!("missing required argument: --{id}"))
        };
        let ttl = |id: &str| {
            matches
                .get_one::<Duration>(id)
                .copied()
                .with_context(|| format!("missing required argument: --{id}"))
        };

        Ok(Self {
            user_signing_key: secret(ARG_USER_SIGNING_KEY)?,
            reset_signing_key: secret(ARG_RESET_SIGNING_KEY)?,
            ttls: TokenTtls {
                session: ttl(ARG_SESSION_TTL)?,
                history: ttl(ARG_HISTORY_TTL)?,
                signup: ttl(ARG_SIGNUP_TTL)?,
                reset: ttl(ARG_RESET_TTL)?,
            },
        })
    }

    /// Build the immutable token configuration.
    ///
    /// # Errors
    /// Returns an error if a key is empty or a lifetime is zero.
    pub fn into_config(self) -> Result<TokenConfig> {
        TokenConfig::new(&self.user_signing_key, &self.reset_signing_key, self.ttls)
            .context("invalid token configuration")
    }
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_USER_SIGNING_KEY)
                .long(ARG_USER_SIGNING_KEY)
                .help("HS512 secret for user and signup tokens")
                .env("WARDEN_USER_SIGNING_KEY")
                .hide_env_values(true)
                .required(true),
        )
        .arg(
            Arg::new(ARG_RESET_SIGNING_KEY)
                .long(ARG_RESET_SIGNING_KEY)
                .help("HS512 secret for password-reset tokens")
                .env("WARDEN_RESET_SIGNING_KEY")
                .hide_env_values(true)
                .required(true),
        )
        .arg(ttl_arg(ARG_SESSION_TTL, "WARDEN_SESSION_TTL", "User session lifetime, e.g. 24h"))
        .arg(ttl_arg(ARG_HISTORY_TTL, "WARDEN_HISTORY_TTL", "Authentication history retention, e.g. 30d"))
        .arg(ttl_arg(ARG_SIGNUP_TTL, "WARDEN_SIGNUP_TTL", "Signup token lifetime, e.g. 48h"))
        .arg(ttl_arg(ARG_RESET_TTL, "WARDEN_RESET_TTL", "Password-reset token lifetime, e.g. 15m"))
}

fn ttl_arg(id: &'static str, env: &'static str, help: &'static str) -> Arg {
    Arg::new(id)
        .long(id)
        .help(help)
        .env(env)
        .required(true)
        .value_parser(parse_ttl)
}
