use crate::guard::DEFAULT_TIMEOUT;
use anyhow::{Context, Result};
use clap::{Arg, ArgMatches, Command};
use std::time::Duration;
use url::Url;

pub const ARG_PRIVILEGE_URL: &str = "privilege-url";
pub const ARG_REQUEST_TIMEOUT_MS: &str = "request-timeout-ms";

#[derive(Debug, Clone)]
pub struct Options {
    /// External privilege service; allowances on the principal are used when absent.
    pub privilege_url: Option<Url>,
    pub request_timeout: Duration,
}

impl Options {
    /// Parse privilege arguments from matches.
    ///
    /// # Errors
    /// Returns an error if the privilege URL is malformed.
    pub fn parse(matches: &ArgMatches) -> Result<Self> {
        let privilege_url = matches
            .get_one::<String>(ARG_PRIVILEGE_URL)
            .filter(|value| !value.trim().is_empty())
            .map(|value| Url::parse(value.trim()))
            .transpose()
            .with_context(|| format!("invalid --{ARG_PRIVILEGE_URL}"))?;

        let request_timeout = matches
            .get_one::<u64>(ARG_REQUEST_TIMEOUT_MS)
            .copied()
            .map_or(DEFAULT_TIMEOUT, Duration::from_millis);

        Ok(Self {
            privilege_url,
            request_timeout,
        })
    }
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_PRIVILEGE_URL)
                .long(ARG_PRIVILEGE_URL)
                .help("Base URL of the external privilege service")
                .env("WARDEN_PRIVILEGE_URL"),
        )
        .arg(
            Arg::new(ARG_REQUEST_TIMEOUT_MS)
                .long(ARG_REQUEST_TIMEOUT_MS)
                .help("Deadline in milliseconds for ledger and privilege calls per request")
                .env("WARDEN_REQUEST_TIMEOUT_MS")
                .default_value("3000")
                .value_parser(clap::value_parser!(u64).range(1..)),
        )
}
