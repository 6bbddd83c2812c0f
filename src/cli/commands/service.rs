use crate::token::touch::DEFAULT_QUEUE_CAPACITY;
use anyhow::{Context, Result};
use clap::{Arg, ArgMatches, Command};
use url::Url;

pub const ARG_SIGNUP_LINK_BASE: &str = "signup-link-base";
pub const ARG_TOUCH_QUEUE_CAPACITY: &str = "touch-queue-capacity";
pub const ARG_REAPER_INTERVAL_SECONDS: &str = "reaper-interval-seconds";

#[derive(Debug, Clone)]
pub struct Options {
    pub signup_link_base: Option<Url>,
    pub touch_queue_capacity: usize,
    pub reaper_interval_seconds: u64,
}

impl Options {
    /// Parse background worker and link arguments from matches.
    ///
    /// # Errors
    /// Returns an error if the signup link base is malformed.
    pub fn parse(matches: &ArgMatches) -> Result<Self> {
        let signup_link_base = matches
            .get_one::<String>(ARG_SIGNUP_LINK_BASE)
            .filter(|value| !value.trim().is_empty())
            .map(|value| Url::parse(value.trim()))
            .transpose()
            .with_context(|| format!("invalid --{ARG_SIGNUP_LINK_BASE}"))?;

        Ok(Self {
            signup_link_base,
            touch_queue_capacity: matches
                .get_one::<usize>(ARG_TOUCH_QUEUE_CAPACITY)
                .copied()
                .unwrap_or(DEFAULT_QUEUE_CAPACITY),
            reaper_interval_seconds: matches
                .get_one::<u64>(ARG_REAPER_INTERVAL_SECONDS)
                .copied()
                .unwrap_or(60),
        })
    }
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_SIGNUP_LINK_BASE)
                .long(ARG_SIGNUP_LINK_BASE)
                .help("Frontend URL returned with signup tokens (token appended as ?token=)")
                .env("WARDEN_SIGNUP_LINK_BASE"),
        )
        .arg(
            Arg::new(ARG_TOUCH_QUEUE_CAPACITY)
                .long(ARG_TOUCH_QUEUE_CAPACITY)
                .help("Pending last-used updates kept before new ones are dropped")
                .env("WARDEN_TOUCH_QUEUE_CAPACITY")
                .default_value("1024")
                .value_parser(clap::value_parser!(usize)),
        )
        .arg(
            Arg::new(ARG_REAPER_INTERVAL_SECONDS)
                .long(ARG_REAPER_INTERVAL_SECONDS)
                .help("Seconds between expired ledger row sweeps")
                .env("WARDEN_REAPER_INTERVAL_SECONDS")
                .default_value("60")
                .value_parser(clap::value_parser!(u64)),
        )
}
