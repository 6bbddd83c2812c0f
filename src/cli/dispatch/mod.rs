//! Maps validated CLI matches to the action to run.

use crate::cli::{
    actions::{
        Action,
        server::{Args, Storage},
    },
    commands::{ARG_DSN, ARG_IN_MEMORY, ARG_PORT, privilege, service, token},
};
use anyhow::{Context, Result};
use secrecy::SecretString;

/// Map validated CLI matches to a server action.
///
/// # Errors
/// Returns an error if required arguments are missing or inconsistent.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let port = matches.get_one::<u16>(ARG_PORT).copied().unwrap_or(8080);

    let storage = if matches.get_flag(ARG_IN_MEMORY) {
        Storage::InMemory
    } else {
        let dsn = matches
            .get_one::<String>(ARG_DSN)
            .cloned()
            .context("missing required argument: --dsn")?;
        Storage::Postgres(SecretString::from(dsn))
    };

    Ok(Action::Server(Args {
        port,
        storage,
        token: token::Options::parse(matches)?,
        privilege: privilege::Options::parse(matches)?,
        service: service::Options::parse(matches)?,
    }))
}
