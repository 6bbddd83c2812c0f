//! # Warden (token lifecycle and authorization guard)
//!
//! `warden` issues signed session tokens for principals, tracks every issued
//! session in a server-side ledger, and gates privileged operations behind a
//! guard that re-validates the presented token on each call.
//!
//! ## Sessions
//!
//! A token is an HS512 JWT carrying a snapshot of the principal plus a session
//! id. The snapshot is convenience data only: the guard always reloads the
//! principal from the store before checking the blocked flag or allowances.
//! The ledger record is the source of truth for whether a session is still
//! live, so a signature-valid token whose record is revoked or expired is
//! rejected.
//!
//! ## Revocation
//!
//! Revocation is a soft flag (`valid = false`) on both the session ledger and
//! the authentication history. Revoked rows stay until their expiry is swept
//! by the reaper, and a revoked session can never become valid again.
//!
//! ## Fail closed
//!
//! Missing metadata, ledger outages and elapsed deadlines all surface as
//! authentication failures. Nothing is admitted on an uncertain answer.

pub mod api;
pub mod cli;
pub mod config;
pub mod deadline;
pub mod error;
pub mod guard;
pub mod ledger;
pub mod principal;
pub mod privilege;
pub mod token;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);
