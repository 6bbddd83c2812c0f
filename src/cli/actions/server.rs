use crate::{
    api::{self, ServiceState},
    cli::commands::{privilege, service, token},
    guard::AuthorizationGuard,
    ledger::{
        HistoryLedger, SessionLedger,
        memory::{MemoryHistoryLedger, MemorySessionLedger},
        postgres::PgLedger,
        reaper::{ReaperConfig, spawn_reaper},
    },
    principal::{PrincipalStore, memory::MemoryPrincipalStore, postgres::PgPrincipalStore},
    privilege::{AllowanceResolver, PrivilegeResolver, RemotePrivilegeResolver},
    token::{RevocationService, TouchDispatcher},
};
use anyhow::{Context, Result};
use secrecy::{ExposeSecret, SecretString};
use sqlx::{PgPool, postgres::PgPoolOptions};
use std::{sync::Arc, time::Duration};
use tracing::info;
use url::Url;

#[derive(Debug)]
pub enum Storage {
    Postgres(SecretString),
    InMemory,
}

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub storage: Storage,
    pub token: token::Options,
    pub privilege: privilege::Options,
    pub service: service::Options,
}

struct Backends {
    sessions: Arc<dyn SessionLedger>,
    history: Arc<dyn HistoryLedger>,
    principals: Arc<dyn PrincipalStore>,
    pool: Option<PgPool>,
}

/// Execute the server action.
/// # Errors
/// Returns an error if the configuration is invalid, the database is unreachable, or the server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    log_startup_args(&args);

    let config = Arc::new(args.token.into_config()?);
    let backends = connect(&args.storage).await?;

    let (touch, _touch_worker) =
        TouchDispatcher::spawn(backends.history.clone(), args.service.touch_queue_capacity);
    let _reaper = spawn_reaper(
        backends.sessions.clone(),
        backends.history.clone(),
        ReaperConfig::new().with_interval_seconds(args.service.reaper_interval_seconds),
    );

    let tokens = Arc::new(RevocationService::new(
        config.clone(),
        backends.sessions,
        backends.history,
        touch,
    ));

    let privileges: Arc<dyn PrivilegeResolver> = match args.privilege.privilege_url {
        Some(url) => Arc::new(
            RemotePrivilegeResolver::new(url, args.privilege.request_timeout)
                .context("Failed to build privilege client")?,
        ),
        None => Arc::new(AllowanceResolver),
    };

    let guard = AuthorizationGuard::new(tokens.clone(), backends.principals.clone(), privileges)
        .with_timeout(args.privilege.request_timeout);

    let mut state = ServiceState::new(config, tokens, backends.principals, guard)
        .with_signup_link_base(args.service.signup_link_base);
    if let Some(pool) = backends.pool {
        state = state.with_pool(pool);
    }

    api::new(args.port, Arc::new(state)).await
}

async fn connect(storage: &Storage) -> Result<Backends> {
    match storage {
        Storage::Postgres(dsn) => {
            let pool = PgPoolOptions::new()
                .min_connections(1)
                .max_connections(5)
                .max_lifetime(Duration::from_secs(60 * 2))
                .test_before_acquire(true)
                .connect(dsn.expose_secret())
                .await
                .context("Failed to connect to database")?;

            let ledger = Arc::new(PgLedger::new(pool.clone()));
            Ok(Backends {
                sessions: ledger.clone(),
                history: ledger,
                principals: Arc::new(PgPrincipalStore::new(pool.clone())),
                pool: Some(pool),
            })
        }
        Storage::InMemory => Ok(Backends {
            sessions: Arc::new(MemorySessionLedger::new()),
            history: Arc::new(MemoryHistoryLedger::new()),
            principals: Arc::new(MemoryPrincipalStore::new()),
            pool: None,
        }),
    }
}

fn log_startup_args(args: &Args) {
    let storage = match &args.storage {
        Storage::Postgres(dsn) => redact_dsn(dsn.expose_secret()),
        Storage::InMemory => "in-memory".to_string(),
    };
    let ttls = args.token.ttls;
    let entries = [
        ("listen", format!("tcp:{}", args.port)),
        ("storage", storage),
        ("session_ttl", humantime::format_duration(ttls.session).to_string()),
        ("history_ttl", humantime::format_duration(ttls.history).to_string()),
        ("signup_ttl", humantime::format_duration(ttls.signup).to_string()),
        ("reset_ttl", humantime::format_duration(ttls.reset).to_string()),
        (
            "privilege_url",
            args.privilege
                .privilege_url
                .as_ref()
                .map_or_else(|| "none (stored allowances)".to_string(), Url::to_string),
        ),
        (
            "request_timeout",
            humantime::format_duration(args.privilege.request_timeout).to_string(),
        ),
        (
            "touch_queue_capacity",
            args.service.touch_queue_capacity.to_string(),
        ),
        (
            "reaper_interval_seconds",
            args.service.reaper_interval_seconds.to_string(),
        ),
    ];

    let max_key_len = entries.iter().map(|(key, _)| key.len()).max().unwrap_or(0);
    let mut message = format!(
        "warden {} - {}\n\nStartup configuration:",
        env!("CARGO_PKG_VERSION"),
        short_commit(crate::GIT_COMMIT_HASH)
    );
    for (key, value) in &entries {
        let padding = " ".repeat(max_key_len.saturating_sub(key.len()));
        let _ =
            std::fmt::Write::write_fmt(&mut message, format_args!("\n  {key}:{padding} {value}"));
    }
    info!("{message}");
}

fn redact_dsn(dsn: &str) -> String {
    match Url::parse(dsn) {
        Ok(mut parsed) => {
            if parsed.password().is_some() {
                let _ = parsed.set_password(Some("REDACTED"));
            }
            parsed.to_string()
        }
        Err(_) => "invalid-dsn".to_string(),
    }
}

fn short_commit(hash: &str) -> &str {
    let trimmed = hash.trim();
    trimmed.get(..7).unwrap_or(trimmed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dsn_password_is_redacted() {
        assert_eq!(
            redact_dsn("postgres://warden:hunter2@db:5432/warden"),
            "postgres://warden:REDACTED@db:5432/warden"
        );
        assert_eq!(redact_dsn("not a dsn"), "invalid-dsn");
    }

    #[test]
    fn short_commit_truncates() {
        assert_eq!(short_commit("0123456789abcdef"), "0123456");
        assert_eq!(short_commit("abc"), "abc");
    }

    #[tokio::test]
    async fn in_memory_storage_needs_no_database() {
        let backends = connect(&Storage::InMemory).await;
        assert!(backends.is_ok_and(|backends| backends.pool.is_none()));
    }
}
