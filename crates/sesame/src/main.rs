mod cli;

use std::io;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use cli::{Opts, OptsCmd, ServeOpts, StoreKind, TokenCmd};
use sesame_core::{IdGenerator, SessionKey, SessionKeyError, SessionOptions};
use sesame_session::SessionManager;
use sesame_store::{MemoryStore, SharedStore, spawn_memory_cleanup_task};
use sesame_store_redb::{RedbStore, RedbStoreError, spawn_cleanup_task};
use sesame_token::{SecretError, SignError, TokenSigner, VerificationError};
use sesame_util_error::WhateverResult;
use sesame_web::{Server, WebServerError};
use snafu::{FromString, ResultExt, Snafu, Whatever};
use tracing::info;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

pub const LOG_TARGET: &str = "sesame::cli";

const SESSIONS_DB_FILE: &str = "sessions.redb";

#[derive(Debug, Snafu)]
pub enum CliError {
    #[snafu(display("Invalid SESSION_KEY: {source}"))]
    SessionKey { source: SessionKeyError },
    #[snafu(display("Invalid JWT_SECRET: {source}"))]
    TokenSecret { source: SecretError },
    #[snafu(display("Web server error: {source}"))]
    WebServer { source: WebServerError },
    #[snafu(display("Session database error: {source}"))]
    Database { source: RedbStoreError },
    #[snafu(display("Data dir error: {source:?}"))]
    DataDir { source: io::Error },
    #[snafu(display("Token signing error: {source}"))]
    Sign { source: SignError },
    #[snafu(display("Token rejected: {source}"))]
    Verify { source: VerificationError },
    #[snafu(display("Miscellaneous error: {source}"))]
    Whatever { source: Whatever },
}

pub type CliResult<T> = std::result::Result<T, CliError>;

#[snafu::report]
#[tokio::main]
async fn main() -> CliResult<()> {
    init_logging().context(WhateverSnafu)?;

    let opts = Opts::parse();
    match handle_cmd(opts).await {
        Ok(v) => {
            println!("{}", serde_json::to_string_pretty(&v).expect("Can't fail"));
            Ok(())
        }
        Err(err) => Err(err),
    }
}

async fn handle_cmd(opts: Opts) -> CliResult<serde_json::Value> {
    Ok(match opts.cmd {
        OptsCmd::Serve(serve) => {
            let data_dir = opts.global.data_dir().to_owned();
            run_server(&serve, &data_dir).await?;
            serde_json::Value::Null
        }
        OptsCmd::GenId { key } => {
            let key = SessionKey::derive_from(key.session_key.as_bytes()).context(SessionKeySnafu)?;
            let id = IdGenerator::new(key).new_id();
            serde_json::json!({ "session_id": id.as_str() })
        }
        OptsCmd::Token(cmd) => match cmd {
            TokenCmd::Sign {
                user_id,
                ttl_hours,
                secret,
            } => {
                let signer = TokenSigner::new(secret.token_secret.as_bytes())
                    .context(TokenSecretSnafu)?;
                let token = signer
                    .sign(user_id, time::Duration::hours(ttl_hours))
                    .context(SignSnafu)?;
                serde_json::json!({ "token": token })
            }
            TokenCmd::Verify { token, secret } => {
                let signer = TokenSigner::new(secret.token_secret.as_bytes())
                    .context(TokenSecretSnafu)?;
                let claims = signer.verify(&token).context(VerifySnafu)?;
                serde_json::to_value(claims).expect("Can't fail")
            }
        },
    })
}

async fn run_server(opts: &ServeOpts, data_dir: &std::path::Path) -> CliResult<()> {
    let key = SessionKey::derive_from(opts.key.session_key.as_bytes()).context(SessionKeySnafu)?;

    let cleanup_interval = Duration::from_secs(opts.cleanup_interval_secs);
    let cleanup_task;
    let store: SharedStore = match opts.store {
        StoreKind::Memory => {
            let store = Arc::new(MemoryStore::new());
            cleanup_task = spawn_memory_cleanup_task(store.clone(), cleanup_interval);
            store
        }
        StoreKind::Redb => {
            tokio::fs::create_dir_all(data_dir)
                .await
                .context(DataDirSnafu)?;
            let path = data_dir.join(SESSIONS_DB_FILE);
            info!(target: LOG_TARGET, path = %path.display(), "Using redb session store");
            let store = Arc::new(RedbStore::open(path).await.context(DatabaseSnafu)?);
            cleanup_task = spawn_cleanup_task(store.clone(), cleanup_interval);
            store
        }
    };

    let sessions = SessionManager::builder(store)
        .key(key)
        .options(SessionOptions {
            max_age: time::Duration::seconds(opts.max_age_secs),
            secure: opts.secure_cookie,
            ..SessionOptions::default()
        })
        .store_timeout(Duration::from_millis(opts.store_timeout_ms))
        .resume(opts.resume_policy())
        .build();

    let mut server = Server::init(opts.web_opts(), sessions)
        .await
        .context(WebServerSnafu)?;

    server.attach_task(cleanup_task);

    server.run().await.context(WebServerSnafu)?;

    info!(target: LOG_TARGET, "Server shut down");
    Ok(())
}

pub fn init_logging() -> WhateverResult<()> {
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .from_env_lossy(),
        )
        .try_init()
        .map_err(|_| Whatever::without_source("Failed to initialize logging".to_string()))?;

    Ok(())
}
