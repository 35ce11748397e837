use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use clap::{Args, Parser, Subcommand, ValueEnum};
use sesame_session::ResumePolicy;

/// Command line options for the sesame session service
#[derive(Debug, Parser)]
#[command(version, about, long_about = None)]
pub struct Opts {
    /// Global options that apply to all commands
    #[command(flatten)]
    pub global: GlobalOpts,

    /// The specific command to execute
    #[command(subcommand)]
    pub cmd: OptsCmd,
}

/// Global options that apply across all commands
#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Where the session database lives
    #[arg(env = "SESAME_DATA_DIR", long, global = true)]
    pub data_dir: Option<PathBuf>,
}

static PROJECTS_DIR: LazyLock<directories::ProjectDirs> = LazyLock::new(|| {
    directories::ProjectDirs::from("org", "Sesame", "sesame")
        .expect("Unable to determine project's dir")
});

impl GlobalOpts {
    pub fn data_dir(&self) -> &Path {
        self.data_dir.as_deref().unwrap_or_else(|| {
            PROJECTS_DIR
                .state_dir()
                .unwrap_or_else(|| PROJECTS_DIR.data_local_dir())
        })
    }
}

#[derive(Debug, Subcommand)]
pub enum OptsCmd {
    /// Run the HTTP server
    Serve(ServeOpts),
    /// Print a freshly minted session id
    GenId {
        #[command(flatten)]
        key: SessionKeyOpts,
    },
    /// Sign and verify bearer tokens
    #[command(subcommand)]
    Token(TokenCmd),
}

#[derive(Debug, Args)]
pub struct SessionKeyOpts {
    /// Secret that session ids are signed with
    #[arg(long, env = "SESSION_KEY", hide_env_values = true)]
    pub session_key: String,
}

#[derive(Debug, Args)]
pub struct TokenSecretOpts {
    /// Secret that bearer tokens are signed with
    #[arg(long, env = "JWT_SECRET", hide_env_values = true)]
    pub token_secret: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StoreKind {
    /// Durable single-file database under the data dir
    Redb,
    /// Process memory, gone on restart
    Memory,
}

const MAX_MAX_AGE_SECS: i64 = 60 * 60 * 24 * 365 * 10;

#[derive(Debug, Args)]
pub struct ServeOpts {
    #[command(flatten)]
    pub key: SessionKeyOpts,

    /// Listen address
    #[arg(long, short, default_value = sesame_web::DEFAULT_LISTEN, env = "SESAME_LISTEN")]
    pub listen: String,

    /// Set SO_REUSEPORT
    #[arg(long, env = "SESAME_REUSEPORT")]
    pub reuseport: bool,

    /// The single origin allowed to make credentialed requests
    #[arg(long, default_value = sesame_web::DEFAULT_CORS_ORIGIN, env = "SESAME_CORS_ORIGIN")]
    pub cors_origin: String,

    #[arg(long, value_enum, default_value_t = StoreKind::Redb, env = "SESAME_STORE")]
    pub store: StoreKind,

    /// Lifetime of the session cookie and of the stored session
    #[arg(
        long,
        default_value_t = 604_800,
        env = "SESAME_MAX_AGE_SECS",
        value_parser = clap::value_parser!(i64).range(1..=MAX_MAX_AGE_SECS)
    )]
    pub max_age_secs: i64,

    /// How long a single store call may take before the store counts as down
    #[arg(long, default_value_t = 2000, env = "SESAME_STORE_TIMEOUT_MS")]
    pub store_timeout_ms: u64,

    /// How often expired sessions are swept from the store
    #[arg(
        long,
        default_value_t = 300,
        env = "SESAME_CLEANUP_INTERVAL_SECS",
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub cleanup_interval_secs: u64,

    /// Only send the session cookie over HTTPS
    #[arg(long, env = "SESAME_SECURE_COOKIE")]
    pub secure_cookie: bool,

    /// Keep using a presented id whose session is gone, instead of minting
    /// a new one
    #[arg(long, env = "SESAME_REUSE_EXPIRED_ID")]
    pub reuse_expired_id: bool,
}

impl ServeOpts {
    pub fn web_opts(&self) -> sesame_web::Opts {
        sesame_web::Opts::new(self.listen.clone(), self.cors_origin.clone(), self.reuseport)
    }

    pub fn resume_policy(&self) -> ResumePolicy {
        if self.reuse_expired_id {
            ResumePolicy::Reuse
        } else {
            ResumePolicy::Replace
        }
    }
}

const MAX_TOKEN_TTL_HOURS: i64 = 24 * 365 * 10;

#[derive(Debug, Subcommand)]
pub enum TokenCmd {
    /// Issue a token for a user
    Sign {
        #[arg(long)]
        user_id: i64,

        #[arg(
            long,
            default_value_t = 72,
            value_parser = clap::value_parser!(i64).range(1..=MAX_TOKEN_TTL_HOURS)
        )]
        ttl_hours: i64,

        #[command(flatten)]
        secret: TokenSecretOpts,
    },
    /// Check a token and print its claims
    Verify {
        token: String,

        #[command(flatten)]
        secret: TokenSecretOpts,
    },
}
