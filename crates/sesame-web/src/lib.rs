mod error;
mod routes;

use std::future::Future;
use std::io;
use std::net::{AddrParseError, SocketAddr};
use std::str::FromStr as _;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::http::header::{ACCEPT, CONTENT_TYPE};
use axum::http::{HeaderValue, Method};
use sesame_session::SessionManager;
use sesame_util_error::WhateverResult;
use snafu::{ResultExt as _, Snafu, Whatever};
use tokio::net::{TcpListener, TcpSocket};
use tokio::signal;
use tokio::task::JoinHandle;
use tower_cookies::CookieManagerLayer;
use tower_http::cors::CorsLayer;
use tracing::{debug, info};

pub use self::routes::SESSION_COOKIE_NAME;

pub const LOG_TARGET: &str = "sesame::web";

pub const DEFAULT_LISTEN: &str = "127.0.0.1:8080";
pub const DEFAULT_CORS_ORIGIN: &str = "http://localhost:3000";

#[derive(Clone, Debug)]
pub struct Opts {
    pub listen: String,
    /// The one origin allowed to make credentialed cross-origin requests.
    pub cors_origin: String,
    pub reuseport: bool,
}

impl Opts {
    pub fn new(listen: String, cors_origin: String, reuseport: bool) -> Self {
        Self {
            listen,
            cors_origin,
            reuseport,
        }
    }

    pub fn cors_origin(&self) -> WhateverResult<HeaderValue> {
        self.cors_origin
            .parse()
            .whatever_context("cors_origin does not parse as an http value")
    }
}

impl Default for Opts {
    fn default() -> Self {
        Self::new(
            DEFAULT_LISTEN.to_owned(),
            DEFAULT_CORS_ORIGIN.to_owned(),
            false,
        )
    }
}

pub struct AppState {
    pub sessions: SessionManager,
}

pub type SharedState = Arc<AppState>;

pub struct Server {
    listener: TcpListener,

    state: SharedState,
    opts: Opts,
    tasks: Vec<JoinHandle<()>>,
}

#[derive(Debug, Snafu)]
pub enum WebServerError {
    #[snafu(transparent)]
    IO {
        source: io::Error,
    },

    ListenAddr {
        source: AddrParseError,
    },

    Cors {
        source: Whatever,
    },
}

pub type ServerResult<T> = std::result::Result<T, WebServerError>;

impl Server {
    pub async fn init(opts: Opts, sessions: SessionManager) -> ServerResult<Server> {
        let listener = Self::get_listener(&opts).await?;

        let state = Arc::new(AppState { sessions });

        info!(target: LOG_TARGET, "Listening on {}", listener.local_addr()?);
        Ok(Self {
            listener,
            state,
            opts,
            tasks: vec![],
        })
    }

    pub async fn get_listener(opts: &Opts) -> ServerResult<TcpListener> {
        let socket = {
            let addr = SocketAddr::from_str(&opts.listen).context(ListenAddrSnafu)?;

            let socket = if addr.is_ipv4() {
                TcpSocket::new_v4()?
            } else {
                TcpSocket::new_v6()?
            };
            if opts.reuseport {
                #[cfg(unix)]
                socket.set_reuseport(true)?;
            }
            socket.set_nodelay(true)?;

            socket.bind(addr)?;

            socket
        };

        Ok(socket.listen(1024)?)
    }

    /// Tie a background task (e.g. the store expiry sweeper) to the server's
    /// lifetime. It is aborted once the server stops.
    pub fn attach_task(&mut self, task: JoinHandle<()>) {
        self.tasks.push(task);
    }

    pub async fn run(self) -> ServerResult<()> {
        self.run_until(shutdown_signal()).await
    }

    /// Serve until `shutdown` completes, then drain in-flight requests.
    pub async fn run_until(
        self,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> ServerResult<()> {
        let router = Router::new()
            .merge(routes::route_handler(self.state.clone()))
            .layer(CookieManagerLayer::new())
            .layer(cors_layer(&self.opts)?);

        info!(target: LOG_TARGET, "Starting server");
        let res = axum::serve(self.listener, router.into_make_service())
            .with_graceful_shutdown(shutdown)
            .await;

        for task in self.tasks {
            task.abort();
        }
        debug!(target: LOG_TARGET, "Server stopped");

        Ok(res?)
    }

    pub fn addr(&self) -> ServerResult<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }
}

fn cors_layer(opts: &Opts) -> ServerResult<CorsLayer> {
    Ok(CorsLayer::new()
        .allow_credentials(true)
        .allow_headers([ACCEPT, CONTENT_TYPE])
        .max_age(Duration::from_secs(86400))
        .allow_origin(opts.cors_origin().context(CorsSnafu)?)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS]))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
