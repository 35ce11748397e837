#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use reqwest::Url;
use reqwest::cookie::{CookieStore as _, Jar};
use sesame_core::{SessionId, SessionKey};
use sesame_session::SessionManager;
use sesame_store::{
    MemoryStore, SessionStore, SharedStore, StoreError, StoreLookup, StoreResult,
};
use sesame_web::{Opts, SESSION_COOKIE_NAME, Server};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

pub const TEST_ORIGIN: &str = "http://app.example";

pub fn session_key() -> SessionKey {
    SessionKey::derive_from(b"web-test-secret").expect("Non-empty secret")
}

/// Memory store that can be told to fail individual operations.
///
/// Has no hang switch: store timeouts are covered by the session manager
/// tests, which run on a paused clock.
#[derive(Debug, Default)]
pub struct FlakyStore {
    pub inner: MemoryStore,
    pub fail_get: AtomicBool,
    pub fail_put: AtomicBool,
    pub fail_delete: AtomicBool,
}

impl FlakyStore {
    fn check(flag: &AtomicBool) -> StoreResult<()> {
        if flag.load(Ordering::SeqCst) {
            return Err(StoreError::unavailable("connection refused"));
        }
        Ok(())
    }
}

#[async_trait]
impl SessionStore for FlakyStore {
    async fn put(&self, id: &SessionId, data: Vec<u8>, ttl: time::Duration) -> StoreResult<()> {
        Self::check(&self.fail_put)?;
        self.inner.put(id, data, ttl).await
    }

    async fn get(&self, id: &SessionId) -> StoreResult<StoreLookup> {
        Self::check(&self.fail_get)?;
        self.inner.get(id).await
    }

    async fn delete(&self, id: &SessionId) -> StoreResult<()> {
        Self::check(&self.fail_delete)?;
        self.inner.delete(id).await
    }
}

/// A sesame server on a random local port.
pub struct TestServer {
    shutdown: oneshot::Sender<()>,
    handle: JoinHandle<()>,
    base_url: Url,
}

impl TestServer {
    /// Server over a memory store the test can inspect and break.
    pub async fn start() -> (Self, Arc<FlakyStore>) {
        let store = Arc::new(FlakyStore::default());
        let server = Self::start_with_store(store.clone()).await;
        (server, store)
    }

    pub async fn start_with_store(store: SharedStore) -> Self {
        let sessions = SessionManager::builder(store).key(session_key()).build();
        let opts = Opts::new("127.0.0.1:0".to_owned(), TEST_ORIGIN.to_owned(), false);

        let server = Server::init(opts, sessions)
            .await
            .expect("Failed to start test server");
        let base_url = Url::parse(&format!("http://{}", server.addr().expect("Bound")))
            .expect("Valid url");

        let (shutdown, rx) = oneshot::channel();
        let handle = tokio::spawn(async move {
            server
                .run_until(async {
                    let _ = rx.await;
                })
                .await
                .expect("Server failed");
        });

        Self {
            shutdown,
            handle,
            base_url,
        }
    }

    /// A client with its own cookie jar, i.e. an independent browser.
    pub fn driver(&self) -> Driver {
        Driver::new(self.base_url.clone())
    }

    pub async fn shutdown(self) {
        let _ = self.shutdown.send(());
        self.handle.await.expect("Server task panicked");
    }
}

pub struct Driver {
    client: reqwest::Client,
    jar: Arc<Jar>,
    base_url: Url,
}

impl Driver {
    fn new(base_url: Url) -> Self {
        let jar = Arc::new(Jar::default());
        let client = reqwest::Client::builder()
            .cookie_provider(jar.clone())
            .build()
            .expect("Failed to build HTTP client");

        Self {
            client,
            jar,
            base_url,
        }
    }

    pub fn url(&self, path: &str) -> Url {
        self.base_url.join(path).expect("Valid path")
    }

    /// Current value of the session cookie in the jar.
    pub fn token(&self) -> Option<String> {
        let header = self.jar.cookies(&self.base_url)?;
        let header = header.to_str().expect("Ascii cookies");
        header.split("; ").find_map(|pair| {
            pair.strip_prefix(SESSION_COOKIE_NAME)
                .and_then(|rest| rest.strip_prefix('='))
                .map(str::to_owned)
        })
    }

    /// Put a session cookie in the jar, as if the server had set it.
    pub fn set_token(&self, token: &str) {
        self.jar.add_cookie_str(
            &format!("{SESSION_COOKIE_NAME}={token}; Path=/"),
            &self.base_url,
        );
    }

    pub async fn login(&self) -> reqwest::Response {
        self.post("/login").await
    }

    pub async fn get(&self, path: &str) -> reqwest::Response {
        self.client
            .get(self.url(path))
            .send()
            .await
            .expect("GET request failed")
    }

    pub async fn post(&self, path: &str) -> reqwest::Response {
        self.client
            .post(self.url(path))
            .send()
            .await
            .expect("POST request failed")
    }
}
