use std::future::Future;
use std::time::Duration;

use sesame_core::{
    AUTHENTICATED_KEY, IdGenerator, Session, SessionKey, SessionOptions, codec,
};
use sesame_store::{SharedStore, StoreError, StoreLookup, StoreResult};
use sesame_util_error::FmtCompact as _;
use snafu::ResultExt as _;
use tracing::{debug, trace, warn};

use crate::error::{
    DecodingSnafu, EncodingSnafu, PersistenceSnafu, SessionResult, SessionUnavailableSnafu,
};
use crate::{Authorization, LOG_TARGET, TokenTransport};

/// Upper bound on a single store call before it counts as unavailable.
pub const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_secs(2);

/// What to do with a well-formed token the store no longer knows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ResumePolicy {
    /// Discard the stale id and mint a new one.
    #[default]
    Replace,
    /// Keep using the presented id for the new, empty session.
    Reuse,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogoutOutcome {
    Complete,
    /// The client token was cleared but the store entry may linger until its
    /// TTL runs out.
    StoreCleanupFailed,
}

#[derive(Debug)]
pub struct SessionManager {
    store: SharedStore,
    ids: IdGenerator,
    options: SessionOptions,
    store_timeout: Duration,
    resume: ResumePolicy,
}

#[bon::bon]
impl SessionManager {
    /// The store handle is created once at startup and shared by every
    /// request through this manager.
    #[builder(finish_fn(name = "build"))]
    pub fn new(
        #[builder(start_fn)] store: SharedStore,
        key: SessionKey,
        #[builder(default)] options: SessionOptions,
        #[builder(default = DEFAULT_STORE_TIMEOUT)] store_timeout: Duration,
        #[builder(default)] resume: ResumePolicy,
    ) -> Self {
        Self {
            store,
            ids: IdGenerator::new(key),
            options,
            store_timeout,
            resume,
        }
    }
}

impl SessionManager {
    pub fn options(&self) -> &SessionOptions {
        &self.options
    }

    /// A brand new, empty session with a freshly minted id.
    pub fn begin(&self) -> Session {
        Session::new(self.ids.new_id(), self.options.clone())
    }

    /// Turn the token a request presented (if any) into a session.
    ///
    /// Missing, forged or expired tokens all yield an unauthenticated
    /// session. Only a store that cannot answer is an error.
    pub async fn resolve(&self, token: Option<&str>) -> SessionResult<Session> {
        let Some(token) = token else {
            return Ok(self.begin());
        };

        let id = match self.ids.verify(token) {
            Ok(id) => id,
            Err(err) => {
                debug!(target: LOG_TARGET, err = %err.fmt_compact(), "Ignoring invalid session token");
                return Ok(self.begin());
            }
        };

        let lookup = self
            .store_call(self.store.get(&id))
            .await
            .context(SessionUnavailableSnafu)?;

        match lookup {
            StoreLookup::Found(bytes) => {
                let attributes = codec::decode(&bytes).context(DecodingSnafu)?;
                trace!(target: LOG_TARGET, session_id = ?id, ?attributes, "Session loaded");
                Ok(Session::loaded(id, attributes, self.options.clone()))
            }
            StoreLookup::NotFound => match self.resume {
                ResumePolicy::Replace => {
                    debug!(target: LOG_TARGET, session_id = ?id, "Session not in store, replacing id");
                    Ok(self.begin())
                }
                ResumePolicy::Reuse => {
                    debug!(target: LOG_TARGET, session_id = ?id, "Session not in store, reusing id");
                    Ok(Session::new(id, self.options.clone()))
                }
            },
        }
    }

    /// A session handle for `token` without reading the store, for callers
    /// that are about to discard whatever is stored anyway.
    ///
    /// Returns `None` if the token was not minted by us.
    pub fn detached(&self, token: &str) -> Option<Session> {
        self.ids
            .verify(token)
            .ok()
            .map(|id| Session::new(id, self.options.clone()))
    }

    /// Write the session's attributes to the store, with `max_age` as TTL.
    pub async fn save(&self, session: &Session) -> SessionResult<()> {
        let bytes = codec::encode(session.attributes()).context(EncodingSnafu)?;
        self.store_call(
            self.store
                .put(session.id(), bytes, session.options().max_age),
        )
        .await
        .context(PersistenceSnafu)
    }

    /// Mark the session as logged in, persist it, and only then hand the
    /// token to the client.
    ///
    /// On failure the session is left as it was and nothing is emitted.
    pub async fn authenticate(
        &self,
        session: &mut Session,
        transport: &mut impl TokenTransport,
    ) -> SessionResult<()> {
        let previous = session.set(AUTHENTICATED_KEY, true);

        if let Err(err) = self.save(session).await {
            match previous {
                Some(value) => session.set(AUTHENTICATED_KEY, value),
                None => session.unset(AUTHENTICATED_KEY),
            };
            return Err(err);
        }

        transport.emit(session.id(), session.options());
        debug!(target: LOG_TARGET, session_id = ?session.id(), "Session authenticated");
        Ok(())
    }

    pub fn authorize(&self, session: &Session) -> Authorization {
        if session.is_authenticated() {
            Authorization::Allow
        } else {
            Authorization::Deny
        }
    }

    /// Log out: forget all attributes, drop the store entry and clear the
    /// client token.
    ///
    /// The token is cleared even if the store delete fails.
    pub async fn end(
        &self,
        session: &mut Session,
        transport: &mut impl TokenTransport,
    ) -> LogoutOutcome {
        session.clear();

        let outcome = match self.store_call(self.store.delete(session.id())).await {
            Ok(()) => LogoutOutcome::Complete,
            Err(err) => {
                warn!(
                    target: LOG_TARGET,
                    err = %err.fmt_compact(),
                    "Failed to delete session from store"
                );
                LogoutOutcome::StoreCleanupFailed
            }
        };

        transport.clear(session.options());
        debug!(target: LOG_TARGET, session_id = ?session.id(), "Session ended");
        outcome
    }

    async fn store_call<T>(&self, call: impl Future<Output = StoreResult<T>>) -> StoreResult<T> {
        tokio::time::timeout(self.store_timeout, call)
            .await
            .map_err(|elapsed| StoreError::unavailable(elapsed))
            .and_then(|res| res)
    }
}
