//! Session lifecycle: resolving a presented token into a [`Session`],
//! authenticating it, checking it and ending it.
//!
//! [`SessionManager`] keeps no session table of its own. All shared state
//! lives in the injected store, so every request works on its own copy and
//! there is no locking per session id. Two requests that update the same
//! session concurrently race, and whichever writes last wins. Sessions are
//! therefore not suitable as a coordination primitive.

mod error;
mod manager;

use sesame_core::{SessionId, SessionOptions};

pub use self::error::{SessionError, SessionResult};
pub use self::manager::{DEFAULT_STORE_TIMEOUT, LogoutOutcome, ResumePolicy, SessionManager};
pub use sesame_core::Session;

pub const LOG_TARGET: &str = "sesame::session";

/// Outcome of an access check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Authorization {
    Allow,
    Deny,
}

impl Authorization {
    pub fn is_allowed(self) -> bool {
        self == Authorization::Allow
    }
}

/// Where the client-facing token lives, usually a cookie.
pub trait TokenTransport {
    /// Hand `id` to the client with the given exposure settings.
    fn emit(&mut self, id: &SessionId, options: &SessionOptions);

    /// Make the client drop its token.
    fn clear(&mut self, options: &SessionOptions);
}
