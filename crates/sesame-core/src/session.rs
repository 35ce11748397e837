use time::Duration;

use crate::{AttrValue, Attributes, SessionId};

/// Attribute that marks a session as logged in. Only `Bool(true)` counts.
pub const AUTHENTICATED_KEY: &str = "authenticated";

/// Lifetime of the client token, and of the store entry behind it.
pub const DEFAULT_MAX_AGE: Duration = Duration::days(7);

/// How the client-facing token is exposed and how long it lives.
///
/// `max_age` is also used as the store TTL, so the cookie and the store entry
/// expire together.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionOptions {
    pub path: String,
    pub max_age: Duration,
    pub http_only: bool,
    pub secure: bool,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            path: "/".to_owned(),
            max_age: DEFAULT_MAX_AGE,
            http_only: true,
            secure: false,
        }
    }
}

/// In-memory session bound to a single request.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    id: SessionId,
    attributes: Attributes,
    options: SessionOptions,
    fresh: bool,
}

impl Session {
    /// A session nobody has stored yet.
    pub fn new(id: SessionId, options: SessionOptions) -> Self {
        Self {
            id,
            attributes: Attributes::new(),
            options,
            fresh: true,
        }
    }

    /// A session rehydrated from stored attributes.
    pub fn loaded(id: SessionId, attributes: Attributes, options: SessionOptions) -> Self {
        Self {
            id,
            attributes,
            options,
            fresh: false,
        }
    }

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    pub fn options(&self) -> &SessionOptions {
        &self.options
    }

    /// Whether this session was created for the current request rather than
    /// loaded from the store.
    pub fn is_fresh(&self) -> bool {
        self.fresh
    }

    pub fn get(&self, key: &str) -> Option<&AttrValue> {
        self.attributes.get(key)
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<AttrValue>) -> Option<AttrValue> {
        self.attributes.insert(key.into(), value.into())
    }

    pub fn unset(&mut self, key: &str) -> Option<AttrValue> {
        self.attributes.remove(key)
    }

    pub fn clear(&mut self) {
        self.attributes.clear();
    }

    pub fn is_authenticated(&self) -> bool {
        self.get(AUTHENTICATED_KEY)
            .and_then(AttrValue::as_bool)
            .unwrap_or(false)
    }
}
