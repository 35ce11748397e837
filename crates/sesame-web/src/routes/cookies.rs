use sesame_core::{SessionId, SessionOptions};
use sesame_session::TokenTransport;
use tower_cookies::{Cookie, Cookies};
use tracing::trace;

use crate::LOG_TARGET;

pub const SESSION_COOKIE_NAME: &str = "session-id";

pub(crate) trait CookiesExt {
    /// Raw value of the session cookie, if the client sent one.
    fn session_token(&self) -> Option<String>;

    fn session_transport(&self) -> CookieTransport<'_>;
}

impl CookiesExt for Cookies {
    fn session_token(&self) -> Option<String> {
        self.get(SESSION_COOKIE_NAME)
            .map(|cookie| cookie.value().to_owned())
    }

    fn session_transport(&self) -> CookieTransport<'_> {
        CookieTransport { cookies: self }
    }
}

/// Carries the session id to and from the client in the `session-id` cookie.
pub(crate) struct CookieTransport<'c> {
    cookies: &'c Cookies,
}

impl TokenTransport for CookieTransport<'_> {
    fn emit(&mut self, id: &SessionId, options: &SessionOptions) {
        let mut cookie = Cookie::new(SESSION_COOKIE_NAME, id.as_str().to_owned());
        cookie.set_path(options.path.clone());
        cookie.set_max_age(options.max_age);
        cookie.set_http_only(options.http_only);
        cookie.set_secure(options.secure);
        trace!(target: LOG_TARGET, session_id = ?id, "Setting session cookie");
        self.cookies.add(cookie);
    }

    fn clear(&mut self, options: &SessionOptions) {
        let mut cookie = Cookie::new(SESSION_COOKIE_NAME, "");
        cookie.set_path(options.path.clone());
        self.cookies.remove(cookie);
    }
}
