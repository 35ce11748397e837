use axum::extract::FromRequestParts;
use axum::http::request;
use sesame_session::Session;
use snafu::{OptionExt as _, ensure};
use tower_cookies::Cookies;

use super::cookies::CookiesExt as _;
use crate::SharedState;
use crate::error::{ForbiddenSnafu, InternalServerSnafu, NoTokenSnafu, RequestError};

/// A session that presented a token and is logged in.
///
/// Rejects with 400 without a cookie, 403 if not authenticated and 500 if
/// the store could not be asked.
pub struct AuthenticatedSession(pub Session);

impl FromRequestParts<SharedState> for AuthenticatedSession {
    type Rejection = RequestError;

    async fn from_request_parts(
        req: &mut request::Parts,
        state: &SharedState,
    ) -> Result<Self, Self::Rejection> {
        let cookies = Cookies::from_request_parts(req, state)
            .await
            .map_err(|(_, msg)| InternalServerSnafu { msg }.build())?;

        let token = cookies.session_token().context(NoTokenSnafu)?;
        let session = state.sessions.resolve(Some(&token)).await?;

        ensure!(state.sessions.authorize(&session).is_allowed(), ForbiddenSnafu);

        Ok(Self(session))
    }
}
