mod cookies;
mod session;

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use sesame_session::TokenTransport as _;
use snafu::OptionExt as _;
use tower_cookies::Cookies;
use tracing::{debug, trace};

pub use self::cookies::SESSION_COOKIE_NAME;
use self::cookies::CookiesExt as _;
use self::session::AuthenticatedSession;
use super::SharedState;
use super::error::{NoTokenSnafu, RequestResult, UserErrorResponse};
use crate::{AppState, LOG_TARGET};

pub struct AppJson<T>(pub T);

impl<T> IntoResponse for AppJson<T>
where
    axum::Json<T>: IntoResponse,
{
    fn into_response(self) -> Response {
        axum::Json(self.0).into_response()
    }
}

pub async fn not_found(_state: State<SharedState>, _req: Request<Body>) -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        AppJson(UserErrorResponse {
            message: "Not Found".to_string(),
        }),
    )
}

pub fn route_handler(state: SharedState) -> Router {
    Router::<Arc<AppState>>::new()
        .route("/login", post(post_login))
        .route("/secret", get(get_secret))
        .route("/logout", get(logout).post(logout))
        .fallback(not_found)
        .with_state(state)
}

/// Log in, re-using the presented session if it is still alive.
async fn post_login(state: State<SharedState>, cookies: Cookies) -> RequestResult<&'static str> {
    let token = cookies.session_token();
    let mut session = state.sessions.resolve(token.as_deref()).await?;

    state
        .sessions
        .authenticate(&mut session, &mut cookies.session_transport())
        .await?;

    Ok("Logged in")
}

async fn get_secret(AuthenticatedSession(session): AuthenticatedSession) -> &'static str {
    trace!(target: LOG_TARGET, session_id = ?session.id(), "Secret accessed");
    "Secret"
}

/// Always clears the cookie, whatever happens to the store entry.
async fn logout(state: State<SharedState>, cookies: Cookies) -> RequestResult<&'static str> {
    let token = cookies.session_token().context(NoTokenSnafu)?;

    let mut transport = cookies.session_transport();

    match state.sessions.detached(&token) {
        Some(mut session) => {
            let outcome = state.sessions.end(&mut session, &mut transport).await;
            debug!(target: LOG_TARGET, ?outcome, "Logout");
        }
        None => {
            debug!(target: LOG_TARGET, "Logout with a token we did not issue");
            transport.clear(state.sessions.options());
        }
    }

    Ok("Logged out")
}
