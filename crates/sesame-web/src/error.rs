use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use sesame_session::SessionError;
use sesame_util_error::FmtCompact as _;
use snafu::Snafu;
use tracing::{debug, warn};

use super::routes::AppJson;
use crate::LOG_TARGET;

#[derive(Debug, Snafu)]
pub enum RequestError {
    /// Client presented no session cookie
    #[snafu(visibility(pub(crate)))]
    #[snafu(display("No cookie found"))]
    NoToken,
    /// Valid request, but the session is not logged in
    #[snafu(visibility(pub(crate)))]
    #[snafu(display("Forbidden"))]
    Forbidden,
    #[snafu(visibility(pub(crate)))]
    #[snafu(display("InternalServerError: {msg}"))]
    InternalServer { msg: &'static str },
    #[snafu(transparent)]
    Session { source: SessionError },
}
pub type RequestResult<T> = std::result::Result<T, RequestError>;

// How we want error responses to be serialized
#[derive(Serialize)]
pub struct UserErrorResponse {
    pub message: String,
}

impl IntoResponse for RequestError {
    fn into_response(self) -> Response {
        debug!(
            target: LOG_TARGET,
            err = %self.fmt_compact(),
            "Request Error"
        );

        let (status_code, message) = match self {
            RequestError::NoToken => (StatusCode::BAD_REQUEST, self.to_string()),
            RequestError::Forbidden => (StatusCode::FORBIDDEN, self.to_string()),
            err @ (RequestError::Session { .. } | RequestError::InternalServer { .. }) => {
                warn!(
                    target: LOG_TARGET,
                    err = %err.fmt_compact(),
                    "Unexpected Request Error"
                );
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal Server Error".to_owned(),
                )
            }
        };

        (status_code, AppJson(UserErrorResponse { message })).into_response()
    }
}
