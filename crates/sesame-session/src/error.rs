use sesame_core::codec::{DecodeError, EncodeError};
use sesame_store::StoreError;
use snafu::Snafu;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum SessionError {
    /// The store could not be asked. Never treated as "not logged in".
    #[snafu(display("Session store unavailable"))]
    SessionUnavailable { source: StoreError },
    #[snafu(display("Stored session data is corrupt"))]
    Decoding { source: DecodeError },
    #[snafu(display("Session attributes can't be encoded"))]
    Encoding { source: EncodeError },
    /// Writing the session failed; the client was not given a token.
    #[snafu(display("Failed to persist session"))]
    Persistence { source: StoreError },
}
pub type SessionResult<T> = std::result::Result<T, SessionError>;
