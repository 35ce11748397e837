//! Core session types: identifiers, attributes, their storage codec and the
//! in-memory session object.
//!
//! Nothing in here knows about the store or the transport. See
//! `sesame-session` for the orchestration on top of these.

mod attributes;
pub mod codec;
mod id;
mod session;

pub use self::attributes::{AttrValue, Attributes};
pub use self::id::{
    IdGenerator, InvalidTokenError, SESSION_ID_LEN, SessionId, SessionKey, SessionKeyError,
};
pub use self::session::{AUTHENTICATED_KEY, DEFAULT_MAX_AGE, Session, SessionOptions};
