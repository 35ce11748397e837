use std::fmt;

use data_encoding::BASE32_NOPAD;
use snafu::{ResultExt as _, Snafu, ensure};

const KEY_DERIVATION_CONTEXT: &str = "sesame 2026-10-01 session identifier tag key";

/// Random part of an identifier: 160 bits.
const NONCE_LEN: usize = 20;
/// Truncated keyed-hash tag appended to the nonce.
const TAG_LEN: usize = 12;
const RAW_LEN: usize = NONCE_LEN + TAG_LEN;

/// Length of the textual form of a [`SessionId`] (unpadded base32 of 32
/// bytes).
pub const SESSION_ID_LEN: usize = 52;

#[derive(Debug, Snafu)]
pub enum SessionKeyError {
    #[snafu(display("Session signing secret is empty"))]
    EmptySecret,
}
pub type SessionKeyResult<T> = std::result::Result<T, SessionKeyError>;

/// Key used to tag session identifiers, derived from the deployment's
/// session-signing secret.
#[derive(Clone)]
pub struct SessionKey([u8; 32]);

impl SessionKey {
    pub fn derive_from(secret: &[u8]) -> SessionKeyResult<Self> {
        ensure!(!secret.is_empty(), EmptySecretSnafu);
        Ok(Self(blake3::derive_key(KEY_DERIVATION_CONTEXT, secret)))
    }

    fn tag(&self, nonce: &[u8]) -> [u8; TAG_LEN] {
        let hash = blake3::keyed_hash(&self.0, nonce);
        let mut tag = [0u8; TAG_LEN];
        tag.copy_from_slice(&hash.as_bytes()[..TAG_LEN]);
        tag
    }
}

impl fmt::Debug for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SessionKey(..)")
    }
}

/// Opaque session identifier.
///
/// The same string is the store key and the value of the client-facing
/// token. Only [`IdGenerator`] can produce one, either by minting a fresh id
/// or by verifying a presented token.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(String);

impl SessionId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Enough to correlate log lines, not enough to hijack a session
        write!(f, "SessionId({}..)", &self.0[..8])
    }
}

#[derive(Debug, Snafu)]
pub enum InvalidTokenError {
    #[snafu(display("Token has wrong length: {len}"))]
    Length { len: usize },
    #[snafu(display("Token is not valid base32"))]
    Encoding { source: data_encoding::DecodeError },
    #[snafu(display("Token tag does not match"))]
    Tag,
}
pub type InvalidTokenResult<T> = std::result::Result<T, InvalidTokenError>;

/// Mints and verifies session identifiers.
///
/// Identifiers are `base32(nonce || tag)` where `nonce` comes from the
/// thread-local CSPRNG and `tag` is a keyed blake3 hash of the nonce. The
/// RNG is safe for concurrent use without external locking, and a failure
/// of the OS entropy source aborts the process.
#[derive(Debug, Clone)]
pub struct IdGenerator {
    key: SessionKey,
}

impl IdGenerator {
    pub fn new(key: SessionKey) -> Self {
        Self { key }
    }

    pub fn new_id(&self) -> SessionId {
        let nonce: [u8; NONCE_LEN] = rand::random();

        let mut raw = [0u8; RAW_LEN];
        raw[..NONCE_LEN].copy_from_slice(&nonce);
        raw[NONCE_LEN..].copy_from_slice(&self.key.tag(&nonce));

        SessionId(BASE32_NOPAD.encode(&raw))
    }

    /// Check that `token` is an identifier minted with our key.
    ///
    /// This says nothing about whether the store still knows the id.
    pub fn verify(&self, token: &str) -> InvalidTokenResult<SessionId> {
        ensure!(
            token.len() == SESSION_ID_LEN,
            LengthSnafu { len: token.len() }
        );
        let raw = BASE32_NOPAD
            .decode(token.as_bytes())
            .context(EncodingSnafu)?;
        ensure!(raw.len() == RAW_LEN, LengthSnafu { len: token.len() });

        let (nonce, tag) = raw.split_at(NONCE_LEN);
        let expected = self.key.tag(nonce);
        let diff = expected
            .iter()
            .zip(tag)
            .fold(0u8, |acc, (a, b)| acc | (a ^ b));
        ensure!(diff == 0, TagSnafu);

        Ok(SessionId(token.to_owned()))
    }
}
