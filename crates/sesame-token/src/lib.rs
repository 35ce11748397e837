//! HS256 bearer tokens carrying a user id.
//!
//! Independent of the cookie session flow: a token is self-contained and
//! nothing about it is kept in the session store.

use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use snafu::{OptionExt as _, ResultExt as _, Snafu, ensure};
use time::{Duration, OffsetDateTime};
use tracing::debug;

pub const LOG_TARGET: &str = "sesame::token";

pub const DEFAULT_TOKEN_TTL: Duration = Duration::hours(72);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub user_id: i64,
    /// Expiry as Unix timestamp (seconds)
    pub exp: i64,
}

impl Claims {
    /// `None` if the expiry is not a representable date.
    pub fn expiring_in(user_id: i64, ttl: Duration) -> Option<Self> {
        Some(Self {
            user_id,
            exp: OffsetDateTime::now_utc().checked_add(ttl)?.unix_timestamp(),
        })
    }
}

#[derive(Debug, Snafu)]
pub enum SecretError {
    #[snafu(display("Token secret must not be empty"))]
    EmptyTokenSecret,
}

#[derive(Debug, Snafu)]
pub enum SignError {
    #[snafu(display("Token lifetime must be positive and bounded, got {ttl}"))]
    InvalidTokenTtl { ttl: Duration },
    #[snafu(display("Failed to encode token"))]
    Encode { source: jsonwebtoken::errors::Error },
}
pub type SignResult<T> = std::result::Result<T, SignError>;

#[derive(Debug, Snafu)]
pub enum VerificationError {
    #[snafu(display("Token signature does not match"))]
    BadSignature,
    #[snafu(display("Token has expired"))]
    Expired,
    #[snafu(display("Token is malformed"))]
    Malformed { source: jsonwebtoken::errors::Error },
    #[snafu(display("Token was rejected"))]
    Rejected { source: jsonwebtoken::errors::Error },
}
pub type VerificationResult<T> = std::result::Result<T, VerificationError>;

impl From<jsonwebtoken::errors::Error> for VerificationError {
    fn from(source: jsonwebtoken::errors::Error) -> Self {
        match source.kind() {
            ErrorKind::InvalidSignature => VerificationError::BadSignature,
            ErrorKind::ExpiredSignature => VerificationError::Expired,
            ErrorKind::InvalidToken
            | ErrorKind::Base64(_)
            | ErrorKind::Json(_)
            | ErrorKind::Utf8(_) => VerificationError::Malformed { source },
            _ => VerificationError::Rejected { source },
        }
    }
}

pub struct TokenSigner {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
}

impl std::fmt::Debug for TokenSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("TokenSigner(..)")
    }
}

impl TokenSigner {
    pub fn new(secret: &[u8]) -> Result<Self, SecretError> {
        ensure!(!secret.is_empty(), EmptyTokenSecretSnafu);

        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp"]);

        Ok(Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            validation,
        })
    }

    /// Issue a token for `user_id`, valid for `ttl` from now.
    pub fn sign(&self, user_id: i64, ttl: Duration) -> SignResult<String> {
        ensure!(ttl.is_positive(), InvalidTokenTtlSnafu { ttl });
        let claims = Claims::expiring_in(user_id, ttl).context(InvalidTokenTtlSnafu { ttl })?;
        self.sign_claims(&claims)
    }

    pub fn sign_claims(&self, claims: &Claims) -> SignResult<String> {
        jsonwebtoken::encode(&Header::new(Algorithm::HS256), claims, &self.encoding)
            .context(EncodeSnafu)
    }

    /// Check signature and expiry and return the claims.
    pub fn verify(&self, token: &str) -> VerificationResult<Claims> {
        let data = jsonwebtoken::decode::<Claims>(token, &self.decoding, &self.validation)
            .inspect_err(|err| debug!(target: LOG_TARGET, %err, "Token verification failed"))?;
        Ok(data.claims)
    }
}
