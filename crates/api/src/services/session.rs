//! Session tokens and the cookie that carries them.
//!
//! A session is an HS256 JWT whose only claim is `userId`. It has no `exp`:
//! the cookie's one-year `Max-Age` is the only lifetime. Requests without a
//! valid token are anonymous rather than failing outright, so public queries
//! keep working when a stale cookie is sent.

use axum::http::{HeaderMap, HeaderValue, header};
use cookie::{Cookie, SameSite, time::Duration};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use trackytronics_core::UserId;

/// Name of the session cookie.
pub const SESSION_COOKIE: &str = "token";

/// Session cookie lifetime.
const SESSION_MAX_AGE_DAYS: i64 = 365;

/// Errors from minting or reading session tokens.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The token is malformed or its signature doesn't verify.
    #[error("invalid session token")]
    InvalidToken,

    /// Signing failed.
    #[error("failed to sign session token: {0}")]
    Signing(#[source] jsonwebtoken::errors::Error),

    /// The cookie couldn't be encoded as a header value.
    #[error("invalid cookie header: {0}")]
    Header(#[from] axum::http::header::InvalidHeaderValue),
}

#[derive(Debug, Serialize, Deserialize)]
struct SessionClaims {
    #[serde(rename = "userId")]
    user_id: i32,
}

/// Who is making a request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Identity {
    user_id: Option<UserId>,
}

impl Identity {
    /// A request with no valid session.
    #[must_use]
    pub const fn anonymous() -> Self {
        Self { user_id: None }
    }

    /// A request carrying a verified session for `user_id`.
    #[must_use]
    pub const fn user(user_id: UserId) -> Self {
        Self {
            user_id: Some(user_id),
        }
    }

    #[must_use]
    pub const fn user_id(&self) -> Option<UserId> {
        self.user_id
    }
}

/// Mints, verifies and clears session tokens.
#[derive(Clone)]
pub struct SessionIssuer {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    secure: bool,
}

impl std::fmt::Debug for SessionIssuer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionIssuer")
            .field("keys", &"[REDACTED]")
            .field("secure", &self.secure)
            .finish()
    }
}

impl SessionIssuer {
    /// Create an issuer signing with `secret`.
    ///
    /// `secure` sets the cookie's `Secure` attribute; it should be true
    /// whenever the frontend is served over https.
    #[must_use]
    pub fn new(secret: &SecretString, secure: bool) -> Self {
        let key = secret.expose_secret().as_bytes();

        let mut validation = Validation::new(Algorithm::HS256);
        validation.required_spec_claims.clear();
        validation.validate_exp = false;

        Self {
            encoding: EncodingKey::from_secret(key),
            decoding: DecodingKey::from_secret(key),
            validation,
            secure,
        }
    }

    /// Mint a token for `user_id`.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Signing` if encoding fails.
    pub fn issue(&self, user_id: UserId) -> Result<String, SessionError> {
        let claims = SessionClaims {
            user_id: user_id.as_i32(),
        };
        jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(SessionError::Signing)
    }

    /// Verify a token and return the user it was minted for.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::InvalidToken` for a bad signature or malformed token.
    pub fn verify(&self, token: &str) -> Result<UserId, SessionError> {
        let data = jsonwebtoken::decode::<SessionClaims>(token, &self.decoding, &self.validation)
            .map_err(|_| SessionError::InvalidToken)?;
        Ok(UserId::new(data.claims.user_id))
    }

    /// `Set-Cookie` value carrying a fresh session for `user_id`.
    ///
    /// # Errors
    ///
    /// Returns `SessionError` if the token can't be signed or encoded.
    pub fn session_cookie(&self, user_id: UserId) -> Result<HeaderValue, SessionError> {
        let token = self.issue(user_id)?;
        let cookie = Cookie::build((SESSION_COOKIE, token))
            .http_only(true)
            .path("/")
            .max_age(Duration::days(SESSION_MAX_AGE_DAYS))
            .secure(self.secure)
            .same_site(SameSite::Lax)
            .build();

        Ok(HeaderValue::from_str(&cookie.to_string())?)
    }

    /// `Set-Cookie` value that removes the session cookie.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Header` if the cookie can't be encoded.
    pub fn clear(&self) -> Result<HeaderValue, SessionError> {
        let mut cookie = Cookie::build((SESSION_COOKIE, ""))
            .http_only(true)
            .path("/")
            .secure(self.secure)
            .same_site(SameSite::Lax)
            .build();
        cookie.make_removal();

        Ok(HeaderValue::from_str(&cookie.to_string())?)
    }

    /// Resolve the identity of a request from its `Cookie` headers.
    ///
    /// A missing cookie is anonymous. A present but invalid token is also
    /// anonymous, logged at `warn`.
    #[must_use]
    pub fn identity_from_headers(&self, headers: &HeaderMap) -> Identity {
        let Some(token) = session_token(headers) else {
            return Identity::anonymous();
        };

        match self.verify(&token) {
            Ok(user_id) => Identity::user(user_id),
            Err(e) => {
                warn!(error = %e, "Ignoring invalid session cookie");
                Identity::anonymous()
            }
        }
    }
}

fn session_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(Cookie::split_parse)
        .filter_map(Result::ok)
        .find(|c| c.name() == SESSION_COOKIE)
        .map(|c| c.value().to_owned())
}
