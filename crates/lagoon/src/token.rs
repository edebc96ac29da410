//! Short-lived API tokens.
//!
//! The Lagoon API accepts HS256 JWTs signed with the shared token signing key.
//! A fresh token is minted for every request so nothing long-lived is held in
//! memory besides the key itself.

use chrono::Utc;
use jsonwebtoken::{encode, EncodingKey, Header};
use serde::{Deserialize, Serialize};

use crate::LagoonError;

/// Issuer and subject written into every token.
pub const TOKEN_ISSUER: &str = "backup-handler";

/// Role the API checks before allowing backup queries and deletions.
const TOKEN_ROLE: &str = "admin";

/// Lifetime of a minted token, in seconds.
const TOKEN_LIFETIME_SECS: i64 = 60;

/// Claims carried by an API token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiClaims {
    /// Role the API authorises the request as.
    pub role: String,
    /// Issuer; always [`TOKEN_ISSUER`].
    pub iss: String,
    /// Subject; always [`TOKEN_ISSUER`].
    pub sub: String,
    /// Audience the API expects, from configuration.
    pub aud: String,
    /// Issued-at time, seconds since the Unix epoch.
    pub iat: i64,
    /// Expiry time, seconds since the Unix epoch.
    pub exp: i64,
}

/// Mints tokens for one audience.
#[derive(Clone)]
pub struct TokenIssuer {
    key: EncodingKey,
    audience: String,
}

impl TokenIssuer {
    /// Creates an issuer signing with `signing_key` for `audience`.
    pub fn new(signing_key: &str, audience: impl Into<String>) -> Self {
        Self {
            key: EncodingKey::from_secret(signing_key.as_bytes()),
            audience: audience.into(),
        }
    }

    /// Mints a token valid from now for [`TOKEN_LIFETIME_SECS`].
    pub fn issue(&self) -> Result<String, LagoonError> {
        let now = Utc::now().timestamp();
        let claims = ApiClaims {
            role: TOKEN_ROLE.to_string(),
            iss: TOKEN_ISSUER.to_string(),
            sub: TOKEN_ISSUER.to_string(),
            aud: self.audience.clone(),
            iat: now,
            exp: now + TOKEN_LIFETIME_SECS,
        };
        encode(&Header::default(), &claims, &self.key).map_err(LagoonError::Token)
    }
}

impl std::fmt::Debug for TokenIssuer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenIssuer")
            .field("audience", &self.audience)
            .finish_non_exhaustive()
    }
}
