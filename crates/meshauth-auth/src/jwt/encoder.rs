//! Signs claims into compact JWTs.

use chrono::{DateTime, Utc};
use jsonwebtoken::{EncodingKey, Header, encode};

use meshauth_core::config::AuthConfig;
use meshauth_core::error::AppError;
use meshauth_core::types::{SessionId, TokenId, UserId};
use meshauth_entity::token::TokenKind;

use super::claims::Claims;

/// A signed token together with its claims.
#[derive(Debug, Clone)]
pub struct EncodedToken {
    /// Compact JWT.
    pub token: String,
    /// The signed claims.
    pub claims: Claims,
}

/// HS256 token signer.
#[derive(Clone)]
pub struct JwtEncoder {
    encoding_key: EncodingKey,
    issuer: String,
}

impl std::fmt::Debug for JwtEncoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtEncoder")
            .field("issuer", &self.issuer)
            .finish()
    }
}

impl JwtEncoder {
    /// Creates an encoder from auth configuration.
    pub fn new(config: &AuthConfig) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(config.jwt_secret.as_bytes()),
            issuer: config.jwt_issuer.clone(),
        }
    }

    /// Signs one token of `kind` with the given identifiers and lifetime.
    #[allow(clippy::too_many_arguments)]
    pub fn encode(
        &self,
        kind: TokenKind,
        jti: TokenId,
        user_id: UserId,
        session_id: SessionId,
        username: &str,
        issued_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Result<EncodedToken, AppError> {
        let claims = Claims {
            sub: user_id,
            sid: session_id,
            jti,
            username: username.to_string(),
            iss: self.issuer.clone(),
            iat: issued_at.timestamp(),
            exp: expires_at.timestamp(),
            token_type: kind,
        };

        let token = encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| AppError::internal(format!("Failed to encode {kind} token: {e}")))?;

        Ok(EncodedToken { token, claims })
    }
}
