//! Verifies JWT signatures and token types.
//!
//! Expiry is not checked here. The token service compares `exp` against the
//! injected clock so that every expiry decision uses the same time source.

use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};

use meshauth_core::config::AuthConfig;
use meshauth_core::error::AppError;
use meshauth_entity::token::TokenKind;

use super::claims::Claims;

/// HS256 signature verifier.
#[derive(Clone)]
pub struct JwtDecoder {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl std::fmt::Debug for JwtDecoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtDecoder")
            .field("validation", &self.validation)
            .finish()
    }
}

impl JwtDecoder {
    /// Creates a decoder from auth configuration.
    pub fn new(config: &AuthConfig) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.set_issuer(&[config.jwt_issuer.as_str()]);

        Self {
            decoding_key: DecodingKey::from_secret(config.jwt_secret.as_bytes()),
            validation,
        }
    }

    /// Verifies the signature and returns the claims of any token kind.
    pub fn decode(&self, token: &str) -> Result<Claims, AppError> {
        decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::InvalidSignature => {
                    AppError::token_invalid("Invalid token signature")
                }
                _ => AppError::token_invalid(format!("Token validation failed: {e}")),
            })
    }

    /// Verifies the signature and requires the given kind.
    pub fn decode_kind(&self, token: &str, kind: TokenKind) -> Result<Claims, AppError> {
        let claims = self.decode(token)?;
        if claims.token_type != kind {
            return Err(AppError::token_invalid(format!(
                "Invalid token type: expected {kind} token"
            )));
        }
        Ok(claims)
    }
}
