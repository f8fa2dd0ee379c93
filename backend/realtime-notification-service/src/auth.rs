/// Handshake verification for socket connections
///
/// The user id arrives out-of-band as a query parameter. When a secret is
/// configured the handshake must also carry a HS256 JWT whose `sub` matches it.
use actix_web::{http::header, HttpRequest};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};

use crate::error::AppError;

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: usize,
}

/// Token from the `token` query parameter, falling back to `Authorization: Bearer`
pub fn extract_token(query_token: Option<&str>, req: &HttpRequest) -> Option<String> {
    query_token.map(str::to_string).or_else(|| {
        req.headers()
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.strip_prefix("Bearer "))
            .map(|s| s.to_string())
    })
}

pub fn verify_handshake(
    secret: Option<&str>,
    user_id: &str,
    token: Option<&str>,
) -> Result<(), AppError> {
    let Some(secret) = secret else {
        return Ok(());
    };

    let Some(token) = token else {
        tracing::warn!(user_id, "socket handshake rejected: no token provided");
        return Err(AppError::Unauthorized);
    };

    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::new(Algorithm::HS256),
    )
    .map_err(|e| {
        tracing::warn!(user_id, error = %e, "socket handshake rejected: invalid token");
        AppError::Unauthorized
    })?;

    if data.claims.sub != user_id {
        tracing::warn!(
            user_id,
            token_sub = %data.claims.sub,
            "socket handshake rejected: token subject does not match userId"
        );
        return Err(AppError::Unauthorized);
    }

    Ok(())
}
