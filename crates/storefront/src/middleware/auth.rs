//! Admin API authentication.
//!
//! Every `/admin/api` handler takes a [`RequireAdmin`] argument. The request
//! must carry `Authorization: Bearer <ADMIN_API_TOKEN>`.

use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};
use secrecy::ExposeSecret;

use crate::error::AppError;
use crate::state::AppState;

/// Extractor that requires the admin bearer token.
///
/// # Example
///
/// ```rust,ignore
/// async fn protected_handler(_admin: RequireAdmin) -> impl IntoResponse {
///     "staff only"
/// }
/// ```
#[derive(Debug, Clone, Copy)]
pub struct RequireAdmin;

impl FromRequestParts<AppState> for RequireAdmin {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let presented = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .ok_or_else(|| AppError::Unauthorized("missing bearer token".to_string()))?;

        let expected = state.config().admin_api_token.expose_secret();
        if !constant_time_eq(presented.trim().as_bytes(), expected.as_bytes()) {
            tracing::warn!(path = %parts.uri.path(), "Rejected admin API token");
            return Err(AppError::Unauthorized("invalid token".to_string()));
        }

        Ok(Self)
    }
}

/// Compare two byte strings without short-circuiting on the first mismatch.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constant_time_eq() {
        assert!(constant_time_eq(b"secret-token", b"secret-token"));
        assert!(!constant_time_eq(b"secret-token", b"secret-tokeN"));
        assert!(!constant_time_eq(b"secret", b"secret-token"));
        assert!(constant_time_eq(b"", b""));
    }
}
