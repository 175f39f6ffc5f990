use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::Response,
};
use tracing::warn;

use crate::errors::AppError;
use crate::state::AppState;

/// Byte-wise comparison that does not stop at the first mismatch.
fn tokens_match(given: &str, expected: &str) -> bool {
    given.len() == expected.len()
        && given
            .bytes()
            .zip(expected.bytes())
            .fold(0u8, |acc, (a, b)| acc | (a ^ b))
            == 0
}

/// Middleware for `/api/admin/*`: requires `Authorization: Bearer <ADMIN_TOKEN>`.
pub async fn require_admin(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim);

    let expected = state.config.admin_token.as_str();
    let authorized = token.is_some_and(|t| !expected.is_empty() && tokens_match(t, expected));
    if !authorized {
        warn!("Rejected admin request to {}", request.uri().path());
        return Err(AppError::Unauthorized);
    }
    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokens_match() {
        assert!(tokens_match("admin-token", "admin-token"));
        assert!(!tokens_match("admin-tokem", "admin-token"));
        assert!(!tokens_match("admin", "admin-token"));
    }
}
