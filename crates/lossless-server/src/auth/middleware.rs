use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::sync::Arc;

use super::jwt::{validate_token, Claims, TokenType};
use crate::error::ApiError;
use lossless_db::AppState;

/// Extension type to access authenticated user claims in handlers
#[derive(Clone, Debug)]
pub struct AuthUser(pub Claims);

fn bearer_token(request: &Request) -> Option<&str> {
    request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
}

/// Middleware: require valid access token
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Response {
    let Some(token) = bearer_token(&request) else {
        return ApiError::Unauthorized("Missing or invalid Authorization header".into())
            .into_response();
    };

    match validate_token(token, &state.jwt_secret) {
        Ok(claims) if claims.token_type == TokenType::Access => {
            request.extensions_mut().insert(AuthUser(claims));
            next.run(request).await
        }
        Ok(_) => ApiError::Unauthorized("Invalid token type, access token required".into())
            .into_response(),
        Err(_) => ApiError::Unauthorized("Invalid or expired token".into()).into_response(),
    }
}

/// Middleware: attach the caller when a valid access token is present, but
/// let anonymous requests through. Handlers read `Option<Extension<AuthUser>>`.
pub async fn attach_auth(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Response {
    let claims = bearer_token(&request)
        .and_then(|token| validate_token(token, &state.jwt_secret).ok())
        .filter(|claims| claims.token_type == TokenType::Access);

    if let Some(claims) = claims {
        request.extensions_mut().insert(AuthUser(claims));
    }
    next.run(request).await
}
