use axum::{extract::Request, middleware::Next, response::Response};

use crate::error::AppError;

/// The identity attached to a request. Authentication itself lives in an
/// external provider; this service only needs the stable identifier.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub id: String,
}

/// Identity middleware
/// Extracts the opaque user identifier from the X-User-Id header
pub async fn identity_middleware(
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let user_id = request
        .headers()
        .get("X-User-Id")
        .and_then(|h| h.to_str().ok())
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .ok_or_else(|| AppError::Unauthorized("Missing X-User-Id header".to_string()))?
        .to_string();

    request.extensions_mut().insert(CurrentUser { id: user_id });

    Ok(next.run(request).await)
}
