//! Bearer token guard for protected routes.

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{HeaderValue, StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::headers::{Authorization, HeaderMapExt, authorization::Bearer};

use crate::error::OAuthError;
use crate::server::transport::HttpState;

/// Require a valid access token.
///
/// On success the [`VerifiedToken`](super::types::VerifiedToken) is placed in the
/// request extensions. On failure the response is 401 with a `WWW-Authenticate`
/// challenge pointing at the protected resource metadata (RFC 9728 §5.1).
pub async fn require_bearer(
    State(state): State<Arc<HttpState>>,
    mut request: Request,
    next: Next,
) -> Response {
    let Some(Authorization(bearer)) = request.headers().typed_get::<Authorization<Bearer>>() else {
        return unauthorized(&state.resource_metadata_url, None);
    };

    match state.oauth.verify_access_token(bearer.token()).await {
        Ok(verified) => {
            tracing::debug!(client_id = %verified.client_id, "Bearer token accepted");
            request.extensions_mut().insert(verified);
            next.run(request).await
        }
        Err(err) => {
            tracing::debug!(error = %err, "Bearer token rejected");
            unauthorized(&state.resource_metadata_url, Some(err))
        }
    }
}

/// Build the `WWW-Authenticate` value. A request without credentials gets no
/// error code (RFC 6750 §3.1).
fn www_authenticate(resource_metadata_url: &str, err: Option<&OAuthError>) -> String {
    match err {
        Some(err) => format!(
            r#"Bearer resource_metadata="{resource_metadata_url}", error="{}", error_description="{}""#,
            err.error_code(),
            err.description().replace('"', "'")
        ),
        None => format!(r#"Bearer resource_metadata="{resource_metadata_url}""#),
    }
}

fn unauthorized(resource_metadata_url: &str, err: Option<OAuthError>) -> Response {
    let challenge = www_authenticate(resource_metadata_url, err.as_ref());
    let mut response = match err {
        Some(err) => err.into_response(),
        None => StatusCode::UNAUTHORIZED.into_response(),
    };

    if let Ok(value) = HeaderValue::from_str(&challenge) {
        response.headers_mut().insert(header::WWW_AUTHENTICATE, value);
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_challenge_without_credentials() {
        let value = www_authenticate("https://proxy.example/.well-known/oauth-protected-resource", None);
        assert_eq!(
            value,
            r#"Bearer resource_metadata="https://proxy.example/.well-known/oauth-protected-resource""#
        );
    }

    #[test]
    fn test_challenge_with_invalid_token() {
        let err = OAuthError::invalid_token("access token expired");
        let value = www_authenticate("https://p.example/rm", Some(&err));
        assert!(value.starts_with(r#"Bearer resource_metadata="https://p.example/rm""#));
        assert!(value.contains(r#"error="invalid_token""#));
        assert!(value.contains(r#"error_description="access token expired""#));
    }

    #[test]
    fn test_unauthorized_sets_header() {
        let response = unauthorized("https://p.example/rm", None);
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(response.headers().contains_key(header::WWW_AUTHENTICATE));
    }
}
