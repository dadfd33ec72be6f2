//! HTML pages for the browser-facing steps of the flow.
//!
//! `/authorize` and the upstream callback are visited by a browser, so failures
//! there render a page instead of JSON and never redirect.

use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};

use crate::error::OAuthError;

/// Render an authorization error page.
///
/// All parameters are HTML-escaped to prevent XSS.
pub fn render_error_page(title: &str, message: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width,initial-scale=1">
<title>{title} - MCP Authorization</title>
<style>
body {{ font-family: -apple-system, BlinkMacSystemFont, "Segoe UI", Roboto, sans-serif; background: #f5f5f5; margin: 0; display: flex; justify-content: center; align-items: center; min-height: 100vh; }}
.card {{ background: #fff; border-radius: 8px; box-shadow: 0 2px 8px rgba(0,0,0,0.1); padding: 32px; max-width: 440px; width: 100%; }}
h1 {{ font-size: 20px; margin: 0 0 8px; color: #333; }}
.error {{ background: #fee; border: 1px solid #c00; color: #c00; padding: 10px; border-radius: 4px; margin: 16px 0; font-size: 14px; }}
.hint {{ color: #666; font-size: 14px; margin: 0; }}
</style>
</head>
<body>
<div class="card">
<h1>{title}</h1>
<div class="error">{message}</div>
<p class="hint">Return to your application and start the connection again.</p>
</div>
</body>
</html>"#,
        title = html_escape(title),
        message = html_escape(message),
    )
}

/// Render an `OAuthError` as an HTML page with the error's status code.
pub fn error_response(err: &OAuthError) -> Response {
    let title = match err.status() {
        StatusCode::INTERNAL_SERVER_ERROR => "Sign-in failed",
        _ => "Authorization request rejected",
    };
    (err.status(), Html(render_error_page(title, &err.description()))).into_response()
}

/// Escape HTML special characters.
fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#x27;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::UpstreamError;

    #[test]
    fn test_html_escape() {
        assert_eq!(
            html_escape(r#"<script>alert("xss")</script>"#),
            "&lt;script&gt;alert(&quot;xss&quot;)&lt;/script&gt;"
        );
    }

    #[test]
    fn test_render_escapes_message() {
        let html = render_error_page("Oops", "<img src=x onerror=alert(1)>");
        assert!(html.contains("Oops"));
        assert!(html.contains("&lt;img"));
        assert!(!html.contains("<img"));
    }

    #[test]
    fn test_error_response_status() {
        let response = error_response(&OAuthError::invalid_request("unknown client_id"));
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = error_response(&OAuthError::from(UpstreamError::InvalidResponse(
            "missing access_token".into(),
        )));
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
