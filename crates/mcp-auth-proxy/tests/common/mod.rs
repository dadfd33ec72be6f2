//! Shared helpers for the HTTP-level OAuth tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::http::{Request, Response, StatusCode, header};
use chrono::Utc;
use serde_json::json;
use tower::ServiceExt;

use mcp_auth_proxy::config::Config;
use mcp_auth_proxy::error::{UpstreamError, UpstreamResult};
use mcp_auth_proxy::server::ProxyServer;
use mcp_auth_proxy::server::oauth::pkce::challenge_s256;
use mcp_auth_proxy::server::oauth::{OAuthStore, UpstreamProvider, UpstreamToken};

pub const CLIENT_REDIRECT: &str = "https://client.example/cb";
pub const VERIFIER: &str = "dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk";

/// How the stub provider answers a code exchange.
#[derive(Debug, Clone, Copy)]
pub enum StubMode {
    Succeed,
    Fail,
    Hang,
}

/// In-process stand-in for the upstream identity provider.
#[derive(Debug)]
pub struct StubUpstream {
    mode: StubMode,
    exchanges: AtomicUsize,
}

impl StubUpstream {
    pub fn new(mode: StubMode) -> Self {
        Self { mode, exchanges: AtomicUsize::new(0) }
    }

    pub fn exchanges(&self) -> usize {
        self.exchanges.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl UpstreamProvider for StubUpstream {
    fn authorization_url(&self, state: &str) -> String {
        format!("https://idp.example/authorize?client_id=proxy-client&state={state}")
    }

    async fn exchange_code(&self, code: &str) -> UpstreamResult<UpstreamToken> {
        self.exchanges.fetch_add(1, Ordering::SeqCst);
        match self.mode {
            StubMode::Succeed => Ok(UpstreamToken {
                access_token: format!("upstream-{code}"),
                refresh_token: Some("upstream-refresh".to_string()),
                token_type: "Bearer".to_string(),
                expires_at: None,
                scope: Some("catalog.read".to_string()),
                obtained_at: Utc::now(),
            }),
            StubMode::Fail => Err(UpstreamError::provider(400, "invalid_grant", None)),
            StubMode::Hang => std::future::pending().await,
        }
    }
}

pub struct TestApp {
    pub router: Router,
    pub store: OAuthStore,
    pub upstream: Arc<StubUpstream>,
}

pub fn test_app(mode: StubMode) -> TestApp {
    let upstream = Arc::new(StubUpstream::new(mode));
    let server = ProxyServer::with_upstream(Config::for_testing("https://idp.example"), upstream.clone());
    TestApp { router: server.router(), store: server.store().clone(), upstream }
}

pub struct Client {
    pub id: String,
    pub secret: String,
}

pub struct Tokens {
    pub access_token: String,
    pub refresh_token: String,
}

impl TestApp {
    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.router.clone().oneshot(request).await.unwrap()
    }

    pub async fn get(&self, uri: &str) -> Response<Body> {
        self.send(Request::get(uri).body(Body::empty()).unwrap()).await
    }

    pub async fn register(&self) -> Client {
        let response = self
            .send(
                Request::post("/register")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(
                        json!({ "client_name": "Test Client", "redirect_uris": [CLIENT_REDIRECT] })
                            .to_string(),
                    ))
                    .unwrap(),
            )
            .await;
        assert_eq!(response.status(), StatusCode::CREATED);

        let body = json_body(response).await;
        Client {
            id: body["client_id"].as_str().unwrap().to_string(),
            secret: body["client_secret"].as_str().unwrap().to_string(),
        }
    }

    /// Run `/authorize` and return the opaque state sent to the provider.
    pub async fn authorize(&self, client: &Client, client_state: &str) -> String {
        let response = self.get(&authorize_uri(&client.id, CLIENT_REDIRECT, client_state)).await;
        assert_eq!(response.status(), StatusCode::FOUND);

        let location = location(&response);
        assert_eq!(location.host_str(), Some("idp.example"));
        query_param(&location, "state").expect("provider redirect carries state")
    }

    pub async fn callback(&self, upstream_state: &str) -> Response<Body> {
        self.get(&format!("/oauth/callback?code=provider-code&state={upstream_state}")).await
    }

    /// Authorize and complete the callback, returning the local code.
    pub async fn obtain_code(&self, client: &Client) -> String {
        let upstream_state = self.authorize(client, "xyz").await;
        let response = self.callback(&upstream_state).await;
        assert_eq!(response.status(), StatusCode::FOUND);

        let location = location(&response);
        assert_eq!(query_param(&location, "state").as_deref(), Some("xyz"));
        query_param(&location, "code").expect("client redirect carries code")
    }

    pub async fn token(&self, form: &[(&str, &str)]) -> Response<Body> {
        self.send(
            Request::post("/token")
                .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(Body::from(serde_urlencoded::to_string(form).unwrap()))
                .unwrap(),
        )
        .await
    }

    pub async fn exchange_code(&self, client: &Client, code: &str) -> Response<Body> {
        self.token(&[
            ("grant_type", "authorization_code"),
            ("client_id", client.id.as_str()),
            ("client_secret", client.secret.as_str()),
            ("code", code),
            ("code_verifier", VERIFIER),
            ("redirect_uri", CLIENT_REDIRECT),
        ])
        .await
    }

    pub async fn refresh(&self, client: &Client, refresh_token: &str) -> Response<Body> {
        self.token(&[
            ("grant_type", "refresh_token"),
            ("client_id", client.id.as_str()),
            ("client_secret", client.secret.as_str()),
            ("refresh_token", refresh_token),
        ])
        .await
    }

    /// Full flow up to a fresh token pair for `client`.
    pub async fn obtain_tokens(&self, client: &Client) -> Tokens {
        let code = self.obtain_code(client).await;
        let response = self.exchange_code(client, &code).await;
        assert_eq!(response.status(), StatusCode::OK);
        tokens(response).await
    }

    pub async fn mcp(&self, bearer: Option<&str>) -> Response<Body> {
        let mut request = Request::get("/mcp");
        if let Some(token) = bearer {
            request = request.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        self.send(request.body(Body::empty()).unwrap()).await
    }
}

pub fn authorize_uri(client_id: &str, redirect_uri: &str, client_state: &str) -> String {
    let query = serde_urlencoded::to_string([
        ("client_id", client_id),
        ("redirect_uri", redirect_uri),
        ("response_type", "code"),
        ("state", client_state),
        ("code_challenge", challenge_s256(VERIFIER).as_str()),
        ("code_challenge_method", "S256"),
    ])
    .unwrap();
    format!("/authorize?{query}")
}

pub async fn json_body(response: Response<Body>) -> serde_json::Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&body).unwrap()
}

pub async fn text_body(response: Response<Body>) -> String {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(body.to_vec()).unwrap()
}

pub async fn tokens(response: Response<Body>) -> Tokens {
    let body = json_body(response).await;
    Tokens {
        access_token: body["access_token"].as_str().unwrap().to_string(),
        refresh_token: body["refresh_token"].as_str().unwrap().to_string(),
    }
}

pub fn location(response: &Response<Body>) -> url::Url {
    let value = response.headers()[header::LOCATION].to_str().unwrap();
    url::Url::parse(value).unwrap()
}

pub fn query_param(url: &url::Url, key: &str) -> Option<String> {
    url.query_pairs().find(|(k, _)| k == key).map(|(_, v)| v.into_owned())
}
