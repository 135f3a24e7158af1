//! Authenticated HTTP calls against the LabTrack services.

use std::borrow::Cow;
use std::sync::Arc;

use reqwest::header::COOKIE;
use reqwest::{Method, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use crate::config::{ClientConfig, Service};
use crate::context::SessionContext;
use crate::cookies::SessionCookies;
use crate::error::ApiError;
use crate::refresh::RefreshCoordinator;
use crate::store::TokenStore;

/// One logical request. It may be sent twice: once, and once more after a
/// successful refresh.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    method: Method,
    service: Service,
    path: String,
    query: Vec<(String, String)>,
    body: Option<Value>,
    fallback: Cow<'static, str>,
    recover_auth: bool,
}

impl ApiRequest {
    pub fn new(method: Method, service: Service, path: impl Into<String>) -> Self {
        Self {
            method,
            service,
            path: path.into(),
            query: Vec::new(),
            body: None,
            fallback: Cow::Borrowed("unknown error"),
            recover_auth: true,
        }
    }

    pub fn get(service: Service, path: impl Into<String>) -> Self {
        Self::new(Method::GET, service, path)
    }

    pub fn post(service: Service, path: impl Into<String>) -> Self {
        Self::new(Method::POST, service, path)
    }

    pub fn put(service: Service, path: impl Into<String>) -> Self {
        Self::new(Method::PUT, service, path)
    }

    pub fn delete(service: Service, path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, service, path)
    }

    /// JSON request body.
    #[must_use]
    pub fn body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    #[must_use]
    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    /// Message used when a failed response carries none of its own.
    #[must_use]
    pub fn fallback(mut self, message: impl Into<Cow<'static, str>>) -> Self {
        self.fallback = message.into();
        self
    }

    /// Don't refresh-and-retry on 401 (credential checks such as login).
    #[must_use]
    pub fn without_recovery(mut self) -> Self {
        self.recover_auth = false;
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }
}

struct ClientInner {
    http: reqwest::Client,
    config: ClientConfig,
    session: SessionContext,
    refresher: RefreshCoordinator,
}

/// HTTP client that attaches the bearer token to every request and recovers
/// once from a rejected token.
///
/// Cheap to clone; clones share the session and the refresh coordinator.
#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<ClientInner>,
}

impl ApiClient {
    pub fn new(config: ClientConfig, store: Arc<dyn TokenStore>) -> Result<Self, ApiError> {
        Self::with_http_client(config, store, reqwest::Client::new())
    }

    /// Use a custom HTTP client (for connection pool reuse or testing).
    ///
    /// The client must not carry its own cookie store; auth cookies are
    /// handled by the session.
    pub fn with_http_client(
        config: ClientConfig,
        store: Arc<dyn TokenStore>,
        http: reqwest::Client,
    ) -> Result<Self, ApiError> {
        let cookies = SessionCookies::new(&config.refresh_url())?;
        let session = SessionContext::new(store, cookies);
        let refresher = RefreshCoordinator::new(http.clone(), &config, session.clone())?;
        Ok(Self {
            inner: Arc::new(ClientInner {
                http,
                config,
                session,
                refresher,
            }),
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    pub fn session(&self) -> &SessionContext {
        &self.inner.session
    }

    pub fn refresher(&self) -> &RefreshCoordinator {
        &self.inner.refresher
    }

    /// Send `req`, returning the successful response.
    ///
    /// A 401 triggers one coordinated refresh and, if it succeeds, exactly
    /// one retry with the new token. Any other failure, and a 401 on the
    /// retry, is returned as an error.
    pub async fn execute(&self, req: &ApiRequest) -> Result<reqwest::Response, ApiError> {
        let url_str = self.inner.config.url(req.service, &req.path);
        let url = Url::parse(&url_str).map_err(|e| ApiError::InvalidUrl(format!("{url_str}: {e}")))?;

        let token = self.inner.session.access_token()?;
        let resp = self.send_once(req, &url, token.as_deref()).await?;
        if resp.status() != StatusCode::UNAUTHORIZED || !req.recover_auth {
            return Self::check(resp, &req.fallback).await;
        }

        debug!("{} {} rejected with 401, attempting refresh", req.method, req.path);
        if !self.inner.refresher.recover_rejected(token.as_deref()).await {
            return Err(ApiError::from_response(resp, &req.fallback).await);
        }

        let token = self.inner.session.access_token()?;
        let retry = self.send_once(req, &url, token.as_deref()).await?;
        Self::check(retry, &req.fallback).await
    }

    /// Send `req` and decode the JSON body.
    pub async fn send_json<R: DeserializeOwned>(&self, req: &ApiRequest) -> Result<R, ApiError> {
        let resp = self.execute(req).await?;
        resp.json::<R>()
            .await
            .map_err(|e| ApiError::Decode(format!("{} {}: {}", req.method, req.path, e)))
    }

    /// Send `req`, discarding any body.
    pub async fn send_empty(&self, req: &ApiRequest) -> Result<(), ApiError> {
        self.execute(req).await.map(|_| ())
    }

    /// GET a system-service path.
    pub async fn get(&self, path: &str) -> Result<Value, ApiError> {
        let req = ApiRequest::get(Service::System, path).fallback("API GET: Unknown error");
        self.send_json(&req).await
    }

    /// POST a JSON body to a system-service path.
    pub async fn post(&self, path: &str, body: Value) -> Result<Value, ApiError> {
        let req = ApiRequest::post(Service::System, path)
            .body(body)
            .fallback("API POST: Unknown error");
        self.send_json(&req).await
    }

    /// PUT a JSON body to a system-service path.
    pub async fn put(&self, path: &str, body: Value) -> Result<Value, ApiError> {
        let req = ApiRequest::put(Service::System, path)
            .body(body)
            .fallback("API PUT: Unknown error");
        self.send_json(&req).await
    }

    /// DELETE a system-service path.
    pub async fn delete(&self, path: &str) -> Result<Value, ApiError> {
        let req = ApiRequest::delete(Service::System, path).fallback("API DELETE: Unknown error");
        let resp = self.execute(&req).await?;
        let text = resp.text().await?;
        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&text).map_err(|e| ApiError::Decode(format!("DELETE {path}: {e}")))
    }

    async fn send_once(
        &self,
        req: &ApiRequest,
        url: &Url,
        token: Option<&str>,
    ) -> Result<reqwest::Response, ApiError> {
        let mut builder = self.inner.http.request(req.method.clone(), url.clone());
        if !req.query.is_empty() {
            builder = builder.query(&req.query);
        }
        if let Some(body) = &req.body {
            builder = builder.json(body);
        }
        if let Some(token) = token {
            builder = builder.bearer_auth(token);
        }

        let cookies = self.inner.session.cookies();
        if req.service == Service::Auth {
            if let Some(cookie) = cookies.header_for(url) {
                builder = builder.header(COOKIE, cookie);
            }
        }

        let resp = builder.send().await?;
        if req.service == Service::Auth {
            cookies.absorb(resp.headers(), url);
            self.inner.session.persist_cookies();
        }
        Ok(resp)
    }

    async fn check(resp: reqwest::Response, fallback: &str) -> Result<reqwest::Response, ApiError> {
        if resp.status().is_success() {
            Ok(resp)
        } else {
            Err(ApiError::from_response(resp, fallback).await)
        }
    }
}
