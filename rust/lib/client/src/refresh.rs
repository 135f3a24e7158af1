//! Access-token refresh, deduplicated across concurrent callers.

use std::sync::Arc;

use reqwest::header::COOKIE;
use reqwest::Url;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::claims::is_token_expired;
use crate::config::ClientConfig;
use crate::context::SessionContext;
use crate::cookies::CSRF_HEADER;
use crate::error::ApiError;
use crate::single_flight::SingleFlight;

/// Body of a successful login or refresh.
#[derive(Debug, Deserialize)]
pub(crate) struct TokenResponse {
    #[serde(default)]
    pub tkn_acc: Option<String>,
}

impl TokenResponse {
    pub(crate) fn into_token(self) -> Result<String, ApiError> {
        self.tkn_acc
            .filter(|t| !t.is_empty())
            .ok_or_else(|| ApiError::Decode("response carried no access token".into()))
    }
}

#[derive(Debug, Clone)]
enum Trigger {
    /// Refresh only if the stored token is absent or expired.
    Validate,
    /// The server rejected this token; refresh unless it was already replaced.
    Rejected(Option<String>),
}

struct Inner {
    http: reqwest::Client,
    refresh_url: Url,
    session: SessionContext,
}

/// Keeps at most one refresh request in flight.
///
/// Every refresh outcome is a plain `bool`; failures are logged, and the
/// session is expired, never propagated.
pub struct RefreshCoordinator {
    inner: Arc<Inner>,
    flight: SingleFlight<bool>,
}

impl RefreshCoordinator {
    pub fn new(
        http: reqwest::Client,
        config: &ClientConfig,
        session: SessionContext,
    ) -> Result<Self, ApiError> {
        let refresh_url = Url::parse(&config.refresh_url())
            .map_err(|e| ApiError::InvalidUrl(format!("refresh url: {e}")))?;
        Ok(Self {
            inner: Arc::new(Inner {
                http,
                refresh_url,
                session,
            }),
            flight: SingleFlight::new(),
        })
    }

    /// Make sure a usable token is stored, refreshing it if it is missing or
    /// expired. Returns `true` when a usable token is stored afterwards.
    pub async fn ensure_valid_token(&self) -> bool {
        self.fly(Trigger::Validate).await
    }

    /// Called after the server answered 401 to a request that carried
    /// `rejected`.
    ///
    /// Joins a pending refresh if there is one. Otherwise returns `true`
    /// without a network call when the store already holds a different,
    /// unexpired token, and refreshes in every other case.
    pub async fn recover_rejected(&self, rejected: Option<&str>) -> bool {
        self.fly(Trigger::Rejected(rejected.map(str::to_string))).await
    }

    /// Whether a refresh request is pending.
    pub fn in_flight(&self) -> bool {
        self.flight.in_flight()
    }

    async fn fly(&self, trigger: Trigger) -> bool {
        let inner = Arc::clone(&self.inner);
        self.flight.run(move || inner.refresh_if_needed(trigger)).await
    }
}

impl Inner {
    async fn refresh_if_needed(self: Arc<Self>, trigger: Trigger) -> bool {
        let current = match self.session.access_token() {
            Ok(token) => token,
            Err(e) => {
                warn!("refresh failed: cannot read stored token: {}", e);
                self.session.expire();
                return false;
            }
        };

        let usable = !is_token_expired(current.as_deref());
        let needed = match &trigger {
            Trigger::Validate => !usable,
            Trigger::Rejected(rejected) => !usable || current.as_deref() == rejected.as_deref(),
        };
        if !needed {
            debug!("stored token still usable, no refresh needed");
            return true;
        }

        let stored = match self.request_refresh().await {
            Ok(token) => self.session.store().set_access_token(&token),
            Err(e) => Err(e),
        };
        match stored {
            Ok(()) => {
                info!("access token refreshed");
                true
            }
            Err(e) => {
                warn!("refresh failed: {}", e);
                self.session.expire();
                false
            }
        }
    }

    async fn request_refresh(&self) -> Result<String, ApiError> {
        let cookies = self.session.cookies();
        let mut req = self.http.post(self.refresh_url.clone());
        if let Some(cookie) = cookies.header_for(&self.refresh_url) {
            req = req.header(COOKIE, cookie);
        }
        if let Some(csrf) = cookies.csrf_token() {
            req = req.header(CSRF_HEADER, csrf);
        }

        let resp = req.send().await?;
        cookies.absorb(resp.headers(), &self.refresh_url);
        self.session.persist_cookies();

        if !resp.status().is_success() {
            return Err(ApiError::from_response(resp, "unknown error when refreshing session").await);
        }
        let body: TokenResponse = resp
            .json()
            .await
            .map_err(|e| ApiError::Decode(format!("refresh response: {e}")))?;
        body.into_token()
    }
}
