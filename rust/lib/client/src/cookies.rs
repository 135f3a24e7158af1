//! Auth-service cookies: the refresh credential and its CSRF companion.

use std::sync::{Arc, PoisonError, RwLock};

use reqwest::cookie::{CookieStore, Jar};
use reqwest::header::{HeaderMap, HeaderValue, SET_COOKIE};
use reqwest::Url;

use crate::error::ApiError;

/// Cookie carrying the anti-forgery value for the refresh endpoint.
pub const CSRF_REFRESH_COOKIE: &str = "csrf_refresh_token";
/// Header the refresh endpoint expects the CSRF value in.
pub const CSRF_HEADER: &str = "X-CSRF-TOKEN";

/// Cookie jar scoped to the refresh endpoint.
///
/// The jar is swapped out wholesale on [`clear`](Self::clear) since
/// `reqwest`'s jar has no removal API.
pub struct SessionCookies {
    jar: RwLock<Arc<Jar>>,
    scope: Url,
}

impl SessionCookies {
    /// `refresh_url` is where snapshots are taken from and restored to.
    pub fn new(refresh_url: &str) -> Result<Self, ApiError> {
        let scope = Url::parse(refresh_url)
            .map_err(|e| ApiError::InvalidUrl(format!("{refresh_url:?}: {e}")))?;
        Ok(Self {
            jar: RwLock::new(Arc::new(Jar::default())),
            scope,
        })
    }

    fn jar(&self) -> Arc<Jar> {
        self.jar.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Seed the jar from a header previously returned by [`snapshot`](Self::snapshot).
    pub fn restore(&self, header: &str) {
        let jar = self.jar();
        for pair in header.split(';').map(str::trim).filter(|p| p.contains('=')) {
            jar.add_cookie_str(pair, &self.scope);
        }
    }

    /// Take every `Set-Cookie` from a response to `url`.
    pub fn absorb(&self, headers: &HeaderMap, url: &Url) {
        let mut set_cookies = headers.get_all(SET_COOKIE).iter().peekable();
        if set_cookies.peek().is_none() {
            return;
        }
        self.jar().set_cookies(&mut set_cookies, url);
    }

    /// `Cookie` header for a request to `url`.
    pub fn header_for(&self, url: &Url) -> Option<HeaderValue> {
        self.jar().cookies(url)
    }

    /// Cookies the refresh endpoint would receive, as one header string.
    pub fn snapshot(&self) -> Option<String> {
        self.header_for(&self.scope)
            .and_then(|v| v.to_str().ok().map(str::to_string))
    }

    /// Value of a single cookie visible to the refresh endpoint.
    pub fn get(&self, name: &str) -> Option<String> {
        let header = self.snapshot()?;
        header.split(';').find_map(|pair| {
            let (k, v) = pair.trim().split_once('=')?;
            (k == name && !v.is_empty()).then(|| v.to_string())
        })
    }

    pub fn csrf_token(&self) -> Option<String> {
        self.get(CSRF_REFRESH_COOKIE)
    }

    pub fn clear(&self) {
        *self.jar.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(Jar::default());
    }
}
