//! Shared session context: the token store, the auth cookies and the
//! published authentication state.
//!
//! One context is shared by the HTTP client, the refresh coordinator and the
//! session manager, so a session cleared anywhere is seen everywhere.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, warn};

use crate::claims::Claims;
use crate::cookies::SessionCookies;
use crate::error::ApiError;
use crate::store::TokenStore;

/// Authentication state of the client.
#[derive(Debug, Clone, PartialEq)]
pub enum AuthState {
    /// Start-up check not finished yet.
    Initializing,
    Authenticated(Claims),
    Unauthenticated,
}

impl AuthState {
    pub fn is_authenticated(&self) -> bool {
        matches!(self, AuthState::Authenticated(_))
    }

    pub fn claims(&self) -> Option<&Claims> {
        match self {
            AuthState::Authenticated(c) => Some(c),
            _ => None,
        }
    }
}

#[derive(Clone)]
pub struct SessionContext {
    store: Arc<dyn TokenStore>,
    cookies: Arc<SessionCookies>,
    state: Arc<watch::Sender<AuthState>>,
}

impl SessionContext {
    /// Cookies persisted in `store` are loaded into `cookies`.
    pub fn new(store: Arc<dyn TokenStore>, cookies: SessionCookies) -> Self {
        match store.cookies() {
            Ok(Some(saved)) => cookies.restore(&saved),
            Ok(None) => {}
            Err(e) => warn!("could not load saved cookies: {}", e),
        }
        let (tx, _) = watch::channel(AuthState::Initializing);
        Self {
            store,
            cookies: Arc::new(cookies),
            state: Arc::new(tx),
        }
    }

    pub fn store(&self) -> &Arc<dyn TokenStore> {
        &self.store
    }

    pub fn cookies(&self) -> &SessionCookies {
        &self.cookies
    }

    pub fn access_token(&self) -> Result<Option<String>, ApiError> {
        self.store.access_token()
    }

    pub fn state(&self) -> AuthState {
        self.state.borrow().clone()
    }

    /// Receive every state change.
    pub fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.state.subscribe()
    }

    pub(crate) fn set_state(&self, state: AuthState) {
        self.state.send_replace(state);
    }

    /// Write the cookie jar back to the store.
    pub(crate) fn persist_cookies(&self) {
        let snapshot = self.cookies.snapshot().unwrap_or_default();
        if let Err(e) = self.store.set_cookies(&snapshot) {
            warn!("could not persist cookies: {}", e);
        }
    }

    /// Explicit logout: drop everything, no "session ended" marker.
    pub fn clear(&self) {
        if let Err(e) = self.store.clear() {
            warn!("could not clear session store: {}", e);
        }
        self.cookies.clear();
        self.set_state(AuthState::Unauthenticated);
    }

    /// Forced logout (failed refresh, unusable token): drop everything and
    /// leave the "session ended" marker for the UI.
    pub fn expire(&self) {
        debug!("session expired");
        self.clear();
        if let Err(e) = self.store.set_session_ended(true) {
            warn!("could not mark session ended: {}", e);
        }
    }
}
