//! Login, logout and start-up session restoration.

use std::sync::{PoisonError, RwLock};

use serde_json::{json, Value};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::claims::{decode_claims, Claims};
use crate::config::Service;
use crate::context::{AuthState, SessionContext};
use crate::error::ApiError;
use crate::http::{ApiClient, ApiRequest};
use crate::model::{Account, AccountSettings, Envelope};
use crate::refresh::TokenResponse;

/// Outcome of a successful sign-in (login or restored session).
///
/// The session is authenticated even when loading the account failed;
/// `account_error` reports that failure.
#[derive(Debug)]
pub struct SignIn {
    pub claims: Claims,
    pub account_error: Option<ApiError>,
}

/// Owns the authentication state and the signed-in account.
pub struct SessionManager {
    api: ApiClient,
    account: RwLock<Option<Account>>,
    settings: RwLock<Option<AccountSettings>>,
}

impl SessionManager {
    pub fn new(api: ApiClient) -> Self {
        Self {
            api,
            account: RwLock::new(None),
            settings: RwLock::new(None),
        }
    }

    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    fn session(&self) -> &SessionContext {
        self.api.session()
    }

    pub fn state(&self) -> AuthState {
        self.session().state()
    }

    pub fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.session().subscribe()
    }

    pub fn is_authenticated(&self) -> bool {
        self.state().is_authenticated()
    }

    /// Account loaded by the last sign-in, while the session lasts.
    pub fn account(&self) -> Option<Account> {
        if !self.is_authenticated() {
            return None;
        }
        self.account.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn settings(&self) -> Option<AccountSettings> {
        if !self.is_authenticated() {
            return None;
        }
        self.settings.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// True when the session ended on its own (failed refresh or unusable
    /// token) rather than through [`logout`](Self::logout).
    pub fn session_ended(&self) -> bool {
        self.session().store().session_ended().unwrap_or(false)
    }

    /// Restore a stored session at start-up.
    ///
    /// Returns `None` and leaves the manager `Unauthenticated` when no usable
    /// token can be obtained.
    pub async fn init(&self) -> Option<SignIn> {
        if !self.api.refresher().ensure_valid_token().await {
            debug!("no usable session to restore");
            self.session().expire();
            return None;
        }

        let claims = match self.session().access_token() {
            Ok(Some(token)) => decode_claims(&token),
            Ok(None) => Err(ApiError::Token("no access token stored".into())),
            Err(e) => Err(e),
        };
        match claims {
            Ok(claims) => Some(self.sign_in(claims).await),
            Err(e) => {
                warn!("stored session unusable: {}", e);
                self.session().expire();
                None
            }
        }
    }

    /// Exchange credentials for an access token.
    ///
    /// A 401 here means bad credentials, so no refresh is attempted.
    pub async fn login(&self, username: &str, password: &str) -> Result<SignIn, ApiError> {
        let req = ApiRequest::post(Service::Auth, "/auth/login")
            .body(json!({ "username": username, "password": password }))
            .fallback("unknown error when logging in")
            .without_recovery();
        let token = self.api.send_json::<TokenResponse>(&req).await?.into_token()?;
        let claims = decode_claims(&token)?;

        self.session().store().set_access_token(&token)?;
        info!("logged in as {}", claims.sub.as_deref().unwrap_or(username));
        Ok(self.sign_in(claims).await)
    }

    /// End the session on the server, then locally.
    ///
    /// A transport or server error keeps the local session. A 401 whose
    /// refresh also fails ends it, as it would for any other request.
    pub async fn logout(&self) -> Result<(), ApiError> {
        let req = ApiRequest::post(Service::Auth, "/auth/logout")
            .fallback("unknown error when logging out");
        self.api.send_empty(&req).await?;

        self.session().clear();
        self.forget_account();
        info!("logged out");
        Ok(())
    }

    async fn sign_in(&self, claims: Claims) -> SignIn {
        if let Err(e) = self.session().store().set_session_ended(false) {
            warn!("could not reset session-ended marker: {}", e);
        }
        self.forget_account();
        self.session().set_state(AuthState::Authenticated(claims.clone()));

        let account_error = self.fetch_account_data().await.err();
        if let Some(e) = &account_error {
            warn!("signed in, but loading the account failed: {}", e);
        }
        SignIn { claims, account_error }
    }

    fn forget_account(&self) {
        *self.account.write().unwrap_or_else(PoisonError::into_inner) = None;
        *self.settings.write().unwrap_or_else(PoisonError::into_inner) = None;
    }

    /// Load the account, then its settings.
    pub async fn fetch_account_data(&self) -> Result<(), ApiError> {
        self.fetch_account().await?;
        self.fetch_account_settings().await?;
        Ok(())
    }

    pub async fn fetch_account(&self) -> Result<Account, ApiError> {
        let req = ApiRequest::get(Service::System, "/accounts/me")
            .fallback("unknown error when fetching account");
        let env: Envelope<Vec<Account>> = self.api.send_json(&req).await?;
        let account = env
            .data
            .into_iter()
            .next()
            .ok_or_else(|| ApiError::Decode("account response was empty".into()))?;
        *self.account.write().unwrap_or_else(PoisonError::into_inner) = Some(account.clone());
        Ok(account)
    }

    pub async fn fetch_account_settings(&self) -> Result<AccountSettings, ApiError> {
        let req = ApiRequest::get(Service::System, "/account_settings/")
            .fallback("unknown error when fetching account settings");
        let env: Envelope<AccountSettings> = self.api.send_json(&req).await?;
        *self.settings.write().unwrap_or_else(PoisonError::into_inner) = Some(env.data.clone());
        Ok(env.data)
    }

    /// Update account fields on the auth service.
    pub async fn edit_account(&self, data: &Account) -> Result<(), ApiError> {
        let req = ApiRequest::put(Service::Auth, "/accounts/")
            .body(json!({ "data": data }))
            .fallback("unknown error when editing account");
        self.api.send_empty(&req).await
    }

    /// Save settings, then reload them from the server.
    pub async fn edit_account_settings(
        &self,
        data: &AccountSettings,
    ) -> Result<AccountSettings, ApiError> {
        let req = ApiRequest::put(Service::System, "/account_settings")
            .body(Value::Object(data.0.clone()))
            .fallback("unknown error when editing account settings");
        self.api.send_empty(&req).await?;
        self.fetch_account_settings().await
    }

    /// Whether the loaded account's access level is one of `levels`.
    pub fn has_access(&self, levels: &[u8]) -> bool {
        self.account()
            .and_then(|a| a.access_level)
            .is_some_and(|level| levels.contains(&level))
    }
}
