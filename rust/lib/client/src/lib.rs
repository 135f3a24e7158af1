//! LabTrack HTTP client.
//!
//! Talks to the LabTrack auth and system services with a bearer token,
//! refreshes that token once per expiry no matter how many requests notice
//! it, and exposes the signed-in session as a watchable state.
//!
//! # Usage
//!
//! ```ignore
//! use labtrack_client::{ApiClient, ClientConfig, InventoryApi, MemoryTokenStore, SessionManager};
//!
//! let api = ApiClient::new(ClientConfig::single("http://localhost:5000"), Arc::new(MemoryTokenStore::new()))?;
//! let session = SessionManager::new(api.clone());
//! session.login("ana", "secret").await?;
//! let labs = InventoryApi::new(api).labs().list().await?;
//! ```

mod claims;
mod config;
mod context;
mod cookies;
mod error;
mod http;
mod model;
mod refresh;
mod resource;
mod session;
mod single_flight;
mod store;

pub use claims::{decode_claims, is_token_expired, is_token_expired_at, Claims};
pub use config::{ClientConfig, Service, AUTH_URL_ENV, SYSTEM_URL_ENV};
pub use context::{AuthState, SessionContext};
pub use cookies::{SessionCookies, CSRF_HEADER, CSRF_REFRESH_COOKIE};
pub use error::ApiError;
pub use http::{ApiClient, ApiRequest};
pub use model::{
    Accessory, Account, AccountSettings, Computer, Envelope, Lab, Part, PartStatus,
    PartStatusUpdate, PartStatuses, Report, ReportKind, User,
};
pub use refresh::RefreshCoordinator;
pub use resource::{InventoryApi, Resource, ResourceClient};
pub use session::{SessionManager, SignIn};
pub use single_flight::SingleFlight;
pub use store::{FileTokenStore, MemoryTokenStore, StoredSession, TokenStore};
