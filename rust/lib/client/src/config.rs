/// Environment variable holding the auth service base URL.
pub const AUTH_URL_ENV: &str = "LABTRACK_AUTH_URL";
/// Environment variable holding the system (inventory) service base URL.
pub const SYSTEM_URL_ENV: &str = "LABTRACK_SYSTEM_URL";

/// Which backend a request goes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Service {
    /// Session creation, refresh, logout and account edits.
    Auth,
    /// Accounts, settings and inventory CRUD.
    System,
}

/// Endpoints of the two LabTrack services.
///
/// Both URLs are stored without a trailing slash; request paths are appended
/// verbatim (`{system_url}/labs`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    auth_url: String,
    system_url: String,
}

impl ClientConfig {
    pub fn new(auth_url: impl Into<String>, system_url: impl Into<String>) -> Self {
        Self {
            auth_url: normalize(auth_url.into()),
            system_url: normalize(system_url.into()),
        }
    }

    /// Both services behind one base URL.
    pub fn single(base_url: impl Into<String>) -> Self {
        let base = base_url.into();
        Self::new(base.clone(), base)
    }

    /// Read `LABTRACK_AUTH_URL` and `LABTRACK_SYSTEM_URL`.
    ///
    /// The system URL defaults to the auth URL. Returns `None` when no auth
    /// URL is set.
    pub fn from_env() -> Option<Self> {
        let auth = std::env::var(AUTH_URL_ENV).ok().filter(|s| !s.is_empty())?;
        let system = std::env::var(SYSTEM_URL_ENV)
            .ok()
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| auth.clone());
        Some(Self::new(auth, system))
    }

    #[must_use]
    pub fn with_auth_url(mut self, url: impl Into<String>) -> Self {
        self.auth_url = normalize(url.into());
        self
    }

    #[must_use]
    pub fn with_system_url(mut self, url: impl Into<String>) -> Self {
        self.system_url = normalize(url.into());
        self
    }

    pub fn auth_url(&self) -> &str {
        &self.auth_url
    }

    pub fn system_url(&self) -> &str {
        &self.system_url
    }

    pub fn base_url(&self, service: Service) -> &str {
        match service {
            Service::Auth => &self.auth_url,
            Service::System => &self.system_url,
        }
    }

    /// Absolute URL for `path` on `service`.
    pub fn url(&self, service: Service, path: &str) -> String {
        format!("{}{}", self.base_url(service), path)
    }

    /// The refresh endpoint. Refresh cookies are scoped to it.
    pub fn refresh_url(&self) -> String {
        self.url(Service::Auth, "/auth/refresh")
    }
}

fn normalize(url: String) -> String {
    url.trim().trim_end_matches('/').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trailing_slashes_are_dropped() {
        let config = ClientConfig::new("http://auth.local:5000/", "http://sys.local:5001//");
        assert_eq!(config.auth_url(), "http://auth.local:5000");
        assert_eq!(config.system_url(), "http://sys.local:5001");
        assert_eq!(config.url(Service::System, "/labs"), "http://sys.local:5001/labs");
        assert_eq!(config.refresh_url(), "http://auth.local:5000/auth/refresh");
    }

    #[test]
    fn single_base_serves_both() {
        let config = ClientConfig::single("http://127.0.0.1:5000");
        assert_eq!(config.base_url(Service::Auth), config.base_url(Service::System));
    }

    #[test]
    fn overrides() {
        let config = ClientConfig::single("http://a")
            .with_system_url("http://b/")
            .with_auth_url("http://c");
        assert_eq!(config.auth_url(), "http://c");
        assert_eq!(config.system_url(), "http://b");
    }
}
