pub mod account;
pub mod context;
pub mod login;
pub mod resource;

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use labtrack_client::{ApiClient, ClientConfig, FileTokenStore, SessionManager};
use tracing::debug;

use crate::config::{session_path, CliConfig, Context};

/// The current context, wired to its persisted session.
pub struct Connection {
    pub ctx: Context,
    pub api: ApiClient,
    pub session: SessionManager,
}

/// Open the current context. `LABTRACK_AUTH_URL` / `LABTRACK_SYSTEM_URL`
/// override the context's URLs.
pub fn connect(config_path: &Path) -> Result<Connection> {
    let config = CliConfig::load(config_path)?;
    let ctx = config
        .current()
        .ok_or_else(|| {
            anyhow::anyhow!("No current context. Run `labtrack context add <name> --auth <url>`.")
        })?
        .clone();

    let client_config = ClientConfig::from_env().unwrap_or_else(|| ctx.client_config());
    let store = FileTokenStore::new(session_path(config_path, &ctx.name));
    debug!(
        "context {}: auth={} system={} session={}",
        ctx.name,
        client_config.auth_url(),
        client_config.system_url(),
        store.path().display()
    );

    let api = ApiClient::new(client_config, Arc::new(store))?;
    let session = SessionManager::new(api.clone());
    Ok(Connection { ctx, api, session })
}

/// [`connect`], then restore the session or fail with a hint to log in.
pub async fn connect_authenticated(config_path: &Path) -> Result<Connection> {
    let conn = connect(config_path)?;
    if conn.api.session().access_token()?.is_none() {
        anyhow::bail!("Not logged in to \"{}\". Run `labtrack login`.", conn.ctx.name);
    }
    if conn.session.init().await.is_none() {
        anyhow::bail!("Session expired. Run `labtrack login` again.");
    }
    Ok(conn)
}
