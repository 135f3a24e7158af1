//! Login / logout / whoami / status commands.

use std::path::Path;

use anyhow::Result;
use labtrack_client::decode_claims;

use super::{connect, connect_authenticated};

pub async fn login(username: &str, password: &str, config_path: &Path) -> Result<()> {
    let conn = connect(config_path)?;

    let sign_in = conn
        .session
        .login(username, password)
        .await
        .map_err(|e| anyhow::anyhow!("Login failed: {}", e.message()))?;

    println!("Logged in as {}.", sign_in.claims.sub.as_deref().unwrap_or(username));
    println!("Session saved for context \"{}\".", conn.ctx.name);
    if let Some(e) = sign_in.account_error {
        eprintln!("warning: could not load account: {}", e.message());
    }
    Ok(())
}

pub async fn logout(config_path: &Path) -> Result<()> {
    let conn = connect(config_path)?;
    if conn.api.session().access_token()?.is_none() {
        println!("Not logged in to \"{}\".", conn.ctx.name);
        return Ok(());
    }

    conn.session
        .logout()
        .await
        .map_err(|e| anyhow::anyhow!("Logout failed: {}", e.message()))?;
    println!("Logged out from context \"{}\".", conn.ctx.name);
    Ok(())
}

pub async fn whoami(json_output: bool, config_path: &Path) -> Result<()> {
    let conn = connect_authenticated(config_path).await?;
    // Restoring the session already loaded the account unless that failed.
    let account = match conn.session.account() {
        Some(account) => account,
        None => conn.session.fetch_account().await?,
    };

    if json_output {
        println!("{}", serde_json::to_string_pretty(&account)?);
        return Ok(());
    }
    println!("Username:  {}", account.username.as_deref().unwrap_or("-"));
    println!("Email:     {}", account.email.as_deref().unwrap_or("-"));
    match account.access_level {
        Some(level) => println!("Access:    {}{}", level, if account.is_admin() { " (admin)" } else { "" }),
        None => println!("Access:    -"),
    }
    Ok(())
}

/// Show the current context and its session, without touching the network.
pub fn status(config_path: &Path) -> Result<()> {
    let conn = connect(config_path)?;
    let config = conn.api.config();

    println!("Context:   {}", conn.ctx.name);
    println!("Auth:      {}", config.auth_url());
    println!("System:    {}", config.system_url());

    let store = conn.api.session().store();
    let token = store.access_token()?;
    let line = match token.as_deref().map(decode_claims) {
        None if store.session_ended()? => "expired (run `labtrack login`)".to_string(),
        None => "not logged in".to_string(),
        Some(Err(_)) => "unreadable token (run `labtrack login`)".to_string(),
        Some(Ok(claims)) if claims.is_expired() => {
            "token expired, will refresh on next request".to_string()
        }
        Some(Ok(claims)) => format!(
            "{} (token valid for {}s)",
            claims.sub.as_deref().unwrap_or("logged in"),
            claims.remaining_secs()
        ),
    };
    println!("Session:   {}", line);
    Ok(())
}
