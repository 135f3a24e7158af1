//! Account and settings commands.

use std::path::Path;

use anyhow::Result;
use labtrack_client::{Account, AccountSettings};
use serde_json::Value;

use super::connect_authenticated;

/// Parse a JSON object, rejecting anything else.
fn parse_object(json_body: &str) -> Result<serde_json::Map<String, Value>> {
    match serde_json::from_str::<Value>(json_body).map_err(|e| anyhow::anyhow!("Invalid JSON: {}", e))? {
        Value::Object(map) if !map.is_empty() => Ok(map),
        Value::Object(_) => anyhow::bail!("Nothing to update."),
        _ => anyhow::bail!("Expected a JSON object."),
    }
}

pub async fn settings_get(json_output: bool, config_path: &Path) -> Result<()> {
    let conn = connect_authenticated(config_path).await?;
    let settings = conn.session.fetch_account_settings().await?;
    print_settings(&settings, json_output)
}

pub async fn settings_set(json_body: &str, json_output: bool, config_path: &Path) -> Result<()> {
    let fields = AccountSettings(parse_object(json_body)?);
    let conn = connect_authenticated(config_path).await?;
    let saved = conn.session.edit_account_settings(&fields).await?;
    println!("Settings updated.");
    print_settings(&saved, json_output)
}

/// Update fields of the signed-in account.
pub async fn edit(json_body: &str, config_path: &Path) -> Result<()> {
    let fields: Account = serde_json::from_value(Value::Object(parse_object(json_body)?))?;
    let conn = connect_authenticated(config_path).await?;
    conn.session.edit_account(&fields).await?;
    println!("Account updated.");
    Ok(())
}

fn print_settings(settings: &AccountSettings, json_output: bool) -> Result<()> {
    if json_output || settings.0.is_empty() {
        println!("{}", serde_json::to_string_pretty(settings)?);
        return Ok(());
    }
    let width = settings.0.keys().map(String::len).max().unwrap_or(0);
    for (key, value) in &settings.0 {
        let shown = match value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        println!("{:width$}  {}", key, shown, width = width);
    }
    Ok(())
}
