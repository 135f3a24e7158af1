//! Context management commands.

use std::path::Path;

use anyhow::Result;

use crate::config::{session_path, CliConfig, Context};

/// Register a deployment. The first context added becomes current.
pub fn add(name: &str, auth: &str, system: Option<&str>, config_path: &Path) -> Result<()> {
    if auth.trim().is_empty() {
        anyhow::bail!("--auth cannot be empty.");
    }

    let mut config = CliConfig::load(config_path)?;
    config.upsert_context(Context {
        name: name.to_string(),
        auth: auth.trim_end_matches('/').to_string(),
        system: system.unwrap_or_default().trim_end_matches('/').to_string(),
    });
    if config.current_context.is_empty() {
        config.current_context = name.to_string();
    }
    config.save(config_path)?;

    println!("Context \"{}\" saved.", name);
    Ok(())
}

pub fn list(config_path: &Path) -> Result<()> {
    let config = CliConfig::load(config_path)?;

    if config.contexts.is_empty() {
        println!("No contexts configured.");
        println!("Run: labtrack context add <name> --auth <url>");
        return Ok(());
    }

    println!("{:2} {:20} {:36} {:36}", "", "NAME", "AUTH", "SYSTEM");
    for ctx in &config.contexts {
        let marker = if ctx.name == config.current_context { "*" } else { " " };
        let system = if ctx.system.is_empty() { "-" } else { &ctx.system };
        println!("{:2} {:20} {:36} {:36}", marker, ctx.name, ctx.auth, system);
    }
    Ok(())
}

pub fn use_context(name: &str, config_path: &Path) -> Result<()> {
    let mut config = CliConfig::load(config_path)?;

    if config.get(name).is_none() {
        anyhow::bail!(
            "Context \"{}\" not found. Run `labtrack context list` to see available contexts.",
            name
        );
    }

    config.current_context = name.to_string();
    config.save(config_path)?;
    println!("Switched to context \"{}\".", name);
    Ok(())
}

/// Delete a context and its saved session.
pub fn delete(name: &str, config_path: &Path) -> Result<()> {
    let mut config = CliConfig::load(config_path)?;

    if !config.remove_context(name) {
        anyhow::bail!("Context \"{}\" not found.", name);
    }
    config.save(config_path)?;

    let session = session_path(config_path, name);
    if session.exists() {
        std::fs::remove_file(&session)?;
    }

    println!("Context \"{}\" deleted.", name);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_use_delete() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        add("main", "http://localhost:5000/", None, &path).unwrap();
        add("annex", "http://annex:5000", Some("http://annex:5001"), &path).unwrap();

        let config = CliConfig::load(&path).unwrap();
        assert_eq!(config.current_context, "main");
        assert_eq!(config.get("main").unwrap().auth, "http://localhost:5000");

        use_context("annex", &path).unwrap();
        assert!(use_context("missing", &path).is_err());
        assert_eq!(CliConfig::load(&path).unwrap().current_context, "annex");

        let session = session_path(&path, "annex");
        std::fs::create_dir_all(session.parent().unwrap()).unwrap();
        std::fs::write(&session, "access_token = \"t\"\n").unwrap();

        delete("annex", &path).unwrap();
        assert!(!session.exists());
        let config = CliConfig::load(&path).unwrap();
        assert!(config.current_context.is_empty());
        assert_eq!(config.contexts.len(), 1);
        assert!(delete("annex", &path).is_err());
    }

    #[test]
    fn add_requires_auth_url() {
        let dir = tempfile::tempdir().unwrap();
        assert!(add("x", " ", None, &dir.path().join("config.toml")).is_err());
    }
}
