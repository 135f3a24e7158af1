//! `labtrack`, the LabTrack CLI client.
//!
//! Manages contexts, the login session and inventory records.
//! Think of it as `kubectl` for a school's computer labs.

mod commands;
mod config;

use std::io::Write;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

/// LabTrack CLI tool.
#[derive(Parser, Debug)]
#[command(name = "labtrack", about = "LabTrack CLI client")]
struct Cli {
    /// Path to client config file (default: ~/.labtrack/config.toml).
    #[arg(long = "config", global = true)]
    config: Option<String>,

    /// Output format: table or json.
    #[arg(long = "output", short = 'o', global = true, default_value = "table")]
    output: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Manage contexts (LabTrack deployments).
    Context {
        #[command(subcommand)]
        action: ContextAction,
    },

    /// Login to the current context.
    Login {
        /// Username.
        #[arg(long)]
        user: Option<String>,
        /// Password (not recommended, prefer the interactive prompt).
        #[arg(long)]
        password: Option<String>,
    },

    /// End the session on the server and forget it locally.
    Logout,

    /// Show the signed-in account.
    Whoami,

    /// Show the current context and session.
    Status,

    /// Get resource(s): labs, computers, accessories, reports, users, statuses.
    Get {
        resource: String,
        /// Optional resource ID for single get.
        id: Option<String>,
        /// Report filter: admin or student.
        #[arg(long)]
        kind: Option<String>,
    },

    /// Create a resource.
    Create {
        resource: String,
        /// JSON body.
        #[arg(long = "json")]
        json_body: Option<String>,
        /// Read JSON from file.
        #[arg(short = 'f', long = "file")]
        file: Option<String>,
    },

    /// Update a resource.
    Update {
        resource: String,
        id: String,
        /// JSON body.
        #[arg(long = "json")]
        json_body: String,
    },

    /// Delete a resource. Users are addressed by email.
    Delete {
        resource: String,
        id: String,
        /// Skip confirmation.
        #[arg(long = "yes", short = 'y')]
        yes: bool,
    },

    /// Record the condition of a computer part.
    Mark {
        computer_id: i64,
        /// monitor, systemUnit, keyboard, mouse, headphone, hdmi, power, wifi.
        part: String,
        /// operational, notOperational, damaged, missing.
        status: String,
    },

    /// Account settings.
    Settings {
        #[command(subcommand)]
        action: SettingsAction,
    },

    /// Account management.
    Account {
        #[command(subcommand)]
        action: AccountAction,
    },

    /// Show version.
    Version,
}

#[derive(Subcommand, Debug)]
enum ContextAction {
    /// Add or replace a context.
    Add {
        name: String,
        /// Auth service URL.
        #[arg(long)]
        auth: String,
        /// System service URL (default: same as --auth).
        #[arg(long)]
        system: Option<String>,
    },
    /// List all contexts.
    List,
    /// Switch the current context.
    Use { name: String },
    /// Delete a context and its saved session.
    Delete { name: String },
}

#[derive(Subcommand, Debug)]
enum SettingsAction {
    Get,
    Set {
        #[arg(long = "json")]
        json_body: String,
    },
}

#[derive(Subcommand, Debug)]
enum AccountAction {
    /// Update account fields.
    Edit {
        #[arg(long = "json")]
        json_body: String,
    },
}

fn prompt(label: &str) -> anyhow::Result<String> {
    eprint!("{}", label);
    std::io::stderr().flush()?;
    let mut s = String::new();
    std::io::stdin().read_line(&mut s)?;
    Ok(s.trim().to_string())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config_path = cli
        .config
        .map(PathBuf::from)
        .unwrap_or_else(config::CliConfig::default_path);
    let json_output = cli.output == "json";

    match cli.command {
        Commands::Context { action } => match action {
            ContextAction::Add { name, auth, system } => {
                commands::context::add(&name, &auth, system.as_deref(), &config_path)?;
            }
            ContextAction::List => commands::context::list(&config_path)?,
            ContextAction::Use { name } => commands::context::use_context(&name, &config_path)?,
            ContextAction::Delete { name } => commands::context::delete(&name, &config_path)?,
        },

        Commands::Login { user, password } => {
            let username = match user {
                Some(u) => u,
                None => prompt("Username: ")?,
            };
            let password = match password {
                Some(p) => p,
                None => rpassword::prompt_password("Password: ")?,
            };
            if username.is_empty() || password.is_empty() {
                anyhow::bail!("Username and password are required.");
            }
            commands::login::login(&username, &password, &config_path).await?;
        }

        Commands::Logout => commands::login::logout(&config_path).await?,

        Commands::Whoami => commands::login::whoami(json_output, &config_path).await?,

        Commands::Status => commands::login::status(&config_path)?,

        Commands::Get { resource, id, kind } => {
            commands::resource::get(
                &resource,
                id.as_deref(),
                kind.as_deref(),
                json_output,
                &config_path,
            )
            .await?;
        }

        Commands::Create {
            resource,
            json_body,
            file,
        } => {
            let body = if let Some(path) = file {
                std::fs::read_to_string(&path)?
            } else if let Some(json) = json_body {
                json
            } else {
                anyhow::bail!("Provide --json or -f <file>.");
            };
            commands::resource::create(&resource, &body, &config_path).await?;
        }

        Commands::Update {
            resource,
            id,
            json_body,
        } => {
            commands::resource::update(&resource, &id, &json_body, &config_path).await?;
        }

        Commands::Delete { resource, id, yes } => {
            if !yes && !prompt("Are you sure? [y/N]: ")?.eq_ignore_ascii_case("y") {
                println!("Cancelled.");
                return Ok(());
            }
            commands::resource::delete(&resource, &id, &config_path).await?;
        }

        Commands::Mark {
            computer_id,
            part,
            status,
        } => {
            commands::resource::mark(computer_id, &part, &status, &config_path).await?;
        }

        Commands::Settings { action } => match action {
            SettingsAction::Get => commands::account::settings_get(json_output, &config_path).await?,
            SettingsAction::Set { json_body } => {
                commands::account::settings_set(&json_body, json_output, &config_path).await?;
            }
        },

        Commands::Account { action } => match action {
            AccountAction::Edit { json_body } => {
                commands::account::edit(&json_body, &config_path).await?;
            }
        },

        Commands::Version => {
            println!("labtrack cli v{}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_mark() {
        let cli = Cli::try_parse_from(["labtrack", "mark", "12", "mouse", "missing"]).unwrap();
        match cli.command {
            Commands::Mark { computer_id, part, status } => {
                assert_eq!(computer_id, 12);
                assert_eq!(part, "mouse");
                assert_eq!(status, "missing");
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn global_output_flag() {
        let cli = Cli::try_parse_from(["labtrack", "get", "labs", "-o", "json"]).unwrap();
        assert_eq!(cli.output, "json");
    }
}
