pub mod chat;
pub mod config;
pub mod run;

use clap::{Parser, Subcommand};

/// agentrelay: chat with a cloud-hosted sales agent.
#[derive(Debug, Parser)]
#[command(name = "agentrelay", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Start the HTTP/SSE server (default when no subcommand is given).
    Serve,
    /// Interactive chat in the terminal.
    Chat {
        /// Session key (defaults to "cli:chat").
        #[arg(long, default_value = "cli:chat")]
        session: String,
    },
    /// Send a single message and print the response.
    Run {
        /// The message to send.
        message: String,
        /// Files to attach to the message.
        #[arg(long = "attach", value_name = "PATH")]
        attachments: Vec<std::path::PathBuf>,
        /// Print the turn summary as JSON instead of rendering it.
        #[arg(long)]
        json: bool,
    },
    /// Configuration utilities.
    #[command(subcommand)]
    Config(ConfigCommand),
    /// Print version information.
    Version,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Parse the config file and report any issues.
    Validate,
    /// Dump the resolved configuration (with defaults) as TOML.
    Show,
}

// ── Config loading helper ─────────────────────────────────────────────

/// Load the configuration from `AR_CONFIG` (or `config.toml`). A missing
/// file yields the defaults.
pub fn load_config() -> anyhow::Result<(ar_domain::config::Config, String)> {
    let config_path = std::env::var("AR_CONFIG").unwrap_or_else(|_| "config.toml".into());

    let config = if std::path::Path::new(&config_path).exists() {
        let raw = std::fs::read_to_string(&config_path)
            .map_err(|e| anyhow::anyhow!("reading {config_path}: {e}"))?;
        toml::from_str(&raw).map_err(|e| anyhow::anyhow!("parsing {config_path}: {e}"))?
    } else {
        ar_domain::config::Config::default()
    };

    Ok((config, config_path))
}

fn password_prompt(username: &str) -> String {
    format!("Password for {username}: ")
}

/// Ask for the password on the terminal and check it. Returns the
/// identity's username, or an error when auth is enabled and fails.
pub(crate) fn login_prompt(state: &crate::state::AppState) -> anyhow::Result<String> {
    let auth = &state.authenticator;
    if let Some(identity) = auth.anonymous() {
        return Ok(identity.username);
    }
    let username = state.config.auth.username.clone();
    let password = rpassword::read_password_from_tty(Some(&password_prompt(&username)))?;
    auth.authenticate(&username, &password)
        .map(|identity| identity.username)
        .ok_or_else(|| anyhow::anyhow!("login failed"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_prompt_names_the_user() {
        assert_eq!(
            password_prompt("sales@contoso.com"),
            "Password for sales@contoso.com: "
        );
    }
}
