use clap::{Parser, Subcommand};
use quarantine::config::{default_config_path, QuarantineConfig};
use std::path::PathBuf;

pub mod init_config;
pub mod logging;
pub mod run;
pub mod sweep;
pub mod version;

/// Database file created next to a freshly generated config
const DATABASE_FILE: &str = "quarantine.db";

#[derive(Parser)]
#[command(name = "quarantine")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Operator CLI for the group quarantine bot", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the bot service (HTTP unlock endpoint and OneBot webhook)
    Run {
        /// Path to config file (default: ~/.local/share/quarantine/config.toml)
        #[arg(long)]
        config: Option<String>,
    },

    /// List members past the grace period, or remove them with --yes
    Sweep {
        /// Path to config file
        #[arg(long)]
        config: Option<String>,

        /// Remove the listed members instead of only reporting them
        #[arg(long, short)]
        yes: bool,
    },

    /// Write a commented default config file
    InitConfig {
        /// Where to write the config file
        #[arg(long)]
        config: Option<String>,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Display version information
    Version,
}

pub async fn execute(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Run { config } => run::execute(config).await,
        Commands::Sweep { config, yes } => sweep::execute(config, yes).await,
        Commands::InitConfig { config, force } => init_config::execute(config, force),
        Commands::Version => {
            version::execute();
            Ok(())
        }
    }
}

/// `--config` value, or the default location
pub fn resolve_config_path(config: Option<String>) -> PathBuf {
    config.map(PathBuf::from).unwrap_or_else(default_config_path)
}

/// Database path written into a generated config at `config_path`
pub fn database_beside(config_path: &std::path::Path) -> PathBuf {
    config_path
        .parent()
        .map(|dir| dir.join(DATABASE_FILE))
        .unwrap_or_else(|| PathBuf::from(DATABASE_FILE))
}

/// Load the config, generating a default one first if it does not exist.
pub fn load_or_create_config(
    config: Option<String>,
) -> Result<(PathBuf, QuarantineConfig), Box<dyn std::error::Error>> {
    let path = resolve_config_path(config);

    if !path.exists() {
        println!("No config file found. Creating default configuration...");
        QuarantineConfig::create_default(&path, &database_beside(&path))?;
        println!("   Created: {}", path.display());
    }

    let config = QuarantineConfig::load(&path)?;
    Ok((path, config))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_cli_parse_run() {
        let cli = Cli::parse_from(["quarantine", "run", "--config", "/etc/quarantine.toml"]);

        match cli.command {
            Commands::Run { config } => {
                assert_eq!(config, Some("/etc/quarantine.toml".to_string()));
            }
            _ => panic!("Expected Run command"),
        }
    }

    #[test]
    fn test_cli_parse_run_defaults() {
        let cli = Cli::parse_from(["quarantine", "run"]);

        match cli.command {
            Commands::Run { config } => assert_eq!(config, None),
            _ => panic!("Expected Run command"),
        }
    }

    #[test]
    fn test_cli_parse_sweep() {
        let cli = Cli::parse_from(["quarantine", "sweep"]);
        match cli.command {
            Commands::Sweep { config, yes } => {
                assert_eq!(config, None);
                assert!(!yes);
            }
            _ => panic!("Expected Sweep command"),
        }

        let cli = Cli::parse_from(["quarantine", "sweep", "-y", "--config", "/tmp/q.toml"]);
        match cli.command {
            Commands::Sweep { config, yes } => {
                assert_eq!(config, Some("/tmp/q.toml".to_string()));
                assert!(yes);
            }
            _ => panic!("Expected Sweep command"),
        }
    }

    #[test]
    fn test_cli_parse_init_config() {
        let cli = Cli::parse_from(["quarantine", "init-config", "--force"]);

        match cli.command {
            Commands::InitConfig { config, force } => {
                assert_eq!(config, None);
                assert!(force);
            }
            _ => panic!("Expected InitConfig command"),
        }
    }

    #[test]
    fn test_cli_parse_version() {
        let cli = Cli::parse_from(["quarantine", "version"]);
        assert!(matches!(cli.command, Commands::Version));
    }

    #[test]
    fn test_load_or_create_config_generates_default() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("bot").join("config.toml");

        let (path, config) =
            load_or_create_config(Some(config_path.to_string_lossy().to_string())).unwrap();

        assert_eq!(path, config_path);
        assert!(config_path.exists());
        assert_eq!(
            config.storage.database,
            temp_dir.path().join("bot").join("quarantine.db")
        );
    }
}
