use crate::config::{self, Config};
use anyhow::{Context, Result, bail};
use clap::{CommandFactory, Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "cligate")]
#[command(about = "cligate - session engine for a stateful LLM CLI gateway")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to config.json (defaults to ~/.cligate/config.json)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Display version information
    Version,

    /// Print the effective configuration
    Config {
        /// Write the effective configuration to the config path
        #[arg(long)]
        init: bool,
    },

    /// Run the session engine and its cleanup task until interrupted
    Run {
        /// Seconds between session statistics reports
        #[arg(long, default_value_t = 60, value_parser = clap::value_parser!(u64).range(1..))]
        stats_interval_secs: u64,
    },
}

pub fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Some(Commands::Version) => {
            print_version();
            Ok(())
        }
        Some(Commands::Config { init }) => show_config(cli.config, init),
        Some(Commands::Run {
            stats_interval_secs,
        }) => {
            let config = config::load_config(cli.config)?;
            let runtime = tokio::runtime::Runtime::new().context("Failed to start tokio runtime")?;
            runtime.block_on(crate::daemon::run_daemon(
                &config,
                Duration::from_secs(stats_interval_secs),
            ))
        }
        None => {
            Cli::command().print_help()?;
            println!();
            Ok(())
        }
    }
}

fn show_config(path: Option<PathBuf>, init: bool) -> Result<()> {
    let config: Config = config::load_config(path.clone())?;

    if init {
        let target = path
            .or_else(config::get_config_path)
            .context("Could not determine config path")?;
        if target.exists() {
            bail!("Config file already exists: {}", target.display());
        }
        config::save_config(&config, &target)?;
        println!("Wrote {}", target.display());
        return Ok(());
    }

    println!("{}", serde_json::to_string_pretty(&config)?);
    Ok(())
}

fn print_version() {
    println!("cligate {}", env!("CARGO_PKG_VERSION"));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_string_format() {
        let version = env!("CARGO_PKG_VERSION");
        let parts: Vec<&str> = version.split('.').collect();
        assert_eq!(parts.len(), 3);
        assert!(parts.iter().all(|p| p.parse::<u32>().is_ok()));
    }

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_run_with_interval() {
        let cli = Cli::parse_from(["cligate", "run", "--stats-interval-secs", "5"]);
        assert!(matches!(
            cli.command,
            Some(Commands::Run {
                stats_interval_secs: 5
            })
        ));
    }

    #[test]
    fn test_parse_run_rejects_zero_interval() {
        assert!(Cli::try_parse_from(["cligate", "run", "--stats-interval-secs", "0"]).is_err());
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::parse_from(["cligate", "config", "--verbose", "--config", "/tmp/c.json"]);
        assert!(cli.verbose);
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/c.json")));
        assert!(matches!(cli.command, Some(Commands::Config { init: false })));
    }
}
