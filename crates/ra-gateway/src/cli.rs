//! Command-line entry points: `serve` (default), `config validate`,
//! `config show`, `version`.

use clap::{Parser, Subcommand};
use ra_domain::config::{Config, ConfigSeverity};

/// research-agent — an orchestrator for multi-step LLM research jobs.
#[derive(Debug, Parser)]
#[command(name = "research-agent", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Start the gateway server (default when no subcommand is given).
    Serve,
    /// Configuration utilities.
    #[command(subcommand)]
    Config(ConfigCommand),
    /// Print version information.
    Version,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Validate the resolved config and print any issues.
    Validate,
    /// Dump the resolved config (with all defaults filled in) as TOML.
    Show,
}

/// Load the config from `RESEARCH_AGENT_CONFIG` (default `config.toml`),
/// falling back to defaults when the file is absent.
pub fn load_config() -> anyhow::Result<(Config, String)> {
    let config_path = std::env::var("RESEARCH_AGENT_CONFIG").unwrap_or_else(|_| "config.toml".into());

    let config = if std::path::Path::new(&config_path).exists() {
        let raw = std::fs::read_to_string(&config_path)
            .map_err(|e| anyhow::anyhow!("reading {config_path}: {e}"))?;
        toml::from_str(&raw).map_err(|e| anyhow::anyhow!("parsing {config_path}: {e}"))?
    } else {
        Config::default()
    };

    Ok((config, config_path))
}

/// Parse and validate the config, printing any issues.
///
/// Returns `true` when valid (exit code 0), `false` when errors were found.
pub fn validate(config: &Config, config_path: &str) -> bool {
    let issues = config.validate();

    if issues.is_empty() {
        println!("Config OK ({config_path})");
        return true;
    }

    let error_count = issues.iter().filter(|e| e.severity == ConfigSeverity::Error).count();
    let warning_count = issues.len() - error_count;

    for issue in &issues {
        println!("{issue}");
    }

    println!("\n{error_count} error(s), {warning_count} warning(s) in {config_path}");

    error_count == 0
}

/// Dump the resolved config (with all defaults filled in) as TOML.
pub fn show(config: &Config) {
    match toml::to_string_pretty(config) {
        Ok(output) => print!("{output}"),
        Err(e) => {
            eprintln!("Failed to serialize config: {e}");
            std::process::exit(1);
        }
    }
}
