//! Configuration commands: `lineboard config` and `lineboard targets`.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use lineboard::config::{DEFAULT_CONFIG_FILE, LineboardToml};

use super::super::ConfigCommands;

pub fn config_path(explicit: Option<&Path>) -> PathBuf {
    explicit
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE))
}

/// File, then `.env` and `LINEBOARD_*` variables. Warnings are logged, not fatal.
pub fn load_config(path: &Path) -> Result<LineboardToml> {
    if let Err(e) = dotenvy::dotenv()
        && !e.not_found()
    {
        tracing::warn!(error = %e, "failed to read .env");
    }

    let mut config = LineboardToml::load_or_default(path)?;
    config.apply_env();
    for warning in config.validate() {
        tracing::warn!(config = %path.display(), "{}", warning);
    }
    Ok(config)
}

pub fn cmd_targets(config: &LineboardToml) {
    let targets = config.line_targets();
    println!("{}", console::style("Line targets").bold().cyan());
    for target in targets.iter() {
        println!("  Line {:>2}  {:>6}", target.line, target.target);
    }
    println!("  {}    {:>6}", console::style("Total").bold(), targets.total());
}

pub fn cmd_config(path: &Path, config: &LineboardToml, command: Option<ConfigCommands>) -> Result<()> {
    match command {
        None | Some(ConfigCommands::Show) => {
            println!();
            println!("Lineboard Configuration");
            println!("=======================");
            println!();
            if path.exists() {
                println!("Config file: {}", path.display());
            } else {
                println!("No {} found; using defaults", path.display());
            }
            println!("Effective values (with env overrides):");
            println!();
            let rendered =
                toml::to_string_pretty(config).context("Failed to render configuration")?;
            println!("{}", rendered);
        }
        Some(ConfigCommands::Validate) => {
            let warnings = config.validate();
            if warnings.is_empty() {
                println!("{} Configuration is valid", console::style("✓").green());
            } else {
                println!("{}", console::style("Configuration warnings:").yellow());
                for warning in &warnings {
                    println!("  - {}", warning);
                }
            }
        }
        Some(ConfigCommands::Init { force }) => {
            if path.exists() && !force {
                anyhow::bail!(
                    "{} already exists. Use --force to overwrite.",
                    path.display()
                );
            }
            LineboardToml::default().save(path)?;
            println!("Wrote default configuration to {}", path.display());
        }
    }
    Ok(())
}
