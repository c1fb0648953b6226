use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use lineboard::logging::{self, LogFormat};
use std::path::PathBuf;

mod cmd;

#[derive(Parser)]
#[command(name = "lineboard")]
#[command(version, about = "Live production-line output, targets and defect rates")]
pub struct Cli {
    /// Path to lineboard.toml (defaults to ./lineboard.toml)
    #[arg(long, global = true, env = "LINEBOARD_CONFIG")]
    pub config: Option<PathBuf>,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true)]
    pub json_logs: bool,

    /// Also write daily-rotated JSON logs into this directory
    #[arg(long, global = true)]
    pub log_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the floor server (HTTP API with WebSocket and SSE push)
    Serve {
        /// Port to serve on
        #[arg(short, long)]
        port: Option<u16>,

        /// Database path
        #[arg(long)]
        db_path: Option<PathBuf>,

        /// Enable dev mode (bind all interfaces, permissive CORS)
        #[arg(long)]
        dev: bool,
    },
    /// Create or migrate the floor database, then exit
    InitDb {
        /// Database path
        #[arg(long)]
        db_path: Option<PathBuf>,
    },
    /// Mount live widgets against a floor server and print every update
    Watch {
        /// Floor server URL
        #[arg(long)]
        base_url: Option<String>,

        /// Which widgets to mount
        #[arg(long, value_enum, default_value = "all")]
        panel: PanelChoice,

        /// Fallback refresh interval in seconds
        #[arg(long)]
        interval: Option<u64>,

        /// Cap for the displayed completion percentage
        #[arg(long, conflicts_with = "no_cap", value_parser = parse_cap)]
        cap: Option<f64>,

        /// Show the raw completion percentage, even above 100
        #[arg(long)]
        no_cap: bool,
    },
    /// Fetch once, aggregate, and print JSON to stdout
    Snapshot {
        /// Floor server URL
        #[arg(long)]
        base_url: Option<String>,

        /// Cap for the displayed completion percentage
        #[arg(long, conflicts_with = "no_cap", value_parser = parse_cap)]
        cap: Option<f64>,

        /// Show the raw completion percentage, even above 100
        #[arg(long)]
        no_cap: bool,
    },
    /// Print the effective line target table
    Targets,
    /// View or validate configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum PanelChoice {
    Production,
    Defects,
    Leading,
    All,
}

impl PanelChoice {
    pub fn includes(self, other: PanelChoice) -> bool {
        self == PanelChoice::All || self == other
    }
}

#[derive(Subcommand, Clone)]
pub enum ConfigCommands {
    /// Show the effective configuration
    Show,
    /// Validate configuration and show any warnings
    Validate,
    /// Write a default lineboard.toml
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

fn parse_cap(value: &str) -> Result<f64, String> {
    let cap: f64 = value.parse().map_err(|e| format!("{}", e))?;
    if cap.is_finite() && cap > 0.0 {
        Ok(cap)
    } else {
        Err("must be a positive number".to_string())
    }
}

/// `--cap` wins, `--no-cap` disables, otherwise the configured cap.
pub fn resolve_cap(cap: Option<f64>, no_cap: bool, configured: Option<f64>) -> Option<f64> {
    if no_cap { None } else { cap.or(configured) }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let format = if cli.json_logs {
        LogFormat::Json
    } else {
        LogFormat::Pretty
    };
    let _log_guard = logging::init(format, cli.verbose, cli.log_dir.as_deref());

    let config_path = cmd::config_path(cli.config.as_deref());
    let config = cmd::load_config(&config_path)?;

    match cli.command {
        Commands::Serve { port, db_path, dev } => {
            cmd::cmd_serve(&config, port, db_path, dev).await?;
        }
        Commands::InitDb { db_path } => cmd::cmd_init_db(&config, db_path)?,
        Commands::Watch {
            base_url,
            panel,
            interval,
            cap,
            no_cap,
        } => {
            let cap = resolve_cap(cap, no_cap, config.dashboard.percent_cap());
            cmd::cmd_watch(&config, base_url, panel, interval, cap).await?;
        }
        Commands::Snapshot {
            base_url,
            cap,
            no_cap,
        } => {
            let cap = resolve_cap(cap, no_cap, config.dashboard.percent_cap());
            cmd::cmd_snapshot(&config, base_url, cap).await?;
        }
        Commands::Targets => cmd::cmd_targets(&config),
        Commands::Config { command } => cmd::cmd_config(&config_path, &config, command)?,
    }

    Ok(())
}
