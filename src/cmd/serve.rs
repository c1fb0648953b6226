//! Floor server commands: `lineboard serve` and `lineboard init-db`.

use std::path::PathBuf;

use anyhow::Result;
use lineboard::config::LineboardToml;
use lineboard::floor::db::FloorDb;
use lineboard::floor::server::{ServerConfig, start_server};

pub async fn cmd_serve(
    config: &LineboardToml,
    port: Option<u16>,
    db_path: Option<PathBuf>,
    dev: bool,
) -> Result<()> {
    let mut server = ServerConfig::from_toml(config);
    if let Some(port) = port {
        server.port = port;
    }
    if let Some(path) = db_path {
        server.db_path = path;
    }
    server.dev_mode |= dev;

    start_server(server).await
}

pub fn cmd_init_db(config: &LineboardToml, db_path: Option<PathBuf>) -> Result<()> {
    let db_path = db_path.unwrap_or_else(|| config.server.db_path.clone());
    FloorDb::new(&db_path)?;
    println!("Floor database initialized at {}", db_path.display());
    Ok(())
}
