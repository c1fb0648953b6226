//! One-shot aggregate: `lineboard snapshot`.

use std::sync::Arc;

use anyhow::{Context, Result};
use lineboard::config::LineboardToml;
use lineboard::dashboard::{DefectRatePanel, HttpSource, Panel, ProductionPanel, RecordSource};

pub async fn cmd_snapshot(
    config: &LineboardToml,
    base_url: Option<String>,
    cap: Option<f64>,
) -> Result<()> {
    let base_url = base_url.unwrap_or_else(|| config.dashboard.base_url.clone());
    let source: Arc<dyn RecordSource> =
        Arc::new(HttpSource::new(&base_url, config.dashboard.fetch_timeout())?);

    let production = ProductionPanel::new(Arc::clone(&source), Arc::new(config.line_targets()), cap);
    let defects = DefectRatePanel::new(source);
    let (production, defects) = tokio::try_join!(production.load(), defects.load())
        .with_context(|| format!("Failed to fetch records from {}", base_url))?;

    let out = serde_json::json!({
        "production": production,
        "defects": defects,
    });
    println!("{}", serde_json::to_string_pretty(&out)?);
    Ok(())
}
