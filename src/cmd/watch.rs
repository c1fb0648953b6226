//! Live dashboard in the terminal: `lineboard watch`.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use console::style;
use lineboard::common::{DefectSummary, LeadingLine};
use lineboard::config::LineboardToml;
use lineboard::dashboard::{
    DefectRatePanel, HttpSource, LeadingLinePanel, ProductionPanel, ProductionView, PushBridge,
    RecordSource, RefreshSettings, Widget, WidgetHandle, WidgetState,
};
use lineboard::notifier::Notifier;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::PanelChoice;

pub async fn cmd_watch(
    config: &LineboardToml,
    base_url: Option<String>,
    panel: PanelChoice,
    interval: Option<u64>,
    cap: Option<f64>,
) -> Result<()> {
    let base_url = base_url.unwrap_or_else(|| config.dashboard.base_url.clone());
    let mut settings = RefreshSettings::from(&config.dashboard);
    if let Some(secs) = interval {
        settings.poll_interval = Duration::from_secs(secs.max(1));
    }

    let source: Arc<dyn RecordSource> = Arc::new(HttpSource::new(&base_url, settings.fetch_timeout)?);
    let targets = Arc::new(config.line_targets());
    let notifier = Notifier::new();
    let bridge = PushBridge::spawn(&base_url, notifier.clone());

    println!(
        "{} {} (refresh every {}s, Ctrl+C to stop)",
        style("Watching").bold().cyan(),
        base_url,
        settings.poll_interval.as_secs()
    );

    let cancel = CancellationToken::new();
    let mut printers = JoinSet::new();
    if panel.includes(PanelChoice::Production) {
        let widget = ProductionPanel::new(Arc::clone(&source), Arc::clone(&targets), cap);
        let handle = Widget::mount(widget, &notifier, settings);
        printers.spawn(print_updates(handle, cancel.clone(), render_production));
    }
    if panel.includes(PanelChoice::Defects) {
        let handle = Widget::mount(DefectRatePanel::new(Arc::clone(&source)), &notifier, settings);
        printers.spawn(print_updates(handle, cancel.clone(), render_defects));
    }
    if panel.includes(PanelChoice::Leading) {
        let widget = LeadingLinePanel::new(Arc::clone(&source), config.dashboard.top_performers);
        let handle = Widget::mount(widget, &notifier, settings);
        printers.spawn(print_updates(handle, cancel.clone(), render_leading));
    }

    tokio::signal::ctrl_c().await?;
    tracing::info!("stopping watch");
    cancel.cancel();
    while printers.join_next().await.is_some() {}
    bridge.stop().await;
    Ok(())
}

async fn print_updates<T>(mut handle: WidgetHandle<T>, cancel: CancellationToken, render: fn(&T) -> String)
where
    T: Clone + Send + Sync + 'static,
{
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            alive = handle.changed() => {
                if !alive {
                    break;
                }
            }
        }
        let view = handle.view();
        let stamp = view
            .refreshed_at
            .map(|t| t.with_timezone(&chrono::Local).format("%H:%M:%S").to_string())
            .unwrap_or_else(|| "--:--:--".to_string());
        match (view.state, &view.value) {
            (WidgetState::Ready, Some(value)) => {
                println!("{} {:<12} {}", style(stamp).dim(), handle.name(), render(value));
            }
            (WidgetState::Error, _) => {
                let err = view.error.unwrap_or_default();
                println!("{} {:<12} {}", style(stamp).dim(), handle.name(), style(err).red());
            }
            _ => {}
        }
    }
    handle.unmount().await;
}

fn render_production(view: &ProductionView) -> String {
    let lines: Vec<String> = view
        .lines
        .iter()
        .map(|l| format!("L{}:{}/{}", l.line, l.actual, l.target))
        .collect();
    format!(
        "{}/{} pcs ({:.1}%), {} remaining | {}",
        view.snapshot.overall_produced,
        view.snapshot.overall_target,
        view.percent_display,
        view.snapshot.remaining,
        lines.join(" ")
    )
}

fn render_defects(summary: &DefectSummary) -> String {
    format!(
        "{} defective of {} produced ({:.2}%) {:?}",
        summary.defective_units, summary.produced, summary.rate, summary.status
    )
}

fn render_leading(leading: &Option<LeadingLine>) -> String {
    match leading {
        Some(l) => {
            let top: Vec<String> = l
                .top
                .iter()
                .map(|r| format!("{} ({})", r.name.as_deref().unwrap_or(&r.id), r.pcs))
                .collect();
            format!("Line {} leads with {} pcs | {}", l.line, l.total, top.join(", "))
        }
        None => "no production yet".to_string(),
    }
}
