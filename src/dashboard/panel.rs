use std::fmt::Debug;
use std::sync::Arc;

use async_trait::async_trait;
use lineboard_common::{
    AggregateSnapshot, DefectSummary, LeadingLine, LinePerformance, LineTargets, Topic,
    compute_defect_summary, compute_snapshot, leading_line, line_performance,
};
use serde::Serialize;

use super::source::RecordSource;
use crate::errors::FetchError;

/// A unit of dashboard content: which topics make it stale, and how to
/// rebuild it from a fresh fetch.
#[async_trait]
pub trait Panel: Send + Sync + 'static {
    type Output: Clone + Debug + Send + Sync + 'static;

    fn name(&self) -> &str;

    /// Topics whose notifications should trigger a reload.
    fn topics(&self) -> &[Topic];

    async fn load(&self) -> Result<Self::Output, FetchError>;
}

// ── Production overview ──────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProductionView {
    pub snapshot: AggregateSnapshot,
    /// `percent_complete` after the presentation cap.
    pub percent_display: f64,
    pub lines: Vec<LinePerformance>,
}

pub struct ProductionPanel {
    source: Arc<dyn RecordSource>,
    targets: Arc<LineTargets>,
    cap: Option<f64>,
}

impl ProductionPanel {
    pub fn new(source: Arc<dyn RecordSource>, targets: Arc<LineTargets>, cap: Option<f64>) -> Self {
        Self {
            source,
            targets,
            cap,
        }
    }
}

#[async_trait]
impl Panel for ProductionPanel {
    type Output = ProductionView;

    fn name(&self) -> &str {
        "production"
    }

    fn topics(&self) -> &[Topic] {
        &[Topic::ProductionChanged, Topic::ReallocationChanged]
    }

    async fn load(&self) -> Result<ProductionView, FetchError> {
        let records = self.source.production().await?;
        let snapshot = compute_snapshot(&records, &self.targets);
        Ok(ProductionView {
            percent_display: snapshot.percent_capped(self.cap),
            lines: line_performance(&records, &self.targets),
            snapshot,
        })
    }
}

// ── Defect rate ──────────────────────────────────────────────────────

pub struct DefectRatePanel {
    source: Arc<dyn RecordSource>,
}

impl DefectRatePanel {
    pub fn new(source: Arc<dyn RecordSource>) -> Self {
        Self { source }
    }
}

#[async_trait]
impl Panel for DefectRatePanel {
    type Output = DefectSummary;

    fn name(&self) -> &str {
        "defects"
    }

    fn topics(&self) -> &[Topic] {
        &[Topic::DefectRecorded, Topic::ScanRecorded]
    }

    async fn load(&self) -> Result<DefectSummary, FetchError> {
        let (defects, produced) =
            tokio::try_join!(self.source.defects(), self.source.scan_count())?;
        Ok(compute_defect_summary(&defects, produced))
    }
}

// ── Leading line ─────────────────────────────────────────────────────

pub struct LeadingLinePanel {
    source: Arc<dyn RecordSource>,
    top_n: usize,
}

impl LeadingLinePanel {
    pub fn new(source: Arc<dyn RecordSource>, top_n: usize) -> Self {
        Self { source, top_n }
    }
}

#[async_trait]
impl Panel for LeadingLinePanel {
    type Output = Option<LeadingLine>;

    fn name(&self) -> &str {
        "leading-line"
    }

    fn topics(&self) -> &[Topic] {
        &[Topic::ProductionChanged, Topic::ReallocationChanged]
    }

    async fn load(&self) -> Result<Option<LeadingLine>, FetchError> {
        let records = self.source.production().await?;
        Ok(leading_line(&records, self.top_n))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use lineboard_common::{DefectEntry, DefectRecord, ProductionRecord};
    use std::sync::Mutex;

    /// In-memory source whose contents tests can swap between loads.
    #[derive(Default)]
    pub(crate) struct MemorySource {
        pub production: Mutex<Vec<ProductionRecord>>,
        pub defects: Mutex<Vec<DefectRecord>>,
        pub scans: Mutex<u64>,
        pub fail: Mutex<bool>,
    }

    impl MemorySource {
        fn check(&self) -> Result<(), FetchError> {
            if *self.fail.lock().unwrap() {
                Err(FetchError::Unavailable("memory source offline".into()))
            } else {
                Ok(())
            }
        }
    }

    #[async_trait]
    impl RecordSource for MemorySource {
        async fn production(&self) -> Result<Vec<ProductionRecord>, FetchError> {
            self.check()?;
            Ok(self.production.lock().unwrap().clone())
        }

        async fn defects(&self) -> Result<Vec<DefectRecord>, FetchError> {
            self.check()?;
            Ok(self.defects.lock().unwrap().clone())
        }

        async fn scan_count(&self) -> Result<u64, FetchError> {
            self.check()?;
            Ok(*self.scans.lock().unwrap())
        }
    }

    #[tokio::test]
    async fn test_production_panel_scenario() {
        let source = Arc::new(MemorySource::default());
        *source.production.lock().unwrap() = vec![
            ProductionRecord::new("a", Some(1), 5),
            ProductionRecord::new("b", Some(2), 80),
            ProductionRecord::new("c", Some(3), 999),
        ];
        let targets: LineTargets = [(1, 10), (2, 80)].into_iter().collect();
        let panel = ProductionPanel::new(source, Arc::new(targets), Some(100.0));

        let view = panel.load().await.unwrap();
        assert_eq!(view.snapshot.overall_produced, 1084);
        assert_eq!(view.snapshot.remaining, 0);
        assert_eq!(view.percent_display, 100.0);
        assert_eq!(view.lines.len(), 2);
        assert_eq!(view.lines[0].actual, 5);
    }

    #[tokio::test]
    async fn test_defect_panel_uses_scan_count_as_produced() {
        let source = Arc::new(MemorySource::default());
        *source.scans.lock().unwrap() = 200;
        *source.defects.lock().unwrap() = vec![DefectRecord {
            id: "g1".into(),
            tag_uid: None,
            defects: vec![DefectEntry {
                section: 1,
                defect_type: 1,
                subtype: 1,
            }],
            timestamp: None,
        }];
        let panel = DefectRatePanel::new(source);
        let summary = panel.load().await.unwrap();
        assert_eq!(summary.produced, 200);
        assert_eq!(summary.rate, 0.5);
    }

    #[tokio::test]
    async fn test_leading_line_panel_empty_floor() {
        let panel = LeadingLinePanel::new(Arc::new(MemorySource::default()), 3);
        assert_eq!(panel.load().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_panel_propagates_fetch_error() {
        let source = Arc::new(MemorySource::default());
        *source.fail.lock().unwrap() = true;
        let panel = DefectRatePanel::new(source);
        assert!(matches!(panel.load().await, Err(FetchError::Unavailable(_))));
    }

    #[test]
    fn test_panel_topics() {
        let source: Arc<dyn RecordSource> = Arc::new(MemorySource::default());
        let production = ProductionPanel::new(source.clone(), Arc::new(LineTargets::default()), None);
        assert!(production.topics().contains(&Topic::ProductionChanged));
        let defects = DefectRatePanel::new(source);
        assert!(defects.topics().contains(&Topic::ScanRecorded));
        assert!(!defects.topics().contains(&Topic::ProductionChanged));
    }
}
