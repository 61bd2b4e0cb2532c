use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, Sender};
use std::time::{Duration, Instant};

use thiserror::Error;

use crate::analysis::outliers::{OutlierParams, OutlierReport, detect_outliers};
use crate::config::AnalysisConfig;
use crate::data::model::{Dataset, Row};
use crate::insight::{Insight, InsightError, InsightProvider, InsightRequest, InsightResult};

// ---------------------------------------------------------------------------
// Inputs and derived result
// ---------------------------------------------------------------------------

/// Every way the analysis inputs can change.
#[derive(Debug, Clone)]
pub enum AnalysisEvent {
    DatasetLoaded(Dataset),
    /// Full replacement of the current dataset's rows (editor commit).
    RowsReplaced(Vec<Row>),
    SetXField(String),
    SetYField(String),
    SetThreshold(f64),
}

/// Outcome of the last recompute.
#[derive(Debug, Clone, PartialEq)]
pub enum Analysis {
    NoDataset,
    /// Fewer than two numeric columns, or no rows.
    InsufficientData { numeric_columns: usize },
    Ready(OutlierReport),
}

impl Analysis {
    pub fn report(&self) -> Option<&OutlierReport> {
        match self {
            Analysis::Ready(report) => Some(report),
            _ => None,
        }
    }
}

/// Score `dataset` on the chosen axes. Pure.
pub fn recompute(
    dataset: Option<&Dataset>,
    x_field: Option<&str>,
    y_field: Option<&str>,
    params: &OutlierParams,
) -> Analysis {
    let Some(dataset) = dataset else {
        return Analysis::NoDataset;
    };
    let numeric_columns = dataset.numeric_columns().len();
    match (x_field, y_field) {
        (Some(x), Some(y)) if numeric_columns >= 2 && !dataset.is_empty() => {
            Analysis::Ready(detect_outliers(&dataset.rows, x, y, params))
        }
        _ => Analysis::InsufficientData { numeric_columns },
    }
}

// ---------------------------------------------------------------------------
// Insight request bookkeeping
// ---------------------------------------------------------------------------

#[derive(Debug, Error, PartialEq)]
pub enum InsightRejected {
    #[error("an insight request is already in flight")]
    AlreadyInFlight,
    #[error("no outlier analysis is available")]
    AnalysisUnavailable,
}

/// Identifies one insight request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestToken {
    pub id: u64,
    /// Input generation the request was built from.
    pub generation: u64,
}

struct PendingInsight {
    token: RequestToken,
    started: Instant,
}

struct InsightResponse {
    token: RequestToken,
    result: InsightResult<Insight>,
}

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

/// Sole owner of the dataset and the analysis state.
///
/// Inputs arrive as [`AnalysisEvent`]s through [`dispatch`]; each effective
/// change recomputes the scores and clears the cached insight.
///
/// [`dispatch`]: AnalysisOrchestrator::dispatch
pub struct AnalysisOrchestrator {
    dataset: Option<Dataset>,
    /// Bumped whenever the dataset is replaced.
    revision: u64,
    numeric_columns: Vec<String>,
    x_field: Option<String>,
    y_field: Option<String>,
    params: OutlierParams,
    inlier_sample_size: usize,
    analysis: Analysis,

    /// Bumped on every input change; stale insight responses are dropped.
    generation: u64,
    next_request_id: u64,
    provider: Arc<dyn InsightProvider>,
    insight_timeout: Duration,
    insight: Option<Insight>,
    pending: Option<PendingInsight>,
    tx: Sender<InsightResponse>,
    rx: Receiver<InsightResponse>,
}

impl AnalysisOrchestrator {
    pub fn new(
        config: &AnalysisConfig,
        provider: Arc<dyn InsightProvider>,
        insight_timeout: Duration,
    ) -> Self {
        let (tx, rx) = mpsc::channel();
        Self {
            dataset: None,
            revision: 0,
            numeric_columns: Vec::new(),
            x_field: None,
            y_field: None,
            params: config.params(),
            inlier_sample_size: config.inlier_sample_size,
            analysis: Analysis::NoDataset,
            generation: 0,
            next_request_id: 0,
            provider,
            insight_timeout,
            insight: None,
            pending: None,
            tx,
            rx,
        }
    }

    // -- Accessors --

    pub fn dataset(&self) -> Option<&Dataset> {
        self.dataset.as_ref()
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn numeric_columns(&self) -> &[String] {
        &self.numeric_columns
    }

    pub fn x_field(&self) -> Option<&str> {
        self.x_field.as_deref()
    }

    pub fn y_field(&self) -> Option<&str> {
        self.y_field.as_deref()
    }

    pub fn threshold(&self) -> f64 {
        self.params.threshold
    }

    pub fn analysis(&self) -> &Analysis {
        &self.analysis
    }

    pub fn insight(&self) -> Option<&Insight> {
        self.insight.as_ref()
    }

    pub fn insight_pending(&self) -> bool {
        self.pending.is_some()
    }

    // -- Input events --

    /// Apply one input change. Returns whether anything changed.
    pub fn dispatch(&mut self, event: AnalysisEvent) -> bool {
        let changed = match event {
            AnalysisEvent::DatasetLoaded(dataset) => {
                log::info!(
                    "Dataset {:?}: {} rows, columns {:?}",
                    dataset.name,
                    dataset.len(),
                    dataset.columns
                );
                self.replace_dataset(dataset);
                true
            }
            AnalysisEvent::RowsReplaced(rows) => match &self.dataset {
                Some(current) => {
                    let next = current.with_rows(rows);
                    self.replace_dataset(next);
                    true
                }
                None => {
                    log::warn!("Row replacement ignored: no dataset loaded");
                    false
                }
            },
            AnalysisEvent::SetXField(field) => self.set_axis(field, true),
            AnalysisEvent::SetYField(field) => self.set_axis(field, false),
            AnalysisEvent::SetThreshold(threshold) => {
                if !threshold.is_finite() || threshold <= 0.0 {
                    log::warn!("Ignoring threshold {threshold}");
                    false
                } else if threshold == self.params.threshold {
                    false
                } else {
                    self.params = self.params.with_threshold(threshold);
                    true
                }
            }
        };

        if changed {
            self.invalidate();
        }
        changed
    }

    fn replace_dataset(&mut self, dataset: Dataset) {
        self.numeric_columns = dataset.numeric_columns();
        self.revision += 1;
        self.dataset = Some(dataset);
        self.repair_axes();
    }

    /// Keep both axes inside the numeric subset: X falls back to the first
    /// numeric column, Y to the second (or the first if only one exists).
    fn repair_axes(&mut self) {
        let numeric = &self.numeric_columns;
        let valid = |f: &Option<String>| f.as_ref().is_some_and(|f| numeric.contains(f));

        if !valid(&self.x_field) {
            self.x_field = numeric.first().cloned();
        }
        if !valid(&self.y_field) {
            self.y_field = numeric.get(1).or(numeric.first()).cloned();
        }
    }

    fn set_axis(&mut self, field: String, is_x: bool) -> bool {
        if !self.numeric_columns.contains(&field) {
            log::warn!("Ignoring non-numeric axis field {field:?}");
            return false;
        }
        let slot = if is_x { &mut self.x_field } else { &mut self.y_field };
        if slot.as_deref() == Some(field.as_str()) {
            return false;
        }
        *slot = Some(field);
        true
    }

    /// Drop the cached insight and any in-flight request, then rescore.
    fn invalidate(&mut self) {
        self.generation += 1;
        self.insight = None;
        if let Some(pending) = self.pending.take() {
            log::debug!("Abandoning insight request {}", pending.token.id);
        }

        self.analysis = recompute(
            self.dataset.as_ref(),
            self.x_field.as_deref(),
            self.y_field.as_deref(),
            &self.params,
        );
        if let Some(report) = self.analysis.report() {
            log::debug!(
                "Scored {} rows on {} x {}: {} outliers",
                report.scored.len(),
                report.x_field,
                report.y_field,
                report.outlier_count()
            );
        }
    }

    // -- AI insight --

    /// Outlier rows plus the first few inliers, in row order.
    pub fn insight_request(&self) -> Option<InsightRequest> {
        let report = self.analysis.report()?;
        let dataset = self.dataset.as_ref()?;

        let outliers = report.outlier_indices.iter().map(|&i| &dataset.rows[i]);
        let inliers = report
            .scored
            .iter()
            .zip(&dataset.rows)
            .filter(|(s, _)| !s.is_outlier)
            .map(|(_, row)| row)
            .take(self.inlier_sample_size);

        Some(InsightRequest {
            rows: outliers.chain(inliers).cloned().collect(),
            columns: dataset.columns.clone(),
            outlier_indices: report.outlier_indices.clone(),
            x_field: report.x_field.clone(),
            y_field: report.y_field.clone(),
        })
    }

    /// Start fetching an insight for the current analysis on a worker thread.
    pub fn request_insight(&mut self) -> Result<RequestToken, InsightRejected> {
        if self.pending.is_some() {
            return Err(InsightRejected::AlreadyInFlight);
        }
        let request = self
            .insight_request()
            .ok_or(InsightRejected::AnalysisUnavailable)?;

        self.next_request_id += 1;
        let token = RequestToken {
            id: self.next_request_id,
            generation: self.generation,
        };
        log::info!(
            "Requesting insight {} for {} rows ({} outliers)",
            token.id,
            request.rows.len(),
            request.outlier_indices.len()
        );

        let provider = Arc::clone(&self.provider);
        let tx = self.tx.clone();
        std::thread::spawn(move || {
            let result = provider.generate(&request);
            // The receiver lives as long as the orchestrator.
            let _ = tx.send(InsightResponse { token, result });
        });

        self.pending = Some(PendingInsight {
            token,
            started: Instant::now(),
        });
        Ok(token)
    }

    /// Drain finished responses and expire an overdue request.
    /// Returns whether the cached insight changed.
    pub fn poll_insight(&mut self) -> bool {
        let mut updated = false;
        while let Ok(response) = self.rx.try_recv() {
            updated |= self.accept(response);
        }
        updated | self.expire_overdue()
    }

    fn accept(&mut self, response: InsightResponse) -> bool {
        let current = self.pending.as_ref().map(|p| p.token);
        if current != Some(response.token) || response.token.generation != self.generation {
            log::debug!("Discarding stale insight response {}", response.token.id);
            return false;
        }
        self.pending = None;
        self.insight = Some(match response.result {
            Ok(insight) => insight,
            Err(e) => {
                log::warn!("Insight request failed: {e}");
                Insight::fallback(&e)
            }
        });
        true
    }

    fn expire_overdue(&mut self) -> bool {
        let overdue = self
            .pending
            .as_ref()
            .is_some_and(|p| p.started.elapsed() >= self.insight_timeout);
        if !overdue {
            return false;
        }
        self.pending = None;
        let error = InsightError::Timeout {
            after: self.insight_timeout,
        };
        log::warn!("Insight request failed: {error}");
        self.insight = Some(Insight::fallback(&error));
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use crate::data::model::CellValue;
    use crate::data::model::tests::dataset;
    use crate::data::sample::simulated_dataset;

    const WAIT: Duration = Duration::from_secs(5);

    /// Returns a canned insight, optionally after waiting for a release signal.
    struct StubProvider {
        result: InsightResult<Insight>,
        gate: Option<Mutex<Receiver<()>>>,
        seen: Mutex<Vec<InsightRequest>>,
    }

    impl StubProvider {
        fn ok(summary: &str) -> Self {
            Self {
                result: Ok(Insight {
                    summary: summary.to_string(),
                    outlier_analysis: "analysis".to_string(),
                    actionable_insights: vec!["act".to_string()],
                }),
                gate: None,
                seen: Mutex::new(Vec::new()),
            }
        }

        fn gated(summary: &str) -> (Self, Sender<()>) {
            let (tx, rx) = mpsc::channel();
            let mut stub = Self::ok(summary);
            stub.gate = Some(Mutex::new(rx));
            (stub, tx)
        }
    }

    impl InsightProvider for StubProvider {
        fn generate(&self, request: &InsightRequest) -> InsightResult<Insight> {
            self.seen.lock().expect("lock").push(request.clone());
            if let Some(gate) = &self.gate {
                let _ = gate.lock().expect("lock").recv_timeout(WAIT);
            }
            self.result.clone()
        }
    }

    fn orchestrator(provider: Arc<dyn InsightProvider>, timeout: Duration) -> AnalysisOrchestrator {
        AnalysisOrchestrator::new(&AnalysisConfig::default(), provider, timeout)
    }

    /// Poll until the pending request settles or `timeout` passes.
    fn wait_for_insight(o: &mut AnalysisOrchestrator, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if o.poll_insight() {
                return true;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        false
    }

    fn loaded(provider: Arc<dyn InsightProvider>) -> AnalysisOrchestrator {
        let mut o = orchestrator(provider, WAIT);
        let ds = simulated_dataset(120, 5).expect("dataset");
        o.dispatch(AnalysisEvent::DatasetLoaded(ds));
        o
    }

    #[test]
    fn test_load_picks_first_two_numeric_axes() {
        let o = loaded(Arc::new(StubProvider::ok("s")));
        assert_eq!(o.x_field(), Some("revenue"));
        assert_eq!(o.y_field(), Some("units"));
        let report = o.analysis().report().expect("ready");
        assert_eq!(report.scored.len(), 120);
    }

    #[test]
    fn test_insufficient_numeric_columns_disables_analysis() {
        let mut o = orchestrator(Arc::new(StubProvider::ok("s")), WAIT);
        assert_eq!(o.analysis(), &Analysis::NoDataset);

        let ds = dataset(
            &["name", "v"],
            vec![vec![("name", CellValue::Text("a".into())), ("v", CellValue::Number(1.0))]],
        );
        o.dispatch(AnalysisEvent::DatasetLoaded(ds));
        assert_eq!(o.analysis(), &Analysis::InsufficientData { numeric_columns: 1 });
        assert_eq!(o.x_field(), Some("v"));
        assert_eq!(o.y_field(), Some("v"));
        assert_eq!(o.request_insight(), Err(InsightRejected::AnalysisUnavailable));
    }

    #[test]
    fn test_axis_repair_after_column_dropped() {
        let mut o = loaded(Arc::new(StubProvider::ok("s")));
        assert!(o.dispatch(AnalysisEvent::SetXField("discount".to_string())));
        assert_eq!(o.x_field(), Some("discount"));

        let ds = dataset(
            &["units", "revenue", "region"],
            vec![vec![
                ("units", CellValue::Number(1.0)),
                ("revenue", CellValue::Number(2.0)),
                ("region", CellValue::Text("N".into())),
            ]],
        );
        o.dispatch(AnalysisEvent::DatasetLoaded(ds));
        assert_eq!(o.x_field(), Some("units"));
        // Y ("units") was still valid and is kept.
        assert_eq!(o.y_field(), Some("units"));
        assert!(o.analysis().report().is_some());
    }

    #[test]
    fn test_invalid_axis_and_threshold_are_ignored() {
        let mut o = loaded(Arc::new(StubProvider::ok("s")));
        assert!(!o.dispatch(AnalysisEvent::SetXField("region".to_string())));
        assert!(!o.dispatch(AnalysisEvent::SetYField("nope".to_string())));
        assert!(!o.dispatch(AnalysisEvent::SetThreshold(-1.0)));
        assert!(!o.dispatch(AnalysisEvent::SetThreshold(f64::NAN)));
        assert!(!o.dispatch(AnalysisEvent::SetThreshold(2.5)));
        assert_eq!(o.x_field(), Some("revenue"));
        assert_eq!(o.threshold(), 2.5);
    }

    #[test]
    fn test_threshold_change_rescores() {
        let mut o = loaded(Arc::new(StubProvider::ok("s")));
        let before = o.analysis().report().expect("ready").outlier_count();
        assert!(o.dispatch(AnalysisEvent::SetThreshold(1.0)));
        let after = o.analysis().report().expect("ready").outlier_count();
        assert!(after >= before);
        assert_eq!(o.analysis().report().expect("ready").params.threshold, 1.0);
    }

    #[test]
    fn test_rows_replaced_rescores_and_bumps_revision() {
        let mut o = loaded(Arc::new(StubProvider::ok("s")));
        let revision = o.revision();
        let mut rows = o.dataset().expect("dataset").rows.clone();
        rows[0] = rows[0].with_cell("revenue", CellValue::Number(1.0e6));

        assert!(o.dispatch(AnalysisEvent::RowsReplaced(rows)));
        assert_eq!(o.revision(), revision + 1);
        let report = o.analysis().report().expect("ready");
        assert!(report.scored[0].is_outlier);
        assert_eq!(report.outlier_indices[0], 0);
    }

    #[test]
    fn test_rows_replaced_without_dataset_is_ignored() {
        let mut o = orchestrator(Arc::new(StubProvider::ok("s")), WAIT);
        assert!(!o.dispatch(AnalysisEvent::RowsReplaced(Vec::new())));
        assert_eq!(o.revision(), 0);
    }

    #[test]
    fn test_insight_request_payload_is_bounded() {
        let o = loaded(Arc::new(StubProvider::ok("s")));
        let report = o.analysis().report().expect("ready");
        let request = o.insight_request().expect("request");
        assert!(!report.outlier_indices.is_empty());
        assert_eq!(request.rows.len(), report.outlier_count() + 10);
        assert_eq!(request.outlier_indices, report.outlier_indices);
        assert_eq!(request.x_field, "revenue");

        let first_outlier = &o.dataset().expect("dataset").rows[report.outlier_indices[0]];
        assert_eq!(request.rows[0].id, first_outlier.id);
        let first_inlier = report.scored.iter().position(|s| !s.is_outlier).expect("inlier");
        assert_eq!(request.rows[report.outlier_count()].id, report.scored[first_inlier].row_id);
    }

    #[test]
    fn test_insight_success_is_cached_then_cleared_by_threshold_change() {
        let mut o = loaded(Arc::new(StubProvider::ok("fresh")));
        o.request_insight().expect("accepted");
        assert!(o.insight_pending());
        assert!(wait_for_insight(&mut o, WAIT));
        assert_eq!(o.insight().map(|i| i.summary.as_str()), Some("fresh"));

        o.dispatch(AnalysisEvent::SetThreshold(3.0));
        assert!(o.insight().is_none());
    }

    fn with_cached_insight() -> AnalysisOrchestrator {
        let mut o = loaded(Arc::new(StubProvider::ok("fresh")));
        o.request_insight().expect("accepted");
        assert!(wait_for_insight(&mut o, WAIT));
        assert!(o.insight().is_some());
        o
    }

    #[test]
    fn test_axis_change_clears_cached_insight() {
        let mut o = with_cached_insight();
        assert!(o.dispatch(AnalysisEvent::SetYField("discount".to_string())));
        assert!(o.insight().is_none());
        assert_eq!(o.y_field(), Some("discount"));
    }

    #[test]
    fn test_dataset_load_clears_cached_insight() {
        let mut o = with_cached_insight();
        o.dispatch(AnalysisEvent::DatasetLoaded(simulated_dataset(80, 9).expect("dataset")));
        assert!(o.insight().is_none());
        assert_eq!(o.analysis().report().expect("ready").scored.len(), 80);
    }

    #[test]
    fn test_rows_replaced_clears_cached_insight() {
        let mut o = with_cached_insight();
        let mut rows = o.dataset().expect("dataset").rows.clone();
        rows[3] = rows[3].with_cell("units", CellValue::Number(0.0));
        assert!(o.dispatch(AnalysisEvent::RowsReplaced(rows)));
        assert!(o.insight().is_none());
    }

    #[test]
    fn test_ignored_event_keeps_cached_insight() {
        let mut o = with_cached_insight();
        assert!(!o.dispatch(AnalysisEvent::SetXField("region".to_string())));
        assert!(o.insight().is_some());
    }

    #[test]
    fn test_duplicate_request_rejected_while_in_flight() {
        let (stub, release) = StubProvider::gated("s");
        let stub = Arc::new(stub);
        let mut o = loaded(stub.clone());

        o.request_insight().expect("accepted");
        assert_eq!(o.request_insight(), Err(InsightRejected::AlreadyInFlight));

        release.send(()).expect("release");
        assert!(wait_for_insight(&mut o, WAIT));
        assert_eq!(stub.seen.lock().expect("lock").len(), 1);
    }

    #[test]
    fn test_late_response_after_input_change_is_discarded() {
        let (stub, release) = StubProvider::gated("stale");
        let mut o = loaded(Arc::new(stub));

        o.request_insight().expect("accepted");
        o.dispatch(AnalysisEvent::SetXField("discount".to_string()));
        assert!(!o.insight_pending());

        release.send(()).expect("release");
        std::thread::sleep(Duration::from_millis(100));
        for _ in 0..50 {
            o.poll_insight();
            std::thread::sleep(Duration::from_millis(10));
        }
        assert!(o.insight().is_none());
    }

    #[test]
    fn test_provider_failure_yields_fallback() {
        let stub = StubProvider {
            result: Err(InsightError::MissingApiKey {
                env_var: "ANTHROPIC_API_KEY".to_string(),
            }),
            gate: None,
            seen: Mutex::new(Vec::new()),
        };
        let mut o = loaded(Arc::new(stub));
        o.request_insight().expect("accepted");
        assert!(wait_for_insight(&mut o, WAIT));
        let insight = o.insight().expect("fallback");
        assert_eq!(insight.summary, "AI insights are currently unavailable.");
        assert!(insight.outlier_analysis.contains("ANTHROPIC_API_KEY"));
    }

    #[test]
    fn test_timeout_yields_fallback() {
        let (stub, release) = StubProvider::gated("slow");
        let mut o = orchestrator(Arc::new(stub), Duration::from_millis(50));
        o.dispatch(AnalysisEvent::DatasetLoaded(simulated_dataset(60, 2).expect("dataset")));

        o.request_insight().expect("accepted");
        assert!(wait_for_insight(&mut o, WAIT));
        assert!(!o.insight_pending());
        let analysis = &o.insight().expect("fallback").outlier_analysis;
        assert!(analysis.contains("no response within 50ms"), "{analysis}");

        // The late answer must not replace the fallback.
        release.send(()).expect("release");
        std::thread::sleep(Duration::from_millis(100));
        o.poll_insight();
        assert!(o.insight().expect("fallback").summary.contains("unavailable"));
    }
}
