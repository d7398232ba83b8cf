use crate::ai::{
    CompletionBackend, GenerationParams, PatternAnalyzer, SchemaAnalyzer, SourceSummary,
    TruncationLimits,
};
use crate::charts::{ChartKind, ChartRenderer};
use crate::db::{extract, ConnectionDescriptor, SchemaDescription};
use crate::report::markdown::comprehensive_report;
use crate::report::{ReportAssembler, ReportPaths, DEFAULT_REPORT_DIR};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info, warn};

pub const DEFAULT_OUTPUT_DIR: &str = "analysis_results";
const PATTERNS_KEY: &str = "cross_database_patterns";

/// How a registered source was described by the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceConfig {
    pub connection_string: String,
    pub db_type: String,
    pub description: String,
}

#[derive(Debug, Clone)]
pub enum SourceOutcome {
    Success {
        schema: SchemaDescription,
        analysis: Value,
        config: SourceConfig,
    },
    Error {
        message: String,
    },
}

impl SourceOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, SourceOutcome::Success { .. })
    }

    pub fn analysis(&self) -> Option<&Value> {
        match self {
            SourceOutcome::Success { analysis, .. } => Some(analysis),
            SourceOutcome::Error { .. } => None,
        }
    }

    pub fn schema(&self) -> Option<&SchemaDescription> {
        match self {
            SourceOutcome::Success { schema, .. } => Some(schema),
            SourceOutcome::Error { .. } => None,
        }
    }

    /// Export shape. The schema is only included on request.
    pub fn to_json(&self, include_schema: bool) -> Value {
        match self {
            SourceOutcome::Success {
                schema,
                analysis,
                config,
            } => {
                let mut entry = json!({
                    "status": "success",
                    "analysis": analysis,
                    "config": config,
                });
                if include_schema {
                    entry["schema_data"] = serde_json::to_value(schema).unwrap_or(Value::Null);
                }
                entry
            }
            SourceOutcome::Error { message } => json!({"status": "error", "message": message}),
        }
    }
}

/// Everything one `analyze_all` call produced, in registration order.
#[derive(Debug, Clone, Default)]
pub struct RunResults {
    pub sources: Vec<(String, SourceOutcome)>,
    pub patterns: Option<Value>,
}

impl RunResults {
    pub fn get(&self, name: &str) -> Option<&SourceOutcome> {
        self.sources.iter().find(|(n, _)| n == name).map(|(_, o)| o)
    }

    pub fn successes(
        &self,
    ) -> impl Iterator<Item = (&str, &SchemaDescription, &Value, &SourceConfig)> {
        self.sources.iter().filter_map(|(name, outcome)| match outcome {
            SourceOutcome::Success {
                schema,
                analysis,
                config,
            } => Some((name.as_str(), schema, analysis, config)),
            SourceOutcome::Error { .. } => None,
        })
    }

    pub fn success_count(&self) -> usize {
        self.successes().count()
    }

    /// Percentage of registered sources that reached the analyzed state.
    pub fn success_rate(&self) -> f64 {
        if self.sources.is_empty() {
            0.0
        } else {
            self.success_count() as f64 / self.sources.len() as f64 * 100.0
        }
    }

    pub fn to_json(&self, include_schema: bool) -> Value {
        let mut map = Map::new();
        for (name, outcome) in &self.sources {
            map.insert(name.clone(), outcome.to_json(include_schema));
        }
        if let Some(patterns) = &self.patterns {
            map.insert(
                PATTERNS_KEY.to_string(),
                json!({"status": "success", "analysis": patterns}),
            );
        }
        Value::Object(map)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunPhase {
    Idle,
    Extracting(String),
    Analyzing(String),
    ComparingAcrossSources,
    Exporting,
    Done,
}

/// Directory layout of one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputLayout {
    /// Flat exports and `analysis.log`.
    pub output_dir: PathBuf,
    /// Raw charts, `<output_dir>_graphs`.
    pub graphs_dir: PathBuf,
    /// Consolidated reports, kept after cleanup.
    pub report_dir: PathBuf,
}

impl OutputLayout {
    pub fn new(output_dir: impl Into<PathBuf>, report_dir: impl Into<PathBuf>) -> Self {
        let output_dir = output_dir.into();
        let mut graphs = output_dir.clone().into_os_string();
        graphs.push("_graphs");
        Self {
            graphs_dir: PathBuf::from(graphs),
            output_dir,
            report_dir: report_dir.into(),
        }
    }
}

impl Default for OutputLayout {
    fn default() -> Self {
        Self::new(DEFAULT_OUTPUT_DIR, DEFAULT_REPORT_DIR)
    }
}

/// Files produced by [`Orchestrator::export`].
#[derive(Debug, Clone, Default, Serialize)]
pub struct ExportSummary {
    pub timestamp: String,
    pub files: Vec<PathBuf>,
    pub charts: BTreeMap<String, Vec<PathBuf>>,
    pub reports: BTreeMap<String, ReportPaths>,
}

pub struct Orchestrator {
    sources: Vec<(String, SourceConfig)>,
    analyzer: SchemaAnalyzer,
    patterns: PatternAnalyzer,
    layout: OutputLayout,
    generate_charts: bool,
    phase: RunPhase,
}

impl Orchestrator {
    pub fn new(backend: Arc<dyn CompletionBackend>, layout: OutputLayout) -> Self {
        Self {
            sources: Vec::new(),
            analyzer: SchemaAnalyzer::new(backend.clone()),
            patterns: PatternAnalyzer::new(backend),
            layout,
            generate_charts: true,
            phase: RunPhase::Idle,
        }
    }

    pub fn with_params(mut self, params: GenerationParams) -> Self {
        self.analyzer = self.analyzer.with_params(params);
        self.patterns = self.patterns.with_params(params);
        self
    }

    pub fn with_limits(mut self, limits: TruncationLimits) -> Self {
        self.analyzer = self.analyzer.with_limits(limits);
        self
    }

    pub fn with_charts(mut self, enabled: bool) -> Self {
        self.generate_charts = enabled;
        self
    }

    pub fn layout(&self) -> &OutputLayout {
        &self.layout
    }

    pub fn phase(&self) -> &RunPhase {
        &self.phase
    }

    /// Registers a source. A repeated name replaces the earlier entry in place.
    pub fn add_source(&mut self, name: &str, connection_string: &str, db_type: &str, description: &str) {
        let config = SourceConfig {
            connection_string: connection_string.to_string(),
            db_type: db_type.to_string(),
            description: description.to_string(),
        };
        match self.sources.iter_mut().find(|(n, _)| n == name) {
            Some(slot) => slot.1 = config,
            None => self.sources.push((name.to_string(), config)),
        }
        info!("Added database: {} ({})", name, db_type);
    }

    pub fn source_count(&self) -> usize {
        self.sources.len()
    }

    fn enter(&mut self, phase: RunPhase) {
        self.phase = phase;
    }

    /// Extracts and analyzes every source in turn, then compares the
    /// successful ones when there are at least two.
    pub async fn analyze_all(&mut self) -> RunResults {
        info!("Starting multi-database analysis");
        let mut results = RunResults::default();
        let sources = self.sources.clone();

        for (name, config) in sources {
            let outcome = self.analyze_source(&name, &config).await;
            if let SourceOutcome::Error { message } = &outcome {
                error!("Error analyzing {}: {}", name, message);
            } else {
                info!("Successfully analyzed: {}", name);
            }
            results.sources.push((name, outcome));
        }

        let patterns = {
            let successful: Vec<SourceSummary<'_>> = results
                .successes()
                .map(|(name, schema, analysis, config)| SourceSummary {
                    name,
                    description: &config.description,
                    database_kind: &schema.database_kind,
                    analysis,
                })
                .collect();

            if successful.len() >= 2 {
                self.enter(RunPhase::ComparingAcrossSources);
                info!("Running cross-database pattern analysis");
                Some(self.patterns.compare(&successful).await)
            } else {
                None
            }
        };
        results.patterns = patterns;

        info!(
            "Analysis complete - {} of {} databases analyzed",
            results.success_count(),
            results.sources.len()
        );
        self.enter(RunPhase::Idle);
        results
    }

    async fn analyze_source(&mut self, name: &str, config: &SourceConfig) -> SourceOutcome {
        self.enter(RunPhase::Extracting(name.to_string()));
        info!("Analyzing database: {}", name);

        let schema = match ConnectionDescriptor::parse_as(&config.connection_string, &config.db_type) {
            Ok(descriptor) => extract(&descriptor).await,
            Err(e) => Err(e),
        };
        let schema = match schema {
            Ok(schema) => schema,
            Err(e) => {
                return SourceOutcome::Error {
                    message: format!("Schema extraction failed: {}", e),
                }
            }
        };

        self.enter(RunPhase::Analyzing(name.to_string()));
        let analysis = self.analyzer.analyze(&schema).await;
        SourceOutcome::Success {
            schema,
            analysis,
            config: config.clone(),
        }
    }

    /// Writes every flat export, the comprehensive report, charts and the
    /// consolidated reports. Per-source chart or report failures are logged
    /// and skipped.
    pub fn export(&mut self, results: &RunResults) -> Result<ExportSummary> {
        self.enter(RunPhase::Exporting);
        let now = chrono::Local::now();
        let timestamp = now.format("%Y%m%d_%H%M%S").to_string();
        let out = &self.layout.output_dir;
        fs::create_dir_all(out)
            .with_context(|| format!("Failed to create {}", out.display()))?;

        let mut summary = ExportSummary {
            timestamp: timestamp.clone(),
            ..Default::default()
        };

        for (name, _, analysis, config) in results.successes() {
            let path = out.join(format!("{}_analysis_{}.json", name, timestamp));
            let document = json!({
                "database_name": name,
                "timestamp": timestamp,
                "config": config,
                "analysis": analysis,
            });
            write_json(&path, &document)?;
            info!("Exported {} analysis to {}", name, path.display());
            summary.files.push(path);
        }

        if let Some(patterns) = &results.patterns {
            let path = out.join(format!("cross_database_patterns_{}.json", timestamp));
            write_json(&path, &json!({"status": "success", "analysis": patterns}))?;
            info!("Exported cross-database patterns to {}", path.display());
            summary.files.push(path);
        }

        let combined = out.join(format!("complete_analysis_{}.json", timestamp));
        write_json(&combined, &results.to_json(false))?;
        summary.files.push(combined);

        let report = out.join(format!("reverse_engineering_report_{}.md", timestamp));
        let generated = now.format("%Y-%m-%d %H:%M:%S").to_string();
        fs::write(&report, comprehensive_report(results, &generated))
            .with_context(|| format!("Failed to write {}", report.display()))?;
        info!("Comprehensive report generated: {}", report.display());
        summary.files.push(report);

        let renderer = ChartRenderer::new(&self.layout.graphs_dir);
        let assembler = ReportAssembler::new(&self.layout.report_dir);

        for (name, outcome) in &results.sources {
            let Some(schema) = outcome.schema() else {
                continue;
            };
            let charts: BTreeMap<ChartKind, PathBuf> = if self.generate_charts {
                let charts = renderer.render(schema, outcome.analysis(), name);
                if !charts.is_empty() {
                    match renderer.write_index_page(name, &charts) {
                        Ok(page) => info!("Generated HTML report: {}", page.display()),
                        Err(e) => warn!("Failed to write chart index for {}: {}", name, e),
                    }
                }
                charts
            } else {
                BTreeMap::new()
            };
            summary
                .charts
                .insert(name.clone(), charts.values().cloned().collect());

            let source_path = source_path(outcome);
            match assembler.assemble(name, &source_path, outcome, &charts) {
                Ok(paths) => {
                    summary.reports.insert(name.clone(), paths);
                }
                Err(e) => error!("Error generating consolidated report for {}: {}", name, e),
            }
        }

        self.enter(RunPhase::Done);
        Ok(summary)
    }

    /// Removes the flat export and raw chart directories. The consolidated
    /// report directory is kept.
    pub fn cleanup(&self) -> Result<()> {
        for dir in [&self.layout.output_dir, &self.layout.graphs_dir] {
            if dir.exists() {
                fs::remove_dir_all(dir)
                    .with_context(|| format!("Failed to remove {}", dir.display()))?;
                info!("Removed: {}", dir.display());
            }
        }
        Ok(())
    }
}

fn source_path(outcome: &SourceOutcome) -> String {
    match outcome {
        SourceOutcome::Success { config, .. } => ConnectionDescriptor::parse(&config.connection_string)
            .ok()
            .and_then(|d| d.file_path())
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| crate::db::redact(&config.connection_string)),
        SourceOutcome::Error { .. } => String::new(),
    }
}

fn write_json(path: &Path, value: &Value) -> Result<()> {
    let text = serde_json::to_string_pretty(value)?;
    fs::write(path, text).with_context(|| format!("Failed to write {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::scripted::ScriptedBackend;
    use rusqlite::Connection;
    use tempfile::TempDir;

    const ANALYSIS: &str = r#"Here you go: {"reverse_engineering_analysis": {"business_domain_identification": {"primary_domain": "retail", "confidence_score": 90}}}"#;

    fn make_db(dir: &TempDir, name: &str) -> PathBuf {
        let path = dir.path().join(format!("{}.db", name));
        let conn = Connection::open(&path).unwrap();
        conn.execute_batch(
            "CREATE TABLE customers (id INTEGER PRIMARY KEY, email TEXT);
             CREATE TABLE orders (id INTEGER PRIMARY KEY, customer_id INTEGER REFERENCES customers(id));
             INSERT INTO customers (email) VALUES ('a@example.com');",
        )
        .unwrap();
        path
    }

    fn orchestrator(dir: &TempDir, backend: Arc<ScriptedBackend>) -> Orchestrator {
        Orchestrator::new(
            backend,
            OutputLayout::new(dir.path().join("analysis_results"), dir.path().join("consolidated")),
        )
    }

    #[tokio::test]
    async fn failed_source_is_isolated_and_patterns_use_successes() {
        let dir = tempfile::tempdir().unwrap();
        let backend = Arc::new(ScriptedBackend::replying(ANALYSIS));
        let mut orch = orchestrator(&dir, backend.clone());

        orch.add_source("shop_a", &make_db(&dir, "a").display().to_string(), "sqlite", "first");
        orch.add_source("broken", &dir.path().join("missing.db").display().to_string(), "sqlite", "");
        orch.add_source("shop_b", &make_db(&dir, "b").display().to_string(), "sqlite", "second");

        let results = orch.analyze_all().await;

        assert_eq!(results.sources.len(), 3);
        assert_eq!(results.success_count(), 2);
        assert!(matches!(results.get("broken"), Some(SourceOutcome::Error { .. })));
        assert!(results.patterns.is_some());
        // two schema analyses plus six cross-source prompts
        assert_eq!(backend.calls(), 8);
        let patterns = results.patterns.as_ref().unwrap();
        assert_eq!(patterns["sources"], json!(["shop_a", "shop_b"]));
        assert!((results.success_rate() - 66.666).abs() < 0.01);
    }

    #[tokio::test]
    async fn single_source_never_compares() {
        let dir = tempfile::tempdir().unwrap();
        let backend = Arc::new(ScriptedBackend::replying(ANALYSIS));
        let mut orch = orchestrator(&dir, backend.clone());
        orch.add_source("only", &make_db(&dir, "only").display().to_string(), "sqlite", "");

        let results = orch.analyze_all().await;

        assert_eq!(results.success_count(), 1);
        assert!(results.patterns.is_none());
        assert_eq!(backend.calls(), 1);
    }

    #[tokio::test]
    async fn export_writes_flat_files_reports_and_cleans_up() {
        let dir = tempfile::tempdir().unwrap();
        let backend = Arc::new(ScriptedBackend::replying(ANALYSIS));
        let mut orch = orchestrator(&dir, backend);
        orch.add_source("shop", &make_db(&dir, "shop").display().to_string(), "sqlite", "");
        orch.add_source("gone", "nowhere.db", "sqlite", "");

        let results = orch.analyze_all().await;
        let summary = orch.export(&results).unwrap();
        assert_eq!(orch.phase(), &RunPhase::Done);

        let names: Vec<String> = summary
            .files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert!(names.contains(&format!("shop_analysis_{}.json", summary.timestamp)));
        assert!(names.contains(&format!("complete_analysis_{}.json", summary.timestamp)));
        assert!(names.contains(&format!("reverse_engineering_report_{}.md", summary.timestamp)));
        assert!(!names.iter().any(|n| n.starts_with("cross_database_patterns")));

        let combined: Value = serde_json::from_str(
            &fs::read_to_string(orch.layout().output_dir.join(format!("complete_analysis_{}.json", summary.timestamp)))
                .unwrap(),
        )
        .unwrap();
        assert_eq!(combined["shop"]["status"], "success");
        assert!(combined["shop"].get("schema_data").is_none());
        assert_eq!(combined["gone"]["status"], "error");

        let report = fs::read_to_string(&summary.files[2]).unwrap();
        assert!(report.contains("**Total Databases Analyzed:** 1"));
        assert!(report.contains("**Analysis Success Rate:** 50.0%"));
        assert!(report.contains("- **Primary Domain:** retail"));

        assert!(summary.reports.contains_key("shop"));
        assert!(!summary.reports.contains_key("gone"));
        assert!(!summary.charts["shop"].is_empty());
        assert!(orch.layout().graphs_dir.join("shop_analysis_report.html").exists());

        orch.cleanup().unwrap();
        assert!(!orch.layout().output_dir.exists());
        assert!(!orch.layout().graphs_dir.exists());
        assert!(summary.reports["shop"].markdown.exists());
        assert!(dir.path().join("consolidated/shop_graphs").exists());
    }

    #[tokio::test]
    async fn declared_type_picks_the_reader() {
        let dir = tempfile::tempdir().unwrap();
        let backend = Arc::new(ScriptedBackend::replying(ANALYSIS));
        let mut orch = orchestrator(&dir, backend);
        let renamed = dir.path().join("shop.data");
        fs::rename(make_db(&dir, "shop"), &renamed).unwrap();

        orch.add_source("shop", &renamed.display().to_string(), "sqlite", "");
        orch.add_source("mislabeled", &make_db(&dir, "other").display().to_string(), "postgresql", "");

        let results = orch.analyze_all().await;
        assert!(results.get("shop").unwrap().is_success());
        let Some(SourceOutcome::Error { message }) = results.get("mislabeled") else {
            panic!("mislabeled source should fail");
        };
        assert!(message.contains("not a postgresql:// URL"));
    }

    #[tokio::test]
    async fn charts_can_be_disabled() {
        let dir = tempfile::tempdir().unwrap();
        let backend = Arc::new(ScriptedBackend::replying(ANALYSIS));
        let mut orch = orchestrator(&dir, backend).with_charts(false);
        orch.add_source("shop", &make_db(&dir, "shop").display().to_string(), "sqlite", "");

        let results = orch.analyze_all().await;
        let summary = orch.export(&results).unwrap();
        assert!(summary.charts["shop"].is_empty());
        assert!(!orch.layout().graphs_dir.exists());
    }
}
