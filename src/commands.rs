use crate::ai::{AIService, CachedBackend, CompletionBackend, RecordExt};
use crate::config::Settings;
use crate::db::{ConnectionDescriptor, Dialect};
use crate::orchestrator::{ExportSummary, Orchestrator, OutputLayout, RunResults, SourceOutcome};
use crate::storage::ResponseCache;
use globset::Glob;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info, warn};
use walkdir::WalkDir;

pub const LIST_DIRECTORIES: [&str; 2] = ["New_DB", "."];
pub const DATABASE_EXTENSIONS: [&str; 3] = ["db", "sqlite", "sqlite3"];
pub const UPLOAD_EXTENSIONS: [&str; 5] = [".db", ".sqlite", ".sqlite3", ".csv", ".json"];
pub const DEFAULT_UPLOAD_ROOT: &str = "analysis_results";
pub const COMPLETE_MARKER: &str = "analysis_complete.txt";
pub const ERROR_MARKER: &str = "analysis_error.txt";

/// One source to analyze. Missing name and description are derived from the path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyzeRequest {
    pub target: String,
    pub name: Option<String>,
    pub description: Option<String>,
}

impl AnalyzeRequest {
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            name: None,
            description: None,
        }
    }

    pub fn source_name(&self) -> String {
        if let Some(name) = self.name.as_deref().filter(|n| !n.trim().is_empty()) {
            return name.trim().to_string();
        }
        if is_network_target(&self.target) {
            return "database".to_string();
        }
        Path::new(&self.target)
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "database".to_string())
    }

    pub fn description(&self) -> String {
        match self.description.as_deref().filter(|d| !d.trim().is_empty()) {
            Some(d) => d.to_string(),
            None => format!("Analysis of {} database", self.source_name()),
        }
    }
}

fn is_network_target(target: &str) -> bool {
    target.starts_with("postgres://") || target.starts_with("postgresql://")
}

#[derive(Debug, Clone, Serialize)]
pub struct DatabaseReport {
    pub name: String,
    pub analysis: Value,
    pub table_count: usize,
    pub export: ExportSummary,
    pub cleaned_up: bool,
}

/// Builds the hosted-model backend, wrapped in the response cache when one is
/// configured.
pub fn build_backend(settings: &Settings) -> Result<Arc<dyn CompletionBackend>, String> {
    let service = AIService::new(settings.ai_config()).map_err(|e| e.to_string())?;
    if !service.is_configured() {
        return Err(
            "No API key configured. Set SCHEMALENS_API_KEY, LLM_API_KEY or GEMINI_API_KEY".to_string(),
        );
    }
    let backend: Arc<dyn CompletionBackend> = match &settings.llm.cache_path {
        Some(path) => {
            let cache = ResponseCache::open(path).map_err(|e| {
                format!("Failed to open response cache {}: {}", path.display(), e)
            })?;
            info!("Using response cache at {}", path.display());
            Arc::new(CachedBackend::new(service, cache))
        }
        None => Arc::new(service),
    };
    Ok(backend)
}

fn build_orchestrator(
    backend: Arc<dyn CompletionBackend>,
    settings: &Settings,
    layout: OutputLayout,
) -> Orchestrator {
    Orchestrator::new(backend, layout)
        .with_params(settings.generation_params())
        .with_limits(settings.truncation_limits())
        .with_charts(settings.analysis.generate_charts)
}

pub async fn analyze_database(
    settings: &Settings,
    request: &AnalyzeRequest,
) -> Result<DatabaseReport, String> {
    let backend = build_backend(settings)?;
    analyze_database_with(backend, settings, request).await
}

/// Runs the full pipeline for one source. Exports are written even when the
/// source fails, and the failure is then returned as the error.
pub async fn analyze_database_with(
    backend: Arc<dyn CompletionBackend>,
    settings: &Settings,
    request: &AnalyzeRequest,
) -> Result<DatabaseReport, String> {
    if !is_network_target(&request.target) && !Path::new(&request.target).exists() {
        return Err(format!("Database file not found: {}", request.target));
    }
    let descriptor = ConnectionDescriptor::parse(&request.target).map_err(|e| e.to_string())?;
    let name = request.source_name();

    let layout = OutputLayout::new(&settings.output.output_dir, &settings.output.report_dir);
    let mut orch = build_orchestrator(backend, settings, layout);
    orch.add_source(
        &name,
        &request.target,
        descriptor.dialect.as_str(),
        &request.description(),
    );

    let results = orch.analyze_all().await;
    let export = orch.export(&results).map_err(|e| format!("{:#}", e))?;

    let cleaned_up = settings.output.cleanup;
    if cleaned_up {
        orch.cleanup().map_err(|e| format!("{:#}", e))?;
    }

    match results.get(&name) {
        Some(SourceOutcome::Success { schema, analysis, .. }) => Ok(DatabaseReport {
            table_count: schema.tables.len(),
            analysis: analysis.clone(),
            name,
            export,
            cleaned_up,
        }),
        Some(SourceOutcome::Error { message }) => Err(message.clone()),
        None => Err(format!("No result recorded for {}", name)),
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchTally {
    pub total: usize,
    pub succeeded: Vec<String>,
    pub failed: Vec<(String, String)>,
}

pub fn matching_files(dir: &Path, pattern: &str) -> Result<Vec<PathBuf>, String> {
    if !dir.is_dir() {
        return Err(format!("Directory not found: {}", dir.display()));
    }
    let matcher = Glob::new(pattern)
        .map_err(|e| format!("Invalid pattern '{}': {}", pattern, e))?
        .compile_matcher();

    let entries = fs::read_dir(dir).map_err(|e| e.to_string())?;
    let mut files: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.is_file())
        .filter(|path| path.file_name().is_some_and(|f| matcher.is_match(f)))
        .collect();
    files.sort();
    Ok(files)
}

pub async fn batch_analyze(settings: &Settings, dir: &Path, pattern: &str) -> Result<BatchTally, String> {
    let backend = build_backend(settings)?;
    batch_analyze_with(backend, settings, dir, pattern).await
}

/// Analyzes every file in `dir` matching `pattern`, continuing past failures.
pub async fn batch_analyze_with(
    backend: Arc<dyn CompletionBackend>,
    settings: &Settings,
    dir: &Path,
    pattern: &str,
) -> Result<BatchTally, String> {
    let files = matching_files(dir, pattern)?;
    if files.is_empty() {
        return Err(format!("No {} files found in {}", pattern, dir.display()));
    }
    info!("Found {} databases to analyze", files.len());

    let mut tally = BatchTally {
        total: files.len(),
        ..Default::default()
    };
    for (i, file) in files.iter().enumerate() {
        let request = AnalyzeRequest::new(file.display().to_string());
        let name = request.source_name();
        info!("Analyzing {}/{}: {}", i + 1, files.len(), name);
        match analyze_database_with(backend.clone(), settings, &request).await {
            Ok(_) => tally.succeeded.push(name),
            Err(e) => {
                error!("Failed to analyze {}: {}", name, e);
                tally.failed.push((name, e));
            }
        }
    }
    Ok(tally)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DatabaseFile {
    pub path: PathBuf,
    pub size: u64,
}

pub fn list_databases() -> Vec<DatabaseFile> {
    let dirs: Vec<&Path> = LIST_DIRECTORIES.iter().map(Path::new).collect();
    list_databases_in(&dirs)
}

/// SQLite files directly inside each directory. Missing directories are skipped.
pub fn list_databases_in(dirs: &[&Path]) -> Vec<DatabaseFile> {
    let mut found = Vec::new();
    for dir in dirs {
        let Ok(entries) = fs::read_dir(dir) else {
            continue;
        };
        let mut files: Vec<DatabaseFile> = entries
            .filter_map(|entry| entry.ok())
            .filter(|entry| {
                entry
                    .path()
                    .extension()
                    .and_then(|e| e.to_str())
                    .is_some_and(|e| DATABASE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
            })
            .filter_map(|entry| {
                let meta = entry.metadata().ok()?;
                meta.is_file().then(|| DatabaseFile {
                    path: entry.path(),
                    size: meta.len(),
                })
            })
            .collect();
        files.sort_by(|a, b| a.path.cmp(&b.path));
        found.extend(files);
    }
    found
}

/// Where one uploaded analysis lives on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadLocation {
    pub analysis_id: String,
    pub user_id: String,
    pub dir: PathBuf,
}

impl UploadLocation {
    pub fn new(root: &Path, user_id: &str, analysis_id: Option<&str>) -> Result<Self, String> {
        let analysis_id = match analysis_id.filter(|id| !id.trim().is_empty()) {
            Some(id) => id.trim().to_string(),
            None => uuid::Uuid::new_v4().to_string(),
        };
        for (label, value) in [("user id", user_id), ("analysis id", analysis_id.as_str())] {
            if !is_safe_segment(value) {
                return Err(format!("Invalid {}: '{}'", label, value));
            }
        }
        Ok(Self {
            dir: root.join(user_id).join(&analysis_id),
            user_id: user_id.to_string(),
            analysis_id,
        })
    }

    fn layout(&self) -> OutputLayout {
        OutputLayout::new(self.dir.join("analysis"), self.dir.join("consolidated"))
    }
}

fn is_safe_segment(value: &str) -> bool {
    !value.is_empty()
        && value != "."
        && value != ".."
        && !value.contains(['/', '\\'])
}

fn now_iso() -> String {
    chrono::Local::now().to_rfc3339()
}

fn error_response(message: impl Into<String>) -> Value {
    json!({
        "status": "error",
        "message": message.into(),
        "timestamp": now_iso(),
    })
}

fn write_marker(dir: &Path, marker: &str, body: &Value) {
    let path = dir.join(marker);
    let text = serde_json::to_string_pretty(body).unwrap_or_else(|_| body.to_string());
    if let Err(e) = fs::write(&path, text) {
        warn!("Failed to write {}: {}", path.display(), e);
    }
}

/// Fails the upload: records the error marker and returns the response.
fn fail_upload(location: &UploadLocation, message: String) -> Value {
    error!("Upload analysis {} failed: {}", location.analysis_id, message);
    let response = error_response(message);
    write_marker(&location.dir, ERROR_MARKER, &response);
    response
}

pub async fn analyze_upload(
    settings: &Settings,
    file: &Path,
    analysis_id: Option<&str>,
    user_id: &str,
    root: &Path,
) -> Value {
    let location = match UploadLocation::new(root, user_id, analysis_id) {
        Ok(location) => location,
        Err(e) => return error_response(e),
    };
    match build_backend(settings) {
        Ok(backend) => analyze_upload_at(backend, settings, file, &location).await,
        Err(e) => {
            if let Err(io) = fs::create_dir_all(&location.dir) {
                warn!("Failed to create {}: {}", location.dir.display(), io);
            }
            fail_upload(&location, e)
        }
    }
}

/// Runs one uploaded file through the pipeline into `location.dir`, keeping
/// every intermediate file for display. Never fails; errors become a
/// `status: error` response and an error marker.
pub async fn analyze_upload_at(
    backend: Arc<dyn CompletionBackend>,
    settings: &Settings,
    file: &Path,
    location: &UploadLocation,
) -> Value {
    if let Err(e) = fs::create_dir_all(&location.dir) {
        return error_response(format!(
            "Failed to create {}: {}",
            location.dir.display(),
            e
        ));
    }

    let file_name = file
        .file_name()
        .map(|f| f.to_string_lossy().into_owned())
        .unwrap_or_default();
    let extension = file
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy().to_ascii_lowercase()))
        .unwrap_or_default();

    if !UPLOAD_EXTENSIONS.contains(&extension.as_str()) {
        return fail_upload(
            location,
            format!(
                "Unsupported file format: {}. Supported formats: {}",
                extension,
                UPLOAD_EXTENSIONS.join(", ")
            ),
        );
    }

    info!(
        "Starting analysis of {} for user {}",
        file_name, location.user_id
    );
    let target = file.display().to_string();
    let descriptor = match ConnectionDescriptor::parse(&target) {
        Ok(d) => d,
        Err(e) => return fail_upload(location, format!("Analysis error: {}", e)),
    };
    let request = AnalyzeRequest {
        target,
        name: None,
        description: None,
    };
    let name = request.source_name();

    let mut orch = build_orchestrator(backend, settings, location.layout());
    orch.add_source(
        &name,
        &request.target,
        descriptor.dialect.as_str(),
        &format!("Web upload analysis of {}", name),
    );
    let results = orch.analyze_all().await;
    if let Err(e) = orch.export(&results) {
        return fail_upload(location, format!("Analysis error: {:#}", e));
    }

    match results.get(&name) {
        Some(SourceOutcome::Success { .. }) => {
            let response = json!({
                "status": "success",
                "message": format!("Successfully analyzed {}", file_name),
                "analysis_id": location.analysis_id,
                "file_name": file_name,
                "analysis_type": analysis_type(descriptor.dialect),
                "results": web_results(&results, &name, &file_name, location),
                "output_dir": location.dir,
                "timestamp": now_iso(),
            });
            write_marker(
                &location.dir,
                COMPLETE_MARKER,
                &json!({
                    "analysis_id": location.analysis_id,
                    "file_name": file_name,
                    "completed_at": response["timestamp"],
                }),
            );
            response
        }
        Some(SourceOutcome::Error { message }) => {
            fail_upload(location, format!("Analysis failed for {}: {}", file_name, message))
        }
        None => fail_upload(location, format!("Analysis failed for {}", file_name)),
    }
}

fn analysis_type(dialect: Dialect) -> &'static str {
    match dialect {
        Dialect::Sqlite | Dialect::Postgresql => "database",
        Dialect::Documents | Dialect::Csv => "data_file",
    }
}

fn web_results(results: &RunResults, name: &str, file_name: &str, location: &UploadLocation) -> Value {
    let mut summary = json!({});
    let mut insights = json!({});
    if let Some(SourceOutcome::Success { schema, analysis, .. }) = results.get(name) {
        let domain = ["reverse_engineering_analysis", "business_domain_identification"];
        summary["business_domain"] = json!(analysis.text(&[domain[0], domain[1], "primary_domain"]));
        summary["confidence_score"] =
            json!(analysis.number(&[domain[0], domain[1], "confidence_score"]).unwrap_or(0.0));
        summary["total_tables"] = json!(schema.tables.len());
        summary["tables"] = json!(schema.tables.iter().map(|(t, _)| t).collect::<Vec<_>>());
        if let Some(quality) = analysis.at(&["data_quality_assessment"]) {
            insights["data_quality"] = quality.clone();
        }
    }

    let mut files_generated = Vec::new();
    let mut visualizations = Vec::new();
    for path in walk_files(&location.dir) {
        let Some(file) = path.file_name().map(|f| f.to_string_lossy().into_owned()) else {
            continue;
        };
        let relative = path
            .strip_prefix(&location.dir)
            .unwrap_or(&path)
            .to_string_lossy()
            .into_owned();
        let extension = path
            .extension()
            .map(|e| e.to_string_lossy().to_ascii_lowercase())
            .unwrap_or_default();
        let is_report = matches!(extension.as_str(), "html" | "pdf");
        let is_chart = matches!(extension.as_str(), "svg" | "png" | "jpg");
        if is_report || is_chart {
            files_generated.push(json!({
                "name": file,
                "path": relative,
                "type": if is_report { "report" } else { "visualization" },
            }));
        }
        if is_chart {
            visualizations.push(json!({"name": file, "path": relative, "type": "chart"}));
        }
    }

    json!({
        "analysis_id": location.analysis_id,
        "file_name": file_name,
        "analysis_date": now_iso(),
        "summary": summary,
        "files_generated": files_generated,
        "insights": insights,
        "visualizations": visualizations,
    })
}

fn walk_files(dir: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(dir)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .collect();
    files.sort();
    files
}

fn read_marker(path: &Path) -> Value {
    match fs::read_to_string(path) {
        Ok(text) => serde_json::from_str(&text).unwrap_or(Value::String(text)),
        Err(e) => Value::String(e.to_string()),
    }
}

/// Reports progress of an upload from its marker files.
pub fn analysis_status(analysis_id: &str, user_id: &str, root: &Path) -> Value {
    let location = match UploadLocation::new(root, user_id, Some(analysis_id)) {
        Ok(location) => location,
        Err(e) => return json!({"status": "error", "message": format!("Error checking status: {}", e)}),
    };
    if !location.dir.exists() {
        return json!({"status": "not_found", "message": "Analysis not found"});
    }

    let complete = location.dir.join(COMPLETE_MARKER);
    if complete.exists() {
        return json!({
            "status": "completed",
            "message": "Analysis completed successfully",
            "data": read_marker(&complete),
        });
    }

    let failed = location.dir.join(ERROR_MARKER);
    if failed.exists() {
        return json!({
            "status": "error",
            "message": "Analysis failed",
            "error": read_marker(&failed),
        });
    }

    json!({"status": "in_progress", "message": "Analysis in progress"})
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::scripted::ScriptedBackend;
    use rusqlite::Connection;
    use tempfile::TempDir;

    const ANALYSIS: &str = r#"{"reverse_engineering_analysis": {"business_domain_identification": {"primary_domain": "library", "confidence_score": 75}}, "data_quality_assessment": {"integrity_analysis": {"completeness_score": 80}}}"#;

    fn settings(dir: &TempDir) -> Settings {
        let mut s = Settings::default();
        s.output.output_dir = dir.path().join("analysis_results");
        s.output.report_dir = dir.path().join("consolidated_analysis");
        s
    }

    fn make_db(path: &Path) {
        let conn = Connection::open(path).unwrap();
        conn.execute_batch(
            "CREATE TABLE books (id INTEGER PRIMARY KEY, title TEXT NOT NULL, author_id INTEGER);
             INSERT INTO books (title) VALUES ('Dune');",
        )
        .unwrap();
    }

    fn backend() -> Arc<dyn CompletionBackend> {
        Arc::new(ScriptedBackend::replying(ANALYSIS))
    }

    #[test]
    fn request_defaults_come_from_the_path() {
        let request = AnalyzeRequest::new("data/library.sqlite3");
        assert_eq!(request.source_name(), "library");
        assert_eq!(request.description(), "Analysis of library database");

        let named = AnalyzeRequest {
            name: Some("books".into()),
            description: Some("catalog".into()),
            ..AnalyzeRequest::new("x.db")
        };
        assert_eq!(named.source_name(), "books");
        assert_eq!(named.description(), "catalog");
        assert_eq!(AnalyzeRequest::new("postgres://u@h/db").source_name(), "database");
    }

    #[tokio::test]
    async fn single_database_run_cleans_up_intermediate_output() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("library.db");
        make_db(&db);
        let s = settings(&dir);

        let report = analyze_database_with(backend(), &s, &AnalyzeRequest::new(db.display().to_string()))
            .await
            .unwrap();

        assert_eq!(report.name, "library");
        assert_eq!(report.table_count, 1);
        assert!(report.cleaned_up);
        assert!(!s.output.output_dir.exists());
        assert!(s.output.report_dir.join("library_consolidated_analysis.md").exists());
    }

    #[tokio::test]
    async fn missing_file_is_reported_before_any_work() {
        let dir = tempfile::tempdir().unwrap();
        let err = analyze_database_with(backend(), &settings(&dir), &AnalyzeRequest::new("nope.db"))
            .await
            .unwrap_err();
        assert!(err.contains("Database file not found"));
    }

    #[tokio::test]
    async fn batch_continues_past_failures() {
        let dir = tempfile::tempdir().unwrap();
        let dbs = dir.path().join("dbs");
        fs::create_dir(&dbs).unwrap();
        make_db(&dbs.join("a.db"));
        make_db(&dbs.join("c.db"));
        fs::write(dbs.join("b.db"), vec![b'x'; 4096]).unwrap();
        fs::write(dbs.join("notes.txt"), b"skip me").unwrap();

        let tally = batch_analyze_with(backend(), &settings(&dir), &dbs, "*.db")
            .await
            .unwrap();
        assert_eq!(tally.total, 3);
        assert_eq!(tally.succeeded, vec!["a", "c"]);
        assert_eq!(tally.failed.len(), 1);
        assert_eq!(tally.failed[0].0, "b");
    }

    #[tokio::test]
    async fn batch_without_matches_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = batch_analyze_with(backend(), &settings(&dir), dir.path(), "*.sqlite")
            .await
            .unwrap_err();
        assert!(err.starts_with("No *.sqlite files found"));
        assert!(matching_files(&dir.path().join("absent"), "*.db").is_err());
    }

    #[test]
    fn lists_only_sqlite_files() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("b.sqlite"), b"12345").unwrap();
        fs::write(dir.path().join("a.db"), b"1").unwrap();
        fs::write(dir.path().join("readme.md"), b"1").unwrap();
        let missing = dir.path().join("New_DB");

        let found = list_databases_in(&[missing.as_path(), dir.path()]);
        let names: Vec<_> = found
            .iter()
            .map(|f| f.path.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.db", "b.sqlite"]);
        assert_eq!(found[1].size, 5);
    }

    #[tokio::test]
    async fn upload_success_writes_marker_and_lists_charts() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("library.db");
        make_db(&db);
        let root = dir.path().join("uploads");
        let location = UploadLocation::new(&root, "user-1", Some("run-7")).unwrap();

        let response = analyze_upload_at(backend(), &settings(&dir), &db, &location).await;

        assert_eq!(response["status"], "success");
        assert_eq!(response["analysis_type"], "database");
        assert_eq!(response["results"]["summary"]["business_domain"], "library");
        assert_eq!(response["results"]["summary"]["tables"], json!(["books"]));
        assert!(!response["results"]["visualizations"].as_array().unwrap().is_empty());
        assert!(location.dir.join("consolidated/library_consolidated_analysis.html").exists());
        assert!(location.dir.join("analysis").exists());

        let status = analysis_status("run-7", "user-1", &root);
        assert_eq!(status["status"], "completed");
        assert_eq!(status["data"]["file_name"], "library.db");
    }

    #[tokio::test]
    async fn unsupported_uploads_fail_with_marker() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("uploads");
        for (id, file) in [("one", "data.parquet"), ("two", "sheet.xlsx")] {
            let path = dir.path().join(file);
            fs::write(&path, b"x").unwrap();
            let location = UploadLocation::new(&root, "u", Some(id)).unwrap();
            let response = analyze_upload_at(backend(), &settings(&dir), &path, &location).await;
            assert_eq!(response["status"], "error");
            assert_eq!(analysis_status(id, "u", &root)["status"], "error");
        }
        let response = analysis_status("one", "u", &root);
        assert!(response["error"]["message"]
            .as_str()
            .unwrap()
            .starts_with("Unsupported file format: .parquet"));
        let message = analysis_status("two", "u", &root)["error"]["message"].clone();
        assert!(message.as_str().unwrap().starts_with("Unsupported file format: .xlsx"));
        assert!(!message.as_str().unwrap().contains(".xlsx,"));
    }

    #[cfg(unix)]
    #[test]
    fn walk_files_lists_nested_files_without_following_links() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("consolidated/shop_graphs");
        fs::create_dir_all(&nested).unwrap();
        fs::write(dir.path().join("consolidated/report.html"), "<html/>").unwrap();
        fs::write(nested.join("sizes.svg"), "<svg/>").unwrap();
        std::os::unix::fs::symlink(dir.path(), nested.join("loop")).unwrap();

        let files = walk_files(dir.path());
        let relative: Vec<_> = files
            .iter()
            .map(|p| p.strip_prefix(dir.path()).unwrap().to_path_buf())
            .collect();
        assert_eq!(
            relative,
            vec![
                PathBuf::from("consolidated/report.html"),
                PathBuf::from("consolidated/shop_graphs/sizes.svg"),
            ]
        );
    }

    #[test]
    fn status_reports_not_found_and_in_progress() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(analysis_status("x", "u", dir.path())["status"], "not_found");
        fs::create_dir_all(dir.path().join("u/x")).unwrap();
        assert_eq!(analysis_status("x", "u", dir.path())["status"], "in_progress");
        assert_eq!(analysis_status("..", "u", dir.path())["status"], "error");
    }

    #[test]
    fn upload_location_generates_ids() {
        let dir = tempfile::tempdir().unwrap();
        let location = UploadLocation::new(dir.path(), "u", None).unwrap();
        assert_eq!(location.analysis_id.len(), 36);
        assert!(UploadLocation::new(dir.path(), "a/b", None).is_err());
    }
}
