use async_trait::async_trait;
use rusqlite::Connection;
use schemalens_lib::ai::{CompletionBackend, GenerationParams};
use schemalens_lib::commands::{self, AnalyzeRequest, UploadLocation};
use schemalens_lib::error::LlmError;
use schemalens_lib::{Orchestrator, OutputLayout, Settings, SourceOutcome};
use serde_json::{json, Value};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Answers SQLite schema prompts as a shop, every other source as a library,
/// and cross-source prompts with a fixed comparison.
#[derive(Default)]
struct RoutingBackend {
    schema_calls: AtomicUsize,
    pattern_calls: AtomicUsize,
}

fn shop_analysis() -> Value {
    json!({
        "reverse_engineering_analysis": {
            "business_domain_identification": {
                "primary_domain": "e-commerce",
                "confidence_score": 92,
                "sub_domains": ["orders", "customers"],
                "business_processes": ["Checkout"]
            },
            "entity_relationship_mapping": {
                "core_entities": [
                    {"entity_name": "Customer", "table_name": "customers", "business_purpose": "Buyers"},
                    {"entity_name": "Order", "table_name": "orders", "business_purpose": "Purchases"}
                ]
            }
        },
        "performance_analysis": {"bottleneck_identification": ["Unindexed customer_id"]}
    })
}

fn library_analysis() -> Value {
    json!({
        "reverse_engineering_analysis": {
            "business_domain_identification": {"primary_domain": "library", "confidence_score": "80%"},
            "entity_relationship_mapping": {
                "core_entities": [{"entity_name": "Customer", "table_name": "members"}]
            }
        }
    })
}

#[async_trait]
impl CompletionBackend for RoutingBackend {
    async fn complete(&self, prompt: &str, _: &GenerationParams) -> Result<String, LlmError> {
        if prompt.contains("Database Analyses:") {
            self.pattern_calls.fetch_add(1, Ordering::SeqCst);
            let answer = json!({
                "reverse_engineering_insights": {
                    "domain_analysis": {"common_patterns": ["Customer-centric model"]},
                    "architectural_pattern_comparison": {"key_differences": ["Order history depth"]}
                }
            });
            return Ok(format!("```json\n{}\n```", answer));
        }
        self.schema_calls.fetch_add(1, Ordering::SeqCst);
        let record = if prompt.contains("Database Type: sqlite") {
            shop_analysis()
        } else {
            library_analysis()
        };
        Ok(record.to_string())
    }

    fn describe(&self) -> String {
        "routing/test".into()
    }
}

struct Unreachable;

#[async_trait]
impl CompletionBackend for Unreachable {
    async fn complete(&self, _: &str, _: &GenerationParams) -> Result<String, LlmError> {
        Err(LlmError::Api {
            provider: "Gemini",
            status: 401,
            body: "invalid key".into(),
        })
    }

    fn describe(&self) -> String {
        "unreachable/test".into()
    }
}

fn shop_db(dir: &Path) -> PathBuf {
    let path = dir.join("shop.db");
    let conn = Connection::open(&path).unwrap();
    conn.execute_batch(
        "CREATE TABLE customers (id INTEGER PRIMARY KEY, email TEXT NOT NULL UNIQUE, phone TEXT);
         CREATE TABLE orders (
             id INTEGER PRIMARY KEY,
             customer_id INTEGER NOT NULL REFERENCES customers(id) ON DELETE CASCADE,
             total REAL CHECK (total >= 0)
         );
         CREATE INDEX idx_orders_customer ON orders(customer_id);
         CREATE VIEW big_orders AS SELECT * FROM orders WHERE total > 100;
         INSERT INTO customers (email) VALUES ('a@example.com'), ('b@example.com');
         INSERT INTO orders (customer_id, total) VALUES (1, 10.5), (1, 250), (2, 99);",
    )
    .unwrap();
    path
}

fn members_csv(dir: &Path) -> PathBuf {
    let path = dir.join("members.csv");
    fs::write(
        &path,
        "member_id,name,joined,fee\n1,\"Smith, Ann\",2021-04-01,12.5\n2,Bo,2022-01-09,10\n",
    )
    .unwrap();
    path
}

fn settings(dir: &Path) -> Settings {
    let mut settings = Settings::default();
    settings.output.output_dir = dir.join("analysis_results");
    settings.output.report_dir = dir.join("consolidated_analysis");
    settings
}

#[tokio::test]
async fn multi_source_run_compares_and_exports() {
    let dir = tempfile::tempdir().unwrap();
    let backend = Arc::new(RoutingBackend::default());
    let layout = OutputLayout::new(dir.path().join("out"), dir.path().join("reports"));
    let mut orch = Orchestrator::new(backend.clone(), layout);

    orch.add_source("shop", &shop_db(dir.path()).display().to_string(), "sqlite", "Web shop");
    orch.add_source("missing", "postgres://nobody@127.0.0.1:1/none", "postgresql", "");
    orch.add_source("members", &members_csv(dir.path()).display().to_string(), "csv", "Club roster");

    let results = orch.analyze_all().await;
    assert_eq!(results.sources.len(), 3);
    assert_eq!(results.success_count(), 2);
    assert!(!results.get("missing").unwrap().is_success());
    assert_eq!(backend.schema_calls.load(Ordering::SeqCst), 2);
    assert_eq!(backend.pattern_calls.load(Ordering::SeqCst), 6);

    let Some(SourceOutcome::Success { schema, .. }) = results.get("shop") else {
        panic!("shop should have been analyzed");
    };
    let orders = &schema.tables.iter().find(|(n, _)| n == "orders").unwrap().1;
    assert_eq!(orders.row_count, Some(3));
    assert_eq!(orders.foreign_keys.len(), 1);
    assert_eq!(schema.views, vec!["big_orders".to_string()]);

    let patterns = results.patterns.as_ref().unwrap();
    assert_eq!(patterns["similarity_scores"]["shop vs members"], json!(0.5));

    let summary = orch.export(&results).unwrap();
    let out = dir.path().join("out");
    let ts = &summary.timestamp;
    for name in [
        format!("shop_analysis_{}.json", ts),
        format!("members_analysis_{}.json", ts),
        format!("cross_database_patterns_{}.json", ts),
        format!("complete_analysis_{}.json", ts),
        format!("reverse_engineering_report_{}.md", ts),
    ] {
        assert!(out.join(&name).exists(), "missing {}", name);
    }

    let report = fs::read_to_string(out.join(format!("reverse_engineering_report_{}.md", ts))).unwrap();
    assert!(report.contains("## Cross-Database Pattern Analysis"));
    assert!(report.contains("- **Domain Patterns:** Customer-centric model"));
    assert!(report.contains("- **shop vs members:** 0.50"));
    assert!(report.contains("- **Confidence:** 80%"));

    let md = fs::read_to_string(&summary.reports["shop"].markdown).unwrap();
    assert!(md.contains("e-commerce"));
    assert!(md.contains("./shop_graphs/shop_"));
    assert!(dir.path().join("reports/members_consolidated_analysis.html").exists());
    assert!(!summary.reports.contains_key("missing"));

    orch.cleanup().unwrap();
    assert!(!out.exists());
    assert!(summary.reports["shop"].json.exists());
}

#[tokio::test]
async fn model_failure_still_produces_reports() {
    let dir = tempfile::tempdir().unwrap();
    let db = shop_db(dir.path());
    let settings = settings(dir.path());

    let report = commands::analyze_database_with(
        Arc::new(Unreachable),
        &settings,
        &AnalyzeRequest::new(db.display().to_string()),
    )
    .await
    .unwrap();

    assert!(report.analysis.get("error").is_some());
    let md = fs::read_to_string(settings.output.report_dir.join("shop_consolidated_analysis.md")).unwrap();
    assert!(md.contains("- **Domain:** Unknown"));
    assert!(md.contains("CREATE TABLE orders ("));
}

#[tokio::test]
async fn json_upload_runs_through_the_document_path() {
    let dir = tempfile::tempdir().unwrap();
    let export = dir.path().join("events.json");
    fs::write(
        &export,
        r#"{"events": [{"kind": "click", "at": 1}, {"kind": "view", "meta": {"page": "/"}}]}"#,
    )
    .unwrap();
    let root = dir.path().join("uploads");
    let location = UploadLocation::new(&root, "alice", Some("a-1")).unwrap();

    let response = commands::analyze_upload_at(
        Arc::new(RoutingBackend::default()),
        &settings(dir.path()),
        &export,
        &location,
    )
    .await;

    assert_eq!(response["status"], "success");
    assert_eq!(response["analysis_type"], "data_file");
    assert_eq!(response["results"]["summary"]["total_tables"], 0);
    assert_eq!(
        commands::analysis_status("a-1", "alice", &root)["status"],
        "completed"
    );
}
