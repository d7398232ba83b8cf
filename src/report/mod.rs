pub mod html;
pub mod markdown;

use crate::ai::record::RecordExt;
use crate::charts::ChartKind;
use crate::error::ReportError;
use crate::orchestrator::SourceOutcome;
use markdown::{consolidated_report, human_size, ConsolidatedInput};
use serde::Serialize;
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

pub const DEFAULT_REPORT_DIR: &str = "consolidated_analysis";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportPaths {
    pub markdown: PathBuf,
    pub json: PathBuf,
    pub html: PathBuf,
}

/// Writes the per-source consolidated report set and its chart assets.
pub struct ReportAssembler {
    output_dir: PathBuf,
}

impl ReportAssembler {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn assemble(
        &self,
        source_name: &str,
        source_path: &str,
        result: &SourceOutcome,
        charts: &BTreeMap<ChartKind, PathBuf>,
    ) -> Result<ReportPaths, ReportError> {
        info!("Generating consolidated report for {}", source_name);
        fs::create_dir_all(&self.output_dir)?;

        let embedded = self.copy_assets(source_name, charts);
        let empty = json!({});
        let analysis = result.analysis().unwrap_or(&empty);
        let generated = chrono::Local::now();
        let file_size = fs::metadata(source_path)
            .map(|m| human_size(m.len()))
            .unwrap_or_else(|_| "Unknown".to_string());

        let input = ConsolidatedInput {
            source_name,
            source_path,
            file_size: file_size.clone(),
            generated: generated.format("%Y-%m-%d %H:%M:%S").to_string(),
            analysis,
            schema: result.schema(),
            charts: &embedded,
        };

        let paths = ReportPaths {
            markdown: self
                .output_dir
                .join(format!("{}_consolidated_analysis.md", source_name)),
            json: self
                .output_dir
                .join(format!("{}_consolidated_analysis.json", source_name)),
            html: self
                .output_dir
                .join(format!("{}_consolidated_analysis.html", source_name)),
        };

        fs::write(&paths.markdown, consolidated_report(&input))?;

        let document = consolidated_json(&input, &generated.to_rfc3339());
        fs::write(&paths.json, serde_json::to_string_pretty(&document)?)?;

        fs::write(&paths.html, html::consolidated_page(&input))?;

        info!(
            "Consolidated report written: {}, {}, {}",
            paths.markdown.display(),
            paths.json.display(),
            paths.html.display()
        );
        Ok(paths)
    }

    /// Copies charts into `<output>/<source>_graphs/`. A chart that cannot be
    /// copied keeps its original path.
    fn copy_assets(
        &self,
        source_name: &str,
        charts: &BTreeMap<ChartKind, PathBuf>,
    ) -> BTreeMap<ChartKind, PathBuf> {
        let mut embedded = BTreeMap::new();
        if charts.is_empty() {
            return embedded;
        }
        let assets = self.output_dir.join(format!("{}_graphs", source_name));
        if let Err(e) = fs::create_dir_all(&assets) {
            warn!("Could not create asset folder {}: {}", assets.display(), e);
            return charts.clone();
        }

        for (kind, original) in charts {
            let Some(file_name) = original.file_name() else {
                continue;
            };
            let target = assets.join(file_name);
            match fs::copy(original, &target) {
                Ok(_) => {
                    embedded.insert(*kind, target);
                }
                Err(e) => {
                    warn!("Could not copy {} chart: {}", kind.slug(), e);
                    embedded.insert(*kind, original.clone());
                }
            }
        }
        embedded
    }
}

fn section(analysis: &Value, path: &[&str]) -> Value {
    analysis.at(path).cloned().unwrap_or_else(|| json!({}))
}

fn consolidated_json(input: &ConsolidatedInput<'_>, timestamp: &str) -> Value {
    let a = input.analysis;
    let reverse = "reverse_engineering_analysis";

    let mut schema = Map::new();
    if let Some(description) = input.schema {
        for (name, table) in &description.tables {
            schema.insert(
                name.clone(),
                json!({
                    "columns": table.columns.len(),
                    "rows": table.row_count,
                    "column_details": table.columns,
                }),
            );
        }
    }

    let graph_files: Map<String, Value> = input
        .charts
        .iter()
        .filter_map(|(kind, path)| {
            let file = path.file_name()?.to_string_lossy();
            let relative = format!("{}_graphs/{}", input.source_name, file);
            Some((kind.slug().to_string(), Value::from(relative)))
        })
        .collect();

    json!({
        "metadata": {
            "database_name": input.source_name,
            "file_path": input.source_path,
            "analysis_timestamp": timestamp,
            "file_size": input.file_size,
            "generated_graphs": input.charts.len(),
        },
        "business_analysis": {
            "domain": section(a, &[reverse, "business_domain_identification"]),
            "architecture": section(a, &[reverse, "data_model_architecture"]),
            "entities": section(a, &[reverse, "entity_relationship_mapping"]),
            "use_cases": section(a, &["use_case_analysis"]),
            "migration": section(a, &["migration_insights"]),
        },
        "technical_analysis": {
            "data_quality": section(a, &["data_quality_assessment"]),
            "performance": section(a, &["performance_analysis"]),
            "schema": schema,
        },
        "visualizations": {
            "available_graphs": input.charts.keys().map(|k| k.slug()).collect::<Vec<_>>(),
            "graph_files": graph_files,
        },
        "recommendations": {
            "immediate_actions": [
                "Implement missing indexes",
                "Address data quality issues",
                "Set up performance monitoring"
            ],
            "short_term": [
                "Query optimization",
                "Index strategy implementation",
                "Data validation rules"
            ],
            "long_term": [
                "Architecture modernization",
                "Scalability planning",
                "Integration strategy"
            ]
        }
    })
}
