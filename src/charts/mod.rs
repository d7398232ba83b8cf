pub mod metrics;
pub mod svg;

use crate::db::schema::SchemaDescription;
use crate::error::ChartError;
use metrics::{
    data_type_stats, domain_summary, foreign_key_stats, index_stats, largest, performance_rows,
    relationship_graph, schema_overview, table_sizes, TOP_TABLES,
};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};
use svg::{escape_xml, Canvas};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ChartKind {
    SchemaOverview,
    EntityRelationship,
    TableSizes,
    DataTypes,
    IndexAnalysis,
    ForeignKeys,
    BusinessDomain,
    Performance,
}

impl ChartKind {
    pub const ALL: [ChartKind; 8] = [
        ChartKind::SchemaOverview,
        ChartKind::EntityRelationship,
        ChartKind::TableSizes,
        ChartKind::DataTypes,
        ChartKind::IndexAnalysis,
        ChartKind::ForeignKeys,
        ChartKind::BusinessDomain,
        ChartKind::Performance,
    ];

    pub fn slug(&self) -> &'static str {
        match self {
            ChartKind::SchemaOverview => "schema_overview",
            ChartKind::EntityRelationship => "entity_relationship",
            ChartKind::TableSizes => "table_sizes",
            ChartKind::DataTypes => "data_types",
            ChartKind::IndexAnalysis => "index_analysis",
            ChartKind::ForeignKeys => "foreign_keys",
            ChartKind::BusinessDomain => "business_domain",
            ChartKind::Performance => "performance",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            ChartKind::SchemaOverview => "Schema Overview",
            ChartKind::EntityRelationship => "Entity Relationships",
            ChartKind::TableSizes => "Table Sizes",
            ChartKind::DataTypes => "Data Types",
            ChartKind::IndexAnalysis => "Index Analysis",
            ChartKind::ForeignKeys => "Foreign Keys",
            ChartKind::BusinessDomain => "Business Domain",
            ChartKind::Performance => "Performance",
        }
    }

    pub fn file_name(&self, source_name: &str) -> String {
        format!("{}_{}.svg", source_name, self.slug())
    }
}

/// Writes one SVG per chart kind into a directory. Every kind is attempted on
/// its own; a failing kind is logged and left out of the result.
pub struct ChartRenderer {
    output_dir: PathBuf,
}

impl ChartRenderer {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn render(
        &self,
        schema: &SchemaDescription,
        analysis: Option<&Value>,
        source_name: &str,
    ) -> BTreeMap<ChartKind, PathBuf> {
        let mut charts = BTreeMap::new();
        if let Err(e) = fs::create_dir_all(&self.output_dir) {
            warn!(
                "Cannot create chart directory {}: {}",
                self.output_dir.display(),
                e
            );
            return charts;
        }

        for kind in ChartKind::ALL {
            match self.render_kind(kind, schema, analysis, source_name) {
                Ok(path) => {
                    debug!("Wrote {}", path.display());
                    charts.insert(kind, path);
                }
                Err(ChartError::Empty(reason)) => {
                    debug!("Skipping {} chart: {}", kind.slug(), reason);
                }
                Err(e) => warn!("Failed to render {} chart for {}: {}", kind.slug(), source_name, e),
            }
        }

        info!("Generated {} charts for {}", charts.len(), source_name);
        charts
    }

    fn render_kind(
        &self,
        kind: ChartKind,
        schema: &SchemaDescription,
        analysis: Option<&Value>,
        source_name: &str,
    ) -> Result<PathBuf, ChartError> {
        let title = format!("{}: {}", source_name, kind.title());
        let document = match kind {
            ChartKind::SchemaOverview => draw_schema_overview(&title, schema)?,
            ChartKind::EntityRelationship => draw_entity_relationship(&title, schema)?,
            ChartKind::TableSizes => draw_table_sizes(&title, schema)?,
            ChartKind::DataTypes => draw_data_types(&title, schema)?,
            ChartKind::IndexAnalysis => draw_index_analysis(&title, schema)?,
            ChartKind::ForeignKeys => draw_foreign_keys(&title, schema)?,
            ChartKind::BusinessDomain => {
                draw_business_domain(&title, analysis.ok_or(ChartError::Empty("no analysis"))?)?
            }
            ChartKind::Performance => draw_performance(&title, schema)?,
        };

        let path = self.output_dir.join(kind.file_name(source_name));
        fs::write(&path, document)?;
        Ok(path)
    }

    /// `<source>_analysis_report.html` with one image per rendered chart.
    pub fn write_index_page(
        &self,
        source_name: &str,
        charts: &BTreeMap<ChartKind, PathBuf>,
    ) -> Result<PathBuf, ChartError> {
        let mut html = String::new();
        writeln!(html, "<!DOCTYPE html>")?;
        writeln!(html, "<html>\n<head>")?;
        writeln!(html, "<meta charset=\"utf-8\">")?;
        writeln!(
            html,
            "<title>Database Analysis Report - {}</title>",
            escape_xml(source_name)
        )?;
        writeln!(
            html,
            "<style>\n  body {{ font-family: sans-serif; margin: 40px; }}\n  .chart {{ margin: 24px 0; }}\n  .chart img {{ max-width: 100%; border: 1px solid #ddd; }}\n</style>"
        )?;
        writeln!(html, "</head>\n<body>")?;
        writeln!(
            html,
            "<h1>Database Analysis Report: {}</h1>",
            escape_xml(source_name)
        )?;
        writeln!(
            html,
            "<p>Generated: {}</p>",
            chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
        )?;

        for (kind, path) in charts {
            let file = path
                .file_name()
                .map(|f| f.to_string_lossy().into_owned())
                .unwrap_or_default();
            writeln!(html, "<div class=\"chart\">")?;
            writeln!(html, "<h2>{}</h2>", kind.title())?;
            writeln!(
                html,
                "<img src=\"{}\" alt=\"{}\">",
                escape_xml(&file),
                kind.title()
            )?;
            writeln!(html, "</div>")?;
        }
        writeln!(html, "</body>\n</html>")?;

        fs::create_dir_all(&self.output_dir)?;
        let path = self
            .output_dir
            .join(format!("{}_analysis_report.html", source_name));
        fs::write(&path, html)?;
        Ok(path)
    }
}

fn require_tables(schema: &SchemaDescription) -> Result<(), ChartError> {
    if schema.tables.is_empty() {
        Err(ChartError::Empty("no tables"))
    } else {
        Ok(())
    }
}

fn usize_counts(rows: &[(String, usize)]) -> Vec<(String, f64)> {
    rows.iter().map(|(k, v)| (k.clone(), *v as f64)).collect()
}

fn draw_schema_overview(title: &str, schema: &SchemaDescription) -> Result<String, ChartError> {
    require_tables(schema)?;
    let rows = schema_overview(schema);
    let mut canvas = Canvas::new(title, 2, 2)?;

    let columns: Vec<_> = rows.iter().map(|r| (r.table.clone(), r.columns as f64)).collect();
    let pks: Vec<_> = rows.iter().map(|r| (r.table.clone(), r.primary_keys as f64)).collect();
    let fks: Vec<_> = rows.iter().map(|r| (r.table.clone(), r.fk_candidates as f64)).collect();
    canvas.bar_chart(canvas.panel(0), "Columns per Table", &columns)?;
    canvas.bar_chart(canvas.panel(1), "Primary Key Columns", &pks)?;
    canvas.bar_chart(canvas.panel(2), "Foreign Key Candidates (_id)", &fks)?;

    let summary = vec![
        format!("Database type: {}", schema.database_kind),
        format!("Total tables: {}", rows.len()),
        format!("Total columns: {}", schema.total_columns()),
        format!(
            "Tables with primary keys: {}",
            rows.iter().filter(|r| r.primary_keys > 0).count()
        ),
        format!(
            "Foreign key candidates: {}",
            rows.iter().map(|r| r.fk_candidates).sum::<usize>()
        ),
        format!("Views: {}", schema.views.len()),
    ];
    canvas.text_block(canvas.panel(3), "Summary", &summary)?;
    Ok(canvas.finish()?)
}

fn draw_entity_relationship(title: &str, schema: &SchemaDescription) -> Result<String, ChartError> {
    require_tables(schema)?;
    let (mut nodes, edges) = relationship_graph(schema);
    for edge in &edges {
        if !nodes.contains(&edge.to) {
            nodes.push(edge.to.clone());
        }
    }
    let position = |name: &str| nodes.iter().position(|n| n == name);
    let indexed: Vec<(usize, usize, String)> = edges
        .iter()
        .filter_map(|e| Some((position(&e.from)?, position(&e.to)?, e.label.clone())))
        .collect();

    let mut canvas = Canvas::new(title, 2, 2)?;
    let full = canvas.panel(0);
    let panel = svg::Panel {
        width: full.width * 2.0,
        height: full.height * 2.0,
        ..full
    };
    canvas.network(panel, "Foreign Key Relationships", &nodes, &indexed)?;
    Ok(canvas.finish()?)
}

fn draw_table_sizes(title: &str, schema: &SchemaDescription) -> Result<String, ChartError> {
    require_tables(schema)?;
    let sizes = table_sizes(schema);
    let mut canvas = Canvas::new(title, 2, 1)?;
    canvas.bar_chart(canvas.panel(0), "Rows per Table", &sizes_as_f64(&sizes))?;
    let top = largest(&sizes, TOP_TABLES);
    canvas.pie(
        canvas.panel(1),
        &format!("Top {} Tables by Rows", TOP_TABLES),
        &sizes_as_f64(&top),
        0.0,
    )?;
    Ok(canvas.finish()?)
}

fn sizes_as_f64(sizes: &[(String, u64)]) -> Vec<(String, f64)> {
    sizes.iter().map(|(k, v)| (k.clone(), *v as f64)).collect()
}

fn draw_data_types(title: &str, schema: &SchemaDescription) -> Result<String, ChartError> {
    let stats = data_type_stats(schema).ok_or(ChartError::Empty("no columns"))?;
    let mut canvas = Canvas::new(title, 2, 2)?;

    canvas.pie(canvas.panel(0), "Data Type Distribution", &usize_counts(&stats.type_counts), 0.0)?;
    canvas.bar_chart(
        canvas.panel(1),
        "Nullable Columns",
        &[
            ("Nullable".to_string(), stats.nullable as f64),
            ("Not Null".to_string(), stats.not_nullable as f64),
        ],
    )?;
    canvas.bar_chart(
        canvas.panel(2),
        "Primary Key Columns",
        &[
            ("Primary Key".to_string(), stats.primary_key as f64),
            ("Regular".to_string(), stats.not_primary_key as f64),
        ],
    )?;

    let series: Vec<String> = stats.type_counts.iter().map(|(t, _)| t.clone()).collect();
    let bars: Vec<(String, Vec<f64>)> = stats
        .by_table
        .iter()
        .map(|(table, types)| {
            let parts = series
                .iter()
                .map(|t| types.get(t).copied().unwrap_or(0) as f64)
                .collect();
            (table.clone(), parts)
        })
        .collect();
    canvas.stacked_bars(canvas.panel(3), "Types by Table", &series, &bars)?;
    Ok(canvas.finish()?)
}

fn draw_index_analysis(title: &str, schema: &SchemaDescription) -> Result<String, ChartError> {
    let stats = index_stats(schema).ok_or(ChartError::Empty("no indexes"))?;
    let mut canvas = Canvas::new(title, 2, 2)?;

    canvas.bar_chart(canvas.panel(0), "Indexes per Table", &usize_counts(&stats.per_table))?;
    canvas.pie(
        canvas.panel(1),
        "Unique vs Non-unique",
        &[
            ("Unique".to_string(), stats.unique as f64),
            ("Non-unique".to_string(), stats.non_unique as f64),
        ],
        0.0,
    )?;
    let histogram: Vec<(String, f64)> = stats
        .column_histogram
        .iter()
        .map(|(cols, n)| (format!("{} col", cols), *n as f64))
        .collect();
    canvas.bar_chart(canvas.panel(2), "Columns per Index", &histogram)?;
    canvas.text_block(
        canvas.panel(3),
        "Summary",
        &[
            format!("Total indexes: {}", stats.total),
            format!("Unique indexes: {}", stats.unique),
            format!("Tables with indexes: {}", stats.per_table.len()),
            format!("Average columns per index: {:.1}", stats.average_columns),
        ],
    )?;
    Ok(canvas.finish()?)
}

fn draw_foreign_keys(title: &str, schema: &SchemaDescription) -> Result<String, ChartError> {
    let stats = foreign_key_stats(schema).ok_or(ChartError::Empty("no foreign keys"))?;
    let mut canvas = Canvas::new(title, 2, 2)?;

    canvas.bar_chart(canvas.panel(0), "Outgoing References", &usize_counts(&stats.by_source))?;
    canvas.bar_chart(canvas.panel(1), "Incoming References", &usize_counts(&stats.by_target))?;
    canvas.pie(canvas.panel(2), "ON UPDATE Actions", &usize_counts(&stats.on_update), 0.0)?;
    canvas.pie(canvas.panel(3), "ON DELETE Actions", &usize_counts(&stats.on_delete), 0.0)?;
    Ok(canvas.finish()?)
}

fn draw_business_domain(title: &str, analysis: &Value) -> Result<String, ChartError> {
    let domain = domain_summary(analysis).ok_or(ChartError::Empty("no domain section"))?;
    let mut canvas = Canvas::new(title, 2, 2)?;

    canvas.pie(
        canvas.panel(0),
        &format!("Domain Confidence: {}", domain.primary_domain),
        &[
            ("Confidence".to_string(), domain.confidence),
            ("Uncertainty".to_string(), 100.0 - domain.confidence),
        ],
        0.5,
    )?;
    let ones = |items: &[String]| -> Vec<(String, f64)> {
        items.iter().map(|s| (s.clone(), 1.0)).collect()
    };
    canvas.bar_chart(canvas.panel(1), "Sub-domains", &ones(&domain.sub_domains))?;
    canvas.bar_chart(canvas.panel(2), "Business Processes", &ones(&domain.business_processes))?;
    canvas.text_block(
        canvas.panel(3),
        "Summary",
        &[
            format!("Primary domain: {}", domain.primary_domain),
            format!("Confidence: {}%", domain.confidence),
            format!("Sub-domains: {}", domain.sub_domains.len()),
            format!("Business processes: {}", domain.business_processes.len()),
        ],
    )?;
    Ok(canvas.finish()?)
}

fn draw_performance(title: &str, schema: &SchemaDescription) -> Result<String, ChartError> {
    require_tables(schema)?;
    let rows = performance_rows(schema);
    let mut canvas = Canvas::new(title, 2, 2)?;

    let points: Vec<(f64, f64, f64, String)> = rows
        .iter()
        .map(|r| {
            (
                r.column_count as f64,
                r.row_count as f64,
                r.index_count as f64,
                r.table.clone(),
            )
        })
        .collect();
    canvas.scatter(canvas.panel(0), "Columns vs Rows", ("columns", "rows"), &points)?;

    let ratios: Vec<(String, f64)> = rows.iter().map(|r| (r.table.clone(), r.index_ratio)).collect();
    canvas.bar_chart(canvas.panel(1), "Index Coverage Ratio", &ratios)?;

    let risky: Vec<(String, f64)> = rows
        .iter()
        .filter(|r| r.high_risk)
        .map(|r| (r.table.clone(), r.risk_score))
        .collect();
    canvas.bar_chart(canvas.panel(2), "High Risk Tables", &risky)?;

    let average_ratio = rows.iter().map(|r| r.index_ratio).sum::<f64>() / rows.len() as f64;
    canvas.text_block(
        canvas.panel(3),
        "Summary",
        &[
            format!("Tables analyzed: {}", rows.len()),
            format!("High risk tables: {}", risky.len()),
            format!("Average index ratio: {:.2}", average_ratio),
            format!(
                "Total rows: {}",
                rows.iter().map(|r| r.row_count).sum::<u64>()
            ),
        ],
    )?;
    Ok(canvas.finish()?)
}
