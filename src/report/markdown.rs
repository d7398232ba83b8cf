use crate::ai::context::{SchemaContext, TruncationLimits};
use crate::ai::record::{RecordExt, UNKNOWN};
use crate::charts::ChartKind;
use crate::db::schema::SchemaDescription;
use crate::orchestrator::RunResults;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt::Write;
use std::path::PathBuf;

pub const NO_ITEMS: &str = "- No items identified";

const DOMAIN: [&str; 2] = ["reverse_engineering_analysis", "business_domain_identification"];
const ARCHITECTURE: [&str; 2] = ["reverse_engineering_analysis", "data_model_architecture"];
const ENTITIES: [&str; 2] = ["reverse_engineering_analysis", "entity_relationship_mapping"];
const INTEGRITY: [&str; 2] = ["data_quality_assessment", "integrity_analysis"];

fn path<'a>(prefix: &[&'a str], key: &'a str) -> Vec<&'a str> {
    let mut p = prefix.to_vec();
    p.push(key);
    p
}

/// `snake_case` to `Title Case`.
pub fn title_case(name: &str) -> String {
    name.split(['_', ' '])
        .filter(|w| !w.is_empty())
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

pub fn human_size(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} bytes", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}

pub fn thousands(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::new();
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

/// `87%`-style rendering of a numeric field, or the placeholder.
fn score(analysis: &Value, path: &[&str], suffix: &str) -> String {
    match analysis.number(path) {
        Some(n) if n.fract() == 0.0 => format!("{}{}", n as i64, suffix),
        Some(n) => format!("{}{}", n, suffix),
        None => UNKNOWN.to_string(),
    }
}

fn bullet_list(items: &[String]) -> String {
    if items.is_empty() {
        return NO_ITEMS.to_string();
    }
    items
        .iter()
        .map(|i| format!("- {}", i))
        .collect::<Vec<_>>()
        .join("\n")
}

fn joined(items: &[String]) -> String {
    if items.is_empty() {
        UNKNOWN.to_string()
    } else {
        items.join(", ")
    }
}

fn entities(analysis: &Value, limit: usize, with_volume: bool) -> String {
    let list = analysis.list(&path(&ENTITIES, "core_entities"));
    if list.is_empty() {
        return "No entities identified".to_string();
    }
    let mut out = Vec::new();
    for entity in list.iter().take(limit) {
        out.push(format!(
            "- **{}** ({})",
            entity.text(&["entity_name"]),
            entity.text(&["table_name"])
        ));
        out.push(format!("  - Purpose: {}", entity.text(&["business_purpose"])));
        if with_volume {
            out.push(format!("  - Data Volume: {}", entity.text(&["data_volume"])));
        }
    }
    out.join("\n")
}

fn relationships(analysis: &Value) -> String {
    let list = analysis.list(&path(&ENTITIES, "relationships"));
    if list.is_empty() {
        return "No relationships identified".to_string();
    }
    list.iter()
        .map(|rel| {
            format!(
                "- **{} ↔ {}** ({})\n  - Meaning: {}",
                rel.text(&["parent_entity"]),
                rel.text(&["child_entity"]),
                rel.text(&["relationship_type"]),
                rel.text(&["business_meaning"])
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn use_cases(analysis: &Value, limit: usize) -> String {
    let list = analysis.list(&["use_case_analysis", "primary_use_cases"]);
    if list.is_empty() {
        return "No use cases identified".to_string();
    }
    list.iter()
        .take(limit)
        .map(|uc| {
            format!(
                "- **{}**\n  - Description: {}\n  - Business Value: {}",
                uc.text(&["use_case"]),
                uc.text_or(&["description"], "No description"),
                uc.text(&["business_value"])
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn schema_overview(schema: Option<&SchemaDescription>) -> String {
    let Some(schema) = schema else {
        return "Schema not available".to_string();
    };
    if schema.tables.is_empty() {
        return "No tables found".to_string();
    }
    schema
        .tables
        .iter()
        .map(|(name, t)| {
            let rows = t
                .row_count
                .map(|n| format!("{} rows", thousands(n)))
                .unwrap_or_else(|| "unknown rows".to_string());
            format!("- **{}:** {} columns, {}", name, t.columns.len(), rows)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn chart_links(source_name: &str, charts: &BTreeMap<ChartKind, PathBuf>) -> String {
    if charts.is_empty() {
        return "No graphs generated".to_string();
    }
    let mut out = String::new();
    for (kind, file) in charts {
        let file_name = file
            .file_name()
            .map(|f| f.to_string_lossy().into_owned())
            .unwrap_or_default();
        let _ = writeln!(out, "- **{}:** {}", kind.title(), file_name);
        let _ = writeln!(
            out,
            "![{}](./{}_graphs/{})\n",
            kind.title(),
            source_name,
            file_name
        );
    }
    out.trim_end().to_string()
}

/// Inputs of a single-source consolidated report.
pub struct ConsolidatedInput<'a> {
    pub source_name: &'a str,
    pub source_path: &'a str,
    pub file_size: String,
    pub generated: String,
    pub analysis: &'a Value,
    pub schema: Option<&'a SchemaDescription>,
    pub charts: &'a BTreeMap<ChartKind, PathBuf>,
}

pub fn consolidated_report(input: &ConsolidatedInput<'_>) -> String {
    let a = input.analysis;
    let mut md = String::new();

    let _ = write!(
        md,
        "# {name} Database - Consolidated Analysis Report\n\n\
         **Generated:** {generated}  \n\
         **Database File:** {path}  \n\
         **Analysis Type:** AI-assisted database reverse engineering\n\n\
         ---\n\n\
         ## Executive Summary\n\n\
         This report covers the **{raw}** database: business interpretation, schema structure, \
         data quality, performance observations and the generated charts.\n\n\
         ---\n\n",
        name = title_case(input.source_name),
        raw = input.source_name,
        generated = input.generated,
        path = input.source_path,
    );

    let _ = write!(
        md,
        "## Business Domain Analysis\n\n\
         ### Primary Domain\n\
         - **Domain:** {}\n\
         - **Confidence:** {}\n\
         - **Sub-domains:** {}\n\n\
         ### Business Processes\n{}\n\n---\n\n",
        a.text(&path(&DOMAIN, "primary_domain")),
        score(a, &path(&DOMAIN, "confidence_score"), "%"),
        joined(&a.strings(&path(&DOMAIN, "sub_domains"))),
        bullet_list(&a.strings(&path(&DOMAIN, "business_processes"))),
    );

    let _ = write!(
        md,
        "## Data Model Architecture\n\n\
         ### Design Characteristics\n\
         - **Architectural Style:** {}\n\
         - **Design Pattern:** {}\n\
         - **Normalization Level:** {}\n\
         - **Flexibility Score:** {}\n\n\
         ### Schema Overview\n{}\n\n---\n\n",
        a.text(&path(&ARCHITECTURE, "architectural_style")),
        a.text(&path(&ARCHITECTURE, "design_pattern")),
        a.text(&path(&ARCHITECTURE, "normalization_level")),
        score(a, &path(&ARCHITECTURE, "flexibility_score"), "/100"),
        schema_overview(input.schema),
    );

    let _ = write!(
        md,
        "## Core Entities & Relationships\n\n\
         ### Primary Entities\n{}\n\n\
         ### Key Relationships\n{}\n\n---\n\n",
        entities(a, usize::MAX, true),
        relationships(a),
    );

    let _ = write!(
        md,
        "## Data Quality Assessment\n\n\
         ### Integrity Analysis\n\
         - **Referential Integrity:** {}\n\
         - **Data Consistency:** {}\n\
         - **Completeness Score:** {}\n\n\
         ### Accuracy Indicators\n{}\n\n---\n\n",
        a.text(&path(&INTEGRITY, "referential_integrity")),
        a.text(&path(&INTEGRITY, "data_consistency")),
        score(a, &path(&INTEGRITY, "completeness_score"), "/100"),
        bullet_list(&a.strings(&path(&INTEGRITY, "accuracy_indicators"))),
    );

    let _ = write!(
        md,
        "## Performance Analysis\n\n\
         ### Query Patterns\n{}\n\n\
         ### Identified Bottlenecks\n{}\n\n\
         ### Optimization Opportunities\n{}\n\n---\n\n",
        bullet_list(&a.strings(&["performance_analysis", "query_patterns"])),
        bullet_list(&a.strings(&["performance_analysis", "bottleneck_identification"])),
        bullet_list(&a.strings(&["performance_analysis", "optimization_opportunities"])),
    );

    let _ = write!(
        md,
        "## Use Case Analysis\n\n\
         ### Primary Use Cases\n{}\n\n\
         ### Analytics Opportunities\n{}\n\n---\n\n",
        use_cases(a, usize::MAX),
        bullet_list(&a.strings(&["use_case_analysis", "analytics_opportunities"])),
    );

    let _ = write!(
        md,
        "## Migration & Integration Insights\n\n\
         ### Complexity Assessment\n\
         - **Migration Complexity:** {}\n\
         - **Effort Estimate:** {}\n\n\
         ### Integration Recommendations\n{}\n\n---\n\n",
        a.text(&["migration_insights", "complexity_assessment"]),
        a.text(&["migration_insights", "migration_effort"]),
        bullet_list(&a.strings(&["migration_insights", "integration_recommendations"])),
    );

    let _ = write!(
        md,
        "## Generated Visualizations\n\n{}\n\n---\n\n",
        chart_links(input.source_name, input.charts)
    );

    md.push_str(RECOMMENDATIONS);

    let ddl = input
        .schema
        .map(|s| {
            SchemaContext::from_schema(
                s,
                TruncationLimits {
                    max_tables: usize::MAX,
                    max_columns: usize::MAX,
                },
            )
            .to_ddl_summary()
        })
        .unwrap_or_default();

    let _ = write!(
        md,
        "## Technical Details\n\n\
         ### Database Information\n\
         - **File Path:** {}\n\
         - **File Size:** {}\n\
         - **Analysis Timestamp:** {}\n\
         - **Generated Graphs:** {} visualizations\n\n",
        input.source_path,
        input.file_size,
        input.generated,
        input.charts.len(),
    );
    if !ddl.is_empty() {
        let _ = write!(md, "### Schema DDL\n\n```sql\n{}```\n\n", ddl);
    }
    md.push_str("---\n\n*Generated automatically from schema introspection and model analysis.*\n");
    md
}

const RECOMMENDATIONS: &str = "## Recommendations & Next Steps\n\n\
### Immediate Actions (1-2 weeks)\n\
1. **Performance Optimization:** Implement identified missing indexes\n\
2. **Data Quality:** Address any data consistency issues\n\
3. **Monitoring:** Set up performance monitoring for identified bottlenecks\n\n\
### Short-term Improvements (1-2 months)\n\
1. **Query Optimization:** Refactor slow queries based on analysis\n\
2. **Index Strategy:** Implement composite indexes for common join patterns\n\
3. **Data Validation:** Add constraints and validation rules\n\n\
### Long-term Considerations (3-6 months)\n\
1. **Architecture Review:** Consider modernization opportunities\n\
2. **Scalability Planning:** Design for future growth\n\
3. **Integration Strategy:** Plan for system integration needs\n\n---\n\n";

const PATTERN_INSIGHTS: [&str; 2] = ["common_patterns", "reverse_engineering_insights"];

/// Multi-source report written next to the flat exports.
pub fn comprehensive_report(results: &RunResults, generated: &str) -> String {
    let mut md = String::new();
    let _ = write!(
        md,
        "# Database Reverse Engineering Report\n\
         **Generated:** {}\n\
         **Analysis Type:** Multi-Database Pattern Analysis\n\n\
         ## Executive Summary\n\n\
         This report examines every registered data source to extract its data model, \
         business logic and integration opportunities.\n\n\
         ## Database Overview\n\n\
         **Total Databases Analyzed:** {}\n\
         **Analysis Success Rate:** {:.1}%\n\n",
        generated,
        results.success_count(),
        results.success_rate(),
    );

    for (name, _schema, a, _config) in results.successes() {
        let _ = write!(
            md,
            "### {}\n\n\
             #### Business Domain\n\
             - **Primary Domain:** {}\n\
             - **Confidence:** {}\n\
             - **Sub-domains:** {}\n\n\
             #### Data Model Architecture\n\
             - **Design Pattern:** {}\n\
             - **Normalization Level:** {}\n\
             - **Architectural Style:** {}\n\
             - **Flexibility Score:** {}\n\n\
             #### Core Entities\n{}\n\n\
             #### Data Quality Assessment\n\
             - **Referential Integrity:** {}\n\
             - **Data Consistency:** {}\n\
             - **Completeness Score:** {}\n\n\
             #### Performance Analysis\n\
             **Identified Bottlenecks:**\n{}\n\n\
             #### Primary Use Cases\n{}\n\n",
            title_case(name),
            a.text(&path(&DOMAIN, "primary_domain")),
            score(a, &path(&DOMAIN, "confidence_score"), "%"),
            joined(&a.strings(&path(&DOMAIN, "sub_domains"))),
            a.text(&path(&ARCHITECTURE, "design_pattern")),
            a.text(&path(&ARCHITECTURE, "normalization_level")),
            a.text(&path(&ARCHITECTURE, "architectural_style")),
            score(a, &path(&ARCHITECTURE, "flexibility_score"), "/100"),
            entities(a, 5, false),
            a.text(&path(&INTEGRITY, "referential_integrity")),
            a.text(&path(&INTEGRITY, "data_consistency")),
            score(a, &path(&INTEGRITY, "completeness_score"), "/100"),
            bullet_list(
                &a.strings(&["performance_analysis", "bottleneck_identification"])
                    .into_iter()
                    .take(3)
                    .collect::<Vec<_>>()
            ),
            use_cases(a, 3),
        );
    }

    if let Some(patterns) = &results.patterns {
        md.push_str("## Cross-Database Pattern Analysis\n\n### Common Architectural Patterns\n");
        let domain = path(&path(&PATTERN_INSIGHTS, "domain_analysis"), "common_patterns");
        let differences = path(
            &path(&PATTERN_INSIGHTS, "architectural_pattern_comparison"),
            "key_differences",
        );
        let _ = writeln!(
            md,
            "- **Domain Patterns:** {}",
            joined(&patterns.strings(&domain))
        );
        let _ = writeln!(
            md,
            "- **Architecture Comparison:** {}",
            joined(&patterns.strings(&differences))
        );
        if let Some(scores) = patterns.at(&["similarity_scores"]).and_then(Value::as_object) {
            if !scores.is_empty() {
                md.push_str("\n### Entity Similarity\n");
                for (pair, value) in scores {
                    let _ = writeln!(md, "- **{}:** {:.2}", pair, value.as_f64().unwrap_or(0.0));
                }
            }
        }
        md.push('\n');
    }

    md.push_str(CLOSING);
    md
}

const CLOSING: &str = "## Recommendations\n\n\
### Immediate Actions\n\
1. **Data Quality Improvement:** Address identified data quality issues\n\
2. **Performance Optimization:** Implement missing indexes and query optimizations\n\
3. **Security Enhancement:** Implement proper PII handling and access controls\n\n\
### Medium-term Improvements\n\
1. **Architecture Modernization:** Consider service boundaries around core entities\n\
2. **Integration Strategy:** Implement unified data model and API layer\n\
3. **Scalability Planning:** Design for horizontal scaling\n\n\
### Long-term Considerations\n\
1. **Event-driven Architecture:** Implement real-time data processing\n\
2. **Advanced Analytics:** Build comprehensive data warehouse\n\
3. **Predictive Workloads:** Use the consolidated data for forecasting\n\n\
## Conclusion\n\n\
The findings above can guide platform migration, integration architecture, performance work, \
data governance and scalability planning across the analyzed sources.\n";
