use super::markdown::{title_case, ConsolidatedInput};
use crate::ai::record::{RecordExt, UNKNOWN};
use crate::charts::svg::escape_xml;
use serde_json::Value;
use std::fmt::Write;

const STYLE: &str = r#"<style>
  body { font-family: 'Segoe UI', Tahoma, sans-serif; line-height: 1.6; margin: 0; padding: 20px; background: #f8f9fa; color: #333; }
  .container { max-width: 1200px; margin: 0 auto; background: white; padding: 30px; border-radius: 10px; }
  h1 { color: #2c3e50; text-align: center; border-bottom: 4px solid #3498db; padding-bottom: 15px; }
  h2 { color: #34495e; margin-top: 40px; border-left: 4px solid #3498db; padding-left: 15px; }
  .summary-box { background: #ecf0f1; padding: 20px; border-radius: 8px; margin: 20px 0; }
  .metric { display: inline-block; margin: 10px 20px 10px 0; padding: 8px 15px; background: #3498db; color: white; border-radius: 5px; font-weight: bold; }
  .graph-section { margin: 30px 0; padding: 20px; border: 1px solid #ddd; border-radius: 8px; background: #fafafa; }
  .graph-section img { max-width: 100%; height: auto; }
  .recommendation { background: #e8f5e8; padding: 15px; border-radius: 5px; margin: 10px 0; border-left: 4px solid #27ae60; }
  .timestamp { text-align: center; color: #7f8c8d; font-style: italic; margin-top: 40px; }
</style>"#;

fn list_items(items: &[String]) -> String {
    if items.is_empty() {
        return "<li>No items identified</li>".to_string();
    }
    items
        .iter()
        .map(|i| format!("<li>{}</li>", escape_xml(i)))
        .collect::<Vec<_>>()
        .join("\n")
}

fn field(analysis: &Value, path: &[&str]) -> String {
    escape_xml(&analysis.text(path))
}

fn scored(analysis: &Value, path: &[&str], suffix: &str) -> String {
    analysis
        .number(path)
        .map(|n| format!("{}{}", n, suffix))
        .unwrap_or_else(|| UNKNOWN.to_string())
}

pub fn consolidated_page(input: &ConsolidatedInput<'_>) -> String {
    let a = input.analysis;
    let name = escape_xml(&title_case(input.source_name));
    let domain = |k: &'static str| ["reverse_engineering_analysis", "business_domain_identification", k];
    let arch = |k: &'static str| ["reverse_engineering_analysis", "data_model_architecture", k];
    let mut html = String::new();

    let _ = write!(
        html,
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"UTF-8\">\n\
         <title>{name} Database - Consolidated Analysis Report</title>\n{STYLE}\n</head>\n<body>\n\
         <div class=\"container\">\n<h1>{name} Database - Consolidated Analysis Report</h1>\n\
         <div class=\"summary-box\">\n<p><strong>Generated:</strong> {generated}</p>\n\
         <p><strong>Database File:</strong> {path}</p>\n<p><strong>File Size:</strong> {size}</p>\n</div>\n",
        name = name,
        STYLE = STYLE,
        generated = escape_xml(&input.generated),
        path = escape_xml(input.source_path),
        size = escape_xml(&input.file_size),
    );

    let _ = write!(
        html,
        "<h2>Business Domain Analysis</h2>\n\
         <div class=\"metric\">Domain: {}</div>\n<div class=\"metric\">Confidence: {}</div>\n\
         <h3>Business Processes</h3>\n<ul>\n{}\n</ul>\n",
        field(a, &domain("primary_domain")),
        scored(a, &domain("confidence_score"), "%"),
        list_items(&a.strings(&domain("business_processes"))),
    );

    let _ = write!(
        html,
        "<h2>Data Model Architecture</h2>\n\
         <div class=\"metric\">Style: {}</div>\n<div class=\"metric\">Pattern: {}</div>\n\
         <div class=\"metric\">Flexibility: {}</div>\n",
        field(a, &arch("architectural_style")),
        field(a, &arch("design_pattern")),
        scored(a, &arch("flexibility_score"), "/100"),
    );

    html.push_str("<h2>Core Entities</h2>\n");
    let entities = a.list(&[
        "reverse_engineering_analysis",
        "entity_relationship_mapping",
        "core_entities",
    ]);
    if entities.is_empty() {
        html.push_str("<p>No entities identified</p>\n");
    } else {
        html.push_str("<ul>\n");
        for entity in entities {
            let _ = writeln!(
                html,
                "<li><strong>{}</strong> ({})<br>Purpose: {}</li>",
                field(entity, &["entity_name"]),
                field(entity, &["table_name"]),
                field(entity, &["business_purpose"]),
            );
        }
        html.push_str("</ul>\n");
    }

    let _ = write!(
        html,
        "<h2>Data Quality Assessment</h2>\n<p><strong>Completeness Score:</strong> {}</p>\n\
         <h2>Performance Analysis</h2>\n<p><strong>Bottlenecks Identified:</strong> {}</p>\n<ul>\n{}\n</ul>\n",
        scored(
            a,
            &["data_quality_assessment", "integrity_analysis", "completeness_score"],
            "/100"
        ),
        a.list(&["performance_analysis", "bottleneck_identification"]).len(),
        list_items(&a.strings(&["performance_analysis", "bottleneck_identification"])),
    );

    html.push_str("<h2>Generated Visualizations</h2>\n");
    if input.charts.is_empty() {
        html.push_str("<p>No graphs generated</p>\n");
    }
    for (kind, path) in input.charts {
        let file = path
            .file_name()
            .map(|f| f.to_string_lossy().into_owned())
            .unwrap_or_default();
        let _ = write!(
            html,
            "<div class=\"graph-section\">\n<h3>{title}</h3>\n\
             <img src=\"{dir}_graphs/{file}\" alt=\"{title}\">\n</div>\n",
            title = kind.title(),
            dir = escape_xml(input.source_name),
            file = escape_xml(&file),
        );
    }

    let _ = write!(
        html,
        "<h2>Recommendations</h2>\n\
         <div class=\"recommendation\">\n<h3>Immediate Actions (1-2 weeks)</h3>\n<ul>\n\
         <li>Implement missing indexes for performance</li>\n<li>Address any data quality issues</li>\n\
         <li>Set up performance monitoring</li>\n</ul>\n</div>\n\
         <div class=\"recommendation\">\n<h3>Short-term Improvements (1-2 months)</h3>\n<ul>\n\
         <li>Query optimization based on analysis</li>\n<li>Implement comprehensive index strategy</li>\n\
         <li>Add data validation rules</li>\n</ul>\n</div>\n\
         <div class=\"timestamp\"><p>Report generated on {}</p></div>\n</div>\n</body>\n</html>\n",
        escape_xml(&input.generated)
    );
    html
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::charts::ChartKind;
    use serde_json::json;
    use std::collections::BTreeMap;
    use std::path::PathBuf;

    #[test]
    fn escapes_model_text_and_links_assets() {
        let analysis = json!({
            "reverse_engineering_analysis": {
                "business_domain_identification": {
                    "primary_domain": "<script>retail</script>",
                    "business_processes": ["Returns & refunds"]
                }
            }
        });
        let charts = BTreeMap::from([(
            ChartKind::TableSizes,
            PathBuf::from("out/shop_graphs/shop_table_sizes.svg"),
        )]);
        let input = ConsolidatedInput {
            source_name: "shop",
            source_path: "shop.db",
            file_size: "2.0 KB".into(),
            generated: "2024-01-01 00:00:00".into(),
            analysis: &analysis,
            schema: None,
            charts: &charts,
        };

        let page = consolidated_page(&input);
        assert!(page.contains("Domain: &lt;script&gt;retail&lt;/script&gt;"));
        assert!(page.contains("<li>Returns &amp; refunds</li>"));
        assert!(page.contains("Confidence: Unknown"));
        assert!(page.contains("<img src=\"shop_graphs/shop_table_sizes.svg\""));
        assert!(page.contains("<p>No entities identified</p>"));
    }
}
