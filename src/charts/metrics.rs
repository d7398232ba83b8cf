use crate::ai::record::RecordExt;
use crate::db::schema::{SchemaDescription, TableDescription};
use serde_json::Value;
use std::collections::BTreeMap;

/// Share of tables flagged as high risk on the performance chart.
pub const HIGH_RISK_QUANTILE: f64 = 0.8;

/// How many of the largest tables the size pie keeps.
pub const TOP_TABLES: usize = 8;

/// Counts columns whose name contains `_id`, ignoring case. This is a naming
/// heuristic; declared constraints are reported separately.
pub fn fk_candidate_count(table: &TableDescription) -> usize {
    table
        .columns
        .iter()
        .filter(|c| c.name.to_lowercase().contains("_id"))
        .count()
}

#[derive(Debug, Clone, PartialEq)]
pub struct OverviewRow {
    pub table: String,
    pub columns: usize,
    pub primary_keys: usize,
    pub fk_candidates: usize,
}

pub fn schema_overview(schema: &SchemaDescription) -> Vec<OverviewRow> {
    schema
        .tables
        .iter()
        .map(|(name, table)| OverviewRow {
            table: name.clone(),
            columns: table.columns.len(),
            primary_keys: table.primary_key_columns.len(),
            fk_candidates: fk_candidate_count(table),
        })
        .collect()
}

/// Row count per table; an unknown count is drawn as zero.
pub fn table_sizes(schema: &SchemaDescription) -> Vec<(String, u64)> {
    schema
        .tables
        .iter()
        .map(|(name, table)| (name.clone(), table.row_count.unwrap_or(0)))
        .collect()
}

/// The `n` largest entries, largest first; ties keep their original order.
pub fn largest(sizes: &[(String, u64)], n: usize) -> Vec<(String, u64)> {
    let mut sorted = sizes.to_vec();
    sorted.sort_by(|a, b| b.1.cmp(&a.1));
    sorted.truncate(n);
    sorted
}

/// Occurrence counts, most frequent first, ties in first-seen order.
fn value_counts<I: IntoIterator<Item = String>>(values: I) -> Vec<(String, usize)> {
    let mut counts: Vec<(String, usize)> = Vec::new();
    for value in values {
        match counts.iter_mut().find(|(v, _)| *v == value) {
            Some((_, n)) => *n += 1,
            None => counts.push((value, 1)),
        }
    }
    counts.sort_by(|a, b| b.1.cmp(&a.1));
    counts
}

#[derive(Debug, Clone, PartialEq)]
pub struct DataTypeStats {
    pub type_counts: Vec<(String, usize)>,
    pub nullable: usize,
    pub not_nullable: usize,
    pub primary_key: usize,
    pub not_primary_key: usize,
    pub by_table: Vec<(String, BTreeMap<String, usize>)>,
}

pub fn data_type_stats(schema: &SchemaDescription) -> Option<DataTypeStats> {
    if schema.total_columns() == 0 {
        return None;
    }

    let mut stats = DataTypeStats {
        type_counts: Vec::new(),
        nullable: 0,
        not_nullable: 0,
        primary_key: 0,
        not_primary_key: 0,
        by_table: Vec::new(),
    };
    let mut all_types = Vec::new();

    for (name, table) in &schema.tables {
        let mut per_table = BTreeMap::new();
        for col in &table.columns {
            let ty = col.declared_type.to_uppercase();
            *per_table.entry(ty.clone()).or_insert(0) += 1;
            all_types.push(ty);

            if col.nullable {
                stats.nullable += 1;
            } else {
                stats.not_nullable += 1;
            }
            if table.is_primary_key(&col.name) {
                stats.primary_key += 1;
            } else {
                stats.not_primary_key += 1;
            }
        }
        if !per_table.is_empty() {
            stats.by_table.push((name.clone(), per_table));
        }
    }

    stats.type_counts = value_counts(all_types);
    Some(stats)
}

#[derive(Debug, Clone, PartialEq)]
pub struct IndexStats {
    pub per_table: Vec<(String, usize)>,
    pub unique: usize,
    pub non_unique: usize,
    /// Number of indexes per indexed-column count.
    pub column_histogram: BTreeMap<usize, usize>,
    pub total: usize,
    pub average_columns: f64,
}

pub fn index_stats(schema: &SchemaDescription) -> Option<IndexStats> {
    let indexes: Vec<_> = schema
        .tables
        .iter()
        .flat_map(|(name, t)| t.indexes.iter().map(move |i| (name, i)))
        .collect();
    if indexes.is_empty() {
        return None;
    }

    let mut column_histogram = BTreeMap::new();
    for (_, index) in &indexes {
        *column_histogram.entry(index.column_count).or_insert(0) += 1;
    }
    let unique = indexes.iter().filter(|(_, i)| i.is_unique).count();
    let total_columns: usize = indexes.iter().map(|(_, i)| i.column_count).sum();

    Some(IndexStats {
        per_table: schema
            .tables
            .iter()
            .filter(|(_, t)| !t.indexes.is_empty())
            .map(|(name, t)| (name.clone(), t.indexes.len()))
            .collect(),
        unique,
        non_unique: indexes.len() - unique,
        column_histogram,
        total: indexes.len(),
        average_columns: total_columns as f64 / indexes.len() as f64,
    })
}

#[derive(Debug, Clone, PartialEq)]
pub struct ForeignKeyStats {
    pub by_source: Vec<(String, usize)>,
    pub by_target: Vec<(String, usize)>,
    pub on_update: Vec<(String, usize)>,
    pub on_delete: Vec<(String, usize)>,
    pub total: usize,
}

pub fn foreign_key_stats(schema: &SchemaDescription) -> Option<ForeignKeyStats> {
    let fks: Vec<_> = schema
        .tables
        .iter()
        .flat_map(|(name, t)| t.foreign_keys.iter().map(move |fk| (name.clone(), fk)))
        .collect();
    if fks.is_empty() {
        return None;
    }

    let mut by_source = value_counts(fks.iter().map(|(src, _)| src.clone()));
    let mut by_target = value_counts(fks.iter().map(|(_, fk)| fk.referenced_table.clone()));
    by_source.sort_by(|a, b| a.0.cmp(&b.0));
    by_target.sort_by(|a, b| a.0.cmp(&b.0));

    Some(ForeignKeyStats {
        by_source,
        by_target,
        on_update: value_counts(fks.iter().map(|(_, fk)| fk.on_update_action.clone())),
        on_delete: value_counts(fks.iter().map(|(_, fk)| fk.on_delete_action.clone())),
        total: fks.len(),
    })
}

#[derive(Debug, Clone, PartialEq)]
pub struct DomainSummary {
    pub primary_domain: String,
    pub confidence: f64,
    pub sub_domains: Vec<String>,
    pub business_processes: Vec<String>,
}

const DOMAIN_SECTION: [&str; 2] = [
    "reverse_engineering_analysis",
    "business_domain_identification",
];

/// Present only when the record carries a non-empty domain section.
pub fn domain_summary(analysis: &Value) -> Option<DomainSummary> {
    if !analysis.has_section(&DOMAIN_SECTION) {
        return None;
    }
    let field = |key: &'static str| [DOMAIN_SECTION[0], DOMAIN_SECTION[1], key];

    Some(DomainSummary {
        primary_domain: analysis.text(&field("primary_domain")),
        confidence: analysis
            .number(&field("confidence_score"))
            .unwrap_or(0.0)
            .clamp(0.0, 100.0),
        sub_domains: analysis.strings(&field("sub_domains")),
        business_processes: analysis.strings(&field("business_processes")),
    })
}

/// `rows × columns × (1 − indexes/columns)`, with the ratio taken as 0 when
/// the table has no columns.
pub fn risk_score(row_count: u64, column_count: usize, index_count: usize) -> f64 {
    let ratio = index_ratio(column_count, index_count);
    row_count as f64 * column_count as f64 * (1.0 - ratio)
}

pub fn index_ratio(column_count: usize, index_count: usize) -> f64 {
    if column_count == 0 {
        0.0
    } else {
        index_count as f64 / column_count as f64
    }
}

/// Quantile with linear interpolation between closest ranks.
pub fn quantile(values: &[f64], q: f64) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let position = (sorted.len() - 1) as f64 * q.clamp(0.0, 1.0);
    let lower = position.floor() as usize;
    let upper = position.ceil() as usize;
    let fraction = position - lower as f64;
    Some(sorted[lower] + (sorted[upper] - sorted[lower]) * fraction)
}

#[derive(Debug, Clone, PartialEq)]
pub struct PerformanceRow {
    pub table: String,
    pub row_count: u64,
    pub column_count: usize,
    pub index_count: usize,
    pub index_ratio: f64,
    pub risk_score: f64,
    pub high_risk: bool,
}

/// Per-table risk with tables at or above the 0.8 quantile flagged.
pub fn performance_rows(schema: &SchemaDescription) -> Vec<PerformanceRow> {
    let mut rows: Vec<PerformanceRow> = schema
        .tables
        .iter()
        .map(|(name, t)| {
            let row_count = t.row_count.unwrap_or(0);
            PerformanceRow {
                table: name.clone(),
                row_count,
                column_count: t.columns.len(),
                index_count: t.indexes.len(),
                index_ratio: index_ratio(t.columns.len(), t.indexes.len()),
                risk_score: risk_score(row_count, t.columns.len(), t.indexes.len()),
                high_risk: false,
            }
        })
        .collect();

    let scores: Vec<f64> = rows.iter().map(|r| r.risk_score).collect();
    if let Some(threshold) = quantile(&scores, HIGH_RISK_QUANTILE) {
        for row in &mut rows {
            row.high_risk = row.risk_score >= threshold;
        }
    }
    rows
}

#[derive(Debug, Clone, PartialEq)]
pub struct RelationshipEdge {
    pub from: String,
    pub to: String,
    pub label: String,
}

/// Tables as nodes, declared foreign keys as labeled edges.
pub fn relationship_graph(schema: &SchemaDescription) -> (Vec<String>, Vec<RelationshipEdge>) {
    let nodes: Vec<String> = schema.table_names().map(str::to_string).collect();
    let edges = schema
        .tables
        .iter()
        .flat_map(|(name, t)| {
            t.foreign_keys.iter().map(move |fk| RelationshipEdge {
                from: name.clone(),
                to: fk.referenced_table.clone(),
                label: format!("{} → {}", fk.column, fk.referenced_column),
            })
        })
        .collect();
    (nodes, edges)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::schema::{ColumnDescription, ConnectionInfo, ForeignKeyDescription, IndexDescription};
    use serde_json::json;

    fn col(name: &str, ty: &str, nullable: bool) -> ColumnDescription {
        ColumnDescription {
            name: name.into(),
            declared_type: ty.into(),
            nullable,
            default: None,
            comment: None,
        }
    }

    fn index(name: &str, unique: bool, columns: usize) -> IndexDescription {
        IndexDescription {
            name: name.into(),
            is_unique: unique,
            column_count: columns,
        }
    }

    fn fk(column: &str, table: &str, on_delete: &str) -> ForeignKeyDescription {
        ForeignKeyDescription {
            column: column.into(),
            referenced_table: table.into(),
            referenced_column: "id".into(),
            on_update_action: "NO ACTION".into(),
            on_delete_action: on_delete.into(),
        }
    }

    fn shop() -> SchemaDescription {
        SchemaDescription {
            database_kind: "sqlite".into(),
            connection_info: ConnectionInfo {
                dialect: "sqlite".into(),
                driver: "rusqlite".into(),
            },
            tables: vec![
                (
                    "customers".into(),
                    TableDescription {
                        columns: vec![col("id", "integer", false), col("email", "text", true)],
                        primary_key_columns: vec!["id".into()],
                        indexes: vec![index("ux_email", true, 1)],
                        row_count: Some(50),
                        ..Default::default()
                    },
                ),
                (
                    "orders".into(),
                    TableDescription {
                        columns: vec![
                            col("id", "INTEGER", false),
                            col("customer_id", "INTEGER", false),
                            col("Store_ID", "INTEGER", true),
                            col("total", "REAL", true),
                        ],
                        primary_key_columns: vec!["id".into()],
                        foreign_keys: vec![fk("customer_id", "customers", "CASCADE")],
                        indexes: vec![index("ix_cust_store", false, 2)],
                        row_count: None,
                        ..Default::default()
                    },
                ),
                ("empty".into(), TableDescription::default()),
            ],
            views: vec![],
            collections: vec![],
        }
    }

    #[test]
    fn risk_score_matches_formula() {
        assert_eq!(risk_score(1000, 10, 2), 8000.0);
        assert_eq!(risk_score(1000, 0, 3), 0.0);
        assert_eq!(risk_score(0, 10, 0), 0.0);
    }

    #[test]
    fn quantile_interpolates_linearly() {
        let v = [400.0, 0.0, 100.0, 300.0, 200.0];
        assert_eq!(quantile(&v, 0.8), Some(320.0));
        assert_eq!(quantile(&v, 0.0), Some(0.0));
        assert_eq!(quantile(&v, 1.0), Some(400.0));
        assert_eq!(quantile(&[7.0], 0.8), Some(7.0));
        assert_eq!(quantile(&[], 0.8), None);
    }

    #[test]
    fn high_risk_uses_inclusive_threshold() {
        let rows = performance_rows(&shop());
        let flagged: Vec<_> = rows.iter().filter(|r| r.high_risk).map(|r| r.table.as_str()).collect();
        // customers: 50*2*(1-0.5)=50, orders: unknown rows -> 0, empty: 0
        assert_eq!(rows[0].risk_score, 50.0);
        assert_eq!(flagged, vec!["customers"]);

        let mut flat = shop();
        for (_, t) in &mut flat.tables {
            t.row_count = Some(0);
        }
        assert!(performance_rows(&flat).iter().all(|r| r.high_risk));
    }

    #[test]
    fn overview_uses_id_substring_heuristic() {
        let rows = schema_overview(&shop());
        assert_eq!(rows[1].fk_candidates, 2);
        assert_eq!(rows[1].primary_keys, 1);
        assert_eq!(rows[0].fk_candidates, 0);
        assert_eq!(rows[2].columns, 0);
    }

    #[test]
    fn sizes_treat_unknown_as_zero() {
        let sizes = table_sizes(&shop());
        assert_eq!(sizes[1], ("orders".to_string(), 0));
        let sizes: Vec<(String, u64)> = (0..10).map(|i| (format!("t{}", i), i)).collect();
        let top = largest(&sizes, TOP_TABLES);
        assert_eq!(top.len(), 8);
        assert_eq!(top[0].0, "t9");
    }

    #[test]
    fn data_types_are_uppercased_and_crossed_by_table() {
        let stats = data_type_stats(&shop()).unwrap();
        assert_eq!(stats.type_counts[0], ("INTEGER".to_string(), 4));
        assert_eq!(stats.nullable, 3);
        assert_eq!(stats.not_nullable, 3);
        assert_eq!(stats.primary_key, 2);
        assert_eq!(stats.by_table.len(), 2);
        assert_eq!(stats.by_table[0].1.get("TEXT"), Some(&1));

        let mut bare = shop();
        bare.tables.truncate(0);
        assert!(data_type_stats(&bare).is_none());
    }

    #[test]
    fn index_and_fk_stats() {
        let idx = index_stats(&shop()).unwrap();
        assert_eq!(idx.total, 2);
        assert_eq!(idx.unique, 1);
        assert_eq!(idx.column_histogram.get(&2), Some(&1));
        assert_eq!(idx.average_columns, 1.5);

        let fks = foreign_key_stats(&shop()).unwrap();
        assert_eq!(fks.by_source, vec![("orders".to_string(), 1)]);
        assert_eq!(fks.by_target, vec![("customers".to_string(), 1)]);
        assert_eq!(fks.on_delete, vec![("CASCADE".to_string(), 1)]);

        let mut plain = shop();
        for (_, t) in &mut plain.tables {
            t.indexes.clear();
            t.foreign_keys.clear();
        }
        assert!(index_stats(&plain).is_none());
        assert!(foreign_key_stats(&plain).is_none());
    }

    #[test]
    fn domain_summary_requires_section() {
        assert!(domain_summary(&json!({})).is_none());
        assert!(domain_summary(&json!({"reverse_engineering_analysis": {"business_domain_identification": {}}})).is_none());

        let summary = domain_summary(&json!({
            "reverse_engineering_analysis": {"business_domain_identification": {
                "primary_domain": "healthcare", "confidence_score": 91, "sub_domains": ["billing"]
            }}
        }))
        .unwrap();
        assert_eq!(summary.primary_domain, "healthcare");
        assert_eq!(summary.confidence, 91.0);
        assert_eq!(summary.sub_domains, vec!["billing"]);
        assert!(summary.business_processes.is_empty());
    }

    #[test]
    fn relationship_graph_labels_edges() {
        let (nodes, edges) = relationship_graph(&shop());
        assert_eq!(nodes.len(), 3);
        assert_eq!(edges[0].from, "orders");
        assert_eq!(edges[0].to, "customers");
        assert_eq!(edges[0].label, "customer_id → id");
    }
}
