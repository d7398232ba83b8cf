use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Column names containing any of these fragments are reported as potential PII.
const PII_PATTERNS: [&str; 7] = ["email", "phone", "ssn", "social", "password", "credit", "card"];

/// Normalized snapshot of one data source. Built once per extraction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaDescription {
    pub database_kind: String,
    pub connection_info: ConnectionInfo,
    /// Discovery order is kept but carries no meaning.
    pub tables: Vec<(String, TableDescription)>,
    pub views: Vec<String>,
    /// Field histograms for document sources; empty for relational ones.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub collections: Vec<(String, CollectionDescription)>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionInfo {
    pub dialect: String,
    pub driver: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TableDescription {
    pub columns: Vec<ColumnDescription>,
    pub primary_key_columns: Vec<String>,
    pub foreign_keys: Vec<ForeignKeyDescription>,
    pub indexes: Vec<IndexDescription>,
    pub unique_constraints: Vec<UniqueConstraint>,
    pub check_constraints: Vec<CheckConstraint>,
    /// Point-in-time count; `None` when the count query failed.
    pub row_count: Option<u64>,
    pub column_analysis: ColumnAnalysis,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnDescription {
    pub name: String,
    pub declared_type: String,
    pub nullable: bool,
    pub default: Option<String>,
    pub comment: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForeignKeyDescription {
    pub column: String,
    pub referenced_table: String,
    pub referenced_column: String,
    pub on_update_action: String,
    pub on_delete_action: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexDescription {
    pub name: String,
    pub is_unique: bool,
    pub column_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UniqueConstraint {
    pub name: Option<String>,
    pub columns: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckConstraint {
    pub name: Option<String>,
    pub expression: String,
}

/// Sampled structure of one document collection.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CollectionDescription {
    pub sampled_documents: usize,
    pub fields: BTreeMap<String, FieldStats>,
    pub sample_documents: Vec<serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldStats {
    pub types: Vec<String>,
    pub presence_percentage: f64,
    pub is_required: bool,
}

/// Per-table column statistics derived at extraction time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ColumnAnalysis {
    pub total_columns: usize,
    pub data_types: BTreeMap<String, usize>,
    pub nullable_columns: usize,
    pub potential_pii: Vec<String>,
}

impl ColumnAnalysis {
    pub fn from_columns(columns: &[ColumnDescription]) -> Self {
        let mut analysis = ColumnAnalysis {
            total_columns: columns.len(),
            ..Default::default()
        };

        for col in columns {
            *analysis
                .data_types
                .entry(col.declared_type.clone())
                .or_insert(0) += 1;

            if col.nullable {
                analysis.nullable_columns += 1;
            }

            let lowered = col.name.to_lowercase();
            if PII_PATTERNS.iter().any(|p| lowered.contains(p)) {
                analysis.potential_pii.push(col.name.clone());
            }
        }

        analysis
    }
}

impl SchemaDescription {
    pub fn table(&self, name: &str) -> Option<&TableDescription> {
        self.tables
            .iter()
            .find(|(table_name, _)| table_name == name)
            .map(|(_, table)| table)
    }

    pub fn table_names(&self) -> impl Iterator<Item = &str> {
        self.tables.iter().map(|(name, _)| name.as_str())
    }

    pub fn total_columns(&self) -> usize {
        self.tables.iter().map(|(_, t)| t.columns.len()).sum()
    }
}

impl TableDescription {
    pub fn is_primary_key(&self, column: &str) -> bool {
        self.primary_key_columns.iter().any(|c| c == column)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn column(name: &str, ty: &str, nullable: bool) -> ColumnDescription {
        ColumnDescription {
            name: name.into(),
            declared_type: ty.into(),
            nullable,
            default: None,
            comment: None,
        }
    }

    #[test]
    fn column_analysis_counts_types_and_flags_pii() {
        let columns = vec![
            column("id", "INTEGER", false),
            column("email_address", "TEXT", true),
            column("Phone", "TEXT", true),
            column("created_at", "TIMESTAMP", false),
        ];

        let analysis = ColumnAnalysis::from_columns(&columns);
        assert_eq!(analysis.total_columns, 4);
        assert_eq!(analysis.nullable_columns, 2);
        assert_eq!(analysis.data_types.get("TEXT"), Some(&2));
        assert_eq!(analysis.potential_pii, vec!["email_address", "Phone"]);
    }
}
