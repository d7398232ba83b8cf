use crate::db::schema::{ForeignKeyDescription, IndexDescription, SchemaDescription};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

/// Caps on how much of a schema is shown to the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TruncationLimits {
    pub max_tables: usize,
    pub max_columns: usize,
}

impl Default for TruncationLimits {
    fn default() -> Self {
        Self {
            max_tables: 15,
            max_columns: 50,
        }
    }
}

/// Schema context sent to AI. Never contains row data, only structure and counts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaContext {
    pub database_type: String,
    /// Size of the full schema, including tables cut by truncation.
    pub total_tables: usize,
    pub tables: Vec<TableContext>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableContext {
    pub name: String,
    pub column_count: usize,
    pub columns: Vec<ColumnContext>,
    pub row_count: Option<u64>,
    pub foreign_keys: Vec<ForeignKeyDescription>,
    pub indexes: Vec<IndexDescription>,
    pub primary_keys: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnContext {
    pub name: String,
    #[serde(rename = "type")]
    pub data_type: String,
    pub nullable: bool,
    pub default: Option<String>,
    pub comment: String,
}

impl SchemaContext {
    /// Keeps the first `max_tables` tables in discovery order and the first
    /// `max_columns` columns of each. Anything beyond is dropped silently.
    pub fn from_schema(schema: &SchemaDescription, limits: TruncationLimits) -> Self {
        let tables: Vec<TableContext> = schema
            .tables
            .iter()
            .take(limits.max_tables)
            .map(|(name, table)| TableContext {
                name: name.clone(),
                column_count: table.columns.len(),
                columns: table
                    .columns
                    .iter()
                    .take(limits.max_columns)
                    .map(|c| ColumnContext {
                        name: c.name.clone(),
                        data_type: c.declared_type.clone(),
                        nullable: c.nullable,
                        default: c.default.clone(),
                        comment: c.comment.clone().unwrap_or_default(),
                    })
                    .collect(),
                row_count: table.row_count,
                foreign_keys: table.foreign_keys.clone(),
                indexes: table.indexes.clone(),
                primary_keys: table.primary_key_columns.clone(),
            })
            .collect();

        if schema.tables.len() > tables.len() {
            debug!(
                "Prompt covers {} of {} tables",
                tables.len(),
                schema.tables.len()
            );
        }

        Self {
            database_type: schema.database_kind.clone(),
            total_tables: schema.tables.len(),
            tables,
        }
    }

    /// `{table_name: {column_count, columns, row_count, ...}}` in table order.
    pub fn detailed_schema(&self) -> Value {
        let mut map = Map::new();
        for table in &self.tables {
            let mut entry = serde_json::to_value(table).unwrap_or(Value::Null);
            if let Value::Object(fields) = &mut entry {
                fields.remove("name");
            }
            map.insert(table.name.clone(), entry);
        }
        Value::Object(map)
    }

    pub fn to_ddl_summary(&self) -> String {
        let mut out = String::new();
        for table in &self.tables {
            out.push_str(&format!("CREATE TABLE {} (\n", table.name));
            for (i, col) in table.columns.iter().enumerate() {
                let mut parts = vec![format!("  {} {}", col.name, col.data_type)];
                if table.primary_keys.contains(&col.name) {
                    parts.push("PRIMARY KEY".into());
                }
                if !col.nullable {
                    parts.push("NOT NULL".into());
                }
                if let Some(fk) = table.foreign_keys.iter().find(|fk| fk.column == col.name) {
                    parts.push(format!("REFERENCES {}({})", fk.referenced_table, fk.referenced_column));
                }
                let suffix = if i < table.columns.len() - 1 { "," } else { "" };
                out.push_str(&format!("{}{}\n", parts.join(" "), suffix));
            }
            out.push_str(");\n\n");
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::schema::{ColumnDescription, ConnectionInfo, TableDescription};

    fn wide_schema(tables: usize, columns: usize) -> SchemaDescription {
        SchemaDescription {
            database_kind: "sqlite".into(),
            connection_info: ConnectionInfo {
                dialect: "sqlite".into(),
                driver: "rusqlite".into(),
            },
            tables: (0..tables)
                .map(|t| {
                    let columns = (0..columns)
                        .map(|c| ColumnDescription {
                            name: format!("c{}", c),
                            declared_type: "TEXT".into(),
                            nullable: c != 0,
                            default: None,
                            comment: None,
                        })
                        .collect();
                    (
                        format!("t{:02}", t),
                        TableDescription {
                            columns,
                            primary_key_columns: vec!["c0".into()],
                            row_count: Some(t as u64),
                            ..Default::default()
                        },
                    )
                })
                .collect(),
            views: vec![],
            collections: vec![],
        }
    }

    #[test]
    fn truncates_tables_and_columns() {
        let ctx = SchemaContext::from_schema(&wide_schema(20, 60), TruncationLimits::default());
        assert_eq!(ctx.total_tables, 20);
        assert_eq!(ctx.tables.len(), 15);
        assert_eq!(ctx.tables[14].name, "t14");
        assert_eq!(ctx.tables[0].columns.len(), 50);
        assert_eq!(ctx.tables[0].column_count, 60);
    }

    #[test]
    fn limits_are_configurable() {
        let limits = TruncationLimits {
            max_tables: 2,
            max_columns: 3,
        };
        let ctx = SchemaContext::from_schema(&wide_schema(5, 5), limits);
        assert_eq!(ctx.tables.len(), 2);
        assert_eq!(ctx.tables[1].columns.len(), 3);
    }

    #[test]
    fn detailed_schema_is_keyed_by_table() {
        let ctx = SchemaContext::from_schema(&wide_schema(2, 2), TruncationLimits::default());
        let detailed = ctx.detailed_schema();
        let keys: Vec<_> = detailed.as_object().unwrap().keys().cloned().collect();
        assert_eq!(keys, vec!["t00", "t01"]);
        assert_eq!(detailed["t01"]["row_count"], 1);
        assert_eq!(detailed["t00"]["columns"][0]["type"], "TEXT");
        assert_eq!(detailed["t00"]["primary_keys"][0], "c0");
        assert!(detailed["t00"].get("name").is_none());
    }

    #[test]
    fn ddl_summary_marks_keys() {
        let ctx = SchemaContext::from_schema(&wide_schema(1, 2), TruncationLimits::default());
        let ddl = ctx.to_ddl_summary();
        assert!(ddl.contains("CREATE TABLE t00 ("));
        assert!(ddl.contains("  c0 TEXT PRIMARY KEY NOT NULL,"));
        assert!(ddl.contains("  c1 TEXT\n);"));
    }
}
