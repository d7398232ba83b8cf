use crate::db::connection::{connect_postgres, open_sqlite, ConnectionDescriptor, Dialect};
use crate::db::documents;
use crate::db::introspection::{Introspector, PostgresIntrospector, SqliteIntrospector};
use crate::db::schema::{ColumnAnalysis, ConnectionInfo, SchemaDescription, TableDescription};
use crate::error::ExtractionError;
use tracing::{info, warn};

/// Default namespace introspected on PostgreSQL servers.
const DEFAULT_PG_SCHEMA: &str = "public";

/// Opens the source named by `descriptor` and snapshots its structure.
pub async fn extract(descriptor: &ConnectionDescriptor) -> Result<SchemaDescription, ExtractionError> {
    match descriptor.dialect {
        Dialect::Sqlite => {
            let path = descriptor
                .file_path()
                .ok_or_else(|| ExtractionError::Unsupported("sqlite descriptor without path".into()))?;
            let conn = open_sqlite(&path)?;
            extract_with(&SqliteIntrospector::new(conn)).await
        }
        Dialect::Postgresql => {
            let client = connect_postgres(descriptor).await?;
            extract_with(&PostgresIntrospector::new(client, DEFAULT_PG_SCHEMA)).await
        }
        Dialect::Documents => {
            let path = descriptor.file_path().unwrap_or_default();
            documents::extract_json_file(&path, documents::DEFAULT_SAMPLE_SIZE)
        }
        Dialect::Csv => {
            let path = descriptor.file_path().unwrap_or_default();
            documents::extract_csv_file(&path, documents::DEFAULT_SAMPLE_SIZE)
        }
    }
}

/// Walks every table through `introspector`.
///
/// Enumeration and per-table catalog failures abort the extraction. Row counts
/// and view enumeration are soft: a failure is logged and replaced by
/// `None` / an empty list so one locked or unreadable table never hides the
/// rest of the schema.
pub async fn extract_with<I>(introspector: &I) -> Result<SchemaDescription, ExtractionError>
where
    I: Introspector + ?Sized,
{
    let dialect = introspector.dialect();
    let table_names = introspector.table_names().await?;
    info!("Found {} tables", table_names.len());

    let mut tables = Vec::with_capacity(table_names.len());
    for table_name in table_names {
        info!("Processing table: {}", table_name);

        let columns = introspector.columns(&table_name).await?;
        let primary_key_columns = introspector.primary_key(&table_name).await?;
        let foreign_keys = introspector.foreign_keys(&table_name).await?;
        let indexes = introspector.indexes(&table_name).await?;
        let unique_constraints = introspector.unique_constraints(&table_name).await?;
        let check_constraints = introspector.check_constraints(&table_name).await?;

        let row_count = match introspector.row_count(&table_name).await {
            Ok(count) => Some(count),
            Err(e) => {
                warn!("Could not get row count for {}: {}", table_name, e);
                None
            }
        };

        let column_analysis = ColumnAnalysis::from_columns(&columns);
        tables.push((
            table_name,
            TableDescription {
                columns,
                primary_key_columns,
                foreign_keys,
                indexes,
                unique_constraints,
                check_constraints,
                row_count,
                column_analysis,
            },
        ));
    }

    let views = introspector.view_names().await.unwrap_or_else(|e| {
        warn!("View enumeration failed, continuing without views: {}", e);
        Vec::new()
    });

    Ok(SchemaDescription {
        database_kind: dialect.as_str().to_string(),
        connection_info: ConnectionInfo {
            dialect: dialect.as_str().to_string(),
            driver: dialect.driver().to_string(),
        },
        tables,
        views,
        collections: Vec::new(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::schema::{
        CheckConstraint, ColumnDescription, ForeignKeyDescription, IndexDescription,
        UniqueConstraint,
    };
    use async_trait::async_trait;
    use rusqlite::Connection;
    use tempfile::TempDir;

    /// Serves a fixed catalog; `broken_count` fails its COUNT(*).
    struct FakeCatalog {
        tables: Vec<(&'static str, Vec<&'static str>)>,
        broken_count: Option<&'static str>,
        views_fail: bool,
    }

    #[async_trait]
    impl Introspector for FakeCatalog {
        fn dialect(&self) -> Dialect {
            Dialect::Sqlite
        }

        async fn table_names(&self) -> Result<Vec<String>, ExtractionError> {
            Ok(self.tables.iter().map(|(n, _)| n.to_string()).collect())
        }

        async fn columns(&self, table: &str) -> Result<Vec<ColumnDescription>, ExtractionError> {
            let (_, cols) = self
                .tables
                .iter()
                .find(|(n, _)| *n == table)
                .ok_or_else(|| ExtractionError::Introspection(table.into()))?;
            Ok(cols
                .iter()
                .map(|c| ColumnDescription {
                    name: c.to_string(),
                    declared_type: "TEXT".into(),
                    nullable: true,
                    default: None,
                    comment: None,
                })
                .collect())
        }

        async fn primary_key(&self, _: &str) -> Result<Vec<String>, ExtractionError> {
            Ok(vec![])
        }

        async fn foreign_keys(&self, _: &str) -> Result<Vec<ForeignKeyDescription>, ExtractionError> {
            Ok(vec![])
        }

        async fn indexes(&self, _: &str) -> Result<Vec<IndexDescription>, ExtractionError> {
            Ok(vec![])
        }

        async fn unique_constraints(&self, _: &str) -> Result<Vec<UniqueConstraint>, ExtractionError> {
            Ok(vec![])
        }

        async fn check_constraints(&self, _: &str) -> Result<Vec<CheckConstraint>, ExtractionError> {
            Ok(vec![])
        }

        async fn row_count(&self, table: &str) -> Result<u64, ExtractionError> {
            if self.broken_count == Some(table) {
                Err(ExtractionError::Introspection("database table is locked".into()))
            } else {
                Ok(42)
            }
        }

        async fn view_names(&self) -> Result<Vec<String>, ExtractionError> {
            if self.views_fail {
                Err(ExtractionError::Introspection("views unsupported".into()))
            } else {
                Ok(vec!["active_customers".into()])
            }
        }
    }

    #[tokio::test]
    async fn count_failure_is_isolated_to_its_table() {
        let catalog = FakeCatalog {
            tables: vec![
                ("customers", vec!["id", "email"]),
                ("orders", vec!["id", "customer_id"]),
                ("items", vec!["id"]),
            ],
            broken_count: Some("orders"),
            views_fail: false,
        };

        let schema = extract_with(&catalog).await.unwrap();
        assert_eq!(schema.tables.len(), 3);
        assert_eq!(schema.table("customers").unwrap().row_count, Some(42));
        assert_eq!(schema.table("orders").unwrap().row_count, None);
        assert_eq!(schema.table("items").unwrap().row_count, Some(42));
        assert_eq!(schema.views, vec!["active_customers"]);
    }

    #[tokio::test]
    async fn view_failure_yields_empty_views() {
        let catalog = FakeCatalog {
            tables: vec![("t", vec!["a"])],
            broken_count: None,
            views_fail: true,
        };
        let schema = extract_with(&catalog).await.unwrap();
        assert!(schema.views.is_empty());
        assert_eq!(schema.tables.len(), 1);
    }

    fn build_shop(dir: &TempDir) -> std::path::PathBuf {
        let path = dir.path().join("shop.db");
        let conn = Connection::open(&path).unwrap();
        conn.execute_batch(
            "
            CREATE TABLE customers (
                customer_id INTEGER PRIMARY KEY,
                email TEXT NOT NULL UNIQUE,
                full_name TEXT,
                created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
            );
            CREATE TABLE orders (
                order_id INTEGER PRIMARY KEY,
                customer_id INTEGER NOT NULL REFERENCES customers(customer_id) ON DELETE CASCADE,
                total REAL CHECK (total >= 0),
                status TEXT
            );
            CREATE TABLE order_items (
                order_id INTEGER REFERENCES orders,
                sku TEXT,
                qty INTEGER,
                PRIMARY KEY (order_id, sku)
            );
            CREATE INDEX idx_orders_status ON orders(status);
            CREATE INDEX idx_items_sku_qty ON order_items(sku, qty);
            CREATE VIEW big_orders AS SELECT * FROM orders WHERE total > 100;
            INSERT INTO customers (email, full_name) VALUES ('a@x.io', 'A'), ('b@x.io', 'B');
            INSERT INTO orders (customer_id, total, status) VALUES (1, 10.0, 'new');
            ",
        )
        .unwrap();
        path
    }

    #[tokio::test]
    async fn extracts_sqlite_file_in_declaration_order() {
        let dir = TempDir::new().unwrap();
        let path = build_shop(&dir);

        let schema = extract(&ConnectionDescriptor::sqlite(&path)).await.unwrap();
        assert_eq!(schema.database_kind, "sqlite");
        assert_eq!(
            schema.table_names().collect::<Vec<_>>(),
            vec!["customers", "order_items", "orders"]
        );

        let customers = schema.table("customers").unwrap();
        let names: Vec<_> = customers.columns.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["customer_id", "email", "full_name", "created_at"]);
        assert!(!customers.columns[1].nullable);
        assert_eq!(customers.primary_key_columns, vec!["customer_id"]);
        assert_eq!(customers.row_count, Some(2));
        assert_eq!(customers.unique_constraints.len(), 1);
        assert_eq!(customers.unique_constraints[0].columns, vec!["email"]);
        assert_eq!(customers.column_analysis.potential_pii, vec!["email"]);

        let orders = schema.table("orders").unwrap();
        assert_eq!(orders.foreign_keys.len(), 1);
        assert_eq!(orders.foreign_keys[0].referenced_table, "customers");
        assert_eq!(orders.foreign_keys[0].on_delete_action, "CASCADE");
        assert_eq!(orders.check_constraints[0].expression, "total >= 0");
        assert!(orders.indexes.iter().any(|i| i.name == "idx_orders_status" && !i.is_unique));

        let items = schema.table("order_items").unwrap();
        assert_eq!(items.primary_key_columns, vec!["order_id", "sku"]);
        // Implicit reference resolves to the parent's primary key
        assert_eq!(items.foreign_keys[0].referenced_column, "order_id");
        let composite = items.indexes.iter().find(|i| i.name == "idx_items_sku_qty").unwrap();
        assert_eq!(composite.column_count, 2);

        assert_eq!(schema.views, vec!["big_orders"]);
    }

    #[tokio::test]
    async fn missing_file_fails_extraction() {
        let dir = TempDir::new().unwrap();
        let err = extract(&ConnectionDescriptor::sqlite(dir.path().join("nope.db")))
            .await
            .unwrap_err();
        assert!(matches!(err, ExtractionError::Connection { .. }));
    }
}
