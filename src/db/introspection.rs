use crate::db::connection::Dialect;
use crate::db::schema::{
    CheckConstraint, ColumnDescription, ForeignKeyDescription, IndexDescription, UniqueConstraint,
};
use crate::error::ExtractionError;
use async_trait::async_trait;
use rusqlite::Connection;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio_postgres::Client;

/// Catalog access for one open data source. Every call is independent so the
/// extractor can decide per call whether a failure is fatal.
#[async_trait]
pub trait Introspector: Send + Sync {
    fn dialect(&self) -> Dialect;
    async fn table_names(&self) -> Result<Vec<String>, ExtractionError>;
    async fn columns(&self, table: &str) -> Result<Vec<ColumnDescription>, ExtractionError>;
    async fn primary_key(&self, table: &str) -> Result<Vec<String>, ExtractionError>;
    async fn foreign_keys(&self, table: &str) -> Result<Vec<ForeignKeyDescription>, ExtractionError>;
    async fn indexes(&self, table: &str) -> Result<Vec<IndexDescription>, ExtractionError>;
    async fn unique_constraints(&self, table: &str) -> Result<Vec<UniqueConstraint>, ExtractionError>;
    async fn check_constraints(&self, table: &str) -> Result<Vec<CheckConstraint>, ExtractionError>;
    async fn row_count(&self, table: &str) -> Result<u64, ExtractionError>;
    async fn view_names(&self) -> Result<Vec<String>, ExtractionError>;
}

pub struct SqliteIntrospector {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteIntrospector {
    pub fn new(conn: Connection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
        }
    }
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

#[async_trait]
impl Introspector for SqliteIntrospector {
    fn dialect(&self) -> Dialect {
        Dialect::Sqlite
    }

    async fn table_names(&self) -> Result<Vec<String>, ExtractionError> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(
            "SELECT name FROM sqlite_master
             WHERE type = 'table' AND name NOT LIKE 'sqlite_%'
             ORDER BY name",
        )?;
        let names = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(names)
    }

    async fn columns(&self, table: &str) -> Result<Vec<ColumnDescription>, ExtractionError> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(
            "SELECT name, type, \"notnull\", dflt_value FROM pragma_table_info(?1) ORDER BY cid",
        )?;
        let columns = stmt
            .query_map([table], |row| {
                Ok(ColumnDescription {
                    name: row.get(0)?,
                    declared_type: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
                    nullable: row.get::<_, i64>(2)? == 0,
                    default: row.get(3)?,
                    comment: None,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(columns)
    }

    async fn primary_key(&self, table: &str) -> Result<Vec<String>, ExtractionError> {
        let conn = self.conn.lock().await;
        let mut stmt =
            conn.prepare("SELECT name FROM pragma_table_info(?1) WHERE pk > 0 ORDER BY pk")?;
        let names = stmt
            .query_map([table], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(names)
    }

    async fn foreign_keys(&self, table: &str) -> Result<Vec<ForeignKeyDescription>, ExtractionError> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(
            "SELECT \"from\", \"table\", \"to\", on_update, on_delete
             FROM pragma_foreign_key_list(?1) ORDER BY id, seq",
        )?;
        let raw = stmt
            .query_map([table], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, Option<String>>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let mut fks = Vec::with_capacity(raw.len());
        for (column, referenced_table, to, on_update, on_delete) in raw {
            // `REFERENCES parent` without a column list points at the parent's primary key
            let referenced_column = match to {
                Some(c) if !c.is_empty() => c,
                _ => {
                    let mut pk = conn.prepare(
                        "SELECT name FROM pragma_table_info(?1) WHERE pk > 0 ORDER BY pk LIMIT 1",
                    )?;
                    pk.query_row([&referenced_table], |row| row.get::<_, String>(0))
                        .unwrap_or_default()
                }
            };
            fks.push(ForeignKeyDescription {
                column,
                referenced_table,
                referenced_column,
                on_update_action: on_update,
                on_delete_action: on_delete,
            });
        }
        Ok(fks)
    }

    async fn indexes(&self, table: &str) -> Result<Vec<IndexDescription>, ExtractionError> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare("SELECT name, \"unique\" FROM pragma_index_list(?1) ORDER BY seq")?;
        let listed = stmt
            .query_map([table], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)? == 1))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let mut indexes = Vec::with_capacity(listed.len());
        for (name, is_unique) in listed {
            let column_count: i64 =
                conn.query_row("SELECT COUNT(*) FROM pragma_index_info(?1)", [&name], |row| {
                    row.get(0)
                })?;
            indexes.push(IndexDescription {
                name,
                is_unique,
                column_count: column_count.max(0) as usize,
            });
        }
        Ok(indexes)
    }

    async fn unique_constraints(&self, table: &str) -> Result<Vec<UniqueConstraint>, ExtractionError> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(
            "SELECT name FROM pragma_index_list(?1) WHERE origin = 'u' ORDER BY seq",
        )?;
        let names = stmt
            .query_map([table], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;

        let mut constraints = Vec::with_capacity(names.len());
        for name in names {
            let mut cols = conn.prepare("SELECT name FROM pragma_index_info(?1) ORDER BY seqno")?;
            let columns = cols
                .query_map([&name], |row| row.get::<_, String>(0))?
                .collect::<Result<Vec<_>, _>>()?;
            // Auto-generated index names are not constraint names
            let name = (!name.starts_with("sqlite_autoindex_")).then_some(name);
            constraints.push(UniqueConstraint { name, columns });
        }
        Ok(constraints)
    }

    async fn check_constraints(&self, table: &str) -> Result<Vec<CheckConstraint>, ExtractionError> {
        let conn = self.conn.lock().await;
        let sql: Option<String> = conn.query_row(
            "SELECT sql FROM sqlite_master WHERE type = 'table' AND name = ?1",
            [table],
            |row| row.get(0),
        )?;
        Ok(sql.map(|s| parse_check_clauses(&s)).unwrap_or_default())
    }

    async fn row_count(&self, table: &str) -> Result<u64, ExtractionError> {
        let conn = self.conn.lock().await;
        let count: i64 = conn.query_row(
            &format!("SELECT COUNT(*) FROM {}", quote_ident(table)),
            [],
            |row| row.get(0),
        )?;
        Ok(count.max(0) as u64)
    }

    async fn view_names(&self) -> Result<Vec<String>, ExtractionError> {
        let conn = self.conn.lock().await;
        let mut stmt =
            conn.prepare("SELECT name FROM sqlite_master WHERE type = 'view' ORDER BY name")?;
        let names = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(names)
    }
}

/// Pulls `[CONSTRAINT name] CHECK (expr)` clauses out of a CREATE TABLE statement.
pub(crate) fn parse_check_clauses(sql: &str) -> Vec<CheckConstraint> {
    let upper = sql.to_ascii_uppercase();
    let bytes = sql.as_bytes();
    let mut out = Vec::new();
    let mut search_from = 0;

    while let Some(found) = upper[search_from..].find("CHECK") {
        let start = search_from + found;
        search_from = start + 5;

        let boundary_before = start == 0 || !is_ident_byte(bytes[start - 1]);
        let boundary_after = bytes.get(start + 5).map_or(true, |b| !is_ident_byte(*b));
        if !boundary_before || !boundary_after {
            continue;
        }

        let mut i = start + 5;
        while i < bytes.len() && bytes[i].is_ascii_whitespace() {
            i += 1;
        }
        if bytes.get(i) != Some(&b'(') {
            continue;
        }

        let open = i;
        let mut depth = 0usize;
        let mut close = None;
        for (offset, b) in bytes[open..].iter().enumerate() {
            match b {
                b'(' => depth += 1,
                b')' => {
                    depth -= 1;
                    if depth == 0 {
                        close = Some(open + offset);
                        break;
                    }
                }
                _ => {}
            }
        }
        let Some(close) = close else { break };

        out.push(CheckConstraint {
            name: constraint_name_before(sql, &upper, start),
            expression: sql[open + 1..close].trim().to_string(),
        });
        search_from = close + 1;
    }

    out
}

fn is_ident_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

fn constraint_name_before(sql: &str, upper: &str, check_start: usize) -> Option<String> {
    let head = upper[..check_start].trim_end();
    let mut words = head.split_whitespace().rev();
    let name_upper = words.next()?;
    let keyword = words.next()?;
    if keyword != "CONSTRAINT" {
        return None;
    }
    let name_start = head.len() - name_upper.len();
    let name = sql[name_start..head.len()].trim_matches(|c| c == '"' || c == '`' || c == '[' || c == ']');
    Some(name.to_string())
}

/// information_schema backed introspection for PostgreSQL.
pub struct PostgresIntrospector {
    client: Arc<Client>,
    schema: String,
}

impl PostgresIntrospector {
    pub fn new(client: Client, schema: impl Into<String>) -> Self {
        Self {
            client: Arc::new(client),
            schema: schema.into(),
        }
    }
}

#[async_trait]
impl Introspector for PostgresIntrospector {
    fn dialect(&self) -> Dialect {
        Dialect::Postgresql
    }

    async fn table_names(&self) -> Result<Vec<String>, ExtractionError> {
        let rows = self
            .client
            .query(
                "SELECT table_name FROM information_schema.tables
                 WHERE table_schema = $1 AND table_type = 'BASE TABLE'
                 ORDER BY table_name",
                &[&self.schema],
            )
            .await?;
        Ok(rows.iter().map(|row| row.get(0)).collect())
    }

    async fn columns(&self, table: &str) -> Result<Vec<ColumnDescription>, ExtractionError> {
        let rows = self
            .client
            .query(
                "SELECT
                    c.column_name,
                    c.data_type,
                    c.is_nullable = 'YES' as is_nullable,
                    c.column_default,
                    col_description(
                        (quote_ident(c.table_schema) || '.' || quote_ident(c.table_name))::regclass,
                        c.ordinal_position
                    ) as comment
                 FROM information_schema.columns c
                 WHERE c.table_schema = $1 AND c.table_name = $2
                 ORDER BY c.ordinal_position",
                &[&self.schema, &table],
            )
            .await?;

        Ok(rows
            .iter()
            .map(|row| ColumnDescription {
                name: row.get(0),
                declared_type: row.get(1),
                nullable: row.get(2),
                default: row.get(3),
                comment: row.get(4),
            })
            .collect())
    }

    async fn primary_key(&self, table: &str) -> Result<Vec<String>, ExtractionError> {
        let rows = self
            .client
            .query(
                "SELECT kcu.column_name
                 FROM information_schema.table_constraints tc
                 JOIN information_schema.key_column_usage kcu
                    ON tc.constraint_name = kcu.constraint_name
                    AND tc.table_schema = kcu.table_schema
                 WHERE tc.constraint_type = 'PRIMARY KEY'
                    AND tc.table_schema = $1
                    AND tc.table_name = $2
                 ORDER BY kcu.ordinal_position",
                &[&self.schema, &table],
            )
            .await?;
        Ok(rows.iter().map(|row| row.get(0)).collect())
    }

    async fn foreign_keys(&self, table: &str) -> Result<Vec<ForeignKeyDescription>, ExtractionError> {
        let rows = self
            .client
            .query(
                "SELECT
                    kcu.column_name,
                    ccu.table_name as foreign_table,
                    ccu.column_name as foreign_column,
                    rc.update_rule,
                    rc.delete_rule
                 FROM information_schema.table_constraints tc
                 JOIN information_schema.key_column_usage kcu
                    ON tc.constraint_name = kcu.constraint_name
                    AND tc.table_schema = kcu.table_schema
                 JOIN information_schema.constraint_column_usage ccu
                    ON ccu.constraint_name = tc.constraint_name
                 JOIN information_schema.referential_constraints rc
                    ON rc.constraint_name = tc.constraint_name
                    AND rc.constraint_schema = tc.table_schema
                 WHERE tc.constraint_type = 'FOREIGN KEY'
                    AND tc.table_schema = $1
                    AND tc.table_name = $2
                 ORDER BY kcu.ordinal_position",
                &[&self.schema, &table],
            )
            .await?;

        Ok(rows
            .iter()
            .map(|row| ForeignKeyDescription {
                column: row.get(0),
                referenced_table: row.get(1),
                referenced_column: row.get(2),
                on_update_action: row.get(3),
                on_delete_action: row.get(4),
            })
            .collect())
    }

    async fn indexes(&self, table: &str) -> Result<Vec<IndexDescription>, ExtractionError> {
        let rows = self
            .client
            .query(
                "SELECT i.relname, ix.indisunique, ix.indnatts
                 FROM pg_index ix
                 JOIN pg_class t ON t.oid = ix.indrelid
                 JOIN pg_class i ON i.oid = ix.indexrelid
                 JOIN pg_namespace n ON n.oid = t.relnamespace
                 WHERE n.nspname = $1 AND t.relname = $2
                 ORDER BY i.relname",
                &[&self.schema, &table],
            )
            .await?;

        Ok(rows
            .iter()
            .map(|row| IndexDescription {
                name: row.get(0),
                is_unique: row.get(1),
                column_count: row.get::<_, i16>(2).max(0) as usize,
            })
            .collect())
    }

    async fn unique_constraints(&self, table: &str) -> Result<Vec<UniqueConstraint>, ExtractionError> {
        let rows = self
            .client
            .query(
                "SELECT tc.constraint_name, kcu.column_name
                 FROM information_schema.table_constraints tc
                 JOIN information_schema.key_column_usage kcu
                    ON tc.constraint_name = kcu.constraint_name
                    AND tc.table_schema = kcu.table_schema
                 WHERE tc.constraint_type = 'UNIQUE'
                    AND tc.table_schema = $1
                    AND tc.table_name = $2
                 ORDER BY tc.constraint_name, kcu.ordinal_position",
                &[&self.schema, &table],
            )
            .await?;

        let mut grouped: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for row in &rows {
            grouped
                .entry(row.get::<_, String>(0))
                .or_default()
                .push(row.get(1));
        }
        Ok(grouped
            .into_iter()
            .map(|(name, columns)| UniqueConstraint {
                name: Some(name),
                columns,
            })
            .collect())
    }

    async fn check_constraints(&self, table: &str) -> Result<Vec<CheckConstraint>, ExtractionError> {
        let rows = self
            .client
            .query(
                "SELECT con.conname, pg_get_constraintdef(con.oid)
                 FROM pg_constraint con
                 JOIN pg_class t ON t.oid = con.conrelid
                 JOIN pg_namespace n ON n.oid = t.relnamespace
                 WHERE con.contype = 'c' AND n.nspname = $1 AND t.relname = $2
                 ORDER BY con.conname",
                &[&self.schema, &table],
            )
            .await?;

        Ok(rows
            .iter()
            .map(|row| CheckConstraint {
                name: row.get(0),
                expression: row.get(1),
            })
            .collect())
    }

    async fn row_count(&self, table: &str) -> Result<u64, ExtractionError> {
        let sql = format!(
            "SELECT COUNT(*) FROM {}.{}",
            quote_ident(&self.schema),
            quote_ident(table)
        );
        let row = self.client.query_one(sql.as_str(), &[]).await?;
        Ok(row.get::<_, i64>(0).max(0) as u64)
    }

    async fn view_names(&self) -> Result<Vec<String>, ExtractionError> {
        let rows = self
            .client
            .query(
                "SELECT table_name FROM information_schema.views
                 WHERE table_schema = $1 ORDER BY table_name",
                &[&self.schema],
            )
            .await?;
        Ok(rows.iter().map(|row| row.get(0)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_named_and_anonymous_checks() {
        let sql = "CREATE TABLE products (
            id INTEGER PRIMARY KEY,
            price REAL CHECK (price >= 0),
            qty INTEGER,
            CONSTRAINT qty_range CHECK (qty BETWEEN 0 AND (1000 * 10))
        )";
        let checks = parse_check_clauses(sql);
        assert_eq!(checks.len(), 2);
        assert_eq!(checks[0].name, None);
        assert_eq!(checks[0].expression, "price >= 0");
        assert_eq!(checks[1].name.as_deref(), Some("qty_range"));
        assert_eq!(checks[1].expression, "qty BETWEEN 0 AND (1000 * 10)");
    }

    #[test]
    fn constraint_name_may_sit_on_its_own_line() {
        let sql = "CREATE TABLE stock (
            qty INTEGER,
            CONSTRAINT
                \"qty_positive\"
                CHECK (qty > 0)
        )";
        let checks = parse_check_clauses(sql);
        assert_eq!(checks.len(), 1);
        assert_eq!(checks[0].name.as_deref(), Some("qty_positive"));
        assert_eq!(checks[0].expression, "qty > 0");
    }

    #[test]
    fn ignores_identifiers_containing_check() {
        let sql = "CREATE TABLE t (checked_at TEXT, rechecks INTEGER)";
        assert!(parse_check_clauses(sql).is_empty());
    }

    #[test]
    fn quotes_identifiers() {
        assert_eq!(quote_ident("order"), "\"order\"");
        assert_eq!(quote_ident("we\"ird"), "\"we\"\"ird\"");
    }
}
