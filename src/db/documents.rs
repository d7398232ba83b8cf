use crate::db::connection::Dialect;
use crate::db::schema::{
    CollectionDescription, ColumnAnalysis, ColumnDescription, ConnectionInfo, FieldStats,
    SchemaDescription, TableDescription,
};
use crate::error::ExtractionError;
use csv::{ReaderBuilder, StringRecord};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use tracing::{info, warn};

pub const DEFAULT_SAMPLE_SIZE: usize = 100;

const KEPT_SAMPLES: usize = 5;

/// Name used in field histograms for a JSON value's kind.
pub fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "NoneType",
        Value::Bool(_) => "bool",
        Value::Number(n) if n.is_i64() || n.is_u64() => "int",
        Value::Number(_) => "float",
        Value::String(_) => "str",
        Value::Array(_) => "list",
        Value::Object(_) => "dict",
    }
}

#[derive(Default)]
struct FieldTally {
    types: BTreeSet<&'static str>,
    count: usize,
}

fn walk(doc: &serde_json::Map<String, Value>, prefix: &str, tally: &mut BTreeMap<String, FieldTally>) {
    for (key, value) in doc {
        let path = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{}.{}", prefix, key)
        };

        let entry = tally.entry(path.clone()).or_default();
        entry.types.insert(type_name(value));
        entry.count += 1;

        match value {
            Value::Object(nested) => walk(nested, &path, tally),
            // Only the first element of a list is modeled.
            Value::Array(items) => {
                if let Some(Value::Object(first)) = items.first() {
                    walk(first, &path, tally);
                }
            }
            _ => {}
        }
    }
}

/// Samples the first `sample_size` documents and builds the per-path histogram.
pub fn describe_collection(documents: &[Value], sample_size: usize) -> CollectionDescription {
    let sample: Vec<&serde_json::Map<String, Value>> = documents
        .iter()
        .take(sample_size)
        .filter_map(Value::as_object)
        .collect();

    let mut tally = BTreeMap::new();
    for doc in &sample {
        walk(doc, "", &mut tally);
    }

    let sampled = sample.len();
    let fields = tally
        .into_iter()
        .map(|(path, t)| {
            let presence_percentage = if sampled == 0 {
                0.0
            } else {
                t.count as f64 / sampled as f64 * 100.0
            };
            (
                path,
                FieldStats {
                    types: t.types.into_iter().map(str::to_string).collect(),
                    presence_percentage,
                    is_required: sampled > 0 && t.count == sampled,
                },
            )
        })
        .collect();

    CollectionDescription {
        sampled_documents: sampled,
        fields,
        sample_documents: sample
            .iter()
            .take(KEPT_SAMPLES)
            .map(|d| Value::Object((*d).clone()))
            .collect(),
    }
}

/// Relational view of a collection so charts and prompts see one shape.
fn collection_as_table(collection: &CollectionDescription, total_documents: usize) -> TableDescription {
    let columns: Vec<ColumnDescription> = collection
        .fields
        .iter()
        .map(|(path, stats)| ColumnDescription {
            name: path.clone(),
            declared_type: stats.types.join("|"),
            nullable: !stats.is_required,
            default: None,
            comment: None,
        })
        .collect();

    let primary_key_columns = if collection.fields.contains_key("_id") {
        vec!["_id".to_string()]
    } else {
        Vec::new()
    };

    TableDescription {
        column_analysis: ColumnAnalysis::from_columns(&columns),
        columns,
        primary_key_columns,
        row_count: Some(total_documents as u64),
        ..Default::default()
    }
}

/// Builds a schema from named collections of documents.
pub fn describe_documents(
    collections: Vec<(String, Vec<Value>)>,
    sample_size: usize,
) -> SchemaDescription {
    let mut tables = Vec::with_capacity(collections.len());
    let mut described = Vec::with_capacity(collections.len());

    for (name, documents) in collections {
        info!("Sampling collection: {} ({} documents)", name, documents.len());
        let collection = describe_collection(&documents, sample_size);
        tables.push((name.clone(), collection_as_table(&collection, documents.len())));
        described.push((name, collection));
    }

    SchemaDescription {
        database_kind: Dialect::Documents.as_str().to_string(),
        connection_info: ConnectionInfo {
            dialect: Dialect::Documents.as_str().to_string(),
            driver: Dialect::Documents.driver().to_string(),
        },
        tables,
        views: Vec::new(),
        collections: described,
    }
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("documents")
        .to_string()
}

/// Loads a JSON export: either `{collection: [docs]}` or a top-level array
/// treated as a single collection named after the file.
pub fn extract_json_file(path: &Path, sample_size: usize) -> Result<SchemaDescription, ExtractionError> {
    let text = std::fs::read_to_string(path).map_err(|e| ExtractionError::Connection {
        target: path.display().to_string(),
        message: e.to_string(),
    })?;
    let root: Value = serde_json::from_str(&text)
        .map_err(|e| ExtractionError::Documents(format!("{}: {}", path.display(), e)))?;

    let collections = match root {
        Value::Array(items) => vec![(file_stem(path), items)],
        Value::Object(map) => map
            .into_iter()
            .filter_map(|(name, value)| match value {
                Value::Array(items) => Some((name, items)),
                _ => {
                    warn!("Skipping '{}': not an array of documents", name);
                    None
                }
            })
            .collect(),
        _ => {
            return Err(ExtractionError::Documents(format!(
                "{}: expected an array or an object of arrays",
                path.display()
            )))
        }
    };

    Ok(describe_documents(collections, sample_size))
}

/// Reads delimited text into a header record and its data rows.
///
/// Rows may be ragged; missing cells read as empty.
pub fn read_csv(text: &str) -> Result<(StringRecord, Vec<StringRecord>), csv::Error> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(text.trim_start_matches('\u{feff}').as_bytes());
    let header = reader.headers()?.clone();
    let rows = reader.records().collect::<Result<Vec<_>, _>>()?;
    Ok((header, rows))
}

fn cell(record: &StringRecord, i: usize) -> &str {
    record.get(i).unwrap_or("")
}

fn infer_type<'a>(values: impl Iterator<Item = &'a str>) -> &'static str {
    let mut seen_any = false;
    let mut all_int = true;
    let mut all_real = true;

    for v in values.map(str::trim).filter(|v| !v.is_empty()) {
        seen_any = true;
        if v.parse::<i64>().is_err() {
            all_int = false;
        }
        if v.parse::<f64>().is_err() {
            all_real = false;
        }
    }

    match (seen_any, all_int, all_real) {
        (false, _, _) => "TEXT",
        (true, true, _) => "INTEGER",
        (true, false, true) => "REAL",
        _ => "TEXT",
    }
}

/// Describes delimited text as a single table named `table_name`.
pub fn describe_csv(table_name: &str, text: &str, sample_size: usize) -> Result<SchemaDescription, ExtractionError> {
    let (header, rows) = read_csv(text)
        .map_err(|e| ExtractionError::Documents(format!("{}: {}", table_name, e)))?;
    if header.is_empty() {
        return Err(ExtractionError::Documents(format!("{}: no header row", table_name)));
    }
    let sample = &rows[..rows.len().min(sample_size)];

    let columns: Vec<ColumnDescription> = header
        .iter()
        .enumerate()
        .map(|(i, raw)| {
            let name = match raw.trim() {
                "" => format!("column_{}", i + 1),
                trimmed => trimmed.to_string(),
            };
            ColumnDescription {
                name,
                declared_type: infer_type(sample.iter().map(|r| cell(r, i))).to_string(),
                nullable: sample.iter().any(|r| cell(r, i).trim().is_empty()),
                default: None,
                comment: None,
            }
        })
        .collect();

    let table = TableDescription {
        column_analysis: ColumnAnalysis::from_columns(&columns),
        columns,
        row_count: Some(rows.len() as u64),
        ..Default::default()
    };

    Ok(SchemaDescription {
        database_kind: Dialect::Csv.as_str().to_string(),
        connection_info: ConnectionInfo {
            dialect: Dialect::Csv.as_str().to_string(),
            driver: Dialect::Csv.driver().to_string(),
        },
        tables: vec![(table_name.to_string(), table)],
        views: Vec::new(),
        collections: Vec::new(),
    })
}

pub fn extract_csv_file(path: &Path, sample_size: usize) -> Result<SchemaDescription, ExtractionError> {
    let text = std::fs::read_to_string(path).map_err(|e| ExtractionError::Connection {
        target: path.display().to_string(),
        message: e.to_string(),
    })?;
    describe_csv(&file_stem(path), &text, sample_size)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn histogram_tracks_paths_types_and_presence() {
        let docs = vec![
            json!({"_id": 1, "name": "Ada", "address": {"city": "London"}, "tags": [{"label": "vip"}]}),
            json!({"_id": 2, "name": null, "address": {"city": "Paris", "zip": "75001"}}),
            json!({"_id": 3.5, "name": "Bob", "tags": []}),
            json!({"_id": 4, "name": "Cy"}),
        ];

        let c = describe_collection(&docs, 100);
        assert_eq!(c.sampled_documents, 4);

        let id = &c.fields["_id"];
        assert_eq!(id.types, vec!["float", "int"]);
        assert!(id.is_required);
        assert_eq!(id.presence_percentage, 100.0);

        assert_eq!(c.fields["name"].types, vec!["NoneType", "str"]);
        assert_eq!(c.fields["address.city"].presence_percentage, 50.0);
        assert_eq!(c.fields["address.zip"].presence_percentage, 25.0);
        assert!(!c.fields["address.zip"].is_required);
        assert_eq!(c.fields["tags"].types, vec!["list"]);
        assert_eq!(c.fields["tags.label"].presence_percentage, 25.0);
        assert_eq!(c.sample_documents.len(), 4);
    }

    #[test]
    fn sampling_stops_at_sample_size() {
        let docs: Vec<Value> = (0..20).map(|i| json!({"n": i})).collect();
        let c = describe_collection(&docs, 10);
        assert_eq!(c.sampled_documents, 10);
        assert_eq!(c.sample_documents.len(), KEPT_SAMPLES);
    }

    #[test]
    fn json_object_of_collections_becomes_tables() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("store.json");
        std::fs::write(
            &path,
            r#"{"users": [{"_id": 1, "email": "a@b.c"}, {"_id": 2}], "meta": {"v": 1}, "orders": []}"#,
        )
        .unwrap();

        let schema = extract_json_file(&path, DEFAULT_SAMPLE_SIZE).unwrap();
        assert_eq!(schema.database_kind, "documents");
        assert_eq!(schema.table_names().collect::<Vec<_>>(), vec!["users", "orders"]);

        let users = schema.table("users").unwrap();
        assert_eq!(users.row_count, Some(2));
        assert_eq!(users.primary_key_columns, vec!["_id"]);
        let email = users.columns.iter().find(|c| c.name == "email").unwrap();
        assert!(email.nullable);
        assert_eq!(users.column_analysis.potential_pii, vec!["email"]);
        assert_eq!(schema.collections.len(), 2);
    }

    #[test]
    fn top_level_array_is_named_after_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("events.json");
        std::fs::write(&path, r#"[{"kind": "click"}]"#).unwrap();
        let schema = extract_json_file(&path, DEFAULT_SAMPLE_SIZE).unwrap();
        assert_eq!(schema.table_names().collect::<Vec<_>>(), vec!["events"]);
    }

    #[test]
    fn csv_reader_handles_quotes() {
        let (header, rows) = read_csv("a,b\n\"x, y\",\"say \"\"hi\"\"\"\r\n1,\n").unwrap();
        assert_eq!(header.iter().collect::<Vec<_>>(), vec!["a", "b"]);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].iter().collect::<Vec<_>>(), vec!["x, y", "say \"hi\""]);
        assert_eq!(rows[1].iter().collect::<Vec<_>>(), vec!["1", ""]);
    }

    #[test]
    fn csv_byte_order_mark_is_not_part_of_the_first_column() {
        let schema = describe_csv("bom", "\u{feff}id,name\n1,Ann\n", DEFAULT_SAMPLE_SIZE).unwrap();
        let table = schema.table("bom").unwrap();
        assert_eq!(table.columns[0].name, "id");
        assert_eq!(table.columns[0].declared_type, "INTEGER");
    }

    #[test]
    fn csv_quoted_newlines_stay_in_one_row() {
        let text = "id,note\n1,\"first line\nsecond line\"\n2,short\n3\n";
        let (_, rows) = read_csv(text).unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(&rows[0][1], "first line\nsecond line");

        let schema = describe_csv("notes", text, DEFAULT_SAMPLE_SIZE).unwrap();
        let table = schema.table("notes").unwrap();
        assert_eq!(table.row_count, Some(3));
        assert!(table.columns[1].nullable);
    }

    #[test]
    fn empty_csv_has_no_header() {
        assert!(describe_csv("empty", "", DEFAULT_SAMPLE_SIZE).is_err());
    }

    #[test]
    fn csv_types_are_inferred_from_samples() {
        let text = "id,price,label,\n1,9.5,apple,\n2,10,,\n3,,pear,\n";
        let schema = describe_csv("fruit", text, DEFAULT_SAMPLE_SIZE).unwrap();
        let table = schema.table("fruit").unwrap();
        let types: Vec<_> = table.columns.iter().map(|c| c.declared_type.as_str()).collect();
        assert_eq!(types, vec!["INTEGER", "REAL", "TEXT", "TEXT"]);
        assert_eq!(table.columns[3].name, "column_4");
        assert!(!table.columns[0].nullable);
        assert!(table.columns[1].nullable);
        assert_eq!(table.row_count, Some(3));
    }
}
