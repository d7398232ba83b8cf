use crate::error::ExtractionError;
use rusqlite::{Connection, OpenFlags};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::path::{Path, PathBuf};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_postgres::{Client, Connection as PgConnection, NoTls};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    Sqlite,
    Postgresql,
    /// Document collections loaded from a JSON export.
    Documents,
    /// A single delimited flat file.
    Csv,
}

impl Dialect {
    pub fn as_str(&self) -> &'static str {
        match self {
            Dialect::Sqlite => "sqlite",
            Dialect::Postgresql => "postgresql",
            Dialect::Documents => "documents",
            Dialect::Csv => "csv",
        }
    }

    pub fn driver(&self) -> &'static str {
        match self {
            Dialect::Sqlite => "rusqlite",
            Dialect::Postgresql => "tokio-postgres",
            Dialect::Documents => "serde_json",
            Dialect::Csv => "text",
        }
    }
}

impl FromStr for Dialect {
    type Err = ExtractionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sqlite" | "sqlite3" => Ok(Dialect::Sqlite),
            "postgresql" | "postgres" => Ok(Dialect::Postgresql),
            "documents" | "json" => Ok(Dialect::Documents),
            "csv" => Ok(Dialect::Csv),
            other => Err(ExtractionError::Unsupported(format!(
                "unknown database type '{}'",
                other
            ))),
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SslMode {
    #[default]
    Disable,
    Require,
}

/// Where a source lives and how to talk to it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConnectionDescriptor {
    pub dialect: Dialect,
    pub connection_string: String,
    #[serde(default)]
    pub ssl_mode: SslMode,
}

impl ConnectionDescriptor {
    pub fn sqlite(path: impl AsRef<Path>) -> Self {
        Self {
            dialect: Dialect::Sqlite,
            connection_string: format!("sqlite:///{}", path.as_ref().display()),
            ssl_mode: SslMode::Disable,
        }
    }

    /// Accepts `sqlite:///path`, `postgres://…`/`postgresql://…` URLs, and bare
    /// file paths whose extension names the format.
    pub fn parse(value: &str) -> Result<Self, ExtractionError> {
        let value = value.trim();
        if value.starts_with("sqlite:///") {
            return Ok(Self {
                dialect: Dialect::Sqlite,
                connection_string: value.to_string(),
                ssl_mode: SslMode::Disable,
            });
        }

        if value.starts_with("postgres://") || value.starts_with("postgresql://") {
            let ssl_mode = if value.contains("sslmode=require") {
                SslMode::Require
            } else {
                SslMode::Disable
            };
            return Ok(Self {
                dialect: Dialect::Postgresql,
                connection_string: value.to_string(),
                ssl_mode,
            });
        }

        let extension = Path::new(value)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();

        let dialect = match extension.as_str() {
            "db" | "sqlite" | "sqlite3" => Dialect::Sqlite,
            "json" => Dialect::Documents,
            "csv" => Dialect::Csv,
            other => {
                return Err(ExtractionError::Unsupported(format!(
                    "cannot infer a dialect for '{}' (extension '{}')",
                    value, other
                )))
            }
        };

        if dialect == Dialect::Sqlite {
            return Ok(Self::sqlite(value));
        }

        Ok(Self {
            dialect,
            connection_string: value.to_string(),
            ssl_mode: SslMode::Disable,
        })
    }

    /// Like [`parse`](Self::parse), but trusts `db_type` over the file
    /// extension. An empty `db_type` falls back to inference.
    pub fn parse_as(value: &str, db_type: &str) -> Result<Self, ExtractionError> {
        if db_type.trim().is_empty() {
            return Self::parse(value);
        }
        let dialect: Dialect = db_type.parse()?;
        let value = value.trim();
        let is_url = value.starts_with("postgres://") || value.starts_with("postgresql://");

        match dialect {
            Dialect::Postgresql if is_url => Self::parse(value),
            Dialect::Postgresql => Err(ExtractionError::Unsupported(format!(
                "'{}' is not a postgresql:// URL",
                value
            ))),
            _ if is_url => Err(ExtractionError::Unsupported(format!(
                "a {} source cannot be read from {}",
                dialect,
                redact(value)
            ))),
            Dialect::Sqlite => Ok(Self::sqlite(value.strip_prefix("sqlite:///").unwrap_or(value))),
            Dialect::Documents | Dialect::Csv => Ok(Self {
                dialect,
                connection_string: value.to_string(),
                ssl_mode: SslMode::Disable,
            }),
        }
    }

    /// File-system path for file-backed dialects.
    pub fn file_path(&self) -> Option<PathBuf> {
        match self.dialect {
            Dialect::Sqlite => Some(PathBuf::from(
                self.connection_string
                    .strip_prefix("sqlite:///")
                    .unwrap_or(&self.connection_string),
            )),
            Dialect::Documents | Dialect::Csv => Some(PathBuf::from(&self.connection_string)),
            Dialect::Postgresql => None,
        }
    }
}

/// Opens a SQLite file read-only. A missing file is a connection error, never
/// an implicitly created empty database.
pub fn open_sqlite(path: &Path) -> Result<Connection, ExtractionError> {
    Connection::open_with_flags(
        path,
        OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )
    .map_err(|e| ExtractionError::Connection {
        target: path.display().to_string(),
        message: e.to_string(),
    })
}

pub async fn connect_postgres(descriptor: &ConnectionDescriptor) -> Result<Client, ExtractionError> {
    let target = redact(&descriptor.connection_string);
    let map_err = |e: tokio_postgres::Error| ExtractionError::Connection {
        target: target.clone(),
        message: e.to_string(),
    };

    match descriptor.ssl_mode {
        SslMode::Disable => {
            let (client, connection) = tokio_postgres::connect(&descriptor.connection_string, NoTls)
                .await
                .map_err(map_err)?;
            drive(connection);
            Ok(client)
        }
        SslMode::Require => {
            let connector = native_tls::TlsConnector::builder()
                .build()
                .map_err(|e| ExtractionError::Connection {
                    target: target.clone(),
                    message: e.to_string(),
                })?;
            let tls = postgres_native_tls::MakeTlsConnector::new(connector);
            let (client, connection) = tokio_postgres::connect(&descriptor.connection_string, tls)
                .await
                .map_err(map_err)?;
            drive(connection);
            Ok(client)
        }
    }
}

/// Polls the connection half on its own task for as long as the client lives.
fn drive<S, T>(connection: PgConnection<S, T>)
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    T: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        if let Err(e) = connection.await {
            tracing::error!("PostgreSQL connection error: {}", e);
        }
    });
}

/// Hides the password portion of a URL-style connection string.
pub fn redact(connection_string: &str) -> String {
    let Some(scheme_end) = connection_string.find("://") else {
        return connection_string.to_string();
    };
    let rest = &connection_string[scheme_end + 3..];
    let Some(at) = rest.rfind('@') else {
        return connection_string.to_string();
    };
    let credentials = &rest[..at];
    match credentials.find(':') {
        Some(colon) => format!(
            "{}{}:****{}",
            &connection_string[..scheme_end + 3],
            &credentials[..colon],
            &rest[at..]
        ),
        None => connection_string.to_string(),
    }
}
