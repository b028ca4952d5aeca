//! Boundary to the relational engine.
//!
//! Every call names the namespace connection explicitly; there is no ambient
//! "current connection".

mod sqlite;

pub use sqlite::{ACCESS_DENIED_TEXT, SqliteExecutor};

use std::fmt;
use std::path::Path;

use serde::{Serialize, Serializer};

use crate::dialect::Dialect;
use crate::error::{Error, Result};
use crate::types::{QualifiedName, Relations};

/// Identity a statement runs under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionId {
    pub namespace: String,
    /// Repo schemas the statement may touch. `None` leaves every repo of the
    /// namespace visible.
    pub visible_schemas: Option<Vec<String>>,
}

impl ConnectionId {
    #[must_use]
    pub fn namespace(namespace: &str) -> Self {
        Self {
            namespace: namespace.to_string(),
            visible_schemas: None,
        }
    }

    #[must_use]
    pub fn scoped(namespace: &str, schemas: Vec<String>) -> Self {
        Self {
            namespace: namespace.to_string(),
            visible_schemas: Some(schemas),
        }
    }
}

/// A single value. Opaque to the pagination layer.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Integer(i) => write!(f, "{i}"),
            Value::Real(r) => write!(f, "{r}"),
            Value::Text(s) => f.write_str(s),
            Value::Blob(b) => {
                for byte in b {
                    write!(f, "{byte:02x}")?;
                }
                Ok(())
            }
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Value::Null => serializer.serialize_none(),
            Value::Integer(i) => serializer.serialize_i64(*i),
            Value::Real(r) => serializer.serialize_f64(*r),
            Value::Text(s) => serializer.serialize_str(s),
            Value::Blob(_) => serializer.serialize_str(&self.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Column {
    pub name: String,
}

/// Outcome of one statement.
#[derive(Debug, Clone, Default, Serialize)]
pub struct QueryResult {
    pub columns: Vec<Column>,
    pub rows: Vec<Vec<Value>>,
    pub row_count: u64,
    pub succeeded: bool,
    pub error_text: Option<String>,
}

impl QueryResult {
    #[must_use]
    pub fn failed(error_text: impl Into<String>) -> Self {
        Self {
            succeeded: false,
            error_text: Some(error_text.into()),
            ..Self::default()
        }
    }

    /// Turns an engine-reported failure into `Error::Execution`.
    pub fn into_checked(self) -> Result<Self> {
        if self.succeeded {
            Ok(self)
        } else {
            Err(Error::Execution(
                self.error_text
                    .unwrap_or_else(|| "statement failed".to_string()),
            ))
        }
    }

    #[must_use]
    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RowEstimate {
    pub estimated_rows: u64,
}

/// Receives a result set one row at a time.
pub trait RowSink {
    fn columns(&mut self, columns: &[Column]) -> Result<()>;
    fn row(&mut self, values: &[Value]) -> Result<()>;
}

pub trait QueryExecutor: Send + Sync {
    /// Engine-specific plan text for `sql`.
    fn explain(&self, conn: &ConnectionId, sql: &str) -> Result<String>;

    /// Planner row estimate. Defaults to the first `rows=<n>` token of the
    /// plan text; adapters with a typed estimate override this.
    fn estimate_rows(&self, conn: &ConnectionId, sql: &str) -> Result<RowEstimate> {
        let plan = self.explain(conn, sql)?;
        parse_row_estimate(&plan)
    }

    /// Runs one statement. Engine failures are reported in the result, not as
    /// `Err`; `Err` means the connection itself could not be used.
    fn execute(&self, conn: &ConnectionId, sql: &str) -> Result<QueryResult>;

    /// Runs a row-producing statement, handing every row to `sink`.
    fn stream(&self, conn: &ConnectionId, sql: &str, sink: &mut dyn RowSink) -> Result<u64>;

    /// Loads a delimited file into an existing table. Values are bound as
    /// parameters, never spliced into SQL text.
    fn bulk_load(
        &self,
        conn: &ConnectionId,
        table: &QualifiedName,
        file_path: &Path,
        dialect: &Dialect,
    ) -> Result<u64>;

    fn create_schema(&self, conn: &ConnectionId, schema: &str) -> Result<()>;
    fn drop_schema(&self, conn: &ConnectionId, schema: &str) -> Result<()>;
    fn list_relations(&self, conn: &ConnectionId, schema: &str) -> Result<Relations>;
}

/// Finds the first `rows=<integer>` token in planner output.
pub fn parse_row_estimate(plan: &str) -> Result<RowEstimate> {
    const MARKER: &str = "rows=";

    let mut rest = plan;
    while let Some(pos) = rest.find(MARKER) {
        let after = &rest[pos + MARKER.len()..];
        let digits: &str = &after[..after
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(after.len())];
        if let Ok(estimated_rows) = digits.parse::<u64>() {
            return Ok(RowEstimate { estimated_rows });
        }
        rest = after;
    }

    Err(Error::EstimationFailure(
        "plan text has no rows=<n> estimate".to_string(),
    ))
}
