//! Schema inference and loading of delimited-text artifacts.

use std::collections::HashSet;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use serde::Serialize;

use crate::dialect::{Dialect, DialectHints, decode_field};
use crate::engine::{ConnectionId, QueryExecutor};
use crate::error::{Error, Result};
use crate::files::ArtifactPath;
use crate::types::{QualifiedName, quote_identifier};

const TABLE_PREFIX: &str = "table";
const COLUMN_PREFIX: &str = "col";

/// Turns arbitrary text into an identifier of `[a-z0-9_]` that does not start
/// with a digit.
#[must_use]
pub fn sanitize(raw: &str, prefix: &str) -> String {
    let cleaned: String = raw
        .to_lowercase()
        .chars()
        .map(|c| {
            if c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();

    if cleaned.is_empty() {
        prefix.to_string()
    } else if cleaned.starts_with(|c: char| c.is_ascii_digit()) {
        format!("{prefix}_{cleaned}")
    } else {
        cleaned
    }
}

/// Makes names unique while keeping their order. Repeats get `_1`, `_2`, ...
/// skipping candidates that are taken or appear elsewhere in the input.
#[must_use]
pub fn dedup(names: Vec<String>) -> Vec<String> {
    let original: HashSet<String> = names.iter().cloned().collect();
    let mut used: HashSet<String> = HashSet::with_capacity(names.len());

    names
        .into_iter()
        .map(|name| {
            if used.insert(name.clone()) {
                return name;
            }
            let mut n = 1u32;
            loop {
                let candidate = format!("{name}_{n}");
                if !used.contains(&candidate) && !original.contains(&candidate) {
                    used.insert(candidate.clone());
                    return candidate;
                }
                n += 1;
            }
        })
        .collect()
}

/// Column names for a file's first row.
#[must_use]
pub fn column_names(first_row: &[String], has_header: bool) -> Vec<String> {
    let raw: Vec<String> = if has_header {
        first_row
            .iter()
            .map(|label| sanitize(label, COLUMN_PREFIX))
            .collect()
    } else {
        (0..first_row.len()).map(|i| format!("col_{i}")).collect()
    };
    dedup(raw)
}

fn read_first_row(local: &Path, dialect: &Dialect) -> Result<Vec<String>> {
    let file = File::open(local)
        .map_err(|e| Error::EmptyOrUnreadableInput(format!("cannot open file: {e}")))?;
    let mut reader = dialect.reader(BufReader::new(file));
    let mut record = csv::ByteRecord::new();

    match reader.read_byte_record(&mut record) {
        Ok(true) => Ok(record.iter().map(decode_field).collect()),
        Ok(false) => Err(Error::EmptyOrUnreadableInput("file has no rows".to_string())),
        Err(e) => Err(Error::EmptyOrUnreadableInput(e.to_string())),
    }
}

/// Everything needed to create and fill the target table.
#[derive(Debug, Clone)]
pub struct ImportPlan {
    pub table: QualifiedName,
    pub columns: Vec<String>,
    pub dialect: Dialect,
    pub create_sql: String,
}

impl ImportPlan {
    /// Infers the table from `artifact`, whose bytes are at `local`.
    pub fn infer(artifact: &ArtifactPath, local: &Path, hints: &DialectHints) -> Result<Self> {
        let dialect = Dialect::resolve(hints)?;
        let table = QualifiedName::new(
            &artifact.namespace,
            &artifact.repo,
            &sanitize(artifact.stem(), TABLE_PREFIX),
        )?;

        let first_row = read_first_row(local, &dialect)?;
        let columns = column_names(&first_row, dialect.has_header);

        let definitions: Vec<String> = columns
            .iter()
            .map(|c| format!("{} text", quote_identifier(c)))
            .collect();
        let create_sql = format!(
            "CREATE TABLE {} ({})",
            table.to_sql(),
            definitions.join(", ")
        );

        Ok(Self {
            table,
            columns,
            dialect,
            create_sql,
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ImportReport {
    pub table: String,
    pub columns: Vec<String>,
    pub rows_loaded: u64,
}

pub struct ImportPlanner<'a> {
    executor: &'a dyn QueryExecutor,
}

impl<'a> ImportPlanner<'a> {
    pub fn new(executor: &'a dyn QueryExecutor) -> Self {
        Self { executor }
    }

    /// Creates the table and bulk loads the file into it. A failed load
    /// leaves the created table in place, empty.
    pub fn run(&self, plan: &ImportPlan, local: &Path) -> Result<ImportReport> {
        let conn = ConnectionId::namespace(&plan.table.namespace);

        self.executor
            .execute(&conn, &plan.create_sql)?
            .into_checked()?;

        let rows_loaded = self
            .executor
            .bulk_load(&conn, &plan.table, local, &plan.dialect)
            .inspect_err(|e| {
                tracing::warn!(table = %plan.table, error = %e, "load failed, table kept empty");
            })?;

        tracing::info!(table = %plan.table, rows = rows_loaded, "import complete");

        Ok(ImportReport {
            table: plan.table.to_string(),
            columns: plan.columns.clone(),
            rows_loaded,
        })
    }
}
