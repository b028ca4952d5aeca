//! Materializes result sets as delimited-text artifacts.

use serde::Serialize;

use crate::dialect::Dialect;
use crate::engine::{Column, ConnectionId, QueryExecutor, RowSink, Value};
use crate::error::{Error, Result};
use crate::files::{ArtifactPath, FileStore, StagedFile};
use crate::paginate::{is_paginatable, normalize};
use crate::types::QualifiedName;

const EXPORT_EXTENSION: &str = "csv";

#[derive(Debug, Clone, Serialize)]
pub struct ExportReport {
    pub path: String,
    pub rows_written: u64,
}

/// Writes a header record followed by one record per row.
struct CsvSink {
    writer: csv::Writer<StagedFile>,
}

impl RowSink for CsvSink {
    fn columns(&mut self, columns: &[Column]) -> Result<()> {
        self.writer
            .write_record(columns.iter().map(|c| c.name.as_str()))?;
        Ok(())
    }

    fn row(&mut self, values: &[Value]) -> Result<()> {
        self.writer
            .write_record(values.iter().map(ToString::to_string))?;
        Ok(())
    }
}

pub struct Exporter<'a> {
    executor: &'a dyn QueryExecutor,
    files: &'a dyn FileStore,
    dialect: Dialect,
}

impl<'a> Exporter<'a> {
    pub fn new(executor: &'a dyn QueryExecutor, files: &'a dyn FileStore) -> Self {
        Self {
            executor,
            files,
            dialect: Dialect::default(),
        }
    }

    /// Writes every row of `table` to `<repo dir>/<table>.csv`.
    pub fn export_table(&self, table: &QualifiedName) -> Result<ExportReport> {
        let conn = ConnectionId::namespace(&table.namespace);
        let target = ArtifactPath::new(
            &table.namespace,
            &table.repo,
            &format!("{}.{EXPORT_EXTENSION}", table.table),
        )?;
        self.write(&conn, &format!("SELECT * FROM {}", table.to_sql()), &target)
    }

    /// Writes the rows of a saved select to `<repo dir>/<name>.csv`.
    pub fn export_query(
        &self,
        conn: &ConnectionId,
        namespace: &str,
        repo: &str,
        name: &str,
        sql: &str,
    ) -> Result<ExportReport> {
        let query = normalize(sql);
        if !is_paginatable(query) {
            return Err(Error::BadRequest(
                "only select statements can be exported".to_string(),
            ));
        }
        let target = ArtifactPath::new(namespace, repo, &format!("{name}.{EXPORT_EXTENSION}"))?;
        self.write(conn, query, &target)
    }

    fn write(&self, conn: &ConnectionId, sql: &str, target: &ArtifactPath) -> Result<ExportReport> {
        let staged = self.files.stage(target)?;
        let mut sink = CsvSink {
            writer: self.dialect.writer(staged),
        };

        // An early return drops the staged file, which removes it.
        let rows_written = self.executor.stream(conn, sql, &mut sink)?;

        let staged = sink
            .writer
            .into_inner()
            .map_err(|e| Error::Io(e.into_error()))?;
        staged.commit()?;

        tracing::info!(path = %target, rows = rows_written, "export complete");

        Ok(ExportReport {
            path: target.to_string(),
            rows_written,
        })
    }
}
