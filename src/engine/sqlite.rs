use std::collections::HashMap;
use std::fs::{self, File};
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use rusqlite::hooks::{AuthAction, AuthContext, Authorization};
use rusqlite::types::ValueRef;
use rusqlite::{Connection, Row, params};

use super::{Column, ConnectionId, QueryExecutor, QueryResult, RowEstimate, RowSink, Value};
use crate::dialect::{Dialect, decode_field};
use crate::error::{Error, Result};
use crate::types::{
    QualifiedName, Relations, quote_identifier, validate_namespace_name, validate_repo_name,
};

const MAIN_DB: &str = "main.db";
const DB_EXTENSION: &str = "db";
/// VM instructions between deadline checks.
const PROGRESS_OPS: i32 = 1000;
/// Reported for every object outside the caller's visible schemas, whether
/// or not it exists.
pub const ACCESS_DENIED_TEXT: &str = "access denied";
const MISSING_OBJECT_PREFIXES: &[&str] = &["no such table: ", "no such view: "];

/// Runs statements against SQLite: one database file per namespace, one
/// attached database per repo, so `"repo"."table"` addresses a table.
///
/// SQLite caps the number of attached databases per connection (10 in a
/// default build), which bounds the repos a namespace can hold.
pub struct SqliteExecutor {
    root: PathBuf,
    deadline: Option<Duration>,
    connections: Mutex<HashMap<String, Arc<Mutex<Connection>>>>,
}

impl SqliteExecutor {
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
            deadline: None,
            connections: Mutex::new(HashMap::new()),
        }
    }

    /// Interrupts caller statements that run longer than `deadline`.
    #[must_use]
    pub fn with_deadline(mut self, deadline: Option<Duration>) -> Self {
        self.deadline = deadline;
        self
    }

    fn namespace_dir(&self, namespace: &str) -> PathBuf {
        self.root.join(namespace)
    }

    fn schema_path(&self, namespace: &str, schema: &str) -> PathBuf {
        self.namespace_dir(namespace)
            .join(format!("{schema}.{DB_EXTENSION}"))
    }

    fn handle(&self, namespace: &str) -> Result<Arc<Mutex<Connection>>> {
        validate_namespace_name(namespace)?;

        let mut connections = self.connections.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(handle) = connections.get(namespace) {
            return Ok(Arc::clone(handle));
        }

        let handle = Arc::new(Mutex::new(self.open(namespace)?));
        connections.insert(namespace.to_string(), Arc::clone(&handle));
        Ok(handle)
    }

    fn open(&self, namespace: &str) -> Result<Connection> {
        let dir = self.namespace_dir(namespace);
        fs::create_dir_all(&dir)?;

        let conn = Connection::open(dir.join(MAIN_DB))?;
        conn.busy_timeout(Duration::from_secs(5))?;

        let mut schemas = Vec::new();
        for entry in fs::read_dir(&dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some(DB_EXTENSION) {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            if validate_repo_name(stem).is_ok() {
                schemas.push(stem.to_string());
            }
        }
        schemas.sort();

        for schema in schemas {
            attach(&conn, &self.schema_path(namespace, &schema), &schema)?;
        }

        tracing::debug!("Opened engine connection for namespace {}", namespace);
        Ok(conn)
    }

    /// Runs `f` on the namespace connection with caller restrictions
    /// installed: schema visibility, no ATTACH/DETACH, and the deadline.
    /// Engine errors of a scoped call pass through `mask_hidden`.
    fn with_caller<T>(
        &self,
        id: &ConnectionId,
        sql: &str,
        f: impl FnOnce(&Connection) -> Result<T>,
    ) -> Result<T> {
        let handle = self.handle(&id.namespace)?;
        let conn = lock(&handle);
        let hidden = match id.visible_schemas.as_deref() {
            Some(visible) => Some(hidden_schemas(&conn, visible)?),
            None => None,
        };
        let _scope = CallerScope::install(&conn, id, self.deadline);
        f(&conn).map_err(|e| match (e, id.visible_schemas.as_deref(), hidden) {
            (Error::Execution(text), Some(visible), Some(hidden)) => {
                Error::Execution(mask_hidden(visible, &hidden, sql, text))
            }
            (other, _, _) => other,
        })
    }

    fn with_internal<T>(
        &self,
        id: &ConnectionId,
        f: impl FnOnce(&Connection) -> Result<T>,
    ) -> Result<T> {
        let handle = self.handle(&id.namespace)?;
        let conn = lock(&handle);
        f(&conn)
    }
}

fn lock(handle: &Mutex<Connection>) -> MutexGuard<'_, Connection> {
    handle.lock().unwrap_or_else(|e| e.into_inner())
}

fn attach(conn: &Connection, path: &Path, schema: &str) -> Result<()> {
    conn.execute(
        &format!("ATTACH DATABASE ?1 AS {}", quote_identifier(schema)),
        params![path.to_string_lossy()],
    )
    .map_err(engine_err)?;
    Ok(())
}

fn is_attached(conn: &Connection, schema: &str) -> Result<bool> {
    let mut stmt = conn.prepare("PRAGMA database_list")?;
    let names = stmt.query_map([], |row| row.get::<_, String>(1))?;
    for name in names {
        if name? == schema {
            return Ok(true);
        }
    }
    Ok(false)
}

/// Attached schemas, `main` and `temp` included, that are not in `visible`.
fn hidden_schemas(conn: &Connection, visible: &[String]) -> Result<Vec<String>> {
    let mut stmt = conn.prepare("PRAGMA database_list")?;
    let names = stmt.query_map([], |row| row.get::<_, String>(1))?;
    let mut hidden = Vec::new();
    for name in names {
        let name = name?;
        if !visible.contains(&name) {
            hidden.push(name);
        }
    }
    Ok(hidden)
}

fn engine_err(e: rusqlite::Error) -> Error {
    Error::Execution(e.to_string())
}

/// Rewrites the error of a scoped call to one fixed text when the failure
/// could tell a hidden object apart from an absent one: authorizer denials,
/// misses outside `visible` (unqualified misses included, since they may
/// resolve into a hidden schema), and any error of a statement that names a
/// hidden schema.
fn mask_hidden(visible: &[String], hidden: &[String], sql: &str, text: String) -> String {
    let denied = text == "not authorized" || text.ends_with("is prohibited");
    let hidden_miss = MISSING_OBJECT_PREFIXES.iter().any(|prefix| {
        text.strip_prefix(prefix).is_some_and(|name| match name.split_once('.') {
            Some((schema, _)) => !visible.iter().any(|s| s == schema),
            None => true,
        })
    });
    let lowered = sql.to_ascii_lowercase();
    let names_hidden = hidden
        .iter()
        .any(|schema| mentions_schema(&lowered, &schema.to_ascii_lowercase()));

    if denied || hidden_miss || names_hidden {
        ACCESS_DENIED_TEXT.to_string()
    } else {
        text
    }
}

/// True if `sql` uses `schema` as a qualifier, bare or quoted.
fn mentions_schema(sql: &str, schema: &str) -> bool {
    let quoted = [("\"", "\""), ("`", "`"), ("[", "]")]
        .iter()
        .any(|(open, close)| sql.contains(&format!("{open}{schema}{close}.")));
    if quoted {
        return true;
    }
    sql.match_indices(&format!("{schema}.")).any(|(i, _)| {
        !sql[..i]
            .chars()
            .next_back()
            .is_some_and(|c| c.is_ascii_alphanumeric() || c == '_')
    })
}

fn first_keyword(sql: &str) -> String {
    sql.split_whitespace()
        .next()
        .unwrap_or("")
        .to_ascii_lowercase()
}

/// Statements that write outside the engine's own files.
fn is_forbidden_statement(sql: &str) -> bool {
    first_keyword(sql) == "vacuum"
}

/// Authorizer and progress handler for the lifetime of one caller call.
struct CallerScope<'a> {
    conn: &'a Connection,
}

impl<'a> CallerScope<'a> {
    fn install(conn: &'a Connection, id: &ConnectionId, deadline: Option<Duration>) -> Self {
        let visible = id.visible_schemas.clone();
        conn.authorizer(Some(move |ctx: AuthContext<'_>| {
            authorize(visible.as_deref(), &ctx)
        }));

        if let Some(limit) = deadline {
            let expires = Instant::now() + limit;
            conn.progress_handler(PROGRESS_OPS, Some(move || Instant::now() >= expires));
        }

        Self { conn }
    }
}

impl Drop for CallerScope<'_> {
    fn drop(&mut self) {
        self.conn
            .authorizer(None::<fn(AuthContext<'_>) -> Authorization>);
        self.conn.progress_handler(0, None::<fn() -> bool>);
    }
}

fn authorize(visible: Option<&[String]>, ctx: &AuthContext<'_>) -> Authorization {
    match &ctx.action {
        AuthAction::Attach { .. } | AuthAction::Detach { .. } => return Authorization::Deny,
        AuthAction::Pragma {
            pragma_value: Some(_),
            ..
        } => return Authorization::Deny,
        _ => {}
    }

    // The namespace connection is shared by every caller, so its temp
    // schema is not visible to any scoped caller.
    match (visible, ctx.database_name) {
        (Some(allowed), Some(db)) if !allowed.iter().any(|s| s == db) => Authorization::Deny,
        _ => Authorization::Allow,
    }
}

fn read_value(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::Integer(i),
        ValueRef::Real(r) => Value::Real(r),
        ValueRef::Text(t) => Value::Text(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(b) => Value::Blob(b.to_vec()),
    }
}

fn read_row(row: &Row<'_>, width: usize) -> rusqlite::Result<Vec<Value>> {
    (0..width).map(|i| row.get_ref(i).map(read_value)).collect()
}

fn run_statement(conn: &Connection, sql: &str) -> rusqlite::Result<QueryResult> {
    let mut stmt = conn.prepare(sql)?;
    let columns: Vec<Column> = stmt
        .column_names()
        .into_iter()
        .map(|name| Column {
            name: name.to_string(),
        })
        .collect();

    if columns.is_empty() {
        let changed = stmt.execute([])?;
        return Ok(QueryResult {
            columns,
            rows: Vec::new(),
            row_count: changed as u64,
            succeeded: true,
            error_text: None,
        });
    }

    let width = columns.len();
    let mut rows = Vec::new();
    let mut cursor = stmt.query([])?;
    while let Some(row) = cursor.next()? {
        rows.push(read_row(row, width)?);
    }

    Ok(QueryResult {
        columns,
        row_count: rows.len() as u64,
        rows,
        succeeded: true,
        error_text: None,
    })
}

impl QueryExecutor for SqliteExecutor {
    fn explain(&self, conn: &ConnectionId, sql: &str) -> Result<String> {
        self.with_caller(conn, sql, |c| {
            let mut stmt = c
                .prepare(&format!("EXPLAIN QUERY PLAN {sql}"))
                .map_err(engine_err)?;
            let details = stmt
                .query_map([], |row| row.get::<_, String>(3))
                .map_err(engine_err)?
                .collect::<rusqlite::Result<Vec<_>>>()
                .map_err(engine_err)?;
            Ok(details.join("\n"))
        })
    }

    /// SQLite plans carry no row estimate, so the count is taken directly.
    fn estimate_rows(&self, conn: &ConnectionId, sql: &str) -> Result<RowEstimate> {
        self.with_caller(conn, sql, |c| {
            let count: i64 = c
                .query_row(&format!("SELECT count(*) FROM ({sql})"), [], |row| row.get(0))
                .map_err(engine_err)?;
            Ok(RowEstimate {
                estimated_rows: count.max(0) as u64,
            })
        })
    }

    fn execute(&self, conn: &ConnectionId, sql: &str) -> Result<QueryResult> {
        if is_forbidden_statement(sql) {
            return Ok(QueryResult::failed("statement not permitted"));
        }
        match self.with_caller(conn, sql, |c| run_statement(c, sql).map_err(engine_err)) {
            Ok(result) => Ok(result),
            Err(Error::Execution(text)) => Ok(QueryResult::failed(text)),
            Err(e) => Err(e),
        }
    }

    fn stream(&self, conn: &ConnectionId, sql: &str, sink: &mut dyn RowSink) -> Result<u64> {
        if is_forbidden_statement(sql) {
            return Err(Error::Execution("statement not permitted".to_string()));
        }
        self.with_caller(conn, sql, |c| {
            let mut stmt = c.prepare(sql).map_err(engine_err)?;
            let columns: Vec<Column> = stmt
                .column_names()
                .into_iter()
                .map(|name| Column {
                    name: name.to_string(),
                })
                .collect();
            sink.columns(&columns)?;

            let mut count = 0u64;
            let mut cursor = stmt.query([]).map_err(engine_err)?;
            while let Some(row) = cursor.next().map_err(engine_err)? {
                let values = read_row(row, columns.len()).map_err(engine_err)?;
                sink.row(&values)?;
                count += 1;
            }
            Ok(count)
        })
    }

    fn bulk_load(
        &self,
        conn: &ConnectionId,
        table: &QualifiedName,
        file_path: &Path,
        dialect: &Dialect,
    ) -> Result<u64> {
        let file = File::open(file_path)?;
        let mut reader = dialect.reader(BufReader::new(file));

        self.with_caller(conn, &table.to_sql(), |c| {
            let width = c
                .prepare(&format!("SELECT * FROM {}", table.to_sql()))
                .map_err(engine_err)?
                .column_count();
            let placeholders = vec!["?"; width].join(", ");
            let insert = format!("INSERT INTO {} VALUES ({placeholders})", table.to_sql());

            let tx = c.unchecked_transaction().map_err(engine_err)?;
            let mut loaded = 0u64;
            {
                let mut stmt = tx.prepare(&insert).map_err(engine_err)?;
                let mut record = csv::ByteRecord::new();
                let mut skip_header = dialect.has_header;
                while reader.read_byte_record(&mut record)? {
                    if skip_header {
                        skip_header = false;
                        continue;
                    }
                    let values: Vec<String> = record.iter().map(decode_field).collect();
                    stmt.execute(rusqlite::params_from_iter(values.iter()))
                        .map_err(engine_err)?;
                    loaded += 1;
                }
            }
            tx.commit().map_err(engine_err)?;
            Ok(loaded)
        })
    }

    fn create_schema(&self, conn: &ConnectionId, schema: &str) -> Result<()> {
        validate_repo_name(schema)?;
        let path = self.schema_path(&conn.namespace, schema);
        self.with_internal(conn, |c| {
            if !is_attached(c, schema)? {
                attach(c, &path, schema)?;
            }
            // Forces the file header to be written so the schema survives reopen.
            c.execute_batch(&format!("PRAGMA {}.user_version = 1", quote_identifier(schema)))
                .map_err(engine_err)?;
            Ok(())
        })
    }

    fn drop_schema(&self, conn: &ConnectionId, schema: &str) -> Result<()> {
        validate_repo_name(schema)?;
        let path = self.schema_path(&conn.namespace, schema);
        self.with_internal(conn, |c| {
            if is_attached(c, schema)? {
                c.execute(&format!("DETACH DATABASE {}", quote_identifier(schema)), [])
                    .map_err(engine_err)?;
            }
            Ok(())
        })?;

        for suffix in ["", "-wal", "-shm", "-journal"] {
            let file = PathBuf::from(format!("{}{suffix}", path.display()));
            match fs::remove_file(&file) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(Error::Io(e)),
            }
        }
        Ok(())
    }

    fn list_relations(&self, conn: &ConnectionId, schema: &str) -> Result<Relations> {
        validate_repo_name(schema)?;
        self.with_internal(conn, |c| {
            let mut stmt = c
                .prepare(&format!(
                    "SELECT name, type FROM {}.sqlite_master
                     WHERE type IN ('table', 'view') AND name NOT LIKE 'sqlite_%'
                     ORDER BY name",
                    quote_identifier(schema)
                ))
                .map_err(engine_err)?;
            let entries = stmt
                .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))
                .map_err(engine_err)?;

            let mut relations = Relations::default();
            for entry in entries {
                let (name, kind) = entry.map_err(engine_err)?;
                if kind == "view" {
                    relations.views.push(name);
                } else {
                    relations.tables.push(name);
                }
            }
            Ok(relations)
        })
    }
}
