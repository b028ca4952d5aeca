//! Safe pagination of caller-supplied SQL.
//!
//! Select statements are estimated, then re-issued inside a fixed outer
//! `SELECT * FROM (...) AS <alias> LIMIT .. OFFSET ..` so the caller's own
//! `ORDER BY`/`LIMIT` keep working. Anything else runs once, verbatim.

use serde::Serialize;

use crate::engine::{ConnectionId, QueryExecutor, QueryResult, Value};
use crate::error::{Error, Result};

/// Alias of the pagination sub-select. Reserved: never derived from input.
pub const PAGE_ALIAS: &str = "__repobase_page";

pub const DEFAULT_PAGE_SIZE: u64 = 50;

/// Pages shown on each side of the window's start.
const WINDOW_LEAD: u64 = 5;
const WINDOW_SPAN: u64 = 10;
/// Largest OFFSET SQLite accepts as an integer.
const MAX_OFFSET: u64 = i64::MAX as u64;

/// Trims whitespace and a single trailing statement separator.
#[must_use]
pub fn normalize(sql: &str) -> &str {
    let trimmed = sql.trim();
    trimmed.strip_suffix(';').unwrap_or(trimmed).trim()
}

/// True when the first whitespace-delimited token is `select`.
#[must_use]
pub fn is_paginatable(sql: &str) -> bool {
    sql.split_whitespace()
        .next()
        .is_some_and(|token| token.eq_ignore_ascii_case("select"))
}

#[must_use]
pub fn wrap(sql: &str, limit: u64, offset: u64) -> String {
    format!("SELECT * FROM ({sql}) AS {PAGE_ALIAS} LIMIT {limit} OFFSET {offset}")
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageWindow {
    pub current_page: u64,
    pub prev_page: Option<u64>,
    pub next_page: Option<u64>,
    pub total_pages: u64,
    pub start_page: u64,
    pub end_page: u64,
    /// Visible page numbers, `start_page..=end_page`.
    pub pages: Vec<u64>,
    pub limit: u64,
    pub offset: u64,
}

impl PageWindow {
    pub fn compute(estimated_rows: u64, page: u64, limit: u64) -> Self {
        let limit = limit.max(1);
        let current_page = page.max(1);
        let total_pages = (estimated_rows / limit).saturating_add(1);

        let start_page = current_page.saturating_sub(WINDOW_LEAD).max(1);
        let end_page = total_pages.min(start_page.saturating_add(WINDOW_SPAN));

        Self {
            current_page,
            prev_page: (current_page > 1).then(|| current_page - 1),
            next_page: (current_page < total_pages).then(|| current_page + 1),
            total_pages,
            start_page,
            end_page,
            pages: (start_page..=end_page).collect(),
            limit,
            offset: (current_page - 1).saturating_mul(limit).min(MAX_OFFSET),
        }
    }

    /// Window used for statements that are not paginated.
    pub fn single(limit: u64) -> Self {
        Self::compute(0, 1, limit)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct QueryPage {
    pub query: String,
    pub paginated: bool,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
    pub window: PageWindow,
}

pub struct Paginator<'a> {
    executor: &'a dyn QueryExecutor,
    limit: u64,
}

impl<'a> Paginator<'a> {
    pub fn new(executor: &'a dyn QueryExecutor, limit: u64) -> Self {
        Self {
            executor,
            limit: limit.max(1),
        }
    }

    /// Runs `sql` and returns the requested page. `page` defaults to 1.
    pub fn run(&self, conn: &ConnectionId, sql: &str, page: Option<u64>) -> Result<QueryPage> {
        let query = normalize(sql);
        if query.is_empty() {
            return Err(Error::BadRequest("query cannot be empty".to_string()));
        }

        if !is_paginatable(query) {
            return self.run_once(conn, query);
        }

        let estimate = self.executor.estimate_rows(conn, query)?;
        let window = PageWindow::compute(estimate.estimated_rows, page.unwrap_or(1), self.limit);

        let result = self
            .executor
            .execute(conn, &wrap(query, window.limit, window.offset))?
            .into_checked()?;

        Ok(QueryPage {
            query: query.to_string(),
            paginated: true,
            columns: result.column_names(),
            rows: result.rows,
            window,
        })
    }

    fn run_once(&self, conn: &ConnectionId, query: &str) -> Result<QueryPage> {
        let result = self.executor.execute(conn, query)?;
        let (columns, rows) = status_table(result);

        Ok(QueryPage {
            query: query.to_string(),
            paginated: false,
            columns,
            rows,
            window: PageWindow::single(self.limit),
        })
    }
}

/// Row output of a non-select statement if it produced any, otherwise a
/// one-row `status` table.
fn status_table(result: QueryResult) -> (Vec<String>, Vec<Vec<Value>>) {
    if result.succeeded && !result.columns.is_empty() {
        return (result.column_names(), result.rows);
    }

    let status = if result.succeeded {
        "success".to_string()
    } else {
        result
            .error_text
            .unwrap_or_else(|| "statement failed".to_string())
    };
    (vec!["status".to_string()], vec![vec![Value::Text(status)]])
}
