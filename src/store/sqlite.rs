use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Row, params};

use super::schema::SCHEMA;
use super::{PrivilegeStore, Store};
use crate::error::{Error, Result};
use crate::types::*;

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let conn = Connection::open(db_path)?;
        Self::with_connection(conn)
    }

    /// Opens a private in-memory catalog.
    pub fn in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.pragma_update(None, "journal_mode", "WAL")?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn grant_bits(&self, namespace: &str, repo: &str, principal: &str) -> Result<Privilege> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT privilege_bits FROM collaborators
             WHERE namespace = ?1 AND repo = ?2 AND principal IN (?3, ?4)",
        )?;
        let rows = stmt.query_map(params![namespace, repo, principal, PUBLIC], |row| {
            row.get::<_, i64>(0)
        })?;

        let mut bits = Privilege::default();
        for row in rows {
            bits = bits.union(Privilege::from(row?));
        }
        Ok(bits.expand_implied())
    }

    fn has_any_grant_in_namespace(&self, namespace: &str, principal: &str) -> Result<bool> {
        let conn = self.conn();
        let found = conn
            .query_row(
                "SELECT 1 FROM collaborators
                 WHERE namespace = ?1 AND principal IN (?2, ?3) AND privilege_bits != 0
                 LIMIT 1",
                params![namespace, principal, PUBLIC],
                |_| Ok(()),
            )
            .optional()?;
        Ok(found.is_some())
    }
}

fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|_| {
            // Handle SQLite's default datetime format: "YYYY-MM-DD HH:MM:SS"
            chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc())
        })
        .unwrap_or_else(|e| {
            tracing::error!("Invalid datetime in catalog: '{}' - {}", s, e);
            Utc::now()
        })
}

fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339()
}

fn map_constraint(err: rusqlite::Error) -> Error {
    match err {
        rusqlite::Error::SqliteFailure(e, _) if e.code == rusqlite::ErrorCode::ConstraintViolation => {
            Error::AlreadyExists
        }
        e => Error::from(e),
    }
}

fn repo_from_row(row: &Row<'_>) -> rusqlite::Result<Repo> {
    Ok(Repo {
        namespace: row.get(0)?,
        name: row.get(1)?,
        created_at: parse_datetime(&row.get::<_, String>(2)?),
    })
}

fn collaborator_from_row(row: &Row<'_>) -> rusqlite::Result<Collaborator> {
    Ok(Collaborator {
        namespace: row.get(0)?,
        repo: row.get(1)?,
        principal: row.get(2)?,
        privileges: Privilege::from(row.get::<_, i64>(3)?),
        created_at: parse_datetime(&row.get::<_, String>(4)?),
        updated_at: parse_datetime(&row.get::<_, String>(5)?),
    })
}

fn card_from_row(row: &Row<'_>) -> rusqlite::Result<Card> {
    Ok(Card {
        namespace: row.get(0)?,
        repo: row.get(1)?,
        name: row.get(2)?,
        query: row.get(3)?,
        created_at: parse_datetime(&row.get::<_, String>(4)?),
    })
}

impl Store for SqliteStore {
    fn initialize(&self) -> Result<()> {
        self.conn().execute_batch(SCHEMA)?;
        Ok(())
    }

    // Namespace operations

    fn create_namespace(&self, ns: &Namespace) -> Result<()> {
        self.conn()
            .execute(
                "INSERT INTO namespaces (name, created_at) VALUES (?1, ?2)",
                params![ns.name, format_datetime(&ns.created_at)],
            )
            .map_err(map_constraint)?;
        Ok(())
    }

    fn get_namespace(&self, name: &str) -> Result<Option<Namespace>> {
        let conn = self.conn();
        conn.query_row(
            "SELECT name, created_at FROM namespaces WHERE name = ?1",
            params![name],
            |row| {
                Ok(Namespace {
                    name: row.get(0)?,
                    created_at: parse_datetime(&row.get::<_, String>(1)?),
                })
            },
        )
        .optional()
        .map_err(Error::from)
    }

    fn list_namespaces(&self) -> Result<Vec<Namespace>> {
        let conn = self.conn();
        let mut stmt = conn.prepare("SELECT name, created_at FROM namespaces ORDER BY name")?;

        let rows = stmt.query_map([], |row| {
            Ok(Namespace {
                name: row.get(0)?,
                created_at: parse_datetime(&row.get::<_, String>(1)?),
            })
        })?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    // Repo operations

    fn create_repo(&self, repo: &Repo) -> Result<()> {
        self.conn()
            .execute(
                "INSERT INTO repos (namespace, name, created_at) VALUES (?1, ?2, ?3)",
                params![repo.namespace, repo.name, format_datetime(&repo.created_at)],
            )
            .map_err(map_constraint)?;
        Ok(())
    }

    fn get_repo(&self, namespace: &str, name: &str) -> Result<Option<Repo>> {
        let conn = self.conn();
        conn.query_row(
            "SELECT namespace, name, created_at FROM repos WHERE namespace = ?1 AND name = ?2",
            params![namespace, name],
            repo_from_row,
        )
        .optional()
        .map_err(Error::from)
    }

    fn list_repos(&self, namespace: &str) -> Result<Vec<Repo>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT namespace, name, created_at FROM repos WHERE namespace = ?1 ORDER BY name",
        )?;

        let rows = stmt.query_map(params![namespace], repo_from_row)?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn delete_repo(&self, namespace: &str, name: &str) -> Result<bool> {
        let rows = self.conn().execute(
            "DELETE FROM repos WHERE namespace = ?1 AND name = ?2",
            params![namespace, name],
        )?;
        Ok(rows > 0)
    }

    // Collaborator operations

    fn upsert_collaborator(&self, collaborator: &Collaborator) -> Result<()> {
        self.conn().execute(
            "INSERT INTO collaborators (namespace, repo, principal, privilege_bits, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(namespace, repo, principal) DO UPDATE SET
                privilege_bits = excluded.privilege_bits,
                updated_at = excluded.updated_at",
            params![
                collaborator.namespace,
                collaborator.repo,
                collaborator.principal,
                i64::from(collaborator.privileges),
                format_datetime(&collaborator.created_at),
                format_datetime(&collaborator.updated_at),
            ],
        )?;
        Ok(())
    }

    fn delete_collaborator(&self, namespace: &str, repo: &str, principal: &str) -> Result<bool> {
        let rows = self.conn().execute(
            "DELETE FROM collaborators WHERE namespace = ?1 AND repo = ?2 AND principal = ?3",
            params![namespace, repo, principal],
        )?;
        Ok(rows > 0)
    }

    fn get_collaborator(
        &self,
        namespace: &str,
        repo: &str,
        principal: &str,
    ) -> Result<Option<Collaborator>> {
        let conn = self.conn();
        conn.query_row(
            "SELECT namespace, repo, principal, privilege_bits, created_at, updated_at
             FROM collaborators WHERE namespace = ?1 AND repo = ?2 AND principal = ?3",
            params![namespace, repo, principal],
            collaborator_from_row,
        )
        .optional()
        .map_err(Error::from)
    }

    fn list_collaborators(&self, namespace: &str, repo: &str) -> Result<Vec<Collaborator>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT namespace, repo, principal, privilege_bits, created_at, updated_at
             FROM collaborators WHERE namespace = ?1 AND repo = ?2 ORDER BY principal",
        )?;

        let rows = stmt.query_map(params![namespace, repo], collaborator_from_row)?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    // Card operations

    fn create_card(&self, card: &Card) -> Result<()> {
        self.conn()
            .execute(
                "INSERT INTO cards (namespace, repo, name, query, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    card.namespace,
                    card.repo,
                    card.name,
                    card.query,
                    format_datetime(&card.created_at),
                ],
            )
            .map_err(map_constraint)?;
        Ok(())
    }

    fn get_card(&self, namespace: &str, repo: &str, name: &str) -> Result<Option<Card>> {
        let conn = self.conn();
        conn.query_row(
            "SELECT namespace, repo, name, query, created_at
             FROM cards WHERE namespace = ?1 AND repo = ?2 AND name = ?3",
            params![namespace, repo, name],
            card_from_row,
        )
        .optional()
        .map_err(Error::from)
    }

    fn list_cards(&self, namespace: &str, repo: &str) -> Result<Vec<Card>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT namespace, repo, name, query, created_at
             FROM cards WHERE namespace = ?1 AND repo = ?2 ORDER BY name",
        )?;

        let rows = stmt.query_map(params![namespace, repo], card_from_row)?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn delete_card(&self, namespace: &str, repo: &str, name: &str) -> Result<bool> {
        let rows = self.conn().execute(
            "DELETE FROM cards WHERE namespace = ?1 AND repo = ?2 AND name = ?3",
            params![namespace, repo, name],
        )?;
        Ok(rows > 0)
    }
}

impl PrivilegeStore for SqliteStore {
    /// The namespace owner holds every privilege, including on objects that do
    /// not exist yet. Everyone else is resolved through repo collaborators.
    fn has_privilege(
        &self,
        principal: &str,
        object: &ObjectRef,
        required: Privilege,
    ) -> Result<bool> {
        if principal == object.namespace() {
            return Ok(true);
        }

        match object {
            ObjectRef::Namespace(ns) => {
                if required != Privilege::CONNECT {
                    return Ok(false);
                }
                self.has_any_grant_in_namespace(ns, principal)
            }
            ObjectRef::Repo { namespace, repo } => {
                Ok(self.grant_bits(namespace, repo, principal)?.has(required))
            }
            ObjectRef::Table(name) => Ok(self
                .grant_bits(&name.namespace, &name.repo, principal)?
                .has(required)),
        }
    }
}
