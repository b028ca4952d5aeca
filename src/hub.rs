//! Core entry points. Each one checks the caller's privilege through the
//! [`AccessGate`] before any catalog lookup, statement or file access.

use std::fs;
use std::io::Read;
use std::sync::Arc;

use chrono::Utc;

use crate::access::AccessGate;
use crate::config::{EngineConfig, ServerConfig};
use crate::dialect::DialectHints;
use crate::engine::{ConnectionId, QueryExecutor, SqliteExecutor};
use crate::error::{Error, Result};
use crate::export::{ExportReport, Exporter};
use crate::files::{ArtifactPath, FileEntry, FileStore, LocalFileStore};
use crate::import::{ImportPlan, ImportPlanner, ImportReport};
use crate::paginate::{Paginator, QueryPage, is_paginatable, normalize};
use crate::store::{PrivilegeStore, SqliteStore, Store};
use crate::types::{
    Card, Collaborator, Namespace, ObjectRef, PUBLIC, Privilege, QualifiedName, Relations, Repo,
    RepoSummary, validate_card_name, validate_namespace_name, validate_principal_name,
    validate_repo_name,
};

pub struct Hub {
    store: Arc<dyn Store>,
    gate: AccessGate,
    executor: Arc<dyn QueryExecutor>,
    files: Arc<dyn FileStore>,
    config: EngineConfig,
}

impl Hub {
    pub fn new(
        store: Arc<dyn Store>,
        privileges: Arc<dyn PrivilegeStore>,
        executor: Arc<dyn QueryExecutor>,
        files: Arc<dyn FileStore>,
        config: EngineConfig,
    ) -> Self {
        Self {
            store,
            gate: AccessGate::new(privileges),
            executor,
            files,
            config,
        }
    }

    /// Opens the SQLite catalog, engine and local file storage under the
    /// configured data directory, creating it if needed.
    pub fn open(config: &ServerConfig) -> Result<Self> {
        fs::create_dir_all(&config.data_dir)?;
        fs::create_dir_all(config.engine_dir())?;
        fs::create_dir_all(config.files_dir())?;

        let store = Arc::new(SqliteStore::new(config.catalog_path())?);
        store.initialize()?;

        let executor = SqliteExecutor::new(&config.engine_dir())
            .with_deadline(config.engine.query_timeout());

        Ok(Self::new(
            store.clone(),
            store,
            Arc::new(executor),
            Arc::new(LocalFileStore::new(&config.files_dir())),
            config.engine.clone(),
        ))
    }

    fn paginator(&self) -> Paginator<'_> {
        Paginator::new(self.executor.as_ref(), self.config.page_size)
    }

    fn require_repo(&self, namespace: &str, repo: &str) -> Result<Repo> {
        self.store.get_repo(namespace, repo)?.ok_or(Error::NotFound)
    }

    /// Connection limited to the repos of `namespace` on which `principal`
    /// holds `required`.
    fn scoped_connection(
        &self,
        principal: &str,
        namespace: &str,
        required: Privilege,
    ) -> Result<ConnectionId> {
        let visible = self
            .store
            .list_repos(namespace)?
            .into_iter()
            .filter(|r| {
                self.gate
                    .check(principal, &ObjectRef::repo(namespace, &r.name), required)
            })
            .map(|r| r.name)
            .collect();
        Ok(ConnectionId::scoped(namespace, visible))
    }

    // Namespaces

    /// Issues a new repo base. Account issuance happens outside the gate.
    pub fn create_namespace(&self, name: &str) -> Result<Namespace> {
        validate_namespace_name(name)?;
        let namespace = Namespace {
            name: name.to_string(),
            created_at: Utc::now(),
        };
        self.store.create_namespace(&namespace)?;
        tracing::info!(namespace = %name, "namespace created");
        Ok(namespace)
    }

    pub fn list_namespaces(&self) -> Result<Vec<Namespace>> {
        self.store.list_namespaces()
    }

    /// Repos of `namespace` that `principal` can see: all of them for the
    /// owner, otherwise those shared with the principal or with `PUBLIC`.
    pub fn list_repos(&self, principal: &str, namespace: &str) -> Result<Vec<RepoSummary>> {
        self.gate.require(
            principal,
            &ObjectRef::Namespace(namespace.to_string()),
            Privilege::CONNECT,
        )?;
        let ns = self
            .store
            .get_namespace(namespace)?
            .ok_or(Error::NotFound)?;

        let mut summaries = Vec::new();
        for repo in self.store.list_repos(namespace)? {
            let collaborators = self.store.list_collaborators(namespace, &repo.name)?;
            let public = collaborators.iter().any(|c| c.principal == PUBLIC);
            let shared = collaborators.iter().any(|c| c.principal == principal);
            if principal != ns.owner() && !shared && !public {
                continue;
            }
            summaries.push(RepoSummary {
                name: repo.name,
                owner: ns.owner().to_string(),
                public,
                collaborators: collaborators
                    .into_iter()
                    .map(|c| c.principal)
                    .filter(|p| !p.is_empty() && p != ns.owner() && p != PUBLIC)
                    .collect(),
            });
        }
        Ok(summaries)
    }

    // Repos

    pub fn create_repo(&self, principal: &str, namespace: &str, name: &str) -> Result<Repo> {
        self.gate.require(
            principal,
            &ObjectRef::repo(namespace, name),
            Privilege::CREATE,
        )?;
        validate_repo_name(name)?;
        self.store
            .get_namespace(namespace)?
            .ok_or(Error::NotFound)?;

        let repo = Repo {
            namespace: namespace.to_string(),
            name: name.to_string(),
            created_at: Utc::now(),
        };
        self.store.create_repo(&repo)?;

        let conn = ConnectionId::namespace(namespace);
        if let Err(e) = self.executor.create_schema(&conn, name) {
            self.store.delete_repo(namespace, name)?;
            return Err(e);
        }
        self.files.ensure_directory(namespace, name)?;

        tracing::info!(namespace = %namespace, repo = %name, "repo created");
        Ok(repo)
    }

    /// Removes the repo's tables, cards, collaborators and files.
    pub fn delete_repo(&self, principal: &str, namespace: &str, name: &str) -> Result<()> {
        self.gate.require(
            principal,
            &ObjectRef::repo(namespace, name),
            Privilege::CREATE,
        )?;
        self.require_repo(namespace, name)?;

        self.executor
            .drop_schema(&ConnectionId::namespace(namespace), name)?;
        self.store.delete_repo(namespace, name)?;
        self.files.remove_directory(namespace, name)?;

        tracing::info!(namespace = %namespace, repo = %name, "repo deleted");
        Ok(())
    }

    pub fn list_relations(
        &self,
        principal: &str,
        namespace: &str,
        repo: &str,
    ) -> Result<Relations> {
        self.gate
            .require(principal, &ObjectRef::repo(namespace, repo), Privilege::USAGE)?;
        self.require_repo(namespace, repo)?;
        self.executor
            .list_relations(&ConnectionId::namespace(namespace), repo)
    }

    // Tables

    pub fn browse_table(
        &self,
        principal: &str,
        table: &QualifiedName,
        page: Option<u64>,
    ) -> Result<QueryPage> {
        self.gate
            .require(principal, &ObjectRef::Table(table.clone()), Privilege::SELECT)?;
        self.require_repo(&table.namespace, &table.repo)?;

        let conn = ConnectionId::scoped(&table.namespace, vec![table.repo.clone()]);
        self.paginator()
            .run(&conn, &format!("SELECT * FROM {}", table.to_sql()), page)
    }

    pub fn drop_table(&self, principal: &str, table: &QualifiedName) -> Result<()> {
        self.gate
            .require(principal, &ObjectRef::Table(table.clone()), Privilege::DELETE)?;
        self.require_repo(&table.namespace, &table.repo)?;

        let conn = ConnectionId::namespace(&table.namespace);
        self.executor
            .execute(&conn, &format!("DROP TABLE {}", table.to_sql()))?
            .into_checked()?;
        tracing::info!(table = %table, "table dropped");
        Ok(())
    }

    pub fn export_table(&self, principal: &str, table: &QualifiedName) -> Result<ExportReport> {
        self.gate.require(
            principal,
            &ObjectRef::repo(&table.namespace, &table.repo),
            Privilege::CREATE,
        )?;
        self.require_repo(&table.namespace, &table.repo)?;
        Exporter::new(self.executor.as_ref(), self.files.as_ref()).export_table(table)
    }

    // Queries

    /// Runs caller SQL from within `repo`. Selects need `USAGE`, anything
    /// else `CREATE`. The statement only sees repos of the namespace on which
    /// the caller holds the same privilege.
    pub fn run_query(
        &self,
        principal: &str,
        namespace: &str,
        repo: &str,
        sql: &str,
        page: Option<u64>,
    ) -> Result<QueryPage> {
        let required = statement_privilege(sql);
        self.gate
            .require(principal, &ObjectRef::repo(namespace, repo), required)?;
        self.require_repo(namespace, repo)?;

        let conn = self.scoped_connection(principal, namespace, required)?;
        self.paginator().run(&conn, sql, page)
    }

    // Collaborators

    /// Collaborators of a repo. The owner is implicit and never listed.
    pub fn list_collaborators(
        &self,
        principal: &str,
        namespace: &str,
        repo: &str,
    ) -> Result<Vec<Collaborator>> {
        self.gate
            .require(principal, &ObjectRef::repo(namespace, repo), Privilege::CREATE)?;
        self.require_repo(namespace, repo)?;

        Ok(self
            .store
            .list_collaborators(namespace, repo)?
            .into_iter()
            .filter(|c| c.principal != namespace)
            .collect())
    }

    /// Grants `privileges` on a repo, replacing any earlier grant. `None`
    /// grants SELECT, INSERT and UPDATE.
    pub fn add_collaborator(
        &self,
        principal: &str,
        namespace: &str,
        repo: &str,
        grantee: &str,
        privileges: Option<Privilege>,
    ) -> Result<Collaborator> {
        self.gate
            .require(principal, &ObjectRef::repo(namespace, repo), Privilege::CREATE)?;
        if grantee == namespace {
            return Err(Error::OwnerGrant);
        }
        validate_principal_name(grantee)?;
        self.require_repo(namespace, repo)?;

        let privileges = privileges.unwrap_or_else(Privilege::default_collaborator_grant);
        if privileges.is_empty() {
            return Err(Error::InvalidPrivilege(
                "at least one privilege is required".to_string(),
            ));
        }

        let now = Utc::now();
        let created_at = self
            .store
            .get_collaborator(namespace, repo, grantee)?
            .map_or(now, |existing| existing.created_at);
        let collaborator = Collaborator {
            namespace: namespace.to_string(),
            repo: repo.to_string(),
            principal: grantee.to_string(),
            privileges,
            created_at,
            updated_at: now,
        };
        self.store.upsert_collaborator(&collaborator)?;

        tracing::info!(
            namespace = %namespace,
            repo = %repo,
            grantee = %grantee,
            privileges = %privileges,
            "collaborator granted"
        );
        Ok(collaborator)
    }

    pub fn remove_collaborator(
        &self,
        principal: &str,
        namespace: &str,
        repo: &str,
        grantee: &str,
    ) -> Result<()> {
        self.gate
            .require(principal, &ObjectRef::repo(namespace, repo), Privilege::CREATE)?;
        if !self.store.delete_collaborator(namespace, repo, grantee)? {
            return Err(Error::NotFound);
        }
        tracing::info!(namespace = %namespace, repo = %repo, grantee = %grantee, "collaborator removed");
        Ok(())
    }

    // Cards

    pub fn list_cards(&self, principal: &str, namespace: &str, repo: &str) -> Result<Vec<Card>> {
        self.gate
            .require(principal, &ObjectRef::repo(namespace, repo), Privilege::USAGE)?;
        self.require_repo(namespace, repo)?;
        self.store.list_cards(namespace, repo)
    }

    pub fn create_card(
        &self,
        principal: &str,
        namespace: &str,
        repo: &str,
        name: &str,
        query: &str,
    ) -> Result<Card> {
        self.gate
            .require(principal, &ObjectRef::repo(namespace, repo), Privilege::CREATE)?;
        validate_card_name(name)?;
        let query = normalize(query);
        if query.is_empty() {
            return Err(Error::BadRequest("query cannot be empty".to_string()));
        }
        self.require_repo(namespace, repo)?;

        let card = Card {
            namespace: namespace.to_string(),
            repo: repo.to_string(),
            name: name.to_string(),
            query: query.to_string(),
            created_at: Utc::now(),
        };
        self.store.create_card(&card)?;
        Ok(card)
    }

    /// Re-runs a card's stored text. Non-select text additionally needs
    /// `CREATE`, as it would through `run_query`.
    pub fn view_card(
        &self,
        principal: &str,
        namespace: &str,
        repo: &str,
        name: &str,
        page: Option<u64>,
    ) -> Result<QueryPage> {
        let object = ObjectRef::repo(namespace, repo);
        self.gate.require(principal, &object, Privilege::USAGE)?;
        let card = self
            .store
            .get_card(namespace, repo, name)?
            .ok_or(Error::NotFound)?;

        let required = statement_privilege(&card.query);
        if required != Privilege::USAGE {
            self.gate.require(principal, &object, required)?;
        }

        let conn = self.scoped_connection(principal, namespace, required)?;
        self.paginator().run(&conn, &card.query, page)
    }

    pub fn delete_card(
        &self,
        principal: &str,
        namespace: &str,
        repo: &str,
        name: &str,
    ) -> Result<()> {
        self.gate
            .require(principal, &ObjectRef::repo(namespace, repo), Privilege::CREATE)?;
        if !self.store.delete_card(namespace, repo, name)? {
            return Err(Error::NotFound);
        }
        Ok(())
    }

    pub fn export_card(
        &self,
        principal: &str,
        namespace: &str,
        repo: &str,
        name: &str,
    ) -> Result<ExportReport> {
        self.gate
            .require(principal, &ObjectRef::repo(namespace, repo), Privilege::CREATE)?;
        let card = self
            .store
            .get_card(namespace, repo, name)?
            .ok_or(Error::NotFound)?;

        let conn = self.scoped_connection(principal, namespace, Privilege::USAGE)?;
        Exporter::new(self.executor.as_ref(), self.files.as_ref()).export_query(
            &conn,
            namespace,
            repo,
            &card.name,
            &card.query,
        )
    }

    // Files

    pub fn list_files(
        &self,
        principal: &str,
        namespace: &str,
        repo: &str,
    ) -> Result<Vec<FileEntry>> {
        self.gate
            .require(principal, &ObjectRef::repo(namespace, repo), Privilege::USAGE)?;
        self.require_repo(namespace, repo)?;
        self.files.ensure_directory(namespace, repo)?;
        self.files.list_entries(namespace, repo)
    }

    pub fn upload_file(
        &self,
        principal: &str,
        path: &ArtifactPath,
        content: &mut dyn Read,
    ) -> Result<u64> {
        self.gate.require(
            principal,
            &ObjectRef::repo(&path.namespace, &path.repo),
            Privilege::CREATE,
        )?;
        self.require_repo(&path.namespace, &path.repo)?;
        let written = self.files.write_stream(path, content)?;
        tracing::info!(path = %path, bytes = written, "file uploaded");
        Ok(written)
    }

    pub fn download_file(&self, principal: &str, path: &ArtifactPath) -> Result<Vec<u8>> {
        self.gate.require(
            principal,
            &ObjectRef::repo(&path.namespace, &path.repo),
            Privilege::USAGE,
        )?;
        self.files.read_all(path)
    }

    pub fn delete_file(&self, principal: &str, path: &ArtifactPath) -> Result<()> {
        self.gate.require(
            principal,
            &ObjectRef::repo(&path.namespace, &path.repo),
            Privilege::CREATE,
        )?;
        if !self.files.remove(path)? {
            return Err(Error::NotFound);
        }
        Ok(())
    }

    /// Creates a table named after the file and loads its rows.
    pub fn import_file(
        &self,
        principal: &str,
        path: &ArtifactPath,
        hints: &DialectHints,
    ) -> Result<ImportReport> {
        self.gate.require(
            principal,
            &ObjectRef::repo(&path.namespace, &path.repo),
            Privilege::CREATE,
        )?;
        self.require_repo(&path.namespace, &path.repo)?;

        let local = self.files.local_path(path)?;
        let plan = ImportPlan::infer(path, &local, hints)?;
        ImportPlanner::new(self.executor.as_ref()).run(&plan, &local)
    }
}

/// `USAGE` for selects, `CREATE` for everything else.
#[must_use]
pub fn statement_privilege(sql: &str) -> Privilege {
    if is_paginatable(normalize(sql)) {
        Privilege::USAGE
    } else {
        Privilege::CREATE
    }
}
