mod schema;
mod sqlite;

pub use sqlite::SqliteStore;

use crate::error::Result;
use crate::types::*;

/// Store defines the catalog of namespaces, repos, collaborators and cards.
pub trait Store: Send + Sync {
    fn initialize(&self) -> Result<()>;

    // Namespace operations
    fn create_namespace(&self, ns: &Namespace) -> Result<()>;
    fn get_namespace(&self, name: &str) -> Result<Option<Namespace>>;
    fn list_namespaces(&self) -> Result<Vec<Namespace>>;

    // Repo operations
    fn create_repo(&self, repo: &Repo) -> Result<()>;
    fn get_repo(&self, namespace: &str, name: &str) -> Result<Option<Repo>>;
    fn list_repos(&self, namespace: &str) -> Result<Vec<Repo>>;
    fn delete_repo(&self, namespace: &str, name: &str) -> Result<bool>;

    // Collaborator operations
    fn upsert_collaborator(&self, collaborator: &Collaborator) -> Result<()>;
    fn delete_collaborator(&self, namespace: &str, repo: &str, principal: &str) -> Result<bool>;
    fn get_collaborator(
        &self,
        namespace: &str,
        repo: &str,
        principal: &str,
    ) -> Result<Option<Collaborator>>;
    fn list_collaborators(&self, namespace: &str, repo: &str) -> Result<Vec<Collaborator>>;

    // Card operations
    fn create_card(&self, card: &Card) -> Result<()>;
    fn get_card(&self, namespace: &str, repo: &str, name: &str) -> Result<Option<Card>>;
    fn list_cards(&self, namespace: &str, repo: &str) -> Result<Vec<Card>>;
    fn delete_card(&self, namespace: &str, repo: &str, name: &str) -> Result<bool>;
}

/// Answers whether a principal holds a privilege on an object.
pub trait PrivilegeStore: Send + Sync {
    fn has_privilege(&self, principal: &str, object: &ObjectRef, required: Privilege)
        -> Result<bool>;
}
