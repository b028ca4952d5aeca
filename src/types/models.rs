use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Privilege;

/// A repo base. Its name is the username of the principal that owns it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Namespace {
    pub name: String,
    pub created_at: DateTime<Utc>,
}

impl Namespace {
    #[must_use]
    pub fn owner(&self) -> &str {
        &self.name
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Repo {
    pub namespace: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Collaborator {
    pub namespace: String,
    pub repo: String,
    pub principal: String,
    pub privileges: Privilege,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Card {
    pub namespace: String,
    pub repo: String,
    pub name: String,
    pub query: String,
    pub created_at: DateTime<Utc>,
}

/// A repo as shown to a principal browsing a namespace.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepoSummary {
    pub name: String,
    pub owner: String,
    pub public: bool,
    pub collaborators: Vec<String>,
}

/// Base tables and views of a repo.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Relations {
    pub tables: Vec<String>,
    pub views: Vec<String>,
}
