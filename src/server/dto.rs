use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::Collaborator;

#[derive(Debug, Deserialize)]
pub struct CreateRepoRequest {
    pub name: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct PageParams {
    #[serde(default)]
    pub page: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct QueryRequest {
    pub q: String,
    #[serde(default)]
    pub page: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct CreateCardRequest {
    pub name: String,
    pub query: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct GrantRequest {
    /// Omitted means the default collaborator grant.
    #[serde(default)]
    pub privileges: Option<Vec<String>>,
}

#[derive(Debug, Serialize)]
pub struct CollaboratorResponse {
    pub principal: String,
    pub privileges: Vec<&'static str>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Collaborator> for CollaboratorResponse {
    fn from(c: Collaborator) -> Self {
        Self {
            principal: c.principal,
            privileges: c.privileges.to_strings(),
            created_at: c.created_at,
            updated_at: c.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub path: String,
    pub bytes_written: u64,
}
