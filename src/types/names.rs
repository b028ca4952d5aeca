use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Pseudo-collaborator that denotes world access to a repo.
pub const PUBLIC: &str = "PUBLIC";

const MAX_IDENTIFIER_LEN: usize = 63;

/// Schema names the relational engine keeps for itself.
const RESERVED_NAMES: &[&str] = &["main", "temp"];

fn validate_identifier(name: &str, entity: &str, allow_upper: bool) -> Result<()> {
    if name.is_empty() {
        return Err(Error::InvalidName(format!("{entity} name cannot be empty")));
    }
    if name.len() > MAX_IDENTIFIER_LEN {
        return Err(Error::InvalidName(format!(
            "{entity} name cannot exceed {MAX_IDENTIFIER_LEN} characters"
        )));
    }
    let valid_char = |c: char| {
        c.is_ascii_lowercase()
            || c.is_ascii_digit()
            || c == '_'
            || (allow_upper && c.is_ascii_uppercase())
    };
    if !name.chars().all(valid_char) {
        return Err(Error::InvalidName(format!(
            "{entity} name can only contain lowercase letters, digits, and underscores"
        )));
    }
    if name.starts_with(|c: char| c.is_ascii_digit()) {
        return Err(Error::InvalidName(format!(
            "{entity} name cannot start with a digit"
        )));
    }
    if RESERVED_NAMES.contains(&name.to_ascii_lowercase().as_str()) {
        return Err(Error::InvalidName(format!("{entity} name '{name}' is reserved")));
    }
    Ok(())
}

pub fn validate_namespace_name(name: &str) -> Result<()> {
    validate_identifier(name, "Namespace", false)
}

pub fn validate_repo_name(name: &str) -> Result<()> {
    validate_identifier(name, "Repository", false)
}

pub fn validate_table_name(name: &str) -> Result<()> {
    validate_identifier(name, "Table", true)
}

pub fn validate_card_name(name: &str) -> Result<()> {
    validate_identifier(name, "Card", true)
}

/// Collaborators are namespace usernames, or the `PUBLIC` pseudo-collaborator.
pub fn validate_principal_name(name: &str) -> Result<()> {
    if name == PUBLIC {
        return Ok(());
    }
    validate_identifier(name, "Principal", false)
}

/// Three-part `namespace.repo.table` name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QualifiedName {
    pub namespace: String,
    pub repo: String,
    pub table: String,
}

impl QualifiedName {
    /// Builds a qualified name from validated parts.
    pub fn new(namespace: &str, repo: &str, table: &str) -> Result<Self> {
        validate_namespace_name(namespace)?;
        validate_repo_name(repo)?;
        validate_table_name(table)?;
        Ok(Self {
            namespace: namespace.to_string(),
            repo: repo.to_string(),
            table: table.to_string(),
        })
    }

    /// SQL reference relative to the namespace connection. The namespace part
    /// travels with the connection identity.
    #[must_use]
    pub fn to_sql(&self) -> String {
        format!("{}.{}", quote_identifier(&self.repo), quote_identifier(&self.table))
    }
}

impl fmt::Display for QualifiedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.namespace, self.repo, self.table)
    }
}

/// Wraps an identifier in double quotes. Callers only pass names that went
/// through validation or sanitization, which never contain a quote.
#[must_use]
pub fn quote_identifier(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

/// The object a privilege is checked against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ObjectRef {
    Namespace(String),
    Repo { namespace: String, repo: String },
    Table(QualifiedName),
}

impl ObjectRef {
    #[must_use]
    pub fn namespace(&self) -> &str {
        match self {
            ObjectRef::Namespace(ns) => ns,
            ObjectRef::Repo { namespace, .. } => namespace,
            ObjectRef::Table(name) => &name.namespace,
        }
    }

    #[must_use]
    pub fn repo(namespace: &str, repo: &str) -> Self {
        ObjectRef::Repo {
            namespace: namespace.to_string(),
            repo: repo.to_string(),
        }
    }
}

impl fmt::Display for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ObjectRef::Namespace(ns) => write!(f, "{ns}"),
            ObjectRef::Repo { namespace, repo } => write!(f, "{namespace}.{repo}"),
            ObjectRef::Table(name) => write!(f, "{name}"),
        }
    }
}
