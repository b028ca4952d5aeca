//! Namespace/repo-scoped artifact storage.

mod staged;

pub use staged::StagedFile;

use std::fs::{self, File};
use std::io::{self, ErrorKind, Read};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::{Error, Result};
use crate::types::{validate_namespace_name, validate_repo_name};

/// Location of one artifact: `namespace/repo/file_name`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactPath {
    pub namespace: String,
    pub repo: String,
    pub file_name: String,
}

impl ArtifactPath {
    pub fn new(namespace: &str, repo: &str, file_name: &str) -> Result<Self> {
        validate_namespace_name(namespace)?;
        validate_repo_name(repo)?;
        validate_file_name(file_name)?;
        Ok(Self {
            namespace: namespace.to_string(),
            repo: repo.to_string(),
            file_name: file_name.to_string(),
        })
    }

    /// File name without its last extension.
    #[must_use]
    pub fn stem(&self) -> &str {
        Path::new(&self.file_name)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(&self.file_name)
    }
}

impl std::fmt::Display for ArtifactPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}/{}", self.namespace, self.repo, self.file_name)
    }
}

pub fn validate_file_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(Error::InvalidName("file name cannot be empty".to_string()));
    }

    if name.len() > 255 {
        return Err(Error::InvalidName(
            "file name cannot exceed 255 bytes".to_string(),
        ));
    }

    if name == "." || name == ".." {
        return Err(Error::InvalidName(format!("invalid file name {name:?}")));
    }

    const INVALID_CHARS: &[char] = &['/', '\\', '\0', '\n', '\r'];
    if name.chars().any(|c| INVALID_CHARS.contains(&c)) {
        return Err(Error::InvalidName(
            "file name contains invalid characters".to_string(),
        ));
    }

    Ok(())
}

#[derive(Debug, Clone, Serialize)]
pub struct FileEntry {
    pub name: String,
    pub size: u64,
    pub modified_at: Option<DateTime<Utc>>,
}

pub trait FileStore: Send + Sync {
    /// Creates the repo's directory if it does not exist yet.
    fn ensure_directory(&self, namespace: &str, repo: &str) -> Result<()>;

    /// Regular files of a repo's directory, sorted by name.
    fn list_entries(&self, namespace: &str, repo: &str) -> Result<Vec<FileEntry>>;

    /// Removes a repo's directory with everything in it.
    fn remove_directory(&self, namespace: &str, repo: &str) -> Result<()>;

    /// Writes `reader` to `path`, replacing any previous artifact atomically.
    fn write_stream(&self, path: &ArtifactPath, reader: &mut dyn Read) -> Result<u64>;

    fn read_all(&self, path: &ArtifactPath) -> Result<Vec<u8>>;

    /// Returns false when nothing was there.
    fn remove(&self, path: &ArtifactPath) -> Result<bool>;

    /// A temp file that becomes `path` on commit.
    fn stage(&self, path: &ArtifactPath) -> Result<StagedFile>;

    /// Filesystem path of an existing artifact.
    fn local_path(&self, path: &ArtifactPath) -> Result<PathBuf>;
}

/// Stores artifacts under `<base>/<namespace>/<repo>/<file_name>`.
pub struct LocalFileStore {
    base_path: PathBuf,
}

impl LocalFileStore {
    pub fn new(base_path: &Path) -> Self {
        Self {
            base_path: base_path.to_path_buf(),
        }
    }

    fn repo_dir(&self, namespace: &str, repo: &str) -> Result<PathBuf> {
        validate_namespace_name(namespace)?;
        validate_repo_name(repo)?;
        Ok(self.base_path.join(namespace).join(repo))
    }

    fn artifact_path(&self, path: &ArtifactPath) -> PathBuf {
        self.base_path
            .join(&path.namespace)
            .join(&path.repo)
            .join(&path.file_name)
    }
}

fn not_found_or_io(e: io::Error) -> Error {
    if e.kind() == ErrorKind::NotFound {
        Error::NotFound
    } else {
        Error::Io(e)
    }
}

impl FileStore for LocalFileStore {
    fn ensure_directory(&self, namespace: &str, repo: &str) -> Result<()> {
        fs::create_dir_all(self.repo_dir(namespace, repo)?)?;
        Ok(())
    }

    fn list_entries(&self, namespace: &str, repo: &str) -> Result<Vec<FileEntry>> {
        let dir = self.repo_dir(namespace, repo)?;
        let mut entries = Vec::new();

        for entry in fs::read_dir(&dir).map_err(not_found_or_io)? {
            let entry = entry?;
            let metadata = entry.metadata()?;
            if !metadata.is_file() {
                continue;
            }
            let Ok(name) = entry.file_name().into_string() else {
                continue;
            };
            // Staged temp files are not artifacts yet.
            if name.starts_with(staged::TEMP_PREFIX) {
                continue;
            }
            entries.push(FileEntry {
                name,
                size: metadata.len(),
                modified_at: metadata.modified().ok().map(DateTime::<Utc>::from),
            });
        }

        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    fn remove_directory(&self, namespace: &str, repo: &str) -> Result<()> {
        match fs::remove_dir_all(self.repo_dir(namespace, repo)?) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::Io(e)),
        }
    }

    fn write_stream(&self, path: &ArtifactPath, reader: &mut dyn Read) -> Result<u64> {
        let mut staged = self.stage(path)?;
        let written = io::copy(reader, &mut staged)?;
        staged.commit()?;
        Ok(written)
    }

    fn read_all(&self, path: &ArtifactPath) -> Result<Vec<u8>> {
        let mut file = File::open(self.artifact_path(path)).map_err(not_found_or_io)?;
        let mut content = Vec::new();
        file.read_to_end(&mut content)?;
        Ok(content)
    }

    fn remove(&self, path: &ArtifactPath) -> Result<bool> {
        match fs::remove_file(self.artifact_path(path)) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(Error::Io(e)),
        }
    }

    fn stage(&self, path: &ArtifactPath) -> Result<StagedFile> {
        self.ensure_directory(&path.namespace, &path.repo)?;
        StagedFile::create(self.artifact_path(path))
    }

    fn local_path(&self, path: &ArtifactPath) -> Result<PathBuf> {
        let local = self.artifact_path(path);
        if !local.is_file() {
            return Err(Error::NotFound);
        }
        Ok(local)
    }
}

#[cfg(test)]
mod tests {
    use std::io::{Cursor, Write};

    use super::*;
    use tempfile::TempDir;

    fn artifact(name: &str) -> ArtifactPath {
        ArtifactPath::new("alice", "sales", name).unwrap()
    }

    #[test]
    fn test_file_name_validation() {
        assert!(validate_file_name("orders.csv").is_ok());
        assert!(validate_file_name("Q1 report (final).tsv").is_ok());
        assert!(validate_file_name("").is_err());
        assert!(validate_file_name(".").is_err());
        assert!(validate_file_name("..").is_err());
        assert!(validate_file_name("../etc/passwd").is_err());
        assert!(validate_file_name("a\\b").is_err());
        assert!(validate_file_name("a\nb").is_err());
        assert!(validate_file_name(&"x".repeat(256)).is_err());
    }

    #[test]
    fn test_artifact_path_rejects_bad_repo() {
        assert!(ArtifactPath::new("alice", "../bob", "x.csv").is_err());
        assert!(ArtifactPath::new("Alice", "sales", "x.csv").is_err());
    }

    #[test]
    fn test_stem() {
        assert_eq!(artifact("orders.csv").stem(), "orders");
        assert_eq!(artifact("archive.tar.gz").stem(), "archive.tar");
        assert_eq!(artifact("noext").stem(), "noext");
    }

    #[test]
    fn test_write_read_remove() {
        let temp_dir = TempDir::new().unwrap();
        let store = LocalFileStore::new(temp_dir.path());
        let path = artifact("orders.csv");

        let written = store
            .write_stream(&path, &mut Cursor::new(b"id\n1\n".to_vec()))
            .unwrap();
        assert_eq!(written, 5);
        assert_eq!(store.read_all(&path).unwrap(), b"id\n1\n");
        assert!(store.local_path(&path).unwrap().is_file());

        assert!(store.remove(&path).unwrap());
        assert!(!store.remove(&path).unwrap());
        assert!(matches!(store.read_all(&path), Err(Error::NotFound)));
        assert!(matches!(store.local_path(&path), Err(Error::NotFound)));
    }

    #[test]
    fn test_list_entries() {
        let temp_dir = TempDir::new().unwrap();
        let store = LocalFileStore::new(temp_dir.path());

        assert!(matches!(
            store.list_entries("alice", "sales"),
            Err(Error::NotFound)
        ));

        store.ensure_directory("alice", "sales").unwrap();
        assert!(store.list_entries("alice", "sales").unwrap().is_empty());

        store
            .write_stream(&artifact("b.csv"), &mut Cursor::new(b"1".to_vec()))
            .unwrap();
        store
            .write_stream(&artifact("a.csv"), &mut Cursor::new(b"12".to_vec()))
            .unwrap();
        let _pending = store.stage(&artifact("c.csv")).unwrap();

        let entries = store.list_entries("alice", "sales").unwrap();
        let names: Vec<_> = entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["a.csv", "b.csv"]);
        assert_eq!(entries[0].size, 2);
    }

    #[test]
    fn test_staged_file_is_invisible_until_commit() {
        let temp_dir = TempDir::new().unwrap();
        let store = LocalFileStore::new(temp_dir.path());
        let path = artifact("export.csv");

        let mut staged = store.stage(&path).unwrap();
        staged.write_all(b"a,b\n").unwrap();
        assert!(matches!(store.read_all(&path), Err(Error::NotFound)));

        staged.commit().unwrap();
        assert_eq!(store.read_all(&path).unwrap(), b"a,b\n");
    }

    #[test]
    fn test_dropped_staged_file_leaves_nothing() {
        let temp_dir = TempDir::new().unwrap();
        let store = LocalFileStore::new(temp_dir.path());
        let path = artifact("export.csv");

        {
            let mut staged = store.stage(&path).unwrap();
            staged.write_all(b"partial").unwrap();
        }

        let dir = temp_dir.path().join("alice").join("sales");
        assert_eq!(fs::read_dir(dir).unwrap().count(), 0);
    }

    #[test]
    fn test_commit_replaces_existing() {
        let temp_dir = TempDir::new().unwrap();
        let store = LocalFileStore::new(temp_dir.path());
        let path = artifact("data.csv");

        store
            .write_stream(&path, &mut Cursor::new(b"old".to_vec()))
            .unwrap();
        store
            .write_stream(&path, &mut Cursor::new(b"new".to_vec()))
            .unwrap();
        assert_eq!(store.read_all(&path).unwrap(), b"new");
    }

    #[test]
    fn test_remove_directory() {
        let temp_dir = TempDir::new().unwrap();
        let store = LocalFileStore::new(temp_dir.path());
        store
            .write_stream(&artifact("a.csv"), &mut Cursor::new(b"1".to_vec()))
            .unwrap();

        store.remove_directory("alice", "sales").unwrap();
        store.remove_directory("alice", "sales").unwrap();
        assert!(!temp_dir.path().join("alice").join("sales").exists());
    }
}
