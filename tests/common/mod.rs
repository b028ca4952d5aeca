#![allow(dead_code)]

use std::io::Cursor;

use repobase::config::{EngineConfig, ServerConfig};
use repobase::engine::Value;
use repobase::files::ArtifactPath;
use repobase::hub::Hub;
use repobase::paginate::QueryPage;
use tempfile::TempDir;

/// A hub over a fresh data directory with namespaces `alice` and `bob`, and
/// repos `alice.sales` and `alice.hr`.
pub struct TestHub {
    pub temp_dir: TempDir,
    pub hub: Hub,
}

impl TestHub {
    pub fn new() -> Self {
        Self::with_engine(EngineConfig::default())
    }

    pub fn with_engine(engine: EngineConfig) -> Self {
        let temp_dir = TempDir::new().expect("create temp dir");
        let config = ServerConfig {
            data_dir: temp_dir.path().to_path_buf(),
            engine,
            ..ServerConfig::default()
        };
        let hub = Hub::open(&config).expect("open hub");

        hub.create_namespace("alice").expect("create alice");
        hub.create_namespace("bob").expect("create bob");
        hub.create_repo("alice", "alice", "sales").expect("create sales");
        hub.create_repo("alice", "alice", "hr").expect("create hr");

        Self { temp_dir, hub }
    }

    /// Runs `sql` as alice from within `repo` and fails the test on error.
    pub fn owner_sql(&self, repo: &str, sql: &str) -> QueryPage {
        self.hub
            .run_query("alice", "alice", repo, sql, None)
            .unwrap_or_else(|e| panic!("{sql}: {e}"))
    }

    pub fn upload(&self, repo: &str, name: &str, content: &[u8]) -> ArtifactPath {
        let path = ArtifactPath::new("alice", repo, name).expect("artifact path");
        self.hub
            .upload_file("alice", &path, &mut Cursor::new(content.to_vec()))
            .expect("upload");
        path
    }
}

pub fn text(s: &str) -> Value {
    Value::Text(s.to_string())
}

pub fn status(page: &QueryPage) -> String {
    assert_eq!(page.columns, vec!["status"]);
    page.rows[0][0].to_string()
}
