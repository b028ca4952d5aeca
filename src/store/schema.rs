pub const SCHEMA: &str = r#"
-- Namespaces (repo bases); the name is the owning principal's username
CREATE TABLE IF NOT EXISTS namespaces (
    name TEXT PRIMARY KEY,
    created_at TEXT DEFAULT (datetime('now'))
);

-- Repositories
CREATE TABLE IF NOT EXISTS repos (
    namespace TEXT NOT NULL REFERENCES namespaces(name) ON DELETE CASCADE,
    name TEXT NOT NULL,
    created_at TEXT DEFAULT (datetime('now')),
    PRIMARY KEY (namespace, name)
);

-- Collaborators: privileges a principal (or PUBLIC) holds on a repo
CREATE TABLE IF NOT EXISTS collaborators (
    namespace TEXT NOT NULL,
    repo TEXT NOT NULL,
    principal TEXT NOT NULL,
    privilege_bits INTEGER NOT NULL DEFAULT 0,
    created_at TEXT DEFAULT (datetime('now')),
    updated_at TEXT DEFAULT (datetime('now')),
    PRIMARY KEY (namespace, repo, principal),
    FOREIGN KEY (namespace, repo) REFERENCES repos(namespace, name) ON DELETE CASCADE
);

-- Cards: saved queries scoped to a repo
CREATE TABLE IF NOT EXISTS cards (
    namespace TEXT NOT NULL,
    repo TEXT NOT NULL,
    name TEXT NOT NULL,
    query TEXT NOT NULL,
    created_at TEXT DEFAULT (datetime('now')),
    PRIMARY KEY (namespace, repo, name),
    FOREIGN KEY (namespace, repo) REFERENCES repos(namespace, name) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_collaborators_principal ON collaborators(principal);
"#;
