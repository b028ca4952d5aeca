//! # Repobase
//!
//! Access-controlled, paginated query and import engine for multi-tenant data
//! repositories, usable both as a standalone server and as a library.
//!
//! Every namespace (a "repo base", named after its owner) holds repos of
//! tables, uploaded files and saved queries ("cards"). The [`hub::Hub`]
//! checks the caller's privilege through [`access::AccessGate`] before
//! anything else happens, then hands the work to the [`paginate`],
//! [`import`] or [`export`] modules, which drive an
//! [`engine::QueryExecutor`].
//!
//! ## Library Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use repobase::config::ServerConfig;
//! use repobase::hub::Hub;
//! use repobase::server::{AppState, create_router};
//!
//! let config = ServerConfig::default();
//! let hub = Hub::open(&config).unwrap();
//! hub.create_namespace("alice").unwrap();
//! hub.create_repo("alice", "alice", "sales").unwrap();
//!
//! let page = hub.run_query("alice", "alice", "sales", "select 1", None).unwrap();
//! let router = create_router(Arc::new(AppState::new(hub)));
//! // Serve with axum...
//! ```
//!
//! ## Feature Flags
//!
//! - `cli` (default): Builds the `repobase` binary. Disable with `default-features = false`.

pub mod access;
pub mod config;
pub mod dialect;
pub mod engine;
pub mod error;
pub mod export;
pub mod files;
pub mod hub;
pub mod import;
pub mod paginate;
pub mod server;
pub mod store;
pub mod types;
