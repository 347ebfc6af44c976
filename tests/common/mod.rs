// tests/common/mod.rs

//! Shared test fixture for integration tests.

#![allow(dead_code)]

use custodia::config::EngineConfig;
use custodia::db;
use custodia::db::models::DigitalObject;
use custodia::identify::mock::MockIdentifier;
use custodia::scan::mock::MockScanner;
use custodia::store::ObjectStore;
use custodia::workflow::WorkflowContext;
use rusqlite::Connection;
use std::path::PathBuf;
use tempfile::TempDir;

/// A self-contained engine: temp database, object store, and mock
/// external tools. Keep the fixture alive for the test's duration.
pub struct TestEngine {
    pub dir: TempDir,
    pub db_path: String,
    pub conn: Connection,
    pub config: EngineConfig,
    pub store: ObjectStore,
    pub identifier: MockIdentifier,
    pub scanner: MockScanner,
}

impl TestEngine {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir
            .path()
            .join("engine.db")
            .to_str()
            .unwrap()
            .to_string();

        db::init(&db_path).unwrap();
        let conn = db::open(&db_path).unwrap();

        let store_root = dir.path().join("uploads");
        std::fs::create_dir_all(&store_root).unwrap();

        let mut config = EngineConfig::default();
        config.storage_root = store_root.clone();
        config.agent = "custodia-test".to_string();

        Self {
            dir,
            db_path,
            conn,
            config,
            store: ObjectStore::new(store_root),
            identifier: MockIdentifier::single("fmt/43", "JPEG File Interchange Format", "image/jpeg"),
            scanner: MockScanner::clean(),
        }
    }

    /// Write a file under the store root and register a catalog row
    pub fn seed_object(&self, name: &str, content: &[u8]) -> i64 {
        std::fs::write(self.store.root().join(name), content).unwrap();
        let mut object =
            DigitalObject::new(name.to_string(), String::new(), content.len() as i64);
        object.insert(&self.conn).unwrap()
    }

    /// Overwrite a seeded object's bytes in place
    pub fn corrupt_object(&self, name: &str, content: &[u8]) {
        std::fs::write(self.store.root().join(name), content).unwrap();
    }

    pub fn packages_dir(&self) -> PathBuf {
        custodia::db::paths::packages_dir(&self.db_path)
    }

    pub fn exports_dir(&self) -> PathBuf {
        custodia::db::paths::exports_dir(&self.db_path)
    }

    /// Workflow context wired to the fixture's mock tools
    pub fn ctx(&self) -> WorkflowContext<'_> {
        WorkflowContext {
            conn: &self.conn,
            store: &self.store,
            config: &self.config,
            identifier: &self.identifier,
            scanner: &self.scanner,
            packages_dir: self.packages_dir(),
        }
    }
}
