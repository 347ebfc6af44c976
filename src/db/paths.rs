// src/db/paths.rs
//! Centralized path derivation for engine directories

use std::path::{Path, PathBuf};

/// Get the directory containing the database
pub fn db_dir(db_path: &str) -> PathBuf {
    Path::new(db_path)
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("/var/lib/custodia"))
        .to_path_buf()
}

/// Get the directory where package trees are built
pub fn packages_dir(db_path: &str) -> PathBuf {
    db_dir(db_path).join("packages")
}

/// Get the directory where exported archives are written
pub fn exports_dir(db_path: &str) -> PathBuf {
    db_dir(db_path).join("exports")
}

/// Get the temporary directory for build scratch space
pub fn temp_dir(db_path: &str) -> PathBuf {
    db_dir(db_path).join("tmp")
}
