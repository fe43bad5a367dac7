//! Canonical file paths for pipeline inputs and outputs.
//!
//! Defaults are relative to the project root's `data/` directory.

use std::path::{Path, PathBuf};

/// Returns the workspace root directory.
///
/// Resolved at compile time from `CARGO_MANIFEST_DIR`, falling back to the
/// current directory if the manifest directory has no such ancestor.
#[must_use]
pub fn project_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .ancestors()
        .nth(2)
        .map_or_else(|| PathBuf::from("."), Path::to_path_buf)
}

/// Returns the `data/` directory path.
#[must_use]
pub fn data_dir() -> PathBuf {
    project_root().join("data")
}

/// Returns the `data/output/` directory for generated CSV and JSON files.
#[must_use]
pub fn output_dir() -> PathBuf {
    data_dir().join("output")
}

/// Returns the default path of the roads `DuckDB` file.
#[must_use]
pub fn roads_db_path() -> PathBuf {
    data_dir().join("roads.duckdb")
}

/// Ensures a directory exists, creating it if necessary.
///
/// # Errors
///
/// Returns an I/O error if the directory cannot be created.
pub fn ensure_dir(path: &Path) -> std::io::Result<()> {
    if !path.exists() {
        std::fs::create_dir_all(path)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_is_rooted_in_data_dir() {
        assert!(output_dir().starts_with(data_dir()));
        assert!(roads_db_path().starts_with(data_dir()));
        assert_eq!(
            roads_db_path().extension().and_then(|e| e.to_str()),
            Some("duckdb")
        );
    }
}
