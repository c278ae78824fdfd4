//! Path utilities for locating recorded provider payloads.

use std::path::PathBuf;

/// Returns the workspace root directory.
///
/// This is determined by walking up from the test-utils manifest directory.
pub fn workspace_root() -> PathBuf {
    let manifest_dir = env!("CARGO_MANIFEST_DIR");
    PathBuf::from(manifest_dir)
        .parent() // crates/
        .and_then(|p| p.parent()) // workspace root
        .map(|p| p.to_path_buf())
        .unwrap_or_else(|| PathBuf::from(manifest_dir))
}

/// Returns the path to the shared testdata directory (`crates/test-utils/testdata/`).
pub fn testdata_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("testdata")
}

/// Read a recorded payload from the shared testdata directory.
///
/// Panics with the missing path, which is what a test wants.
pub fn read_testdata(name: &str) -> String {
    let path = testdata_dir().join(name);
    std::fs::read_to_string(&path)
        .unwrap_or_else(|e| panic!("failed to read {}: {}", path.display(), e))
}

/// Read and parse a recorded JSON payload.
pub fn read_testdata_json(name: &str) -> serde_json::Value {
    let text = read_testdata(name);
    serde_json::from_str(&text).unwrap_or_else(|e| panic!("invalid JSON in {}: {}", name, e))
}

/// Fresh temporary directory for output files, removed on drop.
pub fn temp_output_dir() -> tempfile::TempDir {
    tempfile::tempdir().expect("failed to create temp dir")
}
