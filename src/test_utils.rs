//! Test utilities for creating temporary source trees.
//!
//! This module is only compiled for tests and benchmarks.

use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

use crate::range::RangeMapSet;

/// A temporary directory holding sources, tables and range maps.
///
/// The directory is removed when dropped.
pub struct TestTree {
    dir: TempDir,
}

impl TestTree {
    pub fn new() -> Self {
        let dir = TempDir::new().expect("Failed to create temp dir");
        Self { dir }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Absolute path of a file in the tree, existing or not.
    pub fn join(&self, path: &str) -> PathBuf {
        self.dir.path().join(path)
    }

    /// Write a file, creating parent directories as needed.
    pub fn add_file(&self, path: &str, content: &str) -> PathBuf {
        self.add_bytes(path, content.as_bytes())
    }

    pub fn add_bytes(&self, path: &str, content: &[u8]) -> PathBuf {
        let full_path = self.join(path);
        if let Some(parent) = full_path.parent() {
            fs::create_dir_all(parent).expect("Failed to create parent dirs");
        }
        fs::write(&full_path, content).expect("Failed to write file");
        full_path
    }

    /// Persist a range-map stream under `path`.
    pub fn add_range_maps(&self, path: &str, maps: &RangeMapSet) -> PathBuf {
        let full_path = self.join(path);
        if let Some(parent) = full_path.parent() {
            fs::create_dir_all(parent).expect("Failed to create parent dirs");
        }
        maps.save(&full_path).expect("Failed to write range maps");
        full_path
    }

    pub fn read(&self, path: &str) -> String {
        fs::read_to_string(self.join(path)).expect("Failed to read file")
    }

    pub fn exists(&self, path: &str) -> bool {
        self.join(path).exists()
    }
}

impl Default for TestTree {
    fn default() -> Self {
        Self::new()
    }
}
