//! Source unit resolution.
//!
//! A unit name resolves against a search-path list: the literal name
//! first, then the source and compiled suffixes. The initial path list is
//! the working directory plus the entries of `AFNIX_PATH`.

use std::path::{Path, PathBuf};

use log::debug;

use crate::error::{EngineError, Result};

/// Suffix of a source unit.
pub const SOURCE_SUFFIX: &str = "als";
/// Suffix of a compiled unit.
pub const COMPILED_SUFFIX: &str = "axc";

#[derive(Debug, Clone)]
pub struct Resolver {
    paths: Vec<PathBuf>,
}

impl Resolver {
    pub fn new() -> Resolver {
        let mut paths = vec![PathBuf::from(".")];
        if let Ok(var) = std::env::var("AFNIX_PATH") {
            for entry in std::env::split_paths(&var) {
                if !entry.as_os_str().is_empty() {
                    paths.push(entry);
                }
            }
        }
        Resolver { paths }
    }

    /// Appends a directory to the search path.
    pub fn add_path<P: AsRef<Path>>(&mut self, path: P) {
        self.paths.push(path.as_ref().to_path_buf());
    }

    /// Resolves a unit name to an existing file; exhaustion is a
    /// `name-error`.
    pub fn resolve(&self, name: &str) -> Result<PathBuf> {
        let candidates = [
            name.to_string(),
            format!("{}.{}", name, SOURCE_SUFFIX),
            format!("{}.{}", name, COMPILED_SUFFIX),
        ];
        for dir in &self.paths {
            for candidate in &candidates {
                let path = dir.join(candidate);
                if path.is_file() {
                    debug!("unit '{}' resolved to '{}'", name, path.display());
                    return Ok(path);
                }
            }
        }
        Err(EngineError::NameError(format!(
            "cannot resolve unit '{}'",
            name
        )))
    }
}

impl Default for Resolver {
    fn default() -> Self {
        Resolver::new()
    }
}
