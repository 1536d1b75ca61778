//! Canned responses stored on disk.
//!
//! A fixtures directory holds plain body files (served with
//! [`ResponseSpec::from_file`]) and `<name>.response` files containing a full
//! raw HTTP message (served with [`ResponseSpec::from_raw_message`]).

use super::spec::ResponseSpec;
use crate::error::ConstructionError;
use hyper::HeaderMap;
use std::path::{Path, PathBuf};

/// Extension used for raw-message fixture files.
pub const RESPONSE_EXTENSION: &str = "response";

#[derive(Debug, Clone)]
pub struct Fixtures {
    root: PathBuf,
}

impl Fixtures {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of `name` under the fixtures root, if such a file exists.
    pub fn path(&self, name: &str) -> Option<PathBuf> {
        let candidate = self.root.join(name);
        candidate.is_file().then_some(candidate)
    }

    /// Load `<root>/<name>.response` as a raw HTTP message.
    pub fn response_named(&self, name: &str) -> Result<ResponseSpec, ConstructionError> {
        let path = self.root.join(format!("{name}.{RESPONSE_EXTENSION}"));
        let raw = std::fs::read(&path)
            .map_err(|source| ConstructionError::FileNotFound { path, source })?;
        ResponseSpec::from_raw_message(raw)
    }

    /// Serve the fixture file `name` as a streamed body.
    pub fn file(
        &self,
        name: &str,
        status: u16,
        headers: HeaderMap,
    ) -> Result<ResponseSpec, ConstructionError> {
        ResponseSpec::from_file(self.root.join(name), status, headers)
    }
}
