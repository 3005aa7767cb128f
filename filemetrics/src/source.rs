//! Where file contents come from.
//!
//! [`LocalFs`] reads the real filesystem; [`MemFs`] keeps everything in memory so collection can
//! be tested against fixed `/proc` snapshots.

#[allow(unused)]
use tracing::{debug, error, info, span, trace, warn, Instrument, Level};

use std::{
    collections::BTreeMap,
    io,
    path::{Path, PathBuf},
};

use glob::{MatchOptions, Pattern, PatternError};

pub trait Source: Send + Sync {
    /// Expands `pattern` into the matching paths, sorted.  No matches is not an error.
    fn glob(&self, pattern: &str) -> Result<Vec<PathBuf>, PatternError>;

    /// Reads a whole file.  Bytes that aren't valid UTF-8 are replaced rather than rejected.
    fn read_to_string(&self, path: &Path) -> io::Result<String>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct LocalFs;

impl Source for LocalFs {
    fn glob(&self, pattern: &str) -> Result<Vec<PathBuf>, PatternError> {
        let paths = glob::glob(pattern)?
            .filter_map(|entry| match entry {
                Ok(path) => Some(path),
                // Unreadable directories are skipped, as a shell would
                Err(e) => {
                    debug!(path = %e.path().display(), error = %e.error(), "skipping");
                    None
                }
            })
            .collect();
        Ok(paths)
    }

    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        let data = std::fs::read(path)?;
        Ok(match String::from_utf8(data) {
            Ok(s) => s,
            Err(e) => {
                debug!(path = %path.display(), "replacing invalid UTF-8");
                String::from_utf8_lossy(e.as_bytes()).into_owned()
            }
        })
    }
}

/// In-memory files keyed by path.
#[derive(Debug, Default, Clone)]
pub struct MemFs {
    files: BTreeMap<PathBuf, String>,
}

impl MemFs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_file(&mut self, path: impl AsRef<Path>, contents: impl Into<String>) -> &mut Self {
        self.files
            .insert(path.as_ref().to_path_buf(), contents.into());
        self
    }

    pub fn with_file(mut self, path: impl AsRef<Path>, contents: impl Into<String>) -> Self {
        self.add_file(path, contents);
        self
    }
}

impl Source for MemFs {
    fn glob(&self, pattern: &str) -> Result<Vec<PathBuf>, PatternError> {
        let pattern = Pattern::new(pattern)?;
        // Match the way a directory walk would: `*` never crosses a `/`
        let options = MatchOptions {
            require_literal_separator: true,
            ..MatchOptions::new()
        };
        Ok(self
            .files
            .keys()
            .filter(|path| pattern.matches_path_with(path, options))
            .cloned()
            .collect())
    }

    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        self.files.get(path).cloned().ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                format!("no such file: {}", path.display()),
            )
        })
    }
}
