//! `filemetrics` extracts metrics from semi-structured text files such as those under `/proc`
//!
//! A configuration names a file glob, a parser for the file format, and a set of namespace
//! patterns each paired with an expression:
//!
//! ```json
//! [{
//!   "file": "/proc/stat",
//!   "metrics": { "/proc/cpu/{label}/user": "{user},{NUM_CPU},:div" },
//!   "tags": { "source": "procfs" },
//!   "parser": {
//!     "format": "regexp",
//!     "columns": ["label", "user"],
//!     "pattern": "(cpu\\d*)\\s+(\\d+)"
//!   }
//! }]
//! ```

#[allow(unused)]
use tracing::{debug, error, info, span, trace, warn, Instrument, Level};

use std::path::PathBuf;

/// Metric assembly and the discover/collect service boundary.
pub mod collector;

/// Loads and validates configuration documents.
pub mod config;

/// Reverse-polish expressions evaluated against record fields.
pub mod expr;

/// Namespace patterns and their binding to concrete values.
pub mod namespace;

/// Splits file contents into records, one of four formats.
pub mod record;

pub mod source;

pub mod value;

#[cfg(test)]
mod test;

pub use collector::{Collector, FileCollector, Metric};
pub use config::FileConfig;
pub use namespace::{Namespace, ResolvedNamespace};
pub use record::{ParserConfig, Record};
pub use value::{parse_value, Value};

/// Indicates that collecting metrics for a configuration failed
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] config::ConfigError),

    #[error("invalid file pattern: {0}")]
    Glob(#[from] glob::PatternError),

    #[error("couldn't read {}: {}", .path.display(), .source)]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{}: {}", .path.display(), .source)]
    Format {
        path: PathBuf,
        #[source]
        source: record::FormatError,
    },

    #[error("namespace '{namespace}': {source}")]
    Bind {
        namespace: String,
        #[source]
        source: namespace::BindError,
    },

    #[error("expression '{expression}': {source}")]
    Eval {
        expression: String,
        #[source]
        source: expr::EvalError,
    },
}

pub type Result<T> = std::result::Result<T, Error>;
