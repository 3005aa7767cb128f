#[allow(unused)]
use tracing::{debug, error, info, span, trace, warn, Instrument, Level};

use std::collections::BTreeMap;

use serde_derive::Deserialize;

use crate::{
    expr::Expression,
    namespace::{Namespace, PatternError},
    record::ParserConfig,
};

/// The configuration document couldn't be used.
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("malformed configuration: {0}")]
    Json(#[from] serde_json::Error),

    #[error("file '{file}': {source}")]
    Pattern {
        file: String,
        #[source]
        source: PatternError,
    },
}

pub type Result<T> = std::result::Result<T, ConfigError>;

#[derive(Debug, Deserialize)]
struct RawFileConfig {
    file: String,
    #[serde(default)]
    metrics: BTreeMap<String, String>,
    #[serde(default)]
    tags: BTreeMap<String, String>,
    parser: ParserConfig,
}

/// One namespace pattern and the expression producing its value.
#[derive(Clone, Debug)]
pub struct MetricSpec {
    pub namespace: Namespace,
    pub expression: Expression,
}

/// A unit of work: which files to read, how to parse them and which metrics to produce.
#[derive(Clone, Debug)]
pub struct FileConfig {
    /// Glob pattern selecting the files.
    pub file: String,
    /// Sorted by namespace pattern.
    pub metrics: Vec<MetricSpec>,
    pub tags: BTreeMap<String, String>,
    pub parser: ParserConfig,
}

impl TryFrom<RawFileConfig> for FileConfig {
    type Error = ConfigError;

    fn try_from(raw: RawFileConfig) -> Result<Self> {
        let metrics = raw
            .metrics
            .iter()
            .map(|(pattern, expression)| {
                Namespace::parse(pattern)
                    .map(|namespace| MetricSpec {
                        namespace,
                        expression: Expression::parse(expression),
                    })
                    .map_err(|source| ConfigError::Pattern {
                        file: raw.file.clone(),
                        source,
                    })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            file: raw.file,
            metrics,
            tags: raw.tags,
            parser: raw.parser,
        })
    }
}

impl FileConfig {
    /// The namespace patterns this configuration can produce, without reading any data.
    pub fn namespaces(&self) -> impl Iterator<Item = &Namespace> {
        self.metrics.iter().map(|m| &m.namespace)
    }
}

/// Decodes a JSON array of file configurations.
///
/// Every namespace pattern and regular expression is checked here, so a document that loads
/// can't fail later for those reasons.
#[tracing::instrument(skip_all)]
pub fn from_json(data: &str) -> Result<Vec<FileConfig>> {
    let raw: Vec<RawFileConfig> = serde_json::from_str(data)?;
    let configs = raw
        .into_iter()
        .map(FileConfig::try_from)
        .collect::<Result<Vec<_>>>()?;
    debug!(configs = configs.len(), "loaded configuration");
    Ok(configs)
}
