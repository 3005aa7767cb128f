//! Turns parsed records into metrics.
//!
//! For every file matching a configuration's glob, every record parsed out of it and every
//! namespace/expression pair, the namespace is bound and the expression evaluated against the
//! record layered over a default context (environment plus `NUM_CPU`).

#[allow(unused)]
use tracing::{debug, error, info, span, trace, warn, Instrument, Level};

use std::{
    collections::{BTreeMap, HashMap},
    path::{Path, PathBuf},
    sync::Arc,
};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde_derive::Serialize;

use crate::{
    config::{self, FileConfig, MetricSpec},
    expr::{Overlay, Variables},
    namespace::{Namespace, ResolvedNamespace},
    record::{self, Record},
    source::{LocalFs, Source},
    value::Value,
    Error, Result,
};

/// Name of the default variable holding the number of CPUs.
pub const NUM_CPU: &str = "NUM_CPU";

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Metric {
    pub namespace: ResolvedNamespace,
    pub value: Value,
    pub timestamp: DateTime<Utc>,
    pub tags: BTreeMap<String, String>,
}

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Always reports the same instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// Variables available to every expression.  Record fields with the same name take precedence.
///
/// Environment variables are strings; `NUM_CPU` is a number.
pub fn default_vars() -> Record {
    let mut vars: Record = std::env::vars_os()
        .filter_map(|(k, v)| Some((k.into_string().ok()?, Value::Text(v.into_string().ok()?))))
        .collect();

    let cpus = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    vars.insert(NUM_CPU.to_string(), Value::Number(cpus as f64));
    vars
}

impl MetricSpec {
    fn create<V: Variables + ?Sized>(
        &self,
        file: &str,
        vars: &V,
        timestamp: DateTime<Utc>,
        tags: &BTreeMap<String, String>,
    ) -> Result<Metric> {
        let namespace = self
            .namespace
            .bind(file, vars)
            .map_err(|source| Error::Bind {
                namespace: self.namespace.to_string(),
                source,
            })?;

        let value = self
            .expression
            .evaluate(vars)
            .map_err(|source| Error::Eval {
                expression: self.expression.to_string(),
                source,
            })?;

        Ok(Metric {
            namespace,
            value,
            timestamp,
            tags: tags.clone(),
        })
    }
}

impl FileConfig {
    /// Reads every matching file and produces its metrics.
    ///
    /// The first failure aborts the whole configuration; nothing collected so far is returned.
    #[tracing::instrument(skip_all, fields(file = %self.file))]
    pub fn collect<S, C>(&self, fs: &S, defaults: &Record, clock: &C) -> Result<Vec<Metric>>
    where
        S: Source + ?Sized,
        C: Clock + ?Sized,
    {
        let files = fs.glob(&self.file)?;
        debug!("loading {} files matching pattern '{}'", files.len(), self.file);

        let mut data = vec![];
        for path in files {
            let contents = fs
                .read_to_string(&path)
                .map_err(|source| Error::Io {
                    path: path.clone(),
                    source,
                })?;

            let records =
                record::parse(&contents, &self.parser).map_err(|source| Error::Format {
                    path: path.clone(),
                    source,
                })?;
            debug!("found {} records in {}", records.len(), path.display());

            let file = path.to_string_lossy();
            for record in records.iter() {
                let vars = Overlay {
                    upper: record,
                    lower: defaults,
                };
                for spec in self.metrics.iter() {
                    let metric = spec.create(&file, &vars, clock.now(), &self.tags)?;
                    trace!(namespace = %metric.namespace, value = %metric.value, "created metric");
                    data.push(metric);
                }
            }
        }

        Ok(data)
    }
}

/// The two operations offered to a host.
pub trait Collector {
    /// Every namespace pattern the configuration at `config` could produce.  No data files are
    /// read.
    fn discover(&self, config: &Path) -> Result<Vec<Namespace>>;

    /// Concrete metrics for the configuration at `config`.
    fn collect(&self, config: &Path) -> Result<Vec<Metric>>;
}

/// A [`Collector`] reading configurations and data through a [`Source`].
///
/// Loaded configurations are cached per path.  An entry is inserted whole, so concurrent
/// callers either see nothing and load it themselves or see the complete set.
#[derive(Debug)]
pub struct FileCollector<S = LocalFs, C = SystemClock> {
    fs: S,
    clock: C,
    configs: RwLock<HashMap<PathBuf, Arc<[FileConfig]>>>,
}

impl FileCollector {
    pub fn new() -> Self {
        Self::with_source(LocalFs, SystemClock)
    }
}

impl Default for FileCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: Source, C: Clock> FileCollector<S, C> {
    pub fn with_source(fs: S, clock: C) -> Self {
        Self {
            fs,
            clock,
            configs: RwLock::new(HashMap::new()),
        }
    }

    /// Returns the configurations at `path`, loading them on first use.
    pub fn configs(&self, path: &Path) -> Result<Arc<[FileConfig]>> {
        if let Some(configs) = self.configs.read().get(path) {
            return Ok(configs.clone());
        }

        let data = self.fs.read_to_string(path).map_err(|source| Error::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let loaded: Arc<[FileConfig]> = config::from_json(&data)?.into();
        info!(path = %path.display(), configs = loaded.len(), "loaded configuration");

        Ok(self
            .configs
            .write()
            .entry(path.to_path_buf())
            .or_insert(loaded)
            .clone())
    }

    /// Forgets the cached configurations for `path`, the next call reads it again.
    pub fn reload(&self, path: &Path) {
        self.configs.write().remove(path);
    }
}

impl<S: Source, C: Clock> Collector for FileCollector<S, C> {
    #[tracing::instrument(skip(self))]
    fn discover(&self, config: &Path) -> Result<Vec<Namespace>> {
        let configs = self.configs(config)?;
        Ok(configs
            .iter()
            .flat_map(|c| c.namespaces().cloned())
            .collect())
    }

    /// A configuration that fails is logged and skipped, the others are still collected.
    #[tracing::instrument(skip(self))]
    fn collect(&self, config: &Path) -> Result<Vec<Metric>> {
        let configs = self.configs(config)?;
        let defaults = default_vars();

        let mut metrics = vec![];
        for c in configs.iter() {
            match c.collect(&self.fs, &defaults, &self.clock) {
                Ok(collected) => metrics.extend(collected),
                Err(e) => error!(file = %c.file, error = %e, "collection failed"),
            }
        }
        Ok(metrics)
    }
}
