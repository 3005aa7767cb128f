#[allow(unused)]
use tracing::{debug, error, info, span, trace, warn, Instrument, Level};

use std::collections::HashMap;

use itertools::Itertools;
use regex::Regex;
use serde::de::Deserializer;
use serde_derive::Deserialize;

use crate::value::{parse_value, Value};

#[cfg(feature = "hash_fnv")]
pub type FieldHasher = fnv::FnvBuildHasher;

#[cfg(not(feature = "hash_fnv"))]
pub type FieldHasher = std::collections::hash_map::RandomState;

/// One logical row extracted from a file, keyed by field name.
pub type Record = HashMap<String, Value, FieldHasher>;

/// How the contents of a file are split into [`Record`]s.
///
/// Deserialized from the `parser` object of a file configuration, selected by its `format` key.
/// Keys that don't apply to the selected format are ignored.
#[derive(Clone, Debug, Deserialize)]
#[serde(tag = "format", rename_all = "kebab-case")]
pub enum ParserConfig {
    /// Whitespace separated columns, one row per line.
    Table {
        /// Column names.  When empty the first line (after skipping) is the header.
        #[serde(default)]
        columns: Vec<String>,
        /// Number of leading lines to drop.
        #[serde(default)]
        skip: usize,
    },
    /// `key value` lines, with records separated by `record_sep`.
    KeyValue {
        #[serde(default = "default_key_value_record_sep")]
        record_sep: String,
        /// Separator between key and value.  Empty splits on runs of whitespace.
        #[serde(default)]
        field_sep: String,
    },
    /// Pairs of header/value lines sharing a leading identifier, e.g. `/proc/net/netstat`.
    KeyRow {},
    /// Each record is matched against `pattern`, capture groups map onto `columns`.
    Regexp {
        #[serde(default = "default_regexp_record_sep")]
        record_sep: String,
        #[serde(default)]
        columns: Vec<String>,
        #[serde(deserialize_with = "deserialize_regex")]
        pattern: Regex,
    },
}

fn default_key_value_record_sep() -> String {
    "\n\n".to_string()
}

fn default_regexp_record_sep() -> String {
    "\n".to_string()
}

fn deserialize_regex<'de, D>(deserializer: D) -> std::result::Result<Regex, D::Error>
where
    D: Deserializer<'de>,
{
    let pattern = <String as serde::de::Deserialize>::deserialize(deserializer)?;
    Regex::new(&pattern).map_err(serde::de::Error::custom)
}

impl ParserConfig {
    pub fn key_value(record_sep: &str, field_sep: &str) -> Self {
        Self::KeyValue {
            record_sep: record_sep.to_string(),
            field_sep: field_sep.to_string(),
        }
    }

    pub fn table(columns: &[&str], skip: usize) -> Self {
        Self::Table {
            columns: columns.iter().map(|c| c.to_string()).collect(),
            skip,
        }
    }

    pub fn regexp(columns: &[&str], pattern: Regex) -> Self {
        Self::Regexp {
            record_sep: default_regexp_record_sep(),
            columns: columns.iter().map(|c| c.to_string()).collect(),
            pattern,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Table { .. } => "table",
            Self::KeyValue { .. } => "key-value",
            Self::KeyRow {} => "key-row",
            Self::Regexp { .. } => "regexp",
        }
    }
}

/// The contents of a file don't fit the shape its format requires.
#[derive(thiserror::Error, Debug, PartialEq)]
pub enum FormatError {
    #[error("key-row format requires even number of lines")]
    OddLineCount,

    #[error("line {line}, empty lines are not allowed")]
    EmptyLine { line: usize },

    #[error("line {line}, different number of columns: '{headers}' != '{values}'")]
    ColumnCount {
        line: usize,
        headers: usize,
        values: usize,
    },

    #[error("line {line}, rows ids do not match: '{header}' != '{value}'")]
    IdMismatch {
        line: usize,
        header: String,
        value: String,
    },

    #[error("record {record}, different number of columns: '{columns}' != '{groups}'")]
    GroupCount {
        record: usize,
        columns: usize,
        groups: usize,
    },
}

pub type Result<T> = std::result::Result<T, FormatError>;

/// Splits `data` into records according to `config`.
#[tracing::instrument(skip_all, fields(format = config.name()))]
pub fn parse(data: &str, config: &ParserConfig) -> Result<Vec<Record>> {
    let records = match config {
        ParserConfig::Table { columns, skip } => parse_table(data, columns, *skip),
        ParserConfig::KeyValue {
            record_sep,
            field_sep,
        } => parse_key_value_list(data, record_sep, field_sep),
        ParserConfig::KeyRow {} => parse_key_row(data)?,
        ParserConfig::Regexp {
            record_sep,
            columns,
            pattern,
        } => parse_regexp(data, record_sep, columns, pattern)?,
    };

    trace!(records = records.len());
    Ok(records)
}

// An empty separator leaves the input whole rather than splitting between every character
fn split_records<'a>(data: &'a str, record_sep: &'a str) -> Box<dyn Iterator<Item = &'a str> + 'a> {
    if record_sep.is_empty() {
        Box::new(std::iter::once(data))
    } else {
        Box::new(data.split(record_sep))
    }
}

/// Rows whose field count differs from the header are dropped.
pub fn parse_table<S: AsRef<str>>(data: &str, columns: &[S], skip: usize) -> Vec<Record> {
    let lines = data.trim_matches('\n').split('\n').collect_vec();
    if skip > lines.len() {
        return vec![];
    }
    let mut lines = &lines[skip..];

    let headers: Vec<&str> = if columns.is_empty() {
        match lines.split_first() {
            Some((header, rest)) => {
                lines = rest;
                header.split_whitespace().collect_vec()
            }
            None => return vec![],
        }
    } else {
        columns.iter().map(|c| -> &str { c.as_ref() }).collect()
    };

    lines
        .iter()
        .filter_map(|line| {
            let values = line.split_whitespace().collect_vec();
            if values.len() != headers.len() {
                trace!(line = *line, "skipping row");
                return None;
            }

            let row: Record = headers
                .iter()
                .zip(values)
                .map(|(h, v)| (h.to_string(), parse_value(v)))
                .collect();
            Some(row)
        })
        .collect()
}

/// Parses one block of `key value` lines.  Lines with fewer than two fields are ignored.
///
/// Keys are trimmed of surrounding whitespace (tabs included) and colons, so the tab-padded
/// `processor\t: 0` of `/proc/cpuinfo` yields the key `processor`.
pub fn parse_key_value(data: &str, field_sep: &str) -> Record {
    let mut values = Record::default();
    for line in data.split('\n') {
        let fields = if field_sep.is_empty() {
            line.split_whitespace().collect_vec()
        } else {
            line.split(field_sep).collect_vec()
        };

        if let [key, value, ..] = fields[..] {
            // If the field name ends with a ':' strip it out, along with any padding
            let key = key.trim_matches(|c: char| c.is_whitespace() || c == ':');
            values.insert(key.to_string(), parse_value(value));
        }
    }
    values
}

pub fn parse_key_value_list(data: &str, record_sep: &str, field_sep: &str) -> Vec<Record> {
    split_records(data, record_sep)
        .map(|block| parse_key_value(block, field_sep))
        .filter(|record| !record.is_empty())
        .collect()
}

/// Parses pairs of lines such as
///
/// ```text
/// TcpExt: SyncookiesSent SyncookiesRecv
/// TcpExt: 0 3
/// ```
///
/// into one record per pair, with the shared identifier stored under `id`.
pub fn parse_key_row(data: &str) -> Result<Vec<Record>> {
    let data = data.trim_matches('\n');
    let lines = data.split('\n').collect_vec();
    if lines.len() % 2 != 0 {
        Err(FormatError::OddLineCount)?
    }

    lines
        .into_iter()
        .tuples()
        .enumerate()
        .map(|(pair, (header_line, value_line))| -> Result<Record> {
            let line = pair * 2;
            let headers = header_line.split_whitespace().collect_vec();
            let values = value_line.split_whitespace().collect_vec();

            if headers.is_empty() {
                Err(FormatError::EmptyLine { line })?
            }

            if headers.len() != values.len() {
                Err(FormatError::ColumnCount {
                    line,
                    headers: headers.len(),
                    values: values.len(),
                })?
            }

            let header_id = headers[0].trim_matches(':');
            let value_id = values[0].trim_matches(':');
            if header_id != value_id {
                Err(FormatError::IdMismatch {
                    line,
                    header: header_id.to_string(),
                    value: value_id.to_string(),
                })?
            }

            let mut row = Record::default();
            row.insert("id".to_string(), Value::Text(header_id.to_string()));
            for (h, v) in headers.iter().zip(values.iter()).skip(1) {
                row.insert(h.to_string(), parse_value(v));
            }
            Ok(row)
        })
        .collect()
}

/// Records that don't match `pattern` are skipped.
pub fn parse_regexp<S: AsRef<str>>(
    data: &str,
    record_sep: &str,
    columns: &[S],
    pattern: &Regex,
) -> Result<Vec<Record>> {
    let mut items = vec![];
    for (record, segment) in split_records(data, record_sep).enumerate() {
        let captures = match pattern.captures(segment) {
            Some(captures) => captures,
            None => continue,
        };

        let groups = captures.len() - 1;
        if groups != columns.len() {
            Err(FormatError::GroupCount {
                record,
                columns: columns.len(),
                groups,
            })?
        }

        let item: Record = columns
            .iter()
            .zip(captures.iter().skip(1))
            .map(|(column, group)| {
                let text = group.map_or("", |m| m.as_str());
                (column.as_ref().to_string(), parse_value(text))
            })
            .collect();
        items.push(item);
    }

    Ok(items)
}
