//! Properties file loading
//!
//! Configuration for the TPU is a Java properties file, e.g.
//! `conf/config.properties`:
//!
//! ```text
//! service.name=tpu-nightly
//! engine.threads=4
//! engine.dswarm.api=http://localhost:8087/dmp/
//! init.do=true
//! ```
//!
//! Parsing follows `java.util.Properties`: `=`, `:` or whitespace separate
//! keys from values, `#` and `!` start comments, values keep inner spaces and
//! a trailing `\` continues the line.

use crate::error::{CommonError, Result};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// An immutable-by-convention set of string properties
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Properties {
    entries: BTreeMap<String, String>,
    source: Option<PathBuf>,
}

impl Properties {
    /// Create an empty property set
    pub fn new() -> Self {
        Self::default()
    }

    /// Load properties from a file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        let file = File::open(path).map_err(|source| CommonError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let entries = parse(BufReader::new(file)).map_err(|message| CommonError::Parse {
            path: path.to_path_buf(),
            message,
        })?;

        tracing::debug!(path = %path.display(), count = entries.len(), "Loaded properties");

        Ok(Self {
            entries,
            source: Some(path.to_path_buf()),
        })
    }

    /// Build a property set from key/value pairs
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            entries: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
            source: None,
        }
    }

    /// Set (or overwrite) a property
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.entries.insert(key.into(), value.into());
    }

    /// File the properties were loaded from, if any
    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    /// Trimmed value of a property; blank values count as absent
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .get(key)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    /// Owned variant of [`Properties::get`]
    pub fn get_string(&self, key: &str) -> Option<String> {
        self.get(key).map(str::to_string)
    }

    /// Value of a property that must be present
    pub fn require(&self, key: &str) -> Result<&str> {
        self.get(key)
            .ok_or_else(|| CommonError::MissingProperty(key.to_string()))
    }

    /// Boolean property: `true` in any letter case is true, any other
    /// non-blank value is false, blank or missing is `None`.
    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.get(key).map(|v| v.eq_ignore_ascii_case("true"))
    }

    /// Boolean property with a default for blank or missing values
    pub fn bool_or(&self, key: &str, default: bool) -> bool {
        self.get_bool(key).unwrap_or(default)
    }

    /// Parse a property with `FromStr`; missing is `Ok(None)`
    pub fn parse<T>(&self, key: &str) -> Result<Option<T>>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        match self.get(key) {
            None => Ok(None),
            Some(raw) => raw
                .parse::<T>()
                .map(Some)
                .map_err(|e| CommonError::invalid_value(key, raw, e.to_string())),
        }
    }

    /// Comma-separated list property; empty segments are dropped
    pub fn get_list(&self, key: &str) -> Vec<String> {
        self.get(key)
            .map(|v| {
                v.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Iterate over all raw entries in key order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn parse<R: Read>(input: R) -> std::result::Result<BTreeMap<String, String>, String> {
    java_properties::read(input)
        .map(|map| map.into_iter().collect())
        .map_err(|e| e.to_string())
}
