//! Read-only store of command-line flag values
//!
//! The `flags` filter looks names up here. The store is populated once by the
//! program (typically from `--flag NAME=VALUE` arguments) and handed to the
//! configuration manager.

use indexmap::IndexMap;

use crate::error::{Error, Result};

/// Named flag values
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FlagStore {
    values: IndexMap<String, String>,
}

impl FlagStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a flag value, replacing any previous value
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.values.insert(name.into(), value.into());
    }

    /// Parse a `NAME=VALUE` assignment and store it
    pub fn set_assignment(&mut self, assignment: &str) -> Result<()> {
        match assignment.split_once('=') {
            Some((name, value)) if !name.trim().is_empty() => {
                self.set(name.trim(), value);
                Ok(())
            }
            _ => Err(Error::config_format(format!(
                "Invalid flag assignment '{}'",
                assignment
            ))
            .with_help("Use the form NAME=VALUE")),
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for FlagStore {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut store = Self::new();
        for (k, v) in iter {
            store.set(k, v);
        }
        store
    }
}
