//! Named filters applied by interpolation suffixes
//!
//! `%(data|lower,base64)` passes `data` through each named filter in turn.
//! Filters live in a [`FilterRegistry`] owned by the configuration manager.

use std::collections::HashMap;
use std::io::Read;
use std::sync::Arc;

use base64::{engine::general_purpose::STANDARD, Engine as _};

use crate::error::{Error, Result};
use crate::flags::FlagStore;

/// Upper bound on the bytes the `file` filter reads
pub const MAX_FILE_SIZE: u64 = 1024 * 1024;

/// Context provided to filters while an expression is evaluated
pub struct FilterContext<'a> {
    /// Parameter whose value is being evaluated (may be empty)
    pub parameter: &'a str,
    /// Flag values visible to the `flags` filter
    pub flags: &'a FlagStore,
    /// Evaluates a nested expression through the configuration manager
    pub expander: &'a mut dyn FnMut(&str) -> Result<String>,
}

impl<'a> FilterContext<'a> {
    pub fn new(
        parameter: &'a str,
        flags: &'a FlagStore,
        expander: &'a mut dyn FnMut(&str) -> Result<String>,
    ) -> Self {
        Self {
            parameter,
            flags,
            expander,
        }
    }

    /// Interpolate `expression` as if it were a configuration value
    pub fn expand(&mut self, expression: &str) -> Result<String> {
        (self.expander)(expression)
    }
}

/// Trait for filter implementations
pub trait Filter: Send + Sync {
    /// Transform `data`
    fn filter(&self, data: &str, ctx: &mut FilterContext<'_>) -> Result<String>;

    /// Get the name of this filter
    fn name(&self) -> &str;
}

/// A simple function-based filter
pub struct FnFilter<F>
where
    F: Fn(&str, &mut FilterContext<'_>) -> Result<String> + Send + Sync,
{
    name: String,
    func: F,
}

impl<F> FnFilter<F>
where
    F: Fn(&str, &mut FilterContext<'_>) -> Result<String> + Send + Sync,
{
    /// Create a new function-based filter
    pub fn new(name: impl Into<String>, func: F) -> Self {
        Self {
            name: name.into(),
            func,
        }
    }
}

impl<F> Filter for FnFilter<F>
where
    F: Fn(&str, &mut FilterContext<'_>) -> Result<String> + Send + Sync,
{
    fn filter(&self, data: &str, ctx: &mut FilterContext<'_>) -> Result<String> {
        (self.func)(data, ctx)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Registry of available filters
#[derive(Clone)]
pub struct FilterRegistry {
    filters: HashMap<String, Arc<dyn Filter>>,
}

impl Default for FilterRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl std::fmt::Debug for FilterRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FilterRegistry")
            .field("filters", &self.names())
            .finish()
    }
}

impl FilterRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self {
            filters: HashMap::new(),
        }
    }

    /// Create a registry with the standard built-in filters
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register_builtin_filters();
        registry
    }

    fn register_builtin_filters(&mut self) {
        self.register_fn("identity", identity_filter);
        self.register_fn("literal", identity_filter);
        self.register_fn("lower", |data, _| Ok(data.to_lowercase()));
        self.register_fn("upper", |data, _| Ok(data.to_uppercase()));
        self.register_fn("file", file_filter);
        self.register_fn("base64", base64_filter);
        self.register_fn("env", env_filter);
        self.register_fn("flags", flags_filter);
        self.register_fn("expand", |data, ctx| ctx.expand(data));
    }

    /// Register a filter, replacing any filter of the same name
    pub fn register(&mut self, filter: Arc<dyn Filter>) {
        self.filters.insert(filter.name().to_string(), filter);
    }

    /// Register a function as a filter
    pub fn register_fn<F>(&mut self, name: impl Into<String>, func: F)
    where
        F: Fn(&str, &mut FilterContext<'_>) -> Result<String> + Send + Sync + 'static,
    {
        self.register(Arc::new(FnFilter::new(name, func)));
    }

    /// Get a filter by name
    pub fn get(&self, name: &str) -> Option<&Arc<dyn Filter>> {
        self.filters.get(name)
    }

    /// Check if a filter is registered
    pub fn contains(&self, name: &str) -> bool {
        self.filters.contains_key(name)
    }

    /// Registered filter names, sorted
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.filters.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Run the named filter over `data`
    pub fn apply(&self, name: &str, data: &str, ctx: &mut FilterContext<'_>) -> Result<String> {
        let filter = self
            .filters
            .get(name)
            .ok_or_else(|| Error::unknown_filter(name))?;
        filter.filter(data, ctx).map_err(|e| {
            if ctx.parameter.is_empty() || e.path.is_some() {
                e
            } else {
                e.with_path(ctx.parameter)
            }
        })
    }
}

fn identity_filter(data: &str, _ctx: &mut FilterContext<'_>) -> Result<String> {
    Ok(data.to_string())
}

/// Reads the named file, up to [`MAX_FILE_SIZE`] bytes
fn file_filter(data: &str, _ctx: &mut FilterContext<'_>) -> Result<String> {
    let file = std::fs::File::open(data)
        .map_err(|e| Error::filter("file", format!("Unable to open {}: {}", data, e)))?;

    let mut buf = Vec::new();
    file.take(MAX_FILE_SIZE)
        .read_to_end(&mut buf)
        .map_err(|e| Error::filter("file", format!("Unable to read {}: {}", data, e)))?;

    Ok(String::from_utf8_lossy(&buf).into_owned())
}

fn base64_filter(data: &str, _ctx: &mut FilterContext<'_>) -> Result<String> {
    let bytes = STANDARD
        .decode(data.trim())
        .map_err(|e| Error::filter("base64", format!("Invalid base64: {}", e)))?;
    String::from_utf8(bytes)
        .map_err(|_| Error::filter("base64", "Decoded data is not valid UTF-8"))
}

/// Environment variable lookup; names are uppercased and unset variables are empty
fn env_filter(data: &str, _ctx: &mut FilterContext<'_>) -> Result<String> {
    Ok(std::env::var(data.to_uppercase()).unwrap_or_default())
}

fn flags_filter(data: &str, ctx: &mut FilterContext<'_>) -> Result<String> {
    ctx.flags
        .get(data)
        .map(str::to_string)
        .ok_or_else(|| Error::filter("flags", format!("Unknown flag '{}'", data)))
}
