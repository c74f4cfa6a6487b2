//! The configuration manager
//!
//! [`ConfigManager`] merges raw text from configuration sources, overlays an
//! environment layer, falls back to declared defaults and section
//! inheritance, and evaluates interpolation expressions on read.
//!
//! Lookup order for `Section.key`:
//! 1. environment entry named `Section.key` (returned as is)
//! 2. raw source data `[Section] key`
//! 3. environment section `Section` (a mapping), key `key`
//! 4. declared default of `Section.key`
//! 5. the same lookup in the section named by `Section.@inherit_from_section`

use std::io::{Read, Write};
use std::sync::Arc;

use indexmap::IndexMap;

use crate::error::{Error, ErrorKind, Result};
use crate::filter::{FilterContext, FilterRegistry};
use crate::flags::FlagStore;
use crate::interpolation::{escape_string, Expander, StringInterpolator, DEFAULT_MAX_DEPTH};
use crate::source::{self, IniSource, RawData, Source};
use crate::type_info::{Descriptor, TypeInfo, TypeInfoSet};
use crate::value::Value;

/// Key naming the parent section of a section
pub const INHERIT_KEY: &str = "@inherit_from_section";

/// Name of the section that can only be changed through the environment layer
pub const ENVIRONMENT_SECTION: &str = "Environment";

/// Tuning options for a [`ConfigManager`]
#[derive(Debug, Clone)]
pub struct ConfigOptions {
    /// Maximum expression nesting and reference chain length
    pub max_depth: usize,
}

impl Default for ConfigOptions {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

/// Options for [`ConfigManager::initialize`]
#[derive(Debug, Clone)]
pub struct InitOptions {
    /// Discard previously loaded raw data first
    pub reset: bool,
    /// Fail unless the source exists and was parsed
    pub must_exist: bool,
}

impl Default for InitOptions {
    fn default() -> Self {
        Self {
            reset: true,
            must_exist: false,
        }
    }
}

/// Layered configuration store
#[derive(Debug)]
pub struct ConfigManager {
    raw_data: RawData,
    environment: IndexMap<String, Value>,
    defaults: IndexMap<String, IndexMap<String, Value>>,
    type_infos: TypeInfoSet,
    filters: FilterRegistry,
    flags: FlagStore,
    options: ConfigOptions,
    source: Option<Box<dyn Source>>,
}

impl Default for ConfigManager {
    fn default() -> Self {
        Self::new()
    }
}

/// Split `Section.key` at the first dot
fn split_name(name: &str) -> Result<(&str, &str)> {
    name.split_once('.')
        .ok_or_else(|| Error::missing_section(name))
}

/// Split on every line boundary, treating `\r\n` as one
fn split_lines(input: &str) -> Vec<&str> {
    const BREAKS: [char; 10] = [
        '\n', '\r', '\x0b', '\x0c', '\x1c', '\x1d', '\x1e', '\u{85}', '\u{2028}', '\u{2029}',
    ];

    let mut lines = Vec::new();
    let mut start = 0;
    let mut chars = input.char_indices().peekable();
    while let Some((pos, c)) = chars.next() {
        if !BREAKS.contains(&c) {
            continue;
        }
        lines.push(&input[start..pos]);
        start = pos + c.len_utf8();
        if c == '\r' {
            if let Some(&(next, '\n')) = chars.peek() {
                chars.next();
                start = next + 1;
            }
        }
    }
    if start < input.len() {
        lines.push(&input[start..]);
    }
    lines
}

/// Reinsert the blank line INI continuation parsing drops after PEM headers
///
/// Lines are split on `\n`, `\r\n`, a bare `\r` and the other Unicode line
/// boundaries, then re-joined with `\n`.
pub fn newline_fixup(input: &str) -> String {
    const NEWLINE_AFTER: [&str; 1] = ["DEK-Info:"];

    let mut lines = Vec::new();
    for line in split_lines(input) {
        lines.push(line);
        if NEWLINE_AFTER.iter().any(|prefix| line.starts_with(prefix)) {
            lines.push("");
        }
    }
    lines.join("\n")
}

fn should_wrap(err: &Error) -> bool {
    matches!(
        err.kind,
        ErrorKind::UnbalancedExpression | ErrorKind::TypeValue
    )
}

impl ConfigManager {
    /// Create a manager with default options
    pub fn new() -> Self {
        Self::with_options(ConfigOptions::default())
    }

    /// Create a manager with custom options
    pub fn with_options(options: ConfigOptions) -> Self {
        let mut manager = Self {
            raw_data: RawData::new(),
            environment: IndexMap::new(),
            defaults: IndexMap::new(),
            type_infos: TypeInfoSet::new(),
            filters: FilterRegistry::with_builtins(),
            flags: FlagStore::new(),
            options,
            source: None,
        };
        manager.register_builtin_options();
        manager
    }

    fn register_builtin_options(&mut self) {
        let component = Descriptor::string(
            "Environment.component",
            "",
            "The main component which is running. It is set by the main program.",
        );
        let execute = Descriptor::list(
            "Environment.execute_sections",
            Vec::<String>::new(),
            "These sections will be executed when a config is read.",
        );
        self.insert_option(Arc::new(component), "Environment", "component");
        self.insert_option(Arc::new(execute), "Environment", "execute_sections");
    }

    fn insert_option(&mut self, descriptor: Arc<dyn TypeInfo>, section: &str, key: &str) {
        self.defaults
            .entry(section.to_string())
            .or_default()
            .insert(key.to_string(), descriptor.default_value());
        self.type_infos.append(descriptor);
    }

    // ========================================
    // Registration
    // ========================================

    /// Register an option descriptor and seed its default
    pub fn add_option(&mut self, descriptor: Arc<dyn TypeInfo>) -> Result<()> {
        let name = descriptor.name().to_string();
        let (section, key) = split_name(&name)?;
        self.insert_option(descriptor, section, key);
        Ok(())
    }

    pub fn define_bool(&mut self, name: &str, default: bool, help: &str) -> Result<()> {
        self.add_option(Arc::new(Descriptor::bool(name, default, help)))
    }

    pub fn define_float(&mut self, name: &str, default: f64, help: &str) -> Result<()> {
        self.add_option(Arc::new(Descriptor::float(name, default, help)))
    }

    pub fn define_integer(&mut self, name: &str, default: i64, help: &str) -> Result<()> {
        self.add_option(Arc::new(Descriptor::integer(name, default, help)))
    }

    pub fn define_string(&mut self, name: &str, default: &str, help: &str) -> Result<()> {
        self.add_option(Arc::new(Descriptor::string(name, default, help)))
    }

    pub fn define_list<S: Into<String>>(
        &mut self,
        name: &str,
        default: Vec<S>,
        help: &str,
    ) -> Result<()> {
        self.add_option(Arc::new(Descriptor::list(name, default, help)))
    }

    pub fn define_choice<S: Into<String>>(
        &mut self,
        name: &str,
        default: &str,
        choices: Vec<S>,
        help: &str,
    ) -> Result<()> {
        self.add_option(Arc::new(Descriptor::choice(name, default, choices, help)))
    }

    /// Register a custom descriptor
    pub fn define_option(&mut self, descriptor: impl TypeInfo + 'static) -> Result<()> {
        self.add_option(Arc::new(descriptor))
    }

    /// Declared options, sorted by name
    pub fn type_infos(&self) -> &TypeInfoSet {
        &self.type_infos
    }

    /// Filters available to interpolation expressions
    pub fn filters_mut(&mut self) -> &mut FilterRegistry {
        &mut self.filters
    }

    /// Replace the flag values seen by the `flags` filter
    pub fn set_flags(&mut self, flags: FlagStore) {
        self.flags = flags;
    }

    pub fn flags(&self) -> &FlagStore {
        &self.flags
    }

    // ========================================
    // Loading
    // ========================================

    /// Load the primary configuration from a location (path or URL)
    pub fn initialize(&mut self, location: &str, options: InitOptions) -> Result<()> {
        match source::open(location)? {
            Some(source) => {
                log::info!("Loading configuration from {}", location);
                let parsed = source.parsed();
                self.initialize_with_source(source, options.clone())?;
                if options.must_exist && !parsed {
                    return Err(Error::config_format(format!(
                        "Unable to parse config file {}",
                        location
                    )));
                }
                Ok(())
            }
            None if options.must_exist => Err(Error::config_format(format!(
                "No configuration source for {}",
                location
            ))),
            None => {
                if options.reset {
                    self.raw_data.clear();
                }
                self.source = None;
                Ok(())
            }
        }
    }

    /// Load the primary configuration from INI text
    pub fn initialize_from_text(&mut self, text: &str, options: InitOptions) -> Result<()> {
        self.initialize_with_source(Box::new(IniSource::from_text(text)?), options)
    }

    /// Load the primary configuration from an INI reader
    pub fn initialize_from_reader(&mut self, reader: impl Read, options: InitOptions) -> Result<()> {
        self.initialize_with_source(Box::new(IniSource::from_reader(reader)?), options)
    }

    /// Use an already opened source as the primary configuration
    pub fn initialize_with_source(
        &mut self,
        source: Box<dyn Source>,
        options: InitOptions,
    ) -> Result<()> {
        if options.reset {
            self.raw_data.clear();
        }
        self.merge_data(source.raw_data());
        self.source = Some(source);
        Ok(())
    }

    /// Merge an additional source; later sources override earlier keys
    ///
    /// Returns whether the source existed and was parsed.
    pub fn load_secondary_config(&mut self, location: &str) -> Result<bool> {
        match source::open(location)? {
            Some(source) => {
                log::info!("Loading configuration from {}", location);
                self.merge_data(source.raw_data());
                Ok(source.parsed())
            }
            None => Ok(false),
        }
    }

    /// Overlay raw section data onto the current raw data
    pub fn merge_data(&mut self, raw: &RawData) {
        source::merge_into(&mut self.raw_data, raw);
    }

    /// Forget loaded data, the environment and the primary source
    ///
    /// Declared options, filters and flags are kept.
    pub fn clear(&mut self) {
        self.raw_data.clear();
        self.environment.clear();
        self.source = None;
    }

    // ========================================
    // Reading
    // ========================================

    /// Get the interpolated, typed value of a parameter
    ///
    /// A parameter with no value in any layer yields `Value::Null`.
    pub fn get(&self, name: &str) -> Result<Value> {
        self.get_with(name, false, true)
    }

    /// Get a parameter, optionally validating it and ignoring exact environment overrides
    pub fn get_with(&self, name: &str, verify: bool, use_environment: bool) -> Result<Value> {
        let mut stack = Vec::new();
        self.resolve(name, verify, use_environment, &mut stack)
    }

    fn resolve(
        &self,
        name: &str,
        verify: bool,
        use_environment: bool,
        stack: &mut Vec<String>,
    ) -> Result<Value> {
        if use_environment {
            if let Some(value) = self.environment.get(name) {
                return Ok(value.clone());
            }
        }

        let (section, key) = split_name(name)?;

        if stack.iter().any(|seen| seen == name) {
            let mut chain = stack.clone();
            chain.push(name.to_string());
            return Err(Error::circular_reference(name, chain));
        }
        if stack.len() >= self.options.max_depth {
            return Err(Error::recursion_limit(self.options.max_depth).with_path(name));
        }

        let descriptor = match self.type_info_for(section, key, &mut Vec::new())? {
            Some(descriptor) => descriptor,
            None => {
                if !key.starts_with("__") {
                    log::debug!("No config declaration for {} - assuming String", name);
                }
                Arc::new(Descriptor::undeclared(name))
            }
        };

        let value = self.lookup(section, key, &mut Vec::new())?;

        let value = match value {
            Value::String(text) => {
                stack.push(name.to_string());
                let expanded =
                    self.interpolate_with(&newline_fixup(&text), section, name, stack);
                stack.pop();

                expanded
                    .and_then(|text| descriptor.parse_value(&text))
                    .map_err(|e| {
                        if should_wrap(&e) {
                            Error::while_parsing(name, e)
                        } else {
                            e
                        }
                    })?
            }
            other => other,
        };

        if verify && !key.starts_with("__") {
            descriptor
                .validate(&value)
                .map_err(|e| Error::while_parsing(name, e))?;
        }

        Ok(value)
    }

    /// Get the stored value without newline fixup or interpolation
    pub fn get_raw(&self, name: &str) -> Result<Value> {
        if let Some(value) = self.environment.get(name) {
            return Ok(value.clone());
        }
        let (section, key) = split_name(name)?;
        self.lookup(section, key, &mut Vec::new())
    }

    /// Search raw data, the environment, defaults and then parent sections
    fn lookup(&self, section: &str, key: &str, visited: &mut Vec<String>) -> Result<Value> {
        let found = self
            .raw_data
            .get(section)
            .and_then(|data| data.get(key))
            .map(|text| Value::String(text.clone()))
            .or_else(|| {
                self.environment
                    .get(section)
                    .and_then(Value::as_mapping)
                    .and_then(|data| data.get(key))
                    .filter(|value| !value.is_null())
                    .cloned()
            })
            .or_else(|| {
                self.defaults
                    .get(section)
                    .and_then(|data| data.get(key))
                    .filter(|value| !value.is_null())
                    .cloned()
            });

        if let Some(value) = found {
            return Ok(value);
        }

        if key.starts_with('@') {
            return Ok(Value::Null);
        }

        match self.parent_section(section, visited)? {
            Some(parent) => self.lookup(&parent, key, visited),
            None => Ok(Value::Null),
        }
    }

    /// Follow `@inherit_from_section`, failing on cycles
    fn parent_section(&self, section: &str, visited: &mut Vec<String>) -> Result<Option<String>> {
        let parent = match self.lookup(section, INHERIT_KEY, &mut Vec::new())? {
            Value::Null => return Ok(None),
            Value::String(s) => s,
            other => other.to_string(),
        };
        if parent.is_empty() {
            return Ok(None);
        }

        if visited.is_empty() {
            visited.push(section.to_string());
        }
        if visited.iter().any(|seen| *seen == parent) {
            let mut chain = visited.clone();
            chain.push(parent);
            return Err(Error::circular_inheritance(chain));
        }
        visited.push(parent.clone());
        Ok(Some(parent))
    }

    /// Find the descriptor for a parameter, honoring inheritance
    ///
    /// A key that is itself qualified (`Demo.Client.port`) is looked up as
    /// `Client.port`.
    pub fn find_type_info(&self, name: &str) -> Option<Arc<dyn TypeInfo>> {
        let (section, key) = name.split_once('.')?;
        self.type_info_for(section, key, &mut Vec::new())
            .ok()
            .flatten()
    }

    fn type_info_for(
        &self,
        section: &str,
        key: &str,
        visited: &mut Vec<String>,
    ) -> Result<Option<Arc<dyn TypeInfo>>> {
        if let Some((inner_section, inner_key)) = key.split_once('.') {
            return self.type_info_for(inner_section, inner_key, visited);
        }

        // A section is known through its raw data, or through declared defaults.
        let parent = match self.raw_data.get(section) {
            Some(data) if !data.is_empty() => data.get(INHERIT_KEY).cloned(),
            _ => match self.defaults.get(section) {
                Some(data) => data
                    .get(INHERIT_KEY)
                    .and_then(Value::as_str)
                    .map(str::to_string),
                None => return Ok(None),
            },
        };

        if let Some(descriptor) = self.type_infos.get(&format!("{}.{}", section, key)) {
            return Ok(Some(descriptor.clone()));
        }

        match parent {
            Some(parent) if !parent.is_empty() => {
                if visited.is_empty() {
                    visited.push(section.to_string());
                }
                if visited.contains(&parent) {
                    let mut chain = visited.clone();
                    chain.push(parent);
                    return Err(Error::circular_inheritance(chain));
                }
                visited.push(parent.clone());
                self.type_info_for(&parent, key, visited)
            }
            _ => Ok(None),
        }
    }

    /// Evaluate an expression as if it were the value of a parameter in `section`
    pub fn interpolate(&self, text: &str, section: &str) -> Result<String> {
        let mut stack = Vec::new();
        self.interpolate_with(text, section, "", &mut stack)
    }

    fn interpolate_with(
        &self,
        text: &str,
        section: &str,
        parameter: &str,
        stack: &mut Vec<String>,
    ) -> Result<String> {
        let mut resolution = Resolution {
            manager: self,
            section,
            parameter,
            stack,
        };
        StringInterpolator::new(text, section)
            .with_max_depth(self.options.max_depth)
            .evaluate(&mut resolution)
    }

    /// Format a value the way its descriptor stores it
    fn format_for(&self, name: &str, value: &Value) -> String {
        if value.is_null() {
            return String::new();
        }
        match self.find_type_info(name) {
            Some(descriptor) => descriptor.format_value(value),
            None => Descriptor::undeclared(name).format_value(value),
        }
    }

    /// Get a parameter as a string
    pub fn get_string(&self, name: &str) -> Result<String> {
        match self.get(name)? {
            Value::String(s) => Ok(s),
            v @ (Value::Bool(_) | Value::Integer(_) | Value::Float(_)) => Ok(v.to_string()),
            other => Err(Error::type_coercion(name, "string", other.type_name())),
        }
    }

    /// Get a parameter as an integer
    pub fn get_i64(&self, name: &str) -> Result<i64> {
        match self.get(name)? {
            Value::Integer(i) => Ok(i),
            Value::String(s) => s
                .trim()
                .parse()
                .map_err(|_| Error::type_coercion(name, "integer", format!("string \"{}\"", s))),
            other => Err(Error::type_coercion(name, "integer", other.type_name())),
        }
    }

    /// Get a parameter as a float
    pub fn get_f64(&self, name: &str) -> Result<f64> {
        match self.get(name)? {
            Value::Float(f) => Ok(f),
            Value::Integer(i) => Ok(i as f64),
            Value::String(s) => s
                .trim()
                .parse()
                .map_err(|_| Error::type_coercion(name, "float", format!("string \"{}\"", s))),
            other => Err(Error::type_coercion(name, "float", other.type_name())),
        }
    }

    /// Get a parameter as a boolean (strings must be "true" or "false")
    pub fn get_bool(&self, name: &str) -> Result<bool> {
        match self.get(name)? {
            Value::Bool(b) => Ok(b),
            Value::String(s) => match s.trim().to_lowercase().as_str() {
                "true" => Ok(true),
                "false" => Ok(false),
                _ => Err(Error::type_coercion(
                    name,
                    "boolean",
                    format!("string \"{}\" (must be \"true\" or \"false\")", s),
                )),
            },
            other => Err(Error::type_coercion(name, "boolean", other.type_name())),
        }
    }

    /// Get a parameter as a list of strings (strings are split on commas)
    pub fn get_list(&self, name: &str) -> Result<Vec<String>> {
        match self.get(name)? {
            Value::Sequence(items) => Ok(items.iter().map(|v| v.to_string()).collect()),
            Value::String(s) => Ok(s
                .split(',')
                .map(str::trim)
                .filter(|item| !item.is_empty())
                .map(str::to_string)
                .collect()),
            Value::Null => Ok(Vec::new()),
            other => Err(Error::type_coercion(name, "list", other.type_name())),
        }
    }

    // ========================================
    // Writing
    // ========================================

    /// Store a new value for a parameter; `Value::Null` deletes it
    ///
    /// The value is formatted by its descriptor and escaped so that reading it
    /// back yields the same value.
    pub fn set(&mut self, name: &str, value: impl Into<Value>, verify: bool) -> Result<()> {
        let (section, key) = split_name(name)?;
        if section.eq_ignore_ascii_case(ENVIRONMENT_SECTION) {
            return Err(Error::reserved_section(name));
        }

        let descriptor = match self.type_info_for(section, key, &mut Vec::new())? {
            Some(descriptor) => descriptor,
            None => {
                if verify {
                    log::warn!("Setting new value for undefined config parameter {}", name);
                }
                Arc::new(Descriptor::undeclared(name))
            }
        };

        let value = value.into();
        if value.is_null() {
            if let Some(data) = self.raw_data.get_mut(section) {
                data.shift_remove(key);
            }
            return Ok(());
        }

        if verify {
            descriptor.validate(&value)?;
        }

        let text = escape_string(&descriptor.format_value(&value));
        self.raw_data
            .entry(section.to_string())
            .or_default()
            .insert(key.to_string(), text);
        Ok(())
    }

    /// Store a value without validation or escaping
    pub fn set_raw(&mut self, name: &str, value: impl Into<Value>) -> Result<()> {
        let (section, key) = split_name(name)?;
        let text = self.format_for(name, &value.into());
        self.raw_data
            .entry(section.to_string())
            .or_default()
            .insert(key.to_string(), text);
        Ok(())
    }

    /// Set an environment entry: a `Section.key` override or a whole section mapping
    pub fn set_env(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.environment.insert(key.into(), value.into());
    }

    /// Set several environment entries, replacing existing ones
    pub fn update_env<K, V>(&mut self, entries: impl IntoIterator<Item = (K, V)>)
    where
        K: Into<String>,
        V: Into<Value>,
    {
        for (key, value) in entries {
            self.set_env(key, value);
        }
    }

    pub fn get_env(&self, key: &str) -> Option<&Value> {
        self.environment.get(key)
    }

    /// Persist raw data through the primary source
    pub fn write(&mut self) -> Result<()> {
        let raw = self.raw_data.clone();
        match self.source.as_mut() {
            Some(source) => source.save_data(&raw),
            None => Err(Error::write("No primary configuration source")),
        }
    }

    /// Write raw data, merged with the primary source's content, to `sink`
    pub fn write_to(&mut self, sink: &mut dyn Write) -> Result<()> {
        let raw = self.raw_data.clone();
        match self.source.as_mut() {
            Some(source) => source.save_data_to(&raw, sink),
            None => sink
                .write_all(IniSource::render(&raw).as_bytes())
                .map_err(|e| Error::write(e.to_string())),
        }
    }

    // ========================================
    // Validation, sections and help
    // ========================================

    /// Validate declared options matching each parameter or section name
    ///
    /// Returns the errors keyed by option name; never fails as a whole.
    pub fn validate<I, S>(&self, parameters: I) -> IndexMap<String, Error>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut errors = IndexMap::new();
        for parameter in parameters {
            let parameter = parameter.as_ref();
            for descriptor in self.type_infos.iter() {
                let matches = if parameter.contains('.') {
                    descriptor.name() == parameter
                } else {
                    descriptor.section() == parameter
                };
                if !matches {
                    continue;
                }

                let checked = self
                    .get(descriptor.name())
                    .and_then(|value| descriptor.validate(&value));
                if let Err(e) = checked {
                    errors.insert(descriptor.name().to_string(), e);
                }
            }
        }
        errors
    }

    /// Apply the `Section.key` assignments listed in a section
    ///
    /// Keys ending in `!` are copied raw, others are copied as typed values.
    pub fn execute_section(&mut self, section: &str) -> Result<()> {
        let doc = self.get(&format!("{}.__doc__", section))?;
        log::info!(
            "Executing section {}: {}",
            section,
            doc.as_str().unwrap_or_default()
        );

        let keys: Vec<String> = match self.raw_data.get(section) {
            Some(data) => data.keys().filter(|k| k.contains('.')).cloned().collect(),
            None => return Ok(()),
        };

        for key in keys {
            let source_name = format!("{}.{}", section, key);
            match key.strip_suffix('!') {
                Some(target) => {
                    let value = self.get_raw(&source_name)?;
                    self.set_raw(target, value)?;
                }
                None => {
                    let value = self.get(&source_name)?;
                    self.set(&key, value, true)?;
                }
            }
        }
        Ok(())
    }

    /// Sections present in the raw data
    pub fn sections(&self) -> Vec<&str> {
        self.raw_data.keys().map(String::as_str).collect()
    }

    /// The merged raw data of all loaded sources and `set` calls
    pub fn raw_data(&self) -> &RawData {
        &self.raw_data
    }

    /// The primary source, once initialized
    pub fn source(&self) -> Option<&dyn Source> {
        self.source.as_deref()
    }

    /// Help for every declared option with its current value
    pub fn help_text(&self) -> String {
        let mut out = String::new();
        for descriptor in self.type_infos.iter() {
            let value = match self.get(descriptor.name()) {
                Ok(value) if value.is_null() => String::new(),
                Ok(value) => descriptor.format_value(&value),
                Err(e) => format!("<error: {}>", e.summary()),
            };
            out.push_str(&descriptor.help());
            out.push_str(&format!("\n* Value = {}\n\n", value));
        }
        out
    }
}

/// Connects the evaluator to the manager for one `get` call
struct Resolution<'a> {
    manager: &'a ConfigManager,
    section: &'a str,
    parameter: &'a str,
    stack: &'a mut Vec<String>,
}

impl Expander for Resolution<'_> {
    fn reference(&mut self, name: &str) -> Result<String> {
        let value = self.manager.resolve(name, false, true, self.stack)?;
        Ok(self.manager.format_for(name, &value))
    }

    fn filter(&mut self, name: &str, data: &str) -> Result<String> {
        let manager = self.manager;
        let section = self.section;
        let parameter = self.parameter;
        let stack = &mut *self.stack;

        let mut expand = |expression: &str| -> Result<String> {
            manager.interpolate_with(expression, section, parameter, stack)
        };
        let mut ctx = FilterContext::new(parameter, &manager.flags, &mut expand);
        manager.filters.apply(name, data, &mut ctx)
    }
}
