//! Type descriptors for configuration options
//!
//! A descriptor declares one `Section.key` option: its default, how its values
//! are validated, and how they are encoded to and decoded from the textual
//! form stored in configuration sources.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::value::Value;

/// Contract every option descriptor implements
///
/// Applications can register their own descriptors next to the built-in
/// [`Descriptor`] kinds.
pub trait TypeInfo: Send + Sync + fmt::Debug {
    /// Full parameter name, `Section.key`
    fn name(&self) -> &str;

    /// Short name of the value type (e.g., "integer")
    fn type_name(&self) -> &str;

    /// Human readable description
    fn description(&self) -> &str {
        ""
    }

    /// Value used when no layer provides one
    fn default_value(&self) -> Value;

    /// Check that a value is acceptable for this option
    fn validate(&self, value: &Value) -> Result<()>;

    /// Encode a value into its configuration text form
    fn format_value(&self, value: &Value) -> String;

    /// Decode configuration text into a typed value
    fn parse_value(&self, text: &str) -> Result<Value>;

    /// Section part of the name
    fn section(&self) -> &str {
        self.name().split_once('.').map_or("", |(section, _)| section)
    }

    /// Help entry shown in the option catalog
    fn help(&self) -> String {
        let mut out = format!("* {} ({})", self.name(), self.type_name());
        if !self.description().is_empty() {
            out.push_str(&format!("\n  {}", self.description()));
        }
        out.push_str(&format!(
            "\n  Default: {}",
            self.format_value(&self.default_value())
        ));
        out
    }
}

/// Value kinds supported by [`Descriptor`]
#[derive(Debug, Clone, PartialEq)]
pub enum Kind {
    Bool,
    Integer,
    Float,
    String,
    /// Comma separated list of strings
    List,
    /// String restricted to a fixed set of choices
    Choice(Vec<String>),
}

/// Built-in option descriptor
#[derive(Debug, Clone)]
pub struct Descriptor {
    name: String,
    description: String,
    default: Value,
    kind: Kind,
}

impl Descriptor {
    /// Create a descriptor of the given kind
    pub fn new(
        name: impl Into<String>,
        kind: Kind,
        default: impl Into<Value>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            default: default.into(),
            kind,
        }
    }

    pub fn bool(name: impl Into<String>, default: bool, description: impl Into<String>) -> Self {
        Self::new(name, Kind::Bool, default, description)
    }

    pub fn integer(name: impl Into<String>, default: i64, description: impl Into<String>) -> Self {
        Self::new(name, Kind::Integer, default, description)
    }

    pub fn float(name: impl Into<String>, default: f64, description: impl Into<String>) -> Self {
        Self::new(name, Kind::Float, default, description)
    }

    pub fn string(
        name: impl Into<String>,
        default: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self::new(name, Kind::String, default.into(), description)
    }

    pub fn list<S: Into<String>>(
        name: impl Into<String>,
        default: Vec<S>,
        description: impl Into<String>,
    ) -> Self {
        let items: Vec<Value> = default.into_iter().map(|s| Value::String(s.into())).collect();
        Self::new(name, Kind::List, Value::Sequence(items), description)
    }

    pub fn choice<S: Into<String>>(
        name: impl Into<String>,
        default: impl Into<String>,
        choices: Vec<S>,
        description: impl Into<String>,
    ) -> Self {
        let choices = choices.into_iter().map(Into::into).collect();
        Self::new(name, Kind::Choice(choices), default.into(), description)
    }

    /// Descriptor assumed for parameters nobody declared
    pub fn undeclared(name: impl Into<String>) -> Self {
        Self::new(name, Kind::String, "", "")
    }

    pub fn kind(&self) -> &Kind {
        &self.kind
    }

    fn invalid(&self, value: &Value) -> Error {
        Error::type_value(
            &self.name,
            format!("Expected {}, got {} '{}'", self.type_name(), value.type_name(), value),
        )
    }
}

fn parse_bool(text: &str) -> Option<bool> {
    let text = text.trim();
    if text.eq_ignore_ascii_case("true") {
        Some(true)
    } else if text.eq_ignore_ascii_case("false") {
        Some(false)
    } else {
        None
    }
}

fn split_list(text: &str) -> Vec<Value> {
    text.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(|item| Value::String(item.to_string()))
        .collect()
}

impl TypeInfo for Descriptor {
    fn name(&self) -> &str {
        &self.name
    }

    fn type_name(&self) -> &str {
        match self.kind {
            Kind::Bool => "bool",
            Kind::Integer => "integer",
            Kind::Float => "float",
            Kind::String => "string",
            Kind::List => "list",
            Kind::Choice(_) => "choice",
        }
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn default_value(&self) -> Value {
        self.default.clone()
    }

    fn validate(&self, value: &Value) -> Result<()> {
        // An absent value is never invalid, only missing.
        if value.is_null() {
            return Ok(());
        }

        let ok = match (&self.kind, value) {
            (Kind::Bool, Value::Bool(_)) => true,
            (Kind::Bool, Value::String(s)) => parse_bool(s).is_some(),
            (Kind::Integer, Value::Integer(_)) => true,
            (Kind::Integer, Value::String(s)) => s.trim().parse::<i64>().is_ok(),
            (Kind::Float, Value::Float(_) | Value::Integer(_)) => true,
            (Kind::Float, Value::String(s)) => s.trim().parse::<f64>().is_ok(),
            (Kind::String, Value::String(_)) => true,
            (Kind::List, Value::String(_)) => true,
            (Kind::List, Value::Sequence(items)) => items.iter().all(is_list_item),
            (Kind::Choice(choices), Value::String(s)) => {
                if !choices.iter().any(|c| c == s) {
                    return Err(Error::type_value(
                        &self.name,
                        format!("'{}' is not one of: {}", s, choices.join(", ")),
                    ));
                }
                true
            }
            _ => false,
        };

        if ok {
            Ok(())
        } else {
            Err(self.invalid(value))
        }
    }

    fn format_value(&self, value: &Value) -> String {
        match (&self.kind, value) {
            (_, Value::Null) => String::new(),
            (Kind::List, Value::Sequence(items)) => items
                .iter()
                .map(|item| item.to_string())
                .collect::<Vec<_>>()
                .join(","),
            (_, other) => other.to_string(),
        }
    }

    fn parse_value(&self, text: &str) -> Result<Value> {
        match &self.kind {
            Kind::Bool => parse_bool(text)
                .map(Value::Bool)
                .ok_or_else(|| self.invalid(&Value::String(text.to_string()))),
            Kind::Integer => text
                .trim()
                .parse::<i64>()
                .map(Value::Integer)
                .map_err(|_| self.invalid(&Value::String(text.to_string()))),
            Kind::Float => text
                .trim()
                .parse::<f64>()
                .map(Value::Float)
                .map_err(|_| self.invalid(&Value::String(text.to_string()))),
            Kind::String | Kind::Choice(_) => Ok(Value::String(text.to_string())),
            Kind::List => Ok(Value::Sequence(split_list(text))),
        }
    }

    fn help(&self) -> String {
        let mut out = format!("* {} ({})", self.name, self.type_name());
        if !self.description.is_empty() {
            out.push_str(&format!("\n  {}", self.description));
        }
        if let Kind::Choice(choices) = &self.kind {
            out.push_str(&format!("\n  Choices: {}", choices.join(", ")));
        }
        out.push_str(&format!("\n  Default: {}", self.format_value(&self.default)));
        out
    }
}

/// Whether an item survives the comma-joined list encoding unchanged
fn is_list_item(item: &Value) -> bool {
    match item {
        Value::String(s) => !s.is_empty() && !s.contains(',') && s.trim() == s,
        _ => false,
    }
}

/// Catalog of option descriptors, iterated in name order
#[derive(Debug, Clone, Default)]
pub struct TypeInfoSet {
    descriptors: BTreeMap<String, Arc<dyn TypeInfo>>,
}

impl TypeInfoSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a descriptor, replacing any previous one with the same name
    pub fn append(&mut self, descriptor: Arc<dyn TypeInfo>) {
        self.descriptors
            .insert(descriptor.name().to_string(), descriptor);
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn TypeInfo>> {
        self.descriptors.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.descriptors.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn TypeInfo>> {
        self.descriptors.values()
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_bool_codec() {
        let d = Descriptor::bool("Client.verbose", false, "Verbose output");
        assert_eq!(d.parse_value("TRUE").unwrap(), Value::Bool(true));
        assert_eq!(d.parse_value(" false ").unwrap(), Value::Bool(false));
        assert!(d.parse_value("yes").is_err());
        assert_eq!(d.format_value(&Value::Bool(true)), "true");
    }

    #[test]
    fn test_integer_validate() {
        let d = Descriptor::integer("Server.port", 8080, "");
        assert!(d.validate(&Value::Integer(1)).is_ok());
        assert!(d.validate(&Value::String("12".into())).is_ok());
        let err = d.validate(&Value::String("twelve".into())).unwrap_err();
        assert_eq!(err.kind, crate::error::ErrorKind::TypeValue);
        assert_eq!(err.path.as_deref(), Some("Server.port"));
    }

    #[test]
    fn test_float_accepts_integer() {
        let d = Descriptor::float("Server.ratio", 0.5, "");
        assert!(d.validate(&Value::Integer(2)).is_ok());
        assert_eq!(d.parse_value("2.25").unwrap(), Value::Float(2.25));
    }

    #[test]
    fn test_list_codec() {
        let d = Descriptor::list("Client.hosts", vec!["a"], "");
        assert_eq!(
            d.parse_value("a, b,,c ").unwrap(),
            Value::from(vec!["a", "b", "c"])
        );
        assert_eq!(d.format_value(&Value::from(vec!["x", "y"])), "x,y");
        assert_eq!(d.parse_value("").unwrap(), Value::Sequence(vec![]));
    }

    #[test]
    fn test_list_rejects_unrepresentable_items() {
        let d = Descriptor::list("Client.hosts", Vec::<String>::new(), "");
        assert!(d.validate(&Value::from(vec!["a", "b.example.com"])).is_ok());

        for bad in [
            Value::from(vec!["a,b"]),
            Value::from(vec![" c"]),
            Value::from(vec!["d "]),
            Value::from(vec![""]),
            Value::from(vec![1i64, 2]),
        ] {
            let err = d.validate(&bad).unwrap_err();
            assert_eq!(err.kind, crate::error::ErrorKind::TypeValue);
        }
    }

    #[test]
    fn test_choice_validate() {
        let d = Descriptor::choice("Logging.level", "info", vec!["debug", "info"], "");
        assert!(d.validate(&Value::from("debug")).is_ok());
        let err = d.validate(&Value::from("loud")).unwrap_err();
        assert!(err.to_string().contains("not one of: debug, info"));
    }

    #[test]
    fn test_null_formats_empty_and_validates() {
        let d = Descriptor::string("A.b", "", "");
        assert_eq!(d.format_value(&Value::Null), "");
        assert!(d.validate(&Value::Null).is_ok());
        assert!(d.validate(&Value::Integer(3)).is_err());
    }

    #[test]
    fn test_section() {
        let d = Descriptor::string("Logging.path", "/tmp", "");
        assert_eq!(d.section(), "Logging");
    }

    #[test]
    fn test_help_lists_default_and_choices() {
        let d = Descriptor::choice("Logging.level", "info", vec!["debug", "info"], "Log level");
        assert_eq!(
            d.help(),
            "* Logging.level (choice)\n  Log level\n  Choices: debug, info\n  Default: info"
        );
    }

    #[test]
    fn test_set_is_sorted_by_name() {
        let mut set = TypeInfoSet::new();
        set.append(Arc::new(Descriptor::string("Z.a", "", "")));
        set.append(Arc::new(Descriptor::string("A.z", "", "")));
        set.append(Arc::new(Descriptor::string("M.m", "", "")));
        let names: Vec<_> = set.iter().map(|d| d.name().to_string()).collect();
        assert_eq!(names, vec!["A.z", "M.m", "Z.a"]);
        assert!(set.contains("M.m"));
        assert_eq!(set.len(), 3);
    }
}
