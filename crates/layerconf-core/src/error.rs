//! Error types for layerconf
//!
//! Errors are structured: a kind, the parameter they relate to, an optional
//! source location, the underlying cause and an actionable help message.

use std::fmt;

/// Result type alias for layerconf operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for layerconf operations
#[derive(Debug, Clone)]
pub struct Error {
    /// The kind of error that occurred
    pub kind: ErrorKind,
    /// Parameter the error relates to (e.g., "Logging.path")
    pub path: Option<String>,
    /// Source location (file, line) if available
    pub source_location: Option<SourceLocation>,
    /// Actionable help message
    pub help: Option<String>,
    /// Underlying cause (as string for Clone compatibility)
    pub cause: Option<String>,
}

/// Location in a configuration source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLocation {
    pub file: String,
    pub line: Option<usize>,
}

/// Categories of errors that can occur
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ErrorKind {
    /// A source or a parameter value could not be parsed
    #[error("Config format error")]
    ConfigFormat,
    /// An interpolation expression has unmatched delimiters
    #[error("Unbalanced expression")]
    UnbalancedExpression,
    /// A filter suffix names a filter nobody registered
    #[error("Unknown filter: {name}")]
    UnknownFilter { name: String },
    /// A filter failed while transforming its argument
    #[error("Filter '{filter}' failed")]
    Filter { filter: String },
    /// A parameter name has no `Section.` prefix
    #[error("Section not specified")]
    MissingSection,
    /// A value was rejected by its type descriptor
    #[error("Invalid value")]
    TypeValue,
    /// Attempt to write into the read-only Environment section
    #[error("Reserved section")]
    ReservedSection,
    /// Parameter references form a cycle
    #[error("Circular reference detected")]
    CircularReference,
    /// `@inherit_from_section` links form a cycle
    #[error("Circular section inheritance detected")]
    CircularInheritance,
    /// Expression nesting or reference chains exceed the configured depth
    #[error("Recursion limit exceeded")]
    RecursionLimit,
    /// Type coercion failed
    #[error("Type coercion failed")]
    TypeCoercion,
    /// I/O error (file not found, etc.)
    #[error("I/O error")]
    Io,
    /// Persisting configuration failed
    #[error("Write error")]
    Write,
}

impl Error {
    fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            path: None,
            source_location: None,
            help: None,
            cause: None,
        }
    }

    /// Create a config format error
    pub fn config_format(message: impl Into<String>) -> Self {
        Self {
            cause: Some(message.into()),
            ..Self::new(ErrorKind::ConfigFormat)
        }
    }

    /// Wrap an error raised while evaluating a parameter as a format error
    pub fn while_parsing(name: impl Into<String>, inner: Error) -> Self {
        let name = name.into();
        Self {
            path: Some(name.clone()),
            help: inner.help.clone(),
            cause: Some(format!("While parsing {}: {}", name, inner.summary())),
            ..Self::new(ErrorKind::ConfigFormat)
        }
    }

    /// Create an unbalanced expression error
    pub fn unbalanced(message: impl Into<String>) -> Self {
        Self {
            help: Some("Escape literal parentheses and braces with a backslash".into()),
            cause: Some(message.into()),
            ..Self::new(ErrorKind::UnbalancedExpression)
        }
    }

    /// Create an unknown filter error
    pub fn unknown_filter(name: impl Into<String>) -> Self {
        let n = name.into();
        Self {
            help: Some(format!("Register the '{}' filter or check for typos", n)),
            ..Self::new(ErrorKind::UnknownFilter { name: n })
        }
    }

    /// Create a filter failure error
    pub fn filter(filter: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            cause: Some(message.into()),
            ..Self::new(ErrorKind::Filter {
                filter: filter.into(),
            })
        }
    }

    /// Create a missing section error
    pub fn missing_section(name: impl Into<String>) -> Self {
        let n = name.into();
        Self {
            help: Some(format!("Use the form 'Section.{}'", n)),
            path: Some(n),
            ..Self::new(ErrorKind::MissingSection)
        }
    }

    /// Create a type value error
    pub fn type_value(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: Some(path.into()),
            cause: Some(message.into()),
            ..Self::new(ErrorKind::TypeValue)
        }
    }

    /// Create a reserved section error
    pub fn reserved_section(path: impl Into<String>) -> Self {
        Self {
            path: Some(path.into()),
            help: Some("Use set_env for setting environment values".into()),
            ..Self::new(ErrorKind::ReservedSection)
        }
    }

    /// Create a circular reference error
    pub fn circular_reference(path: impl Into<String>, chain: Vec<String>) -> Self {
        let chain_str = chain.join(" → ");
        Self {
            path: Some(path.into()),
            help: Some("Break the circular dependency by removing one of the references".into()),
            cause: Some(format!("Chain: {}", chain_str)),
            ..Self::new(ErrorKind::CircularReference)
        }
    }

    /// Create a circular inheritance error
    pub fn circular_inheritance(chain: Vec<String>) -> Self {
        Self {
            help: Some("Remove one of the @inherit_from_section links".into()),
            cause: Some(format!("Sections: {}", chain.join(" → "))),
            ..Self::new(ErrorKind::CircularInheritance)
        }
    }

    /// Create a recursion limit error
    pub fn recursion_limit(limit: usize) -> Self {
        Self {
            help: Some("Reduce nesting or raise ConfigOptions::max_depth".into()),
            cause: Some(format!("Maximum depth is {}", limit)),
            ..Self::new(ErrorKind::RecursionLimit)
        }
    }

    /// Create a type coercion error
    pub fn type_coercion(
        path: impl Into<String>,
        expected: impl Into<String>,
        got: impl Into<String>,
    ) -> Self {
        Self {
            path: Some(path.into()),
            help: Some(format!(
                "Ensure the value can be converted to {}",
                expected.into()
            )),
            cause: Some(format!("Got: {}", got.into())),
            ..Self::new(ErrorKind::TypeCoercion)
        }
    }

    /// Create an I/O error
    pub fn io(location: impl Into<String>, err: &std::io::Error) -> Self {
        Self {
            cause: Some(format!("{}: {}", location.into(), err)),
            ..Self::new(ErrorKind::Io)
        }
    }

    /// Create a write error
    pub fn write(message: impl Into<String>) -> Self {
        Self {
            cause: Some(message.into()),
            ..Self::new(ErrorKind::Write)
        }
    }

    /// Add path context to the error
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Add source location to the error
    pub fn with_source_location(mut self, loc: SourceLocation) -> Self {
        self.source_location = Some(loc);
        self
    }

    /// Add help message to the error
    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(help.into());
        self
    }

    /// One-line description: the kind followed by the cause, if any
    pub fn summary(&self) -> String {
        match &self.cause {
            Some(cause) => format!("{}: {}", self.kind, cause),
            None => self.kind.to_string(),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)?;

        if let Some(path) = &self.path {
            write!(f, "\n  Path: {}", path)?;
        }

        if let Some(loc) = &self.source_location {
            write!(f, "\n  File: {}", loc.file)?;
            if let Some(line) = loc.line {
                write!(f, ":{}", line)?;
            }
        }

        if let Some(cause) = &self.cause {
            write!(f, "\n  {}", cause)?;
        }

        if let Some(help) = &self.help {
            write!(f, "\n  Help: {}", help)?;
        }

        Ok(())
    }
}

impl std::error::Error for Error {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_circular_reference_error_display() {
        let err = Error::circular_reference(
            "A.a",
            vec!["A.a".into(), "A.b".into(), "A.a".into()],
        );
        let display = format!("{}", err);

        assert!(display.contains("Circular reference detected"));
        assert!(display.contains("A.a → A.b → A.a"));
        assert!(display.contains("Path: A.a"));
    }

    #[test]
    fn test_unknown_filter_error() {
        let err = Error::unknown_filter("rot13");
        let display = format!("{}", err);

        assert!(display.contains("Unknown filter: rot13"));
        assert!(display.contains("Register the 'rot13' filter"));
    }

    #[test]
    fn test_while_parsing_wraps_inner_error() {
        let inner = Error::unbalanced("Can not expand 'abc)'");
        let err = Error::while_parsing("Section.key", inner);

        assert_eq!(err.kind, ErrorKind::ConfigFormat);
        assert_eq!(err.path.as_deref(), Some("Section.key"));
        let display = format!("{}", err);
        assert!(display.contains("While parsing Section.key: Unbalanced expression"));
        assert!(display.contains("Can not expand 'abc)'"));
    }

    #[test]
    fn test_missing_section_error() {
        let err = Error::missing_section("port");

        assert_eq!(err.kind, ErrorKind::MissingSection);
        assert_eq!(err.path, Some("port".into()));
        assert!(format!("{}", err).contains("Section.port"));
    }

    #[test]
    fn test_with_source_location() {
        let err = Error::config_format("bad line").with_source_location(SourceLocation {
            file: "server.conf".into(),
            line: Some(42),
        });
        let display = format!("{}", err);

        assert!(display.contains("server.conf:42"));
    }

    #[test]
    fn test_with_help() {
        let err = Error::config_format("bad input").with_help("Try fixing the syntax");
        let display = format!("{}", err);

        assert!(display.contains("Help: Try fixing the syntax"));
    }

    #[test]
    fn test_type_coercion_error() {
        let err = Error::type_coercion("Server.port", "integer", "string");
        let display = format!("{}", err);

        assert!(display.contains("Type coercion failed"));
        assert!(display.contains("Path: Server.port"));
        assert!(display.contains("Got: string"));
    }

    #[test]
    fn test_summary_without_cause() {
        let err = Error::reserved_section("Environment.x");
        assert_eq!(err.summary(), "Reserved section");
    }
}
