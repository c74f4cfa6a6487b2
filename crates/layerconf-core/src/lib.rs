//! layerconf-core: Layered configuration with typed options and interpolation
//!
//! This crate provides the core functionality for loading INI and YAML
//! configuration sources, layering them with declared defaults and runtime
//! overrides, and evaluating interpolation expressions on read.
//!
//! # Example
//!
//! ```rust
//! use layerconf_core::{ConfigManager, InitOptions, Value};
//!
//! let ini = "
//! [Client]
//! host = example.com
//! url = https://%(host):%(port)/
//! ";
//!
//! let mut config = ConfigManager::new();
//! config.define_integer("Client.port", 8443, "Port to connect to").unwrap();
//! config.initialize_from_text(ini, InitOptions::default()).unwrap();
//!
//! assert_eq!(config.get("Client.port").unwrap(), Value::Integer(8443));
//! assert_eq!(
//!     config.get_string("Client.url").unwrap(),
//!     "https://example.com:8443/"
//! );
//! ```

pub mod error;
pub mod filter;
pub mod flags;
pub mod interpolation;
pub mod loader;
pub mod source;
pub mod type_info;
pub mod value;

mod config;

pub use config::{
    newline_fixup, ConfigManager, ConfigOptions, InitOptions, ENVIRONMENT_SECTION, INHERIT_KEY,
};
pub use error::{Error, ErrorKind, Result};
pub use filter::{Filter, FilterContext, FilterRegistry};
pub use flags::FlagStore;
pub use loader::{bootstrap, load_config, BootstrapFlags, LoadOptions, Primary};
pub use source::{RawData, Source};
pub use type_info::{Descriptor, Kind, TypeInfo};
pub use value::Value;
