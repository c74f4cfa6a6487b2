//! Loading a configuration from its primary and secondary sources
//!
//! [`load_config`] performs the usual startup sequence on a [`ConfigManager`]:
//! read the primary source, merge secondary sources in order, then execute
//! the component section and any additional sections. [`bootstrap`] drives
//! the same sequence from command line style flags.

use crate::config::{ConfigManager, InitOptions, ENVIRONMENT_SECTION};
use crate::error::{Error, Result};

/// Where the primary configuration comes from
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Primary {
    /// No primary source; only secondaries, defaults and the environment apply
    #[default]
    None,
    /// A path or URL that must exist and parse
    Location(String),
    /// INI text held in memory
    Text(String),
}

/// Options for [`load_config`]
#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    pub primary: Primary,
    /// Merged in order after the primary; entries may be glob patterns
    pub secondary_configs: Vec<String>,
    /// Section executed before `execute_sections`
    pub component_section: Option<String>,
    pub execute_sections: Vec<String>,
    /// Forget previously loaded data and environment first
    pub reset: bool,
}

/// Startup flags as a program would receive them on its command line
#[derive(Debug, Clone, Default)]
pub struct BootstrapFlags {
    /// Primary configuration location
    pub config: Option<String>,
    pub secondary_configs: Vec<String>,
    /// Sections to execute after `Environment.execute_sections`
    pub config_execute: Vec<String>,
    /// Produce the option overview
    pub config_help: bool,
}

/// Load and merge configuration sources, then execute sections
pub fn load_config(manager: &mut ConfigManager, options: &LoadOptions) -> Result<()> {
    if options.reset {
        manager.clear();
    }

    match &options.primary {
        Primary::None => {}
        Primary::Location(location) => manager.initialize(
            location,
            InitOptions {
                reset: true,
                must_exist: true,
            },
        )?,
        Primary::Text(text) => manager.initialize_from_text(text, InitOptions::default())?,
    }

    for pattern in &options.secondary_configs {
        for location in expand_secondary(pattern)? {
            if !manager.load_secondary_config(&location)? {
                log::warn!("Secondary configuration {} was not loaded", location);
            }
        }
    }

    if let Some(section) = options.component_section.as_deref().filter(|s| !s.is_empty()) {
        manager.execute_section(section)?;
    }
    for section in &options.execute_sections {
        manager.execute_section(section)?;
    }
    Ok(())
}

/// Load the configuration named by `flags`
///
/// The component and execute sections are taken from the `Environment`
/// options as set before loading, so the embedding program decides them.
/// Returns the option overview when `config_help` is set.
pub fn bootstrap(manager: &mut ConfigManager, flags: &BootstrapFlags) -> Result<Option<String>> {
    let component = manager.get_string(&format!("{}.component", ENVIRONMENT_SECTION))?;
    let mut execute_sections =
        manager.get_list(&format!("{}.execute_sections", ENVIRONMENT_SECTION))?;
    execute_sections.extend(flags.config_execute.iter().cloned());

    let options = LoadOptions {
        primary: flags
            .config
            .clone()
            .map_or(Primary::None, Primary::Location),
        secondary_configs: flags.secondary_configs.clone(),
        component_section: Some(component),
        execute_sections,
        reset: false,
    };
    load_config(manager, &options)?;

    Ok(flags.config_help.then(|| manager.help_text()))
}

/// Expand a secondary location containing glob metacharacters
///
/// Matching files are returned sorted; a URL keeps its scheme on every match.
pub fn expand_secondary(location: &str) -> Result<Vec<String>> {
    let (prefix, pattern) = match location.split_once("://") {
        Some((scheme, rest)) => (format!("{}://", scheme), rest),
        None => (String::new(), location),
    };

    if !pattern.contains(['*', '?', '[']) {
        return Ok(vec![location.to_string()]);
    }

    let options = glob::MatchOptions {
        case_sensitive: true,
        require_literal_separator: true,
        require_literal_leading_dot: false,
    };
    let entries = glob::glob_with(pattern, options)
        .map_err(|e| Error::config_format(format!("Invalid pattern {}: {}", location, e)))?;

    let mut matches: Vec<String> = entries
        .filter_map(|entry| match entry {
            Ok(path) => Some(path),
            Err(e) => {
                log::warn!("Skipping unreadable match for {}: {}", location, e);
                None
            }
        })
        .filter(|path| path.is_file())
        .map(|path| format!("{}{}", prefix, path.display()))
        .collect();
    matches.sort();

    if matches.is_empty() {
        log::warn!("No configuration files match {}", location);
    }
    Ok(matches)
}
