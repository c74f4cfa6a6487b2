//! layerconf CLI - Command-line inspector for layered configurations
//!
//! Usage:
//!   layerconf --config app.conf get Client.port
//!   layerconf --config app.conf --secondary-config 'conf.d/*.conf' dump --resolve
//!   layerconf --config app.conf --config-execute Debug validate Client Logging
//!   layerconf check app.conf site.yaml

use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use indexmap::IndexMap;
use layerconf_core::source::{self, IniSource, RawData};
use layerconf_core::{bootstrap, BootstrapFlags, ConfigManager, FlagStore, Value};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::Level;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// layerconf - Layered configuration with typed options and interpolation
#[derive(Parser)]
#[command(name = "layerconf")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Debug, Clone, Default)]
struct GlobalArgs {
    /// Primary configuration file or URL
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Additional configuration merged after the primary (glob patterns allowed)
    #[arg(short, long = "secondary-config", global = true)]
    secondary_config: Vec<String>,

    /// Section to execute after loading
    #[arg(short = 'x', long, global = true)]
    config_execute: Vec<String>,

    /// Flag value visible to the `flags` filter
    #[arg(long = "flag", value_name = "NAME=VALUE", global = true)]
    flags: Vec<String>,

    /// Enable verbose logging (sets log level to DEBUG)
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Get the value of a parameter
    Get {
        /// Parameter name (e.g., Client.port)
        name: String,

        /// Show the stored text without interpolation
        #[arg(short, long)]
        raw: bool,

        /// Validate the value against its declaration
        #[arg(long)]
        verify: bool,

        /// Output format: text, json
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Export the merged configuration
    Dump {
        /// Evaluate every value instead of showing stored text
        #[arg(short, long)]
        resolve: bool,

        /// Output format: ini, json, yaml
        #[arg(short, long, default_value = "ini")]
        format: String,
    },

    /// List the sections of the merged configuration
    Sections,

    /// Validate declared options of sections or single parameters
    Validate {
        /// Section names or Section.key parameters
        #[arg(required = true)]
        targets: Vec<String>,
    },

    /// Quick syntax check of configuration files
    Check {
        /// Configuration file(s) to check
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Describe every declared option with its current value
    Describe,
}

/// Run the CLI with the process arguments
pub fn run() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.global.verbose);

    match cli.command {
        Commands::Get {
            name,
            raw,
            verify,
            format,
        } => cmd_get(&cli.global, &name, raw, verify, &format),
        Commands::Dump { resolve, format } => cmd_dump(&cli.global, resolve, &format),
        Commands::Sections => cmd_sections(&cli.global),
        Commands::Validate { targets } => cmd_validate(&cli.global, &targets),
        Commands::Check { files } => cmd_check(files),
        Commands::Describe => cmd_describe(&cli.global),
    }
}

fn init_logging(verbose: bool) {
    // RUST_LOG in the environment always takes precedence; --verbose falls back to DEBUG.
    let level = if verbose { Level::DEBUG } else { Level::WARN };
    let filter = EnvFilter::from_default_env().add_directive(level.into());
    let _ = tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .try_init();
}

fn load_manager(global: &GlobalArgs) -> Result<ConfigManager, String> {
    let mut flags = FlagStore::new();
    for assignment in &global.flags {
        flags
            .set_assignment(assignment)
            .map_err(|e| format!("Invalid --flag: {}", e.summary()))?;
    }

    let mut manager = ConfigManager::new();
    manager.set_flags(flags);

    let bootstrap_flags = BootstrapFlags {
        config: global.config.clone(),
        secondary_configs: global.secondary_config.clone(),
        config_execute: global.config_execute.clone(),
        config_help: false,
    };
    bootstrap(&mut manager, &bootstrap_flags)
        .map_err(|e| format!("Failed to load configuration:\n{}", e))?;

    tracing::debug!(sections = manager.sections().len(), "configuration loaded");
    Ok(manager)
}

/// Load the configuration or exit with the load failure code
macro_rules! load_or_exit {
    ($global:expr) => {
        match load_manager($global) {
            Ok(manager) => manager,
            Err(e) => {
                eprintln!("{}", e.red());
                return ExitCode::from(2);
            }
        }
    };
}

fn cmd_get(global: &GlobalArgs, name: &str, raw: bool, verify: bool, format: &str) -> ExitCode {
    let manager = load_or_exit!(global);

    match render_get(&manager, name, raw, verify, format) {
        Ok(content) => {
            println!("{}", content);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("{}: {}", "Error".red(), e);
            ExitCode::from(1)
        }
    }
}

fn render_get(
    manager: &ConfigManager,
    name: &str,
    raw: bool,
    verify: bool,
    format: &str,
) -> Result<String, String> {
    let value = if raw {
        manager.get_raw(name)
    } else {
        manager.get_with(name, verify, true)
    }
    .map_err(|e| e.to_string())?;

    if value.is_null() {
        return Err(format!("Parameter '{}' is not set", name));
    }

    match format {
        "json" => serde_json::to_string_pretty(&value).map_err(|e| e.to_string()),
        "text" => Ok(match &value {
            Value::Sequence(items) => items
                .iter()
                .map(|item| item.to_string())
                .collect::<Vec<_>>()
                .join(","),
            other => other.to_string(),
        }),
        other => Err(format!("Unsupported format: {}. Use text or json.", other)),
    }
}

fn cmd_dump(global: &GlobalArgs, resolve: bool, format: &str) -> ExitCode {
    let mut manager = load_or_exit!(global);

    match render_dump(&mut manager, resolve, format) {
        Ok(content) => {
            print!("{}", content);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("{}: {}", "Error".red(), e);
            ExitCode::from(1)
        }
    }
}

fn render_dump(manager: &mut ConfigManager, resolve: bool, format: &str) -> Result<String, String> {
    if !resolve {
        return match format {
            "ini" => {
                let mut out = Vec::new();
                manager.write_to(&mut out).map_err(|e| e.to_string())?;
                String::from_utf8(out).map_err(|e| e.to_string())
            }
            "json" => serde_json::to_string_pretty(manager.raw_data())
                .map(|json| json + "\n")
                .map_err(|e| e.to_string()),
            "yaml" => serde_yaml::to_string(manager.raw_data()).map_err(|e| e.to_string()),
            other => Err(unsupported_dump_format(other)),
        };
    }

    let resolved = resolve_all(manager)?;
    match format {
        "ini" => {
            let mut raw = RawData::new();
            for (section, values) in &resolved {
                let entry = raw.entry(section.clone()).or_default();
                for (key, value) in values {
                    let name = format!("{}.{}", section, key);
                    let text = match manager.find_type_info(&name) {
                        Some(descriptor) => descriptor.format_value(value),
                        None => value.to_string(),
                    };
                    entry.insert(key.clone(), text);
                }
            }
            Ok(IniSource::render(&raw))
        }
        "json" => serde_json::to_string_pretty(&resolved)
            .map(|json| json + "\n")
            .map_err(|e| e.to_string()),
        "yaml" => serde_yaml::to_string(&resolved).map_err(|e| e.to_string()),
        other => Err(unsupported_dump_format(other)),
    }
}

fn unsupported_dump_format(format: &str) -> String {
    format!("Unsupported format: {}. Use ini, json, or yaml.", format)
}

/// Evaluate every raw parameter, stopping at the first error
fn resolve_all(manager: &ConfigManager) -> Result<IndexMap<String, IndexMap<String, Value>>, String> {
    let mut resolved = IndexMap::new();
    for (section, data) in manager.raw_data() {
        let mut values = IndexMap::new();
        for key in data.keys() {
            let name = format!("{}.{}", section, key);
            let value = manager.get(&name).map_err(|e| e.to_string())?;
            values.insert(key.clone(), value);
        }
        resolved.insert(section.clone(), values);
    }
    Ok(resolved)
}

fn cmd_sections(global: &GlobalArgs) -> ExitCode {
    let manager = load_or_exit!(global);
    for section in manager.sections() {
        println!("{}", section);
    }
    ExitCode::SUCCESS
}

fn cmd_validate(global: &GlobalArgs, targets: &[String]) -> ExitCode {
    let manager = load_or_exit!(global);
    let errors = manager.validate(targets);

    if errors.is_empty() {
        println!("{} {} is valid", "✓".green(), targets.join(", "));
        return ExitCode::SUCCESS;
    }

    eprintln!("{} Validation failed\n", "✗".red());
    for (name, error) in &errors {
        eprintln!("{}: {}", name.bold(), error.summary());
    }
    ExitCode::from(1)
}

fn cmd_check(files: Vec<PathBuf>) -> ExitCode {
    let mut all_valid = true;

    for file in files {
        match check_file(&file) {
            Ok(kind) => println!("{} {}: valid {}", "✓".green(), file.display(), kind),
            Err(e) => {
                eprintln!("{} {}: {}", "✗".red(), file.display(), e);
                all_valid = false;
            }
        }
    }

    if all_valid {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(1)
    }
}

/// Parse one file with the source its name selects; returns the format name
fn check_file(file: &std::path::Path) -> Result<&'static str, String> {
    if let Err(e) = std::fs::metadata(file) {
        return Err(e.to_string());
    }

    let kind = source::SourceKind::for_path(file);
    let loaded = kind.load(file).map_err(|e| e.to_string())?;
    if !loaded.parsed() {
        return Err("unreadable".to_string());
    }

    Ok(match kind {
        source::SourceKind::Ini => "INI",
        source::SourceKind::Yaml => "YAML",
    })
}

fn cmd_describe(global: &GlobalArgs) -> ExitCode {
    let manager = load_or_exit!(global);
    println!("Configuration overview.\n");
    print!("{}", manager.help_text());
    ExitCode::SUCCESS
}
