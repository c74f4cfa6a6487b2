//! YAML configuration files
//!
//! The document is a mapping of sections, each a mapping of keys to scalars:
//!
//! ```yaml
//! Logging:
//!   path: /var/log
//!   verbose: true
//! Client:
//!   hosts: [a.example.com, b.example.com]
//! ```
//!
//! Scalars are kept as text; sequences become comma separated lists.

use std::io::Write;
use std::path::{Path, PathBuf};

use super::{merge_into, read_source, write_private, RawData, Section, Source};
use crate::error::{Error, Result, SourceLocation};

/// YAML file source
#[derive(Debug, Clone)]
pub struct YamlSource {
    path: Option<PathBuf>,
    parsed: bool,
    data: RawData,
}

impl YamlSource {
    /// Load a YAML file; a missing or unreadable file yields an empty, unparsed source
    pub fn from_path(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let (parsed, data) = match read_source(&path) {
            Some(text) => {
                let data = parse(&text).map_err(|e| {
                    e.with_source_location(SourceLocation {
                        file: path.display().to_string(),
                        line: None,
                    })
                })?;
                (true, data)
            }
            None => (false, RawData::new()),
        };
        Ok(Self {
            path: Some(path),
            parsed,
            data,
        })
    }

    /// Parse YAML text held in memory
    pub fn from_text(text: &str) -> Result<Self> {
        Ok(Self {
            path: None,
            parsed: true,
            data: parse(text)?,
        })
    }

    fn render(&self) -> Result<String> {
        serde_yaml::to_string(&self.data)
            .map_err(|e| Error::write(format!("Unable to serialize YAML: {}", e)))
    }
}

fn parse(text: &str) -> Result<RawData> {
    let doc: serde_yaml::Value = serde_yaml::from_str(text)
        .map_err(|e| Error::config_format(format!("Invalid YAML: {}", e)))?;

    let sections = match doc {
        serde_yaml::Value::Null => return Ok(RawData::new()),
        serde_yaml::Value::Mapping(m) => m,
        other => {
            return Err(Error::config_format(format!(
                "Expected a mapping of sections, got {}",
                yaml_type(&other)
            )))
        }
    };

    let mut data = RawData::new();
    for (name, body) in sections {
        let name = scalar_text(&name)?;
        let entries = match body {
            serde_yaml::Value::Null => serde_yaml::Mapping::new(),
            serde_yaml::Value::Mapping(m) => m,
            other => {
                return Err(Error::config_format(format!(
                    "Section '{}' must be a mapping, got {}",
                    name,
                    yaml_type(&other)
                )))
            }
        };

        let section: &mut Section = data.entry(name).or_default();
        for (key, value) in entries {
            section.insert(scalar_text(&key)?, value_text(&value)?);
        }
    }
    Ok(data)
}

fn scalar_text(value: &serde_yaml::Value) -> Result<String> {
    match value {
        serde_yaml::Value::Null => Ok(String::new()),
        serde_yaml::Value::Bool(b) => Ok(b.to_string()),
        serde_yaml::Value::Number(n) => Ok(n.to_string()),
        serde_yaml::Value::String(s) => Ok(s.clone()),
        other => Err(Error::config_format(format!(
            "Expected a scalar, got {}",
            yaml_type(other)
        ))),
    }
}

fn value_text(value: &serde_yaml::Value) -> Result<String> {
    match value {
        serde_yaml::Value::Sequence(items) => Ok(items
            .iter()
            .map(scalar_text)
            .collect::<Result<Vec<_>>>()?
            .join(",")),
        other => scalar_text(other),
    }
}

fn yaml_type(value: &serde_yaml::Value) -> &'static str {
    match value {
        serde_yaml::Value::Null => "null",
        serde_yaml::Value::Bool(_) => "boolean",
        serde_yaml::Value::Number(_) => "number",
        serde_yaml::Value::String(_) => "string",
        serde_yaml::Value::Sequence(_) => "sequence",
        serde_yaml::Value::Mapping(_) => "mapping",
        serde_yaml::Value::Tagged(_) => "tagged value",
    }
}

impl Source for YamlSource {
    fn name(&self) -> &str {
        "yaml"
    }

    fn location(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn parsed(&self) -> bool {
        self.parsed
    }

    fn raw_data(&self) -> &RawData {
        &self.data
    }

    fn save_data(&mut self, raw: &RawData) -> Result<()> {
        let Some(path) = self.path.clone() else {
            return Err(Error::write("Unknown filename"));
        };
        log::info!("Writing back configuration to file {}", path.display());

        merge_into(&mut self.data, raw);
        write_private(&path, self.render()?.as_bytes())
    }

    fn save_data_to(&mut self, raw: &RawData, sink: &mut dyn Write) -> Result<()> {
        merge_into(&mut self.data, raw);
        sink.write_all(self.render()?.as_bytes())
            .map_err(|e| Error::write(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_sections() {
        let source = YamlSource::from_text(
            "Logging:\n  path: /var/log\n  verbose: true\n  level: 3\nClient:\n  hosts: [a, b]\nEmpty:\n",
        )
        .unwrap();
        let data = source.raw_data();

        assert_eq!(data["Logging"]["path"], "/var/log");
        assert_eq!(data["Logging"]["verbose"], "true");
        assert_eq!(data["Logging"]["level"], "3");
        assert_eq!(data["Client"]["hosts"], "a,b");
        assert!(data["Empty"].is_empty());
    }

    #[test]
    fn test_empty_document() {
        let source = YamlSource::from_text("").unwrap();
        assert!(source.raw_data().is_empty());
        assert!(source.parsed());
    }

    #[test]
    fn test_rejects_non_mapping_section() {
        let err = YamlSource::from_text("Logging: plain\n").unwrap_err();
        assert_eq!(err.kind, ErrorKind::ConfigFormat);
        assert!(err.to_string().contains("Section 'Logging' must be a mapping"));

        let err = YamlSource::from_text("- a\n- b\n").unwrap_err();
        assert_eq!(err.kind, ErrorKind::ConfigFormat);
    }

    #[test]
    fn test_rejects_nested_mapping_value() {
        let err = YamlSource::from_text("A:\n  k:\n    deep: 1\n").unwrap_err();
        assert_eq!(err.kind, ErrorKind::ConfigFormat);
    }

    #[test]
    fn test_save_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out/config.yaml");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "A:\n  x: '1'\nB:\n  y: '2'\n").unwrap();

        let mut source = YamlSource::from_path(&path).unwrap();
        let mut raw = RawData::new();
        raw.entry("A".into()).or_default().insert("x".into(), "9".into());
        source.save_data(&raw).unwrap();

        let reread = YamlSource::from_path(&path).unwrap();
        assert_eq!(reread.raw_data()["A"]["x"], "9");
        assert_eq!(reread.raw_data()["B"]["y"], "2");
    }
}
