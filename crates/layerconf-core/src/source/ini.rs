//! INI configuration files
//!
//! Follows the classic `RawConfigParser` dialect:
//!
//! ```ini
//! # full line comment
//! [DEFAULT]
//! shared = everywhere
//!
//! [Logging]
//! path = /var/log ; inline comment
//! banner = first line
//!     continued line
//! ```
//!
//! Keys are case-sensitive, `key: value` is accepted too, and `""` stands for
//! an empty value. Keys of `[DEFAULT]` appear in every section that does not
//! override them.

use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use indexmap::IndexMap;
use regex::Regex;

use super::{merge_into, read_source, write_private, RawData, Section, Source};
use crate::error::{Error, Result, SourceLocation};

const DEFAULT_SECTION: &str = "DEFAULT";

static SECTION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\[(?P<header>[^\]]+)\]").expect("valid section regex"));

static OPTION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<option>[^:=\s][^:=]*?)\s*(?P<vi>[:=])\s*(?P<value>.*)$")
        .expect("valid option regex")
});

/// Parsed INI content
#[derive(Debug, Clone, Default, PartialEq)]
struct IniDocument {
    defaults: Section,
    sections: RawData,
}

impl IniDocument {
    fn parse(text: &str, origin: &str) -> Result<Self> {
        // Values are collected as lines and joined once the file is read.
        let mut defaults: IndexLines = IndexLines::new();
        let mut sections: IndexMap<String, IndexLines> = IndexMap::new();
        let mut current: Option<String> = None;
        let mut option: Option<String> = None;

        for (index, line) in text.lines().enumerate() {
            let lineno = index + 1;

            if line.trim().is_empty() || line.starts_with('#') || line.starts_with(';') {
                continue;
            }
            if is_rem_comment(line) {
                continue;
            }

            let first_is_space = line.chars().next().is_some_and(char::is_whitespace);
            if first_is_space && current.is_some() && option.is_some() {
                let value = line.trim();
                if !value.is_empty() {
                    if let (Some(section), Some(key)) = (&current, &option) {
                        let target = if section == DEFAULT_SECTION {
                            &mut defaults
                        } else {
                            sections.entry(section.clone()).or_default()
                        };
                        if let Some(lines) = target.get_mut(key) {
                            lines.push(value.to_string());
                        }
                    }
                }
                continue;
            }

            if let Some(caps) = SECTION_RE.captures(line) {
                let name = caps["header"].to_string();
                if name != DEFAULT_SECTION {
                    sections.entry(name.clone()).or_default();
                }
                current = Some(name);
                option = None;
                continue;
            }

            let Some(section) = &current else {
                return Err(Error::config_format(format!(
                    "File contains no section headers: {:?}",
                    line
                ))
                .with_source_location(location(origin, lineno)));
            };

            let Some(caps) = OPTION_RE.captures(line) else {
                return Err(Error::config_format(format!("Unable to parse line {:?}", line))
                    .with_source_location(location(origin, lineno)));
            };

            let key = caps["option"].trim_end().to_string();
            let value = strip_inline_comment(&caps["value"]);
            let value = if value == "\"\"" { "" } else { value };

            let target = if section == DEFAULT_SECTION {
                &mut defaults
            } else {
                sections.entry(section.clone()).or_default()
            };
            target.insert(key.clone(), vec![value.to_string()]);
            option = Some(key);
        }

        Ok(IniDocument {
            defaults: join_lines(defaults),
            sections: sections
                .into_iter()
                .map(|(name, lines)| (name, join_lines(lines)))
                .collect(),
        })
    }

    /// Section data as seen by readers, with `[DEFAULT]` keys filled in
    fn merged(&self) -> RawData {
        self.sections
            .iter()
            .map(|(name, own)| {
                let mut data = self.defaults.clone();
                for (key, value) in own {
                    data.insert(key.clone(), value.clone());
                }
                (name.clone(), data)
            })
            .collect()
    }

    /// Apply updated values, leaving inherited `[DEFAULT]` values implicit
    fn update(&mut self, raw: &RawData) {
        let mut own = RawData::new();
        for (section, data) in raw {
            let entry = own.entry(section.clone()).or_default();
            for (key, value) in data {
                let overridden = self
                    .sections
                    .get(section)
                    .is_some_and(|s| s.contains_key(key));
                if !overridden && self.defaults.get(key) == Some(value) {
                    continue;
                }
                entry.insert(key.clone(), value.clone());
            }
        }
        merge_into(&mut self.sections, &own);
    }

    fn render(&self) -> String {
        let mut out = String::new();
        if !self.defaults.is_empty() {
            render_section(&mut out, DEFAULT_SECTION, &self.defaults);
        }
        for (name, data) in &self.sections {
            render_section(&mut out, name, data);
        }
        out
    }
}

type IndexLines = IndexMap<String, Vec<String>>;

fn join_lines(lines: IndexLines) -> Section {
    lines
        .into_iter()
        .map(|(key, parts)| (key, parts.join("\n")))
        .collect()
}

fn render_section(out: &mut String, name: &str, data: &Section) {
    out.push_str(&format!("[{}]\n", name));
    for (key, value) in data {
        out.push_str(&format!("{} = {}\n", key, value.replace('\n', "\n\t")));
    }
    out.push('\n');
}

fn is_rem_comment(line: &str) -> bool {
    line.starts_with(['r', 'R'])
        && line
            .split_whitespace()
            .next()
            .is_some_and(|word| word.eq_ignore_ascii_case("rem"))
}

/// Drop a `;` comment, but only when whitespace precedes it
fn strip_inline_comment(value: &str) -> &str {
    let value = match value.find(';') {
        Some(pos) if pos > 0 && value[..pos].ends_with(char::is_whitespace) => &value[..pos],
        _ => value,
    };
    value.trim()
}

fn location(origin: &str, line: usize) -> SourceLocation {
    SourceLocation {
        file: origin.to_string(),
        line: Some(line),
    }
}

/// INI file source
#[derive(Debug, Clone)]
pub struct IniSource {
    path: Option<PathBuf>,
    parsed: bool,
    document: IniDocument,
    data: RawData,
}

impl IniSource {
    /// Load an INI file; a missing or unreadable file yields an empty, unparsed source
    pub fn from_path(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let (parsed, document) = match read_source(&path) {
            Some(text) => (true, IniDocument::parse(&text, &path.display().to_string())?),
            None => (false, IniDocument::default()),
        };
        Ok(Self::build(Some(path), parsed, document))
    }

    /// Parse INI text held in memory
    pub fn from_text(text: &str) -> Result<Self> {
        let document = IniDocument::parse(text, "<string>")?;
        Ok(Self::build(None, true, document))
    }

    /// Parse INI text from a reader
    pub fn from_reader(mut reader: impl Read) -> Result<Self> {
        let mut text = String::new();
        reader
            .read_to_string(&mut text)
            .map_err(|e| Error::io("<reader>", &e))?;
        let document = IniDocument::parse(&text, "<reader>")?;
        Ok(Self::build(None, true, document))
    }

    fn build(path: Option<PathBuf>, parsed: bool, document: IniDocument) -> Self {
        let data = document.merged();
        Self {
            path,
            parsed,
            document,
            data,
        }
    }

    /// Render raw data in INI syntax
    pub fn render(raw: &RawData) -> String {
        IniDocument {
            defaults: Section::new(),
            sections: raw.clone(),
        }
        .render()
    }
}

impl Source for IniSource {
    fn name(&self) -> &str {
        "file"
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

        self.document.update(raw);
        write_private(&path, self.document.render().as_bytes())?;
        self.data = self.document.merged();
        Ok(())
    }

    fn save_data_to(&mut self, raw: &RawData, sink: &mut dyn Write) -> Result<()> {
        self.document.update(raw);
        self.data = self.document.merged();
        sink.write_all(self.document.render().as_bytes())
            .map_err(|e| Error::write(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use pretty_assertions::assert_eq;

    fn parse(text: &str) -> RawData {
        IniSource::from_text(text).unwrap().raw_data().clone()
    }

    #[test]
    fn test_basic_sections() {
        let data = parse("[Logging]\npath = /var/log\nlevel: debug\n\n[Client]\nport=8080\n");
        assert_eq!(data["Logging"]["path"], "/var/log");
        assert_eq!(data["Logging"]["level"], "debug");
        assert_eq!(data["Client"]["port"], "8080");
        let names: Vec<_> = data.keys().collect();
        assert_eq!(names, vec!["Logging", "Client"]);
    }

    #[test]
    fn test_keys_are_case_sensitive() {
        let data = parse("[A]\nKey = 1\nkey = 2\n");
        assert_eq!(data["A"]["Key"], "1");
        assert_eq!(data["A"]["key"], "2");
    }

    #[test]
    fn test_comments() {
        let data = parse(
            "# header\n; also\n[A]\nrem this is skipped\nx = 1 ; trailing\ny = a;b\nREM too\n",
        );
        assert_eq!(data["A"].len(), 2);
        assert_eq!(data["A"]["x"], "1");
        assert_eq!(data["A"]["y"], "a;b");
    }

    #[test]
    fn test_continuation_lines_drop_blank_lines() {
        let data = parse("[A]\nkey = first\n  second\n\n\tthird\nnext = 2\n");
        assert_eq!(data["A"]["key"], "first\nsecond\nthird");
        assert_eq!(data["A"]["next"], "2");
    }

    #[test]
    fn test_empty_quotes() {
        let data = parse("[A]\nempty = \"\"\nblank =\n");
        assert_eq!(data["A"]["empty"], "");
        assert_eq!(data["A"]["blank"], "");
    }

    #[test]
    fn test_duplicate_sections_merge() {
        let data = parse("[A]\nx = 1\n[B]\ny = 2\n[A]\nx = 3\nz = 4\n");
        assert_eq!(data["A"]["x"], "3");
        assert_eq!(data["A"]["z"], "4");
        assert_eq!(data.len(), 2);
    }

    #[test]
    fn test_default_section() {
        let data = parse("[DEFAULT]\nshared = yes\n[A]\nown = 1\n[B]\nshared = no\n");
        assert!(!data.contains_key("DEFAULT"));
        assert_eq!(data["A"]["shared"], "yes");
        assert_eq!(data["B"]["shared"], "no");
    }

    #[test]
    fn test_missing_section_header() {
        let err = IniSource::from_text("key = value\n").unwrap_err();
        assert_eq!(err.kind, ErrorKind::ConfigFormat);
        assert_eq!(err.source_location.unwrap().line, Some(1));
    }

    #[test]
    fn test_bad_line() {
        let err = IniSource::from_text("[A]\nx = 1\nnot an option\n").unwrap_err();
        assert_eq!(err.kind, ErrorKind::ConfigFormat);
        assert_eq!(err.source_location.unwrap().line, Some(3));
    }

    #[test]
    fn test_render_multiline() {
        let mut raw = RawData::new();
        raw.entry("A".into())
            .or_default()
            .insert("k".into(), "one\ntwo".into());
        assert_eq!(IniSource::render(&raw), "[A]\nk = one\n\ttwo\n\n");
        assert_eq!(parse(&IniSource::render(&raw))["A"]["k"], "one\ntwo");
    }

    #[test]
    fn test_save_merges_with_existing_content() {
        let mut source = IniSource::from_text("[DEFAULT]\nd = 1\n[A]\nx = 1\n[B]\ny = 2\n").unwrap();

        let mut raw = RawData::new();
        raw.entry("A".into()).or_default().insert("x".into(), "9".into());
        raw.entry("A".into()).or_default().insert("d".into(), "1".into());
        raw.entry("C".into()).or_default().insert("z".into(), "3".into());

        let mut out = Vec::new();
        source.save_data_to(&raw, &mut out).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "[DEFAULT]\nd = 1\n\n[A]\nx = 9\n\n[B]\ny = 2\n\n[C]\nz = 3\n\n"
        );
        assert_eq!(source.raw_data()["C"]["d"], "1");
    }

    #[test]
    fn test_save_without_path_fails() {
        let mut source = IniSource::from_text("[A]\nx = 1\n").unwrap();
        let err = source.save_data(&RawData::new()).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Write);
    }

    #[test]
    fn test_from_path_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("conf/main.conf");

        let mut source = IniSource::from_path(&path).unwrap();
        assert!(!source.parsed());

        let mut raw = RawData::new();
        raw.entry("A".into()).or_default().insert("x".into(), "1".into());
        source.save_data(&raw).unwrap();

        let reread = IniSource::from_path(&path).unwrap();
        assert!(reread.parsed());
        assert_eq!(reread.raw_data()["A"]["x"], "1");
    }
}
