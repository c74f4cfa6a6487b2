//! Configuration sources
//!
//! A source turns an external medium into ordered `section -> key -> text`
//! data and can persist updated data back to that medium. Sources are chosen
//! from a location string:
//!
//! - `file://path` or a bare path: INI file (`.yaml`/`.yml` paths use YAML)
//! - `yaml://path`: YAML file
//! - any other scheme: loaded as INI if the whole string names a readable file

use std::fmt;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;

use crate::error::{Error, Result};

mod ini;
mod yaml;

pub use ini::IniSource;
pub use yaml::YamlSource;

/// Ordered keys of one section
pub type Section = IndexMap<String, String>;

/// Ordered sections of raw configuration text
pub type RawData = IndexMap<String, Section>;

/// A medium configuration data is read from and written back to
pub trait Source: fmt::Debug {
    /// Scheme name of this source kind (e.g., "file")
    fn name(&self) -> &str;

    /// Backing file, if any
    fn location(&self) -> Option<&Path>;

    /// False when the medium did not exist or could not be read
    fn parsed(&self) -> bool;

    /// Data read from the medium
    fn raw_data(&self) -> &RawData;

    /// Merge `raw` into the medium's content and persist it
    fn save_data(&mut self, raw: &RawData) -> Result<()>;

    /// Merge `raw` into the medium's content and write it to `sink`
    fn save_data_to(&mut self, raw: &RawData, sink: &mut dyn Write) -> Result<()>;
}

/// Formats supported by the built-in sources
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Ini,
    Yaml,
}

impl SourceKind {
    /// Pick a format from a file extension; anything but YAML is INI
    pub fn for_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some("yaml") | Some("yml") => SourceKind::Yaml,
            _ => SourceKind::Ini,
        }
    }

    /// Pick a format from a URL scheme
    pub fn for_scheme(scheme: &str) -> Option<Self> {
        match scheme {
            "file" => Some(SourceKind::Ini),
            "yaml" => Some(SourceKind::Yaml),
            _ => None,
        }
    }

    /// Load a file in this format
    pub fn load(self, path: impl Into<PathBuf>) -> Result<Box<dyn Source>> {
        Ok(match self {
            SourceKind::Ini => Box::new(IniSource::from_path(path)?),
            SourceKind::Yaml => Box::new(YamlSource::from_path(path)?),
        })
    }
}

/// Resolve a location string to a loaded source
///
/// Returns `Ok(None)` when no source kind claims the location.
pub fn open(location: &str) -> Result<Option<Box<dyn Source>>> {
    // Single letter schemes are Windows drive letters, not URLs.
    let scheme = match url::Url::parse(location) {
        Ok(url) if url.scheme().len() > 1 => Some(url.scheme().to_string()),
        _ => None,
    };

    match scheme {
        None => {
            let path = Path::new(location);
            SourceKind::for_path(path).load(path).map(Some)
        }
        Some(scheme) => match SourceKind::for_scheme(&scheme) {
            Some(kind) => {
                let path = location
                    .split_once("://")
                    .map_or(location, |(_, rest)| rest);
                kind.load(path).map(Some)
            }
            None if std::fs::File::open(location).is_ok() => {
                SourceKind::Ini.load(location).map(Some)
            }
            None => {
                log::warn!("No configuration source handles '{}'", location);
                Ok(None)
            }
        },
    }
}

/// Overlay `raw` onto `base`, section by section
pub fn merge_into(base: &mut RawData, raw: &RawData) {
    for (section, data) in raw {
        let target = base.entry(section.clone()).or_default();
        for (key, value) in data {
            target.insert(key.clone(), value.clone());
        }
    }
}

/// Write `contents` to `path` readable and writable by the owner only
///
/// Missing parent directories are created first.
pub(crate) fn write_private(path: &Path, contents: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| {
            Error::write(format!("Unable to create {}: {}", parent.display(), e))
        })?;
    }

    let mut options = OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    let mut file = options
        .open(path)
        .map_err(|e| Error::write(format!("Unable to open {}: {}", path.display(), e)))?;

    // An existing file keeps its old mode when opened, so tighten it explicitly.
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        file.set_permissions(std::fs::Permissions::from_mode(0o600))
            .map_err(|e| Error::write(format!("Unable to chmod {}: {}", path.display(), e)))?;
    }

    file.write_all(contents)
        .and_then(|_| file.flush())
        .map_err(|e| Error::write(format!("Unable to write {}: {}", path.display(), e)))?;

    log::debug!("Wrote {} bytes to {}", contents.len(), path.display());
    Ok(())
}

/// Read a source file, treating I/O failures as "not parsed"
pub(crate) fn read_source(path: &Path) -> Option<String> {
    match std::fs::read_to_string(path) {
        Ok(text) => Some(text),
        Err(e) => {
            log::warn!("Unable to read configuration {}: {}", path.display(), e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_kind_for_path() {
        assert_eq!(SourceKind::for_path(Path::new("a/b.yaml")), SourceKind::Yaml);
        assert_eq!(SourceKind::for_path(Path::new("a/b.yml")), SourceKind::Yaml);
        assert_eq!(SourceKind::for_path(Path::new("a/b.conf")), SourceKind::Ini);
        assert_eq!(SourceKind::for_path(Path::new("noext")), SourceKind::Ini);
    }

    #[test]
    fn test_open_by_scheme_and_path() {
        let dir = tempfile::tempdir().unwrap();
        let ini = dir.path().join("main.conf");
        std::fs::write(&ini, "[A]\nkey = 1\n").unwrap();
        let yml = dir.path().join("extra.data");
        std::fs::write(&yml, "A:\n  key: 2\n").unwrap();

        let source = open(ini.to_str().unwrap()).unwrap().unwrap();
        assert_eq!(source.name(), "file");
        assert_eq!(source.raw_data()["A"]["key"], "1");

        let url = format!("file://{}", ini.display());
        let source = open(&url).unwrap().unwrap();
        assert!(source.parsed());
        assert_eq!(source.location(), Some(ini.as_path()));

        let url = format!("yaml://{}", yml.display());
        let source = open(&url).unwrap().unwrap();
        assert_eq!(source.name(), "yaml");
        assert_eq!(source.raw_data()["A"]["key"], "2");
    }

    #[test]
    fn test_open_unknown_scheme() {
        assert!(open("reg://HKEY_LOCAL_MACHINE/Software/App").unwrap().is_none());
    }

    #[test]
    fn test_open_missing_file_is_not_parsed() {
        let source = open("/nonexistent/layerconf/main.conf").unwrap().unwrap();
        assert!(!source.parsed());
        assert!(source.raw_data().is_empty());
    }

    #[test]
    fn test_merge_into() {
        let mut base = RawData::new();
        base.entry("A".into()).or_default().insert("x".into(), "1".into());
        base.entry("A".into()).or_default().insert("y".into(), "2".into());

        let mut overlay = RawData::new();
        overlay.entry("A".into()).or_default().insert("y".into(), "3".into());
        overlay.entry("B".into()).or_default().insert("z".into(), "4".into());

        merge_into(&mut base, &overlay);
        assert_eq!(base["A"]["x"], "1");
        assert_eq!(base["A"]["y"], "3");
        assert_eq!(base["B"]["z"], "4");
    }

    #[cfg(unix)]
    #[test]
    fn test_write_private_creates_dirs_and_restricts_mode() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/deeper/out.conf");
        write_private(&path, b"[A]\n").unwrap();

        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "[A]\n");
    }
}
