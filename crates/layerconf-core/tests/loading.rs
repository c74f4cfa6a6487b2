//! On-disk loading, layering and write-back

use layerconf_core::{
    load_config, ConfigManager, ErrorKind, InitOptions, LoadOptions, Primary, Value,
};
use pretty_assertions::assert_eq;
use std::path::Path;

fn write(path: &Path, content: &str) {
    std::fs::write(path, content).unwrap();
}

#[test]
fn test_secondary_overrides_primary() {
    let dir = tempfile::tempdir().unwrap();
    let primary = dir.path().join("app.conf");
    let first = dir.path().join("s1.conf");
    let second = dir.path().join("s2.yaml");
    write(&primary, "[Sec]\nk = primary\nkeep = yes\n");
    write(&first, "[Sec]\nk = s1\n");
    write(&second, "Sec:\n  k: s2\n");

    let mut config = ConfigManager::new();
    config
        .initialize(primary.to_str().unwrap(), InitOptions::default())
        .unwrap();
    assert!(config.load_secondary_config(first.to_str().unwrap()).unwrap());
    assert!(config.load_secondary_config(second.to_str().unwrap()).unwrap());

    assert_eq!(config.get_string("Sec.k").unwrap(), "s2");
    assert_eq!(config.get_string("Sec.keep").unwrap(), "yes");
}

#[test]
fn test_missing_secondary_is_not_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = ConfigManager::new();
    let missing = dir.path().join("absent.conf");
    assert!(!config.load_secondary_config(missing.to_str().unwrap()).unwrap());
}

#[test]
fn test_malformed_secondary_fails() {
    let dir = tempfile::tempdir().unwrap();
    let broken = dir.path().join("broken.conf");
    write(&broken, "key = value before any section\n");

    let mut config = ConfigManager::new();
    let err = config
        .load_secondary_config(broken.to_str().unwrap())
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::ConfigFormat);
    assert_eq!(err.source_location.unwrap().line, Some(1));
}

#[test]
fn test_must_exist() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("absent.conf");
    let location = missing.to_str().unwrap();

    let mut config = ConfigManager::new();
    config.initialize(location, InitOptions::default()).unwrap();
    assert!(!config.source().unwrap().parsed());

    let err = config
        .initialize(
            location,
            InitOptions {
                reset: true,
                must_exist: true,
            },
        )
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::ConfigFormat);
}

#[test]
fn test_initialize_without_reset_keeps_data() {
    let dir = tempfile::tempdir().unwrap();
    let first = dir.path().join("first.conf");
    let second = dir.path().join("second.conf");
    write(&first, "[A]\nx = 1\n");
    write(&second, "[B]\ny = 2\n");

    let mut config = ConfigManager::new();
    config
        .initialize(first.to_str().unwrap(), InitOptions::default())
        .unwrap();
    config
        .initialize(
            second.to_str().unwrap(),
            InitOptions {
                reset: false,
                must_exist: true,
            },
        )
        .unwrap();
    assert_eq!(config.sections(), vec!["A", "B"]);

    config
        .initialize(first.to_str().unwrap(), InitOptions::default())
        .unwrap();
    assert_eq!(config.sections(), vec!["A"]);
}

#[test]
fn test_load_config_with_glob_secondaries() {
    let dir = tempfile::tempdir().unwrap();
    let conf_d = dir.path().join("conf.d");
    std::fs::create_dir(&conf_d).unwrap();
    let primary = dir.path().join("app.conf");
    write(&primary, "[Sec]\nk = primary\n\n[Test]\nSec.mode = test\n");
    write(&conf_d.join("10-base.conf"), "[Sec]\nk = base\nonly_base = 1\n");
    write(&conf_d.join("20-site.conf"), "[Sec]\nk = site\n");

    let mut config = ConfigManager::new();
    let options = LoadOptions {
        primary: Primary::Location(primary.display().to_string()),
        secondary_configs: vec![format!("{}/*.conf", conf_d.display())],
        execute_sections: vec!["Test".into()],
        ..Default::default()
    };
    load_config(&mut config, &options).unwrap();

    assert_eq!(config.get_string("Sec.k").unwrap(), "site");
    assert_eq!(config.get_string("Sec.only_base").unwrap(), "1");
    assert_eq!(config.get_string("Sec.mode").unwrap(), "test");
}

#[test]
fn test_write_back_merges_and_restricts_permissions() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("app.conf");
    write(
        &path,
        "[DEFAULT]\nshared = everywhere\n\n[A]\nx = 1\n\n[Untouched]\nz = 3\n",
    );

    let mut config = ConfigManager::new();
    config
        .initialize(path.to_str().unwrap(), InitOptions::default())
        .unwrap();
    config.set("A.x", "%(not evaluated)", true).unwrap();
    config.set("New.y", "2", true).unwrap();
    config.write().unwrap();

    let mut reread = ConfigManager::new();
    reread
        .initialize(path.to_str().unwrap(), InitOptions::default())
        .unwrap();
    assert_eq!(reread.get_string("A.x").unwrap(), "%(not evaluated)");
    assert_eq!(reread.get_string("New.y").unwrap(), "2");
    assert_eq!(reread.get_string("Untouched.z").unwrap(), "3");
    assert_eq!(reread.get_string("Untouched.shared").unwrap(), "everywhere");

    let written = std::fs::read_to_string(&path).unwrap();
    assert!(written.starts_with("[DEFAULT]\nshared = everywhere\n"));
    assert_eq!(written.matches("shared =").count(), 1);

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}

#[test]
fn test_yaml_write_back() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("app.yaml");
    write(&path, "Client:\n  hosts: [a, b]\n");

    let mut config = ConfigManager::new();
    config
        .define_list("Client.hosts", Vec::<String>::new(), "Hosts to try")
        .unwrap();
    config
        .initialize(&format!("yaml://{}", path.display()), InitOptions::default())
        .unwrap();
    assert_eq!(
        config.get("Client.hosts").unwrap(),
        Value::Sequence(vec!["a".into(), "b".into()])
    );

    config.set("Client.hosts", vec!["c"], true).unwrap();
    config.write().unwrap();

    let mut reread = ConfigManager::new();
    reread
        .initialize(path.to_str().unwrap(), InitOptions::default())
        .unwrap();
    assert_eq!(reread.get_list("Client.hosts").unwrap(), vec!["c"]);
}

#[test]
fn test_file_filter_reads_referenced_file() {
    let dir = tempfile::tempdir().unwrap();
    let secret = dir.path().join("secret.txt");
    write(&secret, "s3cr3t");
    let primary = dir.path().join("app.conf");
    write(
        &primary,
        &format!("[Sec]\nsecret_path = {}\nsecret = %(%(secret_path)|file)\n", secret.display()),
    );

    let mut config = ConfigManager::new();
    config
        .initialize(primary.to_str().unwrap(), InitOptions::default())
        .unwrap();
    assert_eq!(config.get_string("Sec.secret").unwrap(), "s3cr3t");
}

#[cfg(unix)]
#[test]
fn test_unknown_scheme_loads_readable_file_as_ini() {
    // A relative directory named `layerconf:...` makes the location parse as a URL.
    let dir = tempfile::Builder::new()
        .prefix("layerconf:")
        .tempdir_in(".")
        .unwrap();
    write(&dir.path().join("app.conf"), "[Sec]\nk = from file\n");
    let name = dir.path().file_name().unwrap().to_str().unwrap();
    let location = format!("{}/app.conf", name);

    let mut config = ConfigManager::new();
    config
        .initialize(
            &location,
            InitOptions {
                reset: true,
                must_exist: true,
            },
        )
        .unwrap();
    assert_eq!(config.get_string("Sec.k").unwrap(), "from file");
}

#[test]
fn test_unhandled_location_drops_previous_source() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("app.conf");
    write(&path, "[A]\nx = 1\n");

    let mut config = ConfigManager::new();
    config
        .initialize(path.to_str().unwrap(), InitOptions::default())
        .unwrap();
    config
        .initialize("unknown://nowhere/app.conf", InitOptions::default())
        .unwrap();
    assert!(config.source().is_none());

    config.set("A.x", "2", false).unwrap();
    let err = config.write().unwrap_err();
    assert_eq!(err.kind, ErrorKind::Write);
    assert_eq!(std::fs::read_to_string(&path).unwrap(), "[A]\nx = 1\n");
}
