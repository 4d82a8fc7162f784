use serial_test::serial;
use std::env;
use std::fs;
use tempfile::tempdir;

use syncfs_util::config::{CONFIG_ENV, default_config_path};
use syncfs_util::{Config, LogLevel, load_config};

struct EnvGuard(Option<std::ffi::OsString>);

impl EnvGuard {
    fn set(value: &std::path::Path) -> Self {
        let prev = env::var_os(CONFIG_ENV);
        unsafe { env::set_var(CONFIG_ENV, value) };
        EnvGuard(prev)
    }
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        match self.0.take() {
            Some(v) => unsafe { env::set_var(CONFIG_ENV, v) },
            None => unsafe { env::remove_var(CONFIG_ENV) },
        }
    }
}

#[test]
#[serial]
fn env_override_is_loaded() {
    let td = tempdir().unwrap();
    let cfg_path = td.path().join("custom.xml");
    fs::write(
        &cfg_path,
        r#"<config>
  <log_level>quiet</log_level>
  <buffer_size>65536</buffer_size>
</config>"#,
    )
    .unwrap();
    let _env = EnvGuard::set(&cfg_path);

    assert_eq!(default_config_path(), Some(cfg_path.clone()));
    let cfg = load_config().expect("load_config");
    assert_eq!(cfg.log_level, LogLevel::Quiet);
    assert_eq!(cfg.move_options().buffer_size, 65536);
}

#[test]
#[serial]
fn missing_file_means_defaults() {
    let td = tempdir().unwrap();
    let _env = EnvGuard::set(&td.path().join("absent.xml"));
    assert_eq!(load_config().unwrap(), Config::default());
}

#[test]
#[serial]
fn malformed_file_is_an_error() {
    let td = tempdir().unwrap();
    let cfg_path = td.path().join("broken.xml");
    fs::write(&cfg_path, "<config><log_level>debug</config>").unwrap();
    let _env = EnvGuard::set(&cfg_path);
    assert!(load_config().is_err());
}
