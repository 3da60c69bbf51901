use serial_test::serial;
use snippetbox::{
    AppConfig,
    config::{ConfigError, Env},
};
use std::{env, panic, path::PathBuf, time::Duration};

const CONFIG_VARS: [&str; 6] = [
    "APP_ENV",
    "DATABASE_URL",
    "PORT",
    "STATIC_DIR",
    "BCRYPT_COST",
    "REQUEST_TIMEOUT_SECS",
];

// --- Setup/Teardown Utilities ---

/// Runs `test` with exactly `vars` set (every other config variable unset) and
/// restores the original environment afterwards, even if the test panics.
fn run_with_env<T, R>(vars: &[(&'static str, &str)], test: T) -> R
where
    T: FnOnce() -> R + panic::UnwindSafe,
{
    let originals: Vec<(&str, Option<String>)> = CONFIG_VARS
        .iter()
        .map(|&var| (var, env::var(var).ok()))
        .collect();

    unsafe {
        for var in CONFIG_VARS {
            env::remove_var(var);
        }
        for (key, value) in vars {
            env::set_var(key, value);
        }
    }

    let result = panic::catch_unwind(test);

    unsafe {
        for (key, original_value) in originals {
            match original_value {
                Some(val) => env::set_var(key, val),
                None => env::remove_var(key),
            }
        }
    }

    match result {
        Ok(value) => value,
        Err(e) => panic::resume_unwind(e),
    }
}

// --- Tests ---

#[test]
#[serial]
fn test_app_config_production_requires_database_url() {
    let result = run_with_env(&[("APP_ENV", "production")], AppConfig::load);

    assert!(
        matches!(result, Err(ConfigError::Missing("DATABASE_URL"))),
        "Production config loading should fail without a database"
    );
}

#[test]
#[serial]
fn test_app_config_production() {
    let config = run_with_env(
        &[
            ("APP_ENV", "production"),
            ("DATABASE_URL", "sqlite:/var/lib/snippetbox/db.sqlite"),
            ("PORT", "8443"),
        ],
        AppConfig::load,
    )
    .unwrap();

    assert_eq!(config.env, Env::Production);
    assert_eq!(config.db_url, "sqlite:/var/lib/snippetbox/db.sqlite");
    assert_eq!(config.bind_address(), "0.0.0.0:8443");
    assert!(config.secure_cookies());
}

#[test]
#[serial]
fn test_app_config_local_env_defaults() {
    let config = run_with_env(&[], AppConfig::load).unwrap();

    assert_eq!(config.env, Env::Local);
    assert_eq!(config.port, 4000);
    assert_eq!(config.db_url, "sqlite:snippetbox.db?mode=rwc");
    assert_eq!(config.static_dir, PathBuf::from("./ui/static"));
    assert_eq!(config.bcrypt_cost, 12);
    assert_eq!(config.request_timeout, Duration::from_secs(10));
    assert!(!config.secure_cookies());
}

#[test]
#[serial]
fn test_app_config_unknown_env_is_local() {
    let config = run_with_env(&[("APP_ENV", "staging")], AppConfig::load).unwrap();

    assert_eq!(config.env, Env::Local);
}

#[test]
#[serial]
fn test_app_config_rejects_bad_port() {
    let result = run_with_env(&[("PORT", "not-a-port")], AppConfig::load);

    match result {
        Err(ConfigError::Invalid { var, value }) => {
            assert_eq!(var, "PORT");
            assert_eq!(value, "not-a-port");
        }
        other => panic!("expected an invalid PORT, got {other:?}"),
    }
}

#[test]
#[serial]
fn test_app_config_bcrypt_cost_range() {
    let low = run_with_env(&[("BCRYPT_COST", "3")], AppConfig::load);
    let high = run_with_env(&[("BCRYPT_COST", "32")], AppConfig::load);
    let ok = run_with_env(&[("BCRYPT_COST", " 10 ")], AppConfig::load);

    assert!(matches!(low, Err(ConfigError::Invalid { var: "BCRYPT_COST", .. })));
    assert!(matches!(high, Err(ConfigError::Invalid { var: "BCRYPT_COST", .. })));
    assert_eq!(ok.unwrap().bcrypt_cost, 10);
}

#[test]
#[serial]
fn test_app_config_request_timeout() {
    let zero = run_with_env(&[("REQUEST_TIMEOUT_SECS", "0")], AppConfig::load);
    let custom = run_with_env(&[("REQUEST_TIMEOUT_SECS", "30")], AppConfig::load);

    assert!(matches!(
        zero,
        Err(ConfigError::Invalid { var: "REQUEST_TIMEOUT_SECS", .. })
    ));
    assert_eq!(custom.unwrap().request_timeout, Duration::from_secs(30));
}

#[test]
fn test_app_config_default_is_in_memory() {
    let config = AppConfig::default();

    assert_eq!(config.db_url, "sqlite::memory:");
    assert_eq!(config.env, Env::Local);
}
