//! Tests for configuration loading, precedence, and the shared store.
//!
//! Environment lookups are injected as closures so these tests never touch
//! the process environment.

use crate::config::{BackendKind, Config, ConfigStore, resolve_api_key};
use crate::error::ConfigError;
use proptest::prelude::*;
use std::collections::HashMap;
use std::path::PathBuf;
use tempfile::TempDir;

fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let map: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    move |name| map.get(name).cloned()
}

fn no_env(_: &str) -> Option<String> {
    None
}

fn write_config(dir: &TempDir, contents: &str) -> PathBuf {
    let path = dir.path().join("config.yaml");
    std::fs::write(&path, contents).unwrap();
    path
}

#[cfg(test)]
mod loading_tests {
    use super::*;

    #[test]
    fn missing_file_uses_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("does-not-exist.yaml");

        let config = Config::load_with_env(Some(&path), no_env).unwrap();

        assert_eq!(config, Config::default());
        assert_eq!(config.imagen.default_model, "gemini-2.5-flash-image");
        assert_eq!(config.imagen.default_aspect_ratio, "1:1");
        assert_eq!(config.imagen.default_temperature, 0.7);
        assert_eq!(config.imagen.safety_setting, "preset:strict");
        assert_eq!(config.imagen.backend, BackendKind::Api);
        assert_eq!(config.storage.output_dir, PathBuf::from("./generated_images"));
        assert!(!config.storage.use_s3);
        assert_eq!(config.server.name, "gemini-imagen-mcp");
        assert_eq!(config.server.log_level, "INFO");
    }

    #[test]
    fn file_values_override_defaults() {
        let dir = TempDir::new().unwrap();
        let path = write_config(
            &dir,
            r#"
imagen:
  api_key: file-key
  default_model: gemini-3-pro-image-preview
  default_temperature: 0.3
  backend: cli
  cli_timeout_secs: 30
storage:
  output_dir: /tmp/pixelforge-out
  use_s3: true
  s3_bucket: my-bucket
server:
  name: custom-server
  log_level: DEBUG
"#,
        );

        let config = Config::load_with_env(Some(&path), no_env).unwrap();

        assert_eq!(config.imagen.api_key.as_deref(), Some("file-key"));
        assert_eq!(config.imagen.default_model, "gemini-3-pro-image-preview");
        assert_eq!(config.imagen.default_temperature, 0.3);
        assert_eq!(config.imagen.backend, BackendKind::Cli);
        assert_eq!(config.imagen.cli_timeout_secs, 30);
        assert_eq!(config.storage.output_dir, PathBuf::from("/tmp/pixelforge-out"));
        assert!(config.storage.use_s3);
        assert_eq!(config.storage.s3_bucket.as_deref(), Some("my-bucket"));
        assert_eq!(config.server.name, "custom-server");
        assert_eq!(config.server.log_level, "DEBUG");

        // Keys absent from the file keep their defaults
        assert_eq!(config.imagen.default_aspect_ratio, "1:1");
        assert_eq!(config.imagen.safety_setting, "preset:strict");
        assert_eq!(config.server.version, "0.1.4");
    }

    #[test]
    fn env_key_overrides_file_key() {
        let dir = TempDir::new().unwrap();
        let path = write_config(&dir, "imagen:\n  api_key: file-key\n");

        let config =
            Config::load_with_env(Some(&path), env_from(&[("GOOGLE_API_KEY", "env-key")])).unwrap();

        assert_eq!(config.imagen.api_key.as_deref(), Some("env-key"));
    }

    #[test]
    fn file_key_kept_without_env() {
        let dir = TempDir::new().unwrap();
        let path = write_config(&dir, "imagen:\n  api_key: file-key\n");

        let config = Config::load_with_env(Some(&path), no_env).unwrap();

        assert_eq!(config.imagen.api_key.as_deref(), Some("file-key"));
    }

    #[test]
    fn empty_file_uses_defaults() {
        let dir = TempDir::new().unwrap();
        let path = write_config(&dir, "");

        let config = Config::load_with_env(Some(&path), no_env).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn comment_only_file_uses_defaults() {
        let dir = TempDir::new().unwrap();
        let path = write_config(&dir, "# nothing configured yet\n");

        let config = Config::load_with_env(Some(&path), no_env).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn unknown_keys_are_ignored() {
        let config = Config::from_yaml_str("imagen:\n  log_images: true\nextra: 1\n").unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn invalid_yaml_is_parse_error() {
        let dir = TempDir::new().unwrap();
        let path = write_config(&dir, "imagen: [unclosed\n");

        let err = Config::load_with_env(Some(&path), no_env).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }), "got {err:?}");
    }

    #[test]
    fn out_of_range_temperature_rejected() {
        let dir = TempDir::new().unwrap();
        let path = write_config(&dir, "imagen:\n  default_temperature: 1.5\n");

        let err = Config::load_with_env(Some(&path), no_env).unwrap_err();
        match err {
            ConfigError::InvalidValue(field, message) => {
                assert_eq!(field, "imagen.default_temperature");
                assert!(message.contains("between 0 and 1"));
            }
            other => panic!("Expected InvalidValue, got {other:?}"),
        }
    }

    #[test]
    fn save_then_load_preserves_fields() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.yaml");

        let mut config = Config::default();
        config.imagen.default_model = "gemini-3-pro-image-preview".to_string();
        config.imagen.backend = BackendKind::Cli;
        config.storage.output_dir = PathBuf::from("/srv/images");
        config.server.log_level = "WARNING".to_string();

        config.save(Some(&path)).unwrap();
        let loaded = Config::load_with_env(Some(&path), no_env).unwrap();

        assert_eq!(loaded, config);
    }

    #[test]
    fn debug_output_redacts_api_key() {
        let mut config = Config::default();
        config.imagen.api_key = Some("super-secret".to_string());

        let debug_str = format!("{:?}", config);
        assert!(!debug_str.contains("super-secret"));
        assert!(debug_str.contains("<redacted>"));
    }
}

#[cfg(test)]
mod api_key_tests {
    use super::*;

    #[test]
    fn first_variable_wins() {
        let env = env_from(&[
            ("GOOGLE_API_KEY", "first"),
            ("GOOGLE_GENERATIVE_AI_API_KEY", "second"),
            ("GEMINI_API_KEY", "third"),
        ]);
        assert_eq!(resolve_api_key(env).as_deref(), Some("first"));
    }

    #[test]
    fn falls_through_to_later_variables() {
        let env = env_from(&[("GEMINI_API_KEY", "third")]);
        assert_eq!(resolve_api_key(env).as_deref(), Some("third"));

        let env = env_from(&[
            ("GOOGLE_GENERATIVE_AI_API_KEY", "second"),
            ("GEMINI_API_KEY", "third"),
        ]);
        assert_eq!(resolve_api_key(env).as_deref(), Some("second"));
    }

    #[test]
    fn empty_values_are_skipped() {
        let env = env_from(&[("GOOGLE_API_KEY", ""), ("GEMINI_API_KEY", "third")]);
        assert_eq!(resolve_api_key(env).as_deref(), Some("third"));
    }

    #[test]
    fn no_variables_means_no_key() {
        assert_eq!(resolve_api_key(no_env), None);
    }
}

#[cfg(test)]
mod store_tests {
    use super::*;

    #[tokio::test]
    async fn snapshot_survives_replace() {
        let store = ConfigStore::new(Config::default(), None);
        let before = store.snapshot().await;

        let mut updated = Config::default();
        updated.server.name = "renamed".to_string();
        store.replace(updated).await;

        // Old snapshot is untouched, new readers see the new record
        assert_eq!(before.server.name, "gemini-imagen-mcp");
        assert_eq!(store.snapshot().await.server.name, "renamed");
    }

    #[tokio::test]
    async fn reload_reads_file_again() {
        let dir = TempDir::new().unwrap();
        let path = write_config(&dir, "server:\n  name: first\n");

        let store = ConfigStore::new(
            Config::load_with_env(Some(&path), no_env).unwrap(),
            Some(path.clone()),
        );
        assert_eq!(store.snapshot().await.server.name, "first");

        std::fs::write(&path, "server:\n  name: second\n").unwrap();
        let reloaded = store.reload().await.unwrap();

        assert_eq!(reloaded.server.name, "second");
        assert_eq!(store.snapshot().await.server.name, "second");
    }

    #[tokio::test]
    async fn failed_reload_keeps_current_config() {
        let dir = TempDir::new().unwrap();
        let path = write_config(&dir, "server:\n  name: stable\n");

        let store = ConfigStore::new(
            Config::load_with_env(Some(&path), no_env).unwrap(),
            Some(path.clone()),
        );

        std::fs::write(&path, "imagen:\n  default_temperature: 7\n").unwrap();
        assert!(store.reload().await.is_err());
        assert_eq!(store.snapshot().await.server.name, "stable");
    }
}

proptest! {
    /// Any temperature inside [0, 1] passes config validation, anything outside fails.
    #[test]
    fn default_temperature_range(t in -2.0f64..3.0f64) {
        let mut config = Config::default();
        config.imagen.default_temperature = t;
        let ok = config.validate().is_ok();
        prop_assert_eq!(ok, (0.0..=1.0).contains(&t));
    }

    /// The environment key always wins over whatever the file holds.
    #[test]
    fn env_key_always_wins(file_key in "[A-Za-z0-9_-]{1,40}", env_key in "[A-Za-z0-9_-]{1,40}") {
        let dir = TempDir::new().unwrap();
        let path = write_config(&dir, &format!("imagen:\n  api_key: \"{file_key}\"\n"));
        let config = Config::load_with_env(
            Some(&path),
            env_from(&[("GEMINI_API_KEY", env_key.as_str())]),
        ).unwrap();
        prop_assert_eq!(config.imagen.api_key, Some(env_key));
    }
}
