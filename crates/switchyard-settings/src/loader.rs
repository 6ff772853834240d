//! Settings loading with deep merge and environment variable overrides.
//!
//! Loading flow:
//! 1. Start with compiled [`SwitchyardSettings::default()`]
//! 2. If the settings file exists, deep-merge its values over the defaults
//! 3. Apply `SWITCHYARD_*` environment overrides (highest priority)
//! 4. Validate the result
//!
//! Deep merge rules:
//! - Objects are merged recursively (source overrides target per-key)
//! - Arrays and primitives are replaced entirely by source
//! - Null values in source are skipped (preserving target)

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{debug, warn};

use crate::errors::Result;
use crate::types::SwitchyardSettings;

/// Resolve the default settings file path (`~/.switchyard/settings.json`).
pub fn settings_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".switchyard").join("settings.json")
}

/// Load settings from the default path with env var overrides.
pub fn load_settings() -> Result<SwitchyardSettings> {
    load_settings_from_path(&settings_path())
}

/// Load settings from a specific path with env var overrides.
///
/// A missing file yields defaults. A file with invalid JSON is an error.
pub fn load_settings_from_path(path: &Path) -> Result<SwitchyardSettings> {
    load_with_env(path, |name| std::env::var(name).ok())
}

/// Load settings, reading overrides through `env` instead of the process
/// environment.
pub fn load_with_env<F>(path: &Path, env: F) -> Result<SwitchyardSettings>
where
    F: Fn(&str) -> Option<String>,
{
    let defaults = serde_json::to_value(SwitchyardSettings::default())?;

    let merged = if path.exists() {
        debug!(?path, "loading settings from file");
        let content = std::fs::read_to_string(path)?;
        let user: Value = serde_json::from_str(&content)?;
        deep_merge(defaults, user)
    } else {
        debug!(?path, "settings file not found, using defaults");
        defaults
    };

    let mut settings: SwitchyardSettings = serde_json::from_value(merged)?;
    apply_env_overrides(&mut settings, env);
    settings.validate()?;
    Ok(settings)
}

/// Recursive deep merge of two JSON values.
pub fn deep_merge(target: Value, source: Value) -> Value {
    match (target, source) {
        (Value::Object(mut target_map), Value::Object(source_map)) => {
            for (key, source_val) in source_map {
                if source_val.is_null() {
                    continue;
                }
                let merged = if let Some(target_val) = target_map.remove(&key) {
                    deep_merge(target_val, source_val)
                } else {
                    source_val
                };
                let _ = target_map.insert(key, merged);
            }
            Value::Object(target_map)
        }
        (_, source) => source,
    }
}

/// Apply environment variable overrides to loaded settings.
///
/// Integers must parse and fall within range, booleans accept
/// `true`/`1`/`yes`/`on` and `false`/`0`/`no`/`off`. Invalid values are
/// logged and ignored.
pub fn apply_env_overrides<F>(settings: &mut SwitchyardSettings, env: F)
where
    F: Fn(&str) -> Option<String>,
{
    let env = EnvReader { lookup: env };

    // ── Server ──────────────────────────────────────────────────────
    if let Some(v) = env.string("SWITCHYARD_HOST") {
        settings.server.host = v;
    }
    if let Some(v) = env.u64_in("SWITCHYARD_PORT", 1, 65535) {
        settings.server.port = u16::try_from(v).unwrap_or(settings.server.port);
    }
    if let Some(v) = env.string("SWITCHYARD_ENDPOINT_PATH") {
        if v.starts_with('/') {
            settings.server.endpoint_path = v;
        } else {
            warn!(key = "SWITCHYARD_ENDPOINT_PATH", value = %v, "endpoint path must start with '/', ignoring");
        }
    }
    if let Some(v) = env.u64_in("SWITCHYARD_MAX_MESSAGE_SIZE", 1024, 64 * 1024 * 1024) {
        settings.server.max_message_size =
            usize::try_from(v).unwrap_or(settings.server.max_message_size);
    }
    if let Some(v) = env.u64_in("SWITCHYARD_SEND_QUEUE", 1, 65_536) {
        settings.server.send_queue_capacity =
            usize::try_from(v).unwrap_or(settings.server.send_queue_capacity);
    }
    if let Some(v) = env.u64_in("SWITCHYARD_HEARTBEAT_INTERVAL", 1, 3600) {
        settings.server.heartbeat_interval_secs = v;
    }
    if let Some(v) = env.u64_in("SWITCHYARD_HEARTBEAT_TIMEOUT", 1, 3600) {
        settings.server.heartbeat_timeout_secs = v;
    }
    if let Some(v) = env.bool("SWITCHYARD_CLOSE_SUPERSEDED") {
        settings.server.close_superseded = v;
    }

    // ── Logging ─────────────────────────────────────────────────────
    if let Some(v) = env.string("SWITCHYARD_LOG_LEVEL") {
        settings.logging.level = v;
    }
    if let Some(v) = env.bool("SWITCHYARD_LOG_JSON") {
        settings.logging.json = v;
    }
}

/// Parse a boolean env var value.
pub fn parse_bool(val: &str) -> Option<bool> {
    match val.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Parse a string as a `u64` within an inclusive range.
pub fn parse_u64_range(val: &str, min: u64, max: u64) -> Option<u64> {
    let n: u64 = val.trim().parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

struct EnvReader<F> {
    lookup: F,
}

impl<F> EnvReader<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn string(&self, name: &str) -> Option<String> {
        (self.lookup)(name).filter(|v| !v.is_empty())
    }

    fn bool(&self, name: &str) -> Option<bool> {
        let val = self.string(name)?;
        let result = parse_bool(&val);
        if result.is_none() {
            warn!(key = name, value = %val, "invalid boolean env var, ignoring");
        }
        result
    }

    fn u64_in(&self, name: &str, min: u64, max: u64) -> Option<u64> {
        let val = self.string(name)?;
        let result = parse_u64_range(&val, min, max);
        if result.is_none() {
            warn!(key = name, value = %val, min, max, "invalid integer env var, ignoring");
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::SettingsError;
    use assert_matches::assert_matches;
    use serde_json::json;
    use std::collections::HashMap;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        move |name| map.get(name).cloned()
    }

    // ── deep_merge ──────────────────────────────────────────────────

    #[test]
    fn merge_objects_recursively() {
        let merged = deep_merge(
            json!({"server": {"port": 1, "host": "a"}}),
            json!({"server": {"port": 2}}),
        );
        assert_eq!(merged, json!({"server": {"port": 2, "host": "a"}}));
    }

    #[test]
    fn merge_skips_null() {
        let merged = deep_merge(json!({"a": 1}), json!({"a": null}));
        assert_eq!(merged, json!({"a": 1}));
    }

    #[test]
    fn merge_replaces_arrays() {
        let merged = deep_merge(json!({"a": [1, 2]}), json!({"a": [3]}));
        assert_eq!(merged, json!({"a": [3]}));
    }

    #[test]
    fn merge_adds_new_keys() {
        let merged = deep_merge(json!({"a": 1}), json!({"b": 2}));
        assert_eq!(merged, json!({"a": 1, "b": 2}));
    }

    // ── loading ─────────────────────────────────────────────────────

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = load_with_env(&dir.path().join("nope.json"), no_env).unwrap();
        assert_eq!(settings.server.port, 8080);
        assert_eq!(settings.server.endpoint_path, "/ws-endpoint");
    }

    #[test]
    fn file_values_override_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(
            &path,
            r#"{"server":{"port":9100,"closeSuperseded":false},"logging":{"json":true}}"#,
        )
        .unwrap();
        let settings = load_with_env(&path, no_env).unwrap();
        assert_eq!(settings.server.port, 9100);
        assert!(!settings.server.close_superseded);
        assert_eq!(settings.server.host, "0.0.0.0");
        assert!(settings.logging.json);
    }

    #[test]
    fn invalid_json_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "{not json").unwrap();
        assert_matches!(load_with_env(&path, no_env), Err(SettingsError::Json(_)));
    }

    #[test]
    fn invalid_file_value_fails_validation() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"server":{"endpointPath":"ws"}}"#).unwrap();
        assert_matches!(
            load_with_env(&path, no_env),
            Err(SettingsError::InvalidValue(_))
        );
    }

    #[test]
    fn env_overrides_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"server":{"port":9100}}"#).unwrap();
        let env = env_from(&[
            ("SWITCHYARD_PORT", "9200"),
            ("SWITCHYARD_HOST", "127.0.0.1"),
            ("SWITCHYARD_LOG_LEVEL", "debug"),
        ]);
        let settings = load_with_env(&path, env).unwrap();
        assert_eq!(settings.server.port, 9200);
        assert_eq!(settings.server.host, "127.0.0.1");
        assert_eq!(settings.logging.level, "debug");
    }

    // ── env overrides ───────────────────────────────────────────────

    #[test]
    fn env_bools_accept_aliases() {
        let mut settings = SwitchyardSettings::default();
        apply_env_overrides(
            &mut settings,
            env_from(&[("SWITCHYARD_CLOSE_SUPERSEDED", "off"), ("SWITCHYARD_LOG_JSON", "yes")]),
        );
        assert!(!settings.server.close_superseded);
        assert!(settings.logging.json);
    }

    #[test]
    fn out_of_range_env_is_ignored() {
        let mut settings = SwitchyardSettings::default();
        apply_env_overrides(
            &mut settings,
            env_from(&[
                ("SWITCHYARD_PORT", "70000"),
                ("SWITCHYARD_SEND_QUEUE", "0"),
                ("SWITCHYARD_MAX_MESSAGE_SIZE", "12"),
            ]),
        );
        assert_eq!(settings.server.port, 8080);
        assert_eq!(settings.server.send_queue_capacity, 256);
        assert_eq!(settings.server.max_message_size, 1024 * 1024);
    }

    #[test]
    fn garbage_env_is_ignored() {
        let mut settings = SwitchyardSettings::default();
        apply_env_overrides(
            &mut settings,
            env_from(&[
                ("SWITCHYARD_HEARTBEAT_INTERVAL", "soon"),
                ("SWITCHYARD_CLOSE_SUPERSEDED", "maybe"),
                ("SWITCHYARD_ENDPOINT_PATH", "no-slash"),
            ]),
        );
        assert_eq!(settings.server.heartbeat_interval_secs, 30);
        assert!(settings.server.close_superseded);
        assert_eq!(settings.server.endpoint_path, "/ws-endpoint");
    }

    #[test]
    fn empty_env_is_ignored() {
        let mut settings = SwitchyardSettings::default();
        apply_env_overrides(&mut settings, env_from(&[("SWITCHYARD_HOST", "")]));
        assert_eq!(settings.server.host, "0.0.0.0");
    }

    #[test]
    fn numeric_env_overrides() {
        let mut settings = SwitchyardSettings::default();
        apply_env_overrides(
            &mut settings,
            env_from(&[
                ("SWITCHYARD_ENDPOINT_PATH", "/socket"),
                ("SWITCHYARD_MAX_MESSAGE_SIZE", "2048"),
                ("SWITCHYARD_SEND_QUEUE", "16"),
                ("SWITCHYARD_HEARTBEAT_INTERVAL", "5"),
                ("SWITCHYARD_HEARTBEAT_TIMEOUT", "15"),
            ]),
        );
        assert_eq!(settings.server.endpoint_path, "/socket");
        assert_eq!(settings.server.max_message_size, 2048);
        assert_eq!(settings.server.send_queue_capacity, 16);
        assert_eq!(settings.server.heartbeat_interval_secs, 5);
        assert_eq!(settings.server.heartbeat_timeout_secs, 15);
    }

    #[test]
    fn parse_helpers() {
        assert_eq!(parse_bool("TRUE"), Some(true));
        assert_eq!(parse_bool("0"), Some(false));
        assert_eq!(parse_bool("nah"), None);
        assert_eq!(parse_u64_range("10", 1, 10), Some(10));
        assert_eq!(parse_u64_range("11", 1, 10), None);
        assert_eq!(parse_u64_range("-1", 0, 10), None);
    }

    #[test]
    fn settings_path_ends_with_file_name() {
        let path = settings_path();
        assert!(path.ends_with(".switchyard/settings.json"));
    }
}
