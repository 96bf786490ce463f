use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::Context;
use serde::Deserialize;

pub const DEFAULT_CONFIG_FILE: &str = "viewer.toml";

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Settings {
    pub trace_dir: PathBuf,
    pub log_filter: String,
    pub selection_timeout_ms: u64,
    pub load_timeout_ms: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            trace_dir: std::env::temp_dir().join("trace-viewer"),
            log_filter: "info".into(),
            selection_timeout_ms: 2_000,
            load_timeout_ms: 30_000,
        }
    }
}

impl Settings {
    pub fn selection_timeout(&self) -> Duration {
        Duration::from_millis(self.selection_timeout_ms)
    }

    pub fn load_timeout(&self) -> Duration {
        Duration::from_millis(self.load_timeout_ms)
    }
}

/// Defaults, then the config file (if readable), then the environment.
pub fn load_settings(config_path: Option<&Path>) -> Settings {
    let mut settings = Settings::default();

    let path = config_path.unwrap_or_else(|| Path::new(DEFAULT_CONFIG_FILE));
    if let Ok(raw) = fs::read_to_string(path) {
        if let Ok(file_cfg) = toml::from_str::<HashMap<String, String>>(&raw) {
            apply_file(&mut settings, &file_cfg);
        }
    }

    apply_env(&mut settings, |key| std::env::var(key).ok());
    settings
}

fn apply_file(settings: &mut Settings, file_cfg: &HashMap<String, String>) {
    if let Some(v) = file_cfg.get("trace_dir") {
        settings.trace_dir = PathBuf::from(v);
    }
    if let Some(v) = file_cfg.get("log_filter") {
        settings.log_filter = v.clone();
    }
    if let Some(parsed) = file_cfg.get("selection_timeout_ms").and_then(|v| v.parse().ok()) {
        settings.selection_timeout_ms = parsed;
    }
    if let Some(parsed) = file_cfg.get("load_timeout_ms").and_then(|v| v.parse().ok()) {
        settings.load_timeout_ms = parsed;
    }
}

fn apply_env(settings: &mut Settings, var: impl Fn(&str) -> Option<String>) {
    if let Some(v) = var("VIEWER_TRACE_DIR") {
        settings.trace_dir = PathBuf::from(v);
    }
    if let Some(v) = var("APP__TRACE_DIR") {
        settings.trace_dir = PathBuf::from(v);
    }

    if let Some(v) = var("VIEWER_LOG") {
        settings.log_filter = v;
    }
    if let Some(v) = var("APP__LOG_FILTER") {
        settings.log_filter = v;
    }

    if let Some(v) = var("APP__SELECTION_TIMEOUT_MS") {
        if let Ok(parsed) = v.parse::<u64>() {
            settings.selection_timeout_ms = parsed;
        }
    }
    if let Some(v) = var("APP__LOAD_TIMEOUT_MS") {
        if let Ok(parsed) = v.parse::<u64>() {
            settings.load_timeout_ms = parsed;
        }
    }
}

/// Creates the directory engine workers store trace databases in.
pub fn prepare_trace_dir(trace_dir: &Path) -> anyhow::Result<PathBuf> {
    fs::create_dir_all(trace_dir).with_context(|| {
        format!("failed to create trace directory '{}'", trace_dir.display())
    })?;
    Ok(trace_dir.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn config_file_overrides_defaults() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("viewer.toml");
        fs::write(
            &path,
            "trace_dir = \"/tmp/traces\"\nlog_filter = \"debug\"\nselection_timeout_ms = \"750\"\n",
        )
        .expect("write config");

        let mut settings = Settings::default();
        let raw = fs::read_to_string(&path).expect("read config");
        let file_cfg: HashMap<String, String> = toml::from_str(&raw).expect("flat table");
        apply_file(&mut settings, &file_cfg);

        assert_eq!(settings.trace_dir, PathBuf::from("/tmp/traces"));
        assert_eq!(settings.log_filter, "debug");
        assert_eq!(settings.selection_timeout(), Duration::from_millis(750));
        assert_eq!(settings.load_timeout_ms, Settings::default().load_timeout_ms);
    }

    #[test]
    fn app_prefixed_env_wins_over_short_names() {
        let mut settings = Settings::default();
        apply_env(
            &mut settings,
            env_from(&[
                ("VIEWER_TRACE_DIR", "/short"),
                ("APP__TRACE_DIR", "/prefixed"),
                ("VIEWER_LOG", "warn"),
            ]),
        );
        assert_eq!(settings.trace_dir, PathBuf::from("/prefixed"));
        assert_eq!(settings.log_filter, "warn");
    }

    #[test]
    fn unparseable_timeouts_are_ignored() {
        let mut settings = Settings::default();
        apply_env(
            &mut settings,
            env_from(&[
                ("APP__SELECTION_TIMEOUT_MS", "soon"),
                ("APP__LOAD_TIMEOUT_MS", "5000"),
            ]),
        );
        assert_eq!(settings.selection_timeout_ms, 2_000);
        assert_eq!(settings.load_timeout_ms, 5_000);
    }

    #[test]
    fn prepare_trace_dir_creates_nested_directories() {
        let dir = tempfile::tempdir().expect("temp dir");
        let nested = dir.path().join("a").join("b");
        let prepared = prepare_trace_dir(&nested).expect("prepare");
        assert!(prepared.is_dir());
    }
}
