// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, anyhow, bail};
use serde::Deserialize;
use sift_app::StatusFilter;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

const CONFIG_VERSION: i64 = 1;
const APP_NAME: &str = "sift";
const DEFAULT_TABLE: &str = "moderation_queue";
const DEFAULT_TIMEOUT: &str = "10s";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub version: i64,
    #[serde(default)]
    pub service: Service,
    #[serde(default)]
    pub ui: Ui,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            service: Service::default(),
            ui: Ui::default(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Service {
    pub base_url: Option<String>,
    pub api_key: Option<String>,
    pub timeout: Option<String>,
    pub tables: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Ui {
    pub filter: Option<String>,
}

impl Config {
    pub fn default_path() -> Result<PathBuf> {
        if let Some(path) = env::var_os("SIFT_CONFIG_PATH") {
            return Ok(PathBuf::from(path));
        }

        let config_root = dirs::config_dir().ok_or_else(|| {
            anyhow!("cannot resolve config directory; set SIFT_CONFIG_PATH to the config file")
        })?;

        let app_dir = config_root.join(APP_NAME);
        fs::create_dir_all(&app_dir)
            .with_context(|| format!("create config directory {}", app_dir.display()))?;
        Ok(app_dir.join("config.toml"))
    }

    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let raw = fs::read_to_string(path)
            .with_context(|| format!("read config file {}", path.display()))?;
        let value: toml::Value = toml::from_str(&raw)
            .with_context(|| format!("parse TOML config {}", path.display()))?;

        let version = value
            .get("version")
            .and_then(toml::Value::as_integer)
            .ok_or_else(|| {
                anyhow!(
                    "config file {} is not versioned. Add `version = 1` and put values under [service] and [ui]",
                    path.display()
                )
            })?;

        if version != CONFIG_VERSION {
            bail!(
                "unsupported config version {} in {}; expected version = 1",
                version,
                path.display()
            );
        }

        let config: Config = value
            .try_into()
            .with_context(|| format!("decode config {}", path.display()))?;
        config.validate(path)?;
        Ok(config)
    }

    fn validate(&self, path: &Path) -> Result<()> {
        if let Some(timeout) = &self.service.timeout {
            let parsed = parse_duration(timeout)?;
            if parsed <= Duration::ZERO {
                bail!(
                    "service.timeout in {} must be positive, got {}",
                    path.display(),
                    timeout
                );
            }
        }

        if let Some(tables) = &self.service.tables {
            if tables.is_empty() {
                bail!("service.tables in {} must not be empty", path.display());
            }
            for table in tables {
                if table.is_empty()
                    || !table
                        .bytes()
                        .all(|byte| byte.is_ascii_alphanumeric() || byte == b'_')
                {
                    bail!(
                        "service.tables in {} contains an invalid table name {table:?}",
                        path.display()
                    );
                }
            }
        }

        if let Some(filter) = &self.ui.filter
            && StatusFilter::parse(filter).is_none()
        {
            bail!(
                "ui.filter in {} must be one of all, pending, approved, rejected; got {filter:?}",
                path.display()
            );
        }

        Ok(())
    }

    /// Config value first, `SIFT_SERVICE_URL` as fallback for setups that
    /// keep no config file around.
    pub fn base_url(&self) -> Result<String> {
        if let Some(base_url) = &self.service.base_url {
            return Ok(base_url.trim_end_matches('/').to_owned());
        }
        if let Ok(base_url) = env::var("SIFT_SERVICE_URL") {
            return Ok(base_url.trim_end_matches('/').to_owned());
        }
        bail!("no service endpoint configured; set [service].base_url or SIFT_SERVICE_URL")
    }

    pub fn api_key(&self) -> Result<String> {
        if let Some(api_key) = &self.service.api_key {
            return Ok(api_key.clone());
        }
        if let Ok(api_key) = env::var("SIFT_API_KEY") {
            return Ok(api_key);
        }
        bail!("no access key configured; set [service].api_key or SIFT_API_KEY")
    }

    pub fn timeout(&self) -> Result<Duration> {
        parse_duration(self.service.timeout.as_deref().unwrap_or(DEFAULT_TIMEOUT))
    }

    pub fn tables(&self) -> Vec<String> {
        match &self.service.tables {
            Some(tables) if !tables.is_empty() => tables.clone(),
            _ => vec![DEFAULT_TABLE.to_owned()],
        }
    }

    pub fn initial_filter(&self) -> StatusFilter {
        self.ui
            .filter
            .as_deref()
            .and_then(StatusFilter::parse)
            .unwrap_or(StatusFilter::All)
    }

    pub fn example_config(path: &Path) -> String {
        format!(
            "# sift config\n# Place this file at: {}\n\nversion = 1\n\n[service]\nbase_url = \"https://project.example.supabase.co\"\n# Public (anon) access key; row-level security still applies server side.\napi_key = \"public-access-key\"\ntimeout = \"{}\"\ntables = [\"{}\"]\n\n[ui]\nfilter = \"all\"\n",
            path.display(),
            DEFAULT_TIMEOUT,
            DEFAULT_TABLE,
        )
    }
}

fn parse_duration(raw: &str) -> Result<Duration> {
    if let Some(value) = raw.strip_suffix("ms") {
        let millis: u64 = value
            .parse()
            .with_context(|| format!("invalid timeout duration {raw:?}"))?;
        return Ok(Duration::from_millis(millis));
    }
    if let Some(value) = raw.strip_suffix('s') {
        let secs: u64 = value
            .parse()
            .with_context(|| format!("invalid timeout duration {raw:?}"))?;
        return Ok(Duration::from_secs(secs));
    }
    if let Some(value) = raw.strip_suffix('m') {
        let mins: u64 = value
            .parse()
            .with_context(|| format!("invalid timeout duration {raw:?}"))?;
        return Ok(Duration::from_secs(mins * 60));
    }

    bail!("invalid duration {raw:?}; use one of: <N>ms, <N>s, <N>m (for example 500ms or 10s)")
}

#[cfg(test)]
mod tests {
    use super::{Config, parse_duration};
    use anyhow::Result;
    use sift_app::StatusFilter;
    use std::path::PathBuf;
    use std::sync::{Mutex, OnceLock};
    use std::time::Duration;

    fn write_config(content: &str) -> Result<(tempfile::TempDir, PathBuf)> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("config.toml");
        std::fs::write(&path, content)?;
        Ok((temp, path))
    }

    fn env_lock() -> std::sync::MutexGuard<'static, ()> {
        static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
        match ENV_LOCK.get_or_init(|| Mutex::new(())).lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    #[test]
    fn missing_config_uses_defaults() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let config = Config::load(&temp.path().join("missing.toml"))?;
        assert_eq!(config.version, 1);
        assert_eq!(config.tables(), vec!["moderation_queue".to_owned()]);
        assert_eq!(config.initial_filter(), StatusFilter::All);
        assert_eq!(config.timeout()?, Duration::from_secs(10));
        Ok(())
    }

    #[test]
    fn unversioned_config_is_rejected_with_actionable_message() -> Result<()> {
        let (_temp, path) = write_config("[service]\nbase_url = \"http://localhost:3000\"\n")?;
        let error = Config::load(&path).expect_err("unversioned config should fail");
        let message = error.to_string();
        assert!(message.contains("version = 1"));
        assert!(message.contains("[service]"));
        Ok(())
    }

    #[test]
    fn full_config_parses() -> Result<()> {
        let (_temp, path) = write_config(
            "version = 1\n[service]\nbase_url = \"http://localhost:3000/\"\napi_key = \"anon\"\ntimeout = \"2s\"\ntables = [\"moderation_queue\", \"intake_queue\"]\n[ui]\nfilter = \"pending\"\n",
        )?;

        let config = Config::load(&path)?;
        assert_eq!(config.base_url()?, "http://localhost:3000");
        assert_eq!(config.api_key()?, "anon");
        assert_eq!(config.timeout()?, Duration::from_secs(2));
        assert_eq!(config.tables().len(), 2);
        assert_eq!(config.initial_filter(), StatusFilter::Pending);
        Ok(())
    }

    #[test]
    fn malformed_config_returns_parse_error() -> Result<()> {
        let (_temp, path) = write_config("{{not toml")?;
        let error = Config::load(&path).expect_err("malformed config should fail");
        assert!(error.to_string().contains("parse TOML config"));
        Ok(())
    }

    #[test]
    fn unsupported_config_version_is_rejected() -> Result<()> {
        let (_temp, path) = write_config("version = 7\n")?;
        let error = Config::load(&path).expect_err("future version should fail");
        assert!(error.to_string().contains("unsupported config version 7"));
        Ok(())
    }

    #[test]
    fn default_path_honors_env_override() -> Result<()> {
        let _guard = env_lock();
        let temp = tempfile::tempdir()?;
        let override_path = temp.path().join("custom-config.toml");
        // SAFETY: test-only process-local env mutation.
        unsafe {
            std::env::set_var("SIFT_CONFIG_PATH", &override_path);
        }
        let resolved = Config::default_path()?;
        // SAFETY: test cleanup for process-local env mutation.
        unsafe {
            std::env::remove_var("SIFT_CONFIG_PATH");
        }
        assert_eq!(resolved, override_path);
        Ok(())
    }

    #[test]
    fn base_url_prefers_service_config_over_env() -> Result<()> {
        let _guard = env_lock();
        let (_temp, path) =
            write_config("version = 1\n[service]\nbase_url = \"http://from-config:3000\"\n")?;
        // SAFETY: test-only process-local env mutation.
        unsafe {
            std::env::set_var("SIFT_SERVICE_URL", "http://from-env:3000");
        }
        let config = Config::load(&path)?;
        let resolved = config.base_url()?;
        // SAFETY: test cleanup for process-local env mutation.
        unsafe {
            std::env::remove_var("SIFT_SERVICE_URL");
        }
        assert_eq!(resolved, "http://from-config:3000");
        Ok(())
    }

    #[test]
    fn api_key_falls_back_to_env_when_config_omits_it() -> Result<()> {
        let _guard = env_lock();
        let (_temp, path) = write_config("version = 1\n")?;
        // SAFETY: test-only process-local env mutation.
        unsafe {
            std::env::set_var("SIFT_API_KEY", "env-key");
        }
        let config = Config::load(&path)?;
        let resolved = config.api_key()?;
        // SAFETY: test cleanup for process-local env mutation.
        unsafe {
            std::env::remove_var("SIFT_API_KEY");
        }
        assert_eq!(resolved, "env-key");
        Ok(())
    }

    #[test]
    fn missing_endpoint_errors_with_remediation() -> Result<()> {
        let _guard = env_lock();
        // SAFETY: test-only process-local env mutation.
        unsafe {
            std::env::remove_var("SIFT_SERVICE_URL");
            std::env::remove_var("SIFT_API_KEY");
        }
        let config = Config::default();
        let url_error = config.base_url().expect_err("missing endpoint should fail");
        assert!(url_error.to_string().contains("SIFT_SERVICE_URL"));
        let key_error = config.api_key().expect_err("missing key should fail");
        assert!(key_error.to_string().contains("SIFT_API_KEY"));
        Ok(())
    }

    #[test]
    fn empty_table_list_is_rejected() -> Result<()> {
        let (_temp, path) = write_config("version = 1\n[service]\ntables = []\n")?;
        let error = Config::load(&path).expect_err("empty table list should fail");
        assert!(error.to_string().contains("must not be empty"));
        Ok(())
    }

    #[test]
    fn unsafe_table_name_is_rejected() -> Result<()> {
        let (_temp, path) =
            write_config("version = 1\n[service]\ntables = [\"queue; drop table users\"]\n")?;
        let error = Config::load(&path).expect_err("unsafe table name should fail");
        assert!(error.to_string().contains("invalid table name"));
        Ok(())
    }

    #[test]
    fn unknown_filter_is_rejected() -> Result<()> {
        let (_temp, path) = write_config("version = 1\n[ui]\nfilter = \"urgent\"\n")?;
        let error = Config::load(&path).expect_err("unknown filter should fail");
        assert!(error.to_string().contains("ui.filter"));
        Ok(())
    }

    #[test]
    fn timeout_parses_ms_seconds_and_minutes() -> Result<()> {
        assert_eq!(parse_duration("500ms")?, Duration::from_millis(500));
        assert_eq!(parse_duration("10s")?, Duration::from_secs(10));
        assert_eq!(parse_duration("2m")?, Duration::from_secs(120));
        Ok(())
    }

    #[test]
    fn non_positive_timeout_is_rejected() -> Result<()> {
        let (_temp, path) = write_config("version = 1\n[service]\ntimeout = \"0s\"\n")?;
        let error = Config::load(&path).expect_err("zero timeout should fail");
        assert!(error.to_string().contains("must be positive"));
        Ok(())
    }

    #[test]
    fn example_config_includes_required_sections() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("config.toml");
        let example = Config::example_config(&path);
        assert!(example.contains("version = 1"));
        assert!(example.contains("[service]"));
        assert!(example.contains("[ui]"));
        assert!(example.contains("tables"));
        Ok(())
    }
}
