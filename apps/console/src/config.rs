use std::{fs, path::Path, time::Duration};

use anyhow::Context;
use client_core::{RetryPolicy, DEFAULT_SERVER};
use serde::Deserialize;

pub const DEFAULT_CONFIG_FILE: &str = "dsp-console.toml";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub server_url: String,
    pub email: Option<String>,
    pub password: Option<String>,
    pub retry_attempts: u32,
    pub retry_base_delay_ms: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server_url: DEFAULT_SERVER.into(),
            email: None,
            password: None,
            retry_attempts: 7,
            retry_base_delay_ms: 1000,
        }
    }
}

/// Every key is optional; missing keys keep the previous value.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileSettings {
    server_url: Option<String>,
    email: Option<String>,
    password: Option<String>,
    retry_attempts: Option<u32>,
    retry_base_delay_ms: Option<u64>,
}

impl Settings {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.retry_attempts,
            base_delay: Duration::from_millis(self.retry_base_delay_ms),
            ..RetryPolicy::default()
        }
    }

    /// Both email and password are needed to log in.
    pub fn credentials(&self) -> Option<(&str, &str)> {
        Some((self.email.as_deref()?, self.password.as_deref()?))
    }

    fn apply_file(&mut self, raw: &str) -> anyhow::Result<()> {
        let file: FileSettings = toml::from_str(raw)?;
        if let Some(v) = file.server_url {
            self.server_url = v;
        }
        if file.email.is_some() {
            self.email = file.email;
        }
        if file.password.is_some() {
            self.password = file.password;
        }
        if let Some(v) = file.retry_attempts {
            self.retry_attempts = v;
        }
        if let Some(v) = file.retry_base_delay_ms {
            self.retry_base_delay_ms = v;
        }
        Ok(())
    }

    /// `APP__*` names take precedence over the `DSP_*` ones.
    fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) {
        let pick = |names: [&str; 2]| names.iter().rev().find_map(|name| var(name));

        if let Some(v) = pick(["DSP_SERVER", "APP__SERVER_URL"]) {
            self.server_url = v;
        }
        if let Some(v) = pick(["DSP_EMAIL", "APP__EMAIL"]) {
            self.email = Some(v);
        }
        if let Some(v) = pick(["DSP_PASSWORD", "APP__PASSWORD"]) {
            self.password = Some(v);
        }
        if let Some(v) = pick(["DSP_RETRY_ATTEMPTS", "APP__RETRY_ATTEMPTS"]) {
            if let Ok(parsed) = v.parse::<u32>() {
                self.retry_attempts = parsed;
            }
        }
        if let Some(v) = pick(["DSP_RETRY_BASE_DELAY_MS", "APP__RETRY_BASE_DELAY_MS"]) {
            if let Ok(parsed) = v.parse::<u64>() {
                self.retry_base_delay_ms = parsed;
            }
        }
    }
}

/// Defaults, then the config file, then the environment. An explicit
/// `config` path must exist; the default file is optional.
pub fn load_settings(config: Option<&Path>) -> anyhow::Result<Settings> {
    let mut settings = Settings::default();

    match config {
        Some(path) => {
            let raw = fs::read_to_string(path)
                .with_context(|| format!("failed to read config file '{}'", path.display()))?;
            settings
                .apply_file(&raw)
                .with_context(|| format!("invalid config file '{}'", path.display()))?;
        }
        None => {
            if let Ok(raw) = fs::read_to_string(DEFAULT_CONFIG_FILE) {
                settings
                    .apply_file(&raw)
                    .with_context(|| format!("invalid config file '{DEFAULT_CONFIG_FILE}'"))?;
            }
        }
    }

    settings.apply_env(|name| std::env::var(name).ok());
    Ok(settings)
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
