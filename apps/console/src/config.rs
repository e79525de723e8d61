use std::{collections::HashMap, fs, path::PathBuf};

use client_core::{HttpBackendConfig, DEFAULT_BUCKET};

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub backend_url: String,
    pub anon_key: String,
    pub service_key: Option<String>,
    pub storage_bucket: String,
    pub session_file: PathBuf,
    pub log_filter: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            backend_url: "http://127.0.0.1:54321".into(),
            anon_key: String::new(),
            service_key: None,
            storage_bucket: DEFAULT_BUCKET.into(),
            session_file: default_session_file(),
            log_filter: "info".into(),
        }
    }
}

impl Settings {
    pub fn backend_config(&self) -> HttpBackendConfig {
        HttpBackendConfig {
            base_url: self.backend_url.clone(),
            anon_key: self.anon_key.clone(),
            service_key: self.service_key.clone(),
        }
    }
}

fn default_session_file() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("staff_console")
        .join("session.json")
}

pub fn load_settings() -> Settings {
    let file_cfg = fs::read_to_string("console.toml")
        .ok()
        .and_then(|raw| toml::from_str::<HashMap<String, String>>(&raw).ok())
        .unwrap_or_default();
    resolve(file_cfg, |key| std::env::var(key).ok())
}

/// Defaults, then `console.toml` keys, then env vars. For each setting the
/// `APP__` form wins over the plain one.
fn resolve(file_cfg: HashMap<String, String>, env: impl Fn(&str) -> Option<String>) -> Settings {
    let mut settings = Settings::default();
    let lookup = |file_key: &str, env_key: &str| {
        env(&format!("APP__{env_key}"))
            .or_else(|| env(env_key))
            .or_else(|| file_cfg.get(file_key).cloned())
            .filter(|value| !value.trim().is_empty())
    };

    if let Some(v) = lookup("backend_url", "BACKEND_URL") {
        settings.backend_url = v;
    }
    if let Some(v) = lookup("anon_key", "BACKEND_ANON_KEY") {
        settings.anon_key = v;
    }
    if let Some(v) = lookup("service_key", "BACKEND_SERVICE_KEY") {
        settings.service_key = Some(v);
    }
    if let Some(v) = lookup("storage_bucket", "STORAGE_BUCKET") {
        settings.storage_bucket = v;
    }
    if let Some(v) = lookup("session_file", "SESSION_FILE") {
        settings.session_file = PathBuf::from(v);
    }
    if let Some(v) = lookup("log_filter", "LOG_FILTER") {
        settings.log_filter = v;
    }

    settings
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env_of(pairs: &'static [(&'static str, &'static str)]) -> impl Fn(&str) -> Option<String> {
        move |key| {
            pairs
                .iter()
                .find(|(name, _)| *name == key)
                .map(|(_, value)| value.to_string())
        }
    }

    #[test]
    fn defaults_point_at_local_backend_and_cnic_bucket() {
        let settings = resolve(HashMap::new(), env_of(&[]));
        assert_eq!(settings.storage_bucket, "cnic-images");
        assert_eq!(settings.service_key, None);
        assert!(settings.session_file.ends_with("staff_console/session.json"));
    }

    #[test]
    fn env_overrides_file_and_prefixed_form_wins() {
        let file_cfg = HashMap::from([
            ("backend_url".to_string(), "https://from-file.example.co".to_string()),
            ("anon_key".to_string(), "file-anon".to_string()),
            ("log_filter".to_string(), "debug".to_string()),
        ]);
        let settings = resolve(
            file_cfg,
            env_of(&[
                ("BACKEND_URL", "https://plain.example.co"),
                ("APP__BACKEND_URL", "https://prefixed.example.co"),
                ("BACKEND_SERVICE_KEY", "service"),
                ("SESSION_FILE", "/tmp/console-session.json"),
            ]),
        );
        assert_eq!(settings.backend_url, "https://prefixed.example.co");
        assert_eq!(settings.anon_key, "file-anon");
        assert_eq!(settings.service_key.as_deref(), Some("service"));
        assert_eq!(settings.log_filter, "debug");
        assert_eq!(settings.session_file, PathBuf::from("/tmp/console-session.json"));
    }

    #[test]
    fn blank_values_are_ignored() {
        let settings = resolve(HashMap::new(), env_of(&[("BACKEND_SERVICE_KEY", "  ")]));
        assert_eq!(settings.service_key, None);
    }
}
