use std::{
    fs, io,
    path::{Path, PathBuf},
    time::Duration,
};

use serde::Deserialize;
use thiserror::Error;
use url::Url;

use crate::RetryPolicy;

pub const DEFAULT_CONFIG_FILE: &str = "daily_poem.toml";
pub const DEFAULT_SERVICE_URL: &str = "http://127.0.0.1:4943/";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file '{}': {source}", path.display())]
    Read { path: PathBuf, source: io::Error },
    #[error("failed to parse config file '{}': {source}", path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("invalid service url '{value}': {source}")]
    InvalidUrl {
        value: String,
        source: url::ParseError,
    },
    #[error("service url '{0}' must use http or https")]
    UnsupportedScheme(String),
    #[error("failed to build http client: {0}")]
    HttpClient(#[from] reqwest::Error),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientSettings {
    /// Normalized base URL, always ending in `/`.
    pub service_url: String,
    pub request_timeout: Duration,
    pub retry: RetryPolicy,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            service_url: DEFAULT_SERVICE_URL.to_string(),
            request_timeout: Duration::from_millis(10_000),
            retry: RetryPolicy {
                attempts: 0,
                delay: Duration::from_millis(500),
            },
        }
    }
}

impl ClientSettings {
    pub fn with_service_url(mut self, raw: &str) -> Result<Self, ConfigError> {
        self.service_url = parse_service_url(raw)?.to_string();
        Ok(self)
    }

    pub fn service_url(&self) -> Result<Url, ConfigError> {
        parse_service_url(&self.service_url)
    }
}

#[derive(Debug, Default, Deserialize)]
struct FileSettings {
    service_url: Option<String>,
    request_timeout_ms: Option<u64>,
    load_retry_attempts: Option<u32>,
    load_retry_delay_ms: Option<u64>,
}

/// Loads settings from defaults, the TOML file and the process environment, in that order.
///
/// Without an explicit path a missing `daily_poem.toml` is not an error.
pub fn load_settings(config_path: Option<&Path>) -> Result<ClientSettings, ConfigError> {
    load_settings_with(config_path, |key| std::env::var(key).ok())
}

pub fn load_settings_with(
    config_path: Option<&Path>,
    env: impl Fn(&str) -> Option<String>,
) -> Result<ClientSettings, ConfigError> {
    let mut settings = ClientSettings::default();

    let file = match config_path {
        Some(path) => Some(read_file(path)?),
        None => {
            let path = Path::new(DEFAULT_CONFIG_FILE);
            if path.exists() {
                Some(read_file(path)?)
            } else {
                None
            }
        }
    };

    if let Some(file) = file {
        if let Some(v) = file.service_url {
            settings.service_url = parse_service_url(&v)?.to_string();
        }
        if let Some(v) = file.request_timeout_ms {
            settings.request_timeout = Duration::from_millis(v);
        }
        if let Some(v) = file.load_retry_attempts {
            settings.retry.attempts = v;
        }
        if let Some(v) = file.load_retry_delay_ms {
            settings.retry.delay = Duration::from_millis(v);
        }
    }

    if let Some(v) = env("POEM_SERVICE_URL") {
        settings.service_url = parse_service_url(&v)?.to_string();
    }
    if let Some(v) = env("APP__SERVICE_URL") {
        settings.service_url = parse_service_url(&v)?.to_string();
    }

    if let Some(v) = env("APP__REQUEST_TIMEOUT_MS").and_then(|v| v.parse::<u64>().ok()) {
        settings.request_timeout = Duration::from_millis(v);
    }
    if let Some(v) = env("APP__LOAD_RETRY_ATTEMPTS").and_then(|v| v.parse::<u32>().ok()) {
        settings.retry.attempts = v;
    }
    if let Some(v) = env("APP__LOAD_RETRY_DELAY_MS").and_then(|v| v.parse::<u64>().ok()) {
        settings.retry.delay = Duration::from_millis(v);
    }

    Ok(settings)
}

fn read_file(path: &Path) -> Result<FileSettings, ConfigError> {
    let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&raw).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

pub fn parse_service_url(raw: &str) -> Result<Url, ConfigError> {
    let raw = raw.trim();
    let url = Url::parse(raw).map_err(|source| ConfigError::InvalidUrl {
        value: raw.to_string(),
        source,
    })?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::UnsupportedScheme(raw.to_string()));
    }
    Ok(with_trailing_slash(url))
}

/// Relative endpoint paths join under the last segment only when the base ends in '/'.
pub(crate) fn with_trailing_slash(mut url: Url) -> Url {
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}

#[cfg(test)]
mod tests {
    use std::{
        collections::HashMap,
        env,
        time::{SystemTime, UNIX_EPOCH},
    };

    use super::*;

    fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    fn temp_config(name: &str, contents: &str) -> PathBuf {
        let suffix = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos();
        let dir = env::temp_dir().join(format!("daily_poem_config_{name}_{suffix}"));
        fs::create_dir_all(&dir).expect("temp dir");
        let path = dir.join("daily_poem.toml");
        fs::write(&path, contents).expect("write config");
        path
    }

    #[test]
    fn defaults_point_at_local_replica() {
        let settings = ClientSettings::default();
        assert_eq!(settings.service_url, DEFAULT_SERVICE_URL);
        assert_eq!(
            settings.service_url().expect("url").as_str(),
            DEFAULT_SERVICE_URL
        );
        assert_eq!(settings.retry.attempts, 0);
    }

    #[test]
    fn file_values_override_defaults() {
        let path = temp_config(
            "file_values",
            r#"
service_url = "https://poems.example.net/api"
request_timeout_ms = 2500
load_retry_attempts = 3
load_retry_delay_ms = 50
"#,
        );

        let settings = load_settings_with(Some(&path), env_from(&[])).expect("settings");
        assert_eq!(settings.service_url, "https://poems.example.net/api/");
        assert_eq!(settings.request_timeout, Duration::from_millis(2500));
        assert_eq!(settings.retry.attempts, 3);
        assert_eq!(settings.retry.delay, Duration::from_millis(50));

        fs::remove_dir_all(path.parent().expect("parent")).expect("cleanup");
    }

    #[test]
    fn env_overrides_file_and_app_prefix_wins() {
        let path = temp_config("env_overrides", r#"service_url = "http://file.example/""#);
        let settings = load_settings_with(
            Some(&path),
            env_from(&[
                ("POEM_SERVICE_URL", "http://legacy.example/"),
                ("APP__SERVICE_URL", "http://app.example/"),
                ("APP__LOAD_RETRY_ATTEMPTS", "2"),
            ]),
        )
        .expect("settings");
        assert_eq!(settings.service_url, "http://app.example/");
        assert_eq!(settings.retry.attempts, 2);

        fs::remove_dir_all(path.parent().expect("parent")).expect("cleanup");
    }

    #[test]
    fn unparsable_numeric_env_is_ignored() {
        let settings = load_settings_with(
            None,
            env_from(&[("APP__REQUEST_TIMEOUT_MS", "soon")]),
        )
        .expect("settings");
        assert_eq!(settings.request_timeout, Duration::from_millis(10_000));
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        let missing = env::temp_dir().join("daily_poem_missing_dir/none.toml");
        let err = load_settings_with(Some(&missing), env_from(&[])).expect_err("must fail");
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn malformed_file_is_an_error() {
        let path = temp_config("malformed", "service_url = [");
        let err = load_settings_with(Some(&path), env_from(&[])).expect_err("must fail");
        assert!(matches!(err, ConfigError::Parse { .. }));
        fs::remove_dir_all(path.parent().expect("parent")).expect("cleanup");
    }

    #[test]
    fn rejects_non_http_service_url() {
        assert!(matches!(
            parse_service_url("ftp://poems.example/"),
            Err(ConfigError::UnsupportedScheme(_))
        ));
        assert!(matches!(
            parse_service_url("not a url"),
            Err(ConfigError::InvalidUrl { .. })
        ));
    }

    #[test]
    fn base_path_gains_exactly_one_trailing_slash() {
        let bare = Url::parse("http://poems.example/api").expect("url");
        assert_eq!(with_trailing_slash(bare).as_str(), "http://poems.example/api/");
        let slashed = Url::parse("http://poems.example/api/").expect("url");
        assert_eq!(with_trailing_slash(slashed).as_str(), "http://poems.example/api/");
        assert_eq!(
            parse_service_url(" http://poems.example/api ")
                .expect("url")
                .as_str(),
            "http://poems.example/api/"
        );
    }
}
