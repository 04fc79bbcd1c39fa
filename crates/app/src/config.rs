use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use thiserror::Error;

const DEFAULT_SUPPLEMENTAL_URL: &str =
    "https://deepsight.gg/manifest/DeepsightSocketExtendedDefinition.json";

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub http_addr: SocketAddr,
    pub database_url: Option<String>,
    pub bungie_api_key: String,
    pub bungie_base_url: String,
    pub supplemental_url: String,
    pub manifest_language: String,
    pub manifest_ttl: Duration,
    /// Zero disables the periodic refresh; the worker then only warms once.
    pub manifest_refresh_interval: Duration,
    pub request_timeout: Duration,
    pub admin_password_hash: Option<String>,
    pub admin_token_secret: Option<String>,
    pub cors_allow_origins: Vec<String>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid socket address: {0}")]
    InvalidSocket(String),
    #[error("invalid integer for {0}: {1}")]
    InvalidNumber(&'static str, String),
    #[error("invalid value for {0}: {1}")]
    InvalidValue(&'static str, String),
}

/// Typed reads over a key lookup, so tests need not touch the process env.
struct EnvReader<F> {
    lookup: F,
}

impl<F> EnvReader<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn string(&self, key: &'static str, default: &str) -> String {
        (self.lookup)(key).unwrap_or_else(|| default.to_string())
    }

    fn optional(&self, key: &'static str) -> Option<String> {
        (self.lookup)(key)
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    }

    fn secs(&self, key: &'static str, default: u64) -> Result<Duration, ConfigError> {
        let Some(raw) = (self.lookup)(key) else {
            return Ok(Duration::from_secs(default));
        };
        raw.trim()
            .parse()
            .map(Duration::from_secs)
            .map_err(|_| ConfigError::InvalidNumber(key, raw))
    }

    fn list(&self, key: &'static str) -> Vec<String> {
        self.optional(key)
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|origin| !origin.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = EnvReader { lookup };

        let http_addr_raw = env.string("D2BUILDS_HTTP_ADDR", "127.0.0.1:8080");
        let http_addr = http_addr_raw
            .parse()
            .map_err(|_| ConfigError::InvalidSocket(http_addr_raw.clone()))?;

        let bungie_base_url = env.string("D2BUILDS_BUNGIE_BASE_URL", "https://www.bungie.net");
        if !is_http_url(&bungie_base_url) {
            return Err(ConfigError::InvalidValue(
                "D2BUILDS_BUNGIE_BASE_URL",
                bungie_base_url,
            ));
        }
        let supplemental_url = env.string("D2BUILDS_SUPPLEMENTAL_URL", DEFAULT_SUPPLEMENTAL_URL);
        if !is_http_url(&supplemental_url) {
            return Err(ConfigError::InvalidValue(
                "D2BUILDS_SUPPLEMENTAL_URL",
                supplemental_url,
            ));
        }
        let manifest_language = env.string("D2BUILDS_MANIFEST_LANGUAGE", "en");
        if manifest_language.trim().is_empty() {
            return Err(ConfigError::InvalidValue(
                "D2BUILDS_MANIFEST_LANGUAGE",
                manifest_language,
            ));
        }
        let manifest_ttl = env.secs("D2BUILDS_MANIFEST_TTL_SECS", 24 * 60 * 60)?;
        if manifest_ttl.is_zero() {
            return Err(ConfigError::InvalidValue(
                "D2BUILDS_MANIFEST_TTL_SECS",
                "0".to_string(),
            ));
        }

        Ok(Self {
            http_addr,
            database_url: env.optional("D2BUILDS_DATABASE_URL"),
            bungie_api_key: env.optional("D2BUILDS_BUNGIE_API_KEY").unwrap_or_default(),
            bungie_base_url,
            supplemental_url,
            manifest_language: manifest_language.trim().to_string(),
            manifest_ttl,
            manifest_refresh_interval: env.secs("D2BUILDS_MANIFEST_REFRESH_INTERVAL_SECS", 60 * 60)?,
            request_timeout: env.secs("D2BUILDS_REQUEST_TIMEOUT_SECS", 60)?,
            admin_password_hash: env.optional("D2BUILDS_ADMIN_PASSWORD_HASH"),
            admin_token_secret: env.optional("D2BUILDS_ADMIN_TOKEN_SECRET"),
            cors_allow_origins: env.list("D2BUILDS_CORS_ALLOW_ORIGINS"),
        })
    }

    pub fn admin_auth_configured(&self) -> bool {
        self.admin_password_hash.is_some() && self.admin_token_secret.is_some()
    }
}

fn is_http_url(value: &str) -> bool {
    value.starts_with("https://") || value.starts_with("http://")
}

/// Loads `.env` from the working directory. Variables already set win.
pub fn load_dotenv() -> Result<(), std::io::Error> {
    let path = Path::new(".env");
    if !path.exists() {
        return Ok(());
    }
    let contents = std::fs::read_to_string(path)?;
    for (key, value) in contents.lines().filter_map(parse_dotenv_line) {
        if std::env::var_os(&key).is_none() {
            // Safety: invoked during startup before any threads are spawned.
            unsafe {
                std::env::set_var(key, value);
            }
        }
    }
    Ok(())
}

fn parse_dotenv_line(line: &str) -> Option<(String, String)> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return None;
    }
    let line = line.strip_prefix("export ").unwrap_or(line);
    let (key, value) = line.split_once('=')?;
    let key = key.trim();
    if key.is_empty() {
        return None;
    }
    Some((key.to_string(), unquote(value.trim())))
}

fn unquote(value: &str) -> String {
    if let Some(inner) = value.strip_prefix('"').and_then(|rest| rest.strip_suffix('"')) {
        return unescape(inner);
    }
    if let Some(inner) = value.strip_prefix('\'').and_then(|rest| rest.strip_suffix('\'')) {
        return inner.to_string();
    }
    value.to_string()
}

fn unescape(value: &str) -> String {
    let mut output = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            output.push(ch);
            continue;
        }
        match chars.next() {
            Some('n') => output.push('\n'),
            Some('t') => output.push('\t'),
            Some(escaped @ ('\\' | '"')) => output.push(escaped),
            Some(other) => {
                output.push('\\');
                output.push(other);
            }
            None => output.push('\\'),
        }
    }
    output
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config(pairs: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let env: HashMap<String, String> = pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        AppConfig::from_lookup(|key| env.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_unset() {
        let config = config(&[]).unwrap();
        assert_eq!(config.http_addr.to_string(), "127.0.0.1:8080");
        assert_eq!(config.bungie_base_url, "https://www.bungie.net");
        assert_eq!(config.manifest_language, "en");
        assert_eq!(config.manifest_ttl, Duration::from_secs(86_400));
        assert_eq!(config.manifest_refresh_interval, Duration::from_secs(3_600));
        assert_eq!(config.request_timeout, Duration::from_secs(60));
        assert!(config.database_url.is_none());
        assert!(!config.admin_auth_configured());
        assert!(config.cors_allow_origins.is_empty());
    }

    #[test]
    fn overrides_are_parsed() {
        let config = config(&[
            ("D2BUILDS_MANIFEST_TTL_SECS", "600"),
            ("D2BUILDS_MANIFEST_REFRESH_INTERVAL_SECS", "0"),
            ("D2BUILDS_DATABASE_URL", "  "),
            ("D2BUILDS_CORS_ALLOW_ORIGINS", "https://a.example, ,https://b.example"),
            ("D2BUILDS_ADMIN_PASSWORD_HASH", "$argon2id$hash"),
            ("D2BUILDS_ADMIN_TOKEN_SECRET", "secret"),
        ])
        .unwrap();
        assert_eq!(config.manifest_ttl, Duration::from_secs(600));
        assert!(config.manifest_refresh_interval.is_zero());
        assert!(config.database_url.is_none());
        assert_eq!(
            config.cors_allow_origins,
            vec!["https://a.example", "https://b.example"]
        );
        assert!(config.admin_auth_configured());
    }

    #[test]
    fn invalid_values_are_rejected() {
        assert!(matches!(
            config(&[("D2BUILDS_HTTP_ADDR", "nowhere")]),
            Err(ConfigError::InvalidSocket(_))
        ));
        assert!(matches!(
            config(&[("D2BUILDS_MANIFEST_TTL_SECS", "soon")]),
            Err(ConfigError::InvalidNumber("D2BUILDS_MANIFEST_TTL_SECS", _))
        ));
        assert!(matches!(
            config(&[("D2BUILDS_MANIFEST_TTL_SECS", "0")]),
            Err(ConfigError::InvalidValue(..))
        ));
        assert!(matches!(
            config(&[("D2BUILDS_BUNGIE_BASE_URL", "bungie.net")]),
            Err(ConfigError::InvalidValue(..))
        ));
    }

    #[test]
    fn dotenv_lines() {
        assert_eq!(
            parse_dotenv_line("export D2BUILDS_BUNGIE_API_KEY=abc"),
            Some(("D2BUILDS_BUNGIE_API_KEY".to_string(), "abc".to_string()))
        );
        assert_eq!(
            parse_dotenv_line(r#"KEY="line\n\"quoted\"""#).map(|(_, value)| value),
            Some("line\n\"quoted\"".to_string())
        );
        assert_eq!(
            parse_dotenv_line("KEY='kept $as is'").map(|(_, value)| value),
            Some("kept $as is".to_string())
        );
        assert!(parse_dotenv_line("# comment").is_none());
        assert!(parse_dotenv_line("=value").is_none());
    }
}
