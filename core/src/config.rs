//! Startup configuration, read once from `IMAGECOMPARE_*` variables.
//!
//! Invalid values are logged and replaced by their defaults; nothing here is
//! required for simulated mode.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use serde::Serialize;

pub const DEFAULT_API_BASE_URL: &str = "https://api-main-poc.aiml.asu.edu";
pub const DEFAULT_SIMULATED_DELAY_MS: u64 = 4000;

/// Which provider client implementation the process runs with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ClientMode {
    Simulated,
    Remote,
}

impl FromStr for ClientMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "simulated" | "demo" | "offline" => Ok(Self::Simulated),
            "remote" | "live" => Ok(Self::Remote),
            other => Err(format!("unknown client mode '{other}'")),
        }
    }
}

impl fmt::Display for ClientMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Simulated => f.write_str("simulated"),
            Self::Remote => f.write_str("remote"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub mode: ClientMode,
    pub api_base_url: String,
    pub project_id: Option<String>,
    pub access_token: Option<String>,
    pub simulated_delay: Duration,
    pub mapping_path: Option<PathBuf>,
    pub data_dir: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            mode: ClientMode::Simulated,
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            project_id: None,
            access_token: None,
            simulated_delay: Duration::from_millis(DEFAULT_SIMULATED_DELAY_MS),
            mapping_path: None,
            data_dir: None,
        }
    }
}

fn parse_or<T: FromStr>(var: &str, raw: Option<String>, default: T) -> T
where
    T::Err: fmt::Display,
{
    match raw {
        Some(val) => match val.parse() {
            Ok(parsed) => parsed,
            Err(e) => {
                log::warn!("Invalid value '{val}' for {var}: {e}. Using default.");
                default
            }
        },
        None => default,
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from any key lookup; blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let defaults = Self::default();

        let delay_ms = parse_or(
            "IMAGECOMPARE_SIMULATED_DELAY_MS",
            get("IMAGECOMPARE_SIMULATED_DELAY_MS"),
            DEFAULT_SIMULATED_DELAY_MS,
        );

        Self {
            mode: parse_or("IMAGECOMPARE_MODE", get("IMAGECOMPARE_MODE"), defaults.mode),
            api_base_url: get("IMAGECOMPARE_API_BASE_URL")
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or(defaults.api_base_url),
            project_id: get("IMAGECOMPARE_PROJECT_ID"),
            access_token: get("IMAGECOMPARE_ACCESS_TOKEN"),
            simulated_delay: Duration::from_millis(delay_ms),
            mapping_path: get("IMAGECOMPARE_MAPPING_PATH").map(PathBuf::from),
            data_dir: get("IMAGECOMPARE_DATA_DIR").map(PathBuf::from),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> AppConfig {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_unset() {
        let config = config_from(&[]);
        assert_eq!(config.mode, ClientMode::Simulated);
        assert_eq!(config.api_base_url, DEFAULT_API_BASE_URL);
        assert_eq!(config.simulated_delay, Duration::from_millis(4000));
        assert!(config.project_id.is_none());
    }

    #[test]
    fn values_are_parsed_and_trimmed() {
        let config = config_from(&[
            ("IMAGECOMPARE_MODE", "Remote"),
            ("IMAGECOMPARE_API_BASE_URL", "https://gen.example.com/"),
            ("IMAGECOMPARE_PROJECT_ID", " proj-1 "),
            ("IMAGECOMPARE_SIMULATED_DELAY_MS", "25"),
            ("IMAGECOMPARE_ACCESS_TOKEN", ""),
        ]);
        assert_eq!(config.mode, ClientMode::Remote);
        assert_eq!(config.api_base_url, "https://gen.example.com");
        assert_eq!(config.project_id.as_deref(), Some("proj-1"));
        assert_eq!(config.simulated_delay, Duration::from_millis(25));
        assert!(config.access_token.is_none());
    }

    #[test]
    fn invalid_values_fall_back() {
        let config = config_from(&[
            ("IMAGECOMPARE_MODE", "quantum"),
            ("IMAGECOMPARE_SIMULATED_DELAY_MS", "soon"),
        ]);
        assert_eq!(config.mode, ClientMode::Simulated);
        assert_eq!(config.simulated_delay, Duration::from_millis(4000));
    }
}
