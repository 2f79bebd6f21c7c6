/// Pipeline configuration and secret retrieval.
///
/// Static settings (site coordinates, evaluation hour, model path, SMS
/// recipient) live in a TOML file checked alongside the binary. Anything
/// credential-shaped is externalized to the environment and resolved
/// through `lookup_secret`, with `.env` loaded via dotenv at process
/// start — nothing sensitive is ever hardcoded or committed.
///
/// A secret is a named group of environment variables sharing a prefix:
/// secret "sms" with keys "account_sid" and "auth_token" resolves from
/// `SMS_ACCOUNT_SID` and `SMS_AUTH_TOKEN`. An empty group aborts the job.

use chrono::NaiveDate;
use serde::Deserialize;
use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use crate::model::PipelineError;

pub const DEFAULT_CONFIG_PATH: &str = "./spraycast.toml";

// ---------------------------------------------------------------------------
// Configuration file
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub site: SiteConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    pub notification: NotificationConfig,
}

/// The fixed location observations are fetched for.
#[derive(Debug, Clone, Deserialize)]
pub struct SiteConfig {
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Identifies which model/pipeline produced a prediction; part of the
    /// prediction store key.
    pub system_name: String,
    /// Hour of day (local) evaluated for scoring.
    pub evaluation_hour: u32,
    /// The most recent qualifying row must fall within this many hours of
    /// the invocation time, else scoring is skipped.
    pub recency_window_hours: i64,
    /// Path to the pretrained classifier artifact.
    pub model_path: PathBuf,
    /// Where ingestion starts when the observation store is empty.
    pub default_start_date: NaiveDate,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        PipelineConfig {
            system_name: "pulverizar_c1_v0".to_string(),
            evaluation_hour: 15,
            recency_window_hours: 80,
            model_path: PathBuf::from("./cb_v0.json"),
            default_start_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NotificationConfig {
    /// E.164 phone number the advisory SMS goes to.
    pub recipient: String,
    /// Sender number registered with the gateway.
    pub sender: String,
    /// Base URL of the SMS gateway REST API.
    pub gateway_url: String,
}

/// Loads the configuration file. A missing or invalid file aborts the
/// job the same way a missing secret does.
pub fn load_config(path: &Path) -> Result<Config, PipelineError> {
    let raw = fs::read_to_string(path).map_err(|e| {
        PipelineError::SecretRetrieval(format!("config file {}: {}", path.display(), e))
    })?;
    toml::from_str(&raw).map_err(|e| {
        PipelineError::SecretRetrieval(format!("config file {}: {}", path.display(), e))
    })
}

// ---------------------------------------------------------------------------
// Secret retrieval
// ---------------------------------------------------------------------------

/// Resolves a named secret as a key-value map from `{NAME}_*` environment
/// variables. Keys are the lowercased suffixes. Returns SecretRetrieval
/// if no variable carries the prefix.
pub fn lookup_secret(name: &str) -> Result<HashMap<String, String>, PipelineError> {
    let prefix = format!("{}_", name.to_uppercase());
    let map: HashMap<String, String> = env::vars()
        .filter_map(|(key, value)| {
            key.strip_prefix(&prefix)
                .map(|suffix| (suffix.to_lowercase(), value))
        })
        .collect();

    if map.is_empty() {
        return Err(PipelineError::SecretRetrieval(format!(
            "no {}* variables in environment",
            prefix
        )));
    }
    Ok(map)
}

fn secret_key(name: &str, key: &str) -> Result<String, PipelineError> {
    let mut map = lookup_secret(name)?;
    map.remove(key).ok_or_else(|| {
        PipelineError::SecretRetrieval(format!("secret '{}' is missing key '{}'", name, key))
    })
}

/// PostgreSQL connection string, from `DATABASE_URL`.
pub fn database_url() -> Result<String, PipelineError> {
    secret_key("database", "url")
}

/// Weather provider API key, from `WEATHER_API_KEY`.
pub fn weather_api_key() -> Result<String, PipelineError> {
    secret_key("weather", "api_key")
}

/// SMS gateway credentials, from `SMS_ACCOUNT_SID` / `SMS_AUTH_TOKEN`.
pub fn sms_credentials() -> Result<(String, String), PipelineError> {
    let mut map = lookup_secret("sms")?;
    let sid = map.remove("account_sid").ok_or_else(|| {
        PipelineError::SecretRetrieval("secret 'sms' is missing key 'account_sid'".to_string())
    })?;
    let token = map.remove("auth_token").ok_or_else(|| {
        PipelineError::SecretRetrieval("secret 'sms' is missing key 'auth_token'".to_string())
    })?;
    Ok((sid, token))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const FULL_CONFIG: &str = r#"
        [site]
        latitude = -22.5901
        longitude = -47.46

        [pipeline]
        system_name = "pulverizar_c1_v0"
        evaluation_hour = 15
        recency_window_hours = 80
        model_path = "./cb_v0.json"
        default_start_date = "2024-01-01"

        [notification]
        recipient = "+5511999990000"
        sender = "+15005550006"
        gateway_url = "https://sms.example.com/2010-04-01"
    "#;

    #[test]
    fn test_full_config_parses() {
        let config: Config = toml::from_str(FULL_CONFIG).unwrap();
        assert_eq!(config.site.latitude, -22.5901);
        assert_eq!(config.pipeline.evaluation_hour, 15);
        assert_eq!(config.pipeline.recency_window_hours, 80);
        assert_eq!(config.notification.recipient, "+5511999990000");
    }

    #[test]
    fn test_pipeline_section_is_optional_with_defaults() {
        let minimal = r#"
            [site]
            latitude = -22.5901
            longitude = -47.46

            [notification]
            recipient = "+5511999990000"
            sender = "+15005550006"
            gateway_url = "https://sms.example.com/2010-04-01"
        "#;
        let config: Config = toml::from_str(minimal).unwrap();
        assert_eq!(config.pipeline.system_name, "pulverizar_c1_v0");
        assert_eq!(config.pipeline.evaluation_hour, 15);
        assert_eq!(config.pipeline.recency_window_hours, 80);
        assert_eq!(
            config.pipeline.default_start_date,
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
        );
    }

    #[test]
    fn test_missing_site_section_is_rejected() {
        let broken = r#"
            [notification]
            recipient = "+5511999990000"
            sender = "+15005550006"
            gateway_url = "https://sms.example.com/2010-04-01"
        "#;
        assert!(toml::from_str::<Config>(broken).is_err());
    }

    #[test]
    fn test_lookup_secret_groups_by_prefix() {
        // SAFETY: test-only env mutation; keys are unique to this test.
        unsafe {
            env::set_var("TESTGROUP_ALPHA", "a");
            env::set_var("TESTGROUP_BETA_GAMMA", "bg");
        }
        let map = lookup_secret("testgroup").unwrap();
        assert_eq!(map.get("alpha").map(String::as_str), Some("a"));
        assert_eq!(map.get("beta_gamma").map(String::as_str), Some("bg"));
    }

    #[test]
    fn test_lookup_secret_missing_group_errors() {
        let err = lookup_secret("no_such_secret_group").unwrap_err();
        assert!(matches!(err, PipelineError::SecretRetrieval(_)));
    }

    #[test]
    fn test_load_config_missing_file_errors() {
        let err = load_config(Path::new("/nonexistent/spraycast.toml")).unwrap_err();
        assert!(matches!(err, PipelineError::SecretRetrieval(_)));
    }
}
