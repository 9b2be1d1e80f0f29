use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Deserializer, de};

use crate::error::SettingsError;
use crate::session::PoolOptions;

const DEFAULT_MAX_OPEN_CONNS: usize = 10;
const DEFAULT_MAX_IDLE_CONNS: usize = 2;

/// Data source settings as stored by the host, plus decrypted secrets
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DataSourceSettings {
    pub path: String,
    pub timezone: String,
    pub max_open_conns: usize,
    pub max_idle_conns: usize,
    #[serde(deserialize_with = "deserialize_duration")]
    pub max_idle_time: Option<Duration>,
    #[serde(rename = "maxLifeTime", deserialize_with = "deserialize_duration")]
    pub max_lifetime: Option<Duration>,
    pub require_password: bool,
    #[serde(skip)]
    pub secrets: SecretSettings,
}

#[derive(Debug, Clone, Default)]
pub struct SecretSettings {
    pub password: String,
}

impl DataSourceSettings {
    /// Parse the JSON settings and attach secrets from the decrypted map
    pub fn load(json: &[u8], decrypted: &HashMap<String, String>) -> crate::Result<Self> {
        let mut settings: DataSourceSettings = serde_json::from_slice(json).map_err(SettingsError::from)?;
        settings.secrets = SecretSettings {
            password: decrypted.get("password").cloned().unwrap_or_default(),
        };
        Ok(settings)
    }

    /// Pool options, with zero values meaning "use the default"
    pub fn pool_options(&self) -> PoolOptions {
        PoolOptions {
            path: self.path.clone(),
            max_open_conns: if self.max_open_conns == 0 { DEFAULT_MAX_OPEN_CONNS } else { self.max_open_conns },
            max_idle_conns: if self.max_idle_conns == 0 { DEFAULT_MAX_IDLE_CONNS } else { self.max_idle_conns },
            max_idle_time: self.max_idle_time,
            max_lifetime: self.max_lifetime,
            ..PoolOptions::default()
        }
    }
}

fn deserialize_duration<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Nanos(f64),
        Text(String),
    }

    let duration = match Option::<Raw>::deserialize(deserializer)? {
        None => return Ok(None),
        Some(Raw::Nanos(n)) if n < 0.0 => return Err(de::Error::custom("negative duration")),
        Some(Raw::Nanos(n)) => Duration::from_nanos(n as u64),
        Some(Raw::Text(text)) => parse_duration(&text).map_err(de::Error::custom)?,
    };
    Ok((!duration.is_zero()).then_some(duration))
}

/// Parse durations such as `"300ms"`, `"1.5h"` or `"1h30m"`
pub fn parse_duration(text: &str) -> Result<Duration, SettingsError> {
    let invalid = || SettingsError::InvalidDuration(text.to_string());
    let trimmed = text.trim();
    if trimmed == "0" {
        return Ok(Duration::ZERO);
    }
    if trimmed.is_empty() {
        return Err(invalid());
    }

    let mut total = 0f64;
    let mut rest = trimmed;
    while !rest.is_empty() {
        let number_len = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .ok_or_else(invalid)?;
        let value: f64 = rest[..number_len].parse().map_err(|_| invalid())?;
        rest = &rest[number_len..];

        let unit_len = rest
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(rest.len());
        let nanos_per_unit = match &rest[..unit_len] {
            "ns" => 1.0,
            "us" | "µs" => 1e3,
            "ms" => 1e6,
            "s" => 1e9,
            "m" => 60e9,
            "h" => 3600e9,
            _ => return Err(invalid()),
        };
        rest = &rest[unit_len..];
        total += value * nanos_per_unit;
    }

    Ok(Duration::from_nanos(total.round() as u64))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SqlFrameError;

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("30s").unwrap(), Duration::from_secs(30));
        assert_eq!(parse_duration("5m").unwrap(), Duration::from_secs(300));
        assert_eq!(parse_duration("1h30m").unwrap(), Duration::from_secs(5400));
        assert_eq!(parse_duration("250ms").unwrap(), Duration::from_millis(250));
        assert_eq!(parse_duration("1.5h").unwrap(), Duration::from_secs(5400));
        assert_eq!(parse_duration("0").unwrap(), Duration::ZERO);
    }

    #[test]
    fn test_parse_duration_rejects_garbage() {
        assert!(parse_duration("").is_err());
        assert!(parse_duration("10").is_err());
        assert!(parse_duration("10 parsecs").is_err());
        assert!(parse_duration("m5").is_err());
    }

    #[test]
    fn test_load_settings() {
        let json = br#"{
            "path": "/tmp/data.db",
            "timezone": "Europe/Berlin",
            "maxOpenConns": 4,
            "maxIdleTime": "1m",
            "maxLifeTime": 3000000000
        }"#;
        let secrets = HashMap::from([("password".to_string(), "hunter2".to_string())]);
        let settings = DataSourceSettings::load(json, &secrets).unwrap();

        assert_eq!(settings.path, "/tmp/data.db");
        assert_eq!(settings.timezone, "Europe/Berlin");
        assert_eq!(settings.secrets.password, "hunter2");
        let options = settings.pool_options();
        assert_eq!(options.max_open_conns, 4);
        assert_eq!(options.max_idle_conns, DEFAULT_MAX_IDLE_CONNS);
        assert_eq!(options.max_idle_time, Some(Duration::from_secs(60)));
        assert_eq!(options.max_lifetime, Some(Duration::from_secs(3)));
    }

    #[test]
    fn test_zero_durations_disable_limits() {
        let settings = DataSourceSettings::load(br#"{"maxIdleTime": 0, "maxLifeTime": "0"}"#, &HashMap::new()).unwrap();
        assert_eq!(settings.max_idle_time, None);
        assert_eq!(settings.max_lifetime, None);
        assert!(settings.secrets.password.is_empty());
        assert!(settings.timezone.is_empty());
    }

    #[test]
    fn test_invalid_settings() {
        assert!(matches!(
            DataSourceSettings::load(b"not json", &HashMap::new()),
            Err(SqlFrameError::Settings(SettingsError::Json(_)))
        ));
        assert!(DataSourceSettings::load(br#"{"maxIdleTime": "soon"}"#, &HashMap::new()).is_err());
    }
}
