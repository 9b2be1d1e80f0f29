use std::collections::HashMap;

use serde::Serialize;
use tracing::error;

use crate::session::SqlitePool;
use crate::settings::DataSourceSettings;
use crate::SqlFrameError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Ok,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthCheckResult {
    pub status: HealthStatus,
    pub message: String,
}

impl HealthCheckResult {
    fn error(message: impl Into<String>) -> Self {
        Self { status: HealthStatus::Error, message: message.into() }
    }
}

/// Validate data source settings and check that the database answers
pub async fn check_health(json: &[u8], decrypted: &HashMap<String, String>) -> HealthCheckResult {
    let settings = match DataSourceSettings::load(json, decrypted) {
        Ok(settings) => settings,
        Err(e) => {
            error!("Health check failed to load settings: {}", e);
            return HealthCheckResult::error("Unable to load settings");
        }
    };

    if settings.require_password && settings.secrets.password.is_empty() {
        return HealthCheckResult::error("Password key is missing");
    }

    match ping_database(&settings).await {
        Ok(()) => HealthCheckResult { status: HealthStatus::Ok, message: "Data source is working".to_string() },
        Err(SqlFrameError::Pool(e)) => {
            error!("Health check failed to connect: {}", e);
            HealthCheckResult::error(format!("Unable to connect: {e}"))
        }
        Err(e) => HealthCheckResult::error(format!("Probe query failed: {e}")),
    }
}

async fn ping_database(settings: &DataSourceSettings) -> crate::Result<()> {
    let pool = SqlitePool::new(settings.pool_options());
    let result = async {
        let conn = pool.acquire().await?;
        conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))?;
        Ok::<_, SqlFrameError>(())
    }
    .await;
    pool.close();
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_healthy_in_memory() {
        let result = check_health(br#"{"path": ":memory:"}"#, &HashMap::new()).await;
        assert_eq!(result.status, HealthStatus::Ok);
        assert_eq!(result.message, "Data source is working");
    }

    #[tokio::test]
    async fn test_bad_settings() {
        let result = check_health(b"{", &HashMap::new()).await;
        assert_eq!(result, HealthCheckResult::error("Unable to load settings"));
    }

    #[tokio::test]
    async fn test_missing_password() {
        let result = check_health(br#"{"path": ":memory:", "requirePassword": true}"#, &HashMap::new()).await;
        assert_eq!(result, HealthCheckResult::error("Password key is missing"));

        let secrets = HashMap::from([("password".to_string(), "secret".to_string())]);
        let result = check_health(br#"{"path": ":memory:", "requirePassword": true}"#, &secrets).await;
        assert_eq!(result.status, HealthStatus::Ok);
    }

    #[tokio::test]
    async fn test_unreachable_database() {
        let result = check_health(br#"{"path": "/nonexistent-dir/sub/db.sqlite"}"#, &HashMap::new()).await;
        assert_eq!(result.status, HealthStatus::Error);
        assert!(result.message.starts_with("Unable to connect"));
    }
}
