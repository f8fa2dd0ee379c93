use serde::Deserialize;
use std::time::Duration;

use crate::error::AppError;

#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Default, Deserialize)]
struct LogSettings {
    #[serde(default)]
    log_format: LogFormat,
}

impl LogFormat {
    /// `LOG_FORMAT` on its own, so tracing can start before the rest of the
    /// configuration is parsed. Unreadable values fall back to pretty.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        envy::from_env::<LogSettings>()
            .map(|s| s.log_format)
            .unwrap_or_default()
    }
}

/// Service configuration, read from the environment (and `.env` if present)
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default = "default_host")]
    pub app_host: String,
    #[serde(default = "default_port")]
    pub app_port: u16,
    /// HS256 secret for handshake tokens. Unset means `userId` is trusted as-is.
    #[serde(default)]
    pub socket_jwt_secret: Option<String>,
    #[serde(default = "default_heartbeat_interval")]
    pub ws_heartbeat_interval_secs: u64,
    #[serde(default = "default_client_timeout")]
    pub ws_client_timeout_secs: u64,
    #[serde(default)]
    pub log_format: LogFormat,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_heartbeat_interval() -> u64 {
    5
}

fn default_client_timeout() -> u64 {
    30
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        dotenvy::dotenv().ok();
        let cfg = envy::from_env::<Config>()?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn test_defaults() -> Self {
        Self {
            app_host: "127.0.0.1".to_string(),
            app_port: 0,
            socket_jwt_secret: None,
            ws_heartbeat_interval_secs: default_heartbeat_interval(),
            ws_client_timeout_secs: default_client_timeout(),
            log_format: LogFormat::Pretty,
        }
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.app_host, self.app_port)
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.ws_heartbeat_interval_secs)
    }

    pub fn client_timeout(&self) -> Duration {
        Duration::from_secs(self.ws_client_timeout_secs)
    }

    fn validate(&self) -> Result<(), AppError> {
        if self.ws_heartbeat_interval_secs == 0 {
            return Err(AppError::Config(
                "WS_HEARTBEAT_INTERVAL_SECS must be greater than 0".to_string(),
            ));
        }
        if self.ws_client_timeout_secs <= self.ws_heartbeat_interval_secs {
            return Err(AppError::Config(
                "WS_CLIENT_TIMEOUT_SECS must exceed WS_HEARTBEAT_INTERVAL_SECS".to_string(),
            ));
        }
        if matches!(self.socket_jwt_secret.as_deref(), Some("")) {
            return Err(AppError::Config(
                "SOCKET_JWT_SECRET must not be empty when set".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn from_pairs(pairs: &[(&str, &str)]) -> Result<Config, envy::Error> {
        envy::from_iter(
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string())),
        )
    }

    #[test]
    fn test_defaults_applied() {
        let cfg = from_pairs(&[]).unwrap();
        assert_eq!(cfg.app_host, "0.0.0.0");
        assert_eq!(cfg.app_port, 8000);
        assert!(cfg.socket_jwt_secret.is_none());
        assert_eq!(cfg.heartbeat_interval(), Duration::from_secs(5));
        assert_eq!(cfg.client_timeout(), Duration::from_secs(30));
        assert_eq!(cfg.log_format, LogFormat::Pretty);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_overrides() {
        let cfg = from_pairs(&[
            ("APP_PORT", "9100"),
            ("SOCKET_JWT_SECRET", "s3cret"),
            ("LOG_FORMAT", "json"),
        ])
        .unwrap();
        assert_eq!(cfg.bind_addr(), "0.0.0.0:9100");
        assert_eq!(cfg.socket_jwt_secret.as_deref(), Some("s3cret"));
        assert_eq!(cfg.log_format, LogFormat::Json);
    }

    #[test]
    fn test_timeout_must_exceed_heartbeat() {
        let cfg = from_pairs(&[
            ("WS_HEARTBEAT_INTERVAL_SECS", "10"),
            ("WS_CLIENT_TIMEOUT_SECS", "10"),
        ])
        .unwrap();
        assert!(matches!(cfg.validate(), Err(AppError::Config(_))));
    }

    #[test]
    fn test_log_format_readable_when_other_vars_are_invalid() {
        let settings: LogSettings = envy::from_iter(
            [("APP_PORT", "not-a-port"), ("LOG_FORMAT", "json")]
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string())),
        )
        .unwrap();
        assert_eq!(settings.log_format, LogFormat::Json);
    }

    #[test]
    fn test_invalid_port_is_config_error() {
        let err = from_pairs(&[("APP_PORT", "not-a-port")]).unwrap_err();
        assert!(matches!(AppError::from(err), AppError::Config(_)));
    }
}
