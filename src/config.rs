use anyhow::Result;
use dotenvy::dotenv;
use serde::Deserialize;
use std::env;
use std::time::Duration;

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub kafka_bootstrap_servers: String,
    pub kafka_group_id: String,
    pub kafka_auto_offset_reset: String,
    pub kafka_sasl_mechanism: String,
    pub kafka_username: String,
    pub kafka_password: String,
    pub kafka_security_protocol: String,
    pub kafka_max_retries: u32,
    pub kafka_circuit_breaker_cooldown: u64,
    pub pre_alert_topic: String,
    pub dispatch_topic: String,
    pub interaction_topic: String,
    pub notice_topic: String,
    pub pre_alert_window_secs: u64,
    pub dispatch_retention_secs: u64,
    pub callout_retention_secs: u64,
    pub pre_alert_prefix: String,
    pub log_level: String,
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        dotenv().ok();

        let kafka_bootstrap_servers =
            env::var("KAFKA_BOOTSTRAP_SERVERS").unwrap_or_else(|_| "localhost:9092".to_string());
        let kafka_group_id =
            env::var("KAFKA_GROUP_ID").unwrap_or_else(|_| "alert-relay".to_string());
        let kafka_auto_offset_reset =
            env::var("KAFKA_AUTO_OFFSET_RESET").unwrap_or_else(|_| "latest".to_string());
        let kafka_sasl_mechanism =
            env::var("KAFKA_SASL_MECHANISM").unwrap_or_else(|_| "PLAIN".to_string());
        let kafka_username = env::var("KAFKA_USERNAME").unwrap_or_default();
        let kafka_password = env::var("KAFKA_PASSWORD").unwrap_or_default();
        let kafka_security_protocol =
            env::var("KAFKA_SECURITY_PROTOCOL").unwrap_or_else(|_| "PLAINTEXT".to_string());
        let kafka_max_retries = env::var("KAFKA_MAX_RETRIES")
            .unwrap_or_else(|_| "5".to_string())
            .parse()
            .unwrap_or(5);
        let kafka_circuit_breaker_cooldown = env::var("KAFKA_CIRCUIT_BREAKER_COOLDOWN")
            .unwrap_or_else(|_| "300".to_string())
            .parse()
            .unwrap_or(300);

        let pre_alert_topic =
            env::var("PRE_ALERT_TOPIC").unwrap_or_else(|_| "alerts-pre".to_string());
        let dispatch_topic =
            env::var("DISPATCH_TOPIC").unwrap_or_else(|_| "alerts-dispatch".to_string());
        let interaction_topic =
            env::var("INTERACTION_TOPIC").unwrap_or_else(|_| "alerts-interactions".to_string());
        let notice_topic = env::var("NOTICE_TOPIC").unwrap_or_else(|_| "alerts-notices".to_string());

        // Pre-alerts are only worth matching for a couple of minutes, dispatches for hours.
        let pre_alert_window_secs = env::var("PRE_ALERT_WINDOW_SECS")
            .unwrap_or_else(|_| "120".to_string())
            .parse()
            .unwrap_or(120);
        let dispatch_retention_secs = env::var("DISPATCH_RETENTION_SECS")
            .unwrap_or_else(|_| "7200".to_string())
            .parse()
            .unwrap_or(7200);
        let callout_retention_secs = env::var("CALLOUT_RETENTION_SECS")
            .unwrap_or_else(|_| "7200".to_string())
            .parse()
            .unwrap_or(7200);

        let pre_alert_prefix = env::var("PRE_ALERT_PREFIX")
            .unwrap_or_else(|_| "Ehrenamt Alarmierung: FF Wiener Neustadt".to_string());

        let log_level = env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        Ok(Self {
            kafka_bootstrap_servers,
            kafka_group_id,
            kafka_auto_offset_reset,
            kafka_sasl_mechanism,
            kafka_username,
            kafka_password,
            kafka_security_protocol,
            kafka_max_retries,
            kafka_circuit_breaker_cooldown,
            pre_alert_topic,
            dispatch_topic,
            interaction_topic,
            notice_topic,
            pre_alert_window_secs,
            dispatch_retention_secs,
            callout_retention_secs,
            pre_alert_prefix,
            log_level,
        })
    }

    pub fn expiry_windows(&self) -> ExpiryWindows {
        ExpiryWindows {
            pre_alert: Duration::from_secs(self.pre_alert_window_secs),
            dispatch: Duration::from_secs(self.dispatch_retention_secs),
            callout: Duration::from_secs(self.callout_retention_secs),
        }
    }

    /// SASL settings are only applied when the protocol asks for them.
    pub fn uses_sasl(&self) -> bool {
        self.kafka_security_protocol
            .to_ascii_uppercase()
            .starts_with("SASL")
    }
}

/// How long each kind of record is tracked before the expiry manager drops it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExpiryWindows {
    pub pre_alert: Duration,
    pub dispatch: Duration,
    pub callout: Duration,
}

impl Default for ExpiryWindows {
    fn default() -> Self {
        Self {
            pre_alert: Duration::from_secs(2 * 60),
            dispatch: Duration::from_secs(2 * 60 * 60),
            callout: Duration::from_secs(2 * 60 * 60),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_with_protocol(protocol: &str) -> AppConfig {
        AppConfig {
            kafka_bootstrap_servers: "localhost:9092".to_string(),
            kafka_group_id: "alert-relay".to_string(),
            kafka_auto_offset_reset: "latest".to_string(),
            kafka_sasl_mechanism: "PLAIN".to_string(),
            kafka_username: String::new(),
            kafka_password: String::new(),
            kafka_security_protocol: protocol.to_string(),
            kafka_max_retries: 5,
            kafka_circuit_breaker_cooldown: 300,
            pre_alert_topic: "alerts-pre".to_string(),
            dispatch_topic: "alerts-dispatch".to_string(),
            interaction_topic: "alerts-interactions".to_string(),
            notice_topic: "alerts-notices".to_string(),
            pre_alert_window_secs: 90,
            dispatch_retention_secs: 3600,
            callout_retention_secs: 600,
            pre_alert_prefix: String::new(),
            log_level: "info".to_string(),
        }
    }

    #[test]
    fn test_expiry_windows_from_config() {
        let windows = config_with_protocol("PLAINTEXT").expiry_windows();
        assert_eq!(windows.pre_alert, Duration::from_secs(90));
        assert_eq!(windows.dispatch, Duration::from_secs(3600));
        assert_eq!(windows.callout, Duration::from_secs(600));
    }

    #[test]
    fn test_default_windows_are_minutes_and_hours() {
        let windows = ExpiryWindows::default();
        assert_eq!(windows.pre_alert, Duration::from_secs(120));
        assert_eq!(windows.dispatch, Duration::from_secs(7200));
    }

    #[test]
    fn test_uses_sasl() {
        assert!(config_with_protocol("SASL_PLAINTEXT").uses_sasl());
        assert!(config_with_protocol("sasl_ssl").uses_sasl());
        assert!(!config_with_protocol("PLAINTEXT").uses_sasl());
    }
}
