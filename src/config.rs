use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use chrono::{FixedOffset, Offset, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Application-level constants
pub const APP_NAME: &str = "Carebell";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prefix shared by every environment variable the service reads.
const ENV_PREFIX: &str = "CAREBELL_";

/// Default tracing filter when `RUST_LOG` is not set.
pub fn default_log_filter() -> &'static str {
    "carebell=info,tower_http=warn,warn"
}

/// Get the application data directory.
/// ~/Carebell/ on all platforms, falling back to the working directory
/// when no home directory can be resolved (containers, CI).
pub fn app_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_NAME)
}

/// Default SQLite database location.
pub fn default_database_path() -> PathBuf {
    app_data_dir().join("carebell.db")
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {value} ({reason})")]
    InvalidValue {
        key: String,
        value: String,
        reason: String,
    },
}

/// What the dispatcher does with an occurrence whose user has no push tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ZeroTokenPolicy {
    /// Write the SENT marker anyway; the client may still have spoken it in-app.
    MarkSent,
    /// Leave the occurrence DUE so it is re-evaluated on the next scan.
    Retry,
}

impl ZeroTokenPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MarkSent => "mark_sent",
            Self::Retry => "retry",
        }
    }
}

impl FromStr for ZeroTokenPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mark_sent" | "mark-sent" => Ok(Self::MarkSent),
            "retry" => Ok(Self::Retry),
            other => Err(format!("expected mark_sent or retry, got {other}")),
        }
    }
}

/// Push gateway settings. Push is disabled when no URL is configured.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushConfig {
    pub gateway_url: Option<String>,
    pub api_key: Option<String>,
    pub timeout: Duration,
}

/// Text-completion backend settings for the AI flows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AiConfig {
    pub base_url: String,
    pub model: String,
    pub timeout: Duration,
    pub cache_capacity: usize,
    pub cache_ttl: Duration,
}

/// Runtime configuration, read once at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub database_path: PathBuf,
    /// Timezone every reminder is evaluated in. Never the host's local zone.
    pub utc_offset: FixedOffset,
    /// Background scan period. `None` disables the scheduler (trigger-only).
    pub scan_interval: Option<Duration>,
    pub medication_tolerance: chrono::Duration,
    pub default_appointment_lead: chrono::Duration,
    pub zero_token_policy: ZeroTokenPolicy,
    pub dispatch_concurrency: usize,
    pub prune_invalid_tokens: bool,
    pub ledger_retention_days: i64,
    pub origin_url: String,
    pub trigger_secret: Option<String>,
    pub push: PushConfig,
    pub ai: AiConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 8787)),
            database_path: default_database_path(),
            utc_offset: utc(),
            scan_interval: Some(Duration::from_secs(300)),
            medication_tolerance: chrono::Duration::minutes(15),
            default_appointment_lead: chrono::Duration::minutes(60),
            zero_token_policy: ZeroTokenPolicy::MarkSent,
            dispatch_concurrency: 4,
            prune_invalid_tokens: true,
            ledger_retention_days: 30,
            origin_url: "http://localhost:3000".to_string(),
            trigger_secret: None,
            push: PushConfig {
                gateway_url: None,
                api_key: None,
                timeout: Duration::from_secs(10),
            },
            ai: AiConfig {
                base_url: "http://localhost:11434".to_string(),
                model: "llama3.1".to_string(),
                timeout: Duration::from_secs(60),
                cache_capacity: 128,
                cache_ttl: Duration::from_secs(86_400),
            },
        }
    }
}

impl AppConfig {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup.
    ///
    /// The lookup receives full variable names (`CAREBELL_UTC_OFFSET`).
    /// Unset or blank keys keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| -> Option<(String, String)> {
            let key = format!("{ENV_PREFIX}{name}");
            lookup(&key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .map(|v| (key, v))
        };

        let mut config = Self::default();

        if let Some((key, value)) = get("BIND_ADDR") {
            config.bind_addr = parse_with(&key, &value, |v| v.parse::<SocketAddr>())?;
        }
        if let Some((_, value)) = get("DATABASE_PATH") {
            config.database_path = PathBuf::from(value);
        }
        if let Some((key, value)) = get("UTC_OFFSET") {
            config.utc_offset = parse_with(&key, &value, |v| v.parse::<FixedOffset>())?;
        }
        if let Some((key, value)) = get("SCAN_INTERVAL_SECS") {
            let secs = parse_with(&key, &value, |v| v.parse::<u64>())?;
            config.scan_interval = (secs > 0).then(|| Duration::from_secs(secs));
        }
        if let Some((key, value)) = get("MEDICATION_TOLERANCE_MINUTES") {
            let minutes = parse_positive(&key, &value)?;
            config.medication_tolerance = chrono::Duration::minutes(minutes);
        }
        if let Some((key, value)) = get("DEFAULT_LEAD_MINUTES") {
            let minutes = parse_positive(&key, &value)?;
            config.default_appointment_lead = chrono::Duration::minutes(minutes);
        }
        if let Some((key, value)) = get("ZERO_TOKEN_POLICY") {
            config.zero_token_policy = parse_with(&key, &value, |v| v.parse::<ZeroTokenPolicy>())?;
        }
        if let Some((key, value)) = get("DISPATCH_CONCURRENCY") {
            config.dispatch_concurrency = parse_positive(&key, &value)? as usize;
        }
        if let Some((key, value)) = get("PRUNE_INVALID_TOKENS") {
            config.prune_invalid_tokens = parse_bool(&key, &value)?;
        }
        if let Some((key, value)) = get("LEDGER_RETENTION_DAYS") {
            config.ledger_retention_days = parse_positive(&key, &value)?;
        }
        if let Some((_, value)) = get("ORIGIN_URL") {
            config.origin_url = value;
        }
        if let Some((_, value)) = get("TRIGGER_SECRET") {
            config.trigger_secret = Some(value);
        }
        if let Some((_, value)) = get("PUSH_GATEWAY_URL") {
            config.push.gateway_url = Some(value);
        }
        if let Some((_, value)) = get("PUSH_API_KEY") {
            config.push.api_key = Some(value);
        }
        if let Some((_, value)) = get("AI_BASE_URL") {
            config.ai.base_url = value;
        }
        if let Some((_, value)) = get("AI_MODEL") {
            config.ai.model = value;
        }
        if let Some((key, value)) = get("AI_TIMEOUT_SECS") {
            config.ai.timeout = Duration::from_secs(parse_positive(&key, &value)? as u64);
        }
        if let Some((key, value)) = get("FLOW_CACHE_CAPACITY") {
            config.ai.cache_capacity = parse_positive(&key, &value)? as usize;
        }
        if let Some((key, value)) = get("FLOW_CACHE_TTL_SECS") {
            config.ai.cache_ttl = Duration::from_secs(parse_positive(&key, &value)? as u64);
        }

        Ok(config)
    }
}

fn utc() -> FixedOffset {
    Utc.fix()
}

fn parse_with<T, E, F>(key: &str, value: &str, parse: F) -> Result<T, ConfigError>
where
    F: FnOnce(&str) -> Result<T, E>,
    E: std::fmt::Display,
{
    parse(value).map_err(|e| ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
        reason: e.to_string(),
    })
}

fn parse_positive(key: &str, value: &str) -> Result<i64, ConfigError> {
    let n = parse_with(key, value, |v| v.parse::<i64>())?;
    if n <= 0 {
        return Err(ConfigError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
            reason: "must be greater than zero".into(),
        });
    }
    Ok(n)
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
            reason: "expected a boolean".into(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn app_data_dir_ends_with_app_name() {
        assert!(app_data_dir().ends_with("Carebell"));
        assert!(default_database_path().starts_with(app_data_dir()));
    }

    #[test]
    fn empty_environment_yields_defaults() {
        let config = AppConfig::from_lookup(|_| None).unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.utc_offset.local_minus_utc(), 0);
        assert_eq!(config.zero_token_policy, ZeroTokenPolicy::MarkSent);
    }

    #[test]
    fn overrides_are_applied() {
        let config = AppConfig::from_lookup(lookup_from(&[
            ("CAREBELL_BIND_ADDR", "0.0.0.0:9000"),
            ("CAREBELL_UTC_OFFSET", "+01:00"),
            ("CAREBELL_SCAN_INTERVAL_SECS", "60"),
            ("CAREBELL_MEDICATION_TOLERANCE_MINUTES", "10"),
            ("CAREBELL_ZERO_TOKEN_POLICY", "retry"),
            ("CAREBELL_PRUNE_INVALID_TOKENS", "false"),
            ("CAREBELL_TRIGGER_SECRET", "s3cret"),
            ("CAREBELL_PUSH_GATEWAY_URL", "https://push.example.test/send"),
        ]))
        .unwrap();

        assert_eq!(config.bind_addr.port(), 9000);
        assert_eq!(config.utc_offset.local_minus_utc(), 3600);
        assert_eq!(config.scan_interval, Some(Duration::from_secs(60)));
        assert_eq!(config.medication_tolerance, chrono::Duration::minutes(10));
        assert_eq!(config.zero_token_policy, ZeroTokenPolicy::Retry);
        assert!(!config.prune_invalid_tokens);
        assert_eq!(config.trigger_secret.as_deref(), Some("s3cret"));
        assert_eq!(
            config.push.gateway_url.as_deref(),
            Some("https://push.example.test/send")
        );
    }

    #[test]
    fn zero_scan_interval_disables_scheduler() {
        let config =
            AppConfig::from_lookup(lookup_from(&[("CAREBELL_SCAN_INTERVAL_SECS", "0")])).unwrap();
        assert_eq!(config.scan_interval, None);
    }

    #[test]
    fn invalid_offset_is_rejected() {
        let err = AppConfig::from_lookup(lookup_from(&[("CAREBELL_UTC_OFFSET", "Paris")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "CAREBELL_UTC_OFFSET"));
    }

    #[test]
    fn non_positive_tolerance_is_rejected() {
        let result = AppConfig::from_lookup(lookup_from(&[(
            "CAREBELL_MEDICATION_TOLERANCE_MINUTES",
            "0",
        )]));
        assert!(result.is_err());
    }

    #[test]
    fn blank_values_keep_defaults() {
        let config =
            AppConfig::from_lookup(lookup_from(&[("CAREBELL_TRIGGER_SECRET", "   ")])).unwrap();
        assert_eq!(config.trigger_secret, None);
    }

    #[test]
    fn zero_token_policy_round_trips_text() {
        for policy in [ZeroTokenPolicy::MarkSent, ZeroTokenPolicy::Retry] {
            assert_eq!(policy.as_str().parse::<ZeroTokenPolicy>().unwrap(), policy);
        }
        assert!("sometimes".parse::<ZeroTokenPolicy>().is_err());
    }
}
