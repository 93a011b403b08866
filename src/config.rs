use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{path::PathBuf, time::Duration};

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    // Discord
    pub discord_token: String,
    pub application_id: u64,
    pub guild_id: Option<u64>, // Para comandos de desarrollo
    pub command_prefix: String,

    // Audio
    pub default_volume: u8,
    pub max_volume: u8,
    pub max_queue_size: usize,

    // Paths
    pub data_dir: PathBuf,

    // Antispam del controlador
    pub antispam_per_minute: u32,
    pub antispam_per_hour: u32,

    // Tiempos del controlador
    #[serde(with = "humantime_serde_compat")]
    pub cleanup_interval: Duration,
    #[serde(with = "humantime_serde_compat")]
    pub failed_message_ttl: Duration,
    #[serde(with = "humantime_serde_compat")]
    pub success_message_ttl: Duration,
    #[serde(with = "humantime_serde_compat")]
    pub refresh_debounce: Duration,
    pub slowmode_seconds: u16,
}

impl Config {
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let defaults = Self::default();

        let config = Self {
            // Discord
            discord_token: std::env::var("DISCORD_TOKEN").context("DISCORD_TOKEN no definido")?,
            application_id: std::env::var("APPLICATION_ID")
                .context("APPLICATION_ID no definido")?
                .parse()?,
            guild_id: std::env::var("GUILD_ID").ok().and_then(|s| s.parse().ok()),
            command_prefix: std::env::var("COMMAND_PREFIX")
                .unwrap_or_else(|_| defaults.command_prefix.clone()),

            // Audio
            default_volume: std::env::var("DEFAULT_VOLUME")
                .unwrap_or_else(|_| "50".to_string())
                .parse()?,
            max_volume: std::env::var("MAX_VOLUME")
                .unwrap_or_else(|_| "150".to_string())
                .parse()?,
            max_queue_size: std::env::var("MAX_QUEUE_SIZE")
                .unwrap_or_else(|_| "1000".to_string())
                .parse()?,

            // Paths
            data_dir: std::env::var("DATA_DIR")
                .unwrap_or_else(|_| "./data".to_string())
                .into(),

            // Antispam
            antispam_per_minute: std::env::var("ANTISPAM_PER_MINUTE")
                .unwrap_or_else(|_| "5".to_string())
                .parse()?,
            antispam_per_hour: std::env::var("ANTISPAM_PER_HOUR")
                .unwrap_or_else(|_| "50".to_string())
                .parse()?,

            // Tiempos
            cleanup_interval: env_duration("CLEANUP_INTERVAL", defaults.cleanup_interval)?,
            failed_message_ttl: env_duration("FAILED_MESSAGE_TTL", defaults.failed_message_ttl)?,
            success_message_ttl: env_duration(
                "SUCCESS_MESSAGE_TTL",
                defaults.success_message_ttl,
            )?,
            refresh_debounce: env_duration("REFRESH_DEBOUNCE", defaults.refresh_debounce)?,
            slowmode_seconds: std::env::var("SLOWMODE_SECONDS")
                .unwrap_or_else(|_| "5".to_string())
                .parse()?,
        };

        std::fs::create_dir_all(&config.data_dir)?;

        config.validate()?;

        Ok(config)
    }

    /// Validates configuration values for correctness.
    ///
    /// # Validation Rules
    ///
    /// - Default volume must not exceed the maximum volume
    /// - Maximum volume must stay within 1..=1000 (songbird scales linearly)
    /// - Queue size and antispam thresholds must be greater than zero
    /// - Cleanup interval and message TTLs must be non-zero
    /// - Slowmode cannot exceed Discord's 6 hour limit
    pub fn validate(&self) -> Result<()> {
        if self.command_prefix.trim().is_empty() {
            anyhow::bail!("Command prefix cannot be empty");
        }

        if self.max_volume == 0 {
            anyhow::bail!("Max volume must be greater than 0");
        }

        if self.default_volume > self.max_volume {
            anyhow::bail!(
                "Default volume ({}) cannot exceed max volume ({})",
                self.default_volume,
                self.max_volume
            );
        }

        if self.max_queue_size == 0 {
            anyhow::bail!("Max queue size must be greater than 0");
        }

        if self.antispam_per_minute == 0 || self.antispam_per_hour == 0 {
            anyhow::bail!("Antispam thresholds must be greater than 0");
        }

        if self.antispam_per_hour < self.antispam_per_minute {
            anyhow::bail!(
                "Hourly antispam threshold ({}) is lower than the per-minute one ({})",
                self.antispam_per_hour,
                self.antispam_per_minute
            );
        }

        if self.cleanup_interval.is_zero() {
            anyhow::bail!("Cleanup interval must be greater than 0");
        }

        if self.failed_message_ttl.is_zero() || self.success_message_ttl.is_zero() {
            anyhow::bail!("Message TTLs must be greater than 0");
        }

        if self.slowmode_seconds > 21600 {
            anyhow::bail!(
                "Slowmode cannot exceed 21600 seconds, got: {}",
                self.slowmode_seconds
            );
        }

        Ok(())
    }

    /// Returns a summary of the current configuration for logging.
    ///
    /// The Discord token is never included.
    pub fn summary(&self) -> String {
        format!(
            "Config Summary:\n  \
            Discord: App ID {} (Guild: {}), prefix `{}`\n  \
            Audio: {}% vol (max {}%), {} queue\n  \
            Antispam: {}/min, {}/h\n  \
            Controller: cleanup every {}, failed TTL {}, success TTL {}, debounce {}",
            self.application_id,
            self.guild_id.map_or("global".to_string(), |id| id.to_string()),
            self.command_prefix,
            self.default_volume,
            self.max_volume,
            self.max_queue_size,
            self.antispam_per_minute,
            self.antispam_per_hour,
            humantime::format_duration(self.cleanup_interval),
            humantime::format_duration(self.failed_message_ttl),
            humantime::format_duration(self.success_message_ttl),
            humantime::format_duration(self.refresh_debounce),
        )
    }
}

/// Default configuration values.
///
/// Used as fallbacks when environment variables are not provided.
impl Default for Config {
    fn default() -> Self {
        Self {
            // Discord (sin defaults reales)
            discord_token: String::new(),
            application_id: 0,
            guild_id: None,
            command_prefix: "!".to_string(),

            default_volume: 50,
            max_volume: 150,
            max_queue_size: 1000,

            data_dir: "./data".into(),

            antispam_per_minute: 5,
            antispam_per_hour: 50,

            cleanup_interval: Duration::from_secs(5),
            failed_message_ttl: Duration::from_secs(10),
            success_message_ttl: Duration::from_secs(30),
            refresh_debounce: Duration::from_secs(1),
            slowmode_seconds: 5,
        }
    }
}

fn env_duration(key: &str, default: Duration) -> Result<Duration> {
    match std::env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => humantime::parse_duration(raw.trim())
            .with_context(|| format!("{} no es una duración válida: {}", key, raw)),
        _ => Ok(default),
    }
}

/// Durations are (de)serialized in humantime notation ("5s", "1m 30s").
mod humantime_serde_compat {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&humantime::format_duration(*value).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let raw = String::deserialize(deserializer)?;
        humantime::parse_duration(&raw).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn rejects_default_volume_above_max() {
        let config = Config {
            default_volume: 200,
            max_volume: 150,
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_inverted_antispam_windows() {
        let config = Config {
            antispam_per_minute: 10,
            antispam_per_hour: 5,
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn summary_never_leaks_token() {
        let config = Config {
            discord_token: "super-secret".to_string(),
            ..Config::default()
        };
        let summary = config.summary();
        assert!(!summary.contains("super-secret"));
        assert!(summary.contains("5/min"));
    }

    #[test]
    fn durations_round_trip_through_json() {
        let config = Config::default();
        let json = serde_json::to_string(&config).unwrap();
        assert!(json.contains("\"5s\""));
        let back: Config = serde_json::from_str(&json).unwrap();
        assert_eq!(back.failed_message_ttl, Duration::from_secs(10));
    }
}
