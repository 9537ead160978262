use anyhow::{Context, Result};
use std::time::Duration;

/// Settings the session core consumes.
///
/// Projected out of [`Config`] so the orchestration layer never sees tokens
/// or Discord-specific knobs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerConfig {
    pub default_volume: i32,
    pub min_volume: i32,
    pub max_volume: i32,
    pub max_queue_size: usize,
    pub auto_leave_timeout: Duration,
}

impl PlayerConfig {
    /// Clamps a requested volume into `[min_volume, max_volume]`.
    pub fn clamp_volume(&self, value: i32) -> i32 {
        value.clamp(self.min_volume, self.max_volume)
    }
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            default_volume: 100,
            min_volume: 0,
            max_volume: 150,
            max_queue_size: 100,
            auto_leave_timeout: Duration::from_secs(300),
        }
    }
}

/// Process configuration, read from the environment.
///
/// `Debug` redacts the bot token.
#[derive(Clone)]
pub struct Config {
    // Discord
    pub discord_token: String,
    pub application_id: u64,
    pub guild_id: Option<u64>, // dev-only command registration
    pub command_prefix: String,

    // Playback
    pub default_volume: i32,
    pub min_volume: i32,
    pub max_volume: i32,
    pub max_queue_size: usize,
    pub auto_leave_timeout: Duration,

    // Resolver
    pub resolve_timeout: Duration,
    pub cache_size: usize,
    pub cache_ttl: Duration,
}

impl Config {
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self {
            // Discord
            discord_token: std::env::var("DISCORD_TOKEN").context("DISCORD_TOKEN is not set")?,
            application_id: std::env::var("APPLICATION_ID")
                .context("APPLICATION_ID is not set")?
                .parse()?,
            guild_id: std::env::var("GUILD_ID").ok().and_then(|s| s.parse().ok()),
            command_prefix: std::env::var("COMMAND_PREFIX").unwrap_or_else(|_| "d!".to_string()),

            // Playback
            default_volume: env_or("DEFAULT_VOLUME", "100")?.parse()?,
            min_volume: env_or("MIN_VOLUME", "0")?.parse()?,
            max_volume: env_or("MAX_VOLUME", "150")?.parse()?,
            max_queue_size: env_or("MAX_QUEUE_SIZE", "100")?.parse()?,
            auto_leave_timeout: humantime::parse_duration(&env_or("AUTO_LEAVE_TIMEOUT", "5m")?)
                .context("AUTO_LEAVE_TIMEOUT is not a valid duration")?,

            // Resolver
            resolve_timeout: humantime::parse_duration(&env_or("RESOLVE_TIMEOUT", "20s")?)
                .context("RESOLVE_TIMEOUT is not a valid duration")?,
            cache_size: env_or("CACHE_SIZE", "256")?.parse()?,
            cache_ttl: humantime::parse_duration(&env_or("CACHE_TTL", "1h")?)
                .context("CACHE_TTL is not a valid duration")?,
        };

        config.validate()?;

        Ok(config)
    }

    /// Validates configuration values for correctness.
    ///
    /// # Validation Rules
    ///
    /// - `min_volume <= max_volume`, and the default volume lies inside that range
    /// - Queue size, cache size and the auto-leave window must be non-zero
    pub fn validate(&self) -> Result<()> {
        if self.min_volume > self.max_volume {
            anyhow::bail!(
                "MIN_VOLUME ({}) cannot exceed MAX_VOLUME ({})",
                self.min_volume,
                self.max_volume
            );
        }

        if self.default_volume < self.min_volume || self.default_volume > self.max_volume {
            anyhow::bail!(
                "Default volume must be between {} and {}, got: {}",
                self.min_volume,
                self.max_volume,
                self.default_volume
            );
        }

        if self.max_queue_size == 0 {
            anyhow::bail!("Max queue size must be greater than 0");
        }

        if self.auto_leave_timeout.is_zero() {
            anyhow::bail!("Auto-leave timeout must be greater than 0");
        }

        if self.cache_size == 0 {
            anyhow::bail!("Cache size must be greater than 0");
        }

        Ok(())
    }

    /// Settings handed to the session registry.
    pub fn player(&self) -> PlayerConfig {
        PlayerConfig {
            default_volume: self.default_volume,
            min_volume: self.min_volume,
            max_volume: self.max_volume,
            max_queue_size: self.max_queue_size,
            auto_leave_timeout: self.auto_leave_timeout,
        }
    }

    /// Returns a summary of the current configuration for logging.
    ///
    /// Excludes the bot token.
    pub fn summary(&self) -> String {
        format!(
            "Config Summary:\n  \
            Discord: App ID {} (Guild: {}), prefix '{}'\n  \
            Volume: default {}% in [{}, {}]\n  \
            Queue: {} tracks max, auto-leave after {}\n  \
            Resolver: {} timeout, cache {} entries for {}",
            self.application_id,
            self.guild_id.map_or("global".to_string(), |id| id.to_string()),
            self.command_prefix,
            self.default_volume,
            self.min_volume,
            self.max_volume,
            self.max_queue_size,
            humantime::format_duration(self.auto_leave_timeout),
            humantime::format_duration(self.resolve_timeout),
            self.cache_size,
            humantime::format_duration(self.cache_ttl),
        )
    }
}

/// Default configuration values.
///
/// Used as fallbacks when environment variables are not provided.
impl Default for Config {
    fn default() -> Self {
        let player = PlayerConfig::default();
        Self {
            // Discord (no defaults - must be provided)
            discord_token: String::new(),
            application_id: 0,
            guild_id: None,
            command_prefix: "d!".to_string(),

            default_volume: player.default_volume,
            min_volume: player.min_volume,
            max_volume: player.max_volume,
            max_queue_size: player.max_queue_size,
            auto_leave_timeout: player.auto_leave_timeout,

            resolve_timeout: Duration::from_secs(20),
            cache_size: 256,
            cache_ttl: Duration::from_secs(3600),
        }
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("discord_token", &"<redacted>")
            .field("application_id", &self.application_id)
            .field("guild_id", &self.guild_id)
            .field("command_prefix", &self.command_prefix)
            .field("player", &self.player())
            .field("resolve_timeout", &self.resolve_timeout)
            .field("cache_size", &self.cache_size)
            .field("cache_ttl", &self.cache_ttl)
            .finish()
    }
}

fn env_or(key: &str, default: &str) -> Result<String> {
    match std::env::var(key) {
        Ok(value) if !value.trim().is_empty() => Ok(value),
        Ok(_) | Err(std::env::VarError::NotPresent) => Ok(default.to_string()),
        Err(e) => Err(anyhow::anyhow!("{key}: {e}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn default_config_is_valid() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn rejects_inverted_volume_range() {
        let config = Config {
            min_volume: 200,
            max_volume: 100,
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_default_volume_outside_range() {
        let config = Config {
            default_volume: 151,
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_zero_auto_leave_window() {
        let config = Config {
            auto_leave_timeout: Duration::ZERO,
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn player_projection_carries_playback_settings() {
        let config = Config {
            default_volume: 80,
            max_queue_size: 5,
            auto_leave_timeout: Duration::from_secs(30),
            ..Config::default()
        };

        assert_eq!(
            config.player(),
            PlayerConfig {
                default_volume: 80,
                min_volume: 0,
                max_volume: 150,
                max_queue_size: 5,
                auto_leave_timeout: Duration::from_secs(30),
            }
        );
    }

    #[test]
    fn clamp_volume_saturates_at_bounds() {
        let player = PlayerConfig::default();
        assert_eq!(player.clamp_volume(9999), 150);
        assert_eq!(player.clamp_volume(-5), 0);
        assert_eq!(player.clamp_volume(42), 42);
    }

    #[test]
    fn summary_omits_token() {
        let config = Config {
            discord_token: "super-secret".to_string(),
            ..Config::default()
        };
        assert!(!config.summary().contains("super-secret"));
        assert!(!format!("{:?}", config).contains("super-secret"));
    }
}
