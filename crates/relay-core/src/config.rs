//! Configuration types for strategy selection, caching, health, and cost limits.

use core::fmt::{Display, Formatter, Result as FmtResult};
use core::str::FromStr;
use core::time::Duration;
use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::{CoreError, ProviderDescriptor, Result};

/// Complete orchestrator configuration.
#[derive(Default, Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// Dispatch strategy settings
    pub strategy: StrategyConfig,
    /// Response cache configuration
    pub cache: CacheConfig,
    /// Circuit breaker configuration
    pub health: HealthConfig,
    /// Daily budget configuration
    pub cost: CostConfig,
    /// Providers to register at startup
    pub providers: Vec<ProviderDescriptor>,
}

/// Algorithm used to pick or combine providers for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// Only the most preferred provider is tried.
    PrimaryOnly,
    /// Providers are tried in priority order until one succeeds.
    #[default]
    FallbackChain,
    /// All providers are called concurrently and the best answer wins.
    ParallelComparison,
    /// Providers are tried cheapest first, with a quality gate.
    CostOptimized,
}

impl Strategy {
    /// Every strategy, in declaration order.
    pub const ALL: [Self; 4] = [
        Self::PrimaryOnly,
        Self::FallbackChain,
        Self::ParallelComparison,
        Self::CostOptimized,
    ];

    /// Configuration name of the strategy.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::PrimaryOnly => "primary_only",
            Self::FallbackChain => "fallback_chain",
            Self::ParallelComparison => "parallel_comparison",
            Self::CostOptimized => "cost_optimized",
        }
    }
}

impl Display for Strategy {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.as_str())
    }
}

impl FromStr for Strategy {
    type Err = CoreError;

    fn from_str(value: &str) -> Result<Self> {
        let normalized = value.trim().to_ascii_lowercase().replace('-', "_");
        Self::ALL
            .into_iter()
            .find(|strategy| strategy.as_str() == normalized)
            .ok_or_else(|| CoreError::Config(format!("unknown strategy: {value}")))
    }
}

/// Strategy configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StrategyConfig {
    /// Strategy used for every request until switched
    pub strategy: Strategy,
    /// Minimum quality score accepted by the cost-optimized strategy (0.0-1.0)
    pub quality_threshold: f64,
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            strategy: Strategy::default(),
            quality_threshold: 0.6,
        }
    }
}

/// Cache configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Whether caching is enabled
    pub enabled: bool,
    /// Time-to-live for cache entries in milliseconds
    pub ttl_ms: u64,
    /// Interval between background sweeps in milliseconds
    pub sweep_interval_ms: u64,
}

impl CacheConfig {
    /// Entry time-to-live.
    pub fn ttl(&self) -> Duration {
        Duration::from_millis(self.ttl_ms)
    }

    /// Background sweep interval.
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_millis(self.sweep_interval_ms)
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl_ms: 60 * 60 * 1000,
            sweep_interval_ms: 5 * 60 * 1000,
        }
    }
}

/// Circuit breaker configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthConfig {
    /// Consecutive failures that disable a provider
    pub max_consecutive_failures: u32,
    /// How long an automatically disabled provider stays out of rotation
    pub cooldown_ms: u64,
}

impl HealthConfig {
    /// Cooldown as a `Duration`.
    pub fn cooldown(&self) -> Duration {
        Duration::from_millis(self.cooldown_ms)
    }
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            max_consecutive_failures: 5,
            cooldown_ms: 5 * 60 * 1000,
        }
    }
}

/// Daily spend limits for one provider, in USD.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CostLimit {
    /// Hard cap; requests that would exceed it are refused
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub daily_limit: Option<f64>,
    /// Spend level that triggers a warning
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alert_threshold: Option<f64>,
}

/// Cost ledger configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CostConfig {
    /// Limits keyed by provider name
    pub limits: BTreeMap<String, CostLimit>,
}

impl RelayConfig {
    /// Get the default config directory path (`~/.relay`)
    ///
    /// # Errors
    /// Returns an error if the home directory cannot be determined
    pub fn config_dir() -> Result<PathBuf> {
        let home = dirs::home_dir()
            .ok_or_else(|| CoreError::Config("Could not determine home directory".to_owned()))?;
        Ok(home.join(".relay"))
    }

    /// Get the default config file path (`~/.relay/config.toml`)
    ///
    /// # Errors
    /// Returns an error if the home directory cannot be determined
    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    /// Load config from the default location (`~/.relay/config.toml`)
    /// If the config doesn't exist, creates it with default values
    ///
    /// # Errors
    /// Returns an error if the config cannot be read or created
    pub fn load_or_create() -> Result<Self> {
        let config_path = Self::config_path()?;

        if config_path.exists() {
            Self::load_from_file(&config_path)
        } else {
            let config = Self::default();
            config.save_to_file(&config_path)?;
            Ok(config)
        }
    }

    /// Load config from a specific file
    ///
    /// # Errors
    /// Returns an error if the file cannot be read, parsed, or validated
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Self = toml::from_str(&contents)?;
        config.validate()?;

        tracing::debug!(
            "Loaded config from {}: strategy={}, providers={}",
            path.display(),
            config.strategy.strategy,
            config.providers.len()
        );

        Ok(config)
    }

    /// Save config to a specific file
    ///
    /// # Errors
    /// Returns an error if the file cannot be written
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)?;

        let header = "# Relay Configuration File\n\
                      # This file is automatically generated on first run\n\
                      # Edit this file to customize your settings\n\n";

        fs::write(path, format!("{header}{contents}"))?;

        Ok(())
    }

    /// Checks every value the orchestrator relies on.
    ///
    /// # Errors
    /// Returns `CoreError::Config` describing the first invalid value.
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.strategy.quality_threshold) {
            return Err(CoreError::Config(format!(
                "quality_threshold must be within 0.0..=1.0, got {}",
                self.strategy.quality_threshold
            )));
        }
        if self.health.max_consecutive_failures == 0 {
            return Err(CoreError::Config(
                "max_consecutive_failures must be at least 1".to_owned(),
            ));
        }
        if self.cache.enabled && self.cache.ttl_ms == 0 {
            return Err(CoreError::Config("cache ttl_ms must be positive".to_owned()));
        }
        for (provider, limit) in &self.cost.limits {
            if limit.daily_limit.is_some_and(|value| value < 0.0) {
                return Err(CoreError::Config(format!(
                    "daily_limit for '{provider}' must not be negative"
                )));
            }
        }
        for descriptor in &self.providers {
            descriptor.validate()?;
        }
        Ok(())
    }

    /// Get API key for a provider, checking config first, then the
    /// `RELAY_<NAME>_API_KEY` environment variable
    pub fn get_api_key(&self, provider: &str) -> Option<String> {
        self.providers
            .iter()
            .find(|descriptor| descriptor.name == provider)
            .and_then(|descriptor| descriptor.api_key.clone())
            .or_else(|| env::var(Self::api_key_env_var(provider)).ok())
    }

    /// Environment variable consulted for a provider's API key.
    pub fn api_key_env_var(provider: &str) -> String {
        let upper: String = provider
            .chars()
            .map(|character| {
                if character.is_ascii_alphanumeric() {
                    character.to_ascii_uppercase()
                } else {
                    '_'
                }
            })
            .collect();
        format!("RELAY_{upper}_API_KEY")
    }
}
