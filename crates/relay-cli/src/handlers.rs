//! Command handlers for CLI operations
//!
//! Handlers return the text to print so the binary stays a thin shell.

use anyhow::{Context as _, Result, bail};
use relay_core::{Provider, RelayConfig, Request, Strategy};
use relay_providers::MockProvider;
use relay_routing::{MetricsReport, ProviderManager};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Name of the provider registered when the config lists none.
const FALLBACK_PROVIDER: &str = "mock";

/// Options for a single `generate` call
#[derive(Debug, Default)]
pub struct GenerateOptions {
    pub prompt: String,
    pub strategy: Option<String>,
    pub system: Option<String>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
    pub stats: bool,
    pub json: bool,
}

/// Loads the configuration from `path`, or from `~/.relay/config.toml`.
///
/// An explicit path must exist and parse. The default location is created on
/// first use, and falls back to defaults if it cannot be read.
///
/// # Errors
/// Returns an error if an explicit config file cannot be loaded
pub fn load_config(path: Option<&Path>) -> Result<RelayConfig> {
    if let Some(path) = path {
        return RelayConfig::load_from_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display()));
    }

    Ok(RelayConfig::load_or_create().unwrap_or_else(|error| {
        tracing::warn!("Failed to load config from ~/.relay/config.toml: {error}");
        tracing::warn!("Using default configuration");
        RelayConfig::default()
    }))
}

/// Builds a manager with one mock provider per configured descriptor.
///
/// # Errors
/// Returns an error if the config is invalid or a descriptor is rejected at
/// registration
pub fn build_manager(config: RelayConfig) -> Result<ProviderManager> {
    let mut descriptors = config.providers.clone();
    for descriptor in &mut descriptors {
        if descriptor.api_key.is_none() {
            descriptor.api_key = config.get_api_key(&descriptor.name);
        }
    }

    let manager = ProviderManager::new(config).context("Invalid relay configuration")?;
    if descriptors.is_empty() {
        tracing::info!("No providers configured, registering the '{FALLBACK_PROVIDER}' provider");
        manager.register_provider(Arc::new(MockProvider::new(FALLBACK_PROVIDER)))?;
    }
    for descriptor in descriptors {
        let name = descriptor.name.clone();
        manager
            .register_provider(Arc::new(MockProvider::with_descriptor(descriptor)) as Arc<dyn Provider>)
            .with_context(|| format!("Failed to register provider {name}"))?;
    }
    Ok(manager)
}

/// Handles `relay generate`
///
/// # Errors
/// Returns an error if the strategy is unknown or the request fails
pub async fn handle_generate(config: RelayConfig, options: GenerateOptions) -> Result<String> {
    let manager = build_manager(config)?;
    if let Some(strategy) = options.strategy.as_deref() {
        manager.set_strategy(strategy.parse::<Strategy>()?);
    }
    manager.start();

    let mut request = Request::new(options.prompt);
    if let Some(system) = options.system {
        request = request.with_system_prompt(system);
    }
    if let Some(max_tokens) = options.max_tokens {
        request = request.with_max_tokens(max_tokens);
    }
    if let Some(temperature) = options.temperature {
        request = request.with_temperature(temperature);
    }

    tracing::info!("Generating with {} strategy", manager.strategy());
    let result = manager.generate(&request).await;
    let report = manager.shutdown().await;
    let response = result?;

    let mut output = if options.json {
        serde_json::to_string_pretty(&response)?
    } else {
        response.content.clone()
    };

    if options.stats {
        writeln!(output)?;
        writeln!(
            output,
            "\nProvider: {} ({}, {}ms)",
            response.provider_name, response.model, response.response_time_ms
        )?;
        output.push_str(&MetricsReport::format_report(&report)?);
    }
    Ok(output)
}

/// Handles `relay providers`
///
/// # Errors
/// Returns an error if the config is invalid or a descriptor is rejected at
/// registration
pub fn handle_providers(config: RelayConfig) -> Result<String> {
    let manager = build_manager(config)?;
    let mut output = String::new();
    for descriptor in manager.list_providers() {
        writeln!(
            output,
            "{:<20} priority={:<4} model={:<24} ${:.4}/1k tokens{}",
            descriptor.name,
            descriptor.priority,
            descriptor.model,
            descriptor.cost_per_1k_tokens,
            if descriptor.enabled { "" } else { " (disabled)" }
        )?;
    }
    Ok(output)
}

/// Handles `relay config init`
///
/// # Errors
/// Returns an error if the file exists without `force`, or cannot be written
pub fn handle_config_init(path: Option<PathBuf>, force: bool) -> Result<String> {
    let path = match path {
        Some(path) => path,
        None => RelayConfig::config_path()?,
    };
    if path.exists() && !force {
        bail!(
            "{} already exists, pass --force to overwrite",
            path.display()
        );
    }

    RelayConfig::default().save_to_file(&path)?;
    Ok(format!("Wrote default configuration to {}", path.display()))
}

/// Handles `relay config show`
///
/// # Errors
/// Returns an error if the configuration cannot be serialized
pub fn handle_config_show(config: &RelayConfig) -> Result<String> {
    Ok(toml::to_string_pretty(config)?)
}
