//! Engine configuration.
//!
//! Loaded hierarchically:
//! 1. defaults in code
//! 2. `config/tradeerp.toml` (optional)
//! 3. environment variables prefixed `TRADEERP__`, e.g.
//!    `TRADEERP__CURRENCY_SCALE=4`, `TRADEERP__AUTO_LINK__SALES=false`

use std::path::Path;

use config::builder::{ConfigBuilder, DefaultState};
use config::{Environment, File, FileFormat};
use serde::Deserialize;
use thiserror::Error;

use tradeerp_inventory::LandedCostPolicy;
use tradeerp_observability::ObservabilityConfig;

/// Largest supported currency scale (decimal places).
const MAX_CURRENCY_SCALE: u32 = 10;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("invalid configuration `{key}`: {message}")]
    Invalid { key: &'static str, message: String },
}

/// Which automatic ledger entries the cost propagator creates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct AutoLinkConfig {
    /// PURCHASE entry for lots of products with a default purchase vendor.
    pub inbound: bool,
    /// PURCHASE counterpart for manually recorded sales.
    pub sales: bool,
}

impl Default for AutoLinkConfig {
    fn default() -> Self {
        Self {
            inbound: true,
            sales: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct EngineConfig {
    /// Decimal places of the ledger currency.
    pub currency_scale: u32,
    /// How many times a transaction that lost a concurrency race is retried.
    pub max_conflict_retries: u32,
    /// How header-level receipt costs are split across items.
    pub landed_cost_policy: LandedCostPolicy,
    pub auto_link: AutoLinkConfig,
    pub observability: ObservabilityConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            currency_scale: 2,
            max_conflict_retries: 3,
            landed_cost_policy: LandedCostPolicy::Weighted,
            auto_link: AutoLinkConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Load from `config/tradeerp.toml` (if present) and `TRADEERP__*` variables.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from("config/tradeerp")
    }

    /// Like [`EngineConfig::load`] with an explicit file (extension optional).
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let name = path.as_ref().to_string_lossy().into_owned();
        let builder = defaults()?
            .add_source(File::with_name(&name).required(false))
            .add_source(
                Environment::with_prefix("TRADEERP")
                    .separator("__")
                    .try_parsing(true),
            );
        Self::build(builder)
    }

    /// Parse a TOML document on top of the defaults. No environment overrides.
    pub fn from_toml_str(toml: &str) -> Result<Self, ConfigError> {
        let builder = defaults()?.add_source(File::from_str(toml, FileFormat::Toml));
        Self::build(builder)
    }

    fn build(builder: ConfigBuilder<DefaultState>) -> Result<Self, ConfigError> {
        let config: Self = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.currency_scale > MAX_CURRENCY_SCALE {
            return Err(ConfigError::Invalid {
                key: "currency_scale",
                message: format!("must be at most {MAX_CURRENCY_SCALE} (got {})", self.currency_scale),
            });
        }
        Ok(())
    }
}

fn defaults() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    let defaults = EngineConfig::default();
    Ok(config::Config::builder()
        .set_default("currency_scale", i64::from(defaults.currency_scale))?
        .set_default("max_conflict_retries", i64::from(defaults.max_conflict_retries))?
        .set_default("landed_cost_policy", "weighted")?
        .set_default("auto_link.inbound", defaults.auto_link.inbound)?
        .set_default("auto_link.sales", defaults.auto_link.sales)?
        .set_default("observability.filter", defaults.observability.filter)?
        .set_default("observability.json", defaults.observability.json)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_yields_defaults() {
        let config = EngineConfig::from_toml_str("").unwrap();
        assert_eq!(config, EngineConfig::default());
    }

    #[test]
    fn file_values_override_defaults() {
        let config = EngineConfig::from_toml_str(
            r#"
            currency_scale = 0
            landed_cost_policy = "even_split"

            [auto_link]
            sales = false

            [observability]
            json = false
            "#,
        )
        .unwrap();

        assert_eq!(config.currency_scale, 0);
        assert_eq!(config.max_conflict_retries, 3);
        assert_eq!(config.landed_cost_policy, LandedCostPolicy::EvenSplit);
        assert!(config.auto_link.inbound);
        assert!(!config.auto_link.sales);
        assert!(!config.observability.json);
        assert_eq!(config.observability.filter, "info");
    }

    #[test]
    fn oversized_scale_is_rejected() {
        let err = EngineConfig::from_toml_str("currency_scale = 30").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "currency_scale", .. }));
    }

    #[test]
    fn unknown_policy_fails_to_load() {
        assert!(matches!(
            EngineConfig::from_toml_str(r#"landed_cost_policy = "by_weight""#),
            Err(ConfigError::Load(_))
        ));
    }

    #[test]
    fn missing_file_is_not_an_error() {
        assert!(EngineConfig::load_from("config/does-not-exist").is_ok());
    }
}
