//! CLI configuration.

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use storefront_observability::LoggingConfig;
use storefront_orders::{MembershipConfig, PricingConfig, SweepConfig};

/// File names searched for, in order, in each directory.
pub const CONFIG_NAMES: [&str; 3] = ["storefront.toml", ".storefront.toml", "storefront.json"];

/// Storefront configuration file.
///
/// Auto-confirmation settings are not part of it: they live in the store and
/// are edited with `storefront settings set`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StorefrontConfig {
    /// Store location.
    #[serde(default)]
    pub database: DatabaseConfig,

    #[serde(default)]
    pub logging: LoggingConfig,

    /// Currency, shipping and discount combination.
    #[serde(default)]
    pub pricing: PricingConfig,

    /// Membership tier thresholds.
    #[serde(default)]
    pub membership: MembershipConfig,

    /// Sweep scheduling.
    #[serde(default)]
    pub sweep: SweepConfig,
}

impl StorefrontConfig {
    /// Load config from a file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = if path.extension().is_some_and(|e| e == "json") {
            serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse JSON config: {}", path.display()))?
        } else {
            toml::from_str(&content)
                .with_context(|| format!("Failed to parse TOML config: {}", path.display()))?
        };

        config.validate()?;
        Ok(config)
    }

    /// Check the sections that can be wrong without failing to parse.
    pub fn validate(&self) -> Result<()> {
        self.pricing.validate().context("Invalid [pricing] section")?;
        self.membership
            .thresholds(self.pricing.currency)
            .context("Invalid [membership] section")?;
        Ok(())
    }
}

/// Store location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// JSON snapshot file, relative to the working directory.
    #[serde(default = "default_database_path")]
    pub path: String,
}

fn default_database_path() -> String {
    "storefront-data.json".to_string()
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
        }
    }
}

/// Generate a default storefront.toml config file.
pub fn generate_default_config() -> String {
    r#"# Storefront configuration

[database]
path = "storefront-data.json"

[logging]
# trace, debug, info, warn, error
level = "info"
# human or json
format = "human"

[pricing]
currency = "VND"
# Amounts are in minor units of the currency
shipping_fee = 30000
# free_shipping_threshold = 500000
# best, prefer_code or combine
discount_policy = "best"

[membership]
silver = 5000000
gold = 20000000
diamond = 50000000

[sweep]
# Shortest pause between two auto-confirmation cycles
min_poll_seconds = 60
"#
    .to_string()
}
