//! CLI execution context.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context as _, Result};
use storefront_db::Db;
use storefront_orders::{
    CatalogService, OrderService, RetryPolicy, SettingsStore, StoreMembershipTracker,
};

use crate::config::{StorefrontConfig, CONFIG_NAMES};
use crate::output::Output;

/// Execution context for CLI commands.
pub struct Context {
    /// Storefront configuration.
    pub config: StorefrontConfig,
    /// Output handler.
    pub output: Output,
    pub catalog: CatalogService,
    pub orders: OrderService,
    pub settings: SettingsStore,
    pub membership: StoreMembershipTracker,
}

impl Context {
    /// Load the config and open the store it points at.
    pub async fn load(config_path: Option<&str>, output: Output) -> Result<Self> {
        let cwd = std::env::current_dir().context("Failed to get current directory")?;

        let config = match config_path {
            Some(path) => StorefrontConfig::load(Path::new(path))?,
            None => match Self::find_config(&cwd) {
                Some(path) => {
                    output.debug(&format!("Using config: {}", path.display()));
                    StorefrontConfig::load(&path)?
                }
                None => {
                    output.debug("No config file found, using defaults");
                    StorefrontConfig::default()
                }
            },
        };

        let db_path = resolve_path(&cwd, &config.database.path);
        let db = Db::open(&db_path)
            .await
            .with_context(|| format!("Failed to open store: {}", db_path.display()))?;
        output.debug(&format!("Store: {}", db_path.display()));

        let retry = RetryPolicy::default();
        let currency = config.pricing.currency;
        let thresholds = config.membership.thresholds(currency)?;
        let membership = StoreMembershipTracker::new(db.clone(), thresholds, retry.clone());

        let orders = OrderService::new(db.clone(), config.pricing.clone())
            .with_membership_tracker(Arc::new(membership.clone()));

        Ok(Self {
            catalog: CatalogService::new(db.clone(), retry),
            settings: SettingsStore::new(db.clone(), currency),
            orders,
            membership,
            config,
            output,
        })
    }

    /// Find the nearest config file, walking up from `start`.
    fn find_config(start: &Path) -> Option<PathBuf> {
        let mut current = start.to_path_buf();
        loop {
            for name in &CONFIG_NAMES {
                let config_path = current.join(name);
                if config_path.exists() {
                    return Some(config_path);
                }
            }

            if !current.pop() {
                break;
            }
        }

        None
    }
}

/// Resolve a path relative to the working directory.
fn resolve_path(cwd: &Path, path: &str) -> PathBuf {
    if Path::new(path).is_absolute() {
        PathBuf::from(path)
    } else {
        cwd.join(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_config_walks_up() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a").join("b");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::write(dir.path().join(".storefront.toml"), "").unwrap();

        let found = Context::find_config(&nested).unwrap();
        assert_eq!(found, dir.path().join(".storefront.toml"));
    }

    #[test]
    fn test_resolve_path() {
        let cwd = Path::new("/srv/shop");
        assert_eq!(resolve_path(cwd, "data.json"), PathBuf::from("/srv/shop/data.json"));
        assert_eq!(resolve_path(cwd, "/var/data.json"), PathBuf::from("/var/data.json"));
    }

    #[tokio::test]
    async fn test_load_with_explicit_config() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("storefront.toml");
        let db_path = dir.path().join("shop.json");
        std::fs::write(
            &config_path,
            format!("[database]\npath = {:?}\n", db_path.display().to_string()),
        )
        .unwrap();

        let ctx = Context::load(config_path.to_str(), Output::new(false, true))
            .await
            .unwrap();
        assert!(!db_path.exists());

        let product = storefront_commerce::catalog::Product::new(
            "MUG-1",
            "Mug",
            storefront_commerce::Money::new(100_000, ctx.config.pricing.currency),
            5,
        )
        .unwrap();
        ctx.catalog.add_product(product).await.unwrap();
        assert!(db_path.exists());
    }
}
