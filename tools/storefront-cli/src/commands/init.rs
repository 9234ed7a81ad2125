//! Write a default configuration file.

use std::path::Path;

use anyhow::{bail, Context as _, Result};

use super::InitArgs;
use crate::config::generate_default_config;
use crate::output::Output;

/// Run the init command.
pub fn run(args: InitArgs, output: &Output) -> Result<()> {
    let path = Path::new(&args.path);

    if path.exists() && !args.force {
        bail!("'{}' already exists (use --force to overwrite)", args.path);
    }

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }

    std::fs::write(path, generate_default_config())
        .with_context(|| format!("Failed to write config file: {}", args.path))?;

    if output.is_json() {
        output.json(&serde_json::json!({ "config": args.path }));
        return Ok(());
    }

    output.success(&format!("Wrote {}", args.path));
    output.info("");
    output.info("Next steps:");
    output.list_item("storefront product add SKU \"Name\" --price 100000 --stock 10");
    output.list_item("storefront settings set --enabled true --delay-minutes 30");
    output.list_item("storefront sweep run");

    Ok(())
}
