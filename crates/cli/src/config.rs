//! Configuration commands.
//!
//! Settings are loaded from a TOML file (or the embedded defaults) and merged
//! with environment variables prefixed with `BID_ADAPTERS__`. For example,
//! `BID_ADAPTERS__ADQUERY__ENABLED=false` overrides `adquery.enabled`.

use std::path::{Path, PathBuf};

use bid_adapters_common::integrations::AdapterRegistry;
use bid_adapters_common::settings::Settings;

use crate::error::CliError;

/// Load settings from `file`, or the embedded defaults when no file is given.
pub(crate) fn load_settings(file: Option<&Path>) -> Result<Settings, CliError> {
    let settings = match file {
        Some(path) => {
            log::debug!("Loading config from: {}", path.display());
            Settings::from_file(path)?
        }
        None => {
            log::debug!("Loading embedded default config");
            Settings::new()?
        }
    };
    Ok(settings)
}

/// Print the effective configuration after environment overrides.
pub fn show(file: Option<PathBuf>) -> Result<(), CliError> {
    let settings = load_settings(file.as_deref())?;
    let merged = settings.to_toml_string()?;
    println!("{merged}");
    Ok(())
}

/// Validate a configuration file and list the adapters it enables.
pub fn validate(file: PathBuf) -> Result<(), CliError> {
    let settings = load_settings(Some(&file))?;
    let registry = AdapterRegistry::new(&settings);

    println!("Configuration is valid");
    println!("  File: {}", file.display());
    println!("  Bidders: {}", registry.codes().join(", "));
    println!(
        "  GU analytics: {}",
        if settings.gu_analytics.is_some() {
            "configured"
        } else {
            "not configured"
        }
    );
    Ok(())
}
