use std::path::Path;

use config::{Config, Environment, File, FileFormat};
use error_stack::{Report, ResultExt};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use validator::Validate;

use crate::constants::{ENV_PREFIX, ENV_SEPARATOR};
use crate::error::AdapterError;

const DEFAULT_SETTINGS_TOML: &str = include_str!("../../../bid-adapters.toml");

/// RTB House adapter configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct RtbHouseConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Host suffix appended to the region, e.g. `prebid-eu.` + `creativecdn.com`.
    #[serde(default = "default_rtbhouse_endpoint_domain")]
    #[validate(length(min = 1))]
    pub endpoint_domain: String,
    #[serde(default = "default_fledge_seller")]
    #[validate(url)]
    pub fledge_seller: String,
    #[serde(default = "default_fledge_decision_logic_url")]
    #[validate(url)]
    pub fledge_decision_logic_url: String,
}

impl Default for RtbHouseConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            endpoint_domain: default_rtbhouse_endpoint_domain(),
            fledge_seller: default_fledge_seller(),
            fledge_decision_logic_url: default_fledge_decision_logic_url(),
        }
    }
}

/// AdQuery adapter configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct AdqueryConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default = "default_adquery_bidder_domain")]
    #[validate(length(min = 1))]
    pub bidder_domain: String,
}

impl Default for AdqueryConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            bidder_domain: default_adquery_bidder_domain(),
        }
    }
}

/// Host-level PAAPI configuration (`paapiConfig` / legacy `fledgeConfig`).
///
/// Both are free-form: any key is forwarded to the partner or merged into the
/// returned auction configs.
#[derive(Debug, Clone, Default, Deserialize, Serialize, Validate)]
pub struct PaapiSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paapi_config: Option<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fledge_config: Option<Map<String, Value>>,
}

/// Options for the GU analytics adapter. Checked when the adapter is enabled.
#[derive(Debug, Clone, Default, Deserialize, Serialize, Validate)]
pub struct GuAnalyticsConfig {
    #[serde(default)]
    #[validate(required(message = "ajaxUrl is not defined"), url)]
    pub ajax_url: Option<String>,
    #[serde(default)]
    #[validate(required(message = "pv is not defined"), length(min = 1))]
    pub pv: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, Validate)]
pub struct Settings {
    #[serde(default)]
    #[validate(nested)]
    pub rtbhouse: RtbHouseConfig,
    #[serde(default)]
    #[validate(nested)]
    pub adquery: AdqueryConfig,
    #[serde(default)]
    pub paapi: PaapiSettings,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gu_analytics: Option<GuAnalyticsConfig>,
}

fn default_enabled() -> bool {
    true
}

fn default_rtbhouse_endpoint_domain() -> String {
    "creativecdn.com".to_string()
}

fn default_fledge_seller() -> String {
    "https://fledge-ssp.creativecdn.com".to_string()
}

fn default_fledge_decision_logic_url() -> String {
    "https://fledge-ssp.creativecdn.com/component-seller-prebid.js".to_string()
}

fn default_adquery_bidder_domain() -> String {
    "bidder.adquery.io".to_string()
}

impl Settings {
    /// Load the embedded defaults merged with `BID_ADAPTERS__*` environment overrides.
    ///
    /// # Errors
    ///
    /// Returns [`AdapterError::Configuration`] when the merged configuration
    /// cannot be deserialized or fails validation.
    pub fn new() -> Result<Self, Report<AdapterError>> {
        Self::from_toml(DEFAULT_SETTINGS_TOML)
    }

    /// Parse settings from a TOML string, then apply environment overrides.
    ///
    /// # Errors
    ///
    /// Returns [`AdapterError::Configuration`] on malformed TOML, type
    /// mismatches or validation failures.
    pub fn from_toml(toml_str: &str) -> Result<Self, Report<AdapterError>> {
        let environment = Environment::default()
            .prefix(ENV_PREFIX)
            .separator(ENV_SEPARATOR);

        let toml = File::from_str(toml_str, FileFormat::Toml);
        let config = Config::builder()
            .add_source(toml)
            .add_source(environment)
            .build()
            .change_context(AdapterError::Configuration {
                message: "Failed to build configuration".to_string(),
            })?;

        let settings: Self =
            config
                .try_deserialize()
                .change_context(AdapterError::Configuration {
                    message: "Failed to deserialize configuration".to_string(),
                })?;

        settings.validate().map_err(|e| {
            Report::new(AdapterError::Configuration {
                message: format!("Settings validation failed: {e}"),
            })
        })?;

        Ok(settings)
    }

    /// Read a TOML file from disk and load it like [`Settings::from_toml`].
    ///
    /// # Errors
    ///
    /// Returns [`AdapterError::Configuration`] when the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self, Report<AdapterError>> {
        let content = std::fs::read_to_string(path)
            .change_context(AdapterError::Configuration {
                message: "Failed to read settings file".to_string(),
            })
            .attach(format!("path: {}", path.display()))?;
        Self::from_toml(&content)
    }

    /// Serialize the effective (merged) settings back to TOML.
    ///
    /// # Errors
    ///
    /// Returns [`AdapterError::Serialization`] when a value has no TOML representation.
    pub fn to_toml_string(&self) -> Result<String, Report<AdapterError>> {
        toml::to_string_pretty(self).change_context(AdapterError::Serialization {
            message: "Failed to serialize settings to TOML".to_string(),
        })
    }
}
