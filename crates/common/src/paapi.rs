//! Protected Audience (PAAPI, formerly FLEDGE) auction configuration.
//!
//! Requests carry a seller config in `ext.fledge_config`; responses may carry
//! interest-group bids that become component auction configs for the host.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::json::merge_deep;
use crate::settings::PaapiSettings;

const DEFAULT_SELLER_TIMEOUT_MS: u64 = 500;

/// Ordered list of optional override sources. The first present one wins.
///
/// A present but empty table still wins, matching a host that enables PAAPI
/// with `fledgeConfig: true` and no further keys.
#[derive(Debug, Default)]
pub struct OverrideChain<'a> {
    sources: Vec<Option<&'a Map<String, Value>>>,
}

impl<'a> OverrideChain<'a> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Host-configured chain: `paapiConfig`, then the legacy `fledgeConfig`.
    #[must_use]
    pub fn from_settings(settings: &'a PaapiSettings) -> Self {
        Self::new()
            .then(settings.paapi_config.as_ref())
            .then(settings.fledge_config.as_ref())
    }

    #[must_use]
    pub fn then(mut self, source: Option<&'a Map<String, Value>>) -> Self {
        self.sources.push(source);
        self
    }

    #[must_use]
    pub fn resolve(&self) -> Option<&'a Map<String, Value>> {
        self.sources.iter().find_map(|source| *source)
    }
}

/// Seller defaults used when neither the host nor the partner provides one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SellerDefaults {
    pub seller: String,
    pub decision_logic_url: String,
}

/// Build the request-side `ext.fledge_config`.
///
/// The base seller config is shallow-merged with exactly one override: the
/// host `paapiConfig`, else `fledgeConfig`, else `{sellerTimeout: 500}`.
#[must_use]
pub fn build_fledge_config(
    defaults: &SellerDefaults,
    settings: &PaapiSettings,
) -> Map<String, Value> {
    let mut config = Map::new();
    config.insert("seller".into(), Value::from(defaults.seller.as_str()));
    config.insert(
        "decisionLogicUrl".into(),
        Value::from(defaults.decision_logic_url.as_str()),
    );

    match OverrideChain::from_settings(settings).resolve() {
        Some(overrides) => {
            for (key, value) in overrides {
                config.insert(key.clone(), value.clone());
            }
        }
        None => {
            config.insert(
                "sellerTimeout".into(),
                Value::from(DEFAULT_SELLER_TIMEOUT_MS),
            );
        }
    }

    config
}

/// Component auction config handed back to the host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuctionConfig {
    pub seller: String,
    pub decision_logic_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seller_timeout: Option<u64>,
    #[serde(default)]
    pub interest_group_buyers: Vec<String>,
    #[serde(default)]
    pub per_buyer_signals: Map<String, Value>,
    /// Custom host keys forwarded unchanged.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl AuctionConfig {
    /// Merge a host-configured override into this config.
    ///
    /// Scalars are replaced, buyers are unioned in first-seen order, per-buyer
    /// signals are deep-merged with the configured value winning, and unknown
    /// keys land in [`AuctionConfig::extra`]. A known key with the wrong type
    /// is logged and skipped. Applying the same override twice is a no-op.
    pub fn merge_configured(&mut self, configured: &Map<String, Value>) {
        for (key, value) in configured {
            match (key.as_str(), value) {
                ("seller", Value::String(seller)) => self.seller.clone_from(seller),
                ("decisionLogicUrl", Value::String(url)) => {
                    self.decision_logic_url.clone_from(url);
                }
                ("sellerTimeout", Value::Number(n)) if n.as_u64().is_some() => {
                    self.seller_timeout = n.as_u64();
                }
                ("interestGroupBuyers", Value::Array(buyers)) => {
                    for buyer in buyers.iter().filter_map(Value::as_str) {
                        if !self.interest_group_buyers.iter().any(|b| b == buyer) {
                            self.interest_group_buyers.push(buyer.to_string());
                        }
                    }
                }
                ("perBuyerSignals", Value::Object(signals)) => {
                    merge_deep(&mut self.per_buyer_signals, signals);
                }
                (
                    "seller" | "decisionLogicUrl" | "sellerTimeout" | "interestGroupBuyers"
                    | "perBuyerSignals",
                    _,
                ) => {
                    log::warn!("Ignoring configured PAAPI {key} with unexpected value: {value}");
                }
                _ => {
                    let mut single = Map::new();
                    single.insert(key.clone(), value.clone());
                    merge_deep(&mut self.extra, &single);
                }
            }
        }
    }
}

/// `{bidId, config}` pair returned next to the bids.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaapiAuctionConfig {
    pub bid_id: String,
    pub config: AuctionConfig,
}

fn empty_signal() -> Value {
    Value::Object(Map::new())
}

#[derive(Debug, Clone, Deserialize)]
pub struct InterestGroupBuyer {
    pub igdomain: String,
    #[serde(default = "empty_signal")]
    pub buyersignal: Value,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InterestGroupBid {
    pub impid: String,
    #[serde(default)]
    pub igbuyer: Vec<InterestGroupBuyer>,
}

/// `ext` of a FLEDGE-shaped partner response.
///
/// `igbid` entries are kept raw and parsed one by one, so a malformed entry
/// only drops itself.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FledgeResponseExt {
    #[serde(default)]
    pub igbid: Vec<Value>,
    #[serde(default)]
    pub seller: Option<String>,
    #[serde(default)]
    pub decision_logic_url: Option<String>,
    #[serde(default)]
    pub seller_timeout: Option<u64>,
}

/// Turn each interest-group bid into a component auction config, merging the
/// host `paapiConfig` (else `fledgeConfig`) over what the partner returned.
#[must_use]
pub fn auction_configs_from_response(
    ext: &FledgeResponseExt,
    defaults: &SellerDefaults,
    settings: &PaapiSettings,
) -> Vec<PaapiAuctionConfig> {
    let configured = OverrideChain::from_settings(settings).resolve();

    ext.igbid
        .iter()
        .filter_map(|entry| {
            serde_json::from_value::<InterestGroupBid>(entry.clone())
                .map_err(|e| log::warn!("Skipping malformed interest group bid: {e}"))
                .ok()
        })
        .map(|igbid| {
            let mut config = AuctionConfig {
                seller: ext.seller.clone().unwrap_or_else(|| defaults.seller.clone()),
                decision_logic_url: ext
                    .decision_logic_url
                    .clone()
                    .unwrap_or_else(|| defaults.decision_logic_url.clone()),
                seller_timeout: ext.seller_timeout,
                interest_group_buyers: Vec::new(),
                per_buyer_signals: Map::new(),
                extra: Map::new(),
            };
            for buyer in &igbid.igbuyer {
                if !config.interest_group_buyers.contains(&buyer.igdomain) {
                    config.interest_group_buyers.push(buyer.igdomain.clone());
                }
                config
                    .per_buyer_signals
                    .insert(buyer.igdomain.clone(), buyer.buyersignal.clone());
            }
            if let Some(configured) = configured {
                config.merge_configured(configured);
            }
            PaapiAuctionConfig {
                bid_id: igbid.impid,
                config,
            }
        })
        .collect()
}
