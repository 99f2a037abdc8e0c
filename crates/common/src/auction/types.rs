//! Core types for host-provided bid requests and auction context.

use derive_more::Display;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::native::NativeSpec;
use crate::privacy::GdprConsent;

/// Creative size in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[display("{w}x{h}")]
pub struct Size {
    pub w: u32,
    pub h: u32,
}

impl From<[u32; 2]> for Size {
    fn from([w, h]: [u32; 2]) -> Self {
        Self { w, h }
    }
}

/// Sizes as hosts send them: a single `[w, h]` pair or a list of pairs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SizeInput {
    Single([u32; 2]),
    Many(Vec<[u32; 2]>),
}

impl SizeInput {
    #[must_use]
    pub fn into_sizes(self) -> Vec<Size> {
        match self {
            SizeInput::Single(pair) => vec![Size::from(pair)],
            SizeInput::Many(pairs) => pairs.into_iter().map(Size::from).collect(),
        }
    }
}

/// Media type enumeration.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Display)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    #[display("banner")]
    Banner,
    #[display("native")]
    Native,
}

/// One media declaration of a bid request, validated at the host boundary.
#[derive(Debug, Clone, PartialEq)]
pub enum MediaRequest {
    /// `mediaTypes.banner` with its size list.
    Banner { sizes: Vec<Size> },
    /// Native asset request from `mediaTypes.native` or legacy `nativeParams`.
    Native(NativeSpec),
    /// Legacy flat `sizes` with no `mediaTypes` declaration.
    LegacySizes { sizes: Vec<Size> },
}

/// A single bid request as handed over by the host, after boundary validation.
///
/// Adapters only read it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BidRequestDescriptor {
    pub bidder: String,
    pub bid_id: String,
    pub ad_unit_code: String,
    pub bidder_request_id: Option<String>,
    pub auction_id: Option<String>,
    pub transaction_id: Option<String>,
    /// Partner-specific parameters, untyped.
    pub params: Map<String, Value>,
    pub media: Vec<MediaRequest>,
    pub ortb2_imp: Option<Map<String, Value>>,
    pub schain: Option<Value>,
    /// Floor reported by the host floor module, if one ran.
    pub floor: Option<f64>,
    pub user_id: Map<String, Value>,
    pub user_id_as_eids: Vec<Value>,
    pub bid_requests_count: Option<u32>,
    pub bidder_requests_count: Option<u32>,
}

impl BidRequestDescriptor {
    /// First banner-capable size list: `mediaTypes.banner` wins over legacy sizes.
    #[must_use]
    pub fn banner_sizes(&self) -> Option<&[Size]> {
        self.media
            .iter()
            .find_map(|m| match m {
                MediaRequest::Banner { sizes } => Some(sizes.as_slice()),
                _ => None,
            })
            .or_else(|| {
                self.media.iter().find_map(|m| match m {
                    MediaRequest::LegacySizes { sizes } => Some(sizes.as_slice()),
                    _ => None,
                })
            })
    }

    /// At least one usable media declaration: a non-empty size list or a native request.
    #[must_use]
    pub fn has_usable_media(&self) -> bool {
        self.media.iter().any(|m| match m {
            MediaRequest::Banner { sizes } | MediaRequest::LegacySizes { sizes } => {
                !sizes.is_empty()
            }
            MediaRequest::Native(_) => true,
        })
    }

    #[must_use]
    pub fn has_banner_declaration(&self) -> bool {
        self.media
            .iter()
            .any(|m| matches!(m, MediaRequest::Banner { .. }))
    }

    #[must_use]
    pub fn native_spec(&self) -> Option<&NativeSpec> {
        self.media.iter().find_map(|m| match m {
            MediaRequest::Native(spec) => Some(spec),
            _ => None,
        })
    }

    /// String view of a param, accepting numbers as well (`publisherId: 123`).
    #[must_use]
    pub fn param_str(&self, key: &str) -> Option<String> {
        match self.params.get(key)? {
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    /// Nested lookup inside `ortb2Imp`, e.g. `ortb2_imp_value(&["ext", "tid"])`.
    #[must_use]
    pub fn ortb2_imp_value(&self, path: &[&str]) -> Option<&Value> {
        let (first, rest) = path.split_first()?;
        let mut current = self.ortb2_imp.as_ref()?.get(*first)?;
        for key in rest {
            current = current.get(*key)?;
        }
        Some(current)
    }
}

/// Page information resolved by the host.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RefererInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub referer: Option<String>,
    #[serde(default)]
    pub reached_top: bool,
    #[serde(default)]
    pub num_iframes: u32,
}

/// Per-auction PAAPI switch set by the host.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct PaapiFlags {
    #[serde(default)]
    pub enabled: bool,
}

/// The host's per-bidder auction context (`bidderRequest`).
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AuctionContext {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auction_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bidder_request_id: Option<String>,
    #[serde(default)]
    pub referer_info: RefererInfo,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gdpr_consent: Option<GdprConsent>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usp_consent: Option<String>,
    /// First-party data: `site`, `device`, `user`, `bcat`, `badv`, `regs`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ortb2: Option<Map<String, Value>>,
    #[serde(default)]
    pub paapi: PaapiFlags,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u32>,
}

impl AuctionContext {
    #[must_use]
    pub fn paapi_enabled(&self) -> bool {
        self.paapi.enabled
    }

    /// Nested lookup inside first-party data, e.g. `["regs", "ext", "dsa"]`.
    #[must_use]
    pub fn ortb2_value(&self, path: &[&str]) -> Option<&Value> {
        let (first, rest) = path.split_first()?;
        let mut current = self.ortb2.as_ref()?.get(*first)?;
        for key in rest {
            current = current.get(*key)?;
        }
        Some(current)
    }
}
