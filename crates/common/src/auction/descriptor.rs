//! Boundary conversion from the host's loosely shaped bid request JSON.
//!
//! Hosts pass duck-typed objects: sizes may be a pair or a list of pairs, native
//! params may live under `mediaTypes.native` or the legacy `nativeParams`, and
//! params are partner-specific. Everything is checked here once, so adapters
//! work against [`BidRequestDescriptor`] only.

use error_stack::{ensure, Report, ResultExt};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::AdapterError;
use crate::native::NativeSpec;

use super::types::{BidRequestDescriptor, MediaRequest, Size, SizeInput};

/// Bid request exactly as the host serializes it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawBidRequest {
    #[serde(default)]
    pub bidder: String,
    #[serde(default)]
    pub bid_id: String,
    #[serde(default)]
    pub ad_unit_code: String,
    #[serde(default)]
    pub bidder_request_id: Option<String>,
    #[serde(default)]
    pub auction_id: Option<String>,
    #[serde(default)]
    pub transaction_id: Option<String>,
    #[serde(default)]
    pub params: Value,
    /// Legacy single media type (`"banner"` / `"native"`).
    #[serde(default)]
    pub media_type: Option<String>,
    #[serde(default)]
    pub media_types: Option<Value>,
    /// Legacy flat size list.
    #[serde(default)]
    pub sizes: Option<Value>,
    #[serde(default)]
    pub native_params: Option<Value>,
    #[serde(default)]
    pub ortb2_imp: Option<Value>,
    #[serde(default)]
    pub schain: Option<Value>,
    /// Result of the host floor module for this bid, when one ran.
    #[serde(default)]
    pub floor: Option<f64>,
    #[serde(default)]
    pub user_id: Option<Value>,
    #[serde(default)]
    pub user_id_as_eids: Option<Vec<Value>>,
    #[serde(default)]
    pub bid_requests_count: Option<u32>,
    #[serde(default)]
    pub bidder_requests_count: Option<u32>,
}

fn invalid(message: impl Into<String>) -> AdapterError {
    AdapterError::InvalidBidRequest {
        message: message.into(),
    }
}

fn parse_sizes(value: &Value, field: &str) -> Result<Vec<Size>, Report<AdapterError>> {
    let input: SizeInput = serde_json::from_value(value.clone())
        .change_context(invalid(format!("{field} must be [w, h] or [[w, h], ...]")))?;
    Ok(input.into_sizes())
}

fn parse_native(value: &Value, field: &str) -> Result<NativeSpec, Report<AdapterError>> {
    serde_json::from_value(value.clone())
        .change_context(invalid(format!("{field} is not a valid native asset request")))
}

fn object_or_empty(value: Option<&Value>) -> Map<String, Value> {
    value
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default()
}

impl TryFrom<RawBidRequest> for BidRequestDescriptor {
    type Error = Report<AdapterError>;

    fn try_from(raw: RawBidRequest) -> Result<Self, Self::Error> {
        let params = match raw.params {
            Value::Object(map) => map,
            Value::Null => Map::new(),
            _ => return Err(Report::new(invalid("params must be an object"))),
        };

        let media_types = match raw.media_types {
            Some(Value::Object(map)) => Some(map),
            Some(Value::Null) | None => None,
            Some(_) => return Err(Report::new(invalid("mediaTypes must be an object"))),
        };

        let legacy_sizes = match raw.sizes.as_ref() {
            Some(Value::Null) | None => None,
            Some(value) => Some(parse_sizes(value, "sizes")?),
        };

        let mut media = Vec::new();

        if let Some(banner) = media_types.as_ref().and_then(|m| m.get("banner")) {
            ensure!(banner.is_object(), invalid("mediaTypes.banner must be an object"));
            let sizes = match banner.get("sizes") {
                Some(Value::Null) | None => legacy_sizes.clone().unwrap_or_default(),
                Some(value) => parse_sizes(value, "mediaTypes.banner.sizes")?,
            };
            media.push(MediaRequest::Banner { sizes });
        } else if let Some(sizes) = legacy_sizes {
            let legacy_banner = match raw.media_type.as_deref() {
                None => media_types.is_none(),
                Some(kind) => kind == "banner",
            };
            if legacy_banner {
                media.push(MediaRequest::LegacySizes { sizes });
            }
        }

        if let Some(native) = media_types.as_ref().and_then(|m| m.get("native")) {
            media.push(MediaRequest::Native(parse_native(native, "mediaTypes.native")?));
        } else if raw.media_type.as_deref() == Some("native") {
            if let Some(native) = raw.native_params.as_ref() {
                media.push(MediaRequest::Native(parse_native(native, "nativeParams")?));
            }
        }

        let ortb2_imp = match raw.ortb2_imp {
            Some(Value::Object(map)) => Some(map),
            _ => None,
        };

        Ok(BidRequestDescriptor {
            bidder: raw.bidder,
            bid_id: raw.bid_id,
            ad_unit_code: raw.ad_unit_code,
            bidder_request_id: raw.bidder_request_id,
            auction_id: raw.auction_id,
            transaction_id: raw.transaction_id,
            params,
            media,
            ortb2_imp,
            schain: raw.schain.filter(|s| !s.is_null()),
            floor: raw.floor,
            user_id: object_or_empty(raw.user_id.as_ref()),
            user_id_as_eids: raw.user_id_as_eids.unwrap_or_default(),
            bid_requests_count: raw.bid_requests_count,
            bidder_requests_count: raw.bidder_requests_count,
        })
    }
}

impl BidRequestDescriptor {
    /// Parse and validate one host bid request.
    ///
    /// # Errors
    ///
    /// Returns [`AdapterError::InvalidBidRequest`] when the JSON does not have the
    /// shape of a bid request (non-object params, malformed sizes or native spec).
    pub fn from_json(value: &Value) -> Result<Self, Report<AdapterError>> {
        let raw: RawBidRequest = serde_json::from_value(value.clone())
            .change_context(invalid("bid request is not an object"))?;
        Self::try_from(raw)
    }

    /// Parse a host batch, skipping (and logging) entries that fail validation.
    #[must_use]
    pub fn from_json_batch(values: &[Value]) -> Vec<Self> {
        values
            .iter()
            .filter_map(|value| match Self::from_json(value) {
                Ok(descriptor) => Some(descriptor),
                Err(e) => {
                    log::warn!("Skipping invalid bid request: {e:?}");
                    None
                }
            })
            .collect()
    }
}
