//! The bidder adapter contract and the request/response records it exchanges
//! with the host.

use derive_more::Display;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::auction::{AuctionContext, BidRequestDescriptor, MediaType};
use crate::native::NativeAd;
use crate::paapi::PaapiAuctionConfig;
use crate::privacy::GdprConsent;
use crate::transport::Transport;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    #[display("GET")]
    Get,
    #[display("POST")]
    Post,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub with_credentials: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cross_origin: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
}

/// Fully built HTTP request handed to the host transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerRequest {
    pub method: HttpMethod,
    pub url: String,
    /// Serialized JSON body.
    pub data: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<RequestOptions>,
}

/// Partner response as delivered by the host; `body` is already JSON-decoded.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServerResponse {
    #[serde(default)]
    pub body: Value,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BidMeta {
    pub advertiser_domains: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dsa: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_type: Option<MediaType>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NormalizedBidExt {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dsa: Option<Value>,
}

/// Partner-agnostic bid returned to the host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedBid {
    pub request_id: String,
    pub cpm: f64,
    pub currency: String,
    pub width: u32,
    pub height: u32,
    pub creative_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deal_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ad: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub native: Option<NativeAd>,
    pub media_type: MediaType,
    pub meta: BidMeta,
    pub ttl: u32,
    pub net_revenue: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub referrer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ext: Option<NormalizedBidExt>,
}

/// Result of [`BidderAdapter::interpret_response`].
///
/// Serializes as a bare bid array or as `{bids, paapi}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum InterpretedResponse {
    Bids(Vec<NormalizedBid>),
    WithPaapi {
        bids: Vec<NormalizedBid>,
        paapi: Vec<PaapiAuctionConfig>,
    },
}

impl InterpretedResponse {
    #[must_use]
    pub fn empty() -> Self {
        Self::Bids(Vec::new())
    }

    #[must_use]
    pub fn bids(&self) -> &[NormalizedBid] {
        match self {
            Self::Bids(bids) | Self::WithPaapi { bids, .. } => bids,
        }
    }

    #[must_use]
    pub fn paapi(&self) -> &[PaapiAuctionConfig] {
        match self {
            Self::Bids(_) => &[],
            Self::WithPaapi { paapi, .. } => paapi,
        }
    }
}

/// Bid that missed the auction deadline, as reported by the host.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimedOutBid {
    #[serde(default)]
    pub bidder: String,
    #[serde(default)]
    pub bid_id: String,
    #[serde(default)]
    pub ad_unit_code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auction_id: Option<String>,
}

/// Host-side bid passed to won/targeting notifications.
///
/// Keys the adapters do not read are kept in `extra` so the bid can be echoed
/// back to the partner unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HostBid {
    #[serde(default)]
    pub bidder: String,
    #[serde(default)]
    pub ad_id: String,
    #[serde(default)]
    pub ad_unit_code: String,
    #[serde(default)]
    pub request_id: String,
    #[serde(default)]
    pub width: u32,
    #[serde(default)]
    pub height: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_type: Option<MediaType>,
    #[serde(default)]
    pub cpm: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ad: Option<String>,
    #[serde(default, flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncOptions {
    #[serde(default)]
    pub iframe_enabled: bool,
    #[serde(default)]
    pub pixel_enabled: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncType {
    Image,
    Iframe,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSync {
    #[serde(rename = "type")]
    pub sync_type: SyncType,
    pub url: String,
}

/// Trait implemented by every demand-partner module.
///
/// Methods never fail: internal errors are logged and turn into "no request",
/// "no bid" or an omitted field.
pub trait BidderAdapter: Send + Sync {
    /// Bidder code the host routes on (e.g. `"rtbhouse"`).
    fn code(&self) -> &'static str;

    /// IAB TCF global vendor list id, if the partner has one.
    fn gvlid(&self) -> Option<u16> {
        None
    }

    fn supported_media_types(&self) -> &'static [MediaType];

    fn is_bid_request_valid(&self, bid: &BidRequestDescriptor) -> bool;

    fn build_requests(
        &self,
        bids: &[BidRequestDescriptor],
        context: &AuctionContext,
    ) -> Vec<ServerRequest>;

    fn interpret_response(
        &self,
        response: &ServerResponse,
        request: &ServerRequest,
    ) -> InterpretedResponse;

    fn on_timeout(&self, _timed_out: &[TimedOutBid], _transport: &dyn Transport) {}

    fn on_bid_won(&self, _bid: &HostBid, _transport: &dyn Transport) {}

    fn on_set_targeting(&self, _bid: &HostBid, _transport: &dyn Transport) {}

    fn get_user_syncs(
        &self,
        _options: &SyncOptions,
        _responses: &[ServerResponse],
        _gdpr: Option<&GdprConsent>,
        _usp: Option<&str>,
    ) -> Vec<UserSync> {
        Vec::new()
    }
}
