//! AdQuery bidder: one JSON POST per banner slot plus event pixels for
//! timeouts, wins and ad-server targeting.

use std::sync::Arc;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use error_stack::{Report, ResultExt};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::adapter::{
    BidMeta, BidderAdapter, HostBid, HttpMethod, InterpretedResponse, NormalizedBid,
    RequestOptions, ServerRequest, ServerResponse, SyncOptions, SyncType, TimedOutBid, UserSync,
};
use crate::auction::{AuctionContext, BidRequestDescriptor, MediaType, Size};
use crate::constants::ADAPTERS_VERSION;
use crate::error::AdapterError;
use crate::identity::IdentityCache;
use crate::pixel::build_url;
use crate::privacy::GdprConsent;
use crate::settings::{AdqueryConfig, Settings};
use crate::transport::Transport;

pub const BIDDER_CODE: &str = "adquery";
const GVLID: u16 = 902;
const DEFAULT_CURRENCY: &str = "PLN";
const TTL_SECONDS: u32 = 360;
const QID_KEY: &str = "qid";
const SUPPORTED_MEDIA_TYPES: &[MediaType] = &[MediaType::Banner];

/// Body of `POST /prebid/bid`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct BidRequestBody<'a> {
    v: &'a str,
    placement_code: Option<&'a Value>,
    /// Always sent as `null`.
    auction_id: Value,
    #[serde(rename = "type")]
    placement_type: Option<&'a Value>,
    ad_unit_code: &'a str,
    bid_qid: String,
    bid_id: &'a str,
    bidder: &'a str,
    bid_page_url: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    bidder_request_id: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    bid_requests_count: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    bidder_requests_count: Option<u32>,
    sizes: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AdqueryMediaType {
    #[serde(default)]
    width: u32,
    #[serde(default)]
    height: u32,
    #[serde(default)]
    name: Option<MediaType>,
}

/// `body.data` of a bid response.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AdqueryBid {
    request_id: String,
    cpm: f64,
    #[serde(default, deserialize_with = "crate::json::deserialize_string_or_number")]
    creation_id: String,
    #[serde(default)]
    dealid: Option<String>,
    #[serde(default)]
    currency: Option<String>,
    #[serde(default)]
    adq_lib: String,
    #[serde(default)]
    tag: String,
    media_type: AdqueryMediaType,
    #[serde(default)]
    ad_domains: Vec<String>,
}

pub struct AdqueryAdapter {
    config: AdqueryConfig,
    identity: Arc<IdentityCache>,
}

impl AdqueryAdapter {
    #[must_use]
    pub fn new(config: AdqueryConfig, identity: Arc<IdentityCache>) -> Self {
        Self { config, identity }
    }

    /// `userId.qid` from the identity module, else the process one-time id.
    fn user_qid(&self, bid: &BidRequestDescriptor) -> String {
        match bid.user_id.get(QID_KEY).and_then(Value::as_str) {
            Some(qid) if !qid.is_empty() => qid.to_string(),
            _ => self.identity.get_or_generate(QID_KEY),
        }
    }

    fn banner_sizes(bid: &BidRequestDescriptor) -> Option<&[Size]> {
        if !bid.has_banner_declaration() {
            return None;
        }
        bid.banner_sizes().filter(|sizes| !sizes.is_empty())
    }

    fn build_request(
        &self,
        bid: &BidRequestDescriptor,
        context: &AuctionContext,
    ) -> Result<ServerRequest, Report<AdapterError>> {
        let sizes = Self::banner_sizes(bid)
            .unwrap_or_default()
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(",");

        let body = BidRequestBody {
            v: ADAPTERS_VERSION,
            placement_code: bid.params.get("placementId"),
            auction_id: Value::Null,
            placement_type: bid.params.get("type"),
            ad_unit_code: &bid.ad_unit_code,
            bid_qid: self.user_qid(bid),
            bid_id: &bid.bid_id,
            bidder: &bid.bidder,
            bid_page_url: context.referer_info.page.as_deref().unwrap_or_default(),
            bidder_request_id: bid.bidder_request_id.as_deref(),
            bid_requests_count: bid.bid_requests_count,
            bidder_requests_count: bid.bidder_requests_count,
            sizes,
        };

        let data = serde_json::to_string(&body)
            .change_context(AdapterError::Serialization {
                message: "Failed to serialize AdQuery bid request".to_string(),
            })
            .attach(format!("bid_id: {}", bid.bid_id))?;

        Ok(ServerRequest {
            method: HttpMethod::Post,
            url: format!("https://{}/prebid/bid", self.config.bidder_domain),
            data,
            options: Some(RequestOptions {
                with_credentials: Some(false),
                cross_origin: Some(true),
                content_type: None,
            }),
        })
    }

    fn interpret_bid(bid: AdqueryBid) -> NormalizedBid {
        let media_type = bid.media_type.name.unwrap_or(MediaType::Banner);
        NormalizedBid {
            request_id: bid.request_id,
            cpm: bid.cpm,
            currency: bid
                .currency
                .filter(|c| !c.is_empty())
                .unwrap_or_else(|| DEFAULT_CURRENCY.to_string()),
            width: bid.media_type.width,
            height: bid.media_type.height,
            creative_id: bid.creation_id,
            deal_id: Some(bid.dealid.unwrap_or_default()),
            ad: Some(format!(
                "<script src=\"{}\"></script>{}",
                bid.adq_lib, bid.tag
            )),
            native: None,
            media_type,
            meta: BidMeta {
                advertiser_domains: bid.ad_domains,
                dsa: None,
                media_type: Some(media_type),
            },
            ttl: TTL_SECONDS,
            net_revenue: true,
            referrer: Some(String::new()),
            ext: None,
        }
    }

    fn fire(&self, transport: &dyn Transport, path: &str, params: &[(&str, Option<String>)]) {
        match build_url(&self.config.bidder_domain, path, params) {
            Ok(url) => transport.trigger_pixel(&url),
            Err(e) => log::error!("AdQuery: failed to build pixel URL: {e:?}"),
        }
    }
}

impl BidderAdapter for AdqueryAdapter {
    fn code(&self) -> &'static str {
        BIDDER_CODE
    }

    fn gvlid(&self) -> Option<u16> {
        Some(GVLID)
    }

    fn supported_media_types(&self) -> &'static [MediaType] {
        SUPPORTED_MEDIA_TYPES
    }

    fn is_bid_request_valid(&self, bid: &BidRequestDescriptor) -> bool {
        bid.param_str("placementId").is_some() && Self::banner_sizes(bid).is_some()
    }

    fn build_requests(
        &self,
        bids: &[BidRequestDescriptor],
        context: &AuctionContext,
    ) -> Vec<ServerRequest> {
        log::info!("AdQuery: building {} requests", bids.len());
        bids.iter()
            .filter_map(|bid| match self.build_request(bid, context) {
                Ok(request) => {
                    log::debug!("AdQuery: request body: {}", request.data);
                    Some(request)
                }
                Err(e) => {
                    log::error!("AdQuery: skipping bid request: {e:?}");
                    None
                }
            })
            .collect()
    }

    fn interpret_response(
        &self,
        response: &ServerResponse,
        _request: &ServerRequest,
    ) -> InterpretedResponse {
        let Some(data) = response.body.get("data").filter(|d| d.is_object()) else {
            return InterpretedResponse::empty();
        };

        match serde_json::from_value::<AdqueryBid>(data.clone()) {
            Ok(bid) => InterpretedResponse::Bids(vec![Self::interpret_bid(bid)]),
            Err(e) => {
                log::warn!("AdQuery: malformed bid response: {e}");
                InterpretedResponse::empty()
            }
        }
    }

    fn on_timeout(&self, timed_out: &[TimedOutBid], transport: &dyn Transport) {
        for bid in timed_out {
            log::info!("AdQuery: bid {} timed out", bid.bid_id);
            self.fire(
                transport,
                "/prebid/eventTimeout",
                &[
                    ("bidder", Some(bid.bidder.clone())),
                    ("bId", Some(bid.bid_id.clone())),
                    ("adUnitCode", Some(bid.ad_unit_code.clone())),
                    ("timeout", bid.timeout.map(|t| t.to_string())),
                    ("auctionId", bid.auction_id.clone()),
                ],
            );
        }
    }

    fn on_bid_won(&self, bid: &HostBid, transport: &dyn Transport) {
        let without_ad = HostBid {
            ad: None,
            ..bid.clone()
        };
        let encoded = match serde_json::to_string(&without_ad) {
            Ok(json) => STANDARD.encode(json),
            Err(e) => {
                log::error!("AdQuery: failed to encode won bid: {e}");
                return;
            }
        };
        self.fire(transport, "/prebid/eventBidWon", &[("q", Some(encoded))]);
    }

    fn on_set_targeting(&self, bid: &HostBid, transport: &dyn Transport) {
        self.fire(
            transport,
            "/prebid/eventSetTargeting",
            &[
                ("bidder", Some(bid.bidder.clone())),
                ("width", Some(bid.width.to_string())),
                ("height", Some(bid.height.to_string())),
                ("bid", Some(bid.ad_id.clone())),
                ("mediaType", bid.media_type.map(|m| m.to_string())),
                ("cpm", Some(bid.cpm.to_string())),
                ("requestId", Some(bid.request_id.clone())),
                ("adUnitCode", Some(bid.ad_unit_code.clone())),
            ],
        );
    }

    fn get_user_syncs(
        &self,
        _options: &SyncOptions,
        _responses: &[ServerResponse],
        gdpr: Option<&GdprConsent>,
        usp: Option<&str>,
    ) -> Vec<UserSync> {
        let mut params = Vec::new();
        if let Some(gdpr) = gdpr {
            if let Some(consent) = gdpr.consent_string.as_ref().filter(|c| !c.is_empty()) {
                let applies = u8::from(gdpr.gdpr_applies.unwrap_or(false));
                params.push(("gdpr", Some(applies.to_string())));
                params.push(("gdpr_consent", Some(consent.clone())));
            }
        }
        if let Some(usp) = usp.filter(|u| !u.is_empty()) {
            params.push(("ccpa_consent", Some(usp.to_string())));
        }

        match build_url(&self.config.bidder_domain, "/prebid/userSync?1=1", &params) {
            Ok(url) => vec![UserSync {
                sync_type: SyncType::Image,
                url,
            }],
            Err(e) => {
                log::error!("AdQuery: failed to build user sync URL: {e:?}");
                Vec::new()
            }
        }
    }
}

/// Register the AdQuery adapter when enabled in settings.
#[must_use]
pub fn register(settings: &Settings) -> Option<Arc<dyn BidderAdapter>> {
    if !settings.adquery.enabled {
        log::info!("AdQuery adapter not registered: disabled");
        return None;
    }
    Some(Arc::new(AdqueryAdapter::new(
        settings.adquery.clone(),
        IdentityCache::global(),
    )))
}
