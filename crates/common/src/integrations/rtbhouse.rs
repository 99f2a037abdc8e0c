//! RTB House bidder: OpenRTB 2.5 over a regional endpoint, with optional
//! Protected Audience (FLEDGE) component auctions.

use std::sync::Arc;

use error_stack::{Report, ResultExt};
use serde_json::{Map, Value};

use crate::adapter::{
    BidMeta, BidderAdapter, HttpMethod, InterpretedResponse, NormalizedBid, NormalizedBidExt,
    ServerRequest, ServerResponse,
};
use crate::auction::{AuctionContext, BidRequestDescriptor, MediaType};
use crate::error::AdapterError;
use crate::json::{is_truthy, merge_missing};
use crate::native::{decode_markup, encode_assets};
use crate::openrtb::{
    Banner, Bid, Format, Imp, ImpExt, Native, OpenRtbRequest, Publisher, Regs,
    RegsExt, RequestExt, Site, Source, User, UserExt,
};
use crate::paapi::{
    auction_configs_from_response, build_fledge_config, FledgeResponseExt, SellerDefaults,
};
use crate::privacy::{normalize_consent_string, validate_dsa, validate_schain};
use crate::settings::{PaapiSettings, RtbHouseConfig, Settings};

pub const BIDDER_CODE: &str = "rtbhouse";
const GVLID: u16 = 16;
const REGIONS: [&str; 3] = ["prebid-eu", "prebid-us", "prebid-asia"];
const DEFAULT_CURRENCY: &str = "USD";
const TTL_SECONDS: u32 = 55;
const CHANNEL_MAX_CHARS: usize = 50;
const SUPPORTED_MEDIA_TYPES: &[MediaType] = &[MediaType::Banner, MediaType::Native];

/// First-party data sections copied from `ortb2` into the envelope.
const FIRST_PARTY_SECTIONS: [&str; 5] = ["site", "device", "user", "bcat", "badv"];

pub struct RtbHouseAdapter {
    config: RtbHouseConfig,
    paapi: PaapiSettings,
}

impl RtbHouseAdapter {
    #[must_use]
    pub fn new(config: RtbHouseConfig, paapi: PaapiSettings) -> Self {
        Self { config, paapi }
    }

    fn seller_defaults(&self) -> SellerDefaults {
        SellerDefaults {
            seller: self.config.fledge_seller.clone(),
            decision_logic_url: self.config.fledge_decision_logic_url.clone(),
        }
    }

    fn endpoint(&self, region: &str, fledge: bool) -> String {
        let path = if fledge { "prebidfledge" } else { "prebid" };
        format!(
            "https://{region}.{}/bidder/{path}/bids",
            self.config.endpoint_domain
        )
    }

    /// Host floor module wins over `params.bidfloor`. Zero means no floor.
    fn bid_floor(bid: &BidRequestDescriptor) -> Option<f64> {
        let from_params = || match bid.params.get("bidfloor")? {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        };
        bid.floor
            .or_else(from_params)
            .filter(|floor| floor.is_finite() && *floor > 0.0)
    }

    fn map_imp(bid: &BidRequestDescriptor, fledge: bool) -> Imp {
        let banner = bid
            .banner_sizes()
            .and_then(|sizes| sizes.first().map(|first| (first, sizes)))
            .map(|(first, sizes)| Banner {
                w: first.w,
                h: first.h,
                format: sizes.iter().map(|s| Format { w: s.w, h: s.h }).collect(),
            });

        let native = bid
            .native_spec()
            .map(|spec| Native::new(encode_assets(spec)));

        let ext = ImpExt {
            tid: bid.ortb2_imp_value(&["ext", "tid"]).cloned(),
            ae: if fledge {
                bid.ortb2_imp_value(&["ext", "ae"]).cloned()
            } else {
                None
            },
        };

        Imp {
            id: bid.bid_id.clone(),
            banner,
            native,
            tagid: bid.ad_unit_code.clone(),
            bidfloor: Self::bid_floor(bid),
            ext: (!ext.is_empty()).then_some(ext),
        }
    }

    fn map_site(first: &BidRequestDescriptor, context: &AuctionContext) -> Site {
        let channel: Option<String> = match first.params.get("channel") {
            Some(Value::String(channel)) => Some(channel.chars().take(CHANNEL_MAX_CHARS).collect()),
            _ => None,
        };

        Site {
            publisher: Publisher {
                id: first.param_str("publisherId").unwrap_or_default(),
            },
            page: context.referer_info.page.clone(),
            channel,
        }
    }

    fn test_flag(first: &BidRequestDescriptor) -> i64 {
        match first.params.get("test") {
            Some(Value::Number(n)) => n.as_i64().unwrap_or(0),
            Some(Value::Bool(true)) => 1,
            _ => 0,
        }
    }

    fn map_regs_and_user(
        first: &BidRequestDescriptor,
        context: &AuctionContext,
    ) -> (Option<Regs>, Option<User>) {
        let mut regs_ext = RegsExt::default();
        let mut user_ext = UserExt::default();

        if let Some(gdpr) = context.gdpr_consent.as_ref().filter(|g| g.applies()) {
            regs_ext.gdpr = Some(1);
            user_ext.consent = Some(
                gdpr.consent_string
                    .as_deref()
                    .map(normalize_consent_string)
                    .unwrap_or_default(),
            );
        }

        if let Some(usp) = context.usp_consent.as_ref().filter(|s| !s.is_empty()) {
            regs_ext.us_privacy = Some(usp.clone());
        }

        if let Some(dsa) = context.ortb2_value(&["regs", "ext", "dsa"]) {
            if validate_dsa(dsa) {
                regs_ext.dsa = Some(dsa.clone());
            } else {
                log::warn!("RTB House: dropping invalid DSA object");
            }
        }

        user_ext.eids.clone_from(&first.user_id_as_eids);

        let regs = (regs_ext.gdpr.is_some()
            || regs_ext.us_privacy.is_some()
            || regs_ext.dsa.is_some())
        .then(|| Regs {
            ext: Some(regs_ext),
        });
        let user = (user_ext.consent.is_some() || !user_ext.eids.is_empty()).then(|| User {
            ext: Some(user_ext),
        });

        (regs, user)
    }

    fn schain(first: &BidRequestDescriptor) -> Option<Value> {
        let schain = first.schain.as_ref()?;
        if validate_schain(schain) {
            Some(schain.clone())
        } else {
            log::warn!("RTB House: dropping invalid schain");
            None
        }
    }

    /// Convert a batch of descriptors into one OpenRTB request.
    fn to_openrtb(
        &self,
        bids: &[BidRequestDescriptor],
        context: &AuctionContext,
    ) -> Option<OpenRtbRequest> {
        let first = bids.first()?;
        let fledge = context.paapi_enabled();
        let (regs, user) = Self::map_regs_and_user(first, context);

        let ext = RequestExt {
            schain: Self::schain(first),
            fledge_config: fledge.then(|| build_fledge_config(&self.seller_defaults(), &self.paapi)),
        };

        Some(OpenRtbRequest {
            id: first
                .bidder_request_id
                .clone()
                .or_else(|| context.bidder_request_id.clone())
                .unwrap_or_default(),
            imp: bids.iter().map(|bid| Self::map_imp(bid, fledge)).collect(),
            site: Some(Self::map_site(first, context)),
            user,
            regs,
            source: Some(Source {
                tid: context
                    .auction_id
                    .clone()
                    .or_else(|| first.auction_id.clone())
                    .unwrap_or_default(),
            }),
            cur: vec![DEFAULT_CURRENCY.to_string()],
            test: Self::test_flag(first),
            ext: (ext.schain.is_some() || ext.fledge_config.is_some()).then_some(ext),
        })
    }

    /// Serialize the request and fill in first-party data the adapter did not set.
    fn build_payload(
        &self,
        request: &OpenRtbRequest,
        context: &AuctionContext,
    ) -> Result<String, Report<AdapterError>> {
        let mut payload = match serde_json::to_value(request).change_context(
            AdapterError::Serialization {
                message: "Failed to serialize OpenRTB request".to_string(),
            },
        )? {
            Value::Object(map) => map,
            _ => {
                return Err(Report::new(AdapterError::Serialization {
                    message: "OpenRTB request is not an object".to_string(),
                }))
            }
        };

        if let Some(ortb2) = context.ortb2.as_ref() {
            let first_party: Map<String, Value> = FIRST_PARTY_SECTIONS
                .iter()
                .filter_map(|key| ortb2.get(*key).map(|v| ((*key).to_string(), v.clone())))
                .collect();
            merge_missing(&mut payload, &first_party);
        }

        serde_json::to_string(&payload).change_context(AdapterError::Serialization {
            message: "Failed to encode OpenRTB request".to_string(),
        })
    }

    fn interpret_bid(bid: Bid) -> Option<NormalizedBid> {
        let price = bid.price.filter(|p| *p > 0.0)?;
        let adm = bid.adm.unwrap_or_default();
        let dsa = bid.ext.and_then(|ext| ext.dsa);
        let currency = bid
            .cur
            .filter(|c| !c.is_empty())
            .unwrap_or_else(|| DEFAULT_CURRENCY.to_string());

        let meta = BidMeta {
            advertiser_domains: bid.adomain,
            dsa: dsa.clone(),
            media_type: None,
        };
        let ext = dsa.map(|dsa| NormalizedBidExt { dsa: Some(dsa) });

        let (media_type, width, height, ad, native) = if adm.starts_with('{') {
            let native = decode_markup(&adm);
            if native.is_none() {
                log::warn!("RTB House: native bid {} has unparseable markup", bid.impid);
            }
            (MediaType::Native, 1, 1, None, native)
        } else {
            (
                MediaType::Banner,
                bid.w.unwrap_or(0),
                bid.h.unwrap_or(0),
                Some(adm),
                None,
            )
        };

        Some(NormalizedBid {
            request_id: bid.impid,
            cpm: price,
            currency,
            width,
            height,
            creative_id: bid.adid,
            deal_id: bid.dealid,
            ad,
            native,
            media_type,
            meta,
            ttl: TTL_SECONDS,
            net_revenue: true,
            referrer: None,
            ext,
        })
    }

    fn interpret_bids<'a>(values: impl IntoIterator<Item = &'a Value>) -> Vec<NormalizedBid> {
        values
            .into_iter()
            .filter_map(|value| match serde_json::from_value::<Bid>(value.clone()) {
                Ok(bid) => Self::interpret_bid(bid),
                Err(e) => {
                    log::warn!("RTB House: skipping malformed bid: {e}");
                    None
                }
            })
            .collect()
    }

    fn is_fledge_response(body: &Value) -> bool {
        body.get("bidid").is_some_and(is_truthy)
            && body
                .pointer("/ext/igbid")
                .is_some_and(Value::is_array)
    }
}

impl BidderAdapter for RtbHouseAdapter {
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
        let has_publisher = bid.param_str("publisherId").is_some();
        let has_region = bid
            .params
            .get("region")
            .and_then(Value::as_str)
            .is_some_and(|region| REGIONS.contains(&region));
        has_publisher && has_region && bid.has_usable_media()
    }

    fn build_requests(
        &self,
        bids: &[BidRequestDescriptor],
        context: &AuctionContext,
    ) -> Vec<ServerRequest> {
        let Some(request) = self.to_openrtb(bids, context) else {
            return Vec::new();
        };
        let region = bids
            .first()
            .and_then(|bid| bid.params.get("region"))
            .and_then(Value::as_str)
            .unwrap_or(REGIONS[0]);

        log::info!("RTB House: requesting bids for {} impressions", bids.len());

        match self.build_payload(&request, context) {
            Ok(data) => {
                log::debug!("RTB House: OpenRTB request: {data}");
                vec![ServerRequest {
                    method: HttpMethod::Post,
                    url: self.endpoint(region, context.paapi_enabled()),
                    data,
                    options: None,
                }]
            }
            Err(e) => {
                log::error!("RTB House: failed to build request: {e:?}");
                Vec::new()
            }
        }
    }

    fn interpret_response(
        &self,
        response: &ServerResponse,
        _request: &ServerRequest,
    ) -> InterpretedResponse {
        let body = &response.body;
        if !is_truthy(body) {
            return InterpretedResponse::empty();
        }

        if let Value::Array(bids) = body {
            let bids = Self::interpret_bids(bids);
            log::info!("RTB House: {} bids", bids.len());
            return InterpretedResponse::Bids(bids);
        }

        if Self::is_fledge_response(body) {
            let bids = Self::interpret_bids(
                body.pointer("/seatbid/0/bid")
                    .and_then(Value::as_array)
                    .into_iter()
                    .flatten(),
            );
            let paapi = match serde_json::from_value::<FledgeResponseExt>(body["ext"].clone()) {
                Ok(ext) => auction_configs_from_response(&ext, &self.seller_defaults(), &self.paapi),
                Err(e) => {
                    log::warn!("RTB House: unparseable FLEDGE ext: {e}");
                    Vec::new()
                }
            };
            log::info!(
                "RTB House: {} bids, {} auction configs",
                bids.len(),
                paapi.len()
            );
            return InterpretedResponse::WithPaapi { bids, paapi };
        }

        log::warn!("RTB House: unexpected response body shape");
        InterpretedResponse::empty()
    }
}

/// Register the RTB House adapter when enabled in settings.
#[must_use]
pub fn register(settings: &Settings) -> Option<Arc<dyn BidderAdapter>> {
    if !settings.rtbhouse.enabled {
        log::info!("RTB House adapter not registered: disabled");
        return None;
    }
    Some(Arc::new(RtbHouseAdapter::new(
        settings.rtbhouse.clone(),
        settings.paapi.clone(),
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::tests::{descriptor, rtbhouse_bid_json, sample_context};
    use serde_json::json;

    fn adapter() -> RtbHouseAdapter {
        RtbHouseAdapter::new(RtbHouseConfig::default(), PaapiSettings::default())
    }

    fn adapter_with_paapi(paapi: Value) -> RtbHouseAdapter {
        let paapi: PaapiSettings = serde_json::from_value(paapi).expect("should parse paapi");
        RtbHouseAdapter::new(RtbHouseConfig::default(), paapi)
    }

    fn build(adapter: &RtbHouseAdapter, bid: &Value, context: &AuctionContext) -> ServerRequest {
        let mut requests = adapter.build_requests(&[descriptor(bid)], context);
        assert_eq!(requests.len(), 1, "should build exactly one request");
        requests.remove(0)
    }

    fn payload(request: &ServerRequest) -> Value {
        serde_json::from_str(&request.data).expect("should be JSON")
    }

    fn build_payload(bid: &Value, context: &AuctionContext) -> Value {
        payload(&build(&adapter(), bid, context))
    }

    fn fledge_context() -> AuctionContext {
        AuctionContext {
            paapi: crate::auction::PaapiFlags { enabled: true },
            ..sample_context()
        }
    }

    fn dsa_context(dsa: Value) -> AuctionContext {
        AuctionContext {
            ortb2: json!({"regs": {"ext": {"dsa": dsa}}}).as_object().cloned(),
            ..sample_context()
        }
    }

    fn valid_dsa() -> Value {
        json!({
            "dsarequired": 3,
            "pubrender": 0,
            "datatopub": 2,
            "transparency": [
                {"domain": "platform1domain.com", "dsaparams": [1]},
                {"domain": "SSP2domain.com", "dsaparams": [1, 2]}
            ]
        })
    }

    fn response(body: Value) -> ServerResponse {
        ServerResponse { body }
    }

    fn dummy_request() -> ServerRequest {
        ServerRequest {
            method: HttpMethod::Post,
            url: String::new(),
            data: String::new(),
            options: None,
        }
    }

    // ---- validity ----

    #[test]
    fn valid_with_required_params() {
        assert!(adapter().is_bid_request_valid(&descriptor(&rtbhouse_bid_json())));
    }

    #[test]
    fn valid_with_legacy_sizes() {
        let mut bid = rtbhouse_bid_json();
        bid.as_object_mut().expect("object").remove("mediaTypes");
        bid["sizes"] = json!([[300, 250], [300, 600]]);
        assert!(adapter().is_bid_request_valid(&descriptor(&bid)));
    }

    #[test]
    fn invalid_without_required_params() {
        let mut bid = rtbhouse_bid_json();
        bid["params"] = json!({"someIncorrectParam": 0});
        assert!(!adapter().is_bid_request_valid(&descriptor(&bid)));
    }

    #[test]
    fn invalid_with_banner_declaration_without_sizes() {
        let mut bid = rtbhouse_bid_json();
        bid["mediaTypes"] = json!({"banner": {}});
        assert!(!adapter().is_bid_request_valid(&descriptor(&bid)));
    }

    #[test]
    fn invalid_with_empty_legacy_sizes() {
        let mut bid = rtbhouse_bid_json();
        bid.as_object_mut().expect("object").remove("mediaTypes");
        bid["sizes"] = json!([]);
        assert!(!adapter().is_bid_request_valid(&descriptor(&bid)));
    }

    #[test]
    fn invalid_with_unknown_region() {
        let mut bid = rtbhouse_bid_json();
        bid["params"]["region"] = json!("prebid-mars");
        assert!(!adapter().is_bid_request_valid(&descriptor(&bid)));
    }

    // ---- request building ----

    #[test]
    fn posts_to_regional_endpoint() {
        let request = build(&adapter(), &rtbhouse_bid_json(), &sample_context());
        assert_eq!(request.url, "https://prebid-eu.creativecdn.com/bidder/prebid/bids");
        assert_eq!(request.method, HttpMethod::Post);
    }

    #[test]
    fn envelope_fields() {
        let data = build_payload(&rtbhouse_bid_json(), &sample_context());
        assert_eq!(data["test"], 1);
        assert_eq!(data["cur"], json!(["USD"]));
        assert_eq!(data["source"]["tid"], "bidderrequest-auction-id");
        assert_eq!(data["site"]["publisher"]["id"], "PREBID_TEST");
        assert_eq!(data["imp"][0]["id"], "30b31c1838de1e");
        assert_eq!(data["imp"][0]["tagid"], "adunit-code");
        assert_eq!(data["imp"][0]["ext"]["tid"], "ortb2Imp-transaction-id-1");
    }

    #[test]
    fn test_flag_defaults_to_zero() {
        let mut bid = rtbhouse_bid_json();
        bid["params"].as_object_mut().expect("object").remove("test");
        assert_eq!(build_payload(&bid, &sample_context())["test"], 0);
    }

    #[test]
    fn banner_first_size_and_full_format_list() {
        let data = build_payload(&rtbhouse_bid_json(), &sample_context());
        assert_eq!(
            data["imp"][0]["banner"],
            json!({"w": 300, "h": 250, "format": [{"w": 300, "h": 250}, {"w": 300, "h": 600}]})
        );
    }

    #[test]
    fn banner_from_single_legacy_pair() {
        let mut bid = rtbhouse_bid_json();
        bid.as_object_mut().expect("object").remove("mediaTypes");
        bid["sizes"] = json!([728, 90]);
        let data = build_payload(&bid, &sample_context());
        assert_eq!(
            data["imp"][0]["banner"],
            json!({"w": 728, "h": 90, "format": [{"w": 728, "h": 90}]})
        );
    }

    #[test]
    fn channel_passes_through_when_short() {
        let data = build_payload(&rtbhouse_bid_json(), &sample_context());
        assert_eq!(data["site"]["channel"], "Partner_Site - news");
    }

    #[test]
    fn channel_is_capped_at_50_characters() {
        let mut bid = rtbhouse_bid_json();
        bid["params"]["channel"] = json!(
            "Lorem ipsum dolor sit amet, consectetur adipiscing elit. Praesent scelerisque ipsum eu purus lobortis iaculis."
        );
        let data = build_payload(&bid, &sample_context());
        let channel = data["site"]["channel"].as_str().expect("channel");
        assert_eq!(channel.chars().count(), 50);
    }

    #[test]
    fn channel_absent_when_not_set() {
        let mut bid = rtbhouse_bid_json();
        bid["params"].as_object_mut().expect("object").remove("channel");
        let data = build_payload(&bid, &sample_context());
        assert!(data["site"].get("channel").is_none());
    }

    #[test]
    fn no_gdpr_signal_means_no_regs_or_user() {
        let data = build_payload(&rtbhouse_bid_json(), &sample_context());
        assert!(data.get("regs").is_none());
        assert!(data.get("user").is_none());
    }

    #[test]
    fn gdpr_consent_is_normalized() {
        let context = AuctionContext {
            gdpr_consent: serde_json::from_value(json!({
                "gdprApplies": true,
                "consentString": "BOJ8RZsOJ8RZsABAB8AAAAAZ+A=="
            }))
            .expect("consent"),
            ..sample_context()
        };
        let data = build_payload(&rtbhouse_bid_json(), &context);
        assert_eq!(data["regs"]["ext"]["gdpr"], 1);
        assert_eq!(data["user"]["ext"]["consent"], "BOJ8RZsOJ8RZsABAB8AAAAAZ-A");
    }

    #[test]
    fn gdpr_without_consent_string_sends_empty_consent() {
        let context = AuctionContext {
            gdpr_consent: serde_json::from_value(json!({"gdprApplies": true})).expect("consent"),
            ..sample_context()
        };
        let data = build_payload(&rtbhouse_bid_json(), &context);
        assert_eq!(data["regs"]["ext"]["gdpr"], 1);
        assert_eq!(data["user"]["ext"]["consent"], "");
    }

    #[test]
    fn usp_consent_and_eids_are_forwarded() {
        let mut bid = rtbhouse_bid_json();
        bid["userIdAsEids"] = json!([{"source": "pubcid.org", "uids": [{"id": "abc", "atype": 1}]}]);
        let context = AuctionContext {
            usp_consent: Some("1YNN".to_string()),
            ..sample_context()
        };
        let data = build_payload(&bid, &context);
        assert_eq!(data["regs"]["ext"]["us_privacy"], "1YNN");
        assert_eq!(data["user"]["ext"]["eids"][0]["source"], "pubcid.org");
    }

    #[test]
    fn host_floor_wins_over_params() {
        let mut bid = rtbhouse_bid_json();
        bid["params"]["bidfloor"] = json!(0.01);
        bid["floor"] = json!(1.22);
        assert_eq!(build_payload(&bid, &sample_context())["imp"][0]["bidfloor"], 1.22);
    }

    #[test]
    fn params_floor_used_without_host_floor() {
        let mut bid = rtbhouse_bid_json();
        bid["params"]["bidfloor"] = json!(0.01);
        assert_eq!(build_payload(&bid, &sample_context())["imp"][0]["bidfloor"], 0.01);
    }

    #[test]
    fn zero_floor_is_omitted() {
        let mut bid = rtbhouse_bid_json();
        bid["params"]["bidfloor"] = json!(0);
        assert!(build_payload(&bid, &sample_context())["imp"][0]
            .get("bidfloor")
            .is_none());
    }

    #[test]
    fn valid_schain_is_forwarded() {
        let data = build_payload(&rtbhouse_bid_json(), &sample_context());
        assert_eq!(data["ext"]["schain"], rtbhouse_bid_json()["schain"]);
    }

    #[test]
    fn invalid_schain_is_dropped() {
        let mut bid = rtbhouse_bid_json();
        bid["schain"] = json!({"nodes": [{"unknown_key": 1}]});
        let data = build_payload(&bid, &sample_context());
        assert!(data["source"].get("ext").is_none());
        assert!(data.get("ext").is_none());
    }

    #[test]
    fn first_party_data_fills_missing_keys_only() {
        let context = AuctionContext {
            ortb2: json!({
                "bcat": ["IAB1", "IAB2-1"],
                "badv": ["domain1.com", "domain2.com"],
                "site": {"ext": {"data": "some site data"}, "publisher": {"id": "other"}},
                "device": {"ext": {"data": "some device data"}},
                "user": {"ext": {"data": "some user data"}}
            })
            .as_object()
            .cloned(),
            ..sample_context()
        };
        let data = build_payload(&rtbhouse_bid_json(), &context);

        assert_eq!(data["bcat"], json!(["IAB1", "IAB2-1"]));
        assert_eq!(data["badv"], json!(["domain1.com", "domain2.com"]));
        assert_eq!(data["site"]["ext"]["data"], "some site data");
        assert_eq!(data["site"]["publisher"]["id"], "PREBID_TEST");
        assert_eq!(data["device"]["ext"]["data"], "some device data");
        assert_eq!(data["user"]["ext"]["data"], "some user data");
    }

    #[test]
    fn valid_dsa_round_trips_exactly() {
        let data = build_payload(&rtbhouse_bid_json(), &dsa_context(valid_dsa()));
        assert_eq!(data["regs"]["ext"]["dsa"], valid_dsa());
    }

    #[test]
    fn invalid_dsa_objects_are_dropped() {
        let mut invalid = vec![
            json!(-1),
            json!(0),
            json!(""),
            json!("x"),
            json!(true),
            json!([]),
            json!([1]),
            json!({}),
        ];
        for (key, bad) in [
            ("dsarequired", json!(-1)),
            ("dsarequired", json!(4)),
            ("dsarequired", json!("1")),
            ("pubrender", json!(3)),
            ("datatopub", json!(-1)),
            ("transparency", json!({})),
            ("transparency", json!([{"domain": "", "dsaparams": [1]}])),
            ("transparency", json!([{"domain": "x.com", "dsaparams": null}])),
            ("transparency", json!([{"domain": "x.com", "dsaparams": ["1"]}])),
        ] {
            let mut dsa = valid_dsa();
            dsa[key] = bad;
            invalid.push(dsa);
        }

        for dsa in invalid {
            let data = build_payload(&rtbhouse_bid_json(), &dsa_context(dsa.clone()));
            assert!(
                data.pointer("/regs/ext/dsa").is_none(),
                "{dsa} should not be forwarded"
            );
        }
    }

    // ---- FLEDGE ----

    #[test]
    fn fledge_uses_dedicated_endpoint_and_default_config() {
        let request = build(&adapter(), &rtbhouse_bid_json(), &fledge_context());
        assert_eq!(
            request.url,
            "https://prebid-eu.creativecdn.com/bidder/prebidfledge/bids"
        );
        assert_eq!(
            payload(&request)["ext"]["fledge_config"],
            json!({
                "seller": "https://fledge-ssp.creativecdn.com",
                "decisionLogicUrl": "https://fledge-ssp.creativecdn.com/component-seller-prebid.js",
                "sellerTimeout": 500
            })
        );
    }

    #[test]
    fn fledge_config_from_host_paapi_config() {
        let adapter = adapter_with_paapi(json!({
            "paapi_config": {
                "seller": "https://paapiconfig.sellers.domain",
                "decisionLogicUrl": "https://paapiconfig.sellers.domain/decision.url"
            },
            "fledge_config": {
                "seller": "https://fledgeconfig.sellers.domain",
                "decisionLogicUrl": "https://fledgeconfig.sellers.domain/decision.url"
            }
        }));
        let data = payload(&build(&adapter, &rtbhouse_bid_json(), &fledge_context()));
        assert_eq!(
            data["ext"]["fledge_config"],
            json!({
                "seller": "https://paapiconfig.sellers.domain",
                "decisionLogicUrl": "https://paapiconfig.sellers.domain/decision.url"
            })
        );
    }

    #[test]
    fn fledge_disabled_omits_config_and_ae() {
        let mut bid = rtbhouse_bid_json();
        bid["ortb2Imp"] = json!({"ext": {"ae": 2}});
        let request = build(&adapter(), &bid, &sample_context());
        let data = payload(&request);
        assert_eq!(request.url, "https://prebid-eu.creativecdn.com/bidder/prebid/bids");
        assert!(data.pointer("/ext/fledge_config").is_none());
        assert!(data.pointer("/imp/0/ext/ae").is_none());
    }

    #[test]
    fn fledge_enabled_forwards_ae() {
        let mut bid = rtbhouse_bid_json();
        bid["ortb2Imp"] = json!({"ext": {"ae": 2}});
        let data = payload(&build(&adapter(), &bid, &fledge_context()));
        assert_eq!(data["imp"][0]["ext"]["ae"], 2);
    }

    // ---- native ----

    fn native_bid(extension: Value) -> Value {
        let mut bid = json!({
            "bidder": "bidder",
            "adUnitCode": "adunit-code",
            "bidId": "1",
            "params": {"publisherId": "PREBID_TEST", "region": "prebid-eu", "test": 1}
        });
        for (key, value) in extension.as_object().expect("object") {
            bid[key] = value.clone();
        }
        bid
    }

    fn native_imp(extension: Value) -> Value {
        build_payload(&native_bid(extension), &sample_context())["imp"][0].clone()
    }

    #[test]
    fn native_from_legacy_native_params() {
        let imp = native_imp(json!({
            "mediaType": "native",
            "nativeParams": {"title": {"required": true, "len": 100}}
        }));
        assert_eq!(
            imp["native"]["request"]["assets"][0],
            json!({"id": 1, "required": 1, "title": {"len": 100}})
        );
        assert_eq!(imp["native"]["ver"], "1.1");
    }

    #[test]
    fn native_only_imp_has_no_banner() {
        let imp = native_imp(json!({"mediaTypes": {"native": {"title": {"required": true}}}}));
        assert!(imp.get("banner").is_none());
        assert!(imp.get("native").is_some());
    }

    #[test]
    fn native_icon_aspect_ratio_defaults() {
        let imp = native_imp(json!({
            "mediaTypes": {"native": {"icon": {"aspect_ratios": [{"ratio_width": 2, "ratio_height": 3}]}}}
        }));
        assert_eq!(
            imp["native"]["request"]["assets"][0]["img"],
            json!({"type": 1, "wmin": 100, "hmin": 150})
        );
    }

    #[test]
    fn native_partial_aspect_ratio_keeps_request() {
        let bid = native_bid(json!({
            "mediaTypes": {"native": {"icon": {"required": true, "aspect_ratios": [{"min_width": 100}]}}}
        }));
        assert!(adapter().is_bid_request_valid(&descriptor(&bid)));

        let imp = build_payload(&bid, &sample_context())["imp"][0].clone();
        assert_eq!(
            imp["native"]["request"]["assets"][0],
            json!({"id": 3, "required": 1, "img": {"type": 1}})
        );
    }

    #[test]
    fn native_all_assets_have_positive_ids() {
        let imp = native_imp(json!({
            "mediaTypes": {"native": {
                "title": {"required": true, "len": 25},
                "image": {"required": true, "sizes": [300, 250]},
                "icon": {"required": true, "sizes": [50, 50]},
                "sponsoredBy": {"required": true},
                "body": {"required": true},
                "cta": {"required": true}
            }}
        }));
        let assets = imp["native"]["request"]["assets"].as_array().expect("assets");
        assert_eq!(assets.len(), 6);
        assert!(assets.iter().all(|a| a["id"].as_u64().is_some_and(|id| id >= 1)));
    }

    // ---- responses ----

    fn banner_response() -> Value {
        json!([{
            "id": "bidder_imp_identifier",
            "impid": "552b8922e28f27",
            "price": 0.5,
            "adid": "Ad_Identifier",
            "adm": "<!-- test creative -->",
            "adomain": ["rtbhouse.com"],
            "cid": "Ad_Identifier",
            "w": 300,
            "h": 250
        }])
    }

    #[test]
    fn interprets_banner_bid() {
        let result = adapter().interpret_response(&response(banner_response()), &dummy_request());
        let value = serde_json::to_value(&result).expect("serialize");
        assert_eq!(
            value,
            json!([{
                "requestId": "552b8922e28f27",
                "cpm": 0.5,
                "currency": "USD",
                "width": 300,
                "height": 250,
                "creativeId": "Ad_Identifier",
                "ad": "<!-- test creative -->",
                "mediaType": "banner",
                "meta": {"advertiserDomains": ["rtbhouse.com"]},
                "ttl": 55,
                "netRevenue": true
            }])
        );
    }

    #[test]
    fn falsy_bodies_yield_no_bids() {
        for body in [json!(null), json!(""), json!(false), json!(0), json!([])] {
            let result = adapter().interpret_response(&response(body.clone()), &dummy_request());
            assert!(result.bids().is_empty(), "{body} should give no bids");
            assert!(result.paapi().is_empty());
        }
    }

    #[test]
    fn bids_without_price_are_skipped() {
        let mut body = banner_response();
        body[0].as_object_mut().expect("object").remove("price");
        let result = adapter().interpret_response(&response(body), &dummy_request());
        assert!(result.bids().is_empty());
    }

    #[test]
    fn null_adomain_keeps_bid() {
        let mut body = banner_response();
        body[0]["adomain"] = Value::Null;
        let result = adapter().interpret_response(&response(body), &dummy_request());
        assert_eq!(result.bids().len(), 1, "null adomain should not drop the bid");
        assert!(result.bids()[0].meta.advertiser_domains.is_empty());
    }

    #[test]
    fn dsa_is_copied_to_meta_and_ext() {
        let dsa = json!({
            "behalf": "Advertiser",
            "paid": "Advertiser",
            "transparency": [{"domain": "dsp1domain.com", "dsaparams": [1, 2]}],
            "adrender": 1
        });
        let mut body = banner_response();
        body[0]["ext"] = json!({"dsa": dsa});
        let result = adapter().interpret_response(&response(body), &dummy_request());
        let bid = &result.bids()[0];
        assert_eq!(bid.meta.dsa.as_ref(), Some(&dsa));
        assert_eq!(bid.ext.as_ref().and_then(|e| e.dsa.as_ref()), Some(&dsa));
    }

    #[test]
    fn interprets_native_bid() {
        let adm = json!({
            "native": {
                "ver": 1.1,
                "link": {"url": "https://example.com"},
                "imptrackers": ["https://example.com/imptracker"],
                "assets": [
                    {"id": 1, "required": 1, "title": {"text": "Title text"}},
                    {"id": 2, "required": 1, "img": {"url": "https://example.com/image.jpg", "w": 150, "h": 50}},
                    {"id": 4, "required": 0, "data": {"value": "Body text"}}
                ]
            }
        })
        .to_string();
        let body = json!([{"impid": "1", "price": 1.0, "adid": "A", "adm": adm}]);

        let result = adapter().interpret_response(&response(body), &dummy_request());
        let bid = &result.bids()[0];
        assert_eq!(bid.media_type, MediaType::Native);
        assert_eq!((bid.width, bid.height), (1, 1));
        assert!(bid.ad.is_none());
        let native = serde_json::to_value(bid.native.as_ref().expect("should decode native ad"))
            .expect("should serialize native ad");
        assert_eq!(
            native,
            json!({
                "title": "Title text",
                "image": {"url": "https://example.com/image.jpg", "width": 150, "height": 50},
                "body": "Body text",
                "clickUrl": "https://example.com",
                "impressionTrackers": ["https://example.com/imptracker"]
            })
        );
    }

    #[test]
    fn unparseable_native_markup_keeps_bid() {
        let body = json!([{"impid": "1", "price": 1.0, "adm": "{broken"}]);
        let result = adapter().interpret_response(&response(body), &dummy_request());
        assert_eq!(result.bids().len(), 1);
        assert!(result.bids()[0].native.is_none());
    }

    fn fledge_response() -> Value {
        json!({
            "id": "bid-identifier",
            "ext": {
                "igbid": [{
                    "impid": "test-bid-id",
                    "igbuyer": [{"igdomain": "https://buyer-domain.com", "buyersignal": {}}]
                }],
                "sellerTimeout": 500,
                "seller": "https://seller-domain.com",
                "decisionLogicUrl": "https://seller-domain.com/decision-logic.js"
            },
            "bidid": "bid-identifier",
            "seatbid": [{"bid": [{"id": "bid-response-id", "impid": "test-bid-id"}]}]
        })
    }

    #[test]
    fn fledge_response_returns_auction_configs() {
        let result = adapter().interpret_response(&response(fledge_response()), &dummy_request());
        let value = serde_json::to_value(&result).expect("serialize");
        assert!(value.get("bids").is_some());
        assert_eq!(value["paapi"].as_array().map(Vec::len), Some(1));
        assert_eq!(value["paapi"][0]["bidId"], "test-bid-id");
    }

    #[test]
    fn fledge_response_merges_host_signals() {
        let adapter = adapter_with_paapi(json!({
            "paapi_config": {
                "interestGroupBuyers": ["https://buyer1.com"],
                "perBuyerSignals": {"https://buyer1.com": {"signal": 1}},
                "customSignal": 1
            }
        }));
        let result = adapter.interpret_response(&response(fledge_response()), &dummy_request());
        let config = serde_json::to_value(&result.paapi()[0].config).expect("serialize");

        let buyers = config["interestGroupBuyers"].as_array().expect("buyers");
        assert_eq!(buyers.len(), 2);
        assert!(buyers.contains(&json!("https://buyer1.com")));
        assert!(buyers.contains(&json!("https://buyer-domain.com")));
        assert_eq!(config["perBuyerSignals"]["https://buyer1.com"], json!({"signal": 1}));
        assert_eq!(config["perBuyerSignals"]["https://buyer-domain.com"], json!({}));
        assert_eq!(config["customSignal"], 1);
    }

    #[test]
    fn malformed_igbid_keeps_other_configs_and_bids() {
        let mut body = fledge_response();
        body["ext"]["igbid"]
            .as_array_mut()
            .expect("igbid array")
            .push(json!({"igbuyer": [{"igdomain": "https://other-buyer.com"}]}));
        body["seatbid"][0]["bid"] = json!([{
            "id": "bid-response-id",
            "impid": "test-bid-id",
            "price": 1.2,
            "adid": "Ad_Identifier",
            "adm": "<!-- fledge creative -->",
            "w": 300,
            "h": 250
        }]);

        let result = adapter().interpret_response(&response(body), &dummy_request());
        assert_eq!(result.bids().len(), 1);
        assert_eq!(result.bids()[0].request_id, "test-bid-id");
        assert_eq!(result.paapi().len(), 1);
        assert_eq!(result.paapi()[0].bid_id, "test-bid-id");
    }
}
