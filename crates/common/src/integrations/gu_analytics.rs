//! Guardian header-bidding analytics.
//!
//! Auction events are reduced to short keyed records, buffered, and sent as
//! one `text/plain` JSON beacon when the auction ends or a bid wins.

use std::sync::{Arc, Mutex, PoisonError};

use error_stack::{Report, ResultExt};
use serde::Serialize;
use validator::{Validate, ValidationErrors};

use crate::adapter::{HttpMethod, RequestOptions, ServerRequest};
use crate::analytics::{
    AnalyticsEvent, AnalyticsQueue, AuctionArgs, BidRequestedArgs, BidResponseArgs, BidWonArgs,
    Clock, SystemClock,
};
use crate::constants::CONTENT_TYPE_TEXT_PLAIN;
use crate::error::AdapterError;
use crate::settings::{GuAnalyticsConfig, Settings};
use crate::transport::Transport;

pub const ANALYTICS_CODE: &str = "gu";

/// Bumped whenever the record layout changes.
const PAYLOAD_VERSION: u8 = 2;
const BEACON_PATH: &str = "/commercial/api/hb";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HbEventKind {
    Init,
    Request,
    Response,
    End,
    #[serde(rename = "bidwon")]
    BidWon,
}

/// One compact analytics record. Falsy values are never set.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HbEvent {
    pub ev: HbEventKind,
    /// Bidder code.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub n: Option<String>,
    /// Slot (ad unit code).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cpm: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cry: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub net: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub did: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sz: Option<String>,
    /// Deal id.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lid: Option<String>,
    /// Start time, ms since epoch.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub st: Option<i64>,
    /// Time to respond, ms.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ttr: Option<i64>,
    /// Price bucket.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pb: Option<String>,
}

impl HbEvent {
    fn new(ev: HbEventKind) -> Self {
        Self {
            ev,
            n: None,
            sid: None,
            aid: None,
            bid: None,
            cpm: None,
            cry: None,
            net: None,
            did: None,
            cid: None,
            sz: None,
            lid: None,
            st: None,
            ttr: None,
            pb: None,
        }
    }
}

fn text(value: &str) -> Option<String> {
    (!value.is_empty()).then(|| value.to_string())
}

fn opt_text(value: Option<&String>) -> Option<String> {
    value.and_then(|v| text(v))
}

fn millis(value: Option<i64>) -> Option<i64> {
    value.filter(|v| *v != 0)
}

#[derive(Debug, Serialize)]
struct Beacon<'a> {
    v: u8,
    pv: &'a str,
    hb_ev: Vec<HbEvent>,
}

pub struct GuAnalyticsAdapter {
    endpoint: String,
    pv: String,
    queue: AnalyticsQueue<HbEvent>,
    auction_start: Mutex<Option<i64>>,
    transport: Arc<dyn Transport>,
    clock: Arc<dyn Clock>,
}

impl GuAnalyticsAdapter {
    /// Enable the adapter with the system clock.
    ///
    /// # Errors
    ///
    /// Returns [`AdapterError::Analytics`] when `ajax_url` or `pv` is missing
    /// or invalid.
    pub fn enable(
        config: &GuAnalyticsConfig,
        transport: Arc<dyn Transport>,
    ) -> Result<Self, Report<AdapterError>> {
        Self::with_clock(config, transport, Arc::new(SystemClock))
    }

    /// # Errors
    ///
    /// Returns [`AdapterError::Analytics`] when `ajax_url` or `pv` is missing
    /// or invalid.
    pub fn with_clock(
        config: &GuAnalyticsConfig,
        transport: Arc<dyn Transport>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, Report<AdapterError>> {
        config.validate().map_err(|errors| {
            let message = first_error(&errors);
            log::error!("GU analytics: {message}. Analytics won't work");
            Report::new(AdapterError::Analytics { message }).attach(errors.to_string())
        })?;

        let (Some(ajax_url), Some(pv)) = (&config.ajax_url, &config.pv) else {
            return Err(Report::new(AdapterError::Analytics {
                message: "ajaxUrl and pv are required".to_string(),
            }));
        };

        Ok(Self {
            endpoint: format!("{}{BEACON_PATH}", ajax_url.trim_end_matches('/')),
            pv: pv.clone(),
            queue: AnalyticsQueue::new(),
            auction_start: Mutex::new(None),
            transport,
            clock,
        })
    }

    /// Enable from the `[gu_analytics]` settings section. `Ok(None)` when the
    /// section is absent.
    ///
    /// # Errors
    ///
    /// Returns [`AdapterError::Analytics`] when the section is present but invalid.
    pub fn from_settings(
        settings: &Settings,
        transport: Arc<dyn Transport>,
    ) -> Result<Option<Self>, Report<AdapterError>> {
        settings
            .gu_analytics
            .as_ref()
            .map(|config| Self::enable(config, transport))
            .transpose()
    }

    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Records waiting for the next flush.
    #[must_use]
    pub fn pending(&self) -> Vec<HbEvent> {
        self.queue.peek_all()
    }

    pub fn track(&self, event: &AnalyticsEvent) {
        let records = match event {
            AnalyticsEvent::AuctionInit(args) => {
                self.queue.init();
                self.auction_init(args)
            }
            AnalyticsEvent::BidRequested(args) => Self::bid_requested(args),
            AnalyticsEvent::BidResponse(args) => Self::bid_response(args),
            AnalyticsEvent::AuctionEnd(args) => self.auction_end(args),
            AnalyticsEvent::BidWon(args) => {
                // Late responses must not ride along with the win.
                self.queue.init();
                Self::bid_won(args)
            }
        };

        log::debug!("GU analytics: {} record(s) for {event:?}", records.len());
        self.queue.push_all(records);

        if event.is_terminal() {
            self.flush();
        }
    }

    fn auction_init(&self, args: &AuctionArgs) -> Vec<HbEvent> {
        let now = self.clock.now_millis();
        *self
            .auction_start
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(now);

        let mut event = HbEvent::new(HbEventKind::Init);
        event.aid = text(&args.auction_id);
        event.st = millis(Some(now));
        vec![event]
    }

    fn bid_requested(args: &BidRequestedArgs) -> Vec<HbEvent> {
        args.bids
            .iter()
            .map(|bid| {
                let mut event = HbEvent::new(HbEventKind::Request);
                event.n = text(&args.bidder_code);
                event.sid = text(&bid.ad_unit_code);
                event.bid = text(&bid.bid_id);
                event.st = millis(args.start);
                event
            })
            .collect()
    }

    fn bid_response(args: &BidResponseArgs) -> Vec<HbEvent> {
        if !args.is_available() {
            return Vec::new();
        }

        let mut event = HbEvent::new(HbEventKind::Response);
        event.n = text(&args.bidder_code);
        event.sid = text(&args.ad_unit_code);
        event.bid = text(&args.request_id);
        event.cpm = args.cpm.filter(|cpm| *cpm != 0.0 && !cpm.is_nan());
        event.cry = opt_text(args.currency.as_ref());
        event.net = args.net_revenue.filter(|net| *net);
        event.did = opt_text(args.ad_id.as_ref());
        event.cid = opt_text(args.creative_id.as_ref());
        event.sz = opt_text(args.size.as_ref());
        event.lid = opt_text(args.deal_id.as_ref());
        event.ttr = millis(args.time_to_respond);
        event.pb = opt_text(args.pb_cg.as_ref());
        vec![event]
    }

    fn auction_end(&self, args: &AuctionArgs) -> Vec<HbEvent> {
        let start = *self
            .auction_start
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        let mut event = HbEvent::new(HbEventKind::End);
        event.aid = text(&args.auction_id);
        event.ttr = millis(start.map(|start| self.clock.now_millis() - start));
        vec![event]
    }

    fn bid_won(args: &BidWonArgs) -> Vec<HbEvent> {
        let mut event = HbEvent::new(HbEventKind::BidWon);
        event.aid = text(&args.auction_id);
        event.bid = text(&args.request_id);
        vec![event]
    }

    fn build_beacon(&self, events: Vec<HbEvent>) -> Result<ServerRequest, Report<AdapterError>> {
        let beacon = Beacon {
            v: PAYLOAD_VERSION,
            pv: &self.pv,
            hb_ev: events,
        };
        let data = serde_json::to_string(&beacon).change_context(AdapterError::Serialization {
            message: "Failed to serialize analytics beacon".to_string(),
        })?;

        Ok(ServerRequest {
            method: HttpMethod::Post,
            url: self.endpoint.clone(),
            data,
            options: Some(RequestOptions {
                content_type: Some(CONTENT_TYPE_TEXT_PLAIN.to_string()),
                ..RequestOptions::default()
            }),
        })
    }

    fn flush(&self) {
        let events = self.queue.pop_all();
        if events.is_empty() {
            return;
        }

        let count = events.len();
        match self.build_beacon(events) {
            Ok(request) => {
                log::info!("GU analytics: sending {count} record(s) to {}", self.endpoint);
                self.transport.post(&request);
            }
            Err(report) => log::error!("GU analytics: dropping {count} record(s): {report:?}"),
        }
    }
}

fn first_error(errors: &ValidationErrors) -> String {
    let fields = errors.field_errors();
    ["ajax_url", "pv"]
        .iter()
        .find_map(|field| {
            fields.get(*field).and_then(|errs| errs.first()).map(|error| {
                error.message.as_ref().map_or_else(
                    || format!("{field} is invalid ({})", error.code),
                    ToString::to_string,
                )
            })
        })
        .unwrap_or_else(|| errors.to_string())
}
