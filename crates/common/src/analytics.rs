//! Auction lifecycle events and the batching queue analytics adapters drain.
//!
//! Hosts report events as `{"eventType": "...", "args": {...}}`. Analytics
//! adapters turn them into their own compact records and buffer those in an
//! [`AnalyticsQueue`] until a terminal event flushes the batch.

use std::mem;
use std::sync::{Mutex, PoisonError};

use serde::{Deserialize, Serialize};

/// Status the host sets on a response that carries a usable bid.
pub const BID_AVAILABLE: &str = "Bid available";

/// Millisecond wall clock. Injected so tests can control durations.
pub trait Clock: Send + Sync {
    fn now_millis(&self) -> i64;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> i64 {
        chrono::Utc::now().timestamp_millis()
    }
}

/// A bid as listed in a `bidRequested` event.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestedBid {
    #[serde(default)]
    pub ad_unit_code: String,
    #[serde(default)]
    pub bid_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BidRequestedArgs {
    #[serde(default)]
    pub bidder_code: String,
    /// Host timestamp (ms) when the bidder request started.
    #[serde(default)]
    pub start: Option<i64>,
    #[serde(default)]
    pub bids: Vec<RequestedBid>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BidResponseArgs {
    #[serde(default)]
    pub bidder_code: String,
    #[serde(default)]
    pub ad_unit_code: String,
    #[serde(default)]
    pub status_message: String,
    #[serde(default)]
    pub time_to_respond: Option<i64>,
    #[serde(default)]
    pub request_id: String,
    #[serde(default)]
    pub cpm: Option<f64>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub net_revenue: Option<bool>,
    #[serde(default)]
    pub ad_id: Option<String>,
    #[serde(default)]
    pub creative_id: Option<String>,
    /// `"300x250"`.
    #[serde(default)]
    pub size: Option<String>,
    #[serde(default)]
    pub deal_id: Option<String>,
    /// Price bucket, custom granularity.
    #[serde(default)]
    pub pb_cg: Option<String>,
}

impl BidResponseArgs {
    #[must_use]
    pub fn is_available(&self) -> bool {
        self.status_message == BID_AVAILABLE
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuctionArgs {
    #[serde(default)]
    pub auction_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BidWonArgs {
    #[serde(default)]
    pub auction_id: String,
    #[serde(default)]
    pub request_id: String,
}

/// Host auction lifecycle event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "eventType", content = "args", rename_all = "camelCase")]
pub enum AnalyticsEvent {
    AuctionInit(AuctionArgs),
    BidRequested(BidRequestedArgs),
    BidResponse(BidResponseArgs),
    AuctionEnd(AuctionArgs),
    BidWon(BidWonArgs),
}

impl AnalyticsEvent {
    /// Events after which buffered records are sent.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::AuctionEnd(_) | Self::BidWon(_))
    }
}

#[derive(Debug)]
struct QueueState<T> {
    events: Vec<T>,
    initialised: bool,
}

/// FIFO buffer that ignores pushes until [`AnalyticsQueue::init`] is called.
#[derive(Debug)]
pub struct AnalyticsQueue<T> {
    state: Mutex<QueueState<T>>,
}

impl<T> Default for AnalyticsQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> AnalyticsQueue<T> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Mutex::new(QueueState {
                events: Vec::new(),
                initialised: false,
            }),
        }
    }

    /// Drop anything buffered and start accepting pushes.
    pub fn init(&self) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.events.clear();
        state.initialised = true;
    }

    #[must_use]
    pub fn is_initialised(&self) -> bool {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .initialised
    }

    pub fn push(&self, event: T) {
        self.push_all(std::iter::once(event));
    }

    pub fn push_all<I>(&self, events: I)
    where
        I: IntoIterator<Item = T>,
    {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if state.initialised {
            state.events.extend(events);
        }
    }

    /// Take every buffered event, leaving the queue empty but initialised.
    #[must_use]
    pub fn pop_all(&self) -> Vec<T> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        mem::take(&mut state.events)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .events
            .len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T: Clone> AnalyticsQueue<T> {
    /// Snapshot of the buffer, for tests and debugging.
    #[must_use]
    pub fn peek_all(&self) -> Vec<T> {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .events
            .clone()
    }
}
