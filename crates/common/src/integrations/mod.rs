//! Partner integrations: bidder adapters and the GU analytics adapter.

use std::sync::Arc;

use crate::adapter::BidderAdapter;
use crate::settings::Settings;

pub mod adquery;
pub mod gu_analytics;
mod registry;
pub mod rtbhouse;

pub use registry::AdapterRegistry;

type AdapterBuilder = fn(&Settings) -> Option<Arc<dyn BidderAdapter>>;

pub(crate) fn builders() -> &'static [AdapterBuilder] {
    &[rtbhouse::register, adquery::register]
}
