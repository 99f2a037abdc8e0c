use std::collections::HashMap;
use std::sync::Arc;

use error_stack::Report;

use crate::adapter::BidderAdapter;
use crate::error::AdapterError;
use crate::settings::Settings;

#[derive(Default)]
struct AdapterRegistryInner {
    adapters: HashMap<&'static str, Arc<dyn BidderAdapter>>,
}

/// Bidder adapters enabled in settings, keyed by bidder code.
#[derive(Clone, Default)]
pub struct AdapterRegistry {
    inner: Arc<AdapterRegistryInner>,
}

impl AdapterRegistry {
    /// Build a registry from the provided settings.
    #[must_use]
    pub fn new(settings: &Settings) -> Self {
        let mut inner = AdapterRegistryInner::default();

        for builder in super::builders() {
            if let Some(adapter) = builder(settings) {
                log::info!("Registered bidder adapter: {}", adapter.code());
                inner.adapters.insert(adapter.code(), adapter);
            }
        }

        Self {
            inner: Arc::new(inner),
        }
    }

    /// Look up an adapter by bidder code.
    ///
    /// # Errors
    ///
    /// Returns [`AdapterError::UnknownBidder`] when no enabled adapter has this code.
    pub fn get(&self, code: &str) -> Result<Arc<dyn BidderAdapter>, Report<AdapterError>> {
        self.inner.adapters.get(code).cloned().ok_or_else(|| {
            Report::new(AdapterError::UnknownBidder {
                code: code.to_string(),
            })
        })
    }

    /// Registered bidder codes, sorted.
    #[must_use]
    pub fn codes(&self) -> Vec<&'static str> {
        let mut codes: Vec<_> = self.inner.adapters.keys().copied().collect();
        codes.sort_unstable();
        codes
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.adapters.is_empty()
    }
}
