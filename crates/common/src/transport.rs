//! Host-provided network sink. Adapters build requests; the host sends them.

use crate::adapter::ServerRequest;

pub trait Transport: Send + Sync {
    /// Fire-and-forget GET of a tracking pixel.
    fn trigger_pixel(&self, url: &str);

    /// Fire-and-forget POST, used for analytics beacons.
    fn post(&self, request: &ServerRequest);
}

/// Transport that only logs. Used by the offline driver.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogTransport;

impl Transport for LogTransport {
    fn trigger_pixel(&self, url: &str) {
        log::info!("Pixel: GET {url}");
    }

    fn post(&self, request: &ServerRequest) {
        log::info!(
            "Beacon: {} {} ({} bytes)",
            request.method,
            request.url,
            request.data.len()
        );
    }
}
