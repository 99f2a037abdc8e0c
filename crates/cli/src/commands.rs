//! Offline adapter commands: each reads host-shaped JSON from files and
//! returns the adapter output as pretty JSON.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use bid_adapters_common::adapter::{ServerRequest, ServerResponse};
use bid_adapters_common::analytics::AnalyticsEvent;
use bid_adapters_common::auction::{AuctionContext, BidRequestDescriptor};
use bid_adapters_common::integrations::gu_analytics::GuAnalyticsAdapter;
use bid_adapters_common::integrations::AdapterRegistry;
use bid_adapters_common::settings::Settings;
use bid_adapters_common::transport::{LogTransport, Transport};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::CliError;

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, CliError> {
    let content = fs::read_to_string(path)?;
    serde_json::from_str(&content)
        .map_err(|e| CliError::Json(format!("{}: {e}", path.display())))
}

/// A file may hold one object or an array of them.
fn read_json_list(path: &Path) -> Result<Vec<Value>, CliError> {
    match read_json::<Value>(path)? {
        Value::Array(values) => Ok(values),
        value => Ok(vec![value]),
    }
}

/// Build partner requests for every valid bid in `bids`.
pub fn build(
    settings: &Settings,
    bidder: &str,
    bids: &Path,
    context: Option<&Path>,
) -> Result<String, CliError> {
    let adapter = AdapterRegistry::new(settings).get(bidder)?;

    let descriptors = BidRequestDescriptor::from_json_batch(&read_json_list(bids)?);
    let context: AuctionContext = match context {
        Some(path) => read_json(path)?,
        None => AuctionContext::default(),
    };

    let valid: Vec<BidRequestDescriptor> = descriptors
        .into_iter()
        .filter(|bid| {
            let ok = adapter.is_bid_request_valid(bid);
            if !ok {
                log::warn!("{bidder}: dropping invalid bid request {}", bid.bid_id);
            }
            ok
        })
        .collect();

    let requests = adapter.build_requests(&valid, &context);
    log::info!("{bidder}: built {} request(s)", requests.len());
    Ok(serde_json::to_string_pretty(&requests)?)
}

/// Turn a partner response body into normalized bids.
pub fn interpret(
    settings: &Settings,
    bidder: &str,
    response: &Path,
    request: &Path,
) -> Result<String, CliError> {
    let adapter = AdapterRegistry::new(settings).get(bidder)?;

    let response = ServerResponse {
        body: read_json(response)?,
    };
    let request: ServerRequest = read_json(request)?;

    let interpreted = adapter.interpret_response(&response, &request);
    log::info!(
        "{bidder}: {} bid(s), {} auction config(s)",
        interpreted.bids().len(),
        interpreted.paapi().len()
    );
    Ok(serde_json::to_string_pretty(&interpreted)?)
}

/// Replay host analytics events through the GU analytics adapter. Beacons go
/// to `transport`.
pub fn track(
    settings: &Settings,
    events: &Path,
    transport: Arc<dyn Transport>,
) -> Result<usize, CliError> {
    let adapter = GuAnalyticsAdapter::from_settings(settings, transport)?
        .ok_or_else(|| CliError::Config("[gu_analytics] section is missing".to_string()))?;

    let events: Vec<AnalyticsEvent> = read_json_list(events)?
        .into_iter()
        .map(serde_json::from_value::<AnalyticsEvent>)
        .collect::<Result<_, _>>()?;

    for event in &events {
        adapter.track(event);
    }
    Ok(events.len())
}

/// [`track`] with beacons written to the log.
pub fn track_to_log(settings: &Settings, events: &Path) -> Result<usize, CliError> {
    track(settings, events, Arc::new(LogTransport))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use tempfile::TempDir;

    fn settings() -> Settings {
        Settings::from_toml(
            r#"
[gu_analytics]
ajax_url = "https://api.nextgen.guardianapps.co.uk"
pv = "page-view-1"
"#,
        )
        .expect("should parse settings")
    }

    fn write(dir: &TempDir, name: &str, value: &Value) -> std::path::PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, value.to_string()).expect("should write fixture");
        path
    }

    fn rtbhouse_bid() -> Value {
        serde_json::json!({
            "bidder": "rtbhouse",
            "params": {"publisherId": "PREBID_TEST", "region": "prebid-eu"},
            "adUnitCode": "adunit-code",
            "mediaTypes": {"banner": {"sizes": [[300, 250], [300, 600]]}},
            "bidId": "30b31c1838de1e",
            "bidderRequestId": "22edbae2733bf6",
            "auctionId": "1d1a030790a475"
        })
    }

    #[derive(Default)]
    struct Collecting(Mutex<Vec<ServerRequest>>);

    impl Transport for Collecting {
        fn trigger_pixel(&self, _url: &str) {}

        fn post(&self, request: &ServerRequest) {
            self.0.lock().expect("post lock").push(request.clone());
        }
    }

    #[test]
    fn test_build_and_interpret_rtbhouse() {
        let dir = TempDir::new().expect("should create temp dir");
        let bids = write(&dir, "bids.json", &serde_json::json!([rtbhouse_bid()]));

        let output = build(&settings(), "rtbhouse", &bids, None).expect("should build requests");
        let requests: Vec<ServerRequest> =
            serde_json::from_str(&output).expect("should parse built requests");
        assert_eq!(requests.len(), 1);
        assert!(requests[0].url.starts_with("https://prebid-eu.creativecdn.com/"));

        let request = write(
            &dir,
            "request.json",
            &serde_json::to_value(&requests[0]).expect("should serialize request"),
        );
        let response = write(
            &dir,
            "response.json",
            &serde_json::json!([{
                "impid": "30b31c1838de1e",
                "price": 0.5,
                "adid": "adid-1",
                "adm": "<!-- test creative -->",
                "adomain": ["rtbhouse.com"],
                "w": 300,
                "h": 250
            }]),
        );

        let output = interpret(&settings(), "rtbhouse", &response, &request)
            .expect("should interpret response");
        let bids: Value = serde_json::from_str(&output).expect("should parse bids");
        assert_eq!(bids[0]["requestId"], "30b31c1838de1e");
        assert_eq!(bids[0]["cpm"], 0.5);
    }

    #[test]
    fn test_build_unknown_bidder() {
        let dir = TempDir::new().expect("should create temp dir");
        let bids = write(&dir, "bids.json", &rtbhouse_bid());

        let result = build(&settings(), "nope", &bids, None);
        assert!(matches!(result, Err(CliError::Adapter(_))));
    }

    #[test]
    fn test_track_sends_beacon_on_auction_end() {
        let dir = TempDir::new().expect("should create temp dir");
        let events = write(
            &dir,
            "events.json",
            &serde_json::json!([
                {"eventType": "auctionInit", "args": {"auctionId": "a-1"}},
                {"eventType": "auctionEnd", "args": {"auctionId": "a-1"}}
            ]),
        );

        let transport = Arc::new(Collecting::default());
        let count = track(&settings(), &events, Arc::clone(&transport) as Arc<dyn Transport>)
            .expect("should replay events");
        assert_eq!(count, 2);

        let posts = transport.0.lock().expect("post lock");
        assert_eq!(posts.len(), 1);
        assert_eq!(
            posts[0].url,
            "https://api.nextgen.guardianapps.co.uk/commercial/api/hb"
        );
    }

    #[test]
    fn test_track_requires_analytics_section() {
        let dir = TempDir::new().expect("should create temp dir");
        let events = write(&dir, "events.json", &serde_json::json!([]));
        let settings = Settings::from_toml("").expect("should load defaults");

        let result = track_to_log(&settings, &events);
        assert!(matches!(result, Err(CliError::Config(_))));
    }
}
