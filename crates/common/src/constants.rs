/// Library version reported to partners that ask for it (`v` in AdQuery payloads).
pub const ADAPTERS_VERSION: &str = env!("CARGO_PKG_VERSION");

pub const CONTENT_TYPE_TEXT_PLAIN: &str = "text/plain; charset=utf-8";

/// Prefix for environment overrides, e.g. `BID_ADAPTERS__RTBHOUSE__ENABLED=false`.
pub const ENV_PREFIX: &str = "BID_ADAPTERS";
pub const ENV_SEPARATOR: &str = "__";
