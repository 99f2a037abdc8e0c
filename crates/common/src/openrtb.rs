use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::native::{NativeAsset, NATIVE_VERSION};

/// Subset of an OpenRTB 2.5 bid request as sent to partner endpoints.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OpenRtbRequest {
    /// Unique ID of the bid request, provided by the host.
    pub id: String,
    pub imp: Vec<Imp>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub site: Option<Site>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<User>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub regs: Option<Regs>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<Source>,
    pub cur: Vec<String>,
    pub test: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ext: Option<RequestExt>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Imp {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub banner: Option<Banner>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub native: Option<Native>,
    pub tagid: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bidfloor: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ext: Option<ImpExt>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Banner {
    pub w: u32,
    pub h: u32,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub format: Vec<Format>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Format {
    pub w: u32,
    pub h: u32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NativeRequest {
    pub assets: Vec<NativeAsset>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Native {
    pub request: NativeRequest,
    pub ver: String,
}

impl Native {
    #[must_use]
    pub fn new(assets: Vec<NativeAsset>) -> Self {
        Self {
            request: NativeRequest { assets },
            ver: NATIVE_VERSION.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImpExt {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tid: Option<Value>,
    /// Auction environment; 1 = on-device interest group auction.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ae: Option<Value>,
}

impl ImpExt {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tid.is_none() && self.ae.is_none()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Publisher {
    pub id: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Site {
    pub publisher: Publisher,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct User {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ext: Option<UserExt>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserExt {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub consent: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub eids: Vec<Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Regs {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ext: Option<RegsExt>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegsExt {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gdpr: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub us_privacy: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dsa: Option<Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Source {
    pub tid: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RequestExt {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schain: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fledge_config: Option<Map<String, Value>>,
}

/// One bid from a partner response.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Bid {
    #[serde(default)]
    pub impid: String,
    #[serde(default)]
    pub price: Option<f64>,
    #[serde(default, deserialize_with = "crate::json::deserialize_string_or_number")]
    pub adid: String,
    #[serde(default)]
    pub adm: Option<String>,
    #[serde(default)]
    pub w: Option<u32>,
    #[serde(default)]
    pub h: Option<u32>,
    #[serde(default)]
    pub cur: Option<String>,
    #[serde(default)]
    pub dealid: Option<String>,
    /// `null` or a non-array reads as no domains; non-string entries are skipped.
    #[serde(default, deserialize_with = "crate::json::deserialize_string_list")]
    pub adomain: Vec<String>,
    #[serde(default)]
    pub ext: Option<BidExt>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BidExt {
    #[serde(default)]
    pub dsa: Option<Value>,
}
