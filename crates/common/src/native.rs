//! OpenRTB native 1.1 asset encoding and markup decoding.
//!
//! Requests map a declarative [`NativeSpec`] onto numbered assets using a fixed
//! table; responses use the same table in reverse to project the returned
//! `adm` assets into named fields.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::auction::SizeInput;

/// Native request version sent with every native impression.
pub const NATIVE_VERSION: &str = "1.1";

/// Default `wmin` for aspect-ratio image requests without `min_width`.
const DEFAULT_MIN_WIDTH: u32 = 100;

/// Fixed asset id table shared by request encoding and response decoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum NativeAssetId {
    Title = 1,
    Image = 2,
    Icon = 3,
    Body = 4,
    Sponsored = 5,
    Cta = 6,
}

impl NativeAssetId {
    #[must_use]
    pub fn id(self) -> u8 {
        self as u8
    }

    #[must_use]
    pub fn from_id(id: u8) -> Option<Self> {
        match id {
            1 => Some(Self::Title),
            2 => Some(Self::Image),
            3 => Some(Self::Icon),
            4 => Some(Self::Body),
            5 => Some(Self::Sponsored),
            6 => Some(Self::Cta),
            _ => None,
        }
    }
}

/// OpenRTB native image asset types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ImageType {
    Icon = 1,
    Main = 3,
}

/// OpenRTB native data asset types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum DataAssetType {
    Sponsored = 1,
    Desc = 2,
    CtaText = 12,
}

/// Hosts send `required` as a boolean or a 0/1 number.
fn deserialize_flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Bool(b) => b,
        Value::Number(n) => n.as_f64().is_some_and(|v| v != 0.0),
        Value::String(s) => !s.is_empty(),
        _ => false,
    })
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct TitleSpec {
    #[serde(default, deserialize_with = "deserialize_flag")]
    pub required: bool,
    #[serde(default)]
    pub len: Option<u32>,
}

/// An entry missing either ratio is kept but produces no `wmin`/`hmin`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct AspectRatio {
    #[serde(default)]
    pub min_width: Option<u32>,
    #[serde(default)]
    pub ratio_width: Option<u32>,
    #[serde(default)]
    pub ratio_height: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ImageSpec {
    #[serde(default, deserialize_with = "deserialize_flag")]
    pub required: bool,
    #[serde(default)]
    pub sizes: Option<SizeInput>,
    #[serde(default)]
    pub aspect_ratios: Option<Vec<AspectRatio>>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct DataSpec {
    #[serde(default, deserialize_with = "deserialize_flag")]
    pub required: bool,
    #[serde(default)]
    pub len: Option<u32>,
}

/// Declarative native request (`mediaTypes.native` / `nativeParams`).
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NativeSpec {
    #[serde(default)]
    pub title: Option<TitleSpec>,
    #[serde(default)]
    pub image: Option<ImageSpec>,
    #[serde(default)]
    pub icon: Option<ImageSpec>,
    #[serde(default)]
    pub sponsored_by: Option<DataSpec>,
    #[serde(default)]
    pub body: Option<DataSpec>,
    #[serde(default)]
    pub cta: Option<DataSpec>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TitleAsset {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub len: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageAsset {
    #[serde(rename = "type")]
    pub image_type: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub w: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub h: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wmin: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hmin: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataAsset {
    #[serde(rename = "type")]
    pub data_type: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub len: Option<u32>,
}

/// One entry of `imp.native.request.assets`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NativeAsset {
    pub id: u8,
    pub required: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<TitleAsset>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub img: Option<ImageAsset>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<DataAsset>,
}

impl NativeAsset {
    fn new(id: NativeAssetId, required: bool) -> Self {
        Self {
            id: id.id(),
            required: u8::from(required),
            title: None,
            img: None,
            data: None,
        }
    }
}

/// Minimum height for an aspect-ratio request.
///
/// `hmin = min_width * ratio_height / ratio_width` with integer truncation.
/// Returns `None` for a zero `ratio_width` or a result that does not fit `u32`.
#[must_use]
pub fn min_height(min_width: u32, ratio_width: u32, ratio_height: u32) -> Option<u32> {
    if ratio_width == 0 {
        return None;
    }
    let hmin = u64::from(min_width) * u64::from(ratio_height) / u64::from(ratio_width);
    u32::try_from(hmin).ok()
}

fn map_image(spec: &ImageSpec, image_type: ImageType) -> ImageAsset {
    let mut img = ImageAsset {
        image_type: image_type as u8,
        w: None,
        h: None,
        wmin: None,
        hmin: None,
    };

    if let Some(ratio) = spec.aspect_ratios.as_ref().and_then(|r| r.first()) {
        let min_width = ratio.min_width.unwrap_or(DEFAULT_MIN_WIDTH);
        match (ratio.ratio_width, ratio.ratio_height) {
            (Some(ratio_width), Some(ratio_height)) => {
                match min_height(min_width, ratio_width, ratio_height) {
                    Some(hmin) => {
                        img.wmin = Some(min_width);
                        img.hmin = Some(hmin);
                    }
                    None => log::warn!("Ignoring native aspect ratio with zero ratio_width"),
                }
            }
            _ => log::warn!("Ignoring native aspect ratio without ratio_width and ratio_height"),
        }
    }

    if let Some(size) = spec
        .sizes
        .clone()
        .and_then(|s| s.into_sizes().into_iter().next())
    {
        img.w = Some(size.w);
        img.h = Some(size.h);
    }

    img
}

fn data_asset(id: NativeAssetId, spec: &DataSpec, data_type: DataAssetType) -> NativeAsset {
    NativeAsset {
        data: Some(DataAsset {
            data_type: data_type as u8,
            len: spec.len,
        }),
        ..NativeAsset::new(id, spec.required)
    }
}

/// Encode a native request spec into the ordered asset list.
///
/// Order: title, image, icon, sponsoredBy, body, cta. Each present field
/// yields exactly one asset.
#[must_use]
pub fn encode_assets(spec: &NativeSpec) -> Vec<NativeAsset> {
    let mut assets = Vec::new();

    if let Some(title) = &spec.title {
        assets.push(NativeAsset {
            title: Some(TitleAsset { len: title.len }),
            ..NativeAsset::new(NativeAssetId::Title, title.required)
        });
    }
    if let Some(image) = &spec.image {
        assets.push(NativeAsset {
            img: Some(map_image(image, ImageType::Main)),
            ..NativeAsset::new(NativeAssetId::Image, image.required)
        });
    }
    if let Some(icon) = &spec.icon {
        assets.push(NativeAsset {
            img: Some(map_image(icon, ImageType::Icon)),
            ..NativeAsset::new(NativeAssetId::Icon, icon.required)
        });
    }
    if let Some(sponsored) = &spec.sponsored_by {
        assets.push(data_asset(
            NativeAssetId::Sponsored,
            sponsored,
            DataAssetType::Sponsored,
        ));
    }
    if let Some(body) = &spec.body {
        assets.push(data_asset(NativeAssetId::Body, body, DataAssetType::Desc));
    }
    if let Some(cta) = &spec.cta {
        assets.push(data_asset(NativeAssetId::Cta, cta, DataAssetType::CtaText));
    }

    assets
}

// ---------------------------------------------------------------------------
// Response side
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct NativeMarkup {
    native: NativeResponseBody,
}

#[derive(Debug, Deserialize)]
struct NativeResponseBody {
    #[serde(default)]
    link: Option<NativeLink>,
    #[serde(default)]
    imptrackers: Vec<String>,
    #[serde(default)]
    assets: Vec<ResponseAsset>,
}

#[derive(Debug, Deserialize)]
struct NativeLink {
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    clicktrackers: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct ResponseAsset {
    /// Kept raw: ids outside the known range are skipped, not rejected.
    #[serde(default)]
    id: Value,
    #[serde(default)]
    title: Option<ResponseTitle>,
    #[serde(default)]
    img: Option<ResponseImage>,
    #[serde(default)]
    data: Option<ResponseData>,
}

#[derive(Debug, Deserialize)]
struct ResponseTitle {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResponseImage {
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    w: Option<u32>,
    #[serde(default)]
    h: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct ResponseData {
    #[serde(default)]
    value: Option<String>,
}

/// Image returned in a native ad.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NativeImage {
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
}

/// Native ad projected into named fields for the host renderer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NativeAd {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sponsored_by: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cta: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<NativeImage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<NativeImage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub click_url: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub click_trackers: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub impression_trackers: Vec<String>,
}

/// Percent-encode like `encodeURI`: reserved URI characters are kept.
#[must_use]
pub fn encode_uri(input: &str) -> String {
    const KEEP: &[u8] = b";,/?:@&=+$-_.!~*'()#";
    let mut out = String::with_capacity(input.len());
    for byte in input.bytes() {
        if byte.is_ascii_alphanumeric() || KEEP.contains(&byte) {
            out.push(char::from(byte));
        } else {
            out.push_str(&format!("%{byte:02X}"));
        }
    }
    out
}

fn image_from(img: ResponseImage) -> Option<NativeImage> {
    img.url.map(|url| NativeImage {
        url: encode_uri(&url),
        width: img.w,
        height: img.h,
    })
}

/// Decode `adm` native markup. Malformed markup yields `None`, never an error.
#[must_use]
pub fn decode_markup(adm: &str) -> Option<NativeAd> {
    let markup: NativeMarkup = match serde_json::from_str(adm) {
        Ok(markup) => markup,
        Err(e) => {
            log::warn!("Unparseable native markup: {e}");
            return None;
        }
    };
    let native = markup.native;

    let mut ad = NativeAd {
        impression_trackers: native.imptrackers,
        ..NativeAd::default()
    };
    if let Some(link) = native.link {
        ad.click_url = link.url.as_deref().map(encode_uri);
        ad.click_trackers = link.clicktrackers;
    }

    for asset in native.assets {
        let known = asset
            .id
            .as_u64()
            .and_then(|id| u8::try_from(id).ok())
            .and_then(NativeAssetId::from_id);
        match known {
            Some(NativeAssetId::Title) => ad.title = asset.title.and_then(|t| t.text),
            Some(NativeAssetId::Image) => ad.image = asset.img.and_then(image_from),
            Some(NativeAssetId::Icon) => ad.icon = asset.img.and_then(image_from),
            Some(NativeAssetId::Body) => ad.body = asset.data.and_then(|d| d.value),
            Some(NativeAssetId::Sponsored) => ad.sponsored_by = asset.data.and_then(|d| d.value),
            Some(NativeAssetId::Cta) => ad.cta = asset.data.and_then(|d| d.value),
            None => log::debug!("Ignoring unknown native asset id {}", asset.id),
        }
    }

    Some(ad)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn spec(value: Value) -> NativeSpec {
        serde_json::from_value(value).expect("should parse native spec")
    }

    #[test]
    fn title_with_required_flag() {
        let assets = encode_assets(&spec(json!({"title": {"required": true, "len": 100}})));
        assert_eq!(
            serde_json::to_value(&assets[0]).expect("serialize"),
            json!({"id": 1, "required": 1, "title": {"len": 100}})
        );
    }

    #[test]
    fn required_defaults_to_zero() {
        let assets = encode_assets(&spec(json!({"title": {"len": 100}})));
        assert_eq!(assets[0].required, 0);
    }

    #[test]
    fn single_image_size() {
        let assets = encode_assets(&spec(json!({"image": {"sizes": [300, 250]}})));
        assert_eq!(
            serde_json::to_value(&assets[0]).expect("serialize"),
            json!({"id": 2, "required": 0, "img": {"w": 300, "h": 250, "type": 3}})
        );
    }

    #[test]
    fn first_of_multiple_image_sizes_wins() {
        let assets = encode_assets(&spec(json!({"image": {"sizes": [[300, 250], [100, 100]]}})));
        let img = assets[0].img.as_ref().expect("img");
        assert_eq!((img.w, img.h), (Some(300), Some(250)));
    }

    #[test]
    fn aspect_ratio_with_min_width() {
        let assets = encode_assets(&spec(json!({
            "icon": {"aspect_ratios": [{"min_width": 300, "ratio_width": 2, "ratio_height": 3}]}
        })));
        assert_eq!(
            serde_json::to_value(&assets[0]).expect("serialize"),
            json!({"id": 3, "required": 0, "img": {"type": 1, "wmin": 300, "hmin": 450}})
        );
    }

    #[test]
    fn aspect_ratio_without_min_width_defaults_to_100() {
        let assets = encode_assets(&spec(json!({
            "icon": {"aspect_ratios": [{"ratio_width": 2, "ratio_height": 3}]}
        })));
        let img = assets[0].img.as_ref().expect("img");
        assert_eq!((img.wmin, img.hmin), (Some(100), Some(150)));
    }

    #[test]
    fn partial_aspect_ratio_keeps_asset_without_minimums() {
        let spec = spec(json!({
            "title": {"required": true},
            "image": {"required": true, "aspect_ratios": [{"min_width": 100}]}
        }));
        let assets = encode_assets(&spec);
        assert_eq!(assets.len(), 2);
        assert_eq!(
            serde_json::to_value(&assets[1]).expect("serialize"),
            json!({"id": 2, "required": 1, "img": {"type": 3}})
        );
    }

    #[test]
    fn hmin_truncates_non_integer_ratios() {
        assert_eq!(min_height(100, 3, 2), Some(66));
        assert_eq!(min_height(100, 0, 2), None);
    }

    #[test]
    fn all_asset_kinds_in_fixed_order() {
        let assets = encode_assets(&spec(json!({
            "title": {}, "image": {}, "icon": {}, "sponsoredBy": {}, "body": {}, "cta": {}
        })));
        let ids: Vec<u8> = assets.iter().map(|a| a.id).collect();
        assert_eq!(ids, vec![1, 2, 3, 5, 4, 6]);
        assert_eq!(
            assets[5].data.as_ref().map(|d| d.data_type),
            Some(DataAssetType::CtaText as u8)
        );
    }

    #[test]
    fn decodes_markup_into_named_fields() {
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

        let ad = decode_markup(&adm).expect("should decode markup");
        assert_eq!(
            serde_json::to_value(&ad).expect("serialize"),
            json!({
                "title": "Title text",
                "clickUrl": "https://example.com",
                "impressionTrackers": ["https://example.com/imptracker"],
                "image": {"url": "https://example.com/image.jpg", "width": 150, "height": 50},
                "body": "Body text"
            })
        );
    }

    #[test]
    fn out_of_range_asset_ids_are_skipped() {
        let adm = json!({
            "native": {
                "assets": [
                    {"id": 300, "title": {"text": "Ignored"}},
                    {"id": -1, "data": {"value": "Ignored"}},
                    {"id": 1, "title": {"text": "Title text"}},
                    {"id": 6, "data": {"value": "Shop now"}}
                ]
            }
        })
        .to_string();

        let ad = decode_markup(&adm).expect("should decode despite unknown ids");
        assert_eq!(ad.title.as_deref(), Some("Title text"));
        assert_eq!(ad.cta.as_deref(), Some("Shop now"));
        assert_eq!(ad.body, None);
    }

    #[test]
    fn malformed_markup_yields_none() {
        assert!(decode_markup("{not json").is_none());
        assert!(decode_markup(r#"{"assets": []}"#).is_none());
    }

    #[test]
    fn encode_uri_keeps_reserved_characters() {
        assert_eq!(
            encode_uri("https://example.com/a b?x=1&y=ü"),
            "https://example.com/a%20b?x=1&y=%C3%BC"
        );
    }
}
