//! Consent and supply-chain signals forwarded to partners.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// GDPR consent as resolved by the host consent module.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct GdprConsent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gdpr_applies: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub consent_string: Option<String>,
}

impl GdprConsent {
    #[must_use]
    pub fn applies(&self) -> bool {
        self.gdpr_applies == Some(true)
    }
}

/// Rewrite a TCF consent string into unpadded base64url.
#[must_use]
pub fn normalize_consent_string(consent: &str) -> String {
    consent
        .chars()
        .filter(|c| *c != '=')
        .map(|c| match c {
            '+' => '-',
            '/' => '_',
            other => other,
        })
        .collect()
}

fn int_in_range(value: Option<&Value>, min: i64, max: i64) -> bool {
    value
        .and_then(Value::as_i64)
        .is_some_and(|v| (min..=max).contains(&v))
}

fn is_valid_transparency(entry: &Value) -> bool {
    let Some(entry) = entry.as_object() else {
        return false;
    };
    let domain_ok = entry
        .get("domain")
        .and_then(Value::as_str)
        .is_some_and(|d| !d.is_empty());
    let params_ok = entry
        .get("dsaparams")
        .and_then(Value::as_array)
        .is_some_and(|params| params.iter().all(|p| p.is_i64() || p.is_u64()));
    domain_ok && params_ok
}

/// Check a DSA (Digital Services Act) transparency object.
///
/// Every field is required. Integers must be JSON integers, not strings.
#[must_use]
pub fn validate_dsa(dsa: &Value) -> bool {
    let Some(dsa) = dsa.as_object() else {
        return false;
    };

    int_in_range(dsa.get("dsarequired"), 0, 3)
        && int_in_range(dsa.get("pubrender"), 0, 2)
        && int_in_range(dsa.get("datatopub"), 0, 2)
        && dsa
            .get("transparency")
            .and_then(Value::as_array)
            .is_some_and(|entries| entries.iter().all(is_valid_transparency))
}

fn optional_is(node: &Map<String, Value>, key: &str, check: fn(&Value) -> bool) -> bool {
    node.get(key).is_none_or(check)
}

fn is_integer(value: &Value) -> bool {
    value.is_i64() || value.is_u64()
}

fn is_valid_schain_node(node: &Value) -> bool {
    let Some(node) = node.as_object() else {
        return false;
    };
    node.get("asi").is_some_and(Value::is_string)
        && node.get("sid").is_some_and(Value::is_string)
        && node.get("hp").is_some_and(is_integer)
        && optional_is(node, "rid", Value::is_string)
}

/// Check a supply chain object against the OpenRTB `SupplyChain` schema.
#[must_use]
pub fn validate_schain(schain: &Value) -> bool {
    let Some(schain) = schain.as_object() else {
        return false;
    };

    optional_is(schain, "ver", Value::is_string)
        && optional_is(schain, "complete", is_integer)
        && schain
            .get("nodes")
            .and_then(Value::as_array)
            .is_some_and(|nodes| nodes.iter().all(is_valid_schain_node))
}
