use error_stack::{Report, ResultExt};
use url::Url;

use crate::error::AdapterError;

/// Build `https://{host}{path}?k=v&...` with form-encoded query parameters.
///
/// Parameters with a `None` value are skipped.
///
/// # Errors
///
/// Returns [`AdapterError::Configuration`] when `host` and `path` do not form a valid URL.
pub fn build_url(
    host: &str,
    path: &str,
    params: &[(&str, Option<String>)],
) -> Result<String, Report<AdapterError>> {
    let mut url = Url::parse(&format!("https://{host}{path}"))
        .change_context(AdapterError::Configuration {
            message: "Invalid pixel URL".to_string(),
        })
        .attach(format!("host: {host}, path: {path}"))?;

    {
        let mut query = url.query_pairs_mut();
        for (key, value) in params {
            if let Some(value) = value {
                query.append_pair(key, value);
            }
        }
    }

    if url.query() == Some("") {
        url.set_query(None);
    }

    Ok(url.into())
}
