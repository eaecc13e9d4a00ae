//! Final URL assembly: base URL, `{placeholder}` substitution and query merge.

use std::collections::BTreeMap;
use url::Url;

use crate::{HttpClientError, Result};

/// Path and query parameters contributed by one configuration level.
#[derive(Debug, Clone, Copy)]
pub(crate) struct UrlParams<'a> {
    pub path: &'a BTreeMap<String, String>,
    pub query: &'a [(String, String)],
}

/// Build the absolute URL for a request.
///
/// Relative URLs are joined onto `base_url` with a single `/`. Path params
/// from `request` override those from `client`; values are substituted
/// verbatim. Query pairs are appended in order: pairs already in the URL,
/// then client pairs, then request pairs. Nothing is deduplicated.
pub(crate) fn build_url(
    raw_url: &str,
    base_url: &str,
    client: UrlParams<'_>,
    request: UrlParams<'_>,
) -> Result<Url> {
    let mut target = if !raw_url.starts_with("http") && !base_url.is_empty() {
        format!("{}/{}", base_url, raw_url.trim_start_matches('/'))
    } else {
        raw_url.to_string()
    };

    let path_params: BTreeMap<&str, &str> = client
        .path
        .iter()
        .chain(request.path.iter())
        .map(|(k, v)| (k.as_str(), v.as_str()))
        .collect();

    for (key, value) in path_params {
        target = target.replace(&format!("{{{key}}}"), value);
    }

    let mut url = Url::parse(&target)?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(HttpClientError::InvalidUrl(format!("unsupported scheme in {url}")));
    }

    let pairs: Vec<(String, String)> = url
        .query_pairs()
        .into_owned()
        .chain(client.query.iter().cloned())
        .chain(request.query.iter().cloned())
        .collect();

    url.set_query(None);
    if !pairs.is_empty() {
        url.query_pairs_mut().extend_pairs(pairs);
    }

    Ok(url)
}
