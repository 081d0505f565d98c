pub(crate) mod download;
pub(crate) mod ping;
pub(crate) mod upload;

use std::time::{SystemTime, UNIX_EPOCH};

use reqwest::Url;

/// Appends a unique `_=<epoch millis>` query parameter so no intermediate
/// cache can answer for the origin.
pub(crate) fn cache_defeating_url(base: &Url) -> Url {
    let stamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis())
        .unwrap_or_default();

    let mut url = base.clone();
    url.query_pairs_mut().append_pair("_", &stamp.to_string());
    url
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_defeating_url_keeps_base_query() {
        let base: Url = "https://example.com/down?bytes=50000000".parse().unwrap();
        let url = cache_defeating_url(&base);

        let params: Vec<_> = url.query_pairs().map(|(k, _)| k.into_owned()).collect();
        assert_eq!(params, vec!["bytes".to_string(), "_".to_string()]);
    }
}
