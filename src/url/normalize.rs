use crate::{UrlError, UrlResult};
use url::Url;

/// Normalizes a URL into the form used as its visited key
///
/// # Normalization Steps
///
/// 1. Parse the URL; reject if malformed
/// 2. Reject any scheme other than http and https
/// 3. Lowercase the host
/// 4. Remove dot segments (done by the parser)
/// 5. Remove the trailing slash of the path (except for the root `/`)
/// 6. Remove the fragment
///
/// The query string is left untouched: two URLs differing only in their query
/// are distinct targets.
///
/// # Examples
///
/// ```
/// use ripple_harvest::url::normalize_url;
///
/// let url = normalize_url("https://EXAMPLE.com/wiki/Category:Physics/#top").unwrap();
/// assert_eq!(url.as_str(), "https://example.com/wiki/Category:Physics");
/// ```
pub fn normalize_url(url_str: &str) -> UrlResult<Url> {
    let url = Url::parse(url_str.trim()).map_err(|e| UrlError::Parse(e.to_string()))?;
    normalize_parsed(url)
}

/// Normalizes an already parsed URL
///
/// Used for links resolved against a base URL, which are parsed once by
/// `Url::join` and should not be re-parsed from text.
pub fn normalize_parsed(mut url: Url) -> UrlResult<Url> {
    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(UrlError::InvalidScheme(format!(
            "Only HTTP and HTTPS schemes are supported, got: {}",
            url.scheme()
        )));
    }

    let host = url.host_str().ok_or(UrlError::MissingDomain)?.to_lowercase();
    url.set_host(Some(&host))
        .map_err(|e| UrlError::Malformed(format!("Failed to set host: {}", e)))?;

    let path = url.path();
    if path.len() > 1 && path.ends_with('/') {
        let trimmed = path.trim_end_matches('/');
        let trimmed = if trimmed.is_empty() { "/" } else { trimmed }.to_string();
        url.set_path(&trimmed);
    }

    url.set_fragment(None);

    Ok(url)
}
