use url::Url;

/// Validates a bookmark URL before handing it to the system browser.
///
/// Only absolute `http`/`https` URLs are passed on; anything else (file
/// paths, `javascript:`, custom schemes) could make the opener run something
/// other than a browser.
///
/// Returns the parsed URL, or a message suitable for the status bar.
pub fn validate_url_for_open(url_str: &str) -> Result<Url, String> {
    let url = Url::parse(url_str.trim()).map_err(|e| format!("Invalid URL: {}", e))?;
    match url.scheme() {
        "http" | "https" if url.host_str().is_some() => Ok(url),
        "http" | "https" => Err("URL has no host".to_string()),
        scheme => Err(format!("Refusing to open '{}' URL", scheme)),
    }
}
