//! Third-party favicon services.

use url::Url;

/// DuckDuckGo's icon endpoint for `host`.
pub fn duckduckgo_url(host: &str) -> Option<Url> {
    Url::parse(&format!("https://icons.duckduckgo.com/ip3/{host}.ico")).ok()
}

/// Google's favicon endpoint for `host`, 64px.
pub fn google_url(host: &str) -> Option<Url> {
    Url::parse_with_params("https://www.google.com/s2/favicons", &[("domain", host), ("sz", "64")]).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duckduckgo_url() {
        assert_eq!(duckduckgo_url("github.com").unwrap().as_str(), "https://icons.duckduckgo.com/ip3/github.com.ico");
    }

    #[test]
    fn test_google_url() {
        assert_eq!(google_url("github.com").unwrap().as_str(), "https://www.google.com/s2/favicons?domain=github.com&sz=64");
    }
}
