//! Selectors, markers, and URL rules for the site being crawled.

use url::Url;

use crate::driver::Selector;

/// Everything site-specific the crawl needs to know. The default targets the
/// ads-transparency advertiser search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteProfile {
    /// Scheme and host that relative links are resolved against.
    pub origin: String,
    pub search_path: String,
    /// Present once the result listing has rendered.
    pub listing_container: Selector,
    pub listing_item: Selector,
    /// Matched against each listing item; presence means verified.
    pub verified_marker: Selector,
    /// Line prefix introducing the advertiser location.
    pub location_prefix: String,
    /// Unit words that follow the number on the ad-count line.
    pub count_units: Vec<String>,
    /// Substring identifying an advertiser detail page URL.
    pub detail_url_marker: String,
    /// Links on a detail page that lead to nested sub-pages.
    pub sub_link: Selector,
    pub sub_url_marker: String,
    /// Clickable elements tried when a detail page exposes no sub-page links.
    pub sub_page_candidate: Selector,
    pub next_control: Selector,
}

impl Default for SiteProfile {
    fn default() -> Self {
        Self {
            origin: "https://adstransparency.google.com".to_owned(),
            search_path: "/search".to_owned(),
            listing_container: Selector::css("[role='listbox']"),
            listing_item: Selector::css("[role='option']"),
            verified_marker: Selector::xpath(
                ".//span[contains(text(), 'verified') or contains(text(), 'Verified')]",
            ),
            location_prefix: "Based in:".to_owned(),
            count_units: vec!["ads".to_owned(), "ad".to_owned()],
            detail_url_marker: "/advertiser/".to_owned(),
            sub_link: Selector::css("a[href*='/creative/']"),
            sub_url_marker: "/creative/".to_owned(),
            sub_page_candidate: Selector::css("[role='option'], a[href*='/creative/']"),
            next_control: Selector::xpath("//button[contains(., 'Next')]"),
        }
    }
}

impl SiteProfile {
    /// Builds the search listing URL for `query` in `region`.
    ///
    /// # Errors
    ///
    /// Returns [`url::ParseError`] if `origin` or `search_path` do not form a
    /// valid URL.
    pub fn search_url(&self, query: &str, region: &str) -> Result<String, url::ParseError> {
        let mut url = Url::parse(&self.origin)?.join(&self.search_path)?;
        url.query_pairs_mut()
            .append_pair("region", region)
            .append_pair("query", query);
        Ok(url.to_string())
    }

    /// Resolves `href` against the site origin. Absolute hrefs pass through.
    #[must_use]
    pub fn absolute_url(&self, href: &str) -> Option<String> {
        let href = href.trim();
        if href.is_empty() {
            return None;
        }
        Url::parse(&self.origin)
            .and_then(|base| base.join(href))
            .ok()
            .map(String::from)
    }

    #[must_use]
    pub fn is_detail_url(&self, url: &str) -> bool {
        url.contains(&self.detail_url_marker)
    }

    #[must_use]
    pub fn is_sub_url(&self, url: &str) -> bool {
        url.contains(&self.sub_url_marker)
    }
}

/// Compares two page URLs, ignoring a single trailing slash.
#[must_use]
pub fn urls_match(a: &str, b: &str) -> bool {
    a.strip_suffix('/').unwrap_or(a) == b.strip_suffix('/').unwrap_or(b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn search_url_encodes_query_and_region() {
        let profile = SiteProfile::default();
        let url = profile.search_url("a b", "US").unwrap();
        assert_eq!(
            url,
            "https://adstransparency.google.com/search?region=US&query=a+b"
        );
    }

    #[test]
    fn search_url_rejects_bad_origin() {
        let profile = SiteProfile {
            origin: "not a url".to_owned(),
            ..SiteProfile::default()
        };
        assert!(profile.search_url("a", "US").is_err());
    }

    #[test]
    fn absolute_url_resolves_relative_href() {
        let profile = SiteProfile::default();
        assert_eq!(
            profile
                .absolute_url("/advertiser/AR1/creative/CR2?region=US")
                .as_deref(),
            Some("https://adstransparency.google.com/advertiser/AR1/creative/CR2?region=US")
        );
    }

    #[test]
    fn absolute_url_keeps_absolute_href() {
        let profile = SiteProfile::default();
        assert_eq!(
            profile
                .absolute_url("https://other.example.com/creative/9")
                .as_deref(),
            Some("https://other.example.com/creative/9")
        );
    }

    #[test]
    fn absolute_url_blank_is_none() {
        assert!(SiteProfile::default().absolute_url("  ").is_none());
    }

    #[test]
    fn detail_and_sub_markers() {
        let profile = SiteProfile::default();
        assert!(profile.is_detail_url("https://adstransparency.google.com/advertiser/AR1"));
        assert!(!profile.is_detail_url("https://adstransparency.google.com/search?query=a"));
        assert!(profile.is_sub_url("https://adstransparency.google.com/advertiser/AR1/creative/CR1"));
    }

    #[test]
    fn urls_match_ignores_trailing_slash() {
        assert!(urls_match("https://x.com/search/", "https://x.com/search"));
        assert!(!urls_match("https://x.com/search", "https://x.com/other"));
    }
}
