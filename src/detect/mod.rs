//! Directory listing detection.
//!
//! Heuristic classifier deciding whether an HTML document is an open
//! directory index. Two signals: well-known autoindex indicator strings
//! (Apache, nginx and friends), and a raw anchor count - a page that is
//! mostly links is treated as a listing even without any indicator text.

use scraper::{Html, Selector};

use crate::config::LISTING_ANCHOR_THRESHOLD;

/// Indicator substrings matched against the lowercased body.
const LISTING_INDICATORS: &[&str] = &[
    "index of",
    "directory listing",
    "parent directory",
    "<title>index of",
    "apache/",
    "nginx/",
];

/// Hrefs that are navigation chrome, not content links.
pub(crate) const NAVIGATION_HREFS: &[&str] = &["../", "..", ".", "/"];

/// Heuristic open-directory-listing classifier.
#[derive(Debug, Clone, Copy, Default)]
pub struct ListingDetector;

impl ListingDetector {
    pub fn new() -> Self {
        ListingDetector
    }

    /// Whether the body looks like a directory index.
    ///
    /// Returns `false` for empty or unparseable content; a host that
    /// merely serves a normal page is not an error.
    pub fn is_listing(&self, body: &str) -> bool {
        if body.is_empty() {
            return false;
        }

        let lowered = body.to_lowercase();
        for indicator in LISTING_INDICATORS {
            if lowered.contains(indicator) {
                log::debug!("Listing detected via indicator {indicator:?}");
                return true;
            }
        }

        let anchors = content_anchor_count(body);
        if anchors > LISTING_ANCHOR_THRESHOLD {
            log::debug!("Listing detected via anchor count ({anchors})");
            return true;
        }

        false
    }
}

/// Counts anchors with an href, excluding navigation hrefs.
fn content_anchor_count(body: &str) -> usize {
    let document = Html::parse_document(body);
    let selector = Selector::parse("a").expect("static selector");
    document
        .select(&selector)
        .filter_map(|element| element.value().attr("href"))
        .filter(|href| !NAVIGATION_HREFS.contains(href))
        .count()
}
