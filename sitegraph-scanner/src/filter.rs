use crate::canonical::{CanonicalUrl, UrlNormalizer};
use crate::graph::SitemapGraph;
use indexmap::IndexSet;
use scraper::{Html, Selector};
use std::collections::HashSet;
use tracing::{debug, warn};

/// Raw `href` values of every anchor in the document, in document order.
pub fn extract_links(html: &str) -> Vec<String> {
    let document = Html::parse_document(html);
    let link_selector = Selector::parse("a[href]").unwrap();

    document
        .select(&link_selector)
        .filter_map(|element| element.value().attr("href"))
        .map(str::to_string)
        .collect()
}

/// Turns raw hrefs into in-scope canonical URLs and decides which of them
/// become graph edges.
#[derive(Debug, Clone)]
pub struct UrlFilter {
    normalizer: UrlNormalizer,
    base: CanonicalUrl,
    skip_auth: Option<String>,
    skip_self: bool,
    skip_base_back: bool,
}

impl UrlFilter {
    pub fn new(normalizer: UrlNormalizer) -> Self {
        let base = normalizer.base();
        Self {
            normalizer,
            base,
            skip_auth: None,
            skip_self: false,
            skip_base_back: false,
        }
    }

    pub fn with_skip_auth(mut self, skip_auth: Option<String>) -> Self {
        self.skip_auth = skip_auth.filter(|s| !s.is_empty());
        self
    }

    pub fn with_skip_self(mut self, skip_self: bool) -> Self {
        self.skip_self = skip_self;
        self
    }

    pub fn with_skip_base_back(mut self, skip_base_back: bool) -> Self {
        self.skip_base_back = skip_base_back;
        self
    }

    pub fn normalizer(&self) -> &UrlNormalizer {
        &self.normalizer
    }

    pub fn base(&self) -> &CanonicalUrl {
        &self.base
    }

    pub fn is_auth(&self, url: &CanonicalUrl) -> bool {
        self.skip_auth
            .as_deref()
            .is_some_and(|needle| url.contains(needle))
    }

    /// Normalizes every href, dropping malformed, out-of-scope and
    /// authentication URLs. The first spelling of each key wins.
    pub fn filter_candidates(&self, hrefs: &[String]) -> IndexSet<CanonicalUrl> {
        let mut candidates = IndexSet::new();
        for href in hrefs {
            match self.normalizer.normalize(href) {
                Ok(url) if self.is_auth(&url) => {
                    debug!("Dropping authentication URL: {}", url);
                }
                Ok(url) => {
                    candidates.insert(url);
                }
                Err(e) if e.is_filtered_link() => {
                    debug!("Dropping link '{}': {}", href, e);
                }
                Err(e) => {
                    warn!("Unexpected error for link '{}': {}", href, e);
                }
            }
        }
        candidates
    }

    /// Edges recorded for `page`: candidates minus self references and links
    /// back to the base when those are suppressed.
    pub fn outgoing(
        &self,
        candidates: &IndexSet<CanonicalUrl>,
        page: &CanonicalUrl,
    ) -> IndexSet<CanonicalUrl> {
        candidates
            .iter()
            .filter(|url| !(self.skip_self && *url == page))
            .filter(|url| !(self.skip_base_back && **url == self.base))
            .cloned()
            .collect()
    }
}

/// Candidates that are neither graph keys nor already waiting in the
/// frontier, in first-seen order.
pub fn dedupe(
    candidates: &IndexSet<CanonicalUrl>,
    queued: &HashSet<CanonicalUrl>,
    graph: &SitemapGraph,
) -> Vec<CanonicalUrl> {
    candidates
        .iter()
        .filter(|url| !graph.contains(url) && !queued.contains(*url))
        .cloned()
        .collect()
}
