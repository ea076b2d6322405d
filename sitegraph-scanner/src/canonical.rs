use crate::error::{Result, ScanError};
use serde::{Serialize, Serializer};
use std::fmt;
use std::hash::{Hash, Hasher};
use url::Url;

/// Segment substituted for purely numeric path segments when folding IDs.
pub const FOLDED_SEGMENT: &str = "0";

/// Label used for the site root, whose path has nothing left to show.
pub const ROOT_LABEL: &str = "_";

/// A normalized web address used both as a traversal key and a graph node.
///
/// Identity is `(scheme, host, key)` where `key` is the path with the query
/// stripped and, when ID folding is on, numeric segments collapsed. The
/// resolved URL is kept in `raw` and is what actually gets requested.
#[derive(Debug, Clone)]
pub struct CanonicalUrl {
    raw: Url,
    scheme: String,
    host: String,
    path: String,
    key: String,
    label: String,
}

impl CanonicalUrl {
    /// Builds a canonical URL without any scope check.
    pub fn from_url(mut url: Url, fold_ids: bool) -> Self {
        url.set_fragment(None);

        let scheme = url.scheme().to_string();
        let host = match (url.host_str(), url.port()) {
            (Some(host), Some(port)) => format!("{}:{}", host, port),
            (Some(host), None) => host.to_string(),
            (None, _) => String::new(),
        };
        let path = url.path().to_string();
        let key = if fold_ids {
            fold_numeric_segments(&path)
        } else {
            path.clone()
        };
        let label = label_for(&key);

        Self {
            raw: url,
            scheme,
            host,
            path,
            key,
            label,
        }
    }

    pub fn raw(&self) -> &Url {
        &self.raw
    }

    pub fn as_str(&self) -> &str {
        self.raw.as_str()
    }

    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    /// Host including a non-default port.
    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// The path used for equality, folded when ID folding is enabled.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Display name used as the graph node id.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Substring match against the raw URL, query included.
    pub fn contains(&self, needle: &str) -> bool {
        self.raw.as_str().contains(needle)
    }
}

impl PartialEq for CanonicalUrl {
    fn eq(&self, other: &Self) -> bool {
        self.scheme == other.scheme && self.host == other.host && self.key == other.key
    }
}

impl Eq for CanonicalUrl {}

impl Hash for CanonicalUrl {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.scheme.hash(state);
        self.host.hash(state);
        self.key.hash(state);
    }
}

impl fmt::Display for CanonicalUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.raw.as_str())
    }
}

impl Serialize for CanonicalUrl {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.raw.as_str())
    }
}

/// Resolves raw hrefs against the base URL and confines them to its origin.
#[derive(Debug, Clone)]
pub struct UrlNormalizer {
    base: Url,
    fold_ids: bool,
}

impl UrlNormalizer {
    pub fn new(base: Url, fold_ids: bool) -> Self {
        Self { base, fold_ids }
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    pub fn base(&self) -> CanonicalUrl {
        CanonicalUrl::from_url(self.base.clone(), self.fold_ids)
    }

    pub fn fold_ids(&self) -> bool {
        self.fold_ids
    }

    /// Normalizes an href as found in a document.
    ///
    /// Path-absolute hrefs (`/...`) resolve against the base origin, anything
    /// else must already be an absolute URL. Document-relative hrefs such as
    /// `page.html` fail to parse and are reported as malformed.
    pub fn normalize(&self, raw: &str) -> Result<CanonicalUrl> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(ScanError::MalformedUrl(String::new()));
        }

        let resolved = if raw.starts_with('/') {
            self.base.join(raw)
        } else {
            Url::parse(raw)
        }
        .map_err(|e| ScanError::MalformedUrl(format!("{}: {}", raw, e)))?;

        self.in_scope(resolved)
    }

    /// Accepts an already absolute URL if it shares the base origin.
    pub fn in_scope(&self, url: Url) -> Result<CanonicalUrl> {
        if url.origin() != self.base.origin() {
            return Err(ScanError::OutOfScope(url.to_string()));
        }
        Ok(CanonicalUrl::from_url(url, self.fold_ids))
    }
}

/// Replaces every purely numeric path segment with [`FOLDED_SEGMENT`].
pub fn fold_numeric_segments(path: &str) -> String {
    path.split('/')
        .map(|segment| {
            if !segment.is_empty() && segment.bytes().all(|b| b.is_ascii_digit()) {
                FOLDED_SEGMENT
            } else {
                segment
            }
        })
        .collect::<Vec<_>>()
        .join("/")
}

fn label_for(key: &str) -> String {
    let trimmed = key.strip_prefix('/').unwrap_or(key);
    let mut label = trimmed.replace('/', "_");
    if label.ends_with('_') {
        label.pop();
    }
    if label.is_empty() {
        ROOT_LABEL.to_string()
    } else {
        label
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn normalizer(fold_ids: bool) -> UrlNormalizer {
        UrlNormalizer::new(Url::parse("http://x.test/").unwrap(), fold_ids)
    }

    #[test]
    fn test_query_string_ignored_for_equality() {
        let n = normalizer(false);
        let a = n.normalize("/search?q=rust").unwrap();
        let b = n.normalize("http://x.test/search?q=go&page=2").unwrap();
        let c = n.normalize("/search").unwrap();

        assert_eq!(a, b);
        assert_eq!(a, c);
        assert_eq!(a.key(), "/search");
        // raw keeps the query for fetching
        assert_eq!(a.as_str(), "http://x.test/search?q=rust");
    }

    #[test]
    fn test_equal_urls_hash_equal() {
        let n = normalizer(true);
        let mut set = HashSet::new();
        set.insert(n.normalize("/item/1/view").unwrap());
        set.insert(n.normalize("/item/2/view?tab=a").unwrap());
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_id_folding_enabled() {
        let n = normalizer(true);
        let a = n.normalize("/item/1/view").unwrap();
        let b = n.normalize("/item/2/view").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.key(), "/item/0/view");
        assert_eq!(a.label(), "item_0_view");
        // the fetch target is left untouched
        assert_eq!(a.raw().path(), "/item/1/view");
    }

    #[test]
    fn test_id_folding_disabled() {
        let n = normalizer(false);
        let a = n.normalize("/item/1/view").unwrap();
        let b = n.normalize("/item/2/view").unwrap();
        assert_ne!(a, b);
        assert_eq!(a.label(), "item_1_view");
    }

    #[test]
    fn test_folding_only_touches_whole_segments() {
        assert_eq!(fold_numeric_segments("/v2/item/42"), "/v2/item/0");
        assert_eq!(fold_numeric_segments("/2024-01/7/"), "/2024-01/0/");
        assert_eq!(fold_numeric_segments("/"), "/");
    }

    #[test]
    fn test_label_root() {
        let n = normalizer(false);
        assert_eq!(n.base().label(), ROOT_LABEL);
        assert_eq!(n.normalize("/").unwrap().label(), "_");
    }

    #[test]
    fn test_label_trailing_slash_trimmed() {
        let n = normalizer(false);
        assert_eq!(n.normalize("/docs/guide/").unwrap().label(), "docs_guide");
        assert_eq!(n.normalize("/docs/guide").unwrap().label(), "docs_guide");
    }

    #[test]
    fn test_trailing_slash_is_a_distinct_key() {
        // Same label, different node: duplicates are left to the renderer.
        let n = normalizer(false);
        let a = n.normalize("/docs/").unwrap();
        let b = n.normalize("/docs").unwrap();
        assert_ne!(a, b);
        assert_eq!(a.label(), b.label());
    }

    #[test]
    fn test_empty_href_rejected() {
        let n = normalizer(false);
        assert!(matches!(n.normalize(""), Err(ScanError::MalformedUrl(_))));
        assert!(matches!(n.normalize("   "), Err(ScanError::MalformedUrl(_))));
    }

    #[test]
    fn test_relative_href_rejected() {
        let n = normalizer(false);
        assert!(matches!(
            n.normalize("page.html"),
            Err(ScanError::MalformedUrl(_))
        ));
        assert!(matches!(
            n.normalize("#section"),
            Err(ScanError::MalformedUrl(_))
        ));
    }

    #[test]
    fn test_other_origin_rejected() {
        let n = normalizer(false);
        assert!(matches!(
            n.normalize("http://other.test/a"),
            Err(ScanError::OutOfScope(_))
        ));
        assert!(matches!(
            n.normalize("https://x.test/a"),
            Err(ScanError::OutOfScope(_))
        ));
        assert!(matches!(
            n.normalize("http://x.test:8080/a"),
            Err(ScanError::OutOfScope(_))
        ));
        assert!(matches!(
            n.normalize("mailto:someone@x.test"),
            Err(ScanError::OutOfScope(_))
        ));
        assert!(matches!(
            n.normalize("//other.test/a"),
            Err(ScanError::OutOfScope(_))
        ));
    }

    #[test]
    fn test_path_absolute_resolves_against_origin() {
        let n = UrlNormalizer::new(Url::parse("http://x.test/app/").unwrap(), false);
        let url = n.normalize("/login").unwrap();
        assert_eq!(url.as_str(), "http://x.test/login");
    }

    #[test]
    fn test_fragment_dropped() {
        let n = normalizer(false);
        let url = n.normalize("/page#top").unwrap();
        assert_eq!(url.as_str(), "http://x.test/page");
    }

    #[test]
    fn test_port_is_part_of_host() {
        let n = UrlNormalizer::new(Url::parse("http://127.0.0.1:8080/").unwrap(), false);
        let url = n.normalize("/a").unwrap();
        assert_eq!(url.host(), "127.0.0.1:8080");
        assert_eq!(url.scheme(), "http");
    }
}
