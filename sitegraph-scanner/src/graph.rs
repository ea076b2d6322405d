use crate::canonical::CanonicalUrl;
use indexmap::{IndexMap, IndexSet};
use serde::Serialize;
use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};

/// Outgoing links and screenshot of one recorded page.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PageRecord {
    pub outgoing: IndexSet<CanonicalUrl>,
    pub image: Option<PathBuf>,
}

/// Accumulated crawl result, keyed by canonical URL in insertion order.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SitemapGraph {
    pages: IndexMap<CanonicalUrl, PageRecord>,
}

impl SitemapGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a page and its outgoing links.
    ///
    /// An existing entry is overwritten (last write wins) but keeps its
    /// original position in the node order. The image is reset as well.
    pub fn record_page(&mut self, key: CanonicalUrl, outgoing: IndexSet<CanonicalUrl>) {
        self.pages.insert(
            key,
            PageRecord {
                outgoing,
                image: None,
            },
        );
    }

    pub fn contains(&self, key: &CanonicalUrl) -> bool {
        self.pages.contains_key(key)
    }

    pub fn get(&self, key: &CanonicalUrl) -> Option<&PageRecord> {
        self.pages.get(key)
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    pub fn edge_count(&self) -> usize {
        self.pages.values().map(|record| record.outgoing.len()).sum()
    }

    pub fn keys(&self) -> impl Iterator<Item = &CanonicalUrl> {
        self.pages.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&CanonicalUrl, &PageRecord)> {
        self.pages.iter()
    }

    /// Sets or clears the screenshot path of a node. Returns false if the
    /// node does not exist.
    pub fn set_image(&mut self, key: &CanonicalUrl, image: Option<PathBuf>) -> bool {
        match self.pages.get_mut(key) {
            Some(record) => {
                record.image = image;
                true
            }
            None => false,
        }
    }

    pub fn remove(&mut self, key: &CanonicalUrl) -> Option<PageRecord> {
        self.pages.shift_remove(key)
    }

    /// Drops every edge whose target is in `removed`.
    pub fn prune_dangling(&mut self, removed: &HashSet<CanonicalUrl>) {
        if removed.is_empty() {
            return;
        }
        for record in self.pages.values_mut() {
            record.outgoing.retain(|target| !removed.contains(target));
        }
    }

    /// Post-crawl pruning.
    ///
    /// Removes the base URL entry when `base` is given and every entry whose
    /// raw URL contains `skip_auth`, then drops edges pointing at removed
    /// nodes or at any URL containing `skip_auth`. Returns the removed keys.
    pub fn clean(
        &mut self,
        base: Option<&CanonicalUrl>,
        skip_auth: Option<&str>,
    ) -> Vec<CanonicalUrl> {
        let mut removed: Vec<CanonicalUrl> = Vec::new();

        if let Some(base) = base
            && let Some((key, _)) = self.pages.shift_remove_entry(base)
        {
            removed.push(key);
        }

        if let Some(needle) = skip_auth {
            let auth_keys: Vec<CanonicalUrl> = self
                .pages
                .keys()
                .filter(|key| key.contains(needle))
                .cloned()
                .collect();
            for key in auth_keys {
                self.pages.shift_remove(&key);
                removed.push(key);
            }
        }

        let removed_set: HashSet<CanonicalUrl> = removed.iter().cloned().collect();
        for record in self.pages.values_mut() {
            record.outgoing.retain(|target| {
                !removed_set.contains(target) && !skip_auth.is_some_and(|n| target.contains(n))
            });
        }

        removed
    }

    /// `(source, target)` pairs in insertion order.
    pub fn to_edge_list(&self) -> Vec<(&CanonicalUrl, &CanonicalUrl)> {
        self.pages
            .iter()
            .flat_map(|(source, record)| record.outgoing.iter().map(move |target| (source, target)))
            .collect()
    }

    /// Nodes with their screenshot paths in insertion order.
    pub fn to_node_list(&self) -> Vec<(&CanonicalUrl, Option<&Path>)> {
        self.pages
            .iter()
            .map(|(key, record)| (key, record.image.as_deref()))
            .collect()
    }
}

impl fmt::Display for SitemapGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, (key, record)) in self.pages.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            let targets: Vec<&str> = record.outgoing.iter().map(|t| t.label()).collect();
            write!(f, "{} -> [{}]", key.label(), targets.join(", "))?;
        }
        write!(f, "}}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canonical::UrlNormalizer;
    use url::Url;

    fn n() -> UrlNormalizer {
        UrlNormalizer::new(Url::parse("http://x.test/").unwrap(), true)
    }

    fn u(path: &str) -> CanonicalUrl {
        n().normalize(path).unwrap()
    }

    fn set(paths: &[&str]) -> IndexSet<CanonicalUrl> {
        paths.iter().map(|p| u(p)).collect()
    }

    fn assert_no_dangling(graph: &SitemapGraph) {
        for (source, target) in graph.to_edge_list() {
            assert!(
                graph.contains(target),
                "dangling edge {} -> {}",
                source.label(),
                target.label()
            );
        }
    }

    #[test]
    fn test_record_page_last_write_wins() {
        let mut graph = SitemapGraph::new();
        graph.record_page(u("/a"), set(&["/b"]));
        graph.record_page(u("/b"), set(&[]));
        graph.record_page(u("/a"), set(&["/c"]));

        assert_eq!(graph.len(), 2);
        let record = graph.get(&u("/a")).unwrap();
        assert_eq!(record.outgoing, set(&["/c"]));
        // position of the first insert is kept
        assert_eq!(graph.keys().next().unwrap().label(), "a");
    }

    #[test]
    fn test_folded_keys_collide() {
        let mut graph = SitemapGraph::new();
        graph.record_page(u("/item/1"), set(&[]));
        assert!(graph.contains(&u("/item/2")));
    }

    #[test]
    fn test_edge_and_node_lists_in_order() {
        let mut graph = SitemapGraph::new();
        graph.record_page(u("/"), set(&["/b", "/a"]));
        graph.record_page(u("/b"), set(&["/"]));
        graph.set_image(&u("/b"), Some(PathBuf::from("shots/b.png")));

        let edges: Vec<(&str, &str)> = graph
            .to_edge_list()
            .into_iter()
            .map(|(s, t)| (s.label(), t.label()))
            .collect();
        assert_eq!(edges, vec![("_", "b"), ("_", "a"), ("b", "_")]);

        let nodes = graph.to_node_list();
        assert_eq!(nodes[0].0.label(), "_");
        assert_eq!(nodes[0].1, None);
        assert_eq!(nodes[1].1, Some(Path::new("shots/b.png")));
    }

    #[test]
    fn test_prune_dangling() {
        let mut graph = SitemapGraph::new();
        graph.record_page(u("/"), set(&["/a", "/b"]));
        graph.record_page(u("/a"), set(&["/b"]));

        let removed: HashSet<CanonicalUrl> = [u("/b")].into_iter().collect();
        graph.prune_dangling(&removed);

        assert_eq!(graph.get(&u("/")).unwrap().outgoing, set(&["/a"]));
        assert!(graph.get(&u("/a")).unwrap().outgoing.is_empty());
    }

    #[test]
    fn test_clean_removes_base_and_edges_to_it() {
        let mut graph = SitemapGraph::new();
        graph.record_page(u("/"), set(&["/a", "/b"]));
        graph.record_page(u("/a"), set(&["/", "/b"]));
        graph.record_page(u("/b"), set(&["/"]));

        let removed = graph.clean(Some(&u("/")), None);

        assert_eq!(removed, vec![u("/")]);
        assert!(!graph.contains(&u("/")));
        assert_eq!(graph.get(&u("/a")).unwrap().outgoing, set(&["/b"]));
        assert!(graph.get(&u("/b")).unwrap().outgoing.is_empty());
        assert_no_dangling(&graph);
    }

    #[test]
    fn test_clean_removes_auth_pages() {
        let mut graph = SitemapGraph::new();
        graph.record_page(u("/"), set(&["/a", "/auth/login"]));
        graph.record_page(u("/a"), set(&["/auth/logout"]));
        graph.record_page(u("/auth/login"), set(&["/"]));

        let removed = graph.clean(None, Some("auth"));

        assert_eq!(removed, vec![u("/auth/login")]);
        assert_eq!(graph.len(), 2);
        assert_eq!(graph.get(&u("/")).unwrap().outgoing, set(&["/a"]));
        // edge to a never-fetched auth URL is dropped too
        assert!(graph.get(&u("/a")).unwrap().outgoing.is_empty());
        assert_no_dangling(&graph);
    }

    #[test]
    fn test_clean_base_and_auth_together() {
        let mut graph = SitemapGraph::new();
        graph.record_page(u("/"), set(&["/a", "/login"]));
        graph.record_page(u("/a"), set(&["/", "/login", "/a"]));
        graph.record_page(u("/login"), set(&["/", "/a"]));

        graph.clean(Some(&u("/")), Some("login"));

        assert_eq!(graph.len(), 1);
        assert_eq!(graph.get(&u("/a")).unwrap().outgoing, set(&["/a"]));
        assert_no_dangling(&graph);
    }

    #[test]
    fn test_clean_without_options_is_noop() {
        let mut graph = SitemapGraph::new();
        graph.record_page(u("/"), set(&["/a"]));
        let removed = graph.clean(None, None);
        assert!(removed.is_empty());
        assert_eq!(graph.edge_count(), 1);
    }

    #[test]
    fn test_set_image_missing_node() {
        let mut graph = SitemapGraph::new();
        assert!(!graph.set_image(&u("/nope"), Some(PathBuf::from("x.png"))));
    }

    #[test]
    fn test_display() {
        let mut graph = SitemapGraph::new();
        graph.record_page(u("/"), set(&["/a"]));
        graph.record_page(u("/a"), set(&[]));
        assert_eq!(graph.to_string(), "{_ -> [a], a -> []}");
    }
}
