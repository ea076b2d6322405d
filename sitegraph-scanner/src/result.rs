use crate::graph::SitemapGraph;
use serde::Serialize;

/// Counters collected while crawling.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CrawlStats {
    pub pages_fetched: usize,
    pub fetch_failures: usize,
    pub skipped_downloads: usize,
    pub redirects: usize,
    pub removed_in_clean: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct CrawlOutput {
    pub graph: SitemapGraph,
    pub stats: CrawlStats,
}

impl CrawlOutput {
    pub fn new(graph: SitemapGraph, stats: CrawlStats) -> Self {
        Self { graph, stats }
    }
}
