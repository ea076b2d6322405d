use crate::auth::CookieJar;
use crate::canonical::{CanonicalUrl, UrlNormalizer};
use crate::error::{Result, ScanError};
use crate::filter::{UrlFilter, dedupe, extract_links};
use crate::graph::SitemapGraph;
use crate::result::{CrawlOutput, CrawlStats};
use indexmap::IndexSet;
use reqwest::Client;
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tracing::{Instrument, debug, info, info_span, warn};
use url::Url;

/// Called before each fetch with the 1-based request count and the URL.
pub type ProgressCallback = Arc<dyn Fn(usize, &CanonicalUrl) + Send + Sync>;

const DEFAULT_TIMEOUT_SECS: u64 = 10;
const MAX_REDIRECTS: usize = 10;

/// Crawl settings. Substring filters are matched against raw URLs.
#[derive(Debug, Clone)]
pub struct CrawlConfig {
    pub base_url: Url,
    pub fold_ids: bool,
    pub skip_self: bool,
    pub skip_base: bool,
    pub skip_base_back: bool,
    pub skip_auth: Option<String>,
    pub skip_download: Option<String>,
    pub max_depth: Option<usize>,
    pub timeout: Duration,
}

impl CrawlConfig {
    pub fn new(base_url: Url) -> Self {
        Self {
            base_url,
            fold_ids: false,
            skip_self: false,
            skip_base: false,
            skip_base_back: false,
            skip_auth: None,
            skip_download: None,
            max_depth: None,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }

    pub fn with_fold_ids(mut self, fold_ids: bool) -> Self {
        self.fold_ids = fold_ids;
        self
    }

    pub fn with_skip_self(mut self, skip_self: bool) -> Self {
        self.skip_self = skip_self;
        self
    }

    pub fn with_skip_base(mut self, skip_base: bool) -> Self {
        self.skip_base = skip_base;
        self
    }

    pub fn with_skip_base_back(mut self, skip_base_back: bool) -> Self {
        self.skip_base_back = skip_base_back;
        self
    }

    pub fn with_skip_auth(mut self, skip_auth: Option<String>) -> Self {
        self.skip_auth = skip_auth.filter(|s| !s.is_empty());
        self
    }

    pub fn with_skip_download(mut self, skip_download: Option<String>) -> Self {
        self.skip_download = skip_download.filter(|s| !s.is_empty());
        self
    }

    pub fn with_max_depth(mut self, max_depth: Option<usize>) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrawlState {
    Idle,
    Running,
    Draining,
    Done,
}

/// FIFO of pending URLs with O(1) membership.
#[derive(Default)]
struct Frontier {
    queue: VecDeque<(CanonicalUrl, usize)>,
    queued: HashSet<CanonicalUrl>,
}

impl Frontier {
    fn push(&mut self, url: CanonicalUrl, depth: usize) {
        if self.queued.insert(url.clone()) {
            self.queue.push_back((url, depth));
        }
    }

    fn pop(&mut self) -> Option<(CanonicalUrl, usize)> {
        let (url, depth) = self.queue.pop_front()?;
        self.queued.remove(&url);
        Some((url, depth))
    }

    fn pending(&self) -> Vec<&str> {
        self.queue.iter().map(|(url, _)| url.as_str()).collect()
    }
}

struct FetchedPage {
    final_url: Url,
    body: Option<String>,
}

/// Sequential breadth-first crawler confined to the base URL's origin.
///
/// One fetch completes before the next URL is popped, so the frontier and
/// the graph need no locking. A crawler runs once: `crawl` on a crawler that
/// has left `Idle` returns [`ScanError::CrawlFinished`].
pub struct Crawler {
    client: Client,
    config: CrawlConfig,
    filter: UrlFilter,
    base: CanonicalUrl,
    cookie_header: Option<String>,
    state: CrawlState,
    progress_callback: Option<ProgressCallback>,
}

impl Crawler {
    pub fn new(config: CrawlConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("sitegraph/", env!("CARGO_PKG_VERSION")))
            .timeout(config.timeout)
            .connect_timeout(config.timeout)
            .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
            .build()?;

        let normalizer = UrlNormalizer::new(config.base_url.clone(), config.fold_ids);
        let filter = UrlFilter::new(normalizer)
            .with_skip_auth(config.skip_auth.clone())
            .with_skip_self(config.skip_self)
            .with_skip_base_back(config.skip_base_back);
        let base = filter.base().clone();

        Ok(Self {
            client,
            config,
            filter,
            base,
            cookie_header: None,
            state: CrawlState::Idle,
            progress_callback: None,
        })
    }

    /// Sends the given cookies with every GET.
    pub fn with_cookies(mut self, cookies: &CookieJar) -> Self {
        self.cookie_header = cookies.header_value();
        self
    }

    pub fn with_progress_callback(mut self, callback: ProgressCallback) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    pub fn state(&self) -> CrawlState {
        self.state
    }

    pub fn base(&self) -> &CanonicalUrl {
        &self.base
    }

    pub fn config(&self) -> &CrawlConfig {
        &self.config
    }

    pub async fn crawl(&mut self) -> Result<CrawlOutput> {
        if self.state != CrawlState::Idle {
            return Err(ScanError::CrawlFinished);
        }
        let span = info_span!("crawl", base = %self.base);
        self.run().instrument(span).await
    }

    async fn run(&mut self) -> Result<CrawlOutput> {
        self.state = CrawlState::Running;
        info!("Starting crawl of {}", self.base);

        let mut graph = SitemapGraph::new();
        let mut stats = CrawlStats::default();
        let mut frontier = Frontier::default();
        frontier.push(self.base.clone(), 0);

        while let Some((url, depth)) = frontier.pop() {
            if let Some(skip) = self.config.skip_download.as_deref()
                && url.contains(skip)
            {
                debug!("Skip URL: {}", url);
                stats.skipped_downloads += 1;
                continue;
            }

            // A redirect target may have been recorded after it was queued.
            if graph.contains(&url) {
                debug!("Already recorded: {}", url);
                continue;
            }

            debug!("Request URL: {}", url);
            debug!("Remaining URLs: {:?}", frontier.pending());
            debug!(
                "Visited URLs: {:?}",
                graph.keys().map(|k| k.as_str()).collect::<Vec<_>>()
            );

            if let Some(ref callback) = self.progress_callback {
                callback(stats.pages_fetched + stats.fetch_failures + 1, &url);
            }

            let page = match self.fetch(&url).await {
                Ok(page) => page,
                Err(e) => {
                    warn!("Crawl error for {}: {}", url, e);
                    stats.fetch_failures += 1;
                    graph.record_page(url, IndexSet::new());
                    continue;
                }
            };
            stats.pages_fetched += 1;
            debug!("Response URL: {}", page.final_url);

            let page_key = match self.filter.normalizer().in_scope(page.final_url) {
                Ok(key) => key,
                Err(e) => {
                    warn!("Redirect from {} left the site: {}", url, e);
                    graph.record_page(url, IndexSet::new());
                    continue;
                }
            };

            if page_key != url {
                debug!("Redirect {} -> {}", url, page_key);
                stats.redirects += 1;
                graph.record_page(url.clone(), IndexSet::from([page_key.clone()]));
            }

            let hrefs = page.body.as_deref().map(extract_links).unwrap_or_default();
            let candidates = self.filter.filter_candidates(&hrefs);
            debug!(
                "Complete URLs: {:?}",
                candidates.iter().map(|c| c.as_str()).collect::<Vec<_>>()
            );

            let outgoing = self.filter.outgoing(&candidates, &page_key);
            graph.record_page(page_key, outgoing);

            if self.config.max_depth.is_some_and(|max| depth >= max) {
                debug!("Depth limit reached at {}", url);
                continue;
            }

            let fresh = dedupe(&candidates, &frontier.queued, &graph);
            info!(
                "Selected URLs: {:?}",
                fresh.iter().map(|u| u.as_str()).collect::<Vec<_>>()
            );
            for next in fresh {
                frontier.push(next, depth + 1);
            }
        }

        self.state = CrawlState::Draining;
        info!("Sitemap: {}", graph);

        let skip_base = self.config.skip_base.then_some(&self.base);
        let removed = graph.clean(skip_base, self.config.skip_auth.as_deref());
        if !removed.is_empty() {
            debug!(
                "Removed after crawl: {:?}",
                removed.iter().map(|k| k.as_str()).collect::<Vec<_>>()
            );
        }
        stats.removed_in_clean = removed.len();

        self.state = CrawlState::Done;
        info!(
            pages = stats.pages_fetched,
            failures = stats.fetch_failures,
            nodes = graph.len(),
            edges = graph.edge_count(),
            "Crawl complete"
        );

        Ok(CrawlOutput::new(graph, stats))
    }

    async fn fetch(&self, url: &CanonicalUrl) -> Result<FetchedPage> {
        let fetch_error = |reason: String| ScanError::FetchFailure {
            url: url.to_string(),
            reason,
        };

        let mut request = self.client.get(url.raw().clone());
        if let Some(ref cookie) = self.cookie_header {
            request = request.header(reqwest::header::COOKIE, cookie);
        }

        let response = request.send().await.map_err(|e| fetch_error(e.to_string()))?;
        let status = response.status();
        debug!("Response: {} {}", status, response.url());

        if !status.is_success() {
            return Err(fetch_error(format!("HTTP {}", status)));
        }

        let final_url = response.url().clone();
        let is_html = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|ct| ct.contains("html"))
            .unwrap_or(true);

        let body = if is_html {
            Some(response.text().await.map_err(|e| fetch_error(e.to_string()))?)
        } else {
            debug!("Not parsing non-HTML response from {}", final_url);
            None
        };

        Ok(FetchedPage { final_url, body })
    }
}
