use crate::config::AuthSettings;
use crate::render::{DotStyle, render_dot};
use crate::screenshot::{CaptureStats, ChromiumRenderer, PageRenderer, Screenshotter};
use indicatif::{ProgressBar, ProgressStyle};
use sitegraph_scanner::auth::login;
use sitegraph_scanner::{
    CanonicalUrl, CookieJar, CrawlConfig, CrawlOutput, Crawler, ProgressCallback, ScanError,
    SitemapGraph,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// Options for a full run: login, crawl and optional screenshots
#[derive(Debug, Clone)]
pub struct CrawlOptions {
    pub crawl: CrawlConfig,
    pub auth: Option<AuthSettings>,
    pub screenshots: Option<ScreenshotSettings>,
    pub log_file: PathBuf,
    pub show_progress_bars: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScreenshotSettings {
    pub dir: PathBuf,
    pub skip: Option<String>,
}

impl ScreenshotSettings {
    pub fn screenshotter(&self) -> Screenshotter {
        Screenshotter::new(&self.dir).with_skip(self.skip.clone())
    }
}

/// What a crawl leaves behind for the screenshot and output stages
#[derive(Debug)]
pub struct CrawlSession {
    pub output: CrawlOutput,
    pub cookies: CookieJar,
}

fn spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    let style = ProgressStyle::default_spinner()
        .template("{spinner:.cyan} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner());
    pb.set_style(style);
    pb.enable_steady_tick(Duration::from_millis(100));
    pb.set_message(message.to_string());
    pb
}

/// Logs in when auth is configured, then crawls the site.
///
/// A failed login aborts the run since an anonymous crawl of an
/// authenticated site would produce a misleading map.
pub async fn execute_crawl(options: &CrawlOptions) -> Result<CrawlSession, ScanError> {
    let progress_bar = options
        .show_progress_bars
        .then(|| Arc::new(spinner("Starting crawl...")));

    let cookies = match options.auth {
        Some(ref auth) => {
            if let Some(ref pb) = progress_bar {
                pb.set_message(format!("Authenticating against {}", auth.url));
            }
            match login(&auth.url, &auth.payload, options.crawl.timeout).await {
                Ok(jar) => jar,
                Err(e) => {
                    if let Some(ref pb) = progress_bar {
                        pb.finish_and_clear();
                    }
                    return Err(e);
                }
            }
        }
        None => CookieJar::new(),
    };

    let mut crawler = Crawler::new(options.crawl.clone())?.with_cookies(&cookies);

    if let Some(ref pb) = progress_bar {
        let pb = pb.clone();
        let callback: ProgressCallback = Arc::new(move |count: usize, url: &CanonicalUrl| {
            pb.set_message(format!("Crawling... [{}] {}", count, url.path()));
        });
        crawler = crawler.with_progress_callback(callback);
    }

    let result = crawler.crawl().await;

    if let Some(ref pb) = progress_bar {
        match result {
            Ok(ref output) => pb.finish_with_message(format!(
                "Crawl complete! {} pages, {} links",
                output.graph.len(),
                output.graph.edge_count()
            )),
            Err(_) => pb.finish_and_clear(),
        }
    }

    let output = result?;
    info!(
        pages = output.graph.len(),
        edges = output.graph.edge_count(),
        fetched = output.stats.pages_fetched,
        failures = output.stats.fetch_failures,
        "Crawl finished"
    );

    Ok(CrawlSession { output, cookies })
}

/// Captures screenshots with headless Chromium. Browser startup problems are
/// logged and leave every node without an image; they never fail the run.
pub async fn capture_screenshots(
    graph: &mut SitemapGraph,
    settings: &ScreenshotSettings,
    cookies: &CookieJar,
    show_progress_bars: bool,
) -> Option<CaptureStats> {
    let renderer = match ChromiumRenderer::launch().await {
        Ok(renderer) => renderer,
        Err(e) => {
            warn!("Screenshots disabled: {}", e);
            return None;
        }
    };

    let stats = capture_with(graph, settings, cookies, &renderer, show_progress_bars).await;
    renderer.shutdown().await;
    stats
}

/// Runs the capture stage with any renderer.
pub async fn capture_with<R: PageRenderer>(
    graph: &mut SitemapGraph,
    settings: &ScreenshotSettings,
    cookies: &CookieJar,
    renderer: &R,
    show_progress_bars: bool,
) -> Option<CaptureStats> {
    let progress_bar =
        show_progress_bars.then(|| spinner(&format!("Capturing {} screenshots...", graph.len())));

    let result = settings
        .screenshotter()
        .capture(graph, &cookies.to_pairs(), renderer)
        .await;

    match result {
        Ok(stats) => {
            if let Some(pb) = progress_bar {
                pb.finish_with_message(format!(
                    "Screenshots complete! {} captured, {} failed",
                    stats.captured, stats.failed
                ));
            }
            Some(stats)
        }
        Err(e) => {
            if let Some(pb) = progress_bar {
                pb.finish_and_clear();
            }
            error!("Screenshot stage failed: {}", e);
            None
        }
    }
}

/// DOT text for the crawled site
pub fn generate_sitemap_dot(graph: &SitemapGraph, screenshots: bool) -> String {
    render_dot(graph, &DotStyle::sitemap(screenshots))
}
