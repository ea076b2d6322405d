//! Page screenshots used as node images.
//!
//! Rendering is strictly sequential: one page is rendered to a file before
//! the next one starts, and a failed page never stops the remaining ones.

use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::network::CookieParam;
use chromiumoxide::page::ScreenshotParams;
use crate::logging::spawn_logged;
use futures::StreamExt;
use sitegraph_scanner::{CanonicalUrl, SitemapGraph};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

pub const DEFAULT_SCREENSHOT_DIR: &str = "screenshots";

const WINDOW_WIDTH: u32 = 1024;
const WINDOW_HEIGHT: u32 = 768;

#[derive(Error, Debug)]
pub enum ScreenshotError {
    #[error("Failed to launch browser: {0}")]
    Launch(String),

    #[error("Failed to render {url}: {reason}")]
    Render { url: String, reason: String },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Renders one URL to a PNG file.
#[allow(async_fn_in_trait)]
pub trait PageRenderer {
    async fn render(
        &self,
        url: &CanonicalUrl,
        cookies: &[String],
        output: &Path,
    ) -> Result<(), ScreenshotError>;
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CaptureStats {
    pub captured: usize,
    pub failed: usize,
    pub skipped: usize,
}

/// Assigns `<dir>/<label>.png` to graph nodes and renders them.
#[derive(Debug, Clone)]
pub struct Screenshotter {
    dir: PathBuf,
    skip: Option<String>,
}

impl Screenshotter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            skip: None,
        }
    }

    /// Pages whose URL contains `skip` get no screenshot.
    pub fn with_skip(mut self, skip: Option<String>) -> Self {
        self.skip = skip.filter(|s| !s.is_empty());
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn image_path(&self, url: &CanonicalUrl) -> PathBuf {
        self.dir.join(format!("{}.png", url.label()))
    }

    /// Every eligible node gets its image path first, then pages are
    /// rendered one by one. A page that fails to render has its image
    /// cleared again.
    pub async fn capture<R: PageRenderer>(
        &self,
        graph: &mut SitemapGraph,
        cookies: &[String],
        renderer: &R,
    ) -> Result<CaptureStats, ScreenshotError> {
        tokio::fs::create_dir_all(&self.dir).await?;

        let mut stats = CaptureStats::default();
        let mut targets = Vec::new();
        for url in graph.keys() {
            if let Some(ref skip) = self.skip
                && url.contains(skip)
            {
                debug!("Skip screenshot: {}", url);
                stats.skipped += 1;
                continue;
            }
            targets.push((url.clone(), self.image_path(url)));
        }

        for (url, path) in &targets {
            graph.set_image(url, Some(path.clone()));
        }

        for (url, path) in targets {
            info!("Screenshot {} -> {}", url, path.display());
            match renderer.render(&url, cookies, &path).await {
                Ok(()) => stats.captured += 1,
                Err(e) => {
                    warn!("Screenshot failed for {}: {}", url, e);
                    graph.set_image(&url, None);
                    stats.failed += 1;
                }
            }
        }

        info!(
            captured = stats.captured,
            failed = stats.failed,
            skipped = stats.skipped,
            "Screenshots complete"
        );
        Ok(stats)
    }
}

/// Headless Chromium driven over the DevTools protocol.
pub struct ChromiumRenderer {
    browser: Browser,
    handler: JoinHandle<()>,
}

impl ChromiumRenderer {
    pub async fn launch() -> Result<Self, ScreenshotError> {
        let config = BrowserConfig::builder()
            .no_sandbox()
            .window_size(WINDOW_WIDTH, WINDOW_HEIGHT)
            .arg("--disable-gpu")
            .arg("--disable-dev-shm-usage")
            .build()
            .map_err(ScreenshotError::Launch)?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| ScreenshotError::Launch(e.to_string()))?;

        let handler = spawn_logged(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!("Browser event error: {}", e);
                }
            }
        });

        info!("Browser renderer initialized");
        Ok(Self { browser, handler })
    }

    pub async fn shutdown(mut self) {
        if let Err(e) = self.browser.close().await {
            warn!("Failed to close browser: {}", e);
        }
        if let Err(e) = self.browser.wait().await {
            debug!("Failed to wait for browser exit: {}", e);
        }
        self.handler.abort();
    }
}

impl PageRenderer for ChromiumRenderer {
    async fn render(
        &self,
        url: &CanonicalUrl,
        cookies: &[String],
        output: &Path,
    ) -> Result<(), ScreenshotError> {
        let render_error = |reason: String| ScreenshotError::Render {
            url: url.to_string(),
            reason,
        };

        let page = self
            .browser
            .new_page("about:blank")
            .await
            .map_err(|e| render_error(e.to_string()))?;

        let result = async {
            let params = cookie_params(url, cookies).map_err(render_error)?;
            if !params.is_empty() {
                page.set_cookies(params)
                    .await
                    .map_err(|e| render_error(e.to_string()))?;
            }

            page.goto(url.as_str())
                .await
                .map_err(|e| render_error(e.to_string()))?;
            page.wait_for_navigation()
                .await
                .map_err(|e| render_error(e.to_string()))?;

            let params = ScreenshotParams::builder().full_page(true).build();
            page.save_screenshot(params, output)
                .await
                .map_err(|e| render_error(e.to_string()))?;
            Ok(())
        }
        .await;

        if let Err(e) = page.close().await {
            debug!("Failed to close page for {}: {}", url, e);
        }
        result
    }
}

/// Turns `name=value` strings into cookies scoped to the page URL. Entries
/// without `=` are ignored.
fn cookie_params(url: &CanonicalUrl, cookies: &[String]) -> Result<Vec<CookieParam>, String> {
    cookies
        .iter()
        .filter_map(|cookie| cookie.split_once('='))
        .map(|(name, value)| {
            CookieParam::builder()
                .name(name)
                .value(value)
                .url(url.as_str())
                .build()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use sitegraph_scanner::UrlNormalizer;
    use url::Url;

    fn url(path: &str) -> CanonicalUrl {
        UrlNormalizer::new(Url::parse("http://x.test/").unwrap(), false)
            .normalize(path)
            .unwrap()
    }

    #[test]
    fn test_image_path_uses_label() {
        let shots = Screenshotter::new("shots");
        assert_eq!(shots.image_path(&url("/")), PathBuf::from("shots/_.png"));
        assert_eq!(
            shots.image_path(&url("/docs/intro/")),
            PathBuf::from("shots/docs_intro.png")
        );
    }

    #[test]
    fn test_cookie_params() {
        let params = cookie_params(
            &url("/a"),
            &["session=abc".to_string(), "broken".to_string(), "t=a=b".to_string()],
        )
        .unwrap();

        assert_eq!(params.len(), 2);
        assert_eq!(params[0].name, "session");
        assert_eq!(params[0].value, "abc");
        assert_eq!(params[1].value, "a=b");
        assert_eq!(params[0].url.as_deref(), Some("http://x.test/a"));
    }

    #[test]
    fn test_empty_skip_ignored() {
        let shots = Screenshotter::new("shots").with_skip(Some(String::new()));
        assert!(shots.skip.is_none());
    }
}
