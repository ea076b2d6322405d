pub mod config;
pub mod crawl;
pub mod logging;
pub mod render;
pub mod screenshot;

pub use config::{AuthSettings, ConfigError};
pub use crawl::{CrawlOptions, CrawlSession, ScreenshotSettings, execute_crawl};
pub use logging::RunLog;
pub use render::{DotStyle, render_dot};
pub use screenshot::{CaptureStats, ChromiumRenderer, PageRenderer, ScreenshotError, Screenshotter};
