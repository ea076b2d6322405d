pub mod auth;
pub mod canonical;
pub mod crawler;
pub mod error;
pub mod filter;
pub mod graph;
pub mod result;

pub use auth::CookieJar;
pub use canonical::{CanonicalUrl, UrlNormalizer};
pub use crawler::{CrawlConfig, CrawlState, Crawler, ProgressCallback};
pub use error::{Result, ScanError};
pub use filter::UrlFilter;
pub use graph::{PageRecord, SitemapGraph};
pub use result::{CrawlOutput, CrawlStats};
