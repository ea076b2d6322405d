use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Malformed URL '{0}'")]
    MalformedUrl(String),

    #[error("URL outside the crawl origin: {0}")]
    OutOfScope(String),

    #[error("Failed to fetch {url}: {reason}")]
    FetchFailure { url: String, reason: String },

    #[error("Authentication failed: {0}")]
    AuthError(String),

    #[error("Crawler has already run to completion")]
    CrawlFinished,
}

impl ScanError {
    /// Errors that only drop a single link rather than failing anything.
    pub fn is_filtered_link(&self) -> bool {
        matches!(self, ScanError::MalformedUrl(_) | ScanError::OutOfScope(_))
    }
}

pub type Result<T> = std::result::Result<T, ScanError>;
