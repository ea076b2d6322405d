use crate::error::{Result, ScanError};
use reqwest::Client;
use serde_json::{Map, Value};
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

/// Cookies captured from the login response, in the order they were set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CookieJar {
    cookies: Vec<(String, String)>,
}

impl CookieJar {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a cookie, replacing the value of an existing cookie of the same name.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.cookies.iter_mut().find(|(n, _)| *n == name) {
            Some(existing) => existing.1 = value,
            None => self.cookies.push((name, value)),
        }
    }

    pub fn len(&self) -> usize {
        self.cookies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cookies.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.cookies.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    /// Value for a `Cookie` request header, or `None` when the jar is empty.
    pub fn header_value(&self) -> Option<String> {
        if self.cookies.is_empty() {
            return None;
        }
        Some(self.to_pairs().join("; "))
    }

    /// `name=value` strings, the form the screenshot renderer takes.
    pub fn to_pairs(&self) -> Vec<String> {
        self.cookies
            .iter()
            .map(|(name, value)| format!("{}={}", name, value))
            .collect()
    }
}

/// Flattens a JSON object into form fields. Strings are sent verbatim, other
/// scalars in their JSON spelling.
pub fn payload_to_form(payload: &Map<String, Value>) -> Vec<(String, String)> {
    payload
        .iter()
        .map(|(key, value)| {
            let value = match value {
                Value::String(s) => s.clone(),
                Value::Null => String::new(),
                other => other.to_string(),
            };
            (key.clone(), value)
        })
        .collect()
}

/// Performs the single login POST and returns the cookies it set.
///
/// Redirects are not followed so cookies set on a `302` to the landing page
/// are kept. A non-success status is logged but still yields the jar.
pub async fn login(
    auth_url: &Url,
    payload: &Map<String, Value>,
    timeout: Duration,
) -> Result<CookieJar> {
    info!("Authenticating against {}", auth_url);

    let client = Client::builder()
        .timeout(timeout)
        .redirect(reqwest::redirect::Policy::none())
        .build()?;

    let response = client
        .post(auth_url.clone())
        .form(&payload_to_form(payload))
        .send()
        .await
        .map_err(|e| ScanError::AuthError(format!("POST {} failed: {}", auth_url, e)))?;

    let status = response.status();
    debug!("Authentication response: {}", status);
    if !(status.is_success() || status.is_redirection()) {
        warn!("Authentication returned HTTP {}", status);
    }

    let mut jar = CookieJar::new();
    for cookie in response.cookies() {
        jar.insert(cookie.name(), cookie.value());
    }
    info!("Authentication stored {} cookie(s)", jar.len());

    Ok(jar)
}
