// Validation of user supplied settings, before any network activity

use serde_json::{Map, Value};
use std::path::PathBuf;
use thiserror::Error;
use url::Url;

#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("--auth-payload needs to be set if --auth-url is used")]
    MissingAuthPayload,

    #[error("Invalid auth payload: {0}")]
    InvalidAuthPayload(String),

    #[error("Invalid URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },
}

/// Login endpoint and the form fields posted to it.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthSettings {
    pub url: Url,
    pub payload: Map<String, Value>,
}

/// Parses the crawl root. A trailing `/` is appended when missing so the
/// root itself is the `_` node.
pub fn parse_base_url(raw: &str) -> Result<Url, ConfigError> {
    let raw = raw.trim();
    let with_slash = if raw.ends_with('/') {
        raw.to_string()
    } else {
        format!("{}/", raw)
    };

    let url = parse_http_url(&with_slash)?;
    if url.host_str().is_none() {
        return Err(ConfigError::InvalidUrl {
            url: raw.to_string(),
            reason: "missing host".to_string(),
        });
    }
    Ok(url)
}

/// Checks the auth flag combination and decodes the JSON payload.
///
/// A payload without an auth URL is ignored.
pub fn parse_auth(
    auth_url: Option<&str>,
    auth_payload: Option<&str>,
) -> Result<Option<AuthSettings>, ConfigError> {
    let Some(auth_url) = auth_url else {
        return Ok(None);
    };
    let Some(auth_payload) = auth_payload else {
        return Err(ConfigError::MissingAuthPayload);
    };

    let url = parse_http_url(auth_url)?;
    let payload = parse_payload(auth_payload)?;
    Ok(Some(AuthSettings { url, payload }))
}

/// Payload must be a flat JSON object, e.g. `{"username": "foo", "password": "bar"}`.
pub fn parse_payload(raw: &str) -> Result<Map<String, Value>, ConfigError> {
    let value: Value = serde_json::from_str(raw)
        .map_err(|e| ConfigError::InvalidAuthPayload(e.to_string()))?;

    let Value::Object(map) = value else {
        return Err(ConfigError::InvalidAuthPayload(
            "expected a JSON object".to_string(),
        ));
    };

    if let Some((key, _)) = map
        .iter()
        .find(|(_, v)| matches!(v, Value::Array(_) | Value::Object(_)))
    {
        return Err(ConfigError::InvalidAuthPayload(format!(
            "field '{}' is not a scalar",
            key
        )));
    }

    Ok(map)
}

/// Expands a leading `~` in user supplied paths.
pub fn expand_path(raw: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(raw).as_ref())
}

fn parse_http_url(raw: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(raw).map_err(|e| ConfigError::InvalidUrl {
        url: raw.to_string(),
        reason: e.to_string(),
    })?;

    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(ConfigError::InvalidUrl {
            url: raw.to_string(),
            reason: format!("unsupported scheme '{}'", other),
        }),
    }
}
