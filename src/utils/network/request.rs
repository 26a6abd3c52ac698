use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::LazyLock;
use std::time::{Duration, Instant};

use log::{log_enabled, trace, Level};
use regex::Regex;
use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde_json::Value;
use url::Url;

use crate::epg_error::{config_err, create_epg_error, create_epg_error_result, EpgError, EpgErrorKind};
use crate::utils::debug_if_enabled;
use crate::utils::file::file_utils::get_file_path;

const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

static USERNAME_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(username=)[^&]*").unwrap());
static PASSWORD_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(password=)[^&]*").unwrap());
static TOKEN_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"((?:api_?key|token)=)[^&]*").unwrap());

/// Masks credentials carried in query strings before they reach the log.
pub fn sanitize_sensitive_info(query: &str) -> String {
    let masked_query = USERNAME_REGEX.replace_all(query, "$1***");
    let masked_query = PASSWORD_REGEX.replace_all(&masked_query, "$1***");
    let masked_query = TOKEN_REGEX.replace_all(&masked_query, "$1***");
    masked_query.to_string()
}

pub fn create_client(timeout_secs: u64) -> Result<Client, EpgError> {
    Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .user_agent(USER_AGENT)
        .build()
        .map_err(|err| config_err!("cant create http client: {}", err))
}

pub fn get_request_headers(defined_headers: &HashMap<String, String>) -> Result<HeaderMap, EpgError> {
    let mut headers = HeaderMap::new();
    for (key, value) in defined_headers {
        let name = HeaderName::from_bytes(key.as_bytes())
            .map_err(|err| config_err!("invalid header name {key}: {err}"))?;
        let value = HeaderValue::from_bytes(value.as_bytes())
            .map_err(|err| config_err!("invalid value for header {key}: {err}"))?;
        headers.insert(name, value);
    }
    if log_enabled!(Level::Trace) && !headers.is_empty() {
        let keys: Vec<&str> = headers.keys().map(HeaderName::as_str).collect();
        trace!("Request headers {keys:?}");
    }
    Ok(headers)
}

fn get_remote_content(client: &Client, headers: &HeaderMap, url: &Url) -> Result<String, EpgError> {
    let start_time = Instant::now();
    let response = client.get(url.clone()).headers(headers.clone()).send()
        .map_err(|err| {
            let reason = if err.is_timeout() { "timed out".to_string() } else { err.to_string() };
            create_epg_error!(EpgErrorKind::Fetch, "request failed {} {}", sanitize_sensitive_info(url.as_str()), sanitize_sensitive_info(&reason))
        })?;
    let status = response.status();
    if !status.is_success() {
        return create_epg_error_result!(EpgErrorKind::Fetch, "request failed with status {} {}", status, sanitize_sensitive_info(url.as_str()));
    }
    let content = response.text()
        .map_err(|err| create_epg_error!(EpgErrorKind::Fetch, "failed to read response {} {}", sanitize_sensitive_info(url.as_str()), err))?;
    debug_if_enabled!("Request took: {}ms {}", start_time.elapsed().as_millis(), sanitize_sensitive_info(url.as_str()));
    Ok(content)
}

fn get_local_file_content(file_path: &PathBuf) -> Result<String, EpgError> {
    if file_path.is_file() {
        fs::read_to_string(file_path)
            .map_err(|err| create_epg_error!(EpgErrorKind::Fetch, "cant read file {}: {}", file_path.to_string_lossy(), err))
    } else {
        create_epg_error_result!(EpgErrorKind::Fetch, "cant find file {}", file_path.to_string_lossy())
    }
}

/// Fetches `url_str` and parses the body as json. Anything that is not an `http(s)` url
/// is read from the local filesystem.
pub fn get_json_content(client: &Client, headers: &HeaderMap, url_str: &str) -> Result<Value, EpgError> {
    debug_if_enabled!("getting json content from {}", sanitize_sensitive_info(url_str));
    let content = match Url::parse(url_str) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => get_remote_content(client, headers, &url)?,
        Ok(url) if url.scheme() == "file" => match url.to_file_path() {
            Ok(path) => get_local_file_content(&path)?,
            Err(()) => return create_epg_error_result!(EpgErrorKind::Fetch, "unknown file {}", sanitize_sensitive_info(url_str)),
        },
        _ => match get_file_path(".", Some(PathBuf::from(url_str))) {
            Some(path) => get_local_file_content(&path)?,
            None => return create_epg_error_result!(EpgErrorKind::Fetch, "cant read input {}", sanitize_sensitive_info(url_str)),
        },
    };
    serde_json::from_str::<Value>(&content)
        .map_err(|err| create_epg_error!(EpgErrorKind::Parse, "failed to parse json from {}: {}", sanitize_sensitive_info(url_str), err))
}
