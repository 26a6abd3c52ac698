#![allow(clippy::struct_excessive_bools)]
use std::collections::{HashMap, HashSet};
use std::fmt::Display;

use log::warn;
use reqwest::header::HeaderMap;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::epg_error::{config_err, EpgError};
use crate::model::serde_utils::{deserialize_as_string, deserialize_as_string_list, value_to_string};
use crate::processing::url_template::{TOKEN_CHANNEL_ID, TOKEN_CHANNEL_LIST};
use crate::utils::file::config_reader::resolve_env_var;
use crate::utils::network::request::get_request_headers;
use crate::utils::{channel_slug, ServiceTimezone};

pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_CHANNEL_DELIMITER: &str = ",";

const fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

fn default_channel_delimiter() -> String {
    DEFAULT_CHANNEL_DELIMITER.to_string()
}

fn default_timezone() -> String {
    "UTC".to_string()
}

/// A path into a json document. Written as `a.b.c`, `a+b+c` or as a yaml sequence.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct JsonPath {
    segments: Vec<String>,
}

impl JsonPath {
    pub fn parse(path: &str) -> Self {
        Self {
            segments: path.split(['.', '+'])
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
        }
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }
}

impl Display for JsonPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.segments.join("."))
    }
}

impl<'de> Deserialize<'de> for JsonPath {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value: Value = Deserialize::deserialize(deserializer)?;
        let segments = match value {
            Value::Array(items) => items.iter()
                .filter_map(value_to_string)
                .flat_map(|item| Self::parse(&item).segments)
                .collect(),
            other => value_to_string(&other).map(|p| Self::parse(&p).segments).unwrap_or_default(),
        };
        Ok(Self { segments })
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct ChannelConfig {
    #[serde(deserialize_with = "deserialize_as_string")]
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
}

impl ChannelConfig {
    pub fn new(id: &str) -> Self {
        Self { id: id.to_string(), name: None }
    }

    pub fn display_name(&self) -> &str {
        self.name.as_deref().map(str::trim).filter(|n| !n.is_empty()).unwrap_or(self.id.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChannelAddressing {
    /// one request per channel, `IDCANAL` is replaced
    #[default]
    PerChannel,
    /// one request for all channels, `LISTACANAIS` is replaced
    Joined,
}

/// Logical program fields and where to find them inside a program fragment.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct FieldPaths {
    #[serde(default)]
    pub channel: Option<JsonPath>,
    #[serde(default)]
    pub program_title: Option<JsonPath>,
    #[serde(default)]
    pub subtitle: Option<JsonPath>,
    #[serde(default)]
    pub description: Option<JsonPath>,
    #[serde(default)]
    pub start_time: Option<JsonPath>,
    #[serde(default)]
    pub end_time: Option<JsonPath>,
    #[serde(default)]
    pub live: Option<JsonPath>,
    #[serde(default)]
    pub duration: Option<JsonPath>,
    #[serde(default)]
    pub rating: Option<JsonPath>,
    #[serde(default)]
    pub rating_criteria: Option<JsonPath>,
    #[serde(default)]
    pub rating_auto: Option<JsonPath>,
    #[serde(default)]
    pub season: Option<JsonPath>,
    #[serde(default)]
    pub episode: Option<JsonPath>,
    #[serde(default)]
    pub tags: Option<JsonPath>,
    #[serde(default)]
    pub genre: Option<JsonPath>,
}

impl FieldPaths {
    fn prepare(&mut self) {
        for path in [&mut self.channel, &mut self.program_title, &mut self.subtitle, &mut self.description,
            &mut self.start_time, &mut self.end_time, &mut self.live, &mut self.duration, &mut self.rating,
            &mut self.rating_criteria, &mut self.rating_auto, &mut self.season, &mut self.episode,
            &mut self.tags, &mut self.genre] {
            if path.as_ref().is_some_and(JsonPath::is_empty) {
                *path = None;
            }
        }
    }
}

/// Service descriptor, one yaml file per data source.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    pub api_url: String,
    #[serde(default)]
    pub service_name: String,
    #[serde(default)]
    pub headers: HashMap<String, String>,
    #[serde(default)]
    pub channels: Vec<ChannelConfig>,
    #[serde(default, deserialize_with = "deserialize_as_string_list")]
    pub target_channels: Vec<String>,
    #[serde(default)]
    pub api_level_1: Option<JsonPath>,
    #[serde(default)]
    pub api_level_2: Option<JsonPath>,
    #[serde(flatten)]
    pub fields: FieldPaths,
    #[serde(default = "default_timezone")]
    pub timezone: String,
    #[serde(default)]
    pub no_loop: bool,
    #[serde(default)]
    pub use_list_in_url: bool,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_channel_delimiter")]
    pub channel_delimiter: String,
    #[serde(skip)]
    pub t_name: String,
    #[serde(skip)]
    pub t_timezone: ServiceTimezone,
    #[serde(skip)]
    pub t_addressing: ChannelAddressing,
    #[serde(skip)]
    pub t_target_slugs: HashSet<String>,
    #[serde(skip)]
    pub t_headers: HeaderMap,
}

impl ServiceConfig {
    /// Validates the descriptor and derives the `t_` fields. `name` is the descriptor file stem.
    pub fn prepare(&mut self, name: &str) -> Result<(), EpgError> {
        self.t_name = name.to_string();
        self.api_url = self.api_url.trim().to_string();
        if self.api_url.is_empty() {
            return Err(config_err!("service {name}: api_url is missing"));
        }
        if self.service_name.trim().is_empty() {
            self.service_name = name.to_string();
        }
        if self.fields.program_title.as_ref().map_or(true, JsonPath::is_empty) {
            return Err(config_err!("service {name}: program_title path is missing"));
        }
        if self.fields.start_time.as_ref().map_or(true, JsonPath::is_empty) {
            return Err(config_err!("service {name}: start_time path is missing"));
        }
        self.fields.prepare();
        if self.fields.end_time.is_none() && self.fields.duration.is_none() {
            return Err(config_err!("service {name}: either end_time or duration path is required"));
        }
        for level in [&mut self.api_level_1, &mut self.api_level_2] {
            if level.as_ref().is_some_and(JsonPath::is_empty) {
                *level = None;
            }
        }

        self.t_timezone = ServiceTimezone::parse(&self.timezone)
            .ok_or_else(|| config_err!("service {name}: unknown timezone {}", self.timezone))?;

        if self.timeout_secs == 0 {
            return Err(config_err!("service {name}: timeout_secs must be at least 1"));
        }
        if self.channel_delimiter.is_empty() {
            self.channel_delimiter = default_channel_delimiter();
        }

        for channel in &mut self.channels {
            channel.id = channel.id.trim().to_string();
            if channel.id.is_empty() {
                return Err(config_err!("service {name}: channel without id"));
            }
        }

        for value in self.headers.values_mut() {
            *value = resolve_env_var(value);
        }
        self.t_headers = get_request_headers(&self.headers)
            .map_err(|err| config_err!("service {name}: {}", err.message))?;

        self.t_target_slugs = self.target_channels.iter()
            .map(|c| channel_slug(c))
            .filter(|s| !s.is_empty())
            .collect();

        self.t_addressing = if self.use_list_in_url && self.api_url.contains(TOKEN_CHANNEL_LIST) {
            ChannelAddressing::Joined
        } else {
            if self.use_list_in_url {
                warn!("service {name}: use_list_in_url is set but api_url has no {TOKEN_CHANNEL_LIST}, requesting per channel");
            } else if self.api_url.contains(TOKEN_CHANNEL_LIST) && !self.api_url.contains(TOKEN_CHANNEL_ID) {
                warn!("service {name}: api_url contains {TOKEN_CHANNEL_LIST} but use_list_in_url is not set");
            }
            ChannelAddressing::PerChannel
        };
        Ok(())
    }

    /// True when the channel passes the `target_channels` filter.
    pub fn is_target_channel(&self, channel: &str) -> bool {
        self.t_target_slugs.is_empty() || self.t_target_slugs.contains(&channel_slug(channel))
    }

    pub fn has_channel_path(&self) -> bool {
        self.fields.channel.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DESCRIPTOR: &str = r"
api_url: https://api.example.com/epg?date=ANO-MES-DIA&channels=LISTACANAIS
service_name: Example TV
headers:
  User-Agent: epg
channels:
  - id: 101
    name: Globo SP
  - id: sportv
target_channels: Globo SP, SporTV
api_level_1: data.channels
api_level_2: [schedule, items]
channel: channelName
program_title: title
start_time: times+start
duration: duration
timezone: America/Sao_Paulo
use_list_in_url: true
";

    fn prepared(yaml: &str) -> Result<ServiceConfig, EpgError> {
        let mut config: ServiceConfig = serde_yaml::from_str(yaml).unwrap();
        config.prepare("example").map(|()| config)
    }

    #[test]
    fn test_prepare_descriptor() {
        let config = prepared(DESCRIPTOR).unwrap();
        assert_eq!(config.t_name, "example");
        assert_eq!(config.service_name, "Example TV");
        assert_eq!(config.channels[0], ChannelConfig { id: "101".to_string(), name: Some("Globo SP".to_string()) });
        assert_eq!(config.channels[1].display_name(), "sportv");
        assert_eq!(config.api_level_2.as_ref().unwrap().segments(), &["schedule", "items"]);
        assert_eq!(config.fields.start_time.as_ref().unwrap().to_string(), "times.start");
        assert_eq!(config.t_addressing, ChannelAddressing::Joined);
        assert_eq!(config.timeout_secs, DEFAULT_TIMEOUT_SECS);
        assert!(config.is_target_channel("globo sp"));
        assert!(config.is_target_channel("SporTV"));
        assert!(!config.is_target_channel("SporTV 2"));
        assert!(matches!(config.t_timezone, ServiceTimezone::Named(_)));
    }

    #[test]
    fn test_list_flag_without_token_falls_back() {
        let yaml = DESCRIPTOR.replace("LISTACANAIS", "IDCANAL");
        let config = prepared(&yaml).unwrap();
        assert_eq!(config.t_addressing, ChannelAddressing::PerChannel);
    }

    #[test]
    fn test_invalid_descriptors() {
        let err = prepared(&DESCRIPTOR.replace("America/Sao_Paulo", "Nowhere/City")).unwrap_err();
        assert!(err.kind.is_fatal());
        assert!(err.message.contains("timezone"));
        assert!(prepared(&DESCRIPTOR.replace("duration: duration", "")).is_err());
        assert!(prepared(&DESCRIPTOR.replace("program_title: title", "")).is_err());
        assert!(prepared(&format!("{DESCRIPTOR}timeout_secs: 0\n")).is_err());
    }

    #[test]
    fn test_header_env_resolution() {
        std::env::set_var("EPG_GRABBER_TEST_TOKEN", "secret");
        let yaml = DESCRIPTOR.replace("User-Agent: epg", "Authorization: Bearer ${env:EPG_GRABBER_TEST_TOKEN}");
        let config = prepared(&yaml).unwrap();
        assert_eq!(config.headers.get("Authorization").map(String::as_str), Some("Bearer secret"));
        assert_eq!(config.t_headers.get("authorization").and_then(|v| v.to_str().ok()), Some("Bearer secret"));
    }

    #[test]
    fn test_invalid_header_is_rejected_on_load() {
        let err = prepared(&DESCRIPTOR.replace("User-Agent: epg", "\"bad header\": x")).unwrap_err();
        assert!(err.kind.is_fatal());
        assert!(err.message.contains("bad header"));
    }
}
