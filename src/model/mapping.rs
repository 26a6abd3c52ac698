use std::collections::HashMap;

use regex::Regex;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::epg_error::{config_err, EpgError};
use crate::model::serde_utils::{deserialize_as_string_list, value_to_string};
use crate::utils::channel_slug;

/// Source rating codes and what they mean on the Brazilian scale.
const DEFAULT_RATINGS: &[(&str, &str)] = &[
    ("L", "L"), ("AL", "AL"), ("1", "L"),
    ("10", "10"), ("12", "12"), ("14", "14"), ("16", "16"), ("18", "18"),
    ("AGE84", "L"), ("4+", "L"),
    ("AGE85", "10"), ("5+", "10"),
    ("AGE105", "12"), ("6+", "12"),
    ("AGE87", "14"), ("7+", "14"),
    ("AGE86", "16"), ("8+", "16"),
    ("AGE89", "18"), ("9+", "18"),
];

pub const UNRATED_VALUES: &[&str] = &["SC", "S/C", "AGE215", "Sem Classificação", "no rating"];

const DEFAULT_LIVE_PATTERNS: &[&str] = &[r"-\s*ao vivo\b", r"-\s*vivo\b", r"\bao vivo$"];
const DEFAULT_LIVE_TAGS: &[&str] = &["ao vivo", "aovivo", "live"];
const DEFAULT_PREMIERE_PATTERNS: &[&str] = &[r"-\s*inédito\b", r"\binédito$", r"-\s*estreia\b"];
const DEFAULT_PREMIERE_TAGS: &[&str] = &["inédito", "estreia", "premiere"];
const DEFAULT_RERUN_PATTERNS: &[&str] = &[r"^VT\s*-\s*", r"\s-\s*VT$", r"-\s*reprise\b", r"-\s*reapresentação\b", r"\bretrô\b"];
const DEFAULT_RERUN_TAGS: &[&str] = &["reprise", "reapresentação", "vt", "rerun"];
const DEFAULT_LIVE_GENRE: &str = "live broadcast";
const DEFAULT_REPLAY_CHANNELS: &[&str] = &["sportv", "premiere", "combate", "ge-tv", "band-sports", "espn"];

fn to_strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| (*v).to_string()).collect()
}

/// Formatted name and optional genre. Written as `[name, genre]` or as a plain name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappingEntry {
    pub name: String,
    pub genre: Option<String>,
}

impl<'de> Deserialize<'de> for MappingEntry {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value: Value = Deserialize::deserialize(deserializer)?;
        let (name, genre) = match &value {
            Value::Array(items) => (
                items.first().and_then(value_to_string),
                items.get(1).and_then(value_to_string),
            ),
            other => (value_to_string(other), None),
        };
        match name.map(|n| n.trim().to_string()).filter(|n| !n.is_empty()) {
            Some(name) => Ok(Self { name, genre: genre.map(|g| g.trim().to_string()).filter(|g| !g.is_empty()) }),
            None => Err(serde::de::Error::custom(format!("mapping entry without name: {value}"))),
        }
    }
}

/// Title patterns (case-insensitive regex) and tags that mark a broadcast kind.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct MarkerRule {
    #[serde(default, deserialize_with = "deserialize_as_string_list")]
    pub patterns: Vec<String>,
    #[serde(default, deserialize_with = "deserialize_as_string_list")]
    pub tags: Vec<String>,
    #[serde(skip)]
    pub t_patterns: Vec<Regex>,
}

impl MarkerRule {
    fn with_defaults(patterns: &[&str], tags: &[&str]) -> Self {
        Self { patterns: to_strings(patterns), tags: to_strings(tags), t_patterns: vec![] }
    }

    fn prepare(&mut self, kind: &str) -> Result<(), EpgError> {
        self.t_patterns = self.patterns.iter()
            .map(|p| Regex::new(&format!("(?i){p}"))
                .map_err(|err| config_err!("invalid {kind} marker pattern {p}: {err}")))
            .collect::<Result<Vec<_>, _>>()?;
        self.tags = self.tags.iter().map(|t| t.to_lowercase()).collect();
        Ok(())
    }

    pub fn matches_tag(&self, tag: &str) -> bool {
        let tag = tag.trim().to_lowercase();
        self.tags.iter().any(|t| *t == tag)
    }
}

fn default_live_rule() -> MarkerRule {
    MarkerRule::with_defaults(DEFAULT_LIVE_PATTERNS, DEFAULT_LIVE_TAGS)
}

fn default_premiere_rule() -> MarkerRule {
    MarkerRule::with_defaults(DEFAULT_PREMIERE_PATTERNS, DEFAULT_PREMIERE_TAGS)
}

fn default_rerun_rule() -> MarkerRule {
    MarkerRule::with_defaults(DEFAULT_RERUN_PATTERNS, DEFAULT_RERUN_TAGS)
}

fn default_replay_channels() -> Vec<String> {
    to_strings(DEFAULT_REPLAY_CHANNELS)
}

#[allow(clippy::unnecessary_wraps)]
fn default_live_genre() -> Option<String> {
    Some(DEFAULT_LIVE_GENRE.to_string())
}

#[derive(Debug, Clone, Deserialize)]
pub struct MarkerConfig {
    #[serde(default = "default_live_rule")]
    pub live: MarkerRule,
    #[serde(default = "default_premiere_rule")]
    pub premiere: MarkerRule,
    #[serde(default = "default_rerun_rule")]
    pub rerun: MarkerRule,
    #[serde(default = "default_replay_channels", deserialize_with = "deserialize_as_string_list")]
    pub replay_channels: Vec<String>,
    /// genre of live programmes, `~` keeps the source genre
    #[serde(default = "default_live_genre")]
    pub live_genre: Option<String>,
}

impl Default for MarkerConfig {
    fn default() -> Self {
        Self {
            live: default_live_rule(),
            premiere: default_premiere_rule(),
            rerun: default_rerun_rule(),
            replay_channels: default_replay_channels(),
            live_genre: default_live_genre(),
        }
    }
}

impl MarkerConfig {
    fn prepare(&mut self) -> Result<(), EpgError> {
        self.live.prepare("live")?;
        self.premiere.prepare("premiere")?;
        self.rerun.prepare("rerun")?;
        self.replay_channels = self.replay_channels.iter().map(|c| channel_slug(c)).filter(|c| !c.is_empty()).collect();
        self.live_genre = self.live_genre.take().map(|g| g.trim().to_string()).filter(|g| !g.is_empty());
        Ok(())
    }

    /// Competitions shown on these channels are replays unless flagged live.
    pub fn is_replay_channel(&self, channel: &str) -> bool {
        let slug = channel_slug(channel);
        self.replay_channels.iter().any(|c| slug.contains(c.as_str()))
    }
}

/// Process-wide lookup tables, read-only after `prepare`.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct MappingDictionary {
    #[serde(default)]
    pub competitions: HashMap<String, MappingEntry>,
    #[serde(default)]
    pub programs: HashMap<String, MappingEntry>,
    #[serde(default)]
    pub genres: HashMap<String, String>,
    #[serde(default)]
    pub ratings: HashMap<String, String>,
    #[serde(default)]
    pub markers: MarkerConfig,
    #[serde(skip)]
    t_ratings: HashMap<String, String>,
}

impl MappingDictionary {
    pub fn prepare(&mut self) -> Result<(), EpgError> {
        self.markers.prepare()?;
        self.t_ratings = DEFAULT_RATINGS.iter().map(|(k, v)| ((*k).to_string(), (*v).to_string())).collect();
        for (source, rating) in &self.ratings {
            self.t_ratings.insert(source.trim().to_string(), rating.trim().to_string());
        }
        Ok(())
    }

    pub fn competition(&self, name: &str) -> Option<&MappingEntry> {
        self.competitions.get(name)
    }

    pub fn program(&self, name: &str) -> Option<&MappingEntry> {
        self.programs.get(name)
    }

    pub fn genre(&self, genre: &str) -> Option<&str> {
        self.genres.get(genre).map(String::as_str)
    }

    /// Unmapped genres pass through unchanged.
    pub fn translate_genre(&self, genre: &str) -> String {
        self.genre(genre).unwrap_or(genre).to_string()
    }

    pub fn rating(&self, rating: &str) -> Option<&str> {
        self.t_ratings.get(rating).map(String::as_str)
    }
}
