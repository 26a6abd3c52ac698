use chrono::{DateTime, FixedOffset, NaiveDate};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelRecord {
    pub id: String,
    pub display_name: String,
}

impl ChannelRecord {
    pub fn new(id: &str, display_name: &str) -> Self {
        Self { id: id.to_string(), display_name: display_name.to_string() }
    }
}

/// A fully normalized programme, ready to be written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgramRecord {
    pub channel: String,
    pub title: String,
    pub subtitle: Option<String>,
    pub description: Option<String>,
    pub start: DateTime<FixedOffset>,
    pub end: DateTime<FixedOffset>,
    pub live: bool,
    pub premiere: bool,
    pub rerun: bool,
    pub rating: Option<String>,
    pub rating_criteria: Option<String>,
    pub rating_self_assigned: bool,
    /// 1-based
    pub season: Option<u32>,
    /// 1-based
    pub episode: Option<u32>,
    pub genre: Option<String>,
    pub tags: Vec<String>,
    pub event_date: Option<NaiveDate>,
    /// source duration in minutes
    pub length: Option<i64>,
}
