use chrono::{DateTime, FixedOffset, TimeDelta};
use serde_json::Value;

use crate::epg_error::{create_epg_error_result, EpgError, EpgErrorKind};
use crate::model::config_service::{JsonPath, ServiceConfig};
use crate::model::mapping::MappingDictionary;
use crate::model::program::ProgramRecord;
use crate::processing::fragment::Fragment;
use crate::processing::heuristics::{
    append_phase, apply_markers, clean_subtitle, compose_description, event_subtitle, extract_event_date,
    extract_location, extract_season_episode, find_phase, normalize_inverted_title, normalize_rating,
    split_repeated_matchup, strip_markers,
};
use crate::processing::json_path::{get_optional_path, get_text, value_as_list};
use crate::utils::{from_epoch, is_truthy, minutes_to_duration, parse_datetime_str, parse_duration, ServiceTimezone};

pub fn parse_time_value(value: &Value, tz: &ServiceTimezone) -> Option<DateTime<FixedOffset>> {
    match value {
        #[allow(clippy::cast_possible_truncation)]
        Value::Number(n) => n.as_i64()
            .or_else(|| n.as_f64().map(|f| f.trunc() as i64))
            .and_then(|epoch| from_epoch(epoch, tz)),
        Value::String(s) => parse_datetime_str(s, tz),
        _ => None,
    }
}

/// Numbers are minutes, strings are minutes or `HH:MM[:SS]`.
pub fn parse_duration_value(value: &Value) -> Option<TimeDelta> {
    match value {
        Value::Number(n) => n.as_f64().and_then(minutes_to_duration),
        Value::String(s) => parse_duration(s),
        _ => None,
    }
}

pub fn is_value_truthy(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => is_truthy(s),
        _ => false,
    }
}

/// First run of digits as a positive number, `"T02"` gives 2.
fn parse_ordinal(text: &str) -> Option<u32> {
    let digits: String = text.chars().skip_while(|c| !c.is_ascii_digit()).take_while(char::is_ascii_digit).collect();
    digits.parse::<u32>().ok().filter(|v| *v > 0)
}

/// Keeps the previous text when a cleaning step would leave nothing behind.
fn keep_non_empty(cleaned: String, previous: String) -> String {
    if cleaned.trim().is_empty() {
        previous
    } else {
        cleaned
    }
}

pub struct Normalizer<'a> {
    config: &'a ServiceConfig,
    dict: &'a MappingDictionary,
}

impl<'a> Normalizer<'a> {
    pub const fn new(config: &'a ServiceConfig, dict: &'a MappingDictionary) -> Self {
        Self { config, dict }
    }

    fn text(fragment: &Fragment, path: Option<&JsonPath>) -> Option<String> {
        get_text(fragment.value, path)
    }

    fn resolve_times(
        &self,
        fragment: &Fragment,
    ) -> Result<(DateTime<FixedOffset>, DateTime<FixedOffset>, Option<i64>), EpgError> {
        let fields = &self.config.fields;
        let tz = &self.config.t_timezone;
        let Some(start_value) = get_optional_path(fragment.value, fields.start_time.as_ref()) else {
            return create_epg_error_result!(EpgErrorKind::Parse, "programme on {} without start time", fragment.channel);
        };
        let Some(start) = parse_time_value(start_value, tz) else {
            return create_epg_error_result!(EpgErrorKind::Parse, "programme on {} with unparseable start time {}", fragment.channel, start_value);
        };
        let duration = get_optional_path(fragment.value, fields.duration.as_ref()).and_then(parse_duration_value);
        let end = get_optional_path(fragment.value, fields.end_time.as_ref())
            .and_then(|v| parse_time_value(v, tz))
            .or_else(|| duration.and_then(|d| start.checked_add_signed(d)));
        let Some(end) = end else {
            return create_epg_error_result!(EpgErrorKind::Parse, "programme on {} at {start} has no end time or duration", fragment.channel);
        };
        if end <= start {
            return create_epg_error_result!(EpgErrorKind::Parse, "programme on {} ends {end} before it starts {start}", fragment.channel);
        }
        Ok((start, end, duration.map(|d| d.num_minutes()).filter(|m| *m > 0)))
    }

    /// Genre of the fragment, translated. Of a list the first translatable entry wins.
    fn resolve_genre(&self, mapped: Option<&str>, source: &[String]) -> Option<String> {
        if let Some(genre) = mapped {
            return Some(self.dict.translate_genre(genre));
        }
        source.iter()
            .find_map(|g| self.dict.genre(g).map(str::to_string))
            .or_else(|| source.first().map(|g| self.dict.translate_genre(g)))
    }

    /// Converts a fragment into a programme. `Ok(None)` when the channel is not a target,
    /// a parse error when the fragment is unusable.
    pub fn normalize(&self, fragment: &Fragment) -> Result<Option<ProgramRecord>, EpgError> {
        if !self.config.is_target_channel(&fragment.channel) {
            return Ok(None);
        }
        let fields = &self.config.fields;
        let Some(raw_title) = Self::text(fragment, fields.program_title.as_ref()) else {
            return create_epg_error_result!(EpgErrorKind::Parse, "programme on {} without title", fragment.channel);
        };
        let (start, end, length) = self.resolve_times(fragment)?;

        let mut subtitle = Self::text(fragment, fields.subtitle.as_ref());
        let description = Self::text(fragment, fields.description.as_ref());
        let tags: Vec<String> = get_optional_path(fragment.value, fields.tags.as_ref()).map(value_as_list).unwrap_or_default();
        let source_genres: Vec<String> = get_optional_path(fragment.value, fields.genre.as_ref()).map(value_as_list).unwrap_or_default();

        // broadcast markers
        let (title, mut markers) = strip_markers(&raw_title, &self.dict.markers, &tags);
        let mut title = keep_non_empty(title, raw_title);
        markers.live |= get_optional_path(fragment.value, fields.live.as_ref()).is_some_and(is_value_truthy);
        title = normalize_inverted_title(&title);
        if let Some((competition, matchup)) = split_repeated_matchup(&title) {
            title = competition;
            subtitle = Some(matchup);
        }
        let (cleaned, title_date) = extract_event_date(&title);
        title = keep_non_empty(cleaned, title);
        let mut event_date = title_date;
        if let Some(sub) = subtitle.take() {
            let (cleaned, sub_date) = extract_event_date(&sub);
            event_date = event_date.or(sub_date);
            subtitle = Some(cleaned);
        }

        // season and episode
        let mut season = Self::text(fragment, fields.season.as_ref()).as_deref().and_then(parse_ordinal);
        let mut episode = Self::text(fragment, fields.episode.as_ref()).as_deref().and_then(parse_ordinal);
        if season.is_none() || episode.is_none() {
            let (cleaned, s, e) = extract_season_episode(&title);
            if s.is_some() || e.is_some() {
                title = keep_non_empty(cleaned, title);
                season = season.or(s);
                episode = episode.or(e);
            }
        }
        if season.is_none() || episode.is_none() {
            if let Some(sub) = subtitle.take() {
                let (cleaned, s, e) = extract_season_episode(&sub);
                season = season.or(s);
                episode = episode.or(e);
                subtitle = Some(cleaned);
            }
        }

        // a trailing location moves out of the subtitle, a subtitle that is only a location stays
        let mut location = None;
        if let Some(sub) = subtitle.take() {
            subtitle = match extract_location(&sub) {
                Some((rest, place)) if rest.is_empty() => Some(place),
                Some((rest, place)) => {
                    location = Some(place);
                    Some(rest)
                }
                None => Some(sub),
            };
        }
        let subtitle = subtitle.and_then(|sub| clean_subtitle(&title, &sub));

        // competitions, phases and dictionary substitution
        let competition = self.dict.competition(&title);
        let phase = competition.and_then(|_| find_phase(
            subtitle.iter().chain(description.iter()).chain(tags.iter()).map(String::as_str)));
        let mapped = competition.or_else(|| self.dict.program(&title));
        if let Some(entry) = mapped {
            title.clone_from(&entry.name);
        }
        if competition.is_some() && !markers.live && self.dict.markers.is_replay_channel(&fragment.channel) {
            markers.rerun = true;
        }
        if let Some(phase) = &phase {
            title = append_phase(&title, phase);
        }
        let title = apply_markers(&title, markers);
        let mut genre = self.resolve_genre(mapped.and_then(|e| e.genre.as_deref()), &source_genres);
        if markers.live && self.dict.markers.live_genre.is_some() {
            genre.clone_from(&self.dict.markers.live_genre);
        }

        // event location and date fill an empty subtitle, otherwise they lead the description
        let (subtitle, description) = match subtitle {
            Some(sub) => (Some(sub), compose_description(location.as_deref(), event_date, description.as_deref())),
            None => (event_subtitle(location.as_deref(), event_date), description),
        };

        // rating
        let rating = Self::text(fragment, fields.rating.as_ref()).and_then(|r| normalize_rating(&r, self.dict));
        let rating_criteria = get_optional_path(fragment.value, fields.rating_criteria.as_ref())
            .map(value_as_list)
            .map(|items| items.join(", "))
            .filter(|c| !c.is_empty());
        let rating_self_assigned = get_optional_path(fragment.value, fields.rating_auto.as_ref()).is_some_and(is_value_truthy);

        Ok(Some(ProgramRecord {
            channel: fragment.channel.clone(),
            title,
            subtitle,
            description,
            start,
            end,
            live: markers.live,
            premiere: markers.premiere,
            rerun: markers.rerun,
            rating,
            rating_criteria,
            rating_self_assigned,
            season,
            episode,
            genre,
            tags,
            event_date,
            length,
        }))
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use serde_json::json;
    use super::*;

    const DESCRIPTOR: &str = r#"
api_url: https://x
service_name: Example
program_title: title
subtitle: subtitle
description: desc
start_time: start
end_time: end
duration: duration
live: live
rating: rating
rating_criteria: criteria
rating_auto: auto
season: season
episode: episode
tags: tags
genre: genre
timezone: "-03:00"
"#;

    fn setup(extra: &str, mapping: &str) -> (ServiceConfig, MappingDictionary) {
        let mut config: ServiceConfig = serde_yaml::from_str(&format!("{DESCRIPTOR}{extra}")).unwrap();
        config.prepare("example").unwrap();
        let mut dict: MappingDictionary = serde_yaml::from_str(mapping).unwrap();
        dict.prepare().unwrap();
        (config, dict)
    }

    fn normalize(
        config: &ServiceConfig,
        dict: &MappingDictionary,
        channel: &str,
        value: &Value,
    ) -> Result<Option<ProgramRecord>, EpgError> {
        Normalizer::new(config, dict).normalize(&Fragment { channel: channel.to_string(), value })
    }

    #[test]
    fn test_end_from_duration() {
        let (config, dict) = setup("", "{}");
        let value = json!({"title": "Jornal", "start": "2025-01-12T18:30:00-03:00", "duration": 60});
        let record = normalize(&config, &dict, "Globo", &value).unwrap().unwrap();
        assert_eq!(record.end, DateTime::parse_from_rfc3339("2025-01-12T19:30:00-03:00").unwrap());
        assert_eq!(record.length, Some(60));
        assert_eq!(record.title, "Jornal");
    }

    #[test]
    fn test_dropped_fragments() {
        let (config, dict) = setup("", "{}");
        let no_title = json!({"start": "2025-01-12T18:30:00-03:00", "duration": 60});
        let no_start = json!({"title": "A", "duration": 60});
        let no_end = json!({"title": "A", "start": "2025-01-12T18:30:00-03:00"});
        let inverted = json!({"title": "A", "start": "2025-01-12T18:30:00-03:00", "end": "2025-01-12T18:00:00-03:00"});
        for value in [no_title, no_start, no_end, inverted] {
            let err = normalize(&config, &dict, "Globo", &value).unwrap_err();
            assert_eq!(err.kind, EpgErrorKind::Parse);
        }
    }

    #[test]
    fn test_out_of_range_values_drop_the_fragment() {
        let (config, dict) = setup("", "{}");
        let start = "2025-01-12T18:30:00-03:00";
        let fragments = [
            json!({"title": "A", "start": start, "duration": "99999999999999999"}),
            json!({"title": "A", "start": start, "duration": 1.0e18}),
            json!({"title": "A", "start": start, "duration": 100_000_000_000_000_i64}),
            json!({"title": "A", "start": "-9223372036854775808", "duration": 60}),
            json!({"title": "A", "start": i64::MIN, "duration": 60}),
        ];
        for value in &fragments {
            let err = normalize(&config, &dict, "Globo", value).unwrap_err();
            assert_eq!(err.kind, EpgErrorKind::Parse);
        }
        assert_eq!(parse_duration_value(&json!(1.0e18)), None);
        assert_eq!(parse_duration_value(&json!(-5)), None);
        assert_eq!(parse_duration_value(&json!(1.5)), Some(TimeDelta::seconds(90)));
    }

    #[test]
    fn test_target_filter() {
        let (config, dict) = setup("target_channels: [globo-sp]\n", "{}");
        let value = json!({"title": "A", "start": 1_736_717_400, "duration": "01:00"});
        assert!(normalize(&config, &dict, "Band", &value).unwrap().is_none());
        let record = normalize(&config, &dict, "Globo SP", &value).unwrap().unwrap();
        assert_eq!(record.start.to_rfc3339(), "2025-01-12T18:30:00-03:00");
    }

    #[test]
    fn test_title_normalization_is_idempotent() {
        let (config, dict) = setup("", "{}");
        let value = json!({"title": "Novela, A - AO VIVO", "start": 1_736_717_400, "duration": 30, "tags": ["Reprise"]});
        let first = normalize(&config, &dict, "Globo", &value).unwrap().unwrap();
        assert_eq!(first.title, "VT - A Novela - ao vivo");
        let again = json!({"title": first.title, "start": 1_736_717_400, "duration": 30});
        let second = normalize(&config, &dict, "Globo", &again).unwrap().unwrap();
        assert_eq!(second.title, first.title);
    }

    #[test]
    fn test_full_normalization() {
        let mapping = r#"
competitions:
  "Copa BR": ["Copa do Brasil", "Futebol"]
genres:
  Futebol: "Sports"
  Novela: "Soap"
"#;
        let (config, dict) = setup("", mapping);
        let value = json!({
            "title": "Copa BR", "subtitle": "Flamengo x Palmeiras - Jogo de Ida", "desc": "Oitavas de final",
            "start": "2025-01-12 21:30:00", "end": "2025-01-12 23:30:00",
            "rating": "[AGE87]", "criteria": ["violência", "linguagem"], "auto": "sim",
        });
        let record = normalize(&config, &dict, "SporTV", &value).unwrap().unwrap();
        assert_eq!(record.title, "VT - Copa do Brasil - Jogo de Ida");
        assert!(record.rerun && !record.live);
        assert_eq!(record.genre.as_deref(), Some("Sports"));
        assert_eq!(record.description.as_deref(), Some("Oitavas de final"));
        assert_eq!(record.rating.as_deref(), Some("14"));
        assert_eq!(record.rating_criteria.as_deref(), Some("violência, linguagem"));
        assert!(record.rating_self_assigned);

        let series = json!({
            "title": "Dark T2 E5", "subtitle": "Estreia 12/01/2025", "start": 1_736_717_400, "duration": 50,
            "genre": ["Drama", "Novela"], "live": 0,
        });
        let record = normalize(&config, &dict, "Netflix", &series).unwrap().unwrap();
        assert_eq!(record.title, "Dark");
        assert_eq!((record.season, record.episode), (Some(2), Some(5)));
        assert_eq!(record.subtitle.as_deref(), Some("Estreia"));
        assert_eq!(record.event_date, NaiveDate::from_ymd_opt(2025, 1, 12));
        assert_eq!(record.description.as_deref(), Some("realizado em 12/01/2025"));
        assert_eq!(record.genre.as_deref(), Some("Soap"));
        assert!(!record.live);
    }

    #[test]
    fn test_explicit_season_wins() {
        let (config, dict) = setup("", "{}");
        let value = json!({"title": "Show T9 E9", "season": "T02", "episode": 3, "start": 1_736_717_400, "duration": 50, "live": true});
        let record = normalize(&config, &dict, "Globo", &value).unwrap().unwrap();
        assert_eq!((record.season, record.episode), (Some(2), Some(3)));
        assert_eq!(record.title, "Show T9 E9 - ao vivo");
        assert!(record.live);
        assert_eq!(record.genre.as_deref(), Some("live broadcast"));
    }

    #[test]
    fn test_repeated_matchup_and_event_details() {
        let (config, dict) = setup("", "{}");
        let value = json!({
            "title": "Flamengo x Vasco - Carioca: Flamengo x Vasco", "desc": "Clássico", "start": 1_736_717_400, "duration": 120,
        });
        let record = normalize(&config, &dict, "Globo", &value).unwrap().unwrap();
        assert_eq!(record.title, "Carioca");
        assert_eq!(record.subtitle.as_deref(), Some("Flamengo x Vasco"));
        assert_eq!(record.description.as_deref(), Some("Clássico"));

        let value = json!({
            "title": "Surfe 12/01/2025", "subtitle": "Etapa 3 - Tóquio,Japão", "desc": "Final feminina",
            "start": 1_736_717_400, "duration": 60,
        });
        let record = normalize(&config, &dict, "Globo", &value).unwrap().unwrap();
        assert_eq!(record.title, "Surfe");
        assert_eq!(record.subtitle.as_deref(), Some("Etapa 3"));
        assert_eq!(record.description.as_deref(), Some("Tóquio, Japão - realizado em 12/01/2025 - Final feminina"));

        let value = json!({"title": "Surfe 120125", "subtitle": "Surfe - ", "start": 1_736_717_400, "duration": 60});
        let record = normalize(&config, &dict, "Globo", &value).unwrap().unwrap();
        assert_eq!(record.subtitle.as_deref(), Some("realizado em 12/01/2025"));
        assert_eq!(record.description, None);
    }
}
