use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;

use crate::model::mapping::{MappingDictionary, MarkerConfig, MarkerRule, UNRATED_VALUES};
use crate::utils::tidy_text;

pub const LIVE_SUFFIX: &str = " - ao vivo";
pub const PREMIERE_SUFFIX: &str = " - inédito";
pub const RERUN_PREFIX: &str = "VT - ";

// markers this module writes itself, always recognized so normalization stays idempotent
static LIVE_MARKER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)\s*-\s*ao vivo\s*$").unwrap());
static PREMIERE_MARKER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)\s*-\s*inédito\s*$").unwrap());
static RERUN_MARKER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)^\s*VT\s*-\s*").unwrap());

static INVERTED_TITLE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(.+),\s*([OoAa]s?)$").unwrap());
// `dd/mm/yyyy`, `dd/mm/yy`, `ddmmyyyy` and `ddmmyy`
static EVENT_DATE_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| [
    r"(?i)\s*[-,]?\s*(?:realizado em\s+)?\b(\d{1,2})/(\d{1,2})/(\d{4}|\d{2})\b",
    r"(?i)\s*[-,]?\s*(?:realizado em\s+)?\b(\d{2})(\d{2})(\d{4}|\d{2})\b",
].iter().map(|p| Regex::new(p).unwrap()).collect());

// `Cidade, País` at the end of a subtitle after ` - `, or as the whole subtitle
static LOCATION_SUFFIX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s*-\s*([A-ZÀ-Ú][^-]+,\s*[A-ZÀ-Ú][^-]+)$").unwrap());
static LOCATION_ONLY: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^([A-ZÀ-Ú][^-,]+,\s*[A-ZÀ-Ú][^-,]+)$").unwrap());

static SEASON_EPISODE_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| [
    r"(?i)\s*[-:|]?\s*\(?\bT(\d{1,3})\s*:?\s*E(\d{1,4})\b\)?",
    r"(?i)\s*[-:|]?\s*\(?\bTemporada\s+(\d{1,3})\s*[-,:]?\s*Epis[oó]dio\s+(\d{1,4})\b\)?",
].iter().map(|p| Regex::new(p).unwrap()).collect());

static SEASON_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| [
    r"(?i)\s*[-:|]?\s*\(?\bTemporada\s+(\d{1,3})\b\)?",
    r"(?i)\s*[-:|]?\s*\(?\bTemp\.?\s*(\d{1,3})\b\)?",
    r"(?i)\s*[-:|]?\s*\(?\b(\d{1,3})\s*[ªº]?\s*Temporada\b\)?",
].iter().map(|p| Regex::new(p).unwrap()).collect());

static EPISODE_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| [
    r"(?i)\s*[-:|]?\s*\(?\bEpis[oó]dio\s+(\d{1,4})\b\)?",
    r"(?i)\s*[-:|]?\s*\(?\bEp\.?\s*(\d{1,4})\b\)?",
    r"(?i)\s*[-:|]?\s*\(?\bCap[ií]tulo\s+(\d{1,4})\b\)?",
].iter().map(|p| Regex::new(p).unwrap()).collect());

/// Competition stages, lower priority value wins.
static STAGE_PATTERNS: LazyLock<Vec<(Regex, &'static str, u8)>> = LazyLock::new(|| [
    (r"(?i)\boitavas\s+de\s+final\b", "Oitavas de Final", 1),
    (r"(?i)\bquartas\s+de\s+final\b", "Quartas de Final", 2),
    (r"(?i)\bsemi-?fina(?:l|is)\b", "Semifinal", 3),
    (r"(?i)\bfinais\b", "Finais", 4),
    (r"(?i)\bfinal\b", "Final", 5),
    (r"(?i)\bfase\s+de\s+grupos\b", "Fase de Grupos", 8),
].into_iter().map(|(p, name, prio)| (Regex::new(p).unwrap(), name, prio)).collect());

static ROUND_PATTERN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)\b(\d{1,2})\s*[ªº]?\s*rodada\b").unwrap());
static LEG_PATTERNS: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| [
    (r"(?i)\bjogo\s+(?:de\s+)?ida\b", "Jogo de Ida"),
    (r"(?i)\bjogo\s+(?:de\s+)?volta\b", "Jogo de Volta"),
].into_iter().map(|(p, name)| (Regex::new(p).unwrap(), name)).collect());

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastMarkers {
    pub live: bool,
    pub premiere: bool,
    pub rerun: bool,
}

fn strip_rule(title: &str, builtin: &Regex, rule: &MarkerRule) -> (String, bool) {
    let mut found = false;
    let mut text = title.to_string();
    for regex in std::iter::once(builtin).chain(rule.t_patterns.iter()) {
        if regex.is_match(&text) {
            found = true;
            text = regex.replace_all(&text, " ").to_string();
        }
    }
    (tidy_text(&text), found)
}

/// Removes every broadcast marker from the title and reports which ones were present.
pub fn strip_markers(title: &str, markers: &MarkerConfig, tags: &[String]) -> (String, BroadcastMarkers) {
    let (text, rerun) = strip_rule(title, &RERUN_MARKER, &markers.rerun);
    let (text, live) = strip_rule(&text, &LIVE_MARKER, &markers.live);
    let (text, premiere) = strip_rule(&text, &PREMIERE_MARKER, &markers.premiere);
    let found = BroadcastMarkers {
        live: live || tags.iter().any(|t| markers.live.matches_tag(t)),
        premiere: premiere || tags.iter().any(|t| markers.premiere.matches_tag(t)),
        rerun: rerun || tags.iter().any(|t| markers.rerun.matches_tag(t)),
    };
    (text, found)
}

/// Writes each marker exactly once: `VT - ` prefix, ` - inédito` and ` - ao vivo` suffixes.
pub fn apply_markers(title: &str, markers: BroadcastMarkers) -> String {
    let mut result = String::with_capacity(title.len() + 24);
    if markers.rerun {
        result.push_str(RERUN_PREFIX);
    }
    result.push_str(title);
    if markers.premiere {
        result.push_str(PREMIERE_SUFFIX);
    }
    if markers.live {
        result.push_str(LIVE_SUFFIX);
    }
    result
}

/// `"Palavra, O"` becomes `"O Palavra"`.
pub fn normalize_inverted_title(title: &str) -> String {
    INVERTED_TITLE.captures(title).map_or_else(
        || title.to_string(),
        |caps| format!("{} {}", caps[2].trim(), caps[1].trim()))
}

/// Finds a `dd/mm/yyyy` date (also `dd/mm/yy`, `ddmmyyyy`, `ddmmyy`), returns the text
/// without it and the date.
pub fn extract_event_date(text: &str) -> (String, Option<NaiveDate>) {
    for caps in EVENT_DATE_PATTERNS.iter().flat_map(|regex| regex.captures_iter(text)) {
        let day: u32 = caps[1].parse().unwrap_or(0);
        let month: u32 = caps[2].parse().unwrap_or(0);
        let mut year: i32 = caps[3].parse().unwrap_or(0);
        if caps[3].len() == 2 {
            year += 2000;
        }
        if let Some(date) = NaiveDate::from_ymd_opt(year, month, day) {
            let whole = caps.get(0).map_or(0..0, |m| m.range());
            let mut cleaned = String::with_capacity(text.len());
            cleaned.push_str(&text[..whole.start]);
            cleaned.push(' ');
            cleaned.push_str(&text[whole.end..]);
            return (tidy_text(&cleaned), Some(date));
        }
    }
    (text.to_string(), None)
}

pub fn format_event_date(date: NaiveDate) -> String {
    format!("realizado em {}", date.format("%d/%m/%Y"))
}

/// `"Flamengo x Vasco - Copa do Brasil: Flamengo x Vasco"` gives the competition as title and
/// the matchup as subtitle.
pub fn split_repeated_matchup(title: &str) -> Option<(String, String)> {
    let (before, after) = title.split_once(':')?;
    let (matchup, competition) = before.split_once(" - ")?;
    let (matchup, competition) = (matchup.trim(), competition.trim());
    if matchup.is_empty() || competition.is_empty() || matchup.to_lowercase() != after.trim().to_lowercase() {
        return None;
    }
    Some((competition.to_string(), matchup.to_string()))
}

fn format_location(location: &str) -> String {
    location.split(',').map(str::trim).filter(|p| !p.is_empty()).collect::<Vec<_>>().join(", ")
}

/// Splits a trailing `Cidade, País` off a subtitle. Returns the remaining text, empty when
/// the whole subtitle was the location, and the location with one space after each comma.
pub fn extract_location(subtitle: &str) -> Option<(String, String)> {
    let subtitle = subtitle.trim();
    if let Some(caps) = LOCATION_SUFFIX.captures(subtitle) {
        let start = caps.get(0).map_or(subtitle.len(), |m| m.start());
        return Some((subtitle[..start].trim().to_string(), format_location(&caps[1])));
    }
    LOCATION_ONLY.captures(subtitle).map(|caps| (String::new(), format_location(&caps[1])))
}

/// Removes a leading copy of the title and dangling hyphens. `None` when nothing is left.
pub fn clean_subtitle(title: &str, subtitle: &str) -> Option<String> {
    let mut rest = subtitle.trim();
    let title = title.trim();
    if !title.is_empty() {
        if let (Some(prefix), Some(tail)) = (rest.get(..title.len()), rest.get(title.len()..)) {
            let at_boundary = tail.chars().next().map_or(true, |c| !c.is_alphanumeric());
            if at_boundary && prefix.to_lowercase() == title.to_lowercase() {
                rest = tail;
            }
        }
    }
    let cleaned = rest.trim_matches(|c: char| c == '-' || c.is_whitespace());
    (!cleaned.is_empty()).then(|| cleaned.to_string())
}

/// Subtitle made of the event location and date, used when the source has none.
pub fn event_subtitle(location: Option<&str>, event_date: Option<NaiveDate>) -> Option<String> {
    match (location, event_date) {
        (Some(place), Some(date)) => Some(format!("{place}, {}", format_event_date(date))),
        (Some(place), None) => Some(place.to_string()),
        (None, Some(date)) => Some(format_event_date(date)),
        (None, None) => None,
    }
}

/// Description prefixed with the event location and date, parts joined by ` - `.
pub fn compose_description(
    location: Option<&str>,
    event_date: Option<NaiveDate>,
    description: Option<&str>,
) -> Option<String> {
    let date = event_date.map(format_event_date);
    let parts: Vec<&str> = [location, date.as_deref(), description]
        .into_iter()
        .flatten()
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect();
    (!parts.is_empty()).then(|| parts.join(" - "))
}

fn parse_positive(value: &str) -> Option<u32> {
    value.parse::<u32>().ok().filter(|v| *v > 0)
}

fn take_first(text: &str, patterns: &[Regex]) -> Option<(String, Vec<Option<u32>>)> {
    patterns.iter().find_map(|regex| regex.captures(text).map(|caps| {
        let numbers = caps.iter().skip(1).map(|m| m.and_then(|m| parse_positive(m.as_str()))).collect();
        let cleaned = regex.replacen(text, 1, " ").to_string();
        (tidy_text(&cleaned), numbers)
    }))
}

/// Looks for season and episode markers. Returns the text without them and the 1-based numbers.
pub fn extract_season_episode(text: &str) -> (String, Option<u32>, Option<u32>) {
    if let Some((cleaned, numbers)) = take_first(text, &SEASON_EPISODE_PATTERNS) {
        return (cleaned, numbers.first().copied().flatten(), numbers.get(1).copied().flatten());
    }
    let mut result = text.to_string();
    let mut season = None;
    let mut episode = None;
    if let Some((cleaned, numbers)) = take_first(&result, &SEASON_PATTERNS) {
        result = cleaned;
        season = numbers.first().copied().flatten();
    }
    if let Some((cleaned, numbers)) = take_first(&result, &EPISODE_PATTERNS) {
        result = cleaned;
        episode = numbers.first().copied().flatten();
    }
    (result, season, episode)
}

/// Most specific competition stage found in `text`, combined with the leg if there is one,
/// e.g. `Oitavas de Final - Jogo de Ida`.
pub fn detect_phase(text: &str) -> Option<String> {
    let stage = STAGE_PATTERNS.iter()
        .filter(|(regex, _, _)| regex.is_match(text))
        .min_by_key(|(_, _, priority)| *priority)
        .map(|(_, name, _)| (*name).to_string())
        .or_else(|| ROUND_PATTERN.captures(text).map(|caps| format!("{}ª Rodada", &caps[1])));
    let leg = LEG_PATTERNS.iter()
        .find(|(regex, _)| regex.is_match(text))
        .map(|(_, name)| *name);
    match (stage, leg) {
        (Some(stage), Some(leg)) => Some(format!("{stage} - {leg}")),
        (Some(stage), None) => Some(stage),
        (None, Some(leg)) => Some(leg.to_string()),
        (None, None) => None,
    }
}

/// Phase from the first source that names one.
pub fn find_phase<'a, I>(sources: I) -> Option<String>
where
    I: IntoIterator<Item = &'a str>,
{
    sources.into_iter().find_map(detect_phase)
}

pub fn append_phase(title: &str, phase: &str) -> String {
    if title.to_lowercase().contains(&phase.to_lowercase()) {
        title.to_string()
    } else {
        format!("{title} - {phase}")
    }
}

/// Normalized rating or `None` for unrated values. Unknown ratings pass through.
pub fn normalize_rating(raw: &str, dict: &MappingDictionary) -> Option<String> {
    let mut clean = raw.replace(['[', ']'], "");
    clean = clean.trim().to_string();
    if let Some(stripped) = clean.strip_suffix("anos") {
        clean = stripped.trim().to_string();
    }
    if clean.is_empty() || UNRATED_VALUES.iter().any(|u| u.eq_ignore_ascii_case(&clean)) {
        return None;
    }
    let rating = dict.rating(&clean).unwrap_or(&clean).to_string();
    (!UNRATED_VALUES.contains(&rating.as_str()) && !rating.is_empty()).then_some(rating)
}
