use std::io::Write;

use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;

use crate::model::program::{ChannelRecord, ProgramRecord};
use crate::utils::format_xmltv_time;

pub const XMLTV_HEADER: &str = "<?xml version=\"1.0\" encoding=\"utf-8\" ?>\n<!DOCTYPE tv SYSTEM \"xmltv.dtd\">\n";
pub const GENERATOR_NAME: &str = env!("CARGO_PKG_NAME");
pub const GENERATOR_URL: &str = env!("CARGO_PKG_REPOSITORY");

const LANG_PT: (&str, &str) = ("lang", "pt");
const LANG_EN: (&str, &str) = ("lang", "en");
const RATING_SYSTEM: &str = "Brazil";

/// Channels and programmes of one output file. Programmes must already be sorted.
pub struct Epg<'a> {
    pub channels: &'a [ChannelRecord],
    pub programmes: &'a [ProgramRecord],
}

fn write_text_element<W: Write>(
    writer: &mut Writer<W>,
    name: &str,
    attributes: &[(&str, &str)],
    text: &str,
) -> std::io::Result<()> {
    let mut elem = BytesStart::new(name);
    for attr in attributes {
        elem.push_attribute(*attr);
    }
    writer.write_event(Event::Start(elem))?;
    writer.write_event(Event::Text(BytesText::new(text)))?;
    writer.write_event(Event::End(BytesEnd::new(name)))
}

fn write_empty_element<W: Write>(writer: &mut Writer<W>, name: &str) -> std::io::Result<()> {
    writer.write_event(Event::Empty(BytesStart::new(name)))
}

/// `xmltv_ns` numbering is zero-based, missing parts stay empty.
pub fn format_episode_num(season: Option<u32>, episode: Option<u32>) -> Option<String> {
    if season.is_none() && episode.is_none() {
        return None;
    }
    let zero_based = |v: Option<u32>| v.map(|n| n.saturating_sub(1).to_string()).unwrap_or_default();
    Some(format!("{}.{}.", zero_based(season), zero_based(episode)))
}

/// Description with the rating details appended, e.g.
/// `Classificação indicativa: 14 (violência; autoclassificação)`.
pub fn format_description(program: &ProgramRecord) -> Option<String> {
    let rating_line = program.rating.as_ref().and_then(|rating| {
        let mut details: Vec<&str> = vec![];
        if let Some(criteria) = program.rating_criteria.as_deref() {
            details.push(criteria);
        }
        if program.rating_self_assigned {
            details.push("autoclassificação");
        }
        (!details.is_empty()).then(|| format!("Classificação indicativa: {rating} ({})", details.join("; ")))
    });
    match (program.description.as_deref(), rating_line) {
        (Some(desc), Some(line)) => Some(format!("{desc}\n{line}")),
        (Some(desc), None) => Some(desc.to_string()),
        (None, line) => line,
    }
}

impl Epg<'_> {
    fn write_channel<W: Write>(writer: &mut Writer<W>, channel: &ChannelRecord) -> std::io::Result<()> {
        let mut elem = BytesStart::new("channel");
        elem.push_attribute(("id", channel.id.as_str()));
        writer.write_event(Event::Start(elem))?;
        write_text_element(writer, "display-name", &[LANG_PT], &channel.display_name)?;
        writer.write_event(Event::End(BytesEnd::new("channel")))
    }

    fn write_programme<W: Write>(writer: &mut Writer<W>, program: &ProgramRecord) -> std::io::Result<()> {
        let start = format_xmltv_time(&program.start);
        let stop = format_xmltv_time(&program.end);
        let mut elem = BytesStart::new("programme");
        elem.push_attribute(("start", start.as_str()));
        elem.push_attribute(("stop", stop.as_str()));
        elem.push_attribute(("channel", program.channel.as_str()));
        writer.write_event(Event::Start(elem))?;

        write_text_element(writer, "title", &[LANG_PT], &program.title)?;
        if let Some(subtitle) = &program.subtitle {
            write_text_element(writer, "sub-title", &[LANG_PT], subtitle)?;
        }
        if let Some(desc) = format_description(program) {
            write_text_element(writer, "desc", &[LANG_PT], &desc)?;
        }
        if let Some(date) = &program.event_date {
            write_text_element(writer, "date", &[], &date.format("%Y%m%d").to_string())?;
        }
        if let Some(genre) = &program.genre {
            write_text_element(writer, "category", &[LANG_EN], genre)?;
        }
        for tag in &program.tags {
            write_text_element(writer, "keyword", &[LANG_PT], tag)?;
        }
        if let Some(length) = program.length {
            write_text_element(writer, "length", &[("units", "minutes")], &length.to_string())?;
        }
        if let Some(episode_num) = format_episode_num(program.season, program.episode) {
            write_text_element(writer, "episode-num", &[("system", "xmltv_ns")], &episode_num)?;
        }
        if program.rerun {
            write_empty_element(writer, "previously-shown")?;
        }
        if program.premiere {
            write_empty_element(writer, "premiere")?;
        }
        if program.live {
            write_empty_element(writer, "new")?;
        }
        if let Some(rating) = &program.rating {
            let mut rating_elem = BytesStart::new("rating");
            rating_elem.push_attribute(("system", RATING_SYSTEM));
            writer.write_event(Event::Start(rating_elem))?;
            write_text_element(writer, "value", &[], &format!("[{rating}]"))?;
            writer.write_event(Event::End(BytesEnd::new("rating")))?;
        }

        writer.write_event(Event::End(BytesEnd::new("programme")))
    }

    pub fn write_to<W: Write>(&self, writer: &mut Writer<W>) -> std::io::Result<()> {
        let mut tv = BytesStart::new("tv");
        tv.push_attribute(("generator-info-name", GENERATOR_NAME));
        if !GENERATOR_URL.is_empty() {
            tv.push_attribute(("generator-info-url", GENERATOR_URL));
        }
        writer.write_event(Event::Start(tv))?;
        for channel in self.channels {
            Self::write_channel(writer, channel)?;
        }
        for program in self.programmes {
            Self::write_programme(writer, program)?;
        }
        writer.write_event(Event::End(BytesEnd::new("tv")))
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;
    use chrono::{DateTime, NaiveDate};
    use quick_xml::Writer;
    use crate::model::program::{ChannelRecord, ProgramRecord};
    use super::*;

    fn program() -> ProgramRecord {
        ProgramRecord {
            channel: "globo-sp".to_string(),
            title: "Futebol - ao vivo".to_string(),
            subtitle: Some("Flamengo x Palmeiras".to_string()),
            description: Some("Rodada & destaques".to_string()),
            start: DateTime::parse_from_rfc3339("2025-01-12T18:30:00-03:00").unwrap(),
            end: DateTime::parse_from_rfc3339("2025-01-12T19:30:00-03:00").unwrap(),
            live: true,
            premiere: false,
            rerun: false,
            rating: Some("14".to_string()),
            rating_criteria: Some("violência".to_string()),
            rating_self_assigned: true,
            season: Some(2),
            episode: Some(5),
            genre: Some("Sports".to_string()),
            tags: vec!["futebol".to_string()],
            event_date: NaiveDate::from_ymd_opt(2025, 1, 12),
            length: Some(60),
        }
    }

    fn render(channels: &[ChannelRecord], programmes: &[ProgramRecord]) -> String {
        let mut writer = Writer::new(Cursor::new(vec![]));
        Epg { channels, programmes }.write_to(&mut writer).unwrap();
        String::from_utf8(writer.into_inner().into_inner()).unwrap()
    }

    #[test]
    fn test_episode_num() {
        assert_eq!(format_episode_num(Some(2), Some(5)).as_deref(), Some("1.4."));
        assert_eq!(format_episode_num(None, Some(1)).as_deref(), Some(".0."));
        assert_eq!(format_episode_num(None, None), None);
    }

    #[test]
    fn test_description_rating_line() {
        let mut prog = program();
        assert_eq!(format_description(&prog).as_deref(),
                   Some("Rodada & destaques\nClassificação indicativa: 14 (violência; autoclassificação)"));
        prog.rating_criteria = None;
        prog.rating_self_assigned = false;
        assert_eq!(format_description(&prog).as_deref(), Some("Rodada & destaques"));
        prog.description = None;
        assert_eq!(format_description(&prog), None);
    }

    #[test]
    fn test_write_programme() {
        let xml = render(&[ChannelRecord::new("globo-sp", "Globo SP")], &[program()]);
        assert!(xml.starts_with("<tv generator-info-name=\"epg-grabber\""));
        assert!(xml.contains("<channel id=\"globo-sp\"><display-name lang=\"pt\">Globo SP</display-name></channel>"));
        assert!(xml.contains("<programme start=\"20250112183000 -0300\" stop=\"20250112193000 -0300\" channel=\"globo-sp\">"));
        assert!(xml.contains("<desc lang=\"pt\">Rodada &amp; destaques\n"));
        assert!(xml.contains("<date>20250112</date>"));
        assert!(xml.contains("<length units=\"minutes\">60</length>"));
        assert!(xml.contains("<episode-num system=\"xmltv_ns\">1.4.</episode-num>"));
        assert!(xml.contains("<new/><rating system=\"Brazil\"><value>[14]</value></rating></programme>"));
        assert!(!xml.contains("previously-shown"));
        // dtd order
        let title = xml.find("<title").unwrap();
        let category = xml.find("<category").unwrap();
        let keyword = xml.find("<keyword").unwrap();
        assert!(title < category && category < keyword);
        assert!(xml.ends_with("</tv>"));
    }
}
