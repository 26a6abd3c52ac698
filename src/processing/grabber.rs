use chrono::{DateTime, Days, FixedOffset, NaiveDate};
use indexmap::IndexMap;
use log::{info, warn};
use reqwest::blocking::Client;

use crate::epg_error::{config_err, create_epg_error, EpgError};
use crate::model::config_service::{ChannelAddressing, ChannelConfig, ServiceConfig};
use crate::model::mapping::MappingDictionary;
use crate::model::program::{ChannelRecord, ProgramRecord};
use crate::model::stats::RunStats;
use crate::processing::fragment::extract_fragments;
use crate::processing::normalizer::Normalizer;
use crate::processing::url_template::{expand_url, TemplateContext};
use crate::utils::network::request::{create_client, get_json_content, sanitize_sensitive_info};
use crate::utils::{debug_if_enabled, trace_if_enabled, CancelFlag};

#[derive(Debug, Clone)]
pub struct GrabOptions {
    pub days: u32,
    /// replaces the configured channel list with this single id
    pub channel: Option<String>,
    /// first day of the window, today in the service timezone when absent
    pub start_date: Option<NaiveDate>,
}

/// Channels and programmes collected over all services of a run.
#[derive(Debug, Default)]
pub struct Guide {
    channels: IndexMap<String, ChannelRecord>,
    programmes: Vec<ProgramRecord>,
}

impl Guide {
    /// First registration of an id wins.
    pub fn add_channel(&mut self, channel: ChannelRecord) {
        self.channels.entry(channel.id.clone()).or_insert(channel);
    }

    pub fn add_programme(&mut self, programme: ProgramRecord) {
        if !self.channels.contains_key(&programme.channel) {
            self.add_channel(ChannelRecord::new(&programme.channel, &programme.channel));
        }
        self.programmes.push(programme);
    }

    /// Channels in registration order and programmes sorted by channel and start,
    /// with repeated (channel, start) pairs collapsed to the first one seen.
    pub fn finish(self, stats: &mut RunStats) -> (Vec<ChannelRecord>, Vec<ProgramRecord>) {
        let channels: Vec<ChannelRecord> = self.channels.into_values().collect();
        let mut programmes = self.programmes;
        programmes.sort_by(|a, b| a.channel.cmp(&b.channel).then_with(|| a.start.cmp(&b.start)));
        let before = programmes.len();
        programmes.dedup_by(|later, first| later.channel == first.channel && later.start == first.start);
        stats.duplicates += before - programmes.len();
        stats.channels = channels.len();
        stats.programmes = programmes.len();
        (channels, programmes)
    }
}

/// One request of a service: a day, and a channel in per-channel mode.
#[derive(Debug)]
struct FetchUnit<'a> {
    date: NaiveDate,
    channel: Option<&'a ChannelConfig>,
    url: String,
}

impl FetchUnit<'_> {
    fn describe(&self, service: &str) -> String {
        match self.channel {
            Some(channel) => format!("service {service} day {} channel {}", self.date, channel.id),
            None => format!("service {service} day {}", self.date),
        }
    }
}

fn unit_channels(config: &ServiceConfig, channel_override: Option<&str>) -> Vec<ChannelConfig> {
    match channel_override {
        Some(id) => vec![config.channels.iter()
            .find(|c| c.id == id)
            .cloned()
            .unwrap_or_else(|| ChannelConfig::new(id))],
        None => config.channels.clone(),
    }
}

/// Units in request order: day ascending, then channel declaration order.
fn build_units<'a>(
    config: &ServiceConfig,
    channels: &'a [ChannelConfig],
    start_date: NaiveDate,
    days: u32,
) -> Vec<FetchUnit<'a>> {
    let day_count = if config.no_loop { 1 } else { days };
    let channel_list = channels.iter().map(|c| c.id.as_str()).collect::<Vec<_>>().join(&config.channel_delimiter);
    let mut units = vec![];
    for day in 0..day_count {
        let Some(date) = start_date.checked_add_days(Days::new(u64::from(day))) else {
            break;
        };
        let mut ctx = TemplateContext {
            date,
            days,
            timezone: &config.t_timezone,
            channel_id: None,
            channel_list: None,
        };
        if channels.is_empty() {
            units.push(FetchUnit { date, channel: None, url: expand_url(&config.api_url, &ctx) });
            continue;
        }
        match config.t_addressing {
            ChannelAddressing::Joined => {
                ctx.channel_list = Some(&channel_list);
                units.push(FetchUnit { date, channel: None, url: expand_url(&config.api_url, &ctx) });
            }
            ChannelAddressing::PerChannel => {
                for channel in channels {
                    ctx.channel_id = Some(&channel.id);
                    units.push(FetchUnit { date, channel: Some(channel), url: expand_url(&config.api_url, &ctx) });
                }
            }
        }
    }
    units
}

struct ServiceGrabber<'a> {
    config: &'a ServiceConfig,
    normalizer: Normalizer<'a>,
    client: Client,
    start_date: NaiveDate,
    days: u32,
    /// `no_loop` services answer with more than asked, programmes outside are dropped
    window: Option<(DateTime<FixedOffset>, DateTime<FixedOffset>)>,
}

impl<'a> ServiceGrabber<'a> {
    fn new(config: &'a ServiceConfig, dict: &'a MappingDictionary, options: &GrabOptions) -> Result<Self, EpgError> {
        let days = options.days.max(1);
        let start_date = options.start_date.unwrap_or_else(|| config.t_timezone.today());
        let window = if config.no_loop {
            let end_date = start_date.checked_add_days(Days::new(u64::from(days))).unwrap_or(start_date);
            config.t_timezone.day_start(start_date).zip(config.t_timezone.day_start(end_date))
        } else {
            None
        };
        let client = create_client(config.timeout_secs)
            .map_err(|err| config_err!("service {}: {}", config.t_name, err.message))?;
        Ok(Self {
            config,
            normalizer: Normalizer::new(config, dict),
            client,
            start_date,
            days,
            window,
        })
    }

    fn in_window(&self, programme: &ProgramRecord) -> bool {
        self.window.as_ref().map_or(true, |(start, end)| programme.end > *start && programme.start < *end)
    }

    fn process_unit(&self, unit: &FetchUnit, guide: &mut Guide, stats: &mut RunStats) -> Result<(), EpgError> {
        debug_if_enabled!("fetching {} from {}", unit.describe(&self.config.t_name), sanitize_sensitive_info(&unit.url));
        let doc = get_json_content(&self.client, &self.config.t_headers, &unit.url)?;
        let fragments = extract_fragments(&doc, self.config, unit.channel)?;
        trace_if_enabled!("{} yielded {} fragments", unit.describe(&self.config.t_name), fragments.len());
        stats.fragments += fragments.len();
        for fragment in &fragments {
            match self.normalizer.normalize(fragment) {
                Ok(Some(programme)) if self.in_window(&programme) => guide.add_programme(programme),
                Ok(_) => stats.filtered += 1,
                Err(err) => {
                    debug_if_enabled!("{} dropped fragment: {}", unit.describe(&self.config.t_name), err);
                    stats.dropped += 1;
                    stats.warnings.push(format!("{}: {err}", unit.describe(&self.config.t_name)));
                }
            }
        }
        Ok(())
    }

    /// Fetches every unit of the service into `guide`. Unit failures are recorded in `stats`
    /// and skipped.
    fn grab(
        &self,
        channel_override: Option<&str>,
        cancel: &CancelFlag,
        guide: &mut Guide,
        stats: &mut RunStats,
    ) -> Result<(), EpgError> {
        let config = self.config;
        let channels = unit_channels(config, channel_override);
        if !config.has_channel_path() {
            channels.iter()
                .map(ChannelConfig::display_name)
                .filter(|name| config.is_target_channel(name))
                .for_each(|name| guide.add_channel(ChannelRecord::new(name, name)));
        }

        let units = build_units(config, &channels, self.start_date, self.days);
        info!("Grabbing {} ({}): {} requests", config.service_name, config.t_name, units.len());
        for unit in &units {
            if cancel.is_cancelled() {
                warn!("run cancelled, skipping remaining requests of {}", config.t_name);
                break;
            }
            stats.units_total += 1;
            match self.process_unit(unit, guide, stats) {
                Ok(()) => stats.units_ok += 1,
                Err(err) if err.kind.is_fatal() => return Err(err),
                Err(err) => {
                    let err = create_epg_error!(err.kind, "{}: {}", unit.describe(&config.t_name), err.message);
                    warn!("skipped {err}");
                    stats.record_error(&err);
                }
            }
        }
        Ok(())
    }
}

/// Runs every service in order. Every service is set up before the first request, so a
/// descriptor error aborts the run before anything is fetched.
pub fn grab_services(
    services: &[ServiceConfig],
    dict: &MappingDictionary,
    options: &GrabOptions,
    cancel: &CancelFlag,
) -> Result<(Guide, RunStats), EpgError> {
    let grabbers = services.iter()
        .map(|config| ServiceGrabber::new(config, dict, options))
        .collect::<Result<Vec<_>, _>>()?;
    let mut guide = Guide::default();
    let mut stats = RunStats::default();
    for grabber in &grabbers {
        if cancel.is_cancelled() {
            break;
        }
        grabber.grab(options.channel.as_deref(), cancel, &mut guide, &mut stats)?;
    }
    Ok((guide, stats))
}
