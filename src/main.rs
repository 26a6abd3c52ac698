mod epg_error;
mod model;
mod processing;
mod repository;
mod utils;

use std::io::Write;
use std::time::Instant;

use clap::Parser;
use env_logger::{Builder, Env};
use log::{info, warn};

use crate::model::stats::RunStats;
use crate::model::xmltv::Epg;
use crate::processing::grabber::{grab_services, GrabOptions};
use crate::repository::epg_repository::epg_write_file;
use crate::utils::file::config_reader::{read_mapping, read_services};
use crate::utils::file::file_utils::{get_default_config_path, get_default_mappings_path, get_output_path};
use crate::utils::{spawn_signal_listener, CancelFlag};

const VERSION: &str = env!("CARGO_PKG_VERSION");
const BUILD_TIMESTAMP: Option<&str> = option_env!("VERGEN_BUILD_TIMESTAMP");

/// Grabs program guides from json web apis and writes them as XMLTV
#[derive(Parser)]
#[command(name = "epg-grabber", version, about, long_about = None)]
struct Args {
    /// Number of days to grab, starting today
    #[arg(short, long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..))]
    days: u32,

    /// Service to grab, repeatable. Default is every descriptor in the services directory
    #[arg(short = 's', long = "service")]
    services: Vec<String>,

    /// Grab only this channel id
    #[arg(short, long)]
    channel: Option<String>,

    /// Output file, or an existing directory for the default file name
    #[arg(short, long)]
    output: Option<String>,

    /// Directory with mappings.yaml and services/
    #[arg(long = "config-dir")]
    config_dir: Option<String>,

    /// Log level (error, warn, info, debug, trace) or an env_logger filter
    #[arg(short = 'l', long = "log-level")]
    log_level: Option<String>,
}

fn init_logger(log_level: Option<&str>) {
    let mut log_builder = Builder::from_env(Env::default().default_filter_or("info"));
    if let Some(level) = log_level {
        log_builder.parse_filters(level);
    }
    log_builder.format(|buf, record| {
        writeln!(buf, "{} [{:<5}] {}", chrono::Local::now().format("%Y-%m-%d %H:%M:%S"), record.level(), record.args())
    });
    log_builder.init();
}

fn log_summary(stats: &RunStats) {
    info!("Stats: {stats}");
    if stats.has_warnings() {
        warn!("{} problems during the run:", stats.warnings.len());
        for line in stats.warning_summary() {
            warn!("  {line}");
        }
    }
}

fn main() {
    let args = Args::parse();
    init_logger(args.log_level.as_deref());

    info!("Version: {VERSION}");
    if let Some(build_ts) = BUILD_TIMESTAMP {
        info!("Build time: {build_ts}");
    }

    let config_path = args.config_dir.clone().unwrap_or_else(get_default_config_path);
    info!("Config dir: {config_path}");
    let services = read_services(&config_path, &args.services).unwrap_or_else(|err| exit!("{err}"));
    let dict = read_mapping(&get_default_mappings_path(&config_path)).unwrap_or_else(|err| exit!("{err}"));

    let options = GrabOptions { days: args.days, channel: args.channel.clone(), start_date: None };
    let cancel = CancelFlag::new();
    if let Err(err) = spawn_signal_listener(cancel.clone()) {
        warn!("Cant listen for shutdown signals: {err}");
    }
    let start_time = Instant::now();
    let (guide, mut stats) = grab_services(&services, &dict, &options, &cancel).unwrap_or_else(|err| exit!("{err}"));
    if cancel.is_cancelled() {
        exit!("Run cancelled, no guide written");
    }
    let (channels, programmes) = guide.finish(&mut stats);
    if stats.units_ok == 0 {
        log_summary(&stats);
        exit!("No request succeeded, no guide written");
    }

    let service_names: Vec<String> = services.iter().map(|s| s.t_name.clone()).collect();
    let output = get_output_path(args.output.as_deref(), &service_names);
    epg_write_file(&Epg { channels: &channels, programmes: &programmes }, &output).unwrap_or_else(|err| exit!("{err}"));
    info!("Guide written to {}", output.to_str().unwrap_or("?"));
    log_summary(&stats);
    info!("Grab finished! Took {} secs.", start_time.elapsed().as_secs());
}
