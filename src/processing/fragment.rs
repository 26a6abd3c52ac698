use log::debug;
use serde_json::Value;

use crate::epg_error::{create_epg_error_result, EpgError, EpgErrorKind};
use crate::model::config_service::{ChannelConfig, ServiceConfig};
use crate::processing::json_path::{get_path, get_text};

/// Json sub-tree of one programme and the channel it belongs to.
#[derive(Debug, Clone, PartialEq)]
pub struct Fragment<'a> {
    pub channel: String,
    pub value: &'a Value,
}

fn as_nodes(value: &Value) -> Vec<&Value> {
    match value {
        Value::Array(items) => items.iter().filter(|v| !v.is_null()).collect(),
        Value::Null => vec![],
        other => vec![other],
    }
}

/// Channel of a fragment: the `channel` path on the container, then on the programme itself,
/// then the configured channel of the unit, then the service name.
fn resolve_channel(
    config: &ServiceConfig,
    container: &Value,
    program: &Value,
    unit_channel: Option<&ChannelConfig>,
) -> String {
    let channel_path = config.fields.channel.as_ref();
    get_text(container, channel_path)
        .or_else(|| get_text(program, channel_path))
        .or_else(|| unit_channel.map(|c| c.display_name().to_string()))
        .unwrap_or_else(|| config.service_name.clone())
}

/// Splits a response document into programme fragments.
///
/// `api_level_1` leads from the root to the channel containers, `api_level_2` from each
/// container to its programmes. A missing level means the node itself is used.
pub fn extract_fragments<'a>(
    doc: &'a Value,
    config: &ServiceConfig,
    unit_channel: Option<&ChannelConfig>,
) -> Result<Vec<Fragment<'a>>, EpgError> {
    let level_1 = match &config.api_level_1 {
        Some(path) => match get_path(doc, path) {
            Some(node) => node,
            None => return create_epg_error_result!(EpgErrorKind::Parse, "api_level_1 path {} not found in response", path),
        },
        None => doc,
    };

    let mut fragments = vec![];
    for container in as_nodes(level_1) {
        let programs = match &config.api_level_2 {
            Some(path) => match get_path(container, path) {
                Some(node) => as_nodes(node),
                None => {
                    debug!("api_level_2 path {path} not found in container");
                    continue;
                }
            },
            None => vec![container],
        };
        for program in programs {
            if !program.is_object() {
                continue;
            }
            fragments.push(Fragment {
                channel: resolve_channel(config, container, program, unit_channel),
                value: program,
            });
        }
    }
    Ok(fragments)
}
