use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::{Captures, Regex};

use crate::utils::ServiceTimezone;

pub const TOKEN_DATE_ISO: &str = "ANO-MES-DIA";
pub const TOKEN_DATE_BR: &str = "DIA-MES-ANO";
pub const TOKEN_DATE_BR_SLASH: &str = "DIA/MES/ANO";
pub const TOKEN_CHANNEL_LIST: &str = "LISTACANAIS";
pub const TOKEN_HOURS: &str = "QTDHORAS";
pub const TOKEN_DAYS: &str = "QTDDIAS";
pub const TOKEN_UNIX_START: &str = "UNIXTIMESTART";
pub const TOKEN_UNIX_END: &str = "UNIXTIMEEND";
pub const TOKEN_CHANNEL_ID: &str = "IDCANAL";

static TOKEN_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    let tokens = [TOKEN_DATE_ISO, TOKEN_DATE_BR, TOKEN_DATE_BR_SLASH, TOKEN_CHANNEL_LIST, TOKEN_HOURS,
        TOKEN_DAYS, TOKEN_UNIX_START, TOKEN_UNIX_END, TOKEN_CHANNEL_ID];
    Regex::new(&tokens.map(regex::escape).join("|")).unwrap()
});

/// Values for one fetch unit.
#[derive(Debug, Clone)]
pub struct TemplateContext<'a> {
    pub date: NaiveDate,
    pub days: u32,
    pub timezone: &'a ServiceTimezone,
    pub channel_id: Option<&'a str>,
    pub channel_list: Option<&'a str>,
}

impl TemplateContext<'_> {
    fn token_value(&self, token: &str) -> Option<String> {
        match token {
            TOKEN_DATE_ISO => Some(self.date.format("%Y-%m-%d").to_string()),
            TOKEN_DATE_BR => Some(self.date.format("%d-%m-%Y").to_string()),
            TOKEN_DATE_BR_SLASH => Some(self.date.format("%d/%m/%Y").to_string()),
            TOKEN_HOURS => Some((u64::from(self.days) * 24).to_string()),
            TOKEN_DAYS => Some(self.days.to_string()),
            TOKEN_UNIX_START => self.timezone.unix_day_bounds(self.date).map(|(start, _)| start.to_string()),
            TOKEN_UNIX_END => self.timezone.unix_day_bounds(self.date).map(|(_, end)| end.to_string()),
            TOKEN_CHANNEL_ID => self.channel_id.map(str::to_string),
            TOKEN_CHANNEL_LIST => self.channel_list.map(str::to_string),
            _ => None,
        }
    }
}

/// Replaces every known token in one pass, substituted values are not scanned again.
/// Tokens without a value for this unit stay verbatim.
pub fn expand_url(template: &str, ctx: &TemplateContext) -> String {
    TOKEN_REGEX.replace_all(template, |caps: &Captures| {
        let token = &caps[0];
        ctx.token_value(token).unwrap_or_else(|| token.to_string())
    }).to_string()
}
