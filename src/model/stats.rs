use std::fmt::Display;

use crate::epg_error::{EpgError, EpgErrorKind};

const MAX_REPORTED_WARNINGS: usize = 20;

/// Counters and recoverable problems of one run, logged as the end-of-run summary.
#[derive(Debug, Clone, Default)]
pub struct RunStats {
    pub units_total: usize,
    pub units_ok: usize,
    pub fetch_errors: usize,
    pub parse_errors: usize,
    pub fragments: usize,
    pub dropped: usize,
    pub filtered: usize,
    pub duplicates: usize,
    pub programmes: usize,
    pub channels: usize,
    pub warnings: Vec<String>,
}

impl RunStats {
    pub fn record_error(&mut self, err: &EpgError) {
        match err.kind {
            EpgErrorKind::Fetch => self.fetch_errors += 1,
            EpgErrorKind::Parse => self.parse_errors += 1,
            EpgErrorKind::Config | EpgErrorKind::Write => {}
        }
        self.warnings.push(err.to_string());
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }

    /// At most the first few warnings, followed by a count of the rest.
    pub fn warning_summary(&self) -> Vec<String> {
        let mut lines: Vec<String> = self.warnings.iter().take(MAX_REPORTED_WARNINGS).cloned().collect();
        if self.warnings.len() > MAX_REPORTED_WARNINGS {
            lines.push(format!("... and {} more", self.warnings.len() - MAX_REPORTED_WARNINGS));
        }
        lines
    }
}

impl Display for RunStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{{\"units\": {}/{}, \"fetch_errors\": {}, \"parse_errors\": {}, \"fragments\": {}, \"dropped\": {}, \"filtered\": {}, \"duplicates\": {}, \"channels\": {}, \"programmes\": {}}}",
               self.units_ok, self.units_total, self.fetch_errors, self.parse_errors,
               self.fragments, self.dropped, self.filtered, self.duplicates,
               self.channels, self.programmes)
    }
}
