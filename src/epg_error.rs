use std::error::Error;
use std::fmt::{Display, Formatter, Result};

#[macro_export]
macro_rules! create_epg_error {
     ($kind: expr, $($arg:tt)*) => {
        $crate::epg_error::EpgError::new($kind, format!($($arg)*))
    }
}

#[macro_export]
macro_rules! create_epg_error_result {
     ($kind: expr, $($arg:tt)*) => {
        Err($crate::epg_error::EpgError::new($kind, format!($($arg)*)))
    }
}

#[macro_export]
macro_rules! config_err {
    ($($arg:tt)*) => {
        $crate::epg_error::EpgError::new($crate::epg_error::EpgErrorKind::Config, format!($($arg)*))
    }
}

pub use create_epg_error;
pub use create_epg_error_result;
pub use config_err;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum EpgErrorKind {
    /// missing or malformed service descriptor or mapping dictionary, aborts the run
    Config,
    /// http failure or timeout for one fetch unit
    Fetch,
    /// invalid json or unusable fragment
    Parse,
    /// output path not writable, aborts the run
    Write,
}

impl EpgErrorKind {
    pub const fn is_fatal(self) -> bool {
        matches!(self, Self::Config | Self::Write)
    }
}

impl Display for EpgErrorKind {
    fn fmt(&self, f: &mut Formatter) -> Result {
        write!(f, "{}", match self {
            Self::Config => "config",
            Self::Fetch => "fetch",
            Self::Parse => "parse",
            Self::Write => "write",
        })
    }
}

#[derive(Debug)]
pub struct EpgError {
    pub kind: EpgErrorKind,
    pub message: String,
}

impl EpgError {
    pub const fn new(kind: EpgErrorKind, message: String) -> Self {
        Self {
            kind,
            message,
        }
    }
}

impl Display for EpgError {
    fn fmt(&self, f: &mut Formatter) -> Result {
        write!(f, "{} error: {}", self.kind, self.message)
    }
}

impl Error for EpgError {}

#[cfg(test)]
mod tests {
    use super::{EpgError, EpgErrorKind};

    #[test]
    fn test_display_and_kind() {
        let err: Result<(), EpgError> = create_epg_error_result!(EpgErrorKind::Fetch, "status {} for {}", 404, "globo");
        let err = err.unwrap_err();
        assert_eq!(err.to_string(), "fetch error: status 404 for globo");
        assert!(!err.kind.is_fatal());
        assert!(config_err!("missing {}", "api_url").kind.is_fatal());
    }
}
