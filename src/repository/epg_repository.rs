use std::fs;
use std::io::{Cursor, Write};
use std::path::Path;

use log::{debug, log_enabled, Level};
use quick_xml::Writer;
use tempfile::NamedTempFile;

use crate::epg_error::{EpgError, EpgErrorKind};
use crate::model::xmltv::{Epg, XMLTV_HEADER};

fn write_error(path: &Path, err: impl std::fmt::Display) -> EpgError {
    EpgError::new(EpgErrorKind::Write, format!("failed to write epg: {} - {}", path.to_str().unwrap_or("?"), err))
}

/// Serializes the guide and replaces `path` atomically. The document is written to a
/// temporary file next to the target and renamed, so a failed run leaves no partial file.
pub fn epg_write_file(epg: &Epg, path: &Path) -> Result<(), EpgError> {
    let mut writer = Writer::new_with_indent(Cursor::new(vec![]), b' ', 2);
    epg.write_to(&mut writer).map_err(|err| write_error(path, err))?;
    let content = writer.into_inner().into_inner();

    let parent = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent).map_err(|err| write_error(path, err))?;
    let mut tmp_file = NamedTempFile::new_in(parent).map_err(|err| write_error(path, err))?;
    tmp_file.write_all(XMLTV_HEADER.as_bytes()).map_err(|err| write_error(path, err))?;
    tmp_file.write_all(&content).map_err(|err| write_error(path, err))?;
    tmp_file.write_all(b"\n").map_err(|err| write_error(path, err))?;
    tmp_file.flush().map_err(|err| write_error(path, err))?;
    tmp_file.persist(path).map_err(|err| write_error(path, err.error))?;

    if log_enabled!(Level::Debug) {
        debug!("Epg with {} channels and {} programmes written to {}", epg.channels.len(), epg.programmes.len(), path.to_str().unwrap_or("?"));
    }
    Ok(())
}
