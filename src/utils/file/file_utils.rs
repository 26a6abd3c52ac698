use std::fs;
use std::fs::File;
use std::path::{Path, PathBuf};

use path_clean::PathClean;

const CONFIG_PATH: &str = "config";
const SERVICES_DIR: &str = "services";
const MAPPING_FILE: &str = "mappings.yaml";
const DEFAULT_OUTPUT_FILE: &str = "epg.xml";
pub const SERVICE_FILE_EXTENSIONS: &[&str] = &["yaml", "yml"];

pub fn get_exe_path() -> PathBuf {
    let default_path = PathBuf::from("./");
    match std::env::current_exe() {
        Ok(exe) => match fs::read_link(&exe) {
            Ok(f) => f.parent().map_or(default_path, Path::to_path_buf),
            Err(_) => exe.parent().map_or(default_path, Path::to_path_buf),
        },
        Err(_) => default_path,
    }
}

fn get_default_path(file: &str) -> String {
    let default_path = get_exe_path().join(file);
    String::from(if default_path.exists() {
        default_path.to_str().unwrap_or(file)
    } else {
        file
    })
}

/// `config` next to the executable when it exists, otherwise `./config`.
#[inline]
pub fn get_default_config_path() -> String {
    get_default_path(CONFIG_PATH)
}

#[inline]
pub fn get_services_dir(config_path: &str) -> PathBuf {
    PathBuf::from(config_path).join(SERVICES_DIR)
}

#[inline]
pub fn get_default_mappings_path(config_path: &str) -> PathBuf {
    PathBuf::from(config_path).join(MAPPING_FILE)
}

/// `<config>/services/<name>.yaml`, or `.yml`.
pub fn find_service_file(config_path: &str, name: &str) -> Option<PathBuf> {
    let services_dir = get_services_dir(config_path);
    SERVICE_FILE_EXTENSIONS.iter()
        .map(|ext| services_dir.join(format!("{name}.{ext}")))
        .find(|path| path.is_file())
}

#[inline]
pub fn open_file(file_name: &Path) -> Result<File, std::io::Error> {
    File::open(file_name)
}

pub fn get_file_path(wd: &str, path: Option<PathBuf>) -> Option<PathBuf> {
    path.map(|p| if p.is_relative() {
        PathBuf::from(wd).join(&p).clean()
    } else {
        p
    })
}

#[inline]
pub fn sanitize_filename(file_name: &str) -> String {
    file_name
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '_' || c == '-' { c } else { '_' })
        .collect()
}

/// Name of the guide file: `<service>_epg.xml` for one service, `epg.xml` otherwise.
pub fn get_output_file_name(services: &[String]) -> String {
    match services {
        [single] => format!("{}_{DEFAULT_OUTPUT_FILE}", sanitize_filename(single)),
        _ => DEFAULT_OUTPUT_FILE.to_string(),
    }
}

/// `--output` is taken as a file path unless it names an existing directory, in which
/// case the default file name is placed inside it.
pub fn get_output_path(output: Option<&str>, services: &[String]) -> PathBuf {
    let file_name = get_output_file_name(services);
    match output {
        Some(out) if Path::new(out).is_dir() => PathBuf::from(out).join(file_name).clean(),
        Some(out) => get_file_path(".", Some(PathBuf::from(out))).unwrap_or_else(|| PathBuf::from(out)),
        None => PathBuf::from(file_name),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_path() {
        let dir = tempfile::tempdir().unwrap();
        let dir_str = dir.path().to_str().unwrap();
        let single = vec!["claro tv".to_string()];
        let many = vec!["a".to_string(), "b".to_string()];
        assert_eq!(get_output_path(Some(dir_str), &single), dir.path().join("claro_tv_epg.xml"));
        assert_eq!(get_output_path(Some(dir_str), &many), dir.path().join("epg.xml"));
        assert_eq!(get_output_path(None, &many), PathBuf::from("epg.xml"));
        assert_eq!(get_output_path(Some("out/../guide.xml"), &single), PathBuf::from("guide.xml"));
    }

    #[test]
    fn test_find_service_file() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join(SERVICES_DIR)).unwrap();
        fs::write(dir.path().join(SERVICES_DIR).join("globo.yml"), "api_url: x").unwrap();
        let config_path = dir.path().to_str().unwrap();
        assert_eq!(find_service_file(config_path, "globo"), Some(dir.path().join("services/globo.yml")));
        assert_eq!(find_service_file(config_path, "band"), None);
    }
}
