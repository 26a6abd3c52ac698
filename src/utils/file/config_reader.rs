use std::env;
use std::fs;
use std::path::Path;
use std::sync::LazyLock;

use log::{debug, warn};
use regex::Regex;

use crate::epg_error::{config_err, EpgError};
use crate::model::config_service::ServiceConfig;
use crate::model::mapping::MappingDictionary;
use crate::utils::file::file_utils::{self, SERVICE_FILE_EXTENSIONS};

static ENV_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\$\{env:(?P<var>[a-zA-Z_][a-zA-Z0-9_]*)}").unwrap());

/// Replaces `${env:NAME}` with the variable's value, unknown variables stay as written.
pub fn resolve_env_var(value: &str) -> String {
    ENV_REGEX.replace_all(value, |caps: &regex::Captures| {
        let var_name = &caps["var"];
        env::var(var_name).unwrap_or_else(|_| format!("${{env:{var_name}}}"))
    }).to_string()
}

pub fn read_service_config(path: &Path, name: &str) -> Result<ServiceConfig, EpgError> {
    let file = file_utils::open_file(path)
        .map_err(|err| config_err!("cant read service file {}: {}", path.to_string_lossy(), err))?;
    let mut config: ServiceConfig = serde_yaml::from_reader(file)
        .map_err(|err| config_err!("cant parse service file {}: {}", path.to_string_lossy(), err))?;
    config.prepare(name)?;
    debug!("loaded service {name} from {}", path.to_string_lossy());
    Ok(config)
}

/// Sorted names of every descriptor in the services directory.
pub fn list_services(config_path: &str) -> Result<Vec<String>, EpgError> {
    let services_dir = file_utils::get_services_dir(config_path);
    let entries = fs::read_dir(&services_dir)
        .map_err(|err| config_err!("cant read services directory {}: {}", services_dir.to_string_lossy(), err))?;
    let mut names: Vec<String> = entries
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|path| path.is_file())
        .filter(|path| path.extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| SERVICE_FILE_EXTENSIONS.contains(&ext)))
        .filter_map(|path| path.file_stem().and_then(|stem| stem.to_str()).map(str::to_string))
        .collect();
    names.sort();
    names.dedup();
    Ok(names)
}

/// Loads the requested services, or every service found when none is requested.
pub fn read_services(config_path: &str, requested: &[String]) -> Result<Vec<ServiceConfig>, EpgError> {
    let names = if requested.is_empty() { list_services(config_path)? } else { requested.to_vec() };
    if names.is_empty() {
        return Err(config_err!("no service descriptors found in {}", file_utils::get_services_dir(config_path).to_string_lossy()));
    }
    names.iter().map(|name| {
        let path = file_utils::find_service_file(config_path, name)
            .ok_or_else(|| config_err!("service {name} not found in {}", file_utils::get_services_dir(config_path).to_string_lossy()))?;
        read_service_config(&path, name)
    }).collect()
}

/// A missing dictionary is not an error, every lookup then passes values through.
pub fn read_mapping(mapping_file: &Path) -> Result<MappingDictionary, EpgError> {
    let mut mapping = if let Ok(file) = file_utils::open_file(mapping_file) {
        serde_yaml::from_reader::<_, MappingDictionary>(file)
            .map_err(|err| config_err!("cant parse mapping file {}: {}", mapping_file.to_string_lossy(), err))?
    } else {
        warn!("cant read mapping file: {}", mapping_file.to_str().unwrap_or("?"));
        MappingDictionary::default()
    };
    mapping.prepare()?;
    Ok(mapping)
}

#[cfg(test)]
mod tests {
    use crate::epg_error::EpgErrorKind;
    use super::*;

    const SERVICE: &str = "api_url: https://x/ANO-MES-DIA\nservice_name: Example\nprogram_title: title\nstart_time: start\nduration: dur\n";

    #[test]
    fn test_resolve() {
        let resolved = resolve_env_var("${env:HOME}");
        assert_eq!(resolved, std::env::var("HOME").unwrap());
        assert_eq!(resolve_env_var("${env:EPG_GRABBER_SURELY_UNSET}"), "${env:EPG_GRABBER_SURELY_UNSET}");
    }

    #[test]
    fn test_read_services() {
        let dir = tempfile::tempdir().unwrap();
        let services = dir.path().join("services");
        fs::create_dir_all(&services).unwrap();
        fs::write(services.join("globo.yaml"), SERVICE).unwrap();
        fs::write(services.join("band.yml"), SERVICE).unwrap();
        fs::write(services.join("notes.txt"), "ignored").unwrap();
        let config_path = dir.path().to_str().unwrap();

        assert_eq!(list_services(config_path).unwrap(), vec!["band", "globo"]);
        let loaded = read_services(config_path, &[]).unwrap();
        assert_eq!(loaded.iter().map(|s| s.t_name.as_str()).collect::<Vec<_>>(), vec!["band", "globo"]);
        let err = read_services(config_path, &["sbt".to_string()]).unwrap_err();
        assert_eq!(err.kind, EpgErrorKind::Config);
    }

    #[test]
    fn test_invalid_service() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.yaml");
        fs::write(&path, "service_name: Broken\n").unwrap();
        assert_eq!(read_service_config(&path, "broken").unwrap_err().kind, EpgErrorKind::Config);
    }

    #[test]
    fn test_read_mapping() {
        let dir = tempfile::tempdir().unwrap();
        let missing = read_mapping(&dir.path().join("mappings.yaml")).unwrap();
        assert!(missing.competitions.is_empty());
        assert_eq!(missing.rating("AGE87"), Some("14"));

        let path = dir.path().join("mappings.yaml");
        fs::write(&path, "genres:\n  Futebol: Sports\n").unwrap();
        assert_eq!(read_mapping(&path).unwrap().translate_genre("Futebol"), "Sports");

        fs::write(&path, "genres: [unclosed\n").unwrap();
        assert_eq!(read_mapping(&path).unwrap_err().kind, EpgErrorKind::Config);
    }
}
