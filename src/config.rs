use std::io;
use std::path::Path;

use config::{Config, ConfigError, Environment, File as ConfigFile};
use serde::Deserialize;
use tracing::warn;

use crate::error::Error;
use crate::exclusion::ExclusionRules;
use crate::inventory::ConnectionParams;

pub const DEFAULT_HOLDING_FOLDER: &str = "Discovered virtual machine";
pub const ENV_PREFIX: &str = "VMFOLDERS";

/// Settings from `Config.toml` and `VMFOLDERS_*` environment variables.
/// Command-line flags are layered on top by the binary.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: Option<String>,
    pub user: Option<String>,
    pub password: Option<String>,
    pub datacenter: Option<String>,
    pub holding_folder: String,
    /// Patterns excluding both folders and VMs.
    pub exclude: Vec<String>,
    pub exclude_vm: Vec<String>,
    pub exclude_folder: Vec<String>,
    /// Deprecated single exclusion list, treated like `exclude`.
    pub ignore_patterns: Vec<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            server: None,
            user: None,
            password: None,
            datacenter: None,
            holding_folder: DEFAULT_HOLDING_FOLDER.to_string(),
            exclude: Vec::new(),
            exclude_vm: Vec::new(),
            exclude_folder: Vec::new(),
            ignore_patterns: Vec::new(),
        }
    }
}

/// Load `Config.toml` (or `file` when given) if present, then environment
/// overrides.
pub fn load_configuration(file: Option<&Path>) -> Result<AppConfig, ConfigError> {
    let file_source = match file {
        Some(path) => ConfigFile::from(path).required(true),
        None => ConfigFile::with_name("Config").required(false),
    };
    // list keys take comma-separated values, e.g. VMFOLDERS_EXCLUDE=Temp*,Old
    let environment = Environment::with_prefix(ENV_PREFIX)
        .try_parsing(true)
        .list_separator(",")
        .with_list_parse_key("exclude")
        .with_list_parse_key("exclude_vm")
        .with_list_parse_key("exclude_folder")
        .with_list_parse_key("ignore_patterns");
    let builder = Config::builder()
        .add_source(file_source)
        .add_source(environment)
        .build()?;
    builder.try_deserialize::<AppConfig>()
}

impl AppConfig {
    pub fn datacenter(&self) -> Result<&str, Error> {
        non_empty(&self.datacenter).ok_or(Error::MissingParameter("datacenter"))
    }

    /// Build connection parameters, asking `prompt_password` only when no
    /// password was configured.
    pub fn connection_params<F>(&self, prompt_password: F) -> Result<ConnectionParams, Error>
    where
        F: FnOnce(&str) -> io::Result<String>,
    {
        let server = non_empty(&self.server).ok_or(Error::MissingParameter("server"))?;
        let user = non_empty(&self.user).ok_or(Error::MissingParameter("user"))?;
        let password = match &self.password {
            Some(password) => password.clone(),
            None => prompt_password(&format!("Password for {}@{}: ", user, server))?,
        };
        Ok(ConnectionParams {
            server: server.to_string(),
            user: user.to_string(),
            password,
        })
    }

    pub fn exclusion_rules(&self) -> Result<ExclusionRules, Error> {
        let mut general = self.exclude.clone();
        if !self.ignore_patterns.is_empty() {
            warn!("'ignore_patterns' is deprecated, use 'exclude', 'exclude_vm' or 'exclude_folder'");
            general.extend(self.ignore_patterns.iter().cloned());
        }
        ExclusionRules::new(&general, &self.exclude_folder, &self.exclude_vm)
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::folder_path::FolderPath;
    use std::io::Write;

    fn full() -> AppConfig {
        AppConfig {
            server: Some("file:lab.json".to_string()),
            user: Some("admin".to_string()),
            password: Some("secret".to_string()),
            datacenter: Some("DC1".to_string()),
            ..AppConfig::default()
        }
    }

    #[test]
    fn test_default_holding_folder() {
        assert_eq!(AppConfig::default().holding_folder, DEFAULT_HOLDING_FOLDER);
    }

    #[test]
    fn test_missing_parameters_are_named() {
        let mut config = full();
        config.server = None;
        let err = config.connection_params(|_| unreachable!()).unwrap_err();
        assert!(matches!(err, Error::MissingParameter("server")));

        let mut config = full();
        config.user = Some("  ".to_string());
        let err = config.connection_params(|_| unreachable!()).unwrap_err();
        assert!(matches!(err, Error::MissingParameter("user")));

        let mut config = full();
        config.datacenter = None;
        assert!(matches!(config.datacenter(), Err(Error::MissingParameter("datacenter"))));
    }

    #[test]
    fn test_password_prompt_only_when_missing() {
        let params = full().connection_params(|_| unreachable!()).unwrap();
        assert_eq!(params.password, "secret");

        let mut config = full();
        config.password = None;
        let params = config
            .connection_params(|prompt| {
                assert!(prompt.contains("admin@file:lab.json"));
                Ok("typed".to_string())
            })
            .unwrap();
        assert_eq!(params.password, "typed");
    }

    #[test]
    fn test_deprecated_list_applies_to_both() {
        let config = AppConfig {
            ignore_patterns: vec!["Temp*".to_string()],
            exclude_vm: vec!["**/scratch".to_string()],
            ..AppConfig::default()
        };
        let rules = config.exclusion_rules().unwrap();
        assert!(rules.excludes_folder(&FolderPath::root("Temp01")));
        assert!(rules.excludes_vm("Temp01"));
        assert!(rules.excludes_vm("Eng/scratch"));
        assert!(!rules.excludes_folder(&"Eng/scratch".parse().unwrap()));
    }

    #[test]
    fn test_bad_pattern_is_a_configuration_error() {
        let config = AppConfig {
            exclude_folder: vec!["[oops".to_string()],
            ..AppConfig::default()
        };
        assert!(matches!(config.exclusion_rules(), Err(Error::Pattern { .. })));
    }

    #[test]
    fn test_load_from_explicit_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "server = \"file:lab.json\"\ndatacenter = \"DC1\"\nexclude_folder = [\"Engineering/Archived\"]"
        )
        .unwrap();
        let config = load_configuration(Some(file.path())).unwrap();
        assert_eq!(config.server.as_deref(), Some("file:lab.json"));
        assert_eq!(config.datacenter().unwrap(), "DC1");
        assert_eq!(config.exclude_folder, vec!["Engineering/Archived".to_string()]);
        assert_eq!(config.holding_folder, DEFAULT_HOLDING_FOLDER);
    }
}
