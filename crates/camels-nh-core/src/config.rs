use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

/// Default location of the configuration file when neither `--config` nor
/// `CAMELS_NH_CONFIG` is given.
pub const DEFAULT_CONFIG_PATH: &str = "camels_nh.toml";
pub const CONFIG_ENV_VAR: &str = "CAMELS_NH_CONFIG";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("config field '{0}' must not be empty")]
    Empty(&'static str),
    #[error("data source '{0}' is listed more than once")]
    DuplicateSource(String),
    #[error("sum variable '{0}' is not an input variable")]
    UnknownSumVar(String),
    #[error("target variable '{0}' is also an input variable")]
    TargetIsInput(String),
    #[error("country '{0}' must be a three character code")]
    InvalidCountry(String),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConvertConfig {
    pub paths: PathsConfig,
    pub dataset: DatasetConfig,
    #[serde(default)]
    pub unusable: Option<UnusableConfig>,
    #[serde(default)]
    pub selection: SelectionConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PathsConfig {
    pub source_root: PathBuf,
    pub output_root: PathBuf,
    #[serde(default = "default_forcing_subdir")]
    pub forcing_subdir: PathBuf,
    #[serde(default = "default_target_subdir")]
    pub target_subdir: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DatasetConfig {
    pub countries: Vec<String>,
    pub data_sources: Vec<String>,
    pub input_vars: Vec<String>,
    #[serde(default)]
    pub sum_vars: Vec<String>,
    pub target_vars: Vec<String>,
    #[serde(default)]
    pub extreme_vars: Option<Vec<String>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UnusableConfig {
    /// Relative to `paths.output_root` unless absolute.
    pub table: PathBuf,
    #[serde(default)]
    pub reason_filter: Option<String>,
    #[serde(default = "default_id_column")]
    pub id_column: String,
    #[serde(default = "default_reason_column")]
    pub reason_column: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SelectionConfig {
    #[serde(default)]
    pub allowlist: Option<PathBuf>,
}

fn default_forcing_subdir() -> PathBuf {
    PathBuf::from("forcing")
}

fn default_target_subdir() -> PathBuf {
    PathBuf::from("observations")
}

fn default_id_column() -> String {
    "Station_id".to_string()
}

fn default_reason_column() -> String {
    "Reason".to_string()
}

impl ConvertConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: ConvertConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let dataset = &self.dataset;
        if dataset.countries.is_empty() {
            return Err(ConfigError::Empty("dataset.countries"));
        }
        if dataset.data_sources.is_empty() {
            return Err(ConfigError::Empty("dataset.data_sources"));
        }
        if dataset.input_vars.is_empty() {
            return Err(ConfigError::Empty("dataset.input_vars"));
        }
        if dataset.target_vars.is_empty() {
            return Err(ConfigError::Empty("dataset.target_vars"));
        }

        for country in &dataset.countries {
            if country.chars().count() != 3 {
                return Err(ConfigError::InvalidCountry(country.clone()));
            }
        }

        let mut seen = HashSet::new();
        for source in &dataset.data_sources {
            if !seen.insert(source.as_str()) {
                return Err(ConfigError::DuplicateSource(source.clone()));
            }
        }

        for var in &dataset.sum_vars {
            if !dataset.input_vars.contains(var) {
                return Err(ConfigError::UnknownSumVar(var.clone()));
            }
        }

        for var in &dataset.target_vars {
            if dataset.input_vars.contains(var) {
                return Err(ConfigError::TargetIsInput(var.clone()));
            }
        }

        Ok(())
    }

    pub fn basin_data_dir(&self) -> PathBuf {
        self.paths.source_root.join("basin_data")
    }

    pub fn unusable_table_path(&self) -> Option<PathBuf> {
        self.unusable
            .as_ref()
            .map(|unusable| self.paths.output_root.join(&unusable.table))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID: &str = r#"
[paths]
source_root = "/data/camels_spat"
output_root = "/data/out"

[dataset]
countries = ["CAN", "USA"]
data_sources = ["ERA5", "EM_EARTH"]
input_vars = ["mtpr", "t", "prcp", "tmean"]
sum_vars = ["mtpr", "prcp"]
target_vars = ["q_obs"]

[unusable]
table = "unusable.csv"
reason_filter = "streamflow"
"#;

    #[test]
    fn parses_with_defaults() {
        let config = ConvertConfig::from_toml_str(VALID).unwrap();
        assert_eq!(config.paths.forcing_subdir, PathBuf::from("forcing"));
        assert_eq!(config.paths.target_subdir, PathBuf::from("observations"));
        assert!(config.dataset.extreme_vars.is_none());
        let unusable = config.unusable.as_ref().unwrap();
        assert_eq!(unusable.id_column, "Station_id");
        assert_eq!(unusable.reason_column, "Reason");
        assert_eq!(
            config.unusable_table_path(),
            Some(PathBuf::from("/data/out/unusable.csv"))
        );
        assert!(config.selection.allowlist.is_none());
    }

    #[test]
    fn rejects_duplicate_sources() {
        let text = VALID.replace(r#"["ERA5", "EM_EARTH"]"#, r#"["ERA5", "ERA5"]"#);
        let err = ConvertConfig::from_toml_str(&text).unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateSource(ref s) if s == "ERA5"));
    }

    #[test]
    fn rejects_sum_vars_outside_inputs() {
        let text = VALID.replace(r#"sum_vars = ["mtpr", "prcp"]"#, r#"sum_vars = ["snow"]"#);
        let err = ConvertConfig::from_toml_str(&text).unwrap_err();
        assert!(matches!(err, ConfigError::UnknownSumVar(ref s) if s == "snow"));
    }

    #[test]
    fn rejects_bad_country_codes_and_empty_lists() {
        let text = VALID.replace(r#"["CAN", "USA"]"#, r#"["CANADA"]"#);
        assert!(matches!(
            ConvertConfig::from_toml_str(&text).unwrap_err(),
            ConfigError::InvalidCountry(_)
        ));

        let text = VALID.replace(r#"target_vars = ["q_obs"]"#, "target_vars = []");
        assert!(matches!(
            ConvertConfig::from_toml_str(&text).unwrap_err(),
            ConfigError::Empty("dataset.target_vars")
        ));
    }

    #[test]
    fn unknown_fields_are_parse_errors() {
        let text = format!("{VALID}\n[extra]\nkey = 1\n");
        assert!(matches!(
            ConvertConfig::from_toml_str(&text).unwrap_err(),
            ConfigError::Parse(_)
        ));
    }
}
