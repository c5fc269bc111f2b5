//! Configuration Management
//!
//! Profiles live in a YAML file under the user's config directory:
//!
//! ```yaml
//! default_profile: dev
//! profiles:
//!   dev:
//!     region: eu-west-1
//!     endpoint: https://api.example.test
//!     describe_images_owners: ["123456789012", self]
//!     legacy_sort: false
//! ```

use crate::resource::{SortMode, DEFAULT_PAGE_SIZE};
use anyhow::{Context, Result};
use serde::{Deserialize, Deserializer};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Environment variable overriding the profile's endpoint
pub const ENDPOINT_ENV: &str = "AEC_ENDPOINT";
/// Environment variable overriding the profile's region
pub const REGION_ENV: &str = "AEC_REGION";

/// Contents of the config file
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub default_profile: Option<String>,
    #[serde(default)]
    pub profiles: HashMap<String, Profile>,
}

/// Settings for one account/region
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Profile {
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default = "default_page_size")]
    pub page_size: usize,
    /// Image owners searched when no owner is given
    #[serde(default, deserialize_with = "string_or_list")]
    pub describe_images_owners: Vec<String>,
    /// Image name substring used when none is given
    #[serde(default)]
    pub describe_images_name_match: Option<String>,
    /// Sort by the concatenated sort columns instead of column by column
    #[serde(default)]
    pub legacy_sort: bool,
}

fn default_page_size() -> usize {
    DEFAULT_PAGE_SIZE
}

impl Default for Profile {
    fn default() -> Self {
        Self {
            region: None,
            endpoint: None,
            page_size: DEFAULT_PAGE_SIZE,
            describe_images_owners: Vec::new(),
            describe_images_name_match: None,
            legacy_sort: false,
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

fn string_or_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<OneOrMany>::deserialize(deserializer)? {
        None => Vec::new(),
        Some(OneOrMany::One(s)) => vec![s],
        Some(OneOrMany::Many(v)) => v,
    })
}

impl Config {
    /// Default config file path
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("aec").join("config.yaml"))
    }

    /// Load configuration from `path`
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            anyhow::bail!("No config file {}", path.display());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }

    /// Load from `path`, or the default location when `None`
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load_from(path),
            None => {
                let path = Self::default_path()
                    .context("Could not determine the user config directory")?;
                Self::load_from(&path)
            }
        }
    }

    /// Select `name`, or the default profile when `None`
    pub fn profile(&self, name: Option<&str>) -> Result<(String, Profile)> {
        let name = match name.or(self.default_profile.as_deref()) {
            Some(name) => name,
            None => anyhow::bail!("No profile supplied and no default_profile set"),
        };

        let profile = self
            .profiles
            .get(name)
            .cloned()
            .with_context(|| format!("Missing profile {}", name))?;

        Ok((name.to_string(), profile))
    }
}

impl Profile {
    /// Apply explicit endpoint/region overrides
    pub fn with_overrides(mut self, endpoint: Option<String>, region: Option<String>) -> Self {
        if let Some(endpoint) = endpoint.filter(|e| !e.is_empty()) {
            self.endpoint = Some(endpoint);
        }
        if let Some(region) = region.filter(|r| !r.is_empty()) {
            self.region = Some(region);
        }
        self
    }

    /// Apply `AEC_ENDPOINT` / `AEC_REGION`
    pub fn with_env_overrides(self) -> Self {
        let endpoint = std::env::var(ENDPOINT_ENV).ok();
        let region = std::env::var(REGION_ENV).ok();
        self.with_overrides(endpoint, region)
    }

    pub fn endpoint(&self) -> Result<&str> {
        self.endpoint
            .as_deref()
            .with_context(|| format!("No endpoint configured; set it in the profile or {}", ENDPOINT_ENV))
    }

    pub fn region(&self) -> Result<&str> {
        self.region
            .as_deref()
            .with_context(|| format!("No region configured; set it in the profile or {}", REGION_ENV))
    }

    pub fn sort_mode(&self) -> SortMode {
        if self.legacy_sort {
            SortMode::Concatenated
        } else {
            SortMode::Tuple
        }
    }

    /// Owners for image listings, falling back to the caller's own account
    pub fn image_owners(&self) -> Vec<String> {
        if self.describe_images_owners.is_empty() {
            vec!["self".to_string()]
        } else {
            self.describe_images_owners.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    const SAMPLE: &str = r#"
default_profile: dev
profiles:
  dev:
    region: eu-west-1
    endpoint: https://api.example.test
    describe_images_owners: "123456789012"
  prod:
    region: us-east-1
    page_size: 200
    describe_images_owners: ["999999999999"]
    describe_images_name_match: base
    legacy_sort: true
"#;

    #[test]
    fn test_default_profile_selected() {
        let file = write_config(SAMPLE);
        let config = Config::load_from(file.path()).unwrap();

        let (name, profile) = config.profile(None).unwrap();
        assert_eq!(name, "dev");
        assert_eq!(profile.region().unwrap(), "eu-west-1");
        assert_eq!(profile.page_size, DEFAULT_PAGE_SIZE);
        assert_eq!(profile.image_owners(), vec!["123456789012"]);
        assert_eq!(profile.sort_mode(), SortMode::Tuple);
    }

    #[test]
    fn test_named_profile_selected() {
        let file = write_config(SAMPLE);
        let config = Config::load_from(file.path()).unwrap();

        let (_, profile) = config.profile(Some("prod")).unwrap();
        assert_eq!(profile.page_size, 200);
        assert_eq!(profile.image_owners(), vec!["999999999999"]);
        assert_eq!(profile.describe_images_name_match.as_deref(), Some("base"));
        assert_eq!(profile.sort_mode(), SortMode::Concatenated);
        assert!(profile.endpoint().is_err());
    }

    #[test]
    fn test_missing_profile_is_error() {
        let file = write_config(SAMPLE);
        let config = Config::load_from(file.path()).unwrap();

        let err = config.profile(Some("staging")).unwrap_err();
        assert!(err.to_string().contains("Missing profile staging"));
    }

    #[test]
    fn test_no_default_profile_is_error() {
        let file = write_config("profiles:\n  dev:\n    region: eu-west-1\n");
        let config = Config::load_from(file.path()).unwrap();
        assert!(config.profile(None).is_err());
    }

    #[test]
    fn test_missing_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = Config::load_from(&dir.path().join("config.yaml")).unwrap_err();
        assert!(err.to_string().contains("No config file"));
    }

    #[test]
    fn test_overrides_win_over_profile() {
        let profile = Profile {
            region: Some("eu-west-1".to_string()),
            ..Profile::default()
        }
        .with_overrides(Some("http://localhost:4566".to_string()), Some(String::new()));

        assert_eq!(profile.endpoint().unwrap(), "http://localhost:4566");
        assert_eq!(profile.region().unwrap(), "eu-west-1");
        assert_eq!(profile.image_owners(), vec!["self"]);
    }
}
