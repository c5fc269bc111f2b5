//! Resource Registry - Load resource family definitions from JSON
//!
//! This module loads all resource family definitions from embedded JSON files
//! and provides lookup functions for the rest of the application.

use serde::Deserialize;
use std::collections::HashMap;
use std::sync::OnceLock;

/// Embedded resource JSON files (compiled into the binary)
const RESOURCE_FILES: &[&str] = &[
    include_str!("../resources/ec2.json"),
    include_str!("../resources/ssm.json"),
];

/// Where the human-facing `Name` of a record comes from
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NameSource {
    /// A tag on the record itself
    Tag(String),
    /// A plain field on the record (image names)
    Field(String),
    /// The `Name` tag of the instance the record belongs to
    Instance,
}

/// Side resource a family can be joined against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JoinTarget {
    Volumes,
    Image,
    Instance,
}

impl JoinTarget {
    /// Registry key of the family fetched for this join
    pub fn family_key(self) -> &'static str {
        match self {
            JoinTarget::Volumes => "volumes",
            JoinTarget::Image => "images",
            JoinTarget::Instance => "instances",
        }
    }

    /// Column prefix used in dotted references, e.g. `Image.CreationDate`
    pub fn from_prefix(prefix: &str) -> Option<Self> {
        match prefix {
            "Image" => Some(JoinTarget::Image),
            "Instance" => Some(JoinTarget::Instance),
            _ => None,
        }
    }
}

/// Lifecycle states of a family that has them
#[derive(Debug, Clone, Deserialize)]
pub struct LifecycleDef {
    /// Dotted path of the state value, e.g. `State.Name`
    pub state_path: String,
    /// Decommissioned state, hidden unless terminated records are requested
    pub terminal: String,
    /// States kept by a running-only query
    pub active: Vec<String>,
}

/// How records of a family are linked to instances
#[derive(Debug, Clone, Deserialize)]
pub struct InstanceJoinDef {
    /// Field of the record holding the instance id
    pub key_field: String,
    /// Only join against running or pending instances
    #[serde(default)]
    pub running_only: bool,
}

/// Column computed from several fields of a record
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DerivedField {
    /// First non-empty value among these paths
    FirstOf(Vec<String>),
    /// Present values among these paths, space separated
    Concat(Vec<String>),
    /// `reachability <status>[ since <time>]` from the status summary at this path
    StatusCheck(String),
}

/// Resource family definition from JSON
#[derive(Debug, Clone, Deserialize)]
pub struct ResourceFamily {
    /// Registry key, filled in when the registry loads
    #[serde(default)]
    pub key: String,
    pub display_name: String,
    pub service: String,
    pub collection: String,
    pub response_path: String,
    pub id_field: String,
    /// Empty when ids have no lexical form; every token is then a name
    #[serde(default)]
    pub id_prefix: String,
    pub id_filter: String,
    pub name_source: NameSource,
    #[serde(default)]
    pub lifecycle: Option<LifecycleDef>,
    #[serde(default)]
    pub instance_join: Option<InstanceJoinDef>,
    /// Display column -> dotted JSON path (or `Instance.<field>`)
    #[serde(default)]
    pub aliases: HashMap<String, String>,
    /// Display column -> computed value
    #[serde(default)]
    pub derived: HashMap<String, DerivedField>,
    /// Paths whose epoch-second values render as RFC 3339
    #[serde(default)]
    pub timestamp_fields: Vec<String>,
    #[serde(default)]
    pub joins: Vec<JoinTarget>,
    pub default_columns: Vec<String>,
    #[serde(default)]
    pub default_sort: Vec<String>,
    #[serde(default)]
    pub sort_descending: bool,
}

impl ResourceFamily {
    pub fn supports(&self, target: JoinTarget) -> bool {
        self.joins.contains(&target)
    }

    pub fn is_timestamp(&self, path: &str) -> bool {
        self.timestamp_fields.iter().any(|f| f == path)
    }

    /// Whether a raw token has this family's opaque id form
    pub fn is_id(&self, token: &str) -> bool {
        !self.id_prefix.is_empty() && token.starts_with(&self.id_prefix)
    }
}

/// Root structure of resources/*.json
#[derive(Debug, Clone, Deserialize)]
pub struct ResourceConfig {
    #[serde(default)]
    pub families: HashMap<String, ResourceFamily>,
}

/// Global registry loaded from JSON
static REGISTRY: OnceLock<ResourceConfig> = OnceLock::new();

/// Get the resource registry (loads from embedded JSON on first access)
pub fn get_registry() -> &'static ResourceConfig {
    REGISTRY.get_or_init(|| {
        let mut final_config = ResourceConfig {
            families: HashMap::new(),
        };

        for content in RESOURCE_FILES {
            let partial: ResourceConfig = serde_json::from_str(content)
                .unwrap_or_else(|e| panic!("Failed to parse embedded resource JSON: {}", e));
            final_config.families.extend(partial.families);
        }

        for (key, family) in final_config.families.iter_mut() {
            family.key = key.clone();
        }

        final_config
    })
}

/// Get a family definition by key
pub fn get_family(key: &str) -> Option<&'static ResourceFamily> {
    get_registry().families.get(key)
}

/// Get all family keys, sorted
pub fn get_all_family_keys() -> Vec<&'static str> {
    let mut keys: Vec<&'static str> = get_registry()
        .families
        .keys()
        .map(|s| s.as_str())
        .collect();
    keys.sort_unstable();
    keys
}
