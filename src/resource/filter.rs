//! Provider filter expressions
//!
//! A [`ProviderFilter`] is an ordered conjunction of [`Predicate`]s. The
//! engine builds predicates and hands them to the lister untouched; a lister
//! lowers them to wire-level [`ResourceFilter`]s.

use super::registry::ResourceFamily;

/// One provider-side predicate
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Predicate {
    /// Record id equals one of the values
    IdIn(Vec<String>),
    /// Tag `key` equals one of the values
    TagIn { key: String, values: Vec<String> },
    /// Tag `key` contains the substring
    TagContains { key: String, value: String },
    /// Field equals one of the values
    FieldIn { name: String, values: Vec<String> },
    /// Field contains the substring
    FieldContains { name: String, value: String },
    /// Owning account is one of the values (`self` is the caller's account)
    OwnerIn(Vec<String>),
}

impl Predicate {
    /// Lower to the wire-level parameter for `family`
    pub fn to_resource_filter(&self, family: &ResourceFamily) -> ResourceFilter {
        match self {
            Predicate::IdIn(ids) => ResourceFilter::new(&family.id_filter, ids.clone()),
            Predicate::TagIn { key, values } => {
                ResourceFilter::new(&format!("tag:{}", key), values.clone())
            }
            Predicate::TagContains { key, value } => {
                ResourceFilter::new(&format!("tag:{}", key), vec![wildcard(value)])
            }
            Predicate::FieldIn { name, values } => ResourceFilter::new(name, values.clone()),
            Predicate::FieldContains { name, value } => {
                ResourceFilter::new(name, vec![wildcard(value)])
            }
            Predicate::OwnerIn(owners) => ResourceFilter::new("owner", owners.clone()),
        }
    }
}

fn wildcard(value: &str) -> String {
    format!("*{}*", value)
}

/// Conjunction of predicates; empty matches everything
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProviderFilter {
    predicates: Vec<Predicate>,
}

impl ProviderFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn with(predicate: Predicate) -> Self {
        Self {
            predicates: vec![predicate],
        }
    }

    pub fn and(mut self, predicate: Predicate) -> Self {
        self.predicates.push(predicate);
        self
    }

    pub fn and_maybe(self, predicate: Option<Predicate>) -> Self {
        match predicate {
            Some(p) => self.and(p),
            None => self,
        }
    }

    pub fn predicates(&self) -> &[Predicate] {
        &self.predicates
    }

    pub fn is_all(&self) -> bool {
        self.predicates.is_empty()
    }

    pub fn to_resource_filters(&self, family: &ResourceFamily) -> Vec<ResourceFilter> {
        self.predicates
            .iter()
            .map(|p| p.to_resource_filter(family))
            .collect()
    }
}

/// Wire-level filter: one query parameter with one or more values
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceFilter {
    pub param: String,
    pub values: Vec<String>,
}

impl ResourceFilter {
    pub fn new(param: &str, values: Vec<String>) -> Self {
        Self {
            param: param.to_string(),
            values,
        }
    }
}
