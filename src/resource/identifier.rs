//! Identifier classification
//!
//! Callers pass a mix of opaque ids and human names. Ids are recognised by the
//! family's lexical prefix; everything else is a name. One query may use one
//! form or the other, never both.

use super::error::{QueryError, QueryResult};
use super::filter::Predicate;
use super::registry::{NameSource, ResourceFamily};

/// Caller identifier input after classification
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentifierSet {
    /// No identifiers: no filter
    Empty,
    Ids(Vec<String>),
    Names(Vec<String>),
}

impl IdentifierSet {
    /// Partition tokens into ids and names for `family`
    pub fn classify(family: &ResourceFamily, tokens: &[String]) -> QueryResult<Self> {
        let (ids, names): (Vec<String>, Vec<String>) =
            tokens.iter().cloned().partition(|t| family.is_id(t));

        match (ids.is_empty(), names.is_empty()) {
            (true, true) => Ok(IdentifierSet::Empty),
            (false, true) => Ok(IdentifierSet::Ids(ids)),
            (true, false) => Ok(IdentifierSet::Names(names)),
            (false, false) => Err(QueryError::AmbiguousFilter { ids, names }),
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, IdentifierSet::Empty)
    }

    /// Build the single predicate for this input, `None` meaning match everything.
    ///
    /// Identifiers take precedence over `name_match`. For families whose name
    /// lives on the owning instance, pass the instances family here and turn
    /// the matched instances into an id predicate.
    pub fn to_predicate(
        &self,
        family: &ResourceFamily,
        name_match: Option<&str>,
    ) -> Option<Predicate> {
        match self {
            IdentifierSet::Ids(ids) => Some(Predicate::IdIn(ids.clone())),
            IdentifierSet::Names(names) => Some(name_in(family, names.clone())),
            IdentifierSet::Empty => name_match
                .filter(|m| !m.is_empty())
                .map(|m| name_contains(family, m)),
        }
    }
}

fn name_in(family: &ResourceFamily, values: Vec<String>) -> Predicate {
    match &family.name_source {
        NameSource::Field(name) => Predicate::FieldIn {
            name: name.clone(),
            values,
        },
        NameSource::Tag(key) => Predicate::TagIn {
            key: key.clone(),
            values,
        },
        NameSource::Instance => Predicate::TagIn {
            key: "Name".to_string(),
            values,
        },
    }
}

fn name_contains(family: &ResourceFamily, value: &str) -> Predicate {
    match &family.name_source {
        NameSource::Field(name) => Predicate::FieldContains {
            name: name.clone(),
            value: value.to_string(),
        },
        NameSource::Tag(key) => Predicate::TagContains {
            key: key.clone(),
            value: value.to_string(),
        },
        NameSource::Instance => Predicate::TagContains {
            key: "Name".to_string(),
            value: value.to_string(),
        },
    }
}

/// Precondition for operations that act on what they match: at least one
/// identifier, and none of them empty. An empty identifier would otherwise
/// turn into "no filter" and match every resource.
pub fn require_identifiers(tokens: &[String]) -> QueryResult<()> {
    if tokens.is_empty() || tokens.iter().any(|t| t.is_empty()) {
        return Err(QueryError::EmptyIdentifier);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::registry::get_family;

    fn tokens(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_empty_input_matches_everything() {
        let instances = get_family("instances").unwrap();
        let set = IdentifierSet::classify(instances, &[]).unwrap();
        assert!(set.is_empty());
        assert_eq!(set.to_predicate(instances, None), None);
    }

    #[test]
    fn test_ids_become_id_filter() {
        let instances = get_family("instances").unwrap();
        let set = IdentifierSet::classify(instances, &tokens(&["i-1", "i-2"])).unwrap();
        assert_eq!(
            set.to_predicate(instances, Some("ignored")),
            Some(Predicate::IdIn(tokens(&["i-1", "i-2"])))
        );
    }

    #[test]
    fn test_names_become_tag_filter() {
        let instances = get_family("instances").unwrap();
        let set = IdentifierSet::classify(instances, &tokens(&["alice", "sam"])).unwrap();
        assert_eq!(
            set.to_predicate(instances, None),
            Some(Predicate::TagIn {
                key: "Name".to_string(),
                values: tokens(&["alice", "sam"]),
            })
        );
    }

    #[test]
    fn test_image_names_filter_on_field() {
        let images = get_family("images").unwrap();
        let set = IdentifierSet::classify(images, &tokens(&["base-2024"])).unwrap();
        assert_eq!(
            set.to_predicate(images, None),
            Some(Predicate::FieldIn {
                name: "Name".to_string(),
                values: tokens(&["base-2024"]),
            })
        );
    }

    #[test]
    fn test_name_match_only_when_no_identifiers() {
        let instances = get_family("instances").unwrap();
        let set = IdentifierSet::Empty;
        assert_eq!(
            set.to_predicate(instances, Some("lic")),
            Some(Predicate::TagContains {
                key: "Name".to_string(),
                value: "lic".to_string(),
            })
        );
        assert_eq!(set.to_predicate(instances, Some("")), None);
    }

    #[test]
    fn test_mixed_forms_rejected() {
        let instances = get_family("instances").unwrap();
        let err = IdentifierSet::classify(instances, &tokens(&["alice", "i-0123456789abcdef0"]))
            .unwrap_err();
        match err {
            QueryError::AmbiguousFilter { ids, names } => {
                assert_eq!(ids, tokens(&["i-0123456789abcdef0"]));
                assert_eq!(names, tokens(&["alice"]));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_prefix_is_per_family() {
        let images = get_family("images").unwrap();
        let set = IdentifierSet::classify(images, &tokens(&["ami-123"])).unwrap();
        assert_eq!(set, IdentifierSet::Ids(tokens(&["ami-123"])));

        // an instance id is just a name to the image family
        let set = IdentifierSet::classify(images, &tokens(&["i-123"])).unwrap();
        assert_eq!(set, IdentifierSet::Names(tokens(&["i-123"])));
    }

    #[test]
    fn test_require_identifiers() {
        assert!(require_identifiers(&tokens(&["alice"])).is_ok());
        assert!(matches!(
            require_identifiers(&[]),
            Err(QueryError::EmptyIdentifier)
        ));
        assert!(matches!(
            require_identifiers(&tokens(&["alice", ""])),
            Err(QueryError::EmptyIdentifier)
        ));
    }
}
