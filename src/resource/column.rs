//! Column and sort selection
//!
//! Caller column names are parsed once into [`FieldRef`]s. Everything
//! downstream (which joins to run, how to resolve a value) works from the
//! parsed form.

use super::registry::{DerivedField, JoinTarget, NameSource, ResourceFamily};
use std::collections::HashSet;

/// Prefix of an arbitrary tag column, e.g. `Tag: Owner`
const TAG_COLUMN_PREFIX: &str = "Tag:";

/// Where a column's value comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldRef {
    /// Record field or dotted JSON path
    Plain(String),
    /// Computed from other fields of the record
    Derived(DerivedField),
    /// The `Name` tag
    NameTag,
    /// Any other tag
    TagLookup(String),
    /// Every tag as `k=v, ...`
    AllTags,
    /// Attached volume sizes, list valued
    Volumes,
    /// Field of a joined side resource
    Joined(JoinTarget, String),
}

impl FieldRef {
    /// Parse a caller column name against `family`
    pub fn parse(family: &ResourceFamily, column: &str) -> Self {
        let target = family
            .aliases
            .get(column)
            .map(String::as_str)
            .unwrap_or(column);

        if target == "Name" {
            return match &family.name_source {
                NameSource::Tag(key) if key == "Name" => FieldRef::NameTag,
                NameSource::Tag(key) => FieldRef::TagLookup(key.clone()),
                NameSource::Field(field) => FieldRef::Plain(field.clone()),
                NameSource::Instance => FieldRef::Joined(JoinTarget::Instance, "Name".to_string()),
            };
        }

        if let Some(derived) = family.derived.get(target) {
            return FieldRef::Derived(derived.clone());
        }

        if target == "Tags" {
            return FieldRef::AllTags;
        }

        if target == "Volumes" && family.supports(JoinTarget::Volumes) {
            return FieldRef::Volumes;
        }

        if let Some(key) = target.strip_prefix(TAG_COLUMN_PREFIX) {
            return FieldRef::TagLookup(key.trim().to_string());
        }

        if let Some((prefix, field)) = target.split_once('.') {
            if let Some(join) = JoinTarget::from_prefix(prefix) {
                if family.supports(join) {
                    return FieldRef::Joined(join, field.to_string());
                }
            }
        }

        FieldRef::Plain(target.to_string())
    }

    /// Side resource this field needs, if any
    pub fn join(&self) -> Option<JoinTarget> {
        match self {
            FieldRef::Volumes => Some(JoinTarget::Volumes),
            FieldRef::Joined(target, _) => Some(*target),
            _ => None,
        }
    }
}

/// One requested output column
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    /// Name as the caller wrote it; used as the output key
    pub name: String,
    pub field: FieldRef,
}

/// Column names with repeats dropped, first occurrence kept
pub fn unique_columns(names: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    names
        .iter()
        .filter(|name| seen.insert(name.as_str()))
        .cloned()
        .collect()
}

/// Ordered list of requested columns
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSpec {
    columns: Vec<Column>,
}

impl ColumnSpec {
    /// Parse `names` against `family`; a repeated name keeps its first position
    pub fn parse(family: &ResourceFamily, names: &[String]) -> Self {
        let columns = unique_columns(names)
            .into_iter()
            .map(|name| Column {
                field: FieldRef::parse(family, &name),
                name,
            })
            .collect();
        Self { columns }
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    /// Distinct joins the columns need, in first-use order
    pub fn required_joins(&self) -> Vec<JoinTarget> {
        let mut joins = Vec::new();
        for join in self.columns.iter().filter_map(|c| c.field.join()) {
            if !joins.contains(&join) {
                joins.push(join);
            }
        }
        joins
    }
}

/// How the composite sort key compares rows
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortMode {
    /// Compare the first sort column, then the next, and so on
    #[default]
    Tuple,
    /// Concatenate the sort columns' text and compare the result.
    /// `"ab" + "cd"` ties with `"a" + "bcd"`.
    Concatenated,
}

/// Ordered subset of the displayed columns to sort by
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortSpec {
    keys: Vec<usize>,
    pub descending: bool,
    pub mode: SortMode,
}

impl SortSpec {
    /// Keep only sort columns that are displayed; others are dropped silently
    pub fn new(columns: &ColumnSpec, sort_by: &[String], descending: bool, mode: SortMode) -> Self {
        let keys = sort_by
            .iter()
            .filter_map(|name| columns.position(name))
            .collect();
        Self {
            keys,
            descending,
            mode,
        }
    }

    /// Indexes into the column list, in sort order
    pub fn keys(&self) -> &[usize] {
        &self.keys
    }

    pub fn is_unsorted(&self) -> bool {
        self.keys.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::registry::get_family;

    fn names(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_instance_columns() {
        let family = get_family("instances").unwrap();
        let parse = |c: &str| FieldRef::parse(family, c);

        assert_eq!(parse("Id"), FieldRef::Plain("InstanceId".to_string()));
        assert_eq!(parse("State"), FieldRef::Plain("State.Name".to_string()));
        assert_eq!(parse("Name"), FieldRef::NameTag);
        assert_eq!(parse("Tag: Owner"), FieldRef::TagLookup("Owner".to_string()));
        assert_eq!(parse("Tags"), FieldRef::AllTags);
        assert_eq!(parse("Volumes"), FieldRef::Volumes);
        assert_eq!(
            parse("Image.CreationDate"),
            FieldRef::Joined(JoinTarget::Image, "CreationDate".to_string())
        );
        assert_eq!(parse("MissingKey"), FieldRef::Plain("MissingKey".to_string()));
        assert_eq!(
            parse("DnsName"),
            FieldRef::Derived(DerivedField::FirstOf(vec![
                "PublicDnsName".to_string(),
                "PrivateDnsName".to_string()
            ]))
        );
    }

    #[test]
    fn test_join_prefix_needs_family_support() {
        let images = get_family("images").unwrap();
        assert_eq!(
            FieldRef::parse(images, "Image.Name"),
            FieldRef::Plain("Image.Name".to_string())
        );
        assert_eq!(
            FieldRef::parse(images, "Volumes"),
            FieldRef::Plain("Volumes".to_string())
        );
    }

    #[test]
    fn test_instance_sourced_names_join_instances() {
        let agents = get_family("agents").unwrap();
        assert_eq!(
            FieldRef::parse(agents, "Name"),
            FieldRef::Joined(JoinTarget::Instance, "Name".to_string())
        );

        let patches = get_family("patch-states").unwrap();
        assert_eq!(
            FieldRef::parse(patches, "State"),
            FieldRef::Joined(JoinTarget::Instance, "State".to_string())
        );
    }

    #[test]
    fn test_required_joins_only_when_requested() {
        let family = get_family("instances").unwrap();

        let plain = ColumnSpec::parse(family, &family.default_columns);
        assert!(plain.required_joins().is_empty());

        let joined = ColumnSpec::parse(
            family,
            &names(&["Id", "Volumes", "Image.CreationDate", "Image.Name"]),
        );
        assert_eq!(
            joined.required_joins(),
            vec![JoinTarget::Volumes, JoinTarget::Image]
        );
    }

    #[test]
    fn test_repeated_columns_are_parsed_once() {
        let family = get_family("instances").unwrap();
        let columns = ColumnSpec::parse(family, &names(&["Name", "Id", "Name", "Id", "State"]));

        let parsed: Vec<_> = columns.columns().iter().map(|c| c.name.as_str()).collect();
        assert_eq!(parsed, vec!["Name", "Id", "State"]);
        assert_eq!(columns.position("Name"), Some(0));
        assert_eq!(columns.position("State"), Some(2));
    }

    #[test]
    fn test_sort_spec_drops_undisplayed_columns() {
        let family = get_family("instances").unwrap();
        let columns = ColumnSpec::parse(family, &names(&["Id", "Name"]));

        let sort = SortSpec::new(&columns, &names(&["State", "Name", "Id"]), false, SortMode::Tuple);
        assert_eq!(sort.keys(), &[1, 0]);

        let none = SortSpec::new(&columns, &names(&["LaunchTime"]), false, SortMode::Tuple);
        assert!(none.is_unsorted());
    }
}
