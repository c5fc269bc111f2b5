//! Column projection and sorting
//!
//! Turns records into ordered rows holding exactly the requested columns.
//! Missing values stay [`FieldValue::Absent`]; they are never an error.

use super::column::{ColumnSpec, FieldRef, SortMode, SortSpec};
use super::join::JoinMaps;
use super::record::ResourceRecord;
use super::registry::{get_family, DerivedField, JoinTarget, ResourceFamily};
use chrono::{DateTime, SecondsFormat};
use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};
use serde_json::Value;

/// A projected cell
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Absent,
    Text(String),
    List(Vec<String>),
}

impl FieldValue {
    pub fn is_absent(&self) -> bool {
        matches!(self, FieldValue::Absent)
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Text used for display and sorting; absent renders as empty
    pub fn render(&self) -> String {
        match self {
            FieldValue::Absent => String::new(),
            FieldValue::Text(s) => s.clone(),
            FieldValue::List(items) => items.join(", "),
        }
    }
}

impl From<Option<&str>> for FieldValue {
    fn from(value: Option<&str>) -> Self {
        value.map_or(FieldValue::Absent, |s| FieldValue::Text(s.to_string()))
    }
}

impl Serialize for FieldValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            FieldValue::Absent => serializer.serialize_none(),
            FieldValue::Text(s) => serializer.serialize_str(s),
            FieldValue::List(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
        }
    }
}

/// One output row: column name to value, in requested column order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProjectedRow {
    cells: Vec<(String, FieldValue)>,
}

impl ProjectedRow {
    pub fn new(cells: Vec<(String, FieldValue)>) -> Self {
        Self { cells }
    }

    pub fn get(&self, column: &str) -> Option<&FieldValue> {
        self.cells.iter().find(|(c, _)| c == column).map(|(_, v)| v)
    }

    /// Text value of `column`, `None` when absent, missing or list valued
    pub fn text(&self, column: &str) -> Option<&str> {
        self.get(column).and_then(FieldValue::as_text)
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.cells.iter().map(|(c, _)| c.as_str())
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    fn value_at(&self, index: usize) -> Option<&FieldValue> {
        self.cells.get(index).map(|(_, v)| v)
    }
}

impl Serialize for ProjectedRow {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.cells.len()))?;
        for (column, value) in &self.cells {
            map.serialize_entry(column, value)?;
        }
        map.end()
    }
}

/// Project every record onto `columns`, preserving record order
pub fn project(
    family: &ResourceFamily,
    records: &[ResourceRecord],
    columns: &ColumnSpec,
    joins: &JoinMaps,
) -> Vec<ProjectedRow> {
    records
        .iter()
        .map(|record| project_record(family, record, columns, joins))
        .collect()
}

pub fn project_record(
    family: &ResourceFamily,
    record: &ResourceRecord,
    columns: &ColumnSpec,
    joins: &JoinMaps,
) -> ProjectedRow {
    let cells = columns
        .columns()
        .iter()
        .map(|c| (c.name.clone(), resolve(family, record, &c.field, joins)))
        .collect();
    ProjectedRow::new(cells)
}

/// Resolve one field of `record`
pub fn resolve(
    family: &ResourceFamily,
    record: &ResourceRecord,
    field: &FieldRef,
    joins: &JoinMaps,
) -> FieldValue {
    match field {
        FieldRef::Plain(path) => plain(family, record, path),
        FieldRef::Derived(derived) => derive(family, record, derived),
        FieldRef::NameTag => record.tags().get("Name").into(),
        FieldRef::TagLookup(key) => record.tags().get(key).into(),
        FieldRef::AllTags => {
            let tags = record.tags();
            if tags.is_empty() {
                FieldValue::Absent
            } else {
                FieldValue::Text(tags.joined())
            }
        }
        FieldRef::Volumes => match JoinMaps::key_for(family, JoinTarget::Volumes, record) {
            Some(id) => FieldValue::List(joins.volumes_for(id)),
            None => FieldValue::Absent,
        },
        FieldRef::Joined(target, inner) => {
            let (Some(side), Some(side_family)) = (
                joins.joined(family, *target, record),
                get_family(target.family_key()),
            ) else {
                return FieldValue::Absent;
            };
            // one level deep: the side record's own joins are not loaded
            let inner = FieldRef::parse(side_family, inner);
            resolve(side_family, side, &inner, &JoinMaps::none())
        }
    }
}

fn derive(family: &ResourceFamily, record: &ResourceRecord, derived: &DerivedField) -> FieldValue {
    match derived {
        DerivedField::FirstOf(paths) => paths
            .iter()
            .filter_map(|p| record.get_str(p))
            .find(|s| !s.is_empty())
            .into(),
        DerivedField::Concat(paths) => {
            let parts: Vec<String> = paths
                .iter()
                .filter_map(|p| match plain(family, record, p) {
                    FieldValue::Text(s) if !s.is_empty() => Some(s),
                    _ => None,
                })
                .collect();
            if parts.is_empty() {
                FieldValue::Absent
            } else {
                FieldValue::Text(parts.join(" "))
            }
        }
        DerivedField::StatusCheck(summary) => status_check(record, summary),
    }
}

/// `reachability <status>[ since <time>]` from a status summary
fn status_check(record: &ResourceRecord, summary: &str) -> FieldValue {
    let details = record
        .get_path(&format!("{}.Details", summary))
        .and_then(|v| v.as_array());

    let Some(reachability) = details
        .into_iter()
        .flatten()
        .find(|d| d.get("Name").and_then(|n| n.as_str()) == Some("reachability"))
    else {
        return FieldValue::Absent;
    };

    let status = reachability
        .get("Status")
        .map(|v| scalar_text(v, false))
        .unwrap_or_default();
    let mut text = format!("reachability {}", status);

    if let Some(since) = reachability.get("ImpairedSince").filter(|v| !v.is_null()) {
        text.push_str(" since ");
        text.push_str(&scalar_text(since, true));
    }

    FieldValue::Text(text)
}

fn plain(family: &ResourceFamily, record: &ResourceRecord, path: &str) -> FieldValue {
    match record.get_path(path) {
        Some(value) => FieldValue::Text(scalar_text(value, family.is_timestamp(path))),
        None => FieldValue::Absent,
    }
}

/// Text form of a JSON value. Epoch seconds in timestamp fields become RFC 3339.
fn scalar_text(value: &Value, timestamp: bool) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) if timestamp => n
            .as_f64()
            .and_then(epoch_to_rfc3339)
            .unwrap_or_else(|| n.to_string()),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn epoch_to_rfc3339(secs: f64) -> Option<String> {
    if !secs.is_finite() {
        return None;
    }
    let whole = secs.floor();
    let nanos = ((secs - whole) * 1e9).round().min(999_999_999.0) as u32;
    DateTime::from_timestamp(whole as i64, nanos)
        .map(|dt| dt.to_rfc3339_opts(SecondsFormat::AutoSi, true))
}

/// Sort key of a row under `sort`
pub fn sort_key(row: &ProjectedRow, sort: &SortSpec) -> Vec<String> {
    let parts = sort
        .keys()
        .iter()
        .map(|&i| row.value_at(i).map(FieldValue::render).unwrap_or_default());

    match sort.mode {
        SortMode::Tuple => parts.collect(),
        SortMode::Concatenated => vec![parts.collect::<String>()],
    }
}

/// Stable sort; rows with equal keys keep their fetch order
pub fn sort_rows(rows: Vec<ProjectedRow>, sort: &SortSpec) -> Vec<ProjectedRow> {
    if sort.is_unsorted() {
        return rows;
    }

    let mut keyed: Vec<(Vec<String>, ProjectedRow)> =
        rows.into_iter().map(|r| (sort_key(&r, sort), r)).collect();

    if sort.descending {
        keyed.sort_by(|a, b| b.0.cmp(&a.0));
    } else {
        keyed.sort_by(|a, b| a.0.cmp(&b.0));
    }

    keyed.into_iter().map(|(_, r)| r).collect()
}
