//! In-memory lister for tests.
//!
//! [`FakeLister`] serves canned pages per resource family, applies filter
//! predicates the way the provider would, and records every call so tests can
//! assert on call counts, cursors and filters.
//!
//! ```
//! use aec::resource::{fetch_all, get_family, ProviderFilter};
//! use aec::testing::FakeLister;
//! use serde_json::json;
//!
//! let lister = FakeLister::new().with_pages(
//!     "instances",
//!     vec![vec![json!({"InstanceId": "i-1"})], vec![json!({"InstanceId": "i-2"})]],
//! );
//! let family = get_family("instances").unwrap();
//! let records = tokio_test::block_on(fetch_all(&lister, family, &ProviderFilter::all(), 1)).unwrap();
//!
//! assert_eq!(records.len(), 2);
//! assert_eq!(lister.calls("instances"), 2);
//! ```

use crate::resource::{Page, Predicate, ProviderFilter, ResourceFamily, ResourceLister, ResourceRecord};
use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Mutex;

/// One recorded list call
#[derive(Debug, Clone)]
pub struct ListCall {
    pub family: String,
    pub filter: ProviderFilter,
    pub page_size: usize,
    pub cursor: Option<String>,
}

/// Canned, call-recording [`ResourceLister`]
#[derive(Default)]
pub struct FakeLister {
    pages: HashMap<String, Vec<Vec<Value>>>,
    failures: HashMap<String, usize>,
    calls: Mutex<Vec<ListCall>>,
}

impl FakeLister {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `records` as a single page
    pub fn with_records(self, family: &str, records: Vec<Value>) -> Self {
        self.with_pages(family, vec![records])
    }

    /// Serve `pages` in order; cursors are page indexes
    pub fn with_pages(mut self, family: &str, pages: Vec<Vec<Value>>) -> Self {
        self.pages.insert(family.to_string(), pages);
        self
    }

    /// Fail the `call_index`-th (0-based) list call for `family`
    pub fn failing_at(mut self, family: &str, call_index: usize) -> Self {
        self.failures.insert(family.to_string(), call_index);
        self
    }

    pub fn recorded(&self) -> Vec<ListCall> {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn calls(&self, family: &str) -> usize {
        self.recorded().iter().filter(|c| c.family == family).count()
    }

    pub fn total_calls(&self) -> usize {
        self.recorded().len()
    }

    pub fn cursors(&self, family: &str) -> Vec<Option<String>> {
        self.recorded()
            .into_iter()
            .filter(|c| c.family == family)
            .map(|c| c.cursor)
            .collect()
    }

    pub fn filters(&self, family: &str) -> Vec<ProviderFilter> {
        self.recorded()
            .into_iter()
            .filter(|c| c.family == family)
            .map(|c| c.filter)
            .collect()
    }
}

#[async_trait]
impl ResourceLister for FakeLister {
    async fn list(
        &self,
        family: &ResourceFamily,
        filter: &ProviderFilter,
        page_size: usize,
        cursor: Option<&str>,
    ) -> Result<Page> {
        let call_index = {
            let mut calls = self.calls.lock().unwrap_or_else(|e| e.into_inner());
            let index = calls.iter().filter(|c| c.family == family.key).count();
            calls.push(ListCall {
                family: family.key.clone(),
                filter: filter.clone(),
                page_size,
                cursor: cursor.map(str::to_string),
            });
            index
        };

        if self.failures.get(&family.key) == Some(&call_index) {
            return Err(anyhow::anyhow!(
                "listing {} failed: API request failed: 503 Service Unavailable",
                family.key
            ));
        }

        let pages = self.pages.get(&family.key).map(Vec::as_slice).unwrap_or(&[]);
        let index = match cursor {
            Some(token) => token
                .parse::<usize>()
                .map_err(|_| anyhow::anyhow!("invalid cursor {}", token))?,
            None => 0,
        };

        let records = pages
            .get(index)
            .map(|page| {
                page.iter()
                    .map(|v| ResourceRecord::new(v.clone()))
                    .filter(|r| matches_filter(family, filter, r))
                    .collect()
            })
            .unwrap_or_default();

        let next_cursor = (index + 1 < pages.len()).then(|| (index + 1).to_string());

        Ok(Page {
            records,
            next_cursor,
        })
    }
}

fn matches_filter(family: &ResourceFamily, filter: &ProviderFilter, record: &ResourceRecord) -> bool {
    filter
        .predicates()
        .iter()
        .all(|p| matches_predicate(family, p, record))
}

fn matches_predicate(family: &ResourceFamily, predicate: &Predicate, record: &ResourceRecord) -> bool {
    match predicate {
        Predicate::IdIn(ids) => record
            .get_str(&family.id_field)
            .is_some_and(|id| ids.iter().any(|i| i == id)),
        Predicate::TagIn { key, values } => record
            .tags()
            .get(key)
            .is_some_and(|v| values.iter().any(|want| want == v)),
        Predicate::TagContains { key, value } => record
            .tags()
            .get(key)
            .is_some_and(|v| v.contains(value.as_str())),
        Predicate::FieldIn { name, values } => field_texts(record, name)
            .iter()
            .any(|v| values.iter().any(|want| want == v)),
        Predicate::FieldContains { name, value } => field_texts(record, name)
            .iter()
            .any(|v| v.contains(value.as_str())),
        Predicate::OwnerIn(owners) => {
            owners.iter().any(|o| o == "self")
                || record
                    .get_str("OwnerId")
                    .is_some_and(|owner| owners.iter().any(|o| o == owner))
        }
    }
}

/// Text of a field; an array field yields one entry per element
fn field_texts(record: &ResourceRecord, path: &str) -> Vec<String> {
    match record.get_path(path) {
        Some(Value::Array(items)) => items.iter().map(value_text).collect(),
        Some(value) => vec![value_text(value)],
        None => Vec::new(),
    }
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
