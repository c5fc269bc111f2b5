//! Describe commands, one module per service area
//!
//! - [`instances`] - instance listing, tag listings, status checks, launch templates
//! - [`images`] - machine image listing and tags
//! - [`network`] - security groups and subnets
//! - [`agents`] - managed agents, patch and compliance summaries, run commands

pub mod agents;
pub mod images;
pub mod instances;
pub mod network;

use crate::output::{render, OutputFormat};
use crate::resource::{unique_columns, DescribeRequest, ProjectedRow};
use anyhow::Result;
use std::io::Write;

/// Which records a command should describe
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    /// Ids or names
    pub identifiers: Vec<String>,
    /// Name substring, used when no identifiers are given
    pub name_match: Option<String>,
}

impl Selection {
    pub fn new(identifiers: Vec<String>, name_match: Option<String>) -> Self {
        Self {
            identifiers,
            name_match,
        }
    }

    pub fn all() -> Self {
        Self::default()
    }

    fn apply(self, request: DescribeRequest) -> DescribeRequest {
        request
            .identifiers(self.identifiers)
            .name_match(self.name_match)
    }
}

/// Rows of a describe command plus the header they were projected onto
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Listing {
    pub columns: Vec<String>,
    pub rows: Vec<ProjectedRow>,
}

impl Listing {
    fn new(request: &DescribeRequest, rows: Vec<ProjectedRow>) -> Self {
        Self {
            columns: unique_columns(&request.columns),
            rows,
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn render<W: Write>(&self, out: &mut W, format: OutputFormat) -> Result<()> {
        render(out, format, &self.columns, &self.rows)
    }
}

/// `<id>, Name` then either `Tags` or one `Tag: <key>` column per key
fn tag_columns(id_column: &str, keys: &[String]) -> Vec<String> {
    let mut columns = vec![id_column.to_string(), "Name".to_string()];
    if keys.is_empty() {
        columns.push("Tags".to_string());
    } else {
        columns.extend(keys.iter().map(|k| format!("Tag: {}", k)));
    }
    columns
}
