//! Resource query engine
//!
//! This module turns provider list calls into the rows a describe command
//! asked for. Resource families are loaded from JSON files at compile time,
//! so a family's id form, name source, joins and default columns are data,
//! not code.
//!
//! # Architecture
//!
//! - [`registry`] - Loads and caches family definitions from embedded JSON
//! - [`identifier`] - Splits caller tokens into ids and names
//! - [`fetcher`] - Lazy page stream over a [`ResourceLister`]
//! - [`state`] - Lifecycle state filtering
//! - [`join`] - Volume, image and instance side fetches
//! - [`column`] / [`projector`] - Column parsing, projection and sorting
//! - [`engine`] - The describe pipeline wiring the stages together
//!
//! # Resource Definitions
//!
//! Families are defined in JSON files under `src/resources/`:
//! - `ec2.json` - instances, volumes, images, instance status checks
//! - `ssm.json` - managed agents, patch states, compliance summaries
//!
//! # Example
//!
//! ```
//! use aec::resource::{get_family, DescribeRequest, QueryEngine};
//! use aec::testing::FakeLister;
//! use serde_json::json;
//!
//! let lister = FakeLister::new().with_records(
//!     "instances",
//!     vec![json!({
//!         "InstanceId": "i-0a",
//!         "State": {"Name": "running"},
//!         "Tags": [{"Key": "Name", "Value": "alice"}]
//!     })],
//! );
//! let engine = QueryEngine::new(lister);
//! let request = DescribeRequest::for_family(get_family("instances").unwrap());
//!
//! let rows = tokio_test::block_on(engine.describe("instances", &request)).unwrap();
//! assert_eq!(rows[0].text("Name"), Some("alice"));
//! ```

pub mod column;
pub mod engine;
pub mod error;
pub mod fetcher;
pub mod filter;
pub mod identifier;
pub mod join;
pub mod projector;
pub mod record;
pub mod registry;
pub mod state;

pub use column::{unique_columns, Column, ColumnSpec, FieldRef, SortMode, SortSpec};
pub use engine::{DescribeRequest, QueryEngine};
pub use error::{QueryError, QueryResult};
pub use fetcher::{fetch_all, pages, Page, ResourceLister, DEFAULT_PAGE_SIZE};
pub use filter::{Predicate, ProviderFilter, ResourceFilter};
pub use identifier::{require_identifiers, IdentifierSet};
pub use join::{JoinMaps, Joiner};
pub use projector::{FieldValue, ProjectedRow};
pub use record::{ResourceRecord, TagMap};
pub use registry::*;
pub use state::StateFilter;
