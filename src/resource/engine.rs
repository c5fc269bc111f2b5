//! Describe query engine
//!
//! Runs one describe query end to end: classify identifiers, fetch the
//! primary family (with independent side fetches alongside), filter by
//! lifecycle state, run the image join, project and sort.

use super::column::{ColumnSpec, SortMode, SortSpec};
use super::error::{QueryError, QueryResult};
use super::fetcher::{fetch_all, ResourceLister, DEFAULT_PAGE_SIZE};
use super::filter::{Predicate, ProviderFilter};
use super::identifier::IdentifierSet;
use super::join::{distinct_values, JoinMaps, Joiner};
use super::projector::{project, sort_rows, ProjectedRow};
use super::record::ResourceRecord;
use super::registry::{get_family, JoinTarget, NameSource, ResourceFamily};
use super::state::StateFilter;

/// Inputs of one describe query
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DescribeRequest {
    /// Ids or names, never both
    pub identifiers: Vec<String>,
    /// Name substring, ignored when identifiers are given
    pub name_match: Option<String>,
    pub include_terminated: bool,
    pub running_only: bool,
    pub columns: Vec<String>,
    pub sort_by: Vec<String>,
    pub descending: bool,
    /// Fixed predicates ANDed with the identifier filter
    pub predicates: Vec<Predicate>,
}

impl DescribeRequest {
    /// Request with the family's default columns and sort
    pub fn for_family(family: &ResourceFamily) -> Self {
        Self {
            columns: family.default_columns.clone(),
            sort_by: family.default_sort.clone(),
            descending: family.sort_descending,
            ..Self::default()
        }
    }

    pub fn identifiers(mut self, identifiers: Vec<String>) -> Self {
        self.identifiers = identifiers;
        self
    }

    pub fn name_match(mut self, name_match: Option<String>) -> Self {
        self.name_match = name_match;
        self
    }

    pub fn include_terminated(mut self, include_terminated: bool) -> Self {
        self.include_terminated = include_terminated;
        self
    }

    pub fn running_only(mut self, running_only: bool) -> Self {
        self.running_only = running_only;
        self
    }

    /// Replace the columns; `None` keeps the current ones
    pub fn columns(mut self, columns: Option<Vec<String>>) -> Self {
        if let Some(columns) = columns {
            self.columns = columns;
        }
        self
    }

    /// Replace the sort columns; `None` keeps the current ones
    pub fn sort_by(mut self, sort_by: Option<Vec<String>>) -> Self {
        if let Some(sort_by) = sort_by {
            self.sort_by = sort_by;
        }
        self
    }

    pub fn predicate(mut self, predicate: Predicate) -> Self {
        self.predicates.push(predicate);
        self
    }
}

/// Describe engine over an injected lister
pub struct QueryEngine<L> {
    lister: L,
    page_size: usize,
    sort_mode: SortMode,
}

impl<L> QueryEngine<L>
where
    L: ResourceLister,
{
    pub fn new(lister: L) -> Self {
        Self {
            lister,
            page_size: DEFAULT_PAGE_SIZE,
            sort_mode: SortMode::default(),
        }
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn with_sort_mode(mut self, sort_mode: SortMode) -> Self {
        self.sort_mode = sort_mode;
        self
    }

    pub fn lister(&self) -> &L {
        &self.lister
    }

    pub fn sort_mode(&self) -> SortMode {
        self.sort_mode
    }

    pub fn joiner(&self) -> Joiner<'_, L> {
        Joiner::new(&self.lister, self.page_size)
    }

    /// Describe the family registered under `family_key`
    pub async fn describe(
        &self,
        family_key: &str,
        request: &DescribeRequest,
    ) -> QueryResult<Vec<ProjectedRow>> {
        let family =
            get_family(family_key).ok_or_else(|| QueryError::UnknownFamily(family_key.to_string()))?;
        self.describe_family(family, request).await
    }

    pub async fn describe_family(
        &self,
        family: &ResourceFamily,
        request: &DescribeRequest,
    ) -> QueryResult<Vec<ProjectedRow>> {
        if request.identifiers.iter().any(String::is_empty) {
            tracing::warn!("empty identifier in {} describe, returning no results", family.key);
            return Ok(Vec::new());
        }

        let identifiers = IdentifierSet::classify(family, &request.identifiers)?;
        let columns = ColumnSpec::parse(family, &request.columns);
        let joins = columns.required_joins();
        let joiner = self.joiner();

        let mut selector = identifiers.to_predicate(family, request.name_match.as_deref());
        let mut matched_instances = None;

        // the name lives on the instance: turn it into instance ids first
        if family.name_source == NameSource::Instance {
            let by_name = selector
                .clone()
                .filter(|p| !matches!(p, Predicate::IdIn(_)));
            if let Some(name_predicate) = by_name {
                let instances = joiner
                    .fetch_instances(family, ProviderFilter::with(name_predicate))
                    .await?;
                let ids = distinct_values(&instances, "InstanceId");
                if ids.is_empty() {
                    tracing::debug!("no instances match the {} name filter", family.key);
                    return Ok(Vec::new());
                }
                selector = Some(Predicate::IdIn(ids));
                matched_instances = Some(instances);
            }
        }

        let filter = request
            .predicates
            .iter()
            .cloned()
            .fold(ProviderFilter::all().and_maybe(selector), ProviderFilter::and);

        tracing::debug!(
            "describe {}: {} predicates, joins {:?}",
            family.key,
            filter.predicates().len(),
            joins
        );

        let (records, maps) = futures::try_join!(
            fetch_all(&self.lister, family, &filter, self.page_size),
            joiner.fetch_independent(family, &joins, matched_instances),
        )?;

        let records = StateFilter::new(request.include_terminated, request.running_only)
            .apply(family, records);

        let maps = if joins.contains(&JoinTarget::Image) {
            maps.with_images(joiner.fetch_images(&records).await?)
        } else {
            maps
        };

        Ok(self.project_and_sort(family, &records, request, &maps))
    }

    /// Projection and sort over records fetched by the caller
    pub fn project_and_sort(
        &self,
        family: &ResourceFamily,
        records: &[ResourceRecord],
        request: &DescribeRequest,
        joins: &JoinMaps,
    ) -> Vec<ProjectedRow> {
        let columns = ColumnSpec::parse(family, &request.columns);
        let sort = SortSpec::new(&columns, &request.sort_by, request.descending, self.sort_mode);

        let rows = sort_rows(project(family, records, &columns, joins), &sort);
        tracing::debug!("describe {}: {} rows", family.key, rows.len());
        rows
    }

    /// Fetch every page of `family` matching `filter`
    pub async fn fetch(
        &self,
        family: &ResourceFamily,
        filter: &ProviderFilter,
    ) -> QueryResult<Vec<ResourceRecord>> {
        Ok(fetch_all(&self.lister, family, filter, self.page_size).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeLister;
    use serde_json::json;

    fn instance(id: &str, name: &str, state: &str) -> serde_json::Value {
        json!({
            "InstanceId": id,
            "State": {"Name": state},
            "InstanceType": "t3.small",
            "ImageId": "ami-1",
            "Tags": [{"Key": "Name", "Value": name}]
        })
    }

    fn names(rows: &[ProjectedRow]) -> Vec<&str> {
        rows.iter().filter_map(|r| r.text("Name")).collect()
    }

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_default_describe_sorts_by_state_then_name() {
        let lister = FakeLister::new().with_records(
            "instances",
            vec![
                instance("i-2", "sam", "running"),
                instance("i-1", "alice", "running"),
                instance("i-3", "bob", "stopped"),
            ],
        );
        let engine = QueryEngine::new(lister);
        let family = get_family("instances").unwrap();

        let rows = tokio_test::block_on(
            engine.describe("instances", &DescribeRequest::for_family(family)),
        )
        .unwrap();

        assert_eq!(names(&rows), vec!["alice", "sam", "bob"]);
        assert_eq!(engine.lister().total_calls(), 1);
    }

    #[test]
    fn test_empty_identifier_returns_nothing_without_calls() {
        let engine = QueryEngine::new(FakeLister::new());
        let family = get_family("instances").unwrap();
        let request = DescribeRequest::for_family(family).identifiers(strings(&[""]));

        let rows = tokio_test::block_on(engine.describe("instances", &request)).unwrap();

        assert!(rows.is_empty());
        assert_eq!(engine.lister().total_calls(), 0);
    }

    #[test]
    fn test_ambiguous_identifiers_fail_before_fetch() {
        let engine = QueryEngine::new(FakeLister::new());
        let family = get_family("instances").unwrap();
        let request = DescribeRequest::for_family(family)
            .identifiers(strings(&["alice", "i-0123456789abcdef0"]));

        let err = tokio_test::block_on(engine.describe("instances", &request)).unwrap_err();

        assert!(matches!(err, QueryError::AmbiguousFilter { .. }));
        assert_eq!(engine.lister().total_calls(), 0);
    }

    #[test]
    fn test_unknown_family() {
        let engine = QueryEngine::new(FakeLister::new());
        let err = tokio_test::block_on(engine.describe("buckets", &DescribeRequest::default()))
            .unwrap_err();
        assert_eq!(err.kind(), "UNKNOWN_FAMILY");
    }

    #[test]
    fn test_agent_names_resolve_through_instances() {
        let lister = FakeLister::new()
            .with_records(
                "instances",
                vec![
                    instance("i-1", "alice", "running"),
                    instance("i-2", "sam", "running"),
                    instance("i-3", "alice", "stopped"),
                ],
            )
            .with_records(
                "agents",
                vec![
                    json!({"InstanceId": "i-1", "PingStatus": "Online"}),
                    json!({"InstanceId": "i-2", "PingStatus": "Online"}),
                ],
            );
        let engine = QueryEngine::new(lister);
        let family = get_family("agents").unwrap();
        let request = DescribeRequest::for_family(family).identifiers(strings(&["alice"]));

        let rows = tokio_test::block_on(engine.describe("agents", &request)).unwrap();

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].text("ID"), Some("i-1"));
        assert_eq!(rows[0].text("Name"), Some("alice"));
        assert_eq!(
            engine.lister().filters("agents"),
            vec![ProviderFilter::with(Predicate::IdIn(strings(&["i-1"])))]
        );
        // matched instances double as the name join
        assert_eq!(engine.lister().calls("instances"), 1);
    }

    #[test]
    fn test_agent_name_without_match_skips_agent_call() {
        let lister = FakeLister::new()
            .with_records("instances", vec![instance("i-1", "alice", "running")]);
        let engine = QueryEngine::new(lister);
        let family = get_family("agents").unwrap();
        let request = DescribeRequest::for_family(family).identifiers(strings(&["nobody"]));

        let rows = tokio_test::block_on(engine.describe("agents", &request)).unwrap();

        assert!(rows.is_empty());
        assert_eq!(engine.lister().calls("agents"), 0);
    }

    #[test]
    fn test_fixed_predicates_are_anded() {
        let lister = FakeLister::new().with_records(
            "compliance-summaries",
            vec![
                json!({"ResourceId": "i-1", "ComplianceType": "Patch", "Status": "COMPLIANT"}),
                json!({"ResourceId": "i-1", "ComplianceType": "Association", "Status": "COMPLIANT"}),
            ],
        );
        let engine = QueryEngine::new(lister);
        let family = get_family("compliance-summaries").unwrap();
        let request = DescribeRequest::for_family(family).predicate(Predicate::FieldIn {
            name: "ComplianceType".to_string(),
            values: strings(&["Patch"]),
        });

        let rows = tokio_test::block_on(engine.describe("compliance-summaries", &request)).unwrap();

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].text("Status"), Some("COMPLIANT"));
    }

    #[test]
    fn test_upstream_error_propagates() {
        let lister = FakeLister::new()
            .with_records("instances", vec![instance("i-1", "alice", "running")])
            .failing_at("volumes", 0);
        let engine = QueryEngine::new(lister);
        let family = get_family("instances").unwrap();
        let request = DescribeRequest::for_family(family).columns(Some(strings(&["Id", "Volumes"])));

        let err = tokio_test::block_on(engine.describe("instances", &request)).unwrap_err();

        assert_eq!(err.kind(), "UPSTREAM");
        assert!(err.to_string().contains("503"));
    }

    #[test]
    fn test_image_join_error_fails_describe() {
        let lister = FakeLister::new()
            .with_records(
                "instances",
                vec![instance("i-1", "alice", "running"), instance("i-2", "bob", "running")],
            )
            .with_records("images", vec![json!({"ImageId": "ami-1", "Name": "base"})])
            .failing_at("images", 0);
        let engine = QueryEngine::new(lister);
        let family = get_family("instances").unwrap();
        let request = DescribeRequest::for_family(family).columns(Some(strings(&["Id", "Image.Name"])));

        let result = tokio_test::block_on(engine.describe("instances", &request));

        match result {
            Err(QueryError::Upstream(inner)) => {
                assert!(format!("{:#}", inner).contains("listing images failed"));
            }
            other => panic!("expected upstream error, got {:?}", other),
        }
        assert_eq!(engine.lister().calls("instances"), 1);
        assert_eq!(engine.lister().calls("images"), 1);
    }
}
