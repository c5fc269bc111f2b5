//! Instance describe commands

use super::{tag_columns, Listing, Selection};
use crate::resource::{
    get_family, DescribeRequest, QueryEngine, QueryError, QueryResult, ResourceFamily,
    ResourceLister,
};

fn family(key: &str) -> QueryResult<&'static ResourceFamily> {
    get_family(key).ok_or_else(|| QueryError::UnknownFamily(key.to_string()))
}

/// Options of an instance listing
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DescribeOptions {
    pub selection: Selection,
    pub include_terminated: bool,
    pub running_only: bool,
    /// Replaces the default sort columns
    pub sort_by: Option<Vec<String>>,
    /// Replaces the default columns
    pub columns: Option<Vec<String>>,
}

/// List instances
pub async fn describe<L: ResourceLister>(
    engine: &QueryEngine<L>,
    options: DescribeOptions,
) -> QueryResult<Listing> {
    let family = family("instances")?;
    let request = options
        .selection
        .apply(DescribeRequest::for_family(family))
        .include_terminated(options.include_terminated)
        .running_only(options.running_only)
        .columns(options.columns)
        .sort_by(options.sort_by);

    let rows = engine.describe_family(family, &request).await?;
    Ok(Listing::new(&request, rows))
}

/// List instances (or volumes) with their tags, sorted by name
pub async fn describe_tags<L: ResourceLister>(
    engine: &QueryEngine<L>,
    selection: Selection,
    keys: &[String],
    volumes: bool,
) -> QueryResult<Listing> {
    let family = family(if volumes { "volumes" } else { "instances" })?;
    let request = selection.apply(DescribeRequest {
        columns: tag_columns(&family.id_field, keys),
        sort_by: vec!["Name".to_string()],
        ..DescribeRequest::default()
    });

    let rows = engine.describe_family(family, &request).await?;
    Ok(Listing::new(&request, rows))
}

/// Status checks of running instances
pub async fn status<L: ResourceLister>(
    engine: &QueryEngine<L>,
    selection: Selection,
) -> QueryResult<Listing> {
    let family = family("instance-status")?;
    let request = selection.apply(DescribeRequest::for_family(family));

    let rows = engine.describe_family(family, &request).await?;
    Ok(Listing::new(&request, rows))
}

/// Launch templates with their default version
pub async fn templates<L: ResourceLister>(engine: &QueryEngine<L>) -> QueryResult<Listing> {
    let family = family("launch-templates")?;
    let request = DescribeRequest::for_family(family);

    let rows = engine.describe_family(family, &request).await?;
    Ok(Listing::new(&request, rows))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeLister;
    use serde_json::json;

    fn engine() -> QueryEngine<FakeLister> {
        let lister = FakeLister::new()
            .with_records(
                "instances",
                vec![
                    json!({"InstanceId": "i-1", "State": {"Name": "running"},
                           "Tags": [{"Key": "Name", "Value": "sam"}, {"Key": "Owner", "Value": "ops"}]}),
                    json!({"InstanceId": "i-2", "State": {"Name": "running"},
                           "Tags": [{"Key": "Name", "Value": "alice"}]}),
                    json!({"InstanceId": "i-3", "State": {"Name": "terminated"},
                           "Tags": [{"Key": "Name", "Value": "bob"}]}),
                ],
            )
            .with_records(
                "volumes",
                vec![json!({"VolumeId": "vol-1", "Size": 8, "Tags": [{"Key": "Name", "Value": "data"}]})],
            );
        QueryEngine::new(lister)
    }

    #[test]
    fn test_describe_tags_lists_all_tags() {
        let engine = engine();
        let listing =
            tokio_test::block_on(describe_tags(&engine, Selection::all(), &[], false)).unwrap();

        assert_eq!(listing.columns, vec!["InstanceId", "Name", "Tags"]);
        assert_eq!(listing.len(), 2);
        assert_eq!(listing.rows[0].text("Name"), Some("alice"));
        assert_eq!(listing.rows[1].text("Tags"), Some("Name=sam, Owner=ops"));
    }

    #[test]
    fn test_describe_tags_by_key() {
        let engine = engine();
        let keys = vec!["Owner".to_string()];
        let listing =
            tokio_test::block_on(describe_tags(&engine, Selection::all(), &keys, false)).unwrap();

        assert_eq!(listing.rows[0].get("Tag: Owner").unwrap().render(), "");
        assert_eq!(listing.rows[1].text("Tag: Owner"), Some("ops"));
    }

    #[test]
    fn test_volume_tags() {
        let engine = engine();
        let listing =
            tokio_test::block_on(describe_tags(&engine, Selection::all(), &[], true)).unwrap();

        assert_eq!(listing.columns, vec!["VolumeId", "Name", "Tags"]);
        assert_eq!(listing.rows[0].text("VolumeId"), Some("vol-1"));
        assert_eq!(engine.lister().calls("instances"), 0);
    }

    #[test]
    fn test_describe_custom_columns() {
        let engine = engine();
        let options = DescribeOptions {
            include_terminated: true,
            columns: Some(vec!["Name".to_string(), "Id".to_string()]),
            sort_by: Some(vec!["Name".to_string()]),
            ..DescribeOptions::default()
        };
        let listing = tokio_test::block_on(describe(&engine, options)).unwrap();

        let names: Vec<_> = listing.rows.iter().filter_map(|r| r.text("Name")).collect();
        assert_eq!(names, vec!["alice", "bob", "sam"]);
        assert_eq!(listing.columns, vec!["Name", "Id"]);
    }

    #[test]
    fn test_templates_show_default_version() {
        let lister = FakeLister::new().with_records(
            "launch-templates",
            vec![
                json!({"LaunchTemplateId": "lt-1", "LaunchTemplateName": "web",
                       "DefaultVersionNumber": 3, "LatestVersionNumber": 5}),
                json!({"LaunchTemplateId": "lt-2", "LaunchTemplateName": "batch",
                       "DefaultVersionNumber": 1, "LatestVersionNumber": 1}),
            ],
        );
        let engine = QueryEngine::new(lister);

        let listing = tokio_test::block_on(templates(&engine)).unwrap();

        assert_eq!(listing.columns, vec!["Name", "Default Version"]);
        assert_eq!(listing.len(), 2);
        assert_eq!(listing.rows[0].text("Name"), Some("web"));
        assert_eq!(listing.rows[0].text("Default Version"), Some("3"));
        assert_eq!(engine.lister().calls("launch-templates"), 1);
    }
}
