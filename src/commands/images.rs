//! Machine image describe commands

use super::{tag_columns, Listing, Selection};
use crate::config::Profile;
use crate::resource::{
    get_family, DescribeRequest, Predicate, QueryEngine, QueryError, QueryResult,
    ResourceFamily, ResourceLister,
};

/// Options of an image listing
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImageOptions {
    pub selection: Selection,
    /// Owning account; defaults to the profile's owners, then `self`
    pub owner: Option<String>,
}

fn images() -> QueryResult<&'static ResourceFamily> {
    get_family("images").ok_or_else(|| QueryError::UnknownFamily("images".to_string()))
}

/// Owner and name defaults from the profile. Image ids are looked up
/// directly, without an owner filter.
fn scoped_request(
    family: &ResourceFamily,
    profile: &Profile,
    options: ImageOptions,
    request: DescribeRequest,
) -> DescribeRequest {
    let ImageOptions { selection, owner } = options;

    let by_id = !selection.identifiers.is_empty()
        && selection.identifiers.iter().all(|t| family.is_id(t));
    if by_id {
        return selection.apply(request);
    }

    let owners = owner.map(|o| vec![o]).unwrap_or_else(|| profile.image_owners());
    let name_match = match selection.name_match {
        Some(name_match) => Some(name_match),
        None if selection.identifiers.is_empty() => profile.describe_images_name_match.clone(),
        None => None,
    };

    Selection::new(selection.identifiers, name_match)
        .apply(request)
        .predicate(Predicate::OwnerIn(owners))
}

/// List images, newest first
pub async fn describe<L: ResourceLister>(
    engine: &QueryEngine<L>,
    profile: &Profile,
    options: ImageOptions,
    columns: Option<Vec<String>>,
) -> QueryResult<Listing> {
    let family = images()?;
    let request = scoped_request(
        family,
        profile,
        options,
        DescribeRequest::for_family(family).columns(columns),
    );

    let rows = engine.describe_family(family, &request).await?;
    Ok(Listing::new(&request, rows))
}

/// List images with their tags, sorted by name
pub async fn describe_tags<L: ResourceLister>(
    engine: &QueryEngine<L>,
    profile: &Profile,
    options: ImageOptions,
    keys: &[String],
) -> QueryResult<Listing> {
    let family = images()?;
    let request = DescribeRequest {
        columns: tag_columns(&family.id_field, keys),
        sort_by: vec!["Name".to_string()],
        ..DescribeRequest::default()
    };
    let request = scoped_request(family, profile, options, request);

    let rows = engine.describe_family(family, &request).await?;
    Ok(Listing::new(&request, rows))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::ProviderFilter;
    use crate::testing::FakeLister;
    use serde_json::json;

    fn engine() -> QueryEngine<FakeLister> {
        QueryEngine::new(FakeLister::new().with_records(
            "images",
            vec![
                json!({"ImageId": "ami-1", "Name": "base-2023", "CreationDate": "2023-05-01T00:00:00.000Z",
                       "RootDeviceName": "/dev/xvda",
                       "BlockDeviceMappings": [{"Ebs": {"VolumeSize": 8, "SnapshotId": "snap-1"}}]}),
                json!({"ImageId": "ami-2", "Name": "base-2024", "CreationDate": "2024-05-01T00:00:00.000Z",
                       "BlockDeviceMappings": []}),
                json!({"ImageId": "ami-3", "Name": "gpu-2024", "CreationDate": "2024-01-01T00:00:00.000Z",
                       "Tags": [{"Key": "Team", "Value": "ml"}]}),
            ],
        ))
    }

    #[test]
    fn test_newest_first_with_default_owner() {
        let engine = engine();
        let listing = tokio_test::block_on(describe(
            &engine,
            &Profile::default(),
            ImageOptions::default(),
            None,
        ))
        .unwrap();

        let ids: Vec<_> = listing.rows.iter().filter_map(|r| r.text("ImageId")).collect();
        assert_eq!(ids, vec!["ami-2", "ami-3", "ami-1"]);
        assert_eq!(listing.rows[2].text("Size"), Some("8"));
        assert!(listing.rows[0].get("Size").unwrap().is_absent());
        assert_eq!(
            engine.lister().filters("images"),
            vec![ProviderFilter::with(Predicate::OwnerIn(vec!["self".to_string()]))]
        );
    }

    #[test]
    fn test_image_id_skips_owner_filter() {
        let engine = engine();
        let options = ImageOptions {
            selection: Selection::new(vec!["ami-1".to_string()], None),
            owner: Some("123".to_string()),
        };
        let listing =
            tokio_test::block_on(describe(&engine, &Profile::default(), options, None)).unwrap();

        assert_eq!(listing.len(), 1);
        assert_eq!(
            engine.lister().filters("images"),
            vec![ProviderFilter::with(Predicate::IdIn(vec!["ami-1".to_string()]))]
        );
    }

    #[test]
    fn test_profile_name_match_fallback() {
        let engine = engine();
        let profile = Profile {
            describe_images_name_match: Some("gpu".to_string()),
            ..Profile::default()
        };
        let listing = tokio_test::block_on(describe(
            &engine,
            &profile,
            ImageOptions::default(),
            None,
        ))
        .unwrap();

        assert_eq!(listing.len(), 1);
        assert_eq!(listing.rows[0].text("Name"), Some("gpu-2024"));
    }

    #[test]
    fn test_tags_sorted_by_name() {
        let engine = engine();
        let listing = tokio_test::block_on(describe_tags(
            &engine,
            &Profile::default(),
            ImageOptions::default(),
            &[],
        ))
        .unwrap();

        let names: Vec<_> = listing.rows.iter().filter_map(|r| r.text("Name")).collect();
        assert_eq!(names, vec!["base-2023", "base-2024", "gpu-2024"]);
        assert_eq!(listing.rows[2].text("Tags"), Some("Team=ml"));
    }
}
