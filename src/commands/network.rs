//! Security group and subnet listings

use super::Listing;
use crate::resource::{
    get_family, DescribeRequest, Predicate, QueryEngine, QueryError, QueryResult, ResourceLister,
};

/// Security groups, sorted by VPC then group name
pub async fn security_groups<L: ResourceLister>(
    engine: &QueryEngine<L>,
    vpc_id: Option<&str>,
) -> QueryResult<Listing> {
    list_in_vpc(engine, "security-groups", vpc_id).await
}

/// Subnets, sorted by VPC, availability zone then name
pub async fn subnets<L: ResourceLister>(
    engine: &QueryEngine<L>,
    vpc_id: Option<&str>,
) -> QueryResult<Listing> {
    list_in_vpc(engine, "subnets", vpc_id).await
}

async fn list_in_vpc<L: ResourceLister>(
    engine: &QueryEngine<L>,
    family_key: &str,
    vpc_id: Option<&str>,
) -> QueryResult<Listing> {
    let family =
        get_family(family_key).ok_or_else(|| QueryError::UnknownFamily(family_key.to_string()))?;
    let mut request = DescribeRequest::for_family(family);
    if let Some(vpc_id) = vpc_id {
        request = request.predicate(Predicate::FieldIn {
            name: "VpcId".to_string(),
            values: vec![vpc_id.to_string()],
        });
    }

    let rows = engine.describe_family(family, &request).await?;
    Ok(Listing::new(&request, rows))
}
