//! Managed agent commands

use super::{Listing, Selection};
use crate::resource::{
    get_family, DescribeRequest, JoinMaps, Predicate, ProviderFilter, QueryEngine, QueryError,
    QueryResult, ResourceFamily, ResourceLister,
};

/// Most instance ids the patch state API accepts per call
pub const PATCH_STATE_BATCH: usize = 50;

fn family(key: &str) -> QueryResult<&'static ResourceFamily> {
    get_family(key).ok_or_else(|| QueryError::UnknownFamily(key.to_string()))
}

/// Agents on running instances
pub async fn describe<L: ResourceLister>(
    engine: &QueryEngine<L>,
    selection: Selection,
) -> QueryResult<Listing> {
    let family = family("agents")?;
    let request = selection.apply(DescribeRequest::for_family(family));

    let rows = engine.describe_family(family, &request).await?;
    Ok(Listing::new(&request, rows))
}

/// Patch state of every instance, fetched in batches of instance ids
pub async fn patch_summary<L: ResourceLister>(engine: &QueryEngine<L>) -> QueryResult<Listing> {
    let family = family("patch-states")?;
    let request = DescribeRequest::for_family(family);

    let instances = engine
        .joiner()
        .fetch_instances(family, ProviderFilter::all())
        .await?;
    let instance_ids: Vec<String> = instances
        .iter()
        .filter_map(|i| i.get_str("InstanceId"))
        .map(str::to_string)
        .collect();

    let mut records = Vec::new();
    for chunk in instance_ids.chunks(PATCH_STATE_BATCH) {
        let filter = ProviderFilter::with(Predicate::IdIn(chunk.to_vec()));
        records.extend(engine.fetch(family, &filter).await?);
    }
    tracing::debug!(
        "patch summary: {} states for {} instances",
        records.len(),
        instance_ids.len()
    );

    let joins = JoinMaps::none().with_instances(instances);
    let rows = engine.project_and_sort(family, &records, &request, &joins);
    Ok(Listing::new(&request, rows))
}

/// Patch compliance of every instance that has run the patch baseline
pub async fn compliance_summary<L: ResourceLister>(
    engine: &QueryEngine<L>,
) -> QueryResult<Listing> {
    let family = family("compliance-summaries")?;
    let request = DescribeRequest::for_family(family).predicate(Predicate::FieldIn {
        name: "ComplianceType".to_string(),
        values: vec!["Patch".to_string()],
    });

    let rows = engine.describe_family(family, &request).await?;
    Ok(Listing::new(&request, rows))
}

/// Run commands in the order the API returns them, optionally only those
/// sent to one instance (by id or Name tag)
pub async fn commands<L: ResourceLister>(
    engine: &QueryEngine<L>,
    instance: Option<&str>,
) -> QueryResult<Listing> {
    let family = family("commands")?;
    let mut request = DescribeRequest::for_family(family);

    if let Some(ident) = instance {
        let instance_id = resolve_instance_id(engine, ident).await?;
        request = request.predicate(Predicate::FieldIn {
            name: "InstanceIds".to_string(),
            values: vec![instance_id],
        });
    }

    let rows = engine.describe_family(family, &request).await?;
    Ok(Listing::new(&request, rows))
}

/// Invocations of one command across instances, named from their instance
pub async fn invocations<L: ResourceLister>(
    engine: &QueryEngine<L>,
    command_id: &str,
) -> QueryResult<Listing> {
    let family = family("command-invocations")?;
    let request = DescribeRequest::for_family(family).predicate(Predicate::FieldIn {
        name: "CommandId".to_string(),
        values: vec![command_id.to_string()],
    });

    let rows = engine.describe_family(family, &request).await?;
    Ok(Listing::new(&request, rows))
}

async fn resolve_instance_id<L: ResourceLister>(
    engine: &QueryEngine<L>,
    ident: &str,
) -> QueryResult<String> {
    let instances = family("instances")?;
    if instances.is_id(ident) {
        return Ok(ident.to_string());
    }

    let filter = ProviderFilter::with(Predicate::TagIn {
        key: "Name".to_string(),
        values: vec![ident.to_string()],
    });
    engine
        .fetch(instances, &filter)
        .await?
        .iter()
        .find_map(|i| i.get_str(&instances.id_field))
        .map(str::to_string)
        .ok_or_else(|| QueryError::NoInstanceNamed(ident.to_string()))
}
