//! Cross-resource joins
//!
//! Side resources are fetched only when a requested column needs them, once
//! per query, and indexed into maps that the projector reads per record.
//! Volume and instance joins do not depend on the primary records and run
//! alongside the primary fetch; the image join targets the image ids of the
//! records and runs after it.

use super::fetcher::{fetch_all, ResourceLister};
use super::filter::{Predicate, ProviderFilter};
use super::record::ResourceRecord;
use super::registry::{get_family, JoinTarget, ResourceFamily};
use super::state::StateFilter;
use anyhow::{Context, Result};
use serde_json::Value;
use std::collections::HashMap;

/// Field on instance records naming their source image
const IMAGE_KEY_FIELD: &str = "ImageId";

/// Indexed side resources for one query
#[derive(Debug, Clone, Default)]
pub struct JoinMaps {
    volumes: Option<HashMap<String, Vec<String>>>,
    images: Option<HashMap<String, ResourceRecord>>,
    instances: Option<HashMap<String, ResourceRecord>>,
}

impl JoinMaps {
    /// No joins; joined columns resolve to absent
    pub fn none() -> Self {
        Self::default()
    }

    pub fn with_volumes(mut self, volumes: &[ResourceRecord]) -> Self {
        self.volumes = Some(group_volumes(volumes));
        self
    }

    pub fn with_images(mut self, images: Vec<ResourceRecord>) -> Self {
        self.images = Some(index_by(images, "ImageId"));
        self
    }

    pub fn with_instances(mut self, instances: Vec<ResourceRecord>) -> Self {
        self.instances = Some(index_by(instances, "InstanceId"));
        self
    }

    pub fn has(&self, target: JoinTarget) -> bool {
        match target {
            JoinTarget::Volumes => self.volumes.is_some(),
            JoinTarget::Image => self.images.is_some(),
            JoinTarget::Instance => self.instances.is_some(),
        }
    }

    /// Volume descriptors for an instance, in attachment order
    pub fn volumes_for(&self, instance_id: &str) -> Vec<String> {
        self.volumes
            .as_ref()
            .and_then(|m| m.get(instance_id))
            .cloned()
            .unwrap_or_default()
    }

    pub fn image(&self, image_id: &str) -> Option<&ResourceRecord> {
        self.images.as_ref()?.get(image_id)
    }

    pub fn instance(&self, instance_id: &str) -> Option<&ResourceRecord> {
        self.instances.as_ref()?.get(instance_id)
    }

    /// Key on `record` linking it to the side resource
    pub fn key_for<'r>(
        family: &ResourceFamily,
        target: JoinTarget,
        record: &'r ResourceRecord,
    ) -> Option<&'r str> {
        match target {
            JoinTarget::Volumes => record.get_str(&family.id_field),
            JoinTarget::Image => record.get_str(IMAGE_KEY_FIELD),
            JoinTarget::Instance => {
                let key_field = family
                    .instance_join
                    .as_ref()
                    .map(|j| j.key_field.as_str())
                    .unwrap_or("InstanceId");
                record.get_str(key_field)
            }
        }
    }

    /// Side record joined to `record`, for single-valued joins
    pub fn joined(
        &self,
        family: &ResourceFamily,
        target: JoinTarget,
        record: &ResourceRecord,
    ) -> Option<&ResourceRecord> {
        let key = Self::key_for(family, target, record)?;
        match target {
            JoinTarget::Image => self.image(key),
            JoinTarget::Instance => self.instance(key),
            JoinTarget::Volumes => None,
        }
    }
}

/// `instance id -> ["Size=<n> GiB", ...]`, one entry per attachment
pub fn group_volumes(volumes: &[ResourceRecord]) -> HashMap<String, Vec<String>> {
    let mut grouped: HashMap<String, Vec<String>> = HashMap::new();

    for volume in volumes {
        let size = match volume.get_path("Size") {
            Some(Value::String(s)) => s.clone(),
            Some(v) => v.to_string(),
            None => "?".to_string(),
        };

        let attachments = volume
            .get_path("Attachments")
            .and_then(|v| v.as_array())
            .map(Vec::as_slice)
            .unwrap_or(&[]);

        for attachment in attachments {
            if let Some(instance_id) = attachment.get("InstanceId").and_then(|v| v.as_str()) {
                grouped
                    .entry(instance_id.to_string())
                    .or_default()
                    .push(format!("Size={} GiB", size));
            }
        }
    }

    grouped
}

fn index_by(records: Vec<ResourceRecord>, id_field: &str) -> HashMap<String, ResourceRecord> {
    let mut index = HashMap::with_capacity(records.len());
    for record in records {
        if let Some(id) = record.get_str(id_field).map(str::to_string) {
            index.entry(id).or_insert(record);
        }
    }
    index
}

/// Distinct values of `field` across `records`, in first-seen order
pub fn distinct_values(records: &[ResourceRecord], field: &str) -> Vec<String> {
    let mut seen = Vec::new();
    for value in records.iter().filter_map(|r| r.get_str(field)) {
        if !seen.iter().any(|s: &String| s == value) {
            seen.push(value.to_string());
        }
    }
    seen
}

/// Fetches side resources through the same lister as the primary query
pub struct Joiner<'a, L: ?Sized> {
    lister: &'a L,
    page_size: usize,
}

impl<'a, L> Joiner<'a, L>
where
    L: ResourceLister + ?Sized,
{
    pub fn new(lister: &'a L, page_size: usize) -> Self {
        Self { lister, page_size }
    }

    fn family(target: JoinTarget) -> Result<&'static ResourceFamily> {
        get_family(target.family_key())
            .with_context(|| format!("join family {} is not registered", target.family_key()))
    }

    /// Volume and instance joins: bulk fetches that can run next to the
    /// primary fetch. `instances` supplies already-fetched instances.
    pub async fn fetch_independent(
        &self,
        family: &ResourceFamily,
        joins: &[JoinTarget],
        instances: Option<Vec<ResourceRecord>>,
    ) -> Result<JoinMaps> {
        let want_volumes = joins.contains(&JoinTarget::Volumes);
        let want_instances = joins.contains(&JoinTarget::Instance) && instances.is_none();

        let volumes = async {
            if !want_volumes {
                return Ok(None);
            }
            let volumes_family = Self::family(JoinTarget::Volumes)?;
            let volumes =
                fetch_all(self.lister, volumes_family, &ProviderFilter::all(), self.page_size)
                    .await?;
            Ok::<_, anyhow::Error>(Some(volumes))
        };

        let fetched_instances = async {
            if !want_instances {
                return Ok(None);
            }
            Ok::<_, anyhow::Error>(Some(self.fetch_instances(family, ProviderFilter::all()).await?))
        };

        let (volumes, fetched_instances) = futures::try_join!(volumes, fetched_instances)?;

        let mut maps = JoinMaps::none();
        if let Some(volumes) = volumes {
            tracing::debug!("joined {} volumes", volumes.len());
            maps = maps.with_volumes(&volumes);
        }
        if let Some(instances) = instances.or(fetched_instances) {
            tracing::debug!("joined {} instances", instances.len());
            maps = maps.with_instances(instances);
        }
        Ok(maps)
    }

    /// Instances for an instance join, narrowed to running ones when the
    /// family's join asks for that
    pub async fn fetch_instances(
        &self,
        family: &ResourceFamily,
        filter: ProviderFilter,
    ) -> Result<Vec<ResourceRecord>> {
        let instances_family = Self::family(JoinTarget::Instance)?;
        let running_only = family
            .instance_join
            .as_ref()
            .is_some_and(|j| j.running_only);

        let instances = fetch_all(self.lister, instances_family, &filter, self.page_size).await?;
        Ok(StateFilter::new(true, running_only).apply(instances_family, instances))
    }

    /// Image join: one targeted fetch of the distinct image ids in `records`
    pub async fn fetch_images(&self, records: &[ResourceRecord]) -> Result<Vec<ResourceRecord>> {
        let image_ids = distinct_values(records, IMAGE_KEY_FIELD);
        if image_ids.is_empty() {
            // an empty id filter would match every image
            return Ok(Vec::new());
        }

        let images_family = Self::family(JoinTarget::Image)?;
        let filter = ProviderFilter::with(Predicate::IdIn(image_ids));
        let images = fetch_all(self.lister, images_family, &filter, self.page_size).await?;
        tracing::debug!("joined {} images", images.len());
        Ok(images)
    }
}
