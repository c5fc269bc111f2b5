//! Resource Fetcher
//!
//! Handles listing resources through a [`ResourceLister`], following the
//! continuation cursor until the provider stops returning one.

use super::filter::ProviderFilter;
use super::record::ResourceRecord;
use super::registry::ResourceFamily;
use anyhow::Result;
use async_trait::async_trait;
use futures::stream::{self, Stream, TryStreamExt};

/// Default page size hint
pub const DEFAULT_PAGE_SIZE: usize = 1000;

/// One batch of records plus the cursor for the next batch
#[derive(Debug, Clone, Default)]
pub struct Page {
    pub records: Vec<ResourceRecord>,
    pub next_cursor: Option<String>,
}

/// Upstream list capability, one call per page
#[async_trait]
pub trait ResourceLister: Send + Sync {
    async fn list(
        &self,
        family: &ResourceFamily,
        filter: &ProviderFilter,
        page_size: usize,
        cursor: Option<&str>,
    ) -> Result<Page>;
}

enum Cursor {
    Start,
    Next(String),
    Done,
}

/// Lazy, finite sequence of pages. Each page is requested only when the
/// previous one has been consumed and carried a cursor.
pub fn pages<'a, L>(
    lister: &'a L,
    family: &'a ResourceFamily,
    filter: &'a ProviderFilter,
    page_size: usize,
) -> impl Stream<Item = Result<Page>> + Send + 'a
where
    L: ResourceLister + ?Sized,
{
    stream::try_unfold(Cursor::Start, move |state| async move {
        let cursor = match state {
            Cursor::Start => None,
            Cursor::Next(token) => Some(token),
            Cursor::Done => return Ok(None),
        };

        let page = lister
            .list(family, filter, page_size, cursor.as_deref())
            .await?;

        tracing::debug!(
            "fetched page of {} {} (more: {})",
            page.records.len(),
            family.key,
            page.next_cursor.is_some()
        );

        let next = match &page.next_cursor {
            Some(token) => Cursor::Next(token.clone()),
            None => Cursor::Done,
        };

        Ok(Some((page, next)))
    })
}

/// Fetch all records (auto-paginate), in page order
pub async fn fetch_all<L>(
    lister: &L,
    family: &ResourceFamily,
    filter: &ProviderFilter,
    page_size: usize,
) -> Result<Vec<ResourceRecord>>
where
    L: ResourceLister + ?Sized,
{
    let records = pages(lister, family, filter, page_size)
        .try_fold(Vec::new(), |mut all_records, page| async move {
            all_records.extend(page.records);
            Ok::<_, anyhow::Error>(all_records)
        })
        .await?;

    tracing::debug!("fetched {} {} in total", records.len(), family.key);
    Ok(records)
}
