//! Directory listing and purge over a paginated object store

use crate::error::StorageError;
use crate::models::types::{ListOptions, ListPage, ListedFile, PurgeSummary};
use crate::stores::key_path::{decode_listed_key, directory_prefix};
use crate::stores::object_client::{ListRequest, ObjectStoreClient};
use tracing::debug;

const DELIMITER: &str = "/";

/// List the direct children of `directory`.
///
/// Keys come back decoded. `resume_cursor` is set exactly when the store
/// reports the listing as truncated; its absence is the only end-of-listing
/// signal.
pub async fn list_directory<C>(
    client: &C,
    directory: &str,
    options: &ListOptions,
) -> Result<ListPage, StorageError>
where
    C: ObjectStoreClient + ?Sized,
{
    if options.max_count <= 0 {
        return Err(StorageError::InvalidArgument(format!(
            "max_count must be positive, got {}",
            options.max_count
        )));
    }

    let prefix = directory_prefix(directory);
    let page = client
        .list_objects(ListRequest {
            prefix: &prefix,
            delimiter: DELIMITER,
            continuation_token: options.resume_cursor.as_deref(),
            max_keys: options.max_count,
        })
        .await?;

    let files = page
        .objects
        .into_iter()
        .map(|object| ListedFile {
            key: decode_listed_key(&object.key),
            size: object.size,
            last_modified: object.last_modified,
            etag: object.etag,
        })
        .collect();

    let resume_cursor = if page.is_truncated {
        page.next_continuation_token
    } else {
        None
    };

    Ok(ListPage {
        files,
        resume_cursor,
    })
}

/// Delete every object directly under `directory`, one page at a time.
///
/// Each page is deleted before the next one is requested, so an interrupted
/// purge leaves everything from the first unprocessed page onward. Re-running
/// is always safe.
pub async fn purge_directory<C>(
    client: &C,
    directory: &str,
    page_size: i32,
) -> Result<PurgeSummary, StorageError>
where
    C: ObjectStoreClient + ?Sized,
{
    let mut summary = PurgeSummary::default();
    let mut cursor: Option<String> = None;

    loop {
        let options = ListOptions {
            resume_cursor: cursor.take(),
            max_count: page_size,
        };
        let page = list_directory(client, directory, &options).await?;
        if page.files.is_empty() {
            break;
        }

        let keys: Vec<String> = page.files.into_iter().map(|file| file.key).collect();
        client.delete_objects(&keys).await?;

        summary.pages += 1;
        summary.deleted += keys.len();
        debug!(directory = %directory, page = summary.pages, count = keys.len(), "Purged page");

        match page.resume_cursor {
            Some(next) => cursor = Some(next),
            None => break,
        }
    }

    Ok(summary)
}
