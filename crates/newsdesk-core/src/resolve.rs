//! Source resolution: author handle → durable source id.

use anyhow::{Context, Result};

use crate::models::NewSource;
use crate::social::Platform;
use crate::store::Store;

/// Source name used when a post carries no author handle.
pub const UNKNOWN_SOURCE: &str = "Unknown";

/// Builds the source row for `handle` on `platform`.
///
/// The URL is derived from the handle, or null when the handle is absent.
pub fn source_for(platform: &Platform, handle: Option<&str>, bio: Option<&str>) -> NewSource {
    NewSource {
        name: handle.unwrap_or(UNKNOWN_SOURCE).to_string(),
        source_type: platform.source_type.clone(),
        url: handle.map(|h| platform.profile_url(h)),
        description: bio.map(str::to_string),
    }
}

/// Get-or-create the source for `handle`, returning its id.
///
/// The store's upsert is atomic on `(name, type)`, so concurrent callers
/// resolving the same handle all receive the same id.
pub async fn resolve_source(
    store: &dyn Store,
    platform: &Platform,
    handle: Option<&str>,
    bio: Option<&str>,
) -> Result<i64> {
    let source = source_for(platform, handle, bio);
    store
        .get_or_create_source(&source)
        .await
        .with_context(|| format!("failed to resolve source '{}'", source.name))
}
