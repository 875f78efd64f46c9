use std::sync::Arc;

use tracing::{debug, trace};

use crate::blob::blob_storage::{ArtifactCacheKey, BlobStorage, LocallyAvailableResource};
use crate::blob::fs_blob_storage::sha1_of_file;
use crate::resource::file::FileResourceRepository;
use crate::resource::{ExternalResourceName, ExternalResourceRepository};

/// Fetches resources into the local blob storage, serving verified cached copies without going
///  to the repository. Cached `-SNAPSHOT` files are checked against the remote SHA-1 first, and
///  evicted and fetched again when it changed.
///
/// Local (`file:`) repositories are not copied: their files are used in place, since copying
///  would only hide changes made to them.
pub struct CachingResourceAccessor {
    repository: Arc<dyn ExternalResourceRepository>,
    blob_storage: Arc<dyn BlobStorage>,
    local: bool,
}
impl CachingResourceAccessor {
    pub fn new(repository: Arc<dyn ExternalResourceRepository>, blob_storage: Arc<dyn BlobStorage>, local: bool) -> CachingResourceAccessor {
        CachingResourceAccessor {
            repository,
            blob_storage,
            local,
        }
    }

    /// `None` if the resource does not exist
    pub async fn get_resource(&self, location: &ExternalResourceName, key: &ArtifactCacheKey) -> anyhow::Result<Option<LocallyAvailableResource>> {
        if self.local {
            if self.repository.get_metadata(location).await?.is_none() {
                return Ok(None);
            }
            let file = FileResourceRepository::to_path(location);
            let sha1 = sha1_of_file(&file).await?;
            return Ok(Some(LocallyAvailableResource { file, sha1 }));
        }

        if let Some(cached) = self.blob_storage.get(key).await? {
            if !key.is_changing() {
                trace!("using cached copy of {}: {}", location, cached.file.display());
                return Ok(Some(cached));
            }

            match self.repository.get_metadata(location).await? {
                None => {
                    debug!("{} is gone from the repository, evicting cached copy", location);
                    self.blob_storage.delete(key).await?;
                    return Ok(None);
                }
                Some(remote) if remote.sha1.is_some_and(|sha1| sha1 != cached.sha1) => {
                    debug!("{} changed in the repository, evicting cached copy {}", location, cached.sha1_hex());
                    self.blob_storage.delete(key).await?;
                }
                Some(_) => {
                    trace!("cached copy of changing {} is up to date", location);
                    return Ok(Some(cached));
                }
            }
        }

        match self.repository.get(location).await? {
            None => Ok(None),
            Some(blob) => {
                trace!("downloaded {}", location);
                Ok(Some(self.blob_storage.insert(key, blob).await?))
            }
        }
    }
}
