use std::fmt::{Display, Formatter};
use std::path::PathBuf;

use async_trait::async_trait;

use crate::model::artifact::ModuleComponentArtifactMetadata;
use crate::model::coordinates::is_non_unique_snapshot;
use crate::util::blob::Blob;

/// Identifies a cached copy of a remote resource: the repository it came from, the component it
///  belongs to and its file name. Unique snapshots have distinct file names, so different builds
///  of the same snapshot never share an entry.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ArtifactCacheKey {
    pub repository_id: String,
    pub group: String,
    pub module: String,
    pub version: String,
    pub file_name: String,
}
impl ArtifactCacheKey {
    pub fn for_artifact(repository_id: &str, artifact: &ModuleComponentArtifactMetadata) -> ArtifactCacheKey {
        ArtifactCacheKey {
            repository_id: repository_id.to_string(),
            group: artifact.component.group().to_string(),
            module: artifact.component.name().to_string(),
            version: artifact.component.snapshot_version(),
            file_name: artifact.file_name(),
        }
    }

    /// A non-unique snapshot file: its content can change in the repository while its name stays
    ///  the same. Timestamped snapshot files never change.
    pub fn is_changing(&self) -> bool {
        is_non_unique_snapshot(&self.version) && self.file_name.contains("-SNAPSHOT")
    }
}
impl Display for ArtifactCacheKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}:{}:{} ({})", self.group, self.module, self.version, self.file_name, self.repository_id)
    }
}

/// A verified local copy of a resource
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LocallyAvailableResource {
    pub file: PathBuf,
    pub sha1: [u8; 20],
}
impl LocallyAvailableResource {
    pub fn sha1_hex(&self) -> String {
        hex::encode(self.sha1)
    }
}

/// Content addressed storage for fetched resources.
///
/// Implementations are responsible for never exposing partially written content: an entry is
///  either fully there and verified, or absent.
#[async_trait]
pub trait BlobStorage: Send + Sync {
    /// a verified copy, if there is one
    async fn get(&self, key: &ArtifactCacheKey) -> anyhow::Result<Option<LocallyAvailableResource>>;

    async fn insert(&self, key: &ArtifactCacheKey, data: Blob) -> anyhow::Result<LocallyAvailableResource>;

    /// removes all cached copies for the key, `false` if there were none
    async fn delete(&self, key: &ArtifactCacheKey) -> anyhow::Result<bool>;
}
