use tracing::{debug, trace};

use crate::error::{ResolveError, ResolveResult};
use crate::maven::metadata_xml::Metadata;
use crate::resource::{ExternalResourceName, ExternalResourceRepository};

pub const MAVEN_METADATA_FILE: &str = "maven-metadata.xml";

/// The parts of a `maven-metadata.xml` file the resolver uses
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MavenMetadata {
    pub versions: Vec<String>,
    pub timestamp: Option<String>,
    pub build_number: Option<String>,
}
impl MavenMetadata {
    /// `<timestamp>-<buildNumber>` if the file declares both
    pub fn unique_snapshot_timestamp(&self) -> Option<String> {
        match (&self.timestamp, &self.build_number) {
            (Some(timestamp), Some(build_number)) => Some(format!("{}-{}", timestamp, build_number)),
            _ => None,
        }
    }

    pub fn parse(xml: &str) -> anyhow::Result<MavenMetadata> {
        let raw: Metadata = serde_xml_rs::from_str(xml)?;
        let versioning = raw.versioning.unwrap_or_default();
        let snapshot = versioning.snapshot.unwrap_or_default();

        Ok(MavenMetadata {
            versions: versioning.versions
                .map(|v| v.version)
                .unwrap_or_default()
                .into_iter()
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .collect(),
            timestamp: snapshot.timestamp.map(|s| s.trim().to_string()).filter(|s| !s.is_empty()),
            build_number: snapshot.build_number.map(|s| s.trim().to_string()).filter(|s| !s.is_empty()),
        })
    }
}

/// Loads and parses a `maven-metadata.xml` file. Maven metadata changes over time, so it is
///  always fetched from the repository and never cached.
///
/// `None` if the file does not exist.
pub async fn load_maven_metadata(repository: &dyn ExternalResourceRepository, location: &ExternalResourceName) -> ResolveResult<Option<MavenMetadata>> {
    trace!("loading maven metadata from {}", location);
    let blob = match repository.get(location).await.map_err(|e| ResolveError::transport(location, e))? {
        Some(blob) => blob,
        None => {
            debug!("no maven metadata at {}", location);
            return Ok(None);
        }
    };
    let bytes = blob.into_bytes().await
        .map_err(|e| ResolveError::transport(location, e))?;

    MavenMetadata::parse(&String::from_utf8_lossy(&bytes))
        .map(Some)
        .map_err(|e| ResolveError::MetadataParse {
            kind: "maven metadata",
            location: location.to_string(),
            source: e,
        })
}
