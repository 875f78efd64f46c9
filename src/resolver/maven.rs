use tracing::debug;

use crate::error::ResolveResult;
use crate::maven::metadata_loader::{load_maven_metadata, MAVEN_METADATA_FILE};
use crate::metadata::source::MetadataSource;
use crate::model::coordinates::{is_non_unique_snapshot, unique_snapshot_timestamp, ModuleComponentIdentifier};
use crate::model::metadata::{ComponentOverrideMetadata, ModuleSource, ModuleSources};
use crate::model::results::{ComponentMetadataResult, ResourceAwareResolveResult};
use crate::pattern::{ResourcePattern, M2_PATTERN};
use crate::resource::ExternalResourceName;
use crate::version_lister::{MavenVersionLister, VersionLister};

use super::{ExternalResourceResolver, RepositoryTransport, ResolverKind};

impl ExternalResourceResolver {
    /// A Maven layout repository. POMs are only looked for at `root`, artifacts at `root` and
    ///  then at each of `artifact_roots`.
    pub fn maven(
        name: impl Into<String>,
        root: ExternalResourceName,
        artifact_roots: &[ExternalResourceName],
        transport: RepositoryTransport,
        metadata_sources: Vec<MetadataSource>,
    ) -> ExternalResourceResolver {
        let ivy_patterns = vec![ResourcePattern::maven(root.clone(), M2_PATTERN)];
        let artifact_patterns = std::iter::once(&root)
            .chain(artifact_roots.iter())
            .map(|r| ResourcePattern::maven(r.clone(), M2_PATTERN))
            .collect();
        let version_lister = VersionLister::Maven(MavenVersionLister::new(transport.repository.clone()));

        ExternalResourceResolver::new(name, ResolverKind::Maven, transport, ivy_patterns, artifact_patterns, metadata_sources, version_lister)
    }

    /// `-SNAPSHOT` versions of Maven repositories can change without the version changing
    pub(super) fn is_changing(&self, id: &ModuleComponentIdentifier) -> bool {
        self.kind == ResolverKind::Maven && is_non_unique_snapshot(&id.snapshot_version())
    }

    pub(super) async fn resolve_maven_component(&self, id: &ModuleComponentIdentifier, overrides: &ComponentOverrideMetadata, result: &mut ComponentMetadataResult) -> ResolveResult<()> {
        let timestamp = if is_non_unique_snapshot(id.version()) {
            self.find_unique_snapshot_version(id, &mut result.resources).await?
        }
        else {
            // already timestamped: no need to ask the repository
            unique_snapshot_timestamp(id.version()).map(|t| t.to_string())
        };

        match timestamp {
            Some(timestamp) => {
                debug!("resolving {} as unique snapshot {}", id, timestamp);
                let snapshot_id = ModuleComponentIdentifier::unique_snapshot(id.coordinate().clone(), timestamp.as_str());
                let sources = ModuleSources::new().with(ModuleSource::MavenUniqueSnapshot { timestamp });
                self.resolve_static_dependency(&snapshot_id, overrides, result, sources).await
            }
            None => self.resolve_static_dependency(id, overrides, result, ModuleSources::new()).await,
        }
    }

    /// The `<timestamp>-<buildNumber>` of the latest build of a snapshot, from the version level
    ///  `maven-metadata.xml`. A missing metadata file is the same as one without a timestamp.
    async fn find_unique_snapshot_version(&self, id: &ModuleComponentIdentifier, result: &mut ResourceAwareResolveResult) -> ResolveResult<Option<String>> {
        let pattern = match self.ivy_patterns.iter().find(|p| p.is_complete_for_component(id)) {
            Some(pattern) => pattern,
            None => return Ok(None),
        };
        let location = pattern.to_module_version_path(id)?.resolve(MAVEN_METADATA_FILE);
        result.attempted(&location);

        Ok(load_maven_metadata(self.repository().as_ref(), &location).await?
            .and_then(|m| m.unique_snapshot_timestamp()))
    }
}
