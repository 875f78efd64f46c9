use std::borrow::Cow;
use std::sync::Arc;

use tracing::trace;

use crate::blob::blob_storage::{ArtifactCacheKey, LocallyAvailableResource};
use crate::error::{ResolveError, ResolveResult};
use crate::model::artifact::ModuleComponentArtifactMetadata;
use crate::model::coordinates::ModuleComponentIdentifier;
use crate::model::results::ResourceAwareResolveResult;
use crate::pattern::ResourcePattern;
use crate::resource::caching::CachingResourceAccessor;
use crate::resource::ExternalResourceRepository;

/// Locates artifacts through a repository's patterns: descriptors through the metadata ('ivy')
///  patterns, everything else through the artifact patterns. Patterns are tried in order, and
///  every location is recorded on the result.
pub struct DefaultArtifactResolver {
    repository_id: String,
    repository: Arc<dyn ExternalResourceRepository>,
    accessor: CachingResourceAccessor,
    ivy_patterns: Vec<ResourcePattern>,
    artifact_patterns: Vec<ResourcePattern>,
}
impl DefaultArtifactResolver {
    pub fn new(
        repository_id: impl Into<String>,
        repository: Arc<dyn ExternalResourceRepository>,
        accessor: CachingResourceAccessor,
        ivy_patterns: Vec<ResourcePattern>,
        artifact_patterns: Vec<ResourcePattern>,
    ) -> DefaultArtifactResolver {
        DefaultArtifactResolver {
            repository_id: repository_id.into(),
            repository,
            accessor,
            ivy_patterns,
            artifact_patterns,
        }
    }

    fn patterns_for(&self, artifact: &ModuleComponentArtifactMetadata) -> &[ResourcePattern] {
        if artifact.is_descriptor() {
            &self.ivy_patterns
        }
        else {
            &self.artifact_patterns
        }
    }

    /// cheap existence check
    pub async fn artifact_exists(&self, artifact: &ModuleComponentArtifactMetadata, result: &mut ResourceAwareResolveResult) -> ResolveResult<bool> {
        for pattern in self.patterns_for(artifact) {
            if !pattern.is_complete_for_artifact(artifact) {
                continue;
            }
            let location = pattern.get_location(artifact)?;
            trace!("checking {} for {}", location, artifact);
            result.attempted(&location);

            let metadata = self.repository.get_metadata(&location).await
                .map_err(|e| ResolveError::transport(&location, e))?;
            if metadata.is_some() {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// `None` if the artifact does not exist at any of the candidate locations
    pub async fn resolve_artifact(&self, artifact: &ModuleComponentArtifactMetadata, result: &mut ResourceAwareResolveResult) -> ResolveResult<Option<LocallyAvailableResource>> {
        let key = ArtifactCacheKey::for_artifact(&self.repository_id, artifact);
        for pattern in self.patterns_for(artifact) {
            if !pattern.is_complete_for_artifact(artifact) {
                continue;
            }
            let location = pattern.get_location(artifact)?;
            trace!("loading {} for {}", location, artifact);
            result.attempted(&location);

            let resource = self.accessor.get_resource(&location, &key).await
                .map_err(|e| ResolveError::transport(&location, e))?;
            if resource.is_some() {
                return Ok(resource);
            }
        }
        Ok(None)
    }
}

/// The artifact resolver of a repository, possibly rewriting artifacts to a resolved Maven unique
///  snapshot before delegating.
#[derive(Clone)]
pub enum ArtifactResolver {
    Default(Arc<DefaultArtifactResolver>),
    MavenUniqueSnapshot {
        delegate: Arc<DefaultArtifactResolver>,
        timestamp: String,
    },
}
impl ArtifactResolver {
    pub fn unique_snapshot(delegate: Arc<DefaultArtifactResolver>, timestamp: impl Into<String>) -> ArtifactResolver {
        ArtifactResolver::MavenUniqueSnapshot {
            delegate,
            timestamp: timestamp.into(),
        }
    }

    fn delegate(&self) -> &Arc<DefaultArtifactResolver> {
        match self {
            ArtifactResolver::Default(d) => d,
            ArtifactResolver::MavenUniqueSnapshot { delegate, .. } => delegate,
        }
    }

    /// for resources addressed by their own coordinates, e.g. parent POMs
    pub fn without_rewrite(&self) -> ArtifactResolver {
        ArtifactResolver::Default(self.delegate().clone())
    }

    /// URL backed artifacts are addressed explicitly and are never rewritten
    pub fn maybe_rewrite<'a>(&self, artifact: &'a ModuleComponentArtifactMetadata) -> Cow<'a, ModuleComponentArtifactMetadata> {
        match self {
            ArtifactResolver::MavenUniqueSnapshot { timestamp, .. } if !artifact.is_url_backed() => {
                let coordinate = artifact.component.coordinate().clone();
                Cow::Owned(artifact.with_component(ModuleComponentIdentifier::unique_snapshot(coordinate, timestamp.as_str())))
            }
            _ => Cow::Borrowed(artifact),
        }
    }

    pub async fn artifact_exists(&self, artifact: &ModuleComponentArtifactMetadata, result: &mut ResourceAwareResolveResult) -> ResolveResult<bool> {
        let artifact = self.maybe_rewrite(artifact);
        self.delegate().artifact_exists(&artifact, result).await
    }

    pub async fn resolve_artifact(&self, artifact: &ModuleComponentArtifactMetadata, result: &mut ResourceAwareResolveResult) -> ResolveResult<Option<LocallyAvailableResource>> {
        let artifact = self.maybe_rewrite(artifact);
        self.delegate().resolve_artifact(&artifact, result).await
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::blob::fs_blob_storage::FsBlobStorage;
    use crate::model::artifact::IvyArtifactName;
    use crate::pattern::M2_PATTERN;
    use crate::resource::transient::TransientRepository;
    use crate::resource::ExternalResourceName;

    const ROOT: &str = "https://repo.example.org/maven2/";

    fn resolver(repository: Arc<TransientRepository>, cache: &tempfile::TempDir, extra_roots: &[&str]) -> Arc<DefaultArtifactResolver> {
        let root = ExternalResourceName::new(ROOT);
        let mut artifact_patterns = vec![ResourcePattern::maven(root.clone(), M2_PATTERN)];
        for r in extra_roots {
            artifact_patterns.push(ResourcePattern::maven(ExternalResourceName::new(*r), M2_PATTERN));
        }
        Arc::new(DefaultArtifactResolver::new(
            "test",
            repository.clone(),
            CachingResourceAccessor::new(repository, Arc::new(FsBlobStorage::new(cache.path())), false),
            vec![ResourcePattern::maven(root, M2_PATTERN)],
            artifact_patterns,
        ))
    }

    fn jar(version: &str) -> ModuleComponentArtifactMetadata {
        ModuleComponentArtifactMetadata::new(ModuleComponentIdentifier::new("org.example", "foo", version), IvyArtifactName::jar("foo"))
    }

    #[tokio::test]
    async fn test_missing_artifact_records_all_locations() {
        let cache = tempfile::tempdir().unwrap();
        let repository = Arc::new(TransientRepository::new());
        let resolver = resolver(repository, &cache, &["https://mirror.example.org/"]);

        let mut result = ResourceAwareResolveResult::new();
        assert!(resolver.resolve_artifact(&jar("1.0"), &mut result).await.unwrap().is_none());
        assert_eq!(result.attempted_locations(), &[
            "https://repo.example.org/maven2/org/example/foo/1.0/foo-1.0.jar".to_string(),
            "https://mirror.example.org/org/example/foo/1.0/foo-1.0.jar".to_string(),
        ]);
    }

    #[tokio::test]
    async fn test_second_root_is_used() {
        let cache = tempfile::tempdir().unwrap();
        let repository = Arc::new(TransientRepository::new());
        repository.insert("https://mirror.example.org/org/example/foo/1.0/foo-1.0.jar", "jar");
        let resolver = resolver(repository, &cache, &["https://mirror.example.org/"]);

        let mut result = ResourceAwareResolveResult::new();
        assert!(resolver.artifact_exists(&jar("1.0"), &mut result).await.unwrap());
        let resolved = resolver.resolve_artifact(&jar("1.0"), &mut result).await.unwrap().unwrap();
        assert_eq!(std::fs::read(resolved.file).unwrap(), b"jar");
    }

    #[tokio::test]
    async fn test_transport_failure_is_not_swallowed() {
        let cache = tempfile::tempdir().unwrap();
        let repository = Arc::new(TransientRepository::new());
        repository.fail("https://repo.example.org/maven2/org/example/foo/1.0/foo-1.0.jar");
        let resolver = resolver(repository, &cache, &[]);

        let mut result = ResourceAwareResolveResult::new();
        let err = resolver.resolve_artifact(&jar("1.0"), &mut result).await.unwrap_err();
        assert!(matches!(err, ResolveError::Transport { .. }));
    }

    #[tokio::test]
    async fn test_unique_snapshot_rewrite() {
        let cache = tempfile::tempdir().unwrap();
        let repository = Arc::new(TransientRepository::new());
        repository.insert("https://repo.example.org/maven2/org/example/foo/1.0-SNAPSHOT/foo-1.0-20240601.093000-3.jar", "snapshot jar");
        let resolver = ArtifactResolver::unique_snapshot(resolver(repository, &cache, &[]), "20240601.093000-3");

        let mut result = ResourceAwareResolveResult::new();
        let resolved = resolver.resolve_artifact(&jar("1.0-SNAPSHOT"), &mut result).await.unwrap().unwrap();
        assert_eq!(std::fs::read(resolved.file).unwrap(), b"snapshot jar");
    }

    #[test]
    fn test_url_backed_artifacts_are_not_rewritten() {
        let cache = tempfile::tempdir().unwrap();
        let resolver = ArtifactResolver::unique_snapshot(resolver(Arc::new(TransientRepository::new()), &cache, &[]), "20240601.093000-3");

        let url_backed = ModuleComponentArtifactMetadata::url_backed(
            ModuleComponentIdentifier::new("org.example", "foo", "1.0-SNAPSHOT"),
            IvyArtifactName::jar("foo"),
            "foo-all.jar",
        );
        assert!(matches!(resolver.maybe_rewrite(&url_backed), Cow::Borrowed(_)));

        let snapshot_jar = jar("1.0-SNAPSHOT");
        let rewritten = resolver.maybe_rewrite(&snapshot_jar);
        assert_eq!(rewritten.component.timestamp(), Some("20240601.093000-3"));
    }
}
