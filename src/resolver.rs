//! Repositories as seen by the dependency graph engine: patterns, metadata sources, the artifact
//!  resolver and the version lister composed into local and remote access.

pub mod access;
pub mod ivy;
pub mod maven;

use std::sync::{Arc, OnceLock};

use tracing::debug;

use crate::artifact_resolver::{ArtifactResolver, DefaultArtifactResolver};
use crate::blob::blob_storage::BlobStorage;
use crate::error::ResolveResult;
use crate::metadata::source::{MetadataSource, SourceContext};
use crate::model::coordinates::ModuleComponentIdentifier;
use crate::model::metadata::{ComponentOverrideMetadata, ModuleSource, ModuleSources, MutableModuleMetadata};
use crate::model::results::ComponentMetadataResult;
use crate::pattern::ResourcePattern;
use crate::resource::caching::CachingResourceAccessor;
use crate::resource::ExternalResourceRepository;
use crate::version_lister::{VersionLister, VersionListerRule};

use self::access::{LocalRepositoryAccess, RemoteRepositoryAccess};

/// How a repository is reached and where its files are cached
#[derive(Clone)]
pub struct RepositoryTransport {
    pub repository: Arc<dyn ExternalResourceRepository>,
    pub blob_storage: Arc<dyn BlobStorage>,
    /// a filesystem repository: files are used in place and may change at any time
    pub local: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResolverKind {
    Maven,
    Ivy,
}

pub struct ExternalResourceResolver {
    name: String,
    kind: ResolverKind,
    transport: RepositoryTransport,
    ivy_patterns: Vec<ResourcePattern>,
    artifact_patterns: Vec<ResourcePattern>,
    metadata_sources: Vec<MetadataSource>,
    version_lister: VersionLister,
    version_lister_rule: Option<Arc<dyn VersionListerRule>>,
    cached_artifact_resolver: OnceLock<Arc<DefaultArtifactResolver>>,
}
impl ExternalResourceResolver {
    fn new(
        name: impl Into<String>,
        kind: ResolverKind,
        transport: RepositoryTransport,
        ivy_patterns: Vec<ResourcePattern>,
        artifact_patterns: Vec<ResourcePattern>,
        metadata_sources: Vec<MetadataSource>,
        version_lister: VersionLister,
    ) -> ExternalResourceResolver {
        ExternalResourceResolver {
            name: name.into(),
            kind,
            transport,
            ivy_patterns,
            artifact_patterns,
            metadata_sources,
            version_lister,
            version_lister_rule: None,
            cached_artifact_resolver: OnceLock::new(),
        }
    }

    pub fn with_version_lister_rule(mut self, rule: Arc<dyn VersionListerRule>) -> ExternalResourceResolver {
        self.version_lister_rule = Some(rule);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> ResolverKind {
        self.kind
    }

    pub fn is_local(&self) -> bool {
        self.transport.local
    }

    pub fn repository(&self) -> &Arc<dyn ExternalResourceRepository> {
        &self.transport.repository
    }

    pub fn ivy_patterns(&self) -> &[ResourcePattern] {
        &self.ivy_patterns
    }

    pub fn artifact_patterns(&self) -> &[ResourcePattern] {
        &self.artifact_patterns
    }

    pub fn metadata_sources(&self) -> &[MetadataSource] {
        &self.metadata_sources
    }

    pub fn local_access(&self) -> LocalRepositoryAccess<'_> {
        LocalRepositoryAccess::new(self)
    }

    pub fn remote_access(&self) -> RemoteRepositoryAccess<'_> {
        RemoteRepositoryAccess::new(self)
    }

    /// Created on first use. Concurrent first uses may each build one, they are equivalent.
    fn default_artifact_resolver(&self) -> Arc<DefaultArtifactResolver> {
        self.cached_artifact_resolver.get_or_init(|| {
            Arc::new(DefaultArtifactResolver::new(
                self.name.clone(),
                self.transport.repository.clone(),
                CachingResourceAccessor::new(self.transport.repository.clone(), self.transport.blob_storage.clone(), self.transport.local),
                self.ivy_patterns.clone(),
                self.artifact_patterns.clone(),
            ))
        }).clone()
    }

    /// the artifact resolver for a component with the given sources
    pub fn artifact_resolver(&self, sources: &ModuleSources) -> ArtifactResolver {
        match (self.kind, sources.unique_snapshot_timestamp()) {
            (ResolverKind::Maven, Some(timestamp)) => ArtifactResolver::unique_snapshot(self.default_artifact_resolver(), timestamp),
            _ => ArtifactResolver::Default(self.default_artifact_resolver()),
        }
    }

    fn source_context<'a>(&'a self, artifact_resolver: &'a ArtifactResolver) -> SourceContext<'a> {
        SourceContext {
            artifact_resolver,
            version_lister: &self.version_lister,
            ivy_patterns: &self.ivy_patterns,
            artifact_patterns: &self.artifact_patterns,
        }
    }

    async fn resolve_component_meta_data(&self, id: &ModuleComponentIdentifier, overrides: &ComponentOverrideMetadata, result: &mut ComponentMetadataResult) -> ResolveResult<()> {
        match self.kind {
            ResolverKind::Maven => self.resolve_maven_component(id, overrides, result).await,
            ResolverKind::Ivy => self.resolve_static_dependency(id, overrides, result, ModuleSources::new()).await,
        }
    }

    /// Asks the metadata sources in order, the first one that finds something wins. Nothing
    ///  found means 'missing', which is not an error.
    async fn resolve_static_dependency(&self, id: &ModuleComponentIdentifier, overrides: &ComponentOverrideMetadata, result: &mut ComponentMetadataResult, extra_sources: ModuleSources) -> ResolveResult<()> {
        let artifact_resolver = self.artifact_resolver(&extra_sources);
        let ctx = self.source_context(&artifact_resolver);

        for source in &self.metadata_sources {
            if let Some(metadata) = source.create(&ctx, id, overrides, &mut result.resources).await? {
                debug!("found metadata for {} in repository '{}' with {:?}", id, self.name, source);
                let metadata = self.process_meta_data(metadata, overrides, &extra_sources);
                result.resolved(metadata.as_immutable());
                return Ok(());
            }
        }

        debug!("no metadata for {} in repository '{}'", id, self.name);
        result.missing();
        Ok(())
    }

    fn process_meta_data(&self, mut metadata: MutableModuleMetadata, overrides: &ComponentOverrideMetadata, extra_sources: &ModuleSources) -> MutableModuleMetadata {
        let mut sources = ModuleSources::new().with(ModuleSource::Repository { name: self.name.clone() });
        for source in metadata.sources.iter().chain(extra_sources.iter()) {
            sources.add(source.clone());
        }
        metadata.sources = sources;

        if overrides.changing || self.is_changing(&metadata.id) {
            metadata.changing = true;
        }
        if self.transport.local {
            metadata.component_metadata_rule_caching_enabled = false;
        }
        metadata
    }
}
