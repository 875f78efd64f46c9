use tracing::{debug, trace};

use crate::artifact_resolver::ArtifactResolver;
use crate::blob::blob_storage::LocallyAvailableResource;
use crate::error::{ResolveError, ResolveResult};
use crate::metadata::source::{ivy_descriptor_artifact, pom_artifact};
use crate::model::artifact::{ArtifactType, ModuleComponentArtifactMetadata};
use crate::model::coordinates::ModuleComponentIdentifier;
use crate::model::metadata::{ComponentOverrideMetadata, ModuleComponentSelector, ModuleMetadata, ModuleSources};
use crate::model::results::{ArtifactFileResult, ArtifactSetResult, ComponentMetadataResult, MetadataFetchingCost, ModuleVersionListingResult, ResourceAwareResolveResult};

use super::{ExternalResourceResolver, ResolverKind};

impl ExternalResourceResolver {
    /// the descriptor artifact for `artifact_type`, if this kind of repository has one
    fn metadata_artifact(&self, id: &ModuleComponentIdentifier, artifact_type: ArtifactType) -> Option<ModuleComponentArtifactMetadata> {
        match (self.kind, artifact_type) {
            (ResolverKind::Maven, ArtifactType::MavenPom) => Some(pom_artifact(id)),
            (ResolverKind::Ivy, ArtifactType::IvyDescriptor) => Some(ivy_descriptor_artifact(id)),
            _ => None,
        }
    }
}

/// Access that never goes to the repository. All it can do is name metadata artifacts.
pub struct LocalRepositoryAccess<'a> {
    resolver: &'a ExternalResourceResolver,
}
impl<'a> LocalRepositoryAccess<'a> {
    pub(super) fn new(resolver: &'a ExternalResourceResolver) -> LocalRepositoryAccess<'a> {
        LocalRepositoryAccess { resolver }
    }

    pub fn list_module_versions(&self, _selector: &ModuleComponentSelector, _result: &mut ModuleVersionListingResult) {}

    pub fn resolve_component_meta_data(&self, _id: &ModuleComponentIdentifier, _overrides: &ComponentOverrideMetadata, _result: &mut ComponentMetadataResult) {}

    pub fn resolve_artifacts_with_type(&self, component: &ModuleMetadata, artifact_type: ArtifactType, result: &mut ArtifactSetResult) {
        if let Some(artifact) = self.resolver.metadata_artifact(component.id(), artifact_type) {
            result.resolved(vec![artifact]);
        }
    }

    pub fn resolve_artifact(&self, _artifact: &ModuleComponentArtifactMetadata, _sources: &ModuleSources, _result: &mut ArtifactFileResult) {}

    pub fn estimate_metadata_fetching_cost(&self, _id: &ModuleComponentIdentifier) -> MetadataFetchingCost {
        MetadataFetchingCost::Cheap
    }
}

/// Access that does the real work: listing, metadata and artifact resolution against the repository
pub struct RemoteRepositoryAccess<'a> {
    resolver: &'a ExternalResourceResolver,
}
impl<'a> RemoteRepositoryAccess<'a> {
    pub(super) fn new(resolver: &'a ExternalResourceResolver) -> RemoteRepositoryAccess<'a> {
        RemoteRepositoryAccess { resolver }
    }

    /// A version lister rule is asked first and trusted if it answers. Then the metadata sources
    ///  contribute until one of them has an authoritative listing. No versions at all is an empty
    ///  listing, not an error.
    pub async fn list_module_versions(&self, selector: &ModuleComponentSelector, result: &mut ModuleVersionListingResult) {
        if let Err(e) = self.try_list_module_versions(selector, result).await {
            result.failed(e);
        }
    }

    async fn try_list_module_versions(&self, selector: &ModuleComponentSelector, result: &mut ModuleVersionListingResult) -> ResolveResult<()> {
        let module = &selector.module;
        if let Some(rule) = &self.resolver.version_lister_rule {
            let listed = rule.list_versions(selector).await
                .map_err(|e| ResolveError::VersionListerRule {
                    module: module.to_string(),
                    source: e,
                })?;
            if let Some(versions) = listed {
                debug!("versions of {} listed by rule", module);
                result.listed(versions, true);
                return Ok(());
            }
        }

        let artifact_resolver = self.resolver.artifact_resolver(&ModuleSources::new());
        let ctx = self.resolver.source_context(&artifact_resolver);
        for source in &self.resolver.metadata_sources {
            source.list_module_versions(&ctx, module, result).await?;
            if result.is_authoritative() {
                return Ok(());
            }
        }

        if !result.has_result() {
            result.listed(Vec::<String>::new(), false);
        }
        Ok(())
    }

    pub async fn resolve_component_meta_data(&self, id: &ModuleComponentIdentifier, overrides: &ComponentOverrideMetadata, result: &mut ComponentMetadataResult) {
        if let Err(e) = self.resolver.resolve_component_meta_data(id, overrides, result).await {
            debug!("resolving metadata of {} in repository '{}' failed: {}", id, self.resolver.name, e);
            result.failed(e);
        }
    }

    pub async fn resolve_artifacts_with_type(&self, component: &ModuleMetadata, artifact_type: ArtifactType, result: &mut ArtifactSetResult) {
        match artifact_type {
            ArtifactType::Javadoc | ArtifactType::Sources => {
                if self.resolver.kind == ResolverKind::Ivy && !component.is_missing_descriptor() {
                    result.resolved(component.declared_artifacts_of_type(artifact_type));
                    return;
                }
                let (type_name, classifier) = match artifact_type {
                    ArtifactType::Javadoc => ("javadoc", "javadoc"),
                    _ => ("source", "sources"),
                };
                match self.find_optional_artifact(component, type_name, classifier).await {
                    Ok(artifacts) => result.resolved(artifacts),
                    Err(e) => result.failed(e),
                }
            }
            ArtifactType::MavenPom | ArtifactType::IvyDescriptor => {
                match self.resolver.metadata_artifact(component.id(), artifact_type) {
                    Some(artifact) => result.resolved(vec![artifact]),
                    None => result.failed(ResolveError::ArtifactsNotLocated {
                        context: artifact_type.to_string(),
                        component: component.id().to_string(),
                        repository: self.resolver.name.clone(),
                    }),
                }
            }
        }
    }

    /// the artifact if it exists, nothing otherwise
    async fn find_optional_artifact(&self, component: &ModuleMetadata, type_name: &str, classifier: &str) -> ResolveResult<Vec<ModuleComponentArtifactMetadata>> {
        let artifact = component.artifact(type_name, "jar", Some(classifier)).with_optional(true);
        let mut resources = ResourceAwareResolveResult::new();
        let exists = self.resolver.artifact_resolver(component.sources())
            .artifact_exists(&artifact, &mut resources)
            .await?;
        Ok(if exists { vec![artifact] } else { vec![] })
    }

    /// Downloads an artifact. Optional artifacts are checked before they are fetched, and an
    ///  artifact that does not exist is replaced by its alternative if it has one.
    pub async fn resolve_artifact(&self, artifact: &ModuleComponentArtifactMetadata, sources: &ModuleSources, result: &mut ArtifactFileResult) {
        let artifact_resolver = self.resolver.artifact_resolver(sources);

        let mut candidate = Some(artifact);
        while let Some(current) = candidate {
            trace!("resolving {} in repository '{}'", current, self.resolver.name);
            match Self::fetch(&artifact_resolver, current, &mut result.resources).await {
                Ok(Some(resource)) => {
                    result.resolved(resource.file);
                    return;
                }
                Ok(None) => candidate = current.alternative.as_deref(),
                Err(e) => {
                    result.failed(ResolveError::Artifact {
                        artifact: current.to_string(),
                        source: Box::new(e),
                    });
                    return;
                }
            }
        }
        result.not_found(artifact);
    }

    async fn fetch(artifact_resolver: &ArtifactResolver, artifact: &ModuleComponentArtifactMetadata, resources: &mut ResourceAwareResolveResult) -> ResolveResult<Option<LocallyAvailableResource>> {
        if artifact.optional && !artifact_resolver.artifact_exists(artifact, resources).await? {
            return Ok(None);
        }
        artifact_resolver.resolve_artifact(artifact, resources).await
    }

    /// Metadata of remote repositories is expensive. For local ones it is fast if the
    ///  repository's descriptor (POM or ivy.xml) is there and cheap otherwise.
    pub async fn estimate_metadata_fetching_cost(&self, id: &ModuleComponentIdentifier) -> MetadataFetchingCost {
        if !self.resolver.is_local() {
            return MetadataFetchingCost::Expensive;
        }

        let descriptor_type = match self.resolver.kind {
            ResolverKind::Maven => ArtifactType::MavenPom,
            ResolverKind::Ivy => ArtifactType::IvyDescriptor,
        };
        let descriptor = match self.resolver.metadata_artifact(id, descriptor_type) {
            Some(descriptor) => descriptor,
            None => return MetadataFetchingCost::Cheap,
        };

        let mut resources = ResourceAwareResolveResult::new();
        match self.resolver.artifact_resolver(&ModuleSources::new()).artifact_exists(&descriptor, &mut resources).await {
            Ok(true) => MetadataFetchingCost::Fast,
            Ok(false) => MetadataFetchingCost::Cheap,
            Err(e) => {
                debug!("checking {} in repository '{}' failed, assuming cheap metadata: {}", descriptor, self.resolver.name, e);
                MetadataFetchingCost::Cheap
            }
        }
    }
}
