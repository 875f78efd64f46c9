use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tracing::{debug, trace};

use crate::artifact_resolver::ArtifactResolver;
use crate::blob::blob_storage::LocallyAvailableResource;
use crate::error::{ResolveError, ResolveResult};
use crate::ivy::descriptor::parse_ivy_descriptor;
use crate::maven::pom::{read_pom, PomLoader};
use crate::metadata::gradle_module::parse_module_metadata;
use crate::metadata::supplier::ComponentMetadataSupplier;
use crate::model::artifact::{IvyArtifactName, ModuleComponentArtifactMetadata};
use crate::model::coordinates::{ModuleComponentIdentifier, ModuleCoordinate, ModuleIdentifier};
use crate::model::metadata::{ComponentOverrideMetadata, ModuleSource, MutableModuleMetadata, VariantMetadata};
use crate::model::results::{ModuleVersionListingResult, ResourceAwareResolveResult};
use crate::pattern::ResourcePattern;
use crate::version_lister::VersionLister;

pub fn gradle_module_name(module: &str) -> IvyArtifactName {
    IvyArtifactName::new(module, "module", Some("module"), None)
}

pub fn pom_name(module: &str) -> IvyArtifactName {
    IvyArtifactName::new(module, "pom", Some("pom"), None)
}

pub fn ivy_descriptor_name() -> IvyArtifactName {
    IvyArtifactName::new("ivy", "ivy", Some("xml"), None)
}

/// `.module` files live next to the artifacts, so they are regular artifacts rather than descriptors
pub fn gradle_module_artifact(id: &ModuleComponentIdentifier) -> ModuleComponentArtifactMetadata {
    ModuleComponentArtifactMetadata::new(id.clone(), gradle_module_name(id.name()))
}

pub fn pom_artifact(id: &ModuleComponentIdentifier) -> ModuleComponentArtifactMetadata {
    ModuleComponentArtifactMetadata::descriptor(id.clone(), pom_name(id.name()))
}

pub fn ivy_descriptor_artifact(id: &ModuleComponentIdentifier) -> ModuleComponentArtifactMetadata {
    ModuleComponentArtifactMetadata::descriptor(id.clone(), ivy_descriptor_name())
}

/// What a metadata source needs from the repository it belongs to
pub struct SourceContext<'a> {
    pub artifact_resolver: &'a ArtifactResolver,
    pub version_lister: &'a VersionLister,
    pub ivy_patterns: &'a [ResourcePattern],
    pub artifact_patterns: &'a [ResourcePattern],
}

/// A way of producing module metadata from a repository. A repository has an ordered list of
///  these, and the first one that produces metadata wins.
#[derive(Clone)]
pub enum MetadataSource {
    GradleModule,
    MavenPom {
        /// look for Gradle module metadata if the POM says it was published with it
        gradle_redirect: bool,
    },
    IvyDescriptor,
    /// no descriptor: the module exists if its main artifact does
    Artifact,
    Supplier(Arc<dyn ComponentMetadataSupplier>),
}
impl std::fmt::Debug for MetadataSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MetadataSource::GradleModule => f.write_str("GradleModule"),
            MetadataSource::MavenPom { gradle_redirect } => write!(f, "MavenPom(gradle_redirect={})", gradle_redirect),
            MetadataSource::IvyDescriptor => f.write_str("IvyDescriptor"),
            MetadataSource::Artifact => f.write_str("Artifact"),
            MetadataSource::Supplier(_) => f.write_str("Supplier"),
        }
    }
}

async fn read_resource(resource: &LocallyAvailableResource) -> ResolveResult<String> {
    let bytes = tokio::fs::read(&resource.file).await
        .map_err(|e| ResolveError::io(&resource.file, e))?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

fn last_attempted(result: &ResourceAwareResolveResult) -> String {
    result.attempted_locations().last().cloned().unwrap_or_default()
}

fn descriptor_source(location: &str, resource: &LocallyAvailableResource) -> ModuleSource {
    ModuleSource::Descriptor {
        location: location.to_string(),
        sha1: resource.sha1_hex(),
    }
}

/// Loads parent POMs and BOMs through the repository's artifact resolver, remembering where it looked
struct RepositoryPomLoader {
    artifact_resolver: ArtifactResolver,
    attempted: Mutex<ResourceAwareResolveResult>,
}
impl RepositoryPomLoader {
    fn new(artifact_resolver: ArtifactResolver) -> RepositoryPomLoader {
        RepositoryPomLoader {
            artifact_resolver,
            attempted: Mutex::new(ResourceAwareResolveResult::new()),
        }
    }

    fn record_attempts(&self, result: &mut ResourceAwareResolveResult) {
        self.attempted.lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .apply_to(result);
    }
}

#[async_trait]
impl PomLoader for RepositoryPomLoader {
    async fn load_pom(&self, coordinate: &ModuleCoordinate) -> ResolveResult<Option<(String, String)>> {
        let artifact = pom_artifact(&ModuleComponentIdentifier::Module(coordinate.clone()));
        let mut result = ResourceAwareResolveResult::new();
        let resource = self.artifact_resolver.resolve_artifact(&artifact, &mut result).await;
        result.apply_to(&mut self.attempted.lock().unwrap_or_else(|poisoned| poisoned.into_inner()));

        match resource? {
            Some(resource) => Ok(Some((read_resource(&resource).await?, last_attempted(&result)))),
            None => Ok(None),
        }
    }
}

impl MetadataSource {
    /// `None` if this source finds nothing for the component, so the next one should be tried
    pub async fn create(&self, ctx: &SourceContext<'_>, id: &ModuleComponentIdentifier, overrides: &ComponentOverrideMetadata, result: &mut ResourceAwareResolveResult) -> ResolveResult<Option<MutableModuleMetadata>> {
        trace!("looking for metadata of {} with {:?}", id, self);
        match self {
            MetadataSource::GradleModule => Self::create_from_gradle_module(ctx, id, result).await,
            MetadataSource::MavenPom { gradle_redirect } => Self::create_from_pom(ctx, id, *gradle_redirect, result).await,
            MetadataSource::IvyDescriptor => Self::create_from_ivy_descriptor(ctx, id, result).await,
            MetadataSource::Artifact => Self::create_from_artifact(ctx, id, overrides, result).await,
            MetadataSource::Supplier(supplier) => {
                let details = supplier.supply(id).await
                    .map_err(|e| ResolveError::MetadataParse {
                        kind: "supplied component metadata",
                        location: id.to_string(),
                        source: e,
                    })?;
                Ok(details.map(|d| d.into_module_metadata(id.clone())))
            }
        }
    }

    async fn create_from_gradle_module(ctx: &SourceContext<'_>, id: &ModuleComponentIdentifier, result: &mut ResourceAwareResolveResult) -> ResolveResult<Option<MutableModuleMetadata>> {
        let resource = match ctx.artifact_resolver.resolve_artifact(&gradle_module_artifact(id), result).await? {
            Some(resource) => resource,
            None => return Ok(None),
        };
        let location = last_attempted(result);
        let mut metadata = parse_module_metadata(&read_resource(&resource).await?, id)
            .map_err(|e| ResolveError::MetadataParse {
                kind: "Gradle module metadata",
                location: location.clone(),
                source: e,
            })?;
        metadata.sources.add(descriptor_source(&location, &resource));
        Ok(Some(metadata))
    }

    async fn create_from_pom(ctx: &SourceContext<'_>, id: &ModuleComponentIdentifier, gradle_redirect: bool, result: &mut ResourceAwareResolveResult) -> ResolveResult<Option<MutableModuleMetadata>> {
        let resource = match ctx.artifact_resolver.resolve_artifact(&pom_artifact(id), result).await? {
            Some(resource) => resource,
            None => return Ok(None),
        };
        let location = last_attempted(result);
        let content = read_resource(&resource).await?;

        let loader = RepositoryPomLoader::new(ctx.artifact_resolver.without_rewrite());
        let pom = read_pom(&content, &location, &loader, 0).await;
        loader.record_attempts(result);
        let pom = pom?;

        if gradle_redirect && pom.published_with_gradle_metadata {
            debug!("{} was published with Gradle module metadata, trying that first", location);
            if let Some(metadata) = Self::create_from_gradle_module(ctx, id, result).await? {
                return Ok(Some(metadata));
            }
        }

        let mut metadata = pom.to_module_metadata(id.clone());
        metadata.sources.add(descriptor_source(&location, &resource));
        Ok(Some(metadata))
    }

    async fn create_from_ivy_descriptor(ctx: &SourceContext<'_>, id: &ModuleComponentIdentifier, result: &mut ResourceAwareResolveResult) -> ResolveResult<Option<MutableModuleMetadata>> {
        let resource = match ctx.artifact_resolver.resolve_artifact(&ivy_descriptor_artifact(id), result).await? {
            Some(resource) => resource,
            None => return Ok(None),
        };
        let location = last_attempted(result);
        let mut metadata = parse_ivy_descriptor(&read_resource(&resource).await?, id)
            .map_err(|e| ResolveError::MetadataParse {
                kind: "Ivy descriptor",
                location: location.clone(),
                source: e,
            })?;
        metadata.sources.add(descriptor_source(&location, &resource));
        Ok(Some(metadata))
    }

    async fn create_from_artifact(ctx: &SourceContext<'_>, id: &ModuleComponentIdentifier, overrides: &ComponentOverrideMetadata, result: &mut ResourceAwareResolveResult) -> ResolveResult<Option<MutableModuleMetadata>> {
        let name = overrides.artifact.clone().unwrap_or_else(|| IvyArtifactName::jar(id.name()));
        let artifact = ModuleComponentArtifactMetadata::new(id.clone(), name);
        if !ctx.artifact_resolver.artifact_exists(&artifact, result).await? {
            return Ok(None);
        }
        debug!("no descriptor for {}, using metadata derived from {}", id, artifact);

        let mut variant = VariantMetadata::new("default");
        variant.artifacts.push(artifact.clone());

        let mut metadata = MutableModuleMetadata::new(id.clone());
        metadata.missing_descriptor = true;
        metadata.variants.push(variant);
        metadata.artifacts.push(artifact);
        Ok(Some(metadata))
    }

    /// Adds this source's view of the module's versions to `result`
    pub async fn list_module_versions(&self, ctx: &SourceContext<'_>, module: &ModuleIdentifier, result: &mut ModuleVersionListingResult) -> ResolveResult<()> {
        let (artifact, patterns) = match self {
            MetadataSource::GradleModule => (gradle_module_name(&module.name), ctx.artifact_patterns),
            MetadataSource::MavenPom { .. } => (pom_name(&module.name), ctx.ivy_patterns),
            MetadataSource::IvyDescriptor => (ivy_descriptor_name(), ctx.ivy_patterns),
            MetadataSource::Artifact => (IvyArtifactName::jar(&module.name), ctx.artifact_patterns),
            MetadataSource::Supplier(_) => return Ok(()),
        };
        let complete = patterns.iter()
            .filter(|p| p.is_complete_for_module(module))
            .cloned()
            .collect::<Vec<_>>();
        ctx.version_lister.list_versions(module, &artifact, &complete, result).await
    }
}

#[cfg(test)]
mod test {
    use std::panic::AssertUnwindSafe;

    use super::*;
    use crate::artifact_resolver::DefaultArtifactResolver;
    use crate::blob::fs_blob_storage::FsBlobStorage;
    use crate::pattern::M2_PATTERN;
    use crate::resource::caching::CachingResourceAccessor;
    use crate::resource::transient::TransientRepository;
    use crate::resource::ExternalResourceName;

    #[tokio::test]
    async fn test_pom_loader_records_attempts_after_lock_poisoning() {
        let cache = tempfile::tempdir().unwrap();
        let repository = Arc::new(TransientRepository::new());
        let pom_uri = "https://repo.example.org/org/example/parent/1.0/parent-1.0.pom";
        repository.insert(pom_uri, "<project/>");

        let patterns = vec![ResourcePattern::maven(ExternalResourceName::new("https://repo.example.org"), M2_PATTERN)];
        let resolver = DefaultArtifactResolver::new(
            "remote",
            repository.clone(),
            CachingResourceAccessor::new(repository.clone(), Arc::new(FsBlobStorage::new(cache.path())), false),
            patterns.clone(),
            patterns,
        );
        let loader = RepositoryPomLoader::new(ArtifactResolver::Default(Arc::new(resolver)));

        let _ = std::panic::catch_unwind(AssertUnwindSafe(|| {
            let _guard = loader.attempted.lock().unwrap();
            panic!("poisoning the lock");
        }));
        assert!(loader.attempted.is_poisoned());

        let loaded = loader.load_pom(&ModuleCoordinate::new("org.example", "parent", "1.0")).await.unwrap();
        assert!(loaded.is_some());

        let mut result = ResourceAwareResolveResult::new();
        loader.record_attempts(&mut result);
        assert_eq!(result.attempted_locations(), [pom_uri.to_string()]);
    }
}
