use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use regex::Regex;
use tracing::{debug, trace};

use crate::error::{ResolveError, ResolveResult};
use crate::maven::metadata_loader::{load_maven_metadata, MAVEN_METADATA_FILE};
use crate::model::artifact::IvyArtifactName;
use crate::model::coordinates::ModuleIdentifier;
use crate::model::metadata::ModuleComponentSelector;
use crate::model::results::ModuleVersionListingResult;
use crate::pattern::ResourcePattern;
use crate::resource::ExternalResourceRepository;

const REVISION_TOKEN: &str = "[revision]";

/// A user supplied way of listing the versions of a module, consulted before the repository.
///  Whatever it returns is trusted as the complete listing.
#[async_trait]
pub trait VersionListerRule: Send + Sync {
    /// `None` if the rule has no opinion on this module
    async fn list_versions(&self, selector: &ModuleComponentSelector) -> anyhow::Result<Option<Vec<String>>>;
}

/// Lists versions by scraping the 'directory' that `[revision]` lives in. Transports cannot
///  always list, and the listing can contain unrelated entries, so results are not authoritative.
pub struct ResourceVersionLister {
    repository: Arc<dyn ExternalResourceRepository>,
}
impl ResourceVersionLister {
    pub fn new(repository: Arc<dyn ExternalResourceRepository>) -> ResourceVersionLister {
        ResourceVersionLister { repository }
    }

    pub async fn list_versions(&self, module: &ModuleIdentifier, artifact: &IvyArtifactName, patterns: &[ResourcePattern], result: &mut ModuleVersionListingResult) -> ResolveResult<()> {
        let mut versions = BTreeSet::new();
        let mut listed_any = false;
        for pattern in patterns {
            if let Some(found) = self.visit(pattern, module, artifact, result).await? {
                listed_any = true;
                versions.extend(found);
            }
        }
        if listed_any {
            result.listed(versions, false);
        }
        Ok(())
    }

    async fn visit(&self, pattern: &ResourcePattern, module: &ModuleIdentifier, artifact: &IvyArtifactName, result: &mut ModuleVersionListingResult) -> ResolveResult<Option<Vec<String>>> {
        let list_pattern = pattern.to_version_list_pattern(module, artifact)?;
        let path = list_pattern.path();
        let revision_index = match path.find(REVISION_TOKEN) {
            Some(idx) => idx,
            None => return Ok(None),
        };

        let before = &path[..revision_index];
        let after = &path[revision_index + REVISION_TOKEN.len()..];
        let (parent, name_prefix) = match before.rfind('/') {
            Some(idx) => (&before[..idx + 1], &before[idx + 1..]),
            None => ("", before),
        };
        let name_suffix = after.split('/').next().unwrap_or("");

        let parent_location = list_pattern.with_path(parent);
        trace!("listing versions in {}", parent_location);
        result.resources.attempted(&list_pattern);

        let children = match self.repository.list(&parent_location).await
            .map_err(|e| ResolveError::transport(&parent_location, e))? {
            Some(children) => children,
            None => return Ok(None),
        };

        if name_prefix.is_empty() && name_suffix.is_empty() {
            return Ok(Some(children));
        }

        // the revision is part of a file name: extract it from the matching children
        let regex_source = format!(
            "^{}(.+?){}$",
            regex::escape(name_prefix),
            name_suffix.split(REVISION_TOKEN)
                .map(regex::escape)
                .collect::<Vec<_>>()
                .join(".+"),
        );
        let regex = Regex::new(&regex_source)
            .map_err(|e| ResolveError::UnsupportedLayout(format!("cannot list versions for pattern '{}': {}", pattern, e)))?;

        Ok(Some(children.iter()
            .filter_map(|child| regex.captures(child))
            .filter_map(|c| c.get(1))
            .map(|m| m.as_str().to_string())
            .collect()))
    }
}

/// Lists versions from the module level `maven-metadata.xml`. The file is maintained by the
///  repository, so its listing is authoritative.
pub struct MavenVersionLister {
    repository: Arc<dyn ExternalResourceRepository>,
}
impl MavenVersionLister {
    pub fn new(repository: Arc<dyn ExternalResourceRepository>) -> MavenVersionLister {
        MavenVersionLister { repository }
    }

    pub async fn list_versions(&self, module: &ModuleIdentifier, patterns: &[ResourcePattern], result: &mut ModuleVersionListingResult) -> ResolveResult<()> {
        let mut versions = BTreeSet::new();
        let mut found_metadata = false;
        for pattern in patterns {
            let location = pattern.to_module_path(module)?.resolve(MAVEN_METADATA_FILE);
            result.resources.attempted(&location);
            if let Some(metadata) = load_maven_metadata(self.repository.as_ref(), &location).await? {
                found_metadata = true;
                versions.extend(metadata.versions);
            }
        }

        if found_metadata {
            debug!("listed {} versions of {} from maven metadata", versions.len(), module);
            result.listed(versions, true);
        }
        Ok(())
    }
}

/// The listing strategy of a repository: Maven repositories have `maven-metadata.xml`,
///  everything else is scraped.
pub enum VersionLister {
    Maven(MavenVersionLister),
    Resource(ResourceVersionLister),
}
impl VersionLister {
    pub async fn list_versions(&self, module: &ModuleIdentifier, artifact: &IvyArtifactName, patterns: &[ResourcePattern], result: &mut ModuleVersionListingResult) -> ResolveResult<()> {
        match self {
            VersionLister::Maven(lister) => lister.list_versions(module, patterns, result).await,
            VersionLister::Resource(lister) => lister.list_versions(module, artifact, patterns, result).await,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::pattern::M2_PATTERN;
    use crate::resource::transient::TransientRepository;
    use crate::resource::ExternalResourceName;

    fn root() -> ExternalResourceName {
        ExternalResourceName::new("https://repo.example.org/")
    }

    fn sorted(result: &ModuleVersionListingResult) -> Vec<String> {
        result.versions().unwrap().iter().cloned().collect()
    }

    #[tokio::test]
    async fn test_list_revision_directories() {
        let repository = Arc::new(TransientRepository::new());
        repository.insert("https://repo.example.org/org/example/foo/1.0/foo-1.0.jar", "");
        repository.insert("https://repo.example.org/org/example/foo/1.1/foo-1.1.jar", "");
        repository.insert("https://repo.example.org/org/example/bar/2.0/bar-2.0.jar", "");

        let lister = ResourceVersionLister::new(repository.clone());
        let mut result = ModuleVersionListingResult::default();
        lister.list_versions(
            &ModuleIdentifier::new("org.example", "foo"),
            &IvyArtifactName::jar("foo"),
            &[ResourcePattern::maven(root(), M2_PATTERN)],
            &mut result,
        ).await.unwrap();

        assert_eq!(sorted(&result), vec!["1.0", "1.1"]);
        assert!(!result.is_authoritative());
        assert_eq!(repository.list_calls(), 1);
    }

    #[tokio::test]
    async fn test_list_revision_in_file_name() {
        let repository = Arc::new(TransientRepository::new());
        repository.insert("https://repo.example.org/org.example/foo/foo-1.0.jar", "");
        repository.insert("https://repo.example.org/org.example/foo/foo-1.1.jar", "");
        repository.insert("https://repo.example.org/org.example/foo/foo-1.1.pom", "");
        repository.insert("https://repo.example.org/org.example/foo/ivy-1.1.xml", "");

        let lister = ResourceVersionLister::new(repository);
        let mut result = ModuleVersionListingResult::default();
        lister.list_versions(
            &ModuleIdentifier::new("org.example", "foo"),
            &IvyArtifactName::jar("foo"),
            &[ResourcePattern::ivy(root(), "[organisation]/[module]/[artifact]-[revision].[ext]", false)],
            &mut result,
        ).await.unwrap();

        assert_eq!(sorted(&result), vec!["1.0", "1.1"]);
    }

    #[tokio::test]
    async fn test_nothing_to_list() {
        let lister = ResourceVersionLister::new(Arc::new(TransientRepository::new()));
        let mut result = ModuleVersionListingResult::default();
        lister.list_versions(
            &ModuleIdentifier::new("org.example", "foo"),
            &IvyArtifactName::jar("foo"),
            &[ResourcePattern::maven(root(), M2_PATTERN)],
            &mut result,
        ).await.unwrap();
        assert!(!result.has_result());
    }

    #[tokio::test]
    async fn test_maven_metadata_listing_is_authoritative() {
        let repository = Arc::new(TransientRepository::new());
        repository.insert(
            "https://repo.example.org/org/example/foo/maven-metadata.xml",
            "<metadata><versioning><versions><version>1.0</version><version>2.0</version></versions></versioning></metadata>",
        );

        let lister = MavenVersionLister::new(repository);
        let mut result = ModuleVersionListingResult::default();
        lister.list_versions(&ModuleIdentifier::new("org.example", "foo"), &[ResourcePattern::maven(root(), M2_PATTERN)], &mut result).await.unwrap();

        assert_eq!(sorted(&result), vec!["1.0", "2.0"]);
        assert!(result.is_authoritative());
        assert_eq!(result.resources.attempted_locations(), &["https://repo.example.org/org/example/foo/maven-metadata.xml".to_string()]);
    }
}
