use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::anyhow;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::blob::blob_storage::BlobStorage;
use crate::blob::fs_blob_storage::FsBlobStorage;
use crate::ivy::layout::IvyLayout;
use crate::metadata::source::MetadataSource;
use crate::resolver::{ExternalResourceResolver, RepositoryTransport};
use crate::resource::file::FileResourceRepository;
use crate::resource::http::HttpResourceRepository;
use crate::resource::{ExternalResourceName, ExternalResourceRepository};

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct MetadataSourcesConfig {
    pub gradle_metadata: bool,
    pub maven_pom: bool,
    pub ivy_descriptor: bool,
    pub artifact: bool,
    pub ignore_gradle_metadata_redirection: bool,
}
impl MetadataSourcesConfig {
    fn is_empty(&self) -> bool {
        !(self.gradle_metadata || self.maven_pom || self.ivy_descriptor || self.artifact)
    }

    /// in priority order: module metadata first, the bare artifact last
    fn sources(&self) -> Vec<MetadataSource> {
        let mut result = Vec::new();
        if self.gradle_metadata {
            result.push(MetadataSource::GradleModule);
        }
        if self.maven_pom {
            result.push(MetadataSource::MavenPom { gradle_redirect: !self.ignore_gradle_metadata_redirection });
        }
        if self.ivy_descriptor {
            result.push(MetadataSource::IvyDescriptor);
        }
        if self.artifact {
            result.push(MetadataSource::Artifact);
        }
        result
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum LayoutConfig {
    #[default]
    Maven,
    Ivy {
        #[serde(default)]
        layout: IvyLayout,
        #[serde(default)]
        ivy_patterns: Vec<String>,
        #[serde(default)]
        artifact_patterns: Vec<String>,
        #[serde(default)]
        m2_compatible: bool,
    },
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct RepositoryConfig {
    pub name: String,
    pub url: String,
    #[serde(default)]
    pub layout: LayoutConfig,
    /// nothing configured means the layout's defaults
    #[serde(default)]
    pub metadata_sources: MetadataSourcesConfig,
    /// additional Maven roots that are searched for artifacts, but never for POMs
    #[serde(default)]
    pub artifact_urls: Vec<String>,
}
impl RepositoryConfig {
    fn metadata_sources(&self) -> Vec<MetadataSource> {
        if !self.metadata_sources.is_empty() {
            return self.metadata_sources.sources();
        }
        match self.layout {
            LayoutConfig::Maven => vec![MetadataSource::MavenPom {
                gradle_redirect: !self.metadata_sources.ignore_gradle_metadata_redirection,
            }],
            LayoutConfig::Ivy { .. } => vec![MetadataSource::IvyDescriptor],
        }
    }

    fn transport(&self, blob_storage: Arc<dyn BlobStorage>) -> anyhow::Result<RepositoryTransport> {
        let (repository, local): (Arc<dyn ExternalResourceRepository>, bool) = match scheme(&self.url) {
            Some("http") | Some("https") => (Arc::new(HttpResourceRepository::new()), false),
            Some("file") => (Arc::new(FileResourceRepository::new()), true),
            other => return Err(anyhow!("repository {}: unsupported URL scheme {:?} in {}", self.name, other, self.url)),
        };
        Ok(RepositoryTransport { repository, blob_storage, local })
    }

    pub fn create_resolver(&self, blob_storage: Arc<dyn BlobStorage>) -> anyhow::Result<ExternalResourceResolver> {
        let transport = self.transport(blob_storage)?;
        let root = ExternalResourceName::new(self.url.as_str());
        let metadata_sources = self.metadata_sources();
        debug!("repository {} at {} with metadata sources {:?}", self.name, self.url, metadata_sources);

        Ok(match &self.layout {
            LayoutConfig::Maven => {
                let artifact_roots = self.artifact_urls.iter()
                    .map(|u| ExternalResourceName::new(u.as_str()))
                    .collect::<Vec<_>>();
                ExternalResourceResolver::maven(self.name.as_str(), root, &artifact_roots, transport, metadata_sources)
            }
            LayoutConfig::Ivy { layout, ivy_patterns, artifact_patterns, m2_compatible } => {
                let patterns = layout.patterns(&root, *m2_compatible, ivy_patterns, artifact_patterns);
                ExternalResourceResolver::ivy(self.name.as_str(), patterns, transport, metadata_sources)
            }
        })
    }
}

fn scheme(url: &str) -> Option<&str> {
    url.split_once("://").map(|(scheme, _)| scheme)
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ResolverSettings {
    pub cache_dir: PathBuf,
    #[serde(default)]
    pub repositories: Vec<RepositoryConfig>,
    /// publish SHA-1 checksums only
    #[serde(default)]
    pub insecure_checksums: bool,
}
impl ResolverSettings {
    pub async fn load(path: &Path) -> anyhow::Result<ResolverSettings> {
        let content = tokio::fs::read(path).await
            .map_err(|e| anyhow!("could not read settings {}: {}", path.display(), e))?;
        Ok(serde_json::from_slice(&content)?)
    }

    /// one resolver per configured repository, in declaration order, all sharing one cache
    pub fn create_resolvers(&self) -> anyhow::Result<Vec<ExternalResourceResolver>> {
        let blob_storage: Arc<dyn BlobStorage> = Arc::new(FsBlobStorage::new(&self.cache_dir));
        self.repositories.iter()
            .map(|r| r.create_resolver(blob_storage.clone()))
            .collect()
    }

    pub fn create_resolver(&self, name: &str) -> anyhow::Result<ExternalResourceResolver> {
        let repository = self.repositories.iter()
            .find(|r| r.name == name)
            .ok_or_else(|| anyhow!("no repository named {}", name))?;
        repository.create_resolver(Arc::new(FsBlobStorage::new(&self.cache_dir)))
    }
}

#[cfg(test)]
mod test {
    use rstest::*;

    use super::*;
    use crate::resolver::ResolverKind;

    const SETTINGS: &str = r#"{
        "cache_dir": "/tmp/arti-cache",
        "insecure_checksums": true,
        "repositories": [
            {
                "name": "central",
                "url": "https://repo.maven.apache.org/maven2",
                "artifact_urls": ["https://mirror.example.org/jars"]
            },
            {
                "name": "ivy-local",
                "url": "file:///srv/ivy",
                "layout": { "type": "ivy", "layout": "ivy" },
                "metadata_sources": { "ivy_descriptor": true, "artifact": true }
            }
        ]
    }"#;

    #[test]
    fn test_parse_settings() {
        let settings: ResolverSettings = serde_json::from_str(SETTINGS).unwrap();
        assert!(settings.insecure_checksums);
        assert_eq!(settings.repositories.len(), 2);
        assert_eq!(settings.repositories[0].layout, LayoutConfig::Maven);
        assert_eq!(settings.repositories[1].layout, LayoutConfig::Ivy {
            layout: IvyLayout::Ivy,
            ivy_patterns: vec![],
            artifact_patterns: vec![],
            m2_compatible: false,
        });
    }

    #[test]
    fn test_create_resolvers() {
        let settings: ResolverSettings = serde_json::from_str(SETTINGS).unwrap();
        let resolvers = settings.create_resolvers().unwrap();

        let central = &resolvers[0];
        assert_eq!(central.name(), "central");
        assert_eq!(central.kind(), ResolverKind::Maven);
        assert!(!central.is_local());
        assert_eq!(central.ivy_patterns().len(), 1);
        assert_eq!(central.artifact_patterns().len(), 2);

        let ivy = &resolvers[1];
        assert_eq!(ivy.kind(), ResolverKind::Ivy);
        assert!(ivy.is_local());
        assert!(matches!(ivy.metadata_sources(), [MetadataSource::IvyDescriptor, MetadataSource::Artifact]));
    }

    #[rstest]
    #[case::maven_default(r#"{"name": "r", "url": "https://r.example.org"}"#, "MavenPom(gradle_redirect=true)")]
    #[case::maven_ignore_redirect(r#"{"name": "r", "url": "https://r.example.org", "metadata_sources": {"ignore_gradle_metadata_redirection": true}}"#, "MavenPom(gradle_redirect=false)")]
    #[case::ivy_default(r#"{"name": "r", "url": "https://r.example.org", "layout": {"type": "ivy"}}"#, "IvyDescriptor")]
    #[case::gradle_first(r#"{"name": "r", "url": "https://r.example.org", "metadata_sources": {"maven_pom": true, "gradle_metadata": true}}"#, "GradleModule, MavenPom(gradle_redirect=true)")]
    fn test_default_metadata_sources(#[case] json: &str, #[case] expected: &str) {
        let config: RepositoryConfig = serde_json::from_str(json).unwrap();
        let sources = config.metadata_sources().iter()
            .map(|s| format!("{:?}", s))
            .collect::<Vec<_>>()
            .join(", ");
        assert_eq!(sources, expected);
    }

    #[test]
    fn test_unsupported_scheme() {
        let config: RepositoryConfig = serde_json::from_str(r#"{"name": "r", "url": "sftp://r.example.org"}"#).unwrap();
        assert!(config.create_resolver(Arc::new(FsBlobStorage::new("/tmp/arti-cache"))).is_err());
    }

    #[tokio::test]
    async fn test_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, SETTINGS).unwrap();

        let settings = ResolverSettings::load(&path).await.unwrap();
        assert_eq!(settings.cache_dir, PathBuf::from("/tmp/arti-cache"));
    }
}
