use std::path::Path;

use bytes::Bytes;
use tracing::{info, trace, warn};

use crate::checksum::{checksum_of_file, ChecksumAlgorithm};
use crate::error::{ResolveError, ResolveResult};
use crate::model::artifact::ModuleComponentArtifactMetadata;
use crate::resolver::ExternalResourceResolver;
use crate::resource::ExternalResourceName;

/// Uploads artifacts to a repository, at the location the repository's first matching pattern
///  gives, followed by checksum files.
pub struct Publisher {
    /// only SHA-1 checksums, for servers that reject anything else
    insecure_checksums: bool,
}
impl Publisher {
    pub fn new(insecure_checksums: bool) -> Publisher {
        Publisher { insecure_checksums }
    }

    fn checksum_algorithms(&self) -> &'static [ChecksumAlgorithm] {
        if self.insecure_checksums {
            &[ChecksumAlgorithm::Sha1]
        }
        else {
            &[ChecksumAlgorithm::Sha1, ChecksumAlgorithm::Sha256, ChecksumAlgorithm::Sha512]
        }
    }

    /// Ivy descriptors go to the first ivy pattern, everything else to the first artifact pattern.
    ///  Only a failure to upload the artifact itself fails the publication.
    pub async fn publish(&self, resolver: &ExternalResourceResolver, artifact: &ModuleComponentArtifactMetadata, file: &Path) -> ResolveResult<ExternalResourceName> {
        let patterns = if artifact.name.artifact_type == "ivy" {
            resolver.ivy_patterns()
        }
        else {
            resolver.artifact_patterns()
        };
        let pattern = patterns.first()
            .ok_or_else(|| ResolveError::NoPublishPattern {
                artifact: artifact.to_string(),
                repository: resolver.name().to_string(),
            })?;
        let destination = pattern.get_location(artifact)?;

        let content = tokio::fs::read(file).await
            .map_err(|e| ResolveError::io(file, e))?;
        trace!("uploading {} to {}", file.display(), destination);
        resolver.repository().put(&destination, Bytes::from(content)).await
            .map_err(|e| ResolveError::Publish {
                artifact: artifact.to_string(),
                location: destination.to_string(),
                source: e,
            })?;
        info!("published {} to {}", artifact, destination);

        for algorithm in self.checksum_algorithms() {
            if let Err(e) = self.publish_checksum(resolver, &destination, file, *algorithm).await {
                warn!("could not publish {} checksum for {}, the repository may not support it: {:#}", algorithm, destination, e);
            }
        }
        Ok(destination)
    }

    async fn publish_checksum(&self, resolver: &ExternalResourceResolver, destination: &ExternalResourceName, file: &Path, algorithm: ChecksumAlgorithm) -> anyhow::Result<()> {
        let checksum = checksum_of_file(file, algorithm).await?;
        let location = destination.append(&format!(".{}", algorithm.extension()));
        resolver.repository().put(&location, Bytes::from(checksum)).await
    }
}

#[cfg(test)]
mod test {
    use std::sync::Arc;

    use rstest::*;

    use super::*;
    use crate::blob::fs_blob_storage::FsBlobStorage;
    use crate::ivy::layout::IvyLayout;
    use crate::metadata::source::{ivy_descriptor_artifact, MetadataSource};
    use crate::model::artifact::IvyArtifactName;
    use crate::model::coordinates::ModuleComponentIdentifier;
    use crate::resolver::RepositoryTransport;
    use crate::resource::transient::TransientRepository;

    const JAR: &str = "https://repo.example.org/org/example/foo/1.0/foo-1.0.jar";

    fn maven(repository: Arc<TransientRepository>, cache: &tempfile::TempDir) -> ExternalResourceResolver {
        ExternalResourceResolver::maven(
            "releases",
            ExternalResourceName::new("https://repo.example.org"),
            &[],
            RepositoryTransport {
                repository,
                blob_storage: Arc::new(FsBlobStorage::new(cache.path())),
                local: false,
            },
            vec![MetadataSource::MavenPom { gradle_redirect: true }],
        )
    }

    fn jar() -> ModuleComponentArtifactMetadata {
        ModuleComponentArtifactMetadata::new(ModuleComponentIdentifier::new("org.example", "foo", "1.0"), IvyArtifactName::jar("foo"))
    }

    fn content(dir: &tempfile::TempDir) -> std::path::PathBuf {
        let path = dir.path().join("foo.jar");
        std::fs::write(&path, b"abc").unwrap();
        path
    }

    #[rstest]
    #[case::all_checksums(false, vec!["", ".sha1", ".sha256", ".sha512"])]
    #[case::insecure(true, vec!["", ".sha1"])]
    #[tokio::test]
    async fn test_publish(#[case] insecure_checksums: bool, #[case] suffixes: Vec<&str>) {
        let dir = tempfile::tempdir().unwrap();
        let repository = Arc::new(TransientRepository::new());
        let resolver = maven(repository.clone(), &dir);

        let location = Publisher::new(insecure_checksums).publish(&resolver, &jar(), &content(&dir)).await.unwrap();
        assert_eq!(location.uri(), JAR);
        assert_eq!(repository.puts(), suffixes.iter().map(|s| format!("{}{}", JAR, s)).collect::<Vec<_>>());
        assert_eq!(&repository.content(&format!("{}.sha1", JAR)).unwrap()[..], b"a9993e364706816aba3e25717850c26c9cd0d89d");
    }

    #[tokio::test]
    async fn test_checksum_failure_is_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let repository = Arc::new(TransientRepository::new());
        repository.fail(format!("{}.sha256", JAR));
        let resolver = maven(repository.clone(), &dir);

        Publisher::new(false).publish(&resolver, &jar(), &content(&dir)).await.unwrap();
        assert!(repository.content(JAR).is_some());
        assert!(repository.content(&format!("{}.sha1", JAR)).is_some());
        assert!(repository.content(&format!("{}.sha512", JAR)).is_some());
    }

    #[tokio::test]
    async fn test_artifact_failure_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let repository = Arc::new(TransientRepository::new());
        repository.fail(JAR);
        let resolver = maven(repository.clone(), &dir);

        let err = Publisher::new(false).publish(&resolver, &jar(), &content(&dir)).await.unwrap_err();
        assert!(matches!(err, ResolveError::Publish { .. }));
        assert_eq!(repository.puts(), vec![JAR.to_string()]);
    }

    #[tokio::test]
    async fn test_ivy_descriptor_goes_to_ivy_pattern() {
        let dir = tempfile::tempdir().unwrap();
        let repository = Arc::new(TransientRepository::new());
        let transport = RepositoryTransport {
            repository: repository.clone(),
            blob_storage: Arc::new(FsBlobStorage::new(dir.path())),
            local: false,
        };
        let patterns = IvyLayout::Gradle.patterns(&ExternalResourceName::new("https://ivy.example.org"), false, &[], &[]);
        let resolver = ExternalResourceResolver::ivy("ivy", patterns, transport, vec![MetadataSource::IvyDescriptor]);

        let descriptor = ivy_descriptor_artifact(&ModuleComponentIdentifier::new("org.example", "foo", "1.0"));
        let location = Publisher::new(true).publish(&resolver, &descriptor, &content(&dir)).await.unwrap();
        assert_eq!(location.uri(), "https://ivy.example.org/org.example/foo/1.0/ivy-1.0.xml");
    }

    #[tokio::test]
    async fn test_no_pattern() {
        let dir = tempfile::tempdir().unwrap();
        let transport = RepositoryTransport {
            repository: Arc::new(TransientRepository::new()),
            blob_storage: Arc::new(FsBlobStorage::new(dir.path())),
            local: false,
        };
        let patterns = IvyLayout::Pattern.patterns(&ExternalResourceName::new("https://ivy.example.org"), false, &[], &[]);
        let resolver = ExternalResourceResolver::ivy("empty", patterns, transport, vec![]);

        let err = Publisher::new(false).publish(&resolver, &jar(), &content(&dir)).await.unwrap_err();
        assert!(matches!(err, ResolveError::NoPublishPattern { .. }));
    }
}
