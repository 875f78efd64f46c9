use crate::ivy::layout::IvyPatterns;
use crate::metadata::source::MetadataSource;
use crate::version_lister::{ResourceVersionLister, VersionLister};

use super::{ExternalResourceResolver, RepositoryTransport, ResolverKind};

impl ExternalResourceResolver {
    /// A repository with an Ivy (or any custom pattern based) layout. Versions are listed by
    ///  scraping the directories the patterns point to.
    pub fn ivy(
        name: impl Into<String>,
        patterns: IvyPatterns,
        transport: RepositoryTransport,
        metadata_sources: Vec<MetadataSource>,
    ) -> ExternalResourceResolver {
        let version_lister = VersionLister::Resource(ResourceVersionLister::new(transport.repository.clone()));
        ExternalResourceResolver::new(
            name,
            ResolverKind::Ivy,
            transport,
            patterns.ivy_patterns,
            patterns.artifact_patterns,
            metadata_sources,
            version_lister,
        )
    }
}
