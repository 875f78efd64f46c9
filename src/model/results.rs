use std::collections::BTreeSet;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;
use std::sync::Arc;

use crate::error::ResolveError;
use crate::model::artifact::ModuleComponentArtifactMetadata;
use crate::model::metadata::ModuleMetadata;

/// Records every resource location that was attempted, whatever the outcome. This is what ends
///  up in the 'searched in the following locations' part of a resolution failure.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ResourceAwareResolveResult {
    attempted: Vec<String>,
}
impl ResourceAwareResolveResult {
    pub fn new() -> ResourceAwareResolveResult {
        Default::default()
    }

    pub fn attempted(&mut self, location: impl ToString) {
        self.attempted.push(location.to_string());
    }

    pub fn attempted_locations(&self) -> &[String] {
        &self.attempted
    }

    pub fn apply_to(&self, target: &mut ResourceAwareResolveResult) {
        target.attempted.extend(self.attempted.iter().cloned());
    }
}

/// How expensive it is to get the metadata for a component from a repository. Used to order
///  repositories cheapest first.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MetadataFetchingCost {
    /// metadata is available locally
    Fast,
    /// local repository, metadata may or may not be there
    Cheap,
    /// remote repository
    Expensive,
}
impl Display for MetadataFetchingCost {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            MetadataFetchingCost::Fast => "FAST",
            MetadataFetchingCost::Cheap => "CHEAP",
            MetadataFetchingCost::Expensive => "EXPENSIVE",
        })
    }
}

#[derive(Debug)]
pub enum ComponentMetadataState {
    Resolved(Arc<ModuleMetadata>),
    Missing,
    Failed(ResolveError),
}

#[derive(Debug, Default)]
pub struct ComponentMetadataResult {
    pub resources: ResourceAwareResolveResult,
    state: Option<ComponentMetadataState>,
}
impl ComponentMetadataResult {
    pub fn resolved(&mut self, metadata: ModuleMetadata) {
        self.state = Some(ComponentMetadataState::Resolved(Arc::new(metadata)));
    }

    pub fn missing(&mut self) {
        self.state = Some(ComponentMetadataState::Missing);
    }

    pub fn failed(&mut self, error: ResolveError) {
        self.state = Some(ComponentMetadataState::Failed(error));
    }

    /// `None` if this access did not produce any result (e.g. local access for a remote-only module)
    pub fn state(&self) -> Option<&ComponentMetadataState> {
        self.state.as_ref()
    }

    pub fn has_result(&self) -> bool {
        self.state.is_some()
    }

    pub fn metadata(&self) -> Option<&Arc<ModuleMetadata>> {
        match &self.state {
            Some(ComponentMetadataState::Resolved(m)) => Some(m),
            _ => None,
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self.state, Some(ComponentMetadataState::Missing))
    }

    pub fn failure(&self) -> Option<&ResolveError> {
        match &self.state {
            Some(ComponentMetadataState::Failed(e)) => Some(e),
            _ => None,
        }
    }
}

#[derive(Debug)]
pub enum ModuleVersionListingState {
    Listed {
        versions: BTreeSet<String>,
        authoritative: bool,
    },
    Failed(ResolveError),
}

#[derive(Debug, Default)]
pub struct ModuleVersionListingResult {
    pub resources: ResourceAwareResolveResult,
    state: Option<ModuleVersionListingState>,
}
impl ModuleVersionListingResult {
    /// Adds to the versions listed so far. Once an authoritative listing was recorded, the
    ///  listing is complete and non-authoritative contributions are ignored.
    pub fn listed(&mut self, versions: impl IntoIterator<Item = String>, authoritative: bool) {
        match &mut self.state {
            Some(ModuleVersionListingState::Listed { versions: existing, authoritative: existing_authoritative }) => {
                if *existing_authoritative {
                    return;
                }
                if authoritative {
                    *existing = versions.into_iter().collect();
                    *existing_authoritative = true;
                }
                else {
                    existing.extend(versions);
                }
            }
            Some(ModuleVersionListingState::Failed(_)) => {}
            None => {
                self.state = Some(ModuleVersionListingState::Listed {
                    versions: versions.into_iter().collect(),
                    authoritative,
                });
            }
        }
    }

    pub fn failed(&mut self, error: ResolveError) {
        self.state = Some(ModuleVersionListingState::Failed(error));
    }

    pub fn has_result(&self) -> bool {
        self.state.is_some()
    }

    pub fn is_authoritative(&self) -> bool {
        matches!(self.state, Some(ModuleVersionListingState::Listed { authoritative: true, .. }))
    }

    pub fn versions(&self) -> Option<&BTreeSet<String>> {
        match &self.state {
            Some(ModuleVersionListingState::Listed { versions, .. }) => Some(versions),
            _ => None,
        }
    }

    pub fn failure(&self) -> Option<&ResolveError> {
        match &self.state {
            Some(ModuleVersionListingState::Failed(e)) => Some(e),
            _ => None,
        }
    }
}

#[derive(Debug)]
pub enum ArtifactSetState {
    Resolved(Vec<ModuleComponentArtifactMetadata>),
    Failed(ResolveError),
}

#[derive(Debug, Default)]
pub struct ArtifactSetResult {
    state: Option<ArtifactSetState>,
}
impl ArtifactSetResult {
    pub fn resolved(&mut self, artifacts: Vec<ModuleComponentArtifactMetadata>) {
        self.state = Some(ArtifactSetState::Resolved(artifacts));
    }

    pub fn failed(&mut self, error: ResolveError) {
        self.state = Some(ArtifactSetState::Failed(error));
    }

    pub fn has_result(&self) -> bool {
        self.state.is_some()
    }

    pub fn artifacts(&self) -> Option<&[ModuleComponentArtifactMetadata]> {
        match &self.state {
            Some(ArtifactSetState::Resolved(a)) => Some(a),
            _ => None,
        }
    }

    pub fn failure(&self) -> Option<&ResolveError> {
        match &self.state {
            Some(ArtifactSetState::Failed(e)) => Some(e),
            _ => None,
        }
    }
}

#[derive(Debug)]
pub enum ArtifactFileState {
    Resolved(PathBuf),
    NotFound(String),
    Failed(ResolveError),
}

#[derive(Debug, Default)]
pub struct ArtifactFileResult {
    pub resources: ResourceAwareResolveResult,
    state: Option<ArtifactFileState>,
}
impl ArtifactFileResult {
    pub fn resolved(&mut self, file: PathBuf) {
        self.state = Some(ArtifactFileState::Resolved(file));
    }

    pub fn not_found(&mut self, artifact: &ModuleComponentArtifactMetadata) {
        self.state = Some(ArtifactFileState::NotFound(artifact.to_string()));
    }

    pub fn failed(&mut self, error: ResolveError) {
        self.state = Some(ArtifactFileState::Failed(error));
    }

    pub fn has_result(&self) -> bool {
        self.state.is_some()
    }

    pub fn state(&self) -> Option<&ArtifactFileState> {
        self.state.as_ref()
    }

    pub fn file(&self) -> Option<&PathBuf> {
        match &self.state {
            Some(ArtifactFileState::Resolved(f)) => Some(f),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self.state, Some(ArtifactFileState::NotFound(_)))
    }

    pub fn failure(&self) -> Option<&ResolveError> {
        match &self.state {
            Some(ArtifactFileState::Failed(e)) => Some(e),
            _ => None,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn versions(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_non_authoritative_listings_accumulate() {
        let mut result = ModuleVersionListingResult::default();
        result.listed(versions(&["1.0"]), false);
        result.listed(versions(&["1.1"]), false);

        assert!(!result.is_authoritative());
        assert_eq!(result.versions().unwrap().iter().cloned().collect::<Vec<_>>(), versions(&["1.0", "1.1"]));
    }

    #[test]
    fn test_authoritative_listing_replaces_and_is_final() {
        let mut result = ModuleVersionListingResult::default();
        result.listed(versions(&["0.9"]), false);
        result.listed(versions(&["1.0"]), true);
        result.listed(versions(&["2.0"]), false);
        result.listed(versions(&["3.0"]), true);

        assert!(result.is_authoritative());
        assert_eq!(result.versions().unwrap().iter().cloned().collect::<Vec<_>>(), versions(&["1.0"]));
    }

    #[test]
    fn test_cost_ordering() {
        assert!(MetadataFetchingCost::Fast < MetadataFetchingCost::Cheap);
        assert!(MetadataFetchingCost::Cheap < MetadataFetchingCost::Expensive);
    }
}
