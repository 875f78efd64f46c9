use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};

use crate::model::artifact::{ArtifactType, IvyArtifactName, ModuleComponentArtifactMetadata};
use crate::model::coordinates::{ModuleComponentIdentifier, ModuleIdentifier};

pub const DEFAULT_STATUS_SCHEME: [&str; 3] = ["integration", "milestone", "release"];

#[derive(PartialEq, Eq, Clone, Debug, Default)]
pub struct VersionConstraint {
    pub requires: Option<String>,
    pub prefers: Option<String>,
    pub strictly: Option<String>,
    pub rejects: Vec<String>,
}
impl VersionConstraint {
    pub fn requires(version: impl Into<String>) -> VersionConstraint {
        VersionConstraint {
            requires: Some(version.into()),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.requires.is_none() && self.prefers.is_none() && self.strictly.is_none() && self.rejects.is_empty()
    }
}

#[derive(PartialEq, Eq, Clone, Debug)]
pub struct ModuleComponentSelector {
    pub module: ModuleIdentifier,
    pub version_constraint: VersionConstraint,
}
impl ModuleComponentSelector {
    pub fn new(group: impl Into<String>, name: impl Into<String>, version_constraint: VersionConstraint) -> ModuleComponentSelector {
        ModuleComponentSelector {
            module: ModuleIdentifier::new(group, name),
            version_constraint,
        }
    }
}

/// Whether a declared dependency pulls in its target or only constrains it if present
#[derive(PartialEq, Eq, Clone, Copy, Debug)]
pub enum DependencyKind {
    Dependency,
    Constraint,
}

#[derive(PartialEq, Eq, Clone, Debug)]
pub struct DependencyMetadata {
    pub selector: ModuleComponentSelector,
    pub artifacts: Vec<IvyArtifactName>,
    pub reason: Option<String>,
    pub kind: DependencyKind,
    pub endorsing_strict_versions: bool,
    pub optional: bool,
}
impl DependencyMetadata {
    pub fn is_constraint(&self) -> bool {
        self.kind == DependencyKind::Constraint
    }
}
impl Display for DependencyMetadata {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if self.is_constraint() {
            write!(f, "constraint ")?;
        }
        write!(f, "{}", self.selector.module)?;
        if let Some(version) = self.selector.version_constraint.strictly.as_ref().or(self.selector.version_constraint.requires.as_ref()) {
            write!(f, ":{}", version)?;
        }
        if self.optional {
            write!(f, " (optional)")?;
        }
        Ok(())
    }
}

/// Builds fully formed dependency metadata in one go - there is no way to add attributes to a
///  dependency after it was built.
#[derive(Clone, Debug)]
pub struct DependencyMetadataBuilder {
    selector: ModuleComponentSelector,
    artifacts: Vec<IvyArtifactName>,
    reason: Option<String>,
    kind: DependencyKind,
    endorsing_strict_versions: bool,
    optional: bool,
}
impl DependencyMetadataBuilder {
    pub fn new(kind: DependencyKind, group: impl Into<String>, name: impl Into<String>) -> DependencyMetadataBuilder {
        DependencyMetadataBuilder {
            selector: ModuleComponentSelector::new(group, name, VersionConstraint::default()),
            artifacts: vec![],
            reason: None,
            kind,
            endorsing_strict_versions: false,
            optional: false,
        }
    }

    pub fn dependency(group: impl Into<String>, name: impl Into<String>) -> DependencyMetadataBuilder {
        DependencyMetadataBuilder::new(DependencyKind::Dependency, group, name)
    }

    pub fn constraint(group: impl Into<String>, name: impl Into<String>) -> DependencyMetadataBuilder {
        DependencyMetadataBuilder::new(DependencyKind::Constraint, group, name)
    }

    /// `group:name` or `group:name:version`, as used by component metadata rules
    pub fn from_notation(kind: DependencyKind, notation: &str) -> anyhow::Result<DependencyMetadataBuilder> {
        let parts = notation.split(':').collect::<Vec<_>>();
        match parts.as_slice() {
            [group, name] if !group.is_empty() && !name.is_empty() => {
                Ok(DependencyMetadataBuilder::new(kind, *group, *name))
            }
            [group, name, version] if !group.is_empty() && !name.is_empty() => {
                let builder = DependencyMetadataBuilder::new(kind, *group, *name);
                Ok(if version.is_empty() { builder } else { builder.version(*version) })
            }
            _ => Err(anyhow::anyhow!("invalid dependency notation {:?}", notation)),
        }
    }

    pub fn version(mut self, version: impl Into<String>) -> DependencyMetadataBuilder {
        self.selector.version_constraint.requires = Some(version.into());
        self
    }

    pub fn version_constraint(mut self, version_constraint: VersionConstraint) -> DependencyMetadataBuilder {
        self.selector.version_constraint = version_constraint;
        self
    }

    pub fn artifact(mut self, artifact: IvyArtifactName) -> DependencyMetadataBuilder {
        self.artifacts.push(artifact);
        self
    }

    pub fn reason(mut self, reason: impl Into<String>) -> DependencyMetadataBuilder {
        self.reason = Some(reason.into());
        self
    }

    pub fn endorse_strict_versions(mut self, endorse: bool) -> DependencyMetadataBuilder {
        self.endorsing_strict_versions = endorse;
        self
    }

    pub fn optional(mut self, optional: bool) -> DependencyMetadataBuilder {
        self.optional = optional;
        self
    }

    pub fn build(self) -> DependencyMetadata {
        DependencyMetadata {
            selector: self.selector,
            artifacts: self.artifacts,
            reason: self.reason,
            kind: self.kind,
            endorsing_strict_versions: self.endorsing_strict_versions,
            optional: self.optional,
        }
    }
}

/// A configuration (Ivy, Maven scopes) or variant (Gradle module metadata)
#[derive(PartialEq, Eq, Clone, Debug)]
pub struct VariantMetadata {
    pub name: String,
    pub attributes: BTreeMap<String, String>,
    pub dependencies: Vec<DependencyMetadata>,
    pub artifacts: Vec<ModuleComponentArtifactMetadata>,
}
impl VariantMetadata {
    pub fn new(name: impl Into<String>) -> VariantMetadata {
        VariantMetadata {
            name: name.into(),
            attributes: BTreeMap::new(),
            dependencies: vec![],
            artifacts: vec![],
        }
    }
}

/// Where the metadata of a component came from. The artifacts of a component are resolved
///  relative to these.
#[derive(PartialEq, Eq, Clone, Debug)]
pub enum ModuleSource {
    Repository { name: String },
    Descriptor { location: String, sha1: String },
    MavenUniqueSnapshot { timestamp: String },
}

#[derive(PartialEq, Eq, Clone, Debug, Default)]
pub struct ModuleSources(Vec<ModuleSource>);
impl ModuleSources {
    pub fn new() -> ModuleSources {
        ModuleSources(vec![])
    }

    pub fn add(&mut self, source: ModuleSource) {
        self.0.push(source);
    }

    pub fn with(mut self, source: ModuleSource) -> ModuleSources {
        self.add(source);
        self
    }

    pub fn unique_snapshot_timestamp(&self) -> Option<&str> {
        self.0.iter()
            .find_map(|s| match s {
                ModuleSource::MavenUniqueSnapshot { timestamp } => Some(timestamp.as_str()),
                _ => None,
            })
    }

    pub fn iter(&self) -> impl Iterator<Item = &ModuleSource> {
        self.0.iter()
    }
}

/// Metadata prescribed by the caller, consulted before parsed metadata is accepted as final
#[derive(PartialEq, Eq, Clone, Debug, Default)]
pub struct ComponentOverrideMetadata {
    /// the artifact to look for when there is no descriptor
    pub artifact: Option<IvyArtifactName>,
    pub changing: bool,
}

/// Module metadata while it is being built by a metadata source or the resolver
#[derive(Clone, Debug)]
pub struct MutableModuleMetadata {
    pub id: ModuleComponentIdentifier,
    pub status: String,
    pub status_scheme: Vec<String>,
    pub changing: bool,
    /// true if there was no descriptor, i.e. the metadata was derived from the artifact only
    pub missing_descriptor: bool,
    pub attributes: BTreeMap<String, String>,
    pub variants: Vec<VariantMetadata>,
    /// artifacts of the component as a whole, independent of variants
    pub artifacts: Vec<ModuleComponentArtifactMetadata>,
    pub sources: ModuleSources,
    pub component_metadata_rule_caching_enabled: bool,
}
impl MutableModuleMetadata {
    pub fn new(id: ModuleComponentIdentifier) -> MutableModuleMetadata {
        MutableModuleMetadata {
            id,
            status: "integration".to_string(),
            status_scheme: DEFAULT_STATUS_SCHEME.iter().map(|s| s.to_string()).collect(),
            changing: false,
            missing_descriptor: false,
            attributes: BTreeMap::new(),
            variants: vec![],
            artifacts: vec![],
            sources: ModuleSources::new(),
            component_metadata_rule_caching_enabled: true,
        }
    }

    pub fn as_immutable(self) -> ModuleMetadata {
        ModuleMetadata { inner: self }
    }
}

/// Module metadata as handed out to the caller - immutable.
#[derive(Clone, Debug)]
pub struct ModuleMetadata {
    inner: MutableModuleMetadata,
}
impl ModuleMetadata {
    pub fn id(&self) -> &ModuleComponentIdentifier {
        &self.inner.id
    }

    pub fn status(&self) -> &str {
        &self.inner.status
    }

    pub fn status_scheme(&self) -> &[String] {
        &self.inner.status_scheme
    }

    pub fn is_changing(&self) -> bool {
        self.inner.changing
    }

    pub fn is_missing_descriptor(&self) -> bool {
        self.inner.missing_descriptor
    }

    pub fn attributes(&self) -> &BTreeMap<String, String> {
        &self.inner.attributes
    }

    pub fn variants(&self) -> &[VariantMetadata] {
        &self.inner.variants
    }

    pub fn variant(&self, name: &str) -> Option<&VariantMetadata> {
        self.inner.variants.iter().find(|v| v.name == name)
    }

    pub fn artifacts(&self) -> &[ModuleComponentArtifactMetadata] {
        &self.inner.artifacts
    }

    pub fn sources(&self) -> &ModuleSources {
        &self.inner.sources
    }

    pub fn is_component_metadata_rule_caching_enabled(&self) -> bool {
        self.inner.component_metadata_rule_caching_enabled
    }

    /// all declared dependencies across variants, in declaration order and without duplicates
    pub fn dependencies(&self) -> Vec<&DependencyMetadata> {
        let mut result: Vec<&DependencyMetadata> = vec![];
        for dependency in self.inner.variants.iter().flat_map(|v| v.dependencies.iter()) {
            if !result.contains(&dependency) {
                result.push(dependency);
            }
        }
        result
    }

    /// an artifact of this component with the given coordinates
    pub fn artifact(&self, artifact_type: &str, extension: &str, classifier: Option<&str>) -> ModuleComponentArtifactMetadata {
        ModuleComponentArtifactMetadata::new(
            self.inner.id.clone(),
            IvyArtifactName::new(self.inner.id.name(), artifact_type, Some(extension), classifier),
        )
    }

    /// artifacts declared by the descriptor with the given type, e.g. 'javadoc' publications in ivy.xml
    pub fn declared_artifacts_of_type(&self, artifact_type: ArtifactType) -> Vec<ModuleComponentArtifactMetadata> {
        let wanted = match artifact_type {
            ArtifactType::Javadoc => "javadoc",
            ArtifactType::Sources => "source",
            _ => return vec![],
        };
        self.inner.artifacts.iter()
            .filter(|a| a.name.artifact_type == wanted)
            .cloned()
            .collect()
    }

    pub fn with_sources(&self, sources: ModuleSources) -> ModuleMetadata {
        let mut inner = self.inner.clone();
        inner.sources = sources;
        ModuleMetadata { inner }
    }
}
