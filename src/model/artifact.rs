use std::fmt::{Display, Formatter};

use crate::model::coordinates::ModuleComponentIdentifier;

/// name / type / extension / classifier of an artifact, independent of the module it belongs to
#[derive(PartialEq, Eq, Hash, Clone, Debug)]
pub struct IvyArtifactName {
    pub name: String,
    pub artifact_type: String,
    pub extension: Option<String>,
    pub classifier: Option<String>,
}
impl IvyArtifactName {
    pub fn new(name: impl Into<String>, artifact_type: impl Into<String>, extension: Option<&str>, classifier: Option<&str>) -> IvyArtifactName {
        IvyArtifactName {
            name: name.into(),
            artifact_type: artifact_type.into(),
            extension: extension.map(|s| s.to_string()),
            classifier: classifier
                .filter(|c| !c.is_empty())
                .map(|s| s.to_string()),
        }
    }

    pub fn jar(name: impl Into<String>) -> IvyArtifactName {
        IvyArtifactName::new(name, "jar", Some("jar"), None)
    }
}
impl Display for IvyArtifactName {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name)?;
        if let Some(classifier) = &self.classifier {
            write!(f, "-{}", classifier)?;
        }
        if let Some(extension) = &self.extension {
            write!(f, ".{}", extension)?;
        }
        Ok(())
    }
}

/// How the location of an artifact is determined.
///
/// This is an explicit tag rather than something inferred from the artifact's shape: only
///  `UrlBacked` artifacts bypass unique snapshot rewriting.
#[derive(PartialEq, Eq, Hash, Clone, Debug)]
pub enum ArtifactKind {
    /// located through the repository's artifact patterns
    Regular,
    /// a module descriptor (POM, ivy.xml, Gradle module file), located through the metadata patterns
    Descriptor,
    /// located by a URL relative to the module version directory, as declared in Gradle module metadata
    UrlBacked { relative_url: String },
}

#[derive(PartialEq, Eq, Hash, Clone, Debug)]
pub struct ModuleComponentArtifactMetadata {
    pub component: ModuleComponentIdentifier,
    pub name: IvyArtifactName,
    pub kind: ArtifactKind,
    /// optional artifacts are checked for existence before they are fetched, and their absence is
    ///  reported as 'not found' without any further attempt
    pub optional: bool,
    /// tried when this artifact does not exist
    pub alternative: Option<Box<ModuleComponentArtifactMetadata>>,
}
impl ModuleComponentArtifactMetadata {
    pub fn new(component: ModuleComponentIdentifier, name: IvyArtifactName) -> ModuleComponentArtifactMetadata {
        ModuleComponentArtifactMetadata {
            component,
            name,
            kind: ArtifactKind::Regular,
            optional: false,
            alternative: None,
        }
    }

    pub fn descriptor(component: ModuleComponentIdentifier, name: IvyArtifactName) -> ModuleComponentArtifactMetadata {
        ModuleComponentArtifactMetadata {
            kind: ArtifactKind::Descriptor,
            ..ModuleComponentArtifactMetadata::new(component, name)
        }
    }

    pub fn url_backed(component: ModuleComponentIdentifier, name: IvyArtifactName, relative_url: impl Into<String>) -> ModuleComponentArtifactMetadata {
        ModuleComponentArtifactMetadata {
            kind: ArtifactKind::UrlBacked { relative_url: relative_url.into() },
            ..ModuleComponentArtifactMetadata::new(component, name)
        }
    }

    pub fn with_optional(mut self, optional: bool) -> ModuleComponentArtifactMetadata {
        self.optional = optional;
        self
    }

    pub fn with_alternative(mut self, alternative: ModuleComponentArtifactMetadata) -> ModuleComponentArtifactMetadata {
        self.alternative = Some(Box::new(alternative));
        self
    }

    pub fn is_descriptor(&self) -> bool {
        self.kind == ArtifactKind::Descriptor
    }

    pub fn is_url_backed(&self) -> bool {
        matches!(self.kind, ArtifactKind::UrlBacked { .. })
    }

    /// same artifact name, owned by a different component identifier
    pub fn with_component(&self, component: ModuleComponentIdentifier) -> ModuleComponentArtifactMetadata {
        ModuleComponentArtifactMetadata {
            component,
            ..self.clone()
        }
    }

    /// the file name used for the local copy
    pub fn file_name(&self) -> String {
        if let ArtifactKind::UrlBacked { relative_url } = &self.kind {
            if let Some(last) = relative_url.rsplit('/').next() {
                if !last.is_empty() {
                    return last.to_string();
                }
            }
        }

        let mut result = format!("{}-{}", self.name.name, self.component.timestamped_version());
        if let Some(classifier) = &self.name.classifier {
            result.push('-');
            result.push_str(classifier);
        }
        if let Some(extension) = &self.name.extension {
            result.push('.');
            result.push_str(extension);
        }
        result
    }
}
impl Display for ModuleComponentArtifactMetadata {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.file_name(), self.component)
    }
}

/// The kinds of artifacts that can be requested for a component as a set
#[derive(PartialEq, Eq, Hash, Clone, Copy, Debug)]
pub enum ArtifactType {
    MavenPom,
    IvyDescriptor,
    Javadoc,
    Sources,
}
impl Display for ArtifactType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ArtifactType::MavenPom => "maven pom",
            ArtifactType::IvyDescriptor => "ivy descriptor",
            ArtifactType::Javadoc => "javadoc",
            ArtifactType::Sources => "sources",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod test {
    use rstest::*;
    use super::*;
    use crate::model::coordinates::ModuleCoordinate;

    #[rstest]
    #[case::plain(IvyArtifactName::jar("foo"), "foo-1.0.jar")]
    #[case::classifier(IvyArtifactName::new("foo", "javadoc", Some("jar"), Some("javadoc")), "foo-1.0-javadoc.jar")]
    #[case::no_extension(IvyArtifactName::new("foo", "bin", None, None), "foo-1.0")]
    #[case::empty_classifier(IvyArtifactName::new("foo", "jar", Some("jar"), Some("")), "foo-1.0.jar")]
    fn test_file_name(#[case] name: IvyArtifactName, #[case] expected: &str) {
        let artifact = ModuleComponentArtifactMetadata::new(ModuleComponentIdentifier::new("g", "foo", "1.0"), name);
        assert_eq!(artifact.file_name(), expected);
    }

    #[test]
    fn test_file_name_of_unique_snapshot() {
        let id = ModuleComponentIdentifier::unique_snapshot(ModuleCoordinate::new("g", "foo", "1.0-SNAPSHOT"), "20240601.093000-3");
        let artifact = ModuleComponentArtifactMetadata::new(id, IvyArtifactName::jar("foo"));
        assert_eq!(artifact.file_name(), "foo-1.0-20240601.093000-3.jar");
    }

    #[test]
    fn test_file_name_of_url_backed() {
        let artifact = ModuleComponentArtifactMetadata::url_backed(
            ModuleComponentIdentifier::new("g", "foo", "1.0"),
            IvyArtifactName::jar("foo"),
            "../other/foo-all-1.0.jar",
        );
        assert_eq!(artifact.file_name(), "foo-all-1.0.jar");
    }
}
