use serde::{Deserialize, Serialize};

use crate::pattern::ResourcePattern;
use crate::resource::ExternalResourceName;

pub const GRADLE_ARTIFACT_PATTERN: &str = "[organisation]/[module]/[revision]/[artifact]-[revision](-[classifier])(.[ext])";
pub const GRADLE_IVY_PATTERN: &str = "[organisation]/[module]/[revision]/ivy-[revision].xml";
pub const IVY_ARTIFACT_PATTERN: &str = "[organisation]/[module]/[revision]/[type]s/[artifact](-[classifier])(.[ext])";
pub const IVY_IVY_PATTERN: &str = "[organisation]/[module]/[revision]/[type]s/[artifact](.[ext])";

/// The named layouts of an Ivy repository
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IvyLayout {
    #[default]
    Gradle,
    Ivy,
    /// the gradle layout with organisation dots turned into slashes
    Maven,
    /// nothing predefined, only the configured patterns
    Pattern,
}

/// The metadata ('ivy') and artifact patterns of an Ivy repository
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IvyPatterns {
    pub ivy_patterns: Vec<ResourcePattern>,
    pub artifact_patterns: Vec<ResourcePattern>,
}

impl IvyLayout {
    /// Patterns of this layout followed by the additional configured ones. A `pattern`
    ///  layout without ivy patterns looks for descriptors with its artifact patterns.
    pub fn patterns(&self, base: &ExternalResourceName, m2_compatible: bool, extra_ivy: &[String], extra_artifact: &[String]) -> IvyPatterns {
        let (ivy, artifact, m2_compatible): (Vec<&str>, Vec<&str>, bool) = match self {
            IvyLayout::Gradle => (vec![GRADLE_IVY_PATTERN], vec![GRADLE_ARTIFACT_PATTERN], m2_compatible),
            IvyLayout::Ivy => (vec![IVY_IVY_PATTERN], vec![IVY_ARTIFACT_PATTERN], m2_compatible),
            IvyLayout::Maven => (vec![GRADLE_IVY_PATTERN], vec![GRADLE_ARTIFACT_PATTERN], true),
            IvyLayout::Pattern => (vec![], vec![], m2_compatible),
        };

        let to_patterns = |predefined: Vec<&str>, extra: &[String]| predefined.into_iter()
            .map(String::from)
            .chain(extra.iter().cloned())
            .map(|p| ResourcePattern::ivy(base.clone(), p, m2_compatible))
            .collect::<Vec<_>>();

        let artifact_patterns = to_patterns(artifact, extra_artifact);
        let mut ivy_patterns = to_patterns(ivy, extra_ivy);
        if *self == IvyLayout::Pattern && ivy_patterns.is_empty() {
            ivy_patterns = artifact_patterns.clone();
        }
        IvyPatterns { ivy_patterns, artifact_patterns }
    }
}

#[cfg(test)]
mod test {
    use rstest::*;
    use super::*;
    use crate::model::artifact::{IvyArtifactName, ModuleComponentArtifactMetadata};
    use crate::model::coordinates::ModuleComponentIdentifier;

    fn jar() -> ModuleComponentArtifactMetadata {
        ModuleComponentArtifactMetadata::new(ModuleComponentIdentifier::new("org.example", "foo", "1.0"), IvyArtifactName::jar("foo"))
    }

    #[rstest]
    #[case::gradle(IvyLayout::Gradle, "https://repo/org.example/foo/1.0/foo-1.0.jar")]
    #[case::ivy(IvyLayout::Ivy, "https://repo/org.example/foo/1.0/jars/foo.jar")]
    #[case::maven(IvyLayout::Maven, "https://repo/org/example/foo/1.0/foo-1.0.jar")]
    fn test_named_layouts(#[case] layout: IvyLayout, #[case] expected: &str) {
        let patterns = layout.patterns(&ExternalResourceName::new("https://repo"), false, &[], &[]);
        assert_eq!(patterns.artifact_patterns.len(), 1);
        assert_eq!(patterns.artifact_patterns[0].get_location(&jar()).unwrap().uri(), expected);
        assert_eq!(patterns.ivy_patterns.len(), 1);
    }

    #[test]
    fn test_pattern_layout_uses_artifact_patterns_for_descriptors() {
        let patterns = IvyLayout::Pattern.patterns(
            &ExternalResourceName::new("https://repo"),
            false,
            &[],
            &["[module]/[revision]/[artifact].[ext]".to_string()],
        );
        assert_eq!(patterns.ivy_patterns, patterns.artifact_patterns);
    }

    #[test]
    fn test_extra_patterns_come_after_predefined() {
        let patterns = IvyLayout::Gradle.patterns(
            &ExternalResourceName::new("https://repo"),
            false,
            &["custom/[module]-ivy.xml".to_string()],
            &[],
        );
        assert_eq!(patterns.ivy_patterns.iter().map(|p| p.pattern()).collect::<Vec<_>>(), vec![GRADLE_IVY_PATTERN, "custom/[module]-ivy.xml"]);
    }
}
