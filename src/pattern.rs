use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};

use crate::error::{ResolveError, ResolveResult};
use crate::model::artifact::{ArtifactKind, IvyArtifactName, ModuleComponentArtifactMetadata};
use crate::model::coordinates::{ModuleComponentIdentifier, ModuleIdentifier};
use crate::resource::ExternalResourceName;

pub const ORGANISATION: &str = "organisation";
pub const ORG_PATH: &str = "orgPath";
pub const MODULE: &str = "module";
pub const REVISION: &str = "revision";
pub const ARTIFACT: &str = "artifact";
pub const TYPE: &str = "type";
pub const EXT: &str = "ext";
pub const CLASSIFIER: &str = "classifier";

pub const M2_PER_MODULE_VERSION_PATTERN: &str = "[artifact]-[revision](-[classifier]).[ext]";
pub const M2_PER_MODULE_PATTERN: &str = "[revision]/[artifact]-[revision](-[classifier]).[ext]";
pub const M2_PATTERN: &str = "[organisation]/[module]/[revision]/[artifact]-[revision](-[classifier]).[ext]";

/// Values for the tokens of a pattern. A token without an entry is left in place literally, a
///  token with an empty value counts as unbound.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TokenValues(BTreeMap<&'static str, String>);
impl TokenValues {
    fn for_module(module: &ModuleIdentifier, dots_to_slashes: bool) -> TokenValues {
        let mut result = TokenValues::default();
        let organisation = if dots_to_slashes { module.group.replace('.', "/") } else { module.group.clone() };
        result.0.insert(ORGANISATION, organisation);
        result.0.insert(ORG_PATH, module.group.replace('.', "/"));
        result.0.insert(MODULE, module.name.clone());
        result
    }

    fn with_revision(mut self, revision: impl Into<String>) -> TokenValues {
        self.0.insert(REVISION, revision.into());
        self
    }

    fn with_artifact_name(mut self, name: &IvyArtifactName) -> TokenValues {
        self.0.insert(ARTIFACT, name.name.clone());
        self.0.insert(TYPE, name.artifact_type.clone());
        self.0.insert(EXT, name.extension.clone().unwrap_or_default());
        self.0.insert(CLASSIFIER, name.classifier.clone().unwrap_or_default());
        self
    }

    fn get(&self, token: &str) -> Option<&str> {
        self.0.get(token).map(|s| s.as_str())
    }
}

/// A piece of a pattern: literal text, a `[token]`, or an optional `( ... )` group
#[derive(Debug, PartialEq, Eq)]
enum PatternPart<'a> {
    Literal(&'a str),
    Token(&'a str),
    Optional(Vec<PatternPart<'a>>),
}

fn parse(pattern: &str) -> Vec<PatternPart<'_>> {
    let mut result = vec![];
    let mut optional: Option<Vec<PatternPart>> = None;
    let mut literal_start = 0;
    let mut i = 0;
    let bytes = pattern.as_bytes();

    fn push<'a>(result: &mut Vec<PatternPart<'a>>, optional: &mut Option<Vec<PatternPart<'a>>>, part: PatternPart<'a>) {
        match optional {
            Some(parts) => parts.push(part),
            None => result.push(part),
        }
    }

    while i < bytes.len() {
        match bytes[i] {
            b'[' => {
                if let Some(len) = pattern[i..].find(']') {
                    if literal_start < i {
                        push(&mut result, &mut optional, PatternPart::Literal(&pattern[literal_start..i]));
                    }
                    push(&mut result, &mut optional, PatternPart::Token(&pattern[i+1..i+len]));
                    i += len + 1;
                    literal_start = i;
                    continue;
                }
            }
            b'(' if optional.is_none() => {
                if literal_start < i {
                    result.push(PatternPart::Literal(&pattern[literal_start..i]));
                }
                optional = Some(vec![]);
                literal_start = i + 1;
            }
            b')' => {
                if let Some(mut parts) = optional.take() {
                    if literal_start < i {
                        parts.push(PatternPart::Literal(&pattern[literal_start..i]));
                    }
                    result.push(PatternPart::Optional(parts));
                    literal_start = i + 1;
                }
            }
            _ => {}
        }
        i += 1;
    }

    // an unterminated optional group is plain text
    if let Some(parts) = optional.take() {
        result.push(PatternPart::Literal("("));
        result.extend(parts);
    }
    if literal_start < pattern.len() {
        result.push(PatternPart::Literal(&pattern[literal_start..]));
    }
    result
}

fn substitute_part(part: &PatternPart, values: &TokenValues, out: &mut String) {
    match part {
        PatternPart::Literal(s) => out.push_str(s),
        PatternPart::Token(t) => match values.get(t) {
            Some(value) => out.push_str(value),
            None => {
                out.push('[');
                out.push_str(t);
                out.push(']');
            }
        },
        PatternPart::Optional(parts) => {
            let tokens = parts.iter()
                .filter_map(|p| match p {
                    PatternPart::Token(t) => Some(*t),
                    _ => None,
                })
                .collect::<Vec<_>>();

            if tokens.is_empty() {
                out.push('(');
                for p in parts {
                    substitute_part(p, values, out);
                }
                out.push(')');
            }
            else if tokens.iter().any(|t| values.get(t).map(|v| !v.is_empty()).unwrap_or(false)) {
                for p in parts {
                    substitute_part(p, values, out);
                }
            }
        }
    }
}

/// replaces all tokens of the pattern with their values, dropping optional groups without a bound token
pub fn substitute_tokens(pattern: &str, values: &TokenValues) -> String {
    let mut result = String::new();
    for part in parse(pattern) {
        substitute_part(&part, values, &mut result);
    }
    result
}

/// tokens outside of optional groups
fn mandatory_tokens(pattern: &str) -> Vec<&str> {
    parse(pattern).into_iter()
        .filter_map(|p| match p {
            PatternPart::Token(t) => Some(t),
            _ => None,
        })
        .collect()
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PatternLayout {
    Ivy {
        /// organisation dots are turned into slashes, like in Maven repositories
        m2_compatible: bool,
    },
    Maven,
}

/// A template for the location of resources in a repository, e.g.
///  `[organisation]/[module]/[revision]/[artifact]-[revision](-[classifier]).[ext]`, relative
///  to a base location.
///
/// Patterns are immutable, evaluating them has no side effects.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResourcePattern {
    base: ExternalResourceName,
    pattern: String,
    layout: PatternLayout,
}
impl ResourcePattern {
    pub fn ivy(base: ExternalResourceName, pattern: impl Into<String>, m2_compatible: bool) -> ResourcePattern {
        ResourcePattern {
            base,
            pattern: pattern.into(),
            layout: PatternLayout::Ivy { m2_compatible },
        }
    }

    pub fn maven(base: ExternalResourceName, pattern: impl Into<String>) -> ResourcePattern {
        ResourcePattern {
            base,
            pattern: pattern.into(),
            layout: PatternLayout::Maven,
        }
    }

    pub fn base(&self) -> &ExternalResourceName {
        &self.base
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn layout(&self) -> PatternLayout {
        self.layout
    }

    fn dots_to_slashes(&self) -> bool {
        match self.layout {
            PatternLayout::Maven => true,
            PatternLayout::Ivy { m2_compatible } => m2_compatible,
        }
    }

    fn module_values(&self, module: &ModuleIdentifier) -> TokenValues {
        TokenValues::for_module(module, self.dots_to_slashes())
    }

    fn component_values(&self, component: &ModuleComponentIdentifier) -> TokenValues {
        let revision = match self.layout {
            PatternLayout::Maven => component.snapshot_version(),
            PatternLayout::Ivy { .. } => component.version().to_string(),
        };
        self.module_values(component.module()).with_revision(revision)
    }

    fn resolve(&self, path: &str) -> ExternalResourceName {
        self.base.with_path(path)
    }

    /// The location of an artifact. URL backed artifacts are located relative to the module
    ///  version path, which is only defined for some layouts.
    pub fn get_location(&self, artifact: &ModuleComponentArtifactMetadata) -> ResolveResult<ExternalResourceName> {
        if let ArtifactKind::UrlBacked { relative_url } = &artifact.kind {
            return Ok(self.to_module_version_path(&artifact.component)?.resolve(relative_url));
        }

        let values = self.component_values(&artifact.component).with_artifact_name(&artifact.name);
        let pattern = match (self.layout, artifact.component.timestamp()) {
            // the version directory stays '-SNAPSHOT', the file name gets the timestamp
            (PatternLayout::Maven, Some(_)) => self.pattern.replacen("-[revision]", &format!("-{}", artifact.component.timestamped_version()), 1),
            _ => self.pattern.clone(),
        };
        Ok(self.resolve(&substitute_tokens(&pattern, &values)))
    }

    /// the pattern with everything but `[revision]` substituted, for listing versions
    pub fn to_version_list_pattern(&self, module: &ModuleIdentifier, artifact: &IvyArtifactName) -> ResolveResult<ExternalResourceName> {
        if !self.pattern.contains("[revision]") {
            return Err(ResolveError::UnsupportedLayout(format!("cannot list versions: pattern '{}' has no [revision] token", self.pattern)));
        }
        let values = self.module_values(module).with_artifact_name(artifact);
        Ok(self.resolve(&substitute_tokens(&self.pattern, &values)))
    }

    /// the directory containing all versions of a module
    pub fn to_module_path(&self, module: &ModuleIdentifier) -> ResolveResult<ExternalResourceName> {
        match self.layout {
            PatternLayout::Maven => {
                if !self.pattern.ends_with(M2_PATTERN) {
                    return Err(ResolveError::UnsupportedLayout(format!("cannot locate module for non-maven layout '{}'", self.pattern)));
                }
                let module_pattern = &self.pattern[..self.pattern.len() - M2_PER_MODULE_PATTERN.len()];
                Ok(self.resolve(&substitute_tokens(module_pattern, &self.module_values(module))))
            }
            PatternLayout::Ivy { .. } => Err(ResolveError::UnsupportedLayout(format!("cannot locate module for ivy pattern '{}'", self.pattern))),
        }
    }

    /// the directory containing a module version's files
    pub fn to_module_version_path(&self, component: &ModuleComponentIdentifier) -> ResolveResult<ExternalResourceName> {
        let module_version_pattern = match self.layout {
            PatternLayout::Maven => {
                if !self.pattern.ends_with(M2_PATTERN) {
                    return Err(ResolveError::UnsupportedLayout(format!("cannot locate module version for non-maven layout '{}'", self.pattern)));
                }
                &self.pattern[..self.pattern.len() - M2_PER_MODULE_VERSION_PATTERN.len()]
            }
            PatternLayout::Ivy { .. } => {
                let artifact_segment_start = self.pattern.split('/')
                    .scan(0usize, |offset, segment| {
                        let start = *offset;
                        *offset += segment.len() + 1;
                        Some((start, segment))
                    })
                    .filter(|(_, segment)| segment.contains("[artifact]"))
                    .map(|(start, _)| start)
                    .last();
                match artifact_segment_start {
                    Some(start) => &self.pattern[..start],
                    None => return Err(ResolveError::UnsupportedLayout(format!("non-standard layout: pattern '{}' has no [artifact] path segment", self.pattern))),
                }
            }
        };
        Ok(self.resolve(&substitute_tokens(module_version_pattern, &self.component_values(component))))
    }

    /// true if every mandatory token of the pattern that a module identifier provides is bound
    pub fn is_complete_for_module(&self, module: &ModuleIdentifier) -> bool {
        self.is_complete(&self.module_values(module))
    }

    pub fn is_complete_for_component(&self, component: &ModuleComponentIdentifier) -> bool {
        self.is_complete(&self.component_values(component))
    }

    pub fn is_complete_for_artifact(&self, artifact: &ModuleComponentArtifactMetadata) -> bool {
        self.is_complete(&self.component_values(&artifact.component).with_artifact_name(&artifact.name))
    }

    fn is_complete(&self, values: &TokenValues) -> bool {
        mandatory_tokens(&self.pattern).into_iter()
            .all(|t| values.get(t).map(|v| !v.is_empty()).unwrap_or(true))
    }
}
impl Display for ResourcePattern {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}", self.base.root(), self.pattern)
    }
}

#[cfg(test)]
mod test {
    use rstest::*;
    use super::*;
    use crate::model::coordinates::ModuleCoordinate;

    const IVY_PATTERN: &str = "[organisation]/[module]/[revision]/[type]s/[artifact](-[classifier])(.[ext])";

    fn base() -> ExternalResourceName {
        ExternalResourceName::new("https://repo.example.org/releases")
    }

    fn artifact(version: &str, name: IvyArtifactName) -> ModuleComponentArtifactMetadata {
        ModuleComponentArtifactMetadata::new(ModuleComponentIdentifier::new("org.example", "foo", version), name)
    }

    #[rstest]
    #[case::plain(IvyArtifactName::jar("foo"), "org/example/foo/1.0/foo-1.0.jar")]
    #[case::classifier(IvyArtifactName::new("foo", "source", Some("jar"), Some("sources")), "org/example/foo/1.0/foo-1.0-sources.jar")]
    #[case::pom(IvyArtifactName::new("foo", "pom", Some("pom"), None), "org/example/foo/1.0/foo-1.0.pom")]
    fn test_maven_location(#[case] name: IvyArtifactName, #[case] expected: &str) {
        let pattern = ResourcePattern::maven(base(), M2_PATTERN);
        let location = pattern.get_location(&artifact("1.0", name)).unwrap();
        assert_eq!(location.path(), expected);
    }

    #[test]
    fn test_location_is_deterministic() {
        let pattern = ResourcePattern::maven(base(), M2_PATTERN);
        let a = artifact("1.0", IvyArtifactName::jar("foo"));
        assert_eq!(pattern.get_location(&a).unwrap(), pattern.get_location(&a).unwrap());
    }

    #[test]
    fn test_maven_location_of_unique_snapshot() {
        let pattern = ResourcePattern::maven(base(), M2_PATTERN);
        let id = ModuleComponentIdentifier::unique_snapshot(ModuleCoordinate::new("org.example", "foo", "1.0-SNAPSHOT"), "20240601.093000-3");
        let a = ModuleComponentArtifactMetadata::new(id, IvyArtifactName::jar("foo"));
        assert_eq!(pattern.get_location(&a).unwrap().path(), "org/example/foo/1.0-SNAPSHOT/foo-1.0-20240601.093000-3.jar");
    }

    #[rstest]
    #[case::without_classifier(IvyArtifactName::jar("foo"), "org.example/foo/1.0/jars/foo.jar")]
    #[case::with_classifier(IvyArtifactName::new("foo", "jar", Some("jar"), Some("tests")), "org.example/foo/1.0/jars/foo-tests.jar")]
    #[case::without_extension(IvyArtifactName::new("foo", "bin", None, None), "org.example/foo/1.0/bins/foo")]
    fn test_ivy_location(#[case] name: IvyArtifactName, #[case] expected: &str) {
        let pattern = ResourcePattern::ivy(base(), IVY_PATTERN, false);
        assert_eq!(pattern.get_location(&artifact("1.0", name)).unwrap().path(), expected);
    }

    #[test]
    fn test_ivy_m2_compatible_and_org_path() {
        let pattern = ResourcePattern::ivy(base(), "[organisation]/[module]/[revision]/ivy-[revision].xml", true);
        let a = artifact("1.0", IvyArtifactName::new("ivy", "ivy", Some("xml"), None));
        assert_eq!(pattern.get_location(&a).unwrap().path(), "org/example/foo/1.0/ivy-1.0.xml");

        let pattern = ResourcePattern::ivy(base(), "[orgPath]/[organisation]/[module]-[revision].[ext]", false);
        assert_eq!(pattern.get_location(&artifact("1.0", IvyArtifactName::jar("foo"))).unwrap().path(), "org/example/org.example/foo-1.0.jar");
    }

    #[test]
    fn test_optional_group_without_tokens_is_kept() {
        let values = TokenValues::default().with_revision("1.0");
        assert_eq!(substitute_tokens("a(b)/[revision]", &values), "a(b)/1.0");
    }

    #[test]
    fn test_version_list_pattern() {
        let pattern = ResourcePattern::maven(base(), M2_PATTERN);
        let location = pattern.to_version_list_pattern(&ModuleIdentifier::new("org.example", "foo"), &IvyArtifactName::jar("foo")).unwrap();
        assert_eq!(location.path(), "org/example/foo/[revision]/foo-[revision].jar");

        let without_revision = ResourcePattern::ivy(base(), "[organisation]/[module]/[artifact].[ext]", false);
        assert!(matches!(
            without_revision.to_version_list_pattern(&ModuleIdentifier::new("org.example", "foo"), &IvyArtifactName::jar("foo")),
            Err(ResolveError::UnsupportedLayout(_))
        ));
    }

    #[test]
    fn test_maven_module_paths() {
        let pattern = ResourcePattern::maven(base(), M2_PATTERN);
        let module = ModuleIdentifier::new("org.example", "foo");
        assert_eq!(pattern.to_module_path(&module).unwrap().path(), "org/example/foo/");
        assert_eq!(pattern.to_module_path(&module).unwrap().resolve("maven-metadata.xml").path(), "org/example/foo/maven-metadata.xml");

        let id = ModuleComponentIdentifier::unique_snapshot(ModuleCoordinate::new("org.example", "foo", "1.0-SNAPSHOT"), "20240601.093000-3");
        assert_eq!(pattern.to_module_version_path(&id).unwrap().path(), "org/example/foo/1.0-SNAPSHOT/");
    }

    #[test]
    fn test_maven_module_path_requires_m2_layout() {
        let pattern = ResourcePattern::maven(base(), "[organisation]/[artifact]-[revision].[ext]");
        assert!(matches!(pattern.to_module_path(&ModuleIdentifier::new("g", "n")), Err(ResolveError::UnsupportedLayout(_))));
    }

    #[test]
    fn test_ivy_module_paths() {
        let pattern = ResourcePattern::ivy(base(), IVY_PATTERN, false);
        assert!(matches!(pattern.to_module_path(&ModuleIdentifier::new("g", "n")), Err(ResolveError::UnsupportedLayout(_))));
        assert_eq!(
            pattern.to_module_version_path(&ModuleComponentIdentifier::new("org.example", "foo", "1.0")).unwrap().path(),
            "org.example/foo/1.0/[type]s/"
        );

        let gradle = ResourcePattern::ivy(base(), "[organisation]/[module]/[revision]/[artifact]-[revision](-[classifier])(.[ext])", false);
        assert_eq!(
            gradle.to_module_version_path(&ModuleComponentIdentifier::new("org.example", "foo", "1.0")).unwrap().path(),
            "org.example/foo/1.0/"
        );

        let flat = ResourcePattern::ivy(base(), "[organisation]/[module]/[module]-[revision].[ext]", false);
        assert!(matches!(
            flat.to_module_version_path(&ModuleComponentIdentifier::new("g", "n", "1")),
            Err(ResolveError::UnsupportedLayout(_))
        ));
    }

    #[test]
    fn test_url_backed_location() {
        let pattern = ResourcePattern::maven(base(), M2_PATTERN);
        let a = ModuleComponentArtifactMetadata::url_backed(
            ModuleComponentIdentifier::new("org.example", "foo", "1.0"),
            IvyArtifactName::jar("foo"),
            "foo-1.0-all.jar",
        );
        assert_eq!(pattern.get_location(&a).unwrap().path(), "org/example/foo/1.0/foo-1.0-all.jar");
    }

    #[rstest]
    #[case::no_classifier(None)]
    #[case::classifier(Some("tests"))]
    fn test_completeness_independent_of_absent_token(#[case] classifier: Option<&str>) {
        let pattern = ResourcePattern::ivy(base(), "[organisation]/[module]/[revision]/[artifact].[ext]", false);
        let a = artifact("1.0", IvyArtifactName::new("foo", "jar", Some("jar"), classifier));
        assert!(pattern.is_complete_for_artifact(&a));
    }

    #[test]
    fn test_completeness() {
        let pattern = ResourcePattern::ivy(base(), "[organisation]/[module]/[revision]/[artifact]-[classifier].[ext]", false);
        assert!(pattern.is_complete_for_module(&ModuleIdentifier::new("g", "n")));
        assert!(!pattern.is_complete_for_module(&ModuleIdentifier::new("", "n")));
        assert!(pattern.is_complete_for_component(&ModuleComponentIdentifier::new("g", "n", "1")));
        assert!(!pattern.is_complete_for_component(&ModuleComponentIdentifier::new("g", "n", "")));

        let id = ModuleComponentIdentifier::new("g", "n", "1");
        assert!(!pattern.is_complete_for_artifact(&ModuleComponentArtifactMetadata::new(id.clone(), IvyArtifactName::jar("n"))));
        assert!(pattern.is_complete_for_artifact(&ModuleComponentArtifactMetadata::new(id, IvyArtifactName::new("n", "jar", Some("jar"), Some("x")))));
    }
}
