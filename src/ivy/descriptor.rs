//! `ivy.xml` module descriptors

use std::collections::{BTreeMap, BTreeSet};

use serde::Deserialize;

use crate::model::artifact::{IvyArtifactName, ModuleComponentArtifactMetadata};
use crate::model::coordinates::ModuleComponentIdentifier;
use crate::model::metadata::{DependencyMetadata, DependencyMetadataBuilder, MutableModuleMetadata, VariantMetadata};

const DEFAULT_CONFIGURATION: &str = "default";
const DEFAULT_CONF_MAPPING: &str = "*->*";

#[derive(Deserialize, Debug, Default)]
struct IvyModuleXml {
    #[serde(default)]
    info: InfoXml,
    configurations: Option<ConfigurationsXml>,
    publications: Option<PublicationsXml>,
    dependencies: Option<DependenciesXml>,
}

#[derive(Deserialize, Debug, Default)]
struct InfoXml {
    organisation: Option<String>,
    module: Option<String>,
    revision: Option<String>,
    status: Option<String>,
}

#[derive(Deserialize, Debug, Default)]
struct ConfigurationsXml {
    #[serde(default)]
    conf: Vec<ConfXml>,
}

#[derive(Deserialize, Debug, Default)]
struct ConfXml {
    name: String,
    visibility: Option<String>,
    extends: Option<String>,
}

#[derive(Deserialize, Debug, Default)]
struct PublicationsXml {
    #[serde(default)]
    artifact: Vec<ArtifactXml>,
}

#[derive(Deserialize, Debug, Default, Clone)]
struct ArtifactXml {
    name: Option<String>,
    #[serde(rename = "type")]
    artifact_type: Option<String>,
    ext: Option<String>,
    conf: Option<String>,
    /// `m:classifier` - the namespace prefix is not part of the name
    classifier: Option<String>,
}

#[derive(Deserialize, Debug, Default)]
struct DependenciesXml {
    defaultconf: Option<String>,
    #[serde(default)]
    dependency: Vec<DependencyXml>,
}

#[derive(Deserialize, Debug, Default)]
struct DependencyXml {
    org: Option<String>,
    name: String,
    rev: Option<String>,
    conf: Option<String>,
    #[serde(default)]
    artifact: Vec<ArtifactXml>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IvyConfiguration {
    pub name: String,
    pub visible: bool,
    pub extends: Vec<String>,
}

fn split_list(s: &str) -> Vec<String> {
    s.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// parses `a,b->x;c->y` into (master configurations, dependency configurations) pairs
pub fn parse_conf_mapping(mapping: &str) -> Vec<(Vec<String>, Vec<String>)> {
    mapping.split(';')
        .map(|part| part.trim())
        .filter(|part| !part.is_empty())
        .map(|part| match part.split_once("->") {
            Some((from, to)) => (split_list(from), split_list(to)),
            None => (split_list(part), split_list(part)),
        })
        .collect()
}

fn artifact_name(raw: &ArtifactXml, default_name: &str) -> IvyArtifactName {
    let artifact_type = raw.artifact_type.clone().unwrap_or_else(|| "jar".to_string());
    let extension = raw.ext.clone().unwrap_or_else(|| artifact_type.clone());
    IvyArtifactName::new(
        raw.name.clone().unwrap_or_else(|| default_name.to_string()),
        artifact_type,
        Some(extension.as_str()),
        raw.classifier.as_deref(),
    )
}

/// all configurations `name` extends, itself included
fn with_extended(name: &str, configurations: &[IvyConfiguration]) -> BTreeSet<String> {
    let mut result = BTreeSet::new();
    let mut pending = vec![name.to_string()];
    while let Some(next) = pending.pop() {
        if !result.insert(next.clone()) {
            continue;
        }
        if let Some(c) = configurations.iter().find(|c| c.name == next) {
            pending.extend(c.extends.iter().cloned());
        }
    }
    result
}

fn applies_to(confs: &[String], configuration: &str) -> bool {
    confs.iter().any(|c| c == "*" || c == configuration)
}

/// Parses an ivy.xml into module metadata with one variant per configuration. Dependencies and
///  artifacts of extended configurations are inherited.
pub fn parse_ivy_descriptor(content: &str, id: &ModuleComponentIdentifier) -> anyhow::Result<MutableModuleMetadata> {
    let raw: IvyModuleXml = serde_xml_rs::from_str(content)?;

    let mut configurations: Vec<IvyConfiguration> = raw.configurations
        .map(|c| c.conf)
        .unwrap_or_default()
        .into_iter()
        .map(|c| IvyConfiguration {
            name: c.name.trim().to_string(),
            visible: c.visibility.as_deref() != Some("private"),
            extends: c.extends.as_deref().map(split_list).unwrap_or_default(),
        })
        .collect();
    if configurations.is_empty() {
        configurations.push(IvyConfiguration {
            name: DEFAULT_CONFIGURATION.to_string(),
            visible: true,
            extends: vec![],
        });
    }

    let module_name = raw.info.module.clone().unwrap_or_else(|| id.name().to_string());

    // no publications section means a single jar in all configurations
    let publications = match raw.publications {
        Some(p) => p.artifact,
        None => vec![ArtifactXml::default()],
    };
    let published: Vec<(IvyArtifactName, Vec<String>)> = publications.iter()
        .map(|a| (
            artifact_name(a, &module_name),
            a.conf.as_deref().map(split_list).unwrap_or_else(|| vec!["*".to_string()]),
        ))
        .collect();

    let (default_conf, raw_dependencies) = match raw.dependencies {
        Some(d) => (d.defaultconf.unwrap_or_else(|| DEFAULT_CONF_MAPPING.to_string()), d.dependency),
        None => (DEFAULT_CONF_MAPPING.to_string(), vec![]),
    };
    let own_organisation = raw.info.organisation.clone().unwrap_or_else(|| id.group().to_string());

    let mut dependencies_by_conf: BTreeMap<String, Vec<DependencyMetadata>> = BTreeMap::new();
    for dependency in &raw_dependencies {
        let mut builder = DependencyMetadataBuilder::dependency(
            dependency.org.clone().unwrap_or_else(|| own_organisation.clone()),
            dependency.name.trim(),
        );
        if let Some(rev) = &dependency.rev {
            builder = builder.version(rev.trim());
        }
        for artifact in &dependency.artifact {
            builder = builder.artifact(artifact_name(artifact, &dependency.name));
        }
        let built = builder.build();

        let mapping = parse_conf_mapping(dependency.conf.as_deref().unwrap_or(&default_conf));
        for configuration in &configurations {
            if mapping.iter().any(|(from, _)| applies_to(from, &configuration.name)) {
                dependencies_by_conf.entry(configuration.name.clone()).or_default().push(built.clone());
            }
        }
    }

    let mut metadata = MutableModuleMetadata::new(id.clone());
    if let Some(status) = raw.info.status.filter(|s| !s.trim().is_empty()) {
        metadata.status = status.trim().to_string();
    }
    if let Some(revision) = raw.info.revision {
        metadata.attributes.insert("revision".to_string(), revision);
    }

    for configuration in &configurations {
        let mut variant = VariantMetadata::new(&configuration.name);
        variant.attributes.insert("visibility".to_string(), if configuration.visible { "public" } else { "private" }.to_string());
        for inherited in with_extended(&configuration.name, &configurations) {
            for dependency in dependencies_by_conf.get(&inherited).into_iter().flatten() {
                if !variant.dependencies.contains(dependency) {
                    variant.dependencies.push(dependency.clone());
                }
            }
            for (name, confs) in &published {
                let artifact = ModuleComponentArtifactMetadata::new(id.clone(), name.clone());
                if applies_to(confs, &inherited) && !variant.artifacts.contains(&artifact) {
                    variant.artifacts.push(artifact);
                }
            }
        }
        metadata.variants.push(variant);
    }

    metadata.artifacts = published.into_iter()
        .map(|(name, _)| ModuleComponentArtifactMetadata::new(id.clone(), name))
        .collect();
    Ok(metadata)
}

#[cfg(test)]
mod test {
    use rstest::*;
    use super::*;

    const IVY: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<ivy-module version="2.0" xmlns:m="http://ant.apache.org/ivy/maven">
  <info organisation="org.example" module="foo" revision="1.0" status="milestone"/>
  <configurations>
    <conf name="compile" visibility="public"/>
    <conf name="runtime" visibility="public" extends="compile"/>
    <conf name="sources" visibility="public"/>
  </configurations>
  <publications>
    <artifact name="foo" type="jar" ext="jar" conf="compile"/>
    <artifact name="foo" type="source" ext="jar" conf="sources" m:classifier="sources"/>
  </publications>
  <dependencies>
    <dependency org="org.lib" name="lib" rev="2.0" conf="compile->default"/>
    <dependency org="org.lib" name="rt" rev="1.1" conf="runtime->default">
      <artifact name="rt" type="jar" ext="jar" m:classifier="native"/>
    </dependency>
  </dependencies>
</ivy-module>"#;

    #[rstest]
    #[case::simple("compile->default", vec![(vec!["compile"], vec!["default"])])]
    #[case::no_arrow("compile", vec![(vec!["compile"], vec!["compile"])])]
    #[case::multiple("a,b->x;c->y,z", vec![(vec!["a", "b"], vec!["x"]), (vec!["c"], vec!["y", "z"])])]
    fn test_conf_mapping(#[case] mapping: &str, #[case] expected: Vec<(Vec<&str>, Vec<&str>)>) {
        let expected = expected.into_iter()
            .map(|(a, b)| (a.into_iter().map(String::from).collect::<Vec<_>>(), b.into_iter().map(String::from).collect::<Vec<_>>()))
            .collect::<Vec<_>>();
        assert_eq!(parse_conf_mapping(mapping), expected);
    }

    #[test]
    fn test_parse() {
        let metadata = parse_ivy_descriptor(IVY, &ModuleComponentIdentifier::new("org.example", "foo", "1.0")).unwrap();
        assert_eq!(metadata.status, "milestone");

        let variant = |name: &str| metadata.variants.iter().find(|v| v.name == name).unwrap();
        let dependency_names = |name: &str| variant(name).dependencies.iter()
            .map(|d| d.selector.module.name.clone())
            .collect::<Vec<_>>();

        assert_eq!(dependency_names("compile"), vec!["lib"]);
        assert_eq!(dependency_names("runtime"), vec!["lib", "rt"]);
        assert!(dependency_names("sources").is_empty());

        assert_eq!(variant("runtime").artifacts.len(), 1);
        assert_eq!(variant("sources").artifacts[0].name.classifier.as_deref(), Some("sources"));

        let rt = variant("runtime").dependencies.iter().find(|d| d.selector.module.name == "rt").unwrap();
        assert_eq!(rt.artifacts[0].classifier.as_deref(), Some("native"));

        let declared_sources = metadata.as_immutable().declared_artifacts_of_type(crate::model::artifact::ArtifactType::Sources);
        assert_eq!(declared_sources.len(), 1);
    }

    #[test]
    fn test_minimal_descriptor() {
        let metadata = parse_ivy_descriptor(
            r#"<ivy-module version="2.0"><info organisation="g" module="m" revision="1"/></ivy-module>"#,
            &ModuleComponentIdentifier::new("g", "m", "1"),
        ).unwrap();

        assert_eq!(metadata.status, "integration");
        assert_eq!(metadata.variants.len(), 1);
        assert_eq!(metadata.variants[0].name, "default");
        assert_eq!(metadata.variants[0].artifacts[0].name, IvyArtifactName::jar("m"));
    }
}
