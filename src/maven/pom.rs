use std::collections::BTreeMap;

use async_recursion::async_recursion;
use async_trait::async_trait;
use lazy_static::lazy_static;
use regex::{Captures, Regex};
use serde::Deserialize;
use tracing::{debug, trace};

use crate::error::{ResolveError, ResolveResult};
use crate::model::artifact::{IvyArtifactName, ModuleComponentArtifactMetadata};
use crate::model::coordinates::{is_non_unique_snapshot, ModuleComponentIdentifier, ModuleCoordinate};
use crate::model::metadata::{DependencyMetadata, DependencyMetadataBuilder, MutableModuleMetadata, VariantMetadata};

lazy_static! {
    static ref PROPERTY_REGEX: Regex = Regex::new(r"\$\{([^}]+)\}").unwrap();
}

/// POMs published by Gradle carry this marker when there is Gradle module metadata next to them
pub const GRADLE_METADATA_MARKER: &str = "published-with-gradle-metadata";

const MAX_PARENT_DEPTH: usize = 16;
const MAX_SUBSTITUTION_ROUNDS: usize = 8;
const JAR_PACKAGINGS: [&str; 5] = ["jar", "ejb", "bundle", "maven-plugin", "eclipse-plugin"];

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(rename_all = "camelCase")]
struct PomXml {
    group_id: Option<String>,
    artifact_id: Option<String>,
    version: Option<String>,
    packaging: Option<String>,
    parent: Option<PomParentXml>,
    properties: Option<BTreeMap<String, String>>,
    dependencies: Option<PomDependenciesXml>,
    dependency_management: Option<PomDependencyManagementXml>,
}

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(rename_all = "camelCase")]
struct PomParentXml {
    group_id: Option<String>,
    artifact_id: Option<String>,
    version: Option<String>,
}

#[derive(Deserialize, Debug, Default, Clone)]
struct PomDependenciesXml {
    #[serde(default)]
    dependency: Vec<PomDependencyXml>,
}

#[derive(Deserialize, Debug, Default, Clone)]
struct PomDependencyManagementXml {
    dependencies: Option<PomDependenciesXml>,
}

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(rename_all = "camelCase")]
struct PomDependencyXml {
    group_id: Option<String>,
    artifact_id: Option<String>,
    version: Option<String>,
    #[serde(rename = "type")]
    dependency_type: Option<String>,
    classifier: Option<String>,
    scope: Option<String>,
    optional: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MavenScope {
    Compile,
    Runtime,
    Provided,
    Test,
    System,
    Import,
}
impl MavenScope {
    fn parse(s: Option<&str>) -> MavenScope {
        match s.map(|s| s.trim()) {
            Some("runtime") => MavenScope::Runtime,
            Some("provided") => MavenScope::Provided,
            Some("test") => MavenScope::Test,
            Some("system") => MavenScope::System,
            Some("import") => MavenScope::Import,
            _ => MavenScope::Compile,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PomDependency {
    pub group_id: String,
    pub artifact_id: String,
    pub version: Option<String>,
    pub dependency_type: String,
    pub classifier: Option<String>,
    pub scope: Option<MavenScope>,
    pub optional: bool,
}
impl PomDependency {
    fn key(&self) -> (String, String, String, Option<String>) {
        (self.group_id.clone(), self.artifact_id.clone(), self.dependency_type.clone(), self.classifier.clone())
    }

    /// the artifact requested by this dependency if it is not the target's main jar
    fn artifact(&self) -> Option<IvyArtifactName> {
        let (extension, classifier) = match self.dependency_type.as_str() {
            "jar" if self.classifier.is_none() => return None,
            "test-jar" => ("jar", self.classifier.as_deref().or(Some("tests"))),
            "ejb-client" => ("jar", self.classifier.as_deref().or(Some("client"))),
            "jar" | "ejb" | "bundle" | "maven-plugin" => ("jar", self.classifier.as_deref()),
            other => (other, self.classifier.as_deref()),
        };
        Some(IvyArtifactName::new(&self.artifact_id, &self.dependency_type, Some(extension), classifier))
    }
}

/// A POM with its parents merged in, properties substituted and dependency management applied
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Pom {
    pub group_id: String,
    pub artifact_id: String,
    pub version: String,
    pub packaging: String,
    pub properties: BTreeMap<String, String>,
    pub dependencies: Vec<PomDependency>,
    pub dependency_management: Vec<PomDependency>,
    pub published_with_gradle_metadata: bool,
}

/// Loads the POMs a POM refers to, i.e. parents and imported BOMs
#[async_trait]
pub trait PomLoader: Send + Sync {
    /// content and location of the POM, `None` if it does not exist
    async fn load_pom(&self, coordinate: &ModuleCoordinate) -> ResolveResult<Option<(String, String)>>;
}

fn parse_xml(content: &str, location: &str) -> ResolveResult<PomXml> {
    serde_xml_rs::from_str(content).map_err(|e| ResolveError::MetadataParse {
        kind: "POM",
        location: location.to_string(),
        source: e.into(),
    })
}

fn trimmed(s: &Option<String>) -> Option<String> {
    s.as_ref()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn substitute(value: &str, properties: &BTreeMap<String, String>) -> String {
    let mut result = value.to_string();
    for _ in 0..MAX_SUBSTITUTION_ROUNDS {
        if !result.contains("${") {
            break;
        }
        let next = PROPERTY_REGEX.replace_all(&result, |c: &Captures| {
            properties.get(&c[1])
                .cloned()
                .unwrap_or_else(|| c[0].to_string())
        }).to_string();
        if next == result {
            break;
        }
        result = next;
    }
    result
}

fn convert_dependencies(raw: Option<&PomDependenciesXml>, properties: &BTreeMap<String, String>) -> Vec<PomDependency> {
    raw.map(|d| d.dependency.as_slice())
        .unwrap_or(&[])
        .iter()
        .filter_map(|d| {
            let s = |v: &Option<String>| trimmed(v).map(|v| substitute(&v, properties));
            Some(PomDependency {
                group_id: s(&d.group_id)?,
                artifact_id: s(&d.artifact_id)?,
                version: s(&d.version),
                dependency_type: s(&d.dependency_type).unwrap_or_else(|| "jar".to_string()),
                classifier: s(&d.classifier),
                scope: trimmed(&d.scope).map(|scope| MavenScope::parse(Some(substitute(&scope, properties).as_str()))),
                optional: s(&d.optional).map(|o| o == "true").unwrap_or(false),
            })
        })
        .collect()
}

/// child entries replace parent entries with the same group, artifact, type and classifier
fn merge(parent: Vec<PomDependency>, child: Vec<PomDependency>) -> Vec<PomDependency> {
    let mut result = parent;
    for dependency in child {
        match result.iter().position(|d| d.key() == dependency.key()) {
            Some(idx) => result[idx] = dependency,
            None => result.push(dependency),
        }
    }
    result
}

/// Parses a POM, recursively loading and merging its parents and imported BOMs
#[async_recursion]
pub async fn read_pom(content: &str, location: &str, loader: &dyn PomLoader, depth: usize) -> ResolveResult<Pom> {
    if depth > MAX_PARENT_DEPTH {
        return Err(ResolveError::MetadataParse {
            kind: "POM",
            location: location.to_string(),
            source: anyhow::anyhow!("POM hierarchy is deeper than {} levels - cycle?", MAX_PARENT_DEPTH),
        });
    }

    let raw = parse_xml(content, location)?;

    let parent = match &raw.parent {
        Some(parent_ref) => {
            let coordinate = ModuleCoordinate::new(
                trimmed(&parent_ref.group_id).unwrap_or_default(),
                trimmed(&parent_ref.artifact_id).unwrap_or_default(),
                trimmed(&parent_ref.version).unwrap_or_default(),
            );
            trace!("loading parent {} of {}", coordinate, location);
            match loader.load_pom(&coordinate).await? {
                Some((parent_content, parent_location)) => Some(read_pom(&parent_content, &parent_location, loader, depth + 1).await?),
                None => {
                    return Err(ResolveError::MetadataParse {
                        kind: "POM",
                        location: location.to_string(),
                        source: anyhow::anyhow!("parent POM {} not found", coordinate),
                    });
                }
            }
        }
        None => None,
    };

    let group_id = trimmed(&raw.group_id)
        .or_else(|| parent.as_ref().map(|p| p.group_id.clone()))
        .or_else(|| raw.parent.as_ref().and_then(|p| trimmed(&p.group_id)))
        .unwrap_or_default();
    let artifact_id = trimmed(&raw.artifact_id).unwrap_or_default();
    let version = trimmed(&raw.version)
        .or_else(|| parent.as_ref().map(|p| p.version.clone()))
        .unwrap_or_default();

    let mut properties = parent.as_ref()
        .map(|p| p.properties.clone())
        .unwrap_or_default();
    properties.extend(raw.properties.clone().unwrap_or_default()
        .into_iter()
        .map(|(k, v)| (k, v.trim().to_string())));
    for prefix in ["project", "pom"] {
        properties.insert(format!("{}.groupId", prefix), group_id.clone());
        properties.insert(format!("{}.artifactId", prefix), artifact_id.clone());
        properties.insert(format!("{}.version", prefix), version.clone());
    }
    properties.insert("groupId".to_string(), group_id.clone());
    properties.insert("version".to_string(), version.clone());
    if let Some(p) = &parent {
        properties.insert("project.parent.groupId".to_string(), p.group_id.clone());
        properties.insert("project.parent.version".to_string(), p.version.clone());
        properties.insert("parent.version".to_string(), p.version.clone());
    }

    let group_id = substitute(&group_id, &properties);
    let version = substitute(&version, &properties);
    let packaging = trimmed(&raw.packaging)
        .map(|p| substitute(&p, &properties))
        .unwrap_or_else(|| "jar".to_string());

    let mut dependency_management = parent.as_ref()
        .map(|p| p.dependency_management.clone())
        .unwrap_or_default();
    let own_management = convert_dependencies(
        raw.dependency_management.as_ref().and_then(|m| m.dependencies.as_ref()),
        &properties,
    );
    for managed in own_management {
        if managed.scope == Some(MavenScope::Import) && managed.dependency_type == "pom" {
            let coordinate = ModuleCoordinate::new(&managed.group_id, &managed.artifact_id, managed.version.clone().unwrap_or_default());
            debug!("importing dependency management of {} into {}", coordinate, location);
            if let Some((bom_content, bom_location)) = loader.load_pom(&coordinate).await? {
                let bom = read_pom(&bom_content, &bom_location, loader, depth + 1).await?;
                dependency_management = merge(dependency_management, bom.dependency_management);
            }
        }
        else {
            dependency_management = merge(dependency_management, vec![managed]);
        }
    }

    let own_dependencies = convert_dependencies(raw.dependencies.as_ref(), &properties);
    let dependencies = merge(
        parent.as_ref().map(|p| p.dependencies.clone()).unwrap_or_default(),
        own_dependencies,
    )
        .into_iter()
        .map(|mut d| {
            if let Some(managed) = dependency_management.iter().find(|m| m.group_id == d.group_id && m.artifact_id == d.artifact_id) {
                if d.version.is_none() {
                    d.version = managed.version.clone();
                }
                if d.scope.is_none() {
                    d.scope = managed.scope;
                }
            }
            d
        })
        .collect();

    Ok(Pom {
        group_id,
        artifact_id,
        version,
        packaging,
        properties,
        dependencies,
        dependency_management,
        published_with_gradle_metadata: content.contains(GRADLE_METADATA_MARKER),
    })
}

impl Pom {
    pub fn is_known_jar_packaging(&self) -> bool {
        JAR_PACKAGINGS.contains(&self.packaging.as_str())
    }

    fn dependency_metadata(dependency: &PomDependency) -> DependencyMetadata {
        let mut builder = DependencyMetadataBuilder::dependency(&dependency.group_id, &dependency.artifact_id)
            .optional(dependency.optional);
        if let Some(version) = &dependency.version {
            builder = builder.version(version);
        }
        if let Some(artifact) = dependency.artifact() {
            builder = builder.artifact(artifact);
        }
        builder.build()
    }

    fn constraint_metadata(managed: &PomDependency) -> DependencyMetadata {
        let mut builder = DependencyMetadataBuilder::constraint(&managed.group_id, &managed.artifact_id);
        if let Some(version) = &managed.version {
            builder = builder.version(version);
        }
        builder.build()
    }

    /// Module metadata with a 'compile' and a 'runtime' variant. Managed dependencies become
    ///  constraints of both.
    pub fn to_module_metadata(&self, id: ModuleComponentIdentifier) -> MutableModuleMetadata {
        let main_artifact = self.main_artifact(&id);

        let mut compile = VariantMetadata::new("compile");
        let mut runtime = VariantMetadata::new("runtime");
        for dependency in &self.dependencies {
            match dependency.scope.unwrap_or(MavenScope::Compile) {
                MavenScope::Compile => {
                    compile.dependencies.push(Self::dependency_metadata(dependency));
                    runtime.dependencies.push(Self::dependency_metadata(dependency));
                }
                MavenScope::Runtime => runtime.dependencies.push(Self::dependency_metadata(dependency)),
                _ => {}
            }
        }
        for managed in &self.dependency_management {
            compile.dependencies.push(Self::constraint_metadata(managed));
            runtime.dependencies.push(Self::constraint_metadata(managed));
        }
        compile.artifacts.push(main_artifact.clone());
        runtime.artifacts.push(main_artifact.clone());

        let mut metadata = MutableModuleMetadata::new(id);
        metadata.status = if is_non_unique_snapshot(&self.version) { "integration" } else { "release" }.to_string();
        metadata.attributes.insert("packaging".to_string(), self.packaging.clone());
        metadata.variants = vec![compile, runtime];
        metadata.artifacts = vec![main_artifact];
        metadata
    }

    /// `pom` packaging may or may not come with a jar, other unknown packagings fall back to a jar
    fn main_artifact(&self, id: &ModuleComponentIdentifier) -> ModuleComponentArtifactMetadata {
        let jar = ModuleComponentArtifactMetadata::new(id.clone(), IvyArtifactName::jar(id.name()));
        if self.packaging == "pom" {
            jar.with_optional(true)
        }
        else if self.is_known_jar_packaging() {
            jar
        }
        else {
            ModuleComponentArtifactMetadata::new(id.clone(), IvyArtifactName::new(id.name(), &self.packaging, Some(self.packaging.as_str()), None))
                .with_alternative(jar)
        }
    }
}
