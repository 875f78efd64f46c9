use std::path::PathBuf;

use anyhow::{anyhow, bail};
use clap::{Parser, Subcommand};
use tracing::debug;

use arti_resolver::config::ResolverSettings;
use arti_resolver::model::artifact::{IvyArtifactName, ModuleComponentArtifactMetadata};
use arti_resolver::model::coordinates::{ModuleComponentIdentifier, ModuleCoordinate};
use arti_resolver::model::metadata::{ComponentOverrideMetadata, ModuleComponentSelector, ModuleMetadata, VersionConstraint};
use arti_resolver::model::results::{ArtifactFileResult, ArtifactFileState, ComponentMetadataResult, ComponentMetadataState, ModuleVersionListingResult, ResourceAwareResolveResult};
use arti_resolver::publish::Publisher;
use arti_resolver::resolver::ExternalResourceResolver;

/// Resolves and publishes modules against the repositories of a JSON settings file
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// settings file with the cache directory and the repositories
    #[arg(short, long, value_name = "FILE", default_value = "arti-resolver.json")]
    settings: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// list the versions of a module (`group:name`)
    Versions {
        repository: String,
        module: String,
    },
    /// resolve a component's (`group:name:version`) metadata
    Resolve {
        repository: String,
        component: String,
        /// treat the component as changing, whatever the repository says
        #[arg(long)]
        changing: bool,
    },
    /// download a component's artifacts into the cache and print their local paths
    Fetch {
        repository: String,
        component: String,
        /// fetch only the jar with this classifier
        #[arg(long)]
        classifier: Option<String>,
    },
    /// upload a file as an artifact of a component
    Publish {
        repository: String,
        component: String,
        file: PathBuf,
        #[arg(long, default_value = "jar")]
        extension: String,
        #[arg(long)]
        classifier: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    let settings = ResolverSettings::load(&args.settings).await?;
    debug!("cache directory is {}", settings.cache_dir.display());

    match args.command {
        Command::Versions { repository, module } => {
            let resolver = settings.create_resolver(&repository)?;
            versions(&resolver, &module).await
        }
        Command::Resolve { repository, component, changing } => {
            let resolver = settings.create_resolver(&repository)?;
            let overrides = ComponentOverrideMetadata { changing, ..Default::default() };
            let metadata = resolve(&resolver, &component, &overrides).await?;
            print_metadata(&metadata);
            Ok(())
        }
        Command::Fetch { repository, component, classifier } => {
            let resolver = settings.create_resolver(&repository)?;
            fetch(&resolver, &component, classifier.as_deref()).await
        }
        Command::Publish { repository, component, file, extension, classifier } => {
            let resolver = settings.create_resolver(&repository)?;
            let coordinate = ModuleCoordinate::parse(&component)?;
            let id = ModuleComponentIdentifier::Module(coordinate);
            let name = IvyArtifactName::new(id.name(), extension.as_str(), Some(extension.as_str()), classifier.as_deref());
            let artifact = ModuleComponentArtifactMetadata::new(id, name);

            let location = Publisher::new(settings.insecure_checksums)
                .publish(&resolver, &artifact, &file).await?;
            println!("{}", location);
            Ok(())
        }
    }
}

async fn versions(resolver: &ExternalResourceResolver, module: &str) -> anyhow::Result<()> {
    let (group, name) = module.split_once(':')
        .ok_or_else(|| anyhow!("not a valid module (expected group:name): {:?}", module))?;
    let selector = ModuleComponentSelector::new(group, name, VersionConstraint::default());

    let mut result = ModuleVersionListingResult::default();
    resolver.remote_access().list_module_versions(&selector, &mut result).await;
    if let Some(failure) = result.failure() {
        print_attempted(&result.resources);
        bail!("listing versions of {} in {} failed: {}", module, resolver.name(), failure);
    }
    for version in result.versions().into_iter().flatten() {
        println!("{}", version);
    }
    Ok(())
}

async fn resolve(resolver: &ExternalResourceResolver, component: &str, overrides: &ComponentOverrideMetadata) -> anyhow::Result<ModuleMetadata> {
    let id = ModuleComponentIdentifier::Module(ModuleCoordinate::parse(component)?);

    let mut result = ComponentMetadataResult::default();
    resolver.remote_access().resolve_component_meta_data(&id, overrides, &mut result).await;
    match result.state() {
        Some(ComponentMetadataState::Resolved(metadata)) => Ok((**metadata).clone()),
        Some(ComponentMetadataState::Failed(e)) => {
            print_attempted(&result.resources);
            bail!("resolving {} in {} failed: {}", component, resolver.name(), e)
        }
        Some(ComponentMetadataState::Missing) | None => {
            print_attempted(&result.resources);
            bail!("{} not found in {}", component, resolver.name())
        }
    }
}

async fn fetch(resolver: &ExternalResourceResolver, component: &str, classifier: Option<&str>) -> anyhow::Result<()> {
    let metadata = resolve(resolver, component, &ComponentOverrideMetadata::default()).await?;
    let artifacts = match classifier {
        Some(classifier) => vec![metadata.artifact("jar", "jar", Some(classifier))],
        None if !metadata.artifacts().is_empty() => metadata.artifacts().to_vec(),
        None => {
            let mut artifacts: Vec<ModuleComponentArtifactMetadata> = vec![];
            for artifact in metadata.variants().iter().flat_map(|v| v.artifacts.iter()) {
                if !artifacts.contains(artifact) {
                    artifacts.push(artifact.clone());
                }
            }
            artifacts
        }
    };

    for artifact in artifacts {
        let mut result = ArtifactFileResult::default();
        resolver.remote_access().resolve_artifact(&artifact, metadata.sources(), &mut result).await;
        match result.state() {
            Some(ArtifactFileState::Resolved(file)) => println!("{}", file.display()),
            Some(ArtifactFileState::NotFound(_)) | None => println!("{}: not found", artifact),
            Some(ArtifactFileState::Failed(e)) => bail!("fetching {} failed: {}", artifact, e),
        }
    }
    Ok(())
}

fn print_metadata(metadata: &ModuleMetadata) {
    println!("{} ({}, status scheme {})", metadata.id(), metadata.status(), metadata.status_scheme().join(", "));
    if metadata.is_changing() {
        println!("  changing");
    }
    for variant in metadata.variants() {
        println!("  variant {}", variant.name);
    }
    for dependency in metadata.dependencies() {
        println!("  {}", dependency);
    }
    for artifact in metadata.artifacts() {
        println!("  artifact {}", artifact.name);
    }
}

fn print_attempted(resources: &ResourceAwareResolveResult) {
    if !resources.attempted_locations().is_empty() {
        eprintln!("searched in the following locations:");
        for location in resources.attempted_locations() {
            eprintln!("  {}", location);
        }
    }
}
