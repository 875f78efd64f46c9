use std::path::PathBuf;

/// Failures of a resolution attempt.
///
/// Absence of a module or artifact is not an error - it is reported as a result state so that
///  the next metadata source or repository can be tried.
#[derive(thiserror::Error, Debug)]
pub enum ResolveError {
    #[error("could not access resource '{location}'")]
    Transport {
        location: String,
        #[source]
        source: anyhow::Error,
    },
    #[error("{0}")]
    UnsupportedLayout(String),
    #[error("could not parse {kind} '{location}'")]
    MetadataParse {
        kind: &'static str,
        location: String,
        #[source]
        source: anyhow::Error,
    },
    #[error("could not read local file {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot locate {context} for '{component}' in repository '{repository}'")]
    ArtifactsNotLocated {
        context: String,
        component: String,
        repository: String,
    },
    #[error("version lister rule failed for module {module}")]
    VersionListerRule {
        module: String,
        #[source]
        source: anyhow::Error,
    },
    #[error("could not download artifact {artifact}")]
    Artifact {
        artifact: String,
        #[source]
        source: Box<ResolveError>,
    },
    #[error("cannot publish {artifact} to repository '{repository}': no artifact pattern defined")]
    NoPublishPattern {
        artifact: String,
        repository: String,
    },
    #[error("could not publish {artifact} to '{location}'")]
    Publish {
        artifact: String,
        location: String,
        #[source]
        source: anyhow::Error,
    },
}

impl ResolveError {
    pub fn transport(location: impl ToString, source: anyhow::Error) -> ResolveError {
        ResolveError::Transport {
            location: location.to_string(),
            source,
        }
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> ResolveError {
        ResolveError::Io {
            path: path.into(),
            source,
        }
    }
}

pub type ResolveResult<T> = Result<T, ResolveError>;
