use std::fmt::{Display, Formatter};

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    /// `<base>-<yyyyMMdd>.<HHmmss>-<buildNumber>`, the second group being the timestamp
    static ref UNIQUE_SNAPSHOT_REGEX: Regex = Regex::new(r"^(.+)-(\d{8}\.\d{6}-\d+)$").unwrap();
}

pub const SNAPSHOT_SUFFIX: &str = "-SNAPSHOT";

#[derive(PartialEq, Eq, Hash, Clone, Debug, PartialOrd, Ord)]
pub struct ModuleIdentifier {
    pub group: String,
    pub name: String,
}
impl ModuleIdentifier {
    pub fn new(group: impl Into<String>, name: impl Into<String>) -> ModuleIdentifier {
        ModuleIdentifier {
            group: group.into(),
            name: name.into(),
        }
    }
}
impl Display for ModuleIdentifier {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.group, self.name)
    }
}

/// (group, name, version) - the identity of a module version as requested
#[derive(PartialEq, Eq, Hash, Clone, Debug, PartialOrd, Ord)]
pub struct ModuleCoordinate {
    pub module: ModuleIdentifier,
    pub version: String,
}
impl ModuleCoordinate {
    pub fn new(group: impl Into<String>, name: impl Into<String>, version: impl Into<String>) -> ModuleCoordinate {
        ModuleCoordinate {
            module: ModuleIdentifier::new(group, name),
            version: version.into(),
        }
    }

    /// parses `group:name:version`
    pub fn parse(notation: &str) -> anyhow::Result<ModuleCoordinate> {
        let parts = notation.split(':').collect::<Vec<_>>();
        match parts.as_slice() {
            [group, name, version] if !group.is_empty() && !name.is_empty() && !version.is_empty() => {
                Ok(ModuleCoordinate::new(*group, *name, *version))
            }
            _ => Err(anyhow::anyhow!("not a valid module coordinate (expected group:name:version): {:?}", notation)),
        }
    }
}
impl Display for ModuleCoordinate {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.module, self.version)
    }
}

/// A module coordinate plus resolution provenance.
///
/// `MavenUniqueSnapshot` is only ever created by the Maven resolver, after a `-SNAPSHOT` version
///  was resolved to a timestamped build (or when the requested version is already timestamped).
///  Two unique snapshot identifiers for the same coordinate but different timestamps are distinct.
#[derive(PartialEq, Eq, Hash, Clone, Debug)]
pub enum ModuleComponentIdentifier {
    Module(ModuleCoordinate),
    MavenUniqueSnapshot {
        coordinate: ModuleCoordinate,
        /// `yyyyMMdd.HHmmss-buildNumber`
        timestamp: String,
    },
}
impl ModuleComponentIdentifier {
    pub fn new(group: impl Into<String>, name: impl Into<String>, version: impl Into<String>) -> ModuleComponentIdentifier {
        ModuleComponentIdentifier::Module(ModuleCoordinate::new(group, name, version))
    }

    pub fn unique_snapshot(coordinate: ModuleCoordinate, timestamp: impl Into<String>) -> ModuleComponentIdentifier {
        ModuleComponentIdentifier::MavenUniqueSnapshot {
            coordinate,
            timestamp: timestamp.into(),
        }
    }

    pub fn coordinate(&self) -> &ModuleCoordinate {
        match self {
            ModuleComponentIdentifier::Module(c) => c,
            ModuleComponentIdentifier::MavenUniqueSnapshot { coordinate, .. } => coordinate,
        }
    }

    pub fn module(&self) -> &ModuleIdentifier {
        &self.coordinate().module
    }

    pub fn group(&self) -> &str {
        &self.module().group
    }

    pub fn name(&self) -> &str {
        &self.module().name
    }

    /// the version as requested
    pub fn version(&self) -> &str {
        &self.coordinate().version
    }

    pub fn timestamp(&self) -> Option<&str> {
        match self {
            ModuleComponentIdentifier::Module(_) => None,
            ModuleComponentIdentifier::MavenUniqueSnapshot { timestamp, .. } => Some(timestamp),
        }
    }

    /// the non-unique `-SNAPSHOT` form, used for the version directory of Maven layouts
    pub fn snapshot_version(&self) -> String {
        match self {
            ModuleComponentIdentifier::Module(c) => c.version.clone(),
            ModuleComponentIdentifier::MavenUniqueSnapshot { coordinate, timestamp } => {
                coordinate.version.replace(timestamp.as_str(), "SNAPSHOT")
            }
        }
    }

    /// the timestamped form, e.g. `1.0-20240101.120000-7`, used for artifact file names
    pub fn timestamped_version(&self) -> String {
        match self {
            ModuleComponentIdentifier::Module(c) => c.version.clone(),
            ModuleComponentIdentifier::MavenUniqueSnapshot { timestamp, .. } => {
                self.snapshot_version().replace("SNAPSHOT", timestamp)
            }
        }
    }
}
impl Display for ModuleComponentIdentifier {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ModuleComponentIdentifier::Module(c) => write!(f, "{}", c),
            ModuleComponentIdentifier::MavenUniqueSnapshot { coordinate, timestamp } => write!(f, "{}:{}", coordinate, timestamp),
        }
    }
}
impl From<ModuleCoordinate> for ModuleComponentIdentifier {
    fn from(value: ModuleCoordinate) -> Self {
        ModuleComponentIdentifier::Module(value)
    }
}

pub fn is_non_unique_snapshot(version: &str) -> bool {
    version.ends_with(SNAPSHOT_SUFFIX)
}

/// Extracts the `yyyyMMdd.HHmmss-buildNumber` part of an already timestamped snapshot version
pub fn unique_snapshot_timestamp(version: &str) -> Option<&str> {
    UNIQUE_SNAPSHOT_REGEX.captures(version)
        .and_then(|c| c.get(2))
        .map(|m| m.as_str())
}

#[cfg(test)]
mod test {
    use rstest::*;
    use super::*;

    #[rstest]
    #[case::release("1.0", None)]
    #[case::non_unique("1.0-SNAPSHOT", None)]
    #[case::unique("1.0-20240101.120000-7", Some("20240101.120000-7"))]
    #[case::unique_with_qualifier("1.0-rc-1-20240101.120000-12", Some("20240101.120000-12"))]
    #[case::no_build_number("1.0-20240101.120000", None)]
    #[case::short_date("1.0-2024011.120000-7", None)]
    #[case::no_base("20240101.120000-7", None)]
    fn test_unique_snapshot_timestamp(#[case] version: &str, #[case] expected: Option<&str>) {
        assert_eq!(unique_snapshot_timestamp(version), expected);
    }

    #[test]
    fn test_snapshot_versions_from_non_unique_request() {
        let id = ModuleComponentIdentifier::unique_snapshot(ModuleCoordinate::new("org.example", "foo", "1.0-SNAPSHOT"), "20240601.093000-3");
        assert_eq!(id.snapshot_version(), "1.0-SNAPSHOT");
        assert_eq!(id.timestamped_version(), "1.0-20240601.093000-3");
        assert_eq!(id.version(), "1.0-SNAPSHOT");
    }

    #[test]
    fn test_snapshot_versions_from_unique_request() {
        let id = ModuleComponentIdentifier::unique_snapshot(ModuleCoordinate::new("org.example", "foo", "1.0-20240101.120000-7"), "20240101.120000-7");
        assert_eq!(id.snapshot_version(), "1.0-SNAPSHOT");
        assert_eq!(id.timestamped_version(), "1.0-20240101.120000-7");
    }

    #[test]
    fn test_unique_snapshots_with_different_timestamps_differ() {
        let c = ModuleCoordinate::new("g", "n", "1.0-SNAPSHOT");
        assert_ne!(
            ModuleComponentIdentifier::unique_snapshot(c.clone(), "20240101.120000-1"),
            ModuleComponentIdentifier::unique_snapshot(c.clone(), "20240101.120000-2"),
        );
        assert_ne!(ModuleComponentIdentifier::Module(c.clone()), ModuleComponentIdentifier::unique_snapshot(c, "20240101.120000-1"));
    }

    #[rstest]
    #[case::ok("org.example:foo:1.0", true)]
    #[case::missing_version("org.example:foo", false)]
    #[case::empty_name("org.example::1.0", false)]
    #[case::too_many("a:b:c:d", false)]
    fn test_parse_coordinate(#[case] notation: &str, #[case] valid: bool) {
        assert_eq!(ModuleCoordinate::parse(notation).is_ok(), valid);
    }
}
