//! Process-level export configuration
//!
//! An [`ExportConfig`] is built once per process (usually deserialized from
//! the process's configuration file) and never mutated afterwards. Before a
//! job is exported or restored, [`ExportConfig::spec_for`] renders the
//! partial-export patterns against the job's data, producing the per-job
//! [`ExportSpec`] that the transfer and restoration code consume.

use crate::render::PatternRenderer;
use crate::{Error, Result};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// How an output is transferred into the export directory
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ExportStrategy {
    /// Compress into `<name>.gz` (files) or `<name>.tgz` (directories)
    Gzip,
    /// Duplicate the file or directory tree
    Copy,
    /// Symlink the export path to the output
    Link,
    /// Relocate the output and leave a link behind
    #[default]
    Move,
}

impl ExportStrategy {
    /// Canonical name of the strategy
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Gzip => "gzip",
            Self::Copy => "copy",
            Self::Link => "link",
            Self::Move => "move",
        }
    }
}

impl fmt::Display for ExportStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExportStrategy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gzip" | "gz" => Ok(Self::Gzip),
            "copy" | "cp" => Ok(Self::Copy),
            "move" | "mv" => Ok(Self::Move),
            "link" | "symlink" | "symbol" => Ok(Self::Link),
            other => Err(Error::configuration(format!(
                "unknown export strategy '{other}' (expected one of gzip, gz, copy, cp, move, mv, link, symlink, symbol)"
            ))),
        }
    }
}

impl Serialize for ExportStrategy {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ExportStrategy {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Process cache mode as far as export-caching is concerned
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CacheMode {
    /// Caching disabled
    Off,
    /// Regular signature-based caching; export artifacts are not consulted
    #[default]
    On,
    /// Jobs may be reconstructed from a previous export
    Export,
}

impl Serialize for CacheMode {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Self::Off => serializer.serialize_bool(false),
            Self::On => serializer.serialize_bool(true),
            Self::Export => serializer.serialize_str("export"),
        }
    }
}

impl<'de> Deserialize<'de> for CacheMode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Flag(bool),
            Name(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Flag(false) => Ok(Self::Off),
            Raw::Flag(true) => Ok(Self::On),
            Raw::Name(name) => match name.trim().to_ascii_lowercase().as_str() {
                "export" => Ok(Self::Export),
                "true" | "on" => Ok(Self::On),
                "false" | "off" | "" => Ok(Self::Off),
                other => Err(serde::de::Error::custom(format!(
                    "unknown cache mode '{other}' (expected true, false or \"export\")"
                ))),
            },
        }
    }
}

fn default_overwrite() -> bool {
    true
}

/// Export settings of a process
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExportConfig {
    /// Root of the export tree; `None` disables exporting entirely
    #[serde(
        default,
        alias = "exportDir",
        deserialize_with = "deserialize_export_dir"
    )]
    pub export_dir: Option<PathBuf>,

    /// Transfer strategy
    #[serde(default, alias = "exportHow")]
    pub export_how: ExportStrategy,

    /// Partial-export patterns, unrendered
    #[serde(
        default,
        alias = "exportPart",
        deserialize_with = "deserialize_export_part"
    )]
    pub export_part: Vec<String>,

    /// Whether existing export destinations may be replaced
    #[serde(
        default = "default_overwrite",
        alias = "exportOverwrite",
        alias = "export_ow"
    )]
    pub export_overwrite: bool,

    /// Cache mode of the process
    #[serde(default)]
    pub cache: CacheMode,

    /// Directory holding the path-pair lock files
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lock_dir: Option<PathBuf>,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            export_dir: None,
            export_how: ExportStrategy::Move,
            export_part: Vec::new(),
            export_overwrite: true,
            cache: CacheMode::On,
            lock_dir: None,
        }
    }
}

impl ExportConfig {
    /// Configuration exporting into `export_dir` with default settings
    #[must_use]
    pub fn new(export_dir: impl Into<PathBuf>) -> Self {
        Self {
            export_dir: Some(export_dir.into()),
            ..Self::default()
        }
    }

    /// Set the transfer strategy
    #[must_use]
    pub fn with_strategy(mut self, strategy: ExportStrategy) -> Self {
        self.export_how = strategy;
        self
    }

    /// Set the partial-export patterns
    #[must_use]
    pub fn with_parts<I, S>(mut self, parts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.export_part = parts.into_iter().map(Into::into).collect();
        self
    }

    /// Set the overwrite policy
    #[must_use]
    pub fn with_overwrite(mut self, overwrite: bool) -> Self {
        self.export_overwrite = overwrite;
        self
    }

    /// Set the cache mode
    #[must_use]
    pub fn with_cache(mut self, cache: CacheMode) -> Self {
        self.cache = cache;
        self
    }

    /// Set the lock directory
    #[must_use]
    pub fn with_lock_dir(mut self, lock_dir: impl Into<PathBuf>) -> Self {
        self.lock_dir = Some(lock_dir.into());
        self
    }

    /// Whether exporting is enabled at all
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.export_dir.is_some()
    }

    /// Lock directory, falling back to `<tmp>/jobport-locks`
    #[must_use]
    pub fn resolved_lock_dir(&self) -> PathBuf {
        self.lock_dir
            .clone()
            .unwrap_or_else(|| std::env::temp_dir().join("jobport-locks"))
    }

    /// Render the partial-export patterns for one job
    ///
    /// Rendering happens once, up front; nothing downstream re-renders.
    pub fn spec_for(
        &self,
        renderer: &dyn PatternRenderer,
        data: &serde_json::Value,
    ) -> ExportSpec {
        ExportSpec {
            target_dir: self.export_dir.clone(),
            strategy: self.export_how,
            partial_patterns: self
                .export_part
                .iter()
                .map(|pattern| renderer.render(pattern, data))
                .collect(),
            overwrite: self.export_overwrite,
        }
    }
}

/// Export settings for a single job, with patterns already rendered
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportSpec {
    /// Root of the export tree
    pub target_dir: Option<PathBuf>,
    /// Transfer strategy
    pub strategy: ExportStrategy,
    /// Rendered partial-export patterns
    pub partial_patterns: Vec<String>,
    /// Whether existing destinations may be replaced
    pub overwrite: bool,
}

impl ExportSpec {
    /// True when the patterns select everything
    ///
    /// That is the case for an empty pattern list and for a list holding
    /// exactly one pattern that rendered to an empty string.
    #[must_use]
    pub fn exports_everything(&self) -> bool {
        match self.partial_patterns.as_slice() {
            [] => true,
            [only] => only.is_empty(),
            _ => false,
        }
    }

    /// True when only a subset of the outputs gets exported
    #[must_use]
    pub fn is_partial(&self) -> bool {
        !self.exports_everything()
    }
}

fn deserialize_export_dir<'de, D>(deserializer: D) -> std::result::Result<Option<PathBuf>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw
        .filter(|dir| !dir.trim().is_empty())
        .map(PathBuf::from))
}

fn deserialize_export_part<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }

    Ok(match Option::<OneOrMany>::deserialize(deserializer)? {
        None => Vec::new(),
        Some(OneOrMany::One(part)) if part.is_empty() => Vec::new(),
        Some(OneOrMany::One(part)) => vec![part],
        Some(OneOrMany::Many(parts)) => parts,
    })
}
