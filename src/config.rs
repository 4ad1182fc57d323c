use std::path::{Path, PathBuf};

use serde::Deserialize;
use zip::CompressionMethod;

use crate::assemble::{ExcludeFilter, RepackTask};
use crate::error::RepackError;
use crate::pattern::PatternSet;
use crate::relocate::Relocator;
use crate::transform::{FilterTransformer, ResourceTransformer, ServiceMergeTransformer};

pub const CONFIG_FILE: &str = "jrepack.toml";
pub const DEFAULT_DESTINATION: &str = "build/repack/repackaged.jar";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryCompression {
    #[default]
    Deflated,
    Stored,
}

impl EntryCompression {
    pub fn method(self) -> CompressionMethod {
        match self {
            EntryCompression::Deflated => CompressionMethod::Deflated,
            EntryCompression::Stored => CompressionMethod::Stored,
        }
    }
}

/// One `[[relocate]]` table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RelocationConfig {
    pub pattern: String,
    pub destination: Option<String>,
    #[serde(default)]
    pub includes: Vec<String>,
    #[serde(default)]
    pub excludes: Vec<String>,
}

impl RelocationConfig {
    /// Parses the command-line form `from[=to]`.
    pub fn from_arg(arg: &str) -> Self {
        let (pattern, destination) = match arg.split_once('=') {
            Some((from, to)) => (from, Some(to.to_string())),
            None => (arg, None),
        };
        Self {
            pattern: pattern.to_string(),
            destination,
            ..Self::default()
        }
    }

    pub fn to_relocator(&self) -> Result<Relocator, RepackError> {
        Relocator::with_filters(
            &self.pattern,
            self.destination.as_deref(),
            &self.includes,
            &self.excludes,
        )
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServicesConfig {
    pub strip_comments: Option<bool>,
    #[serde(default)]
    pub include: Vec<String>,
    #[serde(default)]
    pub exclude: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ResourcesConfig {
    #[serde(default)]
    pub include: Vec<String>,
    #[serde(default)]
    pub exclude: Vec<String>,
}

/// Contents of `jrepack.toml`. Every key is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProjectConfig {
    pub destination: Option<PathBuf>,
    pub verbose: Option<bool>,
    pub compression: Option<EntryCompression>,
    #[serde(default)]
    pub inputs: Vec<PathBuf>,
    #[serde(default)]
    pub exclude: Vec<String>,
    #[serde(default)]
    pub relocate: Vec<RelocationConfig>,
    #[serde(default)]
    pub services: ServicesConfig,
    #[serde(default)]
    pub resources: ResourcesConfig,
}

/// Loads `jrepack.toml` from `dir`, if there is one.
pub fn load_project_config(dir: &Path) -> Result<Option<ProjectConfig>, RepackError> {
    let config_path = dir.join(CONFIG_FILE);
    if !config_path.exists() {
        return Ok(None);
    }
    load_config_file(&config_path).map(Some)
}

pub fn load_config_file(path: &Path) -> Result<ProjectConfig, RepackError> {
    tracing::info!("loading config from {}", path.display());
    let content = std::fs::read_to_string(path).map_err(|source| RepackError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&content).map_err(|e| RepackError::InvalidConfig {
        file: path.to_path_buf(),
        reason: e.to_string(),
    })
}

/// Fully resolved settings for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepackConfig {
    pub inputs: Vec<PathBuf>,
    pub destination: PathBuf,
    pub relocations: Vec<RelocationConfig>,
    pub exclude: Vec<String>,
    pub strip_service_comments: bool,
    pub service_includes: Vec<String>,
    pub service_excludes: Vec<String>,
    pub resource_includes: Vec<String>,
    pub resource_excludes: Vec<String>,
    pub compression: EntryCompression,
    pub verbose: bool,
}

impl Default for RepackConfig {
    fn default() -> Self {
        Self {
            inputs: Vec::new(),
            destination: PathBuf::from(DEFAULT_DESTINATION),
            relocations: Vec::new(),
            exclude: Vec::new(),
            strip_service_comments: false,
            service_includes: Vec::new(),
            service_excludes: Vec::new(),
            resource_includes: Vec::new(),
            resource_excludes: Vec::new(),
            compression: EntryCompression::default(),
            verbose: false,
        }
    }
}

impl From<ProjectConfig> for RepackConfig {
    fn from(file: ProjectConfig) -> Self {
        let defaults = Self::default();
        Self {
            inputs: file.inputs,
            destination: file.destination.unwrap_or(defaults.destination),
            relocations: file.relocate,
            exclude: file.exclude,
            strip_service_comments: file.services.strip_comments.unwrap_or(false),
            service_includes: file.services.include,
            service_excludes: file.services.exclude,
            resource_includes: file.resources.include,
            resource_excludes: file.resources.exclude,
            compression: file.compression.unwrap_or_default(),
            verbose: file.verbose.unwrap_or(false),
        }
    }
}

impl RepackConfig {
    /// Builds the relocation chain, the transformers (resource filter first,
    /// then service merging) and the class exclusions.
    pub fn to_task(&self) -> Result<RepackTask, RepackError> {
        let relocators = self
            .relocations
            .iter()
            .map(RelocationConfig::to_relocator)
            .collect::<Result<Vec<_>, _>>()?;

        let mut resources = PatternSet::new();
        for pattern in &self.resource_includes {
            resources.include(pattern)?;
        }
        for pattern in &self.resource_excludes {
            resources.exclude(pattern)?;
        }

        let mut services = ServiceMergeTransformer::new().strip_comments(self.strip_service_comments);
        for pattern in &self.service_includes {
            services.include(pattern)?;
        }
        for pattern in &self.service_excludes {
            services.exclude(pattern)?;
        }

        let transformers: Vec<Box<dyn ResourceTransformer>> = vec![
            Box::new(FilterTransformer::new(resources)),
            Box::new(services),
        ];

        Ok(RepackTask {
            inputs: self.inputs.clone(),
            destination: self.destination.clone(),
            relocators,
            transformers,
            exclude: ExcludeFilter::from_patterns(&self.exclude),
            compression: self.compression,
            verbose: self.verbose,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn parse_full_config() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join(CONFIG_FILE),
            r#"
destination = "out/app.jar"
verbose = true
compression = "stored"
inputs = ["build/classes", "libs/antlr.jar"]
exclude = ["com.acme.internal.**"]

[[relocate]]
pattern = "org.antlr.v4"
destination = "com.acme.antlr4"
excludes = ["org.antlr.v4.runtime.*"]

[[relocate]]
pattern = "org.objectweb.asm"

[services]
strip_comments = true
exclude = ["META-INF/services/javax.*"]

[resources]
exclude = ["META-INF/maven/"]
"#,
        )
        .unwrap();

        let config = load_project_config(dir.path()).unwrap().unwrap();
        assert_eq!(config.destination, Some(PathBuf::from("out/app.jar")));
        assert_eq!(config.verbose, Some(true));
        assert_eq!(config.compression, Some(EntryCompression::Stored));
        assert_eq!(config.inputs.len(), 2);
        assert_eq!(config.relocate.len(), 2);
        assert_eq!(config.relocate[0].destination.as_deref(), Some("com.acme.antlr4"));
        assert_eq!(config.relocate[1].destination, None);
        assert_eq!(config.services.strip_comments, Some(true));
        assert_eq!(config.resources.exclude, ["META-INF/maven/"]);
    }

    #[test]
    fn parse_empty_config() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join(CONFIG_FILE), "").unwrap();

        let config = load_project_config(dir.path()).unwrap().unwrap();
        assert_eq!(config, ProjectConfig::default());

        let resolved = RepackConfig::from(config);
        assert_eq!(resolved.destination, PathBuf::from(DEFAULT_DESTINATION));
        assert_eq!(resolved.compression, EntryCompression::Deflated);
    }

    #[test]
    fn missing_file_returns_none() {
        let dir = tempdir().unwrap();
        assert!(load_project_config(dir.path()).unwrap().is_none());
    }

    #[test]
    fn unknown_field_returns_error() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join(CONFIG_FILE), "unknown_field = true\n").unwrap();

        let err = load_project_config(dir.path()).unwrap_err();
        assert!(matches!(err, RepackError::InvalidConfig { .. }));
    }

    #[test]
    fn unknown_compression_returns_error() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join(CONFIG_FILE), "compression = \"bzip2\"\n").unwrap();
        assert!(load_project_config(dir.path()).is_err());
    }

    #[test]
    fn relocation_argument_forms() {
        let explicit = RelocationConfig::from_arg("org.antlr.v4=com.acme.antlr4");
        assert_eq!(explicit.pattern, "org.antlr.v4");
        assert_eq!(explicit.destination.as_deref(), Some("com.acme.antlr4"));

        let hidden = RelocationConfig::from_arg("org.antlr.v4").to_relocator().unwrap();
        assert_eq!(hidden.relocated_pattern(), "hidden.org.antlr.v4");
    }

    #[test]
    fn task_carries_filter_and_service_transformers() {
        let config = RepackConfig {
            relocations: vec![RelocationConfig::from_arg("org.antlr.v4=com.acme.antlr4")],
            exclude: vec!["com.acme.internal.**".into(), "not valid!".into()],
            resource_excludes: vec!["META-INF/maven/".into()],
            ..RepackConfig::default()
        };

        let task = config.to_task().unwrap();
        assert_eq!(task.relocators.len(), 1);
        let names: Vec<_> = task.transformers.iter().map(|t| t.name()).collect();
        assert_eq!(names, ["FilterTransformer", "ServiceMergeTransformer"]);
        assert!(task.transformers[0].can_transform_resource("META-INF/maven/a/pom.xml"));
        assert_eq!(task.exclude.patterns().count(), 1);
    }

    #[test]
    fn compression_methods() {
        assert_eq!(EntryCompression::Deflated.method(), CompressionMethod::Deflated);
        assert_eq!(EntryCompression::Stored.method(), CompressionMethod::Stored);
    }
}
