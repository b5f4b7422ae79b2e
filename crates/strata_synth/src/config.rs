//! Synthesis configuration.

use std::fs;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use strata_core::DEFAULT_MAX_TOKEN_DEPTH;
use strata_policy::{Severity, ValidationConfig};

use crate::error::{SynthError, SynthResult};

/// File name looked up next to app definitions.
pub const CONFIG_FILE_NAME: &str = "strata.yaml";

/// Template serialization format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Json,
    Yaml,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Json => "json",
            OutputFormat::Yaml => "yaml",
        }
    }
}

impl FromStr for OutputFormat {
    type Err = SynthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "json" => Ok(OutputFormat::Json),
            "yaml" | "yml" => Ok(OutputFormat::Yaml),
            other => Err(SynthError::InvalidConfig(format!(
                "unknown output format '{}'",
                other
            ))),
        }
    }
}

/// Synthesis settings, loaded from `strata.yaml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SynthConfig {
    /// Bound on nested token resolution.
    pub max_token_depth: usize,
    /// Severity of references to declarations outside the stack.
    pub dangling_references: Severity,
    /// Emit `strata:path` metadata on every resource.
    pub path_metadata: bool,
    pub output_format: OutputFormat,
    /// Template description, used when the stack has none.
    pub description: Option<String>,
    /// Validation checks to skip.
    pub disabled_checks: Vec<String>,
}

impl Default for SynthConfig {
    fn default() -> Self {
        Self {
            max_token_depth: DEFAULT_MAX_TOKEN_DEPTH,
            dangling_references: Severity::Warning,
            path_metadata: true,
            output_format: OutputFormat::Json,
            description: None,
            disabled_checks: Vec::new(),
        }
    }
}

impl SynthConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from a YAML file.
    pub fn from_file(path: &Path) -> SynthResult<Self> {
        let content = fs::read_to_string(path)?;
        let config: SynthConfig = serde_yaml::from_str(&content)?;
        config.check()?;
        Ok(config)
    }

    /// Save configuration to a YAML file.
    pub fn to_file(&self, path: &Path) -> SynthResult<()> {
        let content = serde_yaml::to_string(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Reject values synthesis cannot work with.
    pub fn check(&self) -> SynthResult<()> {
        if self.max_token_depth == 0 {
            return Err(SynthError::InvalidConfig(
                "max_token_depth must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn with_max_token_depth(mut self, depth: usize) -> Self {
        self.max_token_depth = depth;
        self
    }

    pub fn with_dangling_references(mut self, severity: Severity) -> Self {
        self.dangling_references = severity;
        self
    }

    pub fn with_path_metadata(mut self, enabled: bool) -> Self {
        self.path_metadata = enabled;
        self
    }

    pub fn with_output_format(mut self, format: OutputFormat) -> Self {
        self.output_format = format;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Validation settings derived from this configuration.
    pub fn validation_config(&self) -> ValidationConfig {
        let mut config = ValidationConfig::new().with_dangling_references(self.dangling_references);
        for check in &self.disabled_checks {
            config = config.disable_check(check.clone());
        }
        config
    }
}
