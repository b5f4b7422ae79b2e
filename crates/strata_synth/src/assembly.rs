//! Cloud assembly output: templates plus a manifest.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use strata_core::{Environment, Stack};
use strata_policy::ValidationSummary;
use tracing::{debug, info};

use crate::config::OutputFormat;
use crate::error::SynthResult;
use crate::synthesizer::SynthesisOutput;

pub const MANIFEST_FILE_NAME: &str = "manifest.json";
pub const MANIFEST_VERSION: &str = "1";

/// One written template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StackArtifact {
    pub stack_name: String,
    pub template_file: String,
    /// Lowercase hex SHA-256 of the template bytes.
    pub sha256: String,
    #[serde(default)]
    pub environment: Environment,
    pub resource_count: usize,
    pub validation: ValidationSummary,
}

/// Index of everything in an assembly directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssemblyManifest {
    pub version: String,
    pub created_at: DateTime<Utc>,
    pub stacks: Vec<StackArtifact>,
}

impl AssemblyManifest {
    pub fn from_file(path: &Path) -> SynthResult<Self> {
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    pub fn stack(&self, name: &str) -> Option<&StackArtifact> {
        self.stacks.iter().find(|s| s.stack_name == name)
    }
}

/// Writes synthesized templates into an output directory.
#[derive(Debug, Clone)]
pub struct AssemblyWriter {
    out_dir: PathBuf,
    format: OutputFormat,
}

impl AssemblyWriter {
    pub fn new(out_dir: impl Into<PathBuf>) -> Self {
        Self {
            out_dir: out_dir.into(),
            format: OutputFormat::Json,
        }
    }

    pub fn with_format(mut self, format: OutputFormat) -> Self {
        self.format = format;
        self
    }

    pub fn out_dir(&self) -> &Path {
        &self.out_dir
    }

    /// Write the template for `stack` and describe it.
    pub fn write_stack(&self, stack: &Stack, output: &SynthesisOutput) -> SynthResult<StackArtifact> {
        fs::create_dir_all(&self.out_dir)?;

        let content = output.template.render(self.format)?;
        let template_file = format!("{}.template.{}", stack.name(), self.format.extension());
        let path = self.out_dir.join(&template_file);
        fs::write(&path, &content)?;
        debug!("Wrote template {:?}", path);

        Ok(StackArtifact {
            stack_name: stack.name().to_string(),
            template_file,
            sha256: digest(content.as_bytes()),
            environment: stack.environment().clone(),
            resource_count: output.resource_count(),
            validation: output.report.summary.clone(),
        })
    }

    /// Write `manifest.json` listing `artifacts`.
    pub fn write_manifest(&self, artifacts: Vec<StackArtifact>) -> SynthResult<PathBuf> {
        fs::create_dir_all(&self.out_dir)?;
        let manifest = AssemblyManifest {
            version: MANIFEST_VERSION.to_string(),
            created_at: Utc::now(),
            stacks: artifacts,
        };
        let path = self.out_dir.join(MANIFEST_FILE_NAME);
        let mut content = serde_json::to_string_pretty(&manifest)?;
        content.push('\n');
        fs::write(&path, content)?;
        info!(
            "Wrote assembly with {} stack(s) to {:?}",
            manifest.stacks.len(),
            self.out_dir
        );
        Ok(path)
    }

    /// Write one stack and its manifest.
    pub fn write(&self, stack: &Stack, output: &SynthesisOutput) -> SynthResult<PathBuf> {
        let artifact = self.write_stack(stack, output)?;
        self.write_manifest(vec![artifact])
    }
}

/// Lowercase hex SHA-256.
pub fn digest(bytes: &[u8]) -> String {
    Sha256::digest(bytes)
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_digest_is_hex_sha256() {
        assert_eq!(
            digest(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }
}
