//! # strata_synth
//!
//! Template synthesis for Strata stacks.
//!
//! - **Emitter**: dependency-ordered template fragments with stable logical IDs
//! - **Synthesizer**: graph, validation and emission as one pipeline
//! - **Assembly**: templates and a manifest written to an output directory
//!
//! ## Example
//!
//! ```rust,ignore
//! use strata_core::Stack;
//! use strata_synth::{AssemblyWriter, SynthConfig, Synthesizer};
//!
//! let stack = Stack::new("app");
//! let output = Synthesizer::new(SynthConfig::default()).synthesize(&stack)?;
//! AssemblyWriter::new("cdk.out").write(&stack, &output)?;
//! ```

pub mod assembly;
pub mod config;
pub mod emitter;
pub mod error;
pub mod synthesizer;
pub mod template;

pub use assembly::{digest, AssemblyManifest, AssemblyWriter, StackArtifact, MANIFEST_FILE_NAME};
pub use config::{OutputFormat, SynthConfig, CONFIG_FILE_NAME};
pub use emitter::{EmissionIds, EmittedResource, Emitter, PATH_METADATA_KEY};
pub use error::{SynthError, SynthResult};
pub use synthesizer::{SynthesisOutput, Synthesizer};
pub use template::{OutputExport, Template, TemplateOutput, TEMPLATE_FORMAT_VERSION};
