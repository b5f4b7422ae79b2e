//! End-to-end synthesis of one stack.

use strata_core::{ConstructPath, Stack};
use strata_graph::{DependencyGraph, LogicalIdRegistry};
use strata_policy::{ValidationPipeline, ValidationReport};
use tracing::{debug, info};

use crate::config::SynthConfig;
use crate::emitter::{EmissionIds, Emitter};
use crate::error::{SynthError, SynthResult};
use crate::template::{OutputExport, Template, TemplateOutput};

/// Everything one synthesis run produces.
#[derive(Debug, Clone)]
pub struct SynthesisOutput {
    pub template: Template,
    pub report: ValidationReport,
    /// Declaration paths in emission order.
    pub order: Vec<ConstructPath>,
    pub logical_ids: LogicalIdRegistry,
}

impl SynthesisOutput {
    pub fn resource_count(&self) -> usize {
        self.template.resources.len()
    }
}

/// Runs graph building, validation and emission for a stack.
#[derive(Debug, Clone, Default)]
pub struct Synthesizer {
    config: SynthConfig,
}

impl Synthesizer {
    pub fn new(config: SynthConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SynthConfig {
        &self.config
    }

    fn pipeline(&self) -> ValidationPipeline {
        ValidationPipeline::standard(self.config.validation_config())
    }

    /// Validate without emitting.
    pub fn validate(&self, stack: &Stack) -> ValidationReport {
        self.pipeline().validate_stack(stack)
    }

    /// Synthesize `stack` into a template.
    ///
    /// Every check runs before anything is emitted; any error-severity
    /// violation aborts with the full report.
    pub fn synthesize(&self, stack: &Stack) -> SynthResult<SynthesisOutput> {
        self.config.check()?;
        info!(
            stack = stack.name(),
            session = %stack.session_id(),
            declarations = stack.tree().declarations().count(),
            "Synthesizing stack"
        );

        let graph = DependencyGraph::build(stack);
        debug!(
            nodes = graph.nodes().len(),
            edges = graph.edge_count(),
            "Built dependency graph"
        );

        let report = self.pipeline().validate(stack, &graph);
        if !report.passed() {
            return Err(SynthError::ValidationFailed(Box::new(report)));
        }

        let logical_ids = LogicalIdRegistry::assign(stack)?;
        let resources = Emitter::new(stack, &graph, &logical_ids)
            .with_max_depth(self.config.max_token_depth)
            .with_path_metadata(self.config.path_metadata)
            .emit()?;

        let mut template = Template::new();
        template.description = stack
            .description()
            .map(str::to_string)
            .or_else(|| self.config.description.clone());
        template.parameters = stack.parameters().clone();
        template.mappings = stack.mappings().clone();

        let ids = EmissionIds::new(&logical_ids, &graph)?;
        let context = stack
            .resolve_context(&ids)
            .with_max_depth(self.config.max_token_depth);
        for (name, output) in stack.outputs() {
            let export = match &output.export_name {
                Some(export_name) => Some(OutputExport {
                    name: context.resolve(export_name)?,
                }),
                None => None,
            };
            template.outputs.insert(
                name.clone(),
                TemplateOutput {
                    value: context.resolve(&output.value)?,
                    description: output.description.clone(),
                    export,
                    condition: output.condition.clone(),
                },
            );
        }

        let mut order = Vec::with_capacity(resources.len());
        for resource in resources {
            order.push(resource.path);
            template.resources.insert(resource.logical_id, resource.fragment);
        }

        info!(
            stack = stack.name(),
            resources = template.resources.len(),
            outputs = template.outputs.len(),
            "Synthesis complete"
        );
        Ok(SynthesisOutput {
            template,
            report,
            order,
            logical_ids,
        })
    }
}
