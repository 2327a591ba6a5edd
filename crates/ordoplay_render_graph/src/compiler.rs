// SPDX-License-Identifier: MIT OR Apache-2.0
//! Entry points the editor calls to compile graphs.

use crate::evaluation::{evaluate, CompileError, EvaluateGraph};
use crate::evaluators::{PipelineEvaluator, ProgramSource, ShaderEvaluator, ShaderStage};
use crate::graph::Graph;
use crate::pipeline::{Pipeline, PipelineSink};
use crate::settings::CompilerSettings;
use serde::{Deserialize, Serialize};

/// Compiled program produced by a [`ProgramToolchain`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgramBinary {
    /// Material the program belongs to
    pub name: String,
    /// Program stage
    pub stage: ShaderStage,
    /// Opaque toolchain output
    pub bytes: Vec<u8>,
}

/// External compiler turning generated source into a program binary
pub trait ProgramToolchain {
    /// Compile `source` against the named varying interface. Errors carry
    /// the toolchain's diagnostic text verbatim.
    fn compile(&self, source: &ProgramSource, interface_name: &str) -> Result<ProgramBinary, String>;
}

/// Compiles render and material graphs with one set of settings
#[derive(Debug, Clone, Default)]
pub struct Compiler {
    settings: CompilerSettings,
}

impl Compiler {
    /// Create a compiler
    pub fn new(settings: CompilerSettings) -> Self {
        Self { settings }
    }

    /// Settings in use
    pub fn settings(&self) -> &CompilerSettings {
        &self.settings
    }

    fn pipeline_evaluator(&self) -> PipelineEvaluator {
        PipelineEvaluator::new().with_trace(self.settings.trace_operations)
    }

    /// Compile a render graph into a pipeline
    pub fn compile_pipeline(&self, graph: &mut Graph) -> Result<Pipeline, CompileError> {
        tracing::info!(graph = %graph.id, name = %graph.name, "Compiling render pipeline");
        let pipeline = self.pipeline_evaluator().evaluate_graph(graph)?;
        tracing::info!(operations = pipeline.len(), "Render pipeline compiled");
        Ok(pipeline)
    }

    /// Compile a render graph straight into a runtime sink
    pub fn transfer_pipeline(&self, graph: &mut Graph, sink: &mut dyn PipelineSink) -> Result<(), CompileError> {
        let mut evaluator = self.pipeline_evaluator();
        evaluate(graph, &mut evaluator)?;
        evaluator.transfer_to_pipeline(sink)
    }

    /// Generate program source for a material graph
    pub fn generate_material_source(&self, graph: &mut Graph) -> Result<ProgramSource, CompileError> {
        tracing::info!(
            graph = %graph.id,
            material = %self.settings.material_name,
            stage = %self.settings.stage,
            "Generating material source"
        );
        ShaderEvaluator::new(self.settings.clone()).evaluate_graph(graph)
    }

    /// Generate program source and hand it to the toolchain
    pub fn compile_material(
        &self,
        graph: &mut Graph,
        toolchain: &dyn ProgramToolchain,
    ) -> Result<ProgramBinary, CompileError> {
        let source = self.generate_material_source(graph)?;
        toolchain
            .compile(&source, &self.settings.interface_name)
            .map_err(|diagnostic| {
                tracing::error!(material = %source.name, "{diagnostic}");
                CompileError::Toolchain { diagnostic }
            })
    }
}
