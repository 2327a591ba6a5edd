// SPDX-License-Identifier: MIT OR Apache-2.0
//! Render graph compiler for the `OrdoPlay` Editor.
//!
//! Users wire typed nodes into a directed graph; this crate compiles it into
//! either:
//! - Program source text for a material (fragment or vertex stage)
//! - An ordered list of runtime operations forming a render pipeline
//!
//! ## Architecture
//!
//! - [`Graph`] owns every node, pin and link and enforces that linked pins
//!   agree on their [`PinType`]
//! - Each [`NodeKind`] declares its pins, retypes them on connect and
//!   compiles itself through the [`GraphEvaluator`] seam
//! - [`ShaderEvaluator`] and [`PipelineEvaluator`] are the two back ends
//! - [`Compiler`] ties graphs, settings and the external program toolchain
//!   together

pub mod compiler;
pub mod evaluation;
pub mod evaluators;
pub mod graph;
pub mod link;
pub mod node;
pub mod nodes;
pub mod persist;
pub mod pin;
pub mod pipeline;
pub mod settings;

pub use compiler::{Compiler, ProgramBinary, ProgramToolchain};
pub use evaluation::{evaluate, CompileError, EvaluateGraph, GraphEvaluator, Operation, OperationKind};
pub use evaluators::{PipelineEvaluator, ProgramSource, ShaderEvaluator, ShaderStage};
pub use graph::{Graph, GraphError, GraphId};
pub use link::{Link, LinkId};
pub use node::{Node, NodeId, NodeKind};
pub use persist::PersistError;
pub use pin::{CompiledValue, PinId, PinType};
pub use pipeline::{OperationInput, Pipeline, PipelineSink, RuntimeOperation};
pub use settings::{CompilerSettings, SettingsError};
