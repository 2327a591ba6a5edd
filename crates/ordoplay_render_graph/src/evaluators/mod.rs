// SPDX-License-Identifier: MIT OR Apache-2.0
//! Evaluator back ends.

pub mod pipeline;
pub mod shader;

pub use pipeline::{OperationArray, PipelineEvaluator};
pub use shader::{ProgramSource, ShaderEvaluator, ShaderStage};
