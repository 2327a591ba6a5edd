// SPDX-License-Identifier: MIT OR Apache-2.0
//! Require lock: joins several ordering dependencies into one.

use crate::evaluation::{CompileError, GraphEvaluator, NodeContext};
use crate::node::NodeBehavior;
use crate::pin::{types, CompiledValue, PinSpec, PinType};
use serde::{Deserialize, Serialize};

/// Smallest number of inputs
pub const MIN_INPUTS: usize = 2;

/// Structural join. Constructs no operation of its own; evaluating it forces
/// every dependency to be registered before whatever consumes the output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequireLockNode {
    inputs: usize,
}

impl RequireLockNode {
    /// Lock over two dependencies
    pub fn new() -> Self {
        Self { inputs: MIN_INPUTS }
    }

    /// Number of inputs
    pub fn input_count(&self) -> usize {
        self.inputs
    }
}

impl Default for RequireLockNode {
    fn default() -> Self {
        Self::new()
    }
}

impl NodeBehavior for RequireLockNode {
    fn label(&self) -> &'static str {
        "Require lock"
    }

    fn input_specs(&self) -> Vec<PinSpec> {
        (0..self.inputs).filter_map(|index| self.input_spec_at(index)).collect()
    }

    fn output_specs(&self) -> Vec<PinSpec> {
        vec![PinSpec::new("Require", PinType::scalar(types::REQUIRE))]
    }

    fn evaluate(
        &self,
        ctx: &NodeContext,
        evaluator: &mut dyn GraphEvaluator,
    ) -> Result<Vec<CompiledValue>, CompileError> {
        let dependencies = (0..ctx.inputs.len())
            .map(|index| ctx.required(index))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(vec![evaluator.add_array(self.label().to_string(), dependencies)])
    }

    fn min_inputs(&self) -> Option<usize> {
        Some(MIN_INPUTS)
    }

    fn input_spec_at(&self, index: usize) -> Option<PinSpec> {
        Some(PinSpec::new(format!("Require {}", index + 1), PinType::scalar(types::REQUIRE)))
    }

    fn set_input_count(&mut self, count: usize) {
        self.inputs = count;
    }
}
