// SPDX-License-Identifier: MIT OR Apache-2.0
//! Concatenate node: N scalars of one type into an array.

use crate::evaluation::{CompileError, GraphEvaluator, NodeContext};
use crate::node::{NodeBehavior, NodePinTypes};
use crate::pin::{CompiledValue, PinSpec, PinType};
use serde::{Deserialize, Serialize};

/// Smallest number of inputs
pub const MIN_INPUTS: usize = 2;

/// Builds an array value from its inputs in pin order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConcatNode {
    element: PinType,
    inputs: usize,
}

impl ConcatNode {
    /// Concat of two inputs of `element` type
    pub fn new(element: PinType) -> Self {
        Self {
            element: element.element(),
            inputs: MIN_INPUTS,
        }
    }

    /// Element type
    pub fn element(&self) -> &PinType {
        &self.element
    }

    /// Number of inputs
    pub fn input_count(&self) -> usize {
        self.inputs
    }

    /// Retype every input to `element` and the output to `element[]`
    pub fn set_element(&mut self, pins: &mut NodePinTypes, element: PinType) {
        for input in &mut pins.inputs {
            *input = element.clone();
        }
        pins.outputs[0] = element.to_array();
        self.element = element;
    }

    fn input_name(index: usize) -> String {
        format!("Object {}", index + 1)
    }
}

impl NodeBehavior for ConcatNode {
    fn label(&self) -> &'static str {
        "Concat"
    }

    fn input_specs(&self) -> Vec<PinSpec> {
        (0..self.inputs)
            .map(|index| PinSpec::new(Self::input_name(index), self.element.clone()))
            .collect()
    }

    fn output_specs(&self) -> Vec<PinSpec> {
        vec![PinSpec::new("Array", self.element.to_array())]
    }

    fn on_connect_to_input(&mut self, pins: &mut NodePinTypes, _index: usize, source: &PinType) {
        if !source.is_array && !source.is_none() && *source != self.element {
            self.set_element(pins, source.clone());
        }
    }

    fn evaluate(
        &self,
        ctx: &NodeContext,
        evaluator: &mut dyn GraphEvaluator,
    ) -> Result<Vec<CompiledValue>, CompileError> {
        let members = (0..ctx.inputs.len())
            .map(|index| ctx.required(index))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(vec![evaluator.add_array(format!("Concat {}", self.element), members)])
    }

    fn min_inputs(&self) -> Option<usize> {
        Some(MIN_INPUTS)
    }

    fn input_spec_at(&self, index: usize) -> Option<PinSpec> {
        Some(PinSpec::new(Self::input_name(index), self.element.clone()))
    }

    fn set_input_count(&mut self, count: usize) {
        self.inputs = count;
    }
}
