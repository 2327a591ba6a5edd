// SPDX-License-Identifier: MIT OR Apache-2.0
//! Select node: one element out of an array.

use crate::evaluation::{CompileError, GraphEvaluator, NodeContext, Operation, OperationKind};
use crate::node::{NodeBehavior, NodePinTypes};
use crate::pin::{CompiledValue, PinSpec, PinType};
use serde::{Deserialize, Serialize};

/// Narrows `T[]` to `T` at a configured index
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectNode {
    element: PinType,
    index: usize,
}

impl SelectNode {
    /// Select element `index` of a `element[]` array
    pub fn new(element: PinType, index: usize) -> Self {
        Self {
            element: element.element(),
            index,
        }
    }

    /// Element type
    pub fn element(&self) -> &PinType {
        &self.element
    }

    /// Configured index
    pub fn index(&self) -> usize {
        self.index
    }

    /// Change the configured index
    pub fn set_index(&mut self, index: usize) {
        self.index = index;
    }

    /// Retype the input to `element[]` and the output to `element`
    pub fn set_element(&mut self, pins: &mut NodePinTypes, element: PinType) {
        pins.inputs[0] = element.to_array();
        pins.outputs[0] = element.clone();
        self.element = element;
    }
}

impl NodeBehavior for SelectNode {
    fn label(&self) -> &'static str {
        "Select"
    }

    fn input_specs(&self) -> Vec<PinSpec> {
        vec![PinSpec::new("Objects", self.element.to_array())]
    }

    fn output_specs(&self) -> Vec<PinSpec> {
        vec![PinSpec::new("Item", self.element.clone())]
    }

    fn on_connect_to_input(&mut self, pins: &mut NodePinTypes, _index: usize, source: &PinType) {
        if source.is_array && !source.is_none() && source.element() != self.element {
            self.set_element(pins, source.element());
        }
    }

    fn evaluate(
        &self,
        ctx: &NodeContext,
        evaluator: &mut dyn GraphEvaluator,
    ) -> Result<Vec<CompiledValue>, CompileError> {
        let array = ctx.required(0)?;

        if let Some(members) = evaluator.array_members(array) {
            let item = members.get(self.index).copied().ok_or(CompileError::IndexOutOfRange {
                node: ctx.node,
                index: self.index,
                len: members.len(),
            })?;
            return Ok(vec![item]);
        }

        // Array only materializes at run time
        let name = match evaluator.get_operation(array) {
            Some(source) => format!("Select {} of {}", self.index, source.name),
            None => format!("Select {}", self.index),
        };
        let op = Operation::new(OperationKind::SelectElement { index: self.index }, ctx.output_type(0).clone())
            .with_operands([array])
            .with_name(name);
        Ok(vec![evaluator.add_operation(op)])
    }
}
