// SPDX-License-Identifier: MIT OR Apache-2.0
//! Material graph nodes, compiled to program source.

use crate::evaluation::{CompileError, GraphEvaluator, NodeContext, Operation, OperationKind};
use crate::node::{NodeBehavior, NodePinTypes};
use crate::pin::{types, CompiledValue, PinSpec, PinType};
use serde::{Deserialize, Serialize};

/// Material property, exposed as a uniform
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyNode {
    /// Property name
    pub name: String,
    /// Value type
    pub pin_type: PinType,
}

impl PropertyNode {
    /// Create a property node
    pub fn new(name: impl Into<String>, pin_type: PinType) -> Self {
        Self {
            name: name.into(),
            pin_type,
        }
    }
}

impl NodeBehavior for PropertyNode {
    fn label(&self) -> &'static str {
        "Property"
    }

    fn input_specs(&self) -> Vec<PinSpec> {
        Vec::new()
    }

    fn output_specs(&self) -> Vec<PinSpec> {
        vec![PinSpec::new("Value", self.pin_type.clone())]
    }

    fn evaluate(
        &self,
        ctx: &NodeContext,
        evaluator: &mut dyn GraphEvaluator,
    ) -> Result<Vec<CompiledValue>, CompileError> {
        let op = Operation::new(
            OperationKind::Property {
                name: self.name.clone(),
            },
            ctx.output_type(0).clone(),
        )
        .with_name(&self.name);
        Ok(vec![evaluator.add_operation(op)])
    }
}

/// Vertex attribute passed to the fragment stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeNode {
    /// Varying name
    pub name: String,
    /// Value type
    pub pin_type: PinType,
}

impl AttributeNode {
    /// Create an attribute node
    pub fn new(name: impl Into<String>, pin_type: PinType) -> Self {
        Self {
            name: name.into(),
            pin_type,
        }
    }
}

impl NodeBehavior for AttributeNode {
    fn label(&self) -> &'static str {
        "Attribute"
    }

    fn input_specs(&self) -> Vec<PinSpec> {
        Vec::new()
    }

    fn output_specs(&self) -> Vec<PinSpec> {
        vec![PinSpec::new("Value", self.pin_type.clone())]
    }

    fn evaluate(
        &self,
        ctx: &NodeContext,
        evaluator: &mut dyn GraphEvaluator,
    ) -> Result<Vec<CompiledValue>, CompileError> {
        let op = Operation::new(
            OperationKind::Varying {
                name: self.name.clone(),
            },
            ctx.output_type(0).clone(),
        )
        .with_name(&self.name);
        Ok(vec![evaluator.add_operation(op)])
    }
}

/// 2D texture sampler slot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SamplerNode {
    /// Sampler name
    pub name: String,
}

impl SamplerNode {
    /// Create a sampler node
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl NodeBehavior for SamplerNode {
    fn label(&self) -> &'static str {
        "Sampler"
    }

    fn input_specs(&self) -> Vec<PinSpec> {
        Vec::new()
    }

    fn output_specs(&self) -> Vec<PinSpec> {
        vec![PinSpec::new("Texture", PinType::scalar(types::TEXTURE_2D))]
    }

    fn evaluate(
        &self,
        ctx: &NodeContext,
        evaluator: &mut dyn GraphEvaluator,
    ) -> Result<Vec<CompiledValue>, CompileError> {
        let op = Operation::new(
            OperationKind::Sampler {
                name: self.name.clone(),
            },
            ctx.output_type(0).clone(),
        )
        .with_name(&self.name);
        Ok(vec![evaluator.add_operation(op)])
    }
}

/// Component-wise addition. Both operands and the result share one scalar
/// type, adopted from whatever gets connected first.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AddNode {
    pin_type: PinType,
}

impl AddNode {
    /// Untyped add node
    pub fn new() -> Self {
        Self::default()
    }

    /// Shared operand type
    pub fn pin_type(&self) -> &PinType {
        &self.pin_type
    }

    fn adopt(&mut self, pins: &mut NodePinTypes, pin_type: &PinType) {
        if pin_type.is_none() || pin_type.is_array || *pin_type == self.pin_type {
            return;
        }
        self.pin_type = pin_type.clone();
        for pin in pins.inputs.iter_mut().chain(pins.outputs.iter_mut()) {
            *pin = pin_type.clone();
        }
    }
}

impl NodeBehavior for AddNode {
    fn label(&self) -> &'static str {
        "Add"
    }

    fn input_specs(&self) -> Vec<PinSpec> {
        vec![
            PinSpec::new("A", self.pin_type.clone()),
            PinSpec::new("B", self.pin_type.clone()),
        ]
    }

    fn output_specs(&self) -> Vec<PinSpec> {
        vec![PinSpec::new("Result", self.pin_type.clone())]
    }

    fn on_connect_to_input(&mut self, pins: &mut NodePinTypes, _index: usize, source: &PinType) {
        self.adopt(pins, source);
    }

    fn on_connect_to_output(&mut self, pins: &mut NodePinTypes, _index: usize, target: &PinType) {
        self.adopt(pins, target);
    }

    fn evaluate(
        &self,
        ctx: &NodeContext,
        evaluator: &mut dyn GraphEvaluator,
    ) -> Result<Vec<CompiledValue>, CompileError> {
        let a = ctx.required(0)?;
        let b = ctx.required(1)?;
        let op = Operation::new(OperationKind::Add, ctx.output_type(0).clone()).with_operands([a, b]);
        Ok(vec![evaluator.add_operation(op)])
    }
}

/// Samples a 2D texture at a coordinate
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Sample2DNode;

impl NodeBehavior for Sample2DNode {
    fn label(&self) -> &'static str {
        "Sample 2D"
    }

    fn input_specs(&self) -> Vec<PinSpec> {
        vec![
            PinSpec::new("Texture", PinType::scalar(types::TEXTURE_2D)),
            PinSpec::optional("UV", PinType::scalar(types::VEC2)),
        ]
    }

    fn output_specs(&self) -> Vec<PinSpec> {
        vec![PinSpec::new("Color", PinType::scalar(types::VEC4))]
    }

    fn evaluate(
        &self,
        ctx: &NodeContext,
        evaluator: &mut dyn GraphEvaluator,
    ) -> Result<Vec<CompiledValue>, CompileError> {
        let texture = ctx.required(0)?;
        // Without UV the evaluator falls back to the texcoord varying
        let operands = std::iter::once(texture).chain(ctx.input(1));
        let op = Operation::new(OperationKind::Sample2D, ctx.output_type(0).clone()).with_operands(operands);
        Ok(vec![evaluator.add_operation(op)])
    }
}
