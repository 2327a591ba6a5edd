// SPDX-License-Identifier: MIT OR Apache-2.0
//! Convert node and the conversion table it compiles through.

use crate::evaluation::{CompileError, GraphEvaluator, NodeContext, Operation, OperationKind};
use crate::node::{NodeBehavior, NodePinTypes};
use crate::pin::{types, CompiledValue, PinSpec, PinType};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Builds the operation converting one value into the target type
pub type ConversionFn = fn(CompiledValue, &PinType) -> Operation;

/// Conversions keyed by (from-base, to-base)
#[derive(Debug, Clone, Default)]
pub struct ConversionRegistry {
    conversions: IndexMap<(String, String), ConversionFn>,
}

impl ConversionRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Conversions available to render pipelines
    pub fn pipeline() -> Self {
        let mut registry = Self::new();
        registry.register(types::CAMERA, types::EYE, eye_from_camera);
        registry.register(types::CAMERA, types::TARGET, target_from_camera);
        registry
    }

    /// Conversions available to material programs
    pub fn shader() -> Self {
        let mut registry = Self::new();
        for to in [types::VEC2, types::VEC3, types::VEC4] {
            registry.register(types::FLOAT, to, construct);
        }
        registry.register(types::VEC2, types::VEC4, construct);
        registry.register(types::VEC3, types::VEC4, construct);
        registry
    }

    /// Register (or replace) a conversion
    pub fn register(&mut self, from: impl Into<String>, to: impl Into<String>, conversion: ConversionFn) {
        self.conversions.insert((from.into(), to.into()), conversion);
    }

    /// Look up a conversion
    pub fn get(&self, from: &str, to: &str) -> Option<ConversionFn> {
        self.conversions.get(&(from.to_string(), to.to_string())).copied()
    }

    /// Number of registered conversions
    pub fn len(&self) -> usize {
        self.conversions.len()
    }

    /// Whether no conversion is registered
    pub fn is_empty(&self) -> bool {
        self.conversions.is_empty()
    }
}

fn eye_from_camera(camera: CompiledValue, to: &PinType) -> Operation {
    Operation::new(OperationKind::EyeFromCamera, to.clone()).with_operands([camera])
}

fn target_from_camera(camera: CompiledValue, to: &PinType) -> Operation {
    Operation::new(OperationKind::TargetFromCamera, to.clone()).with_operands([camera])
}

fn construct(value: CompiledValue, to: &PinType) -> Operation {
    Operation::new(OperationKind::Construct, to.clone()).with_operands([value])
}

/// Converts a value from one type into another.
///
/// Input and output types are independent, except that both sides always
/// agree on array-ness: an array input is converted element by element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConvertNode {
    from: PinType,
    to: PinType,
}

impl ConvertNode {
    /// Convert node with explicit types; `to` follows `from`'s array-ness
    pub fn new(from: PinType, to: PinType) -> Self {
        let to = to.with_array(from.is_array);
        Self { from, to }
    }

    /// Convert node whose types are picked up from the first connections
    pub fn untyped() -> Self {
        Self::new(PinType::none(), PinType::none())
    }

    /// Input type
    pub fn from_type(&self) -> &PinType {
        &self.from
    }

    /// Output type
    pub fn to_type(&self) -> &PinType {
        &self.to
    }

    /// Set the input type, aligning the output's array-ness
    pub fn set_from_type(&mut self, pins: &mut NodePinTypes, from: PinType) {
        if from.is_array != self.to.is_array {
            self.to = self.to.with_array(from.is_array);
        }
        self.from = from;
        self.sync(pins);
    }

    /// Set the output type, aligning the input's array-ness
    pub fn set_to_type(&mut self, pins: &mut NodePinTypes, to: PinType) {
        if to.is_array != self.from.is_array {
            self.from = self.from.with_array(to.is_array);
        }
        self.to = to;
        self.sync(pins);
    }

    fn sync(&self, pins: &mut NodePinTypes) {
        pins.inputs[0] = self.from.clone();
        pins.outputs[0] = self.to.clone();
    }
}

impl Default for ConvertNode {
    fn default() -> Self {
        Self::untyped()
    }
}

impl NodeBehavior for ConvertNode {
    fn label(&self) -> &'static str {
        "Convert"
    }

    fn input_specs(&self) -> Vec<PinSpec> {
        vec![PinSpec::new("From", self.from.clone())]
    }

    fn output_specs(&self) -> Vec<PinSpec> {
        vec![PinSpec::new("To", self.to.clone())]
    }

    fn on_connect_to_input(&mut self, pins: &mut NodePinTypes, _index: usize, source: &PinType) {
        if *source != self.from {
            self.set_from_type(pins, source.clone());
        }
    }

    fn on_connect_to_output(&mut self, pins: &mut NodePinTypes, _index: usize, target: &PinType) {
        if *target != self.to {
            self.set_to_type(pins, target.clone());
        }
    }

    fn evaluate(
        &self,
        ctx: &NodeContext,
        evaluator: &mut dyn GraphEvaluator,
    ) -> Result<Vec<CompiledValue>, CompileError> {
        let from = ctx.input_type(0).clone();
        let to = ctx.output_type(0).clone();
        let value = ctx.required(0)?;

        let convert = evaluator.conversion(&from.base, &to.base).ok_or_else(|| {
            CompileError::UnsupportedConversion {
                node: ctx.node,
                from: from.clone(),
                to: to.clone(),
            }
        })?;

        // Arrays known at compile time convert element-wise
        let members = if from.is_array {
            evaluator.array_members(value).map(<[CompiledValue]>::to_vec)
        } else {
            None
        };

        let result = match members {
            Some(members) => {
                let element = to.element();
                let converted = members
                    .into_iter()
                    .map(|member| evaluator.add_operation(convert(member, &element)))
                    .collect();
                evaluator.add_array(format!("Convert ({from}->{to})"), converted)
            }
            None => evaluator.add_operation(convert(value, &to).with_name(format!("Convert ({from}->{to})"))),
        };

        Ok(vec![result])
    }
}
