// SPDX-License-Identifier: MIT OR Apache-2.0
//! Render pass nodes.

use crate::evaluation::{CompileError, GraphEvaluator, NodeContext, Operation, OperationKind};
use crate::node::{NodeBehavior, NodePinTypes};
use crate::pin::{types, CompiledValue, PinSpec, PinType};
use serde::{Deserialize, Serialize};

const ENTITIES: usize = 0;
const EYE: usize = 1;
const TARGET: usize = 2;

/// Renders entities from an eye into a target.
///
/// In array mode the Eye and Target pins both take arrays and one render
/// operation is built per index.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RenderNode {
    is_array: bool,
}

impl RenderNode {
    /// Scalar-mode render node
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether Eye and Target take arrays
    pub fn is_array(&self) -> bool {
        self.is_array
    }

    /// Switch Eye and Target between scalar and array mode together
    pub fn set_array(&mut self, pins: &mut NodePinTypes, is_array: bool) {
        self.is_array = is_array;
        pins.inputs[EYE] = PinType::scalar(types::EYE).with_array(is_array);
        pins.inputs[TARGET] = PinType::scalar(types::TARGET).with_array(is_array);
    }

    fn render(
        ctx: &NodeContext,
        evaluator: &mut dyn GraphEvaluator,
        entities: CompiledValue,
        eye: CompiledValue,
        target: CompiledValue,
    ) -> CompiledValue {
        let name = match evaluator.get_operation(target) {
            Some(target) => format!("Render to {}", target.name),
            None => "Render".to_string(),
        };
        let op = Operation::new(OperationKind::Render, ctx.output_type(0).clone())
            .with_operands([entities, eye, target])
            .with_name(name);
        evaluator.add_operation(op)
    }
}

impl NodeBehavior for RenderNode {
    fn label(&self) -> &'static str {
        "Render"
    }

    fn input_specs(&self) -> Vec<PinSpec> {
        vec![
            PinSpec::new("Entities", PinType::array(types::ENTITY)),
            PinSpec::new("Eye", PinType::scalar(types::EYE).with_array(self.is_array)),
            PinSpec::new("Target", PinType::scalar(types::TARGET).with_array(self.is_array)),
            PinSpec::optional("Require", PinType::scalar(types::REQUIRE)),
        ]
    }

    fn output_specs(&self) -> Vec<PinSpec> {
        vec![PinSpec::new("Require", PinType::scalar(types::REQUIRE))]
    }

    fn on_connect_to_input(&mut self, pins: &mut NodePinTypes, index: usize, source: &PinType) {
        let base = match index {
            EYE => types::EYE,
            TARGET => types::TARGET,
            _ => return,
        };
        if source.base == base && source.is_array != self.is_array {
            self.set_array(pins, source.is_array);
        }
    }

    fn evaluate(
        &self,
        ctx: &NodeContext,
        evaluator: &mut dyn GraphEvaluator,
    ) -> Result<Vec<CompiledValue>, CompileError> {
        let entities = ctx.required(ENTITIES)?;
        let eye = ctx.required(EYE)?;
        let target = ctx.required(TARGET)?;

        if !self.is_array {
            return Ok(vec![Self::render(ctx, evaluator, entities, eye, target)]);
        }

        let members = |value: CompiledValue, evaluator: &dyn GraphEvaluator| {
            evaluator
                .array_members(value)
                .map(<[CompiledValue]>::to_vec)
                .unwrap_or_else(|| vec![value])
        };
        let eyes = members(eye, &*evaluator);
        let targets = members(target, &*evaluator);
        if eyes.len() != targets.len() {
            return Err(CompileError::MismatchedArrayLengths {
                node: ctx.node,
                eyes: eyes.len(),
                targets: targets.len(),
            });
        }

        let renders = eyes
            .into_iter()
            .zip(targets)
            .map(|(eye, target)| Self::render(ctx, evaluator, entities, eye, target))
            .collect();
        Ok(vec![evaluator.add_array(self.label().to_string(), renders)])
    }
}

/// Renders editor overlays (grid, gizmos) after whatever it requires
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EditorRenderNode;

impl NodeBehavior for EditorRenderNode {
    fn label(&self) -> &'static str {
        "Editor render"
    }

    fn input_specs(&self) -> Vec<PinSpec> {
        vec![PinSpec::optional("Require", PinType::scalar(types::REQUIRE))]
    }

    fn output_specs(&self) -> Vec<PinSpec> {
        vec![PinSpec::new("Require", PinType::scalar(types::REQUIRE))]
    }

    fn evaluate(
        &self,
        ctx: &NodeContext,
        evaluator: &mut dyn GraphEvaluator,
    ) -> Result<Vec<CompiledValue>, CompileError> {
        let op = Operation::new(OperationKind::EditorRender, ctx.output_type(0).clone())
            .with_operands(ctx.input(0));
        Ok(vec![evaluator.add_operation(op)])
    }
}
