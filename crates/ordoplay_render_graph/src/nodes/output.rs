// SPDX-License-Identifier: MIT OR Apache-2.0
//! Terminal nodes.

use crate::evaluation::{CompileError, GraphEvaluator, NodeContext, Operation, OperationKind};
use crate::node::NodeBehavior;
use crate::pin::{types, CompiledValue, PinSpec, PinType};
use serde::{Deserialize, Serialize};

/// Presents a target on screen; terminal of a render pipeline
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScreenNode;

impl NodeBehavior for ScreenNode {
    fn label(&self) -> &'static str {
        "Screen"
    }

    fn input_specs(&self) -> Vec<PinSpec> {
        vec![
            PinSpec::new("Target", PinType::scalar(types::TARGET)),
            PinSpec::optional("Require", PinType::scalar(types::REQUIRE)),
        ]
    }

    fn output_specs(&self) -> Vec<PinSpec> {
        Vec::new()
    }

    fn evaluate(
        &self,
        ctx: &NodeContext,
        evaluator: &mut dyn GraphEvaluator,
    ) -> Result<Vec<CompiledValue>, CompileError> {
        let target = ctx.required(0)?;
        let op = Operation::new(OperationKind::OutputToScreen, PinType::none()).with_operands([target]);
        evaluator.add_operation(op);
        Ok(Vec::new())
    }
}

/// Writes the fragment color; terminal of a material graph
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MaterialOutputNode;

impl NodeBehavior for MaterialOutputNode {
    fn label(&self) -> &'static str {
        "Material output"
    }

    fn input_specs(&self) -> Vec<PinSpec> {
        vec![PinSpec::new("Color", PinType::scalar(types::VEC4))]
    }

    fn output_specs(&self) -> Vec<PinSpec> {
        Vec::new()
    }

    fn evaluate(
        &self,
        ctx: &NodeContext,
        evaluator: &mut dyn GraphEvaluator,
    ) -> Result<Vec<CompiledValue>, CompileError> {
        let color = ctx.required(0)?;
        let op = Operation::new(OperationKind::FragmentColor, PinType::none()).with_operands([color]);
        evaluator.add_operation(op);
        Ok(Vec::new())
    }
}
