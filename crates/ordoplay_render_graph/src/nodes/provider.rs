// SPDX-License-Identifier: MIT OR Apache-2.0
//! Provider nodes: sources of cameras, targets and entities.

use crate::evaluation::{CompileError, GraphEvaluator, NodeContext, Operation, OperationKind};
use crate::node::NodeBehavior;
use crate::pin::{types, CompiledValue, PinSpec, PinType};
use serde::{Deserialize, Serialize};

/// What a provider node supplies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Provider {
    /// Main scene camera
    Camera,
    /// Editor viewport camera
    EditorCamera,
    /// Offscreen render target
    Target,
    /// Editor viewport target
    EditorTarget,
    /// Renderable entities of the current scene
    Entities,
}

impl Provider {
    /// Type of the single output pin
    pub fn output_type(self) -> PinType {
        match self {
            Self::Camera | Self::EditorCamera => PinType::scalar(types::CAMERA),
            Self::Target | Self::EditorTarget => PinType::scalar(types::TARGET),
            Self::Entities => PinType::array(types::ENTITY),
        }
    }

    fn operation(self) -> OperationKind {
        match self {
            Self::Camera => OperationKind::ProvideCamera,
            Self::EditorCamera => OperationKind::ProvideEditorCamera,
            Self::Target => OperationKind::ProvideTarget,
            Self::EditorTarget => OperationKind::ProvideEditorTarget,
            Self::Entities => OperationKind::ProvideEntities,
        }
    }

    fn output_name(self) -> &'static str {
        match self {
            Self::Camera | Self::EditorCamera => "Camera",
            Self::Target | Self::EditorTarget => "Target",
            Self::Entities => "Entities",
        }
    }
}

impl NodeBehavior for Provider {
    fn label(&self) -> &'static str {
        match self {
            Self::Camera => "Camera provider",
            Self::EditorCamera => "Editor camera",
            Self::Target => "Target provider",
            Self::EditorTarget => "Editor target",
            Self::Entities => "Entities",
        }
    }

    fn input_specs(&self) -> Vec<PinSpec> {
        Vec::new()
    }

    fn output_specs(&self) -> Vec<PinSpec> {
        vec![PinSpec::new(self.output_name(), self.output_type())]
    }

    fn evaluate(
        &self,
        _ctx: &NodeContext,
        evaluator: &mut dyn GraphEvaluator,
    ) -> Result<Vec<CompiledValue>, CompileError> {
        let op = Operation::new(self.operation(), self.output_type()).with_name(self.label());
        Ok(vec![evaluator.add_operation(op)])
    }
}
