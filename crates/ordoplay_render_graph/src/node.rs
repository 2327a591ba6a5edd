// SPDX-License-Identifier: MIT OR Apache-2.0
//! Node definitions for the graph.

use crate::evaluation::{CompileError, GraphEvaluator, NodeContext};
use crate::nodes::{
    AddNode, AttributeNode, ConcatNode, ConvertNode, EditorRenderNode, MaterialOutputNode,
    PropertyNode, Provider, RenderNode, RequireLockNode, Sample2DNode, SamplerNode, ScreenNode,
    SelectNode,
};
use crate::pin::{CompiledValue, PinId, PinSpec, PinType};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique identifier for a node, allocated by the owning graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub u32);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node#{}", self.0)
    }
}

/// Working copy of a node's pin types, handed to type propagation callbacks
#[derive(Debug, Clone, PartialEq)]
pub struct NodePinTypes {
    /// Input pin types in pin order
    pub inputs: Vec<PinType>,
    /// Output pin types in pin order
    pub outputs: Vec<PinType>,
}

/// Behavior shared by every node kind.
///
/// Callbacks only touch the node's own pin types (through [`NodePinTypes`])
/// and the kind's own state; the graph re-validates links afterwards.
pub trait NodeBehavior {
    /// Human-readable label
    fn label(&self) -> &'static str;

    /// Input pins created with the node
    fn input_specs(&self) -> Vec<PinSpec>;

    /// Output pins created with the node
    fn output_specs(&self) -> Vec<PinSpec>;

    /// Called before a link into input `index` is made
    fn on_connect_to_input(&mut self, _pins: &mut NodePinTypes, _index: usize, _source: &PinType) {}

    /// Called before a link out of output `index` is made
    fn on_connect_to_output(&mut self, _pins: &mut NodePinTypes, _index: usize, _target: &PinType) {}

    /// Compile the node, returning one value per output pin
    fn evaluate(
        &self,
        ctx: &NodeContext,
        evaluator: &mut dyn GraphEvaluator,
    ) -> Result<Vec<CompiledValue>, CompileError>;

    /// Smallest input count for kinds with a variable number of inputs
    fn min_inputs(&self) -> Option<usize> {
        None
    }

    /// Pin to create when the input list grows to include `index`
    fn input_spec_at(&self, _index: usize) -> Option<PinSpec> {
        None
    }

    /// Record a new input count
    fn set_input_count(&mut self, _count: usize) {}
}

/// Every node kind the compiler knows about
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum NodeKind {
    /// Camera/target/entity provider
    Provider(Provider),
    /// Type conversion
    Convert(ConvertNode),
    /// Scalars to array
    Concat(ConcatNode),
    /// Array to scalar
    Select(SelectNode),
    /// Entity render pass
    Render(RenderNode),
    /// Editor overlay pass
    EditorRender(EditorRenderNode),
    /// Ordering join
    RequireLock(RequireLockNode),
    /// Pipeline terminal
    Screen(ScreenNode),
    /// Material uniform
    Property(PropertyNode),
    /// Vertex varying
    Attribute(AttributeNode),
    /// Material sampler
    Sampler(SamplerNode),
    /// Addition
    Add(AddNode),
    /// Texture sampling
    Sample2D(Sample2DNode),
    /// Material terminal
    MaterialOutput(MaterialOutputNode),
}

impl NodeKind {
    /// Kind behavior
    pub fn behavior(&self) -> &dyn NodeBehavior {
        match self {
            Self::Provider(n) => n,
            Self::Convert(n) => n,
            Self::Concat(n) => n,
            Self::Select(n) => n,
            Self::Render(n) => n,
            Self::EditorRender(n) => n,
            Self::RequireLock(n) => n,
            Self::Screen(n) => n,
            Self::Property(n) => n,
            Self::Attribute(n) => n,
            Self::Sampler(n) => n,
            Self::Add(n) => n,
            Self::Sample2D(n) => n,
            Self::MaterialOutput(n) => n,
        }
    }

    /// Mutable kind behavior
    pub fn behavior_mut(&mut self) -> &mut dyn NodeBehavior {
        match self {
            Self::Provider(n) => n,
            Self::Convert(n) => n,
            Self::Concat(n) => n,
            Self::Select(n) => n,
            Self::Render(n) => n,
            Self::EditorRender(n) => n,
            Self::RequireLock(n) => n,
            Self::Screen(n) => n,
            Self::Property(n) => n,
            Self::Attribute(n) => n,
            Self::Sampler(n) => n,
            Self::Add(n) => n,
            Self::Sample2D(n) => n,
            Self::MaterialOutput(n) => n,
        }
    }

    /// Human-readable label
    pub fn label(&self) -> &'static str {
        self.behavior().label()
    }

    /// Compile the node
    pub fn evaluate(
        &self,
        ctx: &NodeContext,
        evaluator: &mut dyn GraphEvaluator,
    ) -> Result<Vec<CompiledValue>, CompileError> {
        self.behavior().evaluate(ctx, evaluator)
    }
}

macro_rules! impl_from_kind {
    ($($variant:ident($ty:ty)),* $(,)?) => {
        $(
            impl From<$ty> for NodeKind {
                fn from(node: $ty) -> Self {
                    Self::$variant(node)
                }
            }
        )*
    };
}

impl_from_kind!(
    Provider(Provider),
    Convert(ConvertNode),
    Concat(ConcatNode),
    Select(SelectNode),
    Render(RenderNode),
    EditorRender(EditorRenderNode),
    RequireLock(RequireLockNode),
    Screen(ScreenNode),
    Property(PropertyNode),
    Attribute(AttributeNode),
    Sampler(SamplerNode),
    Add(AddNode),
    Sample2D(Sample2DNode),
    MaterialOutput(MaterialOutputNode),
);

/// A node instance in the graph
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    /// Unique instance ID
    pub id: NodeId,
    /// Kind and kind-specific configuration
    pub(crate) kind: NodeKind,
    /// Position in the graph UI
    pub position: [f32; 2],
    /// Input pins in order
    pub(crate) inputs: Vec<PinId>,
    /// Output pins in order
    pub(crate) outputs: Vec<PinId>,
    /// Whether the current evaluation pass has compiled this node
    #[serde(skip)]
    pub(crate) evaluated: bool,
}

impl Node {
    /// Kind and kind-specific configuration
    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    /// Human-readable label
    pub fn label(&self) -> &'static str {
        self.kind.label()
    }

    /// Input pins in order
    pub fn inputs(&self) -> &[PinId] {
        &self.inputs
    }

    /// Output pins in order
    pub fn outputs(&self) -> &[PinId] {
        &self.outputs
    }

    /// Get an input pin by index
    pub fn input(&self, index: usize) -> Option<PinId> {
        self.inputs.get(index).copied()
    }

    /// Get an output pin by index
    pub fn output(&self, index: usize) -> Option<PinId> {
        self.outputs.get(index).copied()
    }

    /// Get all pins
    pub fn pins(&self) -> impl Iterator<Item = PinId> + '_ {
        self.inputs.iter().chain(self.outputs.iter()).copied()
    }

    /// Whether the current evaluation pass has compiled this node
    pub fn is_evaluated(&self) -> bool {
        self.evaluated
    }
}
