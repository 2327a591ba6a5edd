// SPDX-License-Identifier: MIT OR Apache-2.0
//! Graph evaluation: the evaluator seam shared by both back ends and the
//! memoized depth-first pass that drives node compilation.

use crate::graph::Graph;
use crate::node::NodeId;
use crate::nodes::convert::ConversionFn;
use crate::pin::{CompiledValue, PinType};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Kind of operation a node asks an evaluator to construct.
///
/// Pipeline kinds end up in the runtime operation list; material kinds
/// become statements in generated program source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OperationKind {
    /// Provides the main scene camera
    ProvideCamera,
    /// Provides the editor viewport camera
    ProvideEditorCamera,
    /// Provides an offscreen render target
    ProvideTarget,
    /// Provides the editor viewport target
    ProvideEditorTarget,
    /// Provides the renderable entities of the current scene
    ProvideEntities,
    /// Derives an eye (view/projection) from a camera
    EyeFromCamera,
    /// Derives a render target from a camera
    TargetFromCamera,
    /// Picks one element of an array produced at run time
    SelectElement {
        /// Element index
        index: usize,
    },
    /// Renders entities from an eye into a target
    Render,
    /// Renders editor overlays (grid, gizmos)
    EditorRender,
    /// Blits a target to the screen
    OutputToScreen,

    /// Reads a material property uniform
    Property {
        /// Property name
        name: String,
    },
    /// References a material sampler
    Sampler {
        /// Sampler name
        name: String,
    },
    /// References a vertex-to-fragment varying
    Varying {
        /// Varying name
        name: String,
    },
    /// Constructs a value of the result type from its operand
    Construct,
    /// Component-wise addition
    Add,
    /// Samples a 2D texture
    Sample2D,
    /// Assigns the fragment output color
    FragmentColor,
}

impl OperationKind {
    /// Short name used in logs and in generic statements
    pub fn name(&self) -> &'static str {
        match self {
            Self::ProvideCamera => "ProvideCamera",
            Self::ProvideEditorCamera => "ProvideEditorCamera",
            Self::ProvideTarget => "ProvideTarget",
            Self::ProvideEditorTarget => "ProvideEditorTarget",
            Self::ProvideEntities => "ProvideEntities",
            Self::EyeFromCamera => "EyeFromCamera",
            Self::TargetFromCamera => "TargetFromCamera",
            Self::SelectElement { .. } => "SelectElement",
            Self::Render => "Render",
            Self::EditorRender => "EditorRender",
            Self::OutputToScreen => "OutputToScreen",
            Self::Property { .. } => "Property",
            Self::Sampler { .. } => "Sampler",
            Self::Varying { .. } => "Varying",
            Self::Construct => "Construct",
            Self::Add => "Add",
            Self::Sample2D => "Sample2D",
            Self::FragmentColor => "FragmentColor",
        }
    }
}

/// Request to construct one operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Operation {
    /// What to construct
    pub kind: OperationKind,
    /// Debug name
    pub name: String,
    /// Type of the value the operation produces
    pub result_type: PinType,
    /// Values the operation consumes, in order
    pub operands: Vec<CompiledValue>,
}

impl Operation {
    /// Create an operation with no operands
    pub fn new(kind: OperationKind, result_type: PinType) -> Self {
        Self {
            name: kind.name().to_string(),
            kind,
            result_type,
            operands: Vec::new(),
        }
    }

    /// Set the operands
    pub fn with_operands(mut self, operands: impl IntoIterator<Item = CompiledValue>) -> Self {
        self.operands = operands.into_iter().collect();
        self
    }

    /// Set the debug name
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

/// Interface nodes compile against.
///
/// A node never knows which back end it is talking to; everything it needs
/// goes through these calls.
pub trait GraphEvaluator {
    /// Record an operation and return the handle of its result
    fn add_operation(&mut self, operation: Operation) -> CompiledValue;

    /// Look up an operation recorded earlier
    fn get_operation(&self, value: CompiledValue) -> Option<&Operation>;

    /// Group several values into one array-typed value
    fn add_array(&mut self, name: String, members: Vec<CompiledValue>) -> CompiledValue;

    /// Members of a value created by [`GraphEvaluator::add_array`]
    fn array_members(&self, value: CompiledValue) -> Option<&[CompiledValue]>;

    /// Conversion registered for a pair of base types
    fn conversion(&self, from: &str, to: &str) -> Option<ConversionFn>;
}

/// A back end that turns an evaluated graph into an artifact
pub trait EvaluateGraph: GraphEvaluator {
    /// Compiled artifact
    type Artifact;

    /// Take the accumulated artifact. An evaluator is single-use: the
    /// second call fails with [`CompileError::AlreadyCompiled`].
    fn extract(&mut self) -> Result<Self::Artifact, CompileError>;

    /// Evaluate the graph from its terminal node and extract the artifact
    fn evaluate_graph(&mut self, graph: &mut Graph) -> Result<Self::Artifact, CompileError>
    where
        Self: Sized,
    {
        evaluate(graph, self)?;
        self.extract()
    }
}

/// Resolved state of one input pin, handed to node logic
#[derive(Debug, Clone)]
pub struct InputSlot {
    /// Pin display name
    pub name: String,
    /// Pin type
    pub pin_type: PinType,
    /// Value of the connected output pin
    pub value: Option<CompiledValue>,
}

/// Everything a node kind sees while it compiles
#[derive(Debug, Clone)]
pub struct NodeContext {
    /// Node being compiled
    pub node: NodeId,
    /// Inputs in pin order
    pub inputs: Vec<InputSlot>,
    /// Output types in pin order
    pub outputs: Vec<PinType>,
}

impl NodeContext {
    /// Value of an input, if connected
    pub fn input(&self, index: usize) -> Option<CompiledValue> {
        self.inputs.get(index).and_then(|slot| slot.value)
    }

    /// Value of an input that must be connected
    pub fn required(&self, index: usize) -> Result<CompiledValue, CompileError> {
        let slot = &self.inputs[index];
        slot.value.ok_or_else(|| CompileError::MissingRequiredInput {
            node: self.node,
            pin: slot.name.clone(),
        })
    }

    /// Type of an input pin
    pub fn input_type(&self, index: usize) -> &PinType {
        &self.inputs[index].pin_type
    }

    /// Type of an output pin
    pub fn output_type(&self, index: usize) -> &PinType {
        &self.outputs[index]
    }
}

/// Evaluate the graph's terminal node (and, transitively, everything it
/// depends on) against an evaluator without extracting the artifact.
///
/// Resets all `evaluated` flags first, so each reachable node compiles
/// exactly once per call.
pub fn evaluate(graph: &mut Graph, evaluator: &mut dyn GraphEvaluator) -> Result<(), CompileError> {
    let terminal = graph.terminal_node().ok_or(CompileError::NoTerminalNode)?;
    graph.reset_evaluated_flags();

    tracing::debug!(graph = %graph.id, terminal = %terminal, "Evaluating graph");
    let mut pass = EvaluationPass {
        graph,
        in_progress: HashSet::new(),
        evaluated: 0,
    };
    pass.visit(terminal, evaluator)?;
    tracing::debug!(nodes = pass.evaluated, "Graph evaluated");
    Ok(())
}

struct EvaluationPass<'g> {
    graph: &'g mut Graph,
    in_progress: HashSet<NodeId>,
    evaluated: usize,
}

impl EvaluationPass<'_> {
    fn visit(&mut self, id: NodeId, evaluator: &mut dyn GraphEvaluator) -> Result<(), CompileError> {
        let node = self.graph.expect_node(id);
        if node.evaluated {
            return Ok(());
        }
        if !self.in_progress.insert(id) {
            return Err(CompileError::CyclicDependency { node: id });
        }

        // Dependencies first
        for pin_id in node.inputs.clone() {
            let pin = self.graph.expect_input_pin(pin_id);
            let (connection, optional) = (pin.connection, pin.optional);
            match connection {
                Some(output) => {
                    let upstream = self.graph.expect_output_pin(output).node;
                    self.visit(upstream, evaluator)?;
                }
                None if !optional => {
                    return Err(CompileError::MissingRequiredInput {
                        node: id,
                        pin: self.graph.expect_input_pin(pin_id).name.clone(),
                    });
                }
                None => {}
            }
        }

        let context = self.graph.node_context(id);
        let node = self.graph.expect_node(id);
        tracing::trace!(node = %id, kind = node.label(), "Compiling node");
        let values = node.kind.evaluate(&context, evaluator)?;
        self.graph.store_outputs(id, values);

        self.in_progress.remove(&id);
        self.evaluated += 1;
        Ok(())
    }
}

/// Error that aborts a compilation pass
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CompileError {
    /// A required input has no link
    #[error("Node {node} is missing required input '{pin}'")]
    MissingRequiredInput {
        /// Offending node
        node: NodeId,
        /// Pin display name
        pin: String,
    },

    /// No conversion is registered for the pair of types
    #[error("Node {node} has no conversion from {from} to {to}")]
    UnsupportedConversion {
        /// Offending node
        node: NodeId,
        /// Source type
        from: PinType,
        /// Target type
        to: PinType,
    },

    /// Select index past the end of the array
    #[error("Node {node} selects index {index} of an array of length {len}")]
    IndexOutOfRange {
        /// Offending node
        node: NodeId,
        /// Configured index
        index: usize,
        /// Array length
        len: usize,
    },

    /// Eye and target arrays of an array-mode render differ in length
    #[error("Node {node} renders {eyes} eyes into {targets} targets")]
    MismatchedArrayLengths {
        /// Offending node
        node: NodeId,
        /// Eye array length
        eyes: usize,
        /// Target array length
        targets: usize,
    },

    /// The evaluator's artifact was already extracted
    #[error("Evaluator was already compiled")]
    AlreadyCompiled,

    /// The graph has no terminal node to start from
    #[error("Graph has no terminal node")]
    NoTerminalNode,

    /// Evaluation reached a node that is still being compiled
    #[error("Cyclic dependency through node {node}")]
    CyclicDependency {
        /// Node reached twice on one path
        node: NodeId,
    },

    /// The external program toolchain rejected generated source
    #[error("Program toolchain failed: {diagnostic}")]
    Toolchain {
        /// Diagnostic text, unparsed
        diagnostic: String,
    },
}

impl CompileError {
    /// Node the error originates from, for highlighting in the editor
    pub fn node(&self) -> Option<NodeId> {
        match self {
            Self::MissingRequiredInput { node, .. }
            | Self::UnsupportedConversion { node, .. }
            | Self::IndexOutOfRange { node, .. }
            | Self::MismatchedArrayLengths { node, .. }
            | Self::CyclicDependency { node } => Some(*node),
            Self::AlreadyCompiled | Self::NoTerminalNode | Self::Toolchain { .. } => None,
        }
    }
}
