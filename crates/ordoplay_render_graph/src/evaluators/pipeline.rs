// SPDX-License-Identifier: MIT OR Apache-2.0
//! Evaluator producing the runtime operation list of a render pipeline.

use crate::evaluation::{CompileError, EvaluateGraph, GraphEvaluator, Operation};
use crate::nodes::{ConversionFn, ConversionRegistry};
use crate::pin::CompiledValue;
use crate::pipeline::{OperationInput, Pipeline, PipelineSink, RuntimeOperation};

/// Grouping of values that exists only while compiling.
///
/// Concat, array renders and require locks produce these; they never reach
/// the runtime. Operands pointing at one expand to its members.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationArray {
    /// Debug name
    pub name: String,
    /// Grouped values, possibly other arrays
    pub members: Vec<CompiledValue>,
}

#[derive(Debug, Clone)]
enum Entry {
    Operation(Operation),
    Array(OperationArray),
}

/// Compiles a render graph into a [`Pipeline`]. Single use.
#[derive(Debug)]
pub struct PipelineEvaluator {
    entries: Vec<Entry>,
    conversions: ConversionRegistry,
    trace: bool,
    extracted: bool,
}

impl PipelineEvaluator {
    /// Evaluator with the standard pipeline conversions
    pub fn new() -> Self {
        Self::with_conversions(ConversionRegistry::pipeline())
    }

    /// Evaluator with a custom conversion table
    pub fn with_conversions(conversions: ConversionRegistry) -> Self {
        Self {
            entries: Vec::new(),
            conversions,
            trace: false,
            extracted: false,
        }
    }

    /// Trace every transferred operation
    pub fn with_trace(mut self, trace: bool) -> Self {
        self.trace = trace;
        self
    }

    /// Operations recorded so far, arrays excluded
    pub fn operations(&self) -> impl Iterator<Item = &Operation> {
        self.entries.iter().filter_map(|entry| match entry {
            Entry::Operation(op) => Some(op),
            Entry::Array(_) => None,
        })
    }

    /// Hand the compiled operations to a runtime sink
    pub fn transfer_to_pipeline(&mut self, sink: &mut dyn PipelineSink) -> Result<(), CompileError> {
        for operation in self.take_operations()? {
            sink.add_operation(operation);
        }
        Ok(())
    }

    fn take_operations(&mut self) -> Result<Vec<RuntimeOperation>, CompileError> {
        if self.extracted {
            tracing::error!("Tried to construct a pipeline twice from the same evaluator");
            return Err(CompileError::AlreadyCompiled);
        }
        self.extracted = true;
        let entries = std::mem::take(&mut self.entries);

        // Position of every real operation in the filtered list
        let mut next = 0;
        let remap: Vec<Option<usize>> = entries
            .iter()
            .map(|entry| match entry {
                Entry::Operation(_) => {
                    next += 1;
                    Some(next - 1)
                }
                Entry::Array(_) => None,
            })
            .collect();

        tracing::trace!("Constructing pipeline");
        let mut operations = Vec::with_capacity(next);
        for entry in &entries {
            let Entry::Operation(op) = entry else {
                continue;
            };
            let inputs = op
                .operands
                .iter()
                .map(|value| resolve(&entries, &remap, *value))
                .collect();

            if self.trace {
                tracing::trace!(
                    "[{:02}] Operation: {:<40} Name: {}",
                    operations.len(),
                    op.kind.name(),
                    op.name
                );
            }
            operations.push(RuntimeOperation {
                kind: op.kind.clone(),
                name: op.name.clone(),
                result_type: op.result_type.clone(),
                inputs,
            });
        }
        Ok(operations)
    }
}

impl Default for PipelineEvaluator {
    fn default() -> Self {
        Self::new()
    }
}

fn resolve(entries: &[Entry], remap: &[Option<usize>], value: CompiledValue) -> OperationInput {
    match remap[value.index()] {
        Some(index) => OperationInput::Single(index),
        None => {
            let mut members = Vec::new();
            flatten(entries, remap, value, &mut members);
            OperationInput::Many(members)
        }
    }
}

fn flatten(entries: &[Entry], remap: &[Option<usize>], value: CompiledValue, out: &mut Vec<usize>) {
    match &entries[value.index()] {
        Entry::Operation(_) => out.extend(remap[value.index()]),
        Entry::Array(array) => {
            for member in &array.members {
                flatten(entries, remap, *member, out);
            }
        }
    }
}

impl GraphEvaluator for PipelineEvaluator {
    fn add_operation(&mut self, operation: Operation) -> CompiledValue {
        self.entries.push(Entry::Operation(operation));
        CompiledValue(self.entries.len() - 1)
    }

    fn get_operation(&self, value: CompiledValue) -> Option<&Operation> {
        match self.entries.get(value.index()) {
            Some(Entry::Operation(op)) => Some(op),
            _ => None,
        }
    }

    fn add_array(&mut self, name: String, members: Vec<CompiledValue>) -> CompiledValue {
        self.entries.push(Entry::Array(OperationArray { name, members }));
        CompiledValue(self.entries.len() - 1)
    }

    fn array_members(&self, value: CompiledValue) -> Option<&[CompiledValue]> {
        match self.entries.get(value.index()) {
            Some(Entry::Array(array)) => Some(&array.members),
            _ => None,
        }
    }

    fn conversion(&self, from: &str, to: &str) -> Option<ConversionFn> {
        self.conversions.get(from, to)
    }
}

impl EvaluateGraph for PipelineEvaluator {
    type Artifact = Pipeline;

    fn extract(&mut self) -> Result<Pipeline, CompileError> {
        let mut pipeline = Pipeline::new();
        self.transfer_to_pipeline(&mut pipeline)?;
        if self.trace {
            pipeline.log_pipeline();
        }
        Ok(pipeline)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluation::{evaluate, OperationKind};
    use crate::graph::Graph;
    use crate::node::NodeId;
    use crate::nodes::{
        ConcatNode, ConvertNode, EditorRenderNode, Provider, RenderNode, RequireLockNode,
        ScreenNode, SelectNode,
    };
    use crate::pin::{types, PinType};

    fn link(graph: &mut Graph, from: NodeId, output: usize, to: NodeId, input: usize) {
        let output = graph.node(from).unwrap().output(output).unwrap();
        let input = graph.node(to).unwrap().input(input).unwrap();
        graph.connect(output, input).unwrap();
    }

    fn count(evaluator: &PipelineEvaluator, kind: &OperationKind) -> usize {
        evaluator.operations().filter(|op| op.kind == *kind).count()
    }

    fn eye(graph: &mut Graph) -> NodeId {
        let camera = graph.add_node(Provider::Camera);
        let convert = graph.add_node(ConvertNode::new(
            PinType::scalar(types::CAMERA),
            PinType::scalar(types::EYE),
        ));
        link(graph, camera, 0, convert, 0);
        convert
    }

    /// Entities, two eyes and `targets` targets feeding an array render
    fn array_render(graph: &mut Graph, targets: usize) -> (NodeId, NodeId) {
        let entities = graph.add_node(Provider::Entities);
        let eyes = graph.add_node(ConcatNode::new(PinType::scalar(types::EYE)));
        for index in 0..2 {
            let eye = eye(graph);
            link(graph, eye, 0, eyes, index);
        }

        let first_target = graph.add_node(Provider::Target);
        let concat = graph.add_node(ConcatNode::new(PinType::scalar(types::TARGET)));
        graph.set_input_count(concat, targets).unwrap();
        link(graph, first_target, 0, concat, 0);
        for index in 1..targets {
            let target = graph.add_node(Provider::Target);
            link(graph, target, 0, concat, index);
        }

        let render = graph.add_node(RenderNode::new());
        link(graph, entities, 0, render, 0);
        link(graph, eyes, 0, render, 1);
        link(graph, concat, 0, render, 2);
        (render, first_target)
    }

    #[test]
    fn test_operation_arrays_are_filtered() {
        let mut graph = Graph::new("arrays");
        let (render, first_target) = array_render(&mut graph, 2);
        let overlay = graph.add_node(EditorRenderNode);
        let screen = graph.add_node(ScreenNode);
        link(&mut graph, render, 0, overlay, 0);
        link(&mut graph, first_target, 0, screen, 0);
        link(&mut graph, overlay, 0, screen, 1);
        graph.set_terminal_node(screen).unwrap();

        let pipeline = PipelineEvaluator::new().evaluate_graph(&mut graph).unwrap();
        let operations = pipeline.operations();

        // 1 target + entities + 2 x (camera, eye) + 1 target + 2 renders + overlay + screen
        assert_eq!(operations.len(), 11);
        for (position, operation) in operations.iter().enumerate() {
            for input in &operation.inputs {
                let indices = match input {
                    OperationInput::Single(index) => vec![*index],
                    OperationInput::Many(indices) => indices.clone(),
                };
                assert!(indices.iter().all(|index| *index < position));
            }
        }

        let renders: Vec<usize> = operations
            .iter()
            .enumerate()
            .filter(|(_, op)| op.kind == OperationKind::Render)
            .map(|(index, _)| index)
            .collect();
        assert_eq!(renders.len(), 2);

        let overlay = operations
            .iter()
            .find(|op| op.kind == OperationKind::EditorRender)
            .unwrap();
        assert_eq!(overlay.inputs, vec![OperationInput::Many(renders)]);

        let screen = operations.last().unwrap();
        assert_eq!(screen.kind, OperationKind::OutputToScreen);
        assert_eq!(screen.inputs, vec![OperationInput::Single(0)]);
    }

    #[test]
    fn test_mismatched_lengths_render_nothing() {
        let mut graph = Graph::new("mismatch");
        let (render, _) = array_render(&mut graph, 3);
        graph.set_terminal_node(render).unwrap();

        let mut evaluator = PipelineEvaluator::new();
        let error = evaluate(&mut graph, &mut evaluator).unwrap_err();
        assert_eq!(
            error,
            CompileError::MismatchedArrayLengths {
                node: render,
                eyes: 2,
                targets: 3,
            }
        );
        assert_eq!(count(&evaluator, &OperationKind::Render), 0);
    }

    #[test]
    fn test_concat_select_round_trip() {
        let mut graph = Graph::new("round trip");
        let first = graph.add_node(Provider::Target);
        let second = graph.add_node(Provider::EditorTarget);
        let concat = graph.add_node(ConcatNode::new(PinType::scalar(types::TARGET)));
        let select = graph.add_node(SelectNode::new(PinType::scalar(types::TARGET), 1));
        let screen = graph.add_node(ScreenNode);
        link(&mut graph, first, 0, concat, 0);
        link(&mut graph, second, 0, concat, 1);
        link(&mut graph, concat, 0, select, 0);
        link(&mut graph, select, 0, screen, 0);
        graph.set_terminal_node(screen).unwrap();

        let mut evaluator = PipelineEvaluator::new();
        evaluate(&mut graph, &mut evaluator).unwrap();

        let second_out = graph.node(second).unwrap().output(0).unwrap();
        let select_out = graph.node(select).unwrap().output(0).unwrap();
        let expected = graph.output_pin(second_out).unwrap().value();
        assert!(expected.is_some());
        assert_eq!(graph.output_pin(select_out).unwrap().value(), expected);
        assert_eq!(count(&evaluator, &OperationKind::SelectElement { index: 1 }), 0);

        let screen_op = evaluator.operations().last().unwrap();
        assert_eq!(screen_op.operands, vec![expected.unwrap()]);
    }

    #[test]
    fn test_select_out_of_range() {
        let mut graph = Graph::new("range");
        let first = graph.add_node(Provider::Target);
        let second = graph.add_node(Provider::Target);
        let concat = graph.add_node(ConcatNode::new(PinType::scalar(types::TARGET)));
        let select = graph.add_node(SelectNode::new(PinType::scalar(types::TARGET), 5));
        link(&mut graph, first, 0, concat, 0);
        link(&mut graph, second, 0, concat, 1);
        link(&mut graph, concat, 0, select, 0);
        graph.set_terminal_node(select).unwrap();

        let result = PipelineEvaluator::new().evaluate_graph(&mut graph);
        assert_eq!(
            result,
            Err(CompileError::IndexOutOfRange {
                node: select,
                index: 5,
                len: 2,
            })
        );
    }

    #[test]
    fn test_select_runtime_array() {
        let mut graph = Graph::new("runtime select");
        let entities = graph.add_node(Provider::Entities);
        let select = graph.add_node(SelectNode::new(PinType::scalar(types::ENTITY), 2));
        link(&mut graph, entities, 0, select, 0);
        graph.set_terminal_node(select).unwrap();

        let pipeline = PipelineEvaluator::new().evaluate_graph(&mut graph).unwrap();
        let select = &pipeline.operations()[1];
        assert_eq!(select.kind, OperationKind::SelectElement { index: 2 });
        assert_eq!(select.inputs, vec![OperationInput::Single(0)]);
        assert_eq!(select.result_type, PinType::scalar(types::ENTITY));
    }

    #[test]
    fn test_required_and_optional_inputs() {
        let mut graph = Graph::new("inputs");
        let overlay = graph.add_node(EditorRenderNode);
        let screen = graph.add_node(ScreenNode);
        link(&mut graph, overlay, 0, screen, 1);
        graph.set_terminal_node(screen).unwrap();

        let result = PipelineEvaluator::new().evaluate_graph(&mut graph);
        assert_eq!(
            result,
            Err(CompileError::MissingRequiredInput {
                node: screen,
                pin: "Target".to_string(),
            })
        );

        // Require may stay unconnected
        let target = graph.add_node(Provider::Target);
        link(&mut graph, target, 0, screen, 0);
        let require = graph.node(screen).unwrap().input(1).unwrap();
        let overlay_link = graph.link_into(require).unwrap().id;
        graph.disconnect_link(overlay_link);

        let pipeline = PipelineEvaluator::new().evaluate_graph(&mut graph).unwrap();
        assert_eq!(pipeline.len(), 2);
    }

    #[test]
    fn test_memoized_diamond() {
        let mut graph = Graph::new("diamond");
        let camera = graph.add_node(Provider::Camera);
        let entities = graph.add_node(Provider::Entities);
        let eye = graph.add_node(ConvertNode::new(
            PinType::scalar(types::CAMERA),
            PinType::scalar(types::EYE),
        ));
        let target = graph.add_node(ConvertNode::new(
            PinType::scalar(types::CAMERA),
            PinType::scalar(types::TARGET),
        ));
        let render = graph.add_node(RenderNode::new());
        let screen = graph.add_node(ScreenNode);
        link(&mut graph, camera, 0, eye, 0);
        link(&mut graph, camera, 0, target, 0);
        link(&mut graph, entities, 0, render, 0);
        link(&mut graph, eye, 0, render, 1);
        link(&mut graph, target, 0, render, 2);
        link(&mut graph, target, 0, screen, 0);
        link(&mut graph, render, 0, screen, 1);
        graph.set_terminal_node(screen).unwrap();

        for _ in 0..2 {
            let mut evaluator = PipelineEvaluator::new();
            evaluate(&mut graph, &mut evaluator).unwrap();
            assert_eq!(count(&evaluator, &OperationKind::ProvideCamera), 1);
            assert_eq!(count(&evaluator, &OperationKind::TargetFromCamera), 1);
            assert_eq!(evaluator.operations().count(), 6);
        }
    }

    #[test]
    fn test_cycle_is_reported() {
        let mut graph = Graph::new("cycle");
        let lock = graph.add_node(RequireLockNode::new());
        let overlay = graph.add_node(EditorRenderNode);
        let other = graph.add_node(EditorRenderNode);
        link(&mut graph, overlay, 0, lock, 0);
        link(&mut graph, other, 0, lock, 1);
        link(&mut graph, lock, 0, overlay, 0);
        graph.set_terminal_node(lock).unwrap();

        let result = PipelineEvaluator::new().evaluate_graph(&mut graph);
        assert_eq!(result, Err(CompileError::CyclicDependency { node: lock }));
    }

    #[test]
    fn test_unsupported_conversion() {
        let mut graph = Graph::new("conversion");
        let target = graph.add_node(Provider::Target);
        let convert = graph.add_node(ConvertNode::new(
            PinType::scalar(types::TARGET),
            PinType::scalar(types::TARGET),
        ));
        let screen = graph.add_node(ScreenNode);
        link(&mut graph, target, 0, convert, 0);
        link(&mut graph, convert, 0, screen, 0);
        graph.set_terminal_node(screen).unwrap();

        let result = PipelineEvaluator::new().evaluate_graph(&mut graph);
        assert!(matches!(
            result,
            Err(CompileError::UnsupportedConversion { node, .. }) if node == convert
        ));
    }

    #[test]
    fn test_single_use() {
        let mut graph = Graph::new("single use");
        let target = graph.add_node(Provider::Target);
        let screen = graph.add_node(ScreenNode);
        link(&mut graph, target, 0, screen, 0);
        graph.set_terminal_node(screen).unwrap();

        let mut evaluator = PipelineEvaluator::new();
        assert_eq!(evaluator.evaluate_graph(&mut graph).unwrap().len(), 2);
        assert_eq!(evaluator.extract(), Err(CompileError::AlreadyCompiled));

        let mut sink = Pipeline::new();
        assert_eq!(
            evaluator.transfer_to_pipeline(&mut sink),
            Err(CompileError::AlreadyCompiled)
        );
        assert!(sink.is_empty());
    }

    #[test]
    fn test_no_terminal() {
        let mut graph = Graph::new("empty");
        graph.add_node(Provider::Target);
        assert_eq!(
            PipelineEvaluator::new().evaluate_graph(&mut graph),
            Err(CompileError::NoTerminalNode)
        );
    }
}
