// SPDX-License-Identifier: MIT OR Apache-2.0
//! Graph data structure owning nodes, pins and links.

use crate::evaluation::{InputSlot, NodeContext};
use crate::link::{Link, LinkId};
use crate::node::{Node, NodeId, NodeKind, NodePinTypes};
use crate::persist::PersistError;
use crate::pin::{CompiledValue, InputPin, OutputPin, PinId, PinSpec, PinType};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use uuid::Uuid;

/// Persistent identifier of a graph document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GraphId(pub Uuid);

impl GraphId {
    /// Generate a new random ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for GraphId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for GraphId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A render graph.
///
/// Owns every node, pin and link; everything else refers to them by id.
/// Nodes, pins and links draw their ids from one counter, so an id is never
/// handed out twice within a graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Graph {
    /// Graph ID
    pub id: GraphId,
    /// Graph name
    pub name: String,
    next_id: u32,
    terminal: Option<NodeId>,
    nodes: IndexMap<NodeId, Node>,
    input_pins: IndexMap<PinId, InputPin>,
    output_pins: IndexMap<PinId, OutputPin>,
    links: IndexMap<LinkId, Link>,
}

/// Kind state and pin types of a node before an edit
struct NodeSnapshot {
    id: NodeId,
    kind: NodeKind,
    pins: NodePinTypes,
}

impl Graph {
    /// Create a new empty graph
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: GraphId::new(),
            name: name.into(),
            next_id: 0,
            terminal: None,
            nodes: IndexMap::new(),
            input_pins: IndexMap::new(),
            output_pins: IndexMap::new(),
            links: IndexMap::new(),
        }
    }

    fn alloc_id(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// Add a node at the origin
    pub fn add_node(&mut self, kind: impl Into<NodeKind>) -> NodeId {
        self.add_node_at(kind, [0.0, 0.0])
    }

    /// Add a node, creating the pins its kind declares
    pub fn add_node_at(&mut self, kind: impl Into<NodeKind>, position: [f32; 2]) -> NodeId {
        let kind = kind.into();
        let id = NodeId(self.alloc_id());

        let inputs = kind
            .behavior()
            .input_specs()
            .into_iter()
            .map(|spec| self.create_input(id, spec))
            .collect();
        let outputs = kind
            .behavior()
            .output_specs()
            .into_iter()
            .map(|spec| self.create_output(id, spec))
            .collect();

        tracing::debug!(graph = %self.id, node = %id, kind = kind.label(), "Added node");
        self.nodes.insert(
            id,
            Node {
                id,
                kind,
                position,
                inputs,
                outputs,
                evaluated: false,
            },
        );
        id
    }

    fn create_input(&mut self, node: NodeId, spec: PinSpec) -> PinId {
        let id = PinId(self.alloc_id());
        let mut pin = InputPin::new(id, node, spec.name, spec.pin_type);
        pin.optional = spec.optional;
        self.input_pins.insert(id, pin);
        id
    }

    fn create_output(&mut self, node: NodeId, spec: PinSpec) -> PinId {
        let id = PinId(self.alloc_id());
        self.output_pins
            .insert(id, OutputPin::new(id, node, spec.name, spec.pin_type));
        id
    }

    /// Remove a node, its pins and every link touching them
    pub fn remove_node(&mut self, node_id: NodeId) -> Option<Node> {
        let node = self.nodes.shift_remove(&node_id)?;

        let pins: HashSet<PinId> = node.pins().collect();
        let stale: Vec<LinkId> = self
            .links
            .values()
            .filter(|link| pins.iter().any(|pin| link.involves_pin(*pin)))
            .map(|link| link.id)
            .collect();
        for link in stale {
            self.disconnect_link(link);
        }

        for pin in &node.inputs {
            self.input_pins.shift_remove(pin);
        }
        for pin in &node.outputs {
            self.output_pins.shift_remove(pin);
        }
        if self.terminal == Some(node_id) {
            self.terminal = None;
        }

        tracing::debug!(graph = %self.id, node = %node_id, "Removed node");
        Some(node)
    }

    /// Get a node by ID
    pub fn node(&self, node_id: NodeId) -> Option<&Node> {
        self.nodes.get(&node_id)
    }

    /// Get all nodes
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    /// Get the number of nodes
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Get an input pin by ID
    pub fn input_pin(&self, pin_id: PinId) -> Option<&InputPin> {
        self.input_pins.get(&pin_id)
    }

    /// Get an output pin by ID
    pub fn output_pin(&self, pin_id: PinId) -> Option<&OutputPin> {
        self.output_pins.get(&pin_id)
    }

    /// Get a link by ID
    pub fn link(&self, link_id: LinkId) -> Option<&Link> {
        self.links.get(&link_id)
    }

    /// Get all links
    pub fn links(&self) -> impl Iterator<Item = &Link> {
        self.links.values()
    }

    /// Get the number of links
    pub fn link_count(&self) -> usize {
        self.links.len()
    }

    /// Links fanning out of an output pin
    pub fn links_from(&self, output: PinId) -> impl Iterator<Item = &Link> {
        self.links.values().filter(move |link| link.output == output)
    }

    /// The link feeding an input pin, if any
    pub fn link_into(&self, input: PinId) -> Option<&Link> {
        self.links.values().find(|link| link.input == input)
    }

    /// Move a node in the editor
    pub fn set_node_position(&mut self, node_id: NodeId, position: [f32; 2]) -> Result<(), GraphError> {
        let node = self
            .nodes
            .get_mut(&node_id)
            .ok_or(GraphError::InvalidNode(node_id))?;
        node.position = position;
        Ok(())
    }

    /// Node evaluation starts from
    pub fn terminal_node(&self) -> Option<NodeId> {
        self.terminal
    }

    /// Choose the node evaluation starts from
    pub fn set_terminal_node(&mut self, node_id: NodeId) -> Result<(), GraphError> {
        if !self.nodes.contains_key(&node_id) {
            return Err(GraphError::InvalidNode(node_id));
        }
        self.terminal = Some(node_id);
        Ok(())
    }

    /// Forget the results of the previous evaluation pass
    pub fn reset_evaluated_flags(&mut self) {
        for node in self.nodes.values_mut() {
            node.evaluated = false;
        }
        for pin in self.output_pins.values_mut() {
            pin.value = None;
        }
    }

    /// Link an output pin to an input pin.
    ///
    /// Both nodes get a chance to retype their pins first. When the types
    /// still disagree the graph is left exactly as it was. On success any
    /// link already feeding `input` is replaced, and links on either node
    /// that the retyping made invalid are removed.
    pub fn connect(&mut self, output: PinId, input: PinId) -> Result<LinkId, GraphError> {
        let source = self
            .output_pins
            .get(&output)
            .ok_or(GraphError::InvalidPin(output))?
            .node;
        let target = self
            .input_pins
            .get(&input)
            .ok_or(GraphError::InvalidPin(input))?
            .node;

        let snapshots = [self.snapshot(source), self.snapshot(target)];

        let input_index = self.pin_index(target, input);
        let source_type = self.expect_output_pin(output).pin_type.clone();
        self.update_node(target, |kind, pins| {
            kind.behavior_mut().on_connect_to_input(pins, input_index, &source_type);
        });

        let output_index = self.pin_index(source, output);
        let target_type = self.expect_input_pin(input).pin_type.clone();
        self.update_node(source, |kind, pins| {
            kind.behavior_mut().on_connect_to_output(pins, output_index, &target_type);
        });

        let output_type = self.expect_output_pin(output).pin_type.clone();
        let input_type = self.expect_input_pin(input).pin_type.clone();
        if !output_type.is_compatible(&input_type) {
            for snapshot in snapshots.into_iter().rev() {
                self.restore(snapshot);
            }
            return Err(GraphError::TypeMismatch {
                output,
                input,
                output_type,
                input_type,
            });
        }

        if let Some(existing) = self.link_into(input).map(|link| link.id) {
            self.disconnect_link(existing);
        }

        let id = LinkId(self.alloc_id());
        self.links.insert(id, Link::new(id, input, output));
        if let Some(pin) = self.input_pins.get_mut(&input) {
            pin.connection = Some(output);
        }
        tracing::debug!(graph = %self.id, link = %id, %output, %input, pin_type = %input_type, "Connected");

        self.revalidate_links(&[source, target]);
        Ok(id)
    }

    /// Remove a link; unknown ids are ignored
    pub fn disconnect_link(&mut self, link_id: LinkId) -> Option<Link> {
        let link = self.links.shift_remove(&link_id)?;
        if let Some(pin) = self.input_pins.get_mut(&link.input) {
            if pin.connection == Some(link.output) {
                pin.connection = None;
            }
        }
        tracing::debug!(graph = %self.id, link = %link_id, "Disconnected");
        Some(link)
    }

    /// Set a Convert node's input type. Returns the links it invalidated.
    pub fn set_convert_from_type(&mut self, node_id: NodeId, from: PinType) -> Result<Vec<LinkId>, GraphError> {
        self.reconfigure(node_id, |kind, pins| match kind {
            NodeKind::Convert(convert) => {
                convert.set_from_type(pins, from);
                Ok(())
            }
            other => Err(GraphError::not_applicable(node_id, other, "a Convert")),
        })
    }

    /// Set a Convert node's output type. Returns the links it invalidated.
    pub fn set_convert_to_type(&mut self, node_id: NodeId, to: PinType) -> Result<Vec<LinkId>, GraphError> {
        self.reconfigure(node_id, |kind, pins| match kind {
            NodeKind::Convert(convert) => {
                convert.set_to_type(pins, to);
                Ok(())
            }
            other => Err(GraphError::not_applicable(node_id, other, "a Convert")),
        })
    }

    /// Set the index a Select node picks
    pub fn set_select_index(&mut self, node_id: NodeId, index: usize) -> Result<Vec<LinkId>, GraphError> {
        self.reconfigure(node_id, |kind, _| match kind {
            NodeKind::Select(select) => {
                select.set_index(index);
                Ok(())
            }
            other => Err(GraphError::not_applicable(node_id, other, "a Select")),
        })
    }

    /// Grow or shrink the inputs of a Concat or RequireLock node.
    /// Returns the links removed along with dropped pins.
    pub fn set_input_count(&mut self, node_id: NodeId, count: usize) -> Result<Vec<LinkId>, GraphError> {
        let node = self.nodes.get(&node_id).ok_or(GraphError::InvalidNode(node_id))?;
        let behavior = node.kind.behavior();
        let min = behavior
            .min_inputs()
            .ok_or_else(|| GraphError::not_applicable(node_id, &node.kind, "a variable-input"))?;
        if count < min {
            return Err(GraphError::InvalidConfiguration {
                node: node_id,
                reason: format!("{} needs at least {min} inputs, got {count}", behavior.label()),
            });
        }

        let current = node.inputs.len();
        let added: Vec<PinSpec> = (current..count)
            .filter_map(|index| behavior.input_spec_at(index))
            .collect();
        let dropped: Vec<PinId> = node.inputs.iter().skip(count).copied().collect();

        let mut removed = Vec::new();
        for pin in &dropped {
            if let Some(link) = self.link_into(*pin).map(|link| link.id) {
                self.disconnect_link(link);
                removed.push(link);
            }
            self.input_pins.shift_remove(pin);
        }
        let added: Vec<PinId> = added
            .into_iter()
            .map(|spec| self.create_input(node_id, spec))
            .collect();

        let node = self.expect_node_mut(node_id);
        node.inputs.truncate(count);
        node.inputs.extend(added);
        node.kind.behavior_mut().set_input_count(count);

        tracing::debug!(graph = %self.id, node = %node_id, count, "Resized inputs");
        Ok(removed)
    }

    fn reconfigure(
        &mut self,
        node_id: NodeId,
        configure: impl FnOnce(&mut NodeKind, &mut NodePinTypes) -> Result<(), GraphError>,
    ) -> Result<Vec<LinkId>, GraphError> {
        if !self.nodes.contains_key(&node_id) {
            return Err(GraphError::InvalidNode(node_id));
        }

        let mut pins = self.pin_types(node_id);
        configure(&mut self.expect_node_mut(node_id).kind, &mut pins)?;
        self.apply_pin_types(node_id, pins);
        Ok(self.revalidate_links(&[node_id]))
    }

    /// Remove links touching `node_ids` whose endpoint types stopped matching
    fn revalidate_links(&mut self, node_ids: &[NodeId]) -> Vec<LinkId> {
        let pins: HashSet<PinId> = node_ids
            .iter()
            .flat_map(|id| self.expect_node(*id).pins())
            .collect();
        let stale: Vec<LinkId> = self
            .links
            .values()
            .filter(|link| pins.iter().any(|pin| link.involves_pin(*pin)))
            .filter(|link| !self.link_types_match(link))
            .map(|link| link.id)
            .collect();

        for link in &stale {
            tracing::debug!(graph = %self.id, link = %link, "Link invalidated by retyping");
            self.disconnect_link(*link);
        }
        stale
    }

    fn link_types_match(&self, link: &Link) -> bool {
        let output = &self.expect_output_pin(link.output).pin_type;
        output.is_compatible(&self.expect_input_pin(link.input).pin_type)
    }

    fn pin_index(&self, node_id: NodeId, pin: PinId) -> usize {
        let node = self.expect_node(node_id);
        match node.pins().position(|p| p == pin) {
            Some(position) if position < node.inputs.len() => position,
            Some(position) => position - node.inputs.len(),
            None => panic!("{pin} is not listed on its owner {node_id}"),
        }
    }

    fn pin_types(&self, node_id: NodeId) -> NodePinTypes {
        let node = self.expect_node(node_id);
        NodePinTypes {
            inputs: node
                .inputs
                .iter()
                .map(|pin| self.expect_input_pin(*pin).pin_type.clone())
                .collect(),
            outputs: node
                .outputs
                .iter()
                .map(|pin| self.expect_output_pin(*pin).pin_type.clone())
                .collect(),
        }
    }

    fn apply_pin_types(&mut self, node_id: NodeId, pins: NodePinTypes) {
        let Some(node) = self.nodes.get(&node_id) else {
            return;
        };
        for (id, pin_type) in node.inputs.iter().zip(pins.inputs) {
            if let Some(pin) = self.input_pins.get_mut(id) {
                pin.pin_type = pin_type;
            }
        }
        for (id, pin_type) in node.outputs.iter().zip(pins.outputs) {
            if let Some(pin) = self.output_pins.get_mut(id) {
                pin.pin_type = pin_type;
            }
        }
    }

    fn update_node(&mut self, node_id: NodeId, update: impl FnOnce(&mut NodeKind, &mut NodePinTypes)) {
        let mut pins = self.pin_types(node_id);
        update(&mut self.expect_node_mut(node_id).kind, &mut pins);
        self.apply_pin_types(node_id, pins);
    }

    fn snapshot(&self, node_id: NodeId) -> NodeSnapshot {
        NodeSnapshot {
            id: node_id,
            kind: self.expect_node(node_id).kind.clone(),
            pins: self.pin_types(node_id),
        }
    }

    fn restore(&mut self, snapshot: NodeSnapshot) {
        self.expect_node_mut(snapshot.id).kind = snapshot.kind;
        self.apply_pin_types(snapshot.id, snapshot.pins);
    }

    pub(crate) fn expect_node(&self, node_id: NodeId) -> &Node {
        match self.nodes.get(&node_id) {
            Some(node) => node,
            None => panic!("{node_id} is not registered in graph {}", self.id),
        }
    }

    fn expect_node_mut(&mut self, node_id: NodeId) -> &mut Node {
        match self.nodes.get_mut(&node_id) {
            Some(node) => node,
            None => panic!("{node_id} is not registered in graph {}", self.id),
        }
    }

    pub(crate) fn expect_input_pin(&self, pin_id: PinId) -> &InputPin {
        match self.input_pins.get(&pin_id) {
            Some(pin) => pin,
            None => panic!("input {pin_id} is not registered in graph {}", self.id),
        }
    }

    pub(crate) fn expect_output_pin(&self, pin_id: PinId) -> &OutputPin {
        match self.output_pins.get(&pin_id) {
            Some(pin) => pin,
            None => panic!("output {pin_id} is not registered in graph {}", self.id),
        }
    }

    /// Inputs and output types of a node whose dependencies are evaluated
    pub(crate) fn node_context(&self, node_id: NodeId) -> NodeContext {
        let node = self.expect_node(node_id);
        let inputs = node
            .inputs
            .iter()
            .map(|pin_id| {
                let pin = self.expect_input_pin(*pin_id);
                InputSlot {
                    name: pin.name.clone(),
                    pin_type: pin.pin_type.clone(),
                    value: pin
                        .connection
                        .and_then(|output| self.expect_output_pin(output).value),
                }
            })
            .collect();
        let outputs = node
            .outputs
            .iter()
            .map(|pin| self.expect_output_pin(*pin).pin_type.clone())
            .collect();

        NodeContext {
            node: node_id,
            inputs,
            outputs,
        }
    }

    /// Record one compiled value per output pin and mark the node evaluated
    pub(crate) fn store_outputs(&mut self, node_id: NodeId, values: Vec<CompiledValue>) {
        let node = self.expect_node_mut(node_id);
        assert_eq!(
            values.len(),
            node.outputs.len(),
            "{} returned the wrong number of values",
            node.label()
        );
        node.evaluated = true;

        let outputs = node.outputs.clone();
        for (pin, value) in outputs.iter().zip(values) {
            if let Some(pin) = self.output_pins.get_mut(pin) {
                pin.value = Some(value);
            }
        }
    }

    /// Rebuild input back-references from the link table after loading.
    /// No connect callbacks run; types are taken as stored.
    pub(crate) fn restore_links(&mut self) -> Result<(), PersistError> {
        self.validate_ids()?;
        self.validate_node_pins()?;
        if let Some(terminal) = self.terminal {
            if !self.nodes.contains_key(&terminal) {
                return Err(PersistError::UnknownTerminal(terminal));
            }
        }

        for pin in self.input_pins.values_mut() {
            pin.connection = None;
        }

        for link in self.links.values() {
            let output = self
                .output_pins
                .get(&link.output)
                .ok_or(PersistError::UnknownPin {
                    link: link.id,
                    pin: link.output,
                })?;
            let input = self
                .input_pins
                .get_mut(&link.input)
                .ok_or(PersistError::UnknownPin {
                    link: link.id,
                    pin: link.input,
                })?;

            if !output.pin_type.is_compatible(&input.pin_type) {
                return Err(PersistError::InconsistentLink {
                    link: link.id,
                    output_type: output.pin_type.clone(),
                    input_type: input.pin_type.clone(),
                });
            }
            if input.connection.is_some() {
                return Err(PersistError::DuplicateInput {
                    link: link.id,
                    pin: link.input,
                });
            }
            input.connection = Some(link.output);
        }

        tracing::debug!(graph = %self.id, links = self.links.len(), "Restored links");
        Ok(())
    }

    /// Every id is stored under its own key, used once, and below the counter
    fn validate_ids(&self) -> Result<(), PersistError> {
        let ids = self
            .nodes
            .iter()
            .map(|(key, node)| (key.0, node.id.0))
            .chain(self.input_pins.iter().map(|(key, pin)| (key.0, pin.id.0)))
            .chain(self.output_pins.iter().map(|(key, pin)| (key.0, pin.id.0)))
            .chain(self.links.iter().map(|(key, link)| (key.0, link.id.0)));

        let mut seen = HashSet::new();
        for (key, id) in ids {
            if key != id {
                return Err(PersistError::MismatchedId { key, id });
            }
            if !seen.insert(id) {
                return Err(PersistError::DuplicateId(id));
            }
        }

        if let Some(&max_id) = seen.iter().max() {
            if self.next_id <= max_id {
                return Err(PersistError::StaleIdCounter {
                    next_id: self.next_id,
                    max_id,
                });
            }
        }
        Ok(())
    }

    /// Every node lists the pins its kind declares, each pin is owned by
    /// the node listing it, and no registered pin is left unlisted
    fn validate_node_pins(&self) -> Result<(), PersistError> {
        let mut listed = HashSet::new();
        for node in self.nodes.values() {
            for pin in &node.inputs {
                let owned = self
                    .input_pins
                    .get(pin)
                    .is_some_and(|input| input.node == node.id);
                if !owned || !listed.insert(*pin) {
                    return Err(PersistError::UnownedPin { node: node.id, pin: *pin });
                }
            }
            for pin in &node.outputs {
                let owned = self
                    .output_pins
                    .get(pin)
                    .is_some_and(|output| output.node == node.id);
                if !owned || !listed.insert(*pin) {
                    return Err(PersistError::UnownedPin { node: node.id, pin: *pin });
                }
            }

            let behavior = node.kind.behavior();
            let expected_inputs = behavior.input_specs().len();
            let expected_outputs = behavior.output_specs().len();
            if node.inputs.len() != expected_inputs || node.outputs.len() != expected_outputs {
                return Err(PersistError::PinCountMismatch {
                    node: node.id,
                    kind: behavior.label(),
                    inputs: node.inputs.len(),
                    outputs: node.outputs.len(),
                    expected_inputs,
                    expected_outputs,
                });
            }
        }

        let unlisted = self
            .input_pins
            .keys()
            .chain(self.output_pins.keys())
            .find(|pin| !listed.contains(*pin));
        match unlisted {
            Some(pin) => Err(PersistError::UnlistedPin(*pin)),
            None => Ok(()),
        }
    }
}

impl Default for Graph {
    fn default() -> Self {
        Self::new("Untitled")
    }
}

/// Error from editing a graph. The graph is unchanged when one is returned.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GraphError {
    /// Pin ID unknown for the role it was used in
    #[error("Invalid pin: {0}")]
    InvalidPin(PinId),

    /// Node ID unknown
    #[error("Invalid node: {0}")]
    InvalidNode(NodeId),

    /// Pin types still differ after type propagation
    #[error("Cannot connect {output} ({output_type}) to {input} ({input_type})")]
    TypeMismatch {
        /// Source output pin
        output: PinId,
        /// Target input pin
        input: PinId,
        /// Output type after propagation
        output_type: PinType,
        /// Input type after propagation
        input_type: PinType,
    },

    /// Setter does not apply to the node or the value is out of bounds
    #[error("Invalid configuration for {node}: {reason}")]
    InvalidConfiguration {
        /// Node being configured
        node: NodeId,
        /// What was wrong
        reason: String,
    },
}

impl GraphError {
    fn not_applicable(node: NodeId, kind: &NodeKind, expected: &str) -> Self {
        Self::InvalidConfiguration {
            node,
            reason: format!("{} is not {expected} node", kind.label()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nodes::{
        AddNode, ConcatNode, ConvertNode, Provider, RenderNode, RequireLockNode, ScreenNode,
        SelectNode,
    };
    use crate::pin::types;

    fn output(graph: &Graph, node: NodeId, index: usize) -> PinId {
        graph.node(node).unwrap().output(index).unwrap()
    }

    fn input(graph: &Graph, node: NodeId, index: usize) -> PinId {
        graph.node(node).unwrap().input(index).unwrap()
    }

    fn input_type(graph: &Graph, node: NodeId, index: usize) -> PinType {
        graph.input_pin(input(graph, node, index)).unwrap().pin_type.clone()
    }

    #[test]
    fn test_ids_never_repeat() {
        let mut graph = Graph::new("ids");
        let camera = graph.add_node(Provider::Camera);
        let screen = graph.add_node(ScreenNode);

        let mut ids = vec![camera.0, screen.0];
        ids.extend(graph.node(camera).unwrap().pins().map(|pin| pin.0));
        ids.extend(graph.node(screen).unwrap().pins().map(|pin| pin.0));

        graph.remove_node(camera);
        let target = graph.add_node(Provider::Target);
        let link = graph
            .connect(output(&graph, target, 0), input(&graph, screen, 0))
            .unwrap();
        ids.extend([target.0, link.0]);

        let unique: HashSet<u32> = ids.iter().copied().collect();
        assert_eq!(unique.len(), ids.len());
    }

    #[test]
    fn test_connect_unknown_pins() {
        let mut graph = Graph::new("pins");
        let camera = graph.add_node(Provider::Camera);
        let screen = graph.add_node(ScreenNode);
        let camera_out = output(&graph, camera, 0);
        let screen_in = input(&graph, screen, 0);

        // Roles swapped
        assert_eq!(
            graph.connect(screen_in, camera_out),
            Err(GraphError::InvalidPin(screen_in))
        );
        assert_eq!(
            graph.connect(camera_out, PinId(999)),
            Err(GraphError::InvalidPin(PinId(999)))
        );
        assert_eq!(graph.link_count(), 0);
    }

    #[test]
    fn test_type_mismatch_leaves_graph_unmodified() {
        let mut graph = Graph::new("mismatch");
        let camera = graph.add_node(Provider::Camera);
        let screen = graph.add_node(ScreenNode);

        let result = graph.connect(output(&graph, camera, 0), input(&graph, screen, 0));
        assert!(matches!(result, Err(GraphError::TypeMismatch { .. })));
        assert_eq!(graph.link_count(), 0);
        assert!(!graph.input_pin(input(&graph, screen, 0)).unwrap().is_connected());
    }

    #[test]
    fn test_failed_connect_keeps_links_and_modes() {
        let mut graph = Graph::new("rollback");
        let eye = ConvertNode::new(PinType::scalar(types::CAMERA), PinType::scalar(types::EYE));
        let eye_a = graph.add_node(eye.clone());
        let eye_b = graph.add_node(eye);
        let eyes = graph.add_node(ConcatNode::new(PinType::scalar(types::EYE)));
        let render = graph.add_node(RenderNode::new());
        graph.connect(output(&graph, eye_a, 0), input(&graph, eyes, 0)).unwrap();
        graph.connect(output(&graph, eye_b, 0), input(&graph, eyes, 1)).unwrap();
        let link = graph
            .connect(output(&graph, eye_a, 0), input(&graph, render, 1))
            .unwrap();

        // Eye[] into the Target pin switches nothing
        let result = graph.connect(output(&graph, eyes, 0), input(&graph, render, 2));
        assert!(matches!(result, Err(GraphError::TypeMismatch { .. })));

        let NodeKind::Render(node) = graph.node(render).unwrap().kind() else {
            panic!("expected render");
        };
        assert!(!node.is_array());
        assert_eq!(input_type(&graph, render, 1), PinType::scalar(types::EYE));
        assert_eq!(input_type(&graph, render, 2), PinType::scalar(types::TARGET));
        assert!(graph.link(link).is_some());
        assert_eq!(graph.link_count(), 3);
    }

    #[test]
    fn test_untyped_source_is_not_adopted() {
        let mut graph = Graph::new("untyped");
        let convert = graph.add_node(ConvertNode::untyped());
        let concat = graph.add_node(ConcatNode::new(PinType::scalar(types::TARGET)));

        // The Convert output takes the Concat element type instead
        graph.connect(output(&graph, convert, 0), input(&graph, concat, 0)).unwrap();
        assert_eq!(input_type(&graph, concat, 0), PinType::scalar(types::TARGET));
        assert_eq!(
            graph.output_pin(output(&graph, convert, 0)).unwrap().pin_type,
            PinType::scalar(types::TARGET)
        );
    }

    #[test]
    fn test_add_rejects_array_operands() {
        let mut graph = Graph::new("add");
        let floats = graph.add_node(ConcatNode::new(PinType::scalar(types::FLOAT)));
        let add = graph.add_node(AddNode::new());

        let result = graph.connect(output(&graph, floats, 0), input(&graph, add, 0));
        assert!(matches!(result, Err(GraphError::TypeMismatch { .. })));
        let NodeKind::Add(node) = graph.node(add).unwrap().kind() else {
            panic!("expected add");
        };
        assert!(node.pin_type().is_none());
        assert!(input_type(&graph, add, 1).is_none());
        assert_eq!(graph.link_count(), 0);
    }

    #[test]
    fn test_connect_replaces_existing_link() {
        let mut graph = Graph::new("replace");
        let first = graph.add_node(Provider::Target);
        let second = graph.add_node(Provider::EditorTarget);
        let screen = graph.add_node(ScreenNode);
        let screen_in = input(&graph, screen, 0);

        let old = graph.connect(output(&graph, first, 0), screen_in).unwrap();
        let new = graph.connect(output(&graph, second, 0), screen_in).unwrap();

        assert!(graph.link(old).is_none());
        assert_eq!(graph.link_into(screen_in).map(|link| link.id), Some(new));
        assert_eq!(
            graph.input_pin(screen_in).unwrap().connection(),
            Some(output(&graph, second, 0))
        );
    }

    #[test]
    fn test_disconnect_clears_back_reference() {
        let mut graph = Graph::new("disconnect");
        let target = graph.add_node(Provider::Target);
        let screen = graph.add_node(ScreenNode);
        let link = graph
            .connect(output(&graph, target, 0), input(&graph, screen, 0))
            .unwrap();

        assert!(graph.disconnect_link(link).is_some());
        assert!(graph.disconnect_link(link).is_none());
        assert!(!graph.input_pin(input(&graph, screen, 0)).unwrap().is_connected());
    }

    #[test]
    fn test_concat_retype_cascades() {
        let mut graph = Graph::new("cascade");
        let target_a = graph.add_node(Provider::Target);
        let target_b = graph.add_node(Provider::Target);
        let camera = graph.add_node(Provider::Camera);
        let concat = graph.add_node(ConcatNode::new(PinType::scalar(types::TARGET)));

        graph.connect(output(&graph, target_a, 0), input(&graph, concat, 0)).unwrap();
        let stale = graph
            .connect(output(&graph, target_b, 0), input(&graph, concat, 1))
            .unwrap();

        graph.connect(output(&graph, camera, 0), input(&graph, concat, 0)).unwrap();

        assert_eq!(graph.link_count(), 1);
        assert!(graph.link(stale).is_none());
        assert!(!graph.input_pin(input(&graph, concat, 1)).unwrap().is_connected());
        assert_eq!(input_type(&graph, concat, 1), PinType::scalar(types::CAMERA));
        assert_eq!(
            graph.output_pin(output(&graph, concat, 0)).unwrap().pin_type,
            PinType::array(types::CAMERA)
        );
        for link in graph.links() {
            assert!(graph.link_types_match(link));
        }
    }

    #[test]
    fn test_convert_setters_revalidate() {
        let mut graph = Graph::new("convert");
        let camera = graph.add_node(Provider::Camera);
        let convert = graph.add_node(ConvertNode::untyped());
        let screen = graph.add_node(ScreenNode);

        graph.connect(output(&graph, camera, 0), input(&graph, convert, 0)).unwrap();
        let to_screen = graph
            .connect(output(&graph, convert, 0), input(&graph, screen, 0))
            .unwrap();
        assert_eq!(input_type(&graph, convert, 0), PinType::scalar(types::CAMERA));

        let removed = graph
            .set_convert_to_type(convert, PinType::scalar(types::EYE))
            .unwrap();
        assert_eq!(removed, vec![to_screen]);
        assert_eq!(graph.link_count(), 1);

        let removed = graph
            .set_convert_from_type(convert, PinType::array(types::CAMERA))
            .unwrap();
        assert_eq!(removed.len(), 1);
        assert_eq!(
            graph.output_pin(output(&graph, convert, 0)).unwrap().pin_type,
            PinType::array(types::EYE)
        );

        assert!(matches!(
            graph.set_convert_to_type(screen, PinType::scalar(types::EYE)),
            Err(GraphError::InvalidConfiguration { .. })
        ));
    }

    #[test]
    fn test_render_switches_array_mode() {
        let mut graph = Graph::new("render");
        let target_a = graph.add_node(Provider::Target);
        let target_b = graph.add_node(Provider::Target);
        let concat = graph.add_node(ConcatNode::new(PinType::scalar(types::TARGET)));
        let render = graph.add_node(RenderNode::new());

        graph.connect(output(&graph, target_a, 0), input(&graph, concat, 0)).unwrap();
        graph.connect(output(&graph, target_b, 0), input(&graph, concat, 1)).unwrap();
        graph.connect(output(&graph, concat, 0), input(&graph, render, 2)).unwrap();

        assert_eq!(input_type(&graph, render, 1), PinType::array(types::EYE));
        assert_eq!(input_type(&graph, render, 2), PinType::array(types::TARGET));

        // Back to scalar mode drops the array link
        let single = graph.add_node(Provider::Target);
        graph.connect(output(&graph, single, 0), input(&graph, render, 2)).unwrap();
        assert_eq!(input_type(&graph, render, 1), PinType::scalar(types::EYE));
        assert!(graph.links_from(output(&graph, concat, 0)).next().is_none());
    }

    #[test]
    fn test_select_adopts_element_type() {
        let mut graph = Graph::new("select");
        let entities = graph.add_node(Provider::Entities);
        let select = graph.add_node(SelectNode::new(PinType::scalar(types::TARGET), 0));

        graph.connect(output(&graph, entities, 0), input(&graph, select, 0)).unwrap();
        assert_eq!(
            graph.output_pin(output(&graph, select, 0)).unwrap().pin_type,
            PinType::scalar(types::ENTITY)
        );

        graph.set_select_index(select, 3).unwrap();
        let NodeKind::Select(node) = graph.node(select).unwrap().kind() else {
            panic!("expected select");
        };
        assert_eq!(node.index(), 3);
    }

    #[test]
    fn test_remove_node_drops_links_and_terminal() {
        let mut graph = Graph::new("remove");
        let target = graph.add_node(Provider::Target);
        let screen = graph.add_node(ScreenNode);
        graph.connect(output(&graph, target, 0), input(&graph, screen, 0)).unwrap();
        graph.set_terminal_node(screen).unwrap();

        let screen_in = input(&graph, screen, 0);
        assert!(graph.remove_node(screen).is_some());
        assert_eq!(graph.link_count(), 0);
        assert_eq!(graph.terminal_node(), None);
        assert!(graph.input_pin(screen_in).is_none());
        assert_eq!(graph.set_terminal_node(screen), Err(GraphError::InvalidNode(screen)));
    }

    #[test]
    fn test_set_input_count() {
        let mut graph = Graph::new("inputs");
        let lock = graph.add_node(RequireLockNode::new());
        let render = graph.add_node(RenderNode::new());

        graph.set_input_count(lock, 3).unwrap();
        let third = input(&graph, lock, 2);
        assert_eq!(graph.input_pin(third).unwrap().name, "Require 3");

        let link = graph.connect(output(&graph, render, 0), third).unwrap();
        assert_eq!(graph.set_input_count(lock, 2).unwrap(), vec![link]);
        assert!(graph.input_pin(third).is_none());
        assert_eq!(graph.node(lock).unwrap().inputs().len(), 2);

        assert!(matches!(
            graph.set_input_count(lock, 1),
            Err(GraphError::InvalidConfiguration { .. })
        ));
        assert!(matches!(
            graph.set_input_count(render, 4),
            Err(GraphError::InvalidConfiguration { .. })
        ));
    }
}
