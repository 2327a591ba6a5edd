// SPDX-License-Identifier: MIT OR Apache-2.0
//! Saving and loading graphs as RON documents.
//!
//! Links are stored as pairs of pin ids. Loading rebuilds the input pins'
//! back-references from them without running any connect callback, so a
//! document loads exactly as it was saved or not at all.

use crate::graph::Graph;
use crate::link::LinkId;
use crate::node::NodeId;
use crate::pin::{PinId, PinType};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Current graph document format version
pub const GRAPH_FORMAT_VERSION: u32 = 1;

#[derive(Serialize)]
struct DocumentRef<'a> {
    version: u32,
    graph: &'a Graph,
}

#[derive(Deserialize)]
struct Document {
    version: u32,
    graph: Graph,
}

/// Serialize a graph to RON format
pub fn to_ron(graph: &Graph) -> Result<String, PersistError> {
    let document = DocumentRef {
        version: GRAPH_FORMAT_VERSION,
        graph,
    };
    Ok(ron::ser::to_string_pretty(&document, ron::ser::PrettyConfig::default())?)
}

/// Deserialize a graph from RON format and restore its links
pub fn from_ron(s: &str) -> Result<Graph, PersistError> {
    let Document { version, mut graph } = ron::from_str(s)?;
    if version > GRAPH_FORMAT_VERSION {
        return Err(PersistError::UnsupportedVersion {
            found: version,
            supported: GRAPH_FORMAT_VERSION,
        });
    }
    graph.restore_links()?;
    Ok(graph)
}

/// Save a graph to a file
pub fn save(graph: &Graph, path: &Path) -> Result<(), PersistError> {
    std::fs::write(path, to_ron(graph)?)?;
    tracing::debug!(graph = %graph.id, path = %path.display(), "Saved graph");
    Ok(())
}

/// Load a graph from a file
pub fn load(path: &Path) -> Result<Graph, PersistError> {
    let content = std::fs::read_to_string(path)?;
    let graph = from_ron(&content)?;
    tracing::debug!(graph = %graph.id, path = %path.display(), nodes = graph.node_count(), "Loaded graph");
    Ok(graph)
}

/// Error saving or loading a graph document
#[derive(Debug, thiserror::Error)]
pub enum PersistError {
    /// A link names a pin the document does not contain
    #[error("Link {link} refers to unknown pin {pin}")]
    UnknownPin {
        /// Offending link
        link: LinkId,
        /// Missing pin
        pin: PinId,
    },

    /// A link joins pins whose stored types differ
    #[error("Link {link} joins {output_type} to {input_type}")]
    InconsistentLink {
        /// Offending link
        link: LinkId,
        /// Stored output pin type
        output_type: PinType,
        /// Stored input pin type
        input_type: PinType,
    },

    /// Two links feed the same input pin
    #[error("Link {link} feeds already connected input {pin}")]
    DuplicateInput {
        /// Second link into the pin
        link: LinkId,
        /// Input pin
        pin: PinId,
    },

    /// An object is stored under a key other than its own id
    #[error("Entry {key} holds an object with id {id}")]
    MismatchedId {
        /// Table key
        key: u32,
        /// Id stored in the object
        id: u32,
    },

    /// Two objects share one id
    #[error("Id {0} is used more than once")]
    DuplicateId(u32),

    /// The id counter would hand out ids already in use
    #[error("Next id {next_id} does not exceed the largest id {max_id}")]
    StaleIdCounter {
        /// Stored counter
        next_id: u32,
        /// Largest id in the document
        max_id: u32,
    },

    /// A node lists a pin that is missing, belongs elsewhere or is listed twice
    #[error("Node {node} lists pin {pin} it does not own")]
    UnownedPin {
        /// Listing node
        node: NodeId,
        /// Listed pin
        pin: PinId,
    },

    /// A pin no node lists
    #[error("Pin {0} belongs to no node")]
    UnlistedPin(PinId),

    /// A node's pin lists do not match what its kind declares
    #[error(
        "{kind} node {node} has {inputs} inputs and {outputs} outputs, \
         expected {expected_inputs} and {expected_outputs}"
    )]
    PinCountMismatch {
        /// Offending node
        node: NodeId,
        /// Node kind label
        kind: &'static str,
        /// Stored input count
        inputs: usize,
        /// Stored output count
        outputs: usize,
        /// Inputs the kind declares
        expected_inputs: usize,
        /// Outputs the kind declares
        expected_outputs: usize,
    },

    /// The terminal node is not part of the document
    #[error("Terminal node {0} does not exist")]
    UnknownTerminal(NodeId),

    /// Document written by a newer version
    #[error("Graph format version {found} is newer than supported version {supported}")]
    UnsupportedVersion {
        /// Version in the document
        found: u32,
        /// Newest version this build reads
        supported: u32,
    },

    /// File could not be read or written
    #[error("Graph I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Document is not valid graph RON
    #[error("Invalid graph document: {0}")]
    Parse(#[from] ron::error::SpannedError),

    /// Graph could not be serialized
    #[error("Failed to serialize graph: {0}")]
    Serialize(#[from] ron::Error),
}
