// SPDX-License-Identifier: MIT OR Apache-2.0
//! Link (edge) definitions for the graph.

use crate::pin::PinId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique identifier for a link, allocated by the owning graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LinkId(pub u32);

impl fmt::Display for LinkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "link#{}", self.0)
    }
}

/// A link from one output pin to one input pin
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    /// Unique link ID
    pub id: LinkId,
    /// Target input pin
    pub input: PinId,
    /// Source output pin
    pub output: PinId,
}

impl Link {
    /// Create a new link
    pub fn new(id: LinkId, input: PinId, output: PinId) -> Self {
        Self { id, input, output }
    }

    /// Check if this link touches a specific pin
    pub fn involves_pin(&self, pin: PinId) -> bool {
        self.input == pin || self.output == pin
    }
}
