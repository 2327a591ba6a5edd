// SPDX-License-Identifier: MIT OR Apache-2.0
//! Pin definitions and the pin type tag.

use crate::node::NodeId;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Well-known pin base type names
pub mod types {
    /// Untyped pin, never connectable
    pub const NONE: &str = "None";

    /// Camera object (pipeline)
    pub const CAMERA: &str = "Camera";
    /// Lower level view/projection provider of a camera (pipeline)
    pub const EYE: &str = "Eye";
    /// Render target (pipeline)
    pub const TARGET: &str = "Target";
    /// Renderable entity (pipeline)
    pub const ENTITY: &str = "Entity";
    /// Ordering-only dependency (pipeline)
    pub const REQUIRE: &str = "Require";

    /// Scalar float (material)
    pub const FLOAT: &str = "float";
    /// 2D vector (material)
    pub const VEC2: &str = "vec2";
    /// 3D vector (material)
    pub const VEC3: &str = "vec3";
    /// 4D vector / color (material)
    pub const VEC4: &str = "vec4";
    /// 2D texture sampler (material)
    pub const TEXTURE_2D: &str = "texture2D";
}

/// Unique identifier for a pin, allocated by the owning graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PinId(pub u32);

impl fmt::Display for PinId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "pin#{}", self.0)
    }
}

/// Type tag of a pin: a base type name plus an array flag.
///
/// Two tags are compatible only when both parts are equal, so `Eye` and
/// `Eye[]` never connect without a node in between that converts them.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PinType {
    /// Base type name, e.g. `Eye`
    pub base: String,
    /// Whether the pin carries an array of `base`
    pub is_array: bool,
}

impl PinType {
    /// Create a scalar type
    pub fn scalar(base: impl Into<String>) -> Self {
        Self {
            base: base.into(),
            is_array: false,
        }
    }

    /// Create an array type
    pub fn array(base: impl Into<String>) -> Self {
        Self {
            base: base.into(),
            is_array: true,
        }
    }

    /// The untyped tag
    pub fn none() -> Self {
        Self::scalar(types::NONE)
    }

    /// Whether this is the untyped tag (in either array form)
    pub fn is_none(&self) -> bool {
        self.base == types::NONE
    }

    /// Array form of this type's base
    pub fn to_array(&self) -> Self {
        Self::array(self.base.clone())
    }

    /// Scalar form of this type's base
    pub fn element(&self) -> Self {
        Self::scalar(self.base.clone())
    }

    /// Same base, with the given array-ness
    pub fn with_array(&self, is_array: bool) -> Self {
        Self {
            base: self.base.clone(),
            is_array,
        }
    }

    /// Check if a link can join pins of these two types
    pub fn is_compatible(&self, other: &PinType) -> bool {
        self == other && !self.is_none()
    }
}

impl Default for PinType {
    fn default() -> Self {
        Self::none()
    }
}

impl fmt::Display for PinType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_array {
            write!(f, "{}[]", self.base)
        } else {
            f.write_str(&self.base)
        }
    }
}

/// Error parsing a textual pin type
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid pin type: {0:?}")]
pub struct ParsePinTypeError(pub String);

impl FromStr for PinType {
    type Err = ParsePinTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (base, is_array) = match s.strip_suffix("[]") {
            Some(base) => (base, true),
            None => (s, false),
        };

        if base.is_empty() || base.contains(['[', ']']) || base.contains(char::is_whitespace) {
            return Err(ParsePinTypeError(s.to_string()));
        }

        Ok(Self {
            base: base.to_string(),
            is_array,
        })
    }
}

/// Opaque handle issued by an evaluator for the result of a node.
///
/// The shader back end maps it to a generated identifier, the pipeline back
/// end to an index into its operation table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CompiledValue(pub usize);

impl CompiledValue {
    /// Raw handle value
    pub fn index(self) -> usize {
        self.0
    }
}

/// An input pin on a node
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputPin {
    /// Unique pin ID
    pub id: PinId,
    /// Owning node
    pub node: NodeId,
    /// Display name
    pub name: String,
    /// Type tag
    pub pin_type: PinType,
    /// Whether the owning node may be evaluated with this pin unconnected
    pub optional: bool,
    /// Output pin this input is linked to, rebuilt from links on load
    #[serde(skip)]
    pub(crate) connection: Option<PinId>,
}

impl InputPin {
    /// Create an unconnected input pin
    pub fn new(id: PinId, node: NodeId, name: impl Into<String>, pin_type: PinType) -> Self {
        Self {
            id,
            node,
            name: name.into(),
            pin_type,
            optional: false,
            connection: None,
        }
    }

    /// Output pin feeding this input, if any
    pub fn connection(&self) -> Option<PinId> {
        self.connection
    }

    /// Whether a link currently feeds this input
    pub fn is_connected(&self) -> bool {
        self.connection.is_some()
    }
}

/// An output pin on a node
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputPin {
    /// Unique pin ID
    pub id: PinId,
    /// Owning node
    pub node: NodeId,
    /// Display name
    pub name: String,
    /// Type tag
    pub pin_type: PinType,
    /// Value written by the last evaluation pass
    #[serde(skip)]
    pub(crate) value: Option<CompiledValue>,
}

impl OutputPin {
    /// Create an output pin with no compiled value
    pub fn new(id: PinId, node: NodeId, name: impl Into<String>, pin_type: PinType) -> Self {
        Self {
            id,
            node,
            name: name.into(),
            pin_type,
            value: None,
        }
    }

    /// Compiled value from the last evaluation pass
    pub fn value(&self) -> Option<CompiledValue> {
        self.value
    }
}

/// Declaration of a pin a node kind wants created
#[derive(Debug, Clone, PartialEq)]
pub struct PinSpec {
    /// Display name
    pub name: String,
    /// Initial type
    pub pin_type: PinType,
    /// Whether the pin is optional (inputs only)
    pub optional: bool,
}

impl PinSpec {
    /// Required pin
    pub fn new(name: impl Into<String>, pin_type: PinType) -> Self {
        Self {
            name: name.into(),
            pin_type,
            optional: false,
        }
    }

    /// Optional pin
    pub fn optional(name: impl Into<String>, pin_type: PinType) -> Self {
        Self {
            optional: true,
            ..Self::new(name, pin_type)
        }
    }
}
