// SPDX-License-Identifier: MIT OR Apache-2.0
//! Node kinds.
//!
//! Pipeline kinds compile into runtime operations, material kinds into
//! program statements. Convert, Concat and Select are shared by both.

pub mod concat;
pub mod convert;
pub mod material;
pub mod output;
pub mod provider;
pub mod render;
pub mod require_lock;
pub mod select;

pub use concat::ConcatNode;
pub use convert::{ConversionFn, ConversionRegistry, ConvertNode};
pub use material::{AddNode, AttributeNode, PropertyNode, Sample2DNode, SamplerNode};
pub use output::{MaterialOutputNode, ScreenNode};
pub use provider::Provider;
pub use render::{EditorRenderNode, RenderNode};
pub use require_lock::RequireLockNode;
pub use select::SelectNode;
