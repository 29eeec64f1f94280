//! The graph layer: nodes, subgraph splicing and the topological walker.
//!
//! This module knows nothing about tasks. It only knows about `Node`s,
//! their ordering edges and an attached opaque payload, mirroring the
//! separation kept by the original implementation between its graph
//! package and its task layer.

mod node;
mod stack;
mod walker;

pub use node::{Kind, Node, Status};
pub use walker::Walker;

pub(crate) use node::{is_middle_type, middle_type};
