//! Scene graph of groups, surface meshes and lights.
//!
//! Nodes live in an arena keyed by [`NodeId`]; parents own their child
//! lists. Attaching a subtree to the root registers every descendant in
//! the present set and the renderer delta, detaching it unregisters them.

mod graph;
mod node;

pub use graph::{SceneDelta, SceneGraph, SceneLayout};
pub use node::{DirectionalLight, NodeId, NodeKind, SceneNode, SurfaceMesh};
