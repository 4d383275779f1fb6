use std::fmt;
use std::sync::Arc;

use glam::Vec3;
use serde::Serialize;

use crate::options::LightingOptions;
use crate::surface::{Material, SurfaceGeometry, SurfaceId};

/// Stable handle to a node in a [`SceneGraph`](super::SceneGraph).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize,
)]
pub struct NodeId(pub(crate) u32);

impl NodeId {
    /// The raw id.
    #[must_use]
    pub fn raw(self) -> u32 {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node #{}", self.0)
    }
}

/// Directional light.
#[derive(Debug, Clone, PartialEq)]
pub struct DirectionalLight {
    /// Unit direction the light shines from.
    pub direction: Vec3,
    /// RGB color.
    pub color: [f32; 3],
    /// Scalar intensity.
    pub intensity: f32,
}

impl DirectionalLight {
    /// Build a light from lighting options; a zero direction falls back
    /// to +Z.
    #[must_use]
    pub fn from_options(options: &LightingOptions) -> Self {
        Self {
            direction: Vec3::from_array(options.direction)
                .try_normalize()
                .unwrap_or(Vec3::Z),
            color: options.color,
            intensity: options.intensity,
        }
    }
}

/// A displayed snapshot of one surface.
#[derive(Debug, Clone)]
pub struct SurfaceMesh {
    /// Surface the snapshot was taken from.
    pub surface: SurfaceId,
    /// Geometry at snapshot time, normals refreshed.
    pub geometry: Arc<SurfaceGeometry>,
    /// Material at snapshot time.
    pub material: Material,
}

/// What a node is.
#[derive(Debug, Clone)]
pub enum NodeKind {
    /// Pure transform/grouping node.
    Group,
    /// Renderable surface mesh.
    Mesh(SurfaceMesh),
    /// Light source.
    Light(DirectionalLight),
}

impl NodeKind {
    /// Whether the node belongs in the light collection rather than the
    /// object collection.
    #[must_use]
    pub fn is_light(&self) -> bool {
        matches!(self, Self::Light(_))
    }
}

/// Arena entry: the node's payload and its place in the tree.
#[derive(Debug, Clone)]
pub struct SceneNode {
    /// Payload.
    pub kind: NodeKind,
    pub(crate) parent: Option<NodeId>,
    pub(crate) children: Vec<NodeId>,
}

impl SceneNode {
    pub(crate) fn new(kind: NodeKind) -> Self {
        Self {
            kind,
            parent: None,
            children: Vec::new(),
        }
    }

    /// Owning parent, if attached.
    #[must_use]
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// Owned children in insertion order.
    #[must_use]
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }
}
