use rustc_hash::{FxHashMap, FxHashSet};

use super::node::{DirectionalLight, NodeId, NodeKind, SceneNode};
use crate::options::LightingOptions;

/// Nodes added to and removed from the present set since the last
/// [`SceneGraph::take_delta`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SceneDelta {
    /// Newly present objects, in registration order.
    pub added: Vec<NodeId>,
    /// Objects no longer present, in removal order.
    pub removed: Vec<NodeId>,
}

impl SceneDelta {
    /// Whether nothing changed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

/// Handles to the nodes of [`SceneGraph::with_default_layout`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SceneLayout {
    /// Group the camera rotates.
    pub rotation_group: NodeId,
    /// Group holding models and surfaces, inside the rotation group.
    pub model_group: NodeId,
    /// Key light.
    pub light: NodeId,
}

/// Arena-backed ownership tree with present-set bookkeeping.
///
/// Every node has at most one parent and parents own their child lists,
/// so re-parenting is a move and cycles are rejected. A node is *present*
/// while it is connected to the root; present nodes are tracked in two flat
/// collections (objects and lights) plus an added/removed delta for the
/// renderer. Lights never appear in the delta.
#[derive(Debug)]
pub struct SceneGraph {
    nodes: FxHashMap<NodeId, SceneNode>,
    next_id: u32,
    root: NodeId,
    objects: Vec<NodeId>,
    object_set: FxHashSet<NodeId>,
    lights: Vec<NodeId>,
    added: Vec<NodeId>,
    removed: Vec<NodeId>,
    /// Bumped on every membership change.
    generation: u64,
}

impl Default for SceneGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl SceneGraph {
    /// Graph holding only the root group.
    #[must_use]
    pub fn new() -> Self {
        let root = NodeId(0);
        let mut nodes = FxHashMap::default();
        drop(nodes.insert(root, SceneNode::new(NodeKind::Group)));
        Self {
            nodes,
            next_id: 1,
            root,
            objects: Vec::new(),
            object_set: FxHashSet::default(),
            lights: Vec::new(),
            added: Vec::new(),
            removed: Vec::new(),
            generation: 0,
        }
    }

    /// Root, rotation group, model group and one directional light.
    #[must_use]
    pub fn with_default_layout(lighting: &LightingOptions) -> (Self, SceneLayout) {
        let mut graph = Self::new();
        let root = graph.root;
        let rotation_group = graph.spawn(NodeKind::Group);
        let model_group = graph.spawn(NodeKind::Group);
        let light = graph.spawn(NodeKind::Light(DirectionalLight::from_options(lighting)));
        let _ = graph.add(rotation_group, model_group);
        let _ = graph.add(root, rotation_group);
        let _ = graph.add(root, light);
        (
            graph,
            SceneLayout {
                rotation_group,
                model_group,
                light,
            },
        )
    }

    /// The root node.
    #[must_use]
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Membership generation.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    // -- Arena --

    /// Create a detached node.
    pub fn spawn(&mut self, kind: NodeKind) -> NodeId {
        let id = NodeId(self.next_id);
        self.next_id += 1;
        drop(self.nodes.insert(id, SceneNode::new(kind)));
        id
    }

    /// Node by id.
    #[must_use]
    pub fn get(&self, id: NodeId) -> Option<&SceneNode> {
        self.nodes.get(&id)
    }

    /// Node payload by id.
    #[must_use]
    pub fn kind(&self, id: NodeId) -> Option<&NodeKind> {
        self.nodes.get(&id).map(|n| &n.kind)
    }

    /// Number of nodes in the arena, root included.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Detach `id` and delete it together with its descendants. Any of them
    /// still registered as present, attached or not, are unregistered first.
    pub fn despawn(&mut self, id: NodeId) -> bool {
        if id == self.root || !self.nodes.contains_key(&id) {
            return false;
        }
        let _ = self.remove(id);
        self.remove_node(id);
        for node in self.subtree(id) {
            drop(self.nodes.remove(&node));
        }
        true
    }

    // -- Tree --

    /// Attach `child` under `parent`, moving it from any previous parent.
    ///
    /// Returns `false` for unknown nodes, for the root as child, and when
    /// the move would create a cycle. Re-adding under the same parent
    /// changes nothing.
    pub fn add(&mut self, parent: NodeId, child: NodeId) -> bool {
        if child == self.root
            || !self.nodes.contains_key(&parent)
            || !self.nodes.contains_key(&child)
            || self.is_ancestor(child, parent)
        {
            return false;
        }
        let old_parent = self.nodes.get(&child).and_then(|n| n.parent);
        if old_parent == Some(parent) {
            return true;
        }

        let was_connected = self.is_connected(child);
        if let Some(old) = old_parent {
            self.unlink(old, child);
        }
        if let Some(node) = self.nodes.get_mut(&child) {
            node.parent = Some(parent);
        }
        if let Some(node) = self.nodes.get_mut(&parent) {
            node.children.push(child);
        }

        match (was_connected, self.is_connected(child)) {
            (false, true) => self.add_node(child),
            (true, false) => self.remove_node(child),
            _ => {}
        }
        true
    }

    /// Detach `child` from its parent, unregistering its subtree. The node
    /// stays in the arena and can be re-added.
    pub fn remove(&mut self, child: NodeId) -> bool {
        let Some(parent) = self.nodes.get(&child).and_then(|n| n.parent) else {
            return false;
        };
        let was_connected = self.is_connected(child);
        self.unlink(parent, child);
        if let Some(node) = self.nodes.get_mut(&child) {
            node.parent = None;
        }
        if was_connected {
            self.remove_node(child);
        }
        true
    }

    /// Whether `id` is reachable from the root.
    #[must_use]
    pub fn is_connected(&self, id: NodeId) -> bool {
        let mut cursor = Some(id);
        while let Some(current) = cursor {
            if current == self.root {
                return true;
            }
            cursor = self.nodes.get(&current).and_then(|n| n.parent);
        }
        false
    }

    // -- Present set --

    /// Register `id` and its descendants as present. Already-present
    /// nodes are skipped.
    pub fn add_node(&mut self, id: NodeId) {
        for node in self.subtree(id) {
            if node == self.root {
                continue;
            }
            let Some(is_light) = self.nodes.get(&node).map(|n| n.kind.is_light()) else {
                continue;
            };
            if is_light {
                if !self.lights.contains(&node) {
                    self.lights.push(node);
                    self.generation += 1;
                }
            } else if self.object_set.insert(node) {
                self.objects.push(node);
                self.added.push(node);
                self.removed.retain(|&n| n != node);
                self.generation += 1;
            }
        }
    }

    /// Unregister `id` and its descendants. Absent nodes are skipped.
    pub fn remove_node(&mut self, id: NodeId) {
        for node in self.subtree(id) {
            if let Some(i) = self.lights.iter().position(|&n| n == node) {
                let _ = self.lights.remove(i);
                self.generation += 1;
            } else if self.object_set.remove(&node) {
                self.objects.retain(|&n| n != node);
                self.removed.push(node);
                self.added.retain(|&n| n != node);
                self.generation += 1;
            }
        }
    }

    /// Present non-light nodes, in registration order.
    #[must_use]
    pub fn objects(&self) -> &[NodeId] {
        &self.objects
    }

    /// Present lights, in registration order.
    #[must_use]
    pub fn lights(&self) -> &[NodeId] {
        &self.lights
    }

    /// Whether `id` is in either present collection.
    #[must_use]
    pub fn is_present(&self, id: NodeId) -> bool {
        self.object_set.contains(&id) || self.lights.contains(&id)
    }

    /// Hand the accumulated delta to the renderer and start a new one.
    pub fn take_delta(&mut self) -> SceneDelta {
        SceneDelta {
            added: std::mem::take(&mut self.added),
            removed: std::mem::take(&mut self.removed),
        }
    }

    /// Peek at the pending delta.
    #[must_use]
    pub fn pending_delta(&self) -> SceneDelta {
        SceneDelta {
            added: self.added.clone(),
            removed: self.removed.clone(),
        }
    }

    // -- Helpers --

    fn unlink(&mut self, parent: NodeId, child: NodeId) {
        if let Some(node) = self.nodes.get_mut(&parent) {
            node.children.retain(|&c| c != child);
        }
    }

    /// Whether `ancestor` is `id` or one of its ancestors.
    fn is_ancestor(&self, ancestor: NodeId, id: NodeId) -> bool {
        let mut cursor = Some(id);
        while let Some(current) = cursor {
            if current == ancestor {
                return true;
            }
            cursor = self.nodes.get(&current).and_then(|n| n.parent);
        }
        false
    }

    /// `id` and its descendants in preorder.
    fn subtree(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            let Some(node) = self.nodes.get(&current) else {
                continue;
            };
            out.push(current);
            stack.extend(node.children.iter().rev().copied());
        }
        out
    }
}
