// src/scene/mod.rs
//! Hierarchical entity model.
//!
//! Entities live in arena storage keyed by generational ids; parent links are
//! non-owning back-references used only for traversal. The graph stays acyclic
//! by construction: attaching always detaches first, and attaching a node
//! under its own descendant is refused.
//!
//! World-space bounding volumes are recomputed lazily: mutating a transform,
//! swapping a mesh or reparenting marks the entity and all of its descendants
//! dirty, since a parent's change moves every descendant's world bounds.

pub mod bounds;
pub mod components;
pub mod transform;

use bitflags::bitflags;
use glam::Mat4;
use log::warn;

use crate::gpu::{MeshHandle, TextureHandle};

pub use bounds::{Aabb, WorldBounds};
pub use components::{Component, ComponentKind, Light, LightKind, LodRange};
pub use transform::Transform;

bitflags! {
    /// Per-entity rendering flags.
    #[derive(Copy, Clone, Debug, PartialEq, Eq)]
    pub struct NodeFlags: u32 {
        const VISIBLE = 1 << 0;
        const CAST_SHADOWS = 1 << 1;
        const RECEIVE_SHADOWS = 1 << 2;
        const FRUSTUM_CULL = 1 << 3;
    }
}

impl Default for NodeFlags {
    fn default() -> Self {
        NodeFlags::all()
    }
}

/// Stable generational id for an entity.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct NodeId {
    index: u32,
    generation: u32,
}

/// Pre-loaded geometry reference plus the metadata rendering needs.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Mesh {
    pub handle: MeshHandle,
    pub bounds: Aabb,
    pub triangles: u32,
}

/// Surface description consumed by the geometry and forward passes.
#[derive(Clone, Debug, PartialEq)]
pub struct Material {
    pub base_color: [f32; 4],
    pub metallic: f32,
    pub roughness: f32,
    pub emission: [f32; 3],
    pub transparent: bool,
    pub albedo_texture: Option<TextureHandle>,
    pub normal_texture: Option<TextureHandle>,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            base_color: [1.0, 1.0, 1.0, 1.0],
            metallic: 0.0,
            roughness: 0.8,
            emission: [0.0; 3],
            transparent: false,
            albedo_texture: None,
            normal_texture: None,
        }
    }
}

/// One entity. Transform/mesh mutation goes through [`Scene`] so bounds
/// invalidation cannot be forgotten.
#[derive(Debug)]
pub struct GameObject {
    pub name: String,
    pub flags: NodeFlags,
    /// Tie-break for the transparency sort.
    pub render_order: i32,
    transform: Transform,
    mesh: Option<Mesh>,
    material: Option<Material>,
    components: Vec<Component>,
    children: Vec<NodeId>,
    parent: Option<NodeId>,
    /// `None` means dirty.
    bounds: Option<WorldBounds>,
}

impl GameObject {
    fn new(name: String) -> Self {
        Self {
            name,
            flags: NodeFlags::default(),
            render_order: 0,
            transform: Transform::default(),
            mesh: None,
            material: None,
            components: Vec::new(),
            children: Vec::new(),
            parent: None,
            bounds: None,
        }
    }

    pub fn transform(&self) -> &Transform {
        &self.transform
    }

    pub fn mesh(&self) -> Option<&Mesh> {
        self.mesh.as_ref()
    }

    pub fn material(&self) -> Option<&Material> {
        self.material.as_ref()
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn component(&self, kind: ComponentKind) -> Option<&Component> {
        self.components.iter().find(|c| c.kind() == kind)
    }

    pub fn light(&self) -> Option<&Light> {
        self.component(ComponentKind::Light).and_then(Component::as_light)
    }

    pub fn lod_range(&self) -> Option<&LodRange> {
        self.component(ComponentKind::LodRange)
            .and_then(Component::as_lod_range)
    }
}

struct Slot {
    generation: u32,
    object: Option<GameObject>,
}

/// Arena-backed scene graph.
#[derive(Default)]
pub struct Scene {
    slots: Vec<Slot>,
    free: Vec<u32>,
    roots: Vec<NodeId>,
}

impl Scene {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new root entity.
    pub fn spawn(&mut self, name: impl Into<String>) -> NodeId {
        let object = GameObject::new(name.into());
        let id = match self.free.pop() {
            Some(index) => {
                let slot = &mut self.slots[index as usize];
                slot.object = Some(object);
                NodeId {
                    index,
                    generation: slot.generation,
                }
            }
            None => {
                let index = self.slots.len() as u32;
                self.slots.push(Slot {
                    generation: 0,
                    object: Some(object),
                });
                NodeId {
                    index,
                    generation: 0,
                }
            }
        };
        self.roots.push(id);
        id
    }

    /// Remove an entity and its entire subtree.
    pub fn despawn(&mut self, id: NodeId) {
        let Some(object) = self.get(id) else { return };
        let children = object.children.clone();
        for child in children {
            self.despawn_subtree(child);
        }
        match object_parent(self, id) {
            Some(parent) => {
                if let Some(p) = self.object_mut(parent) {
                    p.children.retain(|c| *c != id);
                }
            }
            None => self.roots.retain(|r| *r != id),
        }
        self.release_slot(id);
    }

    fn despawn_subtree(&mut self, id: NodeId) {
        let Some(object) = self.get(id) else { return };
        let children = object.children.clone();
        for child in children {
            self.despawn_subtree(child);
        }
        self.release_slot(id);
    }

    fn release_slot(&mut self, id: NodeId) {
        let slot = &mut self.slots[id.index as usize];
        if slot.generation == id.generation && slot.object.is_some() {
            slot.object = None;
            slot.generation += 1;
            self.free.push(id.index);
        }
    }

    pub fn get(&self, id: NodeId) -> Option<&GameObject> {
        let slot = self.slots.get(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        slot.object.as_ref()
    }

    fn object_mut(&mut self, id: NodeId) -> Option<&mut GameObject> {
        let slot = self.slots.get_mut(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        slot.object.as_mut()
    }

    /// Mutable access to flags, name, render order. Transform and mesh have
    /// dedicated setters that handle bounds invalidation.
    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut GameObject> {
        self.object_mut(id)
    }

    pub fn len(&self) -> usize {
        self.slots.iter().filter(|s| s.object.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn roots(&self) -> &[NodeId] {
        &self.roots
    }

    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &GameObject)> {
        self.slots.iter().enumerate().filter_map(|(index, slot)| {
            slot.object.as_ref().map(|object| {
                (
                    NodeId {
                        index: index as u32,
                        generation: slot.generation,
                    },
                    object,
                )
            })
        })
    }

    // --- mutation that invalidates bounds ---------------------------------

    /// Edit an entity's transform; dirties the entity and every descendant.
    pub fn update_transform(&mut self, id: NodeId, edit: impl FnOnce(&mut Transform)) {
        if let Some(object) = self.object_mut(id) {
            edit(&mut object.transform);
            self.mark_dirty(id);
        }
    }

    pub fn set_mesh(&mut self, id: NodeId, mesh: Option<Mesh>) {
        if let Some(object) = self.object_mut(id) {
            object.mesh = mesh;
            self.mark_dirty(id);
        }
    }

    pub fn set_material(&mut self, id: NodeId, material: Option<Material>) {
        if let Some(object) = self.object_mut(id) {
            object.material = material;
        }
    }

    /// Attach or replace a component of the same kind.
    pub fn set_component(&mut self, id: NodeId, component: Component) {
        if let Some(object) = self.object_mut(id) {
            let kind = component.kind();
            match object.components.iter_mut().find(|c| c.kind() == kind) {
                Some(existing) => *existing = component,
                None => object.components.push(component),
            }
        }
    }

    pub fn remove_component(&mut self, id: NodeId, kind: ComponentKind) {
        if let Some(object) = self.object_mut(id) {
            object.components.retain(|c| c.kind() != kind);
        }
    }

    /// Mark an entity and its whole subtree as needing bounds recomputation.
    pub fn mark_dirty(&mut self, id: NodeId) {
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            if let Some(object) = self.object_mut(current) {
                object.bounds = None;
                stack.extend_from_slice(&object.children);
            }
        }
    }

    // --- hierarchy --------------------------------------------------------

    /// Attach `child` under `parent`. Idempotent: re-adding an already
    /// attached child is a silent no-op. Attaching a node under its own
    /// descendant is refused (would create a cycle).
    pub fn add_child(&mut self, parent: NodeId, child: NodeId) {
        if parent == child || self.get(parent).is_none() || self.get(child).is_none() {
            return;
        }
        if object_parent(self, child) == Some(parent) {
            return;
        }
        if self.is_ancestor(child, parent) {
            warn!(
                "refusing to attach '{}' under its own descendant",
                self.get(child).map(|o| o.name.as_str()).unwrap_or("?")
            );
            return;
        }

        self.detach(child);
        if let Some(p) = self.object_mut(parent) {
            p.children.push(child);
        }
        if let Some(c) = self.object_mut(child) {
            c.parent = Some(parent);
        }
        self.mark_dirty(child);
    }

    /// Detach `child` from `parent`, making it a root. No-op when `child` is
    /// not currently a child of `parent`.
    pub fn remove_child(&mut self, parent: NodeId, child: NodeId) {
        if object_parent(self, child) != Some(parent) {
            return;
        }
        if let Some(p) = self.object_mut(parent) {
            p.children.retain(|c| *c != child);
        }
        if let Some(c) = self.object_mut(child) {
            c.parent = None;
        }
        self.roots.push(child);
        self.mark_dirty(child);
    }

    fn detach(&mut self, child: NodeId) {
        match object_parent(self, child) {
            Some(old_parent) => {
                if let Some(p) = self.object_mut(old_parent) {
                    p.children.retain(|c| *c != child);
                }
            }
            None => self.roots.retain(|r| *r != child),
        }
        if let Some(c) = self.object_mut(child) {
            c.parent = None;
        }
    }

    /// Is `ancestor` on `node`'s parent chain?
    pub fn is_ancestor(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut current = object_parent(self, node);
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = object_parent(self, id);
        }
        false
    }

    // --- world-space queries ----------------------------------------------

    /// Accumulated world matrix through the full parent chain.
    pub fn world_matrix(&self, id: NodeId) -> Mat4 {
        let mut matrix = match self.get(id) {
            Some(object) => object.transform.local_matrix(),
            None => return Mat4::IDENTITY,
        };
        let mut current = object_parent(self, id);
        while let Some(parent) = current {
            if let Some(object) = self.get(parent) {
                matrix = object.transform.local_matrix() * matrix;
                current = object.parent;
            } else {
                break;
            }
        }
        matrix
    }

    /// World bounding volume, recomputed lazily. Entities without a mesh use
    /// a unit cube.
    pub fn world_bounds(&mut self, id: NodeId) -> Option<WorldBounds> {
        if let Some(cached) = self.get(id).and_then(|o| o.bounds) {
            return Some(cached);
        }
        let local = match self.get(id) {
            Some(object) => object.mesh.map(|m| m.bounds).unwrap_or(Aabb::UNIT),
            None => return None,
        };
        let world = self.world_matrix(id);
        let bounds = WorldBounds::from_local(&local, &world);
        if let Some(object) = self.object_mut(id) {
            object.bounds = Some(bounds);
        }
        Some(bounds)
    }
}

fn object_parent(scene: &Scene, id: NodeId) -> Option<NodeId> {
    scene.get(id).and_then(|o| o.parent)
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    #[test]
    fn test_spawn_and_despawn() {
        let mut scene = Scene::new();
        let a = scene.spawn("a");
        assert_eq!(scene.len(), 1);
        scene.despawn(a);
        assert_eq!(scene.len(), 0);
        assert!(scene.get(a).is_none());
        // The recycled slot gets a fresh generation; the old id stays dead.
        let b = scene.spawn("b");
        assert!(scene.get(a).is_none());
        assert!(scene.get(b).is_some());
    }

    #[test]
    fn test_add_child_is_idempotent() {
        let mut scene = Scene::new();
        let parent = scene.spawn("parent");
        let child = scene.spawn("child");
        scene.add_child(parent, child);
        scene.add_child(parent, child);
        scene.add_child(parent, child);
        assert_eq!(scene.get(parent).unwrap().children(), &[child]);
        assert_eq!(scene.get(child).unwrap().parent(), Some(parent));
        assert!(!scene.roots().contains(&child));
    }

    #[test]
    fn test_reparent_moves_exactly_once() {
        let mut scene = Scene::new();
        let a = scene.spawn("a");
        let b = scene.spawn("b");
        let child = scene.spawn("child");
        scene.add_child(a, child);
        scene.add_child(b, child);
        assert!(scene.get(a).unwrap().children().is_empty());
        assert_eq!(scene.get(b).unwrap().children(), &[child]);
        assert_eq!(scene.get(child).unwrap().parent(), Some(b));
    }

    #[test]
    fn test_cycle_refused() {
        let mut scene = Scene::new();
        let a = scene.spawn("a");
        let b = scene.spawn("b");
        let c = scene.spawn("c");
        scene.add_child(a, b);
        scene.add_child(b, c);
        // a under c would close a cycle.
        scene.add_child(c, a);
        assert_eq!(scene.get(a).unwrap().parent(), None);
        assert!(scene.get(c).unwrap().children().is_empty());
    }

    #[test]
    fn test_world_bounds_through_three_levels() {
        let mut scene = Scene::new();
        let root = scene.spawn("root");
        let mid = scene.spawn("mid");
        let leaf = scene.spawn("leaf");
        scene.add_child(root, mid);
        scene.add_child(mid, leaf);
        scene.update_transform(root, |t| t.position = Vec3::new(10.0, 0.0, 0.0));
        scene.update_transform(mid, |t| t.scale = Vec3::splat(2.0));
        scene.update_transform(leaf, |t| t.position = Vec3::new(0.0, 3.0, 0.0));

        let bounds = scene.world_bounds(leaf).unwrap();
        let expected = scene
            .world_matrix(leaf)
            .transform_point3(Aabb::UNIT.center());
        assert!((bounds.center - expected).length() < 1e-4);
        // root(+10x), then mid scale 2 applied to leaf's +3y offset.
        assert!((bounds.center - Vec3::new(10.0, 6.0, 0.0)).length() < 1e-4);
    }

    #[test]
    fn test_ancestor_transform_invalidates_descendant_bounds() {
        let mut scene = Scene::new();
        let root = scene.spawn("root");
        let leaf = scene.spawn("leaf");
        scene.add_child(root, leaf);
        let before = scene.world_bounds(leaf).unwrap();
        scene.update_transform(root, |t| t.position = Vec3::new(0.0, 5.0, 0.0));
        let after = scene.world_bounds(leaf).unwrap();
        assert!((after.center - before.center - Vec3::new(0.0, 5.0, 0.0)).length() < 1e-4);
    }

    #[test]
    fn test_mesh_swap_invalidates_bounds() {
        let mut scene = Scene::new();
        let node = scene.spawn("node");
        let unit = scene.world_bounds(node).unwrap();
        scene.set_mesh(
            node,
            Some(Mesh {
                handle: crate::gpu::MeshHandle(1),
                bounds: Aabb::new(Vec3::splat(-2.0), Vec3::splat(2.0)),
                triangles: 12,
            }),
        );
        let bigger = scene.world_bounds(node).unwrap();
        assert!(bigger.radius > unit.radius);
    }

    #[test]
    fn test_component_table_one_per_kind() {
        let mut scene = Scene::new();
        let node = scene.spawn("lamp");
        scene.set_component(node, Component::Light(Light::point(5.0)));
        scene.set_component(
            node,
            Component::Light(Light::directional(Vec3::NEG_Y).with_intensity(3.0)),
        );
        let object = scene.get(node).unwrap();
        assert_eq!(object.light().unwrap().intensity, 3.0);
        assert_eq!(
            object
                .components
                .iter()
                .filter(|c| c.kind() == ComponentKind::Light)
                .count(),
            1
        );
    }

    #[test]
    fn test_randomized_reparenting_keeps_single_parent() {
        use rand::{Rng, SeedableRng};
        let mut rng = rand::rngs::StdRng::seed_from_u64(42);
        let mut scene = Scene::new();
        let nodes: Vec<NodeId> = (0..10).map(|i| scene.spawn(format!("n{}", i))).collect();

        for _ in 0..100 {
            let a = nodes[rng.gen_range(0..nodes.len())];
            let b = nodes[rng.gen_range(0..nodes.len())];
            if rng.gen_bool(0.7) {
                scene.add_child(a, b);
            } else {
                scene.remove_child(a, b);
            }

            // Invariant: every node is claimed as a child by at most one
            // parent, and that parent matches the node's back-reference.
            for &node in &nodes {
                let claims: Vec<NodeId> = nodes
                    .iter()
                    .copied()
                    .filter(|&p| scene.get(p).unwrap().children().contains(&node))
                    .collect();
                assert!(claims.len() <= 1, "node claimed by multiple parents");
                assert_eq!(scene.get(node).unwrap().parent(), claims.first().copied());
                let is_root = scene.roots().contains(&node);
                assert_eq!(is_root, claims.is_empty(), "root set inconsistent");
            }
        }
    }
}
