use glam::{Mat4, Vec3};
use rand::Rng;

use crate::body::{self, Material, Mesh};
use crate::config::BackdropConfig;
use crate::starfield::generate_star_positions;
use crate::texture::{PendingTexture, TextureLoader, TexturePoll};

/// Index into the scene's node arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

/// What a node contributes visually. Transforms live on the node itself.
pub enum NodeKind {
    /// Invisible transform node (orbit pivots, the root).
    Group,
    AmbientLight {
        color: [f32; 3],
        intensity: f32,
    },
    PointLight {
        color: [f32; 3],
        intensity: f32,
    },
    /// The immutable point cloud; positions are generated exactly once.
    StarField {
        positions: Vec<f32>,
        color: [f32; 3],
    },
    /// A body or ring: indexed triangle mesh plus material.
    Mesh {
        mesh: Mesh,
        material: Material,
    },
}

/// A transform with owned children. Nodes are owned by the arena; the tree
/// shape is edges between ids, torn down with the scene as a whole.
pub struct SceneNode {
    pub position: Vec3,
    /// Euler rotation (radians), applied X then Y then Z.
    pub rotation: Vec3,
    pub kind: NodeKind,
    children: Vec<NodeId>,
    parent: Option<NodeId>,
}

impl SceneNode {
    fn new(kind: NodeKind) -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Vec3::ZERO,
            kind,
            children: Vec::new(),
            parent: None,
        }
    }
}

/// A pivot registered for per-tick rotation, tagged at construction so the
/// frame loop never walks the tree probing node kinds.
pub struct Rotatable {
    pub node: NodeId,
    /// Radians per tick about the vertical axis. Immutable.
    pub speed: f32,
}

/// The owned tree of all visual objects.
pub struct Scene {
    nodes: Vec<SceneNode>,
    root: NodeId,
    rotatables: Vec<Rotatable>,
    starfield: Option<NodeId>,
    starfield_speed: f32,
    pending_textures: Vec<(NodeId, PendingTexture)>,
}

impl Scene {
    pub fn new() -> Self {
        let root = SceneNode::new(NodeKind::Group);
        Self {
            nodes: vec![root],
            root: NodeId(0),
            rotatables: Vec::new(),
            starfield: None,
            starfield_speed: 0.0,
            pending_textures: Vec::new(),
        }
    }

    /// Builds the full backdrop scene: lights, star field, one pivot per
    /// body, and the ring. Texture loads are kicked off here and resolve
    /// out-of-band; construction itself never blocks or fails.
    pub fn build<R: Rng>(config: &BackdropConfig, rng: &mut R, loader: &TextureLoader) -> Self {
        let mut scene = Self::new();
        let root = scene.root;

        scene.add(
            root,
            SceneNode::new(NodeKind::AmbientLight {
                color: [1.0, 1.0, 1.0],
                intensity: config.ambient,
            }),
        );

        let mut key_light = SceneNode::new(NodeKind::PointLight {
            color: config.key_light_color,
            intensity: config.key_light_intensity,
        });
        key_light.position = Vec3::from_array(config.key_light_position);
        scene.add(root, key_light);

        let positions = generate_star_positions(
            rng,
            config.starfield.count,
            config.starfield.radius_min,
            config.starfield.radius_max,
        );
        let starfield = scene.add(
            root,
            SceneNode::new(NodeKind::StarField {
                positions,
                color: config.starfield.color,
            }),
        );
        scene.starfield = Some(starfield);
        scene.starfield_speed = config.starfield.rotation_speed;

        for body_config in &config.bodies {
            let (mesh, material) = body::body_mesh_and_material(body_config);
            let pending = body_config
                .texture
                .as_deref()
                .map(|name| loader.request(name));
            scene.attach_orbiting(
                mesh,
                material,
                body_config.distance,
                body_config.speed,
                body_config.tilt,
                pending,
            );
        }

        if let Some(ring_config) = &config.ring {
            let (mesh, material) = body::ring_mesh_and_material(ring_config);
            scene.attach_orbiting(
                mesh,
                material,
                ring_config.distance,
                ring_config.speed,
                ring_config.tilt,
                None,
            );
        }

        scene
    }

    /// Wraps a mesh in a fresh orbit pivot at the root. The pivot gets the
    /// rotation speed; the mesh gets the orbital distance and axial tilt.
    pub fn attach_orbiting(
        &mut self,
        mesh: Mesh,
        material: Material,
        distance: f32,
        speed: f32,
        tilt: f32,
        pending_texture: Option<PendingTexture>,
    ) -> NodeId {
        let pivot = self.add(self.root, SceneNode::new(NodeKind::Group));

        let mut node = SceneNode::new(NodeKind::Mesh { mesh, material });
        node.position.x = distance;
        node.rotation.x = tilt;
        let body = self.add(pivot, node);

        self.rotatables.push(Rotatable { node: pivot, speed });
        if let Some(pending) = pending_texture {
            self.pending_textures.push((body, pending));
        }

        body
    }

    pub fn add(&mut self, parent: NodeId, mut node: SceneNode) -> NodeId {
        let id = NodeId(self.nodes.len());
        node.parent = Some(parent);
        self.nodes.push(node);
        self.nodes[parent.0].children.push(id);
        id
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn node(&self, id: NodeId) -> &SceneNode {
        &self.nodes[id.0]
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut SceneNode {
        &mut self.nodes[id.0]
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id.0].children
    }

    pub fn rotatables(&self) -> &[Rotatable] {
        &self.rotatables
    }

    pub fn starfield(&self) -> Option<NodeId> {
        self.starfield
    }

    /// Advances every orbit pivot by its fixed speed and the star field by
    /// its own increment. Angles wrap naturally through the trigonometry in
    /// the transform, so they are left unbounded here.
    pub fn advance_rotations(&mut self) {
        for i in 0..self.rotatables.len() {
            let Rotatable { node, speed } = self.rotatables[i];
            self.nodes[node.0].rotation.y += speed;
        }
        if let Some(starfield) = self.starfield {
            self.nodes[starfield.0].rotation.y += self.starfield_speed;
        }
    }

    /// Drains completed texture loads. Applying a result is a single
    /// material property write, safe to interleave with rendering.
    pub fn poll_textures(&mut self) {
        let mut i = 0;
        while i < self.pending_textures.len() {
            let (node, pending) = &self.pending_textures[i];
            match pending.poll() {
                TexturePoll::Pending => {
                    i += 1;
                }
                TexturePoll::Loaded(image) => {
                    let node = *node;
                    if let NodeKind::Mesh { material, .. } = &mut self.nodes[node.0].kind {
                        material.texture = Some(image);
                    }
                    self.pending_textures.swap_remove(i);
                }
                TexturePoll::Unavailable => {
                    self.pending_textures.swap_remove(i);
                }
            }
        }
    }

    pub fn pending_texture_count(&self) -> usize {
        self.pending_textures.len()
    }

    /// Composes the world transform by walking up to the root.
    pub fn world_transform(&self, id: NodeId) -> Mat4 {
        let node = &self.nodes[id.0];
        let local = Mat4::from_translation(node.position)
            * Mat4::from_euler(
                glam::EulerRot::XYZ,
                node.rotation.x,
                node.rotation.y,
                node.rotation.z,
            );

        match node.parent {
            Some(parent) => self.world_transform(parent) * local,
            None => local,
        }
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn mesh_count(&self) -> usize {
        self.nodes
            .iter()
            .filter(|n| matches!(n.kind, NodeKind::Mesh { .. }))
            .count()
    }

    pub fn starfield_count(&self) -> usize {
        self.nodes
            .iter()
            .filter(|n| matches!(n.kind, NodeKind::StarField { .. }))
            .count()
    }

    /// Mesh nodes in insertion order, for the renderer.
    pub fn mesh_nodes(&self) -> impl Iterator<Item = (NodeId, &Mesh, &Material)> {
        self.nodes
            .iter()
            .enumerate()
            .filter_map(|(i, n)| match &n.kind {
                NodeKind::Mesh { mesh, material } => Some((NodeId(i), mesh, material)),
                _ => None,
            })
    }

    /// The key point light's world position, color and intensity.
    pub fn key_light(&self) -> Option<(Vec3, [f32; 3], f32)> {
        self.nodes.iter().enumerate().find_map(|(i, n)| match n.kind {
            NodeKind::PointLight { color, intensity } => {
                let world = self.world_transform(NodeId(i));
                Some((world.transform_point3(Vec3::ZERO), color, intensity))
            }
            _ => None,
        })
    }

    pub fn ambient_intensity(&self) -> f32 {
        self.nodes
            .iter()
            .find_map(|n| match n.kind {
                NodeKind::AmbientLight { intensity, .. } => Some(intensity),
                _ => None,
            })
            .unwrap_or(0.0)
    }
}

impl Default for Scene {
    fn default() -> Self {
        Self::new()
    }
}
