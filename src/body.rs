use std::sync::Arc;

use crate::config::{BodyConfig, RingConfig, RING_SEGMENTS, SPHERE_SEGMENTS};
use crate::texture::TextureImage;

/// Vertex layout shared by all body/ring meshes.
#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub uv: [f32; 2],
}

/// CPU-side indexed triangle mesh, uploaded once per mount.
#[derive(Debug, Clone)]
pub struct Mesh {
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
}

impl Mesh {
    pub fn index_count(&self) -> u32 {
        self.indices.len() as u32
    }
}

/// Shading parameters for a body or ring.
///
/// `texture` starts out `None` and is swapped in by the async loader as a
/// single property write; everything else is immutable after construction.
#[derive(Debug, Clone)]
pub struct Material {
    pub color: [f32; 3],
    pub emissive: [f32; 3],
    pub roughness: f32,
    pub metalness: f32,
    pub opacity: f32,
    /// Skip lighting entirely (used by the ring).
    pub unlit: bool,
    pub texture: Option<Arc<TextureImage>>,
}

impl Material {
    pub fn standard(color: [f32; 3], emissive: Option<[f32; 3]>) -> Self {
        Self {
            color,
            emissive: emissive.unwrap_or([0.0; 3]),
            roughness: 0.6,
            metalness: 0.1,
            opacity: 1.0,
            unlit: false,
            texture: None,
        }
    }

    pub fn unlit(color: [f32; 3], opacity: f32) -> Self {
        Self {
            color,
            emissive: [0.0; 3],
            roughness: 1.0,
            metalness: 0.0,
            opacity,
            unlit: true,
            texture: None,
        }
    }
}

/// Builds a UV sphere with `segments` subdivisions in both directions.
pub fn sphere_mesh(radius: f32, segments: u32) -> Mesh {
    let mut vertices = Vec::new();
    let mut indices = Vec::new();

    for row in 0..=segments {
        let v = row as f32 / segments as f32;
        let phi = v * std::f32::consts::PI;

        for col in 0..=segments {
            let u = col as f32 / segments as f32;
            let theta = u * std::f32::consts::TAU;

            let nx = phi.sin() * theta.cos();
            let ny = phi.cos();
            let nz = phi.sin() * theta.sin();

            vertices.push(Vertex {
                position: [nx * radius, ny * radius, nz * radius],
                normal: [nx, ny, nz],
                uv: [u, v],
            });
        }
    }

    let stride = segments + 1;
    for row in 0..segments {
        for col in 0..segments {
            let a = row * stride + col;
            let b = a + stride;

            indices.extend_from_slice(&[a, b, a + 1, a + 1, b, b + 1]);
        }
    }

    Mesh { vertices, indices }
}

/// Builds a flat annulus in the XZ plane, double-sided via disabled culling.
pub fn ring_mesh(inner_radius: f32, outer_radius: f32, segments: u32) -> Mesh {
    let mut vertices = Vec::new();
    let mut indices = Vec::new();

    for col in 0..=segments {
        let u = col as f32 / segments as f32;
        let theta = u * std::f32::consts::TAU;
        let (sin, cos) = theta.sin_cos();

        vertices.push(Vertex {
            position: [cos * inner_radius, 0.0, sin * inner_radius],
            normal: [0.0, 1.0, 0.0],
            uv: [u, 0.0],
        });
        vertices.push(Vertex {
            position: [cos * outer_radius, 0.0, sin * outer_radius],
            normal: [0.0, 1.0, 0.0],
            uv: [u, 1.0],
        });
    }

    for col in 0..segments {
        let a = col * 2;
        indices.extend_from_slice(&[a, a + 1, a + 2, a + 2, a + 1, a + 3]);
    }

    Mesh { vertices, indices }
}

/// Geometry + material for one orbiting body, built from its config entry.
pub fn body_mesh_and_material(config: &BodyConfig) -> (Mesh, Material) {
    (
        sphere_mesh(config.radius, SPHERE_SEGMENTS),
        Material::standard(config.color, config.emissive),
    )
}

/// Geometry + material for the planetary ring.
pub fn ring_mesh_and_material(config: &RingConfig) -> (Mesh, Material) {
    (
        ring_mesh(config.inner_radius, config.outer_radius, RING_SEGMENTS),
        Material::unlit(config.color, config.opacity),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sphere_vertex_and_index_counts() {
        let mesh = sphere_mesh(1.0, 8);
        assert_eq!(mesh.vertices.len(), 9 * 9);
        assert_eq!(mesh.indices.len(), 8 * 8 * 6);
    }

    #[test]
    fn sphere_vertices_lie_on_the_sphere() {
        let mesh = sphere_mesh(3.2, 16);
        for vertex in &mesh.vertices {
            let [x, y, z] = vertex.position;
            let r = (x * x + y * y + z * z).sqrt();
            assert!((r - 3.2).abs() < 1e-4, "vertex radius {} off sphere", r);
        }
    }

    #[test]
    fn sphere_normals_are_unit_length() {
        let mesh = sphere_mesh(2.0, 12);
        for vertex in &mesh.vertices {
            let [x, y, z] = vertex.normal;
            let len = (x * x + y * y + z * z).sqrt();
            assert!((len - 1.0).abs() < 1e-4);
        }
    }

    #[test]
    fn sphere_indices_in_range() {
        let mesh = sphere_mesh(1.0, 6);
        let max = mesh.vertices.len() as u32;
        assert!(mesh.indices.iter().all(|&i| i < max));
    }

    #[test]
    fn ring_spans_inner_to_outer_radius() {
        let mesh = ring_mesh(4.0, 6.2, 64);
        for vertex in &mesh.vertices {
            let [x, _, z] = vertex.position;
            let r = (x * x + z * z).sqrt();
            assert!(r >= 4.0 - 1e-3 && r <= 6.2 + 1e-3, "ring radius {}", r);
        }
        assert_eq!(mesh.indices.len(), 64 * 6);
    }

    #[test]
    fn standard_material_defaults() {
        let mat = Material::standard([0.1, 0.2, 0.3], None);
        assert_eq!(mat.roughness, 0.6);
        assert_eq!(mat.metalness, 0.1);
        assert_eq!(mat.opacity, 1.0);
        assert!(!mat.unlit);
        assert!(mat.texture.is_none());
    }

    #[test]
    fn unlit_material_carries_opacity() {
        let mat = Material::unlit([1.0, 1.0, 1.0], 0.4);
        assert!(mat.unlit);
        assert_eq!(mat.opacity, 0.4);
    }
}
