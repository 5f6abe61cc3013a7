use std::f32::consts::{PI, TAU};

use bytemuck::{Pod, Zeroable};
use glam::{Vec2, Vec3};

use crate::material::MeshHandle;

/// Interleaved vertex consumed by the geometry pass and light volumes.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub uv: [f32; 2],
    pub tangent: [f32; 3],
}

impl Vertex {
    pub fn new(position: Vec3, normal: Vec3, uv: Vec2) -> Self {
        Self {
            position: position.into(),
            normal: normal.into(),
            uv: uv.into(),
            tangent: [0.0; 3],
        }
    }

    pub fn position(&self) -> Vec3 {
        Vec3::from(self.position)
    }

    pub fn normal(&self) -> Vec3 {
        Vec3::from(self.normal)
    }

    pub fn uv(&self) -> Vec2 {
        Vec2::from(self.uv)
    }
}

/// CPU-side mesh ready for upload: vertices plus a triangle list.
///
/// Front faces wind clockwise when viewed from outside, matching the
/// left-handed camera.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MeshData {
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
}

/// What the core keeps about an uploaded mesh.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MeshRef {
    pub handle: MeshHandle,
    pub index_count: u32,
    /// Smallest distance from the mesh origin to any face plane.
    pub inscribed_radius: f32,
    /// Largest distance from the mesh origin to any vertex.
    pub bounding_radius: f32,
}

impl MeshData {
    /// UV sphere of diameter one centred on the origin.
    pub fn sphere(slices: u32, stacks: u32) -> Self {
        let slices = slices.max(3);
        let stacks = stacks.max(2);
        let radius = 0.5;
        let columns = slices + 1;

        let mut vertices = Vec::with_capacity((columns * (stacks + 1)) as usize);
        for stack in 0..=stacks {
            let v = stack as f32 / stacks as f32;
            let theta = v * PI;
            for slice in 0..=slices {
                let u = slice as f32 / slices as f32;
                let phi = u * TAU;
                let normal = Vec3::new(theta.sin() * phi.cos(), theta.cos(), theta.sin() * phi.sin());
                vertices.push(Vertex::new(normal * radius, normal, Vec2::new(u, v)));
            }
        }

        let mut indices = Vec::with_capacity((slices * stacks * 6) as usize);
        for stack in 0..stacks {
            for slice in 0..slices {
                let i0 = stack * columns + slice;
                let i1 = i0 + 1;
                let i2 = i0 + columns;
                let i3 = i2 + 1;
                indices.extend_from_slice(&[i0, i1, i2, i1, i3, i2]);
            }
        }

        let mut mesh = Self { vertices, indices };
        mesh.finish();
        mesh
    }

    /// Axis-aligned cube with unit edges centred on the origin.
    pub fn cube() -> Self {
        let faces = [
            (Vec3::X, Vec3::Z, Vec3::NEG_Y),
            (Vec3::NEG_X, Vec3::NEG_Z, Vec3::NEG_Y),
            (Vec3::Y, Vec3::X, Vec3::NEG_Z),
            (Vec3::NEG_Y, Vec3::NEG_X, Vec3::NEG_Z),
            (Vec3::Z, Vec3::NEG_X, Vec3::NEG_Y),
            (Vec3::NEG_Z, Vec3::X, Vec3::NEG_Y),
        ];
        let mut vertices = Vec::with_capacity(24);
        let mut indices = Vec::with_capacity(36);
        for (normal, u_axis, v_axis) in faces {
            let base = vertices.len() as u32;
            for (u, v) in [(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0)] {
                let position = normal * 0.5 + u_axis * (u - 0.5) + v_axis * (v - 0.5);
                vertices.push(Vertex::new(position, normal, Vec2::new(u, v)));
            }
            indices.extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
        }
        let mut mesh = Self { vertices, indices };
        mesh.finish();
        mesh
    }

    pub fn index_count(&self) -> u32 {
        self.indices.len() as u32
    }

    /// Drops degenerate triangles, fixes winding and derives tangents.
    pub(crate) fn finish(&mut self) {
        self.orient_outward();
        self.compute_tangents();
    }

    /// Reorders each triangle so its face normal agrees with its vertex
    /// normals, and removes zero-area triangles.
    fn orient_outward(&mut self) {
        let mut oriented = Vec::with_capacity(self.indices.len());
        for triangle in self.indices.chunks_exact(3) {
            let [a, b, c] = [triangle[0], triangle[1], triangle[2]];
            let [pa, pb, pc] = [a, b, c].map(|i| self.vertices[i as usize].position());
            let face = (pb - pa).cross(pc - pa);
            if face.length_squared() <= f32::EPSILON * f32::EPSILON {
                continue;
            }
            let shading: Vec3 = [a, b, c]
                .iter()
                .map(|&i| self.vertices[i as usize].normal())
                .sum();
            if face.dot(shading) < 0.0 {
                oriented.extend_from_slice(&[a, c, b]);
            } else {
                oriented.extend_from_slice(&[a, b, c]);
            }
        }
        self.indices = oriented;
    }

    pub(crate) fn compute_tangents(&mut self) {
        let mut accum = vec![Vec3::ZERO; self.vertices.len()];
        for triangle in self.indices.chunks_exact(3) {
            let [i0, i1, i2] = [triangle[0], triangle[1], triangle[2]].map(|i| i as usize);
            let (v0, v1, v2) = (self.vertices[i0], self.vertices[i1], self.vertices[i2]);
            let e1 = v1.position() - v0.position();
            let e2 = v2.position() - v0.position();
            let d1 = v1.uv() - v0.uv();
            let d2 = v2.uv() - v0.uv();
            let det = d1.x * d2.y - d2.x * d1.y;
            if det.abs() <= f32::EPSILON {
                continue;
            }
            let tangent = (e1 * d2.y - e2 * d1.y) / det;
            accum[i0] += tangent;
            accum[i1] += tangent;
            accum[i2] += tangent;
        }

        for (vertex, tangent) in self.vertices.iter_mut().zip(accum) {
            let normal = vertex.normal().normalize_or_zero();
            let projected = (tangent - normal * normal.dot(tangent)).normalize_or_zero();
            let tangent = if projected == Vec3::ZERO && normal != Vec3::ZERO {
                normal.any_orthonormal_vector()
            } else {
                projected
            };
            vertex.tangent = tangent.into();
        }
    }

    /// Smallest origin-to-face-plane distance. For a convex mesh around the
    /// origin this is the radius of the largest sphere it fully contains.
    pub fn inscribed_radius(&self) -> f32 {
        self.indices
            .chunks_exact(3)
            .filter_map(|triangle| {
                let [a, b, c] = [triangle[0], triangle[1], triangle[2]]
                    .map(|i| self.vertices[i as usize].position());
                let normal = (b - a).cross(c - a).try_normalize()?;
                Some(normal.dot(a).abs())
            })
            .fold(None, |min: Option<f32>, d| Some(min.map_or(d, |m| m.min(d))))
            .unwrap_or(0.0)
    }

    pub fn bounding_radius(&self) -> f32 {
        self.vertices
            .iter()
            .map(|vertex| vertex.position().length())
            .fold(0.0, f32::max)
    }

    pub fn to_ref(&self, handle: MeshHandle) -> MeshRef {
        MeshRef {
            handle,
            index_count: self.index_count(),
            inscribed_radius: self.inscribed_radius(),
            bounding_radius: self.bounding_radius(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_outward(mesh: &MeshData) {
        for triangle in mesh.indices.chunks_exact(3) {
            let [a, b, c] = [triangle[0], triangle[1], triangle[2]]
                .map(|i| mesh.vertices[i as usize].position());
            let face = (b - a).cross(c - a);
            let centre = (a + b + c) / 3.0;
            assert!(face.dot(centre) > 0.0, "triangle {triangle:?} faces inward");
        }
    }

    #[test]
    fn cube_has_outward_winding_and_unit_tangents() {
        let cube = MeshData::cube();
        assert_eq!(cube.vertices.len(), 24);
        assert_eq!(cube.index_count(), 36);
        assert_outward(&cube);
        for vertex in &cube.vertices {
            let tangent = Vec3::from(vertex.tangent);
            assert!((tangent.length() - 1.0).abs() < 1e-5);
            assert!(tangent.dot(vertex.normal()).abs() < 1e-5);
        }
        assert!((cube.inscribed_radius() - 0.5).abs() < 1e-6);
    }

    #[test]
    fn sphere_drops_pole_degenerates_and_faces_outward() {
        let sphere = MeshData::sphere(24, 16);
        // 14 full bands of quads plus one triangle per slice at each pole.
        assert_eq!(sphere.index_count(), (24 * 14 * 2 + 24 * 2) * 3);
        assert_outward(&sphere);
        let inner = sphere.inscribed_radius();
        assert!(inner < 0.5 && inner > 0.45, "inscribed radius {inner}");
        assert!((sphere.bounding_radius() - 0.5).abs() < 1e-5);
    }

    #[test]
    fn every_vertex_has_a_tangent_even_at_poles() {
        let sphere = MeshData::sphere(8, 4);
        for vertex in &sphere.vertices {
            let tangent = Vec3::from(vertex.tangent);
            assert!((tangent.length() - 1.0).abs() < 1e-4);
        }
    }
}
