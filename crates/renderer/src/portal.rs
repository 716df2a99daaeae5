use std::f32::consts::TAU;

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec2};

use crate::clock::Tick;
use crate::compile::{ShaderProgram, PORTAL_PROGRAM};

/// Radius of the portal disc in world units.
pub const DISC_RADIUS: f32 = 2.0;
/// Number of radial segments the disc is tessellated into.
pub const DISC_SEGMENTS: u32 = 64;
/// Per-tick rotation applied in [`RotationMode::PerTick`] by default.
pub const DEFAULT_ROTATION_STEP: f32 = 0.001;

/// How the portal's spin advances between ticks.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RotationMode {
    /// Fixed angle per tick; spin speed follows the display refresh rate.
    PerTick { step: f32 },
    /// Angle proportional to the tick's wall-clock delta.
    WallClock { radians_per_second: f32 },
}

impl Default for RotationMode {
    fn default() -> Self {
        Self::PerTick {
            step: DEFAULT_ROTATION_STEP,
        }
    }
}

/// Uniform values the fragment program reads during one draw.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PortalUniformState {
    pub time: f32,
}

/// Spin of the portal around its facing axis.
///
/// The stored angle accumulates without wrapping; [`PortalTransform::display_rotation`]
/// folds it into `[0, 2π)`.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PortalTransform {
    pub rotation_z: f32,
}

impl PortalTransform {
    pub fn display_rotation(&self) -> f32 {
        self.rotation_z.rem_euclid(TAU)
    }

    pub fn model_matrix(&self) -> Mat4 {
        Mat4::from_rotation_z(self.rotation_z)
    }
}

/// One vertex of the disc mesh.
///
/// Layout: position(vec3) + uv(vec2) = 20 bytes.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct PortalVertex {
    pub position: [f32; 3],
    pub uv: [f32; 2],
}

impl PortalVertex {
    /// wgpu vertex buffer layout for `PortalVertex`.
    pub const LAYOUT: wgpu::VertexBufferLayout<'static> = wgpu::VertexBufferLayout {
        array_stride: std::mem::size_of::<PortalVertex>() as u64,
        step_mode: wgpu::VertexStepMode::Vertex,
        attributes: &[
            wgpu::VertexAttribute {
                format: wgpu::VertexFormat::Float32x3,
                offset: 0,
                shader_location: 0,
            },
            wgpu::VertexAttribute {
                format: wgpu::VertexFormat::Float32x2,
                offset: 12,
                shader_location: 1,
            },
        ],
    };
}

/// Flat disc in the XY plane, centred on the origin and facing +Z.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DiscGeometry {
    pub radius: f32,
    pub segments: u32,
}

impl Default for DiscGeometry {
    fn default() -> Self {
        Self {
            radius: DISC_RADIUS,
            segments: DISC_SEGMENTS,
        }
    }
}

impl DiscGeometry {
    /// Surface coordinate of a local-space point on the disc plane.
    pub fn uv_at(&self, x: f32, y: f32) -> Vec2 {
        Vec2::new(
            (x / self.radius + 1.0) * 0.5,
            (y / self.radius + 1.0) * 0.5,
        )
    }

    /// Triangle list (counter-clockwise, seen from +Z), three vertices per segment.
    pub fn vertices(&self) -> Vec<PortalVertex> {
        let segments = self.segments.max(3);
        let centre = PortalVertex {
            position: [0.0, 0.0, 0.0],
            uv: [0.5, 0.5],
        };
        let rim = |index: u32| {
            let theta = TAU * index as f32 / segments as f32;
            let x = self.radius * theta.cos();
            let y = self.radius * theta.sin();
            PortalVertex {
                position: [x, y, 0.0],
                uv: self.uv_at(x, y).to_array(),
            }
        };

        let mut vertices = Vec::with_capacity((segments * 3) as usize);
        for index in 0..segments {
            vertices.push(centre);
            vertices.push(rim(index));
            vertices.push(rim(index + 1));
        }
        vertices
    }
}

/// Per-draw state captured right after a tick's update.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PortalDraw {
    pub time: f32,
    pub model: Mat4,
}

/// The animated portal mesh: sole owner and writer of its uniforms and spin.
#[derive(Debug, Clone)]
pub struct Portal {
    uniforms: PortalUniformState,
    transform: PortalTransform,
    geometry: DiscGeometry,
    program: ShaderProgram,
    rotation: RotationMode,
}

impl Portal {
    pub fn new(rotation: RotationMode) -> Self {
        Self {
            uniforms: PortalUniformState::default(),
            transform: PortalTransform::default(),
            geometry: DiscGeometry::default(),
            program: PORTAL_PROGRAM,
            rotation,
        }
    }

    /// Applies one tick: uniform time follows the clock, spin advances once.
    pub fn update(&mut self, tick: Tick) {
        self.uniforms.time = tick.elapsed;
        self.transform.rotation_z += match self.rotation {
            RotationMode::PerTick { step } => step,
            RotationMode::WallClock { radians_per_second } => radians_per_second * tick.delta,
        };
    }

    pub fn draw(&self) -> PortalDraw {
        PortalDraw {
            time: self.uniforms.time,
            model: self.transform.model_matrix(),
        }
    }

    pub fn uniforms(&self) -> &PortalUniformState {
        &self.uniforms
    }

    pub fn transform(&self) -> &PortalTransform {
        &self.transform
    }

    pub fn geometry(&self) -> &DiscGeometry {
        &self.geometry
    }

    pub fn program(&self) -> &ShaderProgram {
        &self.program
    }

    pub fn rotation_mode(&self) -> RotationMode {
        self.rotation
    }
}

impl Default for Portal {
    fn default() -> Self {
        Self::new(RotationMode::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tick(index: u64, elapsed: f32, delta: f32) -> Tick {
        Tick {
            elapsed,
            delta,
            index,
        }
    }

    #[test]
    fn portal_vertex_is_20_bytes() {
        assert_eq!(std::mem::size_of::<PortalVertex>(), 20);
    }

    #[test]
    fn disc_has_three_vertices_per_segment_within_radius() {
        let geometry = DiscGeometry::default();
        let vertices = geometry.vertices();
        assert_eq!(vertices.len(), (DISC_SEGMENTS * 3) as usize);
        for vertex in &vertices {
            let [x, y, z] = vertex.position;
            assert_eq!(z, 0.0);
            assert!((x * x + y * y).sqrt() <= DISC_RADIUS + 1e-5);
            assert!(vertex.uv.iter().all(|c| (-1e-6..=1.0 + 1e-6).contains(c)));
        }
    }

    #[test]
    fn disc_triangles_wind_counter_clockwise() {
        let vertices = DiscGeometry::default().vertices();
        for triangle in vertices.chunks(3) {
            let [ax, ay, _] = triangle[0].position;
            let [bx, by, _] = triangle[1].position;
            let [cx, cy, _] = triangle[2].position;
            let cross = (bx - ax) * (cy - ay) - (by - ay) * (cx - ax);
            assert!(cross > 0.0);
        }
    }

    #[test]
    fn rotation_accumulates_exactly_per_tick() {
        let mut portal = Portal::default();
        let mut expected = 0.0_f32;
        let mut previous = portal.transform().rotation_z;
        for index in 0..1000 {
            portal.update(tick(index, index as f32 / 60.0, 1.0 / 60.0));
            expected += DEFAULT_ROTATION_STEP;
            let current = portal.transform().rotation_z;
            assert!(current > previous);
            assert_eq!(current, expected);
            previous = current;
        }
        assert!((portal.transform().rotation_z - 1000.0 * DEFAULT_ROTATION_STEP).abs() < 1e-4);
    }

    #[test]
    fn per_tick_rotation_ignores_refresh_rate() {
        let mut slow = Portal::default();
        let mut fast = Portal::default();
        for index in 0..10 {
            slow.update(tick(index, index as f32 / 30.0, 1.0 / 30.0));
            fast.update(tick(index, index as f32 / 144.0, 1.0 / 144.0));
        }
        assert_eq!(slow.transform(), fast.transform());
    }

    #[test]
    fn wall_clock_rotation_scales_with_delta() {
        let mut portal = Portal::new(RotationMode::WallClock {
            radians_per_second: 0.06,
        });
        portal.update(tick(0, 0.0, 0.0));
        portal.update(tick(1, 0.5, 0.5));
        portal.update(tick(2, 1.0, 0.5));
        assert!((portal.transform().rotation_z - 0.06).abs() < 1e-6);
    }

    #[test]
    fn uniform_time_tracks_the_latest_tick() {
        let mut portal = Portal::default();
        portal.update(tick(0, 1.0, 0.0));
        portal.update(tick(1, 2.5, 1.5));
        assert_eq!(portal.uniforms().time, 2.5);
        assert_eq!(portal.draw().time, 2.5);
    }

    #[test]
    fn display_rotation_wraps_while_storage_accumulates() {
        let transform = PortalTransform {
            rotation_z: TAU + 0.25,
        };
        assert!((transform.display_rotation() - 0.25).abs() < 1e-5);
        assert!(transform.rotation_z > TAU);
    }
}
