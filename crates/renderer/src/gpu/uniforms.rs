use bytemuck::{Pod, Zeroable};
use glam::Mat4;

use crate::portal::PortalDraw;
use crate::post::{bloom_kernel_radius, BloomParams, BLOOM_SMOOTH_WIDTH};

/// std140 mirror of the `PortalParams` block in the portal GLSL.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub(crate) struct PortalUniforms {
    pub projection: [[f32; 4]; 4],
    pub view: [[f32; 4]; 4],
    pub model: [[f32; 4]; 4],
    pub time: f32,
    pub _padding: [f32; 3],
}

impl PortalUniforms {
    pub fn new(projection: Mat4, view: Mat4, draw: &PortalDraw) -> Self {
        Self {
            projection: projection.to_cols_array_2d(),
            view: view.to_cols_array_2d(),
            model: draw.model.to_cols_array_2d(),
            time: draw.time,
            _padding: [0.0; 3],
        }
    }
}

/// std140 mirror of the `BloomParams` block shared by every bloom shader.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub(crate) struct BloomUniforms {
    pub texel_size: [f32; 2],
    pub direction: [f32; 2],
    pub threshold: f32,
    pub smooth_width: f32,
    pub kernel_radius: f32,
    pub sigma: f32,
    pub strength: f32,
    pub radius: f32,
    pub _padding: [f32; 2],
}

impl BloomUniforms {
    fn base(params: &BloomParams, width: u32, height: u32) -> Self {
        Self {
            texel_size: [1.0 / width.max(1) as f32, 1.0 / height.max(1) as f32],
            direction: [0.0, 0.0],
            threshold: params.threshold,
            smooth_width: BLOOM_SMOOTH_WIDTH,
            kernel_radius: 0.0,
            sigma: 1.0,
            strength: params.strength,
            radius: params.radius,
            _padding: [0.0; 2],
        }
    }

    pub fn high_pass(params: &BloomParams, width: u32, height: u32) -> Self {
        Self::base(params, width, height)
    }

    /// Blur step for mip `level`; `width`/`height` are that level's size.
    pub fn blur(
        params: &BloomParams,
        level: usize,
        width: u32,
        height: u32,
        direction: [f32; 2],
    ) -> Self {
        let kernel = bloom_kernel_radius(level) as f32;
        Self {
            direction,
            kernel_radius: kernel,
            sigma: kernel,
            ..Self::base(params, width, height)
        }
    }

    pub fn composite(params: &BloomParams, width: u32, height: u32) -> Self {
        Self::base(params, width, height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn portal_uniforms_match_std140_block_size() {
        // three mat4 (192) + float padded to a vec4 (16)
        assert_eq!(std::mem::size_of::<PortalUniforms>(), 208);
        assert_eq!(std::mem::offset_of!(PortalUniforms, time), 192);
    }

    #[test]
    fn bloom_uniforms_match_std140_block_size() {
        assert_eq!(std::mem::size_of::<BloomUniforms>(), 48);
        assert_eq!(std::mem::offset_of!(BloomUniforms, threshold), 16);
        assert_eq!(std::mem::offset_of!(BloomUniforms, radius), 36);
    }

    #[test]
    fn blur_uniforms_use_the_level_kernel() {
        let uniforms = BloomUniforms::blur(&BloomParams::default(), 2, 100, 50, [0.0, 1.0]);
        assert_eq!(uniforms.kernel_radius, 7.0);
        assert_eq!(uniforms.sigma, 7.0);
        assert_eq!(uniforms.texel_size, [0.01, 0.02]);
        assert_eq!(uniforms.direction, [0.0, 1.0]);
    }

    #[test]
    fn portal_uniforms_carry_time_and_model() {
        let draw = PortalDraw {
            time: 3.5,
            model: Mat4::from_rotation_z(0.25),
        };
        let uniforms = PortalUniforms::new(Mat4::IDENTITY, Mat4::IDENTITY, &draw);
        assert_eq!(uniforms.time, 3.5);
        assert_eq!(uniforms.model, draw.model.to_cols_array_2d());
        assert_eq!(uniforms.projection, Mat4::IDENTITY.to_cols_array_2d());
    }
}
