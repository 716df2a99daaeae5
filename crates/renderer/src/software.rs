//! CPU rendering path used for headless still export.
//!
//! Casts one ray per pixel through the orbit camera, intersects it with each
//! portal's disc plane, shades hits with [`crate::shader::shade_uv`] and blends
//! them the same way the GPU pipeline does (straight alpha over the target).
//! The result goes over black and then through the scene's post passes.

use std::path::Path;

use glam::{Vec2, Vec3, Vec4};

use crate::error::RenderError;
use crate::post::Frame;
use crate::scene::Scene;
use crate::shader::shade_uv;

/// Largest width or height the CPU path accepts, matching the common GPU
/// `max_texture_dimension_2d` limit.
pub const MAX_SOFTWARE_DIMENSION: u32 = 16_384;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SoftwareRenderer {
    width: u32,
    height: u32,
}

impl SoftwareRenderer {
    pub fn new(width: u32, height: u32) -> Result<Self, RenderError> {
        if width == 0 || height == 0 {
            return Err(RenderError::EmptyFrame { width, height });
        }
        if width > MAX_SOFTWARE_DIMENSION || height > MAX_SOFTWARE_DIMENSION {
            return Err(RenderError::SurfaceTooLarge {
                width,
                height,
                max: MAX_SOFTWARE_DIMENSION,
            });
        }
        Ok(Self { width, height })
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Portal layer on a transparent target, before compositing and post passes.
    pub fn render_layer(&self, scene: &Scene) -> Frame {
        let mut camera = scene.camera().clone();
        camera.set_viewport(self.width, self.height);
        let inverse_view_projection = camera.view_projection().inverse();

        let portals: Vec<_> = scene
            .portals()
            .map(|portal| {
                let draw = portal.draw();
                (draw.time, draw.model.inverse(), *portal.geometry())
            })
            .collect();

        Frame::from_fn(self.width, self.height, |x, y| {
            let ndc = Vec2::new(
                (x as f32 + 0.5) / self.width as f32 * 2.0 - 1.0,
                1.0 - (y as f32 + 0.5) / self.height as f32 * 2.0,
            );
            let near = inverse_view_projection.project_point3(ndc.extend(0.0));
            let far = inverse_view_projection.project_point3(ndc.extend(1.0));

            let mut target = Vec4::ZERO;
            for (time, inverse_model, geometry) in &portals {
                let origin = inverse_model.transform_point3(near);
                let direction = inverse_model.transform_point3(far) - origin;
                let Some(hit) = intersect_disc_plane(origin, direction) else {
                    continue;
                };
                if hit.truncate().length() > geometry.radius {
                    continue;
                }
                let source = shade_uv(geometry.uv_at(hit.x, hit.y), *time);
                target = blend_over(source, target);
            }
            target
        })
    }

    /// Final image: portal layer over opaque black, then every post pass in order.
    pub fn render(&self, scene: &Scene) -> Frame {
        let layer = self.render_layer(scene);
        let black = Frame::filled(self.width, self.height, Vec4::new(0.0, 0.0, 0.0, 1.0));
        let composed = Frame::from_fn(self.width, self.height, |x, y| {
            blend_over(layer.get(x, y), black.get(x, y))
        });

        scene
            .passes()
            .iter()
            .fold(composed, |frame, pass| pass.apply(&frame))
    }
}

/// Straight-alpha "over": `src.rgb * src.a + dst.rgb * (1 - src.a)`.
fn blend_over(source: Vec4, destination: Vec4) -> Vec4 {
    let alpha = source.w;
    let rgb = source.truncate() * alpha + destination.truncate() * (1.0 - alpha);
    rgb.extend(alpha + destination.w * (1.0 - alpha))
}

/// Intersection with the local `z = 0` plane, only in front of the ray origin.
fn intersect_disc_plane(origin: Vec3, direction: Vec3) -> Option<Vec3> {
    if direction.z.abs() < f32::EPSILON {
        return None;
    }
    let t = -origin.z / direction.z;
    (t >= 0.0).then(|| origin + direction * t)
}

/// Writes `frame` as an 8-bit RGBA image; the format follows the extension.
pub fn export_png(frame: &Frame, path: &Path) -> Result<(), RenderError> {
    image::save_buffer(
        path,
        &frame.to_rgba8(),
        frame.width(),
        frame.height(),
        image::ColorType::Rgba8,
    )
    .map_err(|source| RenderError::Export {
        path: path.to_path_buf(),
        source,
    })?;
    tracing::info!(
        path = %path.display(),
        width = frame.width(),
        height = frame.height(),
        "wrote still frame"
    );
    Ok(())
}
