use std::time::{Duration, Instant};

use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use tracing::{debug, warn};
use winit::dpi::PhysicalSize;

use crate::error::RenderError;
use crate::post::BloomParams;
use crate::scene::Scene;
use crate::types::Antialiasing;

use super::bloom::BloomChain;
use super::context::{GpuContext, SCENE_FORMAT};
use super::pipeline::PortalPipeline;
use super::uniforms::PortalUniforms;

/// Knobs for mounting the GPU backend on a host surface.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GpuOptions {
    pub antialiasing: Antialiasing,
}

/// What happened to one call of [`GpuState::render`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    Presented,
    /// The swapchain was outdated or timed out; nothing was drawn this tick.
    Skipped,
}

/// Offscreen colour target the portal draws into, resolved if multisampled.
struct SceneTarget {
    _texture: wgpu::Texture,
    view: wgpu::TextureView,
    msaa_view: Option<wgpu::TextureView>,
}

impl SceneTarget {
    fn new(device: &wgpu::Device, size: PhysicalSize<u32>, sample_count: u32) -> Self {
        let create = |label: &str, samples: u32, usage: wgpu::TextureUsages| {
            device.create_texture(&wgpu::TextureDescriptor {
                label: Some(label),
                size: wgpu::Extent3d {
                    width: size.width.max(1),
                    height: size.height.max(1),
                    depth_or_array_layers: 1,
                },
                mip_level_count: 1,
                sample_count: samples,
                dimension: wgpu::TextureDimension::D2,
                format: SCENE_FORMAT,
                usage,
                view_formats: &[],
            })
        };

        let texture = create(
            "scene target",
            1,
            wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
        );
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let msaa_view = (sample_count > 1).then(|| {
            create(
                "scene msaa target",
                sample_count,
                wgpu::TextureUsages::RENDER_ATTACHMENT,
            )
            .create_view(&wgpu::TextureViewDescriptor::default())
        });

        Self {
            _texture: texture,
            view,
            msaa_view,
        }
    }
}

/// Uniform buffer and bind group for one portal node.
struct PortalBinding {
    uniform_buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
}

/// GPU backend for a [`Scene`]: portal pass into an offscreen target, then the
/// bloom chain into the host's swapchain.
pub struct GpuState {
    context: GpuContext,
    portal_pipeline: PortalPipeline,
    portal_bindings: Vec<PortalBinding>,
    scene_target: SceneTarget,
    bloom: BloomChain,
    frame_count: u64,
    frames_since_stats: u32,
    last_stats: Instant,
}

impl GpuState {
    /// Mounts the renderer on any surface the host can hand out raw handles for.
    ///
    /// Fails without leaving anything behind if the adapter, device, surface or
    /// any shader cannot be created.
    pub fn new<T>(
        target: &T,
        size: (u32, u32),
        scene: &Scene,
        options: GpuOptions,
    ) -> Result<Self, RenderError>
    where
        T: HasDisplayHandle + HasWindowHandle,
    {
        let context = GpuContext::new(
            target,
            PhysicalSize::new(size.0, size.1),
            options.antialiasing,
        )?;

        let reference = scene.portals().next().cloned().unwrap_or_default();
        let portal_pipeline = PortalPipeline::new(
            &context.device,
            reference.program(),
            reference.geometry(),
            SCENE_FORMAT,
            context.sample_count,
        )?;

        let portal_bindings = scene
            .portals()
            .map(|_| create_portal_binding(&context.device, &portal_pipeline.uniform_layout))
            .collect();

        let scene_target = SceneTarget::new(&context.device, context.size, context.sample_count);

        if scene.passes().len() > 1 {
            warn!(
                passes = scene.passes().len(),
                "GPU backend runs the bloom pass only; other passes are CPU-only"
            );
        }
        let bloom_params = scene.bloom_params().unwrap_or(BloomParams {
            strength: 0.0,
            ..BloomParams::default()
        });
        let bloom = BloomChain::new(
            &context.device,
            &scene_target.view,
            context.size.width,
            context.size.height,
            context.surface_format,
            bloom_params,
        )?;
        bloom.update_uniforms(&context.queue);

        debug!(
            width = context.size.width,
            height = context.size.height,
            portals = scene.portals().count(),
            "GPU state ready"
        );

        Ok(Self {
            context,
            portal_pipeline,
            portal_bindings,
            scene_target,
            bloom,
            frame_count: 0,
            frames_since_stats: 0,
            last_stats: Instant::now(),
        })
    }

    pub fn size(&self) -> PhysicalSize<u32> {
        self.context.size
    }

    pub fn sample_count(&self) -> u32 {
        self.context.sample_count
    }

    pub fn resize(&mut self, new_size: PhysicalSize<u32>) {
        if new_size.width == 0 || new_size.height == 0 || new_size == self.context.size {
            return;
        }
        self.context.resize(new_size);
        let device = &self.context.device;
        self.scene_target = SceneTarget::new(device, new_size, self.context.sample_count);
        self.bloom.resize(
            device,
            &self.scene_target.view,
            new_size.width,
            new_size.height,
        );
        self.bloom.update_uniforms(&self.context.queue);
        debug!(width = new_size.width, height = new_size.height, "resized GPU targets");
    }

    /// Draws the scene as left by the latest tick and presents it.
    pub fn render(&mut self, scene: &Scene) -> Result<FrameOutcome, RenderError> {
        if self.context.is_device_lost() {
            return Err(RenderError::DeviceLost);
        }

        let frame = match self.context.surface.get_current_texture() {
            Ok(frame) => frame,
            Err(wgpu::SurfaceError::Outdated) => {
                debug!("surface outdated; reconfiguring");
                self.context.reconfigure();
                return Ok(FrameOutcome::Skipped);
            }
            Err(wgpu::SurfaceError::Timeout) => {
                warn!("timed out acquiring surface texture; skipping frame");
                return Ok(FrameOutcome::Skipped);
            }
            Err(wgpu::SurfaceError::Lost) => return Err(RenderError::SurfaceLost),
            Err(err) => return Err(RenderError::Surface(err.to_string())),
        };

        let state = scene.frame_state();
        for (binding, draw) in self.portal_bindings.iter().zip(&state.portals) {
            let uniforms = PortalUniforms::new(state.projection, state.view, draw);
            self.context
                .queue
                .write_buffer(&binding.uniform_buffer, 0, bytemuck::bytes_of(&uniforms));
        }

        let surface_view = frame
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        let mut encoder =
            self.context
                .device
                .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                    label: Some("portal frame encoder"),
                });

        self.encode_portals(&mut encoder, state.portals.len());
        self.bloom.render(&mut encoder, &surface_view);

        self.context.queue.submit(std::iter::once(encoder.finish()));
        frame.present();

        self.record_stats(scene);
        Ok(FrameOutcome::Presented)
    }

    fn encode_portals(&self, encoder: &mut wgpu::CommandEncoder, portal_count: usize) {
        let (view, resolve_target) = match &self.scene_target.msaa_view {
            Some(msaa) => (msaa, Some(&self.scene_target.view)),
            None => (&self.scene_target.view, None),
        };

        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("portal pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view,
                depth_slice: None,
                resolve_target,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
        });

        pass.set_pipeline(&self.portal_pipeline.pipeline);
        pass.set_vertex_buffer(0, self.portal_pipeline.vertex_buffer.slice(..));
        for binding in self.portal_bindings.iter().take(portal_count) {
            pass.set_bind_group(0, &binding.bind_group, &[]);
            pass.draw(0..self.portal_pipeline.vertex_count, 0..1);
        }
    }

    fn record_stats(&mut self, scene: &Scene) {
        self.frame_count += 1;
        self.frames_since_stats += 1;
        let now = Instant::now();
        let elapsed = now.saturating_duration_since(self.last_stats);
        if elapsed >= Duration::from_secs(1) {
            let fps = self.frames_since_stats as f32 / elapsed.as_secs_f32();
            debug!(
                fps = fps.round(),
                frame_count = self.frame_count,
                time = scene.portals().next().map(|portal| portal.uniforms().time),
                rotation = scene
                    .portals()
                    .next()
                    .map(|portal| portal.transform().display_rotation()),
                "render stats"
            );
            self.frames_since_stats = 0;
            self.last_stats = now;
        }
    }
}

fn create_portal_binding(device: &wgpu::Device, layout: &wgpu::BindGroupLayout) -> PortalBinding {
    let uniform_buffer = device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("portal uniforms"),
        size: std::mem::size_of::<PortalUniforms>() as u64,
        usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    });
    let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("portal uniforms"),
        layout,
        entries: &[wgpu::BindGroupEntry {
            binding: 0,
            resource: uniform_buffer.as_entire_binding(),
        }],
    });
    PortalBinding {
        uniform_buffer,
        bind_group,
    }
}
