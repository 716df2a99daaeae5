//! GPU bloom chain: high pass → five blurred mip levels → composite.
//!
//! Reads the offscreen scene texture and writes the final image into the
//! swapchain view handed to [`BloomChain::render`]. With strength zero the
//! composite degenerates to a plain copy, so the chain also serves scenes
//! without a bloom pass.

use crate::compile::{BLOOM_BLUR_PROGRAM, BLOOM_COMPOSITE_PROGRAM, BLOOM_HIGH_PASS_PROGRAM};
use crate::error::RenderError;
use crate::post::{bloom_level_size, BloomParams, BLOOM_LEVELS};

use super::context::SCENE_FORMAT;
use super::pipeline::fullscreen_pipeline;
use super::uniforms::BloomUniforms;

const HORIZONTAL: [f32; 2] = [1.0, 0.0];
const VERTICAL: [f32; 2] = [0.0, 1.0];

struct Target {
    _texture: wgpu::Texture,
    view: wgpu::TextureView,
    width: u32,
    height: u32,
}

/// One full-screen draw: pipeline, its inputs and where it writes.
struct Step {
    label: &'static str,
    uniform_buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
}

struct Level {
    horizontal: Target,
    vertical: Target,
    horizontal_step: Step,
    vertical_step: Step,
}

/// Size-dependent resources, rebuilt on resize.
struct ChainTargets {
    bright: Target,
    high_pass: Step,
    levels: Vec<Level>,
    composite: Step,
}

pub(crate) struct BloomChain {
    params: BloomParams,
    sampler: wgpu::Sampler,
    pass_layout: wgpu::BindGroupLayout,
    composite_layout: wgpu::BindGroupLayout,
    high_pass_pipeline: wgpu::RenderPipeline,
    blur_pipeline: wgpu::RenderPipeline,
    composite_pipeline: wgpu::RenderPipeline,
    targets: ChainTargets,
}

impl BloomChain {
    pub fn new(
        device: &wgpu::Device,
        scene_view: &wgpu::TextureView,
        width: u32,
        height: u32,
        output_format: wgpu::TextureFormat,
        params: BloomParams,
    ) -> Result<Self, RenderError> {
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("bloom sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        let mut pass_entries = vec![uniform_entry(0), texture_entry(1), sampler_entry(2)];
        let pass_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("bloom pass layout"),
            entries: &pass_entries,
        });
        pass_entries.extend((0..BLOOM_LEVELS as u32).map(|level| texture_entry(3 + level)));
        let composite_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("bloom composite layout"),
            entries: &pass_entries,
        });

        let high_pass_pipeline =
            fullscreen_pipeline(device, &BLOOM_HIGH_PASS_PROGRAM, &pass_layout, SCENE_FORMAT)?;
        let blur_pipeline =
            fullscreen_pipeline(device, &BLOOM_BLUR_PROGRAM, &pass_layout, SCENE_FORMAT)?;
        let composite_pipeline = fullscreen_pipeline(
            device,
            &BLOOM_COMPOSITE_PROGRAM,
            &composite_layout,
            output_format,
        )?;

        let targets = ChainTargets::new(
            device,
            &pass_layout,
            &composite_layout,
            &sampler,
            scene_view,
            width,
            height,
        );

        tracing::debug!(
            threshold = params.threshold,
            strength = params.strength,
            radius = params.radius,
            levels = BLOOM_LEVELS,
            "created bloom chain"
        );

        Ok(Self {
            params,
            sampler,
            pass_layout,
            composite_layout,
            high_pass_pipeline,
            blur_pipeline,
            composite_pipeline,
            targets,
        })
    }

    pub fn resize(
        &mut self,
        device: &wgpu::Device,
        scene_view: &wgpu::TextureView,
        width: u32,
        height: u32,
    ) {
        self.targets = ChainTargets::new(
            device,
            &self.pass_layout,
            &self.composite_layout,
            &self.sampler,
            scene_view,
            width,
            height,
        );
    }

    /// Uploads per-step uniforms. Params are fixed, so this only needs to run
    /// after construction and after every resize.
    pub fn update_uniforms(&self, queue: &wgpu::Queue) {
        let targets = &self.targets;
        let params = &self.params;
        write(
            queue,
            &targets.high_pass,
            BloomUniforms::high_pass(params, targets.bright.width, targets.bright.height),
        );
        for (index, level) in targets.levels.iter().enumerate() {
            let (width, height) = (level.vertical.width, level.vertical.height);
            write(
                queue,
                &level.horizontal_step,
                BloomUniforms::blur(params, index, width, height, HORIZONTAL),
            );
            write(
                queue,
                &level.vertical_step,
                BloomUniforms::blur(params, index, width, height, VERTICAL),
            );
        }
        write(
            queue,
            &targets.composite,
            BloomUniforms::composite(params, targets.bright.width, targets.bright.height),
        );
    }

    pub fn render(&self, encoder: &mut wgpu::CommandEncoder, output: &wgpu::TextureView) {
        let targets = &self.targets;
        draw(
            encoder,
            &self.high_pass_pipeline,
            &targets.high_pass,
            &targets.bright.view,
        );
        for level in &targets.levels {
            draw(
                encoder,
                &self.blur_pipeline,
                &level.horizontal_step,
                &level.horizontal.view,
            );
            draw(
                encoder,
                &self.blur_pipeline,
                &level.vertical_step,
                &level.vertical.view,
            );
        }
        draw(encoder, &self.composite_pipeline, &targets.composite, output);
    }
}

impl ChainTargets {
    fn new(
        device: &wgpu::Device,
        pass_layout: &wgpu::BindGroupLayout,
        composite_layout: &wgpu::BindGroupLayout,
        sampler: &wgpu::Sampler,
        scene_view: &wgpu::TextureView,
        width: u32,
        height: u32,
    ) -> Self {
        let bright = create_target(device, width, height, "bloom bright");
        let high_pass = create_step(device, pass_layout, sampler, scene_view, "bloom high pass");

        let mut levels: Vec<Level> = Vec::with_capacity(BLOOM_LEVELS);
        for index in 0..BLOOM_LEVELS {
            let (level_width, level_height) = bloom_level_size(width, height, index);
            let horizontal = create_target(device, level_width, level_height, "bloom blur h");
            let vertical = create_target(device, level_width, level_height, "bloom blur v");
            let input = levels
                .last()
                .map(|previous| &previous.vertical.view)
                .unwrap_or(&bright.view);
            let horizontal_step = create_step(device, pass_layout, sampler, input, "bloom blur h");
            let vertical_step = create_step(
                device,
                pass_layout,
                sampler,
                &horizontal.view,
                "bloom blur v",
            );
            levels.push(Level {
                horizontal,
                vertical,
                horizontal_step,
                vertical_step,
            });
        }

        let uniform_buffer = create_uniform_buffer(device, "bloom composite");
        let mut entries = vec![
            wgpu::BindGroupEntry {
                binding: 0,
                resource: uniform_buffer.as_entire_binding(),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: wgpu::BindingResource::TextureView(scene_view),
            },
            wgpu::BindGroupEntry {
                binding: 2,
                resource: wgpu::BindingResource::Sampler(sampler),
            },
        ];
        entries.extend(
            levels
                .iter()
                .enumerate()
                .map(|(index, level)| wgpu::BindGroupEntry {
                    binding: 3 + index as u32,
                    resource: wgpu::BindingResource::TextureView(&level.vertical.view),
                }),
        );
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("bloom composite"),
            layout: composite_layout,
            entries: &entries,
        });
        let composite = Step {
            label: "bloom composite",
            uniform_buffer,
            bind_group,
        };

        Self {
            bright,
            high_pass,
            levels,
            composite,
        }
    }
}

fn write(queue: &wgpu::Queue, step: &Step, uniforms: BloomUniforms) {
    queue.write_buffer(&step.uniform_buffer, 0, bytemuck::bytes_of(&uniforms));
}

fn draw(
    encoder: &mut wgpu::CommandEncoder,
    pipeline: &wgpu::RenderPipeline,
    step: &Step,
    target: &wgpu::TextureView,
) {
    let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
        label: Some(step.label),
        color_attachments: &[Some(wgpu::RenderPassColorAttachment {
            view: target,
            depth_slice: None,
            resolve_target: None,
            ops: wgpu::Operations {
                load: wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
                store: wgpu::StoreOp::Store,
            },
        })],
        depth_stencil_attachment: None,
        timestamp_writes: None,
        occlusion_query_set: None,
    });
    pass.set_pipeline(pipeline);
    pass.set_bind_group(0, &step.bind_group, &[]);
    pass.draw(0..3, 0..1);
}

fn create_target(device: &wgpu::Device, width: u32, height: u32, label: &str) -> Target {
    let width = width.max(1);
    let height = height.max(1);
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some(label),
        size: wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: SCENE_FORMAT,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
        view_formats: &[],
    });
    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    Target {
        _texture: texture,
        view,
        width,
        height,
    }
}

fn create_uniform_buffer(device: &wgpu::Device, label: &str) -> wgpu::Buffer {
    device.create_buffer(&wgpu::BufferDescriptor {
        label: Some(label),
        size: std::mem::size_of::<BloomUniforms>() as u64,
        usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    })
}

fn create_step(
    device: &wgpu::Device,
    layout: &wgpu::BindGroupLayout,
    sampler: &wgpu::Sampler,
    input: &wgpu::TextureView,
    label: &'static str,
) -> Step {
    let uniform_buffer = create_uniform_buffer(device, label);
    let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some(label),
        layout,
        entries: &[
            wgpu::BindGroupEntry {
                binding: 0,
                resource: uniform_buffer.as_entire_binding(),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: wgpu::BindingResource::TextureView(input),
            },
            wgpu::BindGroupEntry {
                binding: 2,
                resource: wgpu::BindingResource::Sampler(sampler),
            },
        ],
    });
    Step {
        label,
        uniform_buffer,
        bind_group,
    }
}

fn uniform_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: std::num::NonZeroU64::new(
                std::mem::size_of::<BloomUniforms>() as u64
            ),
        },
        count: None,
    }
}

fn texture_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Texture {
            sample_type: wgpu::TextureSampleType::Float { filterable: true },
            view_dimension: wgpu::TextureViewDimension::D2,
            multisampled: false,
        },
        count: None,
    }
}

fn sampler_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
        count: None,
    }
}
