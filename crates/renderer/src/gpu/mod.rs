//! wgpu backend.
//!
//! - `context` owns the instance, device and surface and knows how to rebuild
//!   swapchain state when the window resizes or the surface goes stale.
//! - `pipeline` compiles the GLSL programs into render pipelines.
//! - `uniforms` holds the std140 mirrors of the shader blocks.
//! - `bloom` runs the high-pass / mip-blur / composite chain.
//! - `state` glues everything together behind `GpuState`, the type hosts mount.

mod bloom;
mod context;
mod pipeline;
mod state;
mod uniforms;

pub use state::{FrameOutcome, GpuOptions, GpuState};
