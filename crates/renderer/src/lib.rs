//! Renderer crate for the portal effect.
//!
//! A flat disc carries a procedural, noise-driven shader; the frame goes
//! through a bloom pass and is viewed through an orbit camera that can rotate
//! but not zoom or pan. The flow per displayed frame is:
//!
//! ```text
//!   CLI / portal
//!          │ RendererConfig
//!          ▼
//!   Renderer::run ──▶ Scene ──▶ winit event loop ──▶ FrameClock::tick
//!                                                        │
//!                             Scene::update(tick) ◀──────┘
//!                                     │
//!                                     ▼
//!                GpuState::render: portal pass ─▶ bloom chain ─▶ swapchain
//! ```
//!
//! [`Renderer::run`] picks the interactive window or a headless still export.
//! Still export uses [`SoftwareRenderer`], which evaluates the same fragment
//! program on the CPU (see [`shader`]). Other hosts can skip `Renderer` and
//! mount [`GpuState`] on any surface exposing raw window handles.

pub mod camera;
pub mod clock;
pub mod compile;
pub mod error;
mod gpu;
pub mod portal;
pub mod post;
pub mod scene;
pub mod shader;
pub mod software;
mod types;
mod window;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::clock::BoxedTimeSource;

pub use camera::{CameraConstraints, CameraInput, OrbitCamera, Perspective};
pub use clock::{FixedTimeSource, FrameClock, SteppedTimeSource, Tick, TimeSource};
pub use error::RenderError;
pub use gpu::{FrameOutcome, GpuOptions, GpuState};
pub use portal::{Portal, RotationMode};
pub use post::{BloomParams, Frame, PassDescriptor, PassRegistry, PostPass};
pub use scene::{Scene, SceneOptions};
pub use software::{export_png, SoftwareRenderer};
pub use types::{Antialiasing, RenderMode, RendererConfig};

/// Refresh rate simulated when a still export advances extra ticks.
pub const STILL_REFRESH_RATE: f32 = 60.0;

/// High-level entry point that owns the chosen configuration.
///
/// `Renderer` selects the presentation path and forwards the request; scene
/// assembly and rendering live in [`Scene`], [`GpuState`] and
/// [`SoftwareRenderer`].
pub struct Renderer {
    config: RendererConfig,
    registry: PassRegistry,
}

impl Renderer {
    /// Builds a renderer with the built-in post-processing passes registered.
    pub fn new(config: RendererConfig) -> Self {
        Self::with_registry(config, PassRegistry::with_builtin())
    }

    /// Builds a renderer resolving passes against a caller-supplied registry.
    pub fn with_registry(config: RendererConfig, registry: PassRegistry) -> Self {
        Self { config, registry }
    }

    pub fn config(&self) -> &RendererConfig {
        &self.config
    }

    /// Runs the configured mode to completion.
    ///
    /// Windowed mode returns once the window closes; it fails if the scene,
    /// GPU or surface cannot be set up, or if the surface is lost mid-run.
    pub fn run(&self) -> Result<()> {
        match &self.config.mode {
            RenderMode::Windowed => window::run_window(&self.config, &self.registry),
            RenderMode::Still { time, frames, path } => {
                self.export_still(*time, *frames, path).map(|_| ())
            }
        }
    }

    /// Renders one frame on the CPU and writes it to `path`.
    ///
    /// The clock starts at `time` and advances `frames` extra ticks at
    /// [`STILL_REFRESH_RATE`], so the portal's spin matches what a window would
    /// show after the same number of refreshes.
    pub fn export_still(&self, time: f32, frames: u32, path: &Path) -> Result<PathBuf> {
        let (width, height) = self.config.surface_size;
        let renderer = SoftwareRenderer::new(width, height)?;
        let mut scene =
            Scene::new(&self.config.scene, &self.registry).context("failed to assemble scene")?;
        scene.set_viewport(width, height);

        let source: BoxedTimeSource = if frames == 0 {
            Box::new(FixedTimeSource::new(time))
        } else {
            Box::new(SteppedTimeSource::at_refresh_rate(time, STILL_REFRESH_RATE))
        };
        let mut clock = FrameClock::new(source);
        for _ in 0..=frames {
            clock.tick(|tick| scene.update(tick));
        }
        clock.stop();

        let frame = renderer.render(&scene);
        export_png(&frame, path)
            .with_context(|| format!("failed to export still frame to {}", path.display()))?;
        Ok(path.to_path_buf())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn still_mode_writes_the_requested_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("portal.png");
        let renderer = Renderer::new(RendererConfig {
            surface_size: (24, 16),
            mode: RenderMode::Still {
                time: 0.5,
                frames: 3,
                path: path.clone(),
            },
            ..RendererConfig::default()
        });
        renderer.run().unwrap();
        let image = image::open(&path).unwrap();
        assert_eq!((image.width(), image.height()), (24, 16));
    }

    #[test]
    fn still_export_fails_without_registered_passes() {
        let dir = tempfile::tempdir().unwrap();
        let renderer = Renderer::with_registry(
            RendererConfig {
                surface_size: (8, 8),
                ..RendererConfig::default()
            },
            PassRegistry::new(),
        );
        let err = renderer
            .export_still(0.0, 0, &dir.path().join("never.png"))
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<RenderError>(),
            Some(RenderError::UnregisteredPass(_))
        ));
        assert!(!dir.path().join("never.png").exists());
    }

    #[test]
    fn zero_sized_still_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let renderer = Renderer::new(RendererConfig {
            surface_size: (0, 8),
            ..RendererConfig::default()
        });
        assert!(renderer
            .export_still(0.0, 0, &dir.path().join("empty.png"))
            .is_err());
    }
}
