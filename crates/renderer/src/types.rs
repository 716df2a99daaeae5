use std::path::PathBuf;

use crate::scene::SceneOptions;

/// Anti-aliasing policy for the portal pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Antialiasing {
    /// Pick the highest supported sample count up to 4x.
    #[default]
    Auto,
    /// Disable MSAA.
    Off,
    /// Request a specific MSAA sample count (clamped to what the device supports).
    Samples(u32),
}

/// How the renderer should produce frames.
///
/// * `Windowed` opens an interactive winit window driven by the system clock.
/// * `Still` renders one frame headlessly on the CPU and writes it to disk.
#[derive(Debug, Clone, PartialEq)]
pub enum RenderMode {
    Windowed,
    Still {
        /// Elapsed time of the first tick, in seconds.
        time: f32,
        /// Extra ticks simulated at 60 Hz after the first one.
        frames: u32,
        path: PathBuf,
    },
}

/// Immutable configuration passed to the renderer at start-up.
///
/// Mirrors the merged CLI flags and config file.
#[derive(Debug, Clone, PartialEq)]
pub struct RendererConfig {
    /// Window or export size in physical pixels.
    pub surface_size: (u32, u32),
    /// Optional FPS cap for the window; `None` renders on every redraw.
    pub target_fps: Option<f32>,
    pub antialiasing: Antialiasing,
    pub scene: SceneOptions,
    pub mode: RenderMode,
}

impl Default for RendererConfig {
    /// A 1280x720 window with the default scene.
    fn default() -> Self {
        Self {
            surface_size: (1280, 720),
            target_fps: None,
            antialiasing: Antialiasing::default(),
            scene: SceneOptions::default(),
            mode: RenderMode::Windowed,
        }
    }
}
