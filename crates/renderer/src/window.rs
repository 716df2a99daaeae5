use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Context, Result};
use tracing::{error, info};
use winit::dpi::{PhysicalPosition, PhysicalSize};
use winit::event::{ElementState, Event, MouseButton, MouseScrollDelta, WindowEvent};
use winit::event_loop::{ControlFlow, EventLoop};
use winit::window::WindowBuilder;

use crate::camera::CameraInput;
use crate::clock::FrameClock;
use crate::error::RenderError;
use crate::gpu::{GpuOptions, GpuState};
use crate::post::PassRegistry;
use crate::scene::Scene;
use crate::types::RendererConfig;

/// Pixels of touchpad scroll treated as one wheel notch.
const PIXELS_PER_SCROLL_LINE: f32 = 50.0;

/// Opens the preview window and drives one clock tick per redraw until the
/// window closes or the surface is lost.
pub(crate) fn run_window(config: &RendererConfig, registry: &PassRegistry) -> Result<()> {
    let event_loop = EventLoop::new().map_err(|err| anyhow!("failed to create event loop: {err}"))?;

    let window_size = PhysicalSize::new(config.surface_size.0, config.surface_size.1);
    let window = WindowBuilder::new()
        .with_title("Portal")
        .with_inner_size(window_size)
        .build(&event_loop)
        .map_err(|err| anyhow!("failed to create window: {err}"))?;
    let window = Arc::new(window);

    let mut scene = Scene::new(&config.scene, registry).context("failed to assemble scene")?;
    let size = window.inner_size();
    scene.set_viewport(size.width, size.height);

    let mut gpu = GpuState::new(
        window.as_ref(),
        (size.width, size.height),
        &scene,
        GpuOptions {
            antialiasing: config.antialiasing,
        },
    )
    .context("failed to initialise GPU renderer")?;
    info!(
        width = size.width,
        height = size.height,
        sample_count = gpu.sample_count(),
        "portal window ready"
    );

    let mut clock = FrameClock::system();
    let mut pacer = FramePacer::new(config.target_fps);
    let mut pointer = PointerState::default();
    let mut failure: Option<RenderError> = None;

    window.request_redraw();

    let run_result = event_loop.run(|event, elwt| match event {
        Event::WindowEvent { window_id, event } if window_id == window.id() => match event {
            WindowEvent::CloseRequested | WindowEvent::Destroyed => {
                clock.stop();
                elwt.exit();
            }
            WindowEvent::Resized(new_size) => {
                gpu.resize(new_size);
                scene.set_viewport(new_size.width, new_size.height);
            }
            WindowEvent::CursorMoved { position, .. } => {
                let height = gpu.size().height;
                for input in pointer.handle_cursor_moved(position) {
                    if scene.handle_input(input, height) {
                        window.request_redraw();
                    }
                }
            }
            WindowEvent::MouseInput { state, button, .. } => {
                pointer.handle_button(button, state);
            }
            WindowEvent::MouseWheel { delta, .. } => {
                let lines = match delta {
                    MouseScrollDelta::LineDelta(_, y) => y,
                    MouseScrollDelta::PixelDelta(position) => {
                        position.y as f32 / PIXELS_PER_SCROLL_LINE
                    }
                };
                scene.handle_input(CameraInput::Zoom { delta: lines }, gpu.size().height);
            }
            WindowEvent::RedrawRequested => {
                if !clock.tick(|tick| scene.update(tick)) {
                    return;
                }
                match gpu.render(&scene) {
                    Ok(_) => pacer.mark_rendered(Instant::now()),
                    Err(err) => {
                        error!(error = %err, "rendering stopped");
                        clock.stop();
                        failure = Some(err);
                        elwt.exit();
                    }
                }
            }
            _ => {}
        },
        Event::AboutToWait => {
            if clock.is_stopped() {
                return;
            }
            let now = Instant::now();
            if pacer.ready_for_frame(now) {
                window.request_redraw();
                elwt.set_control_flow(ControlFlow::Wait);
            } else if let Some(deadline) = pacer.next_deadline() {
                elwt.set_control_flow(ControlFlow::WaitUntil(deadline));
            }
        }
        _ => {}
    });

    // The surface must go before the window it was created from.
    drop(gpu);
    run_result.map_err(|err| anyhow!("window event loop error: {err}"))?;
    if let Some(err) = failure {
        return Err(err).context("portal window closed after a fatal rendering error");
    }
    info!(ticks = clock.ticks(), "portal window closed");
    Ok(())
}

/// Optional FPS cap: decides when the next redraw may be requested.
#[derive(Debug, Clone)]
struct FramePacer {
    interval: Option<Duration>,
    last_frame: Option<Instant>,
}

impl FramePacer {
    fn new(target_fps: Option<f32>) -> Self {
        let interval = target_fps
            .filter(|fps| fps.is_finite() && *fps > 0.0)
            .map(|fps| Duration::from_secs_f64(1.0 / f64::from(fps)));
        Self {
            interval,
            last_frame: None,
        }
    }

    fn mark_rendered(&mut self, now: Instant) {
        self.last_frame = Some(now);
    }

    fn ready_for_frame(&self, now: Instant) -> bool {
        match (self.interval, self.last_frame) {
            (Some(interval), Some(last)) => now.saturating_duration_since(last) >= interval,
            _ => true,
        }
    }

    fn next_deadline(&self) -> Option<Instant> {
        Some(self.last_frame? + self.interval?)
    }
}

/// Tracks buttons and cursor so drags can be turned into camera input.
#[derive(Debug, Default)]
struct PointerState {
    position: Option<PhysicalPosition<f64>>,
    rotating: bool,
    panning: bool,
}

impl PointerState {
    fn handle_button(&mut self, button: MouseButton, state: ElementState) {
        let pressed = state == ElementState::Pressed;
        match button {
            MouseButton::Left => self.rotating = pressed,
            MouseButton::Right | MouseButton::Middle => self.panning = pressed,
            _ => {}
        }
    }

    fn handle_cursor_moved(&mut self, position: PhysicalPosition<f64>) -> Vec<CameraInput> {
        let previous = self.position.replace(position);
        let Some(previous) = previous else {
            return Vec::new();
        };
        let dx = (position.x - previous.x) as f32;
        let dy = (position.y - previous.y) as f32;

        let mut inputs = Vec::new();
        if self.rotating {
            inputs.push(CameraInput::Orbit { dx, dy });
        }
        if self.panning {
            inputs.push(CameraInput::Pan { dx, dy });
        }
        inputs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uncapped_pacer_is_always_ready() {
        let mut pacer = FramePacer::new(None);
        let now = Instant::now();
        assert!(pacer.ready_for_frame(now));
        pacer.mark_rendered(now);
        assert!(pacer.ready_for_frame(now));
        assert!(pacer.next_deadline().is_none());
    }

    #[test]
    fn capped_pacer_waits_for_the_interval() {
        let mut pacer = FramePacer::new(Some(10.0));
        let start = Instant::now();
        pacer.mark_rendered(start);
        assert!(!pacer.ready_for_frame(start + Duration::from_millis(50)));
        assert!(pacer.ready_for_frame(start + Duration::from_millis(100)));
        assert_eq!(pacer.next_deadline(), Some(start + Duration::from_millis(100)));
    }

    #[test]
    fn interval_matches_the_requested_rate_exactly() {
        assert_eq!(
            FramePacer::new(Some(10.0)).interval,
            Some(Duration::from_millis(100))
        );
        assert_eq!(
            FramePacer::new(Some(50.0)).interval,
            Some(Duration::from_millis(20))
        );
    }

    #[test]
    fn invalid_fps_disables_the_cap() {
        assert!(FramePacer::new(Some(0.0)).interval.is_none());
        assert!(FramePacer::new(Some(f32::NAN)).interval.is_none());
    }

    #[test]
    fn drags_map_to_camera_input_by_button() {
        let mut pointer = PointerState::default();
        assert!(pointer
            .handle_cursor_moved(PhysicalPosition::new(10.0, 10.0))
            .is_empty());

        pointer.handle_button(MouseButton::Left, ElementState::Pressed);
        assert_eq!(
            pointer.handle_cursor_moved(PhysicalPosition::new(15.0, 12.0)),
            vec![CameraInput::Orbit { dx: 5.0, dy: 2.0 }]
        );

        pointer.handle_button(MouseButton::Left, ElementState::Released);
        pointer.handle_button(MouseButton::Right, ElementState::Pressed);
        assert_eq!(
            pointer.handle_cursor_moved(PhysicalPosition::new(14.0, 12.0)),
            vec![CameraInput::Pan { dx: -1.0, dy: 0.0 }]
        );
    }
}
