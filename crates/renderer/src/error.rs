use std::path::PathBuf;

use thiserror::Error;

/// Failures surfaced by scene construction, GPU setup and still export.
///
/// Everything here is fatal to the scene being built or run; transient
/// surface states (outdated swapchain, acquire timeout) never reach this type.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("failed to compile {stage} stage of `{program}` shader: {message}")]
    ShaderCompilation {
        program: String,
        stage: &'static str,
        message: String,
    },
    #[error("post-processing pass `{0}` is not registered")]
    UnregisteredPass(String),
    #[error("no suitable GPU adapter found: {0}")]
    AdapterNotFound(String),
    #[error("failed to create GPU device: {0}")]
    Device(String),
    #[error("failed to create rendering surface: {0}")]
    Surface(String),
    #[error("surface size {width}x{height} exceeds the GPU limit of {max}")]
    SurfaceTooLarge { width: u32, height: u32, max: u32 },
    #[error("rendering surface lost")]
    SurfaceLost,
    #[error("GPU device lost")]
    DeviceLost,
    #[error("frame size must be non-zero, got {width}x{height}")]
    EmptyFrame { width: u32, height: u32 },
    #[error("failed to write still frame to {path}")]
    Export {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shader_errors_name_program_and_stage() {
        let err = RenderError::ShaderCompilation {
            program: "portal".into(),
            stage: "fragment",
            message: "unknown identifier".into(),
        };
        let text = err.to_string();
        assert!(text.contains("portal"));
        assert!(text.contains("fragment"));
        assert!(text.contains("unknown identifier"));
    }

    #[test]
    fn unregistered_pass_names_the_kind() {
        let err = RenderError::UnregisteredPass("bloom".into());
        assert_eq!(err.to_string(), "post-processing pass `bloom` is not registered");
    }
}
