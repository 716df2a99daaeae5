use anyhow::{Context, Result};
use renderer::{
    Antialiasing, BloomParams, RenderMode, Renderer, RendererConfig, RotationMode, SceneOptions,
};
use sceneconfig::{AntialiasSetting, PortalConfig, RotationConfig};
use tracing_subscriber::EnvFilter;

use crate::cli::RunArgs;
use crate::paths::AppPaths;

pub fn run(args: RunArgs) -> Result<()> {
    let config = load_config(&args)?;
    let renderer_config = build_renderer_config(&config, &args);
    tracing::debug!(?renderer_config, "resolved portal configuration");

    let renderer = Renderer::new(renderer_config);
    match &renderer.config().mode {
        RenderMode::Still { time, frames, path } => tracing::info!(
            path = %path.display(),
            time,
            frames,
            "exporting still frame"
        ),
        RenderMode::Windowed => tracing::info!("opening portal window"),
    }
    renderer.run()
}

pub fn initialise_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn load_config(args: &RunArgs) -> Result<PortalConfig> {
    if let Some(path) = args.config.as_ref() {
        return PortalConfig::load(path)
            .with_context(|| format!("failed to load config {}", path.display()));
    }

    let paths = AppPaths::discover()?;
    let path = paths.config_file();
    if path.is_file() {
        tracing::debug!(path = %path.display(), "loading discovered config");
        PortalConfig::load(&path)
            .with_context(|| format!("failed to load config {}", path.display()))
    } else {
        tracing::debug!(
            config_dir = %paths.config_dir().display(),
            "no config file found; using defaults"
        );
        Ok(PortalConfig::default())
    }
}

/// Merges file values with CLI overrides; flags win.
fn build_renderer_config(config: &PortalConfig, args: &RunArgs) -> RendererConfig {
    let surface_size = args
        .size
        .unwrap_or((config.window.width, config.window.height));
    let target_fps = args
        .fps
        .or(config.window.fps)
        .filter(|fps| *fps > 0.0);
    let antialiasing = map_antialias(args.antialias.or(config.window.antialias));

    let bloom = BloomParams {
        threshold: args.bloom_threshold.unwrap_or(config.bloom.threshold),
        strength: args.bloom_strength.unwrap_or(config.bloom.strength),
        radius: args.bloom_radius.unwrap_or(config.bloom.radius),
    };
    let rotation = map_rotation(args.rotation.unwrap_or(config.portal.rotation));

    let mode = match args.still_export.as_ref() {
        Some(path) => RenderMode::Still {
            time: args
                .still_time
                .unwrap_or_else(|| config.still.time.as_secs_f32()),
            frames: args.frames.unwrap_or(config.still.frames),
            path: path.clone(),
        },
        None => RenderMode::Windowed,
    };

    RendererConfig {
        surface_size,
        target_fps,
        antialiasing,
        scene: SceneOptions::with_bloom(rotation, bloom),
        mode,
    }
}

fn map_antialias(setting: Option<AntialiasSetting>) -> Antialiasing {
    match setting {
        None | Some(AntialiasSetting::Auto) => Antialiasing::Auto,
        Some(AntialiasSetting::Off) => Antialiasing::Off,
        Some(AntialiasSetting::Samples(samples)) => Antialiasing::Samples(samples),
    }
}

fn map_rotation(rotation: RotationConfig) -> RotationMode {
    match rotation {
        RotationConfig::PerTick { step } => RotationMode::PerTick { step },
        RotationConfig::WallClock { radians_per_second } => {
            RotationMode::WallClock { radians_per_second }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::time::Duration;

    #[test]
    fn defaults_open_a_window_with_default_scene() {
        let config = build_renderer_config(&PortalConfig::default(), &RunArgs::default());
        assert_eq!(config, RendererConfig::default());
    }

    #[test]
    fn cli_flags_override_file_values() {
        let mut file = PortalConfig::default();
        file.window.width = 640;
        file.window.height = 480;
        file.window.fps = Some(30.0);
        file.bloom.strength = 2.0;
        file.still.time = Duration::from_secs(3);
        file.still.frames = 10;

        let args = RunArgs {
            size: Some((64, 32)),
            bloom_radius: Some(-0.25),
            rotation: Some(RotationConfig::WallClock {
                radians_per_second: 0.5,
            }),
            still_export: Some(PathBuf::from("out.png")),
            frames: Some(2),
            ..RunArgs::default()
        };
        let config = build_renderer_config(&file, &args);

        assert_eq!(config.surface_size, (64, 32));
        assert_eq!(config.target_fps, Some(30.0));
        assert_eq!(
            config.scene,
            SceneOptions::with_bloom(
                RotationMode::WallClock {
                    radians_per_second: 0.5
                },
                BloomParams {
                    threshold: 0.0,
                    strength: 2.0,
                    radius: -0.25,
                },
            )
        );
        assert_eq!(
            config.mode,
            RenderMode::Still {
                time: 3.0,
                frames: 2,
                path: PathBuf::from("out.png"),
            }
        );
    }

    #[test]
    fn rotation_step_defaults_agree() {
        assert_eq!(
            sceneconfig::DEFAULT_ROTATION_STEP,
            renderer::portal::DEFAULT_ROTATION_STEP
        );
        assert_eq!(
            map_rotation(RotationConfig::default()),
            RotationMode::default()
        );
    }

    #[test]
    fn zero_fps_means_uncapped() {
        let args = RunArgs {
            fps: Some(0.0),
            ..RunArgs::default()
        };
        let config = build_renderer_config(&PortalConfig::default(), &args);
        assert_eq!(config.target_fps, None);
    }

    #[test]
    fn explicit_config_path_must_exist() {
        let dir = tempfile::tempdir().unwrap();
        let args = RunArgs {
            config: Some(dir.path().join("missing.toml")),
            ..RunArgs::default()
        };
        assert!(load_config(&args).is_err());
    }

    #[test]
    fn explicit_config_path_is_loaded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("custom.toml");
        std::fs::write(&path, "version = 1\n[window]\nwidth = 320\nheight = 200\n").unwrap();
        let args = RunArgs {
            config: Some(path),
            ..RunArgs::default()
        };
        let config = load_config(&args).unwrap();
        assert_eq!((config.window.width, config.window.height), (320, 200));
    }
}
