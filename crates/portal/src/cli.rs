use std::path::PathBuf;

use clap::Parser;
use sceneconfig::{AntialiasSetting, RotationConfig, DEFAULT_ROTATION_STEP};

#[derive(Parser, Debug)]
#[command(
    name = "portal",
    author,
    version,
    about = "Spinning shader portal with bloom",
    arg_required_else_help = false
)]
pub struct Cli {
    #[command(flatten)]
    pub run: RunArgs,
}

/// Flags override values loaded from the config file.
#[derive(Parser, Debug, Default)]
pub struct RunArgs {
    /// Config file to load instead of the discovered `portal.toml`.
    #[arg(long, env = "PORTAL_CONFIG", value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Window or export resolution (e.g. `1280x720`).
    #[arg(long, value_name = "WIDTHxHEIGHT", value_parser = parse_size)]
    pub size: Option<(u32, u32)>,

    /// Optional FPS cap for the window (0=uncapped).
    #[arg(long, value_name = "FPS", value_parser = parse_fps)]
    pub fps: Option<f32>,

    /// Anti-aliasing policy: `auto`, `off`, or an explicit MSAA sample count (e.g. `4`).
    #[arg(long, value_name = "MODE", value_parser = parse_antialias)]
    pub antialias: Option<AntialiasSetting>,

    /// Portal spin: `per-tick[:STEP]` (radians per refresh) or `wall-clock:RATE` (radians per second).
    #[arg(long, value_name = "MODE", value_parser = parse_rotation)]
    pub rotation: Option<RotationConfig>,

    /// Luminance below which pixels do not bloom.
    #[arg(long, value_name = "VALUE", allow_negative_numbers = true)]
    pub bloom_threshold: Option<f32>,

    /// Bloom intensity added back onto the frame.
    #[arg(long, value_name = "VALUE", allow_negative_numbers = true)]
    pub bloom_strength: Option<f32>,

    /// Blend between tight and wide bloom levels.
    #[arg(long, value_name = "VALUE", allow_negative_numbers = true)]
    pub bloom_radius: Option<f32>,

    /// Elapsed time (seconds) of the first tick in a still export.
    #[arg(long, value_name = "SECONDS", value_parser = parse_seconds)]
    pub still_time: Option<f32>,

    /// Render a single frame to the provided PNG path and exit.
    #[arg(long, value_name = "PATH", value_parser = parse_png_path)]
    pub still_export: Option<PathBuf>,

    /// Extra ticks to advance at 60 Hz before a still export.
    #[arg(long, value_name = "N")]
    pub frames: Option<u32>,
}

pub fn parse() -> Cli {
    Cli::parse()
}

pub fn parse_size(value: &str) -> Result<(u32, u32), String> {
    let (w, h) = value
        .split_once(['x', 'X'])
        .ok_or_else(|| "expected WIDTHxHEIGHT".to_string())?;
    let width = w
        .trim()
        .parse::<u32>()
        .map_err(|_| format!("invalid width '{}'", w.trim()))?;
    let height = h
        .trim()
        .parse::<u32>()
        .map_err(|_| format!("invalid height '{}'", h.trim()))?;
    if width == 0 || height == 0 {
        return Err("size must be greater than zero".into());
    }
    Ok((width, height))
}

pub fn parse_fps(value: &str) -> Result<f32, String> {
    let fps: f32 = value
        .trim()
        .parse()
        .map_err(|_| format!("invalid fps '{value}'"))?;
    if !fps.is_finite() || fps < 0.0 {
        return Err("fps must be a non-negative number".into());
    }
    Ok(fps)
}

pub fn parse_antialias(value: &str) -> Result<AntialiasSetting, String> {
    if value.trim().is_empty() {
        return Err("anti-alias mode must not be empty".to_string());
    }
    value.parse()
}

pub fn parse_rotation(value: &str) -> Result<RotationConfig, String> {
    let normalized = value.trim().to_ascii_lowercase();
    let (mode, argument) = match normalized.split_once(':') {
        Some((mode, argument)) => (mode, Some(argument.trim())),
        None => (normalized.as_str(), None),
    };

    match mode {
        "per-tick" | "tick" => {
            let step = match argument {
                Some(raw) => raw
                    .parse::<f32>()
                    .map_err(|_| format!("invalid per-tick step '{raw}'"))?,
                None => DEFAULT_ROTATION_STEP,
            };
            if !step.is_finite() || step <= 0.0 {
                return Err("per-tick step must be greater than zero".into());
            }
            Ok(RotationConfig::PerTick { step })
        }
        "wall-clock" | "clock" => {
            let raw = argument.ok_or_else(|| {
                "wall-clock rotation needs a rate, e.g. wall-clock:0.06".to_string()
            })?;
            let radians_per_second = raw
                .parse::<f32>()
                .map_err(|_| format!("invalid wall-clock rate '{raw}'"))?;
            if !radians_per_second.is_finite() || radians_per_second <= 0.0 {
                return Err("wall-clock rate must be greater than zero".into());
            }
            Ok(RotationConfig::WallClock { radians_per_second })
        }
        other => Err(format!(
            "unknown rotation mode '{other}'; expected per-tick[:STEP] or wall-clock:RATE"
        )),
    }
}

pub fn parse_seconds(value: &str) -> Result<f32, String> {
    let seconds: f32 = value
        .trim()
        .parse()
        .map_err(|_| format!("invalid time '{value}'; expected seconds"))?;
    if !seconds.is_finite() || seconds < 0.0 {
        return Err("time must be a non-negative number of seconds".into());
    }
    Ok(seconds)
}

pub fn parse_png_path(value: &str) -> Result<PathBuf, String> {
    let path = PathBuf::from(value);
    match path.extension().and_then(|ext| ext.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("png") => Ok(path),
        Some(ext) => Err(format!("unsupported export format '.{ext}'; use .png")),
        None => Err("still export path must end in .png".into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_sizes() {
        assert_eq!(parse_size("1280x720").unwrap(), (1280, 720));
        assert_eq!(parse_size(" 64 X 32 ").unwrap(), (64, 32));
        assert!(parse_size("1280").is_err());
        assert!(parse_size("0x720").is_err());
        assert!(parse_size("wide x tall").is_err());
    }

    #[test]
    fn parses_rotation_modes() {
        assert_eq!(
            parse_rotation("per-tick").unwrap(),
            RotationConfig::PerTick {
                step: DEFAULT_ROTATION_STEP
            }
        );
        assert_eq!(
            parse_rotation("per-tick:0.01").unwrap(),
            RotationConfig::PerTick { step: 0.01 }
        );
        assert_eq!(
            parse_rotation("wall-clock:0.06").unwrap(),
            RotationConfig::WallClock {
                radians_per_second: 0.06
            }
        );
        assert!(parse_rotation("per-tick:0").is_err());
        assert!(parse_rotation("per-tick:-1").is_err());
        assert!(parse_rotation("wall-clock").is_err());
        assert!(parse_rotation("wall-clock:0").is_err());
        assert!(parse_rotation("wall-clock:-0.06").is_err());
        assert!(parse_rotation("spin").is_err());
    }

    #[test]
    fn parses_antialias_settings() {
        assert_eq!(parse_antialias("auto").unwrap(), AntialiasSetting::Auto);
        assert_eq!(parse_antialias("none").unwrap(), AntialiasSetting::Off);
        assert_eq!(parse_antialias("4").unwrap(), AntialiasSetting::Samples(4));
        assert!(parse_antialias("").is_err());
        assert!(parse_antialias("6").is_err());
    }

    #[test]
    fn rejects_non_png_exports_and_bad_numbers() {
        assert!(parse_png_path("frame.png").is_ok());
        assert!(parse_png_path("frame.PNG").is_ok());
        assert!(parse_png_path("frame.jpg").is_err());
        assert!(parse_png_path("frame").is_err());
        assert!(parse_fps("-1").is_err());
        assert_eq!(parse_fps("0").unwrap(), 0.0);
        assert!(parse_seconds("soon").is_err());
        assert_eq!(parse_seconds("1.5").unwrap(), 1.5);
    }

    #[test]
    fn negative_bloom_values_are_accepted() {
        let cli = Cli::try_parse_from(["portal", "--bloom-radius", "-0.5", "--bloom-strength", "-1"])
            .unwrap();
        assert_eq!(cli.run.bloom_radius, Some(-0.5));
        assert_eq!(cli.run.bloom_strength, Some(-1.0));
    }
}
