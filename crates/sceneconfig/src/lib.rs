//! On-disk configuration for the portal renderer.
//!
//! ```toml
//! version = 1
//!
//! [window]
//! width = 1280
//! height = 720
//! fps = 60
//! antialias = "auto"
//!
//! [bloom]
//! threshold = 0.0
//! strength = 0.7
//! radius = 0.3
//!
//! [portal.rotation]
//! mode = "per-tick"
//! step = 0.001
//!
//! [still]
//! time = "2s"
//! frames = 0
//! ```
//!
//! Every section is optional. Bloom values are taken as written, including
//! negative ones.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::de::{self, Deserializer};
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};

pub const CONFIG_VERSION: u32 = 1;
pub const DEFAULT_ROTATION_STEP: f32 = 0.001;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("failed to serialise configuration: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("failed to read configuration at {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct PortalConfig {
    pub version: u32,
    #[serde(default)]
    pub window: WindowConfig,
    #[serde(default)]
    pub bloom: BloomConfig,
    #[serde(default)]
    pub portal: PortalSection,
    #[serde(default)]
    pub still: StillConfig,
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            window: WindowConfig::default(),
            bloom: BloomConfig::default(),
            portal: PortalSection::default(),
            still: StillConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct WindowConfig {
    #[serde(default = "default_width")]
    pub width: u32,
    #[serde(default = "default_height")]
    pub height: u32,
    /// Frame cap; absent or zero renders on every refresh.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fps: Option<f32>,
    #[serde(
        default,
        deserialize_with = "deserialize_antialias_opt",
        serialize_with = "serialize_antialias_opt",
        skip_serializing_if = "Option::is_none"
    )]
    pub antialias: Option<AntialiasSetting>,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            width: default_width(),
            height: default_height(),
            fps: None,
            antialias: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct BloomConfig {
    #[serde(default)]
    pub threshold: f32,
    #[serde(default = "default_bloom_strength")]
    pub strength: f32,
    #[serde(default = "default_bloom_radius")]
    pub radius: f32,
}

impl Default for BloomConfig {
    fn default() -> Self {
        Self {
            threshold: 0.0,
            strength: default_bloom_strength(),
            radius: default_bloom_radius(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Deserialize, Serialize)]
pub struct PortalSection {
    #[serde(default)]
    pub rotation: RotationConfig,
}

/// How the portal's spin advances.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(tag = "mode", rename_all = "kebab-case")]
pub enum RotationConfig {
    /// Fixed radians per display refresh.
    PerTick {
        #[serde(default = "default_rotation_step")]
        step: f32,
    },
    /// Radians per second of elapsed time.
    WallClock { radians_per_second: f32 },
}

impl Default for RotationConfig {
    fn default() -> Self {
        Self::PerTick {
            step: DEFAULT_ROTATION_STEP,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct StillConfig {
    #[serde(
        default,
        deserialize_with = "deserialize_duration",
        serialize_with = "serialize_duration"
    )]
    pub time: Duration,
    #[serde(default)]
    pub frames: u32,
}

impl Default for StillConfig {
    fn default() -> Self {
        Self {
            time: Duration::ZERO,
            frames: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AntialiasSetting {
    Auto,
    Off,
    Samples(u32),
}

impl AntialiasSetting {
    pub fn from_samples(samples: u32) -> Option<Self> {
        match samples {
            0 | 1 => Some(Self::Off),
            2 | 4 | 8 | 16 => Some(Self::Samples(samples)),
            _ => None,
        }
    }
}

impl fmt::Display for AntialiasSetting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AntialiasSetting::Auto => f.write_str("auto"),
            AntialiasSetting::Off => f.write_str("off"),
            AntialiasSetting::Samples(samples) => write!(f, "{samples}"),
        }
    }
}

impl std::str::FromStr for AntialiasSetting {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let normalized = raw.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "auto" | "max" | "default" => Ok(AntialiasSetting::Auto),
            "off" | "none" | "disable" | "disabled" => Ok(AntialiasSetting::Off),
            other => other
                .parse::<u32>()
                .ok()
                .and_then(AntialiasSetting::from_samples)
                .ok_or_else(|| format!("invalid antialias setting '{other}'")),
        }
    }
}

fn default_width() -> u32 {
    1280
}

fn default_height() -> u32 {
    720
}

fn default_bloom_strength() -> f32 {
    0.7
}

fn default_bloom_radius() -> f32 {
    0.3
}

fn default_rotation_step() -> f32 {
    DEFAULT_ROTATION_STEP
}

fn serialize_duration<S>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&humantime::format_duration(*value).to_string())
}

fn deserialize_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    struct Visitor;
    impl<'de> de::Visitor<'de> for Visitor {
        type Value = Duration;

        fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
            formatter.write_str("a duration as number of seconds or human-readable string")
        }

        fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            humantime::parse_duration(v)
                .map_err(|err| E::custom(format!("invalid duration '{v}': {err}")))
        }

        fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(Duration::from_secs(v))
        }

        fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            if v < 0 {
                return Err(E::custom("duration must be non-negative"));
            }
            Ok(Duration::from_secs(v as u64))
        }

        fn visit_f64<E>(self, v: f64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            if v.is_nan() || v.is_sign_negative() || v.is_infinite() {
                return Err(E::custom("duration must be a non-negative number"));
            }
            Duration::try_from_secs_f64(v)
                .map_err(|err| E::custom(format!("invalid duration {v}: {err}")))
        }
    }

    deserializer.deserialize_any(Visitor)
}

fn serialize_antialias_opt<S>(
    value: &Option<AntialiasSetting>,
    serializer: S,
) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    match value {
        Some(setting) => serializer.serialize_str(&setting.to_string()),
        None => serializer.serialize_none(),
    }
}

fn deserialize_antialias_opt<'de, D>(deserializer: D) -> Result<Option<AntialiasSetting>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Helper {
        Str(String),
        Num(i64),
    }

    let helper: Option<Helper> = Option::deserialize(deserializer)?;
    let result = match helper {
        None => None,
        Some(Helper::Str(raw)) => Some(raw.parse().map_err(de::Error::custom)?),
        Some(Helper::Num(value)) => {
            if value < 0 {
                return Err(de::Error::custom("antialias value must be non-negative"));
            }
            Some(value.to_string().parse().map_err(de::Error::custom)?)
        }
    };
    Ok(result)
}

impl PortalConfig {
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        let raw: PortalConfig = toml::from_str(input)?;
        raw.validate()?;
        Ok(raw)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&contents)
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.version != CONFIG_VERSION {
            return Err(ConfigError::Invalid(format!(
                "unsupported config version {}; expected {CONFIG_VERSION}",
                self.version
            )));
        }

        if self.window.width == 0 || self.window.height == 0 {
            return Err(ConfigError::Invalid(format!(
                "window size must be non-zero, got {}x{}",
                self.window.width, self.window.height
            )));
        }

        if let Some(fps) = self.window.fps {
            if !fps.is_finite() || fps < 0.0 {
                return Err(ConfigError::Invalid("window.fps must be >= 0".into()));
            }
        }

        match self.portal.rotation {
            RotationConfig::PerTick { step } => {
                if !step.is_finite() || step <= 0.0 {
                    return Err(ConfigError::Invalid(format!(
                        "portal.rotation.step must be greater than zero, got {step}"
                    )));
                }
            }
            RotationConfig::WallClock { radians_per_second } => {
                if !radians_per_second.is_finite() || radians_per_second <= 0.0 {
                    return Err(ConfigError::Invalid(format!(
                        "portal.rotation.radians_per_second must be greater than zero, got {radians_per_second}"
                    )));
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
version = 1

[window]
width = 800
height = 600
fps = 30
antialias = 4

[bloom]
threshold = 0.1
strength = 1.2
radius = 0.5

[portal.rotation]
mode = "wall-clock"
radians_per_second = 0.06

[still]
time = "1.5s"
frames = 12
"#;

    #[test]
    fn parses_sample_config() {
        let config = PortalConfig::from_toml_str(SAMPLE).expect("parse config");
        assert_eq!(config.window.width, 800);
        assert_eq!(config.window.fps, Some(30.0));
        assert_eq!(config.window.antialias, Some(AntialiasSetting::Samples(4)));
        assert_eq!(config.bloom.strength, 1.2);
        assert_eq!(
            config.portal.rotation,
            RotationConfig::WallClock {
                radians_per_second: 0.06
            }
        );
        assert_eq!(config.still.time, Duration::from_millis(1500));
        assert_eq!(config.still.frames, 12);
    }

    #[test]
    fn minimal_config_uses_defaults() {
        let config = PortalConfig::from_toml_str("version = 1").unwrap();
        assert_eq!(config, PortalConfig::default());
        assert_eq!(
            config.portal.rotation,
            RotationConfig::PerTick { step: 0.001 }
        );
        assert_eq!(config.bloom, BloomConfig::default());
    }

    #[test]
    fn per_tick_step_defaults_when_omitted() {
        let config = PortalConfig::from_toml_str(
            r#"
version = 1
[portal.rotation]
mode = "per-tick"
"#,
        )
        .unwrap();
        assert_eq!(
            config.portal.rotation,
            RotationConfig::PerTick {
                step: DEFAULT_ROTATION_STEP
            }
        );
    }

    #[test]
    fn defaults_round_trip_through_toml() {
        let config = PortalConfig::default();
        let text = config.to_toml_string().unwrap();
        assert_eq!(PortalConfig::from_toml_str(&text).unwrap(), config);
    }

    #[test]
    fn sample_round_trips_through_toml() {
        let config = PortalConfig::from_toml_str(SAMPLE).unwrap();
        let text = config.to_toml_string().unwrap();
        assert_eq!(PortalConfig::from_toml_str(&text).unwrap(), config);
    }

    #[test]
    fn rejects_unsupported_version() {
        let err = PortalConfig::from_toml_str("version = 2").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn rejects_non_positive_step() {
        let err = PortalConfig::from_toml_str(
            r#"
version = 1
[portal.rotation]
mode = "per-tick"
step = 0.0
"#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn rejects_non_positive_wall_clock_rate() {
        for rate in ["0.0", "-0.5"] {
            let err = PortalConfig::from_toml_str(&format!(
                "version = 1\n[portal.rotation]\nmode = \"wall-clock\"\nradians_per_second = {rate}\n"
            ))
            .unwrap_err();
            assert!(matches!(err, ConfigError::Invalid(_)));
        }
    }

    #[test]
    fn rejects_still_time_beyond_duration_range() {
        assert!(matches!(
            PortalConfig::from_toml_str("version = 1\n[still]\ntime = 1e30\n"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn rejects_zero_window_size() {
        let err = PortalConfig::from_toml_str(
            r#"
version = 1
[window]
width = 0
"#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn accepts_negative_bloom_values() {
        let config = PortalConfig::from_toml_str(
            r#"
version = 1
[bloom]
radius = -1.0
strength = -0.5
"#,
        )
        .unwrap();
        assert_eq!(config.bloom.radius, -1.0);
        assert_eq!(config.bloom.strength, -0.5);
        assert_eq!(config.bloom.threshold, 0.0);
    }

    #[test]
    fn rejects_bad_antialias_and_duration() {
        assert!(matches!(
            PortalConfig::from_toml_str("version = 1\n[window]\nantialias = 3\n"),
            Err(ConfigError::Parse(_))
        ));
        assert!(matches!(
            PortalConfig::from_toml_str("version = 1\n[still]\ntime = \"soon\"\n"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn load_reports_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.toml");
        let err = PortalConfig::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Io { path: p, .. } if p == path));
    }

    #[test]
    fn antialias_parses_names_and_sample_counts() {
        assert_eq!("AUTO".parse(), Ok(AntialiasSetting::Auto));
        assert_eq!("off".parse(), Ok(AntialiasSetting::Off));
        assert_eq!("0".parse(), Ok(AntialiasSetting::Off));
        assert_eq!("8".parse(), Ok(AntialiasSetting::Samples(8)));
        assert!("3".parse::<AntialiasSetting>().is_err());
    }
}
