use config_manager::CameraSettings;

pub const DEFAULT_FPS: u32 = 30;
pub const DEFAULT_WIDTH: u32 = 800;
pub const DEFAULT_HEIGHT: u32 = 600;

/// Sensor rotation supported by the capture binary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Rotation {
    #[default]
    Deg0,
    Deg90,
    Deg180,
    Deg270,
}

impl Rotation {
    pub fn from_degrees(degrees: i64) -> Option<Self> {
        match degrees {
            0 => Some(Rotation::Deg0),
            90 => Some(Rotation::Deg90),
            180 => Some(Rotation::Deg180),
            270 => Some(Rotation::Deg270),
            _ => None,
        }
    }

    pub fn degrees(self) -> u32 {
        match self {
            Rotation::Deg0 => 0,
            Rotation::Deg90 => 90,
            Rotation::Deg180 => 180,
            Rotation::Deg270 => 270,
        }
    }
}

/// Geometry used when the stored resolution is missing or unusable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CameraDefaults {
    pub width: u32,
    pub height: u32,
    pub flip: bool,
}

impl Default for CameraDefaults {
    fn default() -> Self {
        Self {
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
            flip: false,
        }
    }
}

/// Capture parameters for one pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureConfig {
    pub width: u32,
    pub height: u32,
    pub framerate: u32,
    pub rotation: Rotation,
    pub flip: bool,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self::from_defaults(&CameraDefaults::default())
    }
}

impl CaptureConfig {
    fn from_defaults(defaults: &CameraDefaults) -> Self {
        Self {
            width: defaults.width,
            height: defaults.height,
            framerate: DEFAULT_FPS,
            rotation: Rotation::Deg0,
            flip: defaults.flip,
        }
    }

    /// Resolve stored settings into a capture configuration.
    ///
    /// Invalid values never fail: fps falls back to 30, rotation to 0 and
    /// resolution to the fallback geometry.
    pub fn from_settings(settings: &CameraSettings, defaults: &CameraDefaults) -> Self {
        let mut config = Self::from_defaults(defaults);

        if let Some(fps) = parse_positive(&settings.fps) {
            config.framerate = fps;
        }

        if let Some(rotation) = settings
            .rotation
            .trim()
            .parse::<i64>()
            .ok()
            .and_then(Rotation::from_degrees)
        {
            config.rotation = rotation;
        }

        if let Some((width, height)) = parse_resolution(&settings.resolution) {
            config.width = width;
            config.height = height;
        }

        config
    }
}

fn parse_positive(value: &str) -> Option<u32> {
    value
        .trim()
        .parse::<i64>()
        .ok()
        .filter(|v| *v > 0)
        .and_then(|v| u32::try_from(v).ok())
}

/// Parse "WIDTHxHEIGHT"; both sides must be positive.
fn parse_resolution(value: &str) -> Option<(u32, u32)> {
    let (width, height) = value.trim().split_once('x')?;
    Some((parse_positive(width)?, parse_positive(height)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(fps: &str, rotation: &str, resolution: &str) -> CameraSettings {
        CameraSettings {
            fps: fps.to_string(),
            rotation: rotation.to_string(),
            resolution: resolution.to_string(),
        }
    }

    #[test]
    fn test_valid_settings() {
        let config = CaptureConfig::from_settings(
            &settings("25", "270", "1280x720"),
            &CameraDefaults::default(),
        );
        assert_eq!(config.framerate, 25);
        assert_eq!(config.rotation, Rotation::Deg270);
        assert_eq!((config.width, config.height), (1280, 720));
        assert!(!config.flip);
    }

    #[test]
    fn test_invalid_fps_falls_back() {
        for fps in ["0", "-5", "abc", "", "99999999999"] {
            let config = CaptureConfig::from_settings(
                &settings(fps, "0", "800x600"),
                &CameraDefaults::default(),
            );
            assert_eq!(config.framerate, DEFAULT_FPS, "fps input {:?}", fps);
        }
    }

    #[test]
    fn test_invalid_rotation_falls_back() {
        for rotation in ["45", "360", "-90", "left"] {
            let config = CaptureConfig::from_settings(
                &settings("30", rotation, "800x600"),
                &CameraDefaults::default(),
            );
            assert_eq!(config.rotation, Rotation::Deg0, "rotation input {:?}", rotation);
        }
    }

    #[test]
    fn test_invalid_resolution_falls_back() {
        for resolution in ["", "1280", "0x720", "1280x-1", "widexhigh", "x"] {
            let config = CaptureConfig::from_settings(
                &settings("30", "0", resolution),
                &CameraDefaults::default(),
            );
            assert_eq!(
                (config.width, config.height),
                (DEFAULT_WIDTH, DEFAULT_HEIGHT),
                "resolution input {:?}",
                resolution
            );
        }
    }

    #[test]
    fn test_fallback_geometry_from_defaults() {
        let defaults = CameraDefaults {
            width: 1640,
            height: 1232,
            flip: true,
        };
        let config = CaptureConfig::from_settings(&settings("30", "90", "bogus"), &defaults);
        assert_eq!((config.width, config.height), (1640, 1232));
        assert!(config.flip);
        assert_eq!(config.rotation.degrees(), 90);
    }

    #[test]
    fn test_default_config() {
        let config = CaptureConfig::default();
        assert_eq!(config.framerate, 30);
        assert_eq!(config.rotation, Rotation::Deg0);
        assert_eq!((config.width, config.height), (800, 600));
    }
}
