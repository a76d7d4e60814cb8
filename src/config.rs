use serde::Deserialize;

/// Sphere tessellation used for every body. Quality/performance trade-off,
/// deliberately not configurable.
pub const SPHERE_SEGMENTS: u32 = 48;
/// Ring tessellation.
pub const RING_SEGMENTS: u32 = 64;

/// Converts a 0xRRGGBB color to linear-ish [r, g, b] floats.
pub const fn hex_color(hex: u32) -> [f32; 3] {
    [
        ((hex >> 16) & 0xff) as f32 / 255.0,
        ((hex >> 8) & 0xff) as f32 / 255.0,
        (hex & 0xff) as f32 / 255.0,
    ]
}

/// Star field generation parameters.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StarfieldConfig {
    pub count: usize,
    pub radius_min: f32,
    pub radius_max: f32,
    pub color: [f32; 3],
    /// Whole-field rotation per tick (radians).
    pub rotation_speed: f32,
}

impl Default for StarfieldConfig {
    fn default() -> Self {
        Self {
            count: 4000,
            radius_min: 80.0,
            radius_max: 800.0,
            color: hex_color(0x88aaff),
            rotation_speed: 0.0001,
        }
    }
}

/// One orbiting body: geometry, material, and orbital parameters.
#[derive(Debug, Clone, Deserialize)]
pub struct BodyConfig {
    pub radius: f32,
    pub color: [f32; 3],
    pub distance: f32,
    /// Pivot rotation per tick (radians).
    pub speed: f32,
    #[serde(default)]
    pub tilt: f32,
    /// Optional surface texture, resolved against the texture directory.
    #[serde(default)]
    pub texture: Option<String>,
    #[serde(default)]
    pub emissive: Option<[f32; 3]>,
}

/// Flat ring orbiting on its own pivot.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RingConfig {
    pub inner_radius: f32,
    pub outer_radius: f32,
    pub color: [f32; 3],
    pub opacity: f32,
    pub distance: f32,
    pub speed: f32,
    /// Tilt away from the orbital plane (radians).
    pub tilt: f32,
}

impl Default for RingConfig {
    fn default() -> Self {
        Self {
            inner_radius: 4.0,
            outer_radius: 6.2,
            color: hex_color(0xfff4cc),
            opacity: 0.4,
            distance: 26.0,
            speed: 0.0022,
            tilt: std::f32::consts::PI / 2.2,
        }
    }
}

/// Bloom pass tunables. Presentation constants, not semantic requirements.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct BloomConfig {
    pub strength: f32,
    pub radius: f32,
    pub threshold: f32,
}

impl Default for BloomConfig {
    fn default() -> Self {
        Self {
            strength: 1.2,
            radius: 0.6,
            threshold: 0.08,
        }
    }
}

/// Pointer-parallax camera tuning.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    pub fov_degrees: f32,
    pub near: f32,
    pub far: f32,
    pub base_position: [f32; 3],
    /// Pointer damping (horizontal, vertical).
    pub damping: [f32; 2],
    /// Parallax target scale (horizontal, vertical).
    pub target_scale: [f32; 2],
    /// Exponential low-pass factor per tick.
    pub smoothing: f32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            fov_degrees: 60.0,
            near: 0.1,
            far: 2000.0,
            base_position: [0.0, 10.0, 38.0],
            damping: [0.6, 0.3],
            target_scale: [10.0, 5.0],
            smoothing: 0.02,
        }
    }
}

/// Noisy-sinusoid overlay tuning.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct OverlayConfig {
    /// Amplitude as a fraction of surface height.
    pub amplitude: f32,
    /// Per-sample noise bound in pixels.
    pub noise: f32,
    /// Phase advance per tick.
    pub phase_step: f32,
    pub color: [f32; 3],
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            amplitude: 0.28,
            noise: 3.0,
            phase_step: 0.04,
            color: hex_color(0x8ab4ff),
        }
    }
}

/// Everything the backdrop needs, fixed at construction time.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BackdropConfig {
    pub starfield: StarfieldConfig,
    pub bodies: Vec<BodyConfig>,
    pub ring: Option<RingConfig>,
    pub bloom: BloomConfig,
    pub camera: CameraConfig,
    pub overlay: OverlayConfig,
    pub fog_color: [f32; 3],
    pub fog_density: f32,
    /// Directory texture names are resolved against.
    pub texture_dir: String,
    /// Ambient light intensity.
    pub ambient: f32,
    /// Key light color, intensity and position.
    pub key_light_color: [f32; 3],
    pub key_light_intensity: f32,
    pub key_light_position: [f32; 3],
}

impl Default for BackdropConfig {
    fn default() -> Self {
        Self {
            starfield: StarfieldConfig::default(),
            bodies: vec![
                BodyConfig {
                    radius: 3.2,
                    color: hex_color(0x3b82f6),
                    distance: 14.0,
                    speed: 0.003,
                    tilt: 0.2,
                    texture: None,
                    emissive: None,
                },
                BodyConfig {
                    radius: 2.1,
                    color: hex_color(0x22d3ee),
                    distance: 22.0,
                    speed: 0.0016,
                    tilt: 0.35,
                    texture: None,
                    emissive: None,
                },
                BodyConfig {
                    radius: 4.4,
                    color: hex_color(0x94a3b8),
                    distance: 32.0,
                    speed: 0.0011,
                    tilt: -0.15,
                    texture: None,
                    emissive: None,
                },
                BodyConfig {
                    radius: 2.6,
                    color: hex_color(0xffd166),
                    distance: 26.0,
                    speed: 0.0022,
                    tilt: 0.1,
                    texture: None,
                    emissive: None,
                },
            ],
            ring: Some(RingConfig::default()),
            bloom: BloomConfig::default(),
            camera: CameraConfig::default(),
            overlay: OverlayConfig::default(),
            fog_color: hex_color(0x00010a),
            fog_density: 0.0009,
            texture_dir: "textures".to_string(),
            ambient: 0.4,
            key_light_color: hex_color(0x88aaff),
            key_light_intensity: 3.0,
            key_light_position: [50.0, 40.0, 30.0],
        }
    }
}

impl BackdropConfig {
    /// Load a config from a JSON file, falling back to defaults for
    /// anything the file omits.
    pub fn from_json_file(path: &std::path::Path) -> anyhow::Result<Self> {
        use anyhow::Context;
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        let config: Self = serde_json::from_str(&text)
            .with_context(|| format!("Failed to parse config file: {:?}", path))?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_color_decodes_channels() {
        let c = hex_color(0x3b82f6);
        assert!((c[0] - 0x3b as f32 / 255.0).abs() < 1e-6);
        assert!((c[1] - 0x82 as f32 / 255.0).abs() < 1e-6);
        assert!((c[2] - 0xf6 as f32 / 255.0).abs() < 1e-6);
    }

    #[test]
    fn default_scene_has_four_bodies_and_a_ring() {
        let config = BackdropConfig::default();
        assert_eq!(config.bodies.len(), 4);
        assert!(config.ring.is_some());
        assert_eq!(config.starfield.count, 4000);
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config: BackdropConfig =
            serde_json::from_str(r#"{ "starfield": { "count": 100 } }"#).unwrap();
        assert_eq!(config.starfield.count, 100);
        assert_eq!(config.starfield.radius_min, 80.0);
        assert_eq!(config.bodies.len(), 4);
    }

    #[test]
    fn body_config_json_minimal() {
        let body: BodyConfig = serde_json::from_str(
            r#"{ "radius": 1.0, "color": [1.0, 0.0, 0.0], "distance": 5.0, "speed": 0.01 }"#,
        )
        .unwrap();
        assert_eq!(body.tilt, 0.0);
        assert!(body.texture.is_none());
        assert!(body.emissive.is_none());
    }
}
