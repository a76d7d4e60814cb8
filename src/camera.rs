use glam::{Mat4, Vec2, Vec3};

use crate::config::CameraConfig;

/// Perspective camera whose position is driven by smoothed pointer
/// parallax.
///
/// Pointer events set a clamped 2D target; every tick the position takes an
/// exponential low-pass step toward `target * scale` and re-aims at the
/// world origin. A first-order approach never overshoots, so there is no
/// spring to tune. No state survives a remount: a fresh camera starts at
/// the base position with a zero target.
pub struct ParallaxCamera {
    config: CameraConfig,
    position: Vec3,
    target: Vec2,
    aspect: f32,
}

impl ParallaxCamera {
    pub fn new(config: CameraConfig, width: u32, height: u32) -> Self {
        Self {
            config,
            position: Vec3::from_array(config.base_position),
            target: Vec2::ZERO,
            aspect: aspect_ratio(width, height),
        }
    }

    /// Maps a pointer position to the parallax target: normalized to
    /// [-1, 1] on both axes, scaled by the damping factors, y inverted so
    /// the camera drifts opposite the pointer's vertical travel.
    pub fn pointer_moved(&mut self, x: f32, y: f32, viewport_width: f32, viewport_height: f32) {
        if viewport_width <= 0.0 || viewport_height <= 0.0 {
            return;
        }
        let nx = (x / viewport_width) * 2.0 - 1.0;
        let ny = (y / viewport_height) * 2.0 - 1.0;

        self.target.x = nx.clamp(-1.0, 1.0) * self.config.damping[0];
        self.target.y = -ny.clamp(-1.0, 1.0) * self.config.damping[1];
    }

    /// One exponential-approach step; called once per frame tick.
    pub fn tick(&mut self) {
        let smoothing = self.config.smoothing;
        let goal_x = self.target.x * self.config.target_scale[0];
        let goal_y = self.config.base_position[1] + self.target.y * self.config.target_scale[1];

        self.position.x += (goal_x - self.position.x) * smoothing;
        self.position.y += (goal_y - self.position.y) * smoothing;
    }

    pub fn set_aspect(&mut self, width: u32, height: u32) {
        self.aspect = aspect_ratio(width, height);
    }

    pub fn aspect(&self) -> f32 {
        self.aspect
    }

    pub fn position(&self) -> Vec3 {
        self.position
    }

    pub fn target(&self) -> Vec2 {
        self.target
    }

    /// View matrix aimed at the world origin.
    pub fn view(&self) -> Mat4 {
        Mat4::look_at_rh(self.position, Vec3::ZERO, Vec3::Y)
    }

    pub fn projection(&self) -> Mat4 {
        Mat4::perspective_rh(
            self.config.fov_degrees.to_radians(),
            self.aspect,
            self.config.near,
            self.config.far,
        )
    }

    pub fn view_proj(&self) -> Mat4 {
        self.projection() * self.view()
    }
}

fn aspect_ratio(width: u32, height: u32) -> f32 {
    if height == 0 {
        1.0
    } else {
        width as f32 / height as f32
    }
}
