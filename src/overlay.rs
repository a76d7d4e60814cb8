use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use crate::config::OverlayConfig;

/// RGBA pixel surface for the 2D overlay.
#[derive(Clone)]
pub struct Canvas {
    pixels: Vec<u8>,
    width: u32,
    height: u32,
}

impl Canvas {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            pixels: vec![0; (width * height * 4) as usize],
            width,
            height,
        }
    }

    /// Clear to fully transparent.
    pub fn clear(&mut self) {
        self.pixels.fill(0);
    }

    fn set_pixel(&mut self, x: i32, y: i32, color: [u8; 4]) {
        if x < 0 || y < 0 || x >= self.width as i32 || y >= self.height as i32 {
            return;
        }
        let idx = ((y as u32 * self.width + x as u32) * 4) as usize;
        self.pixels[idx..idx + 4].copy_from_slice(&color);
    }

    /// Draw a line segment using Bresenham's algorithm.
    pub fn draw_line(&mut self, x1: i32, y1: i32, x2: i32, y2: i32, color: [u8; 4]) {
        let (mut x, mut y) = (x1, y1);
        let dx = (x2 - x).abs();
        let dy = -(y2 - y).abs();
        let sx = if x < x2 { 1 } else { -1 };
        let sy = if y < y2 { 1 } else { -1 };
        let mut err = dx + dy;

        loop {
            self.set_pixel(x, y, color);
            if x == x2 && y == y2 {
                break;
            }
            let e2 = 2 * err;
            if e2 >= dy {
                err += dy;
                x += sx;
            }
            if e2 <= dx {
                err += dx;
                y += sy;
            }
        }
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

/// Phase state for the waveform. Monotonic; wrapping is handled by the
/// sinusoid's own periodicity, so no modulo is applied.
#[derive(Debug, Clone, Copy, Default)]
pub struct SignalState {
    pub phase: f32,
}

/// Noisy-sinusoid overlay, independent of the 3D pipeline.
///
/// The drawing surface is an optional collaborator: without one, `draw` is
/// a no-op rather than an error.
pub struct SignalOverlay {
    config: OverlayConfig,
    canvas: Option<Canvas>,
    state: SignalState,
    rng: SmallRng,
}

impl SignalOverlay {
    pub fn new(config: OverlayConfig, canvas: Option<Canvas>) -> Self {
        Self {
            config,
            canvas,
            state: SignalState::default(),
            rng: SmallRng::from_entropy(),
        }
    }

    /// Deterministic noise source, for tests.
    pub fn with_seed(config: OverlayConfig, canvas: Option<Canvas>, seed: u64) -> Self {
        Self {
            config,
            canvas,
            state: SignalState::default(),
            rng: SmallRng::seed_from_u64(seed),
        }
    }

    /// Redraws the waveform: clear, then one continuous polyline with one
    /// sample per pixel column, two full sine periods across the width plus
    /// bounded uniform noise. Advances the phase afterward.
    pub fn draw(&mut self) {
        let Some(canvas) = self.canvas.as_mut() else {
            return;
        };

        let (width, height) = canvas.dimensions();
        if width == 0 || height == 0 {
            return;
        }

        canvas.clear();

        let color = [
            (self.config.color[0] * 255.0) as u8,
            (self.config.color[1] * 255.0) as u8,
            (self.config.color[2] * 255.0) as u8,
            255,
        ];
        let center = height as f32 / 2.0;
        let amplitude = height as f32 * self.config.amplitude;
        let noise = self.config.noise;

        let mut previous: Option<(i32, i32)> = None;
        for x in 0..width {
            let angle =
                (x as f32 / width as f32) * 2.0 * std::f32::consts::TAU + self.state.phase;
            let jitter = self.rng.gen_range(-noise..=noise);
            let y = (center + angle.sin() * amplitude + jitter) as i32;

            if let Some((px, py)) = previous {
                canvas.draw_line(px, py, x as i32, y, color);
            }
            previous = Some((x as i32, y));
        }

        self.state.phase += self.config.phase_step;
    }

    pub fn state(&self) -> SignalState {
        self.state
    }

    pub fn canvas(&self) -> Option<&Canvas> {
        self.canvas.as_ref()
    }

    pub fn has_surface(&self) -> bool {
        self.canvas.is_some()
    }
}
