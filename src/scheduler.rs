use crate::camera::ParallaxCamera;
use crate::overlay::{Canvas, SignalOverlay};
use crate::scene::Scene;

type Result<T> = std::result::Result<T, Box<dyn std::error::Error>>;

/// Where finished frames go. The real sink is the wgpu renderer; tests use
/// a counting mock.
pub trait FrameSink {
    /// Produce one frame. Returns `false` when the frame was skipped (for
    /// example a zero-sized viewport) so the caller does not count it.
    fn render(&mut self, scene: &Scene, camera: &ParallaxCamera) -> Result<bool>;

    /// Adopt a new viewport size before the next rendered frame.
    fn resize(&mut self, width: u32, height: u32);

    /// Take the freshly drawn overlay image. Sinks without a composite
    /// stage ignore it.
    fn update_overlay(&mut self, _canvas: Option<&Canvas>) {}
}

/// Drives one animation step per display refresh.
///
/// Ticks run strictly sequentially on the caller's thread; there is never
/// more than one frame in flight. Once stopped, later ticks do nothing, so
/// a stop issued between ticks guarantees no stray frame.
pub struct FrameScheduler {
    running: bool,
    frames: u64,
}

impl FrameScheduler {
    pub fn new() -> Self {
        Self {
            running: true,
            frames: 0,
        }
    }

    /// One tick: drain texture completions, advance orbital and star-field
    /// rotation, step the camera, render, then redraw the overlay. Nothing
    /// here blocks on I/O.
    pub fn tick(
        &mut self,
        scene: &mut Scene,
        camera: &mut ParallaxCamera,
        overlay: &mut SignalOverlay,
        sink: &mut dyn FrameSink,
    ) -> Result<()> {
        if !self.running {
            return Ok(());
        }

        scene.poll_textures();
        scene.advance_rotations();
        camera.tick();

        if sink.render(scene, camera)? {
            self.frames += 1;
        }

        overlay.draw();
        sink.update_overlay(overlay.canvas());
        Ok(())
    }

    /// Halts scheduling. Takes effect before the next tick runs.
    pub fn stop(&mut self) {
        self.running = false;
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Number of frames actually rendered (skipped ticks excluded).
    pub fn frames(&self) -> u64 {
        self.frames
    }
}

impl Default for FrameScheduler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BackdropConfig, CameraConfig, OverlayConfig};
    use crate::overlay::Canvas;
    use crate::texture::TextureLoader;
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    struct CountingSink {
        renders: u64,
        skip: bool,
        last_camera_x: f32,
    }

    impl CountingSink {
        fn new() -> Self {
            Self {
                renders: 0,
                skip: false,
                last_camera_x: f32::NAN,
            }
        }
    }

    impl FrameSink for CountingSink {
        fn render(&mut self, _scene: &Scene, camera: &ParallaxCamera) -> Result<bool> {
            if self.skip {
                return Ok(false);
            }
            self.renders += 1;
            self.last_camera_x = camera.position().x;
            Ok(true)
        }

        fn resize(&mut self, _width: u32, _height: u32) {}
    }

    fn fixture() -> (Scene, ParallaxCamera, SignalOverlay) {
        let mut config = BackdropConfig::default();
        config.starfield.count = 16;
        let mut rng = SmallRng::seed_from_u64(2);
        let loader = TextureLoader::new("textures");
        let scene = Scene::build(&config, &mut rng, &loader);
        let camera = ParallaxCamera::new(CameraConfig::default(), 800, 600);
        let overlay =
            SignalOverlay::with_seed(OverlayConfig::default(), Some(Canvas::new(64, 32)), 1);
        (scene, camera, overlay)
    }

    #[test]
    fn tick_renders_and_counts_frames() {
        let (mut scene, mut camera, mut overlay) = fixture();
        let mut scheduler = FrameScheduler::new();
        let mut sink = CountingSink::new();

        for _ in 0..5 {
            scheduler
                .tick(&mut scene, &mut camera, &mut overlay, &mut sink)
                .unwrap();
        }

        assert_eq!(scheduler.frames(), 5);
        assert_eq!(sink.renders, 5);
        // Overlay ran once per tick.
        assert!((overlay.state().phase - 5.0 * 0.04).abs() < 1e-6);
    }

    #[test]
    fn stop_prevents_any_further_frame() {
        let (mut scene, mut camera, mut overlay) = fixture();
        let mut scheduler = FrameScheduler::new();
        let mut sink = CountingSink::new();

        for _ in 0..3 {
            scheduler
                .tick(&mut scene, &mut camera, &mut overlay, &mut sink)
                .unwrap();
        }
        scheduler.stop();
        for _ in 0..10 {
            scheduler
                .tick(&mut scene, &mut camera, &mut overlay, &mut sink)
                .unwrap();
        }

        assert_eq!(scheduler.frames(), 3, "counter must freeze at stop");
        assert_eq!(sink.renders, 3);
        assert!(!scheduler.is_running());
    }

    #[test]
    fn skipped_frames_are_not_counted() {
        let (mut scene, mut camera, mut overlay) = fixture();
        let mut scheduler = FrameScheduler::new();
        let mut sink = CountingSink::new();
        sink.skip = true;

        for _ in 0..4 {
            scheduler
                .tick(&mut scene, &mut camera, &mut overlay, &mut sink)
                .unwrap();
        }

        assert_eq!(scheduler.frames(), 0);
    }

    #[test]
    fn camera_advances_before_render() {
        let (mut scene, mut camera, mut overlay) = fixture();
        camera.pointer_moved(800.0, 300.0, 800.0, 600.0);

        let mut scheduler = FrameScheduler::new();
        let mut sink = CountingSink::new();
        scheduler
            .tick(&mut scene, &mut camera, &mut overlay, &mut sink)
            .unwrap();

        // The sink must observe the post-step camera position, not the
        // mount-time position.
        assert!(sink.last_camera_x > 0.0);
        assert_eq!(sink.last_camera_x, camera.position().x);
    }

    #[test]
    fn rotations_advance_exactly_once_per_tick() {
        let (mut scene, mut camera, mut overlay) = fixture();
        let mut scheduler = FrameScheduler::new();
        let mut sink = CountingSink::new();

        let pivot = scene.rotatables()[0].node;
        let speed = scene.rotatables()[0].speed;

        for _ in 0..7 {
            scheduler
                .tick(&mut scene, &mut camera, &mut overlay, &mut sink)
                .unwrap();
        }

        let rotation = scene.node(pivot).rotation.y;
        assert!((rotation - speed * 7.0).abs() < 1e-6);
    }
}
