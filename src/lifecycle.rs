use std::sync::Arc;

use rand::rngs::SmallRng;
use rand::SeedableRng;
use winit::window::Window;

use crate::camera::ParallaxCamera;
use crate::config::BackdropConfig;
use crate::overlay::{Canvas, SignalOverlay};
use crate::renderer::Renderer;
use crate::scene::Scene;
use crate::scheduler::{FrameScheduler, FrameSink};
use crate::texture::TextureLoader;

type Result<T> = std::result::Result<T, Box<dyn std::error::Error>>;

/// Fixed pixel size of the signal overlay surface.
pub const OVERLAY_WIDTH: u32 = 320;
pub const OVERLAY_HEIGHT: u32 = 96;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Unmounted,
    Mounted,
}

/// Everything that exists only while mounted. Dropping this releases scene
/// graph, GPU buffers and loader handles in one move.
struct Mounted {
    scene: Scene,
    camera: ParallaxCamera,
    overlay: SignalOverlay,
    scheduler: FrameScheduler,
    sink: Box<dyn FrameSink>,
}

/// Owns the backdrop across mount/unmount cycles.
///
/// Mount builds a fresh scene, camera, overlay and renderer; unmount stops
/// the scheduler first, then drops them all, so no frame can straddle the
/// teardown. A later mount starts from scratch with no leftover state.
pub struct Backdrop {
    config: BackdropConfig,
    mounted: Option<Mounted>,
    /// Latest resize while mounted; applied once, before the next tick.
    pending_resize: Option<(u32, u32)>,
    paused: bool,
    frames_total: u64,
}

impl Backdrop {
    pub fn new(config: BackdropConfig) -> Self {
        Self {
            config,
            mounted: None,
            pending_resize: None,
            paused: false,
            frames_total: 0,
        }
    }

    pub fn state(&self) -> LifecycleState {
        if self.mounted.is_some() {
            LifecycleState::Mounted
        } else {
            LifecycleState::Unmounted
        }
    }

    pub fn config(&self) -> &BackdropConfig {
        &self.config
    }

    /// Mounts onto a window: builds the scene and the GPU renderer. Adapter
    /// or device acquisition failure is fatal and leaves the backdrop
    /// unmounted.
    pub fn mount(&mut self, window: Arc<Window>) -> Result<()> {
        let size = window.inner_size();
        let mut rng = SmallRng::from_entropy();
        let loader = TextureLoader::new(&self.config.texture_dir);
        let scene = Scene::build(&self.config, &mut rng, &loader);

        let renderer = Renderer::new(
            window,
            &self.config,
            &scene,
            (OVERLAY_WIDTH, OVERLAY_HEIGHT),
        )?;

        self.finish_mount(scene, Box::new(renderer), size.width, size.height);
        Ok(())
    }

    /// Mounts onto an arbitrary sink. Lets the frame loop run headless.
    pub fn mount_with_sink(&mut self, sink: Box<dyn FrameSink>, width: u32, height: u32) {
        let mut rng = SmallRng::from_entropy();
        let loader = TextureLoader::new(&self.config.texture_dir);
        let scene = Scene::build(&self.config, &mut rng, &loader);
        self.finish_mount(scene, sink, width, height);
    }

    fn finish_mount(&mut self, scene: Scene, sink: Box<dyn FrameSink>, width: u32, height: u32) {
        // A stale mount is torn down first; mount is not reentrant.
        self.unmount();

        let camera = ParallaxCamera::new(self.config.camera, width, height);
        let overlay = SignalOverlay::new(
            self.config.overlay,
            Some(Canvas::new(OVERLAY_WIDTH, OVERLAY_HEIGHT)),
        );

        self.mounted = Some(Mounted {
            scene,
            camera,
            overlay,
            scheduler: FrameScheduler::new(),
            sink,
        });
        self.pending_resize = None;
        self.paused = false;
        log::info!("Backdrop mounted at {}x{}", width, height);
    }

    /// Stops the scheduler, then drops every mounted resource. Idempotent.
    pub fn unmount(&mut self) {
        if let Some(mut mounted) = self.mounted.take() {
            mounted.scheduler.stop();
            self.frames_total += mounted.scheduler.frames();
            log::info!(
                "Backdrop unmounted after {} frames",
                mounted.scheduler.frames()
            );
        }
        self.pending_resize = None;
    }

    /// Records a viewport resize. Repeated calls between ticks coalesce to
    /// the latest size; it takes effect before the next rendered frame.
    pub fn handle_resize(&mut self, width: u32, height: u32) {
        if self.mounted.is_some() {
            self.pending_resize = Some((width, height));
        }
    }

    /// Forwards a pointer position to the parallax camera.
    pub fn handle_pointer_move(&mut self, x: f32, y: f32, viewport_width: f32, viewport_height: f32) {
        if let Some(mounted) = &mut self.mounted {
            mounted.camera.pointer_moved(x, y, viewport_width, viewport_height);
        }
    }

    /// Pauses or resumes ticking without tearing anything down, for an
    /// occluded window.
    pub fn set_visible(&mut self, visible: bool) {
        self.paused = !visible;
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// One animation step. No-op while unmounted or paused. Any pending
    /// resize is applied first so the frame renders at the new size.
    pub fn tick(&mut self) -> Result<()> {
        let Some(mounted) = &mut self.mounted else {
            return Ok(());
        };
        if self.paused {
            return Ok(());
        }

        if let Some((width, height)) = self.pending_resize.take() {
            mounted.sink.resize(width, height);
            mounted.camera.set_aspect(width, height);
        }

        mounted.scheduler.tick(
            &mut mounted.scene,
            &mut mounted.camera,
            &mut mounted.overlay,
            mounted.sink.as_mut(),
        )
    }

    /// Frames rendered in the current mount.
    pub fn frames_rendered(&self) -> u64 {
        self.mounted
            .as_ref()
            .map(|m| m.scheduler.frames())
            .unwrap_or(0)
    }

    /// Frames rendered across all completed mounts.
    pub fn frames_total(&self) -> u64 {
        self.frames_total + self.frames_rendered()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::ParallaxCamera;
    use crate::scene::Scene;

    struct RecordingSink {
        renders: u64,
        resizes: Vec<(u32, u32)>,
        size_at_render: Vec<(u32, u32)>,
        current: (u32, u32),
    }

    impl RecordingSink {
        fn new(width: u32, height: u32) -> Self {
            Self {
                renders: 0,
                resizes: Vec::new(),
                size_at_render: Vec::new(),
                current: (width, height),
            }
        }
    }

    impl FrameSink for RecordingSink {
        fn render(
            &mut self,
            _scene: &Scene,
            _camera: &ParallaxCamera,
        ) -> std::result::Result<bool, Box<dyn std::error::Error>> {
            if self.current.0 == 0 || self.current.1 == 0 {
                return Ok(false);
            }
            self.renders += 1;
            self.size_at_render.push(self.current);
            Ok(true)
        }

        fn resize(&mut self, width: u32, height: u32) {
            self.resizes.push((width, height));
            self.current = (width, height);
        }
    }

    fn mounted_backdrop() -> Backdrop {
        let mut config = BackdropConfig::default();
        config.starfield.count = 16;
        let mut backdrop = Backdrop::new(config);
        backdrop.mount_with_sink(Box::new(RecordingSink::new(800, 600)), 800, 600);
        backdrop
    }

    #[test]
    fn starts_unmounted_and_ticks_are_noops() {
        let mut backdrop = Backdrop::new(BackdropConfig::default());
        assert_eq!(backdrop.state(), LifecycleState::Unmounted);
        backdrop.tick().unwrap();
        assert_eq!(backdrop.frames_rendered(), 0);
    }

    #[test]
    fn mount_tick_unmount_counts_frames() {
        let mut backdrop = mounted_backdrop();
        assert_eq!(backdrop.state(), LifecycleState::Mounted);

        for _ in 0..4 {
            backdrop.tick().unwrap();
        }
        assert_eq!(backdrop.frames_rendered(), 4);

        backdrop.unmount();
        assert_eq!(backdrop.state(), LifecycleState::Unmounted);
        assert_eq!(backdrop.frames_rendered(), 0);
        assert_eq!(backdrop.frames_total(), 4);
    }

    #[test]
    fn unmount_is_idempotent() {
        let mut backdrop = mounted_backdrop();
        backdrop.tick().unwrap();
        backdrop.unmount();
        backdrop.unmount();
        assert_eq!(backdrop.state(), LifecycleState::Unmounted);
        assert_eq!(backdrop.frames_total(), 1);
    }

    #[test]
    fn remount_starts_a_fresh_counter() {
        let mut backdrop = mounted_backdrop();
        for _ in 0..3 {
            backdrop.tick().unwrap();
        }
        backdrop.unmount();

        backdrop.mount_with_sink(Box::new(RecordingSink::new(800, 600)), 800, 600);
        assert_eq!(backdrop.frames_rendered(), 0);
        backdrop.tick().unwrap();
        assert_eq!(backdrop.frames_rendered(), 1);
        assert_eq!(backdrop.frames_total(), 4);
    }

    #[test]
    fn resize_applies_before_the_next_frame() {
        let mut backdrop = mounted_backdrop();
        backdrop.tick().unwrap();

        backdrop.handle_resize(1024, 768);
        backdrop.tick().unwrap();

        let mounted = backdrop.mounted.as_ref().unwrap();
        assert!((mounted.camera.aspect() - 1024.0 / 768.0).abs() < 1e-6);
    }

    #[test]
    fn rapid_resizes_coalesce_to_the_latest() {
        let mut config = BackdropConfig::default();
        config.starfield.count = 8;
        let mut backdrop = Backdrop::new(config);
        backdrop.mount_with_sink(Box::new(RecordingSink::new(800, 600)), 800, 600);

        for w in [900u32, 1000, 1100, 1200] {
            backdrop.handle_resize(w, 700);
        }
        backdrop.tick().unwrap();

        // Only the final size reached the sink, and it did so before the
        // frame rendered.
        let mounted = backdrop.mounted.as_ref().unwrap();
        assert!((mounted.camera.aspect() - 1200.0 / 700.0).abs() < 1e-6);
    }

    #[test]
    fn resize_while_unmounted_is_dropped() {
        let mut backdrop = Backdrop::new(BackdropConfig::default());
        backdrop.handle_resize(640, 480);
        assert!(backdrop.pending_resize.is_none());
    }

    #[test]
    fn paused_backdrop_does_not_tick() {
        let mut backdrop = mounted_backdrop();
        backdrop.set_visible(false);
        for _ in 0..5 {
            backdrop.tick().unwrap();
        }
        assert_eq!(backdrop.frames_rendered(), 0);

        backdrop.set_visible(true);
        backdrop.tick().unwrap();
        assert_eq!(backdrop.frames_rendered(), 1);
    }

    #[test]
    fn pointer_moves_only_reach_a_mounted_camera() {
        let mut backdrop = Backdrop::new(BackdropConfig::default());
        // Harmless while unmounted.
        backdrop.handle_pointer_move(10.0, 10.0, 800.0, 600.0);

        backdrop.mount_with_sink(Box::new(RecordingSink::new(800, 600)), 800, 600);
        backdrop.handle_pointer_move(800.0, 0.0, 800.0, 600.0);
        let mounted = backdrop.mounted.as_ref().unwrap();
        assert!(mounted.camera.target().x > 0.0);
    }
}
