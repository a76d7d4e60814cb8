use space_backdrop::camera::ParallaxCamera;
use space_backdrop::config::BackdropConfig;
use space_backdrop::lifecycle::{Backdrop, LifecycleState};
use space_backdrop::overlay::Canvas;
use space_backdrop::scene::Scene;
use space_backdrop::scheduler::FrameSink;

use std::cell::RefCell;
use std::rc::Rc;

/// What the sink observed, shared with the test body.
#[derive(Default)]
struct SinkLog {
    renders: u64,
    resizes: Vec<(u32, u32)>,
    render_sizes: Vec<(u32, u32)>,
    overlay_frames: u64,
    overlay_lit: bool,
    camera_x: Vec<f32>,
}

struct LoggingSink {
    log: Rc<RefCell<SinkLog>>,
    current: (u32, u32),
}

impl LoggingSink {
    fn new(width: u32, height: u32) -> (Self, Rc<RefCell<SinkLog>>) {
        let log = Rc::new(RefCell::new(SinkLog::default()));
        (
            Self {
                log: log.clone(),
                current: (width, height),
            },
            log,
        )
    }
}

impl FrameSink for LoggingSink {
    fn render(
        &mut self,
        _scene: &Scene,
        camera: &ParallaxCamera,
    ) -> Result<bool, Box<dyn std::error::Error>> {
        if self.current.0 == 0 || self.current.1 == 0 {
            return Ok(false);
        }
        let mut log = self.log.borrow_mut();
        log.renders += 1;
        log.render_sizes.push(self.current);
        log.camera_x.push(camera.position().x);
        Ok(true)
    }

    fn resize(&mut self, width: u32, height: u32) {
        self.current = (width, height);
        self.log.borrow_mut().resizes.push((width, height));
    }

    fn update_overlay(&mut self, canvas: Option<&Canvas>) {
        let mut log = self.log.borrow_mut();
        log.overlay_frames += 1;
        if let Some(canvas) = canvas {
            log.overlay_lit = canvas.pixels().chunks_exact(4).any(|p| p[3] != 0);
        }
    }
}

fn small_config() -> BackdropConfig {
    let mut config = BackdropConfig::default();
    config.starfield.count = 32;
    config
}

#[test]
fn full_mount_animate_unmount_cycle() {
    let (sink, log) = LoggingSink::new(800, 600);
    let mut backdrop = Backdrop::new(small_config());
    assert_eq!(backdrop.state(), LifecycleState::Unmounted);

    backdrop.mount_with_sink(Box::new(sink), 800, 600);
    assert_eq!(backdrop.state(), LifecycleState::Mounted);

    for _ in 0..10 {
        backdrop.tick().unwrap();
    }
    assert_eq!(backdrop.frames_rendered(), 10);
    assert_eq!(log.borrow().renders, 10);

    backdrop.unmount();
    assert_eq!(backdrop.state(), LifecycleState::Unmounted);

    // Further ticks render nothing.
    for _ in 0..5 {
        backdrop.tick().unwrap();
    }
    assert_eq!(log.borrow().renders, 10);
    assert_eq!(backdrop.frames_total(), 10);
}

#[test]
fn overlay_reaches_the_sink_with_waveform_pixels() {
    let (sink, log) = LoggingSink::new(640, 480);
    let mut backdrop = Backdrop::new(small_config());
    backdrop.mount_with_sink(Box::new(sink), 640, 480);

    backdrop.tick().unwrap();

    let log = log.borrow();
    assert_eq!(log.overlay_frames, 1);
    assert!(log.overlay_lit, "overlay canvas should contain the waveform");
}

#[test]
fn resize_reaches_the_sink_before_the_next_render() {
    let (sink, log) = LoggingSink::new(800, 600);
    let mut backdrop = Backdrop::new(small_config());
    backdrop.mount_with_sink(Box::new(sink), 800, 600);

    backdrop.tick().unwrap();
    backdrop.handle_resize(1024, 768);
    backdrop.tick().unwrap();

    let log = log.borrow();
    assert_eq!(log.resizes, vec![(1024, 768)]);
    assert_eq!(log.render_sizes, vec![(800, 600), (1024, 768)]);
}

#[test]
fn burst_of_resizes_collapses_to_one() {
    let (sink, log) = LoggingSink::new(800, 600);
    let mut backdrop = Backdrop::new(small_config());
    backdrop.mount_with_sink(Box::new(sink), 800, 600);

    for width in [810u32, 820, 830, 840, 850] {
        backdrop.handle_resize(width, 600);
    }
    backdrop.tick().unwrap();

    let log = log.borrow();
    assert_eq!(log.resizes, vec![(850, 600)], "only the latest size applies");
    assert_eq!(log.render_sizes, vec![(850, 600)]);
}

#[test]
fn zero_size_viewport_skips_frames_without_error() {
    let (sink, log) = LoggingSink::new(800, 600);
    let mut backdrop = Backdrop::new(small_config());
    backdrop.mount_with_sink(Box::new(sink), 800, 600);

    backdrop.handle_resize(0, 0);
    for _ in 0..3 {
        backdrop.tick().unwrap();
    }
    assert_eq!(log.borrow().renders, 0);
    assert_eq!(backdrop.frames_rendered(), 0);

    // A real size resumes rendering.
    backdrop.handle_resize(400, 300);
    backdrop.tick().unwrap();
    assert_eq!(log.borrow().renders, 1);
}

#[test]
fn remount_builds_an_equivalent_scene_with_fresh_counters() {
    let (first_sink, _) = LoggingSink::new(800, 600);
    let mut backdrop = Backdrop::new(small_config());
    backdrop.mount_with_sink(Box::new(first_sink), 800, 600);
    for _ in 0..7 {
        backdrop.tick().unwrap();
    }
    backdrop.unmount();

    let (second_sink, log) = LoggingSink::new(800, 600);
    backdrop.mount_with_sink(Box::new(second_sink), 800, 600);
    assert_eq!(backdrop.frames_rendered(), 0);

    backdrop.tick().unwrap();
    assert_eq!(log.borrow().renders, 1);
    assert_eq!(backdrop.frames_total(), 8);
}

#[test]
fn pointer_parallax_flows_through_to_rendered_frames() {
    let (sink, log) = LoggingSink::new(800, 600);
    let mut backdrop = Backdrop::new(small_config());
    backdrop.mount_with_sink(Box::new(sink), 800, 600);

    // Pointer at the far right: target x = 1.0 * 0.6, goal x = 6.0.
    backdrop.handle_pointer_move(800.0, 300.0, 800.0, 600.0);
    for _ in 0..400 {
        backdrop.tick().unwrap();
    }

    let log = log.borrow();
    let xs = &log.camera_x;
    assert!(xs.windows(2).all(|w| w[1] >= w[0] - 1e-6), "drift is monotone");
    assert!(*xs.last().unwrap() > 5.9, "converged near the damped goal");
    assert!(xs.iter().all(|&x| x <= 6.0 + 1e-4), "never overshoots");
}
