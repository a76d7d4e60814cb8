use std::sync::Arc;

use clap::Parser;
use winit::{
    application::ApplicationHandler,
    event::{ElementState, KeyEvent, WindowEvent},
    event_loop::{ActiveEventLoop, EventLoop},
    keyboard::{KeyCode, PhysicalKey},
    window::{Window, WindowId},
};

use space_backdrop::cli::Cli;
use space_backdrop::config::BackdropConfig;
use space_backdrop::lifecycle::Backdrop;

type Result<T> = std::result::Result<T, Box<dyn std::error::Error>>;

struct App {
    window: Option<Arc<Window>>,
    backdrop: Backdrop,
    initial_size: (u32, u32),
}

impl App {
    fn new(config: BackdropConfig, initial_size: (u32, u32)) -> Self {
        Self {
            window: None,
            backdrop: Backdrop::new(config),
            initial_size,
        }
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_none() {
            let window = match event_loop.create_window(
                Window::default_attributes()
                    .with_title("Space Backdrop")
                    .with_inner_size(winit::dpi::LogicalSize::new(
                        self.initial_size.0,
                        self.initial_size.1,
                    )),
            ) {
                Ok(w) => Arc::new(w),
                Err(e) => {
                    eprintln!("Failed to create window: {}", e);
                    event_loop.exit();
                    return;
                }
            };

            if let Err(e) = self.backdrop.mount(window.clone()) {
                eprintln!("Failed to initialize backdrop: {}", e);
                event_loop.exit();
                return;
            }

            self.window = Some(window);
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        match event {
            WindowEvent::CloseRequested
            | WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        state: ElementState::Pressed,
                        physical_key: PhysicalKey::Code(KeyCode::Escape),
                        ..
                    },
                ..
            } => {
                self.backdrop.unmount();
                event_loop.exit();
            }
            WindowEvent::Resized(size) => {
                self.backdrop.handle_resize(size.width, size.height);
            }
            WindowEvent::CursorMoved { position, .. } => {
                if let Some(window) = &self.window {
                    let size = window.inner_size();
                    self.backdrop.handle_pointer_move(
                        position.x as f32,
                        position.y as f32,
                        size.width as f32,
                        size.height as f32,
                    );
                }
            }
            WindowEvent::Occluded(occluded) => {
                self.backdrop.set_visible(!occluded);
            }
            WindowEvent::RedrawRequested => {
                if let Err(e) = self.backdrop.tick() {
                    eprintln!("Render error: {}", e);
                }
            }
            _ => {}
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(window) = &self.window {
            window.request_redraw();
        }
    }
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => BackdropConfig::from_json_file(path)?,
        None => BackdropConfig::default(),
    };
    if let Some(stars) = cli.stars {
        config.starfield.count = stars;
    }
    if cli.no_bloom {
        // The pass list stays intact; the composite just adds no glow.
        config.bloom.strength = 0.0;
    }

    let event_loop = EventLoop::new()?;
    let mut app = App::new(config, (cli.width, cli.height));
    event_loop.run_app(&mut app)?;

    Ok(())
}
