pub mod body;
pub mod camera;
pub mod cli;
pub mod config;
pub mod lifecycle;
pub mod overlay;
pub mod pipeline;
pub mod renderer;
pub mod scene;
pub mod scheduler;
pub mod starfield;
pub mod texture;

pub use config::BackdropConfig;
pub use lifecycle::{Backdrop, LifecycleState};
pub use scheduler::{FrameScheduler, FrameSink};
