use anyhow::{ensure, Context, Result};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{channel, Receiver, TryRecvError};
use std::sync::Arc;
use std::thread;

/// Decoded RGBA8 image, shared between the scene and the renderer.
#[derive(Debug, Clone, PartialEq)]
pub struct TextureImage {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

/// One-shot handle for an in-flight texture load.
///
/// The completion event is consumed exactly once; a failed or missing
/// texture resolves to `Unavailable`, never an error.
pub struct PendingTexture {
    rx: Receiver<Option<Arc<TextureImage>>>,
}

/// Result of polling a pending load without blocking.
pub enum TexturePoll {
    /// Worker still running; check again next tick.
    Pending,
    Loaded(Arc<TextureImage>),
    /// Load failed or the asset does not exist; keep the base color.
    Unavailable,
}

impl PendingTexture {
    /// Non-blocking poll, safe to call from the frame tick.
    pub fn poll(&self) -> TexturePoll {
        match self.rx.try_recv() {
            Ok(Some(image)) => TexturePoll::Loaded(image),
            Ok(None) => TexturePoll::Unavailable,
            Err(TryRecvError::Empty) => TexturePoll::Pending,
            Err(TryRecvError::Disconnected) => TexturePoll::Unavailable,
        }
    }

    /// Block until the load settles. Test/tool helper; the frame loop only
    /// ever polls.
    pub fn wait(self) -> Option<Arc<TextureImage>> {
        self.rx.recv().unwrap_or(None)
    }
}

/// Issues asynchronous texture loads against a fixed base directory.
///
/// Each request runs on its own worker thread so concurrent body creation
/// never serializes on texture I/O.
pub struct TextureLoader {
    base_dir: PathBuf,
}

impl TextureLoader {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    /// Kick off a load for `textures/<name>` and return immediately.
    pub fn request(&self, name: &str) -> PendingTexture {
        let path = self.base_dir.join(name);
        let (tx, rx) = channel();

        thread::spawn(move || {
            let outcome = match load_texture_file(&path) {
                Ok(image) => {
                    log::debug!("Loaded texture {:?} ({}x{})", path, image.width, image.height);
                    Some(Arc::new(image))
                }
                Err(e) => {
                    log::warn!("Texture {:?} unavailable, using base color: {:#}", path, e);
                    None
                }
            };
            // The receiver may already be gone if the scene unmounted.
            let _ = tx.send(outcome);
        });

        PendingTexture { rx }
    }
}

fn load_texture_file(path: &Path) -> Result<TextureImage> {
    let image = image::open(path).with_context(|| format!("Failed to open image {:?}", path))?;
    let rgba = image.to_rgba8();
    let (width, height) = rgba.dimensions();

    ensure!(width > 0 && height > 0, "image {:?} has zero extent", path);

    Ok(TextureImage {
        width,
        height,
        pixels: rgba.into_raw(),
    })
}
