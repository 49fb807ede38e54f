//! Helpers for this crate's tests.

use crate::backend::RendererBackend;
use crate::bitmap::Bitmap;
use crate::config::Animation;
use crate::document::{Document, NodeExt};
use crate::error::Error;

/// A deterministic fake renderer.
///
/// Fills the whole raster with a color derived from the target size and the
/// animation frame, so emitted files are byte-stable and distinguishable
/// without real rasterization.  Animations are sampled at the exact frame
/// count a real backend would produce.
#[derive(Default)]
pub struct StubBackend {
    /// viewBox of the last document given to [`RendererBackend::set_document`].
    pub last_view_box: Option<String>,
    pub documents_seen: usize,
    pub resets: usize,
}

impl StubBackend {
    pub fn new() -> StubBackend {
        StubBackend::default()
    }

    fn fill(target_size: u32, frame_no: u32) -> Bitmap {
        let mut bitmap = Bitmap::new(target_size, target_size);
        let pixel = 0xFF00_0000 | (target_size << 8) | (frame_no & 0xFF);
        bitmap.pixels.fill(pixel);
        bitmap
    }
}

impl RendererBackend for StubBackend {
    fn set_document(&mut self, document: &Document) -> Result<(), Error> {
        self.last_view_box = document.root().attribute("viewBox");
        self.documents_seen += 1;
        Ok(())
    }

    fn render_static(&mut self, target_size: u32) -> Result<Bitmap, Error> {
        Ok(Self::fill(target_size, 0))
    }

    fn render_animation(
        &mut self,
        target_size: u32,
        animation: &Animation,
        emit: &mut dyn FnMut(u32, Bitmap) -> Result<(), Error>,
    ) -> Result<(), Error> {
        for frame_no in 1..=animation.frame_count() {
            emit(frame_no, Self::fill(target_size, frame_no))?;
        }
        Ok(())
    }

    fn reset_view(&mut self) {
        self.resets += 1;
    }
}
