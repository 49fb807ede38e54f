//! `resvg` rendering backend.
//!
//! A thin adapter over `resvg`/`usvg`: the prepared document is serialized
//! and re-parsed per render, which keeps this crate's DOM independent of
//! usvg's read-only tree.  `resvg` has no SVG animation clock, so animated
//! cursors fall back to the trait's single-frame default.

use resvg::{tiny_skia, usvg};

use crate::backend::RendererBackend;
use crate::bitmap::Bitmap;
use crate::document::Document;
use crate::error::Error;

#[derive(Default)]
pub struct ResvgBackend {
    svg: Option<String>,
}

impl ResvgBackend {
    pub fn new() -> ResvgBackend {
        ResvgBackend::default()
    }
}

impl RendererBackend for ResvgBackend {
    fn set_document(&mut self, document: &Document) -> Result<(), Error> {
        self.svg = Some(document.to_string());
        Ok(())
    }

    fn render_static(&mut self, target_size: u32) -> Result<Bitmap, Error> {
        let svg = self
            .svg
            .as_deref()
            .ok_or(Error::InvalidState("render without a document"))?;

        let tree = usvg::Tree::from_str(svg, &usvg::Options::default())
            .map_err(|e| Error::Backend(e.to_string()))?;

        let mut pixmap = tiny_skia::Pixmap::new(target_size, target_size)
            .ok_or_else(|| Error::Backend(String::from("zero-sized raster")))?;

        let size = tree.size();
        let scale_x = target_size as f32 / size.width();
        let scale_y = target_size as f32 / size.height();
        resvg::render(
            &tree,
            tiny_skia::Transform::from_scale(scale_x, scale_y),
            &mut pixmap.as_mut(),
        );

        // tiny-skia is premultiplied RGBA; repack into ARGB words.
        let pixels = pixmap
            .data()
            .chunks_exact(4)
            .map(|px| {
                (u32::from(px[3]) << 24)
                    | (u32::from(px[0]) << 16)
                    | (u32::from(px[1]) << 8)
                    | u32::from(px[2])
            })
            .collect();

        Ok(Bitmap::from_pixels(target_size, target_size, pixels))
    }

    fn reset_view(&mut self) {
        // Renders are stateless here: the document is re-parsed with the
        // written viewBox each time, so there is nothing to undo.
    }
}
