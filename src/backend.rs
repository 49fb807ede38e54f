//! The renderer backend interface.
//!
//! Rasterization itself lives outside this crate.  A backend receives a
//! fully prepared document (recolored, restroked, grid-aligned) and turns
//! it into premultiplied ARGB rasters; everything else is the pipeline's
//! job.  Backends are picked dynamically, so they are used as trait
//! objects.

use crate::bitmap::Bitmap;
use crate::config::Animation;
use crate::document::Document;
use crate::error::Error;

pub trait RendererBackend {
    /// Loads a prepared document for the renders that follow.
    ///
    /// The backend must not retain references to the document across calls;
    /// the pipeline mutates and replaces documents freely between renders.
    fn set_document(&mut self, document: &Document) -> Result<(), Error>;

    /// Renders the current document onto a square raster of `target_size`
    /// pixels, premultiplied ARGB.
    fn render_static(&mut self, target_size: u32) -> Result<Bitmap, Error>;

    /// Renders an animation by sampling the SVG animation clock at
    /// `t = (i - 1) / frameRate` for `i = 1..=ceil(duration * frameRate)`,
    /// passing each frame number and raster to `emit`.
    ///
    /// Backends without animation support keep this default: a single
    /// frame at `t = 0`, with a warning.
    fn render_animation(
        &mut self,
        target_size: u32,
        animation: &Animation,
        emit: &mut dyn FnMut(u32, Bitmap) -> Result<(), Error>,
    ) -> Result<(), Error> {
        tracing::warn!(
            "backend cannot sample SVG animations; rendering \"{}\" at t=0 only",
            animation.name
        );
        let bitmap = self.render_static(target_size)?;
        emit(1, bitmap)
    }

    /// Resets any imperative width/height/viewBox overrides applied during
    /// the previous render.
    fn reset_view(&mut self);
}
