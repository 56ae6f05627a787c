//! Bounding-box overlay geometry.
//!
//! Predictions carry boxes in the pixel space of the uploaded image. The
//! operator sees that image scaled to whatever size the view renders it at,
//! so boxes are mapped through a `DisplayMapping` before drawing.

use crate::predict::{BoundingBox, PredictionBatch};

/// Relates source-image pixels to rendered display units.
///
/// Only constructible with four finite, positive dimensions.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DisplayMapping {
    source_width: f64,
    source_height: f64,
    display_width: f64,
    display_height: f64,
}

impl DisplayMapping {
    pub fn new(
        source_width: f64,
        source_height: f64,
        display_width: f64,
        display_height: f64,
    ) -> Option<Self> {
        let usable = |v: f64| v.is_finite() && v > 0.0;
        if usable(source_width)
            && usable(source_height)
            && usable(display_width)
            && usable(display_height)
        {
            Some(Self {
                source_width,
                source_height,
                display_width,
                display_height,
            })
        } else {
            None
        }
    }

    pub fn scale_x(&self) -> f64 {
        self.display_width / self.source_width
    }

    pub fn scale_y(&self) -> f64 {
        self.display_height / self.source_height
    }

    pub fn map(&self, bbox: &BoundingBox) -> OverlayRect {
        let sx = self.scale_x();
        let sy = self.scale_y();
        OverlayRect {
            left: bbox.x * sx,
            top: bbox.y * sy,
            width: bbox.w * sx,
            height: bbox.h * sy,
        }
    }
}

/// Box in display units, ready to draw.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct OverlayRect {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

/// Overlay for `bbox`, if there is a box and the layout has been measured.
pub fn overlay_for(
    bbox: Option<&BoundingBox>,
    mapping: Option<&DisplayMapping>,
) -> Option<OverlayRect> {
    Some(mapping?.map(bbox?))
}

/// Overlay for the top prediction of `batch`.
pub fn top_overlay(batch: &PredictionBatch, mapping: Option<&DisplayMapping>) -> Option<OverlayRect> {
    overlay_for(batch.top().and_then(|p| p.bbox.as_ref()), mapping)
}

/// Measured sizes of the image currently on screen.
///
/// The natural size is refreshed whenever the image's pixel dimensions are
/// read, the rendered size whenever its on-screen box is measured. Showing a
/// new image clears both, so a mapping never pairs sizes of different images.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ImageLayout {
    natural: Option<(f64, f64)>,
    rendered: Option<(f64, f64)>,
}

impl ImageLayout {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forget both measurements; call when a different image is shown.
    pub fn reset(&mut self) {
        self.natural = None;
        self.rendered = None;
    }

    pub fn set_natural_size(&mut self, width: f64, height: f64) {
        self.natural = Some((width, height));
    }

    pub fn set_rendered_size(&mut self, width: f64, height: f64) {
        self.rendered = Some((width, height));
    }

    /// Convenience for an image load: both sizes are known at once.
    pub fn image_loaded(&mut self, natural: (f64, f64), rendered: (f64, f64)) {
        self.natural = Some(natural);
        self.rendered = Some(rendered);
    }

    pub fn mapping(&self) -> Option<DisplayMapping> {
        let (sw, sh) = self.natural?;
        let (dw, dh) = self.rendered?;
        DisplayMapping::new(sw, sh, dw, dh)
    }

    pub fn overlay(&self, bbox: Option<&BoundingBox>) -> Option<OverlayRect> {
        overlay_for(bbox, self.mapping().as_ref())
    }
}
