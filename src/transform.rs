//! View transform and coordinate mapping.
//!
//! Three coordinate frames are in play:
//! * **screen** — raw touch coordinates in the host viewport;
//! * **canvas** — screen divided by the effective scale (used by the live
//!   preview and the clone marker);
//! * **image** — pixels of the source bitmap / backing raster, additionally
//!   compensated for centring and pan.
//!
//! All transform state lives in one explicit [`ViewTransform`] value that is
//! recomputed on viewport resize and never reached through globals.

use crate::geometry::Point;

/// Pan/zoom/fit state plus the pure arithmetic converting between frames.
#[derive(Clone, Debug)]
pub struct ViewTransform {
    image_w: u32,
    image_h: u32,
    viewport_w: f32,
    viewport_h: f32,
    /// Scale that fits the whole image inside the viewport.
    fit_scale: f32,
    /// Image dimensions after fit scaling (before user zoom).
    fitted_w: f32,
    fitted_h: f32,
    /// Offset that centres the fitted image in the viewport.
    centre_x: f32,
    centre_y: f32,
    /// User zoom multiplier on top of the fit scale.
    pub zoom: f32,
    /// User pan offset in screen pixels.
    pub pan_x: f32,
    pub pan_y: f32,
}

impl ViewTransform {
    pub fn new(image_w: u32, image_h: u32) -> Self {
        Self {
            image_w,
            image_h,
            viewport_w: 0.0,
            viewport_h: 0.0,
            fit_scale: 1.0,
            fitted_w: image_w as f32,
            fitted_h: image_h as f32,
            centre_x: 0.0,
            centre_y: 0.0,
            zoom: 1.0,
            pan_x: 0.0,
            pan_y: 0.0,
        }
    }

    /// Recompute fit scale and centring for a new viewport size. The axis
    /// with the larger image/viewport ratio is fitted exactly; the other axis
    /// is centred with `(viewport - scaled_image) / 2`.
    pub fn set_viewport(&mut self, vw: f32, vh: f32) {
        self.viewport_w = vw;
        self.viewport_h = vh;
        let w = self.image_w as f32;
        let h = self.image_h as f32;
        let nw = w / vw;
        let nh = h / vh;
        if nw > nh {
            self.fit_scale = 1.0 / nw;
            self.fitted_w = vw;
            self.fitted_h = h * self.fit_scale;
        } else {
            self.fit_scale = 1.0 / nh;
            self.fitted_w = w * self.fit_scale;
            self.fitted_h = vh;
        }
        self.centre_x = (vw - self.fitted_w) / 2.0;
        self.centre_y = (vh - self.fitted_h) / 2.0;
    }

    /// Effective scale: fit-to-screen scale times user zoom.
    pub fn scale(&self) -> f32 {
        self.fit_scale * self.zoom
    }

    pub fn fit_scale(&self) -> f32 {
        self.fit_scale
    }

    pub fn viewport(&self) -> (f32, f32) {
        (self.viewport_w, self.viewport_h)
    }

    /// Combined centring + pan offset in screen pixels.
    pub fn offset(&self) -> Point {
        Point::new(self.centre_x + self.pan_x, self.centre_y + self.pan_y)
    }

    /// Screen coordinates → image (bitmap pixel) coordinates.
    pub fn to_image(&self, p: Point) -> Point {
        let s = self.scale();
        Point::new(
            (p.x - self.centre_x - self.pan_x) / s,
            (p.y - self.centre_y - self.pan_y) / s,
        )
    }

    /// Image coordinates → screen coordinates. Inverse of [`to_image`].
    ///
    /// [`to_image`]: ViewTransform::to_image
    pub fn to_screen(&self, p: Point) -> Point {
        let s = self.scale();
        Point::new(
            p.x * s + self.centre_x + self.pan_x,
            p.y * s + self.centre_y + self.pan_y,
        )
    }

    /// Screen coordinates → canvas coordinates (scale only, no offsets).
    pub fn to_canvas(&self, p: Point) -> Point {
        let s = self.scale();
        Point::new(p.x / s, p.y / s)
    }

    /// Clamp the pan offset so the image cannot be scrolled off-screen.
    /// Returns true if the pan was adjusted.
    ///
    /// Two regimes: zoomed in (> 1), the scaled image must keep covering the
    /// fitted region so no gap opens at any edge; zoomed out (<= 1), the
    /// image must stay inside the fitted region.
    pub fn clamp_pan(&mut self) -> bool {
        let mut changed = false;
        if self.zoom > 1.0 {
            if self.pan_x > 0.0 {
                self.pan_x = 0.0;
                changed = true;
            } else if self.pan_x + self.fitted_w * self.zoom < self.fitted_w {
                self.pan_x = self.fitted_w - self.fitted_w * self.zoom;
                changed = true;
            }
            if self.pan_y > 0.0 {
                self.pan_y = 0.0;
                changed = true;
            } else if self.pan_y + self.fitted_h * self.zoom < self.fitted_h {
                self.pan_y = self.fitted_h - self.fitted_h * self.zoom;
                changed = true;
            }
        } else {
            let scaled_w = self.image_w as f32 * self.scale();
            let scaled_h = self.image_h as f32 * self.scale();
            if self.pan_x + scaled_w > self.fitted_w {
                self.pan_x = self.fitted_w - scaled_w;
                changed = true;
            } else if self.pan_x < 0.0 {
                self.pan_x = 0.0;
                changed = true;
            }
            if self.pan_y + scaled_h > self.fitted_h {
                self.pan_y = self.fitted_h - scaled_h;
                changed = true;
            } else if self.pan_y < 0.0 {
                self.pan_y = 0.0;
                changed = true;
            }
        }
        changed
    }
}
