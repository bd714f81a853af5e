//! Rasterization boundary: the immutable per-draw parameter record handed to
//! a rasterizer, the trait the compositing engine draws through, and the
//! bundled software implementation.
//!
//! Hosts with their own rendering backend implement [`Rasterizer`] and
//! receive exactly these parameters; headless hosts and the test suite use
//! [`SoftRaster`], a coverage-based scanline rasterizer (signed distance per
//! pixel, one-pixel smoothing band, row-parallel via rayon).

use std::sync::Arc;

use image::{Rgba, RgbaImage};
use rayon::prelude::*;

use crate::geometry::{Affine, Point};
use crate::oplog::Shape;

/// Whether a primitive is stroked along its outline or filled.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PaintStyle {
    Stroke,
    Fill,
}

/// Repeat-tiled pattern sampled from a source image. `matrix` positions the
/// pattern in target space; sampling goes through its inverse.
#[derive(Clone, Debug)]
pub struct Pattern {
    pub source: Arc<RgbaImage>,
    pub matrix: Affine,
}

/// Complete paint description for one draw call. Constructed fresh per
/// operation — never a shared mutable paint object.
#[derive(Clone, Debug)]
pub struct PaintParams {
    pub stroke_width: f32,
    pub color: Rgba<u8>,
    pub style: PaintStyle,
    pub pattern: Option<Pattern>,
}

/// Style selection by shape kind: arrows and the filled variants paint
/// filled, everything else paints a stroked outline.
pub fn style_for(shape: Shape) -> PaintStyle {
    match shape {
        Shape::Arrow | Shape::FillCircle | Shape::FillRect => PaintStyle::Fill,
        Shape::Freehand | Shape::Line | Shape::HollowCircle | Shape::HollowRect => {
            PaintStyle::Stroke
        }
    }
}

/// Drawing primitives the compositing engine emits. Circle variants receive
/// centre + radius; rects receive two opposite corners; arrows run from tail
/// to tip.
pub trait Rasterizer: Send + Sync {
    fn stroke_polyline(&self, target: &mut RgbaImage, points: &[Point], paint: &PaintParams);
    fn line(&self, target: &mut RgbaImage, a: Point, b: Point, paint: &PaintParams);
    fn circle(&self, target: &mut RgbaImage, centre: Point, radius: f32, paint: &PaintParams);
    fn rect(&self, target: &mut RgbaImage, a: Point, b: Point, paint: &PaintParams);
    fn arrow(&self, target: &mut RgbaImage, a: Point, b: Point, paint: &PaintParams);
}

/// The bundled software rasterizer.
#[derive(Clone, Copy, Debug, Default)]
pub struct SoftRaster;

impl Rasterizer for SoftRaster {
    fn stroke_polyline(&self, target: &mut RgbaImage, points: &[Point], paint: &PaintParams) {
        if points.is_empty() {
            return;
        }
        let hw = paint.stroke_width * 0.5;
        let bounds = inflate(bbox_of(points), hw + 1.5);
        if points.len() == 1 {
            let p = points[0];
            composite(target, bounds, paint, move |px, py| {
                dist_to_point(px, py, p) - hw
            });
            return;
        }
        let segs: Vec<(Point, Point)> = points.windows(2).map(|w| (w[0], w[1])).collect();
        composite(target, bounds, paint, move |px, py| {
            let mut d = f32::MAX;
            for (a, b) in &segs {
                d = d.min(dist_to_segment(px, py, *a, *b));
            }
            d - hw
        });
    }

    fn line(&self, target: &mut RgbaImage, a: Point, b: Point, paint: &PaintParams) {
        let hw = paint.stroke_width * 0.5;
        let bounds = inflate(bbox_of(&[a, b]), hw + 1.5);
        composite(target, bounds, paint, move |px, py| {
            dist_to_segment(px, py, a, b) - hw
        });
    }

    fn circle(&self, target: &mut RgbaImage, centre: Point, radius: f32, paint: &PaintParams) {
        let hw = paint.stroke_width * 0.5;
        let r = radius.abs();
        let pad = r + hw + 1.5;
        let bounds = (
            centre.x - pad,
            centre.y - pad,
            centre.x + pad,
            centre.y + pad,
        );
        let style = paint.style;
        composite(target, bounds, paint, move |px, py| {
            let d = dist_to_point(px, py, centre) - r;
            match style {
                PaintStyle::Fill => d,
                PaintStyle::Stroke => d.abs() - hw,
            }
        });
    }

    fn rect(&self, target: &mut RgbaImage, a: Point, b: Point, paint: &PaintParams) {
        let hw = paint.stroke_width * 0.5;
        let (min_x, min_y) = (a.x.min(b.x), a.y.min(b.y));
        let (max_x, max_y) = (a.x.max(b.x), a.y.max(b.y));
        let bounds = inflate((min_x, min_y, max_x, max_y), hw + 1.5);
        let style = paint.style;
        composite(target, bounds, paint, move |px, py| {
            let d = sdf_rect(px, py, min_x, min_y, max_x, max_y);
            match style {
                PaintStyle::Fill => d,
                PaintStyle::Stroke => d.abs() - hw,
            }
        });
    }

    fn arrow(&self, target: &mut RgbaImage, a: Point, b: Point, paint: &PaintParams) {
        let len = a.distance(b);
        let sw = paint.stroke_width.max(1.0);
        if len < 1e-3 {
            // Degenerate arrow collapses to a dot.
            self.circle(
                target,
                a,
                sw * 0.5,
                &PaintParams {
                    style: PaintStyle::Fill,
                    ..paint.clone()
                },
            );
            return;
        }
        let ux = (b.x - a.x) / len;
        let uy = (b.y - a.y) / len;
        // Head sized relative to the stroke width, never longer than the arrow.
        let head_len = (sw * 3.0).min(len);
        let head_hw = sw;
        let shaft_hw = sw * 0.5;
        let base = Point::new(b.x - ux * head_len, b.y - uy * head_len);
        let left = Point::new(base.x - uy * head_hw, base.y + ux * head_hw);
        let right = Point::new(base.x + uy * head_hw, base.y - ux * head_hw);
        let head = [b, left, right];
        let bounds = inflate(bbox_of(&[a, b, left, right]), shaft_hw + 1.5);
        composite(target, bounds, paint, move |px, py| {
            let shaft = dist_to_segment(px, py, a, base) - shaft_hw;
            shaft.min(sdf_triangle(px, py, &head))
        });
    }
}

// ============================================================================
// Coverage compositor
// ============================================================================

struct PatternCtx<'a> {
    source: &'a RgbaImage,
    inverse: Affine,
    w: i64,
    h: i64,
}

impl PatternCtx<'_> {
    #[inline]
    fn sample(&self, px: f32, py: f32) -> Rgba<u8> {
        let p = self.inverse.apply(Point::new(px, py));
        let x = wrap(p.x.floor() as i64, self.w);
        let y = wrap(p.y.floor() as i64, self.h);
        *self.source.get_pixel(x as u32, y as u32)
    }
}

#[inline]
fn wrap(v: i64, n: i64) -> i64 {
    ((v % n) + n) % n
}

/// Evaluate `sdf` over the pixels of `bounds`, convert distance to coverage
/// with a one-pixel smoothing band, and source-over blend the paint (solid
/// color or tiled pattern) into the target. Rows run in parallel.
fn composite<F>(target: &mut RgbaImage, bounds: (f32, f32, f32, f32), paint: &PaintParams, sdf: F)
where
    F: Fn(f32, f32) -> f32 + Sync,
{
    let (tw, th) = target.dimensions();
    if tw == 0 || th == 0 {
        return;
    }
    let x0 = (bounds.0.floor() as i64).clamp(0, tw as i64) as usize;
    let y0 = (bounds.1.floor() as i64).clamp(0, th as i64) as usize;
    let x1 = (bounds.2.ceil() as i64).clamp(0, tw as i64) as usize;
    let y1 = (bounds.3.ceil() as i64).clamp(0, th as i64) as usize;
    if x0 >= x1 || y0 >= y1 {
        return;
    }

    let pattern_ctx = paint.pattern.as_ref().map(|p| PatternCtx {
        source: p.source.as_ref(),
        inverse: p.matrix.inverse(),
        w: p.source.width().max(1) as i64,
        h: p.source.height().max(1) as i64,
    });
    let solid = paint.color;

    let row_bytes = tw as usize * 4;
    let buf: &mut [u8] = target;
    buf.par_chunks_mut(row_bytes)
        .enumerate()
        .skip(y0)
        .take(y1 - y0)
        .for_each(|(y, row)| {
            let py = y as f32 + 0.5;
            for x in x0..x1 {
                let px = x as f32 + 0.5;
                let cov = smoothstep(0.5, -0.5, sdf(px, py));
                if cov <= 0.001 {
                    continue;
                }
                let color = match &pattern_ctx {
                    Some(ctx) => ctx.sample(px, py),
                    None => solid,
                };
                blend(&mut row[x * 4..x * 4 + 4], color, cov);
            }
        });
}

/// Source-over blend of `color` at `coverage` into an RGBA pixel slice.
#[inline]
fn blend(px: &mut [u8], color: Rgba<u8>, coverage: f32) {
    let a = color.0[3] as f32 / 255.0 * coverage;
    if a <= 0.0 {
        return;
    }
    let ia = 1.0 - a;
    px[0] = (color.0[0] as f32 * a + px[0] as f32 * ia).round() as u8;
    px[1] = (color.0[1] as f32 * a + px[1] as f32 * ia).round() as u8;
    px[2] = (color.0[2] as f32 * a + px[2] as f32 * ia).round() as u8;
    px[3] = (255.0 * a + px[3] as f32 * ia).round() as u8;
}

/// Smoothstep between edge0 and edge1.
#[inline]
fn smoothstep(edge0: f32, edge1: f32, x: f32) -> f32 {
    let t = ((x - edge0) / (edge1 - edge0)).clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

// ============================================================================
// Distance functions
// ============================================================================

#[inline]
fn dist_to_point(px: f32, py: f32, p: Point) -> f32 {
    let dx = px - p.x;
    let dy = py - p.y;
    (dx * dx + dy * dy).sqrt()
}

#[inline]
fn dist_to_segment(px: f32, py: f32, a: Point, b: Point) -> f32 {
    let dx = b.x - a.x;
    let dy = b.y - a.y;
    let len_sq = dx * dx + dy * dy;
    if len_sq < 1e-12 {
        return dist_to_point(px, py, a);
    }
    let t = (((px - a.x) * dx + (py - a.y) * dy) / len_sq).clamp(0.0, 1.0);
    let cx = a.x + t * dx;
    let cy = a.y + t * dy;
    ((px - cx) * (px - cx) + (py - cy) * (py - cy)).sqrt()
}

/// Signed distance to an axis-aligned rect given by its min/max corners.
#[inline]
fn sdf_rect(px: f32, py: f32, min_x: f32, min_y: f32, max_x: f32, max_y: f32) -> f32 {
    let cx = (min_x + max_x) * 0.5;
    let cy = (min_y + max_y) * 0.5;
    let hx = (max_x - min_x) * 0.5;
    let hy = (max_y - min_y) * 0.5;
    let dx = (px - cx).abs() - hx;
    let dy = (py - cy).abs() - hy;
    let outside = (dx.max(0.0) * dx.max(0.0) + dy.max(0.0) * dy.max(0.0)).sqrt();
    let inside = dx.max(dy).min(0.0);
    outside + inside
}

/// Signed distance to a triangle (any winding).
fn sdf_triangle(px: f32, py: f32, v: &[Point; 3]) -> f32 {
    let mut d = f32::MAX;
    let mut sign_flips = 0u32;
    let mut j = 2;
    for i in 0..3 {
        d = d.min(dist_to_segment(px, py, v[j], v[i]));
        let ex = v[i].x - v[j].x;
        let ey = v[i].y - v[j].y;
        let wx = px - v[j].x;
        let wy = py - v[j].y;
        if ex * wy - ey * wx < 0.0 {
            sign_flips += 1;
        }
        j = i;
    }
    // Inside iff all cross products share a sign.
    if sign_flips == 0 || sign_flips == 3 { -d } else { d }
}

fn bbox_of(points: &[Point]) -> (f32, f32, f32, f32) {
    let mut min_x = f32::MAX;
    let mut min_y = f32::MAX;
    let mut max_x = f32::MIN;
    let mut max_y = f32::MIN;
    for p in points {
        min_x = min_x.min(p.x);
        min_y = min_y.min(p.y);
        max_x = max_x.max(p.x);
        max_y = max_y.max(p.y);
    }
    (min_x, min_y, max_x, max_y)
}

fn inflate(b: (f32, f32, f32, f32), pad: f32) -> (f32, f32, f32, f32) {
    (b.0 - pad, b.1 - pad, b.2 + pad, b.3 + pad)
}

#[cfg(test)]
mod tests {
    use super::*;

    const RED: Rgba<u8> = Rgba([255, 0, 0, 255]);
    const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);

    fn white_canvas(w: u32, h: u32) -> RgbaImage {
        RgbaImage::from_pixel(w, h, WHITE)
    }

    fn solid(style: PaintStyle, width: f32) -> PaintParams {
        PaintParams {
            stroke_width: width,
            color: RED,
            style,
            pattern: None,
        }
    }

    #[test]
    fn test_style_for_shape() {
        assert_eq!(style_for(Shape::Arrow), PaintStyle::Fill);
        assert_eq!(style_for(Shape::FillCircle), PaintStyle::Fill);
        assert_eq!(style_for(Shape::FillRect), PaintStyle::Fill);
        assert_eq!(style_for(Shape::Freehand), PaintStyle::Stroke);
        assert_eq!(style_for(Shape::HollowRect), PaintStyle::Stroke);
        assert_eq!(style_for(Shape::Line), PaintStyle::Stroke);
    }

    #[test]
    fn test_line_paints_along_segment_only() {
        let mut img = white_canvas(60, 60);
        SoftRaster.line(
            &mut img,
            Point::new(10.0, 30.0),
            Point::new(50.0, 30.0),
            &solid(PaintStyle::Stroke, 4.0),
        );
        assert_eq!(*img.get_pixel(30, 30), RED);
        assert_eq!(*img.get_pixel(30, 5), WHITE);
        assert_eq!(*img.get_pixel(5, 30), WHITE);
    }

    #[test]
    fn test_filled_vs_hollow_circle() {
        let c = Point::new(30.0, 30.0);
        let mut filled = white_canvas(60, 60);
        SoftRaster.circle(&mut filled, c, 15.0, &solid(PaintStyle::Fill, 2.0));
        assert_eq!(*filled.get_pixel(30, 30), RED);

        let mut hollow = white_canvas(60, 60);
        SoftRaster.circle(&mut hollow, c, 15.0, &solid(PaintStyle::Stroke, 2.0));
        assert_eq!(*hollow.get_pixel(30, 30), WHITE); // centre untouched
        assert_eq!(*hollow.get_pixel(45, 30), RED); // on the ring
    }

    #[test]
    fn test_rect_corners_normalised() {
        // Corners given in "wrong" order still produce the same rect.
        let mut img = white_canvas(40, 40);
        SoftRaster.rect(
            &mut img,
            Point::new(30.0, 30.0),
            Point::new(10.0, 10.0),
            &solid(PaintStyle::Fill, 1.0),
        );
        assert_eq!(*img.get_pixel(20, 20), RED);
        assert_eq!(*img.get_pixel(35, 35), WHITE);
    }

    #[test]
    fn test_arrow_tip_and_shaft_filled() {
        let mut img = white_canvas(80, 40);
        SoftRaster.arrow(
            &mut img,
            Point::new(10.0, 20.0),
            Point::new(70.0, 20.0),
            &solid(PaintStyle::Fill, 4.0),
        );
        assert_eq!(*img.get_pixel(20, 20), RED); // shaft
        assert_eq!(*img.get_pixel(66, 20), RED); // inside head
        assert_eq!(*img.get_pixel(20, 5), WHITE);
    }

    #[test]
    fn test_single_point_polyline_renders_dot() {
        let mut img = white_canvas(30, 30);
        SoftRaster.stroke_polyline(
            &mut img,
            &[Point::new(15.0, 15.0)],
            &solid(PaintStyle::Stroke, 8.0),
        );
        assert_eq!(*img.get_pixel(15, 15), RED);
        assert_eq!(*img.get_pixel(2, 2), WHITE);
    }

    #[test]
    fn test_pattern_samples_through_translation() {
        // 4x4 source with a unique pixel at (1, 1).
        let mut source = RgbaImage::from_pixel(4, 4, Rgba([0, 0, 255, 255]));
        source.put_pixel(1, 1, Rgba([0, 255, 0, 255]));
        let paint = PaintParams {
            stroke_width: 1.0,
            color: RED,
            style: PaintStyle::Fill,
            pattern: Some(Pattern {
                source: Arc::new(source),
                matrix: Affine::translation(2.0, 2.0),
            }),
        };
        let mut img = white_canvas(8, 8);
        SoftRaster.rect(&mut img, Point::new(0.0, 0.0), Point::new(8.0, 8.0), &paint);
        // Target (3, 3) maps back to source (1, 1).
        assert_eq!(*img.get_pixel(3, 3), Rgba([0, 255, 0, 255]));
        // Tiling repeats every 4px.
        assert_eq!(*img.get_pixel(7, 7), Rgba([0, 255, 0, 255]));
        assert_eq!(*img.get_pixel(4, 3), Rgba([0, 0, 255, 255]));
    }
}
