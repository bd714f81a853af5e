//! Replays the operation log onto the backing raster and draws the live
//! preview stroke for the gesture in flight.
//!
//! The engine owns the backing raster exclusively: it is recreated from the
//! source image on clear/rebuild and only ever handed out as a clone. Two
//! sampling matrices are maintained for the clone/eraser pens — the
//! *committed* matrix snapshotted into operations (image-space offset only)
//! and the *preview* matrix used while drawing on the host canvas, which is
//! additionally recentred to the current viewport so the live stroke lines
//! up with what the committed pixels will be.

use std::sync::Arc;

use image::RgbaImage;

use crate::error::SurfaceError;
use crate::geometry::{Affine, Point, SmoothPath};
use crate::oplog::{Geometry, Operation, OperationLog, Pen, Shape};
use crate::raster::{PaintParams, Pattern, Rasterizer, SoftRaster, style_for};
use crate::stamp::CloneSource;
use crate::transform::ViewTransform;

/// Cached render of `source ⊕ backup tier`, keyed by the log's backup
/// generation. Keeps undo of an active-tier operation from replaying the
/// whole history.
struct BackupCache {
    generation: u64,
    raster: RgbaImage,
}

pub struct CompositingEngine {
    source: Arc<RgbaImage>,
    backing: RgbaImage,
    raster: Box<dyn Rasterizer>,
    committed_matrix: Affine,
    preview_matrix: Affine,
    backup_cache: Option<BackupCache>,
}

impl CompositingEngine {
    pub fn new(source: Arc<RgbaImage>) -> Self {
        Self::with_rasterizer(source, Box::new(SoftRaster))
    }

    /// Use a host-provided rasterizer backend instead of the bundled one.
    pub fn with_rasterizer(source: Arc<RgbaImage>, raster: Box<dyn Rasterizer>) -> Self {
        let backing = (*source).clone();
        Self {
            source,
            backing,
            raster,
            committed_matrix: Affine::IDENTITY,
            preview_matrix: Affine::IDENTITY,
            backup_cache: None,
        }
    }

    /// The composited raster (source image plus all committed operations).
    pub fn raster(&self) -> &RgbaImage {
        &self.backing
    }

    pub fn snapshot(&self) -> RgbaImage {
        self.backing.clone()
    }

    /// Drop all composited strokes, restoring the backing raster to the
    /// source image.
    pub fn reset_backing(&mut self) {
        self.backing = (*self.source).clone();
    }

    /// The sampling matrix an operation snapshots when the clone pen commits.
    pub fn committed_matrix(&self) -> Affine {
        self.committed_matrix
    }

    /// Recompute both sampling matrices. For the clone pen the pattern is
    /// translated by the stamp's anchored source→destination offset; for
    /// other pens the committed matrix is identity (the eraser samples the
    /// source untranslated, restoring original pixels). The preview matrix
    /// additionally carries the viewport centring + pan so the tiled pattern
    /// stays registered to the on-screen image.
    pub fn reset_sampler(&mut self, view: &ViewTransform, stamp: &CloneSource, pen: Pen) {
        let s = view.scale();
        let view_shift = Point::new(view.offset().x / s, view.offset().y / s);
        if pen == Pen::Clone {
            let off = stamp.sample_offset();
            self.committed_matrix = Affine::translation(off.x, off.y);
            self.preview_matrix = Affine::translation(view_shift.x + off.x, view_shift.y + off.y);
        } else {
            self.committed_matrix = Affine::IDENTITY;
            self.preview_matrix = Affine::translation(view_shift.x, view_shift.y);
        }
    }

    /// Refresh only the preview matrix against the current view (called per
    /// preview frame so pan/zoom changes — including the centering animation
    /// — keep the live pattern registered without touching the committed
    /// matrix mid-gesture).
    pub fn refresh_preview_sampler(&mut self, view: &ViewTransform, stamp: &CloneSource, pen: Pen) {
        let s = view.scale();
        let mut tx = view.offset().x / s;
        let mut ty = view.offset().y / s;
        if pen == Pen::Clone {
            let off = stamp.sample_offset();
            tx += off.x;
            ty += off.y;
        }
        self.preview_matrix = Affine::translation(tx, ty);
    }

    /// Replay `ops` in order onto an arbitrary target raster.
    pub fn render_ops<'a>(
        &self,
        target: &mut RgbaImage,
        ops: impl IntoIterator<Item = &'a Operation>,
    ) -> Result<(), SurfaceError> {
        for op in ops {
            let paint = committed_paint(&self.source, op);
            dispatch(self.raster.as_ref(), target, op.shape, geom_ref(op)?, &paint)?;
        }
        Ok(())
    }

    /// Composite one completed operation permanently into the backing raster.
    pub fn commit(&mut self, op: &Operation) -> Result<(), SurfaceError> {
        let paint = committed_paint(&self.source, op);
        dispatch(
            self.raster.as_ref(),
            &mut self.backing,
            op.shape,
            geom_ref(op)?,
            &paint,
        )
    }

    /// Rebuild the backing raster from the source image and the full log,
    /// reusing the cached backup-tier render when the backup tier is
    /// unchanged since the cache was taken.
    pub fn rebuild(&mut self, log: &OperationLog) -> Result<(), SurfaceError> {
        let generation = log.backup_generation();
        let cached = match &self.backup_cache {
            Some(c) if c.generation == generation => Some(c.raster.clone()),
            _ => None,
        };
        match cached {
            Some(raster) => self.backing = raster,
            None => {
                self.backing = (*self.source).clone();
                for op in log.backup_ops() {
                    let paint = committed_paint(&self.source, op);
                    dispatch(
                        self.raster.as_ref(),
                        &mut self.backing,
                        op.shape,
                        geom_ref(op)?,
                        &paint,
                    )?;
                }
                self.backup_cache = Some(BackupCache {
                    generation,
                    raster: self.backing.clone(),
                });
            }
        }
        for op in log.active_ops() {
            let paint = committed_paint(&self.source, op);
            dispatch(
                self.raster.as_ref(),
                &mut self.backing,
                op.shape,
                geom_ref(op)?,
                &paint,
            )?;
        }
        Ok(())
    }

    /// Draw the in-progress gesture onto a host-provided canvas raster
    /// without committing anything. Geometry is canvas-space; clone and
    /// eraser pens sample through the preview matrix.
    pub fn render_live_preview(
        &self,
        target: &mut RgbaImage,
        pen: Pen,
        shape: Shape,
        color: image::Rgba<u8>,
        stroke_width: f32,
        stroke: LiveStroke<'_>,
    ) -> Result<(), SurfaceError> {
        let pattern = match pen {
            Pen::Plain => None,
            Pen::Clone | Pen::Eraser => Some(Pattern {
                source: Arc::clone(&self.source),
                matrix: self.preview_matrix,
            }),
        };
        let paint = PaintParams {
            stroke_width,
            color,
            style: style_for(shape),
            pattern,
        };
        let geom = match stroke {
            LiveStroke::Path(p) => GeomRef::Path(p),
            LiveStroke::Span { start, end } => GeomRef::Span(start, end),
        };
        dispatch(self.raster.as_ref(), target, shape, geom, &paint)
    }
}

/// Borrowed geometry for the live preview stroke.
#[derive(Clone, Copy, Debug)]
pub enum LiveStroke<'a> {
    Path(&'a SmoothPath),
    Span { start: Point, end: Point },
}

enum GeomRef<'a> {
    Path(&'a SmoothPath),
    Span(Point, Point),
}

/// Validate a logged operation's geometry and borrow it for dispatch. A
/// mismatch between shape kind and geometry class, or non-finite
/// coordinates, means the log is corrupted.
fn geom_ref(op: &Operation) -> Result<GeomRef<'_>, SurfaceError> {
    if !op.geometry.is_finite() {
        return Err(SurfaceError::CorruptLog(format!(
            "non-finite geometry in {:?} operation",
            op.shape
        )));
    }
    match (&op.geometry, op.shape) {
        (Geometry::Path(p), Shape::Freehand) => Ok(GeomRef::Path(p)),
        (Geometry::Span { start, end }, shape) if shape != Shape::Freehand => {
            Ok(GeomRef::Span(*start, *end))
        }
        (geometry, shape) => Err(SurfaceError::CorruptLog(format!(
            "geometry {:?} does not match shape {:?}",
            geometry, shape
        ))),
    }
}

/// Paint record for replaying a committed operation: pattern source by pen
/// kind, style by shape kind.
fn committed_paint(source: &Arc<RgbaImage>, op: &Operation) -> PaintParams {
    let pattern = match op.pen {
        Pen::Plain => None,
        Pen::Clone => Some(Pattern {
            source: Arc::clone(source),
            matrix: op.sampling.unwrap_or(Affine::IDENTITY),
        }),
        // The eraser samples the unmodified source at the untransformed
        // position, restoring the original pixels under the stroke.
        Pen::Eraser => Some(Pattern {
            source: Arc::clone(source),
            matrix: Affine::IDENTITY,
        }),
    };
    PaintParams {
        stroke_width: op.stroke_width,
        color: op.color,
        style: style_for(op.shape),
        pattern,
    }
}

/// Pure shape dispatch: one rasterizer call per shape kind.
fn dispatch(
    raster: &dyn Rasterizer,
    target: &mut RgbaImage,
    shape: Shape,
    geom: GeomRef<'_>,
    paint: &PaintParams,
) -> Result<(), SurfaceError> {
    match (shape, geom) {
        (Shape::Freehand, GeomRef::Path(path)) => {
            raster.stroke_polyline(target, &path.flatten(), paint);
        }
        (Shape::Arrow, GeomRef::Span(a, b)) => raster.arrow(target, a, b, paint),
        (Shape::Line, GeomRef::Span(a, b)) => raster.line(target, a, b, paint),
        (Shape::FillCircle | Shape::HollowCircle, GeomRef::Span(a, b)) => {
            raster.circle(target, a, a.distance(b), paint);
        }
        (Shape::FillRect | Shape::HollowRect, GeomRef::Span(a, b)) => {
            raster.rect(target, a, b, paint);
        }
        (shape, _) => {
            return Err(SurfaceError::CorruptLog(format!(
                "geometry class does not match shape {:?}",
                shape
            )));
        }
    }
    Ok(())
}
