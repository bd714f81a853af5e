//! Shared geometry primitives: points, affine transforms, and the smoothed
//! freehand path used by strokes.

use std::ops::{Add, Sub};

/// A 2D point/vector in whichever coordinate frame the caller is working in
/// (screen, canvas, or image space).
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn midpoint(self, other: Point) -> Point {
        Point::new((self.x + other.x) * 0.5, (self.y + other.y) * 0.5)
    }

    pub fn distance(self, other: Point) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }

    pub fn distance_sq(self, other: Point) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx * dx + dy * dy
    }

    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

impl Add for Point {
    type Output = Point;
    fn add(self, rhs: Point) -> Point {
        Point::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Point {
    type Output = Point;
    fn sub(self, rhs: Point) -> Point {
        Point::new(self.x - rhs.x, self.y - rhs.y)
    }
}

/// Row-major 2x3 affine transform:
///
/// ```text
/// | a c tx |
/// | b d ty |
/// ```
///
/// In practice the sampling transforms recorded by operations are pure
/// translations, but the full form is kept so a host rasterizer that supports
/// arbitrary pattern matrices can consume them directly.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Affine {
    pub a: f32,
    pub b: f32,
    pub c: f32,
    pub d: f32,
    pub tx: f32,
    pub ty: f32,
}

impl Default for Affine {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Affine {
    pub const IDENTITY: Affine = Affine {
        a: 1.0,
        b: 0.0,
        c: 0.0,
        d: 1.0,
        tx: 0.0,
        ty: 0.0,
    };

    pub const fn translation(tx: f32, ty: f32) -> Self {
        Affine {
            a: 1.0,
            b: 0.0,
            c: 0.0,
            d: 1.0,
            tx,
            ty,
        }
    }

    pub fn apply(&self, p: Point) -> Point {
        Point::new(
            self.a * p.x + self.c * p.y + self.tx,
            self.b * p.x + self.d * p.y + self.ty,
        )
    }

    /// Inverse transform. Returns identity for a degenerate (non-invertible)
    /// matrix rather than producing NaNs downstream.
    pub fn inverse(&self) -> Affine {
        let det = self.a * self.d - self.b * self.c;
        if det.abs() < 1e-12 {
            return Affine::IDENTITY;
        }
        let inv = 1.0 / det;
        let a = self.d * inv;
        let b = -self.b * inv;
        let c = -self.c * inv;
        let d = self.a * inv;
        Affine {
            a,
            b,
            c,
            d,
            tx: -(a * self.tx + c * self.ty),
            ty: -(b * self.tx + d * self.ty),
        }
    }

    pub fn is_identity(&self) -> bool {
        *self == Affine::IDENTITY
    }
}

/// One quadratic segment of a [`SmoothPath`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct QuadSegment {
    pub ctrl: Point,
    pub to: Point,
}

/// A freehand stroke path built from quadratic segments between consecutive
/// touch samples. Interpolating through segment midpoints keeps the stroke
/// smooth instead of showing polyline faceting at each sample.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SmoothPath {
    start: Option<Point>,
    segments: Vec<QuadSegment>,
}

impl SmoothPath {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn starting_at(p: Point) -> Self {
        Self {
            start: Some(p),
            segments: Vec::new(),
        }
    }

    pub fn quad_to(&mut self, ctrl: Point, to: Point) {
        if self.start.is_none() {
            self.start = Some(ctrl);
        }
        self.segments.push(QuadSegment { ctrl, to });
    }

    pub fn is_empty(&self) -> bool {
        self.start.is_none()
    }

    pub fn start(&self) -> Option<Point> {
        self.start
    }

    pub fn segments(&self) -> &[QuadSegment] {
        &self.segments
    }

    /// Total straight-line length through the segment endpoints. A pure tap
    /// produces a near-zero (but non-zero) length thanks to the synthetic
    /// one-pixel seed segment.
    pub fn approx_length(&self) -> f32 {
        let Some(start) = self.start else { return 0.0 };
        let mut len = 0.0;
        let mut prev = start;
        for seg in &self.segments {
            len += prev.distance(seg.to);
            prev = seg.to;
        }
        len
    }

    pub fn is_finite(&self) -> bool {
        self.start.map_or(true, |p| p.is_finite())
            && self
                .segments
                .iter()
                .all(|s| s.ctrl.is_finite() && s.to.is_finite())
    }

    /// Flatten the quadratics into a polyline for the rasterizer. Each
    /// segment is subdivided adaptively by its chord length so short segments
    /// (dense touch samples) don't explode into thousands of points.
    pub fn flatten(&self) -> Vec<Point> {
        let Some(start) = self.start else {
            return Vec::new();
        };
        let mut pts = Vec::with_capacity(self.segments.len() * 4 + 1);
        pts.push(start);
        let mut from = start;
        for seg in &self.segments {
            let chord = from.distance(seg.ctrl) + seg.ctrl.distance(seg.to);
            let steps = (chord / 3.0).ceil().clamp(1.0, 24.0) as u32;
            for i in 1..=steps {
                let t = i as f32 / steps as f32;
                let mt = 1.0 - t;
                // Quadratic Bezier: (1-t)^2 P0 + 2t(1-t) C + t^2 P1
                let x = mt * mt * from.x + 2.0 * t * mt * seg.ctrl.x + t * t * seg.to.x;
                let y = mt * mt * from.y + 2.0 * t * mt * seg.ctrl.y + t * t * seg.to.y;
                pts.push(Point::new(x, y));
            }
            from = seg.to;
        }
        pts
    }
}
