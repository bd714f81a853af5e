//! The floating clone-source marker.
//!
//! While the clone pen is selected the marker either gets dragged to a new
//! source position (*relocating*) or anchors the sampling offset for the
//! stroke being painted (*sampling*). All positions are canvas-space.

use image::Rgba;

use crate::geometry::Point;

/// Tracks the clone-source marker position and gesture anchors.
#[derive(Clone, Debug)]
pub struct CloneSource {
    /// Current marker position.
    x: f32,
    y: f32,
    /// Marker position when sampling began.
    copy_anchor: Point,
    /// Touch position when sampling began.
    touch_anchor: Point,
    /// The marker itself is being dragged to a new spot.
    pub relocating: bool,
    /// A clone stroke is actively sampling through this marker.
    pub sampling: bool,
}

impl CloneSource {
    pub fn new(x: f32, y: f32) -> Self {
        Self {
            x,
            y,
            copy_anchor: Point::new(x, y),
            touch_anchor: Point::new(x, y),
            relocating: true,
            sampling: false,
        }
    }

    pub fn position(&self) -> Point {
        Point::new(self.x, self.y)
    }

    /// True iff `(x, y)` lies within the marker's grab radius
    /// (squared distance <= brush_size^2).
    pub fn hit_test(&self, x: f32, y: f32, brush_size: f32) -> bool {
        self.position().distance_sq(Point::new(x, y)) <= brush_size * brush_size
    }

    pub fn begin_relocate(&mut self) {
        self.relocating = true;
        self.sampling = false;
    }

    /// Anchor a sampling stroke: the copy anchor is the marker's current
    /// position, the touch anchor the given touch point.
    pub fn begin_sample(&mut self, touch_x: f32, touch_y: f32) {
        self.copy_anchor = Point::new(self.x, self.y);
        self.touch_anchor = Point::new(touch_x, touch_y);
    }

    pub fn update_location(&mut self, x: f32, y: f32) {
        self.x = x;
        self.y = y;
    }

    /// Where the marker sits for the given touch point while sampling:
    /// `copy_anchor + (touch - touch_anchor)`, so the marker drags along
    /// with the stroke at a fixed offset.
    pub fn tracked_location(&self, touch: Point) -> Point {
        self.copy_anchor + (touch - self.touch_anchor)
    }

    /// Fixed source-to-destination offset for the sampling shader:
    /// `touch_anchor - copy_anchor`.
    pub fn sample_offset(&self) -> Point {
        self.touch_anchor - self.copy_anchor
    }

    /// Render state for the host: the marker is drawn as two rings around a
    /// tinted core (red while idle, blue while sampling).
    pub fn glyph(&self, brush_size: f32) -> MarkerGlyph {
        let core_color = if self.sampling {
            Rgba([0x00, 0x00, 0x88, 0x44]) // translucent blue
        } else {
            Rgba([0xff, 0x00, 0x00, 0x44]) // translucent red
        };
        MarkerGlyph {
            position: self.position(),
            outer_ring: Ring {
                radius: brush_size / 2.0 + brush_size / 8.0,
                stroke_width: brush_size / 4.0,
                color: Rgba([0x66, 0x66, 0x66, 0xaa]),
            },
            inner_ring: Ring {
                radius: brush_size / 2.0 + brush_size / 32.0,
                stroke_width: brush_size / 16.0,
                color: Rgba([0xff, 0xff, 0xff, 0xaa]),
            },
            core_radius: brush_size / 2.0,
            core_color,
        }
    }
}

/// One stroked ring of the marker glyph.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Ring {
    pub radius: f32,
    pub stroke_width: f32,
    pub color: Rgba<u8>,
}

/// Everything the host needs to draw the clone marker, in canvas coords.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MarkerGlyph {
    pub position: Point,
    pub outer_ring: Ring,
    pub inner_ring: Ring,
    pub core_radius: f32,
    pub core_color: Rgba<u8>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hit_test_radius_is_brush_size() {
        let s = CloneSource::new(100.0, 100.0);
        assert!(s.hit_test(100.0, 130.0, 30.0)); // exactly on the edge
        assert!(s.hit_test(110.0, 110.0, 30.0));
        assert!(!s.hit_test(100.0, 131.0, 30.0));
    }

    #[test]
    fn test_tracked_location_keeps_offset() {
        let mut s = CloneSource::new(50.0, 60.0);
        s.begin_sample(200.0, 220.0);
        // Touch moves +10/+5 → marker follows from its anchored position.
        let p = s.tracked_location(Point::new(210.0, 225.0));
        assert_eq!(p, Point::new(60.0, 65.0));
    }

    #[test]
    fn test_sample_offset_direction() {
        let mut s = CloneSource::new(10.0, 20.0);
        s.begin_sample(110.0, 150.0);
        assert_eq!(s.sample_offset(), Point::new(100.0, 130.0));
    }

    #[test]
    fn test_glyph_tint_follows_sampling_flag() {
        let mut s = CloneSource::new(0.0, 0.0);
        let idle = s.glyph(30.0);
        assert_eq!(idle.core_color, Rgba([0xff, 0x00, 0x00, 0x44]));
        s.sampling = true;
        let active = s.glyph(30.0);
        assert_eq!(active.core_color, Rgba([0x00, 0x00, 0x88, 0x44]));
        assert_eq!(active.core_radius, 15.0);
        assert_eq!(active.outer_ring.radius, 15.0 + 30.0 / 8.0);
    }
}
