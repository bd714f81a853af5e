//! Freehand raster annotation over a source image.
//!
//! `scrawl` composites freehand strokes, geometric shapes, clone-stamp
//! copies and eraser passes onto an image-resolution backing raster, with a
//! two-tier undo log and fit/zoom/pan coordinate mapping. Hosts embed a
//! [`Surface`], feed it touch events and viewport sizes, and blit the
//! raster it maintains; completion and failure flow back through a
//! [`SurfaceListener`].
//!
//! ```no_run
//! use std::sync::Arc;
//! use image::RgbaImage;
//! use scrawl::{Surface, SurfaceConfig, SurfaceListener, TouchEvent};
//!
//! struct Host;
//! impl SurfaceListener for Host {
//!     fn on_saved(&self, raster: &RgbaImage) {
//!         raster.save("annotated.png").ok();
//!     }
//!     fn on_error(&self, code: scrawl::ErrorCode, message: &str) {
//!         eprintln!("scrawl error {:?}: {}", code, message);
//!     }
//! }
//!
//! let photo = image::open("photo.png").unwrap().to_rgba8();
//! let mut surface = Surface::new(photo, Arc::new(Host), SurfaceConfig::default()).unwrap();
//! surface.viewport_resized(1080.0, 1920.0);
//! surface.handle_touch(TouchEvent::Down { x: 100.0, y: 100.0 }).unwrap();
//! surface.handle_touch(TouchEvent::Up { x: 300.0, y: 240.0 }).unwrap();
//! surface.save();
//! ```

pub mod engine;
pub mod error;
pub mod geometry;
pub mod gesture;
pub mod logger;
pub mod oplog;
pub mod raster;
pub mod stamp;
pub mod surface;
pub mod transform;

pub use engine::CompositingEngine;
pub use error::{ErrorCode, SurfaceError};
pub use geometry::{Affine, Point, SmoothPath};
pub use gesture::{GesturePhase, TouchEvent};
pub use oplog::{Operation, OperationLog, Pen, Shape};
pub use raster::{Rasterizer, SoftRaster};
pub use stamp::{CloneSource, MarkerGlyph};
pub use surface::{DisplayPlan, Surface, SurfaceConfig, SurfaceListener};
pub use transform::ViewTransform;
