//! The annotation surface: construction, the host-facing command API, and
//! the zoom-recentring animation.
//!
//! A [`Surface`] wires the coordinate mapper, clone stamp, operation log,
//! compositing engine and gesture controller together around one source
//! image. Interaction is single-threaded and event-driven; the one designed
//! exception is the centering animation, which runs on a worker thread and
//! is superseded through a generation counter so two animations can never
//! fight over the shared pan/zoom state.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::Duration;

use image::{Rgba, RgbaImage};

use crate::engine::CompositingEngine;
use crate::error::{ErrorCode, SurfaceError};
use crate::geometry::Point;
use crate::gesture::{GestureController, GestureCtx, GesturePhase, ToolState, TouchEvent};
use crate::oplog::{OperationLog, Pen, Shape};
use crate::raster::Rasterizer;
use crate::stamp::{CloneSource, MarkerGlyph};
use crate::transform::ViewTransform;
use crate::{log_err, log_info, logger};

/// Zoom step per animation tick.
const CENTERING_STEP: f32 = 0.2;
/// Tick interval of the centering animation.
const CENTERING_TICK: Duration = Duration::from_millis(40);

/// Host callbacks. Errors are always reported here, never thrown across the
/// API boundary.
pub trait SurfaceListener: Send + Sync {
    /// The composited raster produced by [`Surface::save`]. On a failed save
    /// this still fires afterwards with whatever raster state exists.
    fn on_saved(&self, raster: &RgbaImage);

    fn on_error(&self, code: ErrorCode, message: &str);

    /// The surface wants to be redrawn (e.g. a centering-animation tick).
    /// May be called from a worker thread; implementations must marshal to
    /// their render thread. Defaults to a no-op.
    fn request_redraw(&self) {}
}

/// Initial tool configuration.
#[derive(Clone, Copy, Debug)]
pub struct SurfaceConfig {
    pub pen: Pen,
    pub shape: Shape,
    pub color: Rgba<u8>,
    pub brush_size: f32,
    /// Initial clone-marker position, canvas coords. Recentred to the
    /// viewport on the first resize.
    pub marker_position: (f32, f32),
}

impl Default for SurfaceConfig {
    fn default() -> Self {
        Self {
            pen: Pen::Clone,
            shape: Shape::Freehand,
            color: Rgba([255, 0, 0, 255]),
            brush_size: 30.0,
            marker_position: (150.0, 150.0),
        }
    }
}

/// Per-frame drawing instructions for the host: which bitmap to blit where,
/// and whether a live stroke / clone marker needs drawing on top.
#[derive(Clone, Copy, Debug)]
pub struct DisplayPlan {
    /// Effective scale (fit-to-screen x user zoom) to apply before blitting.
    pub scale: f32,
    /// Canvas-space position to blit the bitmap at.
    pub bitmap_offset: Point,
    /// Show the unmodified source instead of the composited raster.
    pub draw_original_only: bool,
    /// A gesture is in flight: call [`Surface::render_live_preview`].
    pub live_stroke_active: bool,
    /// Clone marker glyph, present while the clone pen is selected.
    pub marker: Option<MarkerGlyph>,
}

pub struct Surface {
    source: Arc<RgbaImage>,
    listener: Arc<dyn SurfaceListener>,
    view: Arc<Mutex<ViewTransform>>,
    stamp: CloneSource,
    log: OperationLog,
    engine: CompositingEngine,
    gesture: GestureController,
    tools: ToolState,
    draw_original_only: bool,
    /// Generation counter for the centering animation; bumping it retires
    /// any worker still running for an older generation.
    centering_generation: Arc<AtomicU64>,
}

impl Surface {
    /// Create a surface over `source`. An empty source image is a fatal
    /// configuration error: reported through the listener and rejected.
    pub fn new(
        source: RgbaImage,
        listener: Arc<dyn SurfaceListener>,
        config: SurfaceConfig,
    ) -> Result<Self, SurfaceError> {
        logger::init();
        let (w, h) = source.dimensions();
        if w == 0 || h == 0 {
            let err = SurfaceError::EmptySource {
                width: w,
                height: h,
            };
            log_err!("surface construction rejected: {}", err);
            listener.on_error(err.code(), &err.to_string());
            return Err(err);
        }
        log_info!("surface created over {}x{} source", w, h);
        let source = Arc::new(source);
        let (mx, my) = config.marker_position;
        Ok(Self {
            engine: CompositingEngine::new(Arc::clone(&source)),
            source,
            listener,
            view: Arc::new(Mutex::new(ViewTransform::new(w, h))),
            stamp: CloneSource::new(mx, my),
            log: OperationLog::new(),
            gesture: GestureController::new(),
            tools: ToolState {
                pen: config.pen,
                shape: config.shape,
                color: config.color,
                brush_size: config.brush_size,
            },
            draw_original_only: false,
            centering_generation: Arc::new(AtomicU64::new(0)),
        })
    }

    /// Like [`Surface::new`] but drawing through a host-provided rasterizer.
    pub fn with_rasterizer(
        source: RgbaImage,
        listener: Arc<dyn SurfaceListener>,
        config: SurfaceConfig,
        rasterizer: Box<dyn Rasterizer>,
    ) -> Result<Self, SurfaceError> {
        let mut surface = Self::new(source, listener, config)?;
        surface.engine =
            CompositingEngine::with_rasterizer(Arc::clone(&surface.source), rasterizer);
        Ok(surface)
    }

    // ===================== events =====================

    /// Viewport size changed: recompute fit scale and centring, refresh the
    /// sampling matrices, and park the clone marker at the viewport centre.
    pub fn viewport_resized(&mut self, width: f32, height: f32) {
        let mut view = lock(&self.view);
        view.set_viewport(width, height);
        self.engine.reset_sampler(&view, &self.stamp, self.tools.pen);
        let centre = view.to_canvas(Point::new(width / 2.0, height / 2.0));
        self.stamp.update_location(centre.x, centre.y);
        drop(view);
        self.listener.request_redraw();
    }

    /// Feed one touch event through the gesture state machine.
    ///
    /// Nothing in the gesture path is expected to fail; an error here means
    /// the operation log is corrupted and is surfaced as such.
    pub fn handle_touch(&mut self, event: TouchEvent) -> Result<(), SurfaceError> {
        let view = lock(&self.view);
        let result = self.gesture.handle(
            event,
            GestureCtx {
                view: &view,
                stamp: &mut self.stamp,
                log: &mut self.log,
                engine: &mut self.engine,
                tools: self.tools,
            },
        );
        drop(view);
        if let Err(e) = &result {
            log_err!("gesture processing failed: {}", e);
        }
        self.listener.request_redraw();
        result
    }

    // ===================== commands =====================

    /// Replay the full operation log from the source image and hand the
    /// result to the listener. Failures are reported as [`ErrorCode::SaveError`];
    /// the completion callback still fires with whatever raster exists.
    pub fn save(&mut self) {
        log_info!("save: replaying {} operation(s)", self.log.len());
        if let Err(e) = self.engine.rebuild(&self.log) {
            log_err!("save failed: {}", e);
            self.listener.on_error(ErrorCode::SaveError, &e.to_string());
        }
        self.listener.on_saved(self.engine.raster());
    }

    /// Drop every recorded operation and restore the backing raster to the
    /// source image. Never fails.
    pub fn clear(&mut self) {
        log_info!("clear: dropping {} operation(s)", self.log.len());
        self.log.clear();
        self.engine.reset_backing();
        self.listener.request_redraw();
    }

    /// Remove the most recent operation and re-composite. Returns false on
    /// an empty log (silent no-op). Never fails.
    pub fn undo(&mut self) -> bool {
        if self.log.undo().is_none() {
            return false;
        }
        if let Err(e) = self.engine.rebuild(&self.log) {
            // Unreachable for logs produced by the gesture path.
            log_err!("replay after undo failed: {}", e);
        }
        self.listener.request_redraw();
        true
    }

    /// True iff any operation is recorded.
    pub fn is_modified(&self) -> bool {
        self.log.is_modified()
    }

    /// Animate the user zoom back to 1.0 in fixed steps, clamping pan after
    /// each step and requesting a redraw per tick. A new call supersedes any
    /// animation still running.
    pub fn center_image(&self) {
        {
            let view = lock(&self.view);
            if view.zoom == 1.0 {
                return;
            }
        }
        let generation = self.centering_generation.fetch_add(1, Ordering::SeqCst) + 1;
        let generations = Arc::clone(&self.centering_generation);
        let view = Arc::clone(&self.view);
        let listener = Arc::clone(&self.listener);
        thread::spawn(move || {
            loop {
                if generations.load(Ordering::SeqCst) != generation {
                    return; // superseded by a newer centering request
                }
                let done = {
                    let mut v = lock(&view);
                    if v.zoom > 1.0 {
                        v.zoom = (v.zoom - CENTERING_STEP).max(1.0);
                    } else {
                        v.zoom = (v.zoom + CENTERING_STEP).min(1.0);
                    }
                    v.clamp_pan();
                    v.zoom == 1.0
                };
                listener.request_redraw();
                if done {
                    return;
                }
                thread::sleep(CENTERING_TICK);
            }
        });
    }

    // ===================== setters / getters =====================

    pub fn set_draw_original_only(&mut self, draw_original_only: bool) {
        self.draw_original_only = draw_original_only;
        self.listener.request_redraw();
    }

    pub fn draw_original_only(&self) -> bool {
        self.draw_original_only
    }

    pub fn set_color(&mut self, color: Rgba<u8>) {
        self.tools.color = color;
        self.listener.request_redraw();
    }

    pub fn color(&self) -> Rgba<u8> {
        self.tools.color
    }

    pub fn set_zoom(&mut self, zoom: f32) {
        let mut view = lock(&self.view);
        view.zoom = zoom;
        if view.clamp_pan() {
            self.engine.reset_sampler(&view, &self.stamp, self.tools.pen);
        }
        drop(view);
        self.listener.request_redraw();
    }

    pub fn zoom(&self) -> f32 {
        lock(&self.view).zoom
    }

    pub fn set_pen(&mut self, pen: Pen) {
        self.tools.pen = pen;
        let view = lock(&self.view);
        self.engine.reset_sampler(&view, &self.stamp, pen);
        drop(view);
        self.listener.request_redraw();
    }

    pub fn pen(&self) -> Pen {
        self.tools.pen
    }

    pub fn set_shape(&mut self, shape: Shape) {
        self.tools.shape = shape;
        self.listener.request_redraw();
    }

    pub fn shape(&self) -> Shape {
        self.tools.shape
    }

    pub fn set_pan_x(&mut self, pan_x: f32) {
        let mut view = lock(&self.view);
        view.pan_x = pan_x;
        if view.clamp_pan() {
            self.engine.reset_sampler(&view, &self.stamp, self.tools.pen);
        }
        drop(view);
        self.listener.request_redraw();
    }

    pub fn pan_x(&self) -> f32 {
        lock(&self.view).pan_x
    }

    pub fn set_pan_y(&mut self, pan_y: f32) {
        let mut view = lock(&self.view);
        view.pan_y = pan_y;
        if view.clamp_pan() {
            self.engine.reset_sampler(&view, &self.stamp, self.tools.pen);
        }
        drop(view);
        self.listener.request_redraw();
    }

    pub fn pan_y(&self) -> f32 {
        lock(&self.view).pan_y
    }

    pub fn set_brush_size(&mut self, brush_size: f32) {
        self.tools.brush_size = brush_size;
    }

    pub fn brush_size(&self) -> f32 {
        self.tools.brush_size
    }

    // ===================== rendering =====================

    /// The composited raster for display. Hosts blit this (or the source,
    /// when draw-original-only is set) per the [`DisplayPlan`].
    pub fn raster(&self) -> &RgbaImage {
        self.engine.raster()
    }

    pub fn source(&self) -> &RgbaImage {
        &self.source
    }

    pub fn gesture_phase(&self) -> GesturePhase {
        self.gesture.phase()
    }

    /// What the host should draw this frame.
    pub fn display_plan(&self) -> DisplayPlan {
        let view = lock(&self.view);
        let scale = view.scale();
        let offset = view.offset();
        DisplayPlan {
            scale,
            bitmap_offset: Point::new(offset.x / scale, offset.y / scale),
            draw_original_only: self.draw_original_only,
            live_stroke_active: self.gesture.is_drawing(),
            marker: (self.tools.pen == Pen::Clone)
                .then(|| self.stamp.glyph(self.tools.brush_size)),
        }
    }

    /// Draw the in-progress gesture onto the host's canvas raster. No-op
    /// when no gesture is drawing.
    pub fn render_live_preview(&mut self, target: &mut RgbaImage) -> Result<(), SurfaceError> {
        let view = lock(&self.view).clone();
        self.engine
            .refresh_preview_sampler(&view, &self.stamp, self.tools.pen);
        let Some(stroke) = self.gesture.live_stroke(&view, self.tools.shape) else {
            return Ok(());
        };
        self.engine.render_live_preview(
            target,
            self.tools.pen,
            self.tools.shape,
            self.tools.color,
            self.tools.brush_size,
            stroke,
        )
    }
}

/// Lock that shrugs off poisoning: the view transform is plain data and a
/// panicked centering tick leaves it in a usable state.
fn lock(view: &Mutex<ViewTransform>) -> MutexGuard<'_, ViewTransform> {
    view.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::Instant;

    #[derive(Default)]
    struct RecordingListener {
        saved: Mutex<Vec<RgbaImage>>,
        errors: Mutex<Vec<(ErrorCode, String)>>,
        redraws: AtomicUsize,
    }

    impl SurfaceListener for RecordingListener {
        fn on_saved(&self, raster: &RgbaImage) {
            self.saved.lock().unwrap().push(raster.clone());
        }
        fn on_error(&self, code: ErrorCode, message: &str) {
            self.errors.lock().unwrap().push((code, message.to_string()));
        }
        fn request_redraw(&self) {
            self.redraws.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn surface_with(listener: Arc<RecordingListener>) -> Surface {
        let source = RgbaImage::from_pixel(100, 100, Rgba([255, 255, 255, 255]));
        let mut s = Surface::new(source, listener, SurfaceConfig::default())
            .expect("valid construction");
        s.viewport_resized(100.0, 100.0);
        s
    }

    #[test]
    fn test_empty_source_is_init_error() {
        let listener = Arc::new(RecordingListener::default());
        let result = Surface::new(
            RgbaImage::new(0, 0),
            Arc::clone(&listener) as Arc<dyn SurfaceListener>,
            SurfaceConfig::default(),
        );
        assert!(matches!(result, Err(SurfaceError::EmptySource { .. })));
        let errors = listener.errors.lock().unwrap();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].0, ErrorCode::InitError);
    }

    #[test]
    fn test_save_delivers_composited_raster() {
        let listener = Arc::new(RecordingListener::default());
        let mut s = surface_with(Arc::clone(&listener));
        s.set_pen(Pen::Plain);
        s.handle_touch(TouchEvent::Down { x: 50.0, y: 50.0 }).unwrap();
        s.handle_touch(TouchEvent::Up { x: 50.0, y: 50.0 }).unwrap();
        s.save();

        let saved = listener.saved.lock().unwrap();
        assert_eq!(saved.len(), 1);
        assert_eq!(*saved[0].get_pixel(50, 50), Rgba([255, 0, 0, 255]));
        assert!(listener.errors.lock().unwrap().is_empty());
    }

    #[test]
    fn test_undo_and_clear_restore_source() {
        let listener = Arc::new(RecordingListener::default());
        let mut s = surface_with(Arc::clone(&listener));
        s.set_pen(Pen::Plain);
        assert!(!s.is_modified());
        assert!(!s.undo()); // empty log is a silent no-op

        s.handle_touch(TouchEvent::Down { x: 30.0, y: 30.0 }).unwrap();
        s.handle_touch(TouchEvent::Up { x: 30.0, y: 30.0 }).unwrap();
        assert!(s.is_modified());
        assert_eq!(*s.raster().get_pixel(30, 30), Rgba([255, 0, 0, 255]));

        assert!(s.undo());
        assert!(!s.is_modified());
        assert_eq!(*s.raster().get_pixel(30, 30), Rgba([255, 255, 255, 255]));

        s.handle_touch(TouchEvent::Down { x: 60.0, y: 60.0 }).unwrap();
        s.handle_touch(TouchEvent::Up { x: 60.0, y: 60.0 }).unwrap();
        s.clear();
        assert!(!s.is_modified());
        assert_eq!(*s.raster().get_pixel(60, 60), Rgba([255, 255, 255, 255]));
    }

    #[test]
    fn test_setters_roundtrip() {
        let listener = Arc::new(RecordingListener::default());
        let mut s = surface_with(listener);
        s.set_pen(Pen::Eraser);
        assert_eq!(s.pen(), Pen::Eraser);
        s.set_shape(Shape::Arrow);
        assert_eq!(s.shape(), Shape::Arrow);
        s.set_color(Rgba([0, 128, 255, 255]));
        assert_eq!(s.color(), Rgba([0, 128, 255, 255]));
        s.set_brush_size(12.0);
        assert_eq!(s.brush_size(), 12.0);
        s.set_draw_original_only(true);
        assert!(s.display_plan().draw_original_only);
    }

    #[test]
    fn test_set_zoom_clamps_pan() {
        let listener = Arc::new(RecordingListener::default());
        let mut s = surface_with(listener);
        s.set_zoom(2.0);
        s.set_pan_x(50.0); // would open a gap on the left
        assert_eq!(s.pan_x(), 0.0);
        s.set_pan_y(-500.0);
        assert_eq!(s.pan_y(), -100.0);
    }

    #[test]
    fn test_center_image_animates_zoom_to_one() {
        let listener = Arc::new(RecordingListener::default());
        let mut s = surface_with(Arc::clone(&listener));
        s.set_zoom(2.0);
        let redraws_before = listener.redraws.load(Ordering::SeqCst);
        s.center_image();
        // Restarting immediately supersedes the first worker.
        s.center_image();

        let deadline = Instant::now() + Duration::from_secs(2);
        while s.zoom() != 1.0 && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(10));
        }
        assert_eq!(s.zoom(), 1.0);
        assert!(listener.redraws.load(Ordering::SeqCst) > redraws_before);
    }

    #[test]
    fn test_marker_glyph_only_with_clone_pen() {
        let listener = Arc::new(RecordingListener::default());
        let mut s = surface_with(listener);
        assert!(s.display_plan().marker.is_some()); // default pen is clone
        s.set_pen(Pen::Plain);
        assert!(s.display_plan().marker.is_none());
    }
}
