//! End-to-end scenarios through the public surface API: gestures in, saved
//! rasters out, with a recording listener standing in for the host.

use std::sync::{Arc, Mutex};

use image::{Rgba, RgbaImage};

use scrawl::gesture::{GestureController, GestureCtx, ToolState};
use scrawl::oplog::Geometry;
use scrawl::{
    CloneSource, CompositingEngine, ErrorCode, GesturePhase, OperationLog, Pen, Point, Shape,
    Surface, SurfaceConfig, SurfaceListener, TouchEvent, ViewTransform,
};

const RED: Rgba<u8> = Rgba([255, 0, 0, 255]);

#[derive(Default)]
struct RecordingListener {
    saved: Mutex<Vec<RgbaImage>>,
    errors: Mutex<Vec<(ErrorCode, String)>>,
}

impl SurfaceListener for RecordingListener {
    fn on_saved(&self, raster: &RgbaImage) {
        self.saved.lock().unwrap().push(raster.clone());
    }
    fn on_error(&self, code: ErrorCode, message: &str) {
        self.errors.lock().unwrap().push((code, message.to_string()));
    }
}

/// 100x100 gradient so cloned pixels are traceable to their source position.
fn gradient_source() -> RgbaImage {
    RgbaImage::from_fn(100, 100, |x, y| Rgba([(x * 2) as u8, (y * 2) as u8, 64, 255]))
}

fn surface(listener: Arc<RecordingListener>) -> Surface {
    let mut s = Surface::new(gradient_source(), listener, SurfaceConfig::default())
        .expect("valid construction");
    s.viewport_resized(100.0, 100.0);
    s
}

fn tap(s: &mut Surface, x: f32, y: f32) {
    s.handle_touch(TouchEvent::Down { x, y }).unwrap();
    s.handle_touch(TouchEvent::Up { x, y }).unwrap();
}

#[test]
fn test_tap_saves_single_dot_at_mapped_position() {
    let listener = Arc::new(RecordingListener::default());
    let mut s = surface(Arc::clone(&listener));
    s.set_pen(Pen::Plain);
    tap(&mut s, 30.0, 40.0);
    assert!(s.is_modified());

    s.save();
    let saved = listener.saved.lock().unwrap();
    assert_eq!(saved.len(), 1);
    assert_eq!(*saved[0].get_pixel(30, 40), RED);
    // Far from the dot the source shows through untouched.
    assert_eq!(saved[0].get_pixel(80, 80), gradient_source().get_pixel(80, 80));
    assert!(listener.errors.lock().unwrap().is_empty());
}

#[test]
fn test_marker_relocation_moves_glyph_without_logging() {
    let listener = Arc::new(RecordingListener::default());
    let mut s = surface(listener);
    // Default pen is clone; the marker was recentred to (50, 50) on resize.
    s.handle_touch(TouchEvent::Down { x: 52.0, y: 52.0 }).unwrap();
    assert_eq!(s.gesture_phase(), GesturePhase::Relocating);
    s.handle_touch(TouchEvent::Move { x: 70.0, y: 75.0 }).unwrap();
    s.handle_touch(TouchEvent::Up { x: 72.0, y: 78.0 }).unwrap();

    assert_eq!(s.gesture_phase(), GesturePhase::Idle);
    assert!(!s.is_modified(), "relocation must not record an operation");
    let marker = s.display_plan().marker.expect("clone pen shows the marker");
    assert_eq!(marker.position, Point::new(72.0, 78.0));
}

#[test]
fn test_five_gestures_keep_tiered_history_in_order() {
    let source = Arc::new(gradient_source());
    let mut view = ViewTransform::new(100, 100);
    view.set_viewport(100.0, 100.0);
    let mut stamp = CloneSource::new(90.0, 90.0);
    let mut log = OperationLog::new();
    let mut engine = CompositingEngine::new(source);
    let tools = ToolState {
        pen: Pen::Plain,
        shape: Shape::Freehand,
        color: RED,
        brush_size: 8.0,
    };
    let mut controller = GestureController::new();
    let mut gesture = |controller: &mut GestureController,
                       log: &mut OperationLog,
                       engine: &mut CompositingEngine,
                       stamp: &mut CloneSource,
                       x: f32| {
        for event in [
            TouchEvent::Down { x, y: 10.0 },
            TouchEvent::Up { x: x + 2.0, y: 12.0 },
        ] {
            controller
                .handle(
                    event,
                    GestureCtx {
                        view: &view,
                        stamp,
                        log,
                        engine,
                        tools,
                    },
                )
                .unwrap();
        }
    };

    for i in 0..3 {
        gesture(&mut controller, &mut log, &mut engine, &mut stamp, 10.0 + i as f32 * 10.0);
    }
    assert_eq!(log.active_ops().len(), 3);
    assert_eq!(log.backup_ops().len(), 0);

    // The 4th press spills the full active tier, then records its own op.
    gesture(&mut controller, &mut log, &mut engine, &mut stamp, 40.0);
    assert_eq!(log.backup_ops().len(), 3);
    assert_eq!(log.active_ops().len(), 1);

    gesture(&mut controller, &mut log, &mut engine, &mut stamp, 50.0);
    assert_eq!(log.backup_ops().len(), 3);
    assert_eq!(log.active_ops().len(), 2);

    // backup ++ active is still the chronological gesture order.
    let starts: Vec<f32> = log
        .iter_in_order()
        .map(|op| match &op.geometry {
            Geometry::Path(p) => p.start().unwrap().x,
            Geometry::Span { start, .. } => start.x,
        })
        .collect();
    assert_eq!(starts, vec![10.0, 20.0, 30.0, 40.0, 50.0]);
}

#[test]
fn test_clone_stroke_save_is_pan_invariant() {
    let listener = Arc::new(RecordingListener::default());
    let mut s = surface(Arc::clone(&listener));
    let source = gradient_source();

    // Clone stroke away from the marker: samples anchor at the marker (50, 50).
    s.handle_touch(TouchEvent::Down { x: 10.0, y: 10.0 }).unwrap();
    s.handle_touch(TouchEvent::Move { x: 14.0, y: 14.0 }).unwrap();
    s.handle_touch(TouchEvent::Up { x: 16.0, y: 16.0 }).unwrap();
    s.save();
    {
        let saved = listener.saved.lock().unwrap();
        // Destination (12, 12) carries the pixel from (12, 12) + anchor offset.
        assert_eq!(saved[0].get_pixel(12, 12), source.get_pixel(51, 51));
        assert_ne!(saved[0].get_pixel(12, 12), source.get_pixel(12, 12));
    }

    // Pan and zoom the view, then save again: committed replay takes no view
    // state, so the output must be byte-identical.
    s.set_zoom(2.0);
    s.set_pan_x(-30.0);
    s.set_pan_y(-20.0);
    s.save();
    let saved = listener.saved.lock().unwrap();
    assert_eq!(saved.len(), 2);
    assert_eq!(saved[0].as_raw(), saved[1].as_raw());
}

#[test]
fn test_undo_through_backup_tier_restores_source() {
    let listener = Arc::new(RecordingListener::default());
    let mut s = surface(Arc::clone(&listener));
    s.set_pen(Pen::Plain);
    for x in [20.0, 40.0, 60.0, 80.0] {
        tap(&mut s, x, 20.0);
    }
    // Four gestures: three spilled to backup at the 4th press, one active.
    for _ in 0..4 {
        assert!(s.undo());
    }
    assert!(!s.undo());
    assert!(!s.is_modified());

    s.save();
    let saved = listener.saved.lock().unwrap();
    assert_eq!(saved[0].as_raw(), gradient_source().as_raw());
    assert!(listener.errors.lock().unwrap().is_empty());
}
