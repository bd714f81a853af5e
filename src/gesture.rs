//! Touch-driven gesture state machine.
//!
//! Interprets press/move/release events into coordinate-mapper calls, stamp
//! updates, log appends and compositing triggers. Single-touch only: extra
//! fingers just bump a counter that suppresses move handling until they
//! lift.

use image::Rgba;

use crate::engine::{CompositingEngine, LiveStroke};
use crate::error::SurfaceError;
use crate::geometry::{Point, SmoothPath};
use crate::oplog::{Geometry, Operation, OperationLog, Pen, Shape};
use crate::stamp::CloneSource;
use crate::transform::ViewTransform;

/// Synthetic offset applied to the press position so a pure tap still
/// produces a visible dot (a zero-length path renders nothing).
const TAP_SEED: f32 = 1.0;

/// Raw touch events as delivered by the host. Coordinates are screen-space.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum TouchEvent {
    Down { x: f32, y: f32 },
    Move { x: f32, y: f32 },
    Up { x: f32, y: f32 },
    Cancel { x: f32, y: f32 },
    /// An additional finger went down/came up. Counted, never interpreted.
    PointerDown,
    PointerUp,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GesturePhase {
    Idle,
    /// The clone marker is being dragged to a new source position.
    Relocating,
    /// A stroke or shape is being accumulated.
    Drawing,
}

/// Current pen/shape/paint configuration, captured into each operation at
/// gesture end.
#[derive(Clone, Copy, Debug)]
pub struct ToolState {
    pub pen: Pen,
    pub shape: Shape,
    pub color: Rgba<u8>,
    pub brush_size: f32,
}

/// Mutable collaborators the controller drives for one event.
pub struct GestureCtx<'a> {
    pub view: &'a ViewTransform,
    pub stamp: &'a mut CloneSource,
    pub log: &'a mut OperationLog,
    pub engine: &'a mut CompositingEngine,
    pub tools: ToolState,
}

#[derive(Debug, Default)]
pub struct GestureController {
    phase: Phase,
    touch_count: u32,
    down: Point,
    last: Point,
    cur: Point,
    /// Image-space path destined for the operation log.
    image_path: SmoothPath,
    /// Canvas-space twin used for the live preview.
    canvas_path: SmoothPath,
}

#[derive(Debug, Default, PartialEq, Eq, Clone, Copy)]
enum Phase {
    #[default]
    Idle,
    Relocating,
    Drawing,
}

impl GestureController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> GesturePhase {
        match self.phase {
            Phase::Idle => GesturePhase::Idle,
            Phase::Relocating => GesturePhase::Relocating,
            Phase::Drawing => GesturePhase::Drawing,
        }
    }

    pub fn is_drawing(&self) -> bool {
        self.phase == Phase::Drawing
    }

    /// The in-progress stroke in canvas space, for the live preview.
    pub fn live_stroke(&self, view: &ViewTransform, shape: Shape) -> Option<LiveStroke<'_>> {
        if self.phase != Phase::Drawing {
            return None;
        }
        Some(match shape {
            Shape::Freehand => LiveStroke::Path(&self.canvas_path),
            _ => LiveStroke::Span {
                start: view.to_canvas(self.down),
                end: view.to_canvas(self.cur),
            },
        })
    }

    pub fn handle(&mut self, event: TouchEvent, ctx: GestureCtx<'_>) -> Result<(), SurfaceError> {
        match event {
            TouchEvent::Down { x, y } => self.on_down(x, y, ctx),
            TouchEvent::Move { x, y } => self.on_move(x, y, ctx),
            TouchEvent::Up { x, y } | TouchEvent::Cancel { x, y } => self.on_up(x, y, ctx),
            TouchEvent::PointerDown => {
                self.touch_count += 1;
                Ok(())
            }
            TouchEvent::PointerUp => {
                self.touch_count = self.touch_count.saturating_sub(1);
                Ok(())
            }
        }
    }

    fn on_down(&mut self, x: f32, y: f32, ctx: GestureCtx<'_>) -> Result<(), SurfaceError> {
        self.touch_count = 1;
        self.down = Point::new(x, y);
        self.last = self.down;
        self.cur = Point::new(x + TAP_SEED, y + TAP_SEED);

        // Press-time overflow check, before anything about this gesture is
        // recorded: based on the previous gesture's final active size.
        ctx.log.spill_to_backup_if_needed();

        let cur_canvas = ctx.view.to_canvas(self.cur);
        if ctx.tools.pen == Pen::Clone
            && ctx
                .stamp
                .hit_test(cur_canvas.x, cur_canvas.y, ctx.tools.brush_size)
        {
            ctx.stamp.begin_relocate();
            self.phase = Phase::Relocating;
            return Ok(());
        }

        if ctx.tools.pen == Pen::Clone {
            if !ctx.stamp.sampling {
                // First stroke since relocation anchors the sampling offset;
                // later strokes reuse it so the copy offset stays fixed.
                ctx.stamp.begin_sample(cur_canvas.x, cur_canvas.y);
                ctx.engine.reset_sampler(ctx.view, ctx.stamp, ctx.tools.pen);
            }
            ctx.stamp.sampling = true;
        }
        ctx.stamp.relocating = false;

        if ctx.tools.shape == Shape::Freehand {
            self.image_path = SmoothPath::starting_at(ctx.view.to_image(self.down));
            self.canvas_path = SmoothPath::starting_at(ctx.view.to_canvas(self.down));
            // Seed the preview path so the tap dot shows immediately.
            self.canvas_path.quad_to(
                ctx.view.to_canvas(self.last),
                ctx.view.to_canvas(self.cur.midpoint(self.last)),
            );
        }
        self.phase = Phase::Drawing;
        Ok(())
    }

    fn on_move(&mut self, x: f32, y: f32, ctx: GestureCtx<'_>) -> Result<(), SurfaceError> {
        if self.touch_count >= 2 {
            return Ok(());
        }
        self.last = self.cur;
        self.cur = Point::new(x, y);
        let cur_canvas = ctx.view.to_canvas(self.cur);

        match self.phase {
            Phase::Relocating => ctx.stamp.update_location(cur_canvas.x, cur_canvas.y),
            Phase::Drawing => {
                if ctx.tools.pen == Pen::Clone {
                    let p = ctx.stamp.tracked_location(cur_canvas);
                    ctx.stamp.update_location(p.x, p.y);
                }
                if ctx.tools.shape == Shape::Freehand {
                    let mid = self.cur.midpoint(self.last);
                    self.image_path
                        .quad_to(ctx.view.to_image(self.last), ctx.view.to_image(mid));
                    self.canvas_path
                        .quad_to(ctx.view.to_canvas(self.last), ctx.view.to_canvas(mid));
                }
            }
            Phase::Idle => {}
        }
        Ok(())
    }

    fn on_up(&mut self, x: f32, y: f32, ctx: GestureCtx<'_>) -> Result<(), SurfaceError> {
        self.touch_count = 0;
        self.last = self.cur;
        self.cur = Point::new(x, y);
        let cur_canvas = ctx.view.to_canvas(self.cur);

        match self.phase {
            Phase::Relocating => {
                ctx.stamp.update_location(cur_canvas.x, cur_canvas.y);
                ctx.stamp.relocating = false;
                self.phase = Phase::Idle;
            }
            Phase::Drawing => {
                if ctx.tools.pen == Pen::Clone {
                    let p = ctx.stamp.tracked_location(cur_canvas);
                    ctx.stamp.update_location(p.x, p.y);
                }
                let geometry = if ctx.tools.shape == Shape::Freehand {
                    let mid = self.cur.midpoint(self.last);
                    self.image_path
                        .quad_to(ctx.view.to_image(self.last), ctx.view.to_image(mid));
                    Geometry::Path(std::mem::take(&mut self.image_path))
                } else {
                    Geometry::Span {
                        start: ctx.view.to_image(self.down),
                        end: ctx.view.to_image(self.cur),
                    }
                };
                let op = Operation {
                    pen: ctx.tools.pen,
                    shape: ctx.tools.shape,
                    stroke_width: ctx.tools.brush_size,
                    color: ctx.tools.color,
                    geometry,
                    sampling: (ctx.tools.pen == Pen::Clone)
                        .then(|| ctx.engine.committed_matrix()),
                };
                // Back to idle before the commit so a failed commit cannot
                // leave the controller stuck mid-gesture.
                self.canvas_path = SmoothPath::new();
                self.phase = Phase::Idle;
                ctx.engine.commit(&op)?;
                ctx.log.append(op);
            }
            Phase::Idle => {}
        }
        Ok(())
    }
}
