//! Recorded drawing operations and the two-tier undo log.
//!
//! Completed gestures become immutable [`Operation`] records appended to the
//! *active* tier. At the start of each new gesture the active tier spills to
//! the *backup* tier once it reaches capacity, which bounds how many
//! operations a post-undo replay has to walk: the engine caches a render of
//! the backup tier and only re-plays the active tier on top of it.

use image::Rgba;

use crate::geometry::{Affine, Point, SmoothPath};

/// Pen behaviour for a stroke.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Pen {
    /// Solid ink in the configured color.
    Plain,
    /// Clone stamp: paints with pixels sampled from the source image at a
    /// fixed offset.
    Clone,
    /// Restores original source pixels at the painted location.
    Eraser,
}

/// Geometry class of a stroke.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Shape {
    Freehand,
    Arrow,
    Line,
    FillCircle,
    HollowCircle,
    FillRect,
    HollowRect,
}

/// Stroke geometry: a smoothed control-point path for freehand, or the
/// start/end span defining a shape.
#[derive(Clone, Debug, PartialEq)]
pub enum Geometry {
    Path(SmoothPath),
    Span { start: Point, end: Point },
}

impl Geometry {
    pub fn is_finite(&self) -> bool {
        match self {
            Geometry::Path(p) => p.is_finite(),
            Geometry::Span { start, end } => start.is_finite() && end.is_finite(),
        }
    }
}

/// One recorded, immutable drawing action. Created when a gesture completes;
/// never mutated; dropped on undo or clear.
#[derive(Clone, Debug, PartialEq)]
pub struct Operation {
    pub pen: Pen,
    pub shape: Shape,
    pub stroke_width: f32,
    pub color: Rgba<u8>,
    pub geometry: Geometry,
    /// Pattern-space translation captured at sample-anchor time. Present only
    /// for the clone pen; the eraser always samples untranslated.
    pub sampling: Option<Affine>,
}

/// Active tier capacity: reaching this many completed operations at the next
/// press spills the whole tier to backup.
const ACTIVE_LIMIT: usize = 3;

/// Two ordered tiers of operations; `backup ++ active` is always the full
/// history in chronological order.
#[derive(Debug, Default)]
pub struct OperationLog {
    active: Vec<Operation>,
    backup: Vec<Operation>,
    /// Bumped on every backup mutation so cached backup-tier renders can be
    /// invalidated.
    backup_generation: u64,
}

impl OperationLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, op: Operation) {
        self.active.push(op);
    }

    /// Press-time overflow check. Deliberately *not* run at append time: the
    /// spill happens when the next gesture starts, based on the previous
    /// gesture's final active size, so a backup-tier render cache stays valid
    /// for the whole of the gesture that populated it.
    pub fn spill_to_backup_if_needed(&mut self) -> bool {
        if self.active.len() >= ACTIVE_LIMIT {
            self.backup.append(&mut self.active);
            self.backup_generation += 1;
            true
        } else {
            false
        }
    }

    /// Remove and return the most recent operation: last of active if any,
    /// otherwise last of backup. Empty log is a silent no-op.
    pub fn undo(&mut self) -> Option<Operation> {
        if let Some(op) = self.active.pop() {
            return Some(op);
        }
        let op = self.backup.pop();
        if op.is_some() {
            self.backup_generation += 1;
        }
        op
    }

    pub fn clear(&mut self) {
        self.active.clear();
        if !self.backup.is_empty() {
            self.backup.clear();
            self.backup_generation += 1;
        }
    }

    /// True iff any operation is recorded in either tier.
    pub fn is_modified(&self) -> bool {
        !self.active.is_empty() || !self.backup.is_empty()
    }

    /// All operations in chronological order: backup tier then active tier.
    pub fn iter_in_order(&self) -> impl Iterator<Item = &Operation> {
        self.backup.iter().chain(self.active.iter())
    }

    pub fn active_ops(&self) -> &[Operation] {
        &self.active
    }

    pub fn backup_ops(&self) -> &[Operation] {
        &self.backup
    }

    pub fn backup_generation(&self) -> u64 {
        self.backup_generation
    }

    pub fn len(&self) -> usize {
        self.active.len() + self.backup.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
