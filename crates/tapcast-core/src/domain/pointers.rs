//! Multi-pointer multiplexing.
//!
//! The controller identifies each contact with an opaque 64-bit id. The
//! platform's multi-touch event format only accepts small pointer ids, so
//! every active contact is assigned a local id in `0..MAX_POINTERS`, always
//! the smallest one not currently in use.
//!
//! A contact that lifts (`up`) stays in the state until it has been part of
//! exactly one more snapshot: the event that reports it going up.

use thiserror::Error;

use crate::domain::geometry::Point;

/// Maximum number of simultaneously tracked contacts.
pub const MAX_POINTERS: usize = 10;

/// One active contact.
#[derive(Debug, Clone, PartialEq)]
pub struct Pointer {
    /// Pointer id as received from the controller.
    pub id: u64,
    /// Device-side id, unique among active pointers.
    pub local_id: u8,
    /// Last known position in device pixels.
    pub point: Point,
    pub pressure: f32,
    /// Set when the contact lifted; the pointer is removed after the next snapshot.
    pub up: bool,
}

impl Pointer {
    fn new(id: u64, local_id: u8) -> Self {
        Self {
            id,
            local_id,
            point: Point::default(),
            pressure: 0.0,
            up: false,
        }
    }
}

/// Per-pointer data of one synthesized motion event.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PointerSample {
    pub local_id: u8,
    pub x: f32,
    pub y: f32,
    pub pressure: f32,
}

/// Fixed-capacity set of pointer samples, in pointer arrival order.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PointerSnapshot {
    samples: [PointerSample; MAX_POINTERS],
    len: usize,
}

impl PointerSnapshot {
    pub fn as_slice(&self) -> &[PointerSample] {
        &self.samples[..self.len]
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// Returned by [`PointersState::resolve_slot`] when all slots are taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("all pointer slots are in use")]
pub struct NoFreeSlot;

/// Active pointers, in arrival order.
#[derive(Debug, Default)]
pub struct PointersState {
    pointers: Vec<Pointer>,
}

impl PointersState {
    pub fn new() -> Self {
        Self {
            pointers: Vec::with_capacity(MAX_POINTERS),
        }
    }

    /// Number of active pointers.
    pub fn len(&self) -> usize {
        self.pointers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pointers.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Pointer> {
        self.pointers.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut Pointer> {
        self.pointers.get_mut(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Pointer> {
        self.pointers.iter()
    }

    /// Returns the index of the pointer with controller id `id`, creating it
    /// if needed.
    ///
    /// # Errors
    ///
    /// Returns [`NoFreeSlot`] when `id` is new and [`MAX_POINTERS`] pointers
    /// are already active.
    pub fn resolve_slot(&mut self, id: u64) -> Result<usize, NoFreeSlot> {
        if let Some(index) = self.pointers.iter().position(|p| p.id == id) {
            return Ok(index);
        }
        if self.pointers.len() >= MAX_POINTERS {
            return Err(NoFreeSlot);
        }
        let local_id = self.next_unused_local_id().ok_or(NoFreeSlot)?;
        self.pointers.push(Pointer::new(id, local_id));
        Ok(self.pointers.len() - 1)
    }

    /// Captures every active pointer, then drops the ones marked `up`.
    ///
    /// The order matters: a lifting pointer must appear in the snapshot of
    /// its own "up" event.
    pub fn snapshot_and_release(&mut self) -> PointerSnapshot {
        let mut snapshot = PointerSnapshot::default();
        for (slot, pointer) in snapshot.samples.iter_mut().zip(&self.pointers) {
            *slot = PointerSample {
                local_id: pointer.local_id,
                x: pointer.point.x as f32,
                y: pointer.point.y as f32,
                pressure: pointer.pressure,
            };
        }
        snapshot.len = self.pointers.len();
        self.pointers.retain(|p| !p.up);
        snapshot
    }

    fn next_unused_local_id(&self) -> Option<u8> {
        (0..MAX_POINTERS as u8).find(|id| self.pointers.iter().all(|p| p.local_id != *id))
    }
}
