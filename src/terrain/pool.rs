//! Fixed-capacity arena for column segments.

use tracing::warn;

use crate::soil::SoilType;

/// Handle to a segment slot inside a [`MaterialPool`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SegmentId(u32);

impl SegmentId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// One run of a single material within a column.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Segment {
    /// Material of this run.
    pub soil: SoilType,
    /// Run length (never negative).
    pub thickness: f64,
    /// Cumulative height of everything below this run.
    pub floor: f64,
    /// Fraction of the pore volume filled with water (0-1).
    pub saturation: f64,
}

impl Segment {
    const EMPTY: Segment = Segment {
        soil: SoilType::AIR,
        thickness: 0.0,
        floor: 0.0,
        saturation: 0.0,
    };

    /// Height of the top of this run.
    #[inline]
    pub fn ceiling(&self) -> f64 {
        self.floor + self.thickness
    }
}

/// Preallocated segment storage with a LIFO free list.
///
/// The pool never grows. When it runs out, [`MaterialPool::get`] returns `None`
/// and counts the event; callers treat that as "material not added".
#[derive(Debug, Clone)]
pub struct MaterialPool {
    slots: Vec<Segment>,
    free: Vec<SegmentId>,
    exhausted: u64,
}

impl MaterialPool {
    /// Creates a pool with `capacity` slots.
    pub fn new(capacity: usize) -> Self {
        let mut pool = Self {
            slots: Vec::new(),
            free: Vec::new(),
            exhausted: 0,
        };
        pool.reserve(capacity);
        pool
    }

    /// Replaces the storage with `capacity` fresh slots, all free.
    pub fn reserve(&mut self, capacity: usize) {
        assert!(capacity <= u32::MAX as usize, "pool capacity exceeds u32 handles");
        self.slots = vec![Segment::EMPTY; capacity];
        self.reset();
    }

    /// Marks every slot free again. Outstanding handles become invalid.
    pub fn reset(&mut self) {
        self.free.clear();
        // Reverse order so slot 0 is handed out first.
        self.free.extend((0..self.slots.len() as u32).rev().map(SegmentId));
        for slot in &mut self.slots {
            *slot = Segment::EMPTY;
        }
    }

    /// Takes a free slot and initialises it with `thickness` of `soil`.
    pub fn get(&mut self, thickness: f64, soil: SoilType) -> Option<SegmentId> {
        let Some(id) = self.free.pop() else {
            self.exhausted += 1;
            warn!(
                capacity = self.slots.len(),
                exhausted = self.exhausted,
                "material pool out of segments, material dropped"
            );
            return None;
        };
        self.slots[id.index()] = Segment {
            soil,
            thickness,
            ..Segment::EMPTY
        };
        Some(id)
    }

    /// Returns a slot to the free list. `None` is a no-op.
    pub fn unget(&mut self, id: Option<SegmentId>) {
        let Some(id) = id else {
            return;
        };
        self.slots[id.index()] = Segment::EMPTY;
        self.free.push(id);
    }

    #[inline]
    pub fn segment(&self, id: SegmentId) -> &Segment {
        &self.slots[id.index()]
    }

    #[inline]
    pub fn segment_mut(&mut self, id: SegmentId) -> &mut Segment {
        &mut self.slots[id.index()]
    }

    /// Total number of slots.
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Number of slots currently free.
    pub fn len_free(&self) -> usize {
        self.free.len()
    }

    /// Number of slots currently owned by columns.
    pub fn len_used(&self) -> usize {
        self.slots.len() - self.free.len()
    }

    /// How many `get` calls failed since creation.
    pub fn exhausted_count(&self) -> u64 {
        self.exhausted
    }
}
