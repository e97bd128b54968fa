//! Fixed-kind storage block with a generic spill array.
//!
//! Each object carries five unboxed integer slots, five unboxed float
//! slots, five generic reference slots, and a growable spill array for
//! attributes past those bounds. Occupancy is tracked per slot in bitmaps:
//! a layout may designate a slot that nothing has been stored in yet (a
//! freshly migrated object, or a shared layout grown by a sibling), and
//! such slots must read as unset rather than yield stale bits.

use crate::object::layout::{
    SlotKind, SlotLocation, FLOAT_SLOT_COUNT, INT_SLOT_COUNT, REF_SLOT_COUNT,
};
use crate::object::ObjectError;
use opal_core::Value;
use smallvec::SmallVec;

/// Inline slots per fixed kind plus the spill array.
///
/// Reads and writes are O(1) index accesses. The block does not know which
/// layout governs it; callers resolve names to [`SlotLocation`]s first.
#[derive(Debug, Clone)]
pub struct FixedStorage {
    ints: [i64; INT_SLOT_COUNT],
    floats: [f64; FLOAT_SLOT_COUNT],
    refs: [Value; REF_SLOT_COUNT],
    /// Present even when empty.
    spill: Vec<Value>,
    /// Occupancy bitmaps, one bit per slot.
    int_set: u8,
    float_set: u8,
    ref_set: u8,
    spill_set: SmallVec<[u64; 1]>,
}

impl FixedStorage {
    /// An empty block with no spill cells.
    pub fn new() -> Self {
        Self::with_spill_capacity(0)
    }

    /// An empty block sized for a layout requiring `capacity` spill cells.
    pub fn with_spill_capacity(capacity: usize) -> Self {
        Self {
            ints: [0; INT_SLOT_COUNT],
            floats: [0.0; FLOAT_SLOT_COUNT],
            refs: [Value::none(); REF_SLOT_COUNT],
            spill: vec![Value::none(); capacity],
            int_set: 0,
            float_set: 0,
            ref_set: 0,
            spill_set: SmallVec::from_elem(0, words_for(capacity)),
        }
    }

    /// Read the slot at `location`.
    ///
    /// # Errors
    ///
    /// [`ObjectError::SlotUninitialized`] when nothing has been stored in
    /// the slot since construction or the last [`FixedStorage::reset`].
    pub fn read(&self, location: SlotLocation) -> Result<Value, ObjectError> {
        if !self.is_occupied(location) {
            return Err(ObjectError::SlotUninitialized {
                kind: location.kind,
                index: location.index,
            });
        }
        let index = location.index as usize;
        Ok(match location.kind {
            SlotKind::Int => Value::int_unchecked(self.ints[index]),
            SlotKind::Float => Value::float(self.floats[index]),
            SlotKind::Reference => self.refs[index],
            SlotKind::Spill => self.spill[index],
        })
    }

    /// Store `value` in the slot at `location`.
    ///
    /// Unconditional: no layout validation happens here; callers ensure the
    /// slot is assigned to the intended name. Returns whether the value was
    /// representable in the slot's kind: integer slots take ints, float
    /// slots take floats and widen ints, reference and spill cells take
    /// anything. On `false` the slot is left untouched.
    pub fn write(&mut self, location: SlotLocation, value: Value) -> bool {
        let index = location.index as usize;
        match location.kind {
            SlotKind::Int => match value.as_int() {
                Some(i) => {
                    self.ints[index] = i;
                    self.int_set |= 1 << index;
                    true
                }
                None => false,
            },
            SlotKind::Float => match value.as_float_coerce() {
                Some(f) => {
                    self.floats[index] = f;
                    self.float_set |= 1 << index;
                    true
                }
                None => false,
            },
            SlotKind::Reference => {
                self.refs[index] = value;
                self.ref_set |= 1 << index;
                true
            }
            SlotKind::Spill => {
                self.ensure_spill(index + 1);
                self.spill[index] = value;
                self.spill_set[index / 64] |= 1 << (index % 64);
                true
            }
        }
    }

    /// Whether the slot at `location` holds a stored value.
    pub fn is_occupied(&self, location: SlotLocation) -> bool {
        let index = location.index as usize;
        match location.kind {
            SlotKind::Int => self.int_set & (1 << index) != 0,
            SlotKind::Float => self.float_set & (1 << index) != 0,
            SlotKind::Reference => self.ref_set & (1 << index) != 0,
            SlotKind::Spill => self
                .spill_set
                .get(index / 64)
                .is_some_and(|word| word & (1 << (index % 64)) != 0),
        }
    }

    /// Mark every slot unoccupied and reallocate the spill array.
    ///
    /// This is the storage half of a migration: the caller snapshots values
    /// under the old layout first and restores them afterwards.
    pub fn reset(&mut self, spill_capacity: usize) {
        self.int_set = 0;
        self.float_set = 0;
        self.ref_set = 0;
        self.spill = vec![Value::none(); spill_capacity];
        self.spill_set = SmallVec::from_elem(0, words_for(spill_capacity));
    }

    /// Current spill array length.
    #[inline]
    pub fn spill_len(&self) -> usize {
        self.spill.len()
    }

    fn ensure_spill(&mut self, len: usize) {
        if self.spill.len() < len {
            self.spill.resize(len, Value::none());
        }
        let words = words_for(len);
        if self.spill_set.len() < words {
            self.spill_set.resize(words, 0);
        }
    }
}

impl Default for FixedStorage {
    fn default() -> Self {
        Self::new()
    }
}

fn words_for(bits: usize) -> usize {
    bits.div_ceil(64)
}

// =============================================================================
// Tests
// =============================================================================
