//! Layout descriptors and slot allocation.
//!
//! A [`Layout`] is an immutable, insertion-ordered mapping from attribute
//! name to a physical storage slot (kind + index). Objects sharing a logical
//! shape share one layout by reference; any change derives a *new* layout,
//! the old one stays valid for whoever still points at it.
//!
//! # Allocation policy
//!
//! [`Layout::allocate`] places a newly observed attribute in the lowest free
//! inline slot of its observed kind, overflowing into the generic spill
//! array once the per-kind bound is reached. Retyping an attribute reassigns
//! it to a slot of the new kind in place, freeing the old slot for reuse
//! within the derived layout. The lowest-free-index rule makes derivation a
//! pure function of the observation sequence: two layouts built from the
//! same ordered (name, kind) observations are structurally identical and
//! interchangeable.

use opal_core::intern::InternedString;
use opal_core::Value;
use rustc_hash::FxHashMap;
use smallvec::SmallVec;
use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

// =============================================================================
// Slot kinds and locations
// =============================================================================

/// Inline integer slots per object.
pub const INT_SLOT_COUNT: usize = 5;
/// Inline float slots per object.
pub const FLOAT_SLOT_COUNT: usize = 5;
/// Inline reference slots per object.
pub const REF_SLOT_COUNT: usize = 5;

/// The kind of storage cell an attribute occupies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SlotKind {
    /// Unboxed integer slot.
    Int,
    /// Unboxed float slot.
    Float,
    /// Generic slot holding any boxed value.
    Reference,
    /// Cell in the growable spill array; generic like `Reference`.
    Spill,
}

impl SlotKind {
    /// Storage kind observed for a value: ints and floats map to their
    /// primitive kinds, everything else is reference-kind.
    #[inline]
    pub fn of_value(value: Value) -> Self {
        if value.is_int() {
            Self::Int
        } else if value.is_float() {
            Self::Float
        } else {
            Self::Reference
        }
    }

    /// Whether a slot of this kind holds a value observed as `observed`
    /// without reallocation. Spill cells are generic and absorb every kind.
    #[inline]
    pub fn can_hold(self, observed: SlotKind) -> bool {
        self == SlotKind::Spill || self == observed
    }

    /// Inline slots available for this kind; spill is unbounded.
    #[inline]
    pub const fn inline_capacity(self) -> usize {
        match self {
            Self::Int => INT_SLOT_COUNT,
            Self::Float => FLOAT_SLOT_COUNT,
            Self::Reference => REF_SLOT_COUNT,
            Self::Spill => usize::MAX,
        }
    }
}

/// A physical storage slot: kind plus index within that kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotLocation {
    /// Kind of the cell.
    pub kind: SlotKind,
    /// Index within the kind's cells.
    pub index: u16,
}

/// One attribute's position in a layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayoutEntry {
    /// Interned attribute name.
    pub name: InternedString,
    /// Where the attribute's value is stored.
    pub location: SlotLocation,
}

// =============================================================================
// Layout id
// =============================================================================

/// Identifier distinguishing layout instances.
///
/// Ids are unique per derivation and deliberately excluded from structural
/// equality; they exist for diagnostics and cache keying.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct LayoutId(u32);

impl LayoutId {
    /// Raw id value.
    #[inline]
    pub const fn raw(self) -> u32 {
        self.0
    }
}

static NEXT_LAYOUT_ID: AtomicU32 = AtomicU32::new(1);

fn allocate_layout_id() -> LayoutId {
    LayoutId(NEXT_LAYOUT_ID.fetch_add(1, Ordering::Relaxed))
}

// =============================================================================
// Layout
// =============================================================================

/// Immutable attribute-to-slot mapping shared by same-shaped objects.
pub struct Layout {
    id: LayoutId,
    /// Entries in attribute insertion order.
    entries: Vec<LayoutEntry>,
    /// Name to entry-position index.
    index: FxHashMap<InternedString, usize>,
    int_slots: u16,
    float_slots: u16,
    ref_slots: u16,
    spill_slots: u16,
    /// One past the highest spill index in use.
    spill_capacity: u32,
}

impl Layout {
    /// The layout with no attributes.
    pub fn empty() -> Arc<Self> {
        Self::from_entries(Vec::new())
    }

    fn from_entries(entries: Vec<LayoutEntry>) -> Arc<Self> {
        let mut index =
            FxHashMap::with_capacity_and_hasher(entries.len(), Default::default());
        let mut int_slots = 0u16;
        let mut float_slots = 0u16;
        let mut ref_slots = 0u16;
        let mut spill_slots = 0u16;
        let mut spill_capacity = 0u32;

        for (position, entry) in entries.iter().enumerate() {
            index.insert(entry.name.clone(), position);
            match entry.location.kind {
                SlotKind::Int => int_slots += 1,
                SlotKind::Float => float_slots += 1,
                SlotKind::Reference => ref_slots += 1,
                SlotKind::Spill => {
                    spill_slots += 1;
                    spill_capacity = spill_capacity.max(u32::from(entry.location.index) + 1);
                }
            }
        }

        Arc::new(Self {
            id: allocate_layout_id(),
            entries,
            index,
            int_slots,
            float_slots,
            ref_slots,
            spill_slots,
            spill_capacity,
        })
    }

    /// Id of this layout instance.
    #[inline]
    pub fn id(&self) -> LayoutId {
        self.id
    }

    /// Entries in attribute insertion order.
    #[inline]
    pub fn entries(&self) -> &[LayoutEntry] {
        &self.entries
    }

    /// Number of attributes.
    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the layout has no attributes.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Slot assigned to `name`, if present.
    #[inline]
    pub fn lookup(&self, name: &InternedString) -> Option<SlotLocation> {
        self.index.get(name).map(|&position| self.entries[position].location)
    }

    /// Whether `name` has a slot.
    #[inline]
    pub fn contains(&self, name: &InternedString) -> bool {
        self.index.contains_key(name)
    }

    /// Number of slots of `kind` in use.
    pub fn slots_in_use(&self, kind: SlotKind) -> u16 {
        match kind {
            SlotKind::Int => self.int_slots,
            SlotKind::Float => self.float_slots,
            SlotKind::Reference => self.ref_slots,
            SlotKind::Spill => self.spill_slots,
        }
    }

    /// Spill array length this layout requires of its objects.
    #[inline]
    pub fn spill_capacity(&self) -> usize {
        self.spill_capacity as usize
    }

    /// A structurally identical layout under a fresh id.
    ///
    /// Used when an object needs a descriptor it owns alone.
    pub fn duplicate(&self) -> Arc<Self> {
        Self::from_entries(self.entries.clone())
    }

    /// Derive the layout for observing `name` with value kind `kind`.
    ///
    /// Returns `base` unchanged when `name` already occupies a compatible
    /// slot. Otherwise the derived layout places `name` in the lowest free
    /// slot of `kind`, spilling past the inline bound; a retype keeps the
    /// attribute's insertion position and frees its old slot for reuse.
    pub fn allocate(base: &Arc<Self>, name: &InternedString, kind: SlotKind) -> Arc<Self> {
        debug_assert!(kind != SlotKind::Spill, "spill is assigned, never observed");

        if let Some(location) = base.lookup(name) {
            if location.kind.can_hold(kind) {
                return Arc::clone(base);
            }
        }

        let mut entries = base.entries.clone();
        let replaced = base.index.get(name).copied();
        let location = next_free_location(&entries, kind, replaced);
        match replaced {
            Some(position) => entries[position].location = location,
            None => entries.push(LayoutEntry {
                name: name.clone(),
                location,
            }),
        }
        Self::from_entries(entries)
    }

    /// Derive the layout without `name`. Returns `base` unchanged when the
    /// attribute is absent.
    pub fn without(base: &Arc<Self>, name: &InternedString) -> Arc<Self> {
        match base.index.get(name).copied() {
            Some(position) => {
                let mut entries = base.entries.clone();
                entries.remove(position);
                Self::from_entries(entries)
            }
            None => Arc::clone(base),
        }
    }
}

/// Lowest free slot for `kind`, overflowing to spill past the inline bound.
/// `skip` excludes the entry being retyped, freeing its slot.
fn next_free_location(
    entries: &[LayoutEntry],
    kind: SlotKind,
    skip: Option<usize>,
) -> SlotLocation {
    let used = |wanted: SlotKind| -> SmallVec<[u16; 8]> {
        entries
            .iter()
            .enumerate()
            .filter(|(position, entry)| {
                Some(*position) != skip && entry.location.kind == wanted
            })
            .map(|(_, entry)| entry.location.index)
            .collect()
    };

    let used_inline = used(kind);
    for index in 0..kind.inline_capacity().min(u16::MAX as usize) as u16 {
        if !used_inline.contains(&index) {
            return SlotLocation { kind, index };
        }
    }

    let used_spill = used(SlotKind::Spill);
    let mut index = 0u16;
    loop {
        if !used_spill.contains(&index) {
            return SlotLocation {
                kind: SlotKind::Spill,
                index,
            };
        }
        index += 1;
    }
}

impl PartialEq for Layout {
    /// Structural comparison: same names in the same order mapped to the
    /// same slots. Ids are ignored, so value-equal layouts from unrelated
    /// derivations are interchangeable.
    fn eq(&self, other: &Self) -> bool {
        self.entries == other.entries
    }
}

impl Eq for Layout {}

impl fmt::Debug for Layout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Layout#{}", self.id.raw())?;
        f.debug_map()
            .entries(
                self.entries
                    .iter()
                    .map(|entry| (entry.name.as_str(), entry.location)),
            )
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================
