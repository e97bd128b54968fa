//! Layout transitions: class synchronization and value-preserving migration.
//!
//! The engine has two entry points. [`synchronize_with_class`] reconciles an
//! instance with its class; it runs on paths that fell back from compiled
//! code to the interpreter, where the compiled fast path assumed layout
//! stability and can no longer be trusted. [`migrate`] moves an instance
//! onto a different layout while preserving every attribute value.
//!
//! Migration is atomic with respect to other readers of the same object:
//! both entry points take `&mut Instance`, so the exclusive borrow is the
//! per-object critical section. The only cross-object state is the class
//! canonical cell, updated exclusively by replace-if-unchanged; a lost swap
//! re-runs the migration against the winner's layout and never surfaces to
//! the caller.

use crate::object::instance::Instance;
use crate::object::layout::{Layout, SlotKind};
use opal_core::intern::InternedString;
use opal_core::Value;
use std::sync::Arc;

/// Reconcile `object` with its class after a possible layout divergence.
///
/// If the class has abandoned canonical sharing, the object is marked
/// private and re-derives an independent duplicate of its own current
/// layout: the object outlived the layout generation its class moved away
/// from, and must not sync against a canonical that no longer describes it.
/// Otherwise a stale object migrates onto the current canonical.
///
/// Post-condition: the object's layout is private and independently owned,
/// or identical by reference to the class canonical.
pub fn synchronize_with_class(object: &mut Instance) {
    if object.class().sharing_abandoned() {
        if !object.is_private_layout() {
            object.mark_private_layout();
            let duplicate = object.layout().duplicate();
            migrate(object, duplicate);
        }
        return;
    }

    // Private layouts no longer track the canonical.
    if object.is_private_layout() {
        return;
    }

    let canonical = object.class().canonical_layout();
    if !Arc::ptr_eq(object.layout(), &canonical) {
        migrate(object, canonical);
    }
}

/// Move `object` onto `target`, preserving attribute values.
///
/// Steps: snapshot the attributes under the current layout, swap the layout
/// reference, reset all slot occupancy and reallocate the spill array to
/// the target's size, then restore each value into the slot the target
/// assigns its name. Shared objects also install `target` as the class
/// canonical; when that replace-if-unchanged swap is lost, the object is
/// re-migrated onto the newly installed canonical instead of overwriting
/// it.
///
/// Restore coercion: ints widen into float slots, primitives box into
/// reference and spill cells. A value the target slot cannot represent
/// leaves the slot unoccupied; that only arises for the one attribute a
/// retype is about to overwrite.
pub fn migrate(object: &mut Instance, target: Arc<Layout>) {
    let mut target = target;
    loop {
        let snapshot = object.attributes();
        let previous = object.replace_layout(Arc::clone(&target));
        object.storage_mut().reset(target.spill_capacity());
        for (name, value) in snapshot {
            if let Some(location) = target.lookup(&name) {
                object.storage_mut().write(location, value);
            }
        }

        if object.is_private_layout() {
            return;
        }
        if object.class().try_swap_canonical(&previous, Arc::clone(&target)) {
            return;
        }

        // Lost the canonical race; converge on whatever won.
        let canonical = object.class().canonical_layout();
        if Arc::ptr_eq(object.layout(), &canonical) {
            return;
        }
        target = canonical;
    }
}

/// Slow path for attribute writes: derive a layout with a compatible slot
/// for `name`, migrate, and store.
///
/// Additions extend the shared canonical so siblings and future instances
/// pick the slot up. A write whose kind conflicts with the canonical's
/// recorded kind diverges this one object to a private layout; the
/// canonical and its other instances stay untouched.
pub(crate) fn extend_and_write(object: &mut Instance, name: &InternedString, value: Value) {
    let kind = SlotKind::of_value(value);
    loop {
        if let Some(location) = object.layout().lookup(name) {
            if location.kind.can_hold(kind) {
                let stored = object.storage_mut().write(location, value);
                debug_assert!(stored, "compatible slot rejected {value:?}");
                return;
            }
        }

        if object.is_private_layout() {
            let target = Layout::allocate(object.layout(), name, kind);
            migrate(object, target);
            continue;
        }

        let canonical = object.class().canonical_layout();
        match canonical.lookup(name) {
            Some(location) if !location.kind.can_hold(kind) => {
                // The class-wide layout types this attribute differently.
                object.mark_private_layout();
                let target = Layout::allocate(object.layout(), name, kind);
                migrate(object, target);
            }
            _ => {
                let target = Layout::allocate(&canonical, name, kind);
                migrate(object, target);
            }
        }
    }
}

/// Remove `name` from `object` by migrating to a layout without it.
///
/// Removal is always a private transition; the canonical never shrinks, so
/// siblings still tracking it keep their values.
pub(crate) fn remove_attribute(object: &mut Instance, name: &InternedString) {
    object.mark_private_layout();
    let target = Layout::without(object.layout(), name);
    migrate(object, target);
}

// =============================================================================
// Tests
// =============================================================================
