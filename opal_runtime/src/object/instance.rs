//! Object instances and the attribute access interface.
//!
//! An [`Instance`] is a fixed storage block governed by its current layout.
//! Reads resolve the name through the layout and read the slot; writes take
//! a direct-store fast path when the layout already has a compatible slot
//! and otherwise hand off to the transition engine.

use crate::object::class::Class;
use crate::object::layout::{Layout, SlotKind};
use crate::object::storage::FixedStorage;
use crate::object::transition;
use crate::object::ObjectError;
use opal_core::intern::InternedString;
use opal_core::Value;
use std::sync::Arc;

/// How an instance relates to its class's canonical layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayoutPolicy {
    /// The layout tracks the class canonical; growth propagates back to
    /// the class so siblings and future instances pick it up.
    Shared,
    /// The layout belongs to this instance alone. Canonical changes on the
    /// class no longer affect it.
    Private,
}

/// An object instance: class reference, current layout, storage.
#[derive(Debug)]
pub struct Instance {
    class: Arc<Class>,
    layout: Arc<Layout>,
    policy: LayoutPolicy,
    storage: FixedStorage,
}

impl Instance {
    /// Construct an instance of `class`.
    ///
    /// Starts on the class's canonical layout in shared mode, or on a
    /// private duplicate when the class has abandoned sharing.
    pub fn new(class: Arc<Class>) -> Self {
        let (layout, policy) = if class.sharing_abandoned() {
            (class.canonical_layout().duplicate(), LayoutPolicy::Private)
        } else {
            (class.canonical_layout(), LayoutPolicy::Shared)
        };
        let storage = FixedStorage::with_spill_capacity(layout.spill_capacity());
        Self {
            class,
            layout,
            policy,
            storage,
        }
    }

    /// The owning class.
    #[inline]
    pub fn class(&self) -> &Arc<Class> {
        &self.class
    }

    /// The current layout.
    #[inline]
    pub fn layout(&self) -> &Arc<Layout> {
        &self.layout
    }

    /// Current layout policy.
    #[inline]
    pub fn layout_policy(&self) -> LayoutPolicy {
        self.policy
    }

    /// Whether the layout is private to this instance.
    #[inline]
    pub fn is_private_layout(&self) -> bool {
        self.policy == LayoutPolicy::Private
    }

    /// Storage block, for inspection.
    #[inline]
    pub fn storage(&self) -> &FixedStorage {
        &self.storage
    }

    pub(crate) fn storage_mut(&mut self) -> &mut FixedStorage {
        &mut self.storage
    }

    pub(crate) fn mark_private_layout(&mut self) {
        self.policy = LayoutPolicy::Private;
    }

    /// Swap in a new layout, returning the previous one.
    pub(crate) fn replace_layout(&mut self, layout: Arc<Layout>) -> Arc<Layout> {
        std::mem::replace(&mut self.layout, layout)
    }

    // =========================================================================
    // Attribute access
    // =========================================================================

    /// Read an attribute.
    ///
    /// # Errors
    ///
    /// [`ObjectError::AttributeNotFound`] when the layout has no slot for
    /// `name`, or when it has one that nothing was ever stored in (a slot
    /// inherited from a shared layout grown by a sibling).
    pub fn get_attribute(&self, name: &InternedString) -> Result<Value, ObjectError> {
        let location = self.layout.lookup(name).ok_or_else(|| self.missing(name))?;
        self.storage.read(location).map_err(|error| match error {
            ObjectError::SlotUninitialized { .. } => self.missing(name),
            other => other,
        })
    }

    /// Whether `name` resolves to a stored value on this instance.
    pub fn has_attribute(&self, name: &InternedString) -> bool {
        self.layout
            .lookup(name)
            .is_some_and(|location| self.storage.is_occupied(location))
    }

    /// Write an attribute.
    ///
    /// Direct slot store when the current layout has a compatible slot;
    /// otherwise the transition engine derives a layout that does, migrates
    /// this instance onto it, and stores.
    pub fn set_attribute(&mut self, name: &InternedString, value: Value) {
        if let Some(location) = self.layout.lookup(name) {
            if location.kind.can_hold(SlotKind::of_value(value)) {
                let stored = self.storage.write(location, value);
                debug_assert!(stored, "compatible slot rejected {value:?}");
                return;
            }
        }
        transition::extend_and_write(self, name, value);
    }

    /// Remove an attribute, migrating to a layout without it.
    ///
    /// # Errors
    ///
    /// [`ObjectError::AttributeNotFound`] when the attribute is absent.
    pub fn delete_attribute(&mut self, name: &InternedString) -> Result<(), ObjectError> {
        if !self.has_attribute(name) {
            return Err(self.missing(name));
        }
        transition::remove_attribute(self, name);
        Ok(())
    }

    /// Snapshot of every stored attribute in layout insertion order.
    ///
    /// Slots the layout designates but nothing has written are skipped.
    /// The returned pairs are decoupled from the instance; later writes are
    /// not reflected.
    pub fn attributes(&self) -> Vec<(InternedString, Value)> {
        let mut snapshot = Vec::with_capacity(self.layout.len());
        for entry in self.layout.entries() {
            if let Ok(value) = self.storage.read(entry.location) {
                snapshot.push((entry.name.clone(), value));
            }
        }
        snapshot
    }

    fn missing(&self, name: &InternedString) -> ObjectError {
        ObjectError::AttributeNotFound {
            class_name: self.class.name().to_string(),
            attribute: name.to_string(),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use opal_core::intern::intern;

    fn instance(class_name: &str) -> Instance {
        Instance::new(Class::new(intern(class_name)))
    }

    // -------------------------------------------------------------------------
    // Construction
    // -------------------------------------------------------------------------

    #[test]
    fn test_new_instance_shares_canonical() {
        let class = Class::new(intern("Point"));
        let a = Instance::new(Arc::clone(&class));
        assert_eq!(a.layout_policy(), LayoutPolicy::Shared);
        assert!(Arc::ptr_eq(a.layout(), &class.canonical_layout()));
        assert!(Arc::ptr_eq(a.class(), &class));
    }

    #[test]
    fn test_new_instance_private_after_abandon() {
        let class = Class::new(intern("Late"));
        class.abandon_sharing();
        let a = Instance::new(Arc::clone(&class));
        assert_eq!(a.layout_policy(), LayoutPolicy::Private);
        assert!(!Arc::ptr_eq(a.layout(), &class.canonical_layout()));
        assert_eq!(**a.layout(), *class.canonical_layout());
    }

    // -------------------------------------------------------------------------
    // Read / write
    // -------------------------------------------------------------------------

    #[test]
    fn test_set_then_get() {
        let mut obj = instance("C");
        let x = intern("x");
        obj.set_attribute(&x, Value::int(42).unwrap());
        assert_eq!(obj.get_attribute(&x).unwrap(), Value::int(42).unwrap());
    }

    #[test]
    fn test_get_missing_attribute() {
        let obj = instance("Widget");
        let err = obj.get_attribute(&intern("ghost")).unwrap_err();
        assert_eq!(
            err,
            ObjectError::AttributeNotFound {
                class_name: "Widget".to_owned(),
                attribute: "ghost".to_owned(),
            }
        );
        assert_eq!(
            err.to_string(),
            "'Widget' object has no attribute 'ghost'"
        );
    }

    #[test]
    fn test_overwrite_same_kind_keeps_layout() {
        let mut obj = instance("C");
        let x = intern("x");
        obj.set_attribute(&x, Value::int(1).unwrap());
        let layout = Arc::clone(obj.layout());
        obj.set_attribute(&x, Value::int(2).unwrap());
        assert!(Arc::ptr_eq(obj.layout(), &layout));
        assert_eq!(obj.get_attribute(&x).unwrap(), Value::int(2).unwrap());
    }

    #[test]
    fn test_mixed_kind_attributes() {
        let mut obj = instance("C");
        obj.set_attribute(&intern("i"), Value::int(1).unwrap());
        obj.set_attribute(&intern("f"), Value::float(2.5));
        obj.set_attribute(&intern("s"), Value::string(&intern("three")));
        obj.set_attribute(&intern("b"), Value::bool(true));
        obj.set_attribute(&intern("n"), Value::none());

        assert_eq!(obj.get_attribute(&intern("i")).unwrap(), Value::int(1).unwrap());
        assert_eq!(obj.get_attribute(&intern("f")).unwrap(), Value::float(2.5));
        assert_eq!(
            obj.get_attribute(&intern("s")).unwrap(),
            Value::string(&intern("three"))
        );
        assert_eq!(obj.get_attribute(&intern("b")).unwrap(), Value::bool(true));
        assert_eq!(obj.get_attribute(&intern("n")).unwrap(), Value::none());
    }

    #[test]
    fn test_has_attribute_requires_stored_value() {
        let class = Class::new(intern("C"));
        let mut a = Instance::new(Arc::clone(&class));
        let b = Instance::new(Arc::clone(&class));
        a.set_attribute(&intern("x"), Value::int(1).unwrap());

        assert!(a.has_attribute(&intern("x")));
        // The canonical grew, but b never stored anything.
        assert!(!b.has_attribute(&intern("x")));
        assert!(!a.has_attribute(&intern("y")));
    }

    #[test]
    fn test_inherited_slot_reads_as_missing() {
        let class = Class::new(intern("C"));
        let mut a = Instance::new(Arc::clone(&class));
        a.set_attribute(&intern("x"), Value::int(1).unwrap());

        // Constructed after the canonical grew: the slot exists, no value.
        let b = Instance::new(Arc::clone(&class));
        assert!(b.layout().contains(&intern("x")));
        assert!(matches!(
            b.get_attribute(&intern("x")),
            Err(ObjectError::AttributeNotFound { .. })
        ));
    }

    // -------------------------------------------------------------------------
    // Enumeration
    // -------------------------------------------------------------------------

    #[test]
    fn test_attributes_in_insertion_order() {
        let mut obj = instance("C");
        obj.set_attribute(&intern("first"), Value::int(1).unwrap());
        obj.set_attribute(&intern("second"), Value::string(&intern("2")));
        obj.set_attribute(&intern("third"), Value::float(3.0));

        let names: Vec<_> = obj
            .attributes()
            .into_iter()
            .map(|(name, _)| name.as_str().to_owned())
            .collect();
        assert_eq!(names, ["first", "second", "third"]);
    }

    #[test]
    fn test_attributes_is_a_snapshot() {
        let mut obj = instance("C");
        obj.set_attribute(&intern("x"), Value::int(1).unwrap());
        let snapshot = obj.attributes();
        obj.set_attribute(&intern("x"), Value::int(2).unwrap());
        assert_eq!(snapshot[0].1, Value::int(1).unwrap());
    }

    // -------------------------------------------------------------------------
    // Deletion
    // -------------------------------------------------------------------------

    #[test]
    fn test_delete_attribute() {
        let mut obj = instance("C");
        let x = intern("x");
        obj.set_attribute(&x, Value::int(1).unwrap());
        obj.delete_attribute(&x).unwrap();

        assert!(!obj.has_attribute(&x));
        assert!(matches!(
            obj.get_attribute(&x),
            Err(ObjectError::AttributeNotFound { .. })
        ));
    }

    #[test]
    fn test_delete_missing_attribute() {
        let mut obj = instance("C");
        assert!(matches!(
            obj.delete_attribute(&intern("absent")),
            Err(ObjectError::AttributeNotFound { .. })
        ));
    }

    #[test]
    fn test_delete_then_re_add() {
        let mut obj = instance("C");
        let x = intern("x");
        obj.set_attribute(&x, Value::int(1).unwrap());
        obj.set_attribute(&intern("y"), Value::int(2).unwrap());
        obj.delete_attribute(&x).unwrap();
        obj.set_attribute(&x, Value::int(3).unwrap());

        assert_eq!(obj.get_attribute(&x).unwrap(), Value::int(3).unwrap());
        assert_eq!(obj.get_attribute(&intern("y")).unwrap(), Value::int(2).unwrap());
        // Re-added attributes go to the end of the enumeration order.
        let names: Vec<_> = obj
            .attributes()
            .into_iter()
            .map(|(name, _)| name.as_str().to_owned())
            .collect();
        assert_eq!(names, ["y", "x"]);
    }
}
