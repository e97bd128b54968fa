//! Class-side layout bookkeeping.
//!
//! A class hands its canonical layout to newly constructed instances and
//! absorbs layout growth back from them, so siblings keep sharing one
//! descriptor. The canonical cell is replace-if-unchanged: two instances
//! racing to extend the same class never overwrite each other's update;
//! the loser re-reads and retries against the winner's layout.

use crate::object::layout::Layout;
use opal_core::intern::InternedString;
use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A runtime class, owning the canonical layout for its instances.
///
/// Classes are looked up, never owned, by their instances; the `Arc` here
/// carries no back-references.
pub struct Class {
    name: InternedString,
    /// Layout handed to new instances. Replaced only through
    /// [`Class::try_swap_canonical`].
    canonical: Mutex<Arc<Layout>>,
    /// Once set, canonical sharing is over: instances that observe the flag
    /// switch to private layouts, and new instances start private.
    sharing_abandoned: AtomicBool,
}

impl Class {
    /// A class whose instances start with no attributes.
    pub fn new(name: InternedString) -> Arc<Self> {
        Arc::new(Self {
            name,
            canonical: Mutex::new(Layout::empty()),
            sharing_abandoned: AtomicBool::new(false),
        })
    }

    /// Class name.
    #[inline]
    pub fn name(&self) -> &InternedString {
        &self.name
    }

    /// The layout new instances currently start with.
    pub fn canonical_layout(&self) -> Arc<Layout> {
        Arc::clone(&self.canonical.lock())
    }

    /// Install `new` as the canonical layout if the current one is still
    /// `expected`.
    ///
    /// Compare-and-swap semantics over the layout reference. A `false`
    /// return means another migration installed a different layout first;
    /// the caller re-reads [`Class::canonical_layout`] and retries rather
    /// than overwriting it.
    pub fn try_swap_canonical(&self, expected: &Arc<Layout>, new: Arc<Layout>) -> bool {
        let mut canonical = self.canonical.lock();
        if Arc::ptr_eq(&canonical, expected) {
            *canonical = new;
            true
        } else {
            false
        }
    }

    /// Whether canonical sharing has been abandoned.
    #[inline]
    pub fn sharing_abandoned(&self) -> bool {
        self.sharing_abandoned.load(Ordering::Acquire)
    }

    /// Stop sharing: every future instance uses a private layout, and live
    /// instances go private on their next synchronization.
    pub fn abandon_sharing(&self) {
        self.sharing_abandoned.store(true, Ordering::Release);
    }
}

impl fmt::Debug for Class {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Class")
            .field("name", &self.name.as_str())
            .field("canonical", &self.canonical_layout().id())
            .field("sharing_abandoned", &self.sharing_abandoned())
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================
