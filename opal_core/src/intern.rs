//! Attribute-name interning for O(1) equality.
//!
//! Attribute names are compared on every slot lookup, so they are interned
//! once and compared by pointer afterwards. The interner also resolves a raw
//! data pointer back to its handle, which is how NaN-boxed string values
//! recover their content.

use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, LazyLock};

/// A handle to an interned string.
///
/// Two handles produced by the same interner are equal exactly when they
/// carry the same content; equality and hashing go through the data pointer,
/// never the bytes.
#[derive(Clone)]
pub struct InternedString {
    data: Arc<str>,
}

impl InternedString {
    #[inline]
    fn from_arc(data: Arc<str>) -> Self {
        Self { data }
    }

    /// The string content.
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.data
    }

    /// Byte length of the content.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the content is empty.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Address of the string data.
    ///
    /// Stable for the lifetime of the interner that produced the handle;
    /// used as the identity key and as the NaN-boxed payload for string
    /// values.
    #[inline]
    #[must_use]
    pub fn data_ptr(&self) -> *const u8 {
        self.data.as_ptr()
    }
}

impl PartialEq for InternedString {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.data, &other.data)
    }
}

impl Eq for InternedString {}

impl Hash for InternedString {
    #[inline]
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.data_ptr().hash(state);
    }
}

impl PartialEq<str> for InternedString {
    fn eq(&self, other: &str) -> bool {
        self.as_str() == other
    }
}

impl PartialEq<&str> for InternedString {
    fn eq(&self, other: &&str) -> bool {
        self.as_str() == *other
    }
}

impl AsRef<str> for InternedString {
    #[inline]
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl std::ops::Deref for InternedString {
    type Target = str;

    #[inline]
    fn deref(&self) -> &Self::Target {
        self.as_str()
    }
}

impl fmt::Debug for InternedString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "InternedString({:?})", self.as_str())
    }
}

impl fmt::Display for InternedString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Deduplicating string interner.
///
/// Interning the same content twice returns the same handle. Thread-safe;
/// lookups take a read lock, first-time insertions upgrade to a write lock
/// with a double-check.
pub struct StringInterner {
    maps: RwLock<InternerMaps>,
}

/// `by_value` is the canonical dedup map; `by_ptr` answers reverse lookups
/// from the data pointer stored in NaN-boxed string payloads.
struct InternerMaps {
    by_value: FxHashMap<Arc<str>, InternedString>,
    by_ptr: FxHashMap<usize, InternedString>,
}

impl StringInterner {
    /// Create an empty interner.
    #[must_use]
    pub fn new() -> Self {
        Self {
            maps: RwLock::new(InternerMaps {
                by_value: FxHashMap::default(),
                by_ptr: FxHashMap::default(),
            }),
        }
    }

    /// Intern `s`, returning the canonical handle for its content.
    pub fn intern(&self, s: &str) -> InternedString {
        {
            let maps = self.maps.read();
            if let Some(existing) = maps.by_value.get(s) {
                return existing.clone();
            }
        }

        let mut maps = self.maps.write();
        // Another thread may have interned between the locks.
        if let Some(existing) = maps.by_value.get(s) {
            return existing.clone();
        }

        let data: Arc<str> = s.into();
        let handle = InternedString::from_arc(Arc::clone(&data));
        maps.by_ptr.insert(handle.data_ptr() as usize, handle.clone());
        maps.by_value.insert(data, handle.clone());
        handle
    }

    /// Resolve a handle from its data pointer.
    ///
    /// Returns `None` for pointers this interner never produced.
    #[must_use]
    pub fn resolve_ptr(&self, ptr: *const u8) -> Option<InternedString> {
        self.maps.read().by_ptr.get(&(ptr as usize)).cloned()
    }

    /// Whether `s` has been interned.
    #[must_use]
    pub fn contains(&self, s: &str) -> bool {
        self.maps.read().by_value.contains_key(s)
    }

    /// Number of distinct interned strings.
    #[must_use]
    pub fn len(&self) -> usize {
        self.maps.read().by_value.len()
    }

    /// Whether nothing has been interned yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.maps.read().by_value.is_empty()
    }
}

impl Default for StringInterner {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for StringInterner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StringInterner")
            .field("count", &self.len())
            .finish()
    }
}

/// Process-wide interner for attribute names and string values.
static GLOBAL_INTERNER: LazyLock<StringInterner> = LazyLock::new(StringInterner::new);

/// Intern a string in the global interner.
#[inline]
pub fn intern(s: &str) -> InternedString {
    GLOBAL_INTERNER.intern(s)
}

/// Resolve a globally interned string from its data pointer.
///
/// Supports NaN-boxed string payload decoding in [`crate::Value`].
#[inline]
#[must_use]
pub fn resolve_ptr(ptr: *const u8) -> Option<InternedString> {
    GLOBAL_INTERNER.resolve_ptr(ptr)
}

// =============================================================================
// Tests
// =============================================================================
