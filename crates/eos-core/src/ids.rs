use core::fmt;
use core::num::NonZeroU32;

/// Raw integer used for an unbound key across integer (FFI) boundaries.
pub const UNBOUND_KEY: i32 = -1;

/// Compact identifier of a registry slot.
///
/// - `u32` keeps handles small
/// - `NonZero` lets `Option<ObjectKey>` stand for "maybe unbound" at no cost
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ObjectKey(NonZeroU32);

impl ObjectKey {
    /// Create a key from a 0-based slot index by storing index+1.
    ///
    /// `None` for `u32::MAX`, which has no index+1 representation.
    pub fn from_index(index: u32) -> Option<Self> {
        NonZeroU32::MIN.checked_add(index).map(Self)
    }

    /// Key for a slot index coming from a `usize` table position.
    pub fn try_from_index(index: usize) -> Option<Self> {
        u32::try_from(index).ok().and_then(Self::from_index)
    }

    /// Recover the 0-based slot index.
    pub fn index(self) -> u32 {
        self.0.get() - 1
    }

    /// Slot index as a table position.
    pub fn slot(self) -> usize {
        self.index() as usize
    }

    /// Key as the plain integer handed across foreign-function boundaries.
    pub fn as_raw(self) -> i32 {
        i32::try_from(self.index()).unwrap_or(UNBOUND_KEY)
    }

    /// Parse a plain integer key; negative values are the unbound sentinel.
    pub fn from_raw(raw: i32) -> Option<Self> {
        u32::try_from(raw).ok().and_then(Self::from_index)
    }
}

/// Raw form of an optional key, `UNBOUND_KEY` when absent.
pub fn raw_key(key: Option<ObjectKey>) -> i32 {
    key.map_or(UNBOUND_KEY, ObjectKey::as_raw)
}

impl From<ObjectKey> for i32 {
    fn from(key: ObjectKey) -> Self {
        key.as_raw()
    }
}

impl fmt::Debug for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectKey({})", self.index())
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.index())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_round_trip_index() {
        for i in [0_u32, 1, 2, 42, 10_000] {
            let key = ObjectKey::from_index(i).unwrap();
            assert_eq!(key.index(), i);
            assert_eq!(ObjectKey::from_raw(key.as_raw()), Some(key));
        }
    }

    #[test]
    fn option_key_is_small() {
        assert_eq!(
            core::mem::size_of::<ObjectKey>(),
            core::mem::size_of::<Option<ObjectKey>>()
        );
    }

    #[test]
    fn unbound_sentinel() {
        assert_eq!(raw_key(None), UNBOUND_KEY);
        assert_eq!(ObjectKey::from_raw(UNBOUND_KEY), None);
        assert_eq!(raw_key(ObjectKey::from_index(9)), 9);
    }

    #[test]
    fn index_without_key_is_rejected() {
        assert_eq!(ObjectKey::from_index(u32::MAX), None);
        assert_eq!(ObjectKey::from_index(u32::MAX - 1).map(ObjectKey::index), Some(u32::MAX - 1));
        assert!(ObjectKey::try_from_index(u32::MAX as usize).is_none());
        assert_eq!(ObjectKey::try_from_index(5).map(ObjectKey::index), Some(5));
    }
}
