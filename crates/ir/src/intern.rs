//! A table of interned objects addressed by integer identifiers.
//!
//! Identifiers handed out by a table stay stable for the lifetime of the
//! object they name; removing an object retires its identifier permanently,
//! which is what lets graph rewrites treat a stale identifier as a programmer
//! error rather than silently aliasing a new object.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// The type for all integer-based identifiers used in the interning logic.
pub type InternIdentifier = usize;

/// A type for generic tables of interned objects.
///
/// It is used to store the objects that make up a
/// [`crate::unit::GraphUnit`], and to make them able to be referenced as
/// needed.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct InternTable<IdType, ValueType>
where
    IdType: Copy + From<usize> + Into<usize>,
{
    // The internal map used for interning.
    table: HashMap<usize, ValueType>,

    // The next ID to be assigned.
    next_id: usize,

    // Mark our IdType as used.
    _phantom: std::marker::PhantomData<IdType>,
}

impl<IdType, ValueType> InternTable<IdType, ValueType>
where
    IdType: Copy + From<usize> + Into<usize>,
{
    /// Creates a new, empty intern table.
    #[must_use]
    pub fn new() -> InternTable<IdType, ValueType> {
        InternTable {
            // Start our IDs at one, as we've reserved 0 to catch zero-initialized
            // identifiers that were never allocated.
            table:   HashMap::new(),
            next_id: 1,

            _phantom: std::marker::PhantomData,
        }
    }

    /// Reserves a new "slot" in the intern table by finding the next
    /// available integer ID.
    fn allocate_id(&mut self) -> usize {
        let allocated_id = self.next_id;
        let mut next_id = allocated_id + 1;

        // If this ID happens to be taken, move to the next one until we find a free ID.
        while self.table.contains_key(&next_id) {
            next_id += 1;
        }

        self.next_id = next_id;
        allocated_id
    }

    /// Inserts a new value into the intern table, getting its ID.
    pub fn insert(&mut self, v: ValueType) -> IdType {
        let id = self.allocate_id();
        self.table.insert(id, v);

        id.into()
    }

    /// Retrieves a reference to a value from the intern table by ID.
    ///
    /// # Panics
    ///
    /// Panics if the ID does not exist. This is a programmer error.
    pub fn get(&self, id: IdType) -> &ValueType {
        let raw_id: usize = id.into();
        self.table
            .get(&raw_id)
            .expect("internal consistency error: get with an unknown ID!")
    }

    /// Retrieves a mutable reference to a value from the intern table by ID.
    ///
    /// # Panics
    ///
    /// Panics if the ID does not exist. This is a programmer error.
    pub fn get_mut(&mut self, id: IdType) -> &mut ValueType {
        let raw_id: usize = id.into();
        self.table
            .get_mut(&raw_id)
            .expect("internal consistency error: get_mut with an unknown ID!")
    }

    /// Checks whether the provided ID names a live object in the table.
    #[must_use]
    pub fn contains(&self, id: IdType) -> bool {
        self.table.contains_key(&id.into())
    }

    /// Removes a value from the intern table by ID, returning it.
    ///
    /// The removed ID is retired; it will not be handed out again by a later
    /// call to [`Self::insert`].
    ///
    /// # Panics
    ///
    /// Panics if the ID does not exist. This is a programmer error.
    pub fn remove(&mut self, id: IdType) -> ValueType {
        let raw_id: usize = id.into();
        self.table
            .remove(&raw_id)
            .expect("internal consistency error: remove with an unknown ID!")
    }

    /// Returns the number of live objects in the table.
    #[must_use]
    pub fn len(&self) -> usize {
        self.table.len()
    }

    /// Returns true iff the table contains no live objects.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Iterates over mutable references to every live object in the table,
    /// in no particular order.
    pub fn values_mut(&mut self) -> impl Iterator<Item = &mut ValueType> {
        self.table.values_mut()
    }
}

impl<IdType, ValueType> Default for InternTable<IdType, ValueType>
where
    IdType: Copy + From<usize> + Into<usize>,
{
    fn default() -> Self {
        Self::new()
    }
}
