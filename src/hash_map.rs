//! HashMap: open addressing with quadratic probing and tombstones.
//!
//! Layout
//! - One [`HeapArray`] of slots; its length (the capacity) is always a power
//!   of two and at least [`INITIAL_CAPACITY`].
//! - Each slot is empty, occupied (cached hash, key, value) or a tombstone.
//!
//! Probing
//! - Insert and lookup walk the same sequence
//!   `(hash + (i² + i) / 2) mod capacity` for `i = 0, 1, ..`. With a
//!   power-of-two capacity these triangular offsets visit every slot once.
//! - Lookup stops at the first empty slot; tombstones are stepped over,
//!   because a live key may have been placed past a slot that was deleted
//!   later.
//! - A new key goes into the first empty-or-tombstone slot on its sequence.
//!
//! Growth
//! - Before a new key is added, if `len * 2 >= capacity` the table doubles and
//!   every occupied slot is re-probed into the new table with its cached
//!   hash. Tombstones are dropped by the move, so the load after any insert
//!   is at most one half.
//!
//! Iteration visits slots in index order, which depends on the hashes and
//! not on insertion order.

use crate::error::{KeyNotFound, MemoryError};
use crate::mem_utils::HeapArray;
use crate::memory;
use core::borrow::Borrow;
use core::fmt;
use core::hash::{BuildHasher, Hash};
use core::mem;
use core::ops::Index;
use hashbrown::hash_map::DefaultHashBuilder;

/// Slot count of a fresh table.
pub const INITIAL_CAPACITY: usize = 2;

#[derive(Clone, Debug)]
struct Entry<K, V> {
    key: K,
    value: V,
    hash: u64,
}

#[derive(Clone, Debug)]
enum Slot<K, V> {
    Empty,
    Occupied(Entry<K, V>),
    Tombstone,
}

impl<K, V> Slot<K, V> {
    fn entry(&self) -> Option<&Entry<K, V>> {
        match self {
            Slot::Occupied(e) => Some(e),
            _ => None,
        }
    }

    fn entry_mut(&mut self) -> Option<&mut Entry<K, V>> {
        match self {
            Slot::Occupied(e) => Some(e),
            _ => None,
        }
    }
}

#[inline]
fn probe(hash: u64, i: usize, mask: usize) -> usize {
    // Halve the even factor first so i*(i+1)/2 stays exact mod 2^bits.
    let offset = if i % 2 == 0 {
        (i / 2).wrapping_mul(i + 1)
    } else {
        i.wrapping_mul((i + 1) / 2)
    };
    (hash as usize).wrapping_add(offset) & mask
}

fn empty_slots<K, V>(capacity: usize) -> Result<HeapArray<Slot<K, V>>, MemoryError> {
    HeapArray::new_with(capacity, || Slot::Empty)
}

pub struct HashMap<K, V, S = DefaultHashBuilder> {
    hasher: S,
    slots: HeapArray<Slot<K, V>>,
    len: usize,
}

impl<K, V> HashMap<K, V>
where
    K: Eq + Hash,
{
    pub fn new() -> Self {
        Self::with_hasher(Default::default())
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self::with_capacity_and_hasher(capacity, Default::default())
    }
}

impl<K, V> Default for HashMap<K, V>
where
    K: Eq + Hash,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V, S> HashMap<K, V, S>
where
    K: Eq + Hash,
    S: BuildHasher,
{
    pub fn with_hasher(hasher: S) -> Self {
        Self::with_capacity_and_hasher(INITIAL_CAPACITY, hasher)
    }

    /// Table with room for at least `capacity` slots, rounded up to a power
    /// of two.
    pub fn with_capacity_and_hasher(capacity: usize, hasher: S) -> Self {
        Self::try_with_capacity_and_hasher(capacity, hasher)
            .unwrap_or_else(|e| memory::handle_failure(e))
    }

    pub fn try_with_capacity_and_hasher(capacity: usize, hasher: S) -> Result<Self, MemoryError> {
        let capacity = capacity
            .max(INITIAL_CAPACITY)
            .checked_next_power_of_two()
            .ok_or(MemoryError::LayoutOverflow {
                count: capacity,
                size: mem::size_of::<Slot<K, V>>(),
            })?;
        Ok(Self {
            hasher,
            slots: empty_slots(capacity)?,
            len: 0,
        })
    }

    fn make_hash<Q>(&self, q: &Q) -> u64
    where
        Q: ?Sized + Hash,
    {
        self.hasher.hash_one(q)
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Current slot count.
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn hasher(&self) -> &S {
        &self.hasher
    }

    fn mask(&self) -> usize {
        self.slots.len() - 1
    }

    fn find_index<Q>(&self, hash: u64, q: &Q) -> Option<usize>
    where
        K: Borrow<Q>,
        Q: ?Sized + Eq,
    {
        let mask = self.mask();
        for i in 0..self.slots.len() {
            let idx = probe(hash, i, mask);
            match &self.slots[idx] {
                Slot::Empty => return None,
                Slot::Occupied(e) if e.hash == hash && e.key.borrow() == q => return Some(idx),
                _ => {}
            }
        }
        None
    }

    /// First empty-or-tombstone slot on the probe sequence of `hash`.
    fn vacant_index(slots: &[Slot<K, V>], hash: u64) -> usize {
        let mask = slots.len() - 1;
        (0..slots.len())
            .map(|i| probe(hash, i, mask))
            .find(|&idx| !matches!(slots[idx], Slot::Occupied(_)))
            .unwrap_or_else(|| unreachable!("probe sequence exhausted below the load limit"))
    }

    fn grow(&mut self) -> Result<(), MemoryError> {
        let from = self.slots.len();
        let to = from.checked_mul(2).ok_or(MemoryError::LayoutOverflow {
            count: from,
            size: mem::size_of::<Slot<K, V>>(),
        })?;
        let mut old = mem::replace(&mut self.slots, empty_slots(to)?);
        for slot in old.iter_mut() {
            if let Slot::Occupied(e) = mem::replace(slot, Slot::Empty) {
                let idx = Self::vacant_index(&self.slots, e.hash);
                self.slots[idx] = Slot::Occupied(e);
            }
        }
        tracing::trace!(from, to, len = self.len, "hash map grew");
        Ok(())
    }

    /// Slot for a key known to be absent, growing first if needed.
    fn claim_vacant(&mut self, hash: u64) -> Result<usize, MemoryError> {
        if self.len * 2 >= self.slots.len() {
            self.grow()?;
        }
        Ok(Self::vacant_index(&self.slots, hash))
    }

    /// Insert or replace. On replace both key and value are overwritten and
    /// the previous value is returned.
    pub fn try_insert(&mut self, key: K, value: V) -> Result<Option<V>, MemoryError> {
        let hash = self.make_hash(&key);
        if let Some(idx) = self.find_index(hash, &key) {
            if let Some(e) = self.slots[idx].entry_mut() {
                e.key = key;
                return Ok(Some(mem::replace(&mut e.value, value)));
            }
        }
        let idx = self.claim_vacant(hash)?;
        self.slots[idx] = Slot::Occupied(Entry { key, value, hash });
        self.len += 1;
        Ok(None)
    }

    pub fn insert(&mut self, key: K, value: V) -> Option<V> {
        self.try_insert(key, value)
            .unwrap_or_else(|e| memory::handle_failure(e))
    }

    pub fn contains_key<Q>(&self, q: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.find_index(self.make_hash(q), q).is_some()
    }

    pub fn get<Q>(&self, q: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.get_key_value(q).map(|(_, v)| v)
    }

    pub fn get_key_value<Q>(&self, q: &Q) -> Option<(&K, &V)>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let idx = self.find_index(self.make_hash(q), q)?;
        self.slots[idx].entry().map(|e| (&e.key, &e.value))
    }

    pub fn get_mut<Q>(&mut self, q: &Q) -> Option<&mut V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let idx = self.find_index(self.make_hash(q), q)?;
        self.slots[idx].entry_mut().map(|e| &mut e.value)
    }

    /// Read-only lookup that reports a missing key as an error.
    pub fn try_get<Q>(&self, q: &Q) -> Result<&V, KeyNotFound>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.get(q).ok_or(KeyNotFound)
    }

    /// Mutable lookup that creates the entry with `default()` when missing.
    pub fn try_get_or_insert_with<F>(&mut self, key: K, default: F) -> Result<&mut V, MemoryError>
    where
        F: FnOnce() -> V,
    {
        let hash = self.make_hash(&key);
        let idx = match self.find_index(hash, &key) {
            Some(idx) => idx,
            None => {
                let idx = self.claim_vacant(hash)?;
                self.slots[idx] = Slot::Occupied(Entry {
                    key,
                    value: default(),
                    hash,
                });
                self.len += 1;
                idx
            }
        };
        match &mut self.slots[idx] {
            Slot::Occupied(e) => Ok(&mut e.value),
            _ => unreachable!("slot was just found or filled"),
        }
    }

    pub fn get_or_insert_with<F>(&mut self, key: K, default: F) -> &mut V
    where
        F: FnOnce() -> V,
    {
        match self.try_get_or_insert_with(key, default) {
            Ok(v) => v,
            Err(e) => memory::handle_failure(e),
        }
    }

    pub fn get_or_insert_default(&mut self, key: K) -> &mut V
    where
        V: Default,
    {
        self.get_or_insert_with(key, V::default)
    }

    /// Turn slot `idx` into a tombstone and hand back its entry.
    fn take_slot(&mut self, idx: usize) -> Option<(K, V)> {
        match mem::replace(&mut self.slots[idx], Slot::Tombstone) {
            Slot::Occupied(e) => {
                self.len -= 1;
                Some((e.key, e.value))
            }
            other => {
                self.slots[idx] = other;
                None
            }
        }
    }

    pub fn remove_entry<Q>(&mut self, q: &Q) -> Option<(K, V)>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let idx = self.find_index(self.make_hash(q), q)?;
        self.take_slot(idx)
    }

    pub fn remove<Q>(&mut self, q: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.remove_entry(q).map(|(_, v)| v)
    }

    /// Remove entries whose value equals `value`: every match when `all`,
    /// otherwise the first in iteration order. Returns how many went.
    pub fn remove_value(&mut self, value: &V, all: bool) -> usize
    where
        V: PartialEq,
    {
        let mut removed = 0;
        for idx in 0..self.slots.len() {
            let hit = self.slots[idx].entry().is_some_and(|e| e.value == *value);
            if hit && self.take_slot(idx).is_some() {
                removed += 1;
                if !all {
                    break;
                }
            }
        }
        removed
    }

    pub fn retain<F>(&mut self, mut keep: F)
    where
        F: FnMut(&K, &mut V) -> bool,
    {
        for idx in 0..self.slots.len() {
            let drop_it = self.slots[idx]
                .entry_mut()
                .is_some_and(|e| !keep(&e.key, &mut e.value));
            if drop_it {
                self.take_slot(idx);
            }
        }
    }

    /// Drop every entry. The capacity is kept.
    pub fn clear(&mut self) {
        for slot in self.slots.iter_mut() {
            *slot = Slot::Empty;
        }
        self.len = 0;
    }

    /// Cursor on the first entry in iteration order, able to remove entries
    /// while walking.
    pub fn cursor_mut(&mut self) -> CursorMut<'_, K, V, S> {
        let mut cursor = CursorMut { map: self, index: 0 };
        cursor.seek_occupied();
        cursor
    }
}

impl<K, V, S> HashMap<K, V, S> {
    pub fn iter(&self) -> Iter<'_, K, V> {
        Iter {
            slots: self.slots.iter(),
            remaining: self.len,
        }
    }

    pub fn iter_mut(&mut self) -> IterMut<'_, K, V> {
        IterMut {
            slots: self.slots.iter_mut(),
            remaining: self.len,
        }
    }

    pub fn keys(&self) -> impl DoubleEndedIterator<Item = &K> + ExactSizeIterator {
        self.iter().map(|(k, _)| k)
    }

    pub fn values(&self) -> impl DoubleEndedIterator<Item = &V> + ExactSizeIterator {
        self.iter().map(|(_, v)| v)
    }

    pub fn values_mut(&mut self) -> impl DoubleEndedIterator<Item = &mut V> + ExactSizeIterator {
        self.iter_mut().map(|(_, v)| v)
    }

    /// First entry, in slot order, whose value equals `value`.
    pub fn find_by_value(&self, value: &V) -> Option<(&K, &V)>
    where
        V: PartialEq,
    {
        self.find(|_, v| v == value)
    }

    /// First entry, in slot order, accepted by `pred`.
    pub fn find<F>(&self, mut pred: F) -> Option<(&K, &V)>
    where
        F: FnMut(&K, &V) -> bool,
    {
        self.iter().find(|&(k, v)| pred(k, v))
    }
}

/// Walks the table in slot order and removes entries in place.
///
/// Removing is "advance, then remove": [`remove_current`](Self::remove_current)
/// first moves the cursor to the next occupied slot and only then turns the
/// old slot into a tombstone, so the cursor never rests on a dead slot.
pub struct CursorMut<'a, K, V, S> {
    map: &'a mut HashMap<K, V, S>,
    index: usize,
}

impl<'a, K, V, S> CursorMut<'a, K, V, S>
where
    K: Eq + Hash,
    S: BuildHasher,
{
    fn seek_occupied(&mut self) {
        while self.index < self.map.slots.len()
            && !matches!(self.map.slots[self.index], Slot::Occupied(_))
        {
            self.index += 1;
        }
    }

    /// Whether the cursor has run past the last entry.
    pub fn is_end(&self) -> bool {
        self.index >= self.map.slots.len()
    }

    pub fn key(&self) -> Option<&K> {
        self.map.slots.get(self.index)?.entry().map(|e| &e.key)
    }

    pub fn value(&self) -> Option<&V> {
        self.map.slots.get(self.index)?.entry().map(|e| &e.value)
    }

    pub fn value_mut(&mut self) -> Option<&mut V> {
        self.map
            .slots
            .get_mut(self.index)?
            .entry_mut()
            .map(|e| &mut e.value)
    }

    pub fn move_next(&mut self) {
        if !self.is_end() {
            self.index += 1;
            self.seek_occupied();
        }
    }

    /// Advance to the next entry, then remove the one the cursor was on.
    pub fn remove_current(&mut self) -> Option<(K, V)> {
        if self.is_end() {
            return None;
        }
        let current = self.index;
        self.move_next();
        self.map.take_slot(current)
    }
}

/// Entries in slot order.
pub struct Iter<'a, K, V> {
    slots: core::slice::Iter<'a, Slot<K, V>>,
    remaining: usize,
}

impl<'a, K, V> Iterator for Iter<'a, K, V> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        let e = self.slots.by_ref().find_map(Slot::entry)?;
        self.remaining -= 1;
        Some((&e.key, &e.value))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<K, V> DoubleEndedIterator for Iter<'_, K, V> {
    fn next_back(&mut self) -> Option<Self::Item> {
        let e = self.slots.by_ref().rev().find_map(Slot::entry)?;
        self.remaining -= 1;
        Some((&e.key, &e.value))
    }
}

impl<K, V> ExactSizeIterator for Iter<'_, K, V> {}

impl<K, V> Clone for Iter<'_, K, V> {
    fn clone(&self) -> Self {
        Self {
            slots: self.slots.clone(),
            remaining: self.remaining,
        }
    }
}

/// Entries in slot order, values mutable.
pub struct IterMut<'a, K, V> {
    slots: core::slice::IterMut<'a, Slot<K, V>>,
    remaining: usize,
}

impl<'a, K, V> Iterator for IterMut<'a, K, V> {
    type Item = (&'a K, &'a mut V);

    fn next(&mut self) -> Option<Self::Item> {
        let e = self.slots.by_ref().find_map(Slot::entry_mut)?;
        self.remaining -= 1;
        Some((&e.key, &mut e.value))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<K, V> DoubleEndedIterator for IterMut<'_, K, V> {
    fn next_back(&mut self) -> Option<Self::Item> {
        let e = self.slots.by_ref().rev().find_map(Slot::entry_mut)?;
        self.remaining -= 1;
        Some((&e.key, &mut e.value))
    }
}

impl<K, V> ExactSizeIterator for IterMut<'_, K, V> {}

impl<'a, K, V, S> IntoIterator for &'a HashMap<K, V, S> {
    type Item = (&'a K, &'a V);
    type IntoIter = Iter<'a, K, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<'a, K, V, S> IntoIterator for &'a mut HashMap<K, V, S> {
    type Item = (&'a K, &'a mut V);
    type IntoIter = IterMut<'a, K, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter_mut()
    }
}

impl<K, V, S> Clone for HashMap<K, V, S>
where
    K: Clone,
    V: Clone,
    S: Clone,
{
    fn clone(&self) -> Self {
        let mut source = self.slots.iter();
        let slots = HeapArray::new_with(self.slots.len(), || {
            source.next().cloned().unwrap_or(Slot::Empty)
        })
        .unwrap_or_else(|e| memory::handle_failure(e));
        Self {
            hasher: self.hasher.clone(),
            slots,
            len: self.len,
        }
    }
}

/// Same key set with equal values; slot layout is irrelevant.
impl<K, V, S> PartialEq for HashMap<K, V, S>
where
    K: Eq + Hash,
    V: PartialEq,
    S: BuildHasher,
{
    fn eq(&self, other: &Self) -> bool {
        self.len == other.len && self.iter().all(|(k, v)| other.get(k) == Some(v))
    }
}

impl<K, V, S> Eq for HashMap<K, V, S>
where
    K: Eq + Hash,
    V: Eq,
    S: BuildHasher,
{
}

impl<K, V, S> fmt::Debug for HashMap<K, V, S>
where
    K: fmt::Debug,
    V: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl<K, V, S> Extend<(K, V)> for HashMap<K, V, S>
where
    K: Eq + Hash,
    S: BuildHasher,
{
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        for (k, v) in iter {
            self.insert(k, v);
        }
    }
}

impl<K, V, S> FromIterator<(K, V)> for HashMap<K, V, S>
where
    K: Eq + Hash,
    S: BuildHasher + Default,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = Self::with_hasher(S::default());
        map.extend(iter);
        map
    }
}

/// Panics if the key is missing; use [`HashMap::get`] or
/// [`HashMap::try_get`] to check first.
impl<K, Q, V, S> Index<&Q> for HashMap<K, V, S>
where
    K: Eq + Hash + Borrow<Q>,
    Q: ?Sized + Hash + Eq,
    S: BuildHasher,
{
    type Output = V;

    fn index(&self, key: &Q) -> &V {
        match self.get(key) {
            Some(v) => v,
            None => panic!("{}", KeyNotFound),
        }
    }
}
