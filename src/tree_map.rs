//! TreeMap: ordered map on an AVL tree.
//!
//! Nodes are single allocator blocks linked by raw pointers. Each node keeps
//! a back-pointer to its parent and a cached subtree height (leaf = 1, empty
//! subtree = 0).
//!
//! Rebalancing
//! - After every structural change the path from the change up to the root
//!   is walked once. Each node on it gets its height refreshed, and a node
//!   whose balance factor `height(left) - height(right)` left `-1..=1` is
//!   fixed with a single or double rotation.
//! - The rotation is picked from the child's balance factor, the same rule
//!   for insert and remove.
//! - A node with two children is removed by swapping its entry with its
//!   in-order successor and unlinking the successor node instead.
//!
//! Ownership
//! - A node is referenced by exactly one link (its parent's child link or
//!   the root) and its `parent` points back at that owner.
//! - Node identity is stable across rotations; only the links move.
//!
//! Key order comes from a [`Compare`] implementation, `Ord` by default.

use crate::error::{KeyNotFound, MemoryError};
use crate::mem_utils;
use crate::memory;
use core::borrow::Borrow;
use core::cmp::Ordering;
use core::fmt;
use core::marker::PhantomData;
use core::mem;
use core::ops::Index;
use core::ptr::NonNull;

/// Total order over keys.
pub trait Compare<K: ?Sized> {
    fn compare(&self, a: &K, b: &K) -> Ordering;
}

/// The key type's own [`Ord`].
#[derive(Copy, Clone, Debug, Default)]
pub struct Natural;

impl<K: Ord + ?Sized> Compare<K> for Natural {
    fn compare(&self, a: &K, b: &K) -> Ordering {
        a.cmp(b)
    }
}

/// Adapts a closure to [`Compare`].
#[derive(Copy, Clone)]
pub struct CompareFn<F>(pub F);

impl<K: ?Sized, F> Compare<K> for CompareFn<F>
where
    F: Fn(&K, &K) -> Ordering,
{
    fn compare(&self, a: &K, b: &K) -> Ordering {
        (self.0)(a, b)
    }
}

type Link<K, V> = Option<NonNull<Node<K, V>>>;

struct Node<K, V> {
    key: K,
    value: V,
    height: usize,
    parent: Link<K, V>,
    left: Link<K, V>,
    right: Link<K, V>,
}

// The helpers below take links that must point at live nodes of one tree.

unsafe fn height<K, V>(link: Link<K, V>) -> usize {
    link.map_or(0, |n| (*n.as_ptr()).height)
}

unsafe fn update_height<K, V>(n: NonNull<Node<K, V>>) {
    let node = n.as_ptr();
    (*node).height = 1 + height((*node).left).max(height((*node).right));
}

unsafe fn balance_factor<K, V>(n: NonNull<Node<K, V>>) -> isize {
    let node = n.as_ptr();
    height((*node).left) as isize - height((*node).right) as isize
}

unsafe fn leftmost<K, V>(mut n: NonNull<Node<K, V>>) -> NonNull<Node<K, V>> {
    while let Some(l) = (*n.as_ptr()).left {
        n = l;
    }
    n
}

unsafe fn rightmost<K, V>(mut n: NonNull<Node<K, V>>) -> NonNull<Node<K, V>> {
    while let Some(r) = (*n.as_ptr()).right {
        n = r;
    }
    n
}

unsafe fn successor<K, V>(n: NonNull<Node<K, V>>) -> Link<K, V> {
    if let Some(r) = (*n.as_ptr()).right {
        return Some(leftmost(r));
    }
    let mut child = n;
    let mut parent = (*n.as_ptr()).parent;
    while let Some(p) = parent {
        if (*p.as_ptr()).left == Some(child) {
            return Some(p);
        }
        child = p;
        parent = (*p.as_ptr()).parent;
    }
    None
}

unsafe fn predecessor<K, V>(n: NonNull<Node<K, V>>) -> Link<K, V> {
    if let Some(l) = (*n.as_ptr()).left {
        return Some(rightmost(l));
    }
    let mut child = n;
    let mut parent = (*n.as_ptr()).parent;
    while let Some(p) = parent {
        if (*p.as_ptr()).right == Some(child) {
            return Some(p);
        }
        child = p;
        parent = (*p.as_ptr()).parent;
    }
    None
}

pub struct TreeMap<K, V, C = Natural> {
    root: Link<K, V>,
    len: usize,
    cmp: C,
    _owns: PhantomData<Box<Node<K, V>>>,
}

// SAFETY: the map owns its nodes exclusively, like a tree of Boxes.
unsafe impl<K: Send, V: Send, C: Send> Send for TreeMap<K, V, C> {}
unsafe impl<K: Sync, V: Sync, C: Sync> Sync for TreeMap<K, V, C> {}

impl<K: Ord, V> TreeMap<K, V> {
    pub fn new() -> Self {
        Self::with_comparator(Natural)
    }
}

impl<K, V, C> TreeMap<K, V, C> {
    pub const fn with_comparator(cmp: C) -> Self {
        Self {
            root: None,
            len: 0,
            cmp,
            _owns: PhantomData,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Height of the root subtree; 0 when empty.
    pub fn height(&self) -> usize {
        // SAFETY: the root, if any, is a live node.
        unsafe { height(self.root) }
    }

    pub fn comparator(&self) -> &C {
        &self.cmp
    }

    fn first_node(&self) -> Link<K, V> {
        // SAFETY: the root, if any, is a live node.
        self.root.map(|r| unsafe { leftmost(r) })
    }

    fn last_node(&self) -> Link<K, V> {
        // SAFETY: as in first_node.
        self.root.map(|r| unsafe { rightmost(r) })
    }

    /// Entry with the smallest key.
    pub fn first_key_value(&self) -> Option<(&K, &V)> {
        // SAFETY: nodes live as long as the shared borrow of self.
        self.first_node().map(|n| unsafe {
            let node = &*n.as_ptr();
            (&node.key, &node.value)
        })
    }

    /// Entry with the largest key.
    pub fn last_key_value(&self) -> Option<(&K, &V)> {
        // SAFETY: as in first_key_value.
        self.last_node().map(|n| unsafe {
            let node = &*n.as_ptr();
            (&node.key, &node.value)
        })
    }

    pub fn iter(&self) -> Iter<'_, K, V> {
        Iter {
            front: self.first_node(),
            back: self.last_node(),
            remaining: self.len,
            _marker: PhantomData,
        }
    }

    pub fn iter_mut(&mut self) -> IterMut<'_, K, V> {
        IterMut {
            front: self.first_node(),
            back: self.last_node(),
            remaining: self.len,
            _marker: PhantomData,
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

    /// First entry, in key order, whose value equals `value`.
    pub fn find_by_value(&self, value: &V) -> Option<(&K, &V)>
    where
        V: PartialEq,
    {
        self.find(|_, v| v == value)
    }

    /// First entry, in key order, accepted by `pred`.
    pub fn find<F>(&self, mut pred: F) -> Option<(&K, &V)>
    where
        F: FnMut(&K, &V) -> bool,
    {
        self.iter().find(|&(k, v)| pred(k, v))
    }

    /// Cursor on the smallest key, able to remove entries while walking.
    pub fn cursor_mut(&mut self) -> CursorMut<'_, K, V, C> {
        let node = self.first_node();
        CursorMut { map: self, node }
    }

    /// Drop every entry, bottom-up without recursion.
    pub fn clear(&mut self) {
        let mut cur = self.root.take();
        while let Some(n) = cur {
            let node = n.as_ptr();
            // SAFETY: each node is visited after its children were freed and
            // unlinked, and is freed exactly once.
            unsafe {
                if let Some(l) = (*node).left.take() {
                    cur = Some(l);
                } else if let Some(r) = (*node).right.take() {
                    cur = Some(r);
                } else {
                    cur = (*node).parent;
                    mem_utils::delete(node);
                }
            }
        }
        self.len = 0;
    }

    /// Point whatever referenced `old` (its parent's link or the root) at `new`.
    unsafe fn replace_child(
        &mut self,
        parent: Link<K, V>,
        old: NonNull<Node<K, V>>,
        new: Link<K, V>,
    ) {
        match parent {
            None => self.root = new,
            Some(p) => {
                let p = p.as_ptr();
                if (*p).left == Some(old) {
                    (*p).left = new;
                } else {
                    (*p).right = new;
                }
            }
        }
    }

    /// `x` must have a right child; it becomes the subtree root.
    unsafe fn rotate_left(&mut self, x: NonNull<Node<K, V>>) -> NonNull<Node<K, V>> {
        let xp = x.as_ptr();
        let Some(y) = (*xp).right else {
            return x;
        };
        let yp = y.as_ptr();
        (*xp).right = (*yp).left;
        if let Some(b) = (*yp).left {
            (*b.as_ptr()).parent = Some(x);
        }
        (*yp).parent = (*xp).parent;
        self.replace_child((*xp).parent, x, Some(y));
        (*yp).left = Some(x);
        (*xp).parent = Some(y);
        update_height(x);
        update_height(y);
        y
    }

    /// `x` must have a left child; it becomes the subtree root.
    unsafe fn rotate_right(&mut self, x: NonNull<Node<K, V>>) -> NonNull<Node<K, V>> {
        let xp = x.as_ptr();
        let Some(y) = (*xp).left else {
            return x;
        };
        let yp = y.as_ptr();
        (*xp).left = (*yp).right;
        if let Some(b) = (*yp).right {
            (*b.as_ptr()).parent = Some(x);
        }
        (*yp).parent = (*xp).parent;
        self.replace_child((*xp).parent, x, Some(y));
        (*yp).right = Some(x);
        (*xp).parent = Some(y);
        update_height(x);
        update_height(y);
        y
    }

    /// Refresh `n` and rotate if it is out of balance. Returns the node now
    /// at the top of that subtree.
    unsafe fn rebalance(&mut self, n: NonNull<Node<K, V>>) -> NonNull<Node<K, V>> {
        update_height(n);
        let bf = balance_factor(n);
        if bf > 1 {
            if let Some(l) = (*n.as_ptr()).left {
                if balance_factor(l) < 0 {
                    self.rotate_left(l);
                }
            }
            self.rotate_right(n)
        } else if bf < -1 {
            if let Some(r) = (*n.as_ptr()).right {
                if balance_factor(r) > 0 {
                    self.rotate_right(r);
                }
            }
            self.rotate_left(n)
        } else {
            n
        }
    }

    unsafe fn fixup(&mut self, mut cur: Link<K, V>) {
        while let Some(n) = cur {
            let top = self.rebalance(n);
            cur = (*top.as_ptr()).parent;
        }
    }

    /// Take the entry stored in `n` out of the tree. Also returns the node
    /// that now holds the next entry in key order.
    unsafe fn unlink(&mut self, n: NonNull<Node<K, V>>) -> ((K, V), Link<K, V>) {
        let np = n.as_ptr();
        let (target, next) = match ((*np).left, (*np).right) {
            (Some(_), Some(r)) => {
                let s = leftmost(r);
                mem::swap(&mut (*np).key, &mut (*s.as_ptr()).key);
                mem::swap(&mut (*np).value, &mut (*s.as_ptr()).value);
                (s, Some(n))
            }
            _ => (n, successor(n)),
        };
        let tp = target.as_ptr();
        let child = (*tp).left.or((*tp).right);
        let parent = (*tp).parent;
        if let Some(c) = child {
            (*c.as_ptr()).parent = parent;
        }
        self.replace_child(parent, target, child);
        self.len -= 1;
        self.fixup(parent);
        let node = mem_utils::reclaim(target);
        ((node.key, node.value), next)
    }
}

impl<K, V, C> TreeMap<K, V, C> {
    /// `Ok(node)` holding `key`, or `Err((parent, side))` naming the empty
    /// link a new node for `key` would take.
    fn search<Q>(&self, key: &Q) -> Result<NonNull<Node<K, V>>, (Link<K, V>, Ordering)>
    where
        Q: ?Sized,
        K: Borrow<Q>,
        C: Compare<Q>,
    {
        let mut parent = None;
        let mut side = Ordering::Equal;
        let mut cur = self.root;
        while let Some(n) = cur {
            // SAFETY: links reachable from the root are live nodes.
            let node = unsafe { &*n.as_ptr() };
            side = <C as Compare<Q>>::compare(&self.cmp, key, node.key.borrow());
            cur = match side {
                Ordering::Less => node.left,
                Ordering::Greater => node.right,
                Ordering::Equal => return Ok(n),
            };
            parent = Some(n);
        }
        Err((parent, side))
    }

    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        Q: ?Sized,
        K: Borrow<Q>,
        C: Compare<Q>,
    {
        self.search(key).is_ok()
    }

    pub fn get<Q>(&self, key: &Q) -> Option<&V>
    where
        Q: ?Sized,
        K: Borrow<Q>,
        C: Compare<Q>,
    {
        self.get_key_value(key).map(|(_, v)| v)
    }

    pub fn get_key_value<Q>(&self, key: &Q) -> Option<(&K, &V)>
    where
        Q: ?Sized,
        K: Borrow<Q>,
        C: Compare<Q>,
    {
        let n = self.search(key).ok()?;
        // SAFETY: live node, borrowed no longer than self.
        let node = unsafe { &*n.as_ptr() };
        Some((&node.key, &node.value))
    }

    pub fn get_mut<Q>(&mut self, key: &Q) -> Option<&mut V>
    where
        Q: ?Sized,
        K: Borrow<Q>,
        C: Compare<Q>,
    {
        let n = self.search(key).ok()?;
        // SAFETY: live node; &mut self is exclusive.
        Some(unsafe { &mut (*n.as_ptr()).value })
    }

    /// Read-only lookup that reports a missing key as an error.
    pub fn try_get<Q>(&self, key: &Q) -> Result<&V, KeyNotFound>
    where
        Q: ?Sized,
        K: Borrow<Q>,
        C: Compare<Q>,
    {
        self.get(key).ok_or(KeyNotFound)
    }

    pub fn remove_entry<Q>(&mut self, key: &Q) -> Option<(K, V)>
    where
        Q: ?Sized,
        K: Borrow<Q>,
        C: Compare<Q>,
    {
        let n = self.search(key).ok()?;
        // SAFETY: n is a live node of this tree.
        Some(unsafe { self.unlink(n) }.0)
    }

    pub fn remove<Q>(&mut self, key: &Q) -> Option<V>
    where
        Q: ?Sized,
        K: Borrow<Q>,
        C: Compare<Q>,
    {
        self.remove_entry(key).map(|(_, v)| v)
    }
}

impl<K, V, C> TreeMap<K, V, C>
where
    C: Compare<K>,
{
    fn attach(
        &mut self,
        parent: Link<K, V>,
        side: Ordering,
        key: K,
        value: V,
    ) -> Result<NonNull<Node<K, V>>, MemoryError> {
        let node = mem_utils::new(Node {
            key,
            value,
            height: 1,
            parent,
            left: None,
            right: None,
        })?;
        // SAFETY: `parent` came from search, so its `side` link is empty.
        unsafe {
            match parent {
                None => self.root = Some(node),
                Some(p) if side == Ordering::Less => (*p.as_ptr()).left = Some(node),
                Some(p) => (*p.as_ptr()).right = Some(node),
            }
            self.len += 1;
            self.fixup(parent);
        }
        Ok(node)
    }

    /// Insert or overwrite. An existing key keeps its node and only the value
    /// changes; the previous value is returned.
    pub fn try_insert(&mut self, key: K, value: V) -> Result<Option<V>, MemoryError> {
        match self.search(&key) {
            // SAFETY: search returned a live node; &mut self is exclusive.
            Ok(n) => Ok(Some(mem::replace(unsafe { &mut (*n.as_ptr()).value }, value))),
            Err((parent, side)) => {
                self.attach(parent, side, key, value)?;
                Ok(None)
            }
        }
    }

    pub fn insert(&mut self, key: K, value: V) -> Option<V> {
        self.try_insert(key, value)
            .unwrap_or_else(|e| memory::handle_failure(e))
    }

    pub fn try_get_or_insert_with<F>(&mut self, key: K, default: F) -> Result<&mut V, MemoryError>
    where
        F: FnOnce() -> V,
    {
        let n = match self.search(&key) {
            Ok(n) => n,
            Err((parent, side)) => self.attach(parent, side, key, default())?,
        };
        // SAFETY: nodes keep their identity through rebalancing.
        Ok(unsafe { &mut (*n.as_ptr()).value })
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

    /// Remove entries whose value equals `value`, in key order: every match
    /// when `all`, otherwise the first. Returns how many went.
    pub fn remove_value(&mut self, value: &V, all: bool) -> usize
    where
        V: PartialEq,
    {
        let mut removed = 0;
        let mut cur = self.first_node();
        while let Some(n) = cur {
            // SAFETY: cur is always a live node of this tree.
            unsafe {
                if (*n.as_ptr()).value == *value {
                    cur = self.unlink(n).1;
                    removed += 1;
                    if !all {
                        break;
                    }
                } else {
                    cur = successor(n);
                }
            }
        }
        removed
    }

    pub fn retain<F>(&mut self, mut keep: F)
    where
        F: FnMut(&K, &mut V) -> bool,
    {
        let mut cur = self.first_node();
        while let Some(n) = cur {
            let np = n.as_ptr();
            // SAFETY: cur is always a live node of this tree.
            unsafe {
                cur = if keep(&(*np).key, &mut (*np).value) {
                    successor(n)
                } else {
                    self.unlink(n).1
                };
            }
        }
    }

    /// Walk the whole tree and confirm strict key order, cached heights,
    /// AVL balance, parent back-links and the entry count.
    pub fn check_invariants(&self) -> bool {
        if let Some(r) = self.root {
            // SAFETY: the root is live.
            if unsafe { (*r.as_ptr()).parent }.is_some() {
                return false;
            }
        }
        let mut count = 0;
        let mut prev: Option<&K> = None;
        let mut cur = self.first_node();
        while let Some(n) = cur {
            // SAFETY: every node reached by the walk is live for &self.
            let node = unsafe { &*n.as_ptr() };
            let (hl, hr) = unsafe { (height(node.left), height(node.right)) };
            if node.height != 1 + hl.max(hr) || hl.abs_diff(hr) > 1 {
                return false;
            }
            for child in [node.left, node.right].into_iter().flatten() {
                if unsafe { (*child.as_ptr()).parent } != Some(n) {
                    return false;
                }
            }
            if prev.is_some_and(|p| self.cmp.compare(p, &node.key) != Ordering::Less) {
                return false;
            }
            prev = Some(&node.key);
            count += 1;
            cur = unsafe { successor(n) };
        }
        count == self.len
    }
}

impl<K, V, C> Drop for TreeMap<K, V, C> {
    fn drop(&mut self) {
        self.clear();
    }
}

/// Walks the map in key order and removes entries in place.
///
/// [`remove_current`](Self::remove_current) leaves the cursor on the entry
/// that followed the removed one.
pub struct CursorMut<'a, K, V, C> {
    map: &'a mut TreeMap<K, V, C>,
    node: Link<K, V>,
}

impl<K, V, C> CursorMut<'_, K, V, C> {
    /// Whether the cursor has run past the last entry.
    pub fn is_end(&self) -> bool {
        self.node.is_none()
    }

    pub fn key(&self) -> Option<&K> {
        // SAFETY: `node` is a live node of the borrowed map.
        self.node.map(|n| unsafe { &(*n.as_ptr()).key })
    }

    pub fn value(&self) -> Option<&V> {
        // SAFETY: as in key.
        self.node.map(|n| unsafe { &(*n.as_ptr()).value })
    }

    pub fn value_mut(&mut self) -> Option<&mut V> {
        // SAFETY: as in key; the map is mutably borrowed through self.
        self.node.map(|n| unsafe { &mut (*n.as_ptr()).value })
    }

    pub fn move_next(&mut self) {
        if let Some(n) = self.node {
            // SAFETY: as in key.
            self.node = unsafe { successor(n) };
        }
    }

    /// Remove the entry under the cursor and move on to the next one.
    pub fn remove_current(&mut self) -> Option<(K, V)> {
        let n = self.node?;
        // SAFETY: n is live; unlink hands back the node holding the next
        // entry, which may be n itself after a successor swap.
        let (entry, next) = unsafe { self.map.unlink(n) };
        self.node = next;
        Some(entry)
    }
}

/// Entries in ascending key order.
pub struct Iter<'a, K, V> {
    front: Link<K, V>,
    back: Link<K, V>,
    remaining: usize,
    _marker: PhantomData<&'a Node<K, V>>,
}

impl<'a, K, V> Iterator for Iter<'a, K, V> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let n = self.front?;
        // SAFETY: the map is borrowed for 'a and `remaining` keeps front
        // from passing back.
        unsafe {
            self.front = successor(n);
            self.remaining -= 1;
            let node = &*n.as_ptr();
            Some((&node.key, &node.value))
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<K, V> DoubleEndedIterator for Iter<'_, K, V> {
    fn next_back(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let n = self.back?;
        // SAFETY: as in next.
        unsafe {
            self.back = predecessor(n);
            self.remaining -= 1;
            let node = &*n.as_ptr();
            Some((&node.key, &node.value))
        }
    }
}

impl<K, V> ExactSizeIterator for Iter<'_, K, V> {}

// SAFETY: Iter only hands out shared references to keys and values.
unsafe impl<K: Sync, V: Sync> Send for Iter<'_, K, V> {}
unsafe impl<K: Sync, V: Sync> Sync for Iter<'_, K, V> {}

impl<K, V> Clone for Iter<'_, K, V> {
    fn clone(&self) -> Self {
        Self {
            front: self.front,
            back: self.back,
            remaining: self.remaining,
            _marker: PhantomData,
        }
    }
}

/// Entries in ascending key order, values mutable.
pub struct IterMut<'a, K, V> {
    front: Link<K, V>,
    back: Link<K, V>,
    remaining: usize,
    _marker: PhantomData<&'a mut Node<K, V>>,
}

impl<'a, K, V> Iterator for IterMut<'a, K, V> {
    type Item = (&'a K, &'a mut V);

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let n = self.front?;
        // SAFETY: the map is mutably borrowed for 'a and each node is yielded
        // at most once.
        unsafe {
            self.front = successor(n);
            self.remaining -= 1;
            let node = &mut *n.as_ptr();
            Some((&node.key, &mut node.value))
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<K, V> DoubleEndedIterator for IterMut<'_, K, V> {
    fn next_back(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let n = self.back?;
        // SAFETY: as in next.
        unsafe {
            self.back = predecessor(n);
            self.remaining -= 1;
            let node = &mut *n.as_ptr();
            Some((&node.key, &mut node.value))
        }
    }
}

impl<K, V> ExactSizeIterator for IterMut<'_, K, V> {}

// SAFETY: IterMut hands out shared keys and exclusive values, like
// `&'a K` paired with `&'a mut V`.
unsafe impl<K: Sync, V: Send> Send for IterMut<'_, K, V> {}
unsafe impl<K: Sync, V: Sync> Sync for IterMut<'_, K, V> {}

impl<'a, K, V, C> IntoIterator for &'a TreeMap<K, V, C> {
    type Item = (&'a K, &'a V);
    type IntoIter = Iter<'a, K, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<'a, K, V, C> IntoIterator for &'a mut TreeMap<K, V, C> {
    type Item = (&'a K, &'a mut V);
    type IntoIter = IterMut<'a, K, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter_mut()
    }
}

impl<K, V, C> Default for TreeMap<K, V, C>
where
    C: Default,
{
    fn default() -> Self {
        Self::with_comparator(C::default())
    }
}

impl<K, V, C> Clone for TreeMap<K, V, C>
where
    K: Clone,
    V: Clone,
    C: Compare<K> + Clone,
{
    fn clone(&self) -> Self {
        let mut out = Self::with_comparator(self.cmp.clone());
        for (k, v) in self.iter() {
            out.insert(k.clone(), v.clone());
        }
        out
    }
}

/// Same entries in the same order; tree shape is irrelevant.
impl<K, V, C> PartialEq for TreeMap<K, V, C>
where
    K: PartialEq,
    V: PartialEq,
{
    fn eq(&self, other: &Self) -> bool {
        self.len == other.len && self.iter().eq(other.iter())
    }
}

impl<K: Eq, V: Eq, C> Eq for TreeMap<K, V, C> {}

impl<K: fmt::Debug, V: fmt::Debug, C> fmt::Debug for TreeMap<K, V, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl<K, V, C> Extend<(K, V)> for TreeMap<K, V, C>
where
    C: Compare<K>,
{
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        for (k, v) in iter {
            self.insert(k, v);
        }
    }
}

impl<K, V, C> FromIterator<(K, V)> for TreeMap<K, V, C>
where
    C: Compare<K> + Default,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = Self::with_comparator(C::default());
        map.extend(iter);
        map
    }
}

/// Panics if the key is missing.
impl<K, Q, V, C> Index<&Q> for TreeMap<K, V, C>
where
    Q: ?Sized,
    K: Borrow<Q>,
    C: Compare<Q>,
{
    type Output = V;

    fn index(&self, key: &Q) -> &V {
        match self.get(key) {
            Some(v) => v,
            None => panic!("{}", KeyNotFound),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    struct DropCounter(Rc<Cell<usize>>);
    impl Drop for DropCounter {
        fn drop(&mut self) {
            self.0.set(self.0.get() + 1);
        }
    }

    /// Invariant: removing a two-child node keeps every other entry reachable
    /// and the tree balanced.
    #[test]
    fn two_child_removal_round_trip() {
        let mut m = TreeMap::new();
        for k in [5, 3, 8, 1, 4, 7, 9] {
            m.insert(k, k.to_string());
        }
        assert!(m.check_invariants());
        assert_eq!(m.height(), 3);

        assert_eq!(m.remove(&5).as_deref(), Some("5"));
        assert!(m.check_invariants());
        assert_eq!(m.len(), 6);
        for k in [1, 3, 4, 7, 8, 9] {
            assert_eq!(m.get(&k), Some(&k.to_string()));
        }
        assert!(m.get(&5).is_none());
        assert_eq!(m.first_key_value().map(|(k, _)| *k), Some(1));
        assert_eq!(m.last_key_value().map(|(k, _)| *k), Some(9));
    }

    /// Invariant: sorted insertion, the worst case for a plain BST, stays
    /// logarithmic.
    #[test]
    fn ascending_inserts_stay_balanced() {
        let mut m = TreeMap::new();
        for k in 0..1023u32 {
            m.insert(k, ());
            assert!(m.check_invariants(), "unbalanced after inserting {k}");
        }
        assert_eq!(m.height(), 10);
        for k in (0..1023u32).rev() {
            m.insert(k, ());
        }
        assert_eq!(m.len(), 1023);
    }

    /// Invariant: balance holds through every removal, including removals
    /// that trigger double rotations on the way up.
    #[test]
    fn removals_keep_balance() {
        let mut m = TreeMap::new();
        for k in 0..200i32 {
            m.insert((k * 37) % 200, k);
        }
        for k in (0..200i32).filter(|k| k % 3 != 0) {
            assert!(m.remove(&k).is_some());
            assert!(m.check_invariants(), "unbalanced after removing {k}");
        }
        assert!(m.remove(&1).is_none());
        let keys: Vec<i32> = m.keys().copied().collect();
        let expected: Vec<i32> = (0..200).filter(|k| k % 3 == 0).collect();
        assert_eq!(keys, expected);
    }

    /// Invariant: inserting an existing key overwrites the value in place.
    #[test]
    fn insert_overwrites_value() {
        let mut m = TreeMap::new();
        assert_eq!(m.insert("a", 1), None);
        assert_eq!(m.insert("a", 2), Some(1));
        assert_eq!(m.len(), 1);
        assert_eq!(m[&"a"], 2);
    }

    /// Invariant: a custom comparator decides the iteration order.
    #[test]
    fn custom_comparator_orders_keys() {
        let mut m = TreeMap::with_comparator(CompareFn(|a: &i32, b: &i32| b.cmp(a)));
        m.extend([(1, 'a'), (3, 'c'), (2, 'b')]);
        assert!(m.check_invariants());
        assert_eq!(m.keys().copied().collect::<Vec<_>>(), vec![3, 2, 1]);
        assert_eq!(m.first_key_value(), Some((&3, &'c')));
    }

    /// Invariant: front and back iteration meet without overlap.
    #[test]
    fn double_ended_iteration() {
        let m: TreeMap<i32, i32> = (0..7).map(|k| (k, k * k)).collect();
        let mut it = m.iter();
        assert_eq!(it.len(), 7);
        assert_eq!(it.next(), Some((&0, &0)));
        assert_eq!(it.next_back(), Some((&6, &36)));
        let rest: Vec<i32> = it.map(|(k, _)| *k).collect();
        assert_eq!(rest, vec![1, 2, 3, 4, 5]);

        let back: Vec<i32> = m.keys().rev().copied().collect();
        assert_eq!(back, vec![6, 5, 4, 3, 2, 1, 0]);
    }

    /// Invariant: mutable iteration reaches every value once.
    #[test]
    fn iter_mut_updates_values() {
        let mut m: TreeMap<i32, i32> = (0..10).map(|k| (k, 0)).collect();
        for (k, v) in m.iter_mut() {
            *v = *k * 2;
        }
        for v in m.values_mut().rev().take(2) {
            *v += 1;
        }
        assert_eq!(m[&3], 6);
        assert_eq!(m[&9], 19);
        assert_eq!(m[&8], 17);
    }

    /// Invariant: retain and remove_value keep the tree valid while removing
    /// entries mid-walk.
    #[test]
    fn retain_and_remove_value() {
        let mut m: TreeMap<i32, i32> = (0..64).map(|k| (k, k % 4)).collect();
        m.retain(|k, _| k % 2 == 0);
        assert!(m.check_invariants());
        assert_eq!(m.len(), 32);

        assert_eq!(m.remove_value(&2, false), 1);
        assert_eq!(m.get(&2), None);
        assert_eq!(m.remove_value(&2, true), 15);
        assert!(m.check_invariants());
        assert!(m.values().all(|v| *v == 0));
        assert_eq!(m.len(), 16);
    }

    /// Invariant: get-or-create inserts once; the read-only path reports misses.
    #[test]
    fn get_or_insert_and_try_get() {
        let mut m: TreeMap<String, Vec<u8>> = TreeMap::new();
        assert_eq!(m.try_get("k"), Err(KeyNotFound));
        m.get_or_insert_default("k".to_string()).push(1);
        m.get_or_insert_default("k".to_string()).push(2);
        assert_eq!(m.try_get("k"), Ok(&vec![1, 2]));
        for i in 0..20 {
            *m.get_or_insert_with(format!("n{i:02}"), Vec::new) = vec![i];
        }
        assert!(m.check_invariants());
        assert_eq!(m["n07"], vec![7u8]);
        assert!(m.contains_key("n19"));
        assert_eq!(m.remove("n19"), Some(vec![19u8]));
        assert!(m.get_mut("n19").is_none());
        assert!(m.check_invariants());
    }

    /// Invariant: indexing a missing key panics.
    #[test]
    #[should_panic(expected = "key not found")]
    fn index_missing_panics() {
        let m: TreeMap<i32, i32> = TreeMap::new();
        let _ = m[&1];
    }

    /// Invariant: every value is dropped exactly once across remove, clear and drop.
    #[test]
    fn values_dropped_once() {
        let drops = Rc::new(Cell::new(0));
        let mut m = TreeMap::new();
        for k in 0..50 {
            m.insert(k, DropCounter(drops.clone()));
        }
        drop(m.remove(&10));
        assert_eq!(drops.get(), 1);
        m.insert(0, DropCounter(drops.clone()));
        assert_eq!(drops.get(), 2);
        m.clear();
        assert_eq!(drops.get(), 51);
        assert!(m.is_empty());
        assert_eq!(m.height(), 0);

        for k in 0..10 {
            m.insert(k, DropCounter(drops.clone()));
        }
        drop(m);
        assert_eq!(drops.get(), 61);
    }

    /// Invariant: clones are independent and compare equal until modified.
    #[test]
    fn clone_and_eq() {
        let a: TreeMap<i32, &str> = [(2, "b"), (1, "a"), (3, "c")].into_iter().collect();
        let mut b = a.clone();
        assert_eq!(a, b);
        b.insert(4, "d");
        assert_ne!(a, b);
        assert_eq!(a.len(), 3);
        assert_eq!(format!("{a:?}"), r#"{1: "a", 2: "b", 3: "c"}"#);
    }

    /// Invariant: an empty map has no extremes.
    #[test]
    fn empty_map_extremes() {
        let m: TreeMap<u8, u8> = TreeMap::default();
        assert!(m.first_key_value().is_none());
        assert!(m.last_key_value().is_none());
        assert_eq!(m.iter().next_back(), None);
        assert!(m.check_invariants());
    }

    /// Invariant: removing through the cursor lands on the next key in
    /// order, every key is seen once, and balance holds after each removal.
    #[test]
    fn cursor_removes_while_walking() {
        let mut m: TreeMap<u32, u32> = (0..100).map(|i| (i, i * 2)).collect();
        let mut seen = Vec::new();
        let mut cursor = m.cursor_mut();
        while let Some(&k) = cursor.key() {
            seen.push(k);
            if k % 3 == 0 {
                assert_eq!(cursor.remove_current(), Some((k, k * 2)));
                if let Some(&next) = cursor.key() {
                    assert_eq!(next, k + 1);
                }
            } else {
                *cursor.value_mut().unwrap() += 1;
                cursor.move_next();
            }
        }
        assert!(cursor.is_end());
        assert_eq!(cursor.remove_current(), None);
        assert_eq!(seen, (0..100).collect::<Vec<_>>());
        assert!(m.check_invariants());
        assert_eq!(m.len(), 66);
        assert!(m.iter().all(|(k, v)| k % 3 != 0 && *v == k * 2 + 1));
    }

    /// Invariant: removing a two-child node through the cursor, where the
    /// successor's entry moves into the removed node, still steps to the
    /// successor key.
    #[test]
    fn cursor_removal_across_successor_swap() {
        let mut m = TreeMap::new();
        for k in [5, 3, 8, 1, 4, 7, 9] {
            m.insert(k, ());
        }
        let mut cursor = m.cursor_mut();
        while cursor.key() != Some(&5) {
            cursor.move_next();
        }
        assert_eq!(cursor.remove_current(), Some((5, ())));
        assert_eq!(cursor.key(), Some(&7));
        assert_eq!(cursor.remove_current(), Some((7, ())));
        assert_eq!(cursor.key(), Some(&8));
        cursor.move_next();
        cursor.move_next();
        assert!(cursor.is_end());
        assert!(m.check_invariants());
        assert_eq!(m.keys().copied().collect::<Vec<_>>(), vec![1, 3, 4, 8, 9]);
    }

    /// Invariant: an emptied map leaves the cursor at the end.
    #[test]
    fn cursor_drains_map() {
        let mut m: TreeMap<i32, String> = (0..10).map(|i| (i, i.to_string())).collect();
        let mut cursor = m.cursor_mut();
        let mut drained = Vec::new();
        while let Some((k, _)) = cursor.remove_current() {
            drained.push(k);
        }
        assert_eq!(drained, (0..10).collect::<Vec<_>>());
        assert!(m.is_empty());
        assert!(m.cursor_mut().is_end());
    }

    /// Invariant: value and predicate searches return the first match in
    /// key order.
    #[test]
    fn find_by_value_and_predicate() {
        let m: TreeMap<u8, &str> = [(4, "x"), (2, "y"), (9, "x")].into_iter().collect();
        assert_eq!(m.find_by_value(&"x"), Some((&4, &"x")));
        assert_eq!(m.find_by_value(&"z"), None);
        assert_eq!(m.find(|k, _| *k > 4), Some((&9, &"x")));
        assert_eq!(m.find(|_, v| v.is_empty()), None);
    }

    /// Invariant: iterators cross threads whenever their borrowed entries may.
    #[test]
    fn iterators_are_send_and_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}
        assert_send::<Iter<'static, String, u64>>();
        assert_sync::<Iter<'static, String, u64>>();
        assert_send::<IterMut<'static, String, Vec<u8>>>();
        assert_sync::<IterMut<'static, String, Vec<u8>>>();
        assert_send::<IterMut<'static, u32, core::cell::Cell<u8>>>();

        let m: TreeMap<u32, u32> = (0..8).map(|i| (i, i)).collect();
        let it = m.iter();
        let sum = std::thread::scope(|s| s.spawn(move || it.map(|(_, v)| *v).sum::<u32>()).join());
        assert_eq!(sum.unwrap(), 28);
    }
}
