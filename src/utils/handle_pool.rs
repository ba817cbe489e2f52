use std::cmp::Ordering;
use std::collections::binary_heap::BinaryHeap;
use std::marker::PhantomData;

use super::handle::{HandleIndex, HandleLike};

#[derive(PartialEq, Eq)]
struct InverseHandleIndex(HandleIndex);

impl PartialOrd for InverseHandleIndex {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        other.0.partial_cmp(&self.0)
    }
}

impl Ord for InverseHandleIndex {
    fn cmp(&self, other: &Self) -> Ordering {
        self.partial_cmp(other).unwrap()
    }
}

/// `HandlePool` manages the manipulations of a `Handle` collection, which
/// are created with a continuous `index` field. It also has the ability to
/// find out the current status of a specified `Handle`. Freed indices are
/// recycled lowest-first, and a version bump invalidates stale copies.
pub struct HandlePool<H: HandleLike> {
    versions: Vec<HandleIndex>,
    frees: BinaryHeap<InverseHandleIndex>,
    _marker: PhantomData<H>,
}

impl<H: HandleLike> Default for HandlePool<H> {
    fn default() -> Self {
        HandlePool::new()
    }
}

impl<H: HandleLike> HandlePool<H> {
    /// Constructs a new, empty `HandlePool`.
    pub fn new() -> Self {
        HandlePool {
            versions: Vec::new(),
            frees: BinaryHeap::new(),
            _marker: PhantomData,
        }
    }

    /// Constructs a new `HandlePool` with the specified capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        HandlePool {
            versions: Vec::with_capacity(capacity),
            frees: BinaryHeap::with_capacity(capacity),
            _marker: PhantomData,
        }
    }

    /// Creates an unused `Handle`. An odd version marks the slot alive.
    pub fn create(&mut self) -> H {
        if let Some(InverseHandleIndex(index)) = self.frees.pop() {
            self.versions[index as usize] += 1;
            H::new(index, self.versions[index as usize])
        } else {
            self.versions.push(1);
            H::new(self.versions.len() as HandleIndex - 1, 1)
        }
    }

    /// Returns true if this `Handle` was created by the pool and has not
    /// been freed yet.
    pub fn contains(&self, handle: H) -> bool {
        let index = handle.index() as usize;
        self.alive_at(index) && (self.versions[index] == handle.version())
    }

    #[inline]
    fn alive_at(&self, index: usize) -> bool {
        (index < self.versions.len()) && ((self.versions[index] & 0x1) == 1)
    }

    /// Recycles the `Handle` index, and marks its version as dead.
    pub fn free(&mut self, handle: H) -> bool {
        if !self.contains(handle) {
            false
        } else {
            self.versions[handle.index() as usize] += 1;
            self.frees.push(InverseHandleIndex(handle.index()));
            true
        }
    }

    /// Recycles the slot at `index` regardless of version.
    pub fn free_at(&mut self, index: usize) -> Option<H> {
        if !self.alive_at(index) {
            None
        } else {
            self.versions[index] += 1;
            self.frees.push(InverseHandleIndex(index as HandleIndex));
            Some(H::new(index as HandleIndex, self.versions[index] - 1))
        }
    }

    /// Frees all the handles not matching the predicate.
    pub fn retain<P>(&mut self, mut predicate: P)
    where
        P: FnMut(H) -> bool,
    {
        for index in 0..self.versions.len() {
            if self.alive_at(index) {
                let handle = H::new(index as HandleIndex, self.versions[index]);
                if !predicate(handle) {
                    self.free(handle);
                }
            }
        }
    }

    /// Returns the total number of alive handles in this `HandlePool`.
    #[inline]
    pub fn len(&self) -> usize {
        self.versions.len() - self.frees.len()
    }

    /// Checks if the pool is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns an iterator over alive handles, in index order.
    #[inline]
    pub fn iter(&self) -> Iter<H> {
        Iter {
            versions: &self.versions,
            index: 0,
            _marker: PhantomData,
        }
    }
}

impl<'a, H: HandleLike> IntoIterator for &'a HandlePool<H> {
    type Item = H;
    type IntoIter = Iter<'a, H>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Immutable `HandlePool` iterator, created by the `iter` method.
#[derive(Copy, Clone)]
pub struct Iter<'a, H: HandleLike> {
    versions: &'a [HandleIndex],
    index: usize,
    _marker: PhantomData<H>,
}

impl<'a, H: HandleLike> Iterator for Iter<'a, H> {
    type Item = H;

    fn next(&mut self) -> Option<H> {
        while self.index < self.versions.len() {
            let index = self.index;
            self.index += 1;

            if self.versions[index] & 0x1 == 1 {
                return Some(H::new(index as HandleIndex, self.versions[index]));
            }
        }

        None
    }
}

#[cfg(test)]
mod test {
    use super::super::handle::Handle;
    use super::*;

    #[test]
    fn basic() {
        let mut set: HandlePool<Handle> = HandlePool::new();
        assert_eq!(set.len(), 0);

        let e1 = set.create();
        assert!(e1.is_valid());
        assert!(set.contains(e1));
        assert_eq!(set.len(), 1);

        set.free(e1);
        assert!(!set.contains(e1));
        assert_eq!(set.len(), 0);
        assert!(!set.free(e1));
    }

    #[test]
    fn index_reuse() {
        let mut set: HandlePool<Handle> = HandlePool::new();
        let mut v = Vec::new();
        for _ in 0..10 {
            v.push(set.create());
        }

        assert_eq!(set.len(), 10);
        for e in &v {
            set.free(*e);
        }

        for _ in 0..10 {
            let e = set.create();
            assert!((e.index() as usize) < v.len());
            assert!(v[e.index() as usize].version() != e.version());
        }
    }

    #[test]
    fn retain() {
        let mut set: HandlePool<Handle> = HandlePool::new();
        for _ in 0..10 {
            set.create();
        }

        set.retain(|e| e.index() % 2 == 0);
        assert_eq!(set.len(), 5);

        for v in &set {
            assert!(v.index() % 2 == 0);
        }
    }

    #[test]
    fn iter() {
        let mut set: HandlePool<Handle> = HandlePool::new();
        let mut v = Vec::new();
        for _ in 0..8 {
            v.push(set.create());
        }

        set.free(v.remove(3));
        set.free(v.remove(5));

        let collected: Vec<_> = set.iter().collect();
        assert_eq!(collected, v);
    }
}
