// Copyright (c) 2019-present Dmitry Stepanov and Fyrox Engine contributors.
//
// Permission is hereby granted, free of charge, to any person obtaining a copy
// of this software and associated documentation files (the "Software"), to deal
// in the Software without restriction, including without limitation the rights
// to use, copy, modify, merge, publish, distribute, sublicense, and/or sell
// copies of the Software, and to permit persons to whom the Software is
// furnished to do so, subject to the following conditions:
//
// The above copyright notice and this permission notice shall be included in all
// copies or substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
// IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
// FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
// AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
// LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
// OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE
// SOFTWARE.

//! A generational arena. Allocated objects are addressed by [`Handle`]s: a pair
//! of index and generation. When an object is freed, the generation of its record
//! is incremented, so any handle that pointed at it becomes dangling and can be
//! detected as such.
//!
//! The pool is the backing store of the scene tree; undo snapshots rely on
//! [`Pool::take_reserve`] and [`Pool::put_back`] to move objects out of the pool
//! and return them later at the same handle.

use std::{
    fmt::{Debug, Display, Formatter},
    hash::{Hash, Hasher},
    marker::PhantomData,
};

pub const INVALID_GENERATION: u32 = 0;

/// A handle to an object inside a [`Pool`].
pub struct Handle<T> {
    index: u32,
    generation: u32,
    type_marker: PhantomData<T>,
}

impl<T> Default for Handle<T> {
    fn default() -> Self {
        Self::NONE
    }
}

impl<T> Clone for Handle<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Handle<T> {}

impl<T> PartialEq for Handle<T> {
    fn eq(&self, other: &Self) -> bool {
        self.generation == other.generation && self.index == other.index
    }
}

impl<T> Eq for Handle<T> {}

impl<T> PartialOrd for Handle<T> {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for Handle<T> {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        (self.index, self.generation).cmp(&(other.index, other.generation))
    }
}

impl<T> Hash for Handle<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.index.hash(state);
        self.generation.hash(state);
    }
}

impl<T> Display for Handle<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.index, self.generation)
    }
}

impl<T> Debug for Handle<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "[Idx: {}; Gen: {}]", self.index, self.generation)
    }
}

impl<T> Handle<T> {
    pub const NONE: Handle<T> = Handle {
        index: 0,
        generation: INVALID_GENERATION,
        type_marker: PhantomData,
    };

    #[inline]
    pub fn new(index: u32, generation: u32) -> Self {
        Handle {
            index,
            generation,
            type_marker: PhantomData,
        }
    }

    #[inline(always)]
    pub fn is_none(self) -> bool {
        self.index == 0 && self.generation == INVALID_GENERATION
    }

    #[inline(always)]
    pub fn is_some(self) -> bool {
        !self.is_none()
    }

    #[inline(always)]
    pub fn index(self) -> u32 {
        self.index
    }

    #[inline(always)]
    pub fn generation(self) -> u32 {
        self.generation
    }
}

#[derive(Debug)]
struct PoolRecord<T> {
    generation: u32,
    payload: Option<T>,
}

impl<T> Default for PoolRecord<T> {
    fn default() -> Self {
        Self {
            generation: INVALID_GENERATION,
            payload: None,
        }
    }
}

impl<T: Clone> Clone for PoolRecord<T> {
    fn clone(&self) -> Self {
        Self {
            generation: self.generation,
            payload: self.payload.clone(),
        }
    }
}

/// A reservation made by [`Pool::take_reserve`]. While a ticket is alive, the
/// record it points at stays empty but is not reusable, so all handles to the
/// taken object remain stable and will become valid again after
/// [`Pool::put_back`].
#[derive(Debug)]
pub struct Ticket<T> {
    index: u32,
    marker: PhantomData<T>,
}

/// See module docs.
#[derive(Debug)]
pub struct Pool<T> {
    records: Vec<PoolRecord<T>>,
    free_stack: Vec<u32>,
}

impl<T> Default for Pool<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone> Clone for Pool<T> {
    fn clone(&self) -> Self {
        Self {
            records: self.records.clone(),
            free_stack: self.free_stack.clone(),
        }
    }
}

impl<T> Pool<T> {
    #[inline]
    pub fn new() -> Self {
        Pool {
            records: Vec::new(),
            free_stack: Vec::new(),
        }
    }

    #[inline]
    pub fn with_capacity(capacity: u32) -> Self {
        Pool {
            records: Vec::with_capacity(capacity as usize),
            free_stack: Vec::new(),
        }
    }

    fn records_get(&self, index: u32) -> Option<&PoolRecord<T>> {
        self.records.get(index as usize)
    }

    fn records_get_mut(&mut self, index: u32) -> Option<&mut PoolRecord<T>> {
        self.records.get_mut(index as usize)
    }

    #[inline]
    #[must_use]
    pub fn spawn(&mut self, payload: T) -> Handle<T> {
        self.spawn_with(|_| payload)
    }

    /// Construct a value that needs to know its own handle ahead of insertion.
    #[inline]
    pub fn spawn_with<F: FnOnce(Handle<T>) -> T>(&mut self, callback: F) -> Handle<T> {
        if let Some(free_index) = self.free_stack.pop() {
            let record = &mut self.records[free_index as usize];
            assert!(record.payload.is_none());
            let generation = record.generation + 1;
            let handle = Handle::new(free_index, generation);
            record.generation = generation;
            record.payload = Some(callback(handle));
            handle
        } else {
            let index = u32::try_from(self.records.len()).expect("pool overflowed u32");
            let generation = 1;
            let handle = Handle::new(index, generation);
            self.records.push(PoolRecord {
                generation,
                payload: Some(callback(handle)),
            });
            handle
        }
    }

    /// Moves the object out of the pool. All handles to it become dangling.
    ///
    /// # Panics
    ///
    /// Panics if the handle is dangling or out of bounds.
    #[inline]
    pub fn free(&mut self, handle: Handle<T>) -> T {
        match self.try_free(handle) {
            Some(payload) => payload,
            None => panic!("Attempt to free object using invalid handle {handle:?}!"),
        }
    }

    #[inline]
    pub fn try_free(&mut self, handle: Handle<T>) -> Option<T> {
        let record = self.records.get_mut(handle.index as usize)?;
        if record.generation != handle.generation {
            return None;
        }
        let payload = record.payload.take()?;
        self.free_stack.push(handle.index);
        Some(payload)
    }

    /// Moves the object out of the pool with a promise that it will be returned.
    /// All handles to it are temporarily invalid until [`Pool::put_back`] is
    /// called with the returned ticket.
    ///
    /// # Panics
    ///
    /// Panics if the handle is dangling, out of bounds or already taken.
    #[inline]
    pub fn take_reserve(&mut self, handle: Handle<T>) -> (Ticket<T>, T) {
        match self.try_take_reserve(handle) {
            Some(pair) => pair,
            None => panic!("Attempt to take object using invalid handle {handle:?}!"),
        }
    }

    #[inline]
    pub fn try_take_reserve(&mut self, handle: Handle<T>) -> Option<(Ticket<T>, T)> {
        let record = self.records_get_mut(handle.index)?;
        if record.generation != handle.generation {
            return None;
        }
        let payload = record.payload.take()?;
        let ticket = Ticket {
            index: handle.index,
            marker: PhantomData,
        };
        Some((ticket, payload))
    }

    /// Returns the value back into the pool at the handle it was taken from.
    #[inline]
    pub fn put_back(&mut self, ticket: Ticket<T>, value: T) -> Handle<T> {
        let record = self
            .records_get_mut(ticket.index)
            .expect("Ticket index was invalid");
        let old = record.payload.replace(value);
        assert!(old.is_none());
        Handle::new(ticket.index, record.generation)
    }

    /// Forgets that the value at the ticket was reserved, making the record
    /// usable again. Used when a dropped undo entry will never put its node back.
    #[inline]
    pub fn forget_ticket(&mut self, ticket: Ticket<T>) {
        self.free_stack.push(ticket.index);
    }

    #[inline]
    pub fn is_valid_handle(&self, handle: Handle<T>) -> bool {
        self.records_get(handle.index).is_some_and(|record| {
            record.payload.is_some() && record.generation == handle.generation
        })
    }

    #[inline]
    pub fn borrow(&self, handle: Handle<T>) -> &T {
        match self.try_borrow(handle) {
            Some(payload) => payload,
            None => panic!("Attempt to borrow object using invalid handle {handle:?}!"),
        }
    }

    #[inline]
    pub fn borrow_mut(&mut self, handle: Handle<T>) -> &mut T {
        match self.try_borrow_mut(handle) {
            Some(payload) => payload,
            None => panic!("Attempt to borrow object using invalid handle {handle:?}!"),
        }
    }

    #[inline]
    pub fn try_borrow(&self, handle: Handle<T>) -> Option<&T> {
        self.records_get(handle.index).and_then(|record| {
            if record.generation == handle.generation {
                record.payload.as_ref()
            } else {
                None
            }
        })
    }

    #[inline]
    pub fn try_borrow_mut(&mut self, handle: Handle<T>) -> Option<&mut T> {
        self.records_get_mut(handle.index).and_then(|record| {
            if record.generation == handle.generation {
                record.payload.as_mut()
            } else {
                None
            }
        })
    }

    #[inline]
    pub fn alive_count(&self) -> u32 {
        self.iter().count() as u32
    }

    #[inline]
    pub fn clear(&mut self) {
        self.records.clear();
        self.free_stack.clear();
    }

    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.records.iter().filter_map(|record| record.payload.as_ref())
    }

    #[inline]
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut T> {
        self.records
            .iter_mut()
            .filter_map(|record| record.payload.as_mut())
    }

    /// Iterates over (handle, payload) pairs of every alive record.
    #[inline]
    pub fn pair_iter(&self) -> impl Iterator<Item = (Handle<T>, &T)> {
        self.records.iter().enumerate().filter_map(|(index, record)| {
            record
                .payload
                .as_ref()
                .map(|payload| (Handle::new(index as u32, record.generation), payload))
        })
    }
}

impl<T> std::ops::Index<Handle<T>> for Pool<T> {
    type Output = T;

    fn index(&self, index: Handle<T>) -> &Self::Output {
        self.borrow(index)
    }
}

impl<T> std::ops::IndexMut<Handle<T>> for Pool<T> {
    fn index_mut(&mut self, index: Handle<T>) -> &mut Self::Output {
        self.borrow_mut(index)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn spawn_and_borrow() {
        let mut pool = Pool::new();
        let a = pool.spawn(123);
        let b = pool.spawn(321);
        assert_ne!(a, b);
        assert_eq!(pool[a], 123);
        assert_eq!(pool[b], 321);
        assert_eq!(pool.alive_count(), 2);
    }

    #[test]
    fn free_invalidates_handles() {
        let mut pool = Pool::new();
        let a = pool.spawn(1);
        assert_eq!(pool.free(a), 1);
        assert!(!pool.is_valid_handle(a));
        assert!(pool.try_borrow(a).is_none());

        // The slot is reused with a bumped generation.
        let b = pool.spawn(2);
        assert_eq!(b.index(), a.index());
        assert_ne!(b.generation(), a.generation());
        assert!(pool.try_borrow(a).is_none());
        assert_eq!(pool[b], 2);
    }

    #[test]
    fn take_reserve_keeps_record() {
        let mut pool = Pool::new();
        let a = pool.spawn(10);
        let (ticket, value) = pool.take_reserve(a);
        assert_eq!(value, 10);
        assert!(!pool.is_valid_handle(a));

        // The reserved record must not be reused while the ticket is alive.
        let b = pool.spawn(20);
        assert_ne!(b.index(), a.index());

        let restored = pool.put_back(ticket, value);
        assert_eq!(restored, a);
        assert_eq!(pool[a], 10);
    }

    #[test]
    fn forget_ticket_releases_record() {
        let mut pool = Pool::new();
        let a = pool.spawn(10);
        let (ticket, _) = pool.take_reserve(a);
        pool.forget_ticket(ticket);
        let b = pool.spawn(20);
        assert_eq!(b.index(), a.index());
        assert!(pool.try_borrow(a).is_none());
    }

    #[test]
    fn pair_iter_yields_valid_handles() {
        let mut pool = Pool::new();
        let a = pool.spawn(1);
        let b = pool.spawn(2);
        pool.free(a);
        let pairs: Vec<_> = pool.pair_iter().collect();
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0], (b, &2));
    }

    #[test]
    fn none_handle() {
        let handle: Handle<i32> = Handle::NONE;
        assert!(handle.is_none());
        let pool: Pool<i32> = Pool::new();
        assert!(!pool.is_valid_handle(handle));
    }
}
