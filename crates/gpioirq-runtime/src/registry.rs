//! CallbackRegistry - the set of watched lines and its dense wait set
//!
//! `entries` and `wait_set` are parallel arrays: slot `i` of one always
//! describes the same handle as slot `i` of the other, and
//! `entries[i].position == i`. `by_handle` maps a descriptor back to its
//! slot. Removal is a swap-remove on both arrays; the element moved into
//! the freed slot has its `position` and its `by_handle` entry rewritten
//! in the same call.
//!
//! The registry itself is not synchronized. The engine keeps it behind
//! a mutex and hands the dispatcher a `WaitSnapshot` per cycle.

use gpioirq_core::{CallbackResult, LineId, RegistryError, ValueStream, WaitEntry};
use std::collections::HashMap;
use std::fmt;
use std::os::unix::io::RawFd;
use std::sync::Arc;

/// Callback invoked on the dispatcher thread with the fresh value (0 or 1)
pub type EdgeCallback = Arc<dyn Fn(u8) -> CallbackResult + Send + Sync>;

/// One watched line: its value stream, its callback, its wait-set slot
pub struct WatchedHandle {
    stream: Arc<dyn ValueStream>,
    callback: EdgeCallback,
    position: usize,
}

impl WatchedHandle {
    #[inline]
    pub fn line(&self) -> LineId {
        self.stream.line()
    }

    #[inline]
    pub fn handle(&self) -> RawFd {
        self.stream.handle()
    }

    /// Slot in the dense wait set
    #[inline]
    pub fn position(&self) -> usize {
        self.position
    }

    #[inline]
    pub fn callback(&self) -> &EdgeCallback {
        &self.callback
    }

    #[inline]
    pub fn stream(&self) -> &Arc<dyn ValueStream> {
        &self.stream
    }
}

impl fmt::Debug for WatchedHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WatchedHandle")
            .field("line", &self.line())
            .field("handle", &self.handle())
            .field("position", &self.position)
            .finish()
    }
}

/// Copy of the wait set taken for one dispatcher cycle
///
/// Holds its own references to the streams, so a line removed while the
/// dispatcher is blocked keeps its descriptor open until the cycle ends.
pub struct WaitSnapshot {
    pub(crate) set: Vec<WaitEntry>,
    pub(crate) streams: Vec<Arc<dyn ValueStream>>,
}

impl WaitSnapshot {
    pub fn len(&self) -> usize {
        self.set.len()
    }

    pub fn is_empty(&self) -> bool {
        self.set.is_empty()
    }

    pub fn set_mut(&mut self) -> &mut [WaitEntry] {
        &mut self.set
    }

    /// Slots with reported events, in increasing slot order
    pub fn ready(&self) -> impl Iterator<Item = (usize, &Arc<dyn ValueStream>)> + '_ {
        self.set
            .iter()
            .zip(self.streams.iter())
            .enumerate()
            .filter(|(_, (entry, _))| entry.is_ready())
            .map(|(slot, (_, stream))| (slot, stream))
    }
}

/// Registry of watched lines
pub struct CallbackRegistry {
    entries: Vec<WatchedHandle>,
    wait_set: Vec<WaitEntry>,
    by_handle: HashMap<RawFd, usize>,
    capacity: usize,
}

impl CallbackRegistry {
    /// Create an empty registry holding at most `capacity` lines
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity.min(64)),
            wait_set: Vec::with_capacity(capacity.min(64)),
            by_handle: HashMap::new(),
            capacity,
        }
    }

    /// Append a watched handle at the next free slot
    ///
    /// Fails if the descriptor or the line is already watched, or the
    /// wait set is full. Returns the assigned slot.
    pub fn add(
        &mut self,
        stream: Arc<dyn ValueStream>,
        callback: EdgeCallback,
    ) -> Result<usize, RegistryError> {
        let handle = stream.handle();
        let line = stream.line();

        if self.by_handle.contains_key(&handle) || self.find_line(line).is_some() {
            return Err(RegistryError::AlreadyWatched(line));
        }
        if self.entries.len() >= self.capacity {
            return Err(RegistryError::Full { capacity: self.capacity });
        }

        let position = self.entries.len();
        self.entries.push(WatchedHandle { stream, callback, position });
        self.wait_set.push(WaitEntry::edge(handle));
        self.by_handle.insert(handle, position);
        Ok(position)
    }

    /// Remove by descriptor, compacting the wait set
    pub fn remove(&mut self, handle: RawFd) -> Option<WatchedHandle> {
        let position = self.by_handle.remove(&handle)?;

        let removed = self.entries.swap_remove(position);
        self.wait_set.swap_remove(position);

        // The former last element now sits in `position`.
        if let Some(moved) = self.entries.get_mut(position) {
            moved.position = position;
            self.by_handle.insert(moved.handle(), position);
        }
        Some(removed)
    }

    /// Remove by line number
    pub fn remove_line(&mut self, line: LineId) -> Option<WatchedHandle> {
        let handle = self.find_line(line)?.handle();
        self.remove(handle)
    }

    /// Look up by descriptor
    #[inline]
    pub fn lookup(&self, handle: RawFd) -> Option<&WatchedHandle> {
        self.by_handle.get(&handle).map(|&slot| &self.entries[slot])
    }

    /// Look up by line number
    pub fn find_line(&self, line: LineId) -> Option<&WatchedHandle> {
        self.entries.iter().find(|e| e.line() == line)
    }

    /// Swap the callback of a watched line; returns the previous one
    pub fn replace_callback(
        &mut self,
        line: LineId,
        callback: EdgeCallback,
    ) -> Result<EdgeCallback, RegistryError> {
        let entry = self
            .entries
            .iter_mut()
            .find(|e| e.line() == line)
            .ok_or(RegistryError::NotWatched(line))?;
        Ok(std::mem::replace(&mut entry.callback, callback))
    }

    /// Number of watched lines
    #[inline]
    pub fn size(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// The dense array handed to the multiplexer
    #[inline]
    pub fn wait_set(&self) -> &[WaitEntry] {
        &self.wait_set
    }

    pub fn iter(&self) -> impl Iterator<Item = &WatchedHandle> + '_ {
        self.entries.iter()
    }

    /// Copy the wait set for one dispatcher cycle
    pub fn snapshot(&self) -> WaitSnapshot {
        WaitSnapshot {
            set: self.wait_set.clone(),
            streams: self.entries.iter().map(|e| e.stream.clone()).collect(),
        }
    }

    /// Every recorded position matches its true slot in the wait set
    pub fn is_consistent(&self) -> bool {
        self.entries.len() == self.wait_set.len()
            && self.by_handle.len() == self.entries.len()
            && self.entries.iter().enumerate().all(|(slot, e)| {
                e.position == slot
                    && self.wait_set[slot].handle == e.handle()
                    && self.by_handle.get(&e.handle()) == Some(&slot)
            })
    }
}

impl Default for CallbackRegistry {
    fn default() -> Self {
        Self::new(gpioirq_core::constants::DEFAULT_MAX_LINES)
    }
}

impl fmt::Debug for CallbackRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallbackRegistry")
            .field("size", &self.entries.len())
            .field("capacity", &self.capacity)
            .field("entries", &self.entries)
            .finish()
    }
}
