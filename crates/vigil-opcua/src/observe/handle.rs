// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Client handle allocation.
//!
//! Every monitored item carries a client-chosen handle that the server echoes
//! back in each notification. Handles must be unique within a session, so one
//! [`ClientHandleGenerator`] is owned by each observation context and shared
//! with every subscription manager created from it.

use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};

// =============================================================================
// ClientHandle
// =============================================================================

/// Correlation id of one monitored item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClientHandle(u32);

impl ClientHandle {
    /// Creates a handle from its raw value.
    #[inline]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Returns the raw value.
    #[inline]
    pub const fn value(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for ClientHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ch-{}", self.0)
    }
}

impl From<u32> for ClientHandle {
    fn from(value: u32) -> Self {
        Self(value)
    }
}

// =============================================================================
// ClientHandleGenerator
// =============================================================================

/// Issues strictly increasing client handles starting at 1.
///
/// The generator is an ordinary value: create one per session and pass it by
/// `Arc` to whatever needs handles. Wraparound after `u32::MAX` allocations is
/// not handled.
///
/// # Examples
///
/// ```
/// use vigil_opcua::observe::ClientHandleGenerator;
///
/// let handles = ClientHandleGenerator::new();
/// assert_eq!(handles.next().value(), 1);
/// assert_eq!(handles.next().value(), 2);
/// ```
#[derive(Debug)]
pub struct ClientHandleGenerator {
    next: AtomicU32,
}

impl ClientHandleGenerator {
    /// Creates a generator whose first handle is 1.
    pub fn new() -> Self {
        Self::starting_at(1)
    }

    /// Creates a generator whose first handle is `first`.
    pub fn starting_at(first: u32) -> Self {
        Self {
            next: AtomicU32::new(first),
        }
    }

    /// Allocates the next handle.
    #[allow(clippy::should_implement_trait)]
    pub fn next(&self) -> ClientHandle {
        ClientHandle(self.next.fetch_add(1, Ordering::SeqCst))
    }

    /// Returns the handle the next call to [`next`](Self::next) will produce.
    pub fn peek(&self) -> ClientHandle {
        ClientHandle(self.next.load(Ordering::SeqCst))
    }
}

impl Default for ClientHandleGenerator {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;

    #[test]
    fn test_handles_start_at_one() {
        let handles = ClientHandleGenerator::new();
        assert_eq!(handles.peek(), ClientHandle::new(1));
        assert_eq!(handles.next(), ClientHandle::new(1));
        assert_eq!(handles.next(), ClientHandle::new(2));
        assert_eq!(handles.peek(), ClientHandle::new(3));
    }

    #[test]
    fn test_handles_strictly_increasing() {
        let handles = ClientHandleGenerator::new();
        let mut previous = handles.next();
        for _ in 0..1_000 {
            let current = handles.next();
            assert!(current > previous);
            previous = current;
        }
    }

    #[test]
    fn test_generators_are_independent() {
        let a = ClientHandleGenerator::new();
        let b = ClientHandleGenerator::new();
        a.next();
        a.next();
        assert_eq!(b.next().value(), 1);
        assert_eq!(a.next().value(), 3);
    }

    #[test]
    fn test_handles_unique_across_threads() {
        let handles = Arc::new(ClientHandleGenerator::new());
        let threads: Vec<_> = (0..8)
            .map(|_| {
                let handles = Arc::clone(&handles);
                std::thread::spawn(move || (0..500).map(|_| handles.next()).collect::<Vec<_>>())
            })
            .collect();

        let mut seen = HashSet::new();
        for thread in threads {
            for handle in thread.join().unwrap() {
                assert!(seen.insert(handle), "duplicate handle {}", handle);
            }
        }
        assert_eq!(seen.len(), 4_000);
        assert_eq!(handles.peek().value(), 4_001);
    }

    #[test]
    fn test_handle_display() {
        assert_eq!(ClientHandle::new(42).to_string(), "ch-42");
        assert_eq!(ClientHandle::from(7).value(), 7);
    }
}
