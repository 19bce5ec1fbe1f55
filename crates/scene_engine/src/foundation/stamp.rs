//! Version stamps for change detection
//!
//! Every mutable entity carries stamps drawn from a shared [`Clock`]. A stamp
//! is not wall-clock time: it is a position in a single monotonically
//! increasing sequence, so "is A as recent as B" is a plain integer compare.
//! Derived data (render lists, cached matrices) remembers the stamps it was
//! computed from and is only recomputed when a source stamp moves past them.

use std::sync::atomic::{AtomicU64, Ordering};

/// Source of monotonically increasing stamp values
///
/// Implementations must never return the same value twice and must never go
/// backwards. The database receives its clock at construction, which lets
/// tests run against an isolated sequence.
pub trait Clock: Send + Sync + std::fmt::Debug {
    /// Next value in the sequence (always greater than every earlier value)
    fn next(&self) -> u64;
}

/// Default clock backed by an atomic counter
///
/// The counter starts at 1; 0 is reserved for [`Stamp::INVALID`].
#[derive(Debug)]
pub struct SequenceClock {
    counter: AtomicU64,
}

impl SequenceClock {
    /// Create a clock whose first issued value is 1
    pub fn new() -> Self {
        Self {
            counter: AtomicU64::new(1),
        }
    }

    /// Value that the next call to [`Clock::next`] will return
    pub fn peek(&self) -> u64 {
        self.counter.load(Ordering::SeqCst)
    }
}

impl Default for SequenceClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SequenceClock {
    fn next(&self) -> u64 {
        self.counter.fetch_add(1, Ordering::SeqCst)
    }
}

/// A single version stamp
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Stamp(u64);

impl Stamp {
    /// The "never computed" sentinel, older than any issued stamp
    pub const INVALID: Self = Self(0);

    /// Raw counter value
    pub fn value(self) -> u64 {
        self.0
    }

    /// Whether this stamp has ever been touched or moved forward
    pub fn is_valid(self) -> bool {
        self.0 != Self::INVALID.0
    }

    /// Assign the next value from the clock
    pub fn touch(&mut self, clock: &dyn Clock) -> Self {
        let next = clock.next();
        debug_assert!(next > self.0, "clock went backwards: {} -> {}", self.0, next);
        self.0 = next;
        *self
    }

    /// True if this stamp is at least as recent as `other`
    pub fn as_recent_as(self, other: Self) -> bool {
        self.0 >= other.0
    }

    /// Adopt `other` if it is newer; returns whether this stamp changed
    pub fn move_forward(&mut self, other: Self) -> bool {
        if other.0 > self.0 {
            self.0 = other.0;
            true
        } else {
            false
        }
    }

    /// Reset to the "never computed" sentinel
    pub fn invalidate(&mut self) {
        *self = Self::INVALID;
    }
}

/// The pair of stamps carried by every mutable entity
///
/// `structure` moves on topology edits (adding a node, rebinding a geometry,
/// changing shader source); `value` moves on every edit, so a structure change
/// always implies a value change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Versioned {
    value: Stamp,
    structure: Stamp,
}

impl Versioned {
    /// Last value (or structure) change
    pub fn value_changed(&self) -> Stamp {
        self.value
    }

    /// Last structure change
    pub fn structure_changed(&self) -> Stamp {
        self.structure
    }

    /// Record a value-only edit
    pub fn touch_value(&mut self, clock: &dyn Clock) -> Stamp {
        self.value.touch(clock)
    }

    /// Record a structural edit; also advances the value stamp
    pub fn touch_structure(&mut self, clock: &dyn Clock) -> Stamp {
        let stamp = self.structure.touch(clock);
        self.value.move_forward(stamp);
        stamp
    }

    /// Pull both stamps forward from a child's stamps
    pub fn move_forward(&mut self, other: &Self) -> bool {
        let value = self.value.move_forward(other.value);
        let structure = self.structure.move_forward(other.structure);
        value || structure
    }
}
