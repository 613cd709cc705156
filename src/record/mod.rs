//! Packed (Value, Remoteness) records and the arrays that hold them.

mod array;
mod atomic;
mod atomic_array;

pub use array::RecordArray;
pub use atomic::AtomicRecord;
pub use atomic_array::AtomicRecordArray;

use std::cmp::Ordering;
use std::fmt::{self, Display, Formatter};

/// Plies to a terminal position under optimal play. Bounded to 12 bits so a
/// `Record` fits in 16 bits alongside its `Value` tag.
pub type Remoteness = u16;

/// The largest remoteness representable in a record's 12-bit field.
pub const MAX_REMOTENESS: Remoteness = 0x0FFF;

/// Game-theoretic outcome of a position, from the perspective of the player
/// to move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Value {
    Undecided = 0,
    Lose = 1,
    Tie = 2,
    Draw = 3,
    Win = 4,
    Error = 5,
}

impl Value {
    const TAG_BITS: u16 = 4;
    const TAG_MASK: u16 = (1 << Self::TAG_BITS) - 1;

    fn from_tag(tag: u16) -> Self {
        match tag {
            0 => Value::Undecided,
            1 => Value::Lose,
            2 => Value::Tie,
            3 => Value::Draw,
            4 => Value::Win,
            _ => Value::Error,
        }
    }

    fn tag(self) -> u16 {
        self as u16
    }

    pub fn is_terminal_outcome(self) -> bool {
        matches!(self, Value::Win | Value::Lose | Value::Tie)
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        let s = match self {
            Value::Undecided => "undecided",
            Value::Lose => "lose",
            Value::Tie => "tie",
            Value::Draw => "draw",
            Value::Win => "win",
            Value::Error => "error",
        };
        write!(f, "{s}")
    }
}

/// A packed (Value, Remoteness) pair: 4 bits of value tag, 12 bits of
/// remoteness, fit into a `u16`. `Undecided` is the zero value, so a
/// zero-initialized record is legitimately "not yet solved".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Record(u16);

impl Record {
    pub fn new() -> Self {
        Record(0)
    }

    pub fn raw(self) -> u16 {
        self.0
    }

    pub fn from_raw(raw: u16) -> Self {
        Record(raw)
    }

    pub fn get_value(self) -> Value {
        Value::from_tag(self.0 & Value::TAG_MASK)
    }

    pub fn get_remoteness(self) -> Remoteness {
        self.0 >> Value::TAG_BITS
    }

    pub fn set_value(&mut self, value: Value) {
        self.0 = (self.0 & !Value::TAG_MASK) | value.tag();
    }

    pub fn set_remoteness(&mut self, remoteness: Remoteness) {
        debug_assert!(remoteness <= MAX_REMOTENESS, "remoteness overflowed 12 bits");
        self.0 = (self.0 & Value::TAG_MASK) | (remoteness.min(MAX_REMOTENESS) << Value::TAG_BITS);
    }

    pub fn set_value_remoteness(&mut self, value: Value, remoteness: Remoteness) {
        self.set_value(value);
        self.set_remoteness(remoteness);
    }

    /// Replaces this record iff `(candidate_value, candidate_remoteness)`
    /// strictly exceeds the current pair under `compare`, a total order on
    /// (Value, Remoteness) supplied by the caller. Returns whether the
    /// record changed.
    pub fn maximize<F>(&mut self, candidate_value: Value, candidate_remoteness: Remoteness, compare: F) -> bool
    where
        F: Fn((Value, Remoteness), (Value, Remoteness)) -> Ordering,
    {
        let current = (self.get_value(), self.get_remoteness());
        let candidate = (candidate_value, candidate_remoteness);
        if compare(candidate, current) == Ordering::Greater {
            self.set_value_remoteness(candidate_value, candidate_remoteness);
            true
        } else {
            false
        }
    }
}

impl Display for Record {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "{}({})", self.get_value(), self.get_remoteness())
    }
}

/// Comparator signature shared by `Record::maximize` and `AtomicRecord::maximize`.
pub type Comparator = fn((Value, Remoteness), (Value, Remoteness)) -> Ordering;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_record_is_undecided() {
        let record = Record::new();
        assert_eq!(record.get_value(), Value::Undecided);
        assert_eq!(record.get_remoteness(), 0);
    }

    #[test]
    fn round_trips_every_value_and_remoteness() {
        for value in [Value::Win, Value::Lose, Value::Tie, Value::Draw] {
            for remoteness in [0, 1, 17, 4094, MAX_REMOTENESS] {
                let mut record = Record::new();
                record.set_value_remoteness(value, remoteness);
                assert_eq!(record.get_value(), value);
                assert_eq!(record.get_remoteness(), remoteness);
            }
        }
    }

    #[test]
    fn maximize_replaces_only_on_strict_increase() {
        let compare = |cand: (Value, Remoteness), cur: (Value, Remoteness)| cand.1.cmp(&cur.1);
        let mut record = Record::new();
        record.set_value_remoteness(Value::Win, 3);
        assert!(!record.maximize(Value::Win, 2, compare));
        assert_eq!(record.get_remoteness(), 3);
        assert!(record.maximize(Value::Win, 5, compare));
        assert_eq!(record.get_remoteness(), 5);
    }
}
