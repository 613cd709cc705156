use super::{Comparator, Record, Remoteness, Value};
use std::sync::atomic::{AtomicU16, Ordering as AtomicOrdering};

/// `Record` over an atomic 16-bit cell. `maximize` is a compare-exchange
/// loop under `Relaxed` ordering: the algorithm only needs per-cell
/// convergence, and a barrier between retrograde passes (not a
/// happens-before edge on each cell) is what synchronizes threads.
#[derive(Debug, Default)]
pub struct AtomicRecord(AtomicU16);

impl AtomicRecord {
    pub fn new() -> Self {
        Self(AtomicU16::new(0))
    }

    pub fn load(&self) -> Record {
        Record::from_raw(self.0.load(AtomicOrdering::Relaxed))
    }

    pub fn get_value(&self) -> Value {
        self.load().get_value()
    }

    pub fn get_remoteness(&self) -> Remoteness {
        self.load().get_remoteness()
    }

    pub fn set_value(&self, value: Value) {
        self.update(|mut r| {
            r.set_value(value);
            r
        });
    }

    pub fn set_remoteness(&self, remoteness: Remoteness) {
        self.update(|mut r| {
            r.set_remoteness(remoteness);
            r
        });
    }

    pub fn set_value_remoteness(&self, value: Value, remoteness: Remoteness) {
        self.update(|mut r| {
            r.set_value_remoteness(value, remoteness);
            r
        });
    }

    /// Compare-exchange loop: load, evaluate `compare`, and retry until this
    /// cell either accepts the candidate or another thread has already
    /// published a record the comparator ranks at least as high.
    pub fn maximize(&self, candidate_value: Value, candidate_remoteness: Remoteness, compare: Comparator) -> bool {
        let mut current = self.0.load(AtomicOrdering::Relaxed);
        loop {
            let mut candidate_record = Record::from_raw(current);
            if !candidate_record.maximize(candidate_value, candidate_remoteness, compare) {
                return false;
            }
            match self.0.compare_exchange_weak(
                current,
                candidate_record.raw(),
                AtomicOrdering::Relaxed,
                AtomicOrdering::Relaxed,
            ) {
                Ok(_) => return true,
                Err(observed) => current = observed,
            }
        }
    }

    fn update(&self, f: impl Fn(Record) -> Record) {
        let mut current = self.0.load(AtomicOrdering::Relaxed);
        loop {
            let next = f(Record::from_raw(current)).raw();
            match self.0.compare_exchange_weak(current, next, AtomicOrdering::Relaxed, AtomicOrdering::Relaxed) {
                Ok(_) => return,
                Err(observed) => current = observed,
            }
        }
    }
}

impl From<Record> for AtomicRecord {
    fn from(record: Record) -> Self {
        Self(AtomicU16::new(record.raw()))
    }
}

impl Clone for AtomicRecord {
    fn clone(&self) -> Self {
        Self(AtomicU16::new(self.0.load(AtomicOrdering::Relaxed)))
    }
}
