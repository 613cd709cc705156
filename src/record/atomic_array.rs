use super::{AtomicRecord, Comparator, Record, RecordArray, Remoteness, Value};
use crate::tier::Position;

/// `RecordArray` over atomic cells, for data-parallel retrograde solving:
/// independent threads race to publish (value, remoteness) for a position
/// and converge via `maximize`.
#[derive(Debug)]
pub struct AtomicRecordArray {
    records: Vec<AtomicRecord>,
}

impl AtomicRecordArray {
    pub fn create(size: u64) -> Self {
        Self {
            records: (0..size).map(|_| AtomicRecord::new()).collect(),
        }
    }

    pub fn len(&self) -> u64 {
        self.records.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    fn index(&self, position: Position) -> usize {
        let i = position.0 as usize;
        assert!(i < self.records.len(), "position {i} out of bounds for tier of size {}", self.records.len());
        i
    }

    pub fn get_value(&self, position: Position) -> Value {
        self.records[self.index(position)].get_value()
    }

    pub fn get_remoteness(&self, position: Position) -> Remoteness {
        self.records[self.index(position)].get_remoteness()
    }

    pub fn set_value(&self, position: Position, value: Value) {
        self.records[self.index(position)].set_value(value);
    }

    pub fn set_remoteness(&self, position: Position, remoteness: Remoteness) {
        self.records[self.index(position)].set_remoteness(remoteness);
    }

    pub fn set_value_remoteness(&self, position: Position, value: Value, remoteness: Remoteness) {
        self.records[self.index(position)].set_value_remoteness(value, remoteness);
    }

    pub fn maximize(&self, position: Position, value: Value, remoteness: Remoteness, compare: Comparator) -> bool {
        self.records[self.index(position)].maximize(value, remoteness, compare)
    }

    pub fn record(&self, position: Position) -> Record {
        self.records[self.index(position)].load()
    }

    /// Consumes the atomic array into the plain `RecordArray` used for
    /// flushing and serialization once a tier's parallel sweep is done.
    pub fn into_record_array(self) -> RecordArray {
        self.snapshot()
    }

    /// Copies every cell into a plain `RecordArray` without consuming the
    /// atomic array, for flushing mid-solve (e.g. checkpointing).
    pub fn snapshot(&self) -> RecordArray {
        let mut plain = RecordArray::create(self.records.len() as u64);
        for (i, cell) in self.records.iter().enumerate() {
            plain.set_value_remoteness(Position(i as u64), cell.get_value(), cell.get_remoteness());
        }
        plain
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_zero_initializes_to_undecided() {
        let arr = AtomicRecordArray::create(5);
        for i in 0..5 {
            assert_eq!(arr.get_value(Position(i)), Value::Undecided);
        }
    }

    #[test]
    fn into_record_array_preserves_values() {
        let arr = AtomicRecordArray::create(3);
        arr.set_value_remoteness(Position(1), Value::Win, 4);
        let plain = arr.into_record_array();
        assert_eq!(plain.get_value(Position(1)), Value::Win);
        assert_eq!(plain.get_remoteness(Position(1)), 4);
    }
}
