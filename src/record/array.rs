use super::{Record, Remoteness, Value};
use crate::tier::Position;
use byteorder::{ByteOrder, LE};

/// Contiguous, position-indexed array of `Record`s for one tier. Created at
/// solve start (zero-initialized, so every position starts `Undecided`),
/// mutated during solving, serialized on flush.
#[derive(Debug, Clone)]
pub struct RecordArray {
    records: Vec<Record>,
}

impl RecordArray {
    pub fn create(size: u64) -> Self {
        Self {
            records: vec![Record::new(); size as usize],
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

    pub fn set_value(&mut self, position: Position, value: Value) {
        let i = self.index(position);
        self.records[i].set_value(value);
    }

    pub fn set_remoteness(&mut self, position: Position, remoteness: Remoteness) {
        let i = self.index(position);
        self.records[i].set_remoteness(remoteness);
    }

    pub fn set_value_remoteness(&mut self, position: Position, value: Value, remoteness: Remoteness) {
        let i = self.index(position);
        self.records[i].set_value_remoteness(value, remoteness);
    }

    pub fn record(&self, position: Position) -> Record {
        self.records[self.index(position)]
    }

    pub fn as_slice(&self) -> &[Record] {
        &self.records
    }

    pub fn from_raw_le_bytes(bytes: &[u8]) -> Self {
        let records = bytes.chunks_exact(2).map(LE::read_u16).map(Record::from_raw).collect();
        Self { records }
    }

    /// Copies raw little-endian record bytes starting at `offset` into
    /// `out_buf`, for chunked serialization. Returns the number of bytes
    /// written; zero means the array has been fully drained from `offset`.
    pub fn serialize_streaming(&self, offset: u64, out_buf: &mut [u8]) -> usize {
        let total_bytes = self.records.len() * 2;
        let start = offset as usize;
        if start >= total_bytes {
            return 0;
        }
        let end = (start + out_buf.len()).min(total_bytes);
        let mut written = 0;
        for (i, byte_index) in (start..end).enumerate() {
            let record_index = byte_index / 2;
            let byte_in_record = byte_index % 2;
            let raw = self.records[record_index].raw();
            out_buf[i] = if byte_in_record == 0 { (raw & 0xFF) as u8 } else { (raw >> 8) as u8 };
            written += 1;
        }
        written
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_zero_initializes_to_undecided() {
        let arr = RecordArray::create(10);
        for i in 0..10 {
            assert_eq!(arr.get_value(Position(i)), Value::Undecided);
        }
    }

    #[test]
    fn streaming_serialize_round_trips_through_raw_bytes() {
        let mut arr = RecordArray::create(4);
        arr.set_value_remoteness(Position(0), Value::Win, 5);
        arr.set_value_remoteness(Position(1), Value::Lose, 0);
        arr.set_value_remoteness(Position(2), Value::Tie, 9);
        arr.set_value_remoteness(Position(3), Value::Draw, 0);

        let mut buf = vec![0u8; 8];
        let written = arr.serialize_streaming(0, &mut buf);
        assert_eq!(written, 8);
        assert_eq!(arr.serialize_streaming(8, &mut buf), 0);

        let restored = RecordArray::from_raw_le_bytes(&buf);
        for i in 0..4 {
            assert_eq!(restored.get_value(Position(i)), arr.get_value(Position(i)));
            assert_eq!(restored.get_remoteness(Position(i)), arr.get_remoteness(Position(i)));
        }
    }
}
