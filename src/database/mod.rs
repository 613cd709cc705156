//! The persistent layer: one record array per tier, block-compressed on
//! disk for random access, with checkpointing for crash recovery. A tier's
//! in-memory records are flushed by first repacking them through a
//! `BpArray` (so the on-disk width matches the distinct (value, remoteness)
//! patterns actually used, not a fixed 16 bits) and then block-compressing
//! the `BpArray`'s byte stream.

mod probe;

pub use probe::Probe;

use crate::block::{self, FileHeader, HEADER_BYTES};
use crate::bparray::{read_bitfield, BpArray};
use crate::engine::Engine;
use crate::error::{EngineError, Result};
use crate::game::{tier_file_stem, Game};
use crate::record::{AtomicRecordArray, Comparator, Record, RecordArray, Remoteness, Value};
use crate::tier::{DbStatus, GameStatus, Position, Tier};
use byteorder::{ByteOrder, LE};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

enum SolvingArray {
    Plain(RecordArray),
    Atomic(AtomicRecordArray),
}

struct SolvingTier {
    tier: Tier,
    array: SolvingArray,
}

/// Owns the currently-solving tier (at most one at a time) and a set of
/// read-only tiers loaded for child lookups, plus the sandbox path every
/// tier file lives under.
pub struct Database {
    sandbox_path: PathBuf,
    game: Arc<dyn Game>,
    solving: Option<SolvingTier>,
    loaded: HashMap<Tier, RecordArray>,
}

impl Database {
    pub fn new(engine: &Engine) -> Result<Self> {
        fs::create_dir_all(&engine.sandbox_path)?;
        Ok(Self {
            sandbox_path: engine.sandbox_path.clone(),
            game: engine.game.clone(),
            solving: None,
            loaded: HashMap::new(),
        })
    }

    fn tier_file_name(&self, tier: Tier) -> String {
        format!("{}.adb.xz", tier_file_stem(self.game.as_ref(), tier))
    }

    pub fn tier_path(&self, tier: Tier) -> PathBuf {
        self.sandbox_path.join(self.tier_file_name(tier))
    }

    fn checkpoint_path(&self, tier: Tier) -> PathBuf {
        self.sandbox_path.join(format!("{}.adb.xz.chk", tier_file_stem(self.game.as_ref(), tier)))
    }

    fn finish_path(&self) -> PathBuf {
        self.sandbox_path.join(".finish")
    }

    // -- solving -----------------------------------------------------

    pub fn create_solving_tier(&mut self, tier: Tier, size: u64) -> Result<()> {
        if self.solving.is_some() {
            return Err(EngineError::AlreadySolving);
        }
        self.solving = Some(SolvingTier {
            tier,
            array: SolvingArray::Plain(RecordArray::create(size)),
        });
        Ok(())
    }

    pub fn create_concurrent_solving_tier(&mut self, tier: Tier, size: u64) -> Result<()> {
        if self.solving.is_some() {
            return Err(EngineError::AlreadySolving);
        }
        self.solving = Some(SolvingTier {
            tier,
            array: SolvingArray::Atomic(AtomicRecordArray::create(size)),
        });
        Ok(())
    }

    fn solving_mut(&mut self) -> Result<&mut SolvingTier> {
        self.solving.as_mut().ok_or_else(|| EngineError::Argument("no tier is currently solving".into()))
    }

    fn solving_ref(&self) -> Result<&SolvingTier> {
        self.solving.as_ref().ok_or_else(|| EngineError::Argument("no tier is currently solving".into()))
    }

    pub fn set_value(&mut self, pos: Position, value: Value) -> Result<()> {
        match &mut self.solving_mut()?.array {
            SolvingArray::Plain(a) => a.set_value(pos, value),
            SolvingArray::Atomic(a) => a.set_value(pos, value),
        }
        Ok(())
    }

    pub fn set_remoteness(&mut self, pos: Position, remoteness: Remoteness) -> Result<()> {
        match &mut self.solving_mut()?.array {
            SolvingArray::Plain(a) => a.set_remoteness(pos, remoteness),
            SolvingArray::Atomic(a) => a.set_remoteness(pos, remoteness),
        }
        Ok(())
    }

    pub fn set_value_remoteness(&mut self, pos: Position, value: Value, remoteness: Remoteness) -> Result<()> {
        match &mut self.solving_mut()?.array {
            SolvingArray::Plain(a) => a.set_value_remoteness(pos, value, remoteness),
            SolvingArray::Atomic(a) => a.set_value_remoteness(pos, value, remoteness),
        }
        Ok(())
    }

    pub fn get_value(&self, pos: Position) -> Result<Value> {
        Ok(match &self.solving_ref()?.array {
            SolvingArray::Plain(a) => a.get_value(pos),
            SolvingArray::Atomic(a) => a.get_value(pos),
        })
    }

    pub fn get_remoteness(&self, pos: Position) -> Result<Remoteness> {
        Ok(match &self.solving_ref()?.array {
            SolvingArray::Plain(a) => a.get_remoteness(pos),
            SolvingArray::Atomic(a) => a.get_remoteness(pos),
        })
    }

    /// Atomically publishes `(value, remoteness)` at `pos` iff it strictly
    /// improves on the current record under `compare`. Only valid on a
    /// concurrently-solving tier.
    pub fn maximize_value_remoteness(&self, pos: Position, value: Value, remoteness: Remoteness, compare: Comparator) -> Result<bool> {
        match &self.solving_ref()?.array {
            SolvingArray::Atomic(a) => Ok(a.maximize(pos, value, remoteness, compare)),
            SolvingArray::Plain(_) => Err(EngineError::Argument("maximize requires a concurrent solving tier".into())),
        }
    }

    fn solving_tier_raw_records(&self) -> Result<(Tier, RecordArray)> {
        let tier = self.solving_ref()?.tier;
        let records = match &self.solving_ref()?.array {
            SolvingArray::Plain(a) => a.clone(),
            SolvingArray::Atomic(a) => a.snapshot(),
        };
        Ok((tier, records))
    }

    pub fn flush_solving_tier(&mut self) -> Result<()> {
        let (tier, records) = self.solving_tier_raw_records()?;
        let path = self.tier_path(tier);
        write_tier_file(&path, &records)?;
        Ok(())
    }

    pub fn free_solving_tier(&mut self) {
        self.solving = None;
    }

    // -- checkpointing -------------------------------------------------

    pub fn checkpoint_exists(&self, tier: Tier) -> bool {
        self.checkpoint_path(tier).exists()
    }

    pub fn checkpoint_save(&self, status_blob: &[u8]) -> Result<()> {
        let (tier, records) = self.solving_tier_raw_records()?;
        let path = self.checkpoint_path(tier);
        write_checkpoint_file(&path, &records, status_blob)
    }

    /// Restores the in-progress record array as the solving tier for
    /// `tier`/`size` and returns the opaque status blob that was saved
    /// alongside it.
    pub fn checkpoint_load(&mut self, tier: Tier, size: u64) -> Result<Vec<u8>> {
        if self.solving.is_some() {
            return Err(EngineError::AlreadySolving);
        }
        let path = self.checkpoint_path(tier);
        let (records, status_blob) = read_checkpoint_file(&path, size)?;
        self.solving = Some(SolvingTier { tier, array: SolvingArray::Plain(records) });
        Ok(status_blob)
    }

    pub fn checkpoint_remove(&self, tier: Tier) -> Result<()> {
        let path = self.checkpoint_path(tier);
        if path.exists() {
            fs::remove_file(path)?;
        }
        Ok(())
    }

    // -- read-only loaded tiers -----------------------------------------

    pub fn load_tier(&mut self, tier: Tier, size: u64) -> Result<()> {
        let path = self.tier_path(tier);
        let records = read_tier_file(&path, size)?;
        self.loaded.insert(tier, records);
        Ok(())
    }

    pub fn unload_tier(&mut self, tier: Tier) {
        self.loaded.remove(&tier);
    }

    pub fn is_tier_loaded(&self, tier: Tier) -> bool {
        self.loaded.contains_key(&tier)
    }

    pub fn get_value_from_loaded(&self, tier: Tier, pos: Position) -> Result<Value> {
        self.loaded
            .get(&tier)
            .map(|a| a.get_value(pos))
            .ok_or_else(|| EngineError::Argument(format!("tier {tier} is not loaded")))
    }

    pub fn get_remoteness_from_loaded(&self, tier: Tier, pos: Position) -> Result<Remoteness> {
        self.loaded
            .get(&tier)
            .map(|a| a.get_remoteness(pos))
            .ok_or_else(|| EngineError::Argument(format!("tier {tier} is not loaded")))
    }

    // -- probe / status --------------------------------------------------

    pub fn probe(&self) -> Probe {
        Probe::new(self.sandbox_path.clone(), self.game.clone())
    }

    pub fn tier_status(&self, tier: Tier) -> DbStatus {
        let path = self.tier_path(tier);
        if !path.exists() {
            return DbStatus::Missing;
        }
        match read_tier_file(&path, 0) {
            Ok(_) => DbStatus::Solved,
            Err(_) => DbStatus::Corrupted,
        }
    }

    pub fn game_status(&self, tiers: &[Tier]) -> GameStatus {
        if !self.finish_path().exists() {
            return GameStatus::Incomplete;
        }
        if tiers.iter().any(|&t| matches!(self.tier_status(t), DbStatus::Corrupted)) {
            return GameStatus::Error;
        }
        GameStatus::Solved
    }

    pub fn mark_finished(&self) -> Result<()> {
        fs::write(self.finish_path(), b"")?;
        Ok(())
    }
}

// -- on-disk format --------------------------------------------------

/// Repacks `records` through a `BpArray` (logical value = packed record
/// `u16`) so storage width matches the distinct patterns in use, then
/// block-compresses it into the header/dict/lookup/blocks layout.
fn write_tier_file(path: &Path, records: &RecordArray) -> Result<()> {
    let mut packed = BpArray::create(records.len().max(1));
    for i in 0..records.len() {
        packed.set(i, records.record(Position(i)).raw() as i64)?;
    }
    write_bparray(path, &packed, records.len())
}

fn write_bparray(path: &Path, packed: &BpArray, num_entries: u64) -> Result<()> {
    let bits = packed.bits_per_entry();
    let (payload, lookup) = block::compress_blocks(packed.raw_stream(), block::DEFAULT_BLOCK_ENTRIES, bits);
    let decomp = packed.dict().decomp_slice();

    let header = FileHeader {
        decomp_dict_size: (decomp.len() * 4) as u32,
        block_size: block::DEFAULT_BLOCK_ENTRIES,
        lookup_size: lookup.len() as u64,
        stream_len: packed.raw_stream().len() as u64,
        num_entries,
        bits_per_entry: bits,
    };

    let mut buf = Vec::with_capacity(HEADER_BYTES + decomp.len() * 4 + lookup.len() * 8 + payload.len());
    buf.extend_from_slice(&header.to_bytes());
    for &v in decomp {
        let mut b = [0u8; 4];
        LE::write_i32(&mut b, v as i32);
        buf.extend_from_slice(&b);
    }
    for &off in &lookup {
        let mut b = [0u8; 8];
        LE::write_u64(&mut b, off);
        buf.extend_from_slice(&b);
    }
    buf.extend_from_slice(&payload);

    let tmp = path.with_extension("tmp");
    fs::write(&tmp, &buf)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

struct ParsedTierFile {
    header: FileHeader,
    decomp: Vec<i64>,
    lookup: Vec<u64>,
    payload_start: usize,
}

fn parse_tier_file(buf: &[u8]) -> Result<ParsedTierFile> {
    if buf.len() < HEADER_BYTES {
        return Err(EngineError::Corruption("tier file shorter than header".into()));
    }
    let header = FileHeader::from_bytes(&buf[..HEADER_BYTES]);
    let dict_bytes = header.decomp_dict_size as usize;
    let lookup_bytes = (header.lookup_size as usize) * 8;
    let dict_start = HEADER_BYTES;
    let lookup_start = dict_start + dict_bytes;
    let payload_start = lookup_start + lookup_bytes;
    if buf.len() < payload_start {
        return Err(EngineError::Corruption("tier file truncated before block payload".into()));
    }
    let decomp = buf[dict_start..lookup_start]
        .chunks_exact(4)
        .map(|c| LE::read_i32(c) as i64)
        .collect();
    let lookup = buf[lookup_start..payload_start].chunks_exact(8).map(LE::read_u64).collect();
    Ok(ParsedTierFile { header, decomp, lookup, payload_start })
}

fn read_tier_file(path: &Path, expected_size: u64) -> Result<RecordArray> {
    let buf = fs::read(path)?;
    let parsed = parse_tier_file(&buf)?;
    let payload = &buf[parsed.payload_start..];

    let mut raw_stream = Vec::new();
    for block_idx in 0..parsed.lookup.len().saturating_sub(1) {
        let start = parsed.lookup[block_idx] as usize;
        let end = parsed.lookup[block_idx + 1] as usize;
        if end > payload.len() || start > end {
            return Err(EngineError::Corruption(format!("block {block_idx} offsets out of range")));
        }
        let mut decoder = xz2::read::XzDecoder::new(&payload[start..end]);
        std::io::Read::read_to_end(&mut decoder, &mut raw_stream)?;
    }
    raw_stream.truncate(parsed.header.stream_len as usize);

    let num_entries = parsed.header.num_entries;
    if expected_size != 0 && expected_size != num_entries {
        return Err(EngineError::Corruption(format!(
            "tier file reports {num_entries} entries, expected {expected_size}"
        )));
    }

    let mut stream_padded = raw_stream;
    stream_padded.extend_from_slice(&[0u8; 8]);
    let bits = parsed.header.bits_per_entry;
    let mut records = RecordArray::create(num_entries);
    for i in 0..num_entries {
        let encoded = read_bitfield(&stream_padded, bits, i);
        let key = *parsed.decomp.get(encoded as usize).ok_or_else(|| EngineError::Corruption("encoded value missing from dictionary".into()))?;
        let record = Record::from_raw(key as u16);
        records.set_value_remoteness(Position(i), record.get_value(), record.get_remoteness());
    }
    Ok(records)
}

fn write_checkpoint_file(path: &Path, records: &RecordArray, status_blob: &[u8]) -> Result<()> {
    let mut packed = BpArray::create(records.len().max(1));
    for i in 0..records.len() {
        packed.set(i, records.record(Position(i)).raw() as i64)?;
    }
    let bits = packed.bits_per_entry();
    let (record_payload, record_lookup) = block::compress_blocks(packed.raw_stream(), block::DEFAULT_BLOCK_ENTRIES, bits);
    let decomp = packed.dict().decomp_slice();

    let mut status_encoder = xz2::read::XzEncoder::new(status_blob, 6);
    let mut status_compressed = Vec::new();
    std::io::Read::read_to_end(&mut status_encoder, &mut status_compressed)?;

    let header = FileHeader {
        decomp_dict_size: (decomp.len() * 4) as u32,
        block_size: block::DEFAULT_BLOCK_ENTRIES,
        lookup_size: record_lookup.len() as u64,
        stream_len: packed.raw_stream().len() as u64,
        num_entries: records.len(),
        bits_per_entry: bits,
    };

    let mut buf = Vec::new();
    buf.extend_from_slice(&header.to_bytes());
    for &v in decomp {
        let mut b = [0u8; 4];
        LE::write_i32(&mut b, v as i32);
        buf.extend_from_slice(&b);
    }
    for &off in &record_lookup {
        let mut b = [0u8; 8];
        LE::write_u64(&mut b, off);
        buf.extend_from_slice(&b);
    }
    buf.extend_from_slice(&record_payload);
    let mut status_len_buf = [0u8; 8];
    LE::write_u64(&mut status_len_buf, status_compressed.len() as u64);
    buf.extend_from_slice(&status_len_buf);
    buf.extend_from_slice(&status_compressed);

    let tmp = path.with_extension("chk.tmp");
    fs::write(&tmp, &buf)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

fn read_checkpoint_file(path: &Path, expected_size: u64) -> Result<(RecordArray, Vec<u8>)> {
    let buf = fs::read(path)?;
    let parsed = parse_tier_file(&buf)?;
    let record_blocks_end = parsed.lookup.last().copied().unwrap_or(0) as usize + parsed.payload_start;
    let payload = &buf[parsed.payload_start..record_blocks_end];

    let mut raw_stream = Vec::new();
    for block_idx in 0..parsed.lookup.len().saturating_sub(1) {
        let start = parsed.lookup[block_idx] as usize;
        let end = parsed.lookup[block_idx + 1] as usize;
        let mut decoder = xz2::read::XzDecoder::new(&payload[start..end]);
        std::io::Read::read_to_end(&mut decoder, &mut raw_stream)?;
    }
    raw_stream.truncate(parsed.header.stream_len as usize);
    raw_stream.extend_from_slice(&[0u8; 8]);

    let num_entries = parsed.header.num_entries;
    if expected_size != 0 && expected_size != num_entries {
        return Err(EngineError::Corruption("checkpoint entry count mismatch".into()));
    }
    let bits = parsed.header.bits_per_entry;
    let mut records = RecordArray::create(num_entries);
    for i in 0..num_entries {
        let encoded = read_bitfield(&raw_stream, bits, i);
        let key = *parsed.decomp.get(encoded as usize).ok_or_else(|| EngineError::Corruption("encoded value missing from dictionary".into()))?;
        let record = Record::from_raw(key as u16);
        records.set_value_remoteness(Position(i), record.get_value(), record.get_remoteness());
    }

    if buf.len() < record_blocks_end + 8 {
        return Err(EngineError::Corruption("checkpoint missing status blob length".into()));
    }
    let status_len = LE::read_u64(&buf[record_blocks_end..record_blocks_end + 8]) as usize;
    let status_start = record_blocks_end + 8;
    let status_compressed = &buf[status_start..status_start + status_len];
    let mut status_decoder = xz2::read::XzDecoder::new(status_compressed);
    let mut status_blob = Vec::new();
    std::io::Read::read_to_end(&mut status_decoder, &mut status_blob)?;

    Ok((records, status_blob))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::Engine;
    use crate::tier::Tier;
    use std::sync::Arc;

    struct DummyGame;
    impl crate::game::Game for DummyGame {
        fn initial_tier(&self) -> Tier { Tier(0) }
        fn initial_position(&self) -> Position { Position(0) }
        fn tier_size(&self, _: Tier) -> u64 { 0 }
        fn generate_moves(&self, _: crate::tier::TierPosition) -> Vec<u64> { vec![] }
        fn primitive(&self, _: crate::tier::TierPosition) -> Value { Value::Undecided }
        fn do_move(&self, tp: crate::tier::TierPosition, _: u64) -> crate::tier::TierPosition { tp }
        fn is_legal_position(&self, _: crate::tier::TierPosition) -> bool { true }
        fn canonical_position(&self, tp: crate::tier::TierPosition) -> Position { tp.position }
        fn canonical_child_positions(&self, _: crate::tier::TierPosition) -> Vec<crate::tier::TierPosition> { vec![] }
        fn child_tiers(&self, _: Tier) -> Vec<Tier> { vec![] }
        fn tier_type(&self, _: Tier) -> crate::tier::TierType { crate::tier::TierType::ImmediateTransition }
        fn canonical_tier(&self, tier: Tier) -> Tier { tier }
    }

    fn test_engine() -> (Engine, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let engine = Engine::new(dir.path(), u64::MAX, 1, Arc::new(DummyGame));
        (engine, dir)
    }

    #[test]
    fn flush_then_load_round_trips_records() {
        let (engine, _dir) = test_engine();
        let mut db = Database::new(&engine).unwrap();
        db.create_solving_tier(Tier(1), 5).unwrap();
        db.set_value_remoteness(Position(0), Value::Win, 3).unwrap();
        db.set_value_remoteness(Position(1), Value::Lose, 0).unwrap();
        db.set_value_remoteness(Position(2), Value::Tie, 9).unwrap();
        db.set_value_remoteness(Position(3), Value::Draw, 0).unwrap();
        db.set_value_remoteness(Position(4), Value::Win, 3).unwrap();
        db.flush_solving_tier().unwrap();
        db.free_solving_tier();

        db.load_tier(Tier(1), 5).unwrap();
        assert_eq!(db.get_value_from_loaded(Tier(1), Position(0)).unwrap(), Value::Win);
        assert_eq!(db.get_remoteness_from_loaded(Tier(1), Position(0)).unwrap(), 3);
        assert_eq!(db.get_value_from_loaded(Tier(1), Position(1)).unwrap(), Value::Lose);
        assert_eq!(db.get_value_from_loaded(Tier(1), Position(3)).unwrap(), Value::Draw);
    }

    #[test]
    fn second_solving_tier_is_rejected() {
        let (engine, _dir) = test_engine();
        let mut db = Database::new(&engine).unwrap();
        db.create_solving_tier(Tier(1), 2).unwrap();
        assert!(matches!(db.create_solving_tier(Tier(2), 2), Err(EngineError::AlreadySolving)));
    }

    #[test]
    fn checkpoint_round_trips_records_and_status_blob() {
        let (engine, _dir) = test_engine();
        let mut db = Database::new(&engine).unwrap();
        db.create_solving_tier(Tier(9), 3).unwrap();
        db.set_value_remoteness(Position(0), Value::Win, 2).unwrap();
        db.set_value_remoteness(Position(1), Value::Lose, 1).unwrap();
        db.set_value_remoteness(Position(2), Value::Draw, 0).unwrap();
        db.checkpoint_save(b"phase=backward_induction;pass=2").unwrap();
        db.free_solving_tier();

        assert!(db.checkpoint_exists(Tier(9)));
        let blob = db.checkpoint_load(Tier(9), 3).unwrap();
        assert_eq!(blob, b"phase=backward_induction;pass=2");
        assert_eq!(db.get_value(Position(0)).unwrap(), Value::Win);
        assert_eq!(db.get_remoteness(Position(1)).unwrap(), 1);
    }

    #[test]
    fn tier_status_reflects_missing_and_solved() {
        let (engine, _dir) = test_engine();
        let mut db = Database::new(&engine).unwrap();
        assert_eq!(db.tier_status(Tier(5)), DbStatus::Missing);
        db.create_solving_tier(Tier(5), 2).unwrap();
        db.flush_solving_tier().unwrap();
        assert_eq!(db.tier_status(Tier(5)), DbStatus::Solved);
    }

    #[test]
    fn game_status_requires_finish_sentinel() {
        let (engine, _dir) = test_engine();
        let db = Database::new(&engine).unwrap();
        assert_eq!(db.game_status(&[]), GameStatus::Incomplete);
        db.mark_finished().unwrap();
        assert_eq!(db.game_status(&[]), GameStatus::Solved);
    }
}
