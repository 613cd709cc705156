//! A per-caller handle onto flushed tier files. Opens and decompresses a
//! tier's lookup table lazily on first access, caches the single block
//! its last read touched, and drops everything for the previous tier the
//! moment a probe targets a different one.

use crate::bparray::read_bitfield;
use crate::error::EngineError;
use crate::game::{tier_file_stem, Game};
use crate::record::{Record, Remoteness, Value};
use crate::tier::{Tier, TierPosition};
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

struct OpenTier {
    tier: Tier,
    decomp: Vec<i64>,
    lookup: Vec<u64>,
    payload: Vec<u8>,
    bits: u8,
    block_entries: u64,
    cached_block: Option<(usize, Vec<u8>)>,
}

/// Caches at most one open tier file at a time. `probe_value`/
/// `probe_remoteness` return `Value::Error`/remoteness `0` on I/O or
/// corruption failure rather than propagating, matching the spec's probe
/// contract (probes serve best-effort reads to a query front-end).
pub struct Probe {
    sandbox_path: PathBuf,
    game: Arc<dyn Game>,
    open: Option<OpenTier>,
}

impl Probe {
    pub(super) fn new(sandbox_path: PathBuf, game: Arc<dyn Game>) -> Self {
        Self { sandbox_path, game, open: None }
    }

    fn ensure_open(&mut self, tier: Tier) -> Result<(), EngineError> {
        if self.open.as_ref().map(|o| o.tier) == Some(tier) {
            return Ok(());
        }
        let path = self.sandbox_path.join(format!("{}.adb.xz", tier_file_stem(self.game.as_ref(), tier)));
        let buf = fs::read(&path)?;
        let parsed = super::parse_tier_file(&buf)?;
        let payload = buf[parsed.payload_start..].to_vec();
        self.open = Some(OpenTier {
            tier,
            decomp: parsed.decomp,
            lookup: parsed.lookup,
            payload,
            bits: parsed.header.bits_per_entry,
            block_entries: parsed.header.block_size,
            cached_block: None,
        });
        Ok(())
    }

    fn decoded_record(&mut self, tp: TierPosition) -> Result<Record, EngineError> {
        self.ensure_open(tp.tier)?;
        let open = self.open.as_mut().unwrap();
        let block_idx = (tp.position.0 / open.block_entries) as usize;
        let local = tp.position.0 % open.block_entries;
        if open.cached_block.as_ref().map(|(b, _)| *b) != Some(block_idx) {
            if block_idx + 1 >= open.lookup.len() {
                return Err(EngineError::Corruption(format!("position {} out of range for tier {}", tp.position, tp.tier)));
            }
            let start = open.lookup[block_idx] as usize;
            let end = open.lookup[block_idx + 1] as usize;
            let mut decoder = xz2::read::XzDecoder::new(&open.payload[start..end]);
            let mut block = Vec::new();
            std::io::Read::read_to_end(&mut decoder, &mut block)?;
            block.extend_from_slice(&[0u8; 8]);
            open.cached_block = Some((block_idx, block));
        }
        let block = &open.cached_block.as_ref().unwrap().1;
        let encoded = read_bitfield(block, open.bits, local);
        let key = *open
            .decomp
            .get(encoded as usize)
            .ok_or_else(|| EngineError::Corruption("encoded value missing from dictionary".into()))?;
        Ok(Record::from_raw(key as u16))
    }

    pub fn probe_value(&mut self, tp: TierPosition) -> Value {
        self.decoded_record(tp).map(|r| r.get_value()).unwrap_or(Value::Error)
    }

    pub fn probe_remoteness(&mut self, tp: TierPosition) -> Remoteness {
        self.decoded_record(tp).map(|r| r.get_remoteness()).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::Database;
    use crate::engine::Engine;
    use crate::game::Game;
    use crate::tier::{Position, TierPosition, TierType};
    use std::sync::Arc;

    struct DummyGame;
    impl Game for DummyGame {
        fn initial_tier(&self) -> Tier { Tier(0) }
        fn initial_position(&self) -> Position { Position(0) }
        fn tier_size(&self, _: Tier) -> u64 { 0 }
        fn generate_moves(&self, _: TierPosition) -> Vec<u64> { vec![] }
        fn primitive(&self, _: TierPosition) -> Value { Value::Undecided }
        fn do_move(&self, tp: TierPosition, _: u64) -> TierPosition { tp }
        fn is_legal_position(&self, _: TierPosition) -> bool { true }
        fn canonical_position(&self, tp: TierPosition) -> Position { tp.position }
        fn canonical_child_positions(&self, _: TierPosition) -> Vec<TierPosition> { vec![] }
        fn child_tiers(&self, _: Tier) -> Vec<Tier> { vec![] }
        fn tier_type(&self, _: Tier) -> TierType { TierType::ImmediateTransition }
        fn canonical_tier(&self, tier: Tier) -> Tier { tier }
    }

    #[test]
    fn probe_reads_flushed_tier_and_errors_on_missing_tier() {
        let dir = tempfile::tempdir().unwrap();
        let engine = Engine::new(dir.path(), u64::MAX, 1, Arc::new(DummyGame));
        let mut db = Database::new(&engine).unwrap();
        db.create_solving_tier(Tier(3), 4).unwrap();
        db.set_value_remoteness(Position(0), Value::Win, 1).unwrap();
        db.set_value_remoteness(Position(1), Value::Lose, 0).unwrap();
        db.flush_solving_tier().unwrap();
        db.free_solving_tier();

        let mut probe = db.probe();
        assert_eq!(probe.probe_value(TierPosition::new(Tier(3), Position(0))), Value::Win);
        assert_eq!(probe.probe_remoteness(TierPosition::new(Tier(3), Position(0))), 1);
        assert_eq!(probe.probe_value(TierPosition::new(Tier(3), Position(1))), Value::Lose);
        assert_eq!(probe.probe_value(TierPosition::new(Tier(99), Position(0))), Value::Error);
    }
}
