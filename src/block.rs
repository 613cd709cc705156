//! Streaming block compressor and random-access decompression reader.
//!
//! A compressed stream is split into blocks of `block_entries` logical
//! entries (a multiple of 8, which guarantees `block_entries * bits_per_entry`
//! is a multiple of `lcm(8, bits_per_entry)` for any `bits_per_entry` in
//! `1..=31` — no logical entry can straddle a block). Each block is
//! compressed independently so block compression is embarrassingly
//! parallel; a lookup table of cumulative compressed byte offsets lets a
//! reader seek directly to the block containing any position.

use crate::error::Result;
use byteorder::{ByteOrder, LE};
use std::io::Read;
use xz2::read::{XzDecoder, XzEncoder};

/// Entries per block. Must stay a multiple of 8 so bit-packed entries never
/// straddle a block boundary regardless of `bits_per_entry`.
pub const DEFAULT_BLOCK_ENTRIES: u64 = 1 << 15;

/// Compresses `raw` (a `BpArray`'s or `RecordArray`'s byte stream) into
/// independently-compressed blocks of `block_entries * bits_per_entry / 8`
/// bytes each, returning the concatenated compressed payload and the
/// lookup table of cumulative compressed byte offsets (one entry per
/// block, plus a trailing total-length sentinel).
pub fn compress_blocks(raw: &[u8], block_entries: u64, bits_per_entry: u8) -> (Vec<u8>, Vec<u64>) {
    assert_eq!(block_entries % 8, 0, "block_entries must be a multiple of 8");
    let block_bytes = ((block_entries * bits_per_entry as u64) / 8) as usize;
    let chunks: Vec<&[u8]> = raw.chunks(block_bytes.max(1)).collect();

    let compress_one = |chunk: &[u8]| -> Vec<u8> {
        let mut encoder = XzEncoder::new(chunk, 6);
        let mut out = Vec::new();
        encoder.read_to_end(&mut out).expect("in-memory xz encode cannot fail on I/O");
        out
    };

    #[cfg(feature = "parallel")]
    let compressed: Vec<Vec<u8>> = {
        use rayon::prelude::*;
        chunks.par_iter().map(|c| compress_one(c)).collect()
    };
    #[cfg(not(feature = "parallel"))]
    let compressed: Vec<Vec<u8>> = chunks.iter().map(|c| compress_one(c)).collect();

    let mut lookup = Vec::with_capacity(compressed.len() + 1);
    let mut cursor = 0u64;
    let mut payload = Vec::new();
    for block in &compressed {
        lookup.push(cursor);
        payload.extend_from_slice(block);
        cursor += block.len() as u64;
    }
    lookup.push(cursor);
    (payload, lookup)
}

fn decompress_block(payload: &[u8], lookup: &[u64], block_idx: usize) -> Result<Vec<u8>> {
    let start = lookup[block_idx] as usize;
    let end = lookup[block_idx + 1] as usize;
    let mut decoder = XzDecoder::new(&payload[start..end]);
    let mut out = Vec::new();
    decoder.read_to_end(&mut out)?;
    out.extend_from_slice(&[0u8; 8]);
    Ok(out)
}

/// Random-access reader over a block-compressed stream. Caches the most
/// recently decompressed block and only re-decompresses when a request
/// crosses into a different block.
pub struct BlockReader<'a> {
    payload: &'a [u8],
    lookup: &'a [u64],
    block_entries: u64,
    bits_per_entry: u8,
    cached_block: Option<(usize, Vec<u8>)>,
}

impl<'a> BlockReader<'a> {
    pub fn new(payload: &'a [u8], lookup: &'a [u64], block_entries: u64, bits_per_entry: u8) -> Self {
        Self {
            payload,
            lookup,
            block_entries,
            bits_per_entry,
            cached_block: None,
        }
    }

    /// Reads the encoded value (pre-BpDict-decode) stored at logical
    /// position `i`.
    pub fn read_encoded(&mut self, i: u64) -> Result<u64> {
        let block_idx = (i / self.block_entries) as usize;
        let local_entry = i % self.block_entries;
        if self.cached_block.as_ref().map(|(b, _)| *b) != Some(block_idx) {
            let block = decompress_block(self.payload, self.lookup, block_idx)?;
            self.cached_block = Some((block_idx, block));
        }
        let block = &self.cached_block.as_ref().unwrap().1;
        let off = local_entry * self.bits_per_entry as u64;
        let byte_off = (off / 8) as usize;
        let local = (off % 8) as u32;
        let segment = u64::from_le_bytes(block[byte_off..byte_off + 8].try_into().unwrap());
        let mask = ((1u64 << self.bits_per_entry) - 1) << local;
        Ok((segment & mask) >> local)
    }
}

/// On-disk per-tier file header, little-endian, matching the wire layout:
/// `decomp_dict_size: u32, block_size: u64, lookup_size: u64, stream_len: u64,
/// num_entries: u64, bits_per_entry: u8`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileHeader {
    pub decomp_dict_size: u32,
    pub block_size: u64,
    pub lookup_size: u64,
    pub stream_len: u64,
    pub num_entries: u64,
    pub bits_per_entry: u8,
}

pub const HEADER_BYTES: usize = 4 + 8 + 8 + 8 + 8 + 1;

impl FileHeader {
    pub fn to_bytes(self) -> [u8; HEADER_BYTES] {
        let mut buf = [0u8; HEADER_BYTES];
        LE::write_u32(&mut buf[0..4], self.decomp_dict_size);
        LE::write_u64(&mut buf[4..12], self.block_size);
        LE::write_u64(&mut buf[12..20], self.lookup_size);
        LE::write_u64(&mut buf[20..28], self.stream_len);
        LE::write_u64(&mut buf[28..36], self.num_entries);
        buf[36] = self.bits_per_entry;
        buf
    }

    pub fn from_bytes(buf: &[u8]) -> Self {
        Self {
            decomp_dict_size: LE::read_u32(&buf[0..4]),
            block_size: LE::read_u64(&buf[4..12]),
            lookup_size: LE::read_u64(&buf[12..20]),
            stream_len: LE::read_u64(&buf[20..28]),
            num_entries: LE::read_u64(&buf[28..36]),
            bits_per_entry: buf[36],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compress_then_decompress_is_identity() {
        let raw: Vec<u8> = (0..4096u32).map(|i| (i % 251) as u8).collect();
        let (payload, lookup) = compress_blocks(&raw, 8 * 64, 4);
        let mut restored = Vec::new();
        for block_idx in 0..lookup.len() - 1 {
            let mut block = decompress_block(&payload, &lookup, block_idx).unwrap();
            block.truncate(block.len() - 8);
            restored.extend_from_slice(&block);
        }
        assert_eq!(restored, raw);
    }

    #[test]
    fn random_access_is_order_independent() {
        let bits = 5u8;
        let block_entries = 64u64;
        let n = 400u64;
        let mut stream = BpArrayLike::new(n, bits);
        for i in 0..n {
            stream.set(i, i % 31);
        }
        let (payload, lookup) = compress_blocks(stream.bytes(), block_entries, bits);
        let mut forward = BlockReader::new(&payload, &lookup, block_entries, bits);
        let mut reverse = BlockReader::new(&payload, &lookup, block_entries, bits);
        for i in 0..n {
            assert_eq!(forward.read_encoded(i).unwrap(), i % 31);
        }
        for i in (0..n).rev() {
            assert_eq!(reverse.read_encoded(i).unwrap(), i % 31);
        }
    }

    /// Minimal bit-packed writer used only to build fixtures for these tests.
    struct BpArrayLike {
        buf: Vec<u8>,
        bits: u8,
    }
    impl BpArrayLike {
        fn new(n: u64, bits: u8) -> Self {
            let data_bytes = ((n * bits as u64) as usize).div_ceil(8);
            Self { buf: vec![0u8; data_bytes + 8], bits }
        }
        fn set(&mut self, i: u64, value: u64) {
            let off = i * self.bits as u64;
            let byte_off = (off / 8) as usize;
            let local = (off % 8) as u32;
            let segment = u64::from_le_bytes(self.buf[byte_off..byte_off + 8].try_into().unwrap());
            let mask = ((1u64 << self.bits) - 1) << local;
            let written = (segment & !mask) | (value << local);
            self.buf[byte_off..byte_off + 8].copy_from_slice(&written.to_le_bytes());
        }
        fn bytes(&self) -> &[u8] {
            &self.buf[..self.buf.len() - 8]
        }
    }
}
