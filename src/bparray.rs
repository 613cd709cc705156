//! Adaptive bit-packed array. Each of `N` logical entries is stored in `b`
//! bits (1 <= b <= 31); `b` grows lazily, one bit at a time, the first time
//! a value needing a wider encoding is stored. The underlying byte stream
//! carries 8 trailing padding bytes so every entry read can load an aligned
//! 64-bit window branch-free, per the design's deliberate trick to keep the
//! hot retrograde-sweep path free of per-entry shifts and bounds branches.

use crate::bpdict::BpDict;
use crate::error::{EngineError, Result};

const MAX_BITS: u8 = 31;

/// Reads the `bits`-wide encoded field stored at logical index `i` in a
/// byte stream padded with 8 trailing zero bytes, via the branch-free
/// aligned-window trick shared by `BpArray` and the block/probe readers.
pub fn read_bitfield(stream: &[u8], bits: u8, i: u64) -> u64 {
    let off = i * bits as u64;
    let byte_off = (off / 8) as usize;
    let local = (off % 8) as u32;
    let segment = u64::from_le_bytes(stream[byte_off..byte_off + 8].try_into().unwrap());
    let mask = ((1u64 << bits) - 1) << local;
    (segment & mask) >> local
}

#[derive(Debug, Clone)]
pub struct BpArray {
    stream: Vec<u8>,
    dict: BpDict,
    bits: u8,
    len: u64,
}

impl BpArray {
    /// Creates an array of `len` entries, all initially logical value 0
    /// (the BpDict's prewired Undecided sentinel), starting at 1 bit per
    /// entry.
    pub fn create(len: u64) -> Self {
        let bits = 1u8;
        Self {
            stream: Self::alloc_stream(len, bits),
            dict: BpDict::new(),
            bits,
            len,
        }
    }

    fn alloc_stream(len: u64, bits: u8) -> Vec<u8> {
        let data_bytes = ((len * bits as u64) as usize).div_ceil(8);
        vec![0u8; data_bytes + 8]
    }

    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn bits_per_entry(&self) -> u8 {
        self.bits
    }

    /// The raw packed byte stream, excluding the 8-byte trailing pad,
    /// suitable for handing to the block compressor.
    pub fn raw_stream(&self) -> &[u8] {
        &self.stream[..self.stream.len() - 8]
    }

    pub fn dict(&self) -> &BpDict {
        &self.dict
    }

    /// Reconstructs a `BpArray` from a decompressed byte stream, bit
    /// width, and dictionary, as read back from a tier file.
    pub fn from_parts(stream_no_pad: &[u8], len: u64, bits: u8, dict: BpDict) -> Self {
        let mut stream = stream_no_pad.to_vec();
        stream.extend_from_slice(&[0u8; 8]);
        Self { stream, dict, bits, len }
    }

    fn window(&self, i: u64) -> (usize, u32, u64) {
        let off = i * self.bits as u64;
        let byte_off = (off / 8) as usize;
        let local = (off % 8) as u32;
        let segment = u64::from_le_bytes(self.stream[byte_off..byte_off + 8].try_into().unwrap());
        (byte_off, local, segment)
    }

    /// Reads the logical value stored at `i`.
    pub fn get(&self, i: u64) -> i64 {
        debug_assert!(i < self.len, "bparray index out of bounds");
        let encoded = read_bitfield(&self.stream, self.bits, i);
        self.dict.decode(encoded as i64)
    }

    /// Stores `value` (an arbitrary logical value) at `i`, expanding the
    /// bit width first if `value`'s encoding doesn't fit in the current
    /// width.
    pub fn set(&mut self, i: u64, value: i64) -> Result<()> {
        debug_assert!(i < self.len, "bparray index out of bounds");
        let mut encoded = self.dict.get(value);
        if encoded == -1 {
            encoded = self.dict.set(value)?;
        }
        if encoded >= (1i64 << self.bits) {
            self.expand()?;
        }
        let (byte_off, local, segment) = self.window(i);
        let mask = ((1u64 << self.bits) - 1) << local;
        let cleared = segment & !mask;
        let written = cleared | ((encoded as u64) << local);
        self.stream[byte_off..byte_off + 8].copy_from_slice(&written.to_le_bytes());
        Ok(())
    }

    /// Doubles the encoded-value headroom by incrementing `b`, copying
    /// every existing entry into its new bit position. The design calls
    /// for processing chunks of 8 entries sequentially (a chunk's byte
    /// span overlaps internally) with chunks themselves independent of one
    /// another; we copy chunk-by-chunk, in parallel when the `parallel`
    /// feature is enabled.
    fn expand(&mut self) -> Result<()> {
        let new_bits = self.bits + 1;
        if new_bits > MAX_BITS {
            return Err(EngineError::Overflow(format!("bparray entry width would exceed {MAX_BITS} bits")));
        }
        let old = std::mem::take(&mut self.stream);
        let old_bits = self.bits;
        let len = self.len;
        let mut new_stream = Self::alloc_stream(len, new_bits);

        const CHUNK: u64 = 8;
        let num_chunks = len.div_ceil(CHUNK);
        let copy_chunk = |chunk_idx: u64, dst: &mut [u8]| {
            let start = chunk_idx * CHUNK;
            let end = (start + CHUNK).min(len);
            for i in start..end {
                let off = i * old_bits as u64;
                let byte_off = (off / 8) as usize;
                let local = (off % 8) as u32;
                let segment = u64::from_le_bytes(old[byte_off..byte_off + 8].try_into().unwrap());
                let mask = ((1u64 << old_bits) - 1) << local;
                let encoded = (segment & mask) >> local;

                let new_off = i * new_bits as u64;
                let new_byte_off = (new_off / 8) as usize;
                let new_local = (new_off % 8) as u32;
                let new_mask = ((1u64 << new_bits) - 1) << new_local;
                let existing = u64::from_le_bytes(dst[new_byte_off..new_byte_off + 8].try_into().unwrap());
                let cleared = existing & !new_mask;
                let written = cleared | (encoded << new_local);
                dst[new_byte_off..new_byte_off + 8].copy_from_slice(&written.to_le_bytes());
            }
        };

        #[cfg(feature = "parallel")]
        {
            use rayon::prelude::*;
            let chunk_results: Vec<Vec<u8>> = (0..num_chunks)
                .into_par_iter()
                .map(|chunk_idx| {
                    let mut local_copy = new_stream.clone();
                    copy_chunk(chunk_idx, &mut local_copy);
                    local_copy
                })
                .collect();
            // Each chunk only ever touches bytes it owns plus shared padding
            // zero bytes, so merging by OR-ing the deltas back in is safe:
            // start from a zeroed buffer, fold every chunk's nonzero bytes.
            for chunk in chunk_results {
                for (dst, src) in new_stream.iter_mut().zip(chunk.iter()) {
                    *dst |= *src;
                }
            }
        }
        #[cfg(not(feature = "parallel"))]
        {
            for chunk_idx in 0..num_chunks {
                copy_chunk(chunk_idx, &mut new_stream);
            }
        }

        self.stream = new_stream;
        self.bits = new_bits;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_entry_costs_one_bit() {
        let arr = BpArray::create(100);
        assert_eq!(arr.bits_per_entry(), 1);
    }

    #[test]
    fn set_then_get_round_trips() {
        let mut arr = BpArray::create(16);
        for i in 0..16u64 {
            arr.set(i, (i * 13) as i64).unwrap();
        }
        for i in 0..16u64 {
            assert_eq!(arr.get(i), (i * 13) as i64);
        }
    }

    #[test]
    fn expansion_preserves_previously_stored_entries() {
        let mut arr = BpArray::create(40);
        for i in 0..40u64 {
            arr.set(i, i as i64).unwrap();
        }
        assert!(arr.bits_per_entry() >= 6);
        for i in 0..40u64 {
            assert_eq!(arr.get(i), i as i64);
        }
    }

    #[test]
    fn overwrite_replaces_value() {
        let mut arr = BpArray::create(4);
        arr.set(0, 5).unwrap();
        arr.set(0, 9).unwrap();
        assert_eq!(arr.get(0), 9);
    }

    #[test]
    fn unset_entries_decode_to_zero() {
        let arr = BpArray::create(8);
        for i in 0..8u64 {
            assert_eq!(arr.get(i), 0);
        }
    }
}
