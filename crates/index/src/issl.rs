//! Inverted slice lists.
//!
//! A `W`-bit signature is cut into `W / 16` slices. For every slice the
//! index keeps 65,536 buckets, one per 16-bit value, listing the records
//! whose slice has exactly that value. Buckets are stored flat: one
//! offsets table per slice (65,537 prefix sums) over one document array per
//! slice, which is the layout the two-pass build produces naturally.
//!
//! Scoring walks bit-flip masks in ascending popcount. Flipping the bits of
//! mask `m` in a query slice lands in the bucket of every record whose slice
//! differs from the query in exactly those bits, so each of those records
//! gains `16 - popcount(m)` for that slice.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::OnceLock;
use std::time::Instant;

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use log::{debug, info};
use rayon::prelude::*;

use crate::alloc::{acquire_buffer, acquire_buffer_with};
use crate::reader::SignatureFile;
use crate::IndexError;

/// Bits per slice.
pub const SLICE_BITS: usize = 16;
/// Buckets per slice.
pub const BUCKETS: usize = 1 << SLICE_BITS;
const OFFSETS_PER_SLICE: usize = BUCKETS + 1;

/// Value of slice `slice` in a flattened signature.
#[inline]
pub fn slice_value(bits: &[u8], slice: usize) -> u16 {
    u16::from(bits[2 * slice]) | u16::from(bits[2 * slice + 1]) << 8
}

/// All 16-bit masks ordered by (popcount, value).
pub struct MaskTable {
    masks: Vec<u16>,
    // ends[p] = number of masks with popcount <= p
    ends: [usize; SLICE_BITS + 1],
}

impl MaskTable {
    fn build() -> Self {
        let mut masks: Vec<u16> = (0..=u16::MAX).collect();
        masks.sort_by_key(|m| (m.count_ones(), *m));
        let mut ends = [0usize; SLICE_BITS + 1];
        for m in &masks {
            ends[m.count_ones() as usize] += 1;
        }
        for p in 1..=SLICE_BITS {
            ends[p] += ends[p - 1];
        }
        Self { masks, ends }
    }

    /// Shared table, computed on first use.
    pub fn global() -> &'static MaskTable {
        static TABLE: OnceLock<MaskTable> = OnceLock::new();
        TABLE.get_or_init(MaskTable::build)
    }

    /// Masks of popcount at most `max_distance` (capped at 16).
    pub fn upto(&self, max_distance: usize) -> &[u16] {
        &self.masks[..self.ends[max_distance.min(SLICE_BITS)]]
    }
}

/// ISSL index over one signature file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IsslIndex {
    slices: usize,
    records: usize,
    offsets: Vec<u32>,
    docs: Vec<u32>,
}

impl IsslIndex {
    /// Build from `file` in two passes: count bucket sizes, then fill.
    pub fn build(file: &SignatureFile, alloc_retries: u32) -> Result<Self, IndexError> {
        let start = Instant::now();
        let slices = file.width() / SLICE_BITS;
        let records = file.len();
        if u32::try_from(records).is_err() {
            return Err(IndexError::format(format!(
                "{records} records exceed the ISSL record limit"
            )));
        }

        let mut offsets = acquire_buffer(slices * OFFSETS_PER_SLICE, 0u32, alloc_retries)?;
        file.for_each_record(|_, rec| {
            let bits = rec.bits();
            for s in 0..slices {
                offsets[s * OFFSETS_PER_SLICE + slice_value(bits, s) as usize + 1] += 1;
            }
            Ok::<(), IndexError>(())
        })?;
        for s in 0..slices {
            let table = &mut offsets[s * OFFSETS_PER_SLICE..(s + 1) * OFFSETS_PER_SLICE];
            for b in 1..OFFSETS_PER_SLICE {
                table[b] += table[b - 1];
            }
        }
        debug!("issl pass 1 complete: {slices} slices, {records} records");

        let mut docs = acquire_buffer(slices * records, 0u32, alloc_retries)?;
        let mut cursor = acquire_buffer(slices * BUCKETS, 0u32, alloc_retries)?;
        for s in 0..slices {
            cursor[s * BUCKETS..(s + 1) * BUCKETS]
                .copy_from_slice(&offsets[s * OFFSETS_PER_SLICE..s * OFFSETS_PER_SLICE + BUCKETS]);
        }
        file.for_each_record(|i, rec| {
            let bits = rec.bits();
            for s in 0..slices {
                let slot = &mut cursor[s * BUCKETS + slice_value(bits, s) as usize];
                docs[s * records + *slot as usize] = i as u32;
                *slot += 1;
            }
            Ok::<(), IndexError>(())
        })?;

        info!(
            "issl built: {} slices over {} records in {} ms",
            slices,
            records,
            start.elapsed().as_millis()
        );
        Ok(Self {
            slices,
            records,
            offsets,
            docs,
        })
    }

    pub fn slices(&self) -> usize {
        self.slices
    }

    pub fn records(&self) -> usize {
        self.records
    }

    pub fn width(&self) -> usize {
        self.slices * SLICE_BITS
    }

    /// Records whose slice `slice` equals `value`, in file order.
    pub fn bucket(&self, slice: usize, value: u16) -> &[u32] {
        let table = &self.offsets[slice * OFFSETS_PER_SLICE..];
        let lo = table[value as usize] as usize;
        let hi = table[value as usize + 1] as usize;
        &self.docs[slice * self.records + lo..slice * self.records + hi]
    }

    /// Fail unless this index was built from a file shaped like `file`.
    pub fn check_compatible(&self, file: &SignatureFile) -> Result<(), IndexError> {
        if self.slices * SLICE_BITS != file.width() {
            return Err(IndexError::IncompatibleIndex(format!(
                "index has {} slices but {} holds {}-bit signatures",
                self.slices,
                file.path().display(),
                file.width()
            )));
        }
        if self.records != file.len() {
            return Err(IndexError::IncompatibleIndex(format!(
                "index covers {} records but {} holds {}",
                self.records,
                file.path().display(),
                file.len()
            )));
        }
        Ok(())
    }

    /// Per-record scores for `query_bits` with per-slice radius `max_distance`.
    ///
    /// A record's score is the sum over slices of `16 - d` where `d` is the
    /// slice distance, for slices within the radius. At full radius this is
    /// exactly `width - hamming`. Runs on the current rayon pool.
    pub fn score(
        &self,
        query_bits: &[u8],
        max_distance: usize,
        alloc_retries: u32,
    ) -> Result<Vec<u32>, IndexError> {
        let mut scores = self.score_batch(&[query_bits], max_distance, alloc_retries)?;
        Ok(scores.pop().unwrap_or_default())
    }

    /// Score several queries in one sweep of the mask table. Each thread
    /// takes a share of the masks and applies it to every query.
    pub fn score_batch(
        &self,
        queries: &[&[u8]],
        max_distance: usize,
        alloc_retries: u32,
    ) -> Result<Vec<Vec<u32>>, IndexError> {
        let mut keys = Vec::with_capacity(queries.len());
        let mut scores = Vec::with_capacity(queries.len());
        for bits in queries {
            if bits.len() * 8 != self.width() {
                return Err(IndexError::WidthMismatch {
                    expected: self.width(),
                    actual: bits.len() * 8,
                });
            }
            keys.push((0..self.slices).map(|s| slice_value(bits, s)).collect::<Vec<u16>>());
            scores.push(acquire_buffer_with(
                self.records,
                || AtomicU32::new(0),
                alloc_retries,
            )?);
        }
        let masks = MaskTable::global().upto(max_distance);
        let chunk = (masks.len() / (rayon::current_num_threads() * 4)).max(1);

        masks.par_chunks(chunk).for_each(|part| {
            for &m in part {
                let gain = SLICE_BITS as u32 - m.count_ones();
                for (query_keys, query_scores) in keys.iter().zip(&scores) {
                    for (s, &key) in query_keys.iter().enumerate() {
                        for &doc in self.bucket(s, key ^ m) {
                            query_scores[doc as usize].fetch_add(gain, Ordering::Relaxed);
                        }
                    }
                }
            }
        });
        Ok(scores
            .into_iter()
            .map(|q| q.into_iter().map(AtomicU32::into_inner).collect())
            .collect())
    }

    pub fn write_to<W: Write>(&self, w: &mut W) -> Result<(), IndexError> {
        w.write_u32::<LittleEndian>(self.slices as u32)?;
        w.write_u32::<LittleEndian>(0)?;
        w.write_u32::<LittleEndian>(0)?;
        w.write_u32::<LittleEndian>(self.records as u32)?;
        for s in 0..self.slices {
            for value in 0..BUCKETS {
                let bucket = self.bucket(s, value as u16);
                w.write_u32::<LittleEndian>(bucket.len() as u32)?;
                for &doc in bucket {
                    w.write_u32::<LittleEndian>(doc)?;
                }
            }
        }
        Ok(())
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), IndexError> {
        let mut w = BufWriter::with_capacity(1 << 20, File::create(path.as_ref())?);
        self.write_to(&mut w)?;
        w.flush()?;
        info!("issl written to {}", path.as_ref().display());
        Ok(())
    }

    pub fn read_from<R: Read>(r: &mut R, alloc_retries: u32) -> Result<Self, IndexError> {
        let slices = r.read_u32::<LittleEndian>()? as usize;
        let compression = r.read_u32::<LittleEndian>()?;
        let storage_mode = r.read_u32::<LittleEndian>()?;
        let records = r.read_u32::<LittleEndian>()? as usize;
        if compression != 0 || storage_mode != 0 {
            return Err(IndexError::format(format!(
                "unsupported issl encoding (compression {compression}, storage mode {storage_mode})"
            )));
        }
        if slices == 0 {
            return Err(IndexError::format("issl index has no slices"));
        }

        let mut offsets = acquire_buffer(slices * OFFSETS_PER_SLICE, 0u32, alloc_retries)?;
        let mut docs = acquire_buffer(slices * records, 0u32, alloc_retries)?;
        for s in 0..slices {
            let base = s * records;
            let mut filled = 0usize;
            for value in 0..BUCKETS {
                let count = r.read_u32::<LittleEndian>()? as usize;
                if filled + count > records {
                    return Err(IndexError::format(format!(
                        "slice {s} lists more than {records} records"
                    )));
                }
                let bucket = &mut docs[base + filled..base + filled + count];
                r.read_u32_into::<LittleEndian>(bucket)?;
                if let Some(bad) = bucket.iter().find(|&&d| d as usize >= records) {
                    return Err(IndexError::format(format!(
                        "slice {s} references record {bad} of {records}"
                    )));
                }
                filled += count;
                offsets[s * OFFSETS_PER_SLICE + value + 1] = filled as u32;
            }
            if filled != records {
                return Err(IndexError::format(format!(
                    "slice {s} lists {filled} of {records} records"
                )));
            }
        }
        Ok(Self {
            slices,
            records,
            offsets,
            docs,
        })
    }

    pub fn load(path: impl AsRef<Path>, alloc_retries: u32) -> Result<Self, IndexError> {
        let path = path.as_ref();
        let mut r = BufReader::with_capacity(1 << 20, File::open(path)?);
        let index = Self::read_from(&mut r, alloc_retries).map_err(|e| e.in_file(path))?;
        info!(
            "issl loaded from {}: {} slices, {} records",
            path.display(),
            index.slices,
            index.records
        );
        Ok(index)
    }
}
