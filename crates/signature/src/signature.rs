//! Signature accumulator, record metadata and flattened bit arrays.
//!
//! The flattened layout is part of the on-disk contract: slot `i` lives in
//! byte `i / 8`, most significant bit first.

use serde::{Deserialize, Serialize};

/// The eight 32-bit metadata integers stored with every signature record.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SignatureMeta {
    /// Number of distinct terms accumulated.
    pub unique_terms: i32,
    /// Length of the source document in bytes.
    pub document_length: i32,
    /// Sum of all term counts accumulated.
    pub total_terms: i32,
    /// Static quality score, used as a ranking tie-break.
    pub quality: i32,
    /// Byte offset where the signed span starts in the source document.
    pub offset_begin: i32,
    /// Byte offset where the signed span ends in the source document.
    pub offset_end: i32,
    pub reserved: [i32; 2],
}

impl SignatureMeta {
    /// Metadata as the fixed sequence written to disk.
    pub fn to_array(&self) -> [i32; 8] {
        [
            self.unique_terms,
            self.document_length,
            self.total_terms,
            self.quality,
            self.offset_begin,
            self.offset_end,
            self.reserved[0],
            self.reserved[1],
        ]
    }

    pub fn from_array(v: [i32; 8]) -> Self {
        Self {
            unique_terms: v[0],
            document_length: v[1],
            total_terms: v[2],
            quality: v[3],
            offset_begin: v[4],
            offset_end: v[5],
            reserved: [v[6], v[7]],
        }
    }
}

/// A document or query signature under construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    id: String,
    acc: Vec<i32>,
    pub meta: SignatureMeta,
}

impl Signature {
    /// A zeroed accumulator of `width` slots.
    pub fn new(id: impl Into<String>, width: usize) -> Self {
        Self {
            id: id.into(),
            acc: vec![0; width],
            meta: SignatureMeta::default(),
        }
    }

    /// Build a signature from real-valued weights: positive weights become
    /// `+1`, everything else `-1`, so every slot is defined.
    pub fn from_weights(id: impl Into<String>, weights: &[f64]) -> Self {
        Self {
            id: id.into(),
            acc: weights.iter().map(|&w| if w > 0.0 { 1 } else { -1 }).collect(),
            meta: SignatureMeta::default(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn width(&self) -> usize {
        self.acc.len()
    }

    pub fn accumulator(&self) -> &[i32] {
        &self.acc
    }

    /// Add `vector * count` element-wise.
    pub fn add_scaled(&mut self, vector: &[i8], count: i32) {
        debug_assert_eq!(vector.len(), self.acc.len());
        for (slot, &v) in self.acc.iter_mut().zip(vector) {
            *slot += i32::from(v) * count;
        }
    }

    /// Add another signature's accumulator into this one.
    pub fn merge(&mut self, other: &Signature) {
        for (slot, &v) in self.acc.iter_mut().zip(&other.acc) {
            *slot += v;
        }
    }

    /// Flatten into `bits` (slot > 0) and `mask` (slot != 0).
    pub fn finalize(&self) -> FlatSignature {
        let bytes = self.acc.len() / 8;
        let mut bits = vec![0u8; bytes];
        let mut mask = vec![0u8; bytes];
        for (i, chunk) in self.acc.chunks_exact(8).enumerate() {
            let mut b = 0u8;
            let mut m = 0u8;
            for (j, &v) in chunk.iter().enumerate() {
                b |= u8::from(v > 0) << (7 - j);
                m |= u8::from(v != 0) << (7 - j);
            }
            bits[i] = b;
            mask[i] = m;
        }
        FlatSignature { bits, mask }
    }
}

/// Bit-packed signature with its definedness mask, `W/8` bytes each.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlatSignature {
    pub bits: Vec<u8>,
    pub mask: Vec<u8>,
}

impl FlatSignature {
    /// A stored document signature: the mask is not persisted, so every bit
    /// counts when it is used as a query.
    pub fn from_bits(bits: Vec<u8>) -> Self {
        let mask = vec![0xFF; bits.len()];
        Self { bits, mask }
    }

    pub fn width(&self) -> usize {
        self.bits.len() * 8
    }

    /// Value of bit `i` (MSB-first within each byte).
    pub fn bit(&self, i: usize) -> bool {
        bit_at(&self.bits, i)
    }
}

/// Value of bit `i` of a flattened array.
#[inline]
pub fn bit_at(bits: &[u8], i: usize) -> bool {
    bits[i / 8] & (1 << (7 - i % 8)) != 0
}
