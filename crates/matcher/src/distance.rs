//! Masked Hamming distance.

/// Number of bits that differ between `doc` and `query` where `mask` is set.
///
/// All three slices must have the same length. Bytes are consumed eight at
/// a time as `u64` words; the tail, if any, bytewise.
#[inline]
pub fn document_distance(doc: &[u8], query: &[u8], mask: &[u8]) -> u32 {
    debug_assert_eq!(doc.len(), query.len());
    debug_assert_eq!(doc.len(), mask.len());
    let mut words_d = doc.chunks_exact(8);
    let mut words_q = query.chunks_exact(8);
    let mut words_m = mask.chunks_exact(8);
    let mut dist = 0u32;
    for ((d, q), m) in (&mut words_d).zip(&mut words_q).zip(&mut words_m) {
        dist += ((word(d) ^ word(q)) & word(m)).count_ones();
    }
    for ((d, q), m) in words_d
        .remainder()
        .iter()
        .zip(words_q.remainder())
        .zip(words_m.remainder())
    {
        dist += ((d ^ q) & m).count_ones();
    }
    dist
}

/// Unmasked Hamming distance.
#[inline]
pub fn hamming(a: &[u8], b: &[u8]) -> u32 {
    debug_assert_eq!(a.len(), b.len());
    let mut wa = a.chunks_exact(8);
    let mut wb = b.chunks_exact(8);
    let mut dist = 0u32;
    for (x, y) in (&mut wa).zip(&mut wb) {
        dist += (word(x) ^ word(y)).count_ones();
    }
    for (x, y) in wa.remainder().iter().zip(wb.remainder()) {
        dist += (x ^ y).count_ones();
    }
    dist
}

#[inline(always)]
fn word(bytes: &[u8]) -> u64 {
    let mut w = [0u8; 8];
    w.copy_from_slice(bytes);
    u64::from_ne_bytes(w)
}
