//! Deterministic random projection of terms into sparse ternary vectors.
//!
//! Every term is mapped to a fixed vector of `W` slots in `{-1, 0, +1}`. The
//! vector is generated by a PRNG whose seed is derived from the term's raw
//! bytes, so the same term yields the same vector in every process. This is
//! what makes index-time and query-time signatures comparable.

use xxhash_rust::xxh3::xxh3_64_with_seed;

use crate::config::{ProjectionMethod, SignatureConfig, SignatureError};

/// A term's projection: one signed slot per signature bit.
pub type TermVector = Box<[i8]>;

/// Generates term vectors for a fixed width, density and method.
#[derive(Debug, Clone)]
pub struct RandomProjector {
    width: usize,
    density: usize,
    method: ProjectionMethod,
    seed: u32,
}

impl RandomProjector {
    /// Build a projector from a validated configuration.
    pub fn new(cfg: &SignatureConfig) -> Result<Self, SignatureError> {
        cfg.validate()?;
        Ok(Self {
            width: cfg.width,
            density: cfg.density,
            method: cfg.method,
            seed: cfg.seed,
        })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn method(&self) -> ProjectionMethod {
        self.method
    }

    /// Project `term` into a freshly allocated vector.
    pub fn project(&self, term: &str) -> TermVector {
        let mut out = vec![0i8; self.width].into_boxed_slice();
        self.project_into(term, &mut out);
        out
    }

    /// Project `term` into `out`, which must hold exactly `width` slots and
    /// is overwritten.
    pub fn project_into(&self, term: &str, out: &mut [i8]) {
        debug_assert_eq!(out.len(), self.width);
        out.fill(0);
        let mut rng = TermRng::for_term(term.as_bytes(), self.seed);
        match self.method {
            ProjectionMethod::Traditional => self.fill_traditional(out, &mut rng),
            ProjectionMethod::Skip => self.fill_skip(out, &mut rng),
        }
    }

    // Positions are claimed at most once, so each loop ends after claiming
    // at most `width` distinct slots.
    fn fill_traditional(&self, out: &mut [i8], rng: &mut TermRng) {
        let half = self.width / self.density / 2;
        for sign in [1i8, -1i8] {
            let mut set = 0;
            while set < half {
                let pos = rng.next_u32() as usize % self.width;
                if out[pos] == 0 {
                    out[pos] = sign;
                    set += 1;
                }
            }
        }
    }

    fn fill_skip(&self, out: &mut [i8], rng: &mut TermRng) {
        let target = self.width / self.density;
        let span = (self.density * 2 - 1) as u32;
        let mut pos = 0usize;
        let mut set = 0;
        while set < target {
            let r = rng.next_u32();
            let skip = (r % span) as usize + 1;
            pos = (pos + skip) % self.width;
            if out[pos] == 0 {
                out[pos] = if (r / span) % 2 == 1 { 1 } else { -1 };
                set += 1;
            }
        }
    }
}

/// SplitMix64 stream seeded from the term bytes.
#[derive(Debug, Clone)]
pub(crate) struct TermRng {
    state: u64,
}

impl TermRng {
    pub(crate) fn for_term(term: &[u8], seed: u32) -> Self {
        Self {
            state: xxh3_64_with_seed(term, u64::from(seed)),
        }
    }

    #[inline]
    pub(crate) fn next_u64(&mut self) -> u64 {
        self.state = self.state.wrapping_add(0x9E37_79B9_7F4A_7C15);
        splitmix64(self.state)
    }

    #[inline]
    pub(crate) fn next_u32(&mut self) -> u32 {
        (self.next_u64() >> 32) as u32
    }
}

/// A 64-bit finalizer with good avalanche behaviour.
#[inline]
pub(crate) fn splitmix64(x: u64) -> u64 {
    let mut z = x;
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}
