//! Configuration and error types for signature construction.
//!
//! This module defines the public configuration surface of the signature
//! layer. It is free of any I/O so that a term vector is a pure function of
//! `(term, config)`; index-time and query-time configs must agree on every
//! field except `term_cache_size` for signatures to be comparable.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Strategy used to place the nonzero slots of a term vector.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum ProjectionMethod {
    /// Rejection sampling: `W/density/2` slots set to `+1`, the same number
    /// of disjoint slots set to `-1`.
    #[default]
    Traditional,
    /// Randomized skips modulo `W`, sign taken from a spare random bit.
    Skip,
}

impl ProjectionMethod {
    /// Name stored in the 64-byte method field of a signature file header.
    pub fn name(&self) -> &'static str {
        match self {
            ProjectionMethod::Traditional => "traditional",
            ProjectionMethod::Skip => "skip",
        }
    }
}

impl fmt::Display for ProjectionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ProjectionMethod {
    type Err = SignatureError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "traditional" => Ok(ProjectionMethod::Traditional),
            "skip" => Ok(ProjectionMethod::Skip),
            other => Err(SignatureError::UnknownMethod(other.to_string())),
        }
    }
}

/// Configuration for projecting terms and accumulating signatures.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SignatureConfig {
    /// Signature width in bits. Must be a positive multiple of 16 so the
    /// signature divides evenly into ISSL slices.
    pub width: usize,
    /// Sparsity divisor: each term vector carries exactly `width / density`
    /// nonzero slots.
    pub density: usize,
    /// Term vector placement strategy.
    pub method: ProjectionMethod,
    /// Seed mixed into every term's PRNG seed. Stored in the signature file
    /// header so readers can rebuild compatible query signatures.
    pub seed: u32,
    /// Number of ring slots in the term vector cache; `0` disables caching.
    pub term_cache_size: usize,
    /// Maximum stored length of a document identifier, in bytes.
    pub max_name_len: usize,
}

impl SignatureConfig {
    /// Create a configuration with the default values.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_width(mut self, width: usize) -> Self {
        self.width = width;
        self
    }

    pub fn with_density(mut self, density: usize) -> Self {
        self.density = density;
        self
    }

    pub fn with_method(mut self, method: ProjectionMethod) -> Self {
        self.method = method;
        self
    }

    pub fn with_seed(mut self, seed: u32) -> Self {
        self.seed = seed;
        self
    }

    /// Set the term cache capacity. Use `0` for query-side builders that
    /// see each term only once.
    pub fn with_term_cache_size(mut self, size: usize) -> Self {
        self.term_cache_size = size;
        self
    }

    pub fn with_max_name_len(mut self, len: usize) -> Self {
        self.max_name_len = len;
        self
    }

    /// Number of nonzero slots in every generated term vector.
    pub fn nonzero_per_term(&self) -> usize {
        match self.method {
            ProjectionMethod::Traditional => self.width / self.density / 2 * 2,
            ProjectionMethod::Skip => self.width / self.density,
        }
    }

    /// Size in bytes of a flattened bit array.
    pub fn byte_len(&self) -> usize {
        self.width / 8
    }

    /// Validate configuration parameters.
    pub fn validate(&self) -> Result<(), SignatureError> {
        if self.width == 0 || self.width % 16 != 0 {
            return Err(SignatureError::InvalidWidth { width: self.width });
        }
        if self.density == 0 || self.density > self.width {
            return Err(SignatureError::InvalidDensity {
                density: self.density,
                width: self.width,
            });
        }
        if self.max_name_len == 0 {
            return Err(SignatureError::InvalidConfig(
                "max_name_len must be >= 1".into(),
            ));
        }
        Ok(())
    }
}

impl Default for SignatureConfig {
    fn default() -> Self {
        Self {
            width: 1024,
            density: 21,
            method: ProjectionMethod::Traditional,
            seed: 0,
            term_cache_size: 100_000,
            max_name_len: 255,
        }
    }
}

/// Errors returned by the signature layer.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SignatureError {
    #[error("invalid config: width must be a positive multiple of 16 (got {width})")]
    InvalidWidth { width: usize },

    #[error("invalid config: density must be in 1..={width} (got {density})")]
    InvalidDensity { density: usize, width: usize },

    #[error("unknown signature method {0:?}; expected traditional or skip")]
    UnknownMethod(String),

    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error("signature width mismatch: expected {expected} bits, got {actual}")]
    WidthMismatch { expected: usize, actual: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_default_values() {
        let cfg = SignatureConfig::default();
        assert_eq!(cfg.width, 1024);
        assert_eq!(cfg.density, 21);
        assert_eq!(cfg.method, ProjectionMethod::Traditional);
        assert_eq!(cfg.max_name_len, 255);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn config_builder_chain() {
        let cfg = SignatureConfig::new()
            .with_width(64)
            .with_density(2)
            .with_method(ProjectionMethod::Skip)
            .with_seed(7)
            .with_term_cache_size(0)
            .with_max_name_len(16);

        assert_eq!(cfg.width, 64);
        assert_eq!(cfg.density, 2);
        assert_eq!(cfg.method, ProjectionMethod::Skip);
        assert_eq!(cfg.seed, 7);
        assert_eq!(cfg.term_cache_size, 0);
        assert_eq!(cfg.max_name_len, 16);
        assert_eq!(cfg.byte_len(), 8);
        assert_eq!(cfg.nonzero_per_term(), 32);
    }

    #[test]
    fn width_must_be_multiple_of_16() {
        let cfg = SignatureConfig::new().with_width(24);
        assert_eq!(
            cfg.validate(),
            Err(SignatureError::InvalidWidth { width: 24 })
        );
        let cfg = SignatureConfig::new().with_width(0);
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn density_must_be_positive() {
        let cfg = SignatureConfig::new().with_width(64).with_density(0);
        assert!(matches!(
            cfg.validate(),
            Err(SignatureError::InvalidDensity { .. })
        ));
    }

    #[test]
    fn method_parses_case_insensitively() {
        assert_eq!(
            "TRADITIONAL".parse::<ProjectionMethod>(),
            Ok(ProjectionMethod::Traditional)
        );
        assert_eq!("skip".parse::<ProjectionMethod>(), Ok(ProjectionMethod::Skip));
        assert_eq!(
            "gaussian".parse::<ProjectionMethod>(),
            Err(SignatureError::UnknownMethod("gaussian".into()))
        );
    }

    #[test]
    fn config_serde_roundtrip() {
        let cfg = SignatureConfig::new().with_method(ProjectionMethod::Skip);
        let json = serde_json::to_string(&cfg).unwrap();
        assert!(json.contains("\"skip\""));
        let back: SignatureConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(cfg, back);
    }
}
