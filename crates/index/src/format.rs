//! On-disk layout of signature files.
//!
//! All integers are little-endian.
//!
//! ```text
//! header:  header_size u32 | version u32 | max_name_len u32 | width u32 |
//!          density u32 | seed u32 (version >= 2) | method [u8; 64]
//! record:  name [u8; max_name_len + 1] (NUL padded) | meta [i32; 8] |
//!          bits [u8; width / 8]
//! ```

use std::io::{Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use serde::{Deserialize, Serialize};
use signature::{ProjectionMethod, SignatureConfig, SignatureMeta};

use crate::IndexError;

/// Version written by this crate.
pub const FORMAT_VERSION: u32 = 2;
/// Width of the NUL-padded method name field.
pub const METHOD_FIELD_LEN: usize = 64;
const META_INTS: usize = 8;

/// Signature file header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileHeader {
    pub version: u32,
    pub max_name_len: usize,
    pub width: usize,
    pub density: usize,
    /// Always `0` for version 1 files.
    pub seed: u32,
    pub method: ProjectionMethod,
}

impl FileHeader {
    pub fn from_config(cfg: &SignatureConfig) -> Self {
        Self {
            version: FORMAT_VERSION,
            max_name_len: cfg.max_name_len,
            width: cfg.width,
            density: cfg.density,
            seed: cfg.seed,
            method: cfg.method,
        }
    }

    /// Encoded size of a header of `version`.
    pub fn size_for_version(version: u32) -> usize {
        let ints = if version >= 2 { 6 } else { 5 };
        ints * 4 + METHOD_FIELD_LEN
    }

    pub fn header_size(&self) -> usize {
        Self::size_for_version(self.version)
    }

    pub fn layout(&self) -> RecordLayout {
        RecordLayout::new(self.max_name_len, self.width)
    }

    /// The signature settings needed to build queries compatible with this
    /// file. The term cache size is left at its default.
    pub fn signature_config(&self) -> SignatureConfig {
        SignatureConfig::new()
            .with_width(self.width)
            .with_density(self.density)
            .with_method(self.method)
            .with_seed(self.seed)
            .with_max_name_len(self.max_name_len)
    }

    pub fn write_to<W: Write>(&self, w: &mut W) -> Result<(), IndexError> {
        validate_width(self.width)?;
        w.write_u32::<LittleEndian>(self.header_size() as u32)?;
        w.write_u32::<LittleEndian>(self.version)?;
        w.write_u32::<LittleEndian>(to_u32(self.max_name_len, "max_name_len")?)?;
        w.write_u32::<LittleEndian>(to_u32(self.width, "width")?)?;
        w.write_u32::<LittleEndian>(to_u32(self.density, "density")?)?;
        if self.version >= 2 {
            w.write_u32::<LittleEndian>(self.seed)?;
        }
        let mut method = [0u8; METHOD_FIELD_LEN];
        let name = self.method.name().as_bytes();
        method[..name.len()].copy_from_slice(name);
        w.write_all(&method)?;
        Ok(())
    }

    pub fn read_from<R: Read>(r: &mut R) -> Result<Self, IndexError> {
        let header_size = r.read_u32::<LittleEndian>()? as usize;
        let version = r.read_u32::<LittleEndian>()?;
        if !(1..=FORMAT_VERSION).contains(&version) {
            return Err(IndexError::format(format!(
                "unsupported signature file version {version}"
            )));
        }
        if header_size != Self::size_for_version(version) {
            return Err(IndexError::format(format!(
                "header size {header_size} does not match version {version}"
            )));
        }
        let max_name_len = r.read_u32::<LittleEndian>()? as usize;
        let width = r.read_u32::<LittleEndian>()? as usize;
        let density = r.read_u32::<LittleEndian>()? as usize;
        let seed = if version >= 2 {
            r.read_u32::<LittleEndian>()?
        } else {
            0
        };
        let mut method_field = [0u8; METHOD_FIELD_LEN];
        r.read_exact(&mut method_field)?;

        validate_width(width)?;
        if max_name_len == 0 {
            return Err(IndexError::format("max_name_len must be >= 1"));
        }
        let end = method_field
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(METHOD_FIELD_LEN);
        let method = std::str::from_utf8(&method_field[..end])
            .map_err(|_| IndexError::format("method name is not UTF-8"))?
            .parse::<ProjectionMethod>()
            .map_err(|e| IndexError::format(e.to_string()))?;

        Ok(Self {
            version,
            max_name_len,
            width,
            density,
            seed,
            method,
        })
    }
}

fn to_u32(v: usize, what: &str) -> Result<u32, IndexError> {
    u32::try_from(v).map_err(|_| IndexError::format(format!("{what} {v} does not fit in 32 bits")))
}

pub(crate) fn validate_width(width: usize) -> Result<(), IndexError> {
    if width == 0 || width % 16 != 0 {
        return Err(IndexError::format(format!(
            "signature width {width} is not a positive multiple of 16"
        )));
    }
    Ok(())
}

/// Byte layout of fixed-size records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordLayout {
    max_name_len: usize,
    width: usize,
}

impl RecordLayout {
    pub fn new(max_name_len: usize, width: usize) -> Self {
        Self {
            max_name_len,
            width,
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn max_name_len(&self) -> usize {
        self.max_name_len
    }

    #[inline]
    pub fn name_field(&self) -> usize {
        self.max_name_len + 1
    }

    #[inline]
    pub fn meta_offset(&self) -> usize {
        self.name_field()
    }

    #[inline]
    pub fn bits_offset(&self) -> usize {
        self.name_field() + META_INTS * 4
    }

    #[inline]
    pub fn bits_len(&self) -> usize {
        self.width / 8
    }

    #[inline]
    pub fn record_size(&self) -> usize {
        self.bits_offset() + self.bits_len()
    }

    /// Encode one record onto the end of `out`. Names longer than
    /// `max_name_len` bytes are truncated at a character boundary.
    pub fn encode(
        &self,
        name: &str,
        meta: &SignatureMeta,
        bits: &[u8],
        out: &mut Vec<u8>,
    ) -> Result<(), IndexError> {
        if bits.len() != self.bits_len() {
            return Err(IndexError::WidthMismatch {
                expected: self.width,
                actual: bits.len() * 8,
            });
        }
        let mut cut = name.len().min(self.max_name_len);
        while !name.is_char_boundary(cut) {
            cut -= 1;
        }
        let start = out.len();
        out.extend_from_slice(&name.as_bytes()[..cut]);
        out.resize(start + self.name_field(), 0);
        for v in meta.to_array() {
            out.write_i32::<LittleEndian>(v)?;
        }
        out.extend_from_slice(bits);
        Ok(())
    }

    /// View a record held in `bytes`, which must be exactly one record long.
    pub fn view<'a>(&self, bytes: &'a [u8]) -> RecordView<'a> {
        debug_assert_eq!(bytes.len(), self.record_size());
        RecordView {
            bytes,
            layout: *self,
        }
    }
}

/// Borrowed view of one encoded record.
#[derive(Debug, Clone, Copy)]
pub struct RecordView<'a> {
    bytes: &'a [u8],
    layout: RecordLayout,
}

impl<'a> RecordView<'a> {
    /// Raw name bytes up to the first NUL.
    pub fn name_bytes(&self) -> &'a [u8] {
        let field = &self.bytes[..self.layout.name_field()];
        let end = field.iter().position(|&b| b == 0).unwrap_or(field.len());
        &field[..end]
    }

    pub fn name(&self) -> String {
        String::from_utf8_lossy(self.name_bytes()).into_owned()
    }

    pub fn meta(&self) -> SignatureMeta {
        let mut ints = [0i32; META_INTS];
        let raw = &self.bytes[self.layout.meta_offset()..self.layout.bits_offset()];
        for (v, chunk) in ints.iter_mut().zip(raw.chunks_exact(4)) {
            *v = i32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
        }
        SignatureMeta::from_array(ints)
    }

    pub fn quality(&self) -> i32 {
        self.meta().quality
    }

    pub fn bits(&self) -> &'a [u8] {
        &self.bytes[self.layout.bits_offset()..]
    }

    pub fn to_record(&self) -> SignatureRecord {
        SignatureRecord {
            id: self.name(),
            meta: self.meta(),
            bits: self.bits().to_vec(),
        }
    }
}

/// Owned copy of one record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureRecord {
    pub id: String,
    pub meta: SignatureMeta,
    pub bits: Vec<u8>,
}
