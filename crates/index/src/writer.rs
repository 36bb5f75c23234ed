use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use log::debug;
use signature::{Signature, SignatureConfig, SignatureMeta};

use crate::format::{FileHeader, RecordLayout};
use crate::IndexError;

/// Appends fixed-size records behind a signature file header.
///
/// Records are written in the order `append` is called. Call [`finish`]
/// to flush; dropping the writer loses whatever is still buffered.
///
/// [`finish`]: SignatureFileWriter::finish
pub struct SignatureFileWriter<W: Write> {
    out: W,
    header: FileHeader,
    layout: RecordLayout,
    scratch: Vec<u8>,
    written: usize,
}

impl SignatureFileWriter<BufWriter<File>> {
    /// Create (or truncate) `path` and write the header for `cfg`.
    pub fn create(path: impl AsRef<Path>, cfg: &SignatureConfig) -> Result<Self, IndexError> {
        let file = File::create(path.as_ref())?;
        debug!("writing signature file {}", path.as_ref().display());
        Self::from_writer(BufWriter::with_capacity(1 << 20, file), cfg)
    }
}

impl<W: Write> SignatureFileWriter<W> {
    pub fn from_writer(mut out: W, cfg: &SignatureConfig) -> Result<Self, IndexError> {
        cfg.validate()?;
        let header = FileHeader::from_config(cfg);
        header.write_to(&mut out)?;
        let layout = header.layout();
        Ok(Self {
            out,
            scratch: Vec::with_capacity(layout.record_size()),
            header,
            layout,
            written: 0,
        })
    }

    pub fn header(&self) -> &FileHeader {
        &self.header
    }

    /// Number of records appended so far.
    pub fn len(&self) -> usize {
        self.written
    }

    pub fn is_empty(&self) -> bool {
        self.written == 0
    }

    /// Flatten `sig` and append it.
    pub fn append(&mut self, sig: &Signature) -> Result<(), IndexError> {
        if sig.width() != self.layout.width() {
            return Err(IndexError::WidthMismatch {
                expected: self.layout.width(),
                actual: sig.width(),
            });
        }
        let flat = sig.finalize();
        self.append_record(sig.id(), &sig.meta, &flat.bits)
    }

    /// Append an already flattened record.
    pub fn append_record(
        &mut self,
        id: &str,
        meta: &SignatureMeta,
        bits: &[u8],
    ) -> Result<(), IndexError> {
        self.scratch.clear();
        self.layout.encode(id, meta, bits, &mut self.scratch)?;
        self.out.write_all(&self.scratch)?;
        self.written += 1;
        Ok(())
    }

    /// Flush and return the underlying writer.
    pub fn finish(mut self) -> Result<W, IndexError> {
        self.out.flush()?;
        debug!("signature file complete: {} records", self.written);
        Ok(self.out)
    }
}
