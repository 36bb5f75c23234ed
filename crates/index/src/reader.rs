use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use log::{debug, info};

use crate::alloc::acquire_buffer;
use crate::format::{FileHeader, RecordLayout, RecordView, SignatureRecord};
use crate::IndexError;

const STREAM_RECORDS: usize = 4096;

/// Read-only handle on a signature file.
///
/// The header is parsed once at open. Record reads open their own file
/// handle, so a `SignatureFile` can be shared by concurrent searches.
#[derive(Debug, Clone)]
pub struct SignatureFile {
    path: PathBuf,
    header: FileHeader,
    layout: RecordLayout,
    len: usize,
}

impl SignatureFile {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, IndexError> {
        let path = path.as_ref().to_path_buf();
        let mut file = File::open(&path)?;
        let file_len = file.metadata()?.len();
        let header = FileHeader::read_from(&mut BufReader::new(&mut file))
            .map_err(|e| e.in_file(&path))?;
        let layout = header.layout();

        let body = file_len.saturating_sub(header.header_size() as u64);
        let record_size = layout.record_size() as u64;
        if body % record_size != 0 {
            return Err(IndexError::Truncated(format!(
                "{}: {} trailing bytes after the last whole record",
                path.display(),
                body % record_size
            )));
        }
        let len = (body / record_size) as usize;
        info!(
            "signature file opened: {} ({} records, width {})",
            path.display(),
            len,
            header.width
        );
        Ok(Self {
            path,
            header,
            layout,
            len,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn header(&self) -> &FileHeader {
        &self.header
    }

    pub fn layout(&self) -> RecordLayout {
        self.layout
    }

    pub fn width(&self) -> usize {
        self.header.width
    }

    /// Number of records in the file.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Fail unless the file was written with `width`-bit signatures.
    pub fn check_width(&self, width: usize) -> Result<(), IndexError> {
        if self.header.width != width {
            return Err(IndexError::WidthMismatch {
                expected: width,
                actual: self.header.width,
            });
        }
        Ok(())
    }

    fn offset_of(&self, index: usize) -> u64 {
        self.header.header_size() as u64 + index as u64 * self.layout.record_size() as u64
    }

    fn open_at(&self, index: usize) -> Result<File, IndexError> {
        let mut file = File::open(&self.path)?;
        file.seek(SeekFrom::Start(self.offset_of(index)))?;
        Ok(file)
    }

    /// Read record `index`.
    pub fn read_record(&self, index: usize) -> Result<SignatureRecord, IndexError> {
        if index >= self.len {
            return Err(IndexError::OutOfRange {
                index,
                len: self.len,
            });
        }
        let mut buf = vec![0u8; self.layout.record_size()];
        self.open_at(index)?.read_exact(&mut buf)?;
        Ok(self.layout.view(&buf).to_record())
    }

    /// Read up to `count` records starting at `first` into one buffer.
    ///
    /// The buffer is acquired through [`acquire_buffer`], so a page that
    /// cannot be allocated after `alloc_retries` attempts fails with
    /// [`IndexError::ResourceExhausted`].
    pub fn read_page(
        &self,
        first: usize,
        count: usize,
        alloc_retries: u32,
    ) -> Result<RecordPage, IndexError> {
        let first = first.min(self.len);
        let count = count.min(self.len - first);
        let mut data = acquire_buffer(count * self.layout.record_size(), 0u8, alloc_retries)?;
        if count > 0 {
            self.open_at(first)?.read_exact(&mut data)?;
        }
        debug!("read page: records {}..{}", first, first + count);
        Ok(RecordPage {
            layout: self.layout,
            first,
            data,
        })
    }

    /// Stream every record in file order.
    pub fn for_each_record<F, E>(&self, mut f: F) -> Result<(), E>
    where
        F: FnMut(usize, RecordView<'_>) -> Result<(), E>,
        E: From<IndexError>,
    {
        let size = self.layout.record_size();
        let mut file = self.open_at(0)?;
        let mut buf = vec![0u8; size * STREAM_RECORDS];
        let mut index = 0;
        while index < self.len {
            let n = STREAM_RECORDS.min(self.len - index);
            file.read_exact(&mut buf[..n * size])
                .map_err(IndexError::from)?;
            for chunk in buf[..n * size].chunks_exact(size) {
                f(index, self.layout.view(chunk))?;
                index += 1;
            }
        }
        Ok(())
    }

    /// Index of the first record named `docid`.
    pub fn find(&self, docid: &str) -> Result<Option<usize>, IndexError> {
        let mut found = None;
        let target = docid.as_bytes();
        // Early exit is signalled through the error channel.
        let outcome = self.for_each_record(|i, rec| {
            if rec.name_bytes() == target {
                found = Some(i);
                return Err(FindStop::Found);
            }
            Ok(())
        });
        match outcome {
            Ok(()) | Err(FindStop::Found) => Ok(found),
            Err(FindStop::Failed(e)) => Err(e),
        }
    }
}

enum FindStop {
    Found,
    Failed(IndexError),
}

impl From<IndexError> for FindStop {
    fn from(e: IndexError) -> Self {
        FindStop::Failed(e)
    }
}

/// A contiguous run of records held in memory.
#[derive(Debug, Clone)]
pub struct RecordPage {
    layout: RecordLayout,
    first: usize,
    data: Vec<u8>,
}

impl RecordPage {
    /// File index of the first record in the page.
    pub fn first(&self) -> usize {
        self.first
    }

    pub fn len(&self) -> usize {
        self.data.len() / self.layout.record_size()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Record `i` of the page (not of the file).
    pub fn record(&self, i: usize) -> RecordView<'_> {
        let size = self.layout.record_size();
        self.layout.view(&self.data[i * size..(i + 1) * size])
    }

    pub fn iter(&self) -> impl Iterator<Item = RecordView<'_>> {
        self.data
            .chunks_exact(self.layout.record_size())
            .map(move |chunk| self.layout.view(chunk))
    }

    /// Size of the page buffer in bytes.
    pub fn byte_len(&self) -> usize {
        self.data.len()
    }
}
