use std::fs::File;
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};
use std::time::Instant;

use tracing::{debug, info};
use walkdir::WalkDir;

use crate::config::IngestConfig;
use crate::document::Document;
use crate::error::IngestError;
use crate::readers::ArchiveReader;

const READ_BUFFER: usize = 512 * 1024;

/// Expand configured targets into the list of archive files to read.
///
/// Files are taken as-is; directories contribute their immediate regular
/// files in name order. Subdirectories are not descended into.
pub fn enumerate_targets(targets: &[PathBuf]) -> Result<Vec<PathBuf>, IngestError> {
    let mut files = Vec::new();
    for target in targets {
        let meta = std::fs::metadata(target).map_err(|e| IngestError::io(target, e))?;
        if !meta.is_dir() {
            files.push(target.clone());
            continue;
        }
        for entry in WalkDir::new(target)
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name()
        {
            let entry = entry.map_err(|e| IngestError::io(target, io::Error::from(e)))?;
            if entry.file_type().is_file() {
                files.push(entry.into_path());
            }
        }
    }
    Ok(files)
}

/// Read every configured target with the configured reader.
///
/// Returns the total number of documents delivered to `sink`.
pub fn read_targets<F, E>(cfg: &IngestConfig, mut sink: F) -> Result<usize, E>
where
    F: FnMut(Document) -> Result<(), E>,
    E: From<IngestError>,
{
    cfg.validate()?;
    let start = Instant::now();
    let reader = ArchiveReader::new(cfg);
    let files = enumerate_targets(&cfg.targets)?;
    let mut total = 0;
    for path in &files {
        let n = read_path(&reader, path, &mut sink)?;
        debug!(archive = %path.display(), documents = n, "archive read");
        total += n;
    }
    info!(
        archives = files.len(),
        documents = total,
        format = %cfg.format,
        elapsed_ms = start.elapsed().as_millis() as u64,
        "targets read"
    );
    Ok(total)
}

fn read_path<F, E>(reader: &ArchiveReader<'_>, path: &Path, sink: &mut F) -> Result<usize, E>
where
    F: FnMut(Document) -> Result<(), E>,
    E: From<IngestError>,
{
    let file = File::open(path).map_err(|e| IngestError::io(path, e))?;
    let buffered = BufReader::with_capacity(READ_BUFFER, file);
    let display = path.to_string_lossy();
    reader.read(&display, buffered, |doc| sink(doc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ArchiveFormat, DocIdFormat};
    use std::fs;

    #[test]
    fn directories_are_listed_one_level_in_name_order() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("b.txt"), "bee").unwrap();
        fs::write(dir.path().join("a.txt"), "ay").unwrap();
        fs::create_dir(dir.path().join("nested")).unwrap();
        fs::write(dir.path().join("nested").join("c.txt"), "sea").unwrap();

        let files = enumerate_targets(&[dir.path().to_path_buf()]).unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.txt", "b.txt"]);
    }

    #[test]
    fn missing_target_is_an_io_error() {
        let err = enumerate_targets(&[PathBuf::from("/definitely/not/here")]).unwrap_err();
        assert!(matches!(err, IngestError::Io { .. }));
    }

    #[test]
    fn read_targets_delivers_all_documents() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("one.txt"), "first").unwrap();
        let lines = dir.path().join("more.lines");
        fs::write(&lines, "x\ny\n").unwrap();

        let cfg = IngestConfig::new()
            .with_docid_format(DocIdFormat::Basename)
            .with_target(dir.path().join("one.txt"));
        let mut ids = Vec::new();
        let n = read_targets(&cfg, |d| {
            ids.push(d.id);
            Ok::<(), IngestError>(())
        })
        .unwrap();
        assert_eq!(n, 1);
        assert_eq!(ids, vec!["one"]);

        let cfg = IngestConfig::new()
            .with_format(ArchiveFormat::Newline)
            .with_target(lines);
        let n = read_targets(&cfg, |_| Ok::<(), IngestError>(())).unwrap();
        assert_eq!(n, 2);
    }
}
