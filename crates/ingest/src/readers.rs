//! Streaming archive readers.
//!
//! Each reader pulls from a [`BufRead`] and hands complete documents to a
//! caller-supplied sink. The sink's error type wins, so a pipeline can stop
//! reading the moment it fails.

use std::io::{BufRead, Read};

use tracing::{debug, warn};

use crate::config::{ArchiveFormat, IngestConfig};
use crate::document::{document_id, xml_element, Document};
use crate::error::IngestError;

const TAR_BLOCK: usize = 512;

const WARC_KNOWN_TYPES: &[&str] = &[
    "warcinfo",
    "response",
    "resource",
    "request",
    "metadata",
    "revisit",
    "conversion",
    "continuation",
];

/// Reads every document from one archive.
#[derive(Debug, Clone, Copy)]
pub struct ArchiveReader<'a> {
    cfg: &'a IngestConfig,
}

impl<'a> ArchiveReader<'a> {
    pub fn new(cfg: &'a IngestConfig) -> Self {
        Self { cfg }
    }

    /// Read `reader`, which holds the archive found at `path`, and pass each
    /// document to `sink`. Returns the number of documents delivered.
    pub fn read<R, F, E>(&self, path: &str, reader: R, sink: F) -> Result<usize, E>
    where
        R: BufRead,
        F: FnMut(Document) -> Result<(), E>,
        E: From<IngestError>,
    {
        match self.cfg.format {
            ArchiveFormat::File => self.read_file(path, reader, sink),
            ArchiveFormat::Tar => self.read_tar(path, reader, sink),
            ArchiveFormat::Warc => read_warc(path, reader, sink),
            ArchiveFormat::Wsj => read_wsj(path, reader, sink),
            ArchiveFormat::Newline => read_newline(path, reader, sink),
            ArchiveFormat::CustomCrawl => read_custom_crawl(path, reader, sink),
        }
    }

    fn doc_id(&self, path: &str, text: &str) -> String {
        document_id(
            self.cfg.docid_format,
            path,
            text,
            self.cfg.xml_docid_field.as_deref(),
        )
    }

    fn read_file<R, F, E>(&self, path: &str, mut reader: R, mut sink: F) -> Result<usize, E>
    where
        R: BufRead,
        F: FnMut(Document) -> Result<(), E>,
        E: From<IngestError>,
    {
        let mut bytes = Vec::new();
        reader
            .read_to_end(&mut bytes)
            .map_err(|e| IngestError::io(path, e))?;
        let mut doc = Document::from_bytes(String::new(), &bytes);
        doc.id = self.doc_id(path, &doc.text);
        sink(doc)?;
        Ok(1)
    }

    fn read_tar<R, F, E>(&self, path: &str, mut reader: R, mut sink: F) -> Result<usize, E>
    where
        R: BufRead,
        F: FnMut(Document) -> Result<(), E>,
        E: From<IngestError>,
    {
        let mut delivered = 0;
        let mut header = [0u8; TAR_BLOCK];
        loop {
            let n = read_full(&mut reader, &mut header).map_err(|e| IngestError::io(path, e))?;
            if n == 0 || header.iter().all(|&b| b == 0) {
                break;
            }
            if n < TAR_BLOCK {
                return Err(IngestError::format("tar", "truncated entry header").into());
            }

            let name = tar_entry_name(&header);
            let size = parse_octal(&header[124..136])
                .ok_or_else(|| IngestError::format("tar", format!("bad size field for {name}")))?;
            let padding = size.div_ceil(TAR_BLOCK) * TAR_BLOCK - size;
            let truncated = || IngestError::format("tar", format!("entry {name} truncated"));
            let data = read_exactly(&mut reader, size)
                .map_err(|e| IngestError::io(path, e))?
                .ok_or_else(truncated)?;
            read_exactly(&mut reader, padding)
                .map_err(|e| IngestError::io(path, e))?
                .ok_or_else(truncated)?;

            let typeflag = header[156];
            if typeflag != b'0' && typeflag != 0 {
                debug!(entry = %name, typeflag, "skipping non-file tar entry");
                continue;
            }

            let mut doc = Document::from_bytes(String::new(), &data);
            doc.id = self.doc_id(&name, &doc.text);
            if doc.id == "NULL" {
                continue;
            }
            sink(doc)?;
            delivered += 1;
        }
        Ok(delivered)
    }
}

/// Exactly `len` bytes, or `None` if the input ends first. The buffer grows
/// with the data read, so a corrupt length field cannot force a huge
/// allocation up front.
fn read_exactly<R: Read>(reader: &mut R, len: usize) -> std::io::Result<Option<Vec<u8>>> {
    let mut buf = Vec::new();
    reader.by_ref().take(len as u64).read_to_end(&mut buf)?;
    Ok((buf.len() == len).then_some(buf))
}

fn read_full<R: Read>(reader: &mut R, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

fn cstr(bytes: &[u8]) -> String {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end]).into_owned()
}

fn tar_entry_name(header: &[u8; TAR_BLOCK]) -> String {
    let name = cstr(&header[0..100]);
    if &header[257..262] == b"ustar" {
        let prefix = cstr(&header[345..500]);
        if !prefix.is_empty() {
            return format!("{prefix}/{name}");
        }
    }
    name
}

fn parse_octal(field: &[u8]) -> Option<usize> {
    let text = cstr(field);
    let digits = text.trim_matches(|c: char| c == ' ' || c == '\0');
    if digits.is_empty() {
        return Some(0);
    }
    usize::from_str_radix(digits, 8).ok()
}

/// Read one line as lossy UTF-8, including its terminator. `None` at EOF.
fn next_line<R: BufRead>(reader: &mut R, path: &str, buf: &mut Vec<u8>) -> Result<Option<String>, IngestError> {
    buf.clear();
    let n = reader
        .read_until(b'\n', buf)
        .map_err(|e| IngestError::io(path, e))?;
    if n == 0 {
        return Ok(None);
    }
    Ok(Some(String::from_utf8_lossy(buf).into_owned()))
}

fn read_warc<R, F, E>(path: &str, mut reader: R, mut sink: F) -> Result<usize, E>
where
    R: BufRead,
    F: FnMut(Document) -> Result<(), E>,
    E: From<IngestError>,
{
    let mut delivered = 0;
    let mut line_buf = Vec::new();
    loop {
        let mut header: Vec<String> = Vec::new();
        while let Some(line) = next_line(&mut reader, path, &mut line_buf)? {
            let line = line.trim_end_matches(['\r', '\n']).to_string();
            if line.is_empty() {
                if header.is_empty() {
                    continue;
                }
                break;
            }
            header.push(line);
        }
        if header.is_empty() {
            break;
        }

        let field = |name: &str| warc_field(&header, name);
        let warc_type = field("WARC-Type")
            .ok_or_else(|| IngestError::format("warc", "record without WARC-Type"))?
            .to_ascii_lowercase();
        let length: usize = field("Content-Length")
            .and_then(|v| v.parse().ok())
            .ok_or_else(|| IngestError::format("warc", "record without a valid Content-Length"))?;
        let id = field("WARC-TREC-ID")
            .or_else(|| field("WARC-Record-ID"))
            .unwrap_or_default()
            .to_string();

        let body = read_exactly(&mut reader, length)
            .map_err(|e| IngestError::io(path, e))?
            .ok_or_else(|| IngestError::format("warc", format!("record {id} truncated")))?;

        if warc_type == "response" {
            sink(Document::from_bytes(id, &body))?;
            delivered += 1;
        } else if WARC_KNOWN_TYPES.contains(&warc_type.as_str()) {
            debug!(record_type = %warc_type, "skipping warc record");
        } else {
            warn!(record_type = %warc_type, archive = %path, "skipping unknown warc record type");
        }
    }
    Ok(delivered)
}

fn warc_field<'h>(header: &'h [String], name: &str) -> Option<&'h str> {
    header.iter().find_map(|l| {
        let (key, value) = l.split_once(':')?;
        key.trim().eq_ignore_ascii_case(name).then(|| value.trim())
    })
}

fn read_wsj<R, F, E>(path: &str, mut reader: R, mut sink: F) -> Result<usize, E>
where
    R: BufRead,
    F: FnMut(Document) -> Result<(), E>,
    E: From<IngestError>,
{
    let mut delivered = 0;
    let mut line_buf = Vec::new();
    let mut pending = String::new();
    let mut in_doc = false;

    while let Some(line) = next_line(&mut reader, path, &mut line_buf)? {
        pending.push_str(&line);
        loop {
            if !in_doc {
                match pending.find("<DOC>") {
                    Some(start) => {
                        pending.replace_range(..start, "");
                        in_doc = true;
                    }
                    None => {
                        pending.clear();
                        break;
                    }
                }
            }
            let Some(close) = pending.find("</DOC>") else {
                break;
            };
            let end = close + "</DOC>".len();
            let text: String = pending.drain(..end).collect();
            in_doc = false;
            let id = xml_element(&text, "DOCNO")
                .ok_or_else(|| IngestError::format("wsj", "<DOC> without <DOCNO>"))?
                .to_string();
            sink(Document::new(id, text))?;
            delivered += 1;
        }
    }
    if in_doc {
        return Err(IngestError::format("wsj", "unterminated <DOC> at end of archive").into());
    }
    Ok(delivered)
}

fn read_newline<R, F, E>(path: &str, mut reader: R, mut sink: F) -> Result<usize, E>
where
    R: BufRead,
    F: FnMut(Document) -> Result<(), E>,
    E: From<IngestError>,
{
    let mut delivered = 0;
    let mut line_buf = Vec::new();
    while let Some(line) = next_line(&mut reader, path, &mut line_buf)? {
        let text = line.trim_end_matches(['\r', '\n']);
        if text.trim().is_empty() {
            continue;
        }
        delivered += 1;
        sink(Document::new(format!("{delivered:04}"), text))?;
    }
    Ok(delivered)
}

fn read_custom_crawl<R, F, E>(path: &str, mut reader: R, mut sink: F) -> Result<usize, E>
where
    R: BufRead,
    F: FnMut(Document) -> Result<(), E>,
    E: From<IngestError>,
{
    let mut delivered = 0;
    let mut line_buf = Vec::new();
    let mut id: Option<String> = None;
    let mut content: Option<String> = None;

    while let Some(line) = next_line(&mut reader, path, &mut line_buf)? {
        if let Some(rest) = line.strip_prefix("#UID:") {
            id = Some(rest.trim().to_string());
            content = None;
        } else if let Some(rest) = line.strip_prefix("#CONTENT:") {
            content = Some(rest.to_string());
        } else if line.starts_with("#EOR") {
            let (Some(doc_id), Some(mut text)) = (id.take(), content.take()) else {
                return Err(
                    IngestError::format("customcrawl", "#EOR without #UID and #CONTENT").into(),
                );
            };
            if text.ends_with('\n') {
                text.pop();
                if text.ends_with('\r') {
                    text.pop();
                }
            }
            sink(Document::new(doc_id, text))?;
            delivered += 1;
        } else if let Some(text) = content.as_mut() {
            text.push_str(&line);
        }
    }
    Ok(delivered)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DocIdFormat;

    fn collect(cfg: &IngestConfig, path: &str, data: &[u8]) -> Result<Vec<Document>, IngestError> {
        let mut docs = Vec::new();
        ArchiveReader::new(cfg).read(path, data, |d| {
            docs.push(d);
            Ok::<(), IngestError>(())
        })?;
        Ok(docs)
    }

    fn tar_entry(name: &str, body: &[u8], typeflag: u8) -> Vec<u8> {
        let mut header = [0u8; TAR_BLOCK];
        header[..name.len()].copy_from_slice(name.as_bytes());
        let size = format!("{:011o}\0", body.len());
        header[124..136].copy_from_slice(size.as_bytes());
        header[156] = typeflag;
        let mut out = header.to_vec();
        out.extend_from_slice(body);
        out.resize(out.len().div_ceil(TAR_BLOCK) * TAR_BLOCK, 0);
        out
    }

    #[test]
    fn file_reader_uses_docid_format() {
        let cfg = IngestConfig::new().with_docid_format(DocIdFormat::Basename);
        let docs = collect(&cfg, "dir/doc-7.txt", b"hello world").unwrap();
        assert_eq!(docs, vec![Document::new("doc-7", "hello world")]);
    }

    #[test]
    fn tar_reader_reads_regular_entries() {
        let cfg = IngestConfig::new()
            .with_format(ArchiveFormat::Tar)
            .with_docid_format(DocIdFormat::BasenameExt);
        let mut data = tar_entry("a/one.txt", b"first body", b'0');
        data.extend(tar_entry("a/", b"", b'5'));
        data.extend(tar_entry("NULL", b"ignored", b'0'));
        data.extend(tar_entry("a/two.txt", &[b'x'; 700], b'0'));
        data.extend([0u8; TAR_BLOCK * 2]);

        let docs = collect(&cfg, "c.tar", &data).unwrap();
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].id, "one.txt");
        assert_eq!(docs[0].text, "first body");
        assert_eq!(docs[1].id, "two.txt");
        assert_eq!(docs[1].len(), 700);
    }

    #[test]
    fn tar_reader_rejects_truncated_entry() {
        let cfg = IngestConfig::new().with_format(ArchiveFormat::Tar);
        let mut data = tar_entry("x.txt", &[b'y'; 100], b'0');
        data.truncate(TAR_BLOCK + 50);
        assert!(matches!(
            collect(&cfg, "c.tar", &data),
            Err(IngestError::Format { format: "tar", .. })
        ));
    }

    #[test]
    fn warc_reader_keeps_only_responses() {
        let cfg = IngestConfig::new().with_format(ArchiveFormat::Warc);
        let body = "HTTP/1.1 200 OK\r\n\r\n<html>page text</html>";
        let data = format!(
            "WARC/1.0\r\nWARC-Type: warcinfo\r\nContent-Length: 4\r\n\r\ninfo\r\n\r\n\
             WARC/1.0\r\nWARC-Type: response\r\nWARC-TREC-ID: clueweb-00\r\nContent-Length: {}\r\n\r\n{}\r\n\r\n",
            body.len(),
            body
        );
        let docs = collect(&cfg, "a.warc", data.as_bytes()).unwrap();
        assert_eq!(docs, vec![Document::new("clueweb-00", body)]);
    }

    #[test]
    fn tar_size_past_end_of_input_is_truncation() {
        let cfg = IngestConfig::new().with_format(ArchiveFormat::Tar);
        let mut data = tar_entry("huge.txt", b"", b'0');
        data[124..136].copy_from_slice(b"77777777777\0");
        data.extend_from_slice(b"only a few bytes");
        let err = collect(&cfg, "c.tar", &data).unwrap_err();
        assert!(matches!(err, IngestError::Format { format: "tar", .. }), "{err:?}");
    }

    #[test]
    fn warc_length_past_end_of_input_is_truncation() {
        let cfg = IngestConfig::new().with_format(ArchiveFormat::Warc);
        let data = b"WARC/1.0\r\nWARC-Type: response\r\nWARC-TREC-ID: big-00\r\n\
                     Content-Length: 99999999999999\r\n\r\nshort body";
        let err = collect(&cfg, "a.warc", data).unwrap_err();
        assert!(matches!(err, IngestError::Format { format: "warc", .. }), "{err:?}");
    }

    #[test]
    fn warc_reader_requires_content_length() {
        let cfg = IngestConfig::new().with_format(ArchiveFormat::Warc);
        let data = b"WARC/1.0\nWARC-Type: response\n\nbody";
        assert!(collect(&cfg, "a.warc", data).is_err());
    }

    #[test]
    fn wsj_reader_splits_doc_blocks() {
        let cfg = IngestConfig::new().with_format(ArchiveFormat::Wsj);
        let data = "<DOC>\n<DOCNO> WSJ-1 </DOCNO>\n<TEXT>alpha</TEXT>\n</DOC>\n\
                    <DOC><DOCNO>WSJ-2</DOCNO>beta</DOC>\n";
        let docs = collect(&cfg, "wsj", data.as_bytes()).unwrap();
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].id, "WSJ-1");
        assert!(docs[0].text.starts_with("<DOC>"));
        assert!(docs[0].text.ends_with("</DOC>"));
        assert_eq!(docs[1].id, "WSJ-2");
        assert_eq!(docs[1].text, "<DOC><DOCNO>WSJ-2</DOCNO>beta</DOC>");
    }

    #[test]
    fn wsj_reader_rejects_unterminated_doc() {
        let cfg = IngestConfig::new().with_format(ArchiveFormat::Wsj);
        assert!(collect(&cfg, "wsj", b"<DOC><DOCNO>X</DOCNO> text").is_err());
    }

    #[test]
    fn newline_reader_numbers_lines() {
        let cfg = IngestConfig::new().with_format(ArchiveFormat::Newline);
        let docs = collect(&cfg, "lines", b"first doc\n\nsecond doc\r\nthird").unwrap();
        let ids: Vec<&str> = docs.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["0001", "0002", "0003"]);
        assert_eq!(docs[1].text, "second doc");
    }

    #[test]
    fn custom_crawl_reader_parses_records() {
        let cfg = IngestConfig::new().with_format(ArchiveFormat::CustomCrawl);
        let data = "#UID:page-1\n#DATE:2012\n#CONTENT:line one\nline two\n#EOR\n\
                    #UID:page-2\n#CONTENT:solo\n#EOR\n";
        let docs = collect(&cfg, "crawl", data.as_bytes()).unwrap();
        assert_eq!(
            docs,
            vec![
                Document::new("page-1", "line one\nline two"),
                Document::new("page-2", "solo"),
            ]
        );
    }

    #[test]
    fn sink_error_stops_reading() {
        let cfg = IngestConfig::new().with_format(ArchiveFormat::Newline);
        let mut seen = 0;
        let res = ArchiveReader::new(&cfg).read("lines", &b"a\nb\nc\n"[..], |_| {
            seen += 1;
            if seen == 2 {
                Err(IngestError::InvalidConfig("stop".into()))
            } else {
                Ok(())
            }
        });
        assert!(res.is_err());
        assert_eq!(seen, 2);
    }
}
