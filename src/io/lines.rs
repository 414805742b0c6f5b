//! Lazy line decoding over a (possibly compressed) byte stream.

use crate::error::{PipelineError, Result};
use crate::io::compression::CodecRegistry;
use anyhow::Context;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Read};
use std::path::Path;
use tracing::debug;

/// One decoded line, terminator included when present.
pub type RawLine = String;

/// `true` when `line` is a record separator: nothing but a line terminator.
#[must_use]
pub fn is_sentinel(line: &str) -> bool {
    line == "\n" || line == "\r\n"
}

/// Strip one trailing `\n` or `\r\n`.
#[must_use]
pub fn strip_terminator(line: &str) -> &str {
    line.strip_suffix('\n')
        .map(|l| l.strip_suffix('\r').unwrap_or(l))
        .unwrap_or(line)
}

/// Forward-only iterator of decoded lines.
///
/// Lines whose first byte is NUL are dropped and counted. The first read or
/// decode failure is yielded as [`PipelineError::StreamCorruption`]; after
/// that the source is exhausted.
pub struct LineSource<R> {
    reader: R,
    line_no: u64,
    skipped_null_lines: u64,
    done: bool,
}

impl<R: BufRead> LineSource<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            line_no: 0,
            skipped_null_lines: 0,
            done: false,
        }
    }

    /// Number of NUL-prefixed lines dropped so far.
    #[must_use]
    pub fn skipped_null_lines(&self) -> u64 {
        self.skipped_null_lines
    }

    /// Number of lines read so far, skipped ones included.
    #[must_use]
    pub fn lines_read(&self) -> u64 {
        self.line_no
    }
}

impl<'a> LineSource<BufReader<Box<dyn Read + 'a>>> {
    /// Wrap `reader`, decompressing by the extension of `path_hint` or, when
    /// that says nothing, by magic bytes. Pass an empty hint for anonymous
    /// streams.
    ///
    /// # Errors
    /// [`PipelineError::StreamCorruption`] at line 1 when the stream header
    /// cannot be read or the detected codec rejects it.
    pub fn detect<R: Read + 'a>(reader: R, path_hint: impl AsRef<Path>, codecs: &CodecRegistry) -> Result<Self> {
        let rdr = codecs
            .auto_detect_reader(reader, path_hint)
            .map_err(|e| PipelineError::StreamCorruption {
                line: 1,
                source: io::Error::other(e),
            })?;
        Ok(Self::new(BufReader::new(rdr)))
    }

    /// Open `path`, decompressing by extension or magic bytes.
    pub fn open(path: impl AsRef<Path>, codecs: &CodecRegistry) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let f = File::open(path).with_context(|| format!("open {}", path.display()))?;
        Self::detect(f, path, codecs).with_context(|| format!("setup decompression for {}", path.display()))
    }
}

impl<R: BufRead> Iterator for LineSource<R> {
    type Item = Result<RawLine>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.done {
            let mut line = String::new();
            match self.reader.read_line(&mut line) {
                Ok(0) => self.done = true,
                Ok(_) => {
                    self.line_no += 1;
                    if line.starts_with('\0') {
                        self.skipped_null_lines += 1;
                        debug!(line = self.line_no, "skipping NUL-prefixed line");
                        continue;
                    }
                    return Some(Ok(line));
                }
                Err(source) => {
                    self.done = true;
                    return Some(Err(PipelineError::StreamCorruption {
                        line: self.line_no + 1,
                        source,
                    }));
                }
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(input: &str) -> Vec<String> {
        LineSource::new(input.as_bytes()).map(|l| l.unwrap()).collect()
    }

    #[test]
    fn keeps_terminators() {
        assert_eq!(lines("a: 1\n\nb: 2"), vec!["a: 1\n", "\n", "b: 2"]);
    }

    #[test]
    fn drops_nul_prefixed_lines_and_counts_them() {
        let mut src = LineSource::new("\0\0junk\na: 1\n\0\n".as_bytes());
        assert_eq!(src.next().unwrap().unwrap(), "a: 1\n");
        assert!(src.next().is_none());
        assert_eq!(src.skipped_null_lines(), 2);
        assert_eq!(src.lines_read(), 3);
    }

    #[test]
    fn invalid_utf8_is_stream_corruption_and_fuses() {
        let mut src = LineSource::new(&b"a: 1\n\xff\xfe\nb: 2\n"[..]);
        assert!(src.next().unwrap().is_ok());
        match src.next() {
            Some(Err(PipelineError::StreamCorruption { line, .. })) => assert_eq!(line, 2),
            other => panic!("expected corruption, got {other:?}"),
        }
        assert!(src.next().is_none());
    }

    struct FailAfter<'a>(&'a [u8]);

    impl Read for FailAfter<'_> {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            if self.0.is_empty() {
                return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "truncated"));
            }
            let n = self.0.read(buf)?;
            Ok(n)
        }
    }

    #[test]
    fn read_failure_mid_stream_stops_output() {
        let src = LineSource::new(io::BufReader::new(FailAfter(b"a: 1\nb: 2\n")));
        let items: Vec<_> = src.collect();
        assert_eq!(items.len(), 3);
        assert!(items[0].is_ok() && items[1].is_ok());
        assert!(matches!(items[2], Err(PipelineError::StreamCorruption { line: 3, .. })));
    }

    #[test]
    fn open_uses_the_file_extension() -> anyhow::Result<()> {
        let tmp = tempfile::tempdir()?;
        let path = tmp.path().join("reviews.txt");
        std::fs::write(&path, "a: 1\n\nb: 2\n")?;
        let lines: Vec<String> = LineSource::open(&path, &CodecRegistry::builtin())?.collect::<Result<_>>()?;
        assert_eq!(lines, vec!["a: 1\n", "\n", "b: 2\n"]);
        assert!(LineSource::open(tmp.path().join("missing.txt"), &CodecRegistry::builtin()).is_err());
        Ok(())
    }

    #[cfg(feature = "compression-gzip")]
    #[test]
    fn extension_wins_over_content() {
        // a `.gz` hint forces gzip even though the bytes are plain
        let mut src = LineSource::detect(&b"a: 1\n"[..], "dump.gz", &CodecRegistry::builtin()).unwrap();
        assert!(matches!(src.next(), Some(Err(PipelineError::StreamCorruption { .. }))));
    }

    #[test]
    fn sentinel_and_terminator_helpers() {
        assert!(is_sentinel("\n"));
        assert!(is_sentinel("\r\n"));
        assert!(!is_sentinel(" \n"));
        assert!(!is_sentinel(""));
        assert_eq!(strip_terminator("a: b\r\n"), "a: b");
        assert_eq!(strip_terminator("a: b\n"), "a: b");
        assert_eq!(strip_terminator("a: b"), "a: b");
    }
}
