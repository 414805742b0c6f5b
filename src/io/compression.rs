//! Pluggable compression for the input stream and the batch artifacts.
//!
//! Codecs implement [`CompressionCodec`] and are collected in a
//! [`CodecRegistry`]. The registry is an ordinary value owned by whoever runs
//! the conversion, so two runs never share codec state.
//!
//! ## Built-in Codecs
//!
//! When enabled via feature flags, the following codecs are available:
//! - **Gzip** (`.gz`) - via `flate2` crate (feature: `compression-gzip`)
//! - **Zstd** (`.zst`) - via `zstd` crate (feature: `compression-zstd`)
//! - **Bzip2** (`.bz2`) - via `bzip2` crate (feature: `compression-bzip2`)
//! - **Xz** (`.xz`) - via `xz2` crate (feature: `compression-xz`)
//!
//! ## Detection
//! Readers are matched by file extension first and by magic bytes second; a
//! stream that matches neither is passed through untouched. Magic detection
//! reads ahead up to [`MAGIC_PEEK_LEN`] bytes however the underlying reader
//! fragments them, then replays those bytes in front of the rest. Writers are
//! picked explicitly by codec name, because the artifact name is derived from
//! the codec and not the other way round.
//!
//! ## Finishing writers
//! Compressed formats end with a trailer. Dropping an encoder writes it but
//! swallows any error, so every writer handed out here is a [`FinishWrite`]
//! whose `finish` reports trailer and flush failures.
//!
//! ```
//! use kvbatch::io::compression::CodecRegistry;
//! use std::io::{Read, Write};
//! # fn main() -> anyhow::Result<()> {
//! let registry = CodecRegistry::builtin();
//! let mut out = Vec::new();
//! {
//!     let codec = registry.by_name("gzip");
//!     let mut w = kvbatch::io::compression::wrap_writer(codec.as_deref(), &mut out)?;
//!     w.write_all(b"beer/name: Sausa Weizen\n")?;
//!     w.finish()?;
//! }
//! let mut text = String::new();
//! registry.auto_detect_reader(out.as_slice(), "")?.read_to_string(&mut text)?;
//! assert_eq!(text, "beer/name: Sausa Weizen\n");
//! # Ok(())
//! # }
//! ```

use anyhow::{Context, Result};
use std::io::{self, BufWriter, Cursor, Read, Write};
use std::path::Path;
use std::sync::Arc;

/// Bytes read ahead from a stream for magic-byte detection.
pub const MAGIC_PEEK_LEN: usize = 16;

/// A writer that must be explicitly finished to produce a complete stream.
pub trait FinishWrite: Write {
    /// Write any trailer, flush, and release the underlying writer.
    fn finish(self: Box<Self>) -> io::Result<()>;
}

impl<W: Write> FinishWrite for BufWriter<W> {
    fn finish(mut self: Box<Self>) -> io::Result<()> {
        self.flush()
    }
}

/// Pluggable compression codec trait.
///
/// Implement this trait to read or write formats beyond the built-in ones.
/// Codecs are detected via file extensions (fast path) or magic bytes (fallback).
pub trait CompressionCodec: Send + Sync {
    /// Human-readable codec name (e.g., "gzip", "zstd").
    fn name(&self) -> &str;

    /// File extensions associated with this codec (e.g., `&[".gz", ".gzip"]`).
    ///
    /// Extensions include the leading dot and are lowercase. The first one is
    /// used when naming artifacts.
    fn extensions(&self) -> &[&str];

    /// Optional magic byte signature for content-based detection.
    fn magic_bytes(&self) -> Option<&[u8]>;

    /// Whether `prefix`, the first bytes of a stream, opens this format.
    ///
    /// `prefix` is shorter than [`MAGIC_PEEK_LEN`] only when the whole stream
    /// is. The default compares against [`CompressionCodec::magic_bytes`].
    fn matches_magic(&self, prefix: &[u8]) -> bool {
        self.magic_bytes().is_some_and(|magic| prefix.starts_with(magic))
    }

    /// Wrap a reader with decompression.
    fn wrap_reader_dyn<'a>(&self, reader: Box<dyn Read + 'a>) -> io::Result<Box<dyn Read + 'a>>;

    /// Wrap a writer with compression.
    fn wrap_writer_dyn<'a>(
        &self,
        writer: Box<dyn Write + 'a>,
    ) -> io::Result<Box<dyn FinishWrite + 'a>>;
}

/// An ordered set of codecs consulted for detection and lookup.
#[derive(Clone)]
pub struct CodecRegistry {
    codecs: Vec<Arc<dyn CompressionCodec>>,
}

impl Default for CodecRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

impl CodecRegistry {
    /// A registry holding every codec enabled at compile time.
    #[must_use]
    pub fn builtin() -> Self {
        Self {
            codecs: vec![
                #[cfg(feature = "compression-gzip")]
                Arc::new(GzipCodec),
                #[cfg(feature = "compression-zstd")]
                Arc::new(ZstdCodec),
                #[cfg(feature = "compression-bzip2")]
                Arc::new(Bzip2Codec),
                #[cfg(feature = "compression-xz")]
                Arc::new(XzCodec),
            ],
        }
    }

    /// A registry with no codecs; every stream is treated as plain text.
    #[must_use]
    pub fn empty() -> Self {
        Self { codecs: Vec::new() }
    }

    /// Add a codec. Later registrations are consulted after earlier ones.
    pub fn register(&mut self, codec: Arc<dyn CompressionCodec>) {
        self.codecs.push(codec);
    }

    /// Look up a codec by its name, case-insensitively.
    #[must_use]
    pub fn by_name(&self, name: &str) -> Option<Arc<dyn CompressionCodec>> {
        self.codecs
            .iter()
            .find(|c| c.name().eq_ignore_ascii_case(name))
            .cloned()
    }

    /// Names of the registered codecs, in lookup order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.codecs.iter().map(|c| c.name())
    }

    /// Detect a codec from a file path extension.
    ///
    /// Matching is case-insensitive and handles stacked extensions (`.csv.gz`).
    #[must_use]
    pub fn detect_from_extension(&self, path: impl AsRef<Path>) -> Option<Arc<dyn CompressionCodec>> {
        let path_str = path.as_ref().to_string_lossy().to_lowercase();
        self.codecs
            .iter()
            .find(|codec| codec.extensions().iter().any(|ext| path_str.ends_with(ext)))
            .cloned()
    }

    /// Detect a codec from the first bytes of a stream.
    #[must_use]
    pub fn detect_from_magic(&self, prefix: &[u8]) -> Option<Arc<dyn CompressionCodec>> {
        if prefix.is_empty() {
            return None;
        }
        self.codecs.iter().find(|codec| codec.matches_magic(prefix)).cloned()
    }

    /// Wrap a reader with decompression if its path or content calls for it.
    ///
    /// Pass an empty `path_hint` to rely on magic bytes alone.
    pub fn auto_detect_reader<'a, R: Read + 'a>(
        &self,
        mut reader: R,
        path_hint: impl AsRef<Path>,
    ) -> Result<Box<dyn Read + 'a>> {
        if let Some(codec) = self.detect_from_extension(&path_hint) {
            return codec
                .wrap_reader_dyn(Box::new(reader))
                .with_context(|| format!("wrap reader with {} codec", codec.name()));
        }

        let mut prefix = Vec::with_capacity(MAGIC_PEEK_LEN);
        reader
            .by_ref()
            .take(MAGIC_PEEK_LEN as u64)
            .read_to_end(&mut prefix)
            .context("read stream header")?;
        let codec = self.detect_from_magic(&prefix);
        let stream: Box<dyn Read + 'a> = Box::new(Cursor::new(prefix).chain(reader));
        match codec {
            Some(codec) => codec
                .wrap_reader_dyn(stream)
                .with_context(|| format!("wrap reader with {} codec", codec.name())),
            None => Ok(stream),
        }
    }
}

/// Wrap `writer` with `codec`, or with a plain buffer when `codec` is `None`.
pub fn wrap_writer<'a, W: Write + 'a>(
    codec: Option<&dyn CompressionCodec>,
    writer: W,
) -> io::Result<Box<dyn FinishWrite + 'a>> {
    match codec {
        Some(codec) => codec.wrap_writer_dyn(Box::new(writer)),
        None => Ok(Box::new(BufWriter::new(writer))),
    }
}

// ============================================================================
// Built-in Codec Implementations
// ============================================================================

#[cfg(feature = "compression-gzip")]
struct GzipCodec;

#[cfg(feature = "compression-gzip")]
impl<W: Write> FinishWrite for flate2::write::GzEncoder<W> {
    fn finish(self: Box<Self>) -> io::Result<()> {
        flate2::write::GzEncoder::finish(*self)?.flush()
    }
}

#[cfg(feature = "compression-gzip")]
impl CompressionCodec for GzipCodec {
    fn name(&self) -> &str {
        "gzip"
    }

    fn extensions(&self) -> &[&str] {
        &[".gz", ".gzip"]
    }

    fn magic_bytes(&self) -> Option<&[u8]> {
        Some(&[0x1f, 0x8b])
    }

    fn wrap_reader_dyn<'a>(&self, reader: Box<dyn Read + 'a>) -> io::Result<Box<dyn Read + 'a>> {
        // Large exports are often concatenated gzip members.
        Ok(Box::new(flate2::read::MultiGzDecoder::new(reader)))
    }

    fn wrap_writer_dyn<'a>(
        &self,
        writer: Box<dyn Write + 'a>,
    ) -> io::Result<Box<dyn FinishWrite + 'a>> {
        use flate2::Compression;
        use flate2::write::GzEncoder;
        Ok(Box::new(GzEncoder::new(writer, Compression::default())))
    }
}

#[cfg(feature = "compression-zstd")]
struct ZstdCodec;

#[cfg(feature = "compression-zstd")]
impl<W: Write> FinishWrite for zstd::stream::write::Encoder<'static, W> {
    fn finish(self: Box<Self>) -> io::Result<()> {
        zstd::stream::write::Encoder::finish(*self)?.flush()
    }
}

#[cfg(feature = "compression-zstd")]
impl CompressionCodec for ZstdCodec {
    fn name(&self) -> &str {
        "zstd"
    }

    fn extensions(&self) -> &[&str] {
        &[".zst", ".zstd"]
    }

    fn magic_bytes(&self) -> Option<&[u8]> {
        Some(&[0x28, 0xb5, 0x2f, 0xfd])
    }

    fn wrap_reader_dyn<'a>(&self, reader: Box<dyn Read + 'a>) -> io::Result<Box<dyn Read + 'a>> {
        zstd::stream::read::Decoder::new(reader).map(|d| Box::new(d) as Box<dyn Read + 'a>)
    }

    fn wrap_writer_dyn<'a>(
        &self,
        writer: Box<dyn Write + 'a>,
    ) -> io::Result<Box<dyn FinishWrite + 'a>> {
        zstd::stream::write::Encoder::new(writer, 3)
            .map(|e| Box::new(e) as Box<dyn FinishWrite + 'a>)
    }
}

#[cfg(feature = "compression-bzip2")]
struct Bzip2Codec;

#[cfg(feature = "compression-bzip2")]
impl<W: Write> FinishWrite for bzip2::write::BzEncoder<W> {
    fn finish(self: Box<Self>) -> io::Result<()> {
        bzip2::write::BzEncoder::finish(*self)?.flush()
    }
}

#[cfg(feature = "compression-bzip2")]
impl CompressionCodec for Bzip2Codec {
    fn name(&self) -> &str {
        "bzip2"
    }

    fn extensions(&self) -> &[&str] {
        &[".bz2", ".bzip2"]
    }

    fn magic_bytes(&self) -> Option<&[u8]> {
        Some(b"BZh")
    }

    fn matches_magic(&self, prefix: &[u8]) -> bool {
        // "BZh", a block size digit, then a block or end-of-stream marker
        const BLOCK: [u8; 6] = [0x31, 0x41, 0x59, 0x26, 0x53, 0x59];
        const EOS: [u8; 6] = [0x17, 0x72, 0x45, 0x38, 0x50, 0x90];
        prefix.len() >= 10
            && prefix.starts_with(b"BZh")
            && (b'1'..=b'9').contains(&prefix[3])
            && (prefix[4..10] == BLOCK || prefix[4..10] == EOS)
    }

    fn wrap_reader_dyn<'a>(&self, reader: Box<dyn Read + 'a>) -> io::Result<Box<dyn Read + 'a>> {
        Ok(Box::new(bzip2::read::MultiBzDecoder::new(reader)))
    }

    fn wrap_writer_dyn<'a>(
        &self,
        writer: Box<dyn Write + 'a>,
    ) -> io::Result<Box<dyn FinishWrite + 'a>> {
        use bzip2::Compression;
        use bzip2::write::BzEncoder;
        Ok(Box::new(BzEncoder::new(writer, Compression::default())))
    }
}

#[cfg(feature = "compression-xz")]
struct XzCodec;

#[cfg(feature = "compression-xz")]
impl<W: Write> FinishWrite for xz2::write::XzEncoder<W> {
    fn finish(self: Box<Self>) -> io::Result<()> {
        xz2::write::XzEncoder::finish(*self)?.flush()
    }
}

#[cfg(feature = "compression-xz")]
impl CompressionCodec for XzCodec {
    fn name(&self) -> &str {
        "xz"
    }

    fn extensions(&self) -> &[&str] {
        &[".xz"]
    }

    fn magic_bytes(&self) -> Option<&[u8]> {
        Some(&[0xfd, 0x37, 0x7a, 0x58, 0x5a, 0x00])
    }

    fn wrap_reader_dyn<'a>(&self, reader: Box<dyn Read + 'a>) -> io::Result<Box<dyn Read + 'a>> {
        Ok(Box::new(xz2::read::XzDecoder::new_multi_decoder(reader)))
    }

    fn wrap_writer_dyn<'a>(
        &self,
        writer: Box<dyn Write + 'a>,
    ) -> io::Result<Box<dyn FinishWrite + 'a>> {
        Ok(Box::new(xz2::write::XzEncoder::new(writer, 6)))
    }
}
