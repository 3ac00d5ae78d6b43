//! The EX document handle tying the header, body codec and value model together.

use std::{
    io::{Cursor, Write},
    path::Path,
};

use binrw::{BinRead, BinWrite};
use encoding_rs::Encoding;
use tracing::{info, instrument};

#[cfg(feature = "serde")]
use serde::Serialize;

use crate::{
    error::{Error, Result},
    header::{deflate, inflate, CompressionMethod, ExHeader, HEADER_SIZE},
    read::{read_blocks, StructuralWarning},
    types::{ExBlock, ExValue},
    write::write_blocks,
};

/// A parsed EX document
///
/// ```no_run
/// fn list_blocks(path: &str) -> alice_ex::error::Result<()> {
///     let ex = alice_ex::ExFile::read_path(path, encoding_rs::SHIFT_JIS)?;
///
///     for block in ex.blocks() {
///         println!("{} {}", block.value.kind(), block.name);
///     }
///
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct ExFile {
    version: u32,
    compression: CompressionMethod,
    blocks: Vec<ExBlock>,
    #[cfg_attr(feature = "serde", serde(skip))]
    warnings: Vec<StructuralWarning>,
}

impl Default for ExFile {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl ExFile {
    /// Create a document from blocks, using the default version and compression
    pub fn new(blocks: Vec<ExBlock>) -> Self {
        let header = ExHeader::default();
        Self {
            version: header.version,
            compression: header.compression,
            blocks,
            warnings: Vec::new(),
        }
    }

    /// Parse a document, converting its text from `encoding`
    #[instrument(skip(data, encoding), fields(size = data.len(), encoding = encoding.name()), err)]
    pub fn parse(data: &[u8], encoding: &'static Encoding) -> Result<ExFile> {
        let mut cursor = Cursor::new(data);
        let header =
            ExHeader::read(&mut cursor).map_err(|e| Error::from_header(e, data.len() as u64))?;

        let start = HEADER_SIZE as usize;
        let end = start + header.stored_size as usize;
        let stored = data.get(start..end).ok_or(Error::Truncated {
            offset: data.len() as u64,
        })?;
        if data.len() > end {
            return Err(Error::TrailingData {
                count: (data.len() - end) as u64,
            });
        }

        let body = inflate(stored, header.compression, header.body_size)?;
        let (blocks, warnings) = read_blocks(&body, header.blocks, encoding)?;

        Ok(ExFile {
            version: header.version,
            compression: header.compression,
            blocks,
            warnings,
        })
    }

    /// Read and parse a document from disk
    pub fn read_path(path: impl AsRef<Path>, encoding: &'static Encoding) -> Result<ExFile> {
        let data = std::fs::read(path)?;
        Self::parse(&data, encoding)
    }

    /// Serialize the document, writing its text in `encoding`
    #[instrument(skip_all, fields(blocks = self.blocks.len(), encoding = encoding.name()), err)]
    pub fn to_bytes(&self, encoding: &'static Encoding) -> Result<Vec<u8>> {
        let body = write_blocks(&self.blocks, encoding)?;
        let stored = deflate(&body, self.compression)?;

        let header = ExHeader {
            version: self.version,
            blocks: u32::try_from(self.blocks.len()).map_err(|_| {
                Error::CorruptBody(format!("{} blocks do not fit in 32 bits", self.blocks.len()))
            })?,
            compression: self.compression,
            stored_size: stored.len() as u32,
            body_size: body.len() as u32,
            ..Default::default()
        };

        let mut out = Cursor::new(Vec::with_capacity(HEADER_SIZE as usize + stored.len()));
        header.write(&mut out)?;
        out.write_all(&stored)?;
        Ok(out.into_inner())
    }

    /// Serialize the document into a writer
    pub fn write<W: Write>(&self, mut writer: W, encoding: &'static Encoding) -> Result<()> {
        writer.write_all(&self.to_bytes(encoding)?)?;
        Ok(())
    }

    /// Serialize the document to disk
    pub fn write_path(&self, path: impl AsRef<Path>, encoding: &'static Encoding) -> Result<()> {
        let path = path.as_ref();
        info!("writing {}", path.display());
        std::fs::write(path, self.to_bytes(encoding)?)?;
        Ok(())
    }

    /// Format version from the header
    pub fn version(&self) -> u32 {
        self.version
    }

    /// How the block data is stored
    pub fn compression(&self) -> CompressionMethod {
        self.compression
    }

    /// Change how the block data is stored on the next write
    pub fn set_compression(&mut self, compression: CompressionMethod) {
        self.compression = compression;
    }

    /// Top level blocks in document order
    pub fn blocks(&self) -> &[ExBlock] {
        &self.blocks
    }

    /// Number of top level blocks
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    /// Whether the document has no blocks
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Find the value of a top level block by name
    pub fn get(&self, name: &str) -> Option<&ExValue> {
        self.blocks
            .iter()
            .find(|b| b.name == name)
            .map(|b| &b.value)
    }

    /// Structural warnings collected while parsing
    pub fn warnings(&self) -> &[StructuralWarning] {
        &self.warnings
    }

    /// Render the document as pretty printed JSON
    #[cfg(feature = "serde")]
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

impl From<Vec<ExBlock>> for ExFile {
    fn from(value: Vec<ExBlock>) -> Self {
        Self::new(value)
    }
}

#[cfg(test)]
mod test {
    use encoding_rs::UTF_8;
    use pretty_assertions::assert_eq;

    use super::ExFile;
    use crate::error::{Error, Result};
    use crate::header::CompressionMethod;
    use crate::types::{ExBlock, ExValue};

    fn sample() -> ExFile {
        ExFile::new(vec![ExBlock::named("a", 1), ExBlock::named("b", "text")])
    }

    #[test]
    fn parse_what_was_written() -> Result<()> {
        for compression in [CompressionMethod::None, CompressionMethod::Zlib] {
            let mut ex = sample();
            ex.set_compression(compression);

            let bytes = ex.to_bytes(UTF_8)?;
            let parsed = ExFile::parse(&bytes, UTF_8)?;
            assert_eq!(parsed, ex);
            assert_eq!(parsed.get("b"), Some(&ExValue::String("text".into())));
        }

        Ok(())
    }

    #[test]
    fn bad_marker() {
        let mut bytes = sample().to_bytes(UTF_8).unwrap();
        bytes[0] = b'X';
        assert!(matches!(ExFile::parse(&bytes, UTF_8), Err(Error::BadMarker)));
    }

    #[test]
    fn truncated_header() {
        let bytes = sample().to_bytes(UTF_8).unwrap();
        assert!(matches!(
            ExFile::parse(&bytes[..20], UTF_8),
            Err(Error::Truncated { offset: 20 })
        ));
    }

    #[test]
    fn truncated_body() {
        let bytes = sample().to_bytes(UTF_8).unwrap();
        let cut = bytes.len() - 3;
        assert!(matches!(
            ExFile::parse(&bytes[..cut], UTF_8),
            Err(Error::Truncated { .. })
        ));
    }

    #[test]
    fn trailing_bytes() {
        let mut bytes = sample().to_bytes(UTF_8).unwrap();
        bytes.extend([0, 0, 0]);
        assert!(matches!(
            ExFile::parse(&bytes, UTF_8),
            Err(Error::TrailingData { count: 3 })
        ));
    }

    #[test]
    fn json_projection() -> Result<()> {
        let json = sample().to_json()?;
        assert!(json.contains("\"name\": \"a\""));
        assert!(json.contains("\"Int\": 1"));

        Ok(())
    }
}
