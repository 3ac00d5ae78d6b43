//! Fixed header of an EX document and body compression handling.

use std::io::{self, Read, Write};

use binrw::{BinRead, BinWrite};
use flate2::{read::ZlibDecoder, write::ZlibEncoder, Compression};
use tracing::instrument;

use crate::error::{Error, Result};

/// First bytes of every EX document
pub const MAGIC: &[u8; 4] = b"HEAD";

/// Size in bytes of [`ExHeader`] on disk
pub const HEADER_SIZE: u64 = 36;

/// Identifies how the block data of an EX document is stored
#[derive(BinRead, BinWrite, Debug, Copy, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[brw(repr = u32)]
pub enum CompressionMethod {
    /// Stores the data as it is
    None = 0,

    /// Compress the data using Zlib
    #[default]
    Zlib = 2,
}

/// EX file header
///
/// Every EX document starts with a `HEAD` section, followed by the `EXTF` section declaring the version and
/// number of top level blocks and the `DATA` section describing how the block data is stored.
/// All data is stored in little endian format
#[derive(BinRead, BinWrite, Debug, Copy, Clone, PartialEq)]
#[brw(magic = b"HEAD", little)]
pub struct ExHeader {
    /// Size of the `EXTF` section, always 12
    pub head_size: u32,

    /// Format version
    #[brw(magic = b"EXTF")]
    pub version: u32,

    /// The number of top level blocks
    pub blocks: u32,

    /// The compression used for the block data
    #[brw(magic = b"DATA")]
    pub compression: CompressionMethod,

    /// The size of the block data as stored in the file
    pub stored_size: u32,

    /// The size of the block data after decompression
    pub body_size: u32,
}

impl Default for ExHeader {
    fn default() -> Self {
        Self {
            head_size: 12,
            version: 1,
            blocks: 0,
            compression: CompressionMethod::default(),
            stored_size: 0,
            body_size: 0,
        }
    }
}

// Declared sizes are not trusted for up-front allocation
const MAX_RESERVE: usize = 1 << 24;

/// Inflate `stored` according to `compression`, requiring exactly `body_size` bytes of output
#[instrument(skip(stored), fields(stored = stored.len()), err)]
pub(crate) fn inflate(
    stored: &[u8],
    compression: CompressionMethod,
    body_size: u32,
) -> Result<Vec<u8>> {
    match compression {
        CompressionMethod::None => {
            if stored.len() != body_size as usize {
                return Err(Error::CorruptBody(format!(
                    "stored size {} differs from body size {}",
                    stored.len(),
                    body_size
                )));
            }
            Ok(stored.to_vec())
        }
        CompressionMethod::Zlib => {
            let mut body = Vec::with_capacity((body_size as usize).min(MAX_RESERVE));
            ZlibDecoder::new(stored)
                .take(body_size as u64 + 1)
                .read_to_end(&mut body)
                .map_err(|e| Error::CorruptBody(e.to_string()))?;
            if body.len() != body_size as usize {
                return Err(Error::CorruptBody(format!(
                    "inflated to {} bytes, expected {}",
                    body.len(),
                    body_size
                )));
            }
            Ok(body)
        }
    }
}

/// Store `body` according to `compression`
pub(crate) fn deflate(body: &[u8], compression: CompressionMethod) -> io::Result<Vec<u8>> {
    match compression {
        CompressionMethod::None => Ok(body.to_vec()),
        CompressionMethod::Zlib => {
            let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
            encoder.write_all(body)?;
            encoder.finish()
        }
    }
}

#[cfg(test)]
mod test {
    use std::io::Cursor;

    use binrw::BinRead;
    use binrw::BinWrite;
    use pretty_assertions::assert_eq;

    use super::{deflate, inflate, CompressionMethod, ExHeader};
    use crate::error::{Error, Result};

    #[rustfmt::skip]
    const STORED_HEADER: [u8; 36] = [
        0x48, 0x45, 0x41, 0x44, 0x0C, 0x00, 0x00, 0x00,
        0x45, 0x58, 0x54, 0x46, 0x01, 0x00, 0x00, 0x00,
        0x02, 0x00, 0x00, 0x00,
        0x44, 0x41, 0x54, 0x41, 0x00, 0x00, 0x00, 0x00,
        0x10, 0x00, 0x00, 0x00,
        0x10, 0x00, 0x00, 0x00,
    ];

    #[test]
    fn read_stored_header() -> Result<()> {
        let expected = ExHeader {
            blocks: 2,
            compression: CompressionMethod::None,
            stored_size: 16,
            body_size: 16,
            ..Default::default()
        };

        assert_eq!(ExHeader::read(&mut Cursor::new(STORED_HEADER))?, expected);

        Ok(())
    }

    #[test]
    fn write_stored_header() -> Result<()> {
        let header = ExHeader {
            blocks: 2,
            compression: CompressionMethod::None,
            stored_size: 16,
            body_size: 16,
            ..Default::default()
        };

        let mut actual = Vec::new();
        header.write(&mut Cursor::new(&mut actual))?;

        assert_eq!(actual, STORED_HEADER.to_vec());

        Ok(())
    }

    #[test]
    fn reject_unknown_compression() {
        let mut input = STORED_HEADER;
        input[24] = 0x07;
        assert!(ExHeader::read(&mut Cursor::new(input)).is_err());
    }

    #[test]
    fn inflate_checks_declared_size() -> Result<()> {
        let stored = deflate(b"hello world", CompressionMethod::Zlib)?;
        assert_eq!(inflate(&stored, CompressionMethod::Zlib, 11)?, b"hello world");

        assert!(matches!(
            inflate(&stored, CompressionMethod::Zlib, 10),
            Err(Error::CorruptBody(_))
        ));
        assert!(matches!(
            inflate(b"abc", CompressionMethod::None, 4),
            Err(Error::CorruptBody(_))
        ));

        Ok(())
    }

    #[test]
    fn huge_declared_body() -> Result<()> {
        let stored = deflate(b"tiny", CompressionMethod::Zlib)?;
        assert!(matches!(
            inflate(&stored, CompressionMethod::Zlib, u32::MAX),
            Err(Error::CorruptBody(_))
        ));

        Ok(())
    }
}
