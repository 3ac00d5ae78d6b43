//! Block compression and decompression handling.

use std::io::{self, Read, Seek, Write};

use flate2::{read::ZlibDecoder, write::ZlibEncoder, Compression};
use tracing::instrument;

use crate::error::Result;

/// Identifies how a block inside a container is stored
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub enum CompressionMethod {
    /// Stores the data as it is
    #[default]
    None,

    /// Compress the data using Zlib
    Zlib,
}

/// Reads a bounded block of a container, inflating it when needed
pub(crate) enum BlockReader<'a, R: Read + Seek> {
    Raw(io::Take<&'a mut R>),
    Compressed(Box<ZlibDecoder<io::Take<&'a mut R>>>),
}

impl<'a, R: Read + Seek> BlockReader<'a, R> {
    #[instrument(skip(reader))]
    pub fn new(
        reader: &'a mut R,
        start: u64,
        limit: u64,
        compression: CompressionMethod,
    ) -> Result<Self> {
        reader.seek(io::SeekFrom::Start(start))?;

        let limit_reader = reader.by_ref().take(limit);
        Ok(match compression {
            CompressionMethod::None => BlockReader::Raw(limit_reader),
            CompressionMethod::Zlib => {
                BlockReader::Compressed(Box::new(ZlibDecoder::new(limit_reader)))
            }
        })
    }

    /// Read the whole block, failing unless it holds exactly `expected` bytes
    #[instrument(skip(self), err)]
    pub fn read_exactly(mut self, expected: u64) -> io::Result<Vec<u8>> {
        let mut out = Vec::with_capacity(expected.min(1 << 24) as usize);
        self.by_ref().take(expected + 1).read_to_end(&mut out)?;
        if out.len() as u64 != expected {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("block holds {} bytes, expected {expected}", out.len()),
            ));
        }
        Ok(out)
    }
}

impl<R: Read + Seek> Read for BlockReader<'_, R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            BlockReader::Raw(r) => r.read(buf),
            BlockReader::Compressed(r) => r.read(buf),
        }
    }
}

/// Collects a block of a container, deflating it when needed
pub(crate) enum BlockWriter<W: Write> {
    Raw(W, usize),
    Compressed(Box<ZlibEncoder<W>>),
}

impl<W: Write> BlockWriter<W> {
    pub fn new(writer: W, compression: CompressionMethod) -> Self {
        match compression {
            CompressionMethod::None => BlockWriter::Raw(writer, 0),
            CompressionMethod::Zlib => BlockWriter::Compressed(Box::new(ZlibEncoder::new(
                writer,
                Compression::default(),
            ))),
        }
    }

    #[instrument(skip(self), err)]
    pub fn finalize(self) -> io::Result<W> {
        match self {
            BlockWriter::Raw(w, _) => Ok(w),
            BlockWriter::Compressed(w) => w.finish(),
        }
    }

    /// Number of bytes written into the block, before compression
    pub fn total_in(&self) -> u64 {
        match self {
            BlockWriter::Raw(_, c) => *c as u64,
            BlockWriter::Compressed(w) => w.total_in(),
        }
    }
}

impl<W: Write> Write for BlockWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            BlockWriter::Raw(w, c) => {
                let written = w.write(buf)?;
                *c += written;
                Ok(written)
            }
            BlockWriter::Compressed(w) => w.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            BlockWriter::Raw(w, _) => w.flush(),
            BlockWriter::Compressed(w) => w.flush(),
        }
    }
}
