//! Types for writing AFA archives
//!

use std::io::{self, Cursor, Seek, Write};

use binrw::BinWrite;
use bon::Builder;
use encoding_rs::SHIFT_JIS;
use tracing::{instrument, Level};

use crate::{
    compression::{BlockWriter, CompressionMethod},
    drivers::afa::{AfaEntry, AfaHeader, HEADER_SIZE},
    error::{Error, Result},
};

/// AFA format revisions
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AfaVersion {
    /// Entries carry an extra flags field
    V1 = 1,
    /// Current revision
    #[default]
    V2 = 2,
}

/// Options for how the AFA file should be written
#[derive(Debug, Clone, Copy, Default, Builder)]
pub struct AfaWriterOptions {
    /// The revision to write
    #[builder(default)]
    pub version: AfaVersion,
}

/// AFA archive generator
///
/// ```
/// # fn doit() -> alice_ar::error::Result<()>
/// # {
/// use std::io::Write;
/// use alice_ar::write::{AfaWriter, AfaWriterOptions};
///
/// let mut afa = AfaWriter::new(std::io::Cursor::new(Vec::new()), AfaWriterOptions::builder().build());
///
/// afa.start_file("hello_world.txt")?;
/// afa.write_all(b"Hello, World!")?;
///
/// // Write the table of contents and the data.
/// afa.finish()?;
///
/// # Ok(())
/// # }
/// # doit().unwrap();
/// ```
pub struct AfaWriter<W: Write + Seek> {
    inner: W,
    version: AfaVersion,
    toc: Vec<AfaEntry>,
    data_block: BlockWriter<Vec<u8>>,
    /// Offset of the open entry in the data block
    current: Option<u64>,
}

/// Convert a size or offset to the 32 bit field storing it
fn field(value: u64, what: &str) -> Result<u32> {
    u32::try_from(value).map_err(|_| Error::TooLarge(format!("{what} of {value} bytes")))
}

impl<W: Write + Seek> AfaWriter<W> {
    /// Initializes the archive.
    ///
    /// Entry data is collected in memory and nothing is written to `inner` before [`AfaWriter::finish`], the
    /// table of contents precedes the data.
    pub fn new(inner: W, options: AfaWriterOptions) -> AfaWriter<W> {
        AfaWriter {
            inner,
            version: options.version,
            toc: Vec::new(),
            data_block: BlockWriter::new(Vec::new(), CompressionMethod::None),
            current: None,
        }
    }

    /// Returns true if a file is currently open for writing.
    pub const fn is_writing_file(&self) -> bool {
        self.current.is_some()
    }

    /// Start a new entry, finishing the previous one
    #[instrument(skip(self, name), fields(name = %name.as_ref()), err)]
    pub fn start_file(&mut self, name: impl AsRef<str>) -> Result<()> {
        self.finish_file()?;

        let name = name.as_ref();
        let (encoded, _, unmappable) = SHIFT_JIS.encode(name);
        if unmappable {
            return Err(Error::Unencodable(name.to_owned()));
        }

        let name_len = field(encoded.len() as u64, "name")?;
        let padded_len = (name_len + 4) & !3;
        let mut stored = encoded.into_owned();
        stored.resize(padded_len as usize, 0);

        let start = self.data_block.total_in();
        self.toc.push(AfaEntry {
            name_len,
            padded_len,
            name: stored,
            // DATA section header
            offset: field(8 + start, "data section")?,
            ..Default::default()
        });
        self.current = Some(start);

        Ok(())
    }

    /// Close the current entry, doing nothing if none is open
    #[instrument(skip(self), err)]
    pub fn finish_file(&mut self) -> Result<()> {
        let (Some(start), Some(entry)) = (self.current.take(), self.toc.last_mut()) else {
            return Ok(());
        };

        entry.size = field(self.data_block.total_in() - start, "entry")?;

        Ok(())
    }

    /// Finish the last entry and write the archive
    #[instrument(skip(self), err)]
    pub fn finish(mut self) -> Result<W> {
        self.finish_file()?;

        let version = self.version as u32;
        let mut toc_block = BlockWriter::new(Vec::new(), CompressionMethod::Zlib);
        {
            let mut toc = Cursor::new(Vec::new());
            for entry in &self.toc {
                entry.write_args(&mut toc, (version,))?;
            }
            toc_block.write_all(toc.get_ref())?;
        }
        let toc_size = field(toc_block.total_in(), "table of contents")?;
        let toc = toc_block.finalize()?;
        let toc_len = field(toc.len() as u64, "compressed table of contents")?;

        let data = self.data_block.finalize()?;
        let header = AfaHeader {
            version,
            data_start: field(HEADER_SIZE + toc_len as u64, "table of contents")?,
            info_size: field(16 + toc_len as u64, "table of contents")?,
            toc_size,
            entries: field(self.toc.len() as u64, "entry count")?,
            ..Default::default()
        };
        let data_len = field(8 + data.len() as u64, "data section")?;

        header.write(&mut self.inner)?;
        self.inner.write_all(&toc)?;
        self.inner.write_all(b"DATA")?;
        self.inner.write_all(&data_len.to_le_bytes())?;
        self.inner.write_all(&data)?;

        Ok(self.inner)
    }
}

impl<W: Write + Seek> Write for AfaWriter<W> {
    #[instrument(skip_all, err, ret(level = Level::TRACE), fields(size=buf.len()) )]
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self.current {
            Some(_) => self.data_block.write(buf),
            None => Err(io::Error::new(
                io::ErrorKind::Other,
                "No file has been started",
            )),
        }
    }

    #[instrument(skip(self), err)]
    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

#[cfg(test)]
mod test {
    use std::io::{Cursor, Write};

    use pretty_assertions::{assert_eq, assert_str_eq};
    use tracing_test::traced_test;

    use super::field;
    use crate::{
        archive::Archive,
        drivers::afa::AfaArchive,
        error::{Error, Result},
        write::{AfaVersion, AfaWriter, AfaWriterOptions},
    };

    #[traced_test]
    #[test]
    fn afa_empty_write() -> Result<()> {
        #[rustfmt::skip]
        let expected = vec![
            // Header
            0x41, 0x46, 0x41, 0x48, 0x1C, 0x00, 0x00, 0x00,
            0x41, 0x6C, 0x69, 0x63, 0x41, 0x72, 0x63, 0x68,
            0x02, 0x00, 0x00, 0x00,
            0x01, 0x00, 0x00, 0x00,
            0x34, 0x00, 0x00, 0x00,
            // Info
            0x49, 0x4E, 0x46, 0x4F, 0x18, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x00, 0x00,
            0x78, 0x9C, 0x03, 0x00, 0x00, 0x00, 0x00, 0x01,
            // Data
            0x44, 0x41, 0x54, 0x41, 0x08, 0x00, 0x00, 0x00,
        ];

        let writer = AfaWriter::new(Cursor::new(Vec::new()), AfaWriterOptions::builder().build());
        let result = writer.finish()?;
        assert_str_eq!(
            format!("{:02X?}", *result.get_ref()),
            format!("{:02X?}", expected)
        );

        Ok(())
    }

    #[traced_test]
    #[test]
    fn afa_entries_read_back() -> Result<()> {
        for version in [AfaVersion::V1, AfaVersion::V2] {
            let mut writer = AfaWriter::new(
                Cursor::new(Vec::new()),
                AfaWriterOptions::builder().version(version).build(),
            );
            writer.start_file("hello.txt")?;
            writer.write_all(b"Hello World")?;
            writer.start_file("空.txt")?;
            writer.start_file("cg/world.txt")?;
            writer.write_all(b"World")?;

            let mut archive = AfaArchive::new(writer.finish()?)?;
            assert_eq!(archive.version(), version as u32);

            let names: Vec<_> = archive.entries().iter().map(|e| e.name()).collect();
            assert_eq!(names, ["hello.txt", "空.txt", "cg/world.txt"]);
            assert_eq!(&*archive.load(0)?, b"Hello World");
            assert_eq!(&*archive.load(1)?, b"");
            assert_eq!(&*archive.load(2)?, b"World");
        }

        Ok(())
    }

    #[test]
    fn write_without_file() {
        let mut writer = AfaWriter::new(Cursor::new(Vec::new()), AfaWriterOptions::default());
        assert!(writer.write_all(b"data").is_err());
        assert!(!writer.is_writing_file());
    }

    #[test]
    fn name_outside_shift_jis() {
        let mut writer = AfaWriter::new(Cursor::new(Vec::new()), AfaWriterOptions::default());
        assert!(matches!(
            writer.start_file("emoji 🦀"),
            Err(Error::Unencodable(name)) if name == "emoji 🦀"
        ));
    }

    #[test]
    fn sizes_past_four_gib() -> Result<()> {
        assert_eq!(field(u32::MAX as u64, "entry")?, u32::MAX);
        assert!(matches!(
            field(u32::MAX as u64 + 1, "entry"),
            Err(Error::TooLarge(what)) if what == "entry of 4294967296 bytes"
        ));
        Ok(())
    }

    #[test]
    fn entries_are_contiguous() -> Result<()> {
        let mut writer = AfaWriter::new(Cursor::new(Vec::new()), AfaWriterOptions::default());
        writer.start_file("a")?;
        writer.write_all(b"abc")?;
        writer.write_all(b"de")?;
        assert!(writer.is_writing_file());
        writer.start_file("b")?;
        writer.write_all(b"f")?;

        let archive = AfaArchive::new(writer.finish()?)?;
        assert_eq!(archive.by_index(0)?.size(), 5);
        assert_eq!(archive.by_index(1)?.size(), 1);
        assert_eq!(
            archive.by_index(1)?.location().offset - archive.by_index(0)?.location().offset,
            5
        );
        Ok(())
    }
}
