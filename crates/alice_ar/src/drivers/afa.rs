//! AFA archives, index-keyed with a zlib compressed table of contents.

use std::io::{Cursor, Read, Seek, SeekFrom};

use binrw::{BinRead, BinWrite};
use tracing::{debug, instrument};

use crate::{
    archive::{Archive, ArchiveFormat},
    compression::{BlockReader, CompressionMethod},
    descriptor::{EntryTable, Location},
    drivers::decode_name,
    error::{Error, Result},
};

/// Size of [`AfaHeader`] on disk, the compressed table of contents follows it
pub const HEADER_SIZE: u64 = 44;

/// Size of the smallest table of contents entry
const MIN_ENTRY: u64 = 24;

/// AFA file header, including the header of the `INFO` section
#[derive(BinRead, BinWrite, Debug, Clone, PartialEq)]
#[brw(magic = b"AFAH", little)]
pub struct AfaHeader {
    /// Size of the `AFAH` section, always 0x1c
    pub header_size: u32,

    /// Format version, 1 or 2
    #[brw(magic = b"AlicArch")]
    pub version: u32,

    /// Unknown, 1 in every known archive
    pub unknown: u32,

    /// Offset of the `DATA` section
    pub data_start: u32,

    /// Size of the `INFO` section including its 16 byte header
    #[brw(magic = b"INFO")]
    pub info_size: u32,

    /// Size of the table of contents after decompression
    pub toc_size: u32,

    /// Number of entries
    pub entries: u32,
}

impl Default for AfaHeader {
    fn default() -> Self {
        Self {
            header_size: 0x1c,
            version: 2,
            unknown: 1,
            data_start: HEADER_SIZE as u32,
            info_size: 16,
            toc_size: 0,
            entries: 0,
        }
    }
}

/// AFA table of contents entry
#[derive(BinRead, BinWrite, Debug, Clone, Default, PartialEq)]
#[brw(little, import(version: u32))]
pub struct AfaEntry {
    /// Length of the name in bytes
    pub name_len: u32,

    /// Length of the stored name, padded to a multiple of four
    pub padded_len: u32,

    /// Name in Shift-JIS, padded with NUL bytes
    #[br(count = padded_len)]
    pub name: Vec<u8>,

    /// Unknown, only present in version 1
    #[brw(if(version == 1))]
    pub flags: u32,

    /// Low half of the Windows file time
    pub timestamp_lo: u32,

    /// High half of the Windows file time
    pub timestamp_hi: u32,

    /// Offset of the data from the start of the `DATA` section
    pub offset: u32,

    /// Size of the data
    pub size: u32,
}

/// AFA archive reader
pub struct AfaArchive<R> {
    reader: R,
    header: AfaHeader,
    table: EntryTable,
}

impl<R> AfaArchive<R> {
    /// Format version of the archive
    pub fn version(&self) -> u32 {
        self.header.version
    }
}

impl<R: Read + Seek> AfaArchive<R> {
    /// Read an AFA archive collecting the entries it contains
    #[instrument(skip_all, err)]
    pub fn new(mut reader: R) -> Result<AfaArchive<R>> {
        reader.seek(SeekFrom::Start(0))?;
        let header = AfaHeader::read(&mut reader)?;
        if !matches!(header.version, 1 | 2) {
            return Err(Error::Corrupt(format!(
                "unsupported AFA version {}",
                header.version
            )));
        }
        if header.entries as u64 * MIN_ENTRY > header.toc_size as u64 {
            return Err(Error::Corrupt(format!(
                "{} entries do not fit a table of contents of {} bytes",
                header.entries, header.toc_size
            )));
        }

        let compressed = header
            .info_size
            .checked_sub(16)
            .ok_or_else(|| {
                Error::Corrupt(format!("INFO size {} is too small", header.info_size))
            })?;
        let toc = BlockReader::new(
            &mut reader,
            HEADER_SIZE,
            compressed as u64,
            CompressionMethod::Zlib,
        )?
        .read_exactly(header.toc_size as u64)
        .map_err(|e| Error::Corrupt(format!("table of contents: {e}")))?;

        let mut cursor = Cursor::new(toc);
        let mut table = EntryTable::with_capacity(header.entries as usize);
        for _ in 0..header.entries {
            let entry = AfaEntry::read_args(&mut cursor, (header.version,))?;
            let name_len = (entry.name_len as usize).min(entry.name.len());
            table.push(
                decode_name(&entry.name[..name_len]),
                entry.size as u64,
                Location {
                    volume: 0,
                    offset: header.data_start as u64 + entry.offset as u64,
                },
            );
        }
        debug!("AFA v{} with {} entries", header.version, table.len());

        Ok(AfaArchive {
            reader,
            header,
            table,
        })
    }
}

impl<R: Read + Seek> Archive for AfaArchive<R> {
    fn format(&self) -> ArchiveFormat {
        ArchiveFormat::Afa
    }

    fn table(&self) -> &EntryTable {
        &self.table
    }

    fn table_mut(&mut self) -> &mut EntryTable {
        &mut self.table
    }

    fn read_entry(&mut self, location: Location, size: u64) -> Result<Vec<u8>> {
        Ok(
            BlockReader::new(&mut self.reader, location.offset, size, CompressionMethod::None)?
                .read_exactly(size)?,
        )
    }
}
