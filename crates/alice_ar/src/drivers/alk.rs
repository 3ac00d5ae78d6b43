//! ALK archives, a nameless index of slots.

use std::io::{Read, Seek, SeekFrom};

use binrw::{binrw, BinRead, BinWrite};
use tracing::{debug, instrument};

use crate::{
    archive::{Archive, ArchiveFormat},
    compression::{BlockReader, CompressionMethod},
    descriptor::{EntryTable, Location},
    error::{Error, Result},
};

/// A slot of the ALK index, empty slots have a size of 0
#[derive(BinRead, BinWrite, Debug, Clone, Copy, Default, PartialEq)]
#[brw(little)]
pub struct AlkSlot {
    /// Offset of the data from the start of the file
    pub offset: u32,
    /// Size of the data
    pub size: u32,
}

/// ALK file header
#[binrw]
#[derive(Debug, Clone, Default, PartialEq)]
#[brw(magic = b"ALK0", little)]
pub struct AlkHeader {
    #[bw(try_calc(u32::try_from(slots.len())))]
    count: u32,

    /// All slots, including the empty ones
    #[br(count = count)]
    pub slots: Vec<AlkSlot>,
}

impl AlkHeader {
    /// Create a header from its slots
    pub fn new(slots: Vec<AlkSlot>) -> Self {
        Self { slots }
    }
}

/// ALK archive reader
///
/// Entries are named after their slot number, empty slots are left out.
pub struct AlkArchive<R> {
    reader: R,
    table: EntryTable,
}

impl<R: Read + Seek> AlkArchive<R> {
    /// Read an ALK archive collecting the entries it contains
    #[instrument(skip_all, err)]
    pub fn new(mut reader: R) -> Result<AlkArchive<R>> {
        let file_len = reader.seek(SeekFrom::End(0))?;
        reader.seek(SeekFrom::Start(0))?;

        let mut count = [0; 8];
        reader.read_exact(&mut count)?;
        let count = u32::from_le_bytes([count[4], count[5], count[6], count[7]]) as u64;
        if 8 + count * 8 > file_len {
            return Err(Error::Corrupt(format!(
                "{count} slots do not fit a file of {file_len} bytes"
            )));
        }

        reader.seek(SeekFrom::Start(0))?;
        let header = AlkHeader::read(&mut reader)?;

        let mut table = EntryTable::with_capacity(header.slots.len());
        for (slot, AlkSlot { offset, size }) in header.slots.iter().copied().enumerate() {
            if size == 0 {
                continue;
            }
            table.push(
                slot.to_string(),
                size as u64,
                Location {
                    volume: 0,
                    offset: offset as u64,
                },
            );
        }
        debug!("ALK with {} slots, {} used", header.slots.len(), table.len());

        Ok(AlkArchive { reader, table })
    }
}

impl<R: Read + Seek> Archive for AlkArchive<R> {
    fn format(&self) -> ArchiveFormat {
        ArchiveFormat::Alk
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

#[cfg(test)]
mod test {
    use std::io::Cursor;

    use binrw::BinWrite;
    use pretty_assertions::assert_eq;

    use super::{AlkArchive, AlkHeader, AlkSlot};
    use crate::{archive::Archive, error::Result};

    #[rustfmt::skip]
    const ARCHIVE: [u8; 37] = [
        b'A', b'L', b'K', b'0', 0x03, 0x00, 0x00, 0x00,
        0x20, 0x00, 0x00, 0x00, 0x03, 0x00, 0x00, 0x00,
        0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
        0x23, 0x00, 0x00, 0x00, 0x02, 0x00, 0x00, 0x00,
        b'a', b'b', b'c',
        b'd', b'e',
    ];

    #[test]
    fn empty_slots_are_skipped() -> Result<()> {
        let mut archive = AlkArchive::new(Cursor::new(ARCHIVE))?;

        assert_eq!(archive.len(), 2);
        assert_eq!(archive.by_index(0)?.name(), "0");
        assert_eq!(archive.by_index(1)?.name(), "2");
        assert_eq!(archive.by_name("2")?.index(), 1);
        assert_eq!(&*archive.load(1)?, b"de");

        Ok(())
    }

    #[test]
    fn header_layout() -> Result<()> {
        let header = AlkHeader::new(vec![
            AlkSlot { offset: 0x20, size: 3 },
            AlkSlot::default(),
            AlkSlot { offset: 0x23, size: 2 },
        ]);

        let mut written = Vec::new();
        header.write(&mut Cursor::new(&mut written))?;
        assert_eq!(written, ARCHIVE[..32].to_vec());

        Ok(())
    }

    #[test]
    fn slot_count_past_end() {
        let mut input = ARCHIVE;
        input[5] = 0x10;
        assert!(AlkArchive::new(Cursor::new(input)).is_err());
    }

    #[test]
    fn entry_past_end() -> Result<()> {
        let mut input = ARCHIVE;
        input[28] = 0x10;
        let mut archive = AlkArchive::new(Cursor::new(input))?;
        assert!(archive.load(1).is_err());

        Ok(())
    }
}
