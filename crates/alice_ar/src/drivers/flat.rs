//! FLAT archives, tagged chunks whose `LIBL` chunk concatenates named entries.
//!
//! FLAT archives are usually found inside other archives, so they are always parsed from memory.

use std::sync::Arc;

use tracing::{debug, instrument};
use winnow::{
    binary::le_u32,
    combinator::{opt, preceded, repeat, seq},
    prelude::*,
    stream::Offset,
    token::{literal, take},
    PResult,
};

use crate::{
    archive::{Archive, ArchiveFormat},
    descriptor::{EntryTable, Location},
    drivers::{decode_name, padding},
    error::{Error, Result},
};

#[derive(Debug, Clone, PartialEq, Eq)]
struct Chunk<'a> {
    tag: &'a [u8],
    size: u32,
    data: &'a [u8],
}

fn parse_chunk<'s>(s: &mut &'s [u8]) -> PResult<Chunk<'s>> {
    seq!(Chunk {
        tag: take(4u8),
        size: le_u32,
        data: take(size),
    })
    .parse_next(s)
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct LiblEntry<'a> {
    name_len: u32,
    name: &'a [u8],
    size: u32,
    data: &'a [u8],
}

fn parse_prefix<'s>(s: &mut &'s [u8]) -> PResult<Option<&'s [u8]>> {
    opt(preceded(literal(b"ELNA"), take(4u8))).parse_next(s)
}

fn parse_libl_entry<'s>(s: &mut &'s [u8]) -> PResult<LiblEntry<'s>> {
    seq!(LiblEntry {
        name_len: le_u32,
        name: take(name_len),
        _: take(padding(name_len)),
        // entry kind
        _: le_u32,
        size: le_u32,
        data: take(size),
        _: take(padding(size)),
    })
    .parse_next(s)
}

fn parse_libl<'s>(s: &mut &'s [u8]) -> PResult<Vec<LiblEntry<'s>>> {
    let count = le_u32.parse_next(s)?;
    repeat(count as usize, parse_libl_entry).parse_next(s)
}

/// FLAT archive held in memory
pub struct FlatArchive {
    data: Arc<[u8]>,
    table: EntryTable,
}

impl FlatArchive {
    /// Parse a FLAT archive, keeping a reference to `data`
    #[instrument(skip_all, fields(size = data.len()), err)]
    pub fn new(data: Arc<[u8]>) -> Result<FlatArchive> {
        let table = {
            let whole: &[u8] = &data;
            let mut input = whole;

            parse_prefix(&mut input)?;
            let chunks: Vec<Chunk<'_>> = repeat(0.., parse_chunk).parse_next(&mut input)?;
            if !input.is_empty() {
                return Err(Error::Corrupt(format!(
                    "{} bytes after the last chunk do not form a chunk",
                    input.len()
                )));
            }
            if chunks.first().map(|c| c.tag) != Some(&b"FLAT"[..]) {
                return Err(Error::Corrupt("missing FLAT chunk".into()));
            }

            let mut table = EntryTable::new();
            for chunk in chunks.iter().filter(|c| c.tag == b"LIBL") {
                let mut payload = chunk.data;
                for entry in parse_libl(&mut payload)? {
                    table.push(
                        decode_name(entry.name),
                        entry.data.len() as u64,
                        Location {
                            volume: 0,
                            offset: entry.data.offset_from(&whole) as u64,
                        },
                    );
                }
            }
            debug!("FLAT with {} chunks and {} entries", chunks.len(), table.len());
            table
        };

        Ok(FlatArchive { data, table })
    }
}

impl Archive for FlatArchive {
    fn format(&self) -> ArchiveFormat {
        ArchiveFormat::Flat
    }

    fn table(&self) -> &EntryTable {
        &self.table
    }

    fn table_mut(&mut self) -> &mut EntryTable {
        &mut self.table
    }

    fn read_entry(&mut self, location: Location, size: u64) -> Result<Vec<u8>> {
        let start = location.offset as usize;
        start
            .checked_add(size as usize)
            .and_then(|end| self.data.get(start..end))
            .map(<[u8]>::to_vec)
            .ok_or_else(|| {
                Error::Corrupt(format!("entry at {start} with {size} bytes is out of bounds"))
            })
    }
}

#[cfg(test)]
mod test {
    use std::sync::Arc;

    use pretty_assertions::assert_eq;
    use winnow::Parser;

    use super::{parse_chunk, FlatArchive};
    use crate::{archive::Archive, error::Result};

    fn chunk(tag: &[u8; 4], payload: &[u8]) -> Vec<u8> {
        let mut out = tag.to_vec();
        out.extend((payload.len() as u32).to_le_bytes());
        out.extend(payload);
        out
    }

    fn libl(entries: &[(&[u8], &[u8])]) -> Vec<u8> {
        let mut out = (entries.len() as u32).to_le_bytes().to_vec();
        for (name, data) in entries {
            out.extend((name.len() as u32).to_le_bytes());
            out.extend(*name);
            out.resize(out.len().next_multiple_of(4), 0);
            out.extend(2u32.to_le_bytes());
            out.extend((data.len() as u32).to_le_bytes());
            out.extend(*data);
            out.resize(out.len().next_multiple_of(4), 0);
        }
        out
    }

    #[test]
    fn chunk_layout() {
        #[rustfmt::skip]
        let input: &[u8] = &[
            b'F', b'L', b'A', b'T', 0x02, 0x00, 0x00, 0x00,
            0xAA, 0xBB,
            b'X',
        ];

        let mut rest = input;
        let chunk = parse_chunk.parse_next(&mut rest).unwrap();
        assert_eq!(chunk.tag, b"FLAT");
        assert_eq!(chunk.size, 2);
        assert_eq!(chunk.data, [0xAA, 0xBB]);
        assert_eq!(rest, b"X");
    }

    #[test]
    fn libl_entries() -> Result<()> {
        let mut input = chunk(b"FLAT", &[0; 8]);
        input.extend(chunk(b"TMNL", b"thumb"));
        input.extend(chunk(b"LIBL", &libl(&[(b"abc", b"12345"), (b"long name", b"x")])));

        let mut archive = FlatArchive::new(input.into())?;
        assert_eq!(archive.len(), 2);
        assert_eq!(archive.by_index(0)?.name(), "abc");
        assert_eq!(archive.by_index(0)?.size(), 5);
        assert_eq!(archive.by_name("LONG NAME")?.index(), 1);
        assert_eq!(&*archive.load(0)?, b"12345");
        assert_eq!(&*archive.load(1)?, b"x");

        Ok(())
    }

    #[test]
    fn elna_prefix() -> Result<()> {
        let mut input = b"ELNA\0\0\0\0".to_vec();
        input.extend(chunk(b"FLAT", &[]));
        input.extend(chunk(b"LIBL", &libl(&[(b"a", b"b")])));

        let archive = FlatArchive::new(input.into())?;
        assert_eq!(archive.len(), 1);

        Ok(())
    }

    #[test]
    fn first_chunk_must_be_flat() {
        let input = chunk(b"LIBL", &libl(&[]));
        assert!(FlatArchive::new(input.into()).is_err());
    }

    #[test]
    fn truncated_libl() {
        let mut input = chunk(b"FLAT", &[]);
        let mut payload = libl(&[(b"a", b"bcd")]);
        payload.truncate(payload.len() - 4);
        input.extend(chunk(b"LIBL", &payload));
        assert!(FlatArchive::new(input.into()).is_err());
    }

    #[test]
    fn oversized_trailing_chunk() {
        let mut input = chunk(b"FLAT", &[]);
        input.extend(b"LIBL");
        input.extend(1000u32.to_le_bytes());
        input.extend(libl(&[(b"a", b"b")]));
        assert!(FlatArchive::new(input.into()).is_err());
    }

    #[test]
    fn trailing_bytes_after_last_chunk() {
        let mut input = chunk(b"FLAT", &[]);
        input.extend(chunk(b"LIBL", &libl(&[])));
        input.extend([0x00, 0x01]);
        assert!(FlatArchive::new(input.into()).is_err());
    }

    #[test]
    fn shares_its_input() -> Result<()> {
        let mut input = chunk(b"FLAT", &[]);
        input.extend(chunk(b"LIBL", &libl(&[])));
        let data: Arc<[u8]> = input.into();

        let archive = FlatArchive::new(data.clone())?;
        assert_eq!(Arc::strong_count(&data), 2);
        drop(archive);
        assert_eq!(Arc::strong_count(&data), 1);

        Ok(())
    }
}
