//! ALD archives, entries spread over up to 26 linked volumes.
//!
//! Every volume starts with a table of 24 bit sector numbers. The first one points at the link map, which is
//! shared by all volumes and lists every entry as a volume number and a slot in that volume's table.

use std::{
    ffi::OsStr,
    fs::File,
    io::{BufReader, Read, Seek, SeekFrom},
    path::{Path, PathBuf},
};

use binrw::{BinRead, BinWrite};
use byteorder::{LittleEndian, ReadBytesExt};
use tracing::{debug, instrument, warn};

use crate::{
    archive::{Archive, ArchiveFormat},
    compression::{BlockReader, CompressionMethod},
    descriptor::{EntryTable, Location},
    drivers::decode_name,
    error::{Error, Result},
};

/// Size of a sector, all offsets in an ALD volume are sector numbers
pub const SECTOR_SIZE: u64 = 256;

/// Most volumes a linked-volume archive can have, one for each letter
pub const MAX_VOLUMES: usize = 26;

/// Largest table or link map accepted when sniffing, in sectors
const MAX_TABLE_SECTORS: u32 = 0xfff;

/// Largest entry header, names are short
const MAX_HEADER_SIZE: u32 = 0x1000;

/// Header in front of the data of every entry
#[derive(BinRead, BinWrite, Debug, Clone, Default, PartialEq)]
#[brw(little)]
pub struct AldEntryHeader {
    /// Size of this header, the data follows it
    #[br(assert((16..=MAX_HEADER_SIZE).contains(&header_size), "bad entry header size {}", header_size))]
    pub header_size: u32,

    /// Size of the data
    pub size: u32,

    /// Windows file time
    pub timestamp: u64,

    /// NUL terminated name in Shift-JIS, padded to the header size
    #[br(count = header_size - 16)]
    pub name: Vec<u8>,
}

/// A link map record naming the volume and slot of an entry, both counted from 1
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Link {
    volume: u8,
    slot: u16,
}

/// Linked-volume archive reader
pub struct AldArchive<R = BufReader<File>> {
    volumes: Vec<Option<R>>,
    table: EntryTable,
}

fn read_u24_sector(head: &[u8], index: usize) -> Option<u32> {
    let b = head.get(index * 3..index * 3 + 3)?;
    Some(u32::from_le_bytes([b[0], b[1], b[2], 0]))
}

impl<R> AldArchive<R> {
    /// Whether `head` could be the start of an ALD volume
    ///
    /// ALD volumes carry no signature, so this checks that the first two sector numbers describe a plausible
    /// pointer table followed by a link map.
    pub fn looks_like(head: &[u8]) -> bool {
        match (read_u24_sector(head, 0), read_u24_sector(head, 1)) {
            (Some(map), Some(first)) => {
                (1..=MAX_TABLE_SECTORS).contains(&map)
                    && first > map
                    && first - map <= MAX_TABLE_SECTORS
            }
            _ => false,
        }
    }
}

impl AldArchive<BufReader<File>> {
    /// Open a linked-volume archive through any of its volumes
    ///
    /// Volumes share a name and differ in the letter before the extension, `gameA.ald` to `gameZ.ald`. Missing
    /// volumes are tolerated, their entries are left out.
    #[instrument(skip_all, fields(path = %path.as_ref().display()), err)]
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let (paths, given) = volume_paths(path)?;

        let mut volumes = Vec::with_capacity(paths.len());
        for path in &paths {
            volumes.push(match path {
                Some(path) => Some(BufReader::new(File::open(path)?)),
                None => None,
            });
        }
        debug!(
            "found volumes {:?}",
            paths.iter().flatten().collect::<Vec<_>>()
        );
        Self::from_volumes(volumes, given)
    }
}

/// Find the sibling volumes of `path`, returning them with the index of `path` among them
fn volume_paths(path: &Path) -> Result<(Vec<Option<PathBuf>>, usize)> {
    let stem = path
        .file_stem()
        .and_then(OsStr::to_str)
        .ok_or_else(|| Error::Corrupt(format!("{} is not a volume name", path.display())))?;
    let letter = stem
        .chars()
        .last()
        .filter(char::is_ascii_alphabetic)
        .ok_or_else(|| {
            Error::Corrupt(format!("{} does not end in a volume letter", path.display()))
        })?;
    let prefix = &stem[..stem.len() - 1];
    let extension = path.extension().and_then(OsStr::to_str).unwrap_or("ald");
    let dir = path.parent().unwrap_or(Path::new(""));

    let paths = ('A'..='Z')
        .map(|l| {
            let l = if letter.is_ascii_lowercase() {
                l.to_ascii_lowercase()
            } else {
                l
            };
            let candidate = dir.join(format!("{prefix}{l}.{extension}"));
            candidate.is_file().then_some(candidate)
        })
        .collect();
    let given = (letter.to_ascii_uppercase() as u8 - b'A') as usize;
    Ok((paths, given))
}

fn read_pointers<R: Read + Seek>(reader: &mut R) -> Result<Vec<u32>> {
    let len = reader.seek(SeekFrom::End(0))?;
    reader.seek(SeekFrom::Start(0))?;

    let map = reader.read_u24::<LittleEndian>()?;
    let table_len = map as u64 * SECTOR_SIZE;
    if map == 0 || table_len > len {
        return Err(Error::Corrupt(format!("pointer table of {map} sectors")));
    }

    let mut pointers = Vec::with_capacity((table_len / 3) as usize);
    pointers.push(map);
    for _ in 1..table_len / 3 {
        pointers.push(reader.read_u24::<LittleEndian>()?);
    }
    Ok(pointers)
}

fn volume_letter(volume: usize) -> char {
    (b'A' + volume as u8) as char
}

fn read_links<R: Read + Seek>(reader: &mut R, pointers: &[u32]) -> Result<Vec<Link>> {
    let (start, end) = match pointers {
        [start, end, ..] if end > start => (*start as u64, *end as u64),
        _ => return Err(Error::Corrupt("missing link map".into())),
    };

    let raw = BlockReader::new(
        reader,
        start * SECTOR_SIZE,
        (end - start) * SECTOR_SIZE,
        CompressionMethod::None,
    )?
    .read_exactly((end - start) * SECTOR_SIZE)?;

    Ok(raw
        .chunks_exact(3)
        .map(|r| Link {
            volume: r[0],
            slot: u16::from_le_bytes([r[1], r[2]]),
        })
        .take_while(|link| link.volume != 0)
        .collect())
}

impl<R: Read + Seek> AldArchive<R> {
    /// Build an archive from its volumes in letter order, reading the link map from volume `main`
    pub fn from_volumes(mut volumes: Vec<Option<R>>, main: usize) -> Result<Self> {
        if volumes.len() > MAX_VOLUMES {
            return Err(Error::Corrupt(format!("{} volumes", volumes.len())));
        }

        let mut pointers = Vec::with_capacity(volumes.len());
        for volume in volumes.iter_mut() {
            pointers.push(match volume {
                Some(reader) => read_pointers(reader)?,
                None => Vec::new(),
            });
        }

        let links = match volumes.get_mut(main) {
            Some(Some(reader)) => read_links(reader, &pointers[main])?,
            _ => return Err(Error::Corrupt(format!("volume {main} is missing"))),
        };

        let mut table = EntryTable::with_capacity(links.len());
        for (n, Link { volume, slot }) in links.into_iter().enumerate() {
            let v = volume as usize - 1;
            let reader = match volumes.get_mut(v) {
                Some(Some(reader)) => reader,
                Some(None) => {
                    warn!("skipping entry {n}, volume {} is missing", volume_letter(v));
                    // keeps the following entries at their link map position
                    table.push(
                        "",
                        0,
                        Location {
                            volume: v,
                            offset: 0,
                        },
                    );
                    continue;
                }
                None => return Err(Error::Corrupt(format!("entry {n} names volume {volume}"))),
            };
            let sector = match pointers[v].get(slot as usize) {
                Some(sector) if *sector > 0 => *sector as u64,
                _ => {
                    return Err(Error::Corrupt(format!(
                        "entry {n} names missing slot {slot} of volume {volume}"
                    )))
                }
            };

            reader.seek(SeekFrom::Start(sector * SECTOR_SIZE))?;
            let header = AldEntryHeader::read(reader)?;
            table.push(
                decode_name(&header.name),
                header.size as u64,
                Location {
                    volume: v,
                    offset: sector * SECTOR_SIZE + header.header_size as u64,
                },
            );
        }
        debug!("ALD with {} entries", table.len());

        Ok(AldArchive { volumes, table })
    }
}

impl<R: Read + Seek> Archive for AldArchive<R> {
    fn format(&self) -> ArchiveFormat {
        ArchiveFormat::Ald
    }

    fn table(&self) -> &EntryTable {
        &self.table
    }

    fn table_mut(&mut self) -> &mut EntryTable {
        &mut self.table
    }

    fn read_entry(&mut self, location: Location, size: u64) -> Result<Vec<u8>> {
        let reader = self
            .volumes
            .get_mut(location.volume)
            .and_then(Option::as_mut)
            .ok_or(Error::MissingVolume(volume_letter(location.volume)))?;
        Ok(
            BlockReader::new(reader, location.offset, size, CompressionMethod::None)?
                .read_exactly(size)?,
        )
    }
}

#[cfg(test)]
mod test {
    use std::io::Cursor;

    use pretty_assertions::assert_eq;
    use tracing_test::traced_test;

    use super::{AldArchive, SECTOR_SIZE};
    use crate::{
        archive::Archive,
        error::{Error, Result},
    };

    fn sector_pad(out: &mut Vec<u8>) {
        out.resize((out.len() as u64).next_multiple_of(SECTOR_SIZE) as usize, 0);
    }

    /// A volume with one sector of pointers and one sector of links
    fn volume(entries: &[(&str, &[u8])], links: &[(u8, u16)]) -> Vec<u8> {
        let mut body = Vec::new();
        let mut pointers = vec![1u32];
        for (name, data) in entries {
            pointers.push(2 + (body.len() as u64 / SECTOR_SIZE) as u32);
            let header_size = (16 + name.len() + 1).next_multiple_of(16);
            body.extend((header_size as u32).to_le_bytes());
            body.extend((data.len() as u32).to_le_bytes());
            body.extend(0u64.to_le_bytes());
            body.extend(name.as_bytes());
            body.resize(body.len() + header_size - 16 - name.len(), 0);
            body.extend(*data);
            sector_pad(&mut body);
        }
        if entries.is_empty() {
            pointers.push(2);
        }

        let mut out: Vec<u8> = pointers
            .iter()
            .flat_map(|p| p.to_le_bytes().into_iter().take(3))
            .collect();
        sector_pad(&mut out);
        for (volume, slot) in links {
            out.push(*volume);
            out.extend(slot.to_le_bytes());
        }
        out.extend([0, 0, 0]);
        sector_pad(&mut out);
        out.extend(body);
        out
    }

    #[test]
    fn sniffing() {
        let a = volume(&[], &[]);
        assert!(AldArchive::<Cursor<Vec<u8>>>::looks_like(&a));
        assert!(!AldArchive::<Cursor<Vec<u8>>>::looks_like(b"\0\0\0\x01\0\0"));
        assert!(!AldArchive::<Cursor<Vec<u8>>>::looks_like(b"PK\x03\x04\0\0"));
        assert!(!AldArchive::<Cursor<Vec<u8>>>::looks_like(b"\x01\0"));
    }

    #[test]
    fn links_span_volumes() -> Result<()> {
        let links = [(2, 1), (1, 1), (1, 2)];
        let a = volume(&[("a1.qnt", b"first"), ("a2.ogg", b"second")], &links);
        let b = volume(&[("b1.qnt", b"other")], &links);

        let mut archive = AldArchive::from_volumes(
            vec![Some(Cursor::new(a)), Some(Cursor::new(b))],
            0,
        )?;

        let names: Vec<_> = archive.entries().iter().map(|e| e.name()).collect();
        assert_eq!(names, ["b1.qnt", "a1.qnt", "a2.ogg"]);
        assert_eq!(archive.by_index(0)?.location().volume, 1);
        assert_eq!(&*archive.load(0)?, b"other");
        assert_eq!(&*archive.load(2)?, b"second");

        Ok(())
    }

    #[test]
    #[traced_test]
    fn missing_volume_keeps_positions() -> Result<()> {
        let links = [(1, 1), (2, 1), (1, 2)];
        let a = volume(&[("a1", b"x"), ("a2", b"y")], &links);

        let mut archive = AldArchive::from_volumes(vec![Some(Cursor::new(a)), None], 0)?;
        assert_eq!(archive.len(), 3);
        assert_eq!(archive.by_index(0)?.name(), "a1");
        assert_eq!(archive.by_index(2)?.name(), "a2");
        assert_eq!(archive.by_name("a2")?.index(), 2);
        assert!(logs_contain("volume B is missing"));

        assert_eq!(archive.by_index(1)?.name(), "");
        assert!(matches!(archive.load(1), Err(Error::MissingVolume('B'))));
        assert_eq!(&*archive.load(2)?, b"y");

        Ok(())
    }

    #[test]
    fn link_to_unknown_slot() {
        let a = volume(&[("a1", b"x")], &[(1, 5)]);
        assert!(AldArchive::from_volumes(vec![Some(Cursor::new(a))], 0).is_err());
    }

    #[test]
    fn link_to_unknown_volume() {
        let a = volume(&[("a1", b"x")], &[(3, 1)]);
        assert!(AldArchive::from_volumes(vec![Some(Cursor::new(a))], 0).is_err());
    }
}
