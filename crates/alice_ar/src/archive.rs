//! The format independent archive interface and the sniffing entry points.

use std::{
    fmt,
    fs::File,
    io::{BufReader, Cursor, Read},
    ops::Deref,
    path::Path,
    sync::Arc,
};

use tracing::{debug, info, instrument};

use crate::{
    descriptor::{Descriptor, EntryTable, Location},
    drivers::{afa::AfaArchive, ald::AldArchive, alk::AlkArchive, flat::FlatArchive},
    error::{Error, FileNotFoundError, Result},
};

/// Physical container layouts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArchiveFormat {
    /// Index-keyed archive with a compressed table of contents
    Afa,
    /// Linked-volume archive spread over up to 26 files
    Ald,
    /// Nameless index-keyed archive
    Alk,
    /// Flat-concatenated archive, usually nested inside another archive
    Flat,
}

impl ArchiveFormat {
    /// Recognize a container by its first bytes
    pub fn sniff(head: &[u8]) -> Option<ArchiveFormat> {
        if head.starts_with(b"AFAH") {
            Some(ArchiveFormat::Afa)
        } else if head.starts_with(b"ALK0") {
            Some(ArchiveFormat::Alk)
        } else if head.starts_with(b"FLAT") || head.starts_with(b"ELNA") {
            Some(ArchiveFormat::Flat)
        } else if AldArchive::<File>::looks_like(head) {
            Some(ArchiveFormat::Ald)
        } else {
            None
        }
    }
}

impl fmt::Display for ArchiveFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ArchiveFormat::Afa => "AFA",
            ArchiveFormat::Ald => "ALD",
            ArchiveFormat::Alk => "ALK",
            ArchiveFormat::Flat => "FLAT",
        })
    }
}

/// A container of entries, independent of its physical layout
///
/// Drivers provide the entry table and raw reads, everything else is shared.
///
/// ```no_run
/// fn list_archive(path: &str) -> alice_ar::error::Result<()> {
///     let (mut ar, format) = alice_ar::open(path)?;
///     println!("{format} archive");
///
///     for i in 0..ar.len() {
///         let data = ar.load(i)?;
///         println!("{}: {} bytes", ar.by_index(i)?.name(), data.len());
///         ar.release(i);
///     }
///
///     Ok(())
/// }
/// ```
pub trait Archive {
    /// The layout backing this archive, for diagnostics
    fn format(&self) -> ArchiveFormat;

    /// The entry table
    fn table(&self) -> &EntryTable;

    /// The entry table, mutably
    fn table_mut(&mut self) -> &mut EntryTable;

    /// Read `size` bytes at `location` from the backing store
    fn read_entry(&mut self, location: Location, size: u64) -> Result<Vec<u8>>;

    /// All entries in storage order
    fn entries(&self) -> &[Descriptor] {
        self.table().entries()
    }

    /// Number of entries
    fn len(&self) -> usize {
        self.table().len()
    }

    /// Whether the archive has no entries
    fn is_empty(&self) -> bool {
        self.table().is_empty()
    }

    /// Get an entry by index
    fn by_index(&self, index: usize) -> Result<&Descriptor> {
        self.table().get(index)
    }

    /// Search for an entry by name, ignoring case
    fn by_name(&self, name: &str) -> Result<&Descriptor> {
        let index = self
            .table()
            .index_of(name)
            .ok_or_else(|| FileNotFoundError::Name(name.to_owned()))?;
        self.table().get(index)
    }

    /// Load the bytes of an entry, returning the already loaded bytes if there are any
    fn load(&mut self, index: usize) -> Result<Arc<[u8]>> {
        let entry = self.table().get(index)?;
        if let Some(data) = entry.shared_data() {
            return Ok(data);
        }

        let (location, size) = (entry.location, entry.size());
        debug!("loading entry {index} ({size} bytes at {location:?})");
        let data: Arc<[u8]> = self.read_entry(location, size)?.into();
        self.table_mut().get_mut(index)?.set_data(data.clone());
        Ok(data)
    }

    /// Release the bytes of an entry, releasing an unloaded entry does nothing
    fn release(&mut self, index: usize) {
        if let Ok(entry) = self.table_mut().get_mut(index) {
            entry.release();
        }
    }

    /// Release every entry and close the backing store
    fn close(mut self: Box<Self>) {
        self.table_mut().release_all();
    }
}

/// The bytes of an entry, released again when dropped
pub struct LoadedEntry<'a, A: Archive + ?Sized> {
    archive: &'a mut A,
    index: usize,
    data: Arc<[u8]>,
}

impl<'a, A: Archive + ?Sized> LoadedEntry<'a, A> {
    /// Load an entry for the lifetime of the returned value
    pub fn acquire(archive: &'a mut A, index: usize) -> Result<Self> {
        let data = archive.load(index)?;
        Ok(Self {
            archive,
            index,
            data,
        })
    }

    /// The entry's descriptor
    pub fn descriptor(&self) -> &Descriptor {
        &self.archive.entries()[self.index]
    }

    /// A reference to the bytes which outlives this guard
    pub fn shared(&self) -> Arc<[u8]> {
        self.data.clone()
    }
}

impl<A: Archive + ?Sized> Deref for LoadedEntry<'_, A> {
    type Target = [u8];

    fn deref(&self) -> &Self::Target {
        &self.data
    }
}

impl<A: Archive + ?Sized> Drop for LoadedEntry<'_, A> {
    fn drop(&mut self) {
        self.archive.release(self.index);
    }
}

/// Open an archive file, detecting its format from its contents
///
/// For linked-volume archives any volume may be given, the others are found next to it.
#[instrument(skip_all, fields(path = %path.as_ref().display()), err)]
pub fn open(path: impl AsRef<Path>) -> Result<(Box<dyn Archive>, ArchiveFormat)> {
    let path = path.as_ref();

    let mut head = Vec::with_capacity(16);
    File::open(path)?.take(16).read_to_end(&mut head)?;
    let format = ArchiveFormat::sniff(&head).ok_or(Error::UnknownFormat)?;
    info!("opening {} as {format}", path.display());

    let archive: Box<dyn Archive> = match format {
        ArchiveFormat::Afa => Box::new(AfaArchive::new(BufReader::new(File::open(path)?))?),
        ArchiveFormat::Alk => Box::new(AlkArchive::new(BufReader::new(File::open(path)?))?),
        ArchiveFormat::Flat => Box::new(FlatArchive::new(std::fs::read(path)?.into())?),
        ArchiveFormat::Ald => Box::new(AldArchive::<BufReader<File>>::open(path)?),
    };
    Ok((archive, format))
}

/// Open an archive held in memory, usually the bytes of an entry of another archive
///
/// The returned archive keeps its own reference to `data`.
#[instrument(skip_all, fields(size = data.len()), err)]
pub fn open_shared(data: Arc<[u8]>) -> Result<(Box<dyn Archive>, ArchiveFormat)> {
    let format = ArchiveFormat::sniff(&data).ok_or(Error::UnknownFormat)?;

    let archive: Box<dyn Archive> = match format {
        ArchiveFormat::Afa => Box::new(AfaArchive::new(Cursor::new(data))?),
        ArchiveFormat::Alk => Box::new(AlkArchive::new(Cursor::new(data))?),
        ArchiveFormat::Flat => Box::new(FlatArchive::new(data)?),
        ArchiveFormat::Ald => return Err(Error::Unsupported("ALD")),
    };
    Ok((archive, format))
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use super::ArchiveFormat;

    #[test]
    fn sniff_signatures() {
        assert_eq!(ArchiveFormat::sniff(b"AFAH\x1c\0\0\0"), Some(ArchiveFormat::Afa));
        assert_eq!(ArchiveFormat::sniff(b"ALK0\0\0\0\0"), Some(ArchiveFormat::Alk));
        assert_eq!(ArchiveFormat::sniff(b"FLAT\0\0\0\0"), Some(ArchiveFormat::Flat));
        assert_eq!(ArchiveFormat::sniff(b"ELNA\0\0\0\0"), Some(ArchiveFormat::Flat));
        assert_eq!(ArchiveFormat::sniff(b"PK\x03\x04"), None);
        assert_eq!(ArchiveFormat::sniff(b""), None);
    }
}
