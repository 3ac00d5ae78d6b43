//! Archive entries and the table holding them.

use std::{fmt, sync::Arc};

use indexmap::IndexMap;

use crate::error::{FileNotFoundError, Result};

/// Where the bytes of an entry are stored inside the container
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Location {
    /// Volume holding the entry, 0 for single file containers
    pub volume: usize,
    /// Offset of the first byte of the entry in its volume
    pub offset: u64,
}

/// A single logical entry of an archive
///
/// The descriptor is either unloaded, carrying metadata only, or loaded, holding the entry's bytes. Loaded
/// bytes are shared: archives opened from them keep their own reference, so releasing the descriptor never
/// invalidates them.
#[derive(Clone)]
pub struct Descriptor {
    name: String,
    index: usize,
    size: u64,
    pub(crate) location: Location,
    data: Option<Arc<[u8]>>,
}

impl fmt::Debug for Descriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Descriptor")
            .field("name", &self.name)
            .field("index", &self.index)
            .field("size", &self.size)
            .field("location", &self.location)
            .field("loaded", &self.is_loaded())
            .finish()
    }
}

impl Descriptor {
    /// Get the logical name of the entry
    ///
    /// # Warnings
    ///
    /// It is dangerous to use this name directly when extracting an archive. It may contain an absolute path or
    /// break out of the current directory with `..` components, see [`crate::extract::entry_path`].
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Position of the entry within the archive
    pub fn index(&self) -> usize {
        self.index
    }

    /// Size of the entry in bytes
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Where the entry is stored
    pub fn location(&self) -> Location {
        self.location
    }

    /// Whether the bytes of the entry are held in memory
    pub fn is_loaded(&self) -> bool {
        self.data.is_some()
    }

    /// The loaded bytes
    pub fn data(&self) -> Option<&[u8]> {
        self.data.as_deref()
    }

    /// A new reference to the loaded bytes
    pub fn shared_data(&self) -> Option<Arc<[u8]>> {
        self.data.clone()
    }

    pub(crate) fn set_data(&mut self, data: Arc<[u8]>) {
        self.data = Some(data);
    }

    /// Drop this descriptor's reference to the loaded bytes, releasing an unloaded descriptor does nothing
    pub fn release(&mut self) {
        self.data = None;
    }
}

/// Entries of an archive in storage order, with case-insensitive name lookup
#[derive(Debug, Default)]
pub struct EntryTable {
    entries: Vec<Descriptor>,
    names: IndexMap<String, usize>,
}

impl EntryTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty table with room for `capacity` entries
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
            names: IndexMap::with_capacity(capacity),
        }
    }

    /// Append an entry, returning its index
    ///
    /// When two entries share a name, lookups by name resolve to the first one. Entries without a name can
    /// only be looked up by index.
    pub fn push(&mut self, name: impl Into<String>, size: u64, location: Location) -> usize {
        let index = self.entries.len();
        let name = name.into();
        if !name.is_empty() {
            self.names.entry(name.to_lowercase()).or_insert(index);
        }
        self.entries.push(Descriptor {
            name,
            index,
            size,
            location,
            data: None,
        });
        index
    }

    /// All entries in storage order
    pub fn entries(&self) -> &[Descriptor] {
        &self.entries
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the table has no entries
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Get an entry by index
    pub fn get(&self, index: usize) -> Result<&Descriptor> {
        self.entries.get(index).ok_or_else(|| {
            FileNotFoundError::IndexOutOfRange {
                index,
                len: self.entries.len(),
            }
            .into()
        })
    }

    pub(crate) fn get_mut(&mut self, index: usize) -> Result<&mut Descriptor> {
        let len = self.entries.len();
        self.entries
            .get_mut(index)
            .ok_or_else(|| FileNotFoundError::IndexOutOfRange { index, len }.into())
    }

    /// Get the index of an entry by name, ignoring case
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.names.get(&name.to_lowercase()).copied()
    }

    /// Drop every loaded buffer
    pub fn release_all(&mut self) {
        self.entries.iter_mut().for_each(Descriptor::release);
    }
}
