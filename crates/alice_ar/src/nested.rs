//! Opening entries that are containers themselves.

use std::sync::Arc;

use alice_ex::ExFile;
use encoding_rs::Encoding;
use tracing::{debug, instrument};

use crate::{
    archive::{open_shared, Archive, ArchiveFormat},
    error::Result,
};

/// The contents of an entry which can be looked into
pub enum Nested {
    /// An archive sharing the entry's bytes
    Archive(Box<dyn Archive>, ArchiveFormat),
    /// A parsed EX document
    Document(ExFile),
}

/// Look into the bytes of an entry
///
/// Returns `None` when the bytes are neither an archive readable from memory nor an EX document. A nested
/// archive holds its own reference to `data`, so releasing the outer entry leaves it usable.
#[instrument(skip_all, fields(size = data.len()), err)]
pub fn open_nested(data: Arc<[u8]>, encoding: &'static Encoding) -> Result<Option<Nested>> {
    if data.starts_with(alice_ex::header::MAGIC) {
        debug!("entry is an EX document");
        return Ok(Some(Nested::Document(ExFile::parse(&data, encoding)?)));
    }

    match ArchiveFormat::sniff(&data) {
        Some(ArchiveFormat::Ald) | None => Ok(None),
        Some(_) => {
            let (archive, format) = open_shared(data)?;
            debug!("entry is a {format} archive with {} entries", archive.len());
            Ok(Some(Nested::Archive(archive, format)))
        }
    }
}
