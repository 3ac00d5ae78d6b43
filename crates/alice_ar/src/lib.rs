//! This library handles reading, extracting and creating the archives used by *System 4* games.
//!
//! # Archive Format Documentation
//!
//! Games ship their assets in a handful of container formats. This crate reads all of them through the
//! [`Archive`] trait, so callers never care which one they hold. The format is recognized from the first bytes
//! of a file, never from its extension.
//!
//! ## AFA
//!
//! The index-keyed archive of newer titles. A header is followed by a zlib compressed table of contents and
//! the `DATA` section holding the entries back to back.
//!
//! | Offset (bytes) | Field                  | Description                                                |
//! |----------------|------------------------|------------------------------------------------------------|
//! | 0x0000         | Magic number           | 4 bytes: "AFAH"                                            |
//! | 0x0004         | Header Size            | 4 bytes: Fixed value 0x0000001C                            |
//! | 0x0008         | Signature              | 8 bytes: "AlicArch"                                        |
//! | 0x0010         | Version                | 4 bytes: 1 or 2                                            |
//! | 0x0014         | Unknown                | 4 bytes: 1                                                 |
//! | 0x0018         | Data Start             | 4 bytes: Offset of the `DATA` section                      |
//! | 0x001C         | Section Marker         | 4 bytes: "INFO"                                            |
//! | 0x0020         | Info Size              | 4 bytes: Size of the `INFO` section                        |
//! | 0x0024         | TOC Size               | 4 bytes: Size of the table of contents when inflated       |
//! | 0x0028         | Entry Count            | 4 bytes: Number of entries                                 |
//!
//! Every table of contents entry holds the name length, the name padded to a multiple of four, a flags field
//! in version 1 only, a Windows file time and the offset and size of the data. Offsets count from the start
//! of the `DATA` section, whose own 8 byte header puts the first entry at offset 8.
//!
//! ## ALD
//!
//! The linked-volume archive of older titles, split over up to 26 files named `gameA.ald` to `gameZ.ald`.
//! Volumes are made of 256 byte sectors. Each one starts with a table of 3 byte sector numbers: the first
//! points at the link map, the others at the entries of the volume. The link map assigns every entry of
//! the archive a volume and a slot in that volume's table. Each entry starts with a header giving its size,
//! a file time and its name.
//!
//! ## ALK
//!
//! A nameless index: `"ALK0"`, a slot count and an offset and size per slot. Empty slots have a size of 0.
//!
//! ## FLAT
//!
//! A chunked container, mostly found inside other archives. Chunks are a 4 byte tag, a 4 byte size and the
//! payload. The first chunk is `FLAT`, the `LIBL` chunk lists the named entries with their data inline.
//! Files written by some tools start with an extra `ELNA` tag.
//!
//! ## Additional Information
//!
//! - **File Extensions**: `.afa`, `.ald`, `.alk`, `.flat`
//! - **Endianness**: Little-endian for all multi-byte integers
//! - **Names**: Shift-JIS
//!

pub mod archive;
pub mod compression;
pub mod descriptor;
pub mod drivers;
pub mod error;
pub mod extract;
pub mod nested;
pub mod toc;
pub mod write;

pub use archive::{open, open_shared, Archive, ArchiveFormat, LoadedEntry};
pub use descriptor::{Descriptor, Location};
pub use write::AfaWriter;
