//! This library handles reading, writing and dumping **EX** files used by *System 4* games.
//!
//! # EX Format Documentation
//!
//! EX files store structured game data (configuration tables, item lists, menu trees) as a sequence of named
//! top level blocks. Every block owns a recursive value which is one of six kinds: integers, floats, strings,
//! tables, lists and trees. EX files are typically identified with the `.ex` extension.
//!
//! ## File Structure
//!
//! An EX file consists of a fixed header followed by the block data.
//!
//! | Offset (bytes) | Field                  | Description                                                |
//! |----------------|------------------------|------------------------------------------------------------|
//! | 0x0000         | Magic number           | 4 bytes: "HEAD"                                            |
//! | 0x0004         | Head Size              | 4 bytes: Fixed value 0x0000000C                            |
//! | 0x0008         | Section Marker         | 4 bytes: "EXTF"                                            |
//! | 0x000C         | Version                | 4 bytes: Format version, 1                                 |
//! | 0x0010         | Block Count            | 4 bytes: Number of top level blocks                        |
//! | 0x0014         | Section Marker         | 4 bytes: "DATA"                                            |
//! | 0x0018         | Compression            | 4 bytes: Compression method for the block data             |
//! | 0x001C         | Stored Size            | 4 bytes: Size of the block data in the file                |
//! | 0x0020         | Body Size              | 4 bytes: Size of the block data after decompression        |
//!
//! The compression method is one of:
//!   - `0`: None (no compression)
//!   - `2`: Zlib (compressed with Zlib)
//!
//! ### Block Data
//!
//! The block data is `Block Count` blocks, each made of a string name, a 4 byte type tag and the value
//! payload. Strings are a 4 byte length followed by that many bytes in the text encoding of the game, which is
//! Shift-JIS for most titles.
//!
//! | Tag | Kind   | Payload                                                              |
//! |-----|--------|----------------------------------------------------------------------|
//! | 1   | Int    | 4 bytes: signed integer                                              |
//! | 2   | Float  | 4 bytes: IEEE 754 single precision                                   |
//! | 3   | String | string                                                               |
//! | 4   | Table  | field count, fields, row count, column count, tagged cells row-major |
//! | 5   | List   | item count, tagged items                                             |
//! | 6   | Tree   | leaf flag, child count, then a named value or the named children     |
//!
//! A table field is its type tag, its name and its subfields. When the field is of the Table kind, the tables
//! in its column do not carry their own field count and fields, the subfields describe them instead.
//!
//! A tree node is either a leaf, with flag `1`, a child count of `0`, and a single named tagged value, or an
//! interior node, with flag `0`, followed by `child count` named tagged values.
//!
//! ## Additional Information
//!
//! - **File Extension**: `.ex`
//! - **Endianness**: Little-endian for all multi-byte integers
//!

pub mod document;
pub mod dump;
pub mod error;
pub mod header;
pub mod read;
pub mod types;
mod write;

pub use document::ExFile;
pub use header::CompressionMethod;
pub use read::StructuralWarning;
pub use types::{ExBlock, ExField, ExList, ExTable, ExTree, ExType, ExValue};
