//! Error types that can be emitted from this library

use miette::Diagnostic;
use thiserror::Error;

/// Error type for library
///
/// Every parse failure carries the byte offset (relative to the start of the
/// document body, or of the file for header failures) where it was detected.
#[derive(Error, Diagnostic, Debug)]
pub enum Error {
    /// Transparent wrapper for [`std::io::Error`]
    #[error(transparent)]
    IOError(#[from] std::io::Error),

    /// Transparent wrapper for [`binrw::Error`]
    #[error(transparent)]
    BinRWError(binrw::Error),

    /// Transparent wrapper for [`serde_json::Error`]
    #[cfg(feature = "serde")]
    #[error(transparent)]
    JsonError(#[from] serde_json::Error),

    /// the document does not start with the EX marker
    #[error("file is not an EX document")]
    #[diagnostic(help("EX documents start with HEAD/EXTF/DATA sections"))]
    BadMarker,

    /// input ended before a value was complete
    #[error("input truncated at byte offset {offset}")]
    Truncated {
        /// Offset where more bytes were required
        offset: u64,
    },

    /// a value used a type tag outside of the known set
    #[error("unrecognized type tag {tag} at byte offset {offset}")]
    UnknownTag {
        /// The tag as read
        tag: u32,
        /// Offset of the tag
        offset: u64,
    },

    /// a tree node declared neither leaf nor interior shape
    #[error("malformed tree node discriminator {discriminator} at byte offset {offset}")]
    MalformedTree {
        /// The discriminator as read
        discriminator: u32,
        /// Offset of the discriminator
        offset: u64,
    },

    /// a tree node declared itself a leaf while also listing children
    #[error("tree leaf at byte offset {offset} also declares {children} children")]
    AmbiguousTree {
        /// Number of children the leaf declared
        children: u32,
        /// Offset of the node
        offset: u64,
    },

    /// a count that cannot be satisfied by the remaining input
    #[error("count {count} at byte offset {offset} exceeds the remaining input")]
    CountOverflow {
        /// The count as read
        count: u32,
        /// Offset of the count
        offset: u64,
    },

    /// values nested deeper than the reader allows
    #[error("values nested deeper than {limit} levels at byte offset {offset}")]
    TooDeep {
        /// Maximum nesting depth
        limit: usize,
        /// Offset of the value which exceeded the limit
        offset: u64,
    },

    /// text which is not valid in the declared source encoding
    #[error("text at byte offset {offset} is not valid {encoding}")]
    InvalidText {
        /// Offset of the string bytes
        offset: u64,
        /// Name of the source encoding
        encoding: &'static str,
    },

    /// bytes left over after the declared blocks
    #[error("{count} unread bytes after the last block")]
    TrailingData {
        /// Number of unread bytes
        count: u64,
    },

    /// the compressed body does not inflate to the declared size
    #[error("compressed body is corrupt: {0}")]
    CorruptBody(String),

    /// text that cannot be written in the target encoding
    #[error("text {text:?} cannot be represented in {encoding}")]
    Unencodable {
        /// The offending text
        text: String,
        /// Name of the target encoding
        encoding: &'static str,
    },

    /// rows passed to a table constructor with the wrong width
    #[error("table row {row} has {actual} values, expected {expected}")]
    RaggedTable {
        /// Index of the offending row
        row: usize,
        /// Number of values in the row
        actual: usize,
        /// Number of fields in the table
        expected: usize,
    },

    /// a split output file exists and overwriting was not allowed
    #[error("{} already exists", .0.display())]
    #[diagnostic(help("pass --force to overwrite existing files"))]
    Exists(std::path::PathBuf),

    /// two blocks map to the same output file when dumping split output
    #[error("blocks {first:?} and {second:?} both map to the file stem {stem:?}")]
    SplitCollision {
        /// Name of the first block
        first: String,
        /// Name of the colliding block
        second: String,
        /// The shared, sanitized, file stem
        stem: String,
    },
}

impl Error {
    /// Map a failure to read the fixed header, given the total input length
    pub(crate) fn from_header(err: binrw::Error, len: u64) -> Self {
        match err {
            binrw::Error::Backtrace(bt) => Self::from_header(*bt.error, len),
            binrw::Error::BadMagic { .. } => Error::BadMarker,
            binrw::Error::Io(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                Error::Truncated { offset: len }
            }
            e => Error::BinRWError(e),
        }
    }
}

impl From<binrw::Error> for Error {
    fn from(value: binrw::Error) -> Self {
        Error::BinRWError(value)
    }
}

/// Generic result type with crate's Error as its error variant
pub type Result<T> = core::result::Result<T, Error>;
