//! Error types that can be emitted from this library

use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

/// Error type for library
#[derive(Error, Diagnostic, Debug)]
pub enum Error {
    /// Transparent wrapper for [`std::io::Error`]
    #[error(transparent)]
    IOError(#[from] std::io::Error),

    /// Transparent wrapper for [`binrw::Error`]
    #[error(transparent)]
    BinRWError(#[from] binrw::Error),

    /// Transparent wrapper for [`alice_cg::error::Error`]
    #[error(transparent)]
    #[diagnostic(transparent)]
    ImageError(#[from] alice_cg::error::Error),

    /// Transparent wrapper for [`alice_ex::error::Error`]
    #[error(transparent)]
    #[diagnostic(transparent)]
    ExError(#[from] alice_ex::error::Error),

    /// {0}
    #[error("{0}")]
    WinnowError(winnow::error::ErrMode<winnow::error::ContextError>),

    /// the container signature is not one of the supported formats
    #[error("unrecognized archive format")]
    #[diagnostic(help("supported archives are AFA, ALD, ALK and FLAT"))]
    UnknownFormat,

    /// the container signature was recognized but its structure is invalid
    #[error("corrupt archive: {0}")]
    Corrupt(String),

    /// the volume file holding an entry of a linked-volume archive was not found
    #[error("volume {0} is missing")]
    #[diagnostic(help("volumes are expected next to each other, named A to Z"))]
    MissingVolume(char),

    /// the archive format can not be opened from memory
    #[error("{0} archives can not be opened from memory")]
    Unsupported(&'static str),

    /// unable to find requested file
    #[error(transparent)]
    #[diagnostic(transparent)]
    FileNotFound(#[from] FileNotFoundError),

    /// an entry name has no Shift-JIS representation
    #[error("{0:?} can not be stored as Shift-JIS")]
    Unencodable(String),

    /// a size or offset does not fit the 32 bit field of the format
    #[error("{0} exceeds the 4 GiB limit of AFA archives")]
    TooLarge(String),

    /// the output path exists and overwriting was not allowed
    #[error("{} already exists", .0.display())]
    #[diagnostic(help("pass --force to overwrite existing files"))]
    Conflict(PathBuf),
}

/// Error type to provide further information when a file has not been found
#[derive(Error, Diagnostic, Debug)]
pub enum FileNotFoundError {
    /// index out of range
    #[error("index {index} is out of range for an archive of {len} entries")]
    IndexOutOfRange {
        /// The requested index
        index: usize,
        /// Number of entries in the archive
        len: usize,
    },

    /// no entry with the name
    #[error("no entry named {0:?}")]
    Name(String),
}

impl From<winnow::error::ErrMode<winnow::error::ContextError>> for Error {
    fn from(value: winnow::error::ErrMode<winnow::error::ContextError>) -> Self {
        Error::WinnowError(value)
    }
}

/// Generic result type with crate's Error as its error variant
pub type Result<T> = core::result::Result<T, Error>;
