//! Error types that can be emitted from this library

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

    /// Transparent wrapper for [`image::ImageError`]
    #[error(transparent)]
    ImageError(#[from] image::ImageError),

    /// the payload is not an image format this library knows
    #[error("unrecognized image payload")]
    #[diagnostic(help("supported payloads are QNT, PNG, WEBP and JPEG"))]
    Unrecognized,

    /// the QNT pixel or alpha planes are inconsistent with the header
    #[error("corrupt QNT image: {0}")]
    CorruptQnt(String),

    /// the image dimensions can not be stored
    #[error("image of {width}x{height} pixels is too large")]
    TooLarge {
        /// Width in pixels
        width: u32,
        /// Height in pixels
        height: u32,
    },
}

/// Generic result type with crate's Error as its error variant
pub type Result<T> = core::result::Result<T, Error>;
