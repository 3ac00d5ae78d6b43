//! This library recognizes and converts the CG images stored in *System 4* game archives.
//!
//! Archives hold images in the engine's own **QNT** format as well as plain PNG, WEBP and JPEG files.
//! [`transcode::transcode`] turns any of them into PNG or lossless WEBP.
//!
//! # QNT Format Documentation
//!
//! | Offset (bytes) | Field                  | Description                                                |
//! |----------------|------------------------|------------------------------------------------------------|
//! | 0x0000         | Magic number           | 4 bytes: "QNT\0"                                           |
//! | 0x0004         | Version                | 4 bytes: Format version                                    |
//! | 0x0008         | Header Size            | 4 bytes: Offset of the pixel data, absent in version 0     |
//! | +0x00          | X, Y                   | 8 bytes: Display offset                                    |
//! | +0x08          | Width, Height          | 8 bytes: Size in pixels                                    |
//! | +0x10          | Bpp, Reserved          | 8 bytes: Always 24, unused                                 |
//! | +0x18          | Pixel Size             | 4 bytes: Size of the compressed colour planes              |
//! | +0x1C          | Alpha Size             | 4 bytes: Size of the compressed alpha plane                |
//!
//! Version 0 files have an implicit header size of 48 bytes. The compressed colour planes follow the header,
//! then the compressed alpha plane. See [`qnt`] for the pixel layout.
//!

pub mod error;
pub mod qnt;
pub mod transcode;

pub use transcode::{transcode, CgFormat, ImageEncoding};
