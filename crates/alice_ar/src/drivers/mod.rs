//! One [`crate::Archive`] implementation per container layout.

use encoding_rs::SHIFT_JIS;

pub mod afa;
pub mod ald;
pub mod alk;
pub mod flat;

/// Decode an entry name stored in Shift-JIS, replacing malformed sequences
pub(crate) fn decode_name(raw: &[u8]) -> String {
    let end = raw.iter().position(|b| *b == 0).unwrap_or(raw.len());
    SHIFT_JIS
        .decode_without_bom_handling(&raw[..end])
        .0
        .into_owned()
}

/// Bytes needed to pad `len` to a multiple of four
pub(crate) fn padding(len: u32) -> u32 {
    (4 - len % 4) % 4
}
