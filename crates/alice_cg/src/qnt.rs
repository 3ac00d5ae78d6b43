//! Reading and writing QNT images
//!
//! QNT stores RGB as three zlib compressed planes and an optional alpha plane. Both are run through a
//! prediction filter: the first row predicts from the left neighbour, the first column from the pixel above,
//! and every other pixel from the average of the two. The colour planes are additionally interleaved in 2x2
//! blocks over a canvas rounded up to even dimensions.

use std::io::{Cursor, Read, Write};

use binrw::{BinRead, BinWrite};
use flate2::{read::ZlibDecoder, write::ZlibEncoder, Compression};
use image::RgbaImage;
use tracing::{debug, instrument};

use crate::error::{Error, Result};

/// Magic number at the start of every QNT image
pub const MAGIC: &[u8; 4] = b"QNT\0";

/// Largest width or height accepted
pub const MAX_DIMENSION: u32 = 16384;

/// Header size used when writing
const WRITE_HEADER_SIZE: u32 = 68;

/// QNT file header
#[derive(BinRead, BinWrite, Debug, Clone, PartialEq)]
#[brw(magic = b"QNT\0", little)]
pub struct QntHeader {
    /// Format version
    pub version: u32,

    /// Offset of the pixel data, only stored from version 1 on
    #[br(if(version > 0, 48))]
    #[bw(if(*version > 0))]
    pub header_size: u32,

    /// Horizontal display offset
    pub x: u32,
    /// Vertical display offset
    pub y: u32,
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// Bits per pixel, always 24
    pub bpp: u32,
    /// Unused
    pub reserved: u32,
    /// Size of the compressed colour planes
    pub pixel_size: u32,
    /// Size of the compressed alpha plane, 0 when the image is opaque
    pub alpha_size: u32,
}

impl QntHeader {
    fn padded(&self) -> (usize, usize) {
        (
            (self.width as usize + 1) & !1,
            (self.height as usize + 1) & !1,
        )
    }
}

fn average(up: u8, left: u8) -> u8 {
    ((up as u16 + left as u16) >> 1) as u8
}

fn unfilter(plane: &mut [u8], w: usize, h: usize) {
    if w == 0 || h == 0 {
        return;
    }
    for x in 1..w {
        plane[x] = plane[x - 1].wrapping_sub(plane[x]);
    }
    for y in 1..h {
        let row = y * w;
        plane[row] = plane[row - w].wrapping_sub(plane[row]);
        for x in 1..w {
            let predicted = average(plane[row - w + x], plane[row + x - 1]);
            plane[row + x] = predicted.wrapping_sub(plane[row + x]);
        }
    }
}

fn filter(plane: &[u8], w: usize, h: usize) -> Vec<u8> {
    let mut out = plane.to_vec();
    if w == 0 || h == 0 {
        return out;
    }
    for x in 1..w {
        out[x] = plane[x - 1].wrapping_sub(plane[x]);
    }
    for y in 1..h {
        let row = y * w;
        out[row] = plane[row - w].wrapping_sub(plane[row]);
        for x in 1..w {
            let predicted = average(plane[row - w + x], plane[row + x - 1]);
            out[row + x] = predicted.wrapping_sub(plane[row + x]);
        }
    }
    out
}

/// Positions, in plane order, of the values of one 2x2 block
fn block_order(w: usize, h: usize) -> impl Iterator<Item = usize> {
    (0..h).step_by(2).flat_map(move |y| {
        (0..w)
            .step_by(2)
            .flat_map(move |x| [y * w + x, (y + 1) * w + x, y * w + x + 1, (y + 1) * w + x + 1])
    })
}

fn inflate(stored: &[u8], expected: usize, what: &str) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(expected);
    ZlibDecoder::new(stored)
        .take(expected as u64 + 1)
        .read_to_end(&mut out)
        .map_err(|e| Error::CorruptQnt(format!("{what}: {e}")))?;
    if out.len() != expected {
        return Err(Error::CorruptQnt(format!(
            "{what} inflated to {} bytes, expected {expected}",
            out.len()
        )));
    }
    Ok(out)
}

fn deflate(data: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data)?;
    Ok(encoder.finish()?)
}

fn section<'a>(data: &'a [u8], start: usize, len: u32, what: &str) -> Result<&'a [u8]> {
    start
        .checked_add(len as usize)
        .and_then(|end| data.get(start..end))
        .ok_or_else(|| Error::CorruptQnt(format!("{what} extends past the end of the file")))
}

/// Decode a QNT image
#[instrument(skip_all, fields(size = data.len()), err)]
pub fn decode(data: &[u8]) -> Result<RgbaImage> {
    let header = QntHeader::read(&mut Cursor::new(data))?;
    let (pw, ph) = header.padded();
    if header.width > MAX_DIMENSION || header.height > MAX_DIMENSION {
        return Err(Error::TooLarge {
            width: header.width,
            height: header.height,
        });
    }
    let area = pw * ph;
    debug!(
        "QNT v{} {}x{}, {} pixel bytes, {} alpha bytes",
        header.version, header.width, header.height, header.pixel_size, header.alpha_size
    );

    let pixel_start = header.header_size as usize;
    let pixels = section(data, pixel_start, header.pixel_size, "pixel data")?;
    let alpha = section(
        data,
        pixel_start + header.pixel_size as usize,
        header.alpha_size,
        "alpha data",
    )?;

    // planes in R, G, B, A order
    let mut planes = [vec![0; area], vec![0; area], vec![0; area], vec![0xff; area]];

    if header.pixel_size > 0 && area > 0 {
        let raw = inflate(pixels, area * 3, "pixel data")?;
        for (channel, chunk) in [2, 1, 0].into_iter().zip(raw.chunks_exact(area)) {
            for (pos, value) in block_order(pw, ph).zip(chunk) {
                planes[channel][pos] = *value;
            }
        }
        for plane in &mut planes[..3] {
            unfilter(plane, pw, ph);
        }
    }

    if header.alpha_size > 0 {
        planes[3] = inflate(alpha, area, "alpha data")?;
        unfilter(&mut planes[3], pw, ph);
    }

    Ok(RgbaImage::from_fn(header.width, header.height, |x, y| {
        let pos = y as usize * pw + x as usize;
        image::Rgba([planes[0][pos], planes[1][pos], planes[2][pos], planes[3][pos]])
    }))
}

/// Encode an image as QNT
///
/// The alpha plane is only stored when some pixel is not fully opaque.
#[instrument(skip_all, fields(width = image.width(), height = image.height()), err)]
pub fn encode(image: &RgbaImage) -> Result<Vec<u8>> {
    let mut header = QntHeader {
        version: 1,
        header_size: WRITE_HEADER_SIZE,
        x: 0,
        y: 0,
        width: image.width(),
        height: image.height(),
        bpp: 24,
        reserved: 0,
        pixel_size: 0,
        alpha_size: 0,
    };
    if header.width > MAX_DIMENSION || header.height > MAX_DIMENSION {
        return Err(Error::TooLarge {
            width: header.width,
            height: header.height,
        });
    }
    let (pw, ph) = header.padded();
    let area = pw * ph;

    let mut planes = [vec![0; area], vec![0; area], vec![0; area], vec![0xff; area]];
    for (x, y, pixel) in image.enumerate_pixels() {
        let pos = y as usize * pw + x as usize;
        for (plane, value) in planes.iter_mut().zip(pixel.0) {
            plane[pos] = value;
        }
    }

    let mut raw = Vec::with_capacity(area * 3);
    for channel in [2, 1, 0] {
        let filtered = filter(&planes[channel], pw, ph);
        raw.extend(block_order(pw, ph).map(|pos| filtered[pos]));
    }
    let pixels = deflate(&raw)?;

    let alpha = if image.pixels().any(|p| p.0[3] != 0xff) {
        deflate(&filter(&planes[3], pw, ph))?
    } else {
        Vec::new()
    };

    header.pixel_size = pixels.len() as u32;
    header.alpha_size = alpha.len() as u32;

    let mut out = Cursor::new(Vec::new());
    header.write(&mut out)?;
    let mut out = out.into_inner();
    out.resize(WRITE_HEADER_SIZE as usize, 0);
    out.extend(pixels);
    out.extend(alpha);
    Ok(out)
}
