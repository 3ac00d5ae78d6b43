//! Recognizing image payloads and converting them between encodings.

use std::{borrow::Cow, fmt, io::Cursor};

use image::{DynamicImage, ImageFormat};
use tracing::{debug, instrument};

use crate::{
    error::{Error, Result},
    qnt,
};

/// Image payloads found in game archives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CgFormat {
    /// The engine's own lossless format
    Qnt,
    /// Portable Network Graphics
    Png,
    /// WebP
    Webp,
    /// JPEG
    Jpeg,
}

impl CgFormat {
    /// Recognize an image payload by its signature
    pub fn detect(data: &[u8]) -> Option<CgFormat> {
        if data.starts_with(qnt::MAGIC) {
            return Some(CgFormat::Qnt);
        }
        match image::guess_format(data).ok()? {
            ImageFormat::Png => Some(CgFormat::Png),
            ImageFormat::WebP => Some(CgFormat::Webp),
            ImageFormat::Jpeg => Some(CgFormat::Jpeg),
            _ => None,
        }
    }

    /// Conventional file extension
    pub fn extension(self) -> &'static str {
        match self {
            CgFormat::Qnt => "qnt",
            CgFormat::Png => "png",
            CgFormat::Webp => "webp",
            CgFormat::Jpeg => "jpg",
        }
    }

    fn image_format(self) -> Option<ImageFormat> {
        match self {
            CgFormat::Qnt => None,
            CgFormat::Png => Some(ImageFormat::Png),
            CgFormat::Webp => Some(ImageFormat::WebP),
            CgFormat::Jpeg => Some(ImageFormat::Jpeg),
        }
    }
}

impl fmt::Display for CgFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CgFormat::Qnt => "QNT",
            CgFormat::Png => "PNG",
            CgFormat::Webp => "WEBP",
            CgFormat::Jpeg => "JPEG",
        })
    }
}

/// Target encodings for transcoding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ImageEncoding {
    /// Portable Network Graphics
    #[default]
    Png,
    /// Lossless WebP
    Webp,
}

impl ImageEncoding {
    /// Conventional file extension
    pub fn extension(self) -> &'static str {
        self.format().extension()
    }

    /// The payload format produced by this encoding
    pub fn format(self) -> CgFormat {
        match self {
            ImageEncoding::Png => CgFormat::Png,
            ImageEncoding::Webp => CgFormat::Webp,
        }
    }
}

/// Decode any recognized image payload
#[instrument(skip_all, fields(size = data.len()), err)]
pub fn decode(data: &[u8]) -> Result<DynamicImage> {
    let format = CgFormat::detect(data).ok_or(Error::Unrecognized)?;
    debug!("decoding {format} payload");
    match format.image_format() {
        None => Ok(DynamicImage::ImageRgba8(qnt::decode(data)?)),
        Some(format) => Ok(image::load_from_memory_with_format(data, format)?),
    }
}

/// Encode an image in `encoding`
pub fn encode(image: &DynamicImage, encoding: ImageEncoding) -> Result<Vec<u8>> {
    let mut bytes = Vec::new();
    match encoding {
        ImageEncoding::Png => image.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)?,
        // the WebP encoder only takes 8 bit RGB(A)
        ImageEncoding::Webp => DynamicImage::ImageRgba8(image.to_rgba8())
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::WebP)?,
    }
    Ok(bytes)
}

/// Convert an image payload to `encoding`
///
/// A payload which is already in the target encoding is returned unchanged.
#[instrument(skip(data), fields(size = data.len()), err)]
pub fn transcode(data: &[u8], encoding: ImageEncoding) -> Result<Cow<'_, [u8]>> {
    if CgFormat::detect(data) == Some(encoding.format()) {
        debug!("payload is already {}", encoding.format());
        return Ok(Cow::Borrowed(data));
    }
    let image = decode(data)?;
    Ok(Cow::Owned(encode(&image, encoding)?))
}

#[cfg(test)]
mod test {
    use std::borrow::Cow;

    use image::{DynamicImage, Rgba, RgbaImage};
    use pretty_assertions::assert_eq;

    use super::{decode, encode, transcode, CgFormat, ImageEncoding};
    use crate::error::{Error, Result};
    use crate::qnt;

    fn checker() -> RgbaImage {
        RgbaImage::from_fn(3, 3, |x, y| {
            if (x + y) % 2 == 0 {
                Rgba([255, 0, 0, 255])
            } else {
                Rgba([0, 0, 255, 128])
            }
        })
    }

    #[test]
    fn detect_formats() -> Result<()> {
        let image = DynamicImage::ImageRgba8(checker());

        assert_eq!(CgFormat::detect(&qnt::encode(&checker())?), Some(CgFormat::Qnt));
        assert_eq!(
            CgFormat::detect(&encode(&image, ImageEncoding::Png)?),
            Some(CgFormat::Png)
        );
        assert_eq!(
            CgFormat::detect(&encode(&image, ImageEncoding::Webp)?),
            Some(CgFormat::Webp)
        );
        assert_eq!(CgFormat::detect(b"plain text"), None);
        assert_eq!(CgFormat::detect(&[]), None);

        Ok(())
    }

    #[test]
    fn qnt_to_png_keeps_pixels() -> Result<()> {
        let data = qnt::encode(&checker())?;
        let png = transcode(&data, ImageEncoding::Png)?;

        assert_eq!(CgFormat::detect(&png), Some(CgFormat::Png));
        assert_eq!(decode(&png)?.to_rgba8(), checker());

        Ok(())
    }

    #[test]
    fn qnt_to_lossless_webp() -> Result<()> {
        let data = qnt::encode(&checker())?;
        let webp = transcode(&data, ImageEncoding::Webp)?;

        assert_eq!(CgFormat::detect(&webp), Some(CgFormat::Webp));
        assert_eq!(decode(&webp)?.to_rgba8(), checker());

        Ok(())
    }

    #[test]
    fn same_encoding_passes_through() -> Result<()> {
        let png = encode(&DynamicImage::ImageRgba8(checker()), ImageEncoding::Png)?;
        assert!(matches!(transcode(&png, ImageEncoding::Png)?, Cow::Borrowed(_)));

        Ok(())
    }

    #[test]
    fn unrecognized_payload() {
        assert!(matches!(
            transcode(b"not an image", ImageEncoding::Png),
            Err(Error::Unrecognized)
        ));
    }
}
