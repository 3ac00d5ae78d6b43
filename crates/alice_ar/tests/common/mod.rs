//! Builders for small archives of every format.
#![allow(dead_code)]

use std::{
    io::{Cursor, Write},
    path::{Path, PathBuf},
};

use alice_ar::{error::Result, write::AfaWriterOptions, AfaWriter};
use image::{Rgba, RgbaImage};

pub fn afa(entries: &[(&str, &[u8])]) -> Result<Vec<u8>> {
    let mut writer = AfaWriter::new(Cursor::new(Vec::new()), AfaWriterOptions::default());
    for (name, data) in entries {
        writer.start_file(name)?;
        writer.write_all(data)?;
    }
    Ok(writer.finish()?.into_inner())
}

/// An ALK archive, `None` leaves a slot empty
pub fn alk(slots: &[Option<&[u8]>]) -> Vec<u8> {
    let mut out = b"ALK0".to_vec();
    out.extend((slots.len() as u32).to_le_bytes());

    let mut offset = 8 + slots.len() as u32 * 8;
    for slot in slots {
        let size = slot.map_or(0, |s| s.len() as u32);
        out.extend(offset.to_le_bytes());
        out.extend(size.to_le_bytes());
        offset += size;
    }
    for data in slots.iter().flatten() {
        out.extend(*data);
    }
    out
}

fn chunk(tag: &[u8; 4], payload: &[u8]) -> Vec<u8> {
    let mut out = tag.to_vec();
    out.extend((payload.len() as u32).to_le_bytes());
    out.extend(payload);
    out
}

pub fn flat(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut libl = (entries.len() as u32).to_le_bytes().to_vec();
    for (name, data) in entries {
        libl.extend((name.len() as u32).to_le_bytes());
        libl.extend(name.as_bytes());
        libl.resize(libl.len().next_multiple_of(4), 0);
        libl.extend(0u32.to_le_bytes());
        libl.extend((data.len() as u32).to_le_bytes());
        libl.extend(*data);
        libl.resize(libl.len().next_multiple_of(4), 0);
    }

    let mut out = chunk(b"FLAT", &[0; 32]);
    out.extend(chunk(b"LIBL", &libl));
    out
}

const SECTOR: usize = 256;

fn sector_pad(out: &mut Vec<u8>) {
    out.resize(out.len().next_multiple_of(SECTOR), 0);
}

fn ald_volume(entries: &[(&str, &[u8])], links: &[(u8, u16)]) -> Vec<u8> {
    let link_sectors = ((links.len() + 1) * 3).div_ceil(SECTOR);
    let first = 1 + link_sectors;

    let mut body = Vec::new();
    let mut pointers = vec![1u32];
    for (name, data) in entries {
        pointers.push((first + body.len() / SECTOR) as u32);
        let header_size = (16 + name.len() + 1).next_multiple_of(16);
        body.extend((header_size as u32).to_le_bytes());
        body.extend((data.len() as u32).to_le_bytes());
        body.extend(0u64.to_le_bytes());
        body.extend(name.as_bytes());
        body.resize(body.len() + header_size - 16 - name.len(), 0);
        body.extend(*data);
        sector_pad(&mut body);
    }
    if entries.is_empty() {
        pointers.push(first as u32);
    }

    let mut out: Vec<u8> = pointers
        .iter()
        .flat_map(|p| p.to_le_bytes().into_iter().take(3))
        .collect();
    sector_pad(&mut out);
    for (volume, slot) in links {
        out.push(*volume);
        out.extend(slot.to_le_bytes());
    }
    out.extend([0, 0, 0]);
    sector_pad(&mut out);
    out.extend(body);
    out
}

/// Write the volumes `<stem>A.ald`, `<stem>B.ald`, ... to `dir`, leaving out the volumes in `missing`
///
/// Entries are linked volume by volume in order. Returns the path of the first volume written.
pub fn ald(
    dir: &Path,
    stem: &str,
    volumes: &[&[(&str, &[u8])]],
    missing: &[usize],
) -> std::io::Result<PathBuf> {
    let links: Vec<(u8, u16)> = volumes
        .iter()
        .enumerate()
        .flat_map(|(v, entries)| (1..=entries.len()).map(move |slot| (v as u8 + 1, slot as u16)))
        .collect();

    let mut first = None;
    for (v, entries) in volumes.iter().enumerate() {
        if missing.contains(&v) {
            continue;
        }
        let path = dir.join(format!("{stem}{}.ald", (b'A' + v as u8) as char));
        std::fs::write(&path, ald_volume(entries, &links))?;
        first.get_or_insert(path);
    }
    first.ok_or_else(|| std::io::Error::other("no volumes"))
}

/// A 4x3 gradient with a translucent pixel
pub fn image() -> RgbaImage {
    let mut image = RgbaImage::from_fn(4, 3, |x, y| Rgba([x as u8 * 60, y as u8 * 80, 200, 255]));
    image.put_pixel(1, 1, Rgba([1, 2, 3, 128]));
    image
}

pub fn qnt() -> Vec<u8> {
    alice_cg::qnt::encode(&image()).expect("encoding a small image")
}
