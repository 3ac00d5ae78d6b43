//! Tables of contents restricting which entries get extracted.
//!
//! A table of contents is a plain text file with one entry name per line. Blank lines are ignored and the
//! order of the names decides the order of extraction.

use std::{fs, path::Path};

use tracing::{debug, instrument};

use crate::error::Result;

/// Split a table of contents into entry names
pub fn parse(text: &str) -> Vec<String> {
    text.split(['\r', '\n'])
        .filter(|line| !line.is_empty())
        .map(str::to_owned)
        .collect()
}

/// Read a table of contents from a file, replacing invalid UTF-8
#[instrument(skip_all, fields(path = %path.as_ref().display()), err)]
pub fn read_path(path: impl AsRef<Path>) -> Result<Vec<String>> {
    let raw = fs::read(path)?;
    let names = parse(&String::from_utf8_lossy(&raw));
    debug!("{} names", names.len());
    Ok(names)
}
