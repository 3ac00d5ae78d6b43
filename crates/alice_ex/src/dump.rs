//! Text projection of EX documents
//!
//! The dump is meant for reading and diffing, it is not parsed back. Every top level block is rendered as
//! `type name = value;` where composite values span several lines:
//!
//! ```text
//! int version = 3;
//! table items = {
//!     { int id, string name, table tags { string tag } },
//!     { 1, "sword", {
//!         { string tag },
//!         { "sharp" },
//!     } },
//! };
//! list path = {
//!     1,
//!     2.5,
//! };
//! tree menu = {
//!     start = (label = "Start");
//! };
//! ```

use std::{
    collections::HashMap,
    fmt::Write as _,
    fs::File,
    io::{self, Write},
    path::{Path, PathBuf},
};

use encoding_rs::Encoding;
use tracing::{debug, info, instrument};

use crate::{
    document::ExFile,
    error::{Error, Result},
    types::{ExBlock, ExField, ExTable, ExTree, ExValue},
};

const INDENT: &str = "    ";

/// Extension of the per-block files written by [`ExFile::dump_split`]
pub const SPLIT_EXTENSION: &str = "x";

struct Printer {
    out: String,
}

impl Printer {
    fn new() -> Self {
        Self { out: String::new() }
    }

    fn indent(&mut self, depth: usize) {
        for _ in 0..depth {
            self.out.push_str(INDENT);
        }
    }

    fn block(&mut self, block: &ExBlock) {
        let _ = write!(self.out, "{} ", block.value.kind());
        self.name(&block.name);
        self.out.push_str(" = ");
        self.value(&block.value, 0);
        self.out.push_str(";\n");
    }

    fn name(&mut self, name: &str) {
        let plain = !name.is_empty()
            && name
                .chars()
                .all(|c| !c.is_whitespace() && !c.is_control() && !"\"{}()=,;".contains(c));
        if plain {
            self.out.push_str(name);
        } else {
            self.string(name);
        }
    }

    fn string(&mut self, text: &str) {
        self.out.push('"');
        for c in text.chars() {
            match c {
                '"' => self.out.push_str("\\\""),
                '\\' => self.out.push_str("\\\\"),
                '\n' => self.out.push_str("\\n"),
                '\r' => self.out.push_str("\\r"),
                '\t' => self.out.push_str("\\t"),
                c if c.is_control() => {
                    let _ = write!(self.out, "\\u{{{:x}}}", c as u32);
                }
                c => self.out.push(c),
            }
        }
        self.out.push('"');
    }

    fn value(&mut self, value: &ExValue, depth: usize) {
        match value {
            ExValue::Int(i) => {
                let _ = write!(self.out, "{i}");
            }
            ExValue::Float(f) => {
                let _ = write!(self.out, "{f:?}");
            }
            ExValue::String(s) => self.string(s),
            ExValue::Table(t) => self.table(t, depth),
            ExValue::List(l) => {
                self.out.push_str("{\n");
                for item in l.iter() {
                    self.indent(depth + 1);
                    self.value(item, depth + 1);
                    self.out.push_str(",\n");
                }
                self.indent(depth);
                self.out.push('}');
            }
            ExValue::Tree(t) => self.tree(t, depth),
        }
    }

    fn fields(&mut self, fields: &[ExField]) {
        self.out.push_str("{ ");
        for (i, field) in fields.iter().enumerate() {
            if i > 0 {
                self.out.push_str(", ");
            }
            let _ = write!(self.out, "{} ", field.kind);
            self.name(&field.name);
            if field.describes_tables() {
                self.out.push(' ');
                self.fields(&field.subfields);
            }
        }
        self.out.push_str(" }");
    }

    fn table(&mut self, table: &ExTable, depth: usize) {
        let view = table.view(None);

        self.out.push_str("{\n");
        self.indent(depth + 1);
        self.fields(view.fields);
        self.out.push_str(",\n");

        for row in view.rows() {
            self.indent(depth + 1);
            self.out.push_str("{ ");
            for (i, cell) in row.iter().enumerate() {
                if i > 0 {
                    self.out.push_str(", ");
                }
                self.value(cell, depth + 1);
            }
            self.out.push_str(" },\n");
        }

        self.indent(depth);
        self.out.push('}');
    }

    fn tree(&mut self, tree: &ExTree, depth: usize) {
        match tree {
            ExTree::Leaf { name, value } => {
                self.out.push('(');
                self.name(name);
                self.out.push_str(" = ");
                self.value(value, depth);
                self.out.push(')');
            }
            ExTree::Interior(children) => {
                self.out.push_str("{\n");
                for child in children {
                    self.indent(depth + 1);
                    self.name(&child.name);
                    self.out.push_str(" = ");
                    self.value(&child.value, depth + 1);
                    self.out.push_str(";\n");
                }
                self.indent(depth);
                self.out.push('}');
            }
        }
    }
}

fn encode(text: &str, encoding: &'static Encoding) -> Result<Vec<u8>> {
    let (bytes, _, unmappable) = encoding.encode(text);
    if unmappable {
        let offending = text
            .chars()
            .find(|c| encoding.encode(c.encode_utf8(&mut [0; 4])).2)
            .map(String::from)
            .unwrap_or_default();
        return Err(Error::Unencodable {
            text: offending,
            encoding: encoding.name(),
        });
    }
    Ok(bytes.into_owned())
}

/// Render a single block
pub fn render_block(block: &ExBlock) -> String {
    let mut printer = Printer::new();
    printer.block(block);
    printer.out
}

/// Turn a block name into a file stem which is safe on every platform
///
/// Path separators, characters reserved on Windows and control characters are replaced with `_`, as are the
/// names `.` and `..`.
pub fn sanitize_stem(name: &str) -> String {
    let stem: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();

    match stem.as_str() {
        "" | "." | ".." => "_".repeat(stem.len().max(1)),
        _ => stem,
    }
}

impl ExFile {
    /// Render the whole document as text
    pub fn to_text(&self) -> String {
        let mut printer = Printer::new();
        for block in self.blocks() {
            printer.block(block);
        }
        printer.out
    }

    /// Write the text projection, encoded in `encoding`
    #[instrument(skip_all, fields(blocks = self.len(), encoding = encoding.name()), err)]
    pub fn dump<W: Write>(&self, mut writer: W, encoding: &'static Encoding) -> Result<()> {
        writer.write_all(&encode(&self.to_text(), encoding)?)?;
        Ok(())
    }

    /// Write one `<stem>.x` file per block into `dir`, and an `#include` line per block to `index`
    ///
    /// Block names are sanitized into file stems. When two blocks map to the same stem, compared without
    /// regard to case, nothing is written and [`Error::SplitCollision`] is returned. Every block is rendered
    /// before the first file is created. Existing files are only replaced when `force` is set, otherwise
    /// [`Error::Exists`] is returned.
    #[instrument(skip(self, index, encoding), fields(blocks = self.len(), encoding = encoding.name()), err)]
    pub fn dump_split<W: Write>(
        &self,
        mut index: W,
        dir: &Path,
        encoding: &'static Encoding,
        force: bool,
    ) -> Result<Vec<PathBuf>> {
        let mut seen: HashMap<String, &str> = HashMap::new();
        let mut files = Vec::with_capacity(self.len());
        for block in self.blocks() {
            let stem = sanitize_stem(&block.name);
            if let Some(first) = seen.insert(stem.to_lowercase(), &block.name) {
                return Err(Error::SplitCollision {
                    first: first.to_owned(),
                    second: block.name.clone(),
                    stem,
                });
            }
            let file_name = format!("{stem}.{SPLIT_EXTENSION}");
            let include = encode(&format!("#include \"{file_name}\"\n"), encoding)?;
            files.push((file_name, encode(&render_block(block), encoding)?, include));
        }

        std::fs::create_dir_all(dir)?;

        let mut written = Vec::with_capacity(files.len());
        for (file_name, contents, include) in files {
            let path = dir.join(&file_name);
            debug!("writing {}", path.display());
            let file = if force {
                File::create(&path)
            } else {
                File::create_new(&path)
            };
            let mut file = match file {
                Ok(file) => file,
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                    return Err(Error::Exists(path))
                }
                Err(e) => return Err(e.into()),
            };
            file.write_all(&contents)?;

            index.write_all(&include)?;
            written.push(path);
        }

        info!("wrote {} block files to {}", written.len(), dir.display());
        Ok(written)
    }
}
