//! Types for writing EX documents
//!

use byteorder::{LittleEndian, WriteBytesExt};
use encoding_rs::Encoding;
use tracing::instrument;

use crate::{
    error::{Error, Result},
    types::{ExBlock, ExField, ExTable, ExTree, ExValue},
};

/// Serializes block data, the exact inverse of the body reader
pub(crate) struct BodyWriter {
    buf: Vec<u8>,
    encoding: &'static Encoding,
}

impl BodyWriter {
    pub fn new(encoding: &'static Encoding) -> Self {
        Self {
            buf: Vec::new(),
            encoding,
        }
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.buf
    }

    fn u32(&mut self, value: u32) {
        // writes to a Vec can not fail
        let _ = self.buf.write_u32::<LittleEndian>(value);
    }

    fn len(&mut self, value: usize) -> Result<()> {
        let value = u32::try_from(value).map_err(|_| {
            std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("count {value} does not fit in 32 bits"),
            )
        })?;
        self.u32(value);
        Ok(())
    }

    fn string(&mut self, text: &str) -> Result<()> {
        let (encoded, _, unmappable) = self.encoding.encode(text);
        if unmappable {
            return Err(Error::Unencodable {
                text: text.to_owned(),
                encoding: self.encoding.name(),
            });
        }
        self.len(encoded.len())?;
        self.buf.extend_from_slice(&encoded);
        Ok(())
    }

    pub fn block(&mut self, block: &ExBlock) -> Result<()> {
        self.string(&block.name)?;
        self.tagged(&block.value)
    }

    fn tagged(&mut self, value: &ExValue) -> Result<()> {
        self.u32(value.kind().tag());
        self.value(value)
    }

    fn value(&mut self, value: &ExValue) -> Result<()> {
        match value {
            ExValue::Int(i) => {
                let _ = self.buf.write_i32::<LittleEndian>(*i);
            }
            ExValue::Float(f) => {
                let _ = self.buf.write_f32::<LittleEndian>(*f);
            }
            ExValue::String(s) => self.string(s)?,
            ExValue::Table(t) => self.table(t, false)?,
            ExValue::List(l) => {
                self.len(l.len())?;
                for item in l.iter() {
                    self.tagged(item)?;
                }
            }
            ExValue::Tree(t) => self.tree(t)?,
        }
        Ok(())
    }

    /// Write a table, omitting its schema when it is described by the enclosing column
    fn table(&mut self, table: &ExTable, described: bool) -> Result<()> {
        if !described {
            self.len(table.fields().len())?;
            for field in table.fields() {
                self.field(field)?;
            }
        }

        self.len(table.len())?;
        self.len(table.columns())?;
        for row in table.rows() {
            for (c, cell) in row.iter().enumerate() {
                let column_describes = table
                    .fields()
                    .get(c)
                    .is_some_and(|f| f.describes_tables());
                match cell {
                    ExValue::Table(nested) if column_describes => {
                        self.u32(cell.kind().tag());
                        self.table(nested, true)?;
                    }
                    _ => self.tagged(cell)?,
                }
            }
        }
        Ok(())
    }

    fn field(&mut self, field: &ExField) -> Result<()> {
        self.u32(field.kind.tag());
        self.string(&field.name)?;
        self.len(field.subfields.len())?;
        for sub in &field.subfields {
            self.field(sub)?;
        }
        Ok(())
    }

    fn tree(&mut self, tree: &ExTree) -> Result<()> {
        match tree {
            ExTree::Leaf { name, value } => {
                self.u32(1);
                self.u32(0);
                self.string(name)?;
                self.tagged(value)
            }
            ExTree::Interior(children) => {
                self.u32(0);
                self.len(children.len())?;
                for child in children {
                    self.block(child)?;
                }
                Ok(())
            }
        }
    }
}

/// Serialize blocks into a document body
#[instrument(skip_all, fields(blocks = blocks.len(), encoding = encoding.name()), err)]
pub(crate) fn write_blocks(blocks: &[ExBlock], encoding: &'static Encoding) -> Result<Vec<u8>> {
    let mut writer = BodyWriter::new(encoding);
    for block in blocks {
        writer.block(block)?;
    }
    Ok(writer.into_inner())
}
