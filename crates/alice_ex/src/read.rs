//! Types for reading EX documents
//!

use byteorder::{LittleEndian, ReadBytesExt};
use encoding_rs::Encoding;
use std::{fmt, io::Cursor};
use tracing::{debug, instrument, warn};

use crate::{
    error::{Error, Result},
    types::{ColumnMismatch, ExBlock, ExField, ExList, ExTable, ExTree, ExType, ExValue},
};

/// Maximum nesting of tables, lists, trees and field schemas
pub const MAX_DEPTH: usize = 256;

// Smallest possible encodings, used to reject counts before allocating
const MIN_VALUE: u64 = 4;
const MIN_FIELD: u64 = 12;
const MIN_NAMED: u64 = 8;

/// A table whose row width disagrees with its schema
///
/// Such tables are kept as found so that they can be written back unchanged.
#[derive(Debug, Clone, PartialEq)]
pub struct StructuralWarning {
    /// Dotted path of the table within the document
    pub path: String,
    /// Offset of the table's row count in the document body
    pub offset: u64,
    /// The disagreement
    pub mismatch: ColumnMismatch,
}

impl fmt::Display for StructuralWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (at {}, offset {})", self.mismatch, self.path, self.offset)
    }
}

/// Reads the block data of a document
///
/// Every read is bounds checked, truncated input is reported with the offset at which more data was needed.
pub(crate) struct BodyReader<'a> {
    cursor: Cursor<&'a [u8]>,
    encoding: &'static Encoding,
    depth: usize,
    path: Vec<String>,
    warnings: Vec<StructuralWarning>,
}

impl<'a> BodyReader<'a> {
    pub fn new(body: &'a [u8], encoding: &'static Encoding) -> Self {
        Self {
            cursor: Cursor::new(body),
            encoding,
            depth: 0,
            path: Vec::new(),
            warnings: Vec::new(),
        }
    }

    pub fn offset(&self) -> u64 {
        self.cursor.position()
    }

    pub fn remaining(&self) -> u64 {
        (self.cursor.get_ref().len() as u64).saturating_sub(self.offset())
    }

    pub fn into_warnings(self) -> Vec<StructuralWarning> {
        self.warnings
    }

    fn u32(&mut self) -> Result<u32> {
        let offset = self.offset();
        self.cursor
            .read_u32::<LittleEndian>()
            .map_err(|_| Error::Truncated { offset })
    }

    fn i32(&mut self) -> Result<i32> {
        let offset = self.offset();
        self.cursor
            .read_i32::<LittleEndian>()
            .map_err(|_| Error::Truncated { offset })
    }

    fn f32(&mut self) -> Result<f32> {
        let offset = self.offset();
        self.cursor
            .read_f32::<LittleEndian>()
            .map_err(|_| Error::Truncated { offset })
    }

    fn bytes(&mut self, len: usize) -> Result<&'a [u8]> {
        let offset = self.offset();
        let data: &'a [u8] = *self.cursor.get_ref();
        let start = offset as usize;
        let slice = start
            .checked_add(len)
            .and_then(|end| data.get(start..end))
            .ok_or(Error::Truncated {
                offset: data.len() as u64,
            })?;
        self.cursor.set_position((start + len) as u64);
        Ok(slice)
    }

    /// Read a count, rejecting it if `count` items of `min_size` bytes can not fit in the remaining input
    fn count(&mut self, min_size: u64) -> Result<usize> {
        let offset = self.offset();
        let count = self.u32()?;
        if count as u64 * min_size > self.remaining() {
            return Err(Error::CountOverflow { count, offset });
        }
        Ok(count as usize)
    }

    fn string(&mut self) -> Result<String> {
        let len = self.u32()? as usize;
        let offset = self.offset();
        let raw = self.bytes(len)?;
        self.encoding
            .decode_without_bom_handling_and_without_replacement(raw)
            .map(|s| s.into_owned())
            .ok_or(Error::InvalidText {
                offset,
                encoding: self.encoding.name(),
            })
    }

    fn tag(&mut self) -> Result<ExType> {
        let offset = self.offset();
        let tag = self.u32()?;
        ExType::from_tag(tag).ok_or(Error::UnknownTag { tag, offset })
    }

    fn enter(&mut self, segment: impl Into<String>) -> Result<()> {
        if self.depth >= MAX_DEPTH {
            return Err(Error::TooDeep {
                limit: MAX_DEPTH,
                offset: self.offset(),
            });
        }
        self.depth += 1;
        self.path.push(segment.into());
        Ok(())
    }

    fn leave(&mut self) {
        self.depth -= 1;
        self.path.pop();
    }

    /// Read a top level block: name, type tag and value
    pub fn block(&mut self) -> Result<ExBlock> {
        let name = self.string()?;
        let kind = self.tag()?;
        self.enter(name.clone())?;
        let value = self.value(kind, None)?;
        self.leave();
        Ok(ExBlock { name, value })
    }

    /// Read the payload of a value of type `kind`
    ///
    /// `schema` is the subfield list describing a nested table, when the value is a table cell in a column
    /// which describes its tables.
    fn value(&mut self, kind: ExType, schema: Option<&[ExField]>) -> Result<ExValue> {
        Ok(match kind {
            ExType::Int => ExValue::Int(self.i32()?),
            ExType::Float => ExValue::Float(self.f32()?),
            ExType::String => ExValue::String(self.string()?),
            ExType::Table => ExValue::Table(self.table(schema)?),
            ExType::List => ExValue::List(self.list()?),
            ExType::Tree => ExValue::Tree(self.tree()?),
        })
    }

    fn field(&mut self) -> Result<ExField> {
        let kind = self.tag()?;
        let name = self.string()?;
        let count = self.count(MIN_FIELD)?;

        self.enter(name.clone())?;
        let subfields = (0..count)
            .map(|_| self.field())
            .collect::<Result<Vec<_>>>()?;
        self.leave();

        Ok(ExField {
            kind,
            name,
            subfields,
        })
    }

    fn table(&mut self, schema: Option<&[ExField]>) -> Result<ExTable> {
        let fields = match schema {
            Some(fields) => fields.to_vec(),
            None => {
                let count = self.count(MIN_FIELD)?;
                (0..count)
                    .map(|_| self.field())
                    .collect::<Result<Vec<_>>>()?
            }
        };

        let offset = self.offset();
        let rows = self.u32()?;
        let columns = self.u32()?;
        let fits = (rows as u64)
            .checked_mul((columns as u64).max(1))
            .and_then(|cells| cells.checked_mul(MIN_VALUE))
            .is_some_and(|size| size <= self.remaining());
        if !fits {
            return Err(Error::CountOverflow {
                count: rows,
                offset,
            });
        }

        let mut grid = Vec::with_capacity(rows as usize);
        for r in 0..rows as usize {
            self.enter(format!("[{r}]"))?;
            let mut row = Vec::with_capacity(columns as usize);
            for c in 0..columns as usize {
                let kind = self.tag()?;
                let nested = fields
                    .get(c)
                    .filter(|f| f.describes_tables())
                    .map(|f| f.subfields.as_slice());
                row.push(self.value(kind, nested)?);
            }
            self.leave();
            grid.push(row);
        }

        let table = ExTable::from_parts(fields, columns as usize, grid);
        if let Some(mismatch) = table.mismatch() {
            let warning = StructuralWarning {
                path: self.path.join("."),
                offset,
                mismatch,
            };
            warn!("{warning}");
            self.warnings.push(warning);
        }
        Ok(table)
    }

    fn list(&mut self) -> Result<ExList> {
        let count = self.count(MIN_VALUE)?;
        let mut items = Vec::with_capacity(count);
        for i in 0..count {
            let kind = self.tag()?;
            self.enter(format!("[{i}]"))?;
            items.push(self.value(kind, None)?);
            self.leave();
        }
        Ok(ExList::new(items))
    }

    fn tree(&mut self) -> Result<ExTree> {
        let offset = self.offset();
        let discriminator = self.u32()?;
        let children = self.u32()?;

        match discriminator {
            1 => {
                if children != 0 {
                    return Err(Error::AmbiguousTree { children, offset });
                }
                let name = self.string()?;
                let kind = self.tag()?;
                self.enter(name.clone())?;
                let value = self.value(kind, None)?;
                self.leave();
                Ok(ExTree::Leaf {
                    name,
                    value: Box::new(value),
                })
            }
            0 => {
                if children as u64 * MIN_NAMED > self.remaining() {
                    return Err(Error::CountOverflow {
                        count: children,
                        offset,
                    });
                }
                let mut nodes = Vec::with_capacity(children as usize);
                for _ in 0..children {
                    let name = self.string()?;
                    let kind = self.tag()?;
                    self.enter(name.clone())?;
                    let value = self.value(kind, None)?;
                    self.leave();
                    nodes.push(ExBlock { name, value });
                }
                Ok(ExTree::Interior(nodes))
            }
            _ => Err(Error::MalformedTree {
                discriminator,
                offset,
            }),
        }
    }
}

/// Parse `count` blocks from a document body, requiring the whole body to be consumed
#[instrument(skip(body, encoding), fields(body = body.len(), encoding = encoding.name()), err)]
pub(crate) fn read_blocks(
    body: &[u8],
    count: u32,
    encoding: &'static Encoding,
) -> Result<(Vec<ExBlock>, Vec<StructuralWarning>)> {
    let mut reader = BodyReader::new(body, encoding);
    if count as u64 * MIN_NAMED > reader.remaining() {
        return Err(Error::CountOverflow { count, offset: 0 });
    }

    let blocks = (0..count)
        .map(|_| reader.block())
        .collect::<Result<Vec<_>>>()?;

    let left = reader.remaining();
    if left != 0 {
        return Err(Error::TrailingData { count: left });
    }

    debug!(blocks = blocks.len(), "parsed document body");
    Ok((blocks, reader.into_warnings()))
}
