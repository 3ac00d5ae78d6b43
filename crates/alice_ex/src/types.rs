//! Value model of an EX document.
//!
//! A document is an ordered sequence of named [`ExBlock`]s, each owning a tree of [`ExValue`]s.
//! Ownership is strictly hierarchical, there are no shared sub-trees.

use std::fmt;

use derive_more::derive::{Constructor, Deref, DerefMut, Index, IntoIterator};
use tracing::warn;

#[cfg(feature = "serde")]
use serde::Serialize;

use crate::error::{Error, Result};

/// The kind of a value, as encoded in its type tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub enum ExType {
    /// 32-bit signed integer
    Int,
    /// 32-bit float
    Float,
    /// Text
    String,
    /// Two dimensional grid described by fields
    Table,
    /// Ordered sequence of values
    List,
    /// Leaf or interior tree node
    Tree,
}

impl ExType {
    /// Decode a type tag
    pub fn from_tag(tag: u32) -> Option<Self> {
        Some(match tag {
            1 => ExType::Int,
            2 => ExType::Float,
            3 => ExType::String,
            4 => ExType::Table,
            5 => ExType::List,
            6 => ExType::Tree,
            _ => return None,
        })
    }

    /// The type tag used on disk
    pub fn tag(self) -> u32 {
        match self {
            ExType::Int => 1,
            ExType::Float => 2,
            ExType::String => 3,
            ExType::Table => 4,
            ExType::List => 5,
            ExType::Tree => 6,
        }
    }

    /// Keyword used for this type in text dumps
    pub fn as_str(self) -> &'static str {
        match self {
            ExType::Int => "int",
            ExType::Float => "float",
            ExType::String => "string",
            ExType::Table => "table",
            ExType::List => "list",
            ExType::Tree => "tree",
        }
    }
}

impl fmt::Display for ExType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single EX value
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub enum ExValue {
    /// 32-bit signed integer
    Int(i32),
    /// 32-bit float
    Float(f32),
    /// Text, already converted from the document's source encoding
    String(String),
    /// Table
    Table(ExTable),
    /// List
    List(ExList),
    /// Tree
    Tree(ExTree),
}

impl ExValue {
    /// The kind of this value
    pub fn kind(&self) -> ExType {
        match self {
            ExValue::Int(_) => ExType::Int,
            ExValue::Float(_) => ExType::Float,
            ExValue::String(_) => ExType::String,
            ExValue::Table(_) => ExType::Table,
            ExValue::List(_) => ExType::List,
            ExValue::Tree(_) => ExType::Tree,
        }
    }

    /// The integer, if this is an [`ExValue::Int`]
    pub fn as_int(&self) -> Option<i32> {
        match self {
            ExValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// The float, if this is an [`ExValue::Float`]
    pub fn as_float(&self) -> Option<f32> {
        match self {
            ExValue::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// The text, if this is an [`ExValue::String`]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ExValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// The table, if this is an [`ExValue::Table`]
    pub fn as_table(&self) -> Option<&ExTable> {
        match self {
            ExValue::Table(t) => Some(t),
            _ => None,
        }
    }

    /// The list, if this is an [`ExValue::List`]
    pub fn as_list(&self) -> Option<&ExList> {
        match self {
            ExValue::List(l) => Some(l),
            _ => None,
        }
    }

    /// The tree, if this is an [`ExValue::Tree`]
    pub fn as_tree(&self) -> Option<&ExTree> {
        match self {
            ExValue::Tree(t) => Some(t),
            _ => None,
        }
    }
}

impl From<i32> for ExValue {
    fn from(value: i32) -> Self {
        ExValue::Int(value)
    }
}

impl From<f32> for ExValue {
    fn from(value: f32) -> Self {
        ExValue::Float(value)
    }
}

impl From<&str> for ExValue {
    fn from(value: &str) -> Self {
        ExValue::String(value.to_owned())
    }
}

impl From<String> for ExValue {
    fn from(value: String) -> Self {
        ExValue::String(value)
    }
}

impl From<ExTable> for ExValue {
    fn from(value: ExTable) -> Self {
        ExValue::Table(value)
    }
}

impl From<ExList> for ExValue {
    fn from(value: ExList) -> Self {
        ExValue::List(value)
    }
}

impl From<ExTree> for ExValue {
    fn from(value: ExTree) -> Self {
        ExValue::Tree(value)
    }
}

/// A named value: a top level block of a document, or a child of an interior tree node
#[derive(Debug, Clone, PartialEq, Constructor)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct ExBlock {
    /// Name of the entry
    pub name: String,
    /// Value of the entry
    pub value: ExValue,
}

impl ExBlock {
    /// Create a named entry from anything convertible into a value
    pub fn named(name: impl Into<String>, value: impl Into<ExValue>) -> Self {
        Self::new(name.into(), value.into())
    }
}

/// Describes one column of a table
///
/// `subfields` is only meaningful when the column holds tables: those nested tables are described by the
/// subfields instead of carrying their own schema.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct ExField {
    /// Type of the values in this column
    pub kind: ExType,
    /// Column name
    pub name: String,
    /// Schema of nested tables held by this column
    pub subfields: Vec<ExField>,
}

impl ExField {
    /// A scalar (or list/tree) column
    pub fn new(kind: ExType, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
            subfields: Vec::new(),
        }
    }

    /// A column holding tables described by `subfields`
    pub fn table(name: impl Into<String>, subfields: Vec<ExField>) -> Self {
        Self {
            kind: ExType::Table,
            name: name.into(),
            subfields,
        }
    }

    /// Whether nested tables in this column are described by this field
    pub fn describes_tables(&self) -> bool {
        self.kind == ExType::Table
    }
}

/// Width disagreement between a table's schema and its rows
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct ColumnMismatch {
    /// Number of fields in the schema
    pub fields: usize,
    /// Number of values in each row
    pub columns: usize,
}

impl ColumnMismatch {
    /// The width which is safe to use for both schema and rows
    pub fn width(&self) -> usize {
        self.fields.min(self.columns)
    }
}

impl fmt::Display for ColumnMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "field/column count mismatch: {} fields, {} columns",
            self.fields, self.columns
        )
    }
}

/// A two dimensional grid of values, stored row-major
///
/// Every row has exactly [`ExTable::columns`] values. Parsed tables keep the width found on disk even when
/// it disagrees with the number of fields, so that they can be written back unchanged; use
/// [`ExTable::view`] to get a consistent view of such tables.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct ExTable {
    fields: Vec<ExField>,
    columns: usize,
    rows: Vec<Vec<ExValue>>,
}

impl ExTable {
    /// Create a table, requiring every row to have one value per field
    pub fn new(fields: Vec<ExField>, rows: Vec<Vec<ExValue>>) -> Result<Self> {
        let expected = fields.len();
        if let Some((row, values)) = rows.iter().enumerate().find(|(_, r)| r.len() != expected) {
            return Err(Error::RaggedTable {
                row,
                actual: values.len(),
                expected,
            });
        }
        Ok(Self {
            fields,
            columns: expected,
            rows,
        })
    }

    pub(crate) fn from_parts(fields: Vec<ExField>, columns: usize, rows: Vec<Vec<ExValue>>) -> Self {
        Self {
            fields,
            columns,
            rows,
        }
    }

    /// Column descriptions
    pub fn fields(&self) -> &[ExField] {
        &self.fields
    }

    /// Number of values in every row
    pub fn columns(&self) -> usize {
        self.columns
    }

    /// All rows
    pub fn rows(&self) -> &[Vec<ExValue>] {
        &self.rows
    }

    /// Get a row by index
    pub fn row(&self, index: usize) -> Option<&[ExValue]> {
        self.rows.get(index).map(|r| r.as_slice())
    }

    /// Number of rows
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the table has no rows
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// The width disagreement between fields and rows, if any
    pub fn mismatch(&self) -> Option<ColumnMismatch> {
        (self.fields.len() != self.columns).then_some(ColumnMismatch {
            fields: self.fields.len(),
            columns: self.columns,
        })
    }

    /// A view trimmed to a width both the schema and the rows can satisfy
    ///
    /// `expected` is the number of fields a consuming context expects, defaulting to this table's own field
    /// count. When it disagrees with the row width, the view is trimmed to the smaller of the two and the
    /// disagreement is reported in [`TableView::warning`].
    pub fn view(&self, expected: Option<usize>) -> TableView<'_> {
        let fields = expected.unwrap_or(self.fields.len());
        let warning = (fields != self.columns).then_some(ColumnMismatch {
            fields,
            columns: self.columns,
        });
        if let Some(warning) = &warning {
            warn!("{warning}");
        }

        let width = fields.min(self.columns).min(self.fields.len());
        TableView {
            fields: &self.fields[..width],
            width,
            rows: &self.rows,
            warning,
        }
    }
}

/// A width-consistent view over an [`ExTable`]
#[derive(Debug, Clone)]
pub struct TableView<'a> {
    /// The fields covered by this view
    pub fields: &'a [ExField],
    /// Number of values yielded per row
    pub width: usize,
    rows: &'a [Vec<ExValue>],
    /// Present when the view had to be trimmed
    pub warning: Option<ColumnMismatch>,
}

impl<'a> TableView<'a> {
    /// Iterate over the trimmed rows
    pub fn rows(&self) -> impl Iterator<Item = &'a [ExValue]> + '_ {
        self.rows.iter().map(|r| &r[..self.width])
    }
}

/// An ordered sequence of values, addressed by position
#[derive(
    Debug, Clone, PartialEq, Default, Constructor, Deref, DerefMut, Index, IntoIterator,
)]
#[cfg_attr(feature = "serde", derive(Serialize))]
#[into_iterator(owned, ref)]
pub struct ExList(Vec<ExValue>);

impl FromIterator<ExValue> for ExList {
    fn from_iter<T: IntoIterator<Item = ExValue>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// A tree node
///
/// A node is either a leaf carrying exactly one named value, or an interior node carrying named children.
/// The two shapes are exclusive by construction.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub enum ExTree {
    /// A node holding a single named value
    Leaf {
        /// Name of the payload
        name: String,
        /// The payload
        value: Box<ExValue>,
    },
    /// A node holding named children
    Interior(Vec<ExBlock>),
}

impl ExTree {
    /// Create a leaf node
    pub fn leaf(name: impl Into<String>, value: impl Into<ExValue>) -> Self {
        ExTree::Leaf {
            name: name.into(),
            value: Box::new(value.into()),
        }
    }

    /// Whether this node is a leaf
    pub fn is_leaf(&self) -> bool {
        matches!(self, ExTree::Leaf { .. })
    }

    /// Children of an interior node, empty for leaves
    pub fn children(&self) -> &[ExBlock] {
        match self {
            ExTree::Leaf { .. } => &[],
            ExTree::Interior(children) => children,
        }
    }

    /// Find a child of an interior node by name
    pub fn child(&self, name: &str) -> Option<&ExValue> {
        self.children()
            .iter()
            .find(|c| c.name == name)
            .map(|c| &c.value)
    }
}
