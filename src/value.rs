//! The typed-variant value: a tagged union over the eight kinds this
//! system ever needs to represent, used both as a column cell and as a
//! locator into the interned-string/array/object stores.

use crate::json_store::{ArrayLocator, ObjectLocator};
use crate::strings::StringLocator;

/// The subset of `Value` a `Series` may store. Columns are single-typed:
/// a series is fixed to exactly one of these at creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnType {
    Bool,
    I64,
    U64,
    F64,
    Str,
}

impl ColumnType {
    pub fn name(self) -> &'static str {
        match self {
            ColumnType::Bool => "bool",
            ColumnType::I64 => "i64",
            ColumnType::U64 => "u64",
            ColumnType::F64 => "f64",
            ColumnType::Str => "str",
        }
    }
}

impl std::fmt::Display for ColumnType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// A concrete, present cell value of one of the five column types.
/// Absence is modeled by `Option<CellValue>` at the API boundary, never
/// by a variant of this enum — a typed read either returns a value or
/// signals absent, never a "null" value of the column's type.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Bool(bool),
    I64(i64),
    U64(u64),
    F64(f64),
    Str(StringLocator),
}

impl CellValue {
    pub fn column_type(&self) -> ColumnType {
        match self {
            CellValue::Bool(_) => ColumnType::Bool,
            CellValue::I64(_) => ColumnType::I64,
            CellValue::U64(_) => ColumnType::U64,
            CellValue::F64(_) => ColumnType::F64,
            CellValue::Str(_) => ColumnType::Str,
        }
    }
}

/// The full typed-variant value: admits null and locators into the
/// array/object document store in addition to the column-cell primitives.
/// Used by the JSON-document store and by `Graph::assign`/`get_dynamic`.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    I64(i64),
    U64(u64),
    F64(f64),
    Str(StringLocator),
    Array(ArrayLocator),
    Object(ObjectLocator),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Narrow to a `CellValue` if this value is one a `Series` could
    /// hold. Used when `assign`/`add_faker_series` materialize a `Value`
    /// into a column cell.
    pub fn as_cell(&self) -> Option<CellValue> {
        match self {
            Value::Bool(b) => Some(CellValue::Bool(*b)),
            Value::I64(i) => Some(CellValue::I64(*i)),
            Value::U64(u) => Some(CellValue::U64(*u)),
            Value::F64(f) => Some(CellValue::F64(*f)),
            Value::Str(s) => Some(CellValue::Str(*s)),
            Value::Null | Value::Array(_) | Value::Object(_) => None,
        }
    }
}

impl From<CellValue> for Value {
    fn from(c: CellValue) -> Self {
        match c {
            CellValue::Bool(b) => Value::Bool(b),
            CellValue::I64(i) => Value::I64(i),
            CellValue::U64(u) => Value::U64(u),
            CellValue::F64(f) => Value::F64(f),
            CellValue::Str(s) => Value::Str(s),
        }
    }
}
