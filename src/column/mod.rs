//! Dense vs. sparse column storage and the conversion between them.

mod dense;
mod sparse;

pub use dense::DenseColumn;
pub use sparse::SparseColumn;

use crate::record_store::RecordId;
use crate::strings::StringLocator;
use crate::value::{CellValue, ColumnType};

/// Ratio of occupied to allocated slots above which a dense column
/// *could* be worth converting to sparse (or vice versa below it).
/// Never consulted internally — conversion is always caller-driven.
pub const SPARSE_CONVERSION_THRESHOLD: f64 = 0.1;

/// Sealed: only the five scalar kinds a `Series` can hold implement
/// this. Closed over `bool, i64, u64, f64, StringLocator` exactly as
/// `CellValue` enumerates them.
pub trait ColumnScalar: Clone + sealed::Sealed {
    const COLUMN_TYPE: ColumnType;

    fn into_cell(self) -> CellValue;
    fn from_cell(cell: CellValue) -> Option<Self>
    where
        Self: Sized;
}

mod sealed {
    pub trait Sealed {}
    impl Sealed for bool {}
    impl Sealed for i64 {}
    impl Sealed for u64 {}
    impl Sealed for f64 {}
    impl Sealed for super::StringLocator {}
}

macro_rules! impl_column_scalar {
    ($ty:ty, $variant:ident, $column_type:ident) => {
        impl ColumnScalar for $ty {
            const COLUMN_TYPE: ColumnType = ColumnType::$column_type;

            fn into_cell(self) -> CellValue {
                CellValue::$variant(self)
            }

            fn from_cell(cell: CellValue) -> Option<Self> {
                match cell {
                    CellValue::$variant(v) => Some(v),
                    _ => None,
                }
            }
        }
    };
}

impl_column_scalar!(bool, Bool, Bool);
impl_column_scalar!(i64, I64, I64);
impl_column_scalar!(u64, U64, U64);
impl_column_scalar!(f64, F64, F64);
impl_column_scalar!(StringLocator, Str, Str);

/// A single series' physical storage: either dense (most records
/// occupied) or sparse (few are). Conversion between the two builds a
/// fresh destination and swaps it in, trivially safe because there is
/// never a concurrent reader within one shard.
#[derive(Debug, Clone)]
pub enum Column<T: ColumnScalar> {
    Dense(DenseColumn<T>),
    Sparse(SparseColumn<T>),
}

impl<T: ColumnScalar> Column<T> {
    pub fn new_dense() -> Self {
        Column::Dense(DenseColumn::new())
    }

    pub fn new_sparse() -> Self {
        Column::Sparse(SparseColumn::new())
    }

    pub fn get(&self, id: RecordId) -> Option<&T> {
        match self {
            Column::Dense(d) => d.get(id),
            Column::Sparse(s) => s.get(id),
        }
    }

    pub fn set(&mut self, id: RecordId, value: T) {
        match self {
            Column::Dense(d) => d.set(id, value),
            Column::Sparse(s) => s.set(id, value),
        }
    }

    pub fn remove(&mut self, id: RecordId) {
        match self {
            Column::Dense(d) => d.remove(id),
            Column::Sparse(s) => s.remove(id),
        }
    }

    /// Number of occupied cells.
    pub fn len(&self) -> usize {
        match self {
            Column::Dense(d) => d.len(),
            Column::Sparse(s) => s.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Occupied / allocated-range ratio. For a sparse column the
    /// allocated range is unknown without a record count, so the caller
    /// (`RecordStore::load_factor`) supplies it.
    pub fn load_factor(&self, allocated: usize) -> f64 {
        if allocated == 0 {
            return 0.0;
        }
        self.len() as f64 / allocated as f64
    }

    pub fn to_dense(&mut self) {
        if let Column::Sparse(s) = self {
            let mut dense = DenseColumn::new();
            for (id, v) in s.iter() {
                dense.set(id, v.clone());
            }
            *self = Column::Dense(dense);
        }
    }

    pub fn to_sparse(&mut self) {
        if let Column::Dense(d) = self {
            let mut sparse = SparseColumn::new();
            for (id, v) in d.iter() {
                sparse.set(id, v.clone());
            }
            *self = Column::Sparse(sparse);
        }
    }

    /// Iterate occupied `(RecordId, CellValue)` pairs, tagged by this
    /// column's `ColumnType`. Used by `for_all_dynamic` / `get_dynamic`,
    /// which never panic on a type mismatch — there is none possible
    /// here since the tag is derived from `T`, not compared against one.
    pub fn iter_cells(&self) -> Box<dyn Iterator<Item = (RecordId, CellValue)> + '_> {
        match self {
            Column::Dense(d) => Box::new(d.iter().map(|(id, v)| (id, v.clone().into_cell()))),
            Column::Sparse(s) => Box::new(s.iter().map(|(id, v)| (id, v.clone().into_cell()))),
        }
    }
}
