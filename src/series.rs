//! A named, typed series: the record store's unit of column storage.

use crate::column::{Column, ColumnScalar};
use crate::record_store::RecordId;
use crate::strings::StringLocator;
use crate::value::{CellValue, ColumnType};

#[derive(Debug, Clone)]
enum SeriesStorage {
    Bool(Column<bool>),
    I64(Column<i64>),
    U64(Column<u64>),
    F64(Column<f64>),
    Str(Column<StringLocator>),
}

/// A single named column. Dynamically typed at the `RecordStore`
/// boundary (a store holds a heterogeneous `Vec<Series>`) but statically
/// typed once a caller knows (or asserts) which scalar it holds.
#[derive(Debug, Clone)]
pub struct Series {
    name: String,
    storage: SeriesStorage,
}

macro_rules! for_each_storage {
    ($self:expr, $col:ident => $body:expr) => {
        match $self {
            SeriesStorage::Bool($col) => $body,
            SeriesStorage::I64($col) => $body,
            SeriesStorage::U64($col) => $body,
            SeriesStorage::F64($col) => $body,
            SeriesStorage::Str($col) => $body,
        }
    };
}

impl Series {
    pub fn new_dense(name: impl Into<String>, column_type: ColumnType) -> Self {
        let storage = match column_type {
            ColumnType::Bool => SeriesStorage::Bool(Column::new_dense()),
            ColumnType::I64 => SeriesStorage::I64(Column::new_dense()),
            ColumnType::U64 => SeriesStorage::U64(Column::new_dense()),
            ColumnType::F64 => SeriesStorage::F64(Column::new_dense()),
            ColumnType::Str => SeriesStorage::Str(Column::new_dense()),
        };
        Self {
            name: name.into(),
            storage,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn column_type(&self) -> ColumnType {
        match &self.storage {
            SeriesStorage::Bool(_) => ColumnType::Bool,
            SeriesStorage::I64(_) => ColumnType::I64,
            SeriesStorage::U64(_) => ColumnType::U64,
            SeriesStorage::F64(_) => ColumnType::F64,
            SeriesStorage::Str(_) => ColumnType::Str,
        }
    }

    /// Statically typed read. A mismatched `T` is a programmer error —
    /// the caller should have checked `column_type()` first — and
    /// panics rather than returning a sentinel.
    pub fn get<T: ColumnScalar>(&self, id: RecordId) -> Option<T> {
        self.assert_type::<T>();
        self.get_dynamic(id)
            .map(|cell| T::from_cell(cell).expect("column_type check above guarantees a match"))
    }

    pub fn set<T: ColumnScalar>(&mut self, id: RecordId, value: T) {
        self.assert_type::<T>();
        let cell = value.into_cell();
        match (&mut self.storage, cell) {
            (SeriesStorage::Bool(c), CellValue::Bool(v)) => c.set(id, v),
            (SeriesStorage::I64(c), CellValue::I64(v)) => c.set(id, v),
            (SeriesStorage::U64(c), CellValue::U64(v)) => c.set(id, v),
            (SeriesStorage::F64(c), CellValue::F64(v)) => c.set(id, v),
            (SeriesStorage::Str(c), CellValue::Str(v)) => c.set(id, v),
            _ => unreachable!("column_type check above guarantees a match"),
        }
    }

    pub fn remove(&mut self, id: RecordId) {
        for_each_storage!(&mut self.storage, c => c.remove(id))
    }

    /// Dynamically typed read: never panics, returns a `CellValue`
    /// tagged by this series' own type.
    pub fn get_dynamic(&self, id: RecordId) -> Option<CellValue> {
        match &self.storage {
            SeriesStorage::Bool(c) => c.get(id).map(|v| CellValue::Bool(*v)),
            SeriesStorage::I64(c) => c.get(id).map(|v| CellValue::I64(*v)),
            SeriesStorage::U64(c) => c.get(id).map(|v| CellValue::U64(*v)),
            SeriesStorage::F64(c) => c.get(id).map(|v| CellValue::F64(*v)),
            SeriesStorage::Str(c) => c.get(id).map(|v| CellValue::Str(*v)),
        }
    }

    pub fn iter_dynamic(&self) -> Box<dyn Iterator<Item = (RecordId, CellValue)> + '_> {
        for_each_storage!(&self.storage, c => c.iter_cells())
    }

    pub fn len(&self) -> usize {
        for_each_storage!(&self.storage, c => c.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn load_factor(&self, allocated: usize) -> f64 {
        for_each_storage!(&self.storage, c => c.load_factor(allocated))
    }

    pub fn to_dense(&mut self) {
        for_each_storage!(&mut self.storage, c => c.to_dense())
    }

    pub fn to_sparse(&mut self) {
        for_each_storage!(&mut self.storage, c => c.to_sparse())
    }

    fn assert_type<T: ColumnScalar>(&self) {
        let found = self.column_type();
        assert_eq!(
            found,
            T::COLUMN_TYPE,
            "type mismatch on series {}: expected {}, found {}",
            self.name,
            T::COLUMN_TYPE.name(),
            found.name(),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn typed_get_set_round_trip() {
        let mut series = Series::new_dense("age", ColumnType::I64);
        series.set::<i64>(0, 42);
        assert_eq!(series.get::<i64>(0), Some(42));
        assert_eq!(series.get::<i64>(1), None);
    }

    #[test]
    #[should_panic(expected = "type mismatch")]
    fn typed_get_with_wrong_type_panics() {
        let series = Series::new_dense("age", ColumnType::I64);
        let _ = series.get::<bool>(0);
    }

    #[test]
    fn dynamic_get_never_panics_and_tags_by_own_type() {
        let mut series = Series::new_dense("flag", ColumnType::Bool);
        series.set::<bool>(2, true);
        assert_eq!(series.get_dynamic(2), Some(CellValue::Bool(true)));
        assert_eq!(series.get_dynamic(99), None);
    }
}
