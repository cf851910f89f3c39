//! Columnar file <-> record store bridge.
//!
//! The Parquet codec itself is an external collaborator; this module is
//! the schema-projection and per-row-visitor glue that sits on top of
//! it, built on `arrow`/`parquet` rather than hand-rolling the wire
//! format. `Graph::ingest_parquet_edges`/`dump_parquet_{nodes,edges}`
//! orchestrate these helpers; this module has no knowledge of `Graph`
//! itself.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use arrow::array::{
    Array, ArrayRef, BinaryArray, BooleanArray, Float32Array, Float64Array, Int32Array,
    Int64Array, LargeBinaryArray, LargeStringArray, StringArray,
};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ArrowWriter;

use crate::error::{CoreError, CoreResult};
use crate::record_store::{RecordId, RecordStore};
use crate::strings::{StringLocator, StringStore};
use crate::value::ColumnType;

/// One cell read off an Arrow array, before it has been routed into the
/// record store's value taxonomy (string cells are not yet interned —
/// that needs a `StringStore` the reader doesn't own).
#[derive(Debug, Clone, PartialEq)]
pub enum RawCell {
    Bool(bool),
    I64(i64),
    F64(f64),
    Bytes(Vec<u8>),
}

/// Type-mapping table, read off an Arrow logical type rather than the
/// raw Parquet physical type (arrow-rs has already folded INT32/INT64,
/// FLOAT/DOUBLE, BYTE_ARRAY into its own type system by the time a
/// `RecordBatch` reaches this bridge).
pub fn arrow_type_to_column_type(dt: &DataType, column: &str) -> CoreResult<ColumnType> {
    match dt {
        DataType::Int32 | DataType::Int64 => Ok(ColumnType::I64),
        DataType::Float32 | DataType::Float64 => Ok(ColumnType::F64),
        DataType::Boolean => Ok(ColumnType::Bool),
        DataType::Utf8 | DataType::LargeUtf8 | DataType::Binary | DataType::LargeBinary => {
            Ok(ColumnType::Str)
        }
        other => Err(CoreError::UnsupportedFileType {
            column: column.to_string(),
            file_type: format!("{other:?}"),
        }),
    }
}

/// Read `row` of `col_idx` out of `batch`, or `None` if the cell is
/// null. Returns `None` (rather than erring) for an array type
/// `arrow_type_to_column_type` would already have rejected, since by
/// the time a caller reaches into individual cells the column-level
/// check has already run once.
pub fn raw_cell_at(batch: &RecordBatch, col_idx: usize, row: usize) -> Option<RawCell> {
    let array = batch.column(col_idx);
    if array.is_null(row) {
        return None;
    }
    if let Some(a) = array.as_any().downcast_ref::<Int32Array>() {
        return Some(RawCell::I64(a.value(row) as i64));
    }
    if let Some(a) = array.as_any().downcast_ref::<Int64Array>() {
        return Some(RawCell::I64(a.value(row)));
    }
    if let Some(a) = array.as_any().downcast_ref::<Float32Array>() {
        return Some(RawCell::F64(a.value(row) as f64));
    }
    if let Some(a) = array.as_any().downcast_ref::<Float64Array>() {
        return Some(RawCell::F64(a.value(row)));
    }
    if let Some(a) = array.as_any().downcast_ref::<BooleanArray>() {
        return Some(RawCell::Bool(a.value(row)));
    }
    if let Some(a) = array.as_any().downcast_ref::<StringArray>() {
        return Some(RawCell::Bytes(a.value(row).as_bytes().to_vec()));
    }
    if let Some(a) = array.as_any().downcast_ref::<LargeStringArray>() {
        return Some(RawCell::Bytes(a.value(row).as_bytes().to_vec()));
    }
    if let Some(a) = array.as_any().downcast_ref::<BinaryArray>() {
        return Some(RawCell::Bytes(a.value(row).to_vec()));
    }
    if let Some(a) = array.as_any().downcast_ref::<LargeBinaryArray>() {
        return Some(RawCell::Bytes(a.value(row).to_vec()));
    }
    None
}

/// Collect every `.parquet` file under `path` (or just `path` itself if
/// it names a file), honoring `recursive` the way `ingest_parquet_edges`
/// specifies it.
fn collect_parquet_files(path: &Path, recursive: bool, out: &mut Vec<PathBuf>) -> CoreResult<()> {
    if path.is_file() {
        out.push(path.to_path_buf());
        return Ok(());
    }
    for entry in std::fs::read_dir(path)? {
        let entry = entry?;
        let entry_path = entry.path();
        if entry_path.is_dir() {
            if recursive {
                collect_parquet_files(&entry_path, recursive, out)?;
            }
        } else if entry_path.extension().and_then(|e| e.to_str()) == Some("parquet") {
            out.push(entry_path);
        }
    }
    Ok(())
}

/// Read every matching Parquet file under `path` into `RecordBatch`es.
/// Reading itself (the external collaborator) is delegated entirely to
/// `parquet::arrow`; this is just the file-discovery wrapper around it.
pub fn read_parquet_files(path: &Path, recursive: bool) -> CoreResult<Vec<RecordBatch>> {
    let mut files = Vec::new();
    collect_parquet_files(path, recursive, &mut files)?;

    let mut batches = Vec::new();
    for file_path in files {
        let file = File::open(&file_path)?;
        let reader = ParquetRecordBatchReaderBuilder::try_new(file)
            .map_err(|e| CoreError::Columnar(e.to_string()))?
            .build()
            .map_err(|e| CoreError::Columnar(e.to_string()))?;
        for batch in reader {
            batches.push(batch.map_err(|e| CoreError::Columnar(e.to_string()))?);
        }
    }
    Ok(batches)
}

/// Build one typed Arrow array (plus its `Field`) for `name` out of
/// `store`, in `ids` order. `column_type` is resolved by the caller: a
/// schema that would otherwise need scanning sample rows to pick a type
/// degenerates to "the series' own type if it exists, else string",
/// since this store's series are already statically typed at creation.
fn build_array(
    store: &RecordStore,
    strings: &StringStore,
    name: &str,
    column_type: ColumnType,
    ids: &[RecordId],
) -> CoreResult<(Field, ArrayRef)> {
    match column_type {
        ColumnType::Bool => {
            let values: Vec<Option<bool>> = ids
                .iter()
                .map(|&id| store.get::<bool>(name, id).ok().flatten())
                .collect();
            Ok((
                Field::new(name, DataType::Boolean, true),
                Arc::new(BooleanArray::from(values)),
            ))
        }
        ColumnType::I64 => {
            let values: Vec<Option<i64>> = ids
                .iter()
                .map(|&id| store.get::<i64>(name, id).ok().flatten())
                .collect();
            Ok((
                Field::new(name, DataType::Int64, true),
                Arc::new(Int64Array::from(values)),
            ))
        }
        ColumnType::U64 => {
            let values: Vec<Option<i64>> = ids
                .iter()
                .map(|&id| store.get::<u64>(name, id).ok().flatten().map(|v| v as i64))
                .collect();
            Ok((
                Field::new(name, DataType::Int64, true),
                Arc::new(Int64Array::from(values)),
            ))
        }
        ColumnType::F64 => {
            let values: Vec<Option<f64>> = ids
                .iter()
                .map(|&id| store.get::<f64>(name, id).ok().flatten())
                .collect();
            Ok((
                Field::new(name, DataType::Float64, true),
                Arc::new(Float64Array::from(values)),
            ))
        }
        ColumnType::Str => {
            let values: Vec<Option<String>> = ids
                .iter()
                .map(|&id| {
                    store
                        .get::<StringLocator>(name, id)
                        .ok()
                        .flatten()
                        .and_then(|loc| strings.get_str(loc))
                        .map(|s| s.to_string())
                })
                .collect();
            Ok((
                Field::new(name, DataType::Utf8, true),
                Arc::new(StringArray::from(values)),
            ))
        }
    }
}

/// Project `columns` out of `store` into one `RecordBatch`, in
/// `for_all_rows` order. A column with no matching series dumps as an
/// all-null `Utf8` column.
pub fn build_record_batch(
    store: &RecordStore,
    strings: &StringStore,
    columns: &[String],
) -> CoreResult<RecordBatch> {
    let mut ids = Vec::new();
    store.for_all_rows(|id| ids.push(id));

    let mut fields = Vec::with_capacity(columns.len());
    let mut arrays: Vec<ArrayRef> = Vec::with_capacity(columns.len());
    for name in columns {
        let column_type = if store.has_series(name) {
            store.column_type(name)?
        } else {
            ColumnType::Str
        };
        let (field, array) = build_array(store, strings, name, column_type, &ids)?;
        fields.push(field);
        arrays.push(array);
    }

    let schema = Arc::new(Schema::new(fields));
    RecordBatch::try_new(schema, arrays).map_err(|e| CoreError::Columnar(e.to_string()))
}

/// Write `batch` to `path`, refusing to clobber an existing file unless
/// `overwrite` is set.
pub fn write_parquet(batch: &RecordBatch, path: &Path, overwrite: bool) -> CoreResult<()> {
    if path.exists() && !overwrite {
        return Err(CoreError::DatastorePath(format!(
            "{} already exists",
            path.display()
        )));
    }
    let file = File::create(path)?;
    let mut writer = ArrowWriter::try_new(file, batch.schema(), None)
        .map_err(|e| CoreError::Columnar(e.to_string()))?;
    writer
        .write(batch)
        .map_err(|e| CoreError::Columnar(e.to_string()))?;
    writer.close().map_err(|e| CoreError::Columnar(e.to_string()))?;
    Ok(())
}
