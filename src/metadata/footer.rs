// Licensed to the Apache Software Foundation (ASF) under one
// or more contributor license agreements.  See the NOTICE file
// distributed with this work for additional information
// regarding copyright ownership.  The ASF licenses this file
// to you under the Apache License, Version 2.0 (the
// "License"); you may not use this file except in compliance
// with the License.  You may obtain a copy of the License at
//
//   http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing,
// software distributed under the License is distributed on an
// "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied.  See the License for the
// specific language governing permissions and limitations
// under the License.

//! Footer parsing and Thrift-field-id projection (spec §4.C). Grounded on
//! the teacher's `SerializedFileReader::parse_metadata` (`file/reader.rs`)
//! for the footer algorithm (`FOOTER_SIZE`, `PARQUET_MAGIC`, the two-phase
//! fetch), generalized from a local `Seek`/`Read` file to an async
//! `ByteSource`, and projected through the hand-written Thrift decoder
//! instead of codegen'd bindings.

use std::collections::HashMap;

use byteorder::{ByteOrder, LittleEndian};

use crate::basic::{Compression, ConvertedType, Encoding, LogicalType, Repetition, TimeUnit, Type};
use crate::error::{general_err, ParquetError, Result};
use crate::source::ByteSource;
use crate::thrift::{read_struct, ThriftValue};

use super::records::{
    ColumnChunk, ColumnMetaData, FileMetaData, KeyValue, RowGroup, SchemaElement, SortingColumn, Statistics,
};

/// Matches the teacher's `SerializedFileReader` constants.
const FOOTER_SIZE: u64 = 8;
const PARQUET_MAGIC: [u8; 4] = [b'P', b'A', b'R', b'1'];
const DEFAULT_INITIAL_FETCH_SIZE: u64 = 512 * 1024;

#[derive(Debug, Clone, Copy)]
pub struct MetadataReadOptions {
    pub initial_fetch_size: u64,
}

impl Default for MetadataReadOptions {
    fn default() -> Self {
        Self { initial_fetch_size: DEFAULT_INITIAL_FETCH_SIZE }
    }
}

/// Reads and parses the file footer from a random-access source (spec §4.C).
pub async fn read_metadata_from_source(source: &dyn ByteSource, options: MetadataReadOptions) -> Result<FileMetaData> {
    let byte_length = source.byte_length();
    if byte_length < FOOTER_SIZE {
        return Err(ParquetError::Truncated(format!(
            "file is {} bytes, smaller than the {}-byte footer",
            byte_length, FOOTER_SIZE
        )));
    }
    let initial_fetch_size = options.initial_fetch_size.min(byte_length);
    let initial = source.slice(byte_length - initial_fetch_size, byte_length).await?;

    if &initial[initial.len() - 4..] != PARQUET_MAGIC {
        return Err(ParquetError::InvalidMagic("trailer does not end in PAR1".to_string()));
    }
    let metadata_length = LittleEndian::read_u32(&initial[initial.len() - 8..initial.len() - 4]);
    if metadata_length as u64 > byte_length - FOOTER_SIZE {
        return Err(ParquetError::MetadataTooLarge(format!(
            "metadata_length {} exceeds {} available bytes",
            metadata_length,
            byte_length - FOOTER_SIZE
        )));
    }

    let metadata_start = byte_length - metadata_length as u64 - FOOTER_SIZE;
    let buf = if (metadata_length as u64 + FOOTER_SIZE) > initial_fetch_size {
        let mut head = source.slice(metadata_start, byte_length - initial_fetch_size).await?;
        head.extend_from_slice(&initial);
        head
    } else {
        let offset_in_initial = (initial_fetch_size - metadata_length as u64 - FOOTER_SIZE) as usize;
        initial[offset_in_initial..].to_vec()
    };

    let metadata_slice = &buf[..metadata_length as usize];
    let (value, _consumed) = read_struct(metadata_slice)?;
    let mut file_metadata = project_file_metadata(&value)?;
    file_metadata.metadata_length = metadata_length;
    Ok(file_metadata)
}

/// Parses a footer already fully present in memory, also validating the
/// leading `PAR1` header magic (spec §4.C step 2).
pub fn read_metadata_from_buffer(buffer: &[u8]) -> Result<FileMetaData> {
    let byte_length = buffer.len() as u64;
    if byte_length < FOOTER_SIZE {
        return Err(ParquetError::Truncated(format!(
            "buffer is {} bytes, smaller than the {}-byte footer",
            byte_length, FOOTER_SIZE
        )));
    }
    if &buffer[0..4] != PARQUET_MAGIC {
        return Err(ParquetError::InvalidMagic("header does not start with PAR1".to_string()));
    }
    if &buffer[buffer.len() - 4..] != PARQUET_MAGIC {
        return Err(ParquetError::InvalidMagic("trailer does not end in PAR1".to_string()));
    }
    let metadata_length = LittleEndian::read_u32(&buffer[buffer.len() - 8..buffer.len() - 4]);
    if metadata_length as u64 > byte_length - FOOTER_SIZE {
        return Err(ParquetError::MetadataTooLarge(format!(
            "metadata_length {} exceeds {} available bytes",
            metadata_length,
            byte_length - FOOTER_SIZE
        )));
    }
    let metadata_start = (byte_length - metadata_length as u64 - FOOTER_SIZE) as usize;
    let metadata_end = metadata_start + metadata_length as usize;
    let (value, _consumed) = read_struct(&buffer[metadata_start..metadata_end])?;
    let mut file_metadata = project_file_metadata(&value)?;
    file_metadata.metadata_length = metadata_length;
    Ok(file_metadata)
}

fn fields(value: &ThriftValue) -> Result<&HashMap<i16, ThriftValue>> {
    value.as_struct().ok_or_else(|| general_err!("expected a Thrift struct"))
}

fn get<'a>(f: &'a HashMap<i16, ThriftValue>, id: i16) -> Option<&'a ThriftValue> {
    f.get(&id)
}

fn req_i32(f: &HashMap<i16, ThriftValue>, id: i16, what: &str) -> Result<i32> {
    get(f, id).and_then(|v| v.as_i32()).ok_or_else(|| general_err!("missing required field {}", what))
}

fn req_i64(f: &HashMap<i16, ThriftValue>, id: i16, what: &str) -> Result<i64> {
    get(f, id).and_then(|v| v.as_i64()).ok_or_else(|| general_err!("missing required field {}", what))
}

fn req_str(f: &HashMap<i16, ThriftValue>, id: i16, what: &str) -> Result<String> {
    get(f, id).and_then(|v| v.as_str()).map(str::to_string).ok_or_else(|| general_err!("missing required field {}", what))
}

fn project_file_metadata(value: &ThriftValue) -> Result<FileMetaData> {
    let f = fields(value)?;
    let version = req_i32(f, 1, "FileMetaData.version")?;
    let schema = get(f, 2)
        .and_then(|v| v.as_list())
        .ok_or_else(|| general_err!("missing FileMetaData.schema"))?
        .iter()
        .map(project_schema_element)
        .collect::<Result<Vec<_>>>()?;
    let num_rows = req_i64(f, 3, "FileMetaData.num_rows")?;
    let row_groups = get(f, 4)
        .and_then(|v| v.as_list())
        .map(|l| l.iter().map(project_row_group).collect::<Result<Vec<_>>>())
        .transpose()?
        .unwrap_or_default();
    let key_value_metadata = get(f, 5)
        .and_then(|v| v.as_list())
        .map(|l| l.iter().map(project_key_value).collect::<Result<Vec<_>>>())
        .transpose()?
        .unwrap_or_default();
    let created_by = get(f, 6).and_then(|v| v.as_str()).map(str::to_string);

    Ok(FileMetaData {
        version,
        schema,
        num_rows,
        row_groups,
        key_value_metadata,
        created_by,
        metadata_length: 0,
    })
}

fn project_key_value(value: &ThriftValue) -> Result<KeyValue> {
    let f = fields(value)?;
    Ok(KeyValue {
        key: req_str(f, 1, "KeyValue.key")?,
        value: get(f, 2).and_then(|v| v.as_str()).map(str::to_string),
    })
}

fn project_schema_element(value: &ThriftValue) -> Result<SchemaElement> {
    let f = fields(value)?;
    let physical_type = get(f, 1).and_then(|v| v.as_i32()).map(Type::from_thrift_i32).transpose()?;
    let type_length = get(f, 2).and_then(|v| v.as_i32());
    let repetition = get(f, 3).and_then(|v| v.as_i32()).map(Repetition::from_thrift_i32).transpose()?;
    let name = req_str(f, 4, "SchemaElement.name")?;
    let num_children = get(f, 5).and_then(|v| v.as_i32());
    let converted_type = get(f, 6).and_then(|v| v.as_i32()).map(ConvertedType::from_thrift_i32).transpose()?;
    let scale = get(f, 7).and_then(|v| v.as_i32());
    let precision = get(f, 8).and_then(|v| v.as_i32());
    let field_id = get(f, 9).and_then(|v| v.as_i32());
    let logical_type = get(f, 10).map(project_logical_type).transpose()?;

    Ok(SchemaElement {
        physical_type,
        type_length,
        repetition,
        name,
        num_children,
        converted_type,
        scale,
        precision,
        field_id,
        logical_type,
    })
}

fn project_logical_type(value: &ThriftValue) -> Result<LogicalType> {
    let f = fields(value)?;
    if let Some(v) = get(f, 1) {
        let _ = fields(v)?;
        return Ok(LogicalType::String);
    }
    if let Some(v) = get(f, 2) {
        let _ = fields(v)?;
        return Ok(LogicalType::Map);
    }
    if let Some(v) = get(f, 3) {
        let _ = fields(v)?;
        return Ok(LogicalType::List);
    }
    if let Some(v) = get(f, 4) {
        let _ = fields(v)?;
        return Ok(LogicalType::Enum);
    }
    if let Some(v) = get(f, 5) {
        let df = fields(v)?;
        return Ok(LogicalType::Decimal {
            scale: req_i32(df, 1, "DecimalType.scale")?,
            precision: req_i32(df, 2, "DecimalType.precision")?,
        });
    }
    if let Some(v) = get(f, 6) {
        let _ = fields(v)?;
        return Ok(LogicalType::Date);
    }
    if let Some(v) = get(f, 7) {
        let tf = fields(v)?;
        let is_adjusted_to_utc = get(tf, 1).and_then(|v| v.as_bool()).unwrap_or(false);
        let unit = get(tf, 2).map(project_time_unit).transpose()?.unwrap_or(TimeUnit::Millis);
        return Ok(LogicalType::Time { is_adjusted_to_utc, unit });
    }
    if let Some(v) = get(f, 8) {
        let tf = fields(v)?;
        let is_adjusted_to_utc = get(tf, 1).and_then(|v| v.as_bool()).unwrap_or(false);
        let unit = get(tf, 2).map(project_time_unit).transpose()?.unwrap_or(TimeUnit::Millis);
        return Ok(LogicalType::Timestamp { is_adjusted_to_utc, unit });
    }
    if let Some(v) = get(f, 10) {
        let intf = fields(v)?;
        let bit_width = get(intf, 1).and_then(|v| v.as_i32()).unwrap_or(0) as u8;
        let is_signed = get(intf, 2).and_then(|v| v.as_bool()).unwrap_or(false);
        return Ok(LogicalType::Integer { bit_width, is_signed });
    }
    if let Some(v) = get(f, 11) {
        let _ = fields(v)?;
        return Ok(LogicalType::Unknown);
    }
    if let Some(v) = get(f, 12) {
        let _ = fields(v)?;
        return Ok(LogicalType::Json);
    }
    if let Some(v) = get(f, 13) {
        let _ = fields(v)?;
        return Ok(LogicalType::Bson);
    }
    if let Some(v) = get(f, 14) {
        let _ = fields(v)?;
        return Ok(LogicalType::Uuid);
    }
    if let Some(v) = get(f, 15) {
        let _ = fields(v)?;
        return Ok(LogicalType::Float16);
    }
    Ok(LogicalType::Other("unrecognized LogicalType union variant".to_string()))
}

fn project_time_unit(value: &ThriftValue) -> Result<TimeUnit> {
    let f = fields(value)?;
    if get(f, 1).is_some() {
        return Ok(TimeUnit::Millis);
    }
    if get(f, 2).is_some() {
        return Ok(TimeUnit::Micros);
    }
    if get(f, 3).is_some() {
        return Ok(TimeUnit::Nanos);
    }
    Err(general_err!("empty TimeUnit union"))
}

fn project_row_group(value: &ThriftValue) -> Result<RowGroup> {
    let f = fields(value)?;
    let columns = get(f, 1)
        .and_then(|v| v.as_list())
        .ok_or_else(|| general_err!("missing RowGroup.columns"))?
        .iter()
        .map(project_column_chunk)
        .collect::<Result<Vec<_>>>()?;
    let total_byte_size = get(f, 2).and_then(|v| v.as_i64());
    let num_rows = req_i64(f, 3, "RowGroup.num_rows")?;
    let sorting_columns = get(f, 4)
        .and_then(|v| v.as_list())
        .map(|l| l.iter().map(project_sorting_column).collect::<Result<Vec<_>>>())
        .transpose()?;
    let file_offset = get(f, 5).and_then(|v| v.as_i64());
    let ordinal = get(f, 7).and_then(|v| v.as_i32()).map(|v| v as i16);

    Ok(RowGroup { columns, num_rows, total_byte_size, sorting_columns, file_offset, ordinal })
}

fn project_sorting_column(value: &ThriftValue) -> Result<SortingColumn> {
    let f = fields(value)?;
    Ok(SortingColumn {
        column_idx: req_i32(f, 1, "SortingColumn.column_idx")?,
        descending: get(f, 2).and_then(|v| v.as_bool()).unwrap_or(false),
        nulls_first: get(f, 3).and_then(|v| v.as_bool()).unwrap_or(false),
    })
}

fn project_column_chunk(value: &ThriftValue) -> Result<ColumnChunk> {
    let f = fields(value)?;
    Ok(ColumnChunk {
        file_path: get(f, 1).and_then(|v| v.as_str()).map(str::to_string),
        file_offset: req_i64(f, 2, "ColumnChunk.file_offset")?,
        meta_data: get(f, 3).map(project_column_meta_data).transpose()?,
        offset_index_offset: get(f, 4).and_then(|v| v.as_i64()),
        offset_index_length: get(f, 5).and_then(|v| v.as_i32()),
        column_index_offset: get(f, 6).and_then(|v| v.as_i64()),
        column_index_length: get(f, 7).and_then(|v| v.as_i32()),
    })
}

fn project_column_meta_data(value: &ThriftValue) -> Result<ColumnMetaData> {
    let f = fields(value)?;
    let type_ = Type::from_thrift_i32(req_i32(f, 1, "ColumnMetaData.type")?)?;
    let encodings = get(f, 2)
        .and_then(|v| v.as_list())
        .ok_or_else(|| general_err!("missing ColumnMetaData.encodings"))?
        .iter()
        .map(|v| Encoding::from_thrift_i32(v.as_i32().ok_or_else(|| general_err!("bad encoding id"))?))
        .collect::<Result<Vec<_>>>()?;
    let path_in_schema = get(f, 3)
        .and_then(|v| v.as_list())
        .ok_or_else(|| general_err!("missing ColumnMetaData.path_in_schema"))?
        .iter()
        .map(|v| v.as_str().map(str::to_string).ok_or_else(|| general_err!("bad path_in_schema entry")))
        .collect::<Result<Vec<_>>>()?;
    let codec = Compression::from_thrift_i32(req_i32(f, 4, "ColumnMetaData.codec")?)?;
    let num_values = req_i64(f, 5, "ColumnMetaData.num_values")?;
    let total_uncompressed_size = req_i64(f, 6, "ColumnMetaData.total_uncompressed_size")?;
    let total_compressed_size = req_i64(f, 7, "ColumnMetaData.total_compressed_size")?;
    let key_value_metadata = get(f, 8)
        .and_then(|v| v.as_list())
        .map(|l| l.iter().map(project_key_value).collect::<Result<Vec<_>>>())
        .transpose()?
        .unwrap_or_default();
    let data_page_offset = req_i64(f, 9, "ColumnMetaData.data_page_offset")?;
    let index_page_offset = get(f, 10).and_then(|v| v.as_i64());
    let dictionary_page_offset = get(f, 11).and_then(|v| v.as_i64());
    let statistics = get(f, 12).map(project_statistics).transpose()?;
    let bloom_filter_offset = get(f, 14).and_then(|v| v.as_i64());
    let bloom_filter_length = get(f, 15).and_then(|v| v.as_i32());

    Ok(ColumnMetaData {
        type_,
        encodings,
        path_in_schema,
        codec,
        num_values,
        total_uncompressed_size,
        total_compressed_size,
        key_value_metadata,
        data_page_offset,
        index_page_offset,
        dictionary_page_offset,
        statistics,
        bloom_filter_offset,
        bloom_filter_length,
    })
}

fn project_statistics(value: &ThriftValue) -> Result<Statistics> {
    let f = fields(value)?;
    Ok(Statistics {
        max: get(f, 1).and_then(|v| v.as_binary()).map(|b| b.to_vec()),
        min: get(f, 2).and_then(|v| v.as_binary()).map(|b| b.to_vec()),
        null_count: get(f, 3).and_then(|v| v.as_i64()),
        distinct_count: get(f, 4).and_then(|v| v.as_i64()),
        max_value: get(f, 5).and_then(|v| v.as_binary()).map(|b| b.to_vec()),
        min_value: get(f, 6).and_then(|v| v.as_binary()).map(|b| b.to_vec()),
        is_max_value_exact: get(f, 7).and_then(|v| v.as_bool()),
        is_min_value_exact: get(f, 8).and_then(|v| v.as_bool()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::MemorySource;

    #[test]
    fn buffer_too_short_is_truncated() {
        let err = read_metadata_from_buffer(&[0u8; 4]).unwrap_err();
        assert!(matches!(err, ParquetError::Truncated(_)));
    }

    #[test]
    fn wrong_trailer_magic_is_invalid() {
        let mut buf = vec![b'P', b'A', b'R', b'1'];
        buf.extend_from_slice(&[0, 0, 0, 0]);
        buf.extend_from_slice(b"XXXX");
        let err = read_metadata_from_buffer(&buf).unwrap_err();
        assert!(matches!(err, ParquetError::InvalidMagic(_)));
    }

    #[test]
    fn metadata_length_overflow_is_rejected() {
        let mut buf = vec![b'P', b'A', b'R', b'1'];
        buf.extend_from_slice(&[0u8; 4]);
        buf.extend_from_slice(&100u32.to_le_bytes());
        buf.extend_from_slice(b"PAR1");
        let err = read_metadata_from_buffer(&buf).unwrap_err();
        assert!(matches!(err, ParquetError::MetadataTooLarge(_)));
    }

    #[tokio::test]
    async fn source_variant_rejects_short_files() {
        let source = MemorySource::new(vec![0u8; 4]);
        let err = read_metadata_from_source(&source, MetadataReadOptions::default()).await.unwrap_err();
        assert!(matches!(err, ParquetError::Truncated(_)));
    }
}
