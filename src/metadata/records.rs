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

//! Named records projected from the Thrift field-indexed tree (spec §3, §4.C).
//! Named and shaped after the teacher's `FileMetaData`/`RowGroupMetaData`
//! (`file/reader.rs` imports these from its own `file::metadata`, which was
//! not in the retrieved material; the shape here follows the fields that
//! module is used for in `reader.rs` plus the remainder of the Parquet
//! standard's stable Thrift field ids).

use crate::basic::{Compression, ConvertedType, Encoding, LogicalType, Repetition, Type};

#[derive(Debug, Clone)]
pub struct KeyValue {
    pub key: String,
    pub value: Option<String>,
}

#[derive(Debug, Clone)]
pub struct SchemaElement {
    pub physical_type: Option<Type>,
    pub type_length: Option<i32>,
    pub repetition: Option<Repetition>,
    pub name: String,
    pub num_children: Option<i32>,
    pub converted_type: Option<ConvertedType>,
    pub scale: Option<i32>,
    pub precision: Option<i32>,
    pub field_id: Option<i32>,
    pub logical_type: Option<LogicalType>,
}

#[derive(Debug, Clone, Default)]
pub struct Statistics {
    pub max: Option<Vec<u8>>,
    pub min: Option<Vec<u8>>,
    pub null_count: Option<i64>,
    pub distinct_count: Option<i64>,
    pub max_value: Option<Vec<u8>>,
    pub min_value: Option<Vec<u8>>,
    pub is_max_value_exact: Option<bool>,
    pub is_min_value_exact: Option<bool>,
}

impl Statistics {
    /// `max_value`/`min_value` (the newer fields) take precedence over the
    /// legacy `max`/`min` fields (spec §3).
    pub fn effective_max(&self) -> Option<&[u8]> {
        self.max_value.as_deref().or(self.max.as_deref())
    }

    pub fn effective_min(&self) -> Option<&[u8]> {
        self.min_value.as_deref().or(self.min.as_deref())
    }
}

#[derive(Debug, Clone)]
pub struct ColumnMetaData {
    pub type_: Type,
    pub encodings: Vec<Encoding>,
    pub path_in_schema: Vec<String>,
    pub codec: Compression,
    pub num_values: i64,
    pub total_uncompressed_size: i64,
    pub total_compressed_size: i64,
    pub key_value_metadata: Vec<KeyValue>,
    pub data_page_offset: i64,
    pub index_page_offset: Option<i64>,
    pub dictionary_page_offset: Option<i64>,
    pub statistics: Option<Statistics>,
    pub bloom_filter_offset: Option<i64>,
    pub bloom_filter_length: Option<i32>,
}

impl ColumnMetaData {
    /// Byte offset of the first page physically stored for this chunk
    /// (the dictionary page when present, else the first data page).
    pub fn physical_start(&self) -> i64 {
        self.dictionary_page_offset.unwrap_or(self.data_page_offset)
    }

    /// `[physical_start, physical_start + total_compressed_size)` (spec
    /// §3, "Physical column" in the glossary).
    pub fn physical_range(&self) -> (u64, u64) {
        let start = self.physical_start() as u64;
        (start, start + self.total_compressed_size as u64)
    }
}

#[derive(Debug, Clone)]
pub struct ColumnChunk {
    pub file_path: Option<String>,
    pub file_offset: i64,
    pub meta_data: Option<ColumnMetaData>,
    pub offset_index_offset: Option<i64>,
    pub offset_index_length: Option<i32>,
    pub column_index_offset: Option<i64>,
    pub column_index_length: Option<i32>,
}

#[derive(Debug, Clone)]
pub struct SortingColumn {
    pub column_idx: i32,
    pub descending: bool,
    pub nulls_first: bool,
}

#[derive(Debug, Clone)]
pub struct RowGroup {
    pub columns: Vec<ColumnChunk>,
    pub num_rows: i64,
    pub total_byte_size: Option<i64>,
    pub sorting_columns: Option<Vec<SortingColumn>>,
    pub file_offset: Option<i64>,
    pub ordinal: Option<i16>,
}

#[derive(Debug, Clone)]
pub struct FileMetaData {
    pub version: i32,
    pub schema: Vec<SchemaElement>,
    pub num_rows: i64,
    pub row_groups: Vec<RowGroup>,
    pub key_value_metadata: Vec<KeyValue>,
    pub created_by: Option<String>,
    /// Not a Thrift field: recorded by the footer parser so downstream
    /// planning knows how many trailer bytes to account for.
    pub metadata_length: u32,
}

impl FileMetaData {
    pub fn key_value(&self, key: &str) -> Option<&str> {
        self.key_value_metadata
            .iter()
            .find(|kv| kv.key == key)
            .and_then(|kv| kv.value.as_deref())
    }
}
