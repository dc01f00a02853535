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

//! File metadata: footer parsing, Thrift projection, and the public
//! `read_metadata_from_source`/`read_metadata_from_buffer` entry points
//! (spec §4.C).

mod footer;
pub mod records;

pub use footer::{read_metadata_from_buffer as read_metadata_from_buffer_raw, MetadataReadOptions};
pub use records::{ColumnChunk, ColumnMetaData, FileMetaData, KeyValue, RowGroup, SchemaElement, SortingColumn, Statistics};

use crate::error::Result;
use crate::geoparquet;
use crate::source::ByteSource;

/// Reads and parses the footer from a random-access source, then applies
/// the default-on GeoParquet schema marking (spec §4.C).
pub async fn read_metadata_from_source(source: &dyn ByteSource, options: MetadataReadOptions, geoparquet: bool) -> Result<FileMetaData> {
    let mut metadata = footer::read_metadata_from_source(source, options).await?;
    if geoparquet {
        geoparquet::apply_geoparquet_marking(&mut metadata)?;
    }
    Ok(metadata)
}

/// Parses a footer already fully present in memory, then applies the
/// default-on GeoParquet schema marking (spec §4.C).
pub fn read_metadata_from_buffer(buffer: &[u8], geoparquet: bool) -> Result<FileMetaData> {
    let mut metadata = footer::read_metadata_from_buffer(buffer)?;
    if geoparquet {
        geoparquet::apply_geoparquet_marking(&mut metadata)?;
    }
    Ok(metadata)
}
